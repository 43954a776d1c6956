//! FFmpeg log level configuration.
//!
//! FFmpeg has its own internal logging system, separate from the Rust
//! [`log`](https://crates.io/crates/log) crate. Probing and seeking through
//! damaged files can make it very chatty on stderr, so this module exposes a
//! thin wrapper around FFmpeg's log-level API.
//!
//! # Example
//!
//! ```no_run
//! use thumbsheet::FfmpegLogLevel;
//!
//! // Only show errors and above while building sheets.
//! thumbsheet::set_ffmpeg_log_level(FfmpegLogLevel::Error);
//! ```
//!
//! This controls **FFmpeg's own console output**, not the Rust-side
//! diagnostic messages emitted via the `log` crate.

use ffmpeg_next::util::log::Level;

/// FFmpeg internal log verbosity level.
///
/// Maps directly to FFmpeg's `AV_LOG_*` constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FfmpegLogLevel {
    /// Print no output at all.
    Quiet,
    /// Only unrecoverable errors.
    Fatal,
    /// Recoverable errors.
    Error,
    /// Warnings (FFmpeg's default).
    Warning,
    /// Informational messages.
    Info,
    /// Debugging messages.
    Debug,
}

impl FfmpegLogLevel {
    fn to_ffmpeg_level(self) -> Level {
        match self {
            FfmpegLogLevel::Quiet => Level::Quiet,
            FfmpegLogLevel::Fatal => Level::Fatal,
            FfmpegLogLevel::Error => Level::Error,
            FfmpegLogLevel::Warning => Level::Warning,
            FfmpegLogLevel::Info => Level::Info,
            FfmpegLogLevel::Debug => Level::Debug,
        }
    }

    fn from_ffmpeg_level(level: Level) -> Option<Self> {
        match level {
            Level::Quiet => Some(FfmpegLogLevel::Quiet),
            Level::Panic | Level::Fatal => Some(FfmpegLogLevel::Fatal),
            Level::Error => Some(FfmpegLogLevel::Error),
            Level::Warning => Some(FfmpegLogLevel::Warning),
            Level::Info | Level::Verbose => Some(FfmpegLogLevel::Info),
            Level::Debug | Level::Trace => Some(FfmpegLogLevel::Debug),
        }
    }
}

/// Set the FFmpeg internal log verbosity level.
pub fn set_ffmpeg_log_level(level: FfmpegLogLevel) {
    ffmpeg_next::util::log::set_level(level.to_ffmpeg_level());
}

/// Get the current FFmpeg internal log verbosity level.
pub fn get_ffmpeg_log_level() -> Option<FfmpegLogLevel> {
    ffmpeg_next::util::log::get_level()
        .ok()
        .and_then(FfmpegLogLevel::from_ffmpeg_level)
}
