//! Error types for the `thumbsheet` crate.
//!
//! This module defines [`SheetError`], the unified error type returned by all
//! fallible operations in the crate. Every variant is fatal for the run that
//! produced it, with one exception: [`SheetError::EndOfStream`] from a
//! [`VideoSource`](crate::VideoSource) is turned into a skip by the sheet
//! pipeline and reported in the [`SheetSummary`](crate::SheetSummary).

use std::{io::Error as IoError, path::PathBuf};

use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use thiserror::Error;

/// The unified error type for all `thumbsheet` operations.
///
/// Every public method that can fail returns `Result<T, SheetError>`.
/// Variants carry enough context to diagnose the problem without needing
/// additional logging at the call site.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SheetError {
    /// The input file does not exist.
    #[error("Media file not found: {0}")]
    NotFound(PathBuf),

    /// The media file exists but could not be opened or probed.
    #[error("Failed to open media file at {path}: {reason}")]
    FileOpen {
        /// Path that was passed to [`crate::MediaFile::open`].
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The file does not contain a usable video stream.
    #[error("No video stream found in file")]
    NoVideoStream,

    /// No decoder is available for the video stream's codec.
    #[error("Unsupported video codec: {0}")]
    CodecUnsupported(String),

    /// A video frame could not be decoded. The source is considered unusable.
    #[error("Failed to decode video frame: {0}")]
    DecodeFailed(String),

    /// The decoder ran out of frames before reaching the requested timestamp.
    ///
    /// The acceptor turns this into a skip; it only escapes as an error when
    /// a [`VideoSource`](crate::VideoSource) is driven directly.
    #[error("End of stream reached before {0:.3}s")]
    EndOfStream(f64),

    /// The sampled window is empty after applying trims and cut.
    #[error("Invalid range: start ({start:.3}s) must be less than end ({end:.3}s)")]
    InvalidRange {
        /// Effective start of the window, in seconds.
        start: f64,
        /// Effective end of the window, in seconds.
        end: f64,
    },

    /// The grid layout cannot be realised (e.g. zero columns).
    #[error("Invalid layout: {0}")]
    InvalidLayout(String),

    /// The FFmpeg filter graph could not be built.
    #[error("Failed to initialise filter graph: {0}")]
    FilterInitFailed(String),

    /// The finished sheet could not be encoded.
    #[error("Failed to encode image: {0}")]
    EncodeFailed(String),

    /// Text could not be rasterised onto the canvas.
    #[error("Text rendering error: {0}")]
    TextRenderError(String),

    /// An output file already exists and overwriting is disabled.
    #[error("Output file already exists: {0}")]
    OutputExists(PathBuf),

    /// An output file could not be created. Nothing from the run is left on
    /// disk.
    #[error("Failed to create output {path}: {reason}")]
    OutputCreate {
        /// The destination that failed.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// Every sample was skipped, so there is nothing to place on the sheet.
    #[error("No usable frames found ({targets} targets, all skipped)")]
    NoUsableFrames {
        /// Number of sample targets that were attempted.
        targets: usize,
    },

    /// The run was cancelled via a [`CancellationToken`](crate::CancellationToken).
    #[error("Operation cancelled")]
    Cancelled,

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// An error from the `image` crate.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),
}

impl From<FfmpegError> for SheetError {
    fn from(error: FfmpegError) -> Self {
        SheetError::FfmpegError(error.to_string())
    }
}
