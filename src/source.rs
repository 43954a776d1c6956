//! The video source seam.
//!
//! The sampling engine never talks to FFmpeg directly. It asks a
//! [`VideoSource`] for one frame near a timestamp and gets back an RGB raster
//! or a typed error. [`MediaFile`](crate::MediaFile) is the FFmpeg-backed
//! implementation; tests drive the engine with synthetic sources.

use image::RgbImage;

use crate::{configuration::SeekMode, error::SheetError, metadata::MediaInfo};

/// How the decode cursor reaches each target. Chosen once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekStrategy {
    /// Jump near each target. Fast, but may land on a keyframe-aligned
    /// position for some containers.
    Seek,
    /// Decode forward from the current position. Monotonic and frame
    /// accurate, slower for sparse sampling.
    NonSeek,
}

impl SeekStrategy {
    /// Resolve the run's strategy. An explicit override wins; otherwise seek
    /// only when the container reports reliable seeking.
    pub fn resolve(mode: SeekMode, supports_seeking: bool) -> Self {
        match mode {
            SeekMode::Seek => SeekStrategy::Seek,
            SeekMode::NonSeek => SeekStrategy::NonSeek,
            SeekMode::Auto if supports_seeking => SeekStrategy::Seek,
            SeekMode::Auto => SeekStrategy::NonSeek,
        }
    }
}

/// A decoded frame in coded orientation.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    /// Tightly packed RGB raster.
    pub image: RgbImage,
    /// Presentation timestamp of the frame, in seconds.
    pub timestamp: f64,
}

/// A decodable video stream.
///
/// Implementations own a single decode cursor and are driven strictly
/// sequentially. Resources are released on drop.
pub trait VideoSource {
    /// Metadata of the selected video stream.
    fn media_info(&self) -> &MediaInfo;

    /// `true` when the container supports reliable random access.
    fn supports_seeking(&self) -> bool;

    /// Decode the first frame at or after `timestamp`.
    ///
    /// # Errors
    ///
    /// - [`SheetError::EndOfStream`] if the stream ends before `timestamp`.
    /// - [`SheetError::DecodeFailed`] if the stream is unusable.
    fn decode_frame_near(
        &mut self,
        timestamp: f64,
        strategy: SeekStrategy,
    ) -> Result<DecodedFrame, SheetError>;
}

impl<S: VideoSource + ?Sized> VideoSource for &mut S {
    fn media_info(&self) -> &MediaInfo {
        (**self).media_info()
    }

    fn supports_seeking(&self) -> bool {
        (**self).supports_seeking()
    }

    fn decode_frame_near(
        &mut self,
        timestamp: f64,
        strategy: SeekStrategy,
    ) -> Result<DecodedFrame, SheetError> {
        (**self).decode_frame_near(timestamp, strategy)
    }
}
