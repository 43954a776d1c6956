//! Frame acceptance.
//!
//! For every [`SampleTarget`] the [`FrameAcceptor`] asks the source for a
//! frame, rejects near-uniform ("blank") frames by re-probing a little later,
//! and turns the surviving raster upright. Each target resolves to exactly one
//! [`Acceptance`].
//!
//! ```text
//! Probing ──usable──▶ Accepted
//!    │
//!    └─blank──▶ Retrying ──usable──▶ Accepted
//!                  │
//!                  └─budget spent / end of stream──▶ Skipped
//! ```

use image::{RgbImage, imageops};

use crate::{
    configuration::LayoutSpec,
    error::SheetError,
    schedule::SampleTarget,
    source::{SeekStrategy, VideoSource},
};

/// Number of luminance buckets in the blankness histogram.
pub const LUMA_BUCKETS: usize = 32;

/// A frame accepted for a grid cell, already upright.
#[derive(Debug, Clone)]
pub struct AcceptedFrame {
    /// Upright RGB raster.
    pub image: RgbImage,
    /// Timestamp of the accepted frame, in seconds.
    pub timestamp: f64,
    /// Index of the target this frame resolves.
    pub index: usize,
}

/// Why a target produced no frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Every probe within the retry budget was blank.
    AllBlank,
    /// The stream ended before a usable frame was found.
    EndOfStream,
}

/// Outcome of one target.
#[derive(Debug, Clone)]
pub enum Acceptance {
    /// A usable frame was found.
    Accepted(AcceptedFrame),
    /// No usable frame; the target is skipped.
    Skipped {
        /// Index of the skipped target.
        index: usize,
        /// Why it was skipped.
        reason: SkipReason,
    },
}

impl Acceptance {
    /// Index of the target this outcome belongs to.
    pub fn index(&self) -> usize {
        match self {
            Acceptance::Accepted(frame) => frame.index,
            Acceptance::Skipped { index, .. } => *index,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ProbeState {
    Probing { timestamp: f64 },
    Retrying { timestamp: f64, attempt: u32 },
}

/// Blank-frame retry state machine for one run.
#[derive(Debug, Clone)]
pub struct FrameAcceptor {
    strategy: SeekStrategy,
    rotation: u32,
    blank_threshold: f64,
    blank_retries: u32,
    blank_retry_step: f64,
}

impl FrameAcceptor {
    /// Create an acceptor for one run.
    ///
    /// `strategy` is resolved once by the caller and used for every decode;
    /// `rotation` is the stream's clockwise rotation in degrees.
    pub fn new(spec: &LayoutSpec, strategy: SeekStrategy, rotation: u32) -> Self {
        Self {
            strategy,
            rotation,
            blank_threshold: spec.blank_threshold,
            blank_retries: spec.blank_retries,
            blank_retry_step: spec.blank_retry_step,
        }
    }

    /// Seek strategy used for every decode.
    pub fn strategy(&self) -> SeekStrategy {
        self.strategy
    }

    /// Resolve `target` to an accepted frame or a skip.
    ///
    /// The source is asked for at most `1 + blank_retries` frames.
    ///
    /// # Errors
    ///
    /// Propagates every source error except [`SheetError::EndOfStream`],
    /// which becomes [`SkipReason::EndOfStream`].
    pub fn accept<S: VideoSource + ?Sized>(
        &self,
        source: &mut S,
        target: &SampleTarget,
    ) -> Result<Acceptance, SheetError> {
        let mut state = ProbeState::Probing {
            timestamp: target.timestamp,
        };

        loop {
            let (timestamp, attempt) = match state {
                ProbeState::Probing { timestamp } => (timestamp, 0),
                ProbeState::Retrying { timestamp, attempt } => (timestamp, attempt),
            };

            let frame = match source.decode_frame_near(timestamp, self.strategy) {
                Ok(frame) => frame,
                Err(SheetError::EndOfStream(_)) => {
                    log::debug!(
                        "Target {} at {:.3}s: stream ended before a usable frame",
                        target.index,
                        target.timestamp
                    );
                    return Ok(Acceptance::Skipped {
                        index: target.index,
                        reason: SkipReason::EndOfStream,
                    });
                }
                Err(error) => return Err(error),
            };

            let score = blankness(&frame.image);
            if score <= self.blank_threshold {
                return Ok(Acceptance::Accepted(AcceptedFrame {
                    image: rotate_upright(frame.image, self.rotation),
                    timestamp: frame.timestamp,
                    index: target.index,
                }));
            }

            log::debug!(
                "Target {}: frame at {:.3}s is blank (score {score:.3}), attempt {attempt}",
                target.index,
                frame.timestamp
            );

            if attempt >= self.blank_retries {
                return Ok(Acceptance::Skipped {
                    index: target.index,
                    reason: SkipReason::AllBlank,
                });
            }

            state = ProbeState::Retrying {
                timestamp: timestamp + self.blank_retry_step,
                attempt: attempt + 1,
            };
        }
    }
}

/// Share of pixels in the most populated luminance bucket, in `[0, 1]`.
///
/// A solid-colour frame scores 1.0. An empty image scores 1.0 as well.
pub fn blankness(image: &RgbImage) -> f64 {
    let total = image.width() as u64 * image.height() as u64;
    if total == 0 {
        return 1.0;
    }

    let mut histogram = [0u64; LUMA_BUCKETS];
    for pixel in image.pixels() {
        let [r, g, b] = pixel.0;
        // BT.601 integer luma.
        let luma = (299 * r as u32 + 587 * g as u32 + 114 * b as u32) / 1000;
        histogram[luma as usize * LUMA_BUCKETS / 256] += 1;
    }

    let peak = histogram.iter().copied().max().unwrap_or(0);
    peak as f64 / total as f64
}

/// Rotate a raster clockwise by 0, 90, 180 or 270 degrees.
pub fn rotate_upright(image: RgbImage, rotation: u32) -> RgbImage {
    match rotation {
        90 => imageops::rotate90(&image),
        180 => imageops::rotate180(&image),
        270 => imageops::rotate270(&image),
        _ => image,
    }
}
