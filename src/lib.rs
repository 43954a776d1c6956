//! # thumbsheet
//!
//! Build contact sheets (thumbnail grids) from video files.
//!
//! `thumbsheet` samples frames at evenly spaced timestamps, rejects blank
//! frames, lays the survivors out on a grid, stamps each tile with its
//! timestamp, adds a block of file information, and writes the result as a
//! JPEG or PNG. Decoding goes through FFmpeg via the
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) crate.
//!
//! ## Quick Start
//!
//! ```no_run
//! use thumbsheet::LayoutSpec;
//!
//! // 4 columns × 5 rows, 1600 px wide, written to input_s.jpg.
//! let spec = LayoutSpec::new(4, 5).with_output_width(1600);
//! let summary = thumbsheet::generate("input.mp4", &spec).unwrap();
//! println!("{}", summary.to_json());
//! ```
//!
//! ### Sample every 30 seconds, skip the intro
//!
//! ```no_run
//! use thumbsheet::{LayoutSpec, SheetError};
//!
//! let spec = LayoutSpec::new(5, 0)
//!     .with_step(30.0)
//!     .with_begin(90.0)
//!     .with_output_suffix("_sheet.png")
//!     .with_info_sidecar("_sheet.txt");
//! thumbsheet::generate("episode.mkv", &spec)?;
//! # Ok::<(), SheetError>(())
//! ```
//!
//! ### Drive the pipeline yourself
//!
//! [`run`] works on any [`VideoSource`] and [`TextRenderer`] and returns the
//! sheet in memory:
//!
//! ```no_run
//! use thumbsheet::{LayoutSpec, MediaFile, RunOptions, SvgTextRenderer};
//!
//! let mut source = MediaFile::open("input.mp4").unwrap();
//! let sheet = thumbsheet::run(
//!     &mut source,
//!     &LayoutSpec::default(),
//!     &SvgTextRenderer::new(),
//!     &RunOptions::new(),
//! )
//! .unwrap();
//! sheet.image.save("preview.png").unwrap();
//! ```
//!
//! ## Features
//!
//! - **Scheduling** — evenly spaced midpoints, fixed steps, begin/end trims
//!   and cut windows
//! - **Blank-frame rejection** — luminance histogram scoring with a bounded
//!   retry budget
//! - **Rotation and anamorphic video** — frames are turned upright and
//!   squared before layout
//! - **Layout** — gaps, margins, per-tile borders and drop shadows,
//!   letterbox/crop/stretch fitting, fixed or compacted grids
//! - **Overlays** — per-tile timestamps with shadows and an info block
//! - **Outputs** — JPEG/PNG sheet, per-shot images, text sidecar and a
//!   JSON summary
//! - **Progress & cancellation** — [`ProgressCallback`] and
//!   [`CancellationToken`]
//!
//! ### Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `rayon` | [`generate_many`] builds sheets for many files in parallel |
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system.

pub mod acceptor;
#[cfg(feature = "rayon")]
pub mod batch;
pub mod canvas;
pub mod configuration;
mod conversion;
pub mod encode;
pub mod error;
pub mod ffmpeg;
mod filter;
pub mod media;
pub mod metadata;
pub mod overlay;
pub mod progress;
pub mod schedule;
pub mod sheet;
pub mod source;
pub mod text;

pub use acceptor::{AcceptedFrame, Acceptance, FrameAcceptor, SkipReason, blankness};
#[cfg(feature = "rayon")]
pub use batch::generate_many;
pub use canvas::{Canvas, GridGeometry, Rect};
pub use configuration::{
    Anchor, Color, FitPolicy, IndividualShots, LayoutSpec, RunOptions, SeekMode, TextStyle,
};
pub use encode::{OutputFormat, OutputPaths, PendingOutputs, ShotKind};
pub use error::SheetError;
pub use ffmpeg::{FfmpegLogLevel, get_ffmpeg_log_level, set_ffmpeg_log_level};
pub use media::MediaFile;
pub use metadata::{AudioInfo, MediaInfo};
pub use overlay::{draw_info_block, stamp_timestamp};
pub use progress::{CancellationToken, ProgressCallback, ProgressInfo};
pub use schedule::{SampleTarget, Schedule, compute_targets};
pub use sheet::{
    PlacedShot, Sheet, SheetSummary, ShotImage, SkippedSample, generate, generate_with_options,
    generate_with_renderer, run,
};
pub use source::{DecodedFrame, SeekStrategy, VideoSource};
pub use text::{SvgTextRenderer, TextRenderer};
