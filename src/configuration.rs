//! Sheet configuration.
//!
//! [`LayoutSpec`] is the immutable per-run description of the sheet: grid
//! shape, sampling window, blank-frame policy, geometry, colours, overlays and
//! outputs. [`RunOptions`] threads progress callbacks and cancellation tokens
//! through a run without polluting every function signature.
//!
//! # Example
//!
//! ```no_run
//! use thumbsheet::{Anchor, Color, FitPolicy, LayoutSpec};
//!
//! let spec = LayoutSpec::new(4, 5)
//!     .with_output_width(1600)
//!     .with_gap(4)
//!     .with_begin(30.0)
//!     .with_aspect_ratio(16.0 / 9.0, FitPolicy::Crop)
//!     .with_background(Color::BLACK)
//!     .with_timestamp_anchor(Anchor::TopRight);
//! ```

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    path::PathBuf,
    sync::Arc,
};

use crate::{
    error::SheetError,
    progress::{CancellationToken, NoOpProgress, ProgressCallback},
};

/// An opaque 8-bit RGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const GREY: Color = Color::rgb(128, 128, 128);
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    /// Default info-block text colour.
    pub const INFO: Color = Color::rgb(85, 85, 85);

    /// Build a colour from its channels.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse a `RRGGBB` hex string, with or without a leading `#`.
    ///
    /// # Errors
    ///
    /// Returns [`SheetError::InvalidLayout`] if the string is not six hex
    /// digits.
    pub fn from_hex(hex: &str) -> Result<Self, SheetError> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        let invalid = || SheetError::InvalidLayout(format!("invalid colour '{hex}'"));
        if digits.len() != 6 || !digits.is_ascii() {
            return Err(invalid());
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16).map_err(|_| invalid())
        };
        Ok(Self::rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    /// Hex representation `#rrggbb`, as used in SVG paint attributes.
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Anchor point of a text overlay inside its region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Anchor {
    #[default]
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    Center,
}

impl Anchor {
    /// `true` for anchors on the bottom edge.
    pub fn is_bottom(self) -> bool {
        matches!(self, Anchor::BottomLeft | Anchor::BottomRight)
    }

    /// `true` for anchors on the right edge.
    pub fn is_right(self) -> bool {
        matches!(self, Anchor::TopRight | Anchor::BottomRight)
    }
}

/// How a frame is fitted into a cell whose aspect ratio differs from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FitPolicy {
    /// Scale to fit inside the cell and pad with the background colour.
    #[default]
    Letterbox,
    /// Scale to fill the cell and crop symmetrically from the longer axis.
    Crop,
    /// Scale both axes independently to the cell size.
    Stretch,
}

/// Seek strategy override for frame decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeekMode {
    /// Seek when the container reports reliable seeking, otherwise decode
    /// sequentially.
    #[default]
    Auto,
    /// Always jump near each target (`-z` in classic thumbnailers).
    Seek,
    /// Always decode sequentially (`-Z`).
    NonSeek,
}

/// Font, size and colours for one kind of overlay text.
#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    /// Font family passed to the text renderer.
    pub font_family: String,
    /// Font size in pixels.
    pub size: f32,
    /// Foreground colour.
    pub color: Color,
    /// Shadow colour drawn one pixel down-right before the foreground.
    /// `None` disables the shadow pass.
    pub shadow: Option<Color>,
}

impl TextStyle {
    /// Default style for per-shot timestamps: white on a black shadow.
    pub fn timestamp() -> Self {
        Self {
            font_family: "DejaVu Sans".to_string(),
            size: 11.0,
            color: Color::WHITE,
            shadow: Some(Color::BLACK),
        }
    }

    /// Default style for the info block: dark grey, no shadow.
    pub fn info() -> Self {
        Self {
            font_family: "DejaVu Sans".to_string(),
            size: 12.0,
            color: Color::INFO,
            shadow: None,
        }
    }

    /// Height of one line of this style, including spacing.
    pub fn line_height(&self) -> u32 {
        (self.size * 1.4).ceil() as u32
    }
}

/// Which per-shot image files to write next to the sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndividualShots {
    /// Write each shot at its cell size.
    pub thumbnail: bool,
    /// Write each shot at its decoded (upright) size.
    pub original: bool,
}

impl IndividualShots {
    /// `true` if any per-shot output is requested.
    pub fn any(self) -> bool {
        self.thumbnail || self.original
    }
}

/// Number of rows used in auto-step mode when `rows` is left at 0.
pub const DEFAULT_AUTO_ROWS: u32 = 4;

/// Complete, immutable description of one contact sheet.
///
/// Defaults follow the classic movie-thumbnailer conventions: 3 columns,
/// 1024 px wide, white background, blank threshold 0.8, JPEG quality 90 and
/// a `_s.jpg` output suffix.
#[derive(Debug, Clone)]
#[must_use]
pub struct LayoutSpec {
    /// Number of grid columns. Must be at least 1.
    pub columns: u32,
    /// Number of grid rows. 0 means automatic.
    pub rows: u32,
    /// Seconds between shots. 0 means derived from `columns * rows`.
    pub step: f64,
    /// Seconds skipped at the beginning.
    pub begin: f64,
    /// Seconds skipped at the end.
    pub end: f64,
    /// Limit the sampled window to this many seconds after `begin` (≤ 0: off).
    pub cut: f64,
    /// Aspect-ratio override (width / height) for every cell.
    pub aspect_ratio: Option<f64>,
    /// How frames are fitted into cells.
    pub fit: FitPolicy,
    /// Gap between cells, and between the grid and the canvas border, in pixels.
    pub gap: u32,
    /// Blank border around the whole sheet, in pixels.
    pub margin: u32,
    /// Output width in pixels. 0 means `columns * source width`.
    pub output_width: u32,
    /// Minimum cell height in pixels.
    pub min_height: u32,
    /// Canvas background colour (also used for blank filler tiles).
    pub background: Color,
    /// Make the background fully transparent (only kept by PNG output).
    pub transparent_background: bool,
    /// Border width drawn around each tile. 0 disables it.
    pub edge: u32,
    /// Border colour.
    pub edge_color: Color,
    /// Drop-shadow offset beneath each tile. 0 disables it.
    pub tile_shadow: u32,
    /// Frames whose blankness score exceeds this are rejected (0–1).
    pub blank_threshold: f64,
    /// Maximum number of re-probes after a blank frame.
    pub blank_retries: u32,
    /// Seconds the probe advances after each blank frame.
    pub blank_retry_step: f64,
    /// Seek strategy override.
    pub seek_mode: SeekMode,
    /// Keep the full grid even when samples are skipped, drawing blank tiles.
    pub fixed_grid: bool,
    /// Draw per-shot timestamps.
    pub show_timestamps: bool,
    /// Position of the timestamp inside each cell.
    pub timestamp_anchor: Anchor,
    /// Timestamp text style.
    pub timestamp_style: TextStyle,
    /// Draw the info block.
    pub show_info: bool,
    /// Position of the info block (top anchors and `Center` use a header band).
    pub info_anchor: Anchor,
    /// Info block text style.
    pub info_style: TextStyle,
    /// Show the file size in human-readable form only.
    pub human_file_size: bool,
    /// Extra line appended to the info block.
    pub extra_text: Option<String>,
    /// Per-shot image outputs.
    pub individual: IndividualShots,
    /// JPEG quality (1–100).
    pub jpeg_quality: u8,
    /// Sheet file suffix, including the extension that selects the format.
    pub output_suffix: String,
    /// Output directory. `None` writes next to the input file.
    pub output_dir: Option<PathBuf>,
    /// Base name for every output, replacing the input's file stem.
    pub output_name: Option<String>,
    /// Keep the input's extension in output names (`movie.mp4_s.jpg`).
    pub full_filename: bool,
    /// Info sidecar suffix (e.g. `"_s.txt"`). `None` disables the sidecar.
    pub info_suffix: Option<String>,
    /// Replace existing output files.
    pub overwrite: bool,
    /// FFmpeg filter expression applied to every decoded frame.
    pub filters: Option<String>,
    /// Zero-based index among the file's video streams. `None` picks the
    /// best stream.
    pub video_stream: Option<usize>,
}

impl Default for LayoutSpec {
    fn default() -> Self {
        Self {
            columns: 3,
            rows: 0,
            step: 0.0,
            begin: 0.0,
            end: 0.0,
            cut: 0.0,
            aspect_ratio: None,
            fit: FitPolicy::Letterbox,
            gap: 0,
            margin: 0,
            output_width: 1024,
            min_height: 150,
            background: Color::WHITE,
            transparent_background: false,
            edge: 0,
            edge_color: Color::GREY,
            tile_shadow: 0,
            blank_threshold: 0.8,
            blank_retries: 10,
            blank_retry_step: 0.5,
            seek_mode: SeekMode::Auto,
            fixed_grid: false,
            show_timestamps: true,
            timestamp_anchor: Anchor::BottomRight,
            timestamp_style: TextStyle::timestamp(),
            show_info: true,
            info_anchor: Anchor::TopLeft,
            info_style: TextStyle::info(),
            human_file_size: false,
            extra_text: None,
            individual: IndividualShots::default(),
            jpeg_quality: 90,
            output_suffix: "_s.jpg".to_string(),
            output_dir: None,
            output_name: None,
            full_filename: false,
            info_suffix: None,
            overwrite: true,
            filters: None,
            video_stream: None,
        }
    }
}

impl LayoutSpec {
    /// Create a layout with the given grid and default settings otherwise.
    pub fn new(columns: u32, rows: u32) -> Self {
        Self {
            columns,
            rows,
            ..Self::default()
        }
    }

    /// Sample every `seconds` instead of deriving the step from the grid.
    pub fn with_step(mut self, seconds: f64) -> Self {
        self.step = seconds;
        self
    }

    /// Skip `seconds` at the beginning.
    pub fn with_begin(mut self, seconds: f64) -> Self {
        self.begin = seconds;
        self
    }

    /// Skip `seconds` at the end.
    pub fn with_end(mut self, seconds: f64) -> Self {
        self.end = seconds;
        self
    }

    /// Only sample the first `seconds` after the begin trim.
    pub fn with_cut(mut self, seconds: f64) -> Self {
        self.cut = seconds;
        self
    }

    /// Force every cell to `ratio` (width / height) using `fit`.
    pub fn with_aspect_ratio(mut self, ratio: f64, fit: FitPolicy) -> Self {
        self.aspect_ratio = (ratio > 0.0).then_some(ratio);
        self.fit = fit;
        self
    }

    /// Set the gap between cells.
    pub fn with_gap(mut self, pixels: u32) -> Self {
        self.gap = pixels;
        self
    }

    /// Set the blank border around the sheet.
    pub fn with_margin(mut self, pixels: u32) -> Self {
        self.margin = pixels;
        self
    }

    /// Set the output width. 0 uses `columns * source width`.
    pub fn with_output_width(mut self, pixels: u32) -> Self {
        self.output_width = pixels;
        self
    }

    /// Set the minimum cell height.
    pub fn with_min_height(mut self, pixels: u32) -> Self {
        self.min_height = pixels;
        self
    }

    /// Set the background colour.
    pub fn with_background(mut self, color: Color) -> Self {
        self.background = color;
        self
    }

    /// Use a transparent background (PNG output only).
    pub fn with_transparent_background(mut self, transparent: bool) -> Self {
        self.transparent_background = transparent;
        self
    }

    /// Draw a border of `width` pixels around each tile.
    pub fn with_edge(mut self, width: u32, color: Color) -> Self {
        self.edge = width;
        self.edge_color = color;
        self
    }

    /// Draw a drop shadow offset by `pixels` beneath each tile.
    pub fn with_tile_shadow(mut self, pixels: u32) -> Self {
        self.tile_shadow = pixels;
        self
    }

    /// Set the blank-frame threshold. Values ≥ 1.0 disable rejection.
    pub fn with_blank_threshold(mut self, threshold: f64) -> Self {
        self.blank_threshold = threshold;
        self
    }

    /// Set the blank-frame retry budget and the probe advance per retry.
    pub fn with_blank_retries(mut self, retries: u32, step_seconds: f64) -> Self {
        self.blank_retries = retries;
        self.blank_retry_step = step_seconds;
        self
    }

    /// Override the seek strategy.
    pub fn with_seek_mode(mut self, mode: SeekMode) -> Self {
        self.seek_mode = mode;
        self
    }

    /// Keep the full grid when samples are skipped.
    pub fn with_fixed_grid(mut self, fixed: bool) -> Self {
        self.fixed_grid = fixed;
        self
    }

    /// Toggle per-shot timestamps.
    pub fn with_timestamps(mut self, show: bool) -> Self {
        self.show_timestamps = show;
        self
    }

    /// Set where timestamps are drawn inside each cell.
    pub fn with_timestamp_anchor(mut self, anchor: Anchor) -> Self {
        self.timestamp_anchor = anchor;
        self
    }

    /// Set the timestamp text style.
    pub fn with_timestamp_style(mut self, style: TextStyle) -> Self {
        self.timestamp_style = style;
        self
    }

    /// Toggle the info block.
    pub fn with_info(mut self, show: bool) -> Self {
        self.show_info = show;
        self
    }

    /// Set where the info block is drawn.
    pub fn with_info_anchor(mut self, anchor: Anchor) -> Self {
        self.info_anchor = anchor;
        self
    }

    /// Set the info block text style.
    pub fn with_info_style(mut self, style: TextStyle) -> Self {
        self.info_style = style;
        self
    }

    /// Show the file size in human-readable form only.
    pub fn with_human_file_size(mut self, human: bool) -> Self {
        self.human_file_size = human;
        self
    }

    /// Append an extra line to the info block.
    pub fn with_extra_text(mut self, text: impl Into<String>) -> Self {
        self.extra_text = Some(text.into());
        self
    }

    /// Write per-shot image files.
    pub fn with_individual_shots(mut self, shots: IndividualShots) -> Self {
        self.individual = shots;
        self
    }

    /// Set the JPEG quality, clamped to 1–100.
    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    /// Set the sheet file suffix (its extension selects JPEG or PNG).
    pub fn with_output_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.output_suffix = suffix.into();
        self
    }

    /// Write outputs into `dir` instead of next to the input.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Use `name` instead of the input's file stem for every output.
    pub fn with_output_name(mut self, name: impl Into<String>) -> Self {
        self.output_name = Some(name.into());
        self
    }

    /// Keep the input's extension in output names.
    pub fn with_full_filename(mut self, full: bool) -> Self {
        self.full_filename = full;
        self
    }

    /// Write an info sidecar with the given suffix.
    pub fn with_info_sidecar(mut self, suffix: impl Into<String>) -> Self {
        self.info_suffix = Some(suffix.into());
        self
    }

    /// Control whether existing output files are replaced.
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Apply an FFmpeg filter expression to every decoded frame.
    pub fn with_filters(mut self, expression: impl Into<String>) -> Self {
        self.filters = Some(expression.into());
        self
    }

    /// Decode the `index`-th video stream (zero-based) instead of the best one.
    pub fn with_video_stream(mut self, index: usize) -> Self {
        self.video_stream = Some(index);
        self
    }
}

/// Operational settings for one run: progress reporting and cancellation.
///
/// All fields have sensible defaults; a default-constructed value never
/// cancels and discards progress notifications.
#[derive(Clone)]
pub struct RunOptions {
    pub(crate) progress: Arc<dyn ProgressCallback>,
    pub(crate) cancellation: Option<CancellationToken>,
}

impl Debug for RunOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("RunOptions")
            .field("has_cancellation", &self.cancellation.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl RunOptions {
    /// Create options with no progress callback and no cancellation.
    pub fn new() -> Self {
        Self {
            progress: Arc::new(NoOpProgress),
            cancellation: None,
        }
    }

    /// Attach a progress callback, invoked once per resolved sample.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Attach a cancellation token, checked before each sample.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
    }
}
