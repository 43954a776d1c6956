//! The sheet pipeline.
//!
//! [`run`] drives one sheet from a [`VideoSource`] to an in-memory [`Sheet`]:
//! schedule, accept, lay out, place, stamp, annotate. Nothing touches the
//! filesystem until [`Sheet::write`], so a failed or cancelled run leaves no
//! partial output behind. [`generate`] and friends wrap the whole thing for a
//! file on disk.

use std::path::{Path, PathBuf};

use image::{DynamicImage, RgbaImage};
use serde_json::{Value, json};

use crate::{
    acceptor::{Acceptance, FrameAcceptor, SkipReason},
    canvas::{Canvas, GridGeometry},
    configuration::{LayoutSpec, RunOptions},
    encode::{self, OutputPaths, PendingOutputs, ShotKind},
    error::SheetError,
    media::MediaFile,
    overlay,
    progress::ProgressTracker,
    schedule::compute_targets,
    source::{SeekStrategy, VideoSource},
    text::{SvgTextRenderer, TextRenderer},
};

/// A target that produced no frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedSample {
    /// Target index.
    pub index: usize,
    /// Requested timestamp, in seconds.
    pub timestamp: f64,
    /// Why the target was skipped.
    pub reason: SkipReason,
}

/// A frame placed on the sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedShot {
    /// Target index.
    pub index: usize,
    /// Grid cell the frame occupies.
    pub cell: usize,
    /// Timestamp of the accepted frame, in seconds.
    pub timestamp: f64,
}

/// What a run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetSummary {
    /// Number of scheduled targets.
    pub target_count: usize,
    /// Number of targets that produced a frame.
    pub accepted_count: usize,
    /// Placed frames in cell order.
    pub placed: Vec<PlacedShot>,
    /// Skipped targets in schedule order.
    pub skipped: Vec<SkippedSample>,
    /// Blank filler tiles drawn in fixed-grid mode.
    pub filler_count: usize,
    /// Final grid columns.
    pub columns: u32,
    /// Final grid rows.
    pub rows: u32,
    /// Sheet width in pixels.
    pub width: u32,
    /// Sheet height in pixels.
    pub height: u32,
    /// Seek strategy used for every decode.
    pub seek_strategy: SeekStrategy,
    /// Written sheet, once [`Sheet::write`] has run.
    pub output_path: Option<PathBuf>,
    /// Written per-shot images.
    pub shot_paths: Vec<PathBuf>,
    /// Written info sidecar.
    pub info_path: Option<PathBuf>,
}

impl SheetSummary {
    /// `true` when every target produced a frame.
    pub fn is_complete(&self) -> bool {
        self.accepted_count == self.target_count
    }

    /// Machine-readable form of the summary.
    pub fn to_json(&self) -> Value {
        let path = |path: &Path| path.display().to_string();
        json!({
            "targets": self.target_count,
            "accepted": self.accepted_count,
            "fillers": self.filler_count,
            "grid": { "columns": self.columns, "rows": self.rows },
            "size": { "width": self.width, "height": self.height },
            "seek_strategy": match self.seek_strategy {
                SeekStrategy::Seek => "seek",
                SeekStrategy::NonSeek => "non_seek",
            },
            "placed": self.placed.iter().map(|shot| json!({
                "index": shot.index,
                "cell": shot.cell,
                "timestamp": shot.timestamp,
            })).collect::<Vec<_>>(),
            "skipped": self.skipped.iter().map(|sample| json!({
                "index": sample.index,
                "timestamp": sample.timestamp,
                "reason": match sample.reason {
                    SkipReason::AllBlank => "all_blank",
                    SkipReason::EndOfStream => "end_of_stream",
                },
            })).collect::<Vec<_>>(),
            "output": self.output_path.as_deref().map(path),
            "shots": self.shot_paths.iter().map(|shot| path(shot.as_path())).collect::<Vec<_>>(),
            "info": self.info_path.as_deref().map(path),
        })
    }
}

/// A per-shot image kept for [`Sheet::write`].
#[derive(Debug, Clone)]
pub struct ShotImage {
    /// Target index.
    pub index: usize,
    /// Tile as it appears on the sheet.
    pub thumbnail: Option<RgbaImage>,
    /// Accepted frame at its upright decoded size.
    pub original: Option<RgbaImage>,
}

/// A finished sheet held in memory.
#[derive(Debug, Clone)]
pub struct Sheet {
    /// The assembled raster.
    pub image: RgbaImage,
    /// Run summary (paths empty until written).
    pub summary: SheetSummary,
    /// Info block lines, reused by the sidecar.
    pub info_lines: Vec<String>,
    /// Per-shot images requested by the layout.
    pub shots: Vec<ShotImage>,
}

impl Sheet {
    /// Write the sheet, per-shot images and info sidecar.
    ///
    /// Everything is encoded before the first file is touched, and the files
    /// are committed together: on failure none of them is left on disk.
    ///
    /// # Errors
    ///
    /// - [`SheetError::OutputExists`] if any output exists and overwriting is
    ///   disabled.
    /// - [`SheetError::EncodeFailed`] if an image cannot be encoded.
    /// - [`SheetError::OutputCreate`] if an output cannot be written.
    pub fn write(self, paths: &OutputPaths, spec: &LayoutSpec) -> Result<SheetSummary, SheetError> {
        paths.check_overwrite(spec)?;

        let mut summary = self.summary;
        let mut outputs = PendingOutputs::new();

        outputs.push_image(paths.sheet.clone(), &self.image, spec.jpeg_quality)?;

        let mut shot_paths = Vec::new();
        for shot in &self.shots {
            let variants = [
                (ShotKind::Thumbnail, &shot.thumbnail),
                (ShotKind::Original, &shot.original),
            ];
            for (kind, image) in variants {
                if let Some(image) = image {
                    let path = paths.shot(shot.index, kind);
                    outputs.push_image(path.clone(), image, spec.jpeg_quality)?;
                    shot_paths.push(path);
                }
            }
        }

        if let Some(info_path) = &paths.info {
            let placed: Vec<(usize, f64)> = summary
                .placed
                .iter()
                .map(|shot| (shot.index, shot.timestamp))
                .collect();
            let text = encode::info_sidecar(&self.info_lines, &placed);
            outputs.push_bytes(info_path.clone(), text.into_bytes());
        }

        outputs.commit(spec.overwrite)?;

        summary.output_path = Some(paths.sheet.clone());
        summary.shot_paths = shot_paths;
        summary.info_path = paths.info.clone();

        log::info!(
            "Wrote sheet {} ({}x{}, {}/{} shots)",
            paths.sheet.display(),
            summary.width,
            summary.height,
            summary.accepted_count,
            summary.target_count
        );

        Ok(summary)
    }
}

/// Build a sheet in memory from `source`.
///
/// # Errors
///
/// - Scheduling errors ([`SheetError::InvalidRange`],
///   [`SheetError::InvalidLayout`]).
/// - Fatal source errors such as [`SheetError::DecodeFailed`].
/// - [`SheetError::NoUsableFrames`] if every target was skipped.
/// - [`SheetError::Cancelled`] if the run's token was cancelled.
/// - Renderer errors from the overlays.
pub fn run<S, R>(
    source: &mut S,
    spec: &LayoutSpec,
    renderer: &R,
    options: &RunOptions,
) -> Result<Sheet, SheetError>
where
    S: VideoSource + ?Sized,
    R: TextRenderer + ?Sized,
{
    let info = source.media_info().clone();
    let schedule = compute_targets(&info, spec)?;
    let strategy = SeekStrategy::resolve(spec.seek_mode, source.supports_seeking());
    let acceptor = FrameAcceptor::new(spec, strategy, info.rotation);

    log::debug!(
        "Sampling {} targets with {strategy:?} (rotation {})",
        schedule.len(),
        info.rotation
    );

    let mut tracker = ProgressTracker::new(options.progress.clone(), schedule.len() as u64);
    let mut outcomes = Vec::with_capacity(schedule.len());
    for target in &schedule.targets {
        if options.is_cancelled() {
            return Err(SheetError::Cancelled);
        }
        let outcome = acceptor.accept(source, target)?;
        let accepted_timestamp = match &outcome {
            Acceptance::Accepted(frame) => Some(frame.timestamp),
            Acceptance::Skipped { .. } => None,
        };
        tracker.advance(accepted_timestamp);
        outcomes.push(outcome);
    }

    let accepted_count = outcomes
        .iter()
        .filter(|outcome| matches!(outcome, Acceptance::Accepted(_)))
        .count();
    if accepted_count == 0 {
        return Err(SheetError::NoUsableFrames {
            targets: schedule.len(),
        });
    }

    let columns = schedule.columns;
    let rows = if !spec.fixed_grid && schedule.auto_rows {
        accepted_count.div_ceil(columns as usize) as u32
    } else {
        schedule.rows
    };

    let info_height = overlay::info_block_height(&info, spec);
    let (header, footer) = if spec.info_anchor.is_bottom() {
        (0, info_height)
    } else {
        (info_height, 0)
    };

    let geometry = GridGeometry::new(columns, rows, &info, spec, header, footer)?;
    let mut canvas = Canvas::new(geometry, spec);

    let mut placed = Vec::with_capacity(accepted_count);
    let mut skipped = Vec::new();
    let mut originals = Vec::new();
    let mut next_cell = 0usize;
    let mut filler_count = 0usize;

    for (outcome, target) in outcomes.into_iter().zip(&schedule.targets) {
        let cell = if spec.fixed_grid { target.index } else { next_cell };
        match outcome {
            Acceptance::Accepted(frame) => {
                if spec.individual.original {
                    originals.push(DynamicImage::ImageRgb8(frame.image.clone()).into_rgba8());
                }
                placed.push(PlacedShot {
                    index: frame.index,
                    cell,
                    timestamp: frame.timestamp,
                });
                canvas.place(cell, frame)?;
                next_cell += 1;
            }
            Acceptance::Skipped { index, reason } => {
                skipped.push(SkippedSample {
                    index,
                    timestamp: target.timestamp,
                    reason,
                });
                if spec.fixed_grid {
                    canvas.fill_blank(cell)?;
                    filler_count += 1;
                }
            }
        }
    }

    if spec.fixed_grid {
        for cell in schedule.len()..canvas.geometry().capacity() {
            canvas.fill_blank(cell)?;
            filler_count += 1;
        }
    }

    if spec.show_timestamps {
        for shot in &placed {
            overlay::stamp_timestamp(&mut canvas, renderer, shot.cell, shot.timestamp, spec)?;
        }
    }

    let mut shots = Vec::new();
    if spec.individual.any() {
        let mut originals = originals.into_iter();
        for shot in &placed {
            shots.push(ShotImage {
                index: shot.index,
                thumbnail: if spec.individual.thumbnail {
                    canvas.cell_image(shot.cell)
                } else {
                    None
                },
                original: originals.next(),
            });
        }
    }

    let info_lines = overlay::info_lines(&info, spec);
    if spec.show_info {
        overlay::draw_info_block(&mut canvas, renderer, &info, spec)?;
    }

    let summary = SheetSummary {
        target_count: schedule.len(),
        accepted_count,
        placed,
        skipped,
        filler_count,
        columns,
        rows,
        width: canvas.geometry().width(),
        height: canvas.geometry().height(),
        seek_strategy: strategy,
        output_path: None,
        shot_paths: Vec::new(),
        info_path: None,
    };

    if !summary.is_complete() {
        log::warn!(
            "Only {} of {} targets produced a usable frame",
            summary.accepted_count,
            summary.target_count
        );
    }

    Ok(Sheet {
        image: canvas.finalize(),
        summary,
        info_lines,
        shots,
    })
}

/// Generate a contact sheet for the media file at `path` with default run
/// options.
///
/// # Errors
///
/// See [`generate_with_options`].
///
/// # Example
///
/// ```no_run
/// use thumbsheet::{LayoutSpec, SheetError};
///
/// let summary = thumbsheet::generate("input.mp4", &LayoutSpec::new(4, 5))?;
/// println!("{} of {} shots", summary.accepted_count, summary.target_count);
/// # Ok::<(), SheetError>(())
/// ```
pub fn generate<P: AsRef<Path>>(path: P, spec: &LayoutSpec) -> Result<SheetSummary, SheetError> {
    generate_with_options(path, spec, &RunOptions::default())
}

/// Generate a contact sheet with progress reporting and cancellation.
///
/// Loads the system fonts for overlay text. Use
/// [`generate_with_renderer`] to share one renderer across many files.
///
/// # Errors
///
/// Any error from opening the file, [`run`], or [`Sheet::write`].
pub fn generate_with_options<P: AsRef<Path>>(
    path: P,
    spec: &LayoutSpec,
    options: &RunOptions,
) -> Result<SheetSummary, SheetError> {
    let renderer = SvgTextRenderer::new();
    generate_with_renderer(path, spec, &renderer, options)
}

/// Generate a contact sheet using an existing text renderer.
///
/// # Errors
///
/// Any error from opening the file, [`run`], or [`Sheet::write`]. An
/// existing sheet with overwriting disabled is reported before decoding.
pub fn generate_with_renderer<P, R>(
    path: P,
    spec: &LayoutSpec,
    renderer: &R,
    options: &RunOptions,
) -> Result<SheetSummary, SheetError>
where
    P: AsRef<Path>,
    R: TextRenderer + ?Sized,
{
    let path = path.as_ref();
    let paths = OutputPaths::derive(path, spec)?;
    paths.check_overwrite(spec)?;

    let mut source = MediaFile::open_track(path, spec.video_stream)?;
    if let Some(expression) = &spec.filters {
        source = source.with_filters(expression.clone());
    }

    log::info!("Generating sheet for {}", path.display());
    let sheet = run(&mut source, spec, renderer, options)?;
    drop(source);
    sheet.write(&paths, spec)
}
