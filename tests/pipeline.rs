//! End-to-end sheet assembly against synthetic sources.
//!
//! These tests need no fixtures: frames come from [`SyntheticSource`] and
//! text goes to [`RecordingRenderer`].

mod common;

use std::sync::{Arc, Mutex};

use common::{RecordingRenderer, SyntheticSource};
use image::Rgba;
use thumbsheet::{
    Acceptance, Anchor, CancellationToken, Color, FrameAcceptor, GridGeometry, IndividualShots,
    LayoutSpec, OutputPaths, ProgressCallback, ProgressInfo, RunOptions, SampleTarget, SeekMode,
    SeekStrategy, SheetError, SkipReason, VideoSource, overlay,
};

fn options() -> RunOptions {
    RunOptions::new()
}

fn requested(source: &SyntheticSource) -> Vec<f64> {
    source.requests.iter().map(|(timestamp, _)| *timestamp).collect()
}

// ── End-to-end ───────────────────────────────────────────────────

#[test]
fn two_minute_video_three_by_two() {
    let mut source = SyntheticSource::new(120.0, 64, 36);
    let renderer = RecordingRenderer::default();
    let spec = LayoutSpec::new(3, 2).with_output_width(300).with_min_height(1);

    let sheet = thumbsheet::run(&mut source, &spec, &renderer, &options())
        .expect("Failed to build sheet");

    assert_eq!(requested(&source), vec![10.0, 30.0, 50.0, 70.0, 90.0, 110.0]);

    let summary = &sheet.summary;
    assert_eq!(summary.target_count, 6);
    assert_eq!(summary.accepted_count, 6);
    assert!(summary.is_complete());
    assert_eq!((summary.columns, summary.rows), (3, 2));
    assert_eq!(sheet.image.width(), 300);
    assert_eq!(summary.width, 300);

    let cells: Vec<usize> = summary.placed.iter().map(|shot| shot.cell).collect();
    assert_eq!(cells, vec![0, 1, 2, 3, 4, 5]);
    let indices: Vec<usize> = summary.placed.iter().map(|shot| shot.index).collect();
    assert_eq!(indices, vec![0, 1, 2, 3, 4, 5]);

    let texts = renderer.texts();
    assert!(texts.contains(&"00:00:10".to_string()));
    assert!(texts.contains(&"00:01:50".to_string()));
    assert!(texts.contains(&"File: synthetic.mp4".to_string()));
}

#[test]
fn header_band_adds_height_above_grid() {
    let spec = LayoutSpec::new(3, 2).with_output_width(300).with_min_height(1);
    let renderer = RecordingRenderer::default();

    let with_info = thumbsheet::run(
        &mut SyntheticSource::new(120.0, 64, 36),
        &spec,
        &renderer,
        &options(),
    )
    .expect("Failed to build sheet");
    let without_info = thumbsheet::run(
        &mut SyntheticSource::new(120.0, 64, 36),
        &spec.clone().with_info(false),
        &renderer,
        &options(),
    )
    .expect("Failed to build sheet");

    assert!(with_info.image.height() > without_info.image.height());
    // Two rows of 100x56 cells, no gaps.
    assert_eq!(without_info.image.height(), 112);
}

#[test]
fn summary_serialises_to_json() {
    let mut source = SyntheticSource::new(60.0, 32, 18).with_blank_window(0.0, 20.0);
    let spec = LayoutSpec::new(3, 1).with_min_height(1);
    let sheet = thumbsheet::run(&mut source, &spec, &RecordingRenderer::default(), &options())
        .expect("Failed to build sheet");

    let json = sheet.summary.to_json();
    assert_eq!(json["targets"], 3);
    assert_eq!(json["accepted"], 2);
    assert_eq!(json["skipped"][0]["reason"], "all_blank");
    assert_eq!(json["seek_strategy"], "seek");
    assert!(json["output"].is_null());
}

// ── Overlays ─────────────────────────────────────────────────────

fn is_timestamp(text: &str) -> bool {
    let bytes = text.as_bytes();
    bytes.len() == 8 && bytes[2] == b':' && bytes[5] == b':'
}

#[test]
fn info_block_is_drawn_after_every_stamp() {
    let mut source = SyntheticSource::new(120.0, 64, 36);
    let renderer = RecordingRenderer::default();
    let spec = LayoutSpec::new(3, 2).with_output_width(300).with_min_height(1);

    thumbsheet::run(&mut source, &spec, &renderer, &options()).expect("Failed to build sheet");

    let texts = renderer.texts();
    let first_info = texts
        .iter()
        .position(|text| text.starts_with("File: "))
        .expect("info block missing");
    let last_stamp = texts
        .iter()
        .rposition(|text| is_timestamp(text))
        .expect("stamps missing");
    // Six stamps, each drawn twice (shadow then foreground).
    assert_eq!(texts.iter().filter(|text| is_timestamp(text)).count(), 12);
    assert!(last_stamp < first_info);
    assert!(texts[first_info..].iter().all(|text| !is_timestamp(text)));
}

#[test]
fn center_anchor_centres_stamps_and_info_lines() {
    let mut source = SyntheticSource::new(40.0, 64, 36);
    let renderer = RecordingRenderer::default();
    let spec = LayoutSpec::new(2, 1)
        .with_output_width(200)
        .with_min_height(1)
        .with_timestamp_anchor(Anchor::Center)
        .with_info_anchor(Anchor::Center);

    let sheet =
        thumbsheet::run(&mut source, &spec, &renderer, &options()).expect("Failed to build sheet");

    let header = overlay::info_block_height(source.media_info(), &spec);
    let geometry = GridGeometry::new(2, 1, source.media_info(), &spec, header, 0)
        .expect("Failed to build geometry");
    assert_eq!(sheet.image.height(), geometry.height());

    let draws = renderer.draws.lock().expect("renderer lock poisoned").clone();

    // "00:00:10" measures 56x16 with the recording renderer.
    let cell = geometry.cell_rect(0).expect("cell 0 missing");
    let x = cell.x as i64 + (cell.width as i64 - 56) / 2;
    let y = cell.y as i64 + (cell.height as i64 - 16) / 2;
    assert_eq!(draws[0], (x + 1, y + 1, "00:00:10".to_string(), Color::BLACK));
    assert_eq!(draws[1], (x, y, "00:00:10".to_string(), Color::WHITE));

    let band = geometry.header_rect().expect("header band missing");
    let (index, (line_x, line_y, line, _)) = draws
        .iter()
        .enumerate()
        .find(|(_, (_, _, text, _))| text.starts_with("File: "))
        .expect("info block missing");
    let width = line.chars().count() as i64 * 7;
    assert_eq!(*line_x, band.x as i64 + (band.width as i64 - width) / 2);
    assert_eq!(*line_y, band.y as i64 + overlay::TEXT_PADDING as i64);
    assert_eq!(index, 4);
}

// ── Rotation ─────────────────────────────────────────────────────

#[test]
fn rotated_stream_frames_are_upright() {
    let mut source = SyntheticSource::new(30.0, 64, 36).with_rotation(90);
    let spec = LayoutSpec::default();
    let acceptor = FrameAcceptor::new(&spec, SeekStrategy::Seek, source.media_info().rotation);
    let target = SampleTarget {
        index: 0,
        timestamp: 5.0,
    };

    let outcome = acceptor.accept(&mut source, &target).expect("Failed to accept");
    let Acceptance::Accepted(frame) = outcome else {
        panic!("expected an accepted frame");
    };
    assert_eq!(frame.image.dimensions(), (36, 64));
}

#[test]
fn rotated_stream_gets_portrait_cells() {
    let mut source = SyntheticSource::new(30.0, 64, 36).with_rotation(90);
    let spec = LayoutSpec::new(3, 1)
        .with_output_width(300)
        .with_min_height(1)
        .with_info(false);

    let sheet = thumbsheet::run(&mut source, &spec, &RecordingRenderer::default(), &options())
        .expect("Failed to build sheet");

    // 100 px wide cells at 36:64.
    assert_eq!(sheet.image.height(), 178);
}

// ── Skips, compaction and fixed grids ────────────────────────────

#[test]
fn fixed_grid_fills_every_cell() {
    let mut source = SyntheticSource::new(120.0, 64, 36).with_blank_window(25.0, 40.0);
    let spec = LayoutSpec::new(3, 2).with_fixed_grid(true).with_min_height(1);

    let sheet = thumbsheet::run(&mut source, &spec, &RecordingRenderer::default(), &options())
        .expect("Failed to build sheet");

    let summary = &sheet.summary;
    assert_eq!(summary.accepted_count, 5);
    assert_eq!(summary.skipped.len(), 1);
    assert_eq!(summary.skipped[0].index, 1);
    assert_eq!(summary.skipped[0].reason, SkipReason::AllBlank);
    assert_eq!(summary.placed.len() + summary.skipped.len(), 6);
    assert_eq!((summary.columns * summary.rows) as usize, 6);

    let cells: Vec<usize> = summary.placed.iter().map(|shot| shot.cell).collect();
    assert_eq!(cells, vec![0, 2, 3, 4, 5]);
}

#[test]
fn fixed_grid_fills_cells_past_the_last_target() {
    let red = Color::rgb(255, 0, 0);
    let mut source = SyntheticSource::new(100.0, 64, 36);
    let spec = LayoutSpec::new(4, 0)
        .with_step(15.0)
        .with_fixed_grid(true)
        .with_edge(2, red)
        .with_info(false);

    let sheet = thumbsheet::run(&mut source, &spec, &RecordingRenderer::default(), &options())
        .expect("Failed to build sheet");

    let summary = &sheet.summary;
    assert_eq!(summary.target_count, 7);
    assert_eq!((summary.columns, summary.rows), (4, 2));
    assert_eq!(summary.filler_count, 1);
    assert_eq!(
        summary.placed.len() + summary.filler_count,
        (summary.columns * summary.rows) as usize
    );

    let geometry = GridGeometry::new(4, 2, source.media_info(), &spec, 0, 0)
        .expect("Failed to build geometry");
    let filler = geometry.cell_rect(7).expect("cell 7 missing");
    assert_eq!(*sheet.image.get_pixel(filler.x, filler.y), Rgba([255, 0, 0, 255]));
    assert_eq!(
        *sheet
            .image
            .get_pixel(filler.x + filler.width / 2, filler.y + filler.height / 2),
        Rgba([255, 255, 255, 255])
    );
}

#[test]
fn default_grid_compacts_skipped_samples() {
    let mut source = SyntheticSource::new(120.0, 64, 36).with_blank_window(25.0, 40.0);
    let spec = LayoutSpec::new(3, 2).with_min_height(1);

    let sheet = thumbsheet::run(&mut source, &spec, &RecordingRenderer::default(), &options())
        .expect("Failed to build sheet");

    let cells: Vec<usize> = sheet.summary.placed.iter().map(|shot| shot.cell).collect();
    assert_eq!(cells, vec![0, 1, 2, 3, 4]);
    assert_eq!(sheet.summary.rows, 2);
}

#[test]
fn auto_rows_shrink_to_accepted_frames() {
    let mut source = SyntheticSource::new(120.0, 64, 36).with_blank_window(20.0, 70.0);
    let spec = LayoutSpec::new(3, 0).with_min_height(1);

    let sheet = thumbsheet::run(&mut source, &spec, &RecordingRenderer::default(), &options())
        .expect("Failed to build sheet");

    let summary = &sheet.summary;
    assert_eq!(summary.target_count, 12);
    assert_eq!(summary.accepted_count, 8);
    assert_eq!(summary.rows, 3);
    assert!(summary.accepted_count <= (summary.columns * summary.rows) as usize);
}

#[test]
fn blank_retries_are_bounded() {
    let mut source = SyntheticSource::new(120.0, 64, 36).with_blank_window(25.0, 40.0);
    let spec = LayoutSpec::new(3, 2).with_blank_retries(3, 1.0);

    thumbsheet::run(&mut source, &spec, &RecordingRenderer::default(), &options())
        .expect("Failed to build sheet");

    let retries: Vec<f64> = requested(&source)
        .into_iter()
        .filter(|timestamp| (30.0..40.0).contains(timestamp))
        .collect();
    assert_eq!(retries, vec![30.0, 31.0, 32.0, 33.0]);
}

#[test]
fn tail_past_end_of_stream_is_skipped() {
    let mut source = SyntheticSource::new(100.0, 32, 18).with_blank_window(90.0, 100.0);
    let spec = LayoutSpec::new(2, 0).with_step(10.0).with_blank_retries(20, 0.5);

    let sheet = thumbsheet::run(&mut source, &spec, &RecordingRenderer::default(), &options())
        .expect("Failed to build sheet");

    let last = sheet.summary.skipped.last().expect("expected a skip");
    assert_eq!(last.index, 9);
    assert_eq!(last.reason, SkipReason::EndOfStream);
}

// ── Fatal errors ─────────────────────────────────────────────────

#[test]
fn empty_window_is_invalid_range_before_decoding() {
    let mut source = SyntheticSource::new(10.0, 64, 36);
    let spec = LayoutSpec::new(3, 2).with_begin(8.0).with_end(3.0);

    let error = thumbsheet::run(&mut source, &spec, &RecordingRenderer::default(), &options())
        .unwrap_err();

    assert!(matches!(error, SheetError::InvalidRange { .. }));
    assert!(source.requests.is_empty());
}

#[test]
fn all_blank_video_has_no_usable_frames() {
    let mut source = SyntheticSource::new(60.0, 32, 18).with_blank_window(0.0, 1000.0);
    let spec = LayoutSpec::new(3, 2).with_blank_retries(2, 0.5);

    let error = thumbsheet::run(&mut source, &spec, &RecordingRenderer::default(), &options())
        .unwrap_err();

    assert!(matches!(error, SheetError::NoUsableFrames { targets: 6 }));
    assert_eq!(source.requests.len(), 6 * 3);
}

#[test]
fn decode_failure_aborts_the_run() {
    let mut source = SyntheticSource::new(120.0, 32, 18).with_failure_at(50.0);
    let error = thumbsheet::run(
        &mut source,
        &LayoutSpec::new(3, 2),
        &RecordingRenderer::default(),
        &options(),
    )
    .unwrap_err();

    assert!(matches!(error, SheetError::DecodeFailed(_)));
}

// ── Seek strategy ────────────────────────────────────────────────

#[test]
fn seek_strategy_follows_container_and_override() {
    let spec = LayoutSpec::new(2, 1);
    let renderer = RecordingRenderer::default();

    let mut unseekable = SyntheticSource::new(20.0, 32, 18).with_seekable(false);
    let sheet = thumbsheet::run(&mut unseekable, &spec, &renderer, &options())
        .expect("Failed to build sheet");
    assert_eq!(sheet.summary.seek_strategy, SeekStrategy::NonSeek);
    assert!(
        unseekable
            .requests
            .iter()
            .all(|(_, strategy)| *strategy == SeekStrategy::NonSeek)
    );

    let mut forced = SyntheticSource::new(20.0, 32, 18).with_seekable(false);
    let spec = spec.with_seek_mode(SeekMode::Seek);
    thumbsheet::run(&mut forced, &spec, &renderer, &options()).expect("Failed to build sheet");
    assert!(forced.requests.iter().all(|(_, strategy)| *strategy == SeekStrategy::Seek));
}

// ── Progress & cancellation ──────────────────────────────────────

struct CountingProgress(Mutex<Vec<ProgressInfo>>);

impl ProgressCallback for CountingProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        self.0.lock().expect("lock poisoned").push(info.clone());
    }
}

#[test]
fn progress_reports_every_target() {
    let progress = Arc::new(CountingProgress(Mutex::new(Vec::new())));
    let options = RunOptions::new().with_progress(progress.clone());
    let mut source = SyntheticSource::new(120.0, 32, 18);

    thumbsheet::run(
        &mut source,
        &LayoutSpec::new(3, 2),
        &RecordingRenderer::default(),
        &options,
    )
    .expect("Failed to build sheet");

    let seen = progress.0.lock().expect("lock poisoned");
    assert_eq!(seen.len(), 6);
    assert_eq!(seen[5].current, 6);
    assert_eq!(seen[5].total, 6);
    assert!((seen[5].percentage - 100.0).abs() < f32::EPSILON);
    assert_eq!(seen[0].accepted_timestamp, Some(10.0));
}

#[test]
fn cancelled_run_decodes_nothing() {
    let token = CancellationToken::new();
    token.cancel();
    let options = RunOptions::new().with_cancellation(token);
    let mut source = SyntheticSource::new(120.0, 32, 18);

    let error = thumbsheet::run(
        &mut source,
        &LayoutSpec::new(3, 2),
        &RecordingRenderer::default(),
        &options,
    )
    .unwrap_err();

    assert!(matches!(error, SheetError::Cancelled));
    assert!(source.requests.is_empty());
}

// ── Writing outputs ──────────────────────────────────────────────

#[test]
fn writes_sheet_shots_and_sidecar() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let input = directory.path().join("clip.mp4");
    let spec = LayoutSpec::new(2, 1)
        .with_output_width(200)
        .with_min_height(1)
        .with_info_sidecar("_s.txt")
        .with_individual_shots(IndividualShots {
            thumbnail: true,
            original: true,
        });

    let mut source = SyntheticSource::new(40.0, 32, 18);
    let sheet = thumbsheet::run(&mut source, &spec, &RecordingRenderer::default(), &options())
        .expect("Failed to build sheet");
    let paths = OutputPaths::derive(&input, &spec).expect("Failed to derive paths");
    let summary = sheet.write(&paths, &spec).expect("Failed to write sheet");

    let written = image::open(&paths.sheet).expect("Failed to read sheet");
    assert_eq!(written.width(), 200);
    assert_eq!(summary.output_path.as_deref(), Some(paths.sheet.as_path()));
    assert_eq!(summary.shot_paths.len(), 4);
    assert!(summary.shot_paths.iter().all(|path| path.exists()));

    let original = image::open(directory.path().join("clip_000_full.jpg"))
        .expect("Failed to read original shot");
    assert_eq!((original.width(), original.height()), (32, 18));

    let sidecar = std::fs::read_to_string(directory.path().join("clip_s.txt"))
        .expect("Failed to read sidecar");
    let lines: Vec<&str> = sidecar.lines().collect();
    assert_eq!(lines[0], "File: synthetic.mp4");
    assert_eq!(lines[lines.len() - 2], "0\t00:00:10.000");
    assert_eq!(lines[lines.len() - 1], "1\t00:00:30.000");
}

#[test]
fn existing_sheet_is_kept_without_overwrite() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let input = directory.path().join("clip.mp4");
    let spec = LayoutSpec::new(2, 1).with_overwrite(false);
    let paths = OutputPaths::derive(&input, &spec).expect("Failed to derive paths");
    std::fs::write(&paths.sheet, b"keep me").expect("Failed to write file");

    let mut source = SyntheticSource::new(40.0, 32, 18);
    let sheet = thumbsheet::run(&mut source, &spec, &RecordingRenderer::default(), &options())
        .expect("Failed to build sheet");
    let error = sheet.write(&paths, &spec).unwrap_err();

    assert!(matches!(error, SheetError::OutputExists(_)));
    assert_eq!(std::fs::read(&paths.sheet).expect("Failed to read"), b"keep me");
}

#[test]
fn failed_write_leaves_no_partial_output() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let input = directory.path().join("clip.mp4");
    let spec = LayoutSpec::new(2, 1)
        .with_min_height(1)
        .with_info_sidecar(".txt")
        .with_individual_shots(IndividualShots {
            thumbnail: true,
            original: false,
        });
    let paths = OutputPaths::derive(&input, &spec).expect("Failed to derive paths");
    std::fs::create_dir(directory.path().join("clip_001.jpg")).expect("Failed to create dir");

    let mut source = SyntheticSource::new(40.0, 32, 18);
    let sheet = thumbsheet::run(&mut source, &spec, &RecordingRenderer::default(), &options())
        .expect("Failed to build sheet");
    let error = sheet.write(&paths, &spec).unwrap_err();

    assert!(matches!(error, SheetError::OutputCreate { .. }));
    assert!(!paths.sheet.exists());
    assert!(!directory.path().join("clip_000.jpg").exists());
    assert!(!directory.path().join("clip.txt").exists());
    let names: Vec<_> = std::fs::read_dir(directory.path())
        .expect("Failed to list temp dir")
        .map(|entry| entry.expect("Failed to read entry").file_name())
        .collect();
    assert_eq!(names, vec![std::ffi::OsString::from("clip_001.jpg")]);
}

#[test]
fn existing_shot_is_kept_without_overwrite() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let input = directory.path().join("clip.mp4");
    let spec = LayoutSpec::new(2, 1)
        .with_overwrite(false)
        .with_individual_shots(IndividualShots {
            thumbnail: true,
            original: false,
        });
    let paths = OutputPaths::derive(&input, &spec).expect("Failed to derive paths");
    let shot = paths.shot(0, thumbsheet::ShotKind::Thumbnail);
    std::fs::write(&shot, b"keep me").expect("Failed to write file");

    let mut source = SyntheticSource::new(40.0, 32, 18);
    let sheet = thumbsheet::run(&mut source, &spec, &RecordingRenderer::default(), &options())
        .expect("Failed to build sheet");
    let error = sheet.write(&paths, &spec).unwrap_err();

    assert!(matches!(error, SheetError::OutputExists(path) if path == shot));
    assert!(!paths.sheet.exists());
    assert_eq!(std::fs::read(&shot).expect("Failed to read"), b"keep me");
}
