//! Text overlays: per-shot timestamps and the sheet's info block.
//!
//! Both go through a [`TextRenderer`]. When a style has a shadow colour, the
//! text is drawn twice: first in the shadow colour one pixel down and right,
//! then in the foreground colour at its anchor position.

use crate::{
    canvas::{Canvas, Rect},
    configuration::{Anchor, LayoutSpec, TextStyle},
    error::SheetError,
    metadata::MediaInfo,
    text::TextRenderer,
};

/// Distance between overlay text and the edge of its region.
pub const TEXT_PADDING: u32 = 4;

const MEBIBYTE: f64 = 1024.0 * 1024.0;

/// Draw `seconds` as `HH:MM:SS` inside `cell`.
///
/// # Errors
///
/// Returns [`SheetError::InvalidLayout`] if `cell` is outside the grid, or
/// any error from the renderer.
pub fn stamp_timestamp<R: TextRenderer + ?Sized>(
    canvas: &mut Canvas,
    renderer: &R,
    cell: usize,
    seconds: f64,
    spec: &LayoutSpec,
) -> Result<(), SheetError> {
    let rect = canvas
        .cell_rect(cell)
        .ok_or_else(|| SheetError::InvalidLayout(format!("cell {cell} is outside the grid")))?;
    let text = format_timestamp(seconds);
    let style = &spec.timestamp_style;
    let (width, height) = renderer.measure(&text, style)?;
    let (x, y) = anchored(rect, spec.timestamp_anchor, width, height);
    draw_with_shadow(canvas, renderer, x, y, &text, style)
}

/// Draw the info block in the header band (top anchors and `Center`) or the
/// footer band (bottom anchors). Does nothing when the band is absent.
///
/// # Errors
///
/// Propagates renderer errors.
pub fn draw_info_block<R: TextRenderer + ?Sized>(
    canvas: &mut Canvas,
    renderer: &R,
    info: &MediaInfo,
    spec: &LayoutSpec,
) -> Result<(), SheetError> {
    let band = if spec.info_anchor.is_bottom() {
        canvas.geometry().footer_rect()
    } else {
        canvas.geometry().header_rect()
    };
    let Some(band) = band else {
        return Ok(());
    };

    let style = &spec.info_style;
    let line_height = style.line_height();

    for (line_index, line) in info_lines(info, spec).iter().enumerate() {
        let (width, _) = renderer.measure(line, style)?;
        let x = horizontal(band, spec.info_anchor, width);
        let y = band.y as i64 + TEXT_PADDING as i64 + (line_index as u32 * line_height) as i64;
        draw_with_shadow(canvas, renderer, x, y, line, style)?;
    }
    Ok(())
}

/// Height of the band needed for the info block, or 0 when it is hidden.
pub fn info_block_height(info: &MediaInfo, spec: &LayoutSpec) -> u32 {
    if !spec.show_info {
        return 0;
    }
    let lines = info_lines(info, spec).len() as u32;
    lines * spec.info_style.line_height() + 2 * TEXT_PADDING
}

/// The info block, one entry per line.
///
/// ```
/// use thumbsheet::{LayoutSpec, MediaInfo, overlay::info_lines};
///
/// let mut info = MediaInfo::new(3725.0, 1920, 1080);
/// info.file_name = "holiday.mkv".to_string();
/// let lines = info_lines(&info, &LayoutSpec::default());
/// assert_eq!(lines[0], "File: holiday.mkv");
/// assert!(lines[1].contains("duration: 01:02:05"));
/// ```
pub fn info_lines(info: &MediaInfo, spec: &LayoutSpec) -> Vec<String> {
    let mut lines = Vec::with_capacity(5);

    lines.push(format!("File: {}", info.file_name));
    lines.push(format!(
        "Size: {}, duration: {}, avg.bitrate: {} kb/s",
        format_file_size(info.file_size, spec.human_file_size),
        format_timestamp(info.duration),
        info.bit_rate / 1000,
    ));

    if let Some(audio) = &info.audio {
        lines.push(format!(
            "Audio: {}, {} Hz, {} channels",
            audio.codec, audio.sample_rate, audio.channels
        ));
    }

    lines.push(format!(
        "Video: {}, {}, {}x{}, {} fps",
        info.codec,
        info.pixel_format.as_deref().unwrap_or("unknown"),
        info.width,
        info.height,
        format_frame_rate(info.frames_per_second()),
    ));

    if let Some(extra) = spec.extra_text.as_deref().filter(|text| !text.is_empty()) {
        lines.push(extra.to_string());
    }

    lines
}

/// `HH:MM:SS`, truncated to whole seconds. Negative input reads as zero.
pub fn format_timestamp(seconds: f64) -> String {
    let total = if seconds.is_finite() { seconds.max(0.0) as u64 } else { 0 };
    format!("{:02}:{:02}:{:02}", total / 3600, (total / 60) % 60, total % 60)
}

/// `HH:MM:SS.mmm`, rounded to the millisecond.
pub fn format_precise_timestamp(seconds: f64) -> String {
    let millis = if seconds.is_finite() {
        (seconds.max(0.0) * 1000.0).round() as u64
    } else {
        0
    };
    let total = millis / 1000;
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        total / 3600,
        (total / 60) % 60,
        total % 60,
        millis % 1000
    )
}

/// `<n> bytes (<x.xx> MiB)`, or only a human-readable size when `human`.
pub fn format_file_size(bytes: u64, human: bool) -> String {
    if human {
        human_size(bytes)
    } else {
        format!("{bytes} bytes ({:.2} MiB)", bytes as f64 / MEBIBYTE)
    }
}

fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{bytes} bytes");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}", UNITS[unit])
}

fn format_frame_rate(frames_per_second: f64) -> String {
    if (frames_per_second - frames_per_second.round()).abs() < 0.005 {
        format!("{}", frames_per_second.round() as u64)
    } else {
        format!("{frames_per_second:.2}")
    }
}

fn draw_with_shadow<R: TextRenderer + ?Sized>(
    canvas: &mut Canvas,
    renderer: &R,
    x: i64,
    y: i64,
    text: &str,
    style: &TextStyle,
) -> Result<(), SheetError> {
    if let Some(shadow) = style.shadow {
        renderer.draw(canvas.image_mut(), x + 1, y + 1, text, style, shadow)?;
    }
    renderer.draw(canvas.image_mut(), x, y, text, style, style.color)
}

fn horizontal(rect: Rect, anchor: Anchor, width: u32) -> i64 {
    let padding = TEXT_PADDING as i64;
    match anchor {
        Anchor::TopLeft | Anchor::BottomLeft => rect.x as i64 + padding,
        Anchor::TopRight | Anchor::BottomRight => rect.right() as i64 - padding - width as i64,
        Anchor::Center => rect.x as i64 + (rect.width as i64 - width as i64) / 2,
    }
}

fn anchored(rect: Rect, anchor: Anchor, width: u32, height: u32) -> (i64, i64) {
    let padding = TEXT_PADDING as i64;
    let y = match anchor {
        Anchor::TopLeft | Anchor::TopRight => rect.y as i64 + padding,
        Anchor::BottomLeft | Anchor::BottomRight => rect.bottom() as i64 - padding - height as i64,
        Anchor::Center => rect.y as i64 + (rect.height as i64 - height as i64) / 2,
    };
    (horizontal(rect, anchor, width), y)
}
