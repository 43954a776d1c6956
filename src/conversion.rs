//! Internal conversion helpers.
//!
//! Pixel-data copying, timestamp conversion and display-matrix decoding that
//! do not belong in any single public module.

use ffmpeg_next::{Rational, frame::Video as VideoFrame};

/// Copy pixel data from an FFmpeg video frame into a tightly-packed buffer.
///
/// FFmpeg frames frequently carry per-row padding (stride > width × bpp).
/// This strips that padding so the result can be passed directly to
/// [`image::RgbImage::from_raw`].
pub(crate) fn frame_to_buffer(
    video_frame: &VideoFrame,
    width: u32,
    height: u32,
    bytes_per_pixel: usize,
) -> Vec<u8> {
    let stride = video_frame.stride(0);
    let expected_stride = (width as usize) * bytes_per_pixel;
    let data = video_frame.data(0);

    if stride == expected_stride {
        data[..expected_stride * (height as usize)].to_vec()
    } else {
        let mut buffer = Vec::with_capacity(expected_stride * (height as usize));
        for row in 0..(height as usize) {
            let row_start = row * stride;
            buffer.extend_from_slice(&data[row_start..row_start + expected_stride]);
        }
        buffer
    }
}

/// Rescale a PTS value from stream time base to seconds.
pub(crate) fn pts_to_seconds(pts: i64, time_base: Rational) -> f64 {
    pts as f64 * time_base.numerator() as f64 / time_base.denominator() as f64
}

/// Convert seconds to a container seek timestamp in AV_TIME_BASE
/// (microseconds), as expected by `avformat_seek_file` with stream index -1.
pub(crate) fn seconds_to_seek_timestamp(seconds: f64) -> i64 {
    (seconds.max(0.0) * 1_000_000.0) as i64
}

/// Snap an arbitrary clockwise angle to 0, 90, 180 or 270.
pub(crate) fn normalize_rotation(degrees: f64) -> u32 {
    if !degrees.is_finite() {
        return 0;
    }
    let quarter_turns = (degrees / 90.0).round() as i64;
    (quarter_turns.rem_euclid(4) * 90) as u32
}

/// Clockwise rotation encoded in a 3×3 16.16 fixed-point display matrix.
///
/// Mirrors `av_display_rotation_get`, negated so the result is the turn that
/// brings the frame upright.
pub(crate) fn rotation_from_display_matrix(matrix: &[i32; 9]) -> u32 {
    let fixed = |value: i32| value as f64 / 65536.0;
    let scale_x = fixed(matrix[0]).hypot(fixed(matrix[3]));
    let scale_y = fixed(matrix[1]).hypot(fixed(matrix[4]));
    if scale_x == 0.0 || scale_y == 0.0 {
        return 0;
    }
    let radians = (fixed(matrix[1]) / scale_y).atan2(fixed(matrix[0]) / scale_x);
    normalize_rotation(radians.to_degrees())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE: i32 = 1 << 16;

    #[test]
    fn normalizes_rotation_angles() {
        assert_eq!(normalize_rotation(0.0), 0);
        assert_eq!(normalize_rotation(-90.0), 270);
        assert_eq!(normalize_rotation(89.6), 90);
        assert_eq!(normalize_rotation(450.0), 90);
        assert_eq!(normalize_rotation(f64::NAN), 0);
    }

    #[test]
    fn decodes_display_matrices() {
        let identity = [ONE, 0, 0, 0, ONE, 0, 0, 0, 1 << 30];
        assert_eq!(rotation_from_display_matrix(&identity), 0);

        let portrait = [0, ONE, 0, -ONE, 0, 0, 0, 0, 1 << 30];
        assert_eq!(rotation_from_display_matrix(&portrait), 90);

        let upside_down = [-ONE, 0, 0, 0, -ONE, 0, 0, 0, 1 << 30];
        assert_eq!(rotation_from_display_matrix(&upside_down), 180);

        assert_eq!(rotation_from_display_matrix(&[0; 9]), 0);
    }

    #[test]
    fn converts_timestamps() {
        assert_eq!(seconds_to_seek_timestamp(1.5), 1_500_000);
        assert_eq!(seconds_to_seek_timestamp(-3.0), 0);
        assert_eq!(pts_to_seconds(90_000, Rational::new(1, 90_000)), 1.0);
    }
}
