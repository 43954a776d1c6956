//! Synthetic collaborators shared by the integration tests.

#![allow(dead_code)]

use std::sync::Mutex;

use image::{Rgb, RgbImage, RgbaImage};
use thumbsheet::{
    Color, DecodedFrame, MediaInfo, SeekStrategy, SheetError, TextRenderer, TextStyle, VideoSource,
};

/// A video whose frames are gradients, optionally blank inside some windows.
pub struct SyntheticSource {
    info: MediaInfo,
    seekable: bool,
    blank_windows: Vec<(f64, f64)>,
    failure_at: Option<f64>,
    pub requests: Vec<(f64, SeekStrategy)>,
}

impl SyntheticSource {
    pub fn new(duration: f64, width: u32, height: u32) -> Self {
        let mut info = MediaInfo::new(duration, width, height);
        info.file_name = "synthetic.mp4".to_string();
        info.file_size = 10 * 1024 * 1024;
        info.codec = "h264".to_string();
        info.pixel_format = Some("yuv420p".to_string());
        info.bit_rate = 1_200_000;
        Self {
            info,
            seekable: true,
            blank_windows: Vec::new(),
            failure_at: None,
            requests: Vec::new(),
        }
    }

    pub fn with_rotation(mut self, rotation: u32) -> Self {
        self.info.rotation = rotation;
        self
    }

    pub fn with_seekable(mut self, seekable: bool) -> Self {
        self.seekable = seekable;
        self
    }

    /// Frames in `[start, end)` are solid black.
    pub fn with_blank_window(mut self, start: f64, end: f64) -> Self {
        self.blank_windows.push((start, end));
        self
    }

    /// Decoding at or after `timestamp` fails fatally.
    pub fn with_failure_at(mut self, timestamp: f64) -> Self {
        self.failure_at = Some(timestamp);
        self
    }

    fn is_blank(&self, timestamp: f64) -> bool {
        self.blank_windows
            .iter()
            .any(|(start, end)| timestamp >= *start && timestamp < *end)
    }
}

impl VideoSource for SyntheticSource {
    fn media_info(&self) -> &MediaInfo {
        &self.info
    }

    fn supports_seeking(&self) -> bool {
        self.seekable
    }

    fn decode_frame_near(
        &mut self,
        timestamp: f64,
        strategy: SeekStrategy,
    ) -> Result<DecodedFrame, SheetError> {
        self.requests.push((timestamp, strategy));

        if self.failure_at.is_some_and(|failure| timestamp >= failure) {
            return Err(SheetError::DecodeFailed("synthetic corruption".to_string()));
        }
        if timestamp >= self.info.duration {
            return Err(SheetError::EndOfStream(timestamp));
        }

        let (width, height) = (self.info.width, self.info.height);
        let image = if self.is_blank(timestamp) {
            RgbImage::from_pixel(width, height, Rgb([0, 0, 0]))
        } else {
            RgbImage::from_fn(width, height, |x, y| {
                let value = ((x + y) * 255 / (width + height).max(1)) as u8;
                Rgb([value, value / 2, 255 - value])
            })
        };
        Ok(DecodedFrame { image, timestamp })
    }
}

/// A renderer that records draw calls instead of rasterising glyphs.
#[derive(Default)]
pub struct RecordingRenderer {
    pub draws: Mutex<Vec<(i64, i64, String, Color)>>,
}

impl RecordingRenderer {
    pub fn texts(&self) -> Vec<String> {
        self.draws
            .lock()
            .expect("renderer lock poisoned")
            .iter()
            .map(|(_, _, text, _)| text.clone())
            .collect()
    }
}

impl TextRenderer for RecordingRenderer {
    fn measure(&self, text: &str, style: &TextStyle) -> Result<(u32, u32), SheetError> {
        Ok((text.chars().count() as u32 * 7, style.line_height()))
    }

    fn draw(
        &self,
        _target: &mut RgbaImage,
        x: i64,
        y: i64,
        text: &str,
        _style: &TextStyle,
        color: Color,
    ) -> Result<(), SheetError> {
        self.draws
            .lock()
            .expect("renderer lock poisoned")
            .push((x, y, text.to_string(), color));
        Ok(())
    }
}
