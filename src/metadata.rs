//! Media metadata types.
//!
//! [`MediaInfo`] describes the selected video stream of an opened file. It is
//! probed once by the [`VideoSource`](crate::VideoSource) and is read-only to
//! the sampling and assembly engine.

use ffmpeg_next::Rational;

/// Metadata for the video stream a sheet is built from.
///
/// Geometry fields (`width`, `height`) are the *coded* dimensions reported by
/// the decoder. Use [`display_width`](MediaInfo::display_width) and
/// [`display_height`](MediaInfo::display_height) for the upright, square-pixel
/// size the frames are shown at.
///
/// # Example
///
/// ```no_run
/// use thumbsheet::{MediaFile, VideoSource};
///
/// let source = MediaFile::open("input.mp4").unwrap();
/// let info = source.media_info();
/// println!("{}x{} rotated {}°", info.width, info.height, info.rotation);
/// ```
#[derive(Debug, Clone)]
#[must_use]
pub struct MediaInfo {
    /// File name (without directory) used in the info block.
    pub file_name: String,
    /// Size of the input file in bytes.
    pub file_size: u64,
    /// Container format name (e.g. `"mov,mp4,m4a,3gp,3g2,mj2"`).
    pub format: String,
    /// Total duration in seconds.
    pub duration: f64,
    /// Average frame rate of the stream.
    pub frame_rate: Rational,
    /// Coded frame width in pixels.
    pub width: u32,
    /// Coded frame height in pixels.
    pub height: u32,
    /// Clockwise rotation needed to show the frame upright: 0, 90, 180 or 270.
    pub rotation: u32,
    /// Sample (pixel) aspect ratio. `0/1` or `1/1` mean square pixels.
    pub sample_aspect_ratio: Rational,
    /// Video codec name (e.g. `"h264"`).
    pub codec: String,
    /// Decoder pixel format name, if known.
    pub pixel_format: Option<String>,
    /// Container bit rate in bits per second (0 if unknown).
    pub bit_rate: u64,
    /// Description of the best audio stream, if the file has one.
    pub audio: Option<AudioInfo>,
}

/// Short description of an audio stream, shown in the info block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioInfo {
    /// Codec name (e.g. `"aac"`).
    pub codec: String,
    /// Sample rate in hertz.
    pub sample_rate: u32,
    /// Number of channels.
    pub channels: u16,
}

impl MediaInfo {
    /// Minimal metadata for a stream of the given duration and coded size.
    ///
    /// Descriptive fields are left empty; the frame rate defaults to 25 fps.
    pub fn new(duration: f64, width: u32, height: u32) -> Self {
        Self {
            file_name: String::new(),
            file_size: 0,
            format: String::new(),
            duration,
            frame_rate: Rational::new(25, 1),
            width,
            height,
            rotation: 0,
            sample_aspect_ratio: Rational::new(1, 1),
            codec: String::new(),
            pixel_format: None,
            bit_rate: 0,
            audio: None,
        }
    }

    /// Frames per second as a float (0.0 when the rate is unknown).
    pub fn frames_per_second(&self) -> f64 {
        if self.frame_rate.denominator() == 0 {
            0.0
        } else {
            self.frame_rate.numerator() as f64 / self.frame_rate.denominator() as f64
        }
    }

    /// Sample aspect ratio as a float, treating unknown values as square.
    pub fn pixel_aspect(&self) -> f64 {
        let num = self.sample_aspect_ratio.numerator();
        let den = self.sample_aspect_ratio.denominator();
        if num <= 0 || den <= 0 {
            1.0
        } else {
            num as f64 / den as f64
        }
    }

    /// `true` when the stream must be turned a quarter turn to be upright.
    pub fn is_quarter_turn(&self) -> bool {
        self.rotation == 90 || self.rotation == 270
    }

    /// Upright width in square pixels.
    pub fn display_width(&self) -> u32 {
        let (width, height) = self.square_pixel_size();
        if self.is_quarter_turn() { height } else { width }
    }

    /// Upright height in square pixels.
    pub fn display_height(&self) -> u32 {
        let (width, height) = self.square_pixel_size();
        if self.is_quarter_turn() { width } else { height }
    }

    /// Upright display aspect ratio (width / height).
    pub fn display_aspect_ratio(&self) -> f64 {
        let height = self.display_height();
        if height == 0 {
            return 1.0;
        }
        self.display_width() as f64 / height as f64
    }

    /// Coded size with the sample aspect ratio applied to the width.
    fn square_pixel_size(&self) -> (u32, u32) {
        let width = (self.width as f64 * self.pixel_aspect()).round() as u32;
        (width.max(1), self.height.max(1))
    }
}
