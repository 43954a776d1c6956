//! FFmpeg-backed [`VideoSource`].
//!
//! [`MediaFile`] opens a container, selects a video stream, caches its
//! [`MediaInfo`], and decodes RGB frames near requested timestamps using
//! either container seeks or sequential decoding.

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
};

use ffmpeg_next::{
    Rational,
    codec::context::Context as CodecContext,
    decoder::Video as VideoDecoder,
    format::{Pixel, context::Input},
    frame::Video as VideoFrame,
    media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
    util::error::EAGAIN,
};
use ffmpeg_sys_next::AVPacketSideDataType;
use image::RgbImage;

use crate::{
    conversion,
    error::SheetError,
    filter::FrameFilter,
    metadata::{AudioInfo, MediaInfo},
    source::{DecodedFrame, SeekStrategy, VideoSource},
};

/// An opened media file, ready to decode frames of one video stream.
///
/// Owns the demuxer, decoder, optional filter graph and scaler. They are
/// released on drop in the reverse order of acquisition.
///
/// # Example
///
/// ```no_run
/// use thumbsheet::{MediaFile, SeekStrategy, SheetError, VideoSource};
///
/// let mut source = MediaFile::open("input.mp4")?;
/// println!("duration: {:.1}s", source.media_info().duration);
/// let frame = source.decode_frame_near(12.0, SeekStrategy::Seek)?;
/// frame.image.save("frame.png")?;
/// # Ok::<(), SheetError>(())
/// ```
pub struct MediaFile {
    // Field order is drop order.
    scaler: Option<(ScalingContext, (Pixel, u32, u32, u32))>,
    filter: Option<FrameFilter>,
    decoder: VideoDecoder,
    input_context: Input,
    filter_expression: Option<String>,
    stream_index: usize,
    time_base: Rational,
    info: MediaInfo,
    seekable: bool,
    end_of_stream: bool,
    position: Option<f64>,
    path: PathBuf,
}

impl Debug for MediaFile {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("MediaFile")
            .field("path", &self.path)
            .field("stream_index", &self.stream_index)
            .field("info", &self.info)
            .field("seekable", &self.seekable)
            .field("filter_expression", &self.filter_expression)
            .finish_non_exhaustive()
    }
}

impl MediaFile {
    /// Open a media file and select its best video stream.
    ///
    /// # Errors
    ///
    /// - [`SheetError::NotFound`] if the path does not exist.
    /// - [`SheetError::FileOpen`] if FFmpeg cannot open or probe the file.
    /// - [`SheetError::NoVideoStream`] if the file has no video stream.
    /// - [`SheetError::CodecUnsupported`] if no decoder is available.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SheetError> {
        Self::open_track(path, None)
    }

    /// Open a media file and select the `track`-th video stream (zero-based
    /// among video streams), or the best one when `track` is `None`.
    ///
    /// # Errors
    ///
    /// Same as [`open`](MediaFile::open); an out-of-range track reports
    /// [`SheetError::NoVideoStream`].
    pub fn open_track<P: AsRef<Path>>(path: P, track: Option<usize>) -> Result<Self, SheetError> {
        let path = path.as_ref().to_path_buf();

        log::debug!("Opening media file: {}", path.display());

        if !path.exists() {
            return Err(SheetError::NotFound(path));
        }

        ffmpeg_next::init().map_err(|error| SheetError::FileOpen {
            path: path.clone(),
            reason: format!("FFmpeg initialisation failed: {error}"),
        })?;

        let input_context =
            ffmpeg_next::format::input(&path).map_err(|error| SheetError::FileOpen {
                path: path.clone(),
                reason: error.to_string(),
            })?;

        let stream = match track {
            Some(track) => input_context
                .streams()
                .filter(|stream| stream.parameters().medium() == Type::Video)
                .nth(track),
            None => input_context.streams().best(Type::Video),
        }
        .ok_or(SheetError::NoVideoStream)?;

        let stream_index = stream.index();
        let time_base = stream.time_base();
        let codec_id = stream.parameters().id();
        let rotation = stream_rotation(&stream);

        let frame_rate = {
            let average = stream.avg_frame_rate();
            if average.denominator() != 0 && average.numerator() != 0 {
                average
            } else {
                stream.rate()
            }
        };

        let stream_duration = if stream.duration() > 0 {
            conversion::pts_to_seconds(stream.duration(), time_base)
        } else {
            0.0
        };

        let decoder_context = CodecContext::from_parameters(stream.parameters())?;
        let decoder = decoder_context.decoder().video().map_err(|error| match error {
            ffmpeg_next::Error::DecoderNotFound => {
                SheetError::CodecUnsupported(codec_id.name().to_string())
            }
            other => SheetError::FileOpen {
                path: path.clone(),
                reason: format!("Failed to open video decoder: {other}"),
            },
        })?;

        let duration = if input_context.duration() > 0 {
            input_context.duration() as f64 / 1_000_000.0
        } else {
            stream_duration
        };

        let audio = input_context
            .streams()
            .best(Type::Audio)
            .and_then(|stream| {
                let context = CodecContext::from_parameters(stream.parameters()).ok()?;
                let codec = context.id().name().to_string();
                let audio = context.decoder().audio().ok()?;
                Some(AudioInfo {
                    codec,
                    sample_rate: audio.rate(),
                    channels: audio.channels(),
                })
            });

        let codec = decoder
            .codec()
            .map(|codec| codec.name().to_string())
            .unwrap_or_else(|| codec_id.name().to_string());

        // SAFETY: `input_context` owns a valid AVFormatContext.
        let bit_rate = unsafe { (*input_context.as_ptr()).bit_rate }.max(0) as u64;

        let info = MediaInfo {
            file_name: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            file_size: std::fs::metadata(&path).map(|meta| meta.len()).unwrap_or(0),
            format: input_context.format().name().to_string(),
            duration,
            frame_rate,
            width: decoder.width(),
            height: decoder.height(),
            rotation,
            sample_aspect_ratio: decoder.aspect_ratio(),
            codec,
            pixel_format: decoder
                .format()
                .descriptor()
                .map(|descriptor| descriptor.name().to_string()),
            bit_rate,
            audio,
        };

        // SAFETY: `input_context` owns a valid AVFormatContext for its whole
        // lifetime; `pb` is either null (no I/O layer) or a valid AVIOContext.
        let seekable = unsafe {
            let pb = (*input_context.as_ptr()).pb;
            !pb.is_null() && (*pb).seekable != 0
        };

        log::info!(
            "Opened media file: {} (format={}, duration={:.2}s, {}x{}, rotation={}, codec={}, seekable={})",
            path.display(),
            info.format,
            info.duration,
            info.width,
            info.height,
            info.rotation,
            info.codec,
            seekable,
        );

        Ok(Self {
            scaler: None,
            filter: None,
            decoder,
            input_context,
            filter_expression: None,
            stream_index,
            time_base,
            info,
            seekable,
            end_of_stream: false,
            position: None,
            path,
        })
    }

    /// Apply an FFmpeg filter expression (e.g. `"eq=brightness=0.1"`) to
    /// every decoded frame. The graph is built on the next decoded frame.
    pub fn with_filters(mut self, expression: impl Into<String>) -> Self {
        self.filter_expression = Some(expression.into());
        self.filter = None;
        self
    }

    /// Path the file was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Jump to the keyframe at or before `timestamp` and reset decoder state.
    ///
    /// A failed seek is logged and decoding continues from the current
    /// position.
    fn seek_to(&mut self, timestamp: f64) {
        let target = conversion::seconds_to_seek_timestamp(timestamp);
        match self.input_context.seek(target, ..target) {
            Ok(()) => {
                self.decoder.flush();
                self.end_of_stream = false;
                self.position = None;
            }
            Err(error) => {
                log::warn!(
                    "Seek to {timestamp:.3}s failed ({error}), decoding sequentially instead"
                );
            }
        }
    }

    /// Decode forward until a frame at or after `target` is produced.
    fn decode_until(&mut self, target: f64) -> Result<DecodedFrame, SheetError> {
        let frames_per_second = self.info.frames_per_second();
        let tolerance = if frames_per_second > 0.0 {
            0.5 / frames_per_second
        } else {
            0.0
        };

        let mut decoded = VideoFrame::empty();

        loop {
            while frame_received(self.decoder.receive_frame(&mut decoded))? {
                let timestamp = match decoded.timestamp().or_else(|| decoded.pts()) {
                    Some(pts) => conversion::pts_to_seconds(pts, self.time_base),
                    None => self.position.map_or(0.0, |position| {
                        position + if frames_per_second > 0.0 { 1.0 / frames_per_second } else { 0.0 }
                    }),
                };
                self.position = Some(timestamp);

                if timestamp + tolerance < target {
                    continue;
                }

                if let Some(image) = self.convert(&decoded)? {
                    return Ok(DecodedFrame { image, timestamp });
                }
            }

            if self.end_of_stream {
                return Err(SheetError::EndOfStream(target));
            }

            let mut sent = false;
            for (stream, packet) in self.input_context.packets() {
                if stream.index() != self.stream_index {
                    continue;
                }
                match self.decoder.send_packet(&packet) {
                    Ok(()) => {}
                    Err(ffmpeg_next::Error::InvalidData) => {
                        log::debug!("Skipping corrupt packet near {target:.3}s");
                    }
                    Err(error) => return Err(SheetError::DecodeFailed(error.to_string())),
                }
                sent = true;
                break;
            }

            if !sent {
                self.decoder
                    .send_eof()
                    .map_err(|error| SheetError::DecodeFailed(error.to_string()))?;
                self.end_of_stream = true;
            }
        }
    }

    /// Run the optional filter and convert to a square-pixel RGB raster.
    ///
    /// Returns `Ok(None)` while the filter graph is still buffering.
    fn convert(&mut self, decoded: &VideoFrame) -> Result<Option<RgbImage>, SheetError> {
        let mut filtered = VideoFrame::empty();
        let frame = match &self.filter_expression {
            Some(expression) => {
                if self.filter.is_none() {
                    self.filter = Some(FrameFilter::new(
                        expression,
                        decoded,
                        self.time_base,
                        self.info.sample_aspect_ratio,
                    )?);
                }
                let Some(filter) = self.filter.as_mut() else {
                    return Ok(None);
                };
                if !filter.apply(decoded, &mut filtered)? {
                    return Ok(None);
                }
                &filtered
            }
            None => decoded,
        };

        let source_width = frame.width();
        let source_height = frame.height();
        let pixel_aspect = frame_pixel_aspect(frame.aspect_ratio(), self.info.pixel_aspect());
        let width = ((source_width as f64 * pixel_aspect).round() as u32).max(1);
        let height = source_height.max(1);

        let key = (frame.format(), source_width, source_height, width);
        if self.scaler.as_ref().is_none_or(|(_, current)| *current != key) {
            let context = ScalingContext::get(
                frame.format(),
                source_width,
                source_height,
                Pixel::RGB24,
                width,
                height,
                ScalingFlags::BILINEAR,
            )?;
            self.scaler = Some((context, key));
        }

        let mut rgb_frame = VideoFrame::empty();
        if let Some((scaler, _)) = self.scaler.as_mut() {
            scaler
                .run(frame, &mut rgb_frame)
                .map_err(|error| SheetError::DecodeFailed(error.to_string()))?;
        }

        let buffer = conversion::frame_to_buffer(&rgb_frame, width, height, 3);
        let image = RgbImage::from_raw(width, height, buffer).ok_or_else(|| {
            SheetError::DecodeFailed(
                "Failed to construct RGB image from decoded frame data".to_string(),
            )
        })?;
        Ok(Some(image))
    }
}

impl VideoSource for MediaFile {
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
        if strategy == SeekStrategy::Seek {
            self.seek_to(timestamp);
        }
        let frame = self.decode_until(timestamp)?;
        log::trace!(
            "Decoded frame at {:.3}s for target {timestamp:.3}s ({strategy:?})",
            frame.timestamp
        );
        Ok(frame)
    }
}

/// Clockwise rotation of a stream, from its `rotate` tag or display matrix.
/// `true` when the decoder produced a frame, `false` when it needs more input
/// or is drained.
fn frame_received(result: Result<(), ffmpeg_next::Error>) -> Result<bool, SheetError> {
    match result {
        Ok(()) => Ok(true),
        Err(ffmpeg_next::Error::Other { errno: EAGAIN }) | Err(ffmpeg_next::Error::Eof) => Ok(false),
        Err(error) => Err(SheetError::DecodeFailed(error.to_string())),
    }
}

/// Pixel aspect of a decoded or filtered frame, falling back to the stream's
/// when the frame leaves it unset.
fn frame_pixel_aspect(frame_aspect: Rational, stream_aspect: f64) -> f64 {
    let (num, den) = (frame_aspect.numerator(), frame_aspect.denominator());
    if num > 0 && den > 0 {
        num as f64 / den as f64
    } else {
        stream_aspect
    }
}

fn stream_rotation(stream: &ffmpeg_next::format::stream::Stream<'_>) -> u32 {
    if let Some(value) = stream.metadata().get("rotate")
        && let Ok(degrees) = value.trim().parse::<f64>()
    {
        return conversion::normalize_rotation(degrees);
    }

    display_matrix(stream)
        .map(|matrix| conversion::rotation_from_display_matrix(&matrix))
        .unwrap_or(0)
}

fn display_matrix(stream: &ffmpeg_next::format::stream::Stream<'_>) -> Option<[i32; 9]> {
    let parameters = stream.parameters();
    // SAFETY: the parameters pointer is valid while `stream` is borrowed, and
    // FFmpeg guarantees a display-matrix entry holds nine i32 values.
    unsafe {
        let raw = parameters.as_ptr();
        let entry = ffmpeg_sys_next::av_packet_side_data_get(
            (*raw).coded_side_data,
            (*raw).nb_coded_side_data,
            AVPacketSideDataType::AV_PKT_DATA_DISPLAYMATRIX,
        );
        if entry.is_null() || (*entry).size < 9 * std::mem::size_of::<i32>() {
            return None;
        }
        let data = (*entry).data as *const [i32; 9];
        Some(std::ptr::read_unaligned(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_not_found() {
        let error = MediaFile::open("definitely_missing_input.mp4").unwrap_err();
        assert!(matches!(error, SheetError::NotFound(_)));
    }

    #[test]
    fn garbage_file_fails_to_open() {
        let directory = tempfile::tempdir().expect("Failed to create temp dir");
        let path = directory.path().join("garbage.mp4");
        std::fs::write(&path, b"this is not a media file").expect("Failed to write file");

        let error = MediaFile::open(&path).unwrap_err();
        assert!(
            matches!(error, SheetError::FileOpen { .. } | SheetError::NoVideoStream),
            "unexpected error: {error}"
        );
    }

    #[test]
    fn filtered_frames_keep_their_own_pixel_aspect() {
        assert_eq!(frame_pixel_aspect(Rational::new(4, 3), 1.0), 4.0 / 3.0);
        assert_eq!(frame_pixel_aspect(Rational::new(1, 1), 4.0 / 3.0), 1.0);
    }

    #[test]
    fn unset_frame_aspect_falls_back_to_stream() {
        assert_eq!(frame_pixel_aspect(Rational::new(0, 1), 4.0 / 3.0), 4.0 / 3.0);
        assert_eq!(frame_pixel_aspect(Rational::new(0, 0), 1.5), 1.5);
    }

    #[test]
    fn receive_errors_other_than_again_and_eof_are_fatal() {
        assert!(frame_received(Ok(())).unwrap());
        assert!(!frame_received(Err(ffmpeg_next::Error::Other { errno: EAGAIN })).unwrap());
        assert!(!frame_received(Err(ffmpeg_next::Error::Eof)).unwrap());
        assert!(matches!(
            frame_received(Err(ffmpeg_next::Error::InvalidData)),
            Err(SheetError::DecodeFailed(_))
        ));
    }
}
