//! Optional FFmpeg filter graph applied to decoded frames.
//!
//! A [`FrameFilter`] wraps a `buffer → <expression> → buffersink` graph. It is
//! built lazily from the first decoded frame so the buffer source matches the
//! decoder's real output format, and it is torn down with the source.

use ffmpeg_next::{Rational, filter::Graph as FilterGraph, frame::Video as VideoFrame};
use ffmpeg_sys_next::AVPixelFormat;

use crate::error::SheetError;

/// A configured filter graph for one video stream.
pub(crate) struct FrameFilter {
    graph: FilterGraph,
    expression: String,
}

impl FrameFilter {
    /// Build a graph for `expression` whose input matches `frame`.
    ///
    /// # Errors
    ///
    /// Returns [`SheetError::FilterInitFailed`] if FFmpeg rejects the graph.
    pub(crate) fn new(
        expression: &str,
        frame: &VideoFrame,
        time_base: Rational,
        sample_aspect_ratio: Rational,
    ) -> Result<Self, SheetError> {
        let init_failed =
            |stage: &str, error: ffmpeg_next::Error| SheetError::FilterInitFailed(format!("{stage}: {error}"));

        let (aspect_num, aspect_den) = if sample_aspect_ratio.numerator() > 0
            && sample_aspect_ratio.denominator() > 0
        {
            (sample_aspect_ratio.numerator(), sample_aspect_ratio.denominator())
        } else {
            (1, 1)
        };

        let buffer_args = format!(
            "video_size={}x{}:pix_fmt={}:time_base={}/{}:pixel_aspect={}/{}",
            frame.width(),
            frame.height(),
            AVPixelFormat::from(frame.format()) as i32,
            time_base.numerator(),
            time_base.denominator(),
            aspect_num,
            aspect_den,
        );

        let mut graph = FilterGraph::new();

        let buffer = ffmpeg_next::filter::find("buffer").ok_or_else(|| {
            SheetError::FilterInitFailed("FFmpeg 'buffer' filter not found".to_string())
        })?;
        let buffersink = ffmpeg_next::filter::find("buffersink").ok_or_else(|| {
            SheetError::FilterInitFailed("FFmpeg 'buffersink' filter not found".to_string())
        })?;

        graph
            .add(&buffer, "in", &buffer_args)
            .map_err(|error| init_failed("add buffer source", error))?;
        graph
            .add(&buffersink, "out", "")
            .map_err(|error| init_failed("add buffer sink", error))?;

        graph
            .output("in", 0)
            .map_err(|error| init_failed("graph output", error))?
            .input("out", 0)
            .map_err(|error| init_failed("graph input", error))?
            .parse(expression)
            .map_err(|error| init_failed("parse", error))?;

        graph
            .validate()
            .map_err(|error| init_failed("validate", error))?;

        log::debug!("Filter graph ready: {expression}");

        Ok(Self {
            graph,
            expression: expression.to_string(),
        })
    }

    /// Push `frame` through the graph.
    ///
    /// Returns `Ok(true)` when a filtered frame was written to `output`;
    /// `Ok(false)` when the graph is still buffering.
    pub(crate) fn apply(
        &mut self,
        frame: &VideoFrame,
        output: &mut VideoFrame,
    ) -> Result<bool, SheetError> {
        self.graph
            .get("in")
            .ok_or_else(|| SheetError::DecodeFailed("filter source 'in' missing".to_string()))?
            .source()
            .add(frame)
            .map_err(|error| {
                SheetError::DecodeFailed(format!("filter '{}': {error}", self.expression))
            })?;

        let produced = self
            .graph
            .get("out")
            .ok_or_else(|| SheetError::DecodeFailed("filter sink 'out' missing".to_string()))?
            .sink()
            .frame(output)
            .is_ok();

        Ok(produced)
    }
}
