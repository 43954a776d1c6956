//! Text rendering.
//!
//! Overlays never rasterise glyphs themselves; they go through a
//! [`TextRenderer`]. [`SvgTextRenderer`] is the default implementation: each
//! string becomes a one-line SVG document that `usvg` lays out with system
//! fonts and `resvg` rasterises, after which the pixels are alpha-blended onto
//! the sheet.

use std::sync::Arc;

use image::RgbaImage;
use resvg::tiny_skia::{Pixmap, Transform};
use usvg::fontdb::Database;

use crate::{
    configuration::{Color, TextStyle},
    error::SheetError,
};

/// Measures and draws single lines of text onto a sheet.
pub trait TextRenderer {
    /// Size in pixels `(width, height)` of `text` rendered with `style`.
    ///
    /// # Errors
    ///
    /// Returns [`SheetError::TextRenderError`] if the text cannot be laid out.
    fn measure(&self, text: &str, style: &TextStyle) -> Result<(u32, u32), SheetError>;

    /// Draw `text` with its top-left corner at `(x, y)` in `color`.
    ///
    /// Pixels outside `target` are clipped.
    ///
    /// # Errors
    ///
    /// Returns [`SheetError::TextRenderError`] if the text cannot be rendered.
    fn draw(
        &self,
        target: &mut RgbaImage,
        x: i64,
        y: i64,
        text: &str,
        style: &TextStyle,
        color: Color,
    ) -> Result<(), SheetError>;
}

impl<R: TextRenderer + ?Sized> TextRenderer for &R {
    fn measure(&self, text: &str, style: &TextStyle) -> Result<(u32, u32), SheetError> {
        (**self).measure(text, style)
    }

    fn draw(
        &self,
        target: &mut RgbaImage,
        x: i64,
        y: i64,
        text: &str,
        style: &TextStyle,
        color: Color,
    ) -> Result<(), SheetError> {
        (**self).draw(target, x, y, text, style, color)
    }
}

/// [`TextRenderer`] backed by `usvg`/`resvg` and the system font database.
///
/// Loading system fonts is slow, so build one renderer and reuse it across
/// sheets. Cloning is cheap.
///
/// # Example
///
/// ```no_run
/// use thumbsheet::{Color, SvgTextRenderer, TextRenderer, TextStyle};
///
/// let renderer = SvgTextRenderer::new();
/// let mut image = image::RgbaImage::new(200, 40);
/// renderer.draw(&mut image, 4, 4, "00:01:30", &TextStyle::timestamp(), Color::WHITE)?;
/// # Ok::<(), thumbsheet::SheetError>(())
/// ```
#[derive(Clone)]
pub struct SvgTextRenderer {
    fontdb: Arc<Database>,
}

impl std::fmt::Debug for SvgTextRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SvgTextRenderer")
            .field("faces", &self.fontdb.len())
            .finish()
    }
}

impl Default for SvgTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl SvgTextRenderer {
    /// Create a renderer using every font installed on the system.
    pub fn new() -> Self {
        let mut db = Database::new();
        db.load_system_fonts();
        log::debug!("Loaded {} system font faces", db.len());
        Self::from_database(Arc::new(db))
    }

    /// Create a renderer over a prepared font database.
    pub fn from_database(fontdb: Arc<Database>) -> Self {
        if fontdb.is_empty() {
            log::warn!("Font database is empty, overlay text will not be visible");
        }
        Self { fontdb }
    }

    fn options(&self) -> usvg::Options<'static> {
        usvg::Options {
            fontdb: Arc::clone(&self.fontdb),
            ..Default::default()
        }
    }

    /// Lay out `text` in a document wide enough never to clip it.
    fn layout(&self, text: &str, style: &TextStyle, color: Color) -> Result<usvg::Tree, SheetError> {
        let height = style.line_height().max(1);
        let width = estimated_width(text, style);
        let document = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}"><text x="0" y="{baseline}" font-family="{family}, sans-serif" font-size="{size}" fill="{fill}">{content}</text></svg>"#,
            baseline = style.size,
            family = escape_xml(&style.font_family),
            size = style.size,
            fill = color.to_hex(),
            content = escape_xml(text),
        );

        usvg::Tree::from_str(&document, &self.options())
            .map_err(|error| SheetError::TextRenderError(error.to_string()))
    }
}

impl TextRenderer for SvgTextRenderer {
    fn measure(&self, text: &str, style: &TextStyle) -> Result<(u32, u32), SheetError> {
        if text.is_empty() {
            return Ok((0, style.line_height()));
        }
        let tree = self.layout(text, style, Color::BLACK)?;
        let bounds = tree.root().abs_bounding_box();
        let width = if bounds.right().is_finite() {
            bounds.right().max(0.0).ceil() as u32
        } else {
            0
        };
        Ok((width, style.line_height()))
    }

    fn draw(
        &self,
        target: &mut RgbaImage,
        x: i64,
        y: i64,
        text: &str,
        style: &TextStyle,
        color: Color,
    ) -> Result<(), SheetError> {
        if text.is_empty() {
            return Ok(());
        }

        let tree = self.layout(text, style, color)?;
        let size = tree.size().to_int_size();
        let mut pixmap = Pixmap::new(size.width(), size.height()).ok_or_else(|| {
            SheetError::TextRenderError("failed to allocate text pixmap".to_string())
        })?;
        resvg::render(&tree, Transform::identity(), &mut pixmap.as_mut());

        blend_premultiplied(target, x, y, pixmap.width(), pixmap.height(), pixmap.data());
        Ok(())
    }
}

/// Generous upper bound on the advance of `text`, used as the SVG width.
fn estimated_width(text: &str, style: &TextStyle) -> u32 {
    ((text.chars().count() as f32 + 2.0) * style.size).ceil() as u32
}

/// Composite a premultiplied RGBA buffer over `target` at `(x, y)`.
fn blend_premultiplied(target: &mut RgbaImage, x: i64, y: i64, width: u32, height: u32, data: &[u8]) {
    let (target_width, target_height) = target.dimensions();

    for row in 0..height {
        let ty = y + row as i64;
        if ty < 0 || ty >= target_height as i64 {
            continue;
        }
        for column in 0..width {
            let tx = x + column as i64;
            if tx < 0 || tx >= target_width as i64 {
                continue;
            }

            let offset = ((row * width + column) * 4) as usize;
            let source = &data[offset..offset + 4];
            let alpha = source[3] as u32;
            if alpha == 0 {
                continue;
            }

            // Premultiplied "over", stored back as straight alpha.
            let pixel = target.get_pixel_mut(tx as u32, ty as u32);
            let source_alpha = alpha as f32 / 255.0;
            let target_weight = pixel[3] as f32 / 255.0 * (1.0 - source_alpha);
            let out_alpha = source_alpha + target_weight;
            for channel in 0..3 {
                let premultiplied =
                    source[channel] as f32 / 255.0 + pixel[channel] as f32 / 255.0 * target_weight;
                pixel[channel] = (premultiplied / out_alpha * 255.0).round().clamp(0.0, 255.0) as u8;
            }
            pixel[3] = (out_alpha * 255.0).round().clamp(0.0, 255.0) as u8;
        }
    }
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for character in text.chars() {
        match character {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}
