//! Sheet assembly.
//!
//! [`GridGeometry`] resolves where every cell, the header band and the footer
//! band live on the output raster. [`Canvas`] owns that raster, fits accepted
//! frames into their cells, and decorates tiles with edges and drop shadows.
//!
//! Column boundaries are computed by integer division of the available width,
//! so the remainder is spread one pixel at a time over the columns and the
//! sheet is always exactly the requested width.

use image::{
    DynamicImage, Pixel, Rgba, RgbaImage, RgbImage,
    imageops::{self, FilterType},
};

use crate::{
    acceptor::AcceptedFrame,
    configuration::{FitPolicy, LayoutSpec},
    error::SheetError,
    metadata::MediaInfo,
};

/// Shadow colour blended beneath tiles.
const TILE_SHADOW: Rgba<u8> = Rgba([0, 0, 0, 96]);

/// An axis-aligned pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Exclusive right edge.
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }
}

/// Resolved layout of one sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct GridGeometry {
    columns: u32,
    rows: u32,
    column_offsets: Vec<u32>,
    column_widths: Vec<u32>,
    cell_height: u32,
    gap: u32,
    margin: u32,
    header_height: u32,
    footer_height: u32,
    width: u32,
    height: u32,
}

impl GridGeometry {
    /// Resolve the geometry for a `columns` × `rows` grid.
    ///
    /// `header` and `footer` are the heights of the info bands above and
    /// below the grid (0 when absent).
    ///
    /// # Errors
    ///
    /// Returns [`SheetError::InvalidLayout`] if the grid is empty or the
    /// output width leaves no room for the cells.
    pub fn new(
        columns: u32,
        rows: u32,
        info: &MediaInfo,
        spec: &LayoutSpec,
        header: u32,
        footer: u32,
    ) -> Result<Self, SheetError> {
        if columns == 0 || rows == 0 {
            return Err(SheetError::InvalidLayout(format!(
                "grid {columns}x{rows} has no cells"
            )));
        }

        let width = if spec.output_width == 0 {
            columns.saturating_mul(info.display_width())
        } else {
            spec.output_width
        };

        let chrome = 2 * spec.margin + (columns + 1) * spec.gap;
        if width <= chrome || width - chrome < columns {
            return Err(SheetError::InvalidLayout(format!(
                "output width {width} leaves no room for {columns} columns"
            )));
        }
        let available = width - chrome;

        let boundary = |column: u32| (available as u64 * column as u64 / columns as u64) as u32;
        let column_offsets: Vec<u32> = (0..columns)
            .map(|column| spec.margin + spec.gap * (column + 1) + boundary(column))
            .collect();
        let column_widths: Vec<u32> = (0..columns)
            .map(|column| boundary(column + 1) - boundary(column))
            .collect();

        let aspect = spec
            .aspect_ratio
            .filter(|ratio| ratio.is_finite() && *ratio > 0.0)
            .unwrap_or_else(|| info.display_aspect_ratio());
        let base_width = available / columns;
        let cell_height = ((base_width as f64 / aspect).round() as u32)
            .max(spec.min_height)
            .max(1);

        let height = 2 * spec.margin
            + header
            + footer
            + rows * cell_height
            + (rows + 1) * spec.gap;

        log::debug!(
            "Grid {columns}x{rows}: sheet {width}x{height}, cell {base_width}x{cell_height}, header {header}, footer {footer}"
        );

        Ok(Self {
            columns,
            rows,
            column_offsets,
            column_widths,
            cell_height,
            gap: spec.gap,
            margin: spec.margin,
            header_height: header,
            footer_height: footer,
            width,
            height,
        })
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    /// Number of cells.
    pub fn capacity(&self) -> usize {
        self.columns as usize * self.rows as usize
    }

    /// Sheet width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Sheet height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Height of every cell.
    pub fn cell_height(&self) -> u32 {
        self.cell_height
    }

    /// Rectangle of the cell at row-major `index`, or `None` past the grid.
    pub fn cell_rect(&self, index: usize) -> Option<Rect> {
        if index >= self.capacity() {
            return None;
        }
        let row = (index / self.columns as usize) as u32;
        let column = index % self.columns as usize;
        let y = self.margin + self.header_height + self.gap + row * (self.cell_height + self.gap);
        Some(Rect::new(
            self.column_offsets[column],
            y,
            self.column_widths[column],
            self.cell_height,
        ))
    }

    /// The band above the grid, if any.
    pub fn header_rect(&self) -> Option<Rect> {
        (self.header_height > 0).then(|| {
            Rect::new(
                self.margin,
                self.margin,
                self.width - 2 * self.margin,
                self.header_height,
            )
        })
    }

    /// The band below the grid, if any.
    pub fn footer_rect(&self) -> Option<Rect> {
        (self.footer_height > 0).then(|| {
            Rect::new(
                self.margin,
                self.height - self.margin - self.footer_height,
                self.width - 2 * self.margin,
                self.footer_height,
            )
        })
    }
}

/// The output raster being assembled.
pub struct Canvas {
    image: RgbaImage,
    geometry: GridGeometry,
    background: Rgba<u8>,
    fit: FitPolicy,
    aspect_override: bool,
    edge: u32,
    edge_color: Rgba<u8>,
    tile_shadow: u32,
}

impl std::fmt::Debug for Canvas {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Canvas")
            .field("geometry", &self.geometry)
            .field("fit", &self.fit)
            .finish_non_exhaustive()
    }
}

impl Canvas {
    /// Allocate a sheet filled with the background colour.
    pub fn new(geometry: GridGeometry, spec: &LayoutSpec) -> Self {
        let alpha = if spec.transparent_background { 0 } else { 255 };
        let background = Rgba([
            spec.background.r,
            spec.background.g,
            spec.background.b,
            alpha,
        ]);
        let image = RgbaImage::from_pixel(geometry.width(), geometry.height(), background);
        let edge_color = Rgba([spec.edge_color.r, spec.edge_color.g, spec.edge_color.b, 255]);

        Self {
            image,
            geometry,
            background,
            fit: spec.fit,
            aspect_override: spec.aspect_ratio.is_some(),
            edge: spec.edge,
            edge_color,
            tile_shadow: spec.tile_shadow,
        }
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    /// Rectangle of a cell.
    pub fn cell_rect(&self, cell: usize) -> Option<Rect> {
        self.geometry.cell_rect(cell)
    }

    pub(crate) fn image_mut(&mut self) -> &mut RgbaImage {
        &mut self.image
    }

    /// Fit `frame` into `cell` and blit it. The raster is dropped afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`SheetError::InvalidLayout`] if `cell` is outside the grid.
    pub fn place(&mut self, cell: usize, frame: AcceptedFrame) -> Result<Rect, SheetError> {
        let rect = self.checked_cell(cell)?;
        let tile = self.fit_frame(&frame.image, rect.width, rect.height);
        self.draw_shadow(rect);
        imageops::replace(&mut self.image, &tile, rect.x as i64, rect.y as i64);
        self.draw_edge(rect);
        Ok(rect)
    }

    /// Paint `cell` as a blank filler tile.
    ///
    /// # Errors
    ///
    /// Returns [`SheetError::InvalidLayout`] if `cell` is outside the grid.
    pub fn fill_blank(&mut self, cell: usize) -> Result<Rect, SheetError> {
        let rect = self.checked_cell(cell)?;
        self.draw_shadow(rect);
        self.fill_rect(rect, self.background);
        self.draw_edge(rect);
        Ok(rect)
    }

    /// Copy of the pixels currently in `cell`.
    pub fn cell_image(&self, cell: usize) -> Option<RgbaImage> {
        let rect = self.cell_rect(cell)?;
        Some(imageops::crop_imm(&self.image, rect.x, rect.y, rect.width, rect.height).to_image())
    }

    /// Finish the sheet and hand over the raster.
    pub fn finalize(self) -> RgbaImage {
        self.image
    }

    /// Scale `frame` to exactly `width` × `height` following the fit policy.
    pub fn fit_frame(&self, frame: &RgbImage, width: u32, height: u32) -> RgbaImage {
        let source = DynamicImage::ImageRgb8(frame.clone()).into_rgba8();
        let (frame_width, frame_height) = source.dimensions();
        if frame_width == 0 || frame_height == 0 {
            return RgbaImage::from_pixel(width, height, self.background);
        }

        let scale_x = width as f64 / frame_width as f64;
        let scale_y = height as f64 / frame_height as f64;

        let scaled = |scale: f64| {
            (
                ((frame_width as f64 * scale).round() as u32).max(1),
                ((frame_height as f64 * scale).round() as u32).max(1),
            )
        };

        match self.fit {
            FitPolicy::Stretch => imageops::resize(&source, width, height, FilterType::Triangle),
            FitPolicy::Letterbox => {
                let (fit_width, fit_height) = scaled(scale_x.min(scale_y));
                let (fit_width, fit_height) = (fit_width.min(width), fit_height.min(height));
                // Frames whose aspect already matches the cell are stretched
                // to avoid one-pixel slivers of padding.
                if !self.aspect_override
                    && width - fit_width <= 1
                    && height - fit_height <= 1
                {
                    return imageops::resize(&source, width, height, FilterType::Triangle);
                }
                let resized = imageops::resize(&source, fit_width, fit_height, FilterType::Triangle);
                let mut tile = RgbaImage::from_pixel(width, height, self.background);
                imageops::replace(
                    &mut tile,
                    &resized,
                    ((width - fit_width) / 2) as i64,
                    ((height - fit_height) / 2) as i64,
                );
                tile
            }
            FitPolicy::Crop => {
                let (fill_width, fill_height) = scaled(scale_x.max(scale_y));
                let (fill_width, fill_height) = (fill_width.max(width), fill_height.max(height));
                let resized = imageops::resize(&source, fill_width, fill_height, FilterType::Triangle);
                imageops::crop_imm(
                    &resized,
                    (fill_width - width) / 2,
                    (fill_height - height) / 2,
                    width,
                    height,
                )
                .to_image()
            }
        }
    }

    fn checked_cell(&self, cell: usize) -> Result<Rect, SheetError> {
        self.cell_rect(cell).ok_or_else(|| {
            SheetError::InvalidLayout(format!(
                "cell {cell} is outside the {}x{} grid",
                self.geometry.columns(),
                self.geometry.rows()
            ))
        })
    }

    fn fill_rect(&mut self, rect: Rect, color: Rgba<u8>) {
        let right = rect.right().min(self.image.width());
        let bottom = rect.bottom().min(self.image.height());
        for y in rect.y..bottom {
            for x in rect.x..right {
                self.image.put_pixel(x, y, color);
            }
        }
    }

    fn draw_shadow(&mut self, rect: Rect) {
        if self.tile_shadow == 0 {
            return;
        }
        let shadow = Rect::new(
            rect.x + self.tile_shadow,
            rect.y + self.tile_shadow,
            rect.width,
            rect.height,
        );
        let right = shadow.right().min(self.image.width());
        let bottom = shadow.bottom().min(self.image.height());
        for y in shadow.y..bottom {
            for x in shadow.x..right {
                self.image.get_pixel_mut(x, y).blend(&TILE_SHADOW);
            }
        }
    }

    fn draw_edge(&mut self, rect: Rect) {
        let edge = self.edge.min(rect.width / 2).min(rect.height / 2);
        if edge == 0 {
            return;
        }
        let color = self.edge_color;
        self.fill_rect(Rect::new(rect.x, rect.y, rect.width, edge), color);
        self.fill_rect(
            Rect::new(rect.x, rect.bottom() - edge, rect.width, edge),
            color,
        );
        self.fill_rect(Rect::new(rect.x, rect.y, edge, rect.height), color);
        self.fill_rect(
            Rect::new(rect.right() - edge, rect.y, edge, rect.height),
            color,
        );
    }
}
