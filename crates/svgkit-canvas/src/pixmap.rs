//! Pixel-backed raster context on top of tiny-skia.

use std::io::Write;
use std::path::Path;

use tiny_skia::{FilterQuality, Pixmap, SpreadMode};

use crate::{
    CanvasError, Color, ContextState, FillRule, LineCap, LineJoin, PaintStyle, Path2D,
    PathCommand, RasterContext, RasterImage, Transform,
};

/// A [`RasterContext`] that rasterizes into an RGBA pixmap.
///
/// Text is not rasterized: glyph rendering belongs to the host, so
/// `fill_text` only logs the request.
pub struct PixmapCanvas {
    pixmap: Pixmap,
    state: ContextState,
    state_stack: Vec<ContextState>,
    anti_alias: bool,
}

impl std::fmt::Debug for PixmapCanvas {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixmapCanvas")
            .field("width", &self.pixmap.width())
            .field("height", &self.pixmap.height())
            .field("save_depth", &self.state_stack.len())
            .finish()
    }
}

impl PixmapCanvas {
    /// Create a transparent canvas.
    pub fn new(width: u32, height: u32) -> Result<Self, CanvasError> {
        let pixmap = Pixmap::new(width, height).ok_or(CanvasError::InvalidSize(width, height))?;
        Ok(Self {
            pixmap,
            state: ContextState::default(),
            state_stack: Vec::new(),
            anti_alias: true,
        })
    }

    pub fn set_anti_alias(&mut self, anti_alias: bool) {
        self.anti_alias = anti_alias;
    }

    /// Straight-alpha RGBA color at a pixel.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        let px = self.pixmap.pixel(x, y)?.demultiply();
        Some(Color::new(
            px.red(),
            px.green(),
            px.blue(),
            px.alpha() as f32 / 255.0,
        ))
    }

    /// Straight-alpha RGBA8 bytes, row-major.
    pub fn to_rgba(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.pixmap.pixels().len() * 4);
        for px in self.pixmap.pixels() {
            let c = px.demultiply();
            out.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
        }
        out
    }

    /// Encode the surface as PNG into `writer`.
    pub fn write_png<W: Write>(&self, writer: W) -> Result<(), CanvasError> {
        let mut encoder = png::Encoder::new(writer, self.pixmap.width(), self.pixmap.height());
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);

        let mut png_writer = encoder
            .write_header()
            .map_err(|e| CanvasError::Encode(e.to_string()))?;
        png_writer
            .write_image_data(&self.to_rgba())
            .map_err(|e| CanvasError::Encode(e.to_string()))?;

        Ok(())
    }

    /// Encode the surface as PNG bytes.
    pub fn to_png(&self) -> Result<Vec<u8>, CanvasError> {
        let mut buf = Vec::new();
        self.write_png(&mut buf)?;
        Ok(buf)
    }

    /// Write the surface to a PNG file.
    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<(), CanvasError> {
        let file = std::fs::File::create(path)?;
        self.write_png(std::io::BufWriter::new(file))
    }

    fn paint_for<'a>(&self, style: &PaintStyle, tile: Option<&'a Pixmap>) -> Option<tiny_skia::Paint<'a>> {
        let alpha = self.state.global_alpha;
        let shader = match style {
            PaintStyle::Color(color) => tiny_skia::Shader::SolidColor(to_skia_color(color.with_alpha_factor(alpha))),
            PaintStyle::LinearGradient(g) => tiny_skia::LinearGradient::new(
                tiny_skia::Point::from_xy(g.x0, g.y0),
                tiny_skia::Point::from_xy(g.x1, g.y1),
                skia_stops(&g.stops, alpha),
                SpreadMode::Pad,
                tiny_skia::Transform::identity(),
            )?,
            PaintStyle::RadialGradient(g) => tiny_skia::RadialGradient::new(
                tiny_skia::Point::from_xy(g.fx, g.fy),
                tiny_skia::Point::from_xy(g.cx, g.cy),
                g.r,
                skia_stops(&g.stops, alpha),
                SpreadMode::Pad,
                tiny_skia::Transform::identity(),
            )?,
            PaintStyle::Pattern(p) => {
                let tile = tile?;
                let sx = p.width / tile.width() as f32;
                let sy = p.height / tile.height() as f32;
                tiny_skia::Pattern::new(
                    tile.as_ref(),
                    SpreadMode::Repeat,
                    FilterQuality::Bicubic,
                    alpha,
                    tiny_skia::Transform::from_row(sx, 0.0, 0.0, sy, p.x, p.y),
                )
            }
        };

        Some(tiny_skia::Paint {
            shader,
            anti_alias: self.anti_alias,
            ..Default::default()
        })
    }
}

impl RasterContext for PixmapCanvas {
    fn width(&self) -> u32 {
        self.pixmap.width()
    }

    fn height(&self) -> u32 {
        self.pixmap.height()
    }

    fn state(&self) -> &ContextState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ContextState {
        &mut self.state
    }

    fn save(&mut self) {
        self.state_stack.push(self.state.clone());
    }

    fn restore(&mut self) {
        if let Some(state) = self.state_stack.pop() {
            self.state = state;
        }
    }

    fn clear(&mut self, color: Color) {
        self.pixmap.fill(to_skia_color(color));
    }

    fn fill_path(&mut self, path: &Path2D) {
        let Some(skia_path) = to_skia_path(path) else {
            return;
        };
        let tile = pattern_tile(&self.state.fill_style);
        let Some(paint) = self.paint_for(&self.state.fill_style, tile.as_ref()) else {
            tracing::debug!("Skipping fill with degenerate paint");
            return;
        };
        let rule = match self.state.fill_rule {
            FillRule::NonZero => tiny_skia::FillRule::Winding,
            FillRule::EvenOdd => tiny_skia::FillRule::EvenOdd,
        };
        let ts = to_skia_transform(&self.state.transform);
        self.pixmap.fill_path(&skia_path, &paint, rule, ts, None);
    }

    fn stroke_path(&mut self, path: &Path2D) {
        if self.state.line_width <= 0.0 {
            return;
        }
        let Some(skia_path) = to_skia_path(path) else {
            return;
        };
        let tile = pattern_tile(&self.state.stroke_style);
        let Some(paint) = self.paint_for(&self.state.stroke_style, tile.as_ref()) else {
            tracing::debug!("Skipping stroke with degenerate paint");
            return;
        };
        let stroke = tiny_skia::Stroke {
            width: self.state.line_width,
            miter_limit: self.state.miter_limit,
            line_cap: match self.state.line_cap {
                LineCap::Butt => tiny_skia::LineCap::Butt,
                LineCap::Round => tiny_skia::LineCap::Round,
                LineCap::Square => tiny_skia::LineCap::Square,
            },
            line_join: match self.state.line_join {
                LineJoin::Miter => tiny_skia::LineJoin::Miter,
                LineJoin::Round => tiny_skia::LineJoin::Round,
                LineJoin::Bevel => tiny_skia::LineJoin::Bevel,
            },
            dash: None,
        };
        let ts = to_skia_transform(&self.state.transform);
        self.pixmap.stroke_path(&skia_path, &paint, &stroke, ts, None);
    }

    fn fill_text(&mut self, text: &str, x: f32, y: f32) {
        tracing::trace!(
            text,
            x,
            y,
            font = %self.state.font_family,
            size = self.state.font_size,
            "Text rasterization delegated to host; skipped"
        );
    }
}

// ==================== Conversions ====================

fn to_skia_color(color: Color) -> tiny_skia::Color {
    tiny_skia::Color::from_rgba8(color.r, color.g, color.b, (color.a * 255.0).round() as u8)
}

fn to_skia_transform(t: &Transform) -> tiny_skia::Transform {
    tiny_skia::Transform::from_row(t.a, t.b, t.c, t.d, t.e, t.f)
}

fn skia_stops(stops: &[crate::GradientStop], alpha: f32) -> Vec<tiny_skia::GradientStop> {
    stops
        .iter()
        .map(|s| tiny_skia::GradientStop::new(s.offset, to_skia_color(s.color.with_alpha_factor(alpha))))
        .collect()
}

fn to_skia_path(path: &Path2D) -> Option<tiny_skia::Path> {
    let mut pb = tiny_skia::PathBuilder::new();
    for cmd in path.commands() {
        match *cmd {
            PathCommand::MoveTo(x, y) => pb.move_to(x, y),
            PathCommand::LineTo(x, y) => pb.line_to(x, y),
            PathCommand::QuadraticCurveTo(cx, cy, x, y) => pb.quad_to(cx, cy, x, y),
            PathCommand::BezierCurveTo(c1x, c1y, c2x, c2y, x, y) => pb.cubic_to(c1x, c1y, c2x, c2y, x, y),
            PathCommand::ClosePath => pb.close(),
        }
    }
    pb.finish()
}

fn pattern_tile(style: &PaintStyle) -> Option<Pixmap> {
    match style {
        PaintStyle::Pattern(p) => image_to_pixmap(&p.image),
        _ => None,
    }
}

fn image_to_pixmap(image: &RasterImage) -> Option<Pixmap> {
    let mut data = Vec::with_capacity(image.data.len());
    for chunk in image.data.chunks_exact(4) {
        let a = chunk[3] as f32 / 255.0;
        data.push((chunk[0] as f32 * a).round() as u8);
        data.push((chunk[1] as f32 * a).round() as u8);
        data.push((chunk[2] as f32 * a).round() as u8);
        data.push(chunk[3]);
    }
    let size = tiny_skia::IntSize::from_wh(image.width, image.height)?;
    Pixmap::from_vec(data, size)
}
