//! # SvgKit Canvas
//!
//! 2D raster context abstraction used by the SvgKit scene renderer.
//!
//! ## Features
//!
//! - **RasterContext**: the drawing surface contract (state stack, transform, paint, fill/stroke)
//! - **CanvasRenderingContext2D**: recording context that captures draw commands
//! - **PixmapCanvas**: pixel-backed context rasterizing through tiny-skia
//! - **Path operations**: moveTo, lineTo, quadraticCurveTo, bezierCurveTo, rect, closePath
//! - **Styles**: solid colors, linear/radial gradients, image patterns, line caps and joins
//!
//! ## Architecture
//!
//! ```text
//! RasterContext
//!    ├── Context State Stack
//!    │      ├── Transform Matrix
//!    │      ├── Fill/Stroke Style
//!    │      └── Line + Font Settings
//!    ├── CanvasRenderingContext2D (DrawCommand list)
//!    └── PixmapCanvas (tiny-skia Pixmap, PNG export)
//! ```

use std::sync::Arc;
use thiserror::Error;

pub mod pixmap;

pub use pixmap::PixmapCanvas;

// ==================== Errors ====================

/// Errors that can occur in canvas operations.
#[derive(Error, Debug)]
pub enum CanvasError {
    #[error("Invalid canvas size: {0}x{1}")]
    InvalidSize(u32, u32),

    #[error("Invalid image data: expected {expected} bytes, got {actual}")]
    InvalidImageData { expected: usize, actual: usize },

    #[error("PNG encoding failed: {0}")]
    Encode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// ==================== Color ====================

/// RGBA color with 8-bit channels and a fractional alpha.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}

impl Color {
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0, a: 1.0 };
    pub const WHITE: Color = Color { r: 255, g: 255, b: 255, a: 1.0 };
    pub const TRANSPARENT: Color = Color { r: 0, g: 0, b: 0, a: 0.0 };

    pub fn new(r: u8, g: u8, b: u8, a: f32) -> Self {
        Self { r, g, b, a: a.clamp(0.0, 1.0) }
    }

    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 1.0)
    }

    /// Build from 8-bit RGBA channels.
    pub fn from_rgba8(rgba: [u8; 4]) -> Self {
        Self::new(rgba[0], rgba[1], rgba[2], rgba[3] as f32 / 255.0)
    }

    /// Parse a CSS color: named, hex, `rgb()`, `rgba()`, `hsl()`.
    pub fn parse(s: &str) -> Option<Self> {
        let parsed = csscolorparser::parse(s.trim()).ok()?;
        let [r, g, b, a] = parsed.to_rgba8();
        Some(Self::new(r, g, b, a as f32 / 255.0))
    }

    /// Same color with alpha multiplied by `factor`.
    pub fn with_alpha_factor(self, factor: f32) -> Self {
        Self {
            a: (self.a * factor).clamp(0.0, 1.0),
            ..self
        }
    }

    pub fn to_rgba8(self) -> [u8; 4] {
        [self.r, self.g, self.b, (self.a * 255.0).round() as u8]
    }
}

// ==================== Transform Matrix ====================

/// 2D affine transformation matrix.
/// Represents: [a c e]
///             [b d f]
///             [0 0 1]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    pub fn new(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Self { a, b, c, d, e, f }
    }

    /// Create identity transform.
    pub fn identity() -> Self {
        Self {
            a: 1.0, b: 0.0,
            c: 0.0, d: 1.0,
            e: 0.0, f: 0.0,
        }
    }

    /// Create translation transform.
    pub fn translate(tx: f32, ty: f32) -> Self {
        Self {
            a: 1.0, b: 0.0,
            c: 0.0, d: 1.0,
            e: tx, f: ty,
        }
    }

    /// Create scale transform.
    pub fn scale(sx: f32, sy: f32) -> Self {
        Self {
            a: sx, b: 0.0,
            c: 0.0, d: sy,
            e: 0.0, f: 0.0,
        }
    }

    /// Create rotation transform (radians).
    pub fn rotate(angle: f32) -> Self {
        let cos = angle.cos();
        let sin = angle.sin();
        Self {
            a: cos, b: sin,
            c: -sin, d: cos,
            e: 0.0, f: 0.0,
        }
    }

    /// Create horizontal skew transform (radians).
    pub fn skew_x(angle: f32) -> Self {
        Self {
            a: 1.0, b: 0.0,
            c: angle.tan(), d: 1.0,
            e: 0.0, f: 0.0,
        }
    }

    /// Create vertical skew transform (radians).
    pub fn skew_y(angle: f32) -> Self {
        Self {
            a: 1.0, b: angle.tan(),
            c: 0.0, d: 1.0,
            e: 0.0, f: 0.0,
        }
    }

    /// Multiply two transforms. The result applies `other` first, then `self`.
    pub fn multiply(&self, other: &Transform) -> Self {
        Transform {
            a: self.a * other.a + self.c * other.b,
            b: self.b * other.a + self.d * other.b,
            c: self.a * other.c + self.c * other.d,
            d: self.b * other.c + self.d * other.d,
            e: self.a * other.e + self.c * other.f + self.e,
            f: self.b * other.e + self.d * other.f + self.f,
        }
    }

    /// Transform a point.
    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    /// Get inverse transform.
    pub fn inverse(&self) -> Option<Self> {
        let det = self.a * self.d - self.b * self.c;
        if det.abs() < 1e-10 {
            return None;
        }
        let inv_det = 1.0 / det;
        Some(Transform {
            a: self.d * inv_det,
            b: -self.b * inv_det,
            c: -self.c * inv_det,
            d: self.a * inv_det,
            e: (self.c * self.f - self.d * self.e) * inv_det,
            f: (self.b * self.e - self.a * self.f) * inv_det,
        })
    }

    /// Translation component `(e, f)`.
    pub fn translation(&self) -> (f32, f32) {
        (self.e, self.f)
    }

    /// True when the 2x2 linear part is the identity.
    pub fn is_translation_only(&self) -> bool {
        self.a == 1.0 && self.b == 0.0 && self.c == 0.0 && self.d == 1.0
    }

    pub fn is_identity(&self) -> bool {
        self.is_translation_only() && self.e == 0.0 && self.f == 0.0
    }

    /// Component-wise comparison within `eps`.
    pub fn approx_eq(&self, other: &Transform, eps: f32) -> bool {
        (self.a - other.a).abs() <= eps
            && (self.b - other.b).abs() <= eps
            && (self.c - other.c).abs() <= eps
            && (self.d - other.d).abs() <= eps
            && (self.e - other.e).abs() <= eps
            && (self.f - other.f).abs() <= eps
    }
}

// ==================== Paint Style ====================

/// Fill or stroke style.
#[derive(Debug, Clone, PartialEq)]
pub enum PaintStyle {
    /// Solid color.
    Color(Color),
    /// Linear gradient.
    LinearGradient(LinearGradient),
    /// Radial gradient.
    RadialGradient(RadialGradient),
    /// Image pattern.
    Pattern(Pattern),
}

impl Default for PaintStyle {
    fn default() -> Self {
        PaintStyle::Color(Color::BLACK)
    }
}

impl PaintStyle {
    /// Get solid color if applicable.
    pub fn as_color(&self) -> Option<Color> {
        match self {
            PaintStyle::Color(c) => Some(*c),
            _ => None,
        }
    }
}

/// Linear gradient.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearGradient {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
    pub stops: Vec<GradientStop>,
}

impl LinearGradient {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            x0, y0, x1, y1,
            stops: Vec::new(),
        }
    }

    pub fn add_color_stop(&mut self, offset: f32, color: Color) {
        insert_stop(&mut self.stops, offset, color);
    }
}

/// Radial gradient: a focal point inside a circle.
#[derive(Debug, Clone, PartialEq)]
pub struct RadialGradient {
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
    pub r: f32,
    pub stops: Vec<GradientStop>,
}

impl RadialGradient {
    pub fn new(fx: f32, fy: f32, cx: f32, cy: f32, r: f32) -> Self {
        Self {
            fx, fy, cx, cy, r,
            stops: Vec::new(),
        }
    }

    pub fn add_color_stop(&mut self, offset: f32, color: Color) {
        insert_stop(&mut self.stops, offset, color);
    }
}

/// Gradient color stop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientStop {
    pub offset: f32,
    pub color: Color,
}

/// Decoded RGBA8 image (straight alpha, row-major).
#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl RasterImage {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, CanvasError> {
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(CanvasError::InvalidImageData {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { width, height, data })
    }

    /// Single-color image, mostly for tests and placeholders.
    pub fn solid(width: u32, height: u32, color: Color) -> Self {
        let px = color.to_rgba8();
        let data = px
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self { width, height, data }
    }
}

/// Pattern fill: an image tiled from a placement rectangle.
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    pub image: Arc<RasterImage>,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

// ==================== Line Style ====================

/// Line cap style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineCap {
    #[default]
    Butt,
    Round,
    Square,
}

/// Line join style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineJoin {
    #[default]
    Miter,
    Round,
    Bevel,
}

/// Fill rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillRule {
    #[default]
    NonZero,
    EvenOdd,
}

// ==================== Path ====================

/// Path command. All coordinates are absolute.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathCommand {
    MoveTo(f32, f32),
    LineTo(f32, f32),
    QuadraticCurveTo(f32, f32, f32, f32),
    BezierCurveTo(f32, f32, f32, f32, f32, f32),
    ClosePath,
}

/// A 2D path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Path2D {
    commands: Vec<PathCommand>,
    start_x: f32,
    start_y: f32,
    current_x: f32,
    current_y: f32,
}

impl Path2D {
    /// Create a new empty path.
    pub fn new() -> Self {
        Self::default()
    }

    /// Move to a point.
    pub fn move_to(&mut self, x: f32, y: f32) {
        self.commands.push(PathCommand::MoveTo(x, y));
        self.start_x = x;
        self.start_y = y;
        self.current_x = x;
        self.current_y = y;
    }

    /// Draw a line to a point.
    pub fn line_to(&mut self, x: f32, y: f32) {
        self.commands.push(PathCommand::LineTo(x, y));
        self.current_x = x;
        self.current_y = y;
    }

    /// Draw a quadratic bezier curve.
    pub fn quadratic_curve_to(&mut self, cpx: f32, cpy: f32, x: f32, y: f32) {
        self.commands.push(PathCommand::QuadraticCurveTo(cpx, cpy, x, y));
        self.current_x = x;
        self.current_y = y;
    }

    /// Draw a cubic bezier curve.
    pub fn bezier_curve_to(&mut self, cp1x: f32, cp1y: f32, cp2x: f32, cp2y: f32, x: f32, y: f32) {
        self.commands.push(PathCommand::BezierCurveTo(cp1x, cp1y, cp2x, cp2y, x, y));
        self.current_x = x;
        self.current_y = y;
    }

    /// Draw a rectangle as a closed subpath.
    pub fn rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.move_to(x, y);
        self.line_to(x + width, y);
        self.line_to(x + width, y + height);
        self.line_to(x, y + height);
        self.close_path();
    }

    /// Close the current subpath.
    pub fn close_path(&mut self) {
        self.commands.push(PathCommand::ClosePath);
        self.current_x = self.start_x;
        self.current_y = self.start_y;
    }

    /// Current pen position.
    pub fn current_point(&self) -> (f32, f32) {
        (self.current_x, self.current_y)
    }

    /// Get the commands.
    pub fn commands(&self) -> &[PathCommand] {
        &self.commands
    }

    /// Check if path is empty.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// First point of the path, if any.
    pub fn first_point(&self) -> Option<(f32, f32)> {
        self.commands.iter().find_map(|cmd| match cmd {
            PathCommand::MoveTo(x, y) => Some((*x, *y)),
            _ => None,
        })
    }

    /// Convert to polylines, flattening each curve into `curve_segments` lines.
    pub fn to_segments(&self, curve_segments: usize) -> Vec<Vec<(f32, f32)>> {
        let curve_segments = curve_segments.max(1);
        let mut segments = Vec::new();
        let mut current_segment = Vec::new();
        let mut current_x = 0.0_f32;
        let mut current_y = 0.0_f32;
        let mut start_x = 0.0_f32;
        let mut start_y = 0.0_f32;

        for cmd in &self.commands {
            match cmd {
                PathCommand::MoveTo(x, y) => {
                    if !current_segment.is_empty() {
                        segments.push(std::mem::take(&mut current_segment));
                    }
                    current_x = *x;
                    current_y = *y;
                    start_x = *x;
                    start_y = *y;
                    current_segment.push((current_x, current_y));
                }
                PathCommand::LineTo(x, y) => {
                    if current_segment.is_empty() {
                        current_segment.push((current_x, current_y));
                    }
                    current_x = *x;
                    current_y = *y;
                    current_segment.push((current_x, current_y));
                }
                PathCommand::QuadraticCurveTo(cpx, cpy, x, y) => {
                    if current_segment.is_empty() {
                        current_segment.push((current_x, current_y));
                    }
                    let points = quadratic_bezier_points(
                        (current_x, current_y),
                        (*cpx, *cpy),
                        (*x, *y),
                        curve_segments,
                    );
                    current_segment.extend(points);
                    current_x = *x;
                    current_y = *y;
                }
                PathCommand::BezierCurveTo(cp1x, cp1y, cp2x, cp2y, x, y) => {
                    if current_segment.is_empty() {
                        current_segment.push((current_x, current_y));
                    }
                    let points = cubic_bezier_points(
                        (current_x, current_y),
                        (*cp1x, *cp1y),
                        (*cp2x, *cp2y),
                        (*x, *y),
                        curve_segments,
                    );
                    current_segment.extend(points);
                    current_x = *x;
                    current_y = *y;
                }
                PathCommand::ClosePath => {
                    if !current_segment.is_empty() {
                        current_segment.push((start_x, start_y));
                        segments.push(std::mem::take(&mut current_segment));
                    }
                    current_x = start_x;
                    current_y = start_y;
                }
            }
        }

        if !current_segment.is_empty() {
            segments.push(current_segment);
        }

        segments
    }

    /// Visit every flattened point of the path in order.
    pub fn for_each_point(&self, curve_segments: usize, mut f: impl FnMut(f32, f32)) {
        for segment in self.to_segments(curve_segments) {
            for (x, y) in segment {
                f(x, y);
            }
        }
    }
}

// ==================== Context State ====================

/// Context state (for save/restore).
#[derive(Debug, Clone)]
pub struct ContextState {
    pub transform: Transform,
    pub fill_style: PaintStyle,
    pub fill_rule: FillRule,
    pub stroke_style: PaintStyle,
    pub line_width: f32,
    pub line_cap: LineCap,
    pub line_join: LineJoin,
    pub miter_limit: f32,
    pub global_alpha: f32,
    pub font_family: String,
    pub font_size: f32,
}

impl Default for ContextState {
    fn default() -> Self {
        Self {
            transform: Transform::identity(),
            fill_style: PaintStyle::Color(Color::BLACK),
            fill_rule: FillRule::NonZero,
            stroke_style: PaintStyle::Color(Color::BLACK),
            line_width: 1.0,
            line_cap: LineCap::Butt,
            line_join: LineJoin::Miter,
            miter_limit: 4.0,
            global_alpha: 1.0,
            font_family: "sans-serif".to_string(),
            font_size: 12.0,
        }
    }
}

// ==================== Raster Context ====================

/// A drawing surface of known pixel size.
///
/// Implementors own a [`ContextState`] and a save/restore stack; the
/// provided methods cover everything that only touches state.
pub trait RasterContext {
    /// Surface width in pixels.
    fn width(&self) -> u32;

    /// Surface height in pixels.
    fn height(&self) -> u32;

    fn state(&self) -> &ContextState;

    fn state_mut(&mut self) -> &mut ContextState;

    /// Push a copy of the current state.
    fn save(&mut self);

    /// Pop the last saved state. Unbalanced calls are ignored.
    fn restore(&mut self);

    /// Paint every pixel with `color`, ignoring the transform.
    fn clear(&mut self, color: Color);

    /// Fill `path` with the current fill style and rule.
    fn fill_path(&mut self, path: &Path2D);

    /// Stroke `path` with the current stroke style and line settings.
    fn stroke_path(&mut self, path: &Path2D);

    /// Draw `text` with its baseline anchored at `(x, y)`.
    fn fill_text(&mut self, text: &str, x: f32, y: f32);

    fn get_transform(&self) -> Transform {
        self.state().transform
    }

    fn set_transform(&mut self, transform: Transform) {
        self.state_mut().transform = transform;
    }

    /// Concatenate `transform` onto the current transform. Points go
    /// through `transform` first.
    fn concat_transform(&mut self, transform: &Transform) {
        let state = self.state_mut();
        state.transform = state.transform.multiply(transform);
    }

    fn set_fill_style(&mut self, style: PaintStyle) {
        self.state_mut().fill_style = style;
    }

    fn set_fill_rule(&mut self, rule: FillRule) {
        self.state_mut().fill_rule = rule;
    }

    fn set_stroke_style(&mut self, style: PaintStyle) {
        self.state_mut().stroke_style = style;
    }

    fn set_line_width(&mut self, width: f32) {
        self.state_mut().line_width = width.max(0.0);
    }

    fn set_line_cap(&mut self, cap: LineCap) {
        self.state_mut().line_cap = cap;
    }

    fn set_line_join(&mut self, join: LineJoin) {
        self.state_mut().line_join = join;
    }

    fn set_miter_limit(&mut self, limit: f32) {
        self.state_mut().miter_limit = limit.max(1.0);
    }

    fn set_global_alpha(&mut self, alpha: f32) {
        self.state_mut().global_alpha = alpha.clamp(0.0, 1.0);
    }

    fn set_font(&mut self, family: &str, size: f32) {
        let state = self.state_mut();
        state.font_family = family.to_string();
        state.font_size = size;
    }
}

// ==================== Draw Command ====================

/// A recorded drawing command.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    /// Clear the whole surface.
    Clear { color: Color },
    /// Fill a path.
    FillPath {
        segments: Vec<Vec<(f32, f32)>>,
        paint: PaintStyle,
        fill_rule: FillRule,
        alpha: f32,
        transform: Transform,
    },
    /// Stroke a path.
    StrokePath {
        segments: Vec<Vec<(f32, f32)>>,
        paint: PaintStyle,
        line_width: f32,
        line_cap: LineCap,
        line_join: LineJoin,
        alpha: f32,
        transform: Transform,
    },
    /// Fill text.
    FillText {
        text: String,
        x: f32,
        y: f32,
        paint: PaintStyle,
        font_family: String,
        font_size: f32,
        transform: Transform,
    },
}

impl DrawCommand {
    pub fn transform(&self) -> Option<Transform> {
        match self {
            DrawCommand::Clear { .. } => None,
            DrawCommand::FillPath { transform, .. }
            | DrawCommand::StrokePath { transform, .. }
            | DrawCommand::FillText { transform, .. } => Some(*transform),
        }
    }
}

// ==================== Recording Context ====================

/// Recording 2D context: every draw call becomes a [`DrawCommand`].
#[derive(Debug)]
pub struct CanvasRenderingContext2D {
    /// Canvas width.
    pub width: u32,
    /// Canvas height.
    pub height: u32,
    /// Current state.
    state: ContextState,
    /// State stack for save/restore.
    state_stack: Vec<ContextState>,
    /// Flattening precision for recorded paths.
    curve_segments: usize,
    /// Accumulated draw commands.
    commands: Vec<DrawCommand>,
}

impl CanvasRenderingContext2D {
    /// Create a new recording context.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            state: ContextState::default(),
            state_stack: Vec::new(),
            curve_segments: 16,
            commands: Vec::new(),
        }
    }

    /// Number of states currently saved.
    pub fn save_depth(&self) -> usize {
        self.state_stack.len()
    }

    /// Get draw commands without clearing.
    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }
}

impl RasterContext for CanvasRenderingContext2D {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
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
        self.commands.push(DrawCommand::Clear { color });
    }

    fn fill_path(&mut self, path: &Path2D) {
        if path.is_empty() {
            return;
        }

        self.commands.push(DrawCommand::FillPath {
            segments: path.to_segments(self.curve_segments),
            paint: self.state.fill_style.clone(),
            fill_rule: self.state.fill_rule,
            alpha: self.state.global_alpha,
            transform: self.state.transform,
        });
    }

    fn stroke_path(&mut self, path: &Path2D) {
        if path.is_empty() {
            return;
        }

        self.commands.push(DrawCommand::StrokePath {
            segments: path.to_segments(self.curve_segments),
            paint: self.state.stroke_style.clone(),
            line_width: self.state.line_width,
            line_cap: self.state.line_cap,
            line_join: self.state.line_join,
            alpha: self.state.global_alpha,
            transform: self.state.transform,
        });
    }

    fn fill_text(&mut self, text: &str, x: f32, y: f32) {
        self.commands.push(DrawCommand::FillText {
            text: text.to_string(),
            x,
            y,
            paint: self.state.fill_style.clone(),
            font_family: self.state.font_family.clone(),
            font_size: self.state.font_size,
            transform: self.state.transform,
        });
    }
}

// ==================== Helper Functions ====================

fn insert_stop(stops: &mut Vec<GradientStop>, offset: f32, color: Color) {
    let offset = offset.clamp(0.0, 1.0);
    // Stable position after any stop with an equal offset.
    let at = stops.partition_point(|s| s.offset <= offset);
    stops.insert(at, GradientStop { offset, color });
}

/// Generate points along a quadratic bezier curve.
fn quadratic_bezier_points(p0: (f32, f32), p1: (f32, f32), p2: (f32, f32), segments: usize) -> Vec<(f32, f32)> {
    let mut points = Vec::with_capacity(segments);

    for i in 1..=segments {
        let t = i as f32 / segments as f32;
        let mt = 1.0 - t;

        let x = mt * mt * p0.0 + 2.0 * mt * t * p1.0 + t * t * p2.0;
        let y = mt * mt * p0.1 + 2.0 * mt * t * p1.1 + t * t * p2.1;

        points.push((x, y));
    }

    points
}

/// Generate points along a cubic bezier curve.
fn cubic_bezier_points(p0: (f32, f32), p1: (f32, f32), p2: (f32, f32), p3: (f32, f32), segments: usize) -> Vec<(f32, f32)> {
    let mut points = Vec::with_capacity(segments);

    for i in 1..=segments {
        let t = i as f32 / segments as f32;
        let t2 = t * t;
        let t3 = t2 * t;
        let mt = 1.0 - t;
        let mt2 = mt * mt;
        let mt3 = mt2 * mt;

        let x = mt3 * p0.0 + 3.0 * mt2 * t * p1.0 + 3.0 * mt * t2 * p2.0 + t3 * p3.0;
        let y = mt3 * p0.1 + 3.0 * mt2 * t * p1.1 + 3.0 * mt * t2 * p2.1 + t3 * p3.1;

        points.push((x, y));
    }

    points
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_identity() {
        let t = Transform::identity();
        let (x, y) = t.apply(10.0, 20.0);
        assert_eq!(x, 10.0);
        assert_eq!(y, 20.0);
        assert!(t.is_identity());
    }

    #[test]
    fn test_transform_translate() {
        let t = Transform::translate(5.0, 10.0);
        let (x, y) = t.apply(10.0, 20.0);
        assert_eq!(x, 15.0);
        assert_eq!(y, 30.0);
        assert!(t.is_translation_only());
        assert_eq!(t.translation(), (5.0, 10.0));
    }

    #[test]
    fn test_transform_scale() {
        let t = Transform::scale(2.0, 3.0);
        let (x, y) = t.apply(10.0, 20.0);
        assert_eq!(x, 20.0);
        assert_eq!(y, 60.0);
    }

    #[test]
    fn test_transform_multiply_order() {
        // translate applied first, then scale
        let t = Transform::scale(2.0, 2.0).multiply(&Transform::translate(5.0, 0.0));
        assert_eq!(t.apply(1.0, 0.0), (12.0, 0.0));
    }

    #[test]
    fn test_transform_inverse() {
        let t = Transform::translate(10.0, 20.0).multiply(&Transform::rotate(0.3));
        let inv = t.inverse().unwrap();
        let composed = t.multiply(&inv);
        assert!(composed.approx_eq(&Transform::identity(), 1e-4));
    }

    #[test]
    fn test_transform_singular() {
        assert!(Transform::scale(0.0, 1.0).inverse().is_none());
    }

    #[test]
    fn test_context_save_restore() {
        let mut ctx = CanvasRenderingContext2D::new(100, 100);
        ctx.set_line_width(5.0);
        ctx.save();
        ctx.set_line_width(10.0);
        ctx.concat_transform(&Transform::translate(3.0, 4.0));
        assert_eq!(ctx.state().line_width, 10.0);
        ctx.restore();
        assert_eq!(ctx.state().line_width, 5.0);
        assert!(ctx.get_transform().is_identity());
        assert_eq!(ctx.save_depth(), 0);
    }

    #[test]
    fn test_path_rect_segments() {
        let mut path = Path2D::new();
        path.rect(0.0, 0.0, 10.0, 5.0);
        let segments = path.to_segments(8);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].len(), 5);
        assert_eq!(path.first_point(), Some((0.0, 0.0)));
    }

    #[test]
    fn test_path_curve_flattening() {
        let mut path = Path2D::new();
        path.move_to(0.0, 0.0);
        path.bezier_curve_to(0.0, 10.0, 10.0, 10.0, 10.0, 0.0);
        let segments = path.to_segments(4);
        assert_eq!(segments[0].len(), 5);
        assert_eq!(*segments[0].last().unwrap(), (10.0, 0.0));
    }

    #[test]
    fn test_fill_path_records_state() {
        let mut ctx = CanvasRenderingContext2D::new(100, 100);
        let mut path = Path2D::new();
        path.rect(1.0, 1.0, 2.0, 2.0);

        ctx.concat_transform(&Transform::scale(2.0, 2.0));
        ctx.set_fill_style(PaintStyle::Color(Color::from_rgb(255, 0, 0)));
        ctx.fill_path(&path);
        ctx.fill_path(&Path2D::new());

        assert_eq!(ctx.commands().len(), 1);
        match &ctx.commands()[0] {
            DrawCommand::FillPath { paint, transform, .. } => {
                assert_eq!(paint.as_color(), Some(Color::from_rgb(255, 0, 0)));
                assert_eq!(transform.apply(1.0, 1.0), (2.0, 2.0));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_color() {
        assert_eq!(Color::parse("#ff0000"), Some(Color::from_rgb(255, 0, 0)));
        assert_eq!(Color::parse("#f00"), Some(Color::from_rgb(255, 0, 0)));
        assert_eq!(Color::parse("red"), Some(Color::from_rgb(255, 0, 0)));
        assert_eq!(Color::parse("rgb(0, 255, 0)").map(|c| c.g), Some(255));
        assert!(Color::parse("not-a-color").is_none());
    }

    #[test]
    fn test_gradient() {
        let mut grad = LinearGradient::new(0.0, 0.0, 100.0, 0.0);
        grad.add_color_stop(1.0, Color::from_rgb(0, 0, 255));
        grad.add_color_stop(0.0, Color::from_rgb(255, 0, 0));
        grad.add_color_stop(1.0, Color::WHITE);

        let offsets: Vec<f32> = grad.stops.iter().map(|s| s.offset).collect();
        assert_eq!(offsets, vec![0.0, 1.0, 1.0]);
        assert_eq!(grad.stops[2].color, Color::WHITE);
    }

    #[test]
    fn test_raster_image_size_check() {
        assert!(RasterImage::new(2, 2, vec![0; 16]).is_ok());
        assert!(matches!(
            RasterImage::new(2, 2, vec![0; 15]),
            Err(CanvasError::InvalidImageData { expected: 16, actual: 15 })
        ));
        assert_eq!(RasterImage::solid(3, 1, Color::WHITE).data.len(), 12);
    }
}
