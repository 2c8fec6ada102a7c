//! Path data (`d` attribute) and basic-shape geometry.

use std::f32::consts::PI;

use svgkit_canvas::Path2D;

use crate::SvgError;

/// Cubic control-point distance for a quarter circle of radius 1.
const KAPPA: f32 = 0.552_284_8;

// ==================== Path Data ====================

/// One path-data operation with its coordinates as written.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathOp {
    Move(f32, f32),
    Line(f32, f32),
    Horizontal(f32),
    Vertical(f32),
    Cubic(f32, f32, f32, f32, f32, f32),
    SmoothCubic(f32, f32, f32, f32),
    Quad(f32, f32, f32, f32),
    SmoothQuad(f32, f32),
    Arc {
        rx: f32,
        ry: f32,
        rotation: f32,
        large_arc: bool,
        sweep: bool,
        x: f32,
        y: f32,
    },
    Close,
}

/// An operation plus whether its coordinates are absolute.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathSegment {
    pub absolute: bool,
    pub op: PathOp,
}

/// Parsed path data. On a syntax error everything before the error is
/// kept, matching how SVG renders broken paths.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedPath {
    pub segments: Vec<PathSegment>,
    pub error: Option<SvgError>,
}

impl ParsedPath {
    /// Absolute geometry with smooth curves reflected and arcs turned
    /// into cubics.
    pub fn to_path2d(&self) -> Path2D {
        to_path2d(&self.segments)
    }
}

/// Parse a `d` attribute.
pub fn parse_path_data(d: &str) -> ParsedPath {
    let mut cursor = Cursor::new(d);
    let mut segments = Vec::new();
    let mut command: Option<u8> = None;

    let error = loop {
        cursor.skip_separators();
        let Some(c) = cursor.peek() else {
            break None;
        };

        let letter = if c.is_ascii_alphabetic() {
            cursor.bump();
            if segments.is_empty() && !matches!(c, b'M' | b'm') {
                break Some(format!("path must start with a moveto, found '{}'", c as char));
            }
            if matches!(c, b'Z' | b'z') {
                segments.push(PathSegment {
                    absolute: c == b'Z',
                    op: PathOp::Close,
                });
                command = None;
                continue;
            }
            c
        } else {
            match command {
                Some(c) => c,
                None => break Some(format!("expected a command at offset {}", cursor.pos)),
            }
        };

        let start = cursor.pos;
        let upper = letter.to_ascii_uppercase();
        let Some(op) = parse_arguments(upper, &mut cursor) else {
            break Some(if b"MLHVCSQTA".contains(&upper) {
                format!("bad arguments for '{}' at offset {start}", letter as char)
            } else {
                format!("unknown command '{}'", letter as char)
            });
        };
        segments.push(PathSegment {
            absolute: letter.is_ascii_uppercase(),
            op,
        });

        // Coordinates after a moveto are implicit linetos.
        command = Some(match letter {
            b'M' => b'L',
            b'm' => b'l',
            other => other,
        });
    };

    ParsedPath {
        segments,
        error: error.map(SvgError::InvalidPath),
    }
}

fn parse_arguments(command: u8, cursor: &mut Cursor<'_>) -> Option<PathOp> {
    if command == b'A' {
        let rx = cursor.number()?;
        let ry = cursor.number()?;
        let rotation = cursor.number()?;
        let large_arc = cursor.flag()?;
        let sweep = cursor.flag()?;
        let x = cursor.number()?;
        let y = cursor.number()?;
        return Some(PathOp::Arc { rx, ry, rotation, large_arc, sweep, x, y });
    }

    let mut n = || cursor.number();
    Some(match command {
        b'M' => PathOp::Move(n()?, n()?),
        b'L' => PathOp::Line(n()?, n()?),
        b'H' => PathOp::Horizontal(n()?),
        b'V' => PathOp::Vertical(n()?),
        b'C' => PathOp::Cubic(n()?, n()?, n()?, n()?, n()?, n()?),
        b'S' => PathOp::SmoothCubic(n()?, n()?, n()?, n()?),
        b'Q' => PathOp::Quad(n()?, n()?, n()?, n()?),
        b'T' => PathOp::SmoothQuad(n()?, n()?),
        _ => return None,
    })
}

/// Byte cursor over path data. Every successful read consumes input, so
/// the parse loop always makes progress.
struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(s: &'a str) -> Self {
        Self {
            bytes: s.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) {
        self.pos += 1;
    }

    fn skip_separators(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r' | b',')) {
            self.pos += 1;
        }
    }

    fn skip_digits(&mut self) -> usize {
        let start = self.pos;
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
        self.pos - start
    }

    /// Read one number. Leaves the cursor untouched when there is none.
    fn number(&mut self) -> Option<f32> {
        self.skip_separators();
        let start = self.pos;

        if matches!(self.peek(), Some(b'+' | b'-')) {
            self.pos += 1;
        }
        let mut digits = self.skip_digits();
        if self.peek() == Some(b'.') {
            self.pos += 1;
            digits += self.skip_digits();
        }
        if digits == 0 {
            self.pos = start;
            return None;
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            let mark = self.pos;
            self.pos += 1;
            if matches!(self.peek(), Some(b'+' | b'-')) {
                self.pos += 1;
            }
            if self.skip_digits() == 0 {
                self.pos = mark;
            }
        }

        let text = std::str::from_utf8(&self.bytes[start..self.pos]).ok()?;
        match text.parse::<f32>() {
            Ok(v) if v.is_finite() => Some(v),
            _ => {
                self.pos = start;
                None
            }
        }
    }

    /// Arc flags are a single `0` or `1` and need no separator.
    fn flag(&mut self) -> Option<bool> {
        self.skip_separators();
        let flag = match self.peek()? {
            b'0' => false,
            b'1' => true,
            _ => return None,
        };
        self.pos += 1;
        Some(flag)
    }
}

/// Parse a `points` list. A dangling odd coordinate is dropped.
pub fn parse_points(s: &str) -> Vec<(f32, f32)> {
    let mut cursor = Cursor::new(s);
    let mut points = Vec::new();
    while let (Some(x), Some(y)) = (cursor.number(), cursor.number()) {
        points.push((x, y));
    }
    points
}

// ==================== Conversion ====================

fn to_path2d(segments: &[PathSegment]) -> Path2D {
    let mut path = Path2D::new();
    let mut current = (0.0f32, 0.0f32);
    let mut start = (0.0f32, 0.0f32);
    // Last cubic / quadratic control point, for S and T reflection.
    let mut last_cubic: Option<(f32, f32)> = None;
    let mut last_quad: Option<(f32, f32)> = None;

    for segment in segments {
        let abs = move |x: f32, y: f32| {
            if segment.absolute {
                (x, y)
            } else {
                (current.0 + x, current.1 + y)
            }
        };
        let reflect = move |control: Option<(f32, f32)>| match control {
            Some((cx, cy)) => (2.0 * current.0 - cx, 2.0 * current.1 - cy),
            None => current,
        };

        let mut cubic_control = None;
        let mut quad_control = None;

        match segment.op {
            PathOp::Move(x, y) => {
                current = abs(x, y);
                start = current;
                path.move_to(current.0, current.1);
            }
            PathOp::Line(x, y) => {
                current = abs(x, y);
                path.line_to(current.0, current.1);
            }
            PathOp::Horizontal(x) => {
                current.0 = if segment.absolute { x } else { current.0 + x };
                path.line_to(current.0, current.1);
            }
            PathOp::Vertical(y) => {
                current.1 = if segment.absolute { y } else { current.1 + y };
                path.line_to(current.0, current.1);
            }
            PathOp::Cubic(x1, y1, x2, y2, x, y) => {
                let c1 = abs(x1, y1);
                let c2 = abs(x2, y2);
                let end = abs(x, y);
                path.bezier_curve_to(c1.0, c1.1, c2.0, c2.1, end.0, end.1);
                cubic_control = Some(c2);
                current = end;
            }
            PathOp::SmoothCubic(x2, y2, x, y) => {
                let c1 = reflect(last_cubic);
                let c2 = abs(x2, y2);
                let end = abs(x, y);
                path.bezier_curve_to(c1.0, c1.1, c2.0, c2.1, end.0, end.1);
                cubic_control = Some(c2);
                current = end;
            }
            PathOp::Quad(x1, y1, x, y) => {
                let c = abs(x1, y1);
                let end = abs(x, y);
                path.quadratic_curve_to(c.0, c.1, end.0, end.1);
                quad_control = Some(c);
                current = end;
            }
            PathOp::SmoothQuad(x, y) => {
                let c = reflect(last_quad);
                let end = abs(x, y);
                path.quadratic_curve_to(c.0, c.1, end.0, end.1);
                quad_control = Some(c);
                current = end;
            }
            PathOp::Arc { rx, ry, rotation, large_arc, sweep, x, y } => {
                let end = abs(x, y);
                arc_to(&mut path, current, rx, ry, rotation, large_arc, sweep, end);
                current = end;
            }
            PathOp::Close => {
                path.close_path();
                current = start;
            }
        }

        last_cubic = cubic_control;
        last_quad = quad_control;
    }

    path
}

/// Append an elliptical arc as cubic segments (endpoint parameterization).
#[allow(clippy::too_many_arguments)]
fn arc_to(
    path: &mut Path2D,
    from: (f32, f32),
    rx: f32,
    ry: f32,
    rotation_deg: f32,
    large_arc: bool,
    sweep: bool,
    to: (f32, f32),
) {
    if from == to {
        return;
    }
    let (mut rx, mut ry) = (rx.abs(), ry.abs());
    if rx == 0.0 || ry == 0.0 {
        path.line_to(to.0, to.1);
        return;
    }

    let phi = rotation_deg * PI / 180.0;
    let (sin, cos) = phi.sin_cos();

    let dx2 = (from.0 - to.0) / 2.0;
    let dy2 = (from.1 - to.1) / 2.0;
    let x1p = cos * dx2 + sin * dy2;
    let y1p = -sin * dx2 + cos * dy2;

    // Scale radii up when the endpoints do not fit.
    let lambda = (x1p * x1p) / (rx * rx) + (y1p * y1p) / (ry * ry);
    if lambda > 1.0 {
        let s = lambda.sqrt();
        rx *= s;
        ry *= s;
    }

    let num = rx * rx * ry * ry - rx * rx * y1p * y1p - ry * ry * x1p * x1p;
    let den = rx * rx * y1p * y1p + ry * ry * x1p * x1p;
    let mut coef = if den > 0.0 { (num / den).max(0.0).sqrt() } else { 0.0 };
    if large_arc == sweep {
        coef = -coef;
    }
    let cxp = coef * rx * y1p / ry;
    let cyp = -coef * ry * x1p / rx;

    let cx = cos * cxp - sin * cyp + (from.0 + to.0) / 2.0;
    let cy = sin * cxp + cos * cyp + (from.1 + to.1) / 2.0;

    let angle = |ux: f32, uy: f32, vx: f32, vy: f32| (ux * vy - uy * vx).atan2(ux * vx + uy * vy);
    let ux = (x1p - cxp) / rx;
    let uy = (y1p - cyp) / ry;
    let vx = (-x1p - cxp) / rx;
    let vy = (-y1p - cyp) / ry;

    let theta1 = angle(1.0, 0.0, ux, uy);
    let mut delta = angle(ux, uy, vx, vy);
    if !sweep && delta > 0.0 {
        delta -= 2.0 * PI;
    } else if sweep && delta < 0.0 {
        delta += 2.0 * PI;
    }

    let count = (delta.abs() / (PI / 2.0)).ceil().max(1.0) as usize;
    let step = delta / count as f32;
    let t = 4.0 / 3.0 * (step / 4.0).tan();

    let map = |ux: f32, uy: f32| (cx + rx * cos * ux - ry * sin * uy, cy + rx * sin * ux + ry * cos * uy);

    for i in 0..count {
        let a1 = theta1 + i as f32 * step;
        let a2 = a1 + step;
        let (s1, c1) = a1.sin_cos();
        let (s2, c2) = a2.sin_cos();

        let cp1 = map(c1 - t * s1, s1 + t * c1);
        let cp2 = map(c2 + t * s2, s2 - t * c2);
        let end = if i + 1 == count { to } else { map(c2, s2) };
        path.bezier_curve_to(cp1.0, cp1.1, cp2.0, cp2.1, end.0, end.1);
    }
}

// ==================== Basic Shapes ====================

/// `<rect>`, with rounded corners when `rx`/`ry` are positive. A missing
/// radius copies the other; both are clamped to half the side.
pub fn rect_path(x: f32, y: f32, width: f32, height: f32, rx: Option<f32>, ry: Option<f32>) -> Option<Path2D> {
    if width <= 0.0 || height <= 0.0 {
        return None;
    }
    let (rx, ry) = match (rx.filter(|r| *r > 0.0), ry.filter(|r| *r > 0.0)) {
        (Some(rx), Some(ry)) => (rx, ry),
        (Some(r), None) | (None, Some(r)) => (r, r),
        (None, None) => (0.0, 0.0),
    };
    let rx = rx.min(width / 2.0);
    let ry = ry.min(height / 2.0);

    let mut path = Path2D::new();
    if rx == 0.0 || ry == 0.0 {
        path.rect(x, y, width, height);
        return Some(path);
    }

    let (kx, ky) = (rx * KAPPA, ry * KAPPA);
    let (right, bottom) = (x + width, y + height);
    path.move_to(x + rx, y);
    path.line_to(right - rx, y);
    path.bezier_curve_to(right - rx + kx, y, right, y + ry - ky, right, y + ry);
    path.line_to(right, bottom - ry);
    path.bezier_curve_to(right, bottom - ry + ky, right - rx + kx, bottom, right - rx, bottom);
    path.line_to(x + rx, bottom);
    path.bezier_curve_to(x + rx - kx, bottom, x, bottom - ry + ky, x, bottom - ry);
    path.line_to(x, y + ry);
    path.bezier_curve_to(x, y + ry - ky, x + rx - kx, y, x + rx, y);
    path.close_path();
    Some(path)
}

pub fn circle_path(cx: f32, cy: f32, r: f32) -> Option<Path2D> {
    ellipse_path(cx, cy, r, r)
}

/// Four-cubic ellipse starting at the rightmost point.
pub fn ellipse_path(cx: f32, cy: f32, rx: f32, ry: f32) -> Option<Path2D> {
    if rx <= 0.0 || ry <= 0.0 {
        return None;
    }
    let (kx, ky) = (rx * KAPPA, ry * KAPPA);
    let mut path = Path2D::new();
    path.move_to(cx + rx, cy);
    path.bezier_curve_to(cx + rx, cy + ky, cx + kx, cy + ry, cx, cy + ry);
    path.bezier_curve_to(cx - kx, cy + ry, cx - rx, cy + ky, cx - rx, cy);
    path.bezier_curve_to(cx - rx, cy - ky, cx - kx, cy - ry, cx, cy - ry);
    path.bezier_curve_to(cx + kx, cy - ry, cx + rx, cy - ky, cx + rx, cy);
    path.close_path();
    Some(path)
}

pub fn line_path(x1: f32, y1: f32, x2: f32, y2: f32) -> Path2D {
    let mut path = Path2D::new();
    path.move_to(x1, y1);
    path.line_to(x2, y2);
    path
}

/// `<polyline>` or, with `close`, `<polygon>`. Needs two points.
pub fn poly_path(points: &[(f32, f32)], close: bool) -> Option<Path2D> {
    let ((x0, y0), rest) = points.split_first()?;
    if rest.is_empty() {
        return None;
    }
    let mut path = Path2D::new();
    path.move_to(*x0, *y0);
    for (x, y) in rest {
        path.line_to(*x, *y);
    }
    if close {
        path.close_path();
    }
    Some(path)
}
