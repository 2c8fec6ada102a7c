//! Axis-aligned geometry shared by sprites and the quadtree.

use svgkit_canvas::Transform;

/// A point in document space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn transformed(self, t: &Transform) -> Self {
        let (x, y) = t.apply(self.x, self.y);
        Self { x, y }
    }
}

/// Axis-aligned rectangle. Edges are inclusive for containment and
/// intersection tests.
///
/// The empty rectangle has `min > max` so that the first
/// [`Rect::include_point`] collapses it onto that point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl Default for Rect {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Rect {
    pub const EMPTY: Rect = Rect {
        min_x: f32::INFINITY,
        min_y: f32::INFINITY,
        max_x: f32::NEG_INFINITY,
        max_y: f32::NEG_INFINITY,
    };

    /// Rectangle spanning two corners in any order.
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            min_x: x0.min(x1),
            min_y: y0.min(y1),
            max_x: x0.max(x1),
            max_y: y0.max(y1),
        }
    }

    pub fn from_xywh(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    /// No point has been included yet.
    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y
    }

    /// Empty, or collapsed to a line or a point.
    pub fn is_degenerate(&self) -> bool {
        self.is_empty() || self.width() <= 0.0 || self.height() <= 0.0
    }

    pub fn width(&self) -> f32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f32 {
        self.max_y - self.min_y
    }

    pub fn area(&self) -> f32 {
        if self.is_empty() {
            0.0
        } else {
            self.width() * self.height()
        }
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_y && p.y <= self.max_y
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    /// Grow to cover `(x, y)`.
    pub fn include_point(&mut self, x: f32, y: f32) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Rect {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// Bounding box of the four corners after `t`.
    pub fn transformed(&self, t: &Transform) -> Rect {
        if self.is_empty() {
            return *self;
        }
        let mut out = Rect::EMPTY;
        for (x, y) in [
            (self.min_x, self.min_y),
            (self.max_x, self.min_y),
            (self.max_x, self.max_y),
            (self.min_x, self.max_y),
        ] {
            let (tx, ty) = t.apply(x, y);
            out.include_point(tx, ty);
        }
        out
    }

    /// Split into four equal quadrants: top-left, top-right, bottom-left,
    /// bottom-right. Adjacent quadrants share their edge at the midpoint.
    pub fn quadrants(&self) -> [Rect; 4] {
        let c = self.center();
        [
            Rect { min_x: self.min_x, min_y: self.min_y, max_x: c.x, max_y: c.y },
            Rect { min_x: c.x, min_y: self.min_y, max_x: self.max_x, max_y: c.y },
            Rect { min_x: self.min_x, min_y: c.y, max_x: c.x, max_y: self.max_y },
            Rect { min_x: c.x, min_y: c.y, max_x: self.max_x, max_y: self.max_y },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_rect() {
        let mut r = Rect::EMPTY;
        assert!(r.is_empty());
        assert_eq!(r.area(), 0.0);
        r.include_point(3.0, 4.0);
        assert!(!r.is_empty());
        assert!(r.is_degenerate());
        r.include_point(1.0, 6.0);
        assert_eq!(r, Rect::new(1.0, 4.0, 3.0, 6.0));
    }

    #[test]
    fn test_inclusive_edges() {
        let a = Rect::from_xywh(0.0, 0.0, 1.0, 1.0);
        let b = Rect::from_xywh(1.0, 0.0, 1.0, 1.0);
        assert!(a.intersects(&b));
        assert!(a.contains(Point::new(1.0, 1.0)));
        assert!(!a.contains(Point::new(1.01, 0.5)));
        assert!(!a.intersects(&Rect::EMPTY));
    }

    #[test]
    fn test_transformed_bounds() {
        let r = Rect::from_xywh(0.0, 0.0, 2.0, 1.0);
        let rotated = r.transformed(&Transform::rotate(std::f32::consts::FRAC_PI_2));
        assert!((rotated.min_x - -1.0).abs() < 1e-5);
        assert!((rotated.max_y - 2.0).abs() < 1e-5);

        let moved = r.transformed(&Transform::translate(10.0, 20.0));
        assert_eq!(moved, Rect::from_xywh(10.0, 20.0, 2.0, 1.0));
    }

    #[test]
    fn test_quadrants_tile_parent() {
        let r = Rect::new(0.0, 0.0, 8.0, 4.0);
        let q = r.quadrants();
        let area: f32 = q.iter().map(|c| c.area()).sum();
        assert_eq!(area, r.area());
        assert_eq!(q[0].union(&q[3]), r);
        assert_eq!(q[1].min_x, q[0].max_x);
        assert_eq!(q[2].min_y, q[0].max_y);
    }
}
