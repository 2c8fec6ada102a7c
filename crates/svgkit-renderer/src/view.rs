//! Pan and zoom state.

use svgkit_canvas::Transform;
use svgkit_index::Point;

/// Per-axis scale plus offset:
/// `view.x = document.x * scale_x + offset_x`, likewise for y.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    pub scale_x: f32,
    pub scale_y: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl ViewTransform {
    pub const IDENTITY: Self = Self {
        scale_x: 1.0,
        scale_y: 1.0,
        offset_x: 0.0,
        offset_y: 0.0,
    };

    pub fn new(scale_x: f32, scale_y: f32, offset_x: f32, offset_y: f32) -> Self {
        Self {
            scale_x,
            scale_y,
            offset_x,
            offset_y,
        }
    }

    /// Same scale on both axes.
    pub fn uniform(scale: f32, offset_x: f32, offset_y: f32) -> Self {
        Self::new(scale, scale, offset_x, offset_y)
    }

    /// Both scales finite and positive, offsets finite.
    pub fn is_valid(&self) -> bool {
        [self.scale_x, self.scale_y].iter().all(|s| s.is_finite() && *s > 0.0)
            && self.offset_x.is_finite()
            && self.offset_y.is_finite()
    }

    /// Document-to-view matrix.
    pub fn matrix(&self) -> Transform {
        Transform::new(self.scale_x, 0.0, 0.0, self.scale_y, self.offset_x, self.offset_y)
    }

    /// Map a view point back to document space.
    pub fn to_document(&self, x: f32, y: f32) -> Option<Point> {
        let inverse = self.matrix().inverse()?;
        let (dx, dy) = inverse.apply(x, y);
        Some(Point::new(dx, dy))
    }

    pub fn to_view(&self, point: Point) -> (f32, f32) {
        self.matrix().apply(point.x, point.y)
    }

    /// Zoom by `factor_x`/`factor_y` keeping the view point `(x, y)` fixed.
    pub fn zoomed_about(&self, x: f32, y: f32, factor_x: f32, factor_y: f32) -> Self {
        Self {
            scale_x: self.scale_x * factor_x,
            scale_y: self.scale_y * factor_y,
            offset_x: x - (x - self.offset_x) * factor_x,
            offset_y: y - (y - self.offset_y) * factor_y,
        }
    }

    pub fn panned(&self, dx: f32, dy: f32) -> Self {
        Self {
            offset_x: self.offset_x + dx,
            offset_y: self.offset_y + dy,
            ..*self
        }
    }

    /// Largest uniform scale showing the whole document, centered in the view.
    pub fn fit(document_width: f32, document_height: f32, view_width: f32, view_height: f32) -> Self {
        if !Self::sizes_usable(document_width, document_height, view_width, view_height) {
            return Self::IDENTITY;
        }
        let scale = (view_width / document_width).min(view_height / document_height);
        Self::uniform(
            scale,
            (view_width - document_width * scale) / 2.0,
            (view_height - document_height * scale) / 2.0,
        )
    }

    /// Scale each axis independently so the document fills the view.
    pub fn stretch(document_width: f32, document_height: f32, view_width: f32, view_height: f32) -> Self {
        if !Self::sizes_usable(document_width, document_height, view_width, view_height) {
            return Self::IDENTITY;
        }
        Self::new(view_width / document_width, view_height / document_height, 0.0, 0.0)
    }

    fn sizes_usable(document_width: f32, document_height: f32, view_width: f32, view_height: f32) -> bool {
        [document_width, document_height, view_width, view_height]
            .iter()
            .all(|v| v.is_finite() && *v > 0.0)
    }
}
