//! # SvgKit SVG
//!
//! Streaming SVG front end: turns markup into a style-resolved,
//! transform-composed fragment tree plus the sprites used for hit-testing.
//!
//! ## Features
//!
//! - **Builder**: event-driven construction over quick-xml, with best-effort recovery
//! - **Styles**: CSS declaration cascade (presentation attributes, `<style>` rules, inline styles)
//! - **Definitions**: gradients, patterns, filters and reusable groups addressed by `url(#id)` / `href`
//! - **Transforms**: tagged affine transforms (translate / rotate / scale / affine)
//! - **Paths**: full path-data grammar including arcs, plus basic shapes
//! - **Fragments**: Path / Text / Group nodes drawn through a `RasterContext`
//!
//! ## Architecture
//!
//! ```text
//! markup ──> quick-xml events ──> FragmentBuilder
//!                                    ├── frame stack (style, transform, defs scope)
//!                                    ├── Definitions (gradients, patterns, filters, templates, rules)
//!                                    └── SpriteArena
//!                                          │
//!                                          ▼
//!                                    Document { root: GroupFragment, sprites, size }
//! ```

use thiserror::Error;

pub mod builder;
pub mod defs;
pub mod fragment;
pub mod markup;
pub mod path;
pub mod style;
pub mod transform;

pub use builder::{parse_reader, parse_str, BuildOptions, Document, FragmentBuilder, ImageResolver, NoImages};
pub use defs::{
    Definition, Definitions, FilterDescriptor, FilterPrimitive, GradientDescriptor, GradientKind, PatternDescriptor,
    Stylesheet, Units,
};
pub use fragment::{render, DrawOptions, Fragment, GroupFragment, PathFragment, TextFragment};
pub use markup::{Attributes, MarkupEvent};
pub use path::{parse_path_data, ParsedPath, PathOp, PathSegment};
pub use style::{parse_declarations, Declaration, FillType, Resolved, Style};
pub use transform::{SvgTransform, TransformKind};

// ==================== Errors ====================

/// Errors that can occur in SVG operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SvgError {
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Invalid attribute: {0}")]
    InvalidAttribute(String),

    #[error("No <svg> element found")]
    NoRootElement,
}

// ==================== Diagnostics ====================

/// How serious a recovered problem was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Input was degraded (a channel disabled, an element skipped).
    Warning,
    /// Markup itself was malformed.
    Error,
}

/// A non-fatal problem found while building a document.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    /// Element name the problem was found on, if known.
    pub element: Option<String>,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let level = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        match &self.element {
            Some(element) => write!(f, "{level}: <{element}>: {}", self.message),
            None => write!(f, "{level}: {}", self.message),
        }
    }
}

// ==================== View Box ====================

/// SVG viewBox.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewBox {
    pub min_x: f32,
    pub min_y: f32,
    pub width: f32,
    pub height: f32,
}

impl ViewBox {
    /// Parse viewBox attribute. Non-finite numbers and non-positive
    /// sizes are rejected.
    pub fn parse(s: &str) -> Option<Self> {
        let parts: Vec<f32> = s
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|p| !p.is_empty())
            .map(|p| p.parse::<f32>().ok().filter(|v| v.is_finite()))
            .collect::<Option<Vec<f32>>>()?;

        match parts.as_slice() {
            [min_x, min_y, width, height] if *width > 0.0 && *height > 0.0 => Some(ViewBox {
                min_x: *min_x,
                min_y: *min_y,
                width: *width,
                height: *height,
            }),
            _ => None,
        }
    }
}

// ==================== SVG Length ====================

/// SVG length value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SvgLength {
    /// Pixels.
    Px(f32),
    /// Percentage.
    Percent(f32),
    /// Em units.
    Em(f32),
    /// Points (1/72 in).
    Pt(f32),
    /// Millimetres.
    Mm(f32),
    /// Centimetres.
    Cm(f32),
    /// Inches.
    In(f32),
    /// User units (no unit specified).
    User(f32),
}

impl SvgLength {
    /// Parse length string. `None` for non-finite numbers such as `inf`
    /// or values beyond `f32` range.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let finite = |v: &str| v.trim().parse::<f32>().ok().filter(|v| v.is_finite());
        let number = |suffix: &str| s.strip_suffix(suffix).and_then(finite);

        if let Some(v) = number("%") {
            Some(SvgLength::Percent(v))
        } else if let Some(v) = number("px") {
            Some(SvgLength::Px(v))
        } else if let Some(v) = number("em") {
            Some(SvgLength::Em(v))
        } else if let Some(v) = number("pt") {
            Some(SvgLength::Pt(v))
        } else if let Some(v) = number("mm") {
            Some(SvgLength::Mm(v))
        } else if let Some(v) = number("cm") {
            Some(SvgLength::Cm(v))
        } else if let Some(v) = number("in") {
            Some(SvgLength::In(v))
        } else {
            finite(s).map(SvgLength::User)
        }
    }

    /// Convert to pixels. Percentages resolve against `container_size`,
    /// ems against `font_size`.
    pub fn to_px(&self, container_size: f32, font_size: f32) -> f32 {
        match self {
            SvgLength::Px(v) | SvgLength::User(v) => *v,
            SvgLength::Percent(p) => container_size * p / 100.0,
            SvgLength::Em(em) => em * font_size,
            SvgLength::Pt(pt) => pt * 96.0 / 72.0,
            SvgLength::Mm(mm) => mm * 96.0 / 25.4,
            SvgLength::Cm(cm) => cm * 96.0 / 2.54,
            SvgLength::In(inches) => inches * 96.0,
        }
    }

    pub fn is_percent(&self) -> bool {
        matches!(self, SvgLength::Percent(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_box_parse() {
        let vb = ViewBox::parse("0 0 100 50").unwrap();
        assert_eq!(vb.width, 100.0);
        assert_eq!(vb.height, 50.0);

        assert_eq!(ViewBox::parse("-10,-10, 20,20").map(|v| v.min_x), Some(-10.0));
        assert!(ViewBox::parse("0 0 100").is_none());
        assert!(ViewBox::parse("0 0 0 10").is_none());
        assert!(ViewBox::parse("a b c d").is_none());
    }

    #[test]
    fn test_non_finite_numbers_rejected() {
        assert!(ViewBox::parse("0 0 inf 10").is_none());
        assert!(ViewBox::parse("0 0 1e39 10").is_none());
        assert!(ViewBox::parse("NaN 0 10 10").is_none());
        assert!(SvgLength::parse("inf").is_none());
        assert!(SvgLength::parse("1e39").is_none());
        assert!(SvgLength::parse("1e39px").is_none());
        assert!(SvgLength::parse("NaN%").is_none());
        assert_eq!(SvgLength::parse("1e3"), Some(SvgLength::User(1000.0)));
    }

    #[test]
    fn test_length_parse() {
        assert_eq!(SvgLength::parse("100"), Some(SvgLength::User(100.0)));
        assert_eq!(SvgLength::parse("12px"), Some(SvgLength::Px(12.0)));
        assert_eq!(SvgLength::parse("50%"), Some(SvgLength::Percent(50.0)));
        assert_eq!(SvgLength::parse("1in").map(|l| l.to_px(0.0, 16.0)), Some(96.0));
        assert_eq!(SvgLength::parse("2em").map(|l| l.to_px(0.0, 10.0)), Some(20.0));
        assert_eq!(SvgLength::parse("50%").map(|l| l.to_px(300.0, 16.0)), Some(150.0));
        assert!(SvgLength::parse("wide").is_none());
    }

    #[test]
    fn test_diagnostic_display() {
        let d = Diagnostic {
            severity: Severity::Warning,
            message: "skipped".into(),
            element: Some("blink".into()),
        };
        assert_eq!(d.to_string(), "warning: <blink>: skipped");
    }
}
