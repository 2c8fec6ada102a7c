//! Style records and the cascading resolver.
//!
//! A [`Style`] is captured once per element: the parent's inheritable
//! fields, overridden field by field by the element's declarations in
//! cascade order. `url(#id)` references that cannot be satisfied yet are
//! remembered and retried by [`Style::resolve_pending`] once the whole
//! document has been read.

use std::sync::Arc;

use svgkit_canvas::{Color, FillRule, LineCap, LineJoin, PaintStyle};
use svgkit_index::Rect;

use crate::defs::{url_reference, Definition, Definitions, FilterDescriptor, GradientDescriptor, PatternDescriptor};
use crate::SvgLength;

/// Attributes that may carry style properties directly on an element.
pub const PRESENTATION_ATTRIBUTES: &[&str] = &[
    "color",
    "fill",
    "fill-opacity",
    "fill-rule",
    "stroke",
    "stroke-width",
    "stroke-opacity",
    "stroke-linejoin",
    "stroke-linecap",
    "stroke-miterlimit",
    "font-family",
    "font-size",
    "opacity",
    "display",
    "visibility",
    "filter",
];

// ==================== Declarations ====================

/// One `name: value` pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub name: String,
    pub value: String,
}

impl Declaration {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Split a `name:value;name:value` string. Names are lowercased,
/// `!important` is dropped, and entries without a colon are ignored.
pub fn parse_declarations(s: &str) -> Vec<Declaration> {
    s.split(';')
        .filter_map(|entry| {
            let (name, value) = entry.split_once(':')?;
            let name = name.trim().to_ascii_lowercase();
            let value = value.trim();
            let value = value.strip_suffix("!important").unwrap_or(value).trim();
            if name.is_empty() || value.is_empty() {
                return None;
            }
            Some(Declaration::new(name, value))
        })
        .collect()
}

// ==================== Style ====================

/// What a fill paints with. The descriptor lives in the variant, so a
/// style never carries both a gradient and a pattern.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FillType {
    #[default]
    Solid,
    Gradient(Arc<GradientDescriptor>),
    Pattern(Arc<PatternDescriptor>),
}

#[derive(Debug, Clone, PartialEq, Default)]
struct PendingRefs {
    fill: Option<String>,
    stroke: Option<String>,
    filter: Option<String>,
}

impl PendingRefs {
    fn is_empty(&self) -> bool {
        self.fill.is_none() && self.stroke.is_none() && self.filter.is_none()
    }
}

/// Resolved presentation of one element.
#[derive(Debug, Clone, PartialEq)]
pub struct Style {
    pub fill_enabled: bool,
    pub fill_color: Color,
    pub fill_opacity: f32,
    pub fill_rule: FillRule,
    pub fill_type: FillType,

    pub stroke_enabled: bool,
    pub stroke_color: Color,
    pub stroke_width: f32,
    pub stroke_opacity: f32,
    pub line_join: LineJoin,
    pub line_cap: LineCap,
    pub miter_limit: f32,

    pub font_family: String,
    pub font_size: f32,

    /// Group opacity; not inherited.
    pub opacity: f32,
    /// `visibility`; inherited.
    pub visible: bool,
    /// `display`; not inherited, but a hidden ancestor hides its subtree.
    pub display: bool,
    /// Value of `currentColor`.
    pub current_color: Color,
    pub filter: Option<Arc<FilterDescriptor>>,

    /// Draw-time hit feedback; the only field changed after capture.
    pub highlighted: bool,
    /// Inline `style` attribute this style was resolved from.
    pub style_string: Option<String>,

    pending: PendingRefs,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            fill_enabled: true,
            fill_color: Color::BLACK,
            fill_opacity: 1.0,
            fill_rule: FillRule::NonZero,
            fill_type: FillType::Solid,
            stroke_enabled: false,
            stroke_color: Color::BLACK,
            stroke_width: 1.0,
            stroke_opacity: 1.0,
            line_join: LineJoin::Miter,
            line_cap: LineCap::Butt,
            miter_limit: 4.0,
            font_family: "sans-serif".to_string(),
            font_size: 12.0,
            opacity: 1.0,
            visible: true,
            display: true,
            current_color: Color::BLACK,
            filter: None,
            highlighted: false,
            style_string: None,
            pending: PendingRefs::default(),
        }
    }
}

/// Output of [`Style::resolve`].
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub style: Style,
    pub warnings: Vec<String>,
}

impl Style {
    /// Default style with a different font.
    pub fn with_font(family: impl Into<String>, size: f32) -> Self {
        Self {
            font_family: family.into(),
            font_size: size,
            ..Self::default()
        }
    }

    /// The part of this style a child starts from.
    pub fn inherited(&self) -> Style {
        Style {
            opacity: 1.0,
            display: true,
            filter: None,
            highlighted: false,
            style_string: None,
            pending: PendingRefs {
                filter: None,
                ..self.pending.clone()
            },
            ..self.clone()
        }
    }

    /// Apply `declarations` in order over `inherited`. Later declarations
    /// win; `color` is applied first so `currentColor` sees the element's
    /// own value wherever it appears.
    pub fn resolve(inherited: &Style, declarations: &[Declaration], defs: &Definitions) -> Resolved {
        let mut style = inherited.clone();
        let mut warnings = Vec::new();

        for decl in declarations.iter().filter(|d| d.name == "color") {
            style.apply(decl, defs, &mut warnings);
        }
        for decl in declarations.iter().filter(|d| d.name != "color") {
            style.apply(decl, defs, &mut warnings);
        }

        Resolved { style, warnings }
    }

    /// Resolve an inline style string, keeping it on the result.
    pub fn resolve_str(inherited: &Style, style_string: &str, defs: &Definitions) -> Resolved {
        let mut resolved = Self::resolve(inherited, &parse_declarations(style_string), defs);
        resolved.style.style_string = Some(style_string.to_string());
        resolved
    }

    /// Ids referenced by `url(#id)` that were not defined when this style
    /// was resolved.
    pub fn pending_refs(&self) -> impl Iterator<Item = &str> {
        [&self.pending.fill, &self.pending.stroke, &self.pending.filter]
            .into_iter()
            .filter_map(|r| r.as_deref())
    }

    pub fn has_pending_refs(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Retry deferred references against the finished table. Whatever is
    /// still missing stays disabled and is reported.
    pub fn resolve_pending(&mut self, defs: &Definitions) -> Vec<String> {
        let mut warnings = Vec::new();

        if let Some(id) = self.pending.fill.take() {
            if !self.apply_fill_reference(&id, defs) {
                warnings.push(format!("fill references undefined #{id}"));
            }
        }
        if let Some(id) = self.pending.stroke.take() {
            if !self.apply_stroke_reference(&id, defs, &mut warnings) {
                warnings.push(format!("stroke references undefined #{id}"));
            }
        }
        if let Some(id) = self.pending.filter.take() {
            match defs.filter(&id) {
                Some(filter) => self.filter = Some(Arc::clone(filter)),
                None => warnings.push(format!("filter references undefined #{id}")),
            }
        }

        warnings
    }

    /// Fill paint for a shape with local bounds `bbox`, if anything is
    /// painted.
    pub fn fill_paint(&self, bbox: &Rect) -> Option<PaintStyle> {
        if !self.fill_enabled {
            return None;
        }
        match &self.fill_type {
            FillType::Solid => Some(PaintStyle::Color(self.fill_color)),
            FillType::Gradient(g) => g.to_paint(bbox),
            FillType::Pattern(p) => p.to_paint(bbox),
        }
    }

    pub fn stroke_paint(&self) -> Option<PaintStyle> {
        (self.stroke_enabled && self.stroke_width > 0.0).then_some(PaintStyle::Color(self.stroke_color))
    }

    // ==================== Properties ====================

    fn apply(&mut self, decl: &Declaration, defs: &Definitions, warnings: &mut Vec<String>) {
        let value = decl.value.trim();
        if value == "inherit" {
            return;
        }

        match decl.name.as_str() {
            "color" => match parse_color(value, self.current_color) {
                Some(c) => self.current_color = c,
                None => warnings.push(format!("invalid color '{value}'")),
            },
            "fill" => self.apply_fill(value, defs, warnings),
            "fill-opacity" => set_opacity(&mut self.fill_opacity, value, warnings),
            "fill-rule" => match value {
                "nonzero" => self.fill_rule = FillRule::NonZero,
                "evenodd" => self.fill_rule = FillRule::EvenOdd,
                _ => warnings.push(format!("invalid fill-rule '{value}'")),
            },
            "stroke" => self.apply_stroke(value, defs, warnings),
            "stroke-width" => match parse_length(value, self.font_size) {
                Some(w) if w >= 0.0 => self.stroke_width = w,
                _ => warnings.push(format!("invalid stroke-width '{value}'")),
            },
            "stroke-opacity" => set_opacity(&mut self.stroke_opacity, value, warnings),
            "stroke-linejoin" => match value {
                "miter" | "miter-clip" | "arcs" => self.line_join = LineJoin::Miter,
                "round" => self.line_join = LineJoin::Round,
                "bevel" => self.line_join = LineJoin::Bevel,
                _ => warnings.push(format!("invalid stroke-linejoin '{value}'")),
            },
            "stroke-linecap" => match value {
                "butt" => self.line_cap = LineCap::Butt,
                "round" => self.line_cap = LineCap::Round,
                "square" => self.line_cap = LineCap::Square,
                _ => warnings.push(format!("invalid stroke-linecap '{value}'")),
            },
            "stroke-miterlimit" => match value.parse::<f32>() {
                Ok(limit) if limit >= 1.0 => self.miter_limit = limit,
                _ => warnings.push(format!("invalid stroke-miterlimit '{value}'")),
            },
            "font-family" => {
                let family = value
                    .split(',')
                    .next()
                    .map(|f| f.trim().trim_matches(|c| c == '\'' || c == '"'))
                    .unwrap_or_default();
                if !family.is_empty() {
                    self.font_family = family.to_string();
                }
            }
            "font-size" => match parse_length(value, self.font_size) {
                Some(size) if size > 0.0 => self.font_size = size,
                _ => warnings.push(format!("invalid font-size '{value}'")),
            },
            "opacity" => set_opacity(&mut self.opacity, value, warnings),
            "display" => self.display = value != "none",
            "visibility" => match value {
                "visible" => self.visible = true,
                "hidden" | "collapse" => self.visible = false,
                _ => warnings.push(format!("invalid visibility '{value}'")),
            },
            "filter" => {
                self.pending.filter = None;
                if value == "none" {
                    self.filter = None;
                } else if let Some(id) = url_reference(value) {
                    match defs.filter(id) {
                        Some(f) => self.filter = Some(Arc::clone(f)),
                        None => {
                            self.filter = None;
                            self.pending.filter = Some(id.to_string());
                        }
                    }
                } else {
                    warnings.push(format!("unsupported filter '{value}'"));
                }
            }
            other => tracing::trace!(property = other, "Ignoring style property"),
        }
    }

    fn apply_fill(&mut self, value: &str, defs: &Definitions, warnings: &mut Vec<String>) {
        self.pending.fill = None;
        self.fill_type = FillType::Solid;

        if let Some(id) = url_reference(value) {
            self.fill_enabled = false;
            if !defs.contains(id) {
                self.pending.fill = Some(id.to_string());
            } else if !self.apply_fill_reference(id, defs) {
                warnings.push(format!("fill reference #{id} is not a paint server"));
            }
            return;
        }

        match value {
            "none" | "transparent" => self.fill_enabled = false,
            _ => match parse_color(value, self.current_color) {
                Some(c) => {
                    self.fill_enabled = true;
                    self.fill_color = c;
                }
                None => {
                    self.fill_enabled = false;
                    warnings.push(format!("invalid fill color '{value}'"));
                }
            },
        }
    }

    fn apply_fill_reference(&mut self, id: &str, defs: &Definitions) -> bool {
        match defs.get(id) {
            Some(Definition::Gradient(g)) => {
                self.fill_type = FillType::Gradient(Arc::clone(g));
                self.fill_enabled = true;
                true
            }
            Some(Definition::Pattern(p)) => {
                self.fill_type = FillType::Pattern(Arc::clone(p));
                self.fill_enabled = true;
                true
            }
            _ => false,
        }
    }

    fn apply_stroke(&mut self, value: &str, defs: &Definitions, warnings: &mut Vec<String>) {
        self.pending.stroke = None;

        if let Some(id) = url_reference(value) {
            self.stroke_enabled = false;
            if !defs.contains(id) {
                self.pending.stroke = Some(id.to_string());
            } else if !self.apply_stroke_reference(id, defs, warnings) {
                warnings.push(format!("stroke reference #{id} is not a gradient"));
            }
            return;
        }

        match value {
            "none" | "transparent" => self.stroke_enabled = false,
            _ => match parse_color(value, self.current_color) {
                Some(c) => {
                    self.stroke_enabled = true;
                    self.stroke_color = c;
                }
                None => {
                    self.stroke_enabled = false;
                    warnings.push(format!("invalid stroke color '{value}'"));
                }
            },
        }
    }

    /// Strokes only paint solid colors; a gradient contributes its first stop.
    fn apply_stroke_reference(&mut self, id: &str, defs: &Definitions, warnings: &mut Vec<String>) -> bool {
        let Some(gradient) = defs.gradient(id) else {
            return false;
        };
        match gradient.first_color() {
            Some(c) => {
                self.stroke_color = c;
                self.stroke_enabled = true;
            }
            None => warnings.push(format!("stroke gradient #{id} has no stops")),
        }
        true
    }
}

/// Parse a paint color, honoring `currentColor`.
pub fn parse_color(value: &str, current: Color) -> Option<Color> {
    if value.eq_ignore_ascii_case("currentcolor") {
        Some(current)
    } else {
        Color::parse(value)
    }
}

/// Number or percentage in `0..=1`.
pub fn parse_fraction(value: &str) -> Option<f32> {
    let value = value.trim();
    let v = match value.strip_suffix('%') {
        Some(p) => p.trim().parse::<f32>().ok()? / 100.0,
        None => value.parse::<f32>().ok()?,
    };
    v.is_finite().then_some(v)
}

fn parse_length(value: &str, font_size: f32) -> Option<f32> {
    SvgLength::parse(value).map(|l| l.to_px(font_size, font_size))
}

fn set_opacity(field: &mut f32, value: &str, warnings: &mut Vec<String>) {
    match parse_fraction(value) {
        Some(v) => *field = v.clamp(0.0, 1.0),
        None => warnings.push(format!("invalid opacity '{value}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defs::{GradientKind, Units};
    use svgkit_canvas::{GradientStop, Transform};

    fn resolve(inherited: &Style, s: &str, defs: &Definitions) -> Resolved {
        Style::resolve_str(inherited, s, defs)
    }

    fn defs_with_gradient(id: &str) -> Definitions {
        let mut defs = Definitions::new();
        defs.insert(
            id,
            Definition::Gradient(Arc::new(GradientDescriptor {
                id: id.to_string(),
                kind: GradientKind::Linear { x1: 0.0, y1: 0.0, x2: 1.0, y2: 0.0 },
                stops: vec![
                    GradientStop { offset: 0.0, color: Color::from_rgb(0, 128, 0) },
                    GradientStop { offset: 1.0, color: Color::WHITE },
                ],
                units: Units::ObjectBoundingBox,
                transform: Transform::identity(),
            })),
        );
        defs
    }

    #[test]
    fn test_parse_declarations() {
        let decls = parse_declarations(" FILL : red ; stroke:blue !important;;bogus; opacity: ");
        assert_eq!(
            decls,
            vec![Declaration::new("fill", "red"), Declaration::new("stroke", "blue")]
        );
    }

    #[test]
    fn test_fields_override_individually() {
        let defs = Definitions::new();
        let parent = resolve(&Style::default(), "fill:red;stroke:blue;stroke-width:3", &defs).style;
        let child = resolve(&parent.inherited(), "stroke-width:5", &defs).style;

        assert_eq!(child.fill_color, Color::from_rgb(255, 0, 0));
        assert_eq!(child.stroke_color, Color::from_rgb(0, 0, 255));
        assert!(child.stroke_enabled);
        assert_eq!(child.stroke_width, 5.0);
    }

    #[test]
    fn test_cascade_composes_per_field() {
        let defs = defs_with_gradient("g");
        let base = resolve(&Style::default(), "fill:#00f;font-size:20;opacity:0.5", &defs).style;
        let a = parse_declarations("fill:url(#g);stroke:red;font-size:2em");
        let b = parse_declarations("stroke-width:4;fill-opacity:50%;stroke:green");

        let stepwise = Style::resolve(&Style::resolve(&base, &a, &defs).style, &b, &defs).style;
        let combined: Vec<Declaration> = a.iter().chain(b.iter()).cloned().collect();
        let at_once = Style::resolve(&base, &combined, &defs).style;

        assert_eq!(stepwise, at_once);
        assert_eq!(at_once.font_size, 40.0);
        assert_eq!(at_once.fill_opacity, 0.5);
        assert!(matches!(at_once.fill_type, FillType::Gradient(_)));
        assert_eq!(at_once.stroke_color, Color::from_rgb(0, 128, 0));
    }

    #[test]
    fn test_inherited_resets_non_inherited_fields() {
        let defs = Definitions::new();
        let mut parent = resolve(&Style::default(), "opacity:0.3;display:none;visibility:hidden", &defs).style;
        parent.highlighted = true;
        let child = parent.inherited();

        assert_eq!(child.opacity, 1.0);
        assert!(child.display);
        assert!(!child.visible);
        assert!(!child.highlighted);
        assert_eq!(child.style_string, None);
    }

    #[test]
    fn test_missing_gradient_disables_fill() {
        let defs = Definitions::new();
        let resolved = resolve(&Style::default(), "fill:url(#missingGrad);stroke:black", &defs);
        let mut style = resolved.style;

        assert!(!style.fill_enabled);
        assert!(style.stroke_enabled);
        assert_eq!(style.fill_paint(&Rect::from_xywh(0.0, 0.0, 1.0, 1.0)), None);
        assert_eq!(style.pending_refs().collect::<Vec<_>>(), vec!["missingGrad"]);

        let warnings = style.resolve_pending(&defs);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("missingGrad"));
        assert!(!style.fill_enabled);
        assert!(!style.has_pending_refs());
    }

    #[test]
    fn test_forward_reference_resolves_later() {
        let mut style = resolve(&Style::default(), "fill:url(#late)", &Definitions::new()).style;
        let defs = defs_with_gradient("late");

        assert!(style.resolve_pending(&defs).is_empty());
        assert!(style.fill_enabled);
        assert!(matches!(style.fill_type, FillType::Gradient(_)));
    }

    #[test]
    fn test_stroke_url_uses_first_stop() {
        let defs = defs_with_gradient("g");
        let style = resolve(&Style::default(), "stroke:url(#g)", &defs).style;
        assert!(style.stroke_enabled);
        assert_eq!(style.stroke_color, Color::from_rgb(0, 128, 0));
    }

    #[test]
    fn test_bad_color_disables_channel() {
        let resolved = resolve(&Style::default(), "fill:notacolor;stroke:#12", &Definitions::new());
        assert!(!resolved.style.fill_enabled);
        assert!(!resolved.style.stroke_enabled);
        assert_eq!(resolved.warnings.len(), 2);
    }

    #[test]
    fn test_current_color_order_independent() {
        let style = resolve(&Style::default(), "fill:currentColor;color:#ff0000", &Definitions::new()).style;
        assert_eq!(style.fill_color, Color::from_rgb(255, 0, 0));
    }

    #[test]
    fn test_color_forms() {
        let defs = Definitions::new();
        for (value, expected) in [
            ("red", [255, 0, 0, 255]),
            ("#0f0", [0, 255, 0, 255]),
            ("#0000ff80", [0, 0, 255, 128]),
            ("rgb(1, 2, 3)", [1, 2, 3, 255]),
            ("rgba(0,0,0,0)", [0, 0, 0, 0]),
        ] {
            let style = resolve(&Style::default(), &format!("fill:{value}"), &defs).style;
            assert!(style.fill_enabled, "{value}");
            assert_eq!(style.fill_color.to_rgba8(), expected, "{value}");
        }
    }

    #[test]
    fn test_line_properties() {
        let style = resolve(
            &Style::default(),
            "stroke:#000;stroke-linejoin:round;stroke-linecap:square;stroke-miterlimit:8;fill-rule:evenodd",
            &Definitions::new(),
        )
        .style;
        assert_eq!(style.line_join, LineJoin::Round);
        assert_eq!(style.line_cap, LineCap::Square);
        assert_eq!(style.miter_limit, 8.0);
        assert_eq!(style.fill_rule, FillRule::EvenOdd);
        assert!(style.stroke_paint().is_some());
    }
}
