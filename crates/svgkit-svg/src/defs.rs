//! The definitions table: everything a document can reference by id.

use std::collections::HashMap;
use std::sync::Arc;

use svgkit_canvas::{
    Color, GradientStop, LinearGradient, PaintStyle, Pattern, RadialGradient, RasterImage, Transform,
};
use svgkit_index::Rect;

use crate::markup::{Attributes, MarkupEvent};
use crate::style::{parse_declarations, Declaration};

// ==================== Units ====================

/// Coordinate system of gradient and pattern geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Units {
    /// Fractions of the painted shape's bounding box.
    #[default]
    ObjectBoundingBox,
    /// The shape's own user space.
    UserSpaceOnUse,
}

impl Units {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "objectBoundingBox" => Some(Units::ObjectBoundingBox),
            "userSpaceOnUse" => Some(Units::UserSpaceOnUse),
            _ => None,
        }
    }

    fn map(self, bbox: &Rect, x: f32, y: f32) -> (f32, f32) {
        match self {
            Units::UserSpaceOnUse => (x, y),
            Units::ObjectBoundingBox => (bbox.min_x + x * bbox.width(), bbox.min_y + y * bbox.height()),
        }
    }
}

// ==================== Gradients ====================

/// Gradient geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GradientKind {
    Linear { x1: f32, y1: f32, x2: f32, y2: f32 },
    Radial { cx: f32, cy: f32, r: f32, fx: f32, fy: f32 },
}

/// A resolved `<linearGradient>` or `<radialGradient>`.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientDescriptor {
    pub id: String,
    pub kind: GradientKind,
    /// Sorted by offset; stop opacity is folded into each color.
    pub stops: Vec<GradientStop>,
    pub units: Units,
    pub transform: Transform,
}

impl GradientDescriptor {
    /// Start and end of the color ramp: the two endpoints of a linear
    /// gradient, or focal point and rightmost rim point of a radial one.
    pub fn endpoints(&self) -> ((f32, f32), (f32, f32)) {
        match self.kind {
            GradientKind::Linear { x1, y1, x2, y2 } => ((x1, y1), (x2, y2)),
            GradientKind::Radial { cx, cy, r, fx, fy } => ((fx, fy), (cx + r, cy)),
        }
    }

    /// Direction of the ramp in radians; `0` for radial gradients.
    pub fn angle(&self) -> f32 {
        match self.kind {
            GradientKind::Linear { x1, y1, x2, y2 } => (y2 - y1).atan2(x2 - x1),
            GradientKind::Radial { .. } => 0.0,
        }
    }

    pub fn center(&self) -> (f32, f32) {
        match self.kind {
            GradientKind::Linear { x1, y1, x2, y2 } => ((x1 + x2) / 2.0, (y1 + y2) / 2.0),
            GradientKind::Radial { cx, cy, .. } => (cx, cy),
        }
    }

    pub fn radius(&self) -> f32 {
        match self.kind {
            GradientKind::Linear { x1, y1, x2, y2 } => ((x2 - x1).hypot(y2 - y1)) / 2.0,
            GradientKind::Radial { r, .. } => r,
        }
    }

    pub fn first_color(&self) -> Option<Color> {
        self.stops.first().map(|s| s.color)
    }

    /// Paint for a shape whose local bounds are `bbox`.
    ///
    /// No stops paints nothing; a single stop, or bounding-box units
    /// over a zero-area box, paints the first stop's color.
    pub fn to_paint(&self, bbox: &Rect) -> Option<PaintStyle> {
        let first = self.first_color()?;
        if self.stops.len() == 1 || (self.units == Units::ObjectBoundingBox && bbox.is_degenerate()) {
            return Some(PaintStyle::Color(first));
        }

        let map = |x: f32, y: f32| {
            let (x, y) = self.transform.apply(x, y);
            self.units.map(bbox, x, y)
        };

        let (start, end) = self.endpoints();
        let (x0, y0) = map(start.0, start.1);
        Some(match self.kind {
            GradientKind::Linear { .. } => {
                let (x1, y1) = map(end.0, end.1);
                let mut gradient = LinearGradient::new(x0, y0, x1, y1);
                gradient.stops = self.stops.clone();
                PaintStyle::LinearGradient(gradient)
            }
            GradientKind::Radial { .. } => {
                let center = self.center();
                let (cx, cy) = map(center.0, center.1);
                let t = &self.transform;
                let mut scale = (t.a * t.d - t.b * t.c).abs().sqrt();
                if self.units == Units::ObjectBoundingBox {
                    scale *= ((bbox.width().powi(2) + bbox.height().powi(2)) / 2.0).sqrt();
                }
                let mut gradient = RadialGradient::new(x0, y0, cx, cy, self.radius() * scale);
                gradient.stops = self.stops.clone();
                PaintStyle::RadialGradient(gradient)
            }
        })
    }
}

// ==================== Patterns ====================

/// A `<pattern>` tile backed by a pre-decoded image.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternDescriptor {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub units: Units,
    pub image: Option<Arc<RasterImage>>,
}

impl PatternDescriptor {
    /// Placement rectangle resolved against `bbox`.
    pub fn placement(&self, bbox: &Rect) -> Rect {
        match self.units {
            Units::UserSpaceOnUse => Rect::from_xywh(self.x, self.y, self.width, self.height),
            Units::ObjectBoundingBox => Rect::from_xywh(
                bbox.min_x + self.x * bbox.width(),
                bbox.min_y + self.y * bbox.height(),
                self.width * bbox.width(),
                self.height * bbox.height(),
            ),
        }
    }

    /// Image paint, or `None` when there is no image or the tile is empty.
    pub fn to_paint(&self, bbox: &Rect) -> Option<PaintStyle> {
        let image = self.image.clone()?;
        let place = self.placement(bbox);
        if place.is_degenerate() {
            return None;
        }
        Some(PaintStyle::Pattern(Pattern {
            image,
            x: place.min_x,
            y: place.min_y,
            width: place.width(),
            height: place.height(),
        }))
    }
}

// ==================== Filters ====================

/// One `fe*` child of a `<filter>`.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterPrimitive {
    pub name: String,
    pub attributes: Attributes,
}

/// A `<filter>` and its primitives. Retained on styles; not rasterized.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterDescriptor {
    pub id: String,
    pub primitives: Vec<FilterPrimitive>,
}

impl FilterDescriptor {
    pub fn primitive_names(&self) -> impl Iterator<Item = &str> {
        self.primitives.iter().map(|p| p.name.as_str())
    }
}

// ==================== Definitions ====================

/// Recorded subtree of an element with an id, replayed by `<use>`.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub id: String,
    pub events: Vec<MarkupEvent>,
}

impl Template {
    pub fn root_name(&self) -> Option<&str> {
        match self.events.first() {
            Some(MarkupEvent::Start { name, .. }) => Some(name),
            _ => None,
        }
    }
}

/// One entry of the definitions table.
#[derive(Debug, Clone, PartialEq)]
pub enum Definition {
    Gradient(Arc<GradientDescriptor>),
    Pattern(Arc<PatternDescriptor>),
    Filter(Arc<FilterDescriptor>),
    Template(Arc<Template>),
}

impl Definition {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Definition::Gradient(_) => "gradient",
            Definition::Pattern(_) => "pattern",
            Definition::Filter(_) => "filter",
            Definition::Template(_) => "template",
        }
    }
}

/// Document-scoped map from id to reusable definitions, plus the rules of
/// every `<style>` element seen so far.
#[derive(Debug, Clone, Default)]
pub struct Definitions {
    entries: HashMap<String, Definition>,
    stylesheet: Stylesheet,
}

impl Definitions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `definition`, returning the entry it replaced.
    pub fn insert(&mut self, id: impl Into<String>, definition: Definition) -> Option<Definition> {
        self.entries.insert(id.into(), definition)
    }

    pub fn get(&self, id: &str) -> Option<&Definition> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn gradient(&self, id: &str) -> Option<&Arc<GradientDescriptor>> {
        match self.entries.get(id) {
            Some(Definition::Gradient(g)) => Some(g),
            _ => None,
        }
    }

    pub fn pattern(&self, id: &str) -> Option<&Arc<PatternDescriptor>> {
        match self.entries.get(id) {
            Some(Definition::Pattern(p)) => Some(p),
            _ => None,
        }
    }

    pub fn filter(&self, id: &str) -> Option<&Arc<FilterDescriptor>> {
        match self.entries.get(id) {
            Some(Definition::Filter(f)) => Some(f),
            _ => None,
        }
    }

    pub fn template(&self, id: &str) -> Option<&Arc<Template>> {
        match self.entries.get(id) {
            Some(Definition::Template(t)) => Some(t),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn stylesheet(&self) -> &Stylesheet {
        &self.stylesheet
    }

    pub fn stylesheet_mut(&mut self) -> &mut Stylesheet {
        &mut self.stylesheet
    }
}

/// Id inside a `url(#id)` paint reference.
pub fn url_reference(value: &str) -> Option<&str> {
    let inner = value.trim().strip_prefix("url(")?;
    let close = inner.find(')')?;
    inner[..close]
        .trim()
        .trim_matches(|c| c == '\'' || c == '"')
        .strip_prefix('#')
        .filter(|id| !id.is_empty())
}

// ==================== Stylesheet ====================

#[derive(Debug, Clone, PartialEq)]
enum Selector {
    Tag(String),
    Class(String),
    Id(String),
}

#[derive(Debug, Clone, PartialEq)]
struct Rule {
    selector: Selector,
    declarations: Vec<Declaration>,
}

/// Simple-selector rules from `<style>` elements: `tag`, `.class`, `#id`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stylesheet {
    rules: Vec<Rule>,
}

impl Stylesheet {
    /// Add every rule in `css`. Returns a warning per skipped selector.
    pub fn add_rules(&mut self, css: &str) -> Vec<String> {
        let mut warnings = Vec::new();
        let css = strip_comments(css);

        for block in css.split('}') {
            let Some((selectors, body)) = block.split_once('{') else {
                if !block.trim().is_empty() {
                    warnings.push(format!("unterminated style rule '{}'", block.trim()));
                }
                continue;
            };
            let declarations = parse_declarations(body);

            for selector in selectors.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                match parse_selector(selector) {
                    Some(selector) => self.rules.push(Rule {
                        selector,
                        declarations: declarations.clone(),
                    }),
                    None => warnings.push(format!("unsupported selector '{selector}'")),
                }
            }
        }

        warnings
    }

    /// Declarations matching an element, lowest priority first: tag
    /// rules, then class rules, then id rules.
    pub fn declarations_for(&self, tag: &str, classes: Option<&str>, id: Option<&str>) -> Vec<Declaration> {
        let classes: Vec<&str> = classes.map(|c| c.split_whitespace().collect()).unwrap_or_default();
        let mut out = Vec::new();

        for rank in 0..3u8 {
            for rule in &self.rules {
                let matched = match (&rule.selector, rank) {
                    (Selector::Tag(t), 0) => t == tag,
                    (Selector::Class(c), 1) => classes.contains(&c.as_str()),
                    (Selector::Id(i), 2) => Some(i.as_str()) == id,
                    _ => false,
                };
                if matched {
                    out.extend(rule.declarations.iter().cloned());
                }
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn parse_selector(s: &str) -> Option<Selector> {
    let is_ident = |s: &str| {
        !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == ':')
    };
    if let Some(class) = s.strip_prefix('.') {
        is_ident(class).then(|| Selector::Class(class.to_string()))
    } else if let Some(id) = s.strip_prefix('#') {
        is_ident(id).then(|| Selector::Id(id.to_string()))
    } else {
        is_ident(s).then(|| Selector::Tag(s.to_string()))
    }
}

fn strip_comments(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    let mut rest = css;
    while let Some(start) = rest.find("/*") {
        out.push_str(&rest[..start]);
        match rest[start + 2..].find("*/") {
            Some(end) => rest = &rest[start + 2 + end + 2..],
            None => return out,
        }
    }
    out.push_str(rest);
    out
}
