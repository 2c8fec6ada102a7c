//! Streaming construction of the fragment tree.
//!
//! [`FragmentBuilder`] is the build context for one document: every stack,
//! table and arena lives on it, so independent documents can be built on
//! different threads at once. It is driven by element events, either from
//! [`parse_reader`]/[`parse_str`] or by hand.

use std::io::BufRead;
use std::sync::Arc;

use quick_xml::events::Event;
use quick_xml::Reader;
use svgkit_canvas::{Color, GradientStop, Path2D, RasterImage, Transform};
use svgkit_index::{Rect, Sprite, SpriteArena, SpriteId};

use crate::defs::{
    Definition, Definitions, FilterDescriptor, FilterPrimitive, GradientDescriptor, GradientKind, PatternDescriptor,
    Template, Units,
};
use crate::fragment::{Fragment, GroupFragment, PathFragment, TextFragment};
use crate::markup::{Attributes, MarkupEvent};
use crate::path::{circle_path, ellipse_path, line_path, parse_path_data, parse_points, poly_path, rect_path};
use crate::style::{parse_color, parse_declarations, parse_fraction, Style, PRESENTATION_ATTRIBUTES};
use crate::transform::SvgTransform;
use crate::{Diagnostic, Severity, SvgError, SvgLength, ViewBox};

/// Give up on a stream after this many XML syntax errors.
const MAX_XML_ERRORS: usize = 32;

/// Nesting limit for `<use>` replays.
const MAX_USE_DEPTH: usize = 16;

const DEFAULT_WIDTH: f32 = 300.0;
const DEFAULT_HEIGHT: f32 = 150.0;

/// Rough advance per character for text runs without explicit positions.
const TEXT_ADVANCE_EM: f32 = 0.6;

/// Elements whose subtree is recorded for `<use>` when they carry an id.
const TEMPLATE_ELEMENTS: &[&str] = &[
    "g", "a", "symbol", "use", "path", "rect", "circle", "ellipse", "line", "polyline", "polygon", "text",
];

const SHAPE_ELEMENTS: &[&str] = &["path", "rect", "circle", "ellipse", "line", "polyline", "polygon"];

// ==================== Options ====================

/// Turns an `href` (usually a `data:` URI) into decoded RGBA pixels.
pub trait ImageResolver: Send + Sync {
    fn resolve(&self, href: &str) -> Option<RasterImage>;
}

/// Resolver that never produces an image.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoImages;

impl ImageResolver for NoImages {
    fn resolve(&self, _href: &str) -> Option<RasterImage> {
        None
    }
}

/// Settings for one build.
#[derive(Clone)]
pub struct BuildOptions {
    /// Lines per curve when visiting path points for sprite bounds.
    pub curve_segments: usize,
    pub default_font_family: String,
    pub default_font_size: f32,
    pub image_resolver: Arc<dyn ImageResolver>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            curve_segments: 16,
            default_font_family: "sans-serif".to_string(),
            default_font_size: 12.0,
            image_resolver: Arc::new(NoImages),
        }
    }
}

impl std::fmt::Debug for BuildOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildOptions")
            .field("curve_segments", &self.curve_segments)
            .field("default_font_family", &self.default_font_family)
            .field("default_font_size", &self.default_font_size)
            .finish_non_exhaustive()
    }
}

impl BuildOptions {
    pub fn with_image_resolver(mut self, resolver: Arc<dyn ImageResolver>) -> Self {
        self.image_resolver = resolver;
        self
    }
}

// ==================== Document ====================

/// A finished build: the drawable tree and everything needed to index it.
#[derive(Debug, Clone)]
pub struct Document {
    pub root: GroupFragment,
    pub sprites: SpriteArena,
    /// Image size in pixels.
    pub width: f32,
    pub height: f32,
    pub view_box: Option<ViewBox>,
    pub definitions: Definitions,
    pub diagnostics: Vec<Diagnostic>,
}

impl Document {
    /// The image rectangle, `(0, 0)` to `(width, height)`.
    pub fn bounds(&self) -> Rect {
        Rect::from_xywh(0.0, 0.0, self.width, self.height)
    }

    /// First fragment (pre-order) with the given id.
    pub fn find_fragment(&self, id: &str) -> Option<&Fragment> {
        let mut found = None;
        for child in &self.root.children {
            child.walk(&mut |f| {
                if found.is_none() && f.id() == Some(id) {
                    found = Some(f);
                }
            });
        }
        found
    }

    pub fn path_fragments(&self) -> Vec<&PathFragment> {
        let mut paths = Vec::new();
        for child in &self.root.children {
            child.walk(&mut |f| {
                if let Fragment::Path(p) = f {
                    paths.push(p);
                }
            });
        }
        paths
    }

    pub fn sprite_named(&self, name: &str) -> Option<&Sprite> {
        self.sprites.find(name).and_then(|id| self.sprites.get(id))
    }

    /// Toggle highlight feedback for one sprite and its fragments.
    pub fn set_highlighted(&mut self, sprite: SpriteId, highlighted: bool) -> bool {
        match self.sprites.get_mut(sprite) {
            Some(s) => s.set_highlighted(highlighted),
            None => return false,
        }
        self.root.set_highlighted(sprite, highlighted);
        true
    }

    pub fn clear_highlights(&mut self) {
        self.sprites.clear_highlights();
        self.root.clear_highlights();
    }
}

// ==================== Builder State ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Root,
    /// Pushes a group container: `g`, `use`, nested `svg`.
    Container,
    /// Pushes a throwaway container: `defs`, `symbol`.
    Defs,
    Shape,
    Text,
    Gradient,
    Pattern,
    Filter,
    Style,
    /// Fully handled on entry; children are skipped.
    Inert,
}

#[derive(Debug)]
struct Frame {
    name: String,
    kind: FrameKind,
    id: Option<String>,
    style: Style,
    /// Accumulated element transforms, without the root viewport.
    transform: SvgTransform,
    in_defs: bool,
    displayed: bool,
    /// Sprite of a named `<use>`, grown by everything it instantiates.
    use_sprite: Option<Sprite>,
}

#[derive(Debug)]
struct Recording {
    id: String,
    depth: usize,
    events: Vec<MarkupEvent>,
}

#[derive(Debug)]
struct GradientBuilder {
    id: Option<String>,
    radial: bool,
    attributes: Attributes,
    stops: Vec<GradientStop>,
}

/// Build context for one document.
pub struct FragmentBuilder {
    options: BuildOptions,
    definitions: Definitions,
    sprites: SpriteArena,
    diagnostics: Vec<Diagnostic>,

    frames: Vec<Frame>,
    containers: Vec<GroupFragment>,
    root: Option<GroupFragment>,
    root_seen: bool,

    width: f32,
    height: f32,
    view_box: Option<ViewBox>,
    viewport: SvgTransform,

    skip_depth: usize,
    outside_depth: usize,
    recordings: Vec<Recording>,
    replaying: Vec<String>,

    gradient: Option<GradientBuilder>,
    deferred_gradients: Vec<GradientBuilder>,
    pattern: Option<PatternDescriptor>,
    filter: Option<FilterDescriptor>,
    style_text: String,
    text_cursor: Option<(f32, f32)>,
}

impl FragmentBuilder {
    pub fn new(options: BuildOptions) -> Self {
        Self {
            options,
            definitions: Definitions::new(),
            sprites: SpriteArena::new(),
            diagnostics: Vec::new(),
            frames: Vec::new(),
            containers: Vec::new(),
            root: None,
            root_seen: false,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            view_box: None,
            viewport: SvgTransform::identity(),
            skip_depth: 0,
            outside_depth: 0,
            recordings: Vec::new(),
            replaying: Vec::new(),
            gradient: None,
            deferred_gradients: Vec::new(),
            pattern: None,
            filter: None,
            style_text: String::new(),
            text_cursor: None,
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    // ==================== Events ====================

    pub fn start_element(&mut self, name: &str, attributes: &Attributes) {
        self.record_start(name, attributes);

        if self.skip_depth > 0 {
            self.skip_depth += 1;
            return;
        }

        let Some(parent_kind) = self.frames.last().map(|f| f.kind) else {
            self.start_outside_root(name, attributes);
            return;
        };
        if parent_kind == FrameKind::Inert {
            self.skip_depth = 1;
            return;
        }

        tracing::trace!(element = name, "Start element");
        match name {
            "g" | "a" | "switch" => {
                let frame = self.child_frame(name, FrameKind::Container, attributes, None);
                self.push_container(frame);
            }
            "svg" => {
                let offset = SvgTransform::translate(attributes.length_or_zero("x"), attributes.length_or_zero("y"));
                let frame = self.child_frame(name, FrameKind::Container, attributes, Some(offset));
                self.push_container(frame);
            }
            "defs" | "symbol" => {
                let frame = self.child_frame(name, FrameKind::Defs, attributes, None);
                self.push_container(frame);
            }
            "use" => self.start_use(attributes),
            n if SHAPE_ELEMENTS.contains(&n) => self.start_shape(name, attributes),
            "text" | "tspan" => self.start_text(name, attributes),
            "linearGradient" | "radialGradient" => {
                self.gradient = Some(GradientBuilder {
                    id: attributes.get("id").map(str::to_string),
                    radial: name == "radialGradient",
                    attributes: attributes.clone(),
                    stops: Vec::new(),
                });
                let frame = self.child_frame(name, FrameKind::Gradient, attributes, None);
                self.frames.push(frame);
            }
            "stop" => self.start_stop(attributes),
            "pattern" => self.start_pattern(attributes),
            "image" => self.start_image(attributes),
            "filter" => {
                self.filter = Some(FilterDescriptor {
                    id: attributes.get("id").unwrap_or_default().to_string(),
                    primitives: Vec::new(),
                });
                let frame = self.child_frame(name, FrameKind::Filter, attributes, None);
                self.frames.push(frame);
            }
            n if n.starts_with("fe") && parent_kind == FrameKind::Filter => {
                if let Some(filter) = self.filter.as_mut() {
                    filter.primitives.push(FilterPrimitive {
                        name: name.to_string(),
                        attributes: attributes.clone(),
                    });
                }
                let frame = self.child_frame(name, FrameKind::Inert, attributes, None);
                self.frames.push(frame);
            }
            "style" => {
                self.style_text.clear();
                let frame = self.child_frame(name, FrameKind::Style, attributes, None);
                self.frames.push(frame);
            }
            n if matches!(n, "title" | "desc" | "metadata") || n.contains(':') => {
                self.skip_depth = 1;
            }
            _ => {
                self.warn(name, "unsupported element skipped");
                self.skip_depth = 1;
            }
        }
    }

    pub fn end_element(&mut self, name: &str) {
        self.record_end(name);

        if self.skip_depth > 0 {
            self.skip_depth -= 1;
            return;
        }
        if self.frames.is_empty() {
            self.outside_depth = self.outside_depth.saturating_sub(1);
            return;
        }

        match self.frames.iter().rposition(|f| f.name == name) {
            Some(index) => {
                while self.frames.len() > index + 1 {
                    let open = self.frames.last().map(|f| f.name.clone()).unwrap_or_default();
                    self.markup_error(format!("<{open}> closed implicitly by </{name}>"));
                    self.close_frame();
                }
                self.close_frame();
            }
            None => self.markup_error(format!("unexpected closing tag </{name}>")),
        }
    }

    pub fn text(&mut self, content: &str) {
        if self.replaying.is_empty() {
            for r in &mut self.recordings {
                r.events.push(MarkupEvent::Text(content.to_string()));
            }
        }
        if self.skip_depth > 0 {
            return;
        }
        match self.frames.last().map(|f| f.kind) {
            Some(FrameKind::Style) => self.style_text.push_str(content),
            Some(FrameKind::Text) => self.add_text_run(content),
            _ => {}
        }
    }

    /// Record a malformed-markup diagnostic.
    pub fn markup_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("Malformed SVG markup: {message}");
        self.diagnostics.push(Diagnostic {
            severity: Severity::Error,
            message,
            element: None,
        });
    }

    /// Close whatever is still open and produce the document.
    pub fn finish(mut self) -> Result<Document, SvgError> {
        if !self.root_seen {
            return Err(SvgError::NoRootElement);
        }

        while let Some(name) = self.frames.last().map(|f| f.name.clone()) {
            self.markup_error(format!("unclosed element <{name}>"));
            self.close_frame();
        }
        self.resolve_deferred_gradients();

        let mut root = self.root.take().unwrap_or_default();
        let mut warnings: Vec<String> = Vec::new();
        {
            let defs = &self.definitions;
            let mut collect = |style: &mut Style| {
                for w in style.resolve_pending(defs) {
                    if !warnings.contains(&w) {
                        warnings.push(w);
                    }
                }
            };
            collect(&mut root.style);
            for child in &mut root.children {
                child.walk_mut(&mut |f| collect(f.style_mut()));
            }
        }
        for w in warnings {
            self.warn("svg", w);
        }

        tracing::debug!(
            fragments = root.descendant_count(),
            sprites = self.sprites.len(),
            definitions = self.definitions.len(),
            diagnostics = self.diagnostics.len(),
            width = self.width,
            height = self.height,
            "Built SVG document"
        );

        Ok(Document {
            root,
            sprites: self.sprites,
            width: self.width,
            height: self.height,
            view_box: self.view_box,
            definitions: self.definitions,
            diagnostics: self.diagnostics,
        })
    }

    // ==================== Root ====================

    fn start_outside_root(&mut self, name: &str, attributes: &Attributes) {
        if name != "svg" || self.root_seen {
            if self.outside_depth == 0 {
                self.warn(name, "element outside the <svg> root ignored");
            }
            if name == "svg" {
                self.skip_depth = 1;
            } else {
                self.outside_depth += 1;
            }
            return;
        }
        self.root_seen = true;

        let view_box = match attributes.get("viewBox") {
            Some(v) => {
                let parsed = ViewBox::parse(v);
                if parsed.is_none() {
                    self.warn(name, SvgError::InvalidAttribute(format!("viewBox '{v}'")).to_string());
                }
                parsed
            }
            None => None,
        };
        for attr in ["width", "height"] {
            if let Some(v) = attributes.get(attr) {
                if SvgLength::parse(v).is_none() {
                    self.warn(name, SvgError::InvalidAttribute(format!("{attr} '{v}'")).to_string());
                }
            }
        }
        let absolute = |attr: &str| {
            attributes
                .get(attr)
                .and_then(SvgLength::parse)
                .filter(|l| !l.is_percent())
                .map(|l| l.to_px(0.0, 16.0))
                .filter(|v| *v > 0.0)
        };
        let (width, height) = match (absolute("width"), absolute("height"), view_box) {
            (Some(w), Some(h), _) => (w, h),
            (Some(w), None, Some(vb)) => (w, w * vb.height / vb.width),
            (None, Some(h), Some(vb)) => (h * vb.width / vb.height, h),
            (None, None, Some(vb)) => (vb.width, vb.height),
            (w, h, None) => (w.unwrap_or(DEFAULT_WIDTH), h.unwrap_or(DEFAULT_HEIGHT)),
        };
        self.width = width;
        self.height = height;
        self.view_box = view_box;
        if let Some(vb) = &view_box {
            self.viewport = viewport_transform(vb, width, height, attributes.get("preserveAspectRatio"));
        }

        let base = Style::with_font(self.options.default_font_family.clone(), self.options.default_font_size);
        let style = self.resolve_style(name, attributes, &base);
        let transform = self.local_transform(name, attributes);
        let frame = Frame {
            name: name.to_string(),
            kind: FrameKind::Root,
            id: attributes.get("id").map(str::to_string),
            displayed: style.display,
            style,
            transform,
            in_defs: false,
            use_sprite: None,
        };
        tracing::debug!(width, height, view_box = ?view_box, "SVG root");
        self.push_container(frame);
    }

    // ==================== Frames ====================

    fn child_frame(&mut self, name: &str, kind: FrameKind, attributes: &Attributes, extra: Option<SvgTransform>) -> Frame {
        let (inherited, parent_transform, displayed, in_defs) = match self.frames.last() {
            Some(p) => (p.style.inherited(), p.transform, p.displayed, p.in_defs),
            None => (Style::default(), SvgTransform::identity(), true, false),
        };

        let style = self.resolve_style(name, attributes, &inherited);
        let local = self.local_transform(name, attributes);
        let mut transform = SvgTransform::compose(&parent_transform, &local);
        if let Some(extra) = extra {
            transform = SvgTransform::compose(&transform, &extra);
        }

        Frame {
            name: name.to_string(),
            kind,
            id: attributes.get("id").map(str::to_string),
            displayed: displayed && style.display,
            in_defs: in_defs || kind == FrameKind::Defs,
            style,
            transform,
            use_sprite: None,
        }
    }

    fn push_container(&mut self, frame: Frame) {
        let transform = self.document_transform(&frame.transform);
        self.containers
            .push(GroupFragment::new(frame.id.clone(), frame.style.clone(), transform));
        self.frames.push(frame);
    }

    fn close_frame(&mut self) {
        let Some(frame) = self.frames.pop() else {
            return;
        };

        match frame.kind {
            FrameKind::Root => self.root = self.containers.pop(),
            FrameKind::Container => {
                let Some(mut group) = self.containers.pop() else {
                    return;
                };
                if let Some(mut sprite) = frame.use_sprite {
                    sprite.finish_bounding_box(&Transform::identity());
                    let id = self.sprites.insert(sprite);
                    for child in &mut group.children {
                        child.walk_mut(&mut |f| {
                            if let Fragment::Path(p) = f {
                                p.sprite.get_or_insert(id);
                            }
                        });
                    }
                }
                if let Some(parent) = self.containers.last_mut() {
                    parent.children.push(Fragment::Group(group));
                }
            }
            FrameKind::Defs => {
                self.containers.pop();
            }
            FrameKind::Gradient => {
                if let Some(builder) = self.gradient.take() {
                    self.finish_gradient(builder);
                }
            }
            FrameKind::Pattern => {
                self.containers.pop();
                if let Some(pattern) = self.pattern.take() {
                    if pattern.id.is_empty() {
                        self.warn(&frame.name, "pattern without id ignored");
                    } else {
                        self.define(pattern.id.clone(), Definition::Pattern(Arc::new(pattern)));
                    }
                }
            }
            FrameKind::Filter => {
                if let Some(filter) = self.filter.take() {
                    if filter.id.is_empty() {
                        self.warn(&frame.name, "filter without id ignored");
                    } else {
                        self.define(filter.id.clone(), Definition::Filter(Arc::new(filter)));
                    }
                }
            }
            FrameKind::Style => {
                let css = std::mem::take(&mut self.style_text);
                for warning in self.definitions.stylesheet_mut().add_rules(&css) {
                    self.warn(&frame.name, warning);
                }
            }
            FrameKind::Text => {
                if frame.name == "text" {
                    self.text_cursor = None;
                }
            }
            FrameKind::Shape | FrameKind::Inert => {}
        }
    }

    /// Fragment transform for an accumulated element chain: the chain,
    /// then the root viewport mapping.
    fn document_transform(&self, chain: &SvgTransform) -> SvgTransform {
        SvgTransform::compose(chain, &self.viewport)
    }

    fn local_transform(&mut self, name: &str, attributes: &Attributes) -> SvgTransform {
        match attributes.get("transform").map(SvgTransform::parse) {
            None => SvgTransform::identity(),
            Some(Ok(t)) => t,
            Some(Err(e)) => {
                self.warn(name, e.to_string());
                SvgTransform::identity()
            }
        }
    }

    /// Cascade: inherited, presentation attributes, `<style>` rules
    /// (tag, class, id), inline `style`.
    fn resolve_style(&mut self, name: &str, attributes: &Attributes, inherited: &Style) -> Style {
        let mut declarations: Vec<_> = attributes
            .iter()
            .filter(|(k, _)| PRESENTATION_ATTRIBUTES.contains(k))
            .map(|(k, v)| crate::style::Declaration::new(k, v))
            .collect();
        declarations.extend(self.definitions.stylesheet().declarations_for(
            name,
            attributes.get("class"),
            attributes.get("id"),
        ));
        let inline = attributes.get("style");
        if let Some(inline) = inline {
            declarations.extend(parse_declarations(inline));
        }

        let resolved = Style::resolve(inherited, &declarations, &self.definitions);
        for warning in resolved.warnings {
            self.warn(name, warning);
        }
        let mut style = resolved.style;
        style.style_string = inline.map(str::to_string);
        style
    }

    // ==================== Shapes ====================

    fn start_shape(&mut self, name: &str, attributes: &Attributes) {
        let frame = self.child_frame(name, FrameKind::Shape, attributes, None);
        if let Some(path) = self.shape_path(name, attributes) {
            self.add_path(&frame, path);
        }
        self.frames.push(frame);
    }

    fn shape_path(&mut self, name: &str, attrs: &Attributes) -> Option<Path2D> {
        let (rw, rh) = self.percent_reference();
        let len = |attr: &str, reference: f32| attrs.length(attr, reference);
        let path = match name {
            "path" => {
                let parsed = parse_path_data(attrs.get("d")?);
                if let Some(error) = &parsed.error {
                    self.warn(name, error.to_string());
                }
                Some(parsed.to_path2d()).filter(|p| !p.is_empty())
            }
            "rect" => rect_path(
                len("x", rw).unwrap_or(0.0),
                len("y", rh).unwrap_or(0.0),
                len("width", rw).unwrap_or(0.0),
                len("height", rh).unwrap_or(0.0),
                len("rx", rw),
                len("ry", rh),
            ),
            "circle" => circle_path(
                len("cx", rw).unwrap_or(0.0),
                len("cy", rh).unwrap_or(0.0),
                len("r", (rw.powi(2) + rh.powi(2)).sqrt() / std::f32::consts::SQRT_2).unwrap_or(0.0),
            ),
            "ellipse" => ellipse_path(
                len("cx", rw).unwrap_or(0.0),
                len("cy", rh).unwrap_or(0.0),
                len("rx", rw).unwrap_or(0.0),
                len("ry", rh).unwrap_or(0.0),
            ),
            "line" => Some(line_path(
                len("x1", rw).unwrap_or(0.0),
                len("y1", rh).unwrap_or(0.0),
                len("x2", rw).unwrap_or(0.0),
                len("y2", rh).unwrap_or(0.0),
            )),
            "polyline" | "polygon" => poly_path(&parse_points(attrs.get("points")?), name == "polygon"),
            _ => None,
        };
        if path.is_none() {
            tracing::trace!(element = name, "Shape has no geometry");
        }
        path
    }

    /// Register a built path: fragment into the current container, plus a
    /// sprite for named shapes that are actually shown.
    fn add_path(&mut self, frame: &Frame, path: Path2D) {
        let transform = self.document_transform(&frame.transform);
        let segments = self.options.curve_segments;

        let named = frame
            .id
            .as_ref()
            .filter(|_| !frame.in_defs && frame.displayed && self.replaying.is_empty());
        let mut sprite = named.map(Sprite::new);
        let mut bounds = Rect::EMPTY;
        path.for_each_point(segments, |x, y| {
            bounds.include_point(x, y);
            if let Some(sprite) = sprite.as_mut() {
                sprite.adjust_bounding_box(x, y);
            }
        });

        if !frame.in_defs && frame.displayed {
            if let Some(use_sprite) = self.frames.iter_mut().rev().find_map(|f| f.use_sprite.as_mut()) {
                path.for_each_point(segments, |x, y| {
                    let (dx, dy) = transform.apply(x, y);
                    use_sprite.adjust_bounding_box(dx, dy);
                });
            }
        }

        let sprite_id = sprite.map(|mut sprite| {
            sprite.finish_bounding_box(transform.matrix());
            if !sprite.is_indexable() {
                tracing::debug!(name = sprite.name(), "Sprite has degenerate bounds");
            }
            self.sprites.insert(sprite)
        });

        let fragment = Fragment::Path(PathFragment {
            id: frame.id.clone(),
            path,
            bounds,
            style: frame.style.clone(),
            transform,
            sprite: sprite_id,
        });
        if let Some(container) = self.containers.last_mut() {
            container.children.push(fragment);
        }
    }

    fn percent_reference(&self) -> (f32, f32) {
        match &self.view_box {
            Some(vb) => (vb.width, vb.height),
            None => (self.width, self.height),
        }
    }

    // ==================== Use ====================

    fn start_use(&mut self, attributes: &Attributes) {
        let offset = SvgTransform::translate(attributes.length_or_zero("x"), attributes.length_or_zero("y"));
        let mut frame = self.child_frame("use", FrameKind::Container, attributes, Some(offset));
        if !frame.in_defs && frame.displayed && self.replaying.is_empty() {
            frame.use_sprite = frame.id.as_ref().map(Sprite::new);
        }
        self.push_container(frame);

        let Some(target) = attributes.href_id() else {
            self.warn("use", "missing or non-local href");
            return;
        };
        let Some(template) = self.definitions.template(target).map(Arc::clone) else {
            let what = match self.definitions.get(target) {
                Some(d) => format!("href #{target} is a {}, not an element", d.kind_name()),
                None => format!("href references undefined #{target}"),
            };
            self.warn("use", what);
            return;
        };
        if self.replaying.iter().any(|id| id == target) || self.replaying.len() >= MAX_USE_DEPTH {
            self.warn("use", format!("recursive reference to #{target} ignored"));
            return;
        }

        tracing::trace!(target, events = template.events.len(), "Instantiating template");
        self.replaying.push(target.to_string());
        self.replay(&template);
        self.replaying.pop();
    }

    fn replay(&mut self, template: &Template) {
        // A referenced symbol renders as a group.
        let rename = template.root_name() == Some("symbol");
        let last = template.events.len().saturating_sub(1);

        for (i, event) in template.events.iter().enumerate() {
            match event {
                MarkupEvent::Start { name, attributes } => {
                    let name = if rename && i == 0 { "g" } else { name.as_str() };
                    self.start_element(name, attributes);
                }
                MarkupEvent::End { name } => {
                    let name = if rename && i == last { "g" } else { name.as_str() };
                    self.end_element(name);
                }
                MarkupEvent::Text(text) => self.text(text),
            }
        }
    }

    fn record_start(&mut self, name: &str, attributes: &Attributes) {
        if !self.replaying.is_empty() {
            return;
        }
        for r in &mut self.recordings {
            r.depth += 1;
            r.events.push(MarkupEvent::Start {
                name: name.to_string(),
                attributes: attributes.clone(),
            });
        }
        if self.skip_depth == 0 && TEMPLATE_ELEMENTS.contains(&name) {
            if let Some(id) = attributes.get("id") {
                self.recordings.push(Recording {
                    id: id.to_string(),
                    depth: 1,
                    events: vec![MarkupEvent::Start {
                        name: name.to_string(),
                        attributes: attributes.clone(),
                    }],
                });
            }
        }
    }

    fn record_end(&mut self, name: &str) {
        if !self.replaying.is_empty() {
            return;
        }
        for r in &mut self.recordings {
            r.events.push(MarkupEvent::End { name: name.to_string() });
            r.depth = r.depth.saturating_sub(1);
        }
        while let Some(pos) = self.recordings.iter().position(|r| r.depth == 0) {
            let recording = self.recordings.remove(pos);
            let template = Template {
                id: recording.id.clone(),
                events: recording.events,
            };
            self.define(recording.id, Definition::Template(Arc::new(template)));
        }
    }

    fn define(&mut self, id: String, definition: Definition) {
        if self.definitions.contains(&id) {
            self.warn("defs", format!("duplicate id #{id}; first definition kept"));
            return;
        }
        tracing::trace!(id = %id, kind = definition.kind_name(), "Definition registered");
        self.definitions.insert(id, definition);
    }

    // ==================== Text ====================

    fn start_text(&mut self, name: &str, attributes: &Attributes) {
        let frame = self.child_frame(name, FrameKind::Text, attributes, None);
        let (rw, rh) = self.percent_reference();
        let first = |attr: &str, reference: f32| {
            attributes
                .get(attr)?
                .split(|c: char| c.is_whitespace() || c == ',')
                .find(|s| !s.is_empty())
                .and_then(SvgLength::parse)
                .map(|l| l.to_px(reference, frame.style.font_size))
        };

        let (mut x, mut y) = match (name, self.text_cursor) {
            ("tspan", Some(cursor)) => cursor,
            _ => (0.0, 0.0),
        };
        x = first("x", rw).unwrap_or(x) + first("dx", rw).unwrap_or(0.0);
        y = first("y", rh).unwrap_or(y) + first("dy", rh).unwrap_or(0.0);
        self.text_cursor = Some((x, y));

        self.frames.push(frame);
    }

    fn add_text_run(&mut self, content: &str) {
        let text = content.split_whitespace().collect::<Vec<_>>().join(" ");
        let Some(frame) = self.frames.last() else {
            return;
        };
        if text.is_empty() {
            return;
        }

        let (x, y) = self.text_cursor.unwrap_or((0.0, 0.0));
        let advance = text.chars().count() as f32 * frame.style.font_size * TEXT_ADVANCE_EM;
        let fragment = Fragment::Text(TextFragment {
            id: frame.id.clone(),
            text,
            x,
            y,
            style: frame.style.clone(),
            transform: self.document_transform(&frame.transform),
        });
        self.text_cursor = Some((x + advance, y));
        if let Some(container) = self.containers.last_mut() {
            container.children.push(fragment);
        }
    }

    // ==================== Paint Servers ====================

    fn start_stop(&mut self, attributes: &Attributes) {
        let frame = self.child_frame("stop", FrameKind::Inert, attributes, None);
        let current = frame.style.current_color;
        self.frames.push(frame);

        if self.gradient.is_none() {
            self.warn("stop", "stop outside a gradient ignored");
            return;
        }

        let mut color_value = attributes.get("stop-color").map(str::to_string);
        let mut opacity_value = attributes.get("stop-opacity").map(str::to_string);
        for decl in attributes.get("style").map(parse_declarations).unwrap_or_default() {
            match decl.name.as_str() {
                "stop-color" => color_value = Some(decl.value),
                "stop-opacity" => opacity_value = Some(decl.value),
                _ => {}
            }
        }

        let color = match color_value.as_deref() {
            None => Color::BLACK,
            Some(v) => parse_color(v, current).unwrap_or_else(|| {
                self.warn("stop", format!("invalid stop-color '{v}'"));
                Color::BLACK
            }),
        };
        let opacity = opacity_value
            .as_deref()
            .and_then(parse_fraction)
            .unwrap_or(1.0)
            .clamp(0.0, 1.0);
        let offset = attributes
            .get("offset")
            .and_then(parse_fraction)
            .unwrap_or(0.0)
            .clamp(0.0, 1.0);

        if let Some(gradient) = self.gradient.as_mut() {
            // Offsets never decrease.
            let offset = gradient.stops.last().map_or(offset, |s| offset.max(s.offset));
            gradient.stops.push(GradientStop {
                offset,
                color: color.with_alpha_factor(opacity),
            });
        }
    }

    fn finish_gradient(&mut self, builder: GradientBuilder) {
        let Some(id) = builder.id.clone() else {
            self.warn("linearGradient", "gradient without id ignored");
            return;
        };

        match builder.attributes.href_id().map(str::to_string) {
            Some(href) if !self.definitions.contains(&href) => {
                tracing::trace!(id = %id, href = %href, "Deferring gradient with forward href");
                self.deferred_gradients.push(builder);
            }
            Some(href) => {
                let base = self.definitions.gradient(&href).map(Arc::clone);
                if base.is_none() {
                    self.warn("linearGradient", format!("gradient #{id} href #{href} is not a gradient"));
                }
                let gradient = self.build_gradient(&id, &builder, base.as_deref());
                self.define(id, Definition::Gradient(Arc::new(gradient)));
            }
            None => {
                let gradient = self.build_gradient(&id, &builder, None);
                self.define(id, Definition::Gradient(Arc::new(gradient)));
            }
        }
    }

    fn resolve_deferred_gradients(&mut self) {
        loop {
            let pending = std::mem::take(&mut self.deferred_gradients);
            if pending.is_empty() {
                return;
            }
            let before = pending.len();
            for builder in pending {
                self.finish_gradient(builder);
            }
            if self.deferred_gradients.len() == before {
                break;
            }
        }

        for builder in std::mem::take(&mut self.deferred_gradients) {
            let id = builder.id.clone().unwrap_or_default();
            let href = builder.attributes.href_id().unwrap_or_default().to_string();
            self.warn("linearGradient", format!("gradient #{id} references undefined #{href}"));
            let gradient = self.build_gradient(&id, &builder, None);
            self.define(id, Definition::Gradient(Arc::new(gradient)));
        }
    }

    /// Descriptor from a gradient's own attributes, falling back to the
    /// referenced gradient for anything it does not specify.
    fn build_gradient(&mut self, id: &str, b: &GradientBuilder, base: Option<&GradientDescriptor>) -> GradientDescriptor {
        let attrs = &b.attributes;
        let units = attrs
            .get("gradientUnits")
            .and_then(Units::parse)
            .or(base.map(|g| g.units))
            .unwrap_or_default();
        let transform = match attrs.get("gradientTransform").map(SvgTransform::parse) {
            Some(Ok(t)) => *t.matrix(),
            Some(Err(e)) => {
                self.warn("linearGradient", e.to_string());
                Transform::identity()
            }
            None => base.map(|g| g.transform).unwrap_or_default(),
        };

        let (rw, rh) = self.percent_reference();
        let coord = |name: &str, reference: f32| -> Option<f32> {
            let value = attrs.get(name)?.trim();
            match (value.strip_suffix('%'), units) {
                (Some(p), Units::ObjectBoundingBox) => p.trim().parse::<f32>().ok().map(|v| v / 100.0),
                (Some(p), Units::UserSpaceOnUse) => p.trim().parse::<f32>().ok().map(|v| v / 100.0 * reference),
                (None, _) => value.parse().ok(),
            }
        };
        let full = |reference: f32| match units {
            Units::ObjectBoundingBox => 1.0,
            Units::UserSpaceOnUse => reference,
        };

        let kind = if b.radial {
            let inherited = match base.map(|g| g.kind) {
                Some(GradientKind::Radial { cx, cy, r, fx, fy }) => Some((cx, cy, r, fx, fy)),
                _ => None,
            };
            let (bcx, bcy, br, bfx, bfy) =
                inherited.unwrap_or((full(rw) / 2.0, full(rh) / 2.0, full(rw.max(rh)) / 2.0, f32::NAN, f32::NAN));
            let cx = coord("cx", rw).unwrap_or(bcx);
            let cy = coord("cy", rh).unwrap_or(bcy);
            let r = coord("r", rw.max(rh)).unwrap_or(br);
            let fx = coord("fx", rw).unwrap_or(if bfx.is_nan() { cx } else { bfx });
            let fy = coord("fy", rh).unwrap_or(if bfy.is_nan() { cy } else { bfy });
            GradientKind::Radial { cx, cy, r, fx, fy }
        } else {
            let (bx1, by1, bx2, by2) = match base.map(|g| g.kind) {
                Some(GradientKind::Linear { x1, y1, x2, y2 }) => (x1, y1, x2, y2),
                _ => (0.0, 0.0, full(rw), 0.0),
            };
            GradientKind::Linear {
                x1: coord("x1", rw).unwrap_or(bx1),
                y1: coord("y1", rh).unwrap_or(by1),
                x2: coord("x2", rw).unwrap_or(bx2),
                y2: coord("y2", rh).unwrap_or(by2),
            }
        };

        let stops = match (b.stops.is_empty(), base) {
            (true, Some(base)) => base.stops.clone(),
            _ => b.stops.clone(),
        };
        if stops.is_empty() {
            self.warn("linearGradient", format!("gradient #{id} has no stops"));
        }

        GradientDescriptor {
            id: id.to_string(),
            kind,
            stops,
            units,
            transform,
        }
    }

    fn start_pattern(&mut self, attributes: &Attributes) {
        let units = attributes
            .get("patternUnits")
            .and_then(Units::parse)
            .unwrap_or_default();
        let value = |name: &str| match units {
            Units::ObjectBoundingBox => attributes.get(name).and_then(parse_fraction),
            Units::UserSpaceOnUse => attributes.length(name, 0.0),
        };
        self.pattern = Some(PatternDescriptor {
            id: attributes.get("id").unwrap_or_default().to_string(),
            x: value("x").unwrap_or(0.0),
            y: value("y").unwrap_or(0.0),
            width: value("width").unwrap_or(0.0),
            height: value("height").unwrap_or(0.0),
            units,
            image: None,
        });

        // Pattern content is never drawn in place.
        let mut frame = self.child_frame("pattern", FrameKind::Pattern, attributes, None);
        frame.in_defs = true;
        self.containers.push(GroupFragment::default());
        self.frames.push(frame);
    }

    fn start_image(&mut self, attributes: &Attributes) {
        let frame = self.child_frame("image", FrameKind::Inert, attributes, None);
        self.frames.push(frame);

        if self.pattern.is_none() {
            self.warn("image", "image outside a pattern is not rendered");
            return;
        }
        let Some(href) = attributes.href() else {
            self.warn("image", "image without href");
            return;
        };
        match self.options.image_resolver.resolve(href) {
            Some(image) => {
                tracing::trace!(width = image.width, height = image.height, "Pattern image resolved");
                if let Some(pattern) = self.pattern.as_mut() {
                    pattern.image = Some(Arc::new(image));
                }
            }
            None => self.warn("image", "pattern image could not be decoded"),
        }
    }

    // ==================== Diagnostics ====================

    fn warn(&mut self, element: &str, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(element, "{message}");
        self.diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            message,
            element: Some(element.to_string()),
        });
    }
}

/// Map a viewBox onto a `width` x `height` viewport per
/// `preserveAspectRatio` (default `xMidYMid meet`).
fn viewport_transform(vb: &ViewBox, width: f32, height: f32, aspect: Option<&str>) -> SvgTransform {
    let sx = width / vb.width;
    let sy = height / vb.height;
    let to_origin = SvgTransform::translate(-vb.min_x, -vb.min_y);

    let mut parts = aspect.unwrap_or("xMidYMid meet").split_whitespace();
    let align = parts.next().unwrap_or("xMidYMid");
    if align == "none" {
        return SvgTransform::compose(&to_origin, &SvgTransform::scale(sx, sy));
    }

    let scale = if parts.next() == Some("slice") { sx.max(sy) } else { sx.min(sy) };
    let factor = |part: Option<&str>| match part {
        Some("xMin") | Some("YMin") => 0.0,
        Some("xMax") | Some("YMax") => 1.0,
        _ => 0.5,
    };
    let (ax, ay) = if align.len() == 8 {
        (factor(align.get(..4)), factor(align.get(4..)))
    } else {
        (0.5, 0.5)
    };
    let tx = (width - vb.width * scale) * ax;
    let ty = (height - vb.height * scale) * ay;

    let scaled = SvgTransform::compose(&to_origin, &SvgTransform::scale(scale, scale));
    SvgTransform::compose(&scaled, &SvgTransform::translate(tx, ty))
}

// ==================== Driver ====================

/// Build a document from markup in memory.
pub fn parse_str(source: &str, options: BuildOptions) -> Result<Document, SvgError> {
    parse_reader(source.as_bytes(), options)
}

/// Build a document from a markup stream.
///
/// XML syntax errors are recorded as diagnostics and reading continues;
/// the stream is abandoned only after repeated errors. A stream without
/// an `<svg>` element is an error.
pub fn parse_reader<R: BufRead>(input: R, options: BuildOptions) -> Result<Document, SvgError> {
    let mut reader = Reader::from_reader(input);
    reader.trim_text(true);
    reader.check_end_names(false);

    let mut builder = FragmentBuilder::new(options);
    let mut buf = Vec::new();
    let mut errors = 0usize;
    let mut last_error_at = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                let attributes = Attributes::from_event(&e);
                builder.start_element(&name, &attributes);
            }
            Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                let attributes = Attributes::from_event(&e);
                builder.start_element(&name, &attributes);
                builder.end_element(&name);
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                builder.end_element(&name);
            }
            Ok(Event::Text(e)) => match e.unescape() {
                Ok(text) => builder.text(&text),
                Err(err) => builder.markup_error(format!("bad character data: {err}")),
            },
            Ok(Event::CData(e)) => builder.text(&String::from_utf8_lossy(&e)),
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                let position = reader.buffer_position();
                builder.markup_error(format!("XML error at byte {position}: {err}"));
                errors += 1;
                if errors >= MAX_XML_ERRORS || last_error_at == Some(position) {
                    builder.markup_error("stopped reading after unrecoverable XML errors");
                    break;
                }
                last_error_at = Some(position);
            }
        }
        buf.clear();
    }

    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::FillType;
    use crate::transform::TransformKind;

    fn build(svg: &str) -> Document {
        parse_str(svg, BuildOptions::default()).expect("document builds")
    }

    fn sprite_rect(doc: &Document, name: &str) -> Rect {
        doc.sprite_named(name)
            .and_then(Sprite::bounding_rect)
            .unwrap_or_else(|| panic!("no bounds for {name}"))
    }

    #[test]
    fn test_named_path_round_trip() {
        let doc = build(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="100">
                 <path id="shape1" d="M0 0 L10 0 L10 10 Z" transform="translate(10,20)" style="fill:red"/>
               </svg>"#,
        );
        assert_eq!(sprite_rect(&doc, "shape1"), Rect::new(10.0, 20.0, 20.0, 30.0));

        let path = doc.path_fragments()[0];
        assert_eq!(path.transform.kind(), TransformKind::Translate);
        assert_eq!(path.style.fill_color, Color::from_rgb(255, 0, 0));
        assert_eq!(path.style.style_string.as_deref(), Some("fill:red"));
        assert!(path.sprite.is_some());
        assert!(doc.diagnostics.is_empty(), "{:?}", doc.diagnostics);
    }

    #[test]
    fn test_nested_group_composition() {
        let doc = build(
            r#"<svg width="50" height="50">
                 <g transform="scale(2)"><g transform="translate(5,0)">
                   <path id="p" d="M1 0 L2 0 L2 1 Z"/>
                 </g></g>
               </svg>"#,
        );
        let path = doc.path_fragments()[0];
        assert_eq!(path.transform.apply(1.0, 0.0), (7.0, 0.0));
        assert_eq!(doc.root.descendant_count(), 3);
    }

    #[test]
    fn test_missing_gradient_is_not_fatal() {
        let doc = build(
            r#"<svg width="10" height="10">
                 <rect id="a" width="5" height="5" style="fill:url(#missingGrad)"/>
                 <rect id="b" width="5" height="5" fill="blue"/>
               </svg>"#,
        );
        let paths = doc.path_fragments();
        assert_eq!(paths.len(), 2);
        assert!(!paths[0].style.fill_enabled);
        assert!(paths[1].style.fill_enabled);
        assert!(doc.diagnostics.iter().any(|d| d.message.contains("missingGrad")));
    }

    #[test]
    fn test_gradient_forward_reference_and_href_stops() {
        let doc = build(
            r##"<svg width="10" height="10">
                 <rect id="r" width="10" height="10" fill="url(#derived)"/>
                 <defs>
                   <linearGradient id="derived" href="#base" x2="0" y2="1"/>
                   <linearGradient id="base">
                     <stop offset="0" stop-color="red"/>
                     <stop offset="100%" style="stop-color:blue;stop-opacity:0.5"/>
                   </linearGradient>
                 </defs>
               </svg>"##,
        );
        let path = doc.path_fragments()[0];
        let FillType::Gradient(g) = &path.style.fill_type else {
            panic!("expected gradient fill, got {:?}", path.style.fill_type);
        };
        assert!(path.style.fill_enabled);
        assert_eq!(g.stops.len(), 2);
        assert_eq!(g.stops[1].color.a, 0.5);
        assert_eq!(g.kind, GradientKind::Linear { x1: 0.0, y1: 0.0, x2: 0.0, y2: 1.0 });
        assert!(doc.diagnostics.is_empty(), "{:?}", doc.diagnostics);
    }

    #[test]
    fn test_defs_shapes_make_no_sprites_until_used() {
        let doc = build(
            r##"<svg width="100" height="100">
                 <defs><rect id="tile" width="10" height="10" fill="green"/></defs>
                 <use id="placed" href="#tile" x="30" y="40"/>
                 <use xlink:href="#tile" x="60" y="60"/>
               </svg>"##,
        );
        assert!(doc.sprite_named("tile").is_none());
        assert_eq!(sprite_rect(&doc, "placed"), Rect::new(30.0, 40.0, 40.0, 50.0));
        assert_eq!(doc.sprites.len(), 1);
        assert_eq!(doc.path_fragments().len(), 2);
        assert!(doc.definitions.template("tile").is_some());
    }

    #[test]
    fn test_symbol_instantiated_as_group() {
        let doc = build(
            r##"<svg width="100" height="100">
                 <symbol id="dot"><circle cx="5" cy="5" r="5"/></symbol>
                 <use id="d1" href="#dot" transform="translate(10 10)"/>
               </svg>"##,
        );
        assert_eq!(doc.path_fragments().len(), 1);
        let r = sprite_rect(&doc, "d1");
        assert!((r.min_x - 10.0).abs() < 0.01 && (r.max_x - 20.0).abs() < 0.01);
        let path = doc.path_fragments()[0];
        assert_eq!(path.sprite, doc.sprites.find("d1"));
    }

    #[test]
    fn test_recursive_use_is_cut() {
        let doc = build(
            r##"<svg width="10" height="10">
                 <defs>
                   <g id="a"><rect width="1" height="1"/><use href="#b"/></g>
                   <g id="b"><use href="#a"/></g>
                 </defs>
                 <use href="#a"/>
               </svg>"##,
        );
        assert_eq!(doc.path_fragments().len(), 1);
        assert!(doc.diagnostics.iter().any(|d| d.message.contains("recursive")));
    }

    #[test]
    fn test_cascade_order() {
        let doc = build(
            r#"<svg width="10" height="10">
                 <style>rect { fill: red; stroke: black } .c { fill: green } #x { fill: blue; stroke-width: 3 }</style>
                 <rect id="x" class="c" width="1" height="1" fill="yellow" stroke="white"/>
                 <rect class="c" width="1" height="1" fill="yellow"/>
                 <rect width="1" height="1" fill="yellow" style="fill: purple"/>
               </svg>"#,
        );
        let paths = doc.path_fragments();
        assert_eq!(paths[0].style.fill_color, Color::from_rgb(0, 0, 255));
        assert_eq!(paths[0].style.stroke_color, Color::BLACK);
        assert_eq!(paths[0].style.stroke_width, 3.0);
        assert_eq!(paths[1].style.fill_color, Color::from_rgb(0, 128, 0));
        assert_eq!(paths[2].style.fill_color, Color::from_rgb(128, 0, 128));
    }

    #[test]
    fn test_inheritance_through_groups() {
        let doc = build(
            r#"<svg width="10" height="10">
                 <g fill="red" stroke="blue" opacity="0.5">
                   <rect width="1" height="1" stroke-width="4"/>
                 </g>
               </svg>"#,
        );
        let rect = doc.path_fragments()[0];
        assert_eq!(rect.style.fill_color, Color::from_rgb(255, 0, 0));
        assert_eq!(rect.style.stroke_color, Color::from_rgb(0, 0, 255));
        assert_eq!(rect.style.stroke_width, 4.0);
        assert_eq!(rect.style.opacity, 1.0);
        match &doc.root.children[0] {
            Fragment::Group(g) => assert_eq!(g.style.opacity, 0.5),
            other => panic!("expected group, got {other:?}"),
        }
    }

    #[test]
    fn test_view_box_maps_to_image_space() {
        let doc = build(
            r#"<svg width="200" height="200" viewBox="0 0 100 100">
                 <rect id="r" x="10" y="10" width="10" height="10"/>
               </svg>"#,
        );
        assert_eq!((doc.width, doc.height), (200.0, 200.0));
        assert_eq!(sprite_rect(&doc, "r"), Rect::new(20.0, 20.0, 40.0, 40.0));
    }

    #[test]
    fn test_view_box_meet_centers() {
        let doc = build(
            r#"<svg width="200" height="100" viewBox="0 0 50 50">
                 <rect id="r" width="50" height="50"/>
               </svg>"#,
        );
        assert_eq!(sprite_rect(&doc, "r"), Rect::new(50.0, 0.0, 150.0, 100.0));
    }

    #[test]
    fn test_size_from_view_box() {
        let doc = build(r#"<svg viewBox="0 0 40 20" width="80"/>"#);
        assert_eq!((doc.width, doc.height), (80.0, 40.0));
        let doc = build("<svg/>");
        assert_eq!((doc.width, doc.height), (300.0, 150.0));
    }

    #[test]
    fn test_non_finite_root_size_falls_back() {
        let doc = build(r#"<svg width="1e39" height="inf"/>"#);
        assert_eq!((doc.width, doc.height), (300.0, 150.0));
        let invalid: Vec<_> = doc
            .diagnostics
            .iter()
            .filter(|d| d.message.starts_with("Invalid attribute"))
            .collect();
        assert_eq!(invalid.len(), 2, "{:?}", doc.diagnostics);

        let doc = build(r#"<svg viewBox="0 0 inf 20"/>"#);
        assert!(doc.view_box.is_none());
        assert_eq!((doc.width, doc.height), (300.0, 150.0));
        assert!(doc.diagnostics.iter().any(|d| d.message.contains("viewBox 'inf")));
    }

    #[test]
    fn test_hidden_and_degenerate_shapes() {
        let doc = build(
            r#"<svg width="10" height="10">
                 <rect id="gone" width="5" height="5" display="none"/>
                 <g style="display:none"><rect id="inside" width="5" height="5"/></g>
                 <line id="flat" x1="0" y1="5" x2="10" y2="5" stroke="black"/>
                 <rect id="empty" width="0" height="5"/>
               </svg>"#,
        );
        assert!(doc.sprite_named("gone").is_none());
        assert!(doc.sprite_named("inside").is_none());
        assert!(doc.sprite_named("empty").is_none());
        let flat = doc.sprite_named("flat").unwrap();
        assert!(!flat.is_indexable());
        assert_eq!(doc.path_fragments().len(), 3);
    }

    #[test]
    fn test_text_runs() {
        let doc = build(
            r#"<svg width="100" height="100">
                 <text id="label" x="10" y="20" font-size="10">Hello
                   <tspan fill="red">big   world</tspan>
                   <tspan x="50" y="60">there</tspan>
                 </text>
               </svg>"#,
        );
        let mut runs = Vec::new();
        for child in &doc.root.children {
            child.walk(&mut |f| {
                if let Fragment::Text(t) = f {
                    runs.push(t.clone());
                }
            });
        }
        assert_eq!(runs.len(), 3);
        assert_eq!(runs[0].text, "Hello");
        assert_eq!((runs[0].x, runs[0].y), (10.0, 20.0));
        assert_eq!(runs[1].text, "big world");
        assert_eq!(runs[1].x, 10.0 + 5.0 * 10.0 * TEXT_ADVANCE_EM);
        assert_eq!(runs[1].style.fill_color, Color::from_rgb(255, 0, 0));
        assert_eq!((runs[2].x, runs[2].y), (50.0, 60.0));
        assert_eq!(runs[0].style.font_size, 10.0);
    }

    struct Checkerboard;

    impl ImageResolver for Checkerboard {
        fn resolve(&self, href: &str) -> Option<RasterImage> {
            href.starts_with("data:").then(|| RasterImage::solid(2, 2, Color::WHITE))
        }
    }

    #[test]
    fn test_pattern_with_resolved_image() {
        let svg = r#"<svg width="10" height="10">
                 <pattern id="p" width="4" height="4" patternUnits="userSpaceOnUse">
                   <image href="data:image/png;base64,AAAA" width="4" height="4"/>
                 </pattern>
                 <rect width="10" height="10" fill="url(#p)"/>
               </svg>"#;
        let options = BuildOptions::default().with_image_resolver(Arc::new(Checkerboard));
        let doc = parse_str(svg, options).unwrap();
        let rect = doc.path_fragments()[0];
        match &rect.style.fill_type {
            FillType::Pattern(p) => {
                assert!(p.image.is_some());
                assert_eq!((p.width, p.height), (4.0, 4.0));
            }
            other => panic!("expected pattern fill, got {other:?}"),
        }

        let without = parse_str(svg, BuildOptions::default()).unwrap();
        assert!(without.diagnostics.iter().any(|d| d.element.as_deref() == Some("image")));
    }

    #[test]
    fn test_filter_retained() {
        let doc = build(
            r#"<svg width="10" height="10">
                 <filter id="blur"><feGaussianBlur stdDeviation="2"/><feOffset dx="1"/></filter>
                 <rect width="1" height="1" filter="url(#blur)"/>
               </svg>"#,
        );
        let filter = doc.path_fragments()[0].style.filter.clone().unwrap();
        assert_eq!(filter.primitive_names().collect::<Vec<_>>(), vec!["feGaussianBlur", "feOffset"]);
    }

    #[test]
    fn test_recovers_from_bad_markup() {
        let doc = build(
            r#"<svg width="10" height="10">
                 <blink><rect id="skipped" width="1" height="1"/></blink>
                 <g><rect id="kept" width="1" height="1"/></svg>"#,
        );
        assert!(doc.sprite_named("skipped").is_none());
        assert!(doc.sprite_named("kept").is_some());
        assert!(doc.diagnostics.iter().any(|d| d.element.as_deref() == Some("blink")));
        assert!(doc.diagnostics.iter().any(|d| d.severity == Severity::Error));
    }

    #[test]
    fn test_truncated_document_still_builds() {
        let doc = build(r#"<svg width="10" height="10"><g><rect id="r" width="2" height="2"/>"#);
        assert!(doc.sprite_named("r").is_some());
        assert!(doc.diagnostics.iter().any(|d| d.message.contains("unclosed")));
    }

    #[test]
    fn test_no_svg_root() {
        assert_eq!(
            parse_str("<html><body/></html>", BuildOptions::default()).err(),
            Some(SvgError::NoRootElement)
        );
        assert_eq!(parse_str("", BuildOptions::default()).err(), Some(SvgError::NoRootElement));
    }

    #[test]
    fn test_driven_by_hand() {
        let mut builder = FragmentBuilder::new(BuildOptions::default());
        builder.start_element("svg", &Attributes::from_pairs([("width", "10"), ("height", "10")]));
        builder.start_element(
            "circle",
            &Attributes::from_pairs([("id", "c"), ("cx", "5"), ("cy", "5"), ("r", "2")]),
        );
        builder.end_element("circle");
        builder.end_element("svg");
        let doc = builder.finish().unwrap();

        let r = sprite_rect(&doc, "c");
        assert!((r.min_x - 3.0).abs() < 0.01 && (r.max_y - 7.0).abs() < 0.01);
    }

    #[test]
    fn test_highlight_round_trip() {
        let mut doc = build(r#"<svg width="10" height="10"><rect id="r" width="2" height="2"/></svg>"#);
        let id = doc.sprites.find("r").unwrap();
        assert!(doc.set_highlighted(id, true));
        assert!(doc.path_fragments()[0].style.highlighted);
        assert!(doc.sprites.get(id).unwrap().is_highlighted());
        doc.clear_highlights();
        assert!(!doc.path_fragments()[0].style.highlighted);
    }
}
