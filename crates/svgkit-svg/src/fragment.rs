//! The drawable fragment tree.

use svgkit_canvas::{Color, PaintStyle, Path2D, RasterContext, Transform};
use svgkit_index::{Rect, SpriteId};

use crate::style::Style;
use crate::transform::SvgTransform;

/// Draw-time settings shared by every fragment in one pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawOptions {
    /// Fill used for highlighted shapes instead of their own paint.
    pub highlight_color: Color,
}

impl Default for DrawOptions {
    fn default() -> Self {
        Self {
            highlight_color: Color::new(255, 200, 0, 160.0 / 255.0),
        }
    }
}

// ==================== Fragments ====================

/// A shape with its flattened geometry source and resolved style.
#[derive(Debug, Clone, PartialEq)]
pub struct PathFragment {
    pub id: Option<String>,
    pub path: Path2D,
    /// Bounds of `path` in its own coordinates.
    pub bounds: Rect,
    pub style: Style,
    /// Full transform from path coordinates to document space.
    pub transform: SvgTransform,
    pub sprite: Option<SpriteId>,
}

/// A run of text anchored at its baseline start.
#[derive(Debug, Clone, PartialEq)]
pub struct TextFragment {
    pub id: Option<String>,
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub style: Style,
    pub transform: SvgTransform,
}

/// An ordered container. Children carry fully composed transforms, so a
/// group only scopes context state and opacity.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GroupFragment {
    pub id: Option<String>,
    pub style: Style,
    pub transform: SvgTransform,
    pub children: Vec<Fragment>,
}

/// One node of the drawable tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    Path(PathFragment),
    Text(TextFragment),
    Group(GroupFragment),
}

impl Fragment {
    pub fn id(&self) -> Option<&str> {
        match self {
            Fragment::Path(p) => p.id.as_deref(),
            Fragment::Text(t) => t.id.as_deref(),
            Fragment::Group(g) => g.id.as_deref(),
        }
    }

    pub fn style(&self) -> &Style {
        match self {
            Fragment::Path(p) => &p.style,
            Fragment::Text(t) => &t.style,
            Fragment::Group(g) => &g.style,
        }
    }

    pub fn style_mut(&mut self) -> &mut Style {
        match self {
            Fragment::Path(p) => &mut p.style,
            Fragment::Text(t) => &mut t.style,
            Fragment::Group(g) => &mut g.style,
        }
    }

    pub fn transform(&self) -> &SvgTransform {
        match self {
            Fragment::Path(p) => &p.transform,
            Fragment::Text(t) => &t.transform,
            Fragment::Group(g) => &g.transform,
        }
    }

    /// Draw into `ctx`, whose current transform maps document space to
    /// the target.
    pub fn draw(&self, ctx: &mut dyn RasterContext, options: &DrawOptions) {
        match self {
            Fragment::Path(p) => p.draw(ctx, options),
            Fragment::Text(t) => t.draw(ctx),
            Fragment::Group(g) => g.draw(ctx, options),
        }
    }

    /// Pre-order visit of this fragment and its descendants.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Fragment)) {
        f(self);
        if let Fragment::Group(g) = self {
            for child in &g.children {
                child.walk(f);
            }
        }
    }

    pub fn walk_mut(&mut self, f: &mut impl FnMut(&mut Fragment)) {
        f(self);
        if let Fragment::Group(g) = self {
            for child in &mut g.children {
                child.walk_mut(f);
            }
        }
    }
}

impl PathFragment {
    fn draw(&self, ctx: &mut dyn RasterContext, options: &DrawOptions) {
        let style = &self.style;
        if !style.display || !style.visible {
            return;
        }

        ctx.save();
        ctx.concat_transform(self.transform.matrix());
        let alpha = ctx.state().global_alpha * style.opacity;

        let fill = if style.highlighted {
            Some(PaintStyle::Color(options.highlight_color))
        } else {
            style.fill_paint(&self.bounds)
        };
        if let Some(paint) = fill {
            ctx.set_fill_style(paint);
            ctx.set_fill_rule(style.fill_rule);
            ctx.set_global_alpha(if style.highlighted { alpha } else { alpha * style.fill_opacity });
            ctx.fill_path(&self.path);
        }

        if let Some(paint) = style.stroke_paint() {
            ctx.set_stroke_style(paint);
            ctx.set_line_width(style.stroke_width);
            ctx.set_line_cap(style.line_cap);
            ctx.set_line_join(style.line_join);
            ctx.set_miter_limit(style.miter_limit);
            ctx.set_global_alpha(alpha * style.stroke_opacity);
            ctx.stroke_path(&self.path);
        }

        ctx.restore();
    }
}

impl TextFragment {
    fn draw(&self, ctx: &mut dyn RasterContext) {
        let style = &self.style;
        if !style.display || !style.visible || !style.fill_enabled || self.text.is_empty() {
            return;
        }

        ctx.save();
        ctx.concat_transform(self.transform.matrix());
        let alpha = ctx.state().global_alpha * style.opacity * style.fill_opacity;
        ctx.set_global_alpha(alpha);
        ctx.set_fill_style(PaintStyle::Color(style.fill_color));
        ctx.set_font(&style.font_family, style.font_size);
        ctx.fill_text(&self.text, self.x, self.y);
        ctx.restore();
    }
}

impl GroupFragment {
    pub fn new(id: Option<String>, style: Style, transform: SvgTransform) -> Self {
        Self {
            id,
            style,
            transform,
            children: Vec::new(),
        }
    }

    fn draw(&self, ctx: &mut dyn RasterContext, options: &DrawOptions) {
        if !self.style.display {
            return;
        }
        ctx.save();
        let alpha = ctx.state().global_alpha * self.style.opacity;
        ctx.set_global_alpha(alpha);
        for child in &self.children {
            child.draw(ctx, options);
        }
        ctx.restore();
    }

    /// Number of fragments below this group.
    pub fn descendant_count(&self) -> usize {
        self.children
            .iter()
            .map(|c| match c {
                Fragment::Group(g) => 1 + g.descendant_count(),
                _ => 1,
            })
            .sum()
    }

    /// Set the highlight flag on every path fragment owning `sprite`.
    /// Returns whether any fragment matched.
    pub fn set_highlighted(&mut self, sprite: SpriteId, highlighted: bool) -> bool {
        let mut found = false;
        for child in &mut self.children {
            child.walk_mut(&mut |f| {
                if let Fragment::Path(p) = f {
                    if p.sprite == Some(sprite) {
                        p.style.highlighted = highlighted;
                        found = true;
                    }
                }
            });
        }
        found
    }

    /// Clear every highlight flag in the subtree.
    pub fn clear_highlights(&mut self) {
        for child in &mut self.children {
            child.walk_mut(&mut |f| f.style_mut().highlighted = false);
        }
    }
}

/// Draw `root` under `global`, the document-to-target transform (pan and
/// zoom). The context state is left as it was found.
pub fn render(root: &GroupFragment, ctx: &mut dyn RasterContext, global: &Transform, options: &DrawOptions) {
    ctx.save();
    ctx.concat_transform(global);
    root.draw(ctx, options);
    ctx.restore();
}
