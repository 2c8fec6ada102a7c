//! # SvgKit Renderer
//!
//! Facade over a built SVG scene: draws it under a pan/zoom view into
//! targets supplied by a [`RenderHost`] and answers "what was tapped here".
//!
//! ## Features
//!
//! - **Scene**: fragment tree + sprite arena + quadtree, built once per parse
//! - **Renderer**: view transform, render passes, `locate`, highlight feedback
//! - **Hosts**: tiny-skia pixmaps or recorded command lists
//! - **Background builds**: build the next scene on a worker thread and swap it in
//!
//! ## Architecture
//!
//! ```text
//! markup ──> svgkit-svg ──> Document ──> Scene { document, QuadTree }
//!                                            │
//!                       RenderHost <── Renderer ──> locate(x, y) -> name
//!                     allocate / draw_finished
//! ```

use svgkit_canvas::{Color, RasterContext};
use svgkit_common::{Result, SvgKitError, ViewerConfig};
use svgkit_index::SpriteId;
use svgkit_svg::DrawOptions;

pub mod host;
pub mod scene;
pub mod view;

pub use host::{PixmapHost, RecordingHost, RenderHost};
pub use scene::{build_options, spawn_build, BuildHandle, Scene, SceneStats};
pub use view::ViewTransform;

// ==================== Renderer ====================

/// Draws one scene and hit-tests against it.
///
/// A renderer can only be created from a finished [`Scene`], so there is
/// no way to draw or locate before a build completes.
#[derive(Debug)]
pub struct Renderer<H: RenderHost> {
    scene: Scene,
    host: H,
    view: ViewTransform,
    view_width: u32,
    view_height: u32,
    background: Color,
    draw_options: DrawOptions,
    highlighted: Option<SpriteId>,
}

impl<H: RenderHost> Renderer<H> {
    /// View size comes from the configuration, or the document size when
    /// the configured size is zero.
    pub fn new(scene: Scene, host: H, config: &ViewerConfig) -> Self {
        let view_width = match config.render.width {
            0 => scene.width().ceil().max(1.0) as u32,
            w => w,
        };
        let view_height = match config.render.height {
            0 => scene.height().ceil().max(1.0) as u32,
            h => h,
        };

        tracing::debug!(view_width, view_height, "Renderer created");

        Self {
            scene,
            host,
            view: ViewTransform::IDENTITY,
            view_width,
            view_height,
            background: Color::from_rgba8(config.render.background),
            draw_options: DrawOptions {
                highlight_color: Color::from_rgba8(config.render.highlight_color),
            },
            highlighted: None,
        }
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn view(&self) -> ViewTransform {
        self.view
    }

    pub fn view_size(&self) -> (u32, u32) {
        (self.view_width, self.view_height)
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.view_width = width.max(1);
        self.view_height = height.max(1);
    }

    // ==================== Drawing ====================

    /// One full pass: allocate a target, clear it, draw, hand it back.
    pub fn render(&mut self) -> Result<()> {
        let start = std::time::Instant::now();
        let mut target = self.host.allocate(self.view_width, self.view_height)?;
        target.clear(self.background);
        self.render_into(&mut target);
        self.host.draw_finished(target);

        tracing::debug!(
            elapsed_us = start.elapsed().as_micros() as u64,
            scale_x = self.view.scale_x,
            scale_y = self.view.scale_y,
            "Render pass finished"
        );
        Ok(())
    }

    /// Draw the scene into a caller-owned context under the current view.
    pub fn render_into(&self, ctx: &mut dyn RasterContext) {
        svgkit_svg::render(&self.scene.document().root, ctx, &self.view.matrix(), &self.draw_options);
    }

    // ==================== Hit Testing ====================

    /// Name of the most specific sprite under the view point `(x, y)`.
    pub fn locate(&self, x: f32, y: f32) -> Option<&str> {
        self.locate_id(x, y).and_then(|id| self.scene.sprite_name(id))
    }

    pub fn locate_id(&self, x: f32, y: f32) -> Option<SpriteId> {
        let point = self.view.to_document(x, y)?;
        self.scene.hit(point)
    }

    // ==================== View ====================

    pub fn set_view(&mut self, view: ViewTransform) -> Result<()> {
        if !view.is_valid() {
            return Err(SvgKitError::InvalidArgument(format!("invalid view transform {view:?}")));
        }
        self.view = view;
        Ok(())
    }

    /// Zoom by `factor` around the view point `(x, y)`.
    pub fn zoom_about(&mut self, x: f32, y: f32, factor: f32) -> Result<()> {
        self.zoom_about_axes(x, y, factor, factor)
    }

    /// Zoom each axis by its own factor around the view point `(x, y)`.
    pub fn zoom_about_axes(&mut self, x: f32, y: f32, factor_x: f32, factor_y: f32) -> Result<()> {
        for factor in [factor_x, factor_y] {
            if !(factor.is_finite() && factor > 0.0) {
                return Err(SvgKitError::InvalidArgument(format!("invalid zoom factor {factor}")));
            }
        }
        self.set_view(self.view.zoomed_about(x, y, factor_x, factor_y))
    }

    pub fn pan_by(&mut self, dx: f32, dy: f32) {
        let panned = self.view.panned(dx, dy);
        if panned.is_valid() {
            self.view = panned;
        }
    }

    /// Show the whole document centered in the view.
    pub fn fit_to_view(&mut self) {
        self.view = ViewTransform::fit(
            self.scene.width(),
            self.scene.height(),
            self.view_width as f32,
            self.view_height as f32,
        );
    }

    /// Fill the view with the document, scaling each axis on its own.
    pub fn stretch_to_view(&mut self) {
        self.view = ViewTransform::stretch(
            self.scene.width(),
            self.scene.height(),
            self.view_width as f32,
            self.view_height as f32,
        );
    }

    // ==================== Highlight ====================

    /// Highlight the named sprite, replacing any previous highlight.
    pub fn highlight(&mut self, name: &str) -> bool {
        let Some(id) = self.scene.document().sprites.find(name) else {
            tracing::debug!(name, "No sprite to highlight");
            return false;
        };
        self.clear_highlight();
        self.scene.document_mut().set_highlighted(id, true);
        self.highlighted = Some(id);
        true
    }

    pub fn clear_highlight(&mut self) {
        if let Some(id) = self.highlighted.take() {
            self.scene.document_mut().set_highlighted(id, false);
        }
    }

    pub fn highlighted(&self) -> Option<&str> {
        self.highlighted.and_then(|id| self.scene.sprite_name(id))
    }

    // ==================== Scene Swap ====================

    /// Swap in a newly built scene, returning the previous one with its
    /// highlight cleared. The view is kept.
    pub fn replace_scene(&mut self, scene: Scene) -> Scene {
        self.clear_highlight();
        let old = std::mem::replace(&mut self.scene, scene);
        tracing::debug!(sprites = self.scene.document().sprites.len(), "Scene replaced");
        old
    }
}
