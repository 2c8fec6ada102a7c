//! Raster targets supplied by the embedding application.

use svgkit_canvas::{CanvasRenderingContext2D, PixmapCanvas, RasterContext};
use svgkit_common::{Result, SvgKitError};

/// The embedding side of the renderer: hands out raster targets and is
/// told when a draw pass into one has finished.
pub trait RenderHost {
    type Target: RasterContext;

    /// A fresh target of `width` x `height` pixels.
    fn allocate(&mut self, width: u32, height: u32) -> Result<Self::Target>;

    /// Called once per completed pass with the drawn target.
    fn draw_finished(&mut self, target: Self::Target);
}

/// Rasterizes into tiny-skia pixmaps and keeps the latest frame.
#[derive(Debug)]
pub struct PixmapHost {
    anti_alias: bool,
    frame: Option<PixmapCanvas>,
    frames_drawn: u64,
}

impl PixmapHost {
    pub fn new(anti_alias: bool) -> Self {
        Self {
            anti_alias,
            frame: None,
            frames_drawn: 0,
        }
    }

    pub fn last_frame(&self) -> Option<&PixmapCanvas> {
        self.frame.as_ref()
    }

    pub fn take_frame(&mut self) -> Option<PixmapCanvas> {
        self.frame.take()
    }

    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }
}

impl Default for PixmapHost {
    fn default() -> Self {
        Self::new(true)
    }
}

impl RenderHost for PixmapHost {
    type Target = PixmapCanvas;

    fn allocate(&mut self, width: u32, height: u32) -> Result<PixmapCanvas> {
        let mut canvas = PixmapCanvas::new(width, height)
            .map_err(|e| SvgKitError::render_with_source("failed to allocate raster target", e))?;
        canvas.set_anti_alias(self.anti_alias);
        Ok(canvas)
    }

    fn draw_finished(&mut self, target: PixmapCanvas) {
        self.frames_drawn += 1;
        self.frame = Some(target);
    }
}

/// Records draw commands instead of pixels; every finished pass is kept.
#[derive(Debug, Default)]
pub struct RecordingHost {
    frames: Vec<CanvasRenderingContext2D>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> &[CanvasRenderingContext2D] {
        &self.frames
    }

    pub fn last_frame(&self) -> Option<&CanvasRenderingContext2D> {
        self.frames.last()
    }
}

impl RenderHost for RecordingHost {
    type Target = CanvasRenderingContext2D;

    fn allocate(&mut self, width: u32, height: u32) -> Result<CanvasRenderingContext2D> {
        Ok(CanvasRenderingContext2D::new(width, height))
    }

    fn draw_finished(&mut self, target: CanvasRenderingContext2D) {
        self.frames.push(target);
    }
}
