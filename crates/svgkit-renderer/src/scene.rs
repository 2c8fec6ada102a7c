//! Finished builds: the fragment tree plus its spatial index.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread::JoinHandle;

use svgkit_common::{IndexConfig, OptionExt, Result, ResultExt, SvgKitError, ViewerConfig};
use svgkit_index::{most_specific, Point, QuadTree, QuadTreeConfig, QuadTreeStats, Rect, SpriteId};
use svgkit_svg::{BuildOptions, Diagnostic, Document};

/// Build settings derived from the viewer configuration.
pub fn build_options(config: &ViewerConfig) -> BuildOptions {
    BuildOptions {
        curve_segments: config.render.curve_segments,
        default_font_family: config.text.default_font_family.clone(),
        default_font_size: config.text.default_font_size,
        ..BuildOptions::default()
    }
}

/// A fully built document and its hit-test index.
///
/// Scenes are immutable apart from highlight flags, and only exist once
/// a build has run to completion.
#[derive(Debug, Clone)]
pub struct Scene {
    document: Document,
    index: QuadTree,
}

impl Scene {
    /// Index every sprite with a usable box.
    pub fn new(document: Document, config: &IndexConfig) -> Self {
        let bounds = document
            .sprites
            .iter()
            .filter_map(|(_, sprite)| sprite.bounding_rect())
            .fold(document.bounds(), |acc, rect| acc.union(&rect));

        let mut index = QuadTree::new(
            bounds,
            QuadTreeConfig {
                max_node_capacity: config.max_node_capacity,
                max_depth: config.max_depth,
            },
        );

        let mut skipped = 0usize;
        for (id, sprite) in document.sprites.iter() {
            let Some(rect) = sprite.bounding_rect().filter(|_| sprite.is_indexable()) else {
                skipped += 1;
                continue;
            };
            if let Err(e) = index.insert(id, rect) {
                tracing::warn!(name = sprite.name(), error = %e, "Sprite left out of index");
                skipped += 1;
            }
        }

        tracing::debug!(
            indexed = index.len(),
            skipped,
            leaves = index.count_leaves(),
            depth = index.depth(),
            "Scene indexed"
        );

        Self { document, index }
    }

    pub fn parse_str(source: &str, config: &ViewerConfig) -> Result<Self> {
        Self::parse_reader(source.as_bytes(), config)
    }

    pub fn parse_reader<R: BufRead>(input: R, config: &ViewerConfig) -> Result<Self> {
        Self::parse_with(input, build_options(config), &config.index)
    }

    /// Build with explicit options, e.g. a custom image resolver.
    pub fn parse_with<R: BufRead>(input: R, options: BuildOptions, config: &IndexConfig) -> Result<Self> {
        let document = svgkit_svg::parse_reader(input, options)
            .map_err(|e| SvgKitError::parse_with_source("failed to build SVG scene", e))?;
        if !document.diagnostics.is_empty() {
            tracing::info!(count = document.diagnostics.len(), "Document built with diagnostics");
        }
        Ok(Self::new(document, config))
    }

    pub fn open(path: impl AsRef<Path>, config: &ViewerConfig) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "Opening SVG");
        let file = File::open(path)?;
        Self::parse_reader(BufReader::new(file), config)
    }

    // ==================== Accessors ====================

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub(crate) fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn index(&self) -> &QuadTree {
        &self.index
    }

    pub fn width(&self) -> f32 {
        self.document.width
    }

    pub fn height(&self) -> f32 {
        self.document.height
    }

    pub fn bounds(&self) -> Rect {
        self.document.bounds()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.document.diagnostics
    }

    // ==================== Queries ====================

    /// Most specific sprite at a document-space point.
    pub fn hit(&self, point: Point) -> Option<SpriteId> {
        let candidates = self.index.query_point(point);
        let hit = most_specific(&self.document.sprites, &candidates);
        tracing::trace!(x = point.x, y = point.y, candidates = candidates.len(), ?hit, "Hit test");
        hit
    }

    pub fn sprite_id(&self, name: &str) -> Result<SpriteId> {
        self.document
            .sprites
            .find(name)
            .ok_or_not_found(format!("sprite '{name}'"))
    }

    pub fn sprite_name(&self, id: SpriteId) -> Option<&str> {
        self.document.sprites.get(id).map(|s| s.name())
    }

    /// Names of the sprites sharing an index leaf with `name`.
    pub fn neighbors(&self, name: &str) -> Vec<&str> {
        let Some(id) = self.document.sprites.find(name) else {
            return Vec::new();
        };
        self.index
            .query_group(id)
            .into_iter()
            .filter_map(|other| self.sprite_name(other))
            .collect()
    }

    pub fn stats(&self) -> SceneStats {
        SceneStats {
            fragments: self.document.root.descendant_count(),
            sprites: self.document.sprites.len(),
            definitions: self.document.definitions.len(),
            diagnostics: self.document.diagnostics.len(),
            index: self.index.stats(),
        }
    }
}

/// Counts describing a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneStats {
    pub fragments: usize,
    pub sprites: usize,
    pub definitions: usize,
    pub diagnostics: usize,
    pub index: QuadTreeStats,
}

// ==================== Background Builds ====================

/// A scene being built on another thread.
#[derive(Debug)]
pub struct BuildHandle {
    receiver: Receiver<Result<Scene>>,
    thread: Option<JoinHandle<()>>,
}

impl BuildHandle {
    /// Block until the build finishes.
    pub fn wait(mut self) -> Result<Scene> {
        let result = self.receiver.recv().unwrap_or(Err(SvgKitError::Cancelled));
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        result
    }

    /// The finished scene, if ready.
    pub fn try_take(&mut self) -> Option<Result<Scene>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(SvgKitError::Cancelled)),
        }
    }
}

/// Build a scene off the calling thread. The current renderer keeps
/// serving draws until the result is swapped in with
/// [`Renderer::replace_scene`](crate::Renderer::replace_scene).
pub fn spawn_build(source: String, config: ViewerConfig) -> Result<BuildHandle> {
    let (sender, receiver) = mpsc::channel();
    let thread = std::thread::Builder::new()
        .name("svgkit-build".to_string())
        .spawn(move || {
            let result = Scene::parse_str(&source, &config);
            if sender.send(result).is_err() {
                tracing::debug!("Background build finished after its handle was dropped");
            }
        })
        .context("failed to spawn build thread")?;

    Ok(BuildHandle {
        receiver,
        thread: Some(thread),
    })
}
