//! Region quadtree over sprite bounding boxes.
//!
//! Every node covers a rectangle of document space. A leaf holds entries
//! until it exceeds its capacity, then splits into four equal quadrants and
//! pushes its entries down. An entry lives in every leaf whose rectangle
//! intersects its box, so boxes that straddle a split line are duplicated.
//!
//! Removal only deletes entries; internal nodes never merge back into a
//! leaf. [`QuadTree::rebuild`] recreates a compact tree when needed.

use std::collections::HashMap;

use crate::geometry::{Point, Rect};
use crate::sprite::SpriteId;
use crate::IndexError;

/// Quadtree tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuadTreeConfig {
    /// Entries a leaf holds before splitting.
    pub max_node_capacity: usize,
    /// Nodes at this depth never split.
    pub max_depth: usize,
}

impl Default for QuadTreeConfig {
    fn default() -> Self {
        Self {
            max_node_capacity: 10,
            max_depth: 12,
        }
    }
}

/// Summary numbers for tuning the capacity constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QuadTreeStats {
    pub sprites: usize,
    pub leaves: usize,
    pub depth: usize,
    pub entries: usize,
    pub fullest_leaf: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Entry {
    id: SpriteId,
    rect: Rect,
}

#[derive(Debug, Clone)]
enum NodeKind {
    Leaf(Vec<Entry>),
    /// Quadrants in `Rect::quadrants` order.
    Internal(Box<[QuadNode; 4]>),
}

#[derive(Debug, Clone)]
struct QuadNode {
    bounds: Rect,
    depth: usize,
    kind: NodeKind,
}

impl QuadNode {
    fn leaf(bounds: Rect, depth: usize) -> Self {
        Self {
            bounds,
            depth,
            kind: NodeKind::Leaf(Vec::new()),
        }
    }

    fn insert(&mut self, entry: Entry, config: &QuadTreeConfig) {
        match &mut self.kind {
            NodeKind::Internal(children) => {
                for child in children.iter_mut() {
                    if child.bounds.intersects(&entry.rect) {
                        child.insert(entry, config);
                    }
                }
            }
            NodeKind::Leaf(entries) => {
                entries.push(entry);
                if entries.len() > config.max_node_capacity {
                    if self.depth < config.max_depth {
                        self.split(config);
                    } else {
                        tracing::trace!(depth = self.depth, "Leaf at depth cap accepts overflow");
                    }
                }
            }
        }
    }

    fn split(&mut self, config: &QuadTreeConfig) {
        let entries = match std::mem::replace(&mut self.kind, NodeKind::Leaf(Vec::new())) {
            NodeKind::Leaf(entries) => entries,
            internal => {
                self.kind = internal;
                return;
            }
        };

        let depth = self.depth + 1;
        let [a, b, c, d] = self.bounds.quadrants();
        let mut children = Box::new([
            QuadNode::leaf(a, depth),
            QuadNode::leaf(b, depth),
            QuadNode::leaf(c, depth),
            QuadNode::leaf(d, depth),
        ]);

        tracing::trace!(depth = self.depth, entries = entries.len(), "Splitting quadtree leaf");

        for entry in entries {
            for child in children.iter_mut() {
                if child.bounds.intersects(&entry.rect) {
                    child.insert(entry, config);
                }
            }
        }

        self.kind = NodeKind::Internal(children);
    }

    fn remove(&mut self, id: SpriteId, rect: &Rect) -> usize {
        match &mut self.kind {
            NodeKind::Internal(children) => children
                .iter_mut()
                .filter(|child| child.bounds.intersects(rect))
                .map(|child| child.remove(id, rect))
                .sum(),
            NodeKind::Leaf(entries) => {
                let before = entries.len();
                entries.retain(|e| e.id != id);
                before - entries.len()
            }
        }
    }

    fn visit_leaves<'a>(&'a self, rect: Option<&Rect>, f: &mut impl FnMut(&'a QuadNode, &'a [Entry])) {
        match &self.kind {
            NodeKind::Internal(children) => {
                for child in children.iter() {
                    if rect.map_or(true, |r| child.bounds.intersects(r)) {
                        child.visit_leaves(rect, f);
                    }
                }
            }
            NodeKind::Leaf(entries) => f(self, entries.as_slice()),
        }
    }

    fn max_depth(&self) -> usize {
        match &self.kind {
            NodeKind::Internal(children) => children
                .iter()
                .map(QuadNode::max_depth)
                .max()
                .unwrap_or(self.depth),
            NodeKind::Leaf(_) => self.depth,
        }
    }
}

/// Bounded-capacity region quadtree keyed by [`SpriteId`].
///
/// The tree stores ids and a copy of each box; it never owns sprites.
#[derive(Debug, Clone)]
pub struct QuadTree {
    root: QuadNode,
    config: QuadTreeConfig,
    members: HashMap<SpriteId, Rect>,
}

impl QuadTree {
    /// Empty tree covering `bounds`.
    pub fn new(bounds: Rect, config: QuadTreeConfig) -> Self {
        Self {
            root: QuadNode::leaf(bounds, 0),
            config: QuadTreeConfig {
                max_node_capacity: config.max_node_capacity.max(1),
                ..config
            },
            members: HashMap::new(),
        }
    }

    pub fn bounds(&self) -> Rect {
        self.root.bounds
    }

    pub fn config(&self) -> QuadTreeConfig {
        self.config
    }

    /// Number of distinct sprites stored.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, id: SpriteId) -> bool {
        self.members.contains_key(&id)
    }

    /// Box stored for `id`.
    pub fn rect_of(&self, id: SpriteId) -> Option<Rect> {
        self.members.get(&id).copied()
    }

    /// The root has split at least once.
    pub fn is_split(&self) -> bool {
        matches!(self.root.kind, NodeKind::Internal(_))
    }

    /// Insert `id` with box `rect`. Re-inserting an id replaces its box.
    pub fn insert(&mut self, id: SpriteId, rect: Rect) -> Result<(), IndexError> {
        if rect.is_degenerate() {
            return Err(IndexError::DegenerateBounds(id));
        }
        if !self.root.bounds.intersects(&rect) {
            return Err(IndexError::OutOfBounds(id));
        }
        if self.members.contains_key(&id) {
            self.remove(id);
        }

        self.root.insert(Entry { id, rect }, &self.config);
        self.members.insert(id, rect);
        Ok(())
    }

    /// Remove `id` from every leaf holding it, returning its box.
    /// Nodes are never merged.
    pub fn remove(&mut self, id: SpriteId) -> Option<Rect> {
        let rect = self.members.remove(&id)?;
        let removed = self.root.remove(id, &rect);
        tracing::trace!(%id, leaves = removed, "Removed sprite from quadtree");
        Some(rect)
    }

    /// Every sprite whose box contains `point`, in insertion order within
    /// the leaf that covers the point.
    pub fn query_point(&self, point: Point) -> Vec<SpriteId> {
        if !self.root.bounds.contains(point) {
            return Vec::new();
        }

        let mut node = &self.root;
        loop {
            match &node.kind {
                NodeKind::Internal(children) => {
                    let c = node.bounds.center();
                    let idx = usize::from(point.x >= c.x) + 2 * usize::from(point.y >= c.y);
                    node = &children[idx];
                }
                NodeKind::Leaf(entries) => {
                    return entries
                        .iter()
                        .filter(|e| e.rect.contains(point))
                        .map(|e| e.id)
                        .collect();
                }
            }
        }
    }

    /// Every other sprite sharing at least one leaf with `id`, sorted.
    pub fn query_group(&self, id: SpriteId) -> Vec<SpriteId> {
        let Some(rect) = self.members.get(&id) else {
            return Vec::new();
        };

        let mut group = Vec::new();
        self.root.visit_leaves(Some(rect), &mut |_, entries| {
            if entries.iter().any(|e| e.id == id) {
                group.extend(entries.iter().map(|e| e.id).filter(|other| *other != id));
            }
        });
        group.sort_unstable();
        group.dedup();
        group
    }

    /// Number of leaf nodes.
    pub fn count_leaves(&self) -> usize {
        let mut leaves = 0;
        self.root.visit_leaves(None, &mut |_, _| leaves += 1);
        leaves
    }

    /// Depth of the deepest node; a lone root is depth 0.
    pub fn depth(&self) -> usize {
        self.root.max_depth()
    }

    pub fn stats(&self) -> QuadTreeStats {
        let mut stats = QuadTreeStats {
            sprites: self.members.len(),
            depth: self.depth(),
            ..Default::default()
        };
        self.root.visit_leaves(None, &mut |_, entries| {
            stats.leaves += 1;
            stats.entries += entries.len();
            stats.fullest_leaf = stats.fullest_leaf.max(entries.len());
        });
        stats
    }

    /// Recreate the tree from its current members, dropping structure left
    /// behind by removals.
    pub fn rebuild(&mut self) {
        let mut members: Vec<(SpriteId, Rect)> = self.members.drain().collect();
        members.sort_unstable_by_key(|(id, _)| *id);

        let before = self.count_leaves();
        self.root = QuadNode::leaf(self.root.bounds, 0);
        for (id, rect) in members {
            self.root.insert(Entry { id, rect }, &self.config);
            self.members.insert(id, rect);
        }
        tracing::debug!(before, after = self.count_leaves(), "Rebuilt quadtree");
    }
}
