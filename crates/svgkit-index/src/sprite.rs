//! Named hit-test regions and the arena that owns them.

use std::collections::HashMap;

use svgkit_canvas::Transform;

use crate::geometry::Rect;

/// Index of a sprite inside its [`SpriteArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpriteId(u32);

impl SpriteId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for SpriteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sprite#{}", self.0)
    }
}

/// One interactively addressable shape.
///
/// Points are accumulated in the shape's own coordinate system while its
/// path is built; [`Sprite::finish_bounding_box`] then maps that box
/// through the shape's full transform chain.
#[derive(Debug, Clone, PartialEq)]
pub struct Sprite {
    name: String,
    local_bounds: Rect,
    bounds: Option<Rect>,
    highlighted: bool,
}

impl Sprite {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            local_bounds: Rect::EMPTY,
            bounds: None,
            highlighted: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Grow the local box to cover a visited path point.
    pub fn adjust_bounding_box(&mut self, x: f32, y: f32) {
        if x.is_finite() && y.is_finite() {
            self.local_bounds.include_point(x, y);
        }
    }

    /// Box accumulated so far, before any transform.
    pub fn local_bounds(&self) -> Rect {
        self.local_bounds
    }

    /// Map the accumulated box through `transform` and freeze it.
    pub fn finish_bounding_box(&mut self, transform: &Transform) {
        self.bounds = if self.local_bounds.is_empty() {
            None
        } else {
            Some(self.local_bounds.transformed(transform))
        };
    }

    /// Final box in document space, if one was computed.
    pub fn bounding_rect(&self) -> Option<Rect> {
        self.bounds
    }

    /// A finished, non-degenerate box exists.
    pub fn is_indexable(&self) -> bool {
        self.bounds.map_or(false, |r| !r.is_degenerate())
    }

    pub fn is_highlighted(&self) -> bool {
        self.highlighted
    }

    pub fn set_highlighted(&mut self, highlighted: bool) {
        self.highlighted = highlighted;
    }
}

/// Owner of every sprite produced by one build.
#[derive(Debug, Clone, Default)]
pub struct SpriteArena {
    sprites: Vec<Sprite>,
    by_name: HashMap<String, SpriteId>,
}

impl SpriteArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `sprite`. The first sprite registered under a
    /// name stays the one [`SpriteArena::find`] returns.
    pub fn insert(&mut self, sprite: Sprite) -> SpriteId {
        let id = SpriteId(self.sprites.len() as u32);
        if self.by_name.contains_key(sprite.name()) {
            tracing::warn!(name = sprite.name(), "Duplicate sprite name");
        } else {
            self.by_name.insert(sprite.name().to_string(), id);
        }
        self.sprites.push(sprite);
        id
    }

    pub fn get(&self, id: SpriteId) -> Option<&Sprite> {
        self.sprites.get(id.index())
    }

    pub fn get_mut(&mut self, id: SpriteId) -> Option<&mut Sprite> {
        self.sprites.get_mut(id.index())
    }

    pub fn find(&self, name: &str) -> Option<SpriteId> {
        self.by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.sprites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sprites.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SpriteId, &Sprite)> {
        self.sprites
            .iter()
            .enumerate()
            .map(|(i, s)| (SpriteId(i as u32), s))
    }

    /// Clear every highlight flag.
    pub fn clear_highlights(&mut self) {
        for sprite in &mut self.sprites {
            sprite.highlighted = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sprite_without_points() {
        let mut sprite = Sprite::new("empty");
        sprite.finish_bounding_box(&Transform::identity());
        assert_eq!(sprite.bounding_rect(), None);
        assert!(!sprite.is_indexable());
    }

    #[test]
    fn test_sprite_bounds_follow_transform() {
        let mut sprite = Sprite::new("shape1");
        sprite.adjust_bounding_box(0.0, 0.0);
        sprite.adjust_bounding_box(4.0, 2.0);
        sprite.adjust_bounding_box(f32::NAN, 1.0);
        sprite.finish_bounding_box(&Transform::translate(10.0, 20.0));

        assert_eq!(sprite.local_bounds(), Rect::new(0.0, 0.0, 4.0, 2.0));
        assert_eq!(sprite.bounding_rect(), Some(Rect::new(10.0, 20.0, 14.0, 22.0)));
        assert!(sprite.is_indexable());
    }

    #[test]
    fn test_line_sprite_is_degenerate() {
        let mut sprite = Sprite::new("hline");
        sprite.adjust_bounding_box(0.0, 5.0);
        sprite.adjust_bounding_box(10.0, 5.0);
        sprite.finish_bounding_box(&Transform::identity());
        assert!(sprite.bounding_rect().is_some());
        assert!(!sprite.is_indexable());
    }

    #[test]
    fn test_arena_lookup() {
        let mut arena = SpriteArena::new();
        let a = arena.insert(Sprite::new("a"));
        let b = arena.insert(Sprite::new("b"));
        let dup = arena.insert(Sprite::new("a"));

        assert_eq!(arena.len(), 3);
        assert_eq!(arena.find("a"), Some(a));
        assert_eq!(arena.find("b"), Some(b));
        assert_ne!(dup, a);
        assert_eq!(arena.get(b).map(Sprite::name), Some("b"));

        arena.get_mut(a).unwrap().set_highlighted(true);
        assert!(arena.get(a).unwrap().is_highlighted());
        arena.clear_highlights();
        assert!(!arena.get(a).unwrap().is_highlighted());
    }
}
