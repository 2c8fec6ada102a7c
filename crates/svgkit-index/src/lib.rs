//! # SvgKit Index
//!
//! Hit-testing support for rendered SVG scenes.
//!
//! ## Features
//!
//! - **Sprites**: named bounding boxes, accumulated point by point and
//!   finished under the owning shape's transform
//! - **SpriteArena**: single owner of every sprite in a scene
//! - **QuadTree**: bounded-capacity region quadtree with point and group queries
//!
//! ## Architecture
//!
//! ```text
//! SpriteArena ──owns──> Sprite { name, local box, final box, highlighted }
//!      ▲
//!      │ SpriteId
//! QuadTree
//!    └── QuadNode (leaf: [(SpriteId, Rect)] | internal: 4 quadrants)
//! ```

use thiserror::Error;

pub mod geometry;
pub mod quadtree;
pub mod sprite;

pub use geometry::{Point, Rect};
pub use quadtree::{QuadTree, QuadTreeConfig, QuadTreeStats};
pub use sprite::{Sprite, SpriteArena, SpriteId};

// ==================== Errors ====================

/// Reasons a sprite cannot enter the index.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IndexError {
    #[error("Sprite {0} has an empty or zero-area bounding box")]
    DegenerateBounds(SpriteId),

    #[error("Sprite {0} lies outside the indexed region")]
    OutOfBounds(SpriteId),
}

/// Smallest-area sprite among `candidates`, the most specific hit.
///
/// Ties keep the later sprite, which draws on top.
pub fn most_specific(arena: &SpriteArena, candidates: &[SpriteId]) -> Option<SpriteId> {
    candidates
        .iter()
        .filter_map(|id| {
            let area = arena.get(*id)?.bounding_rect()?.area();
            Some((*id, area))
        })
        .fold(None, |best: Option<(SpriteId, f32)>, (id, area)| match best {
            Some((best_id, best_area)) if best_area < area || (best_area == area && best_id > id) => {
                Some((best_id, best_area))
            }
            _ => Some((id, area)),
        })
        .map(|(id, _)| id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use svgkit_canvas::Transform;

    fn sprite(name: &str, rect: Rect) -> Sprite {
        let mut s = Sprite::new(name);
        s.adjust_bounding_box(rect.min_x, rect.min_y);
        s.adjust_bounding_box(rect.max_x, rect.max_y);
        s.finish_bounding_box(&Transform::identity());
        s
    }

    #[test]
    fn test_most_specific_prefers_smaller() {
        let mut arena = SpriteArena::new();
        let big = arena.insert(sprite("country", Rect::new(0.0, 0.0, 100.0, 100.0)));
        let small = arena.insert(sprite("city", Rect::new(10.0, 10.0, 12.0, 12.0)));

        assert_eq!(most_specific(&arena, &[big, small]), Some(small));
        assert_eq!(most_specific(&arena, &[small, big]), Some(small));
        assert_eq!(most_specific(&arena, &[]), None);
    }

    #[test]
    fn test_most_specific_tie_takes_topmost() {
        let mut arena = SpriteArena::new();
        let below = arena.insert(sprite("below", Rect::new(0.0, 0.0, 5.0, 5.0)));
        let above = arena.insert(sprite("above", Rect::new(1.0, 1.0, 6.0, 6.0)));

        assert_eq!(most_specific(&arena, &[below, above]), Some(above));
        assert_eq!(most_specific(&arena, &[above, below]), Some(above));
    }

    #[test]
    fn test_arena_and_tree_together() {
        let mut arena = SpriteArena::new();
        let id = arena.insert(sprite("shape1", Rect::new(10.0, 20.0, 30.0, 40.0)));
        let mut tree = QuadTree::new(Rect::new(0.0, 0.0, 100.0, 100.0), QuadTreeConfig::default());
        let rect = arena.get(id).and_then(Sprite::bounding_rect).unwrap();
        tree.insert(id, rect).unwrap();

        let hits = tree.query_point(Point::new(15.0, 25.0));
        let best = most_specific(&arena, &hits).unwrap();
        assert_eq!(arena.get(best).unwrap().name(), "shape1");
    }
}
