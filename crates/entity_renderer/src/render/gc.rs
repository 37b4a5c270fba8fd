//! Working set of the current collection interval
//!
//! Everything the renderer touches while drawing is recorded here. When the
//! collection interval elapses, cached objects whose owners were not
//! recorded are disposed and the set starts over.

use std::collections::HashSet;

use super::cache::{DrawSlot, RendererKey};
use crate::world::Entity;

/// Draws, material/mesh combinations and materials recorded since the last sweep
#[derive(Debug, Default)]
pub struct RenderedSet {
    draws: HashSet<DrawSlot>,
    keys: HashSet<RendererKey>,
    materials: HashSet<Entity>,
}

impl RenderedSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one draw call group
    pub fn record(&mut self, key: RendererKey, entities: &[Entity]) {
        self.keys.insert(key);
        self.materials.insert(key.material());
        self.draws.extend(entities.iter().map(|&entity| DrawSlot::new(entity, key)));
    }

    /// Whether an entity was drawn with a material/mesh combination
    pub fn contains_draw(&self, slot: DrawSlot) -> bool {
        self.draws.contains(&slot)
    }

    /// Whether a material/mesh combination was drawn
    pub fn contains_key(&self, key: RendererKey) -> bool {
        self.keys.contains(&key)
    }

    /// Whether any mesh was drawn with a material
    pub fn contains_material(&self, material: Entity) -> bool {
        self.materials.contains(&material)
    }

    /// Forget everything
    pub fn clear(&mut self) {
        self.draws.clear();
        self.keys.clear();
        self.materials.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_clear() {
        let mut rendered = RenderedSet::new();
        let key = RendererKey::new(4, 9);
        rendered.record(key, &[1, 2]);

        assert!(rendered.contains_draw(DrawSlot::new(1, key)));
        assert!(rendered.contains_draw(DrawSlot::new(2, key)));
        assert!(!rendered.contains_draw(DrawSlot::new(3, key)));
        assert!(!rendered.contains_draw(DrawSlot::new(1, RendererKey::new(5, 9))));
        assert!(rendered.contains_key(key));
        assert!(rendered.contains_material(4));
        assert!(!rendered.contains_material(9));

        rendered.clear();
        assert!(!rendered.contains_draw(DrawSlot::new(1, key)));
        assert!(!rendered.contains_key(key));
    }
}
