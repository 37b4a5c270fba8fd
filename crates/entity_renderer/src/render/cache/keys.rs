//! Composite cache keys

use std::fmt;

use crate::world::{BindingKey, Entity};

/// Identity of one material-on-mesh combination
///
/// Packs the material entity into the high 32 bits and the mesh entity into
/// the low 32 bits, so distinct pairs always produce distinct keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RendererKey(u64);

impl RendererKey {
    /// Combine a material and a mesh entity
    pub const fn new(material: Entity, mesh: Entity) -> Self {
        Self(((material as u64) << 32) | mesh as u64)
    }

    /// Material entity
    pub const fn material(self) -> Entity {
        (self.0 >> 32) as Entity
    }

    /// Mesh entity
    pub const fn mesh(self) -> Entity {
        self.0 as Entity
    }

    /// Packed 64-bit value
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RendererKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "material {} / mesh {}", self.material(), self.mesh())
    }
}

/// Identity of a material's resource at one shader slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingSlot {
    /// Material entity owning the binding
    pub material: Entity,
    /// Shader slot the binding feeds
    pub key: BindingKey,
}

impl BindingSlot {
    /// Create a slot key
    pub const fn new(material: Entity, key: BindingKey) -> Self {
        Self { material, key }
    }
}

/// Identity of one entity drawn under one material/mesh combination
///
/// An entity drawn in several combinations holds one descriptor set per
/// combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DrawSlot {
    /// Drawn entity
    pub entity: Entity,
    /// Combination it was drawn with
    pub key: RendererKey,
}

impl DrawSlot {
    /// Create a draw slot key
    pub const fn new(entity: Entity, key: RendererKey) -> Self {
        Self { entity, key }
    }
}

impl fmt::Display for DrawSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity {} with {}", self.entity, self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renderer_key_packing() {
        let key = RendererKey::new(7, 3);
        assert_eq!(key.raw(), (7u64 << 32) | 3);
        assert_eq!(key.material(), 7);
        assert_eq!(key.mesh(), 3);

        let extreme = RendererKey::new(u32::MAX, 0);
        assert_eq!(extreme.material(), u32::MAX);
        assert_eq!(extreme.mesh(), 0);
    }

    #[test]
    fn test_distinct_pairs_never_collide() {
        let mut seen = std::collections::HashSet::new();
        for material in [0, 1, 2, u32::MAX] {
            for mesh in [0, 1, 2, u32::MAX] {
                assert!(seen.insert(RendererKey::new(material, mesh)));
            }
        }
        assert_ne!(RendererKey::new(1, 2), RendererKey::new(2, 1));
    }

    #[test]
    fn test_binding_slots_distinguish_sets() {
        let a = BindingSlot::new(4, BindingKey::new(0, 0));
        let b = BindingSlot::new(4, BindingKey::new(0, 1));
        let c = BindingSlot::new(5, BindingKey::new(0, 0));
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_draw_slots_distinguish_combinations() {
        let first = DrawSlot::new(7, RendererKey::new(1, 2));
        let second = DrawSlot::new(7, RendererKey::new(3, 2));
        assert_ne!(first, second);
        assert_eq!(first, DrawSlot::new(7, RendererKey::new(1, 2)));
        assert_eq!(first.to_string(), "entity 7 with material 1 / mesh 2");
    }
}
