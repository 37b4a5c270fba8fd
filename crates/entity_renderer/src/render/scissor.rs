//! Scissor inheritance
//!
//! An entity carrying a scissor override clips itself and every descendant
//! that does not carry an override of its own. The map is rebuilt once per
//! frame by walking the hierarchy breadth-first from the overriding
//! entities.

use std::collections::{HashMap, VecDeque};

use ash::vk;

use crate::world::{ComponentStore, Entity, ScissorRect};

/// Effective scissor of every entity under an override
#[derive(Debug, Default, Clone)]
pub struct ScissorMap {
    rects: HashMap<Entity, ScissorRect>,
}

impl ScissorMap {
    /// Propagate overrides down the hierarchy
    ///
    /// Each entity is visited once; a child reached from several overriding
    /// ancestors keeps the first rectangle assigned to it, and its own
    /// override always wins.
    pub fn propagate<W: ComponentStore + ?Sized>(world: &W) -> Self {
        let mut rects = HashMap::new();
        let mut queue = VecDeque::new();

        let mut seeds = world.scissor_entities();
        seeds.sort_unstable();
        for entity in seeds {
            if let Some(rect) = world.scissor(entity) {
                rects.insert(entity, rect);
                queue.push_back(entity);
            }
        }

        while let Some(parent) = queue.pop_front() {
            let Some(&rect) = rects.get(&parent) else { continue };
            for &child in world.children(parent) {
                if rects.contains_key(&child) {
                    continue;
                }
                rects.insert(child, world.scissor(child).unwrap_or(rect));
                queue.push_back(child);
            }
        }

        Self { rects }
    }

    /// Override in effect for an entity, if any
    pub fn get(&self, entity: Entity) -> Option<ScissorRect> {
        self.rects.get(&entity).copied()
    }

    /// Scissor to record for an entity, defaulting to the full render area
    pub fn rect_for(&self, entity: Entity, render_area: vk::Extent2D) -> vk::Rect2D {
        match self.get(entity) {
            Some(rect) => vk::Rect2D {
                offset: vk::Offset2D { x: rect.x, y: rect.y },
                extent: vk::Extent2D { width: rect.width, height: rect.height },
            },
            None => vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: render_area,
            },
        }
    }

    /// Number of entities under an override
    pub fn len(&self) -> usize {
        self.rects.len()
    }

    /// Whether no entity is clipped
    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }
}
