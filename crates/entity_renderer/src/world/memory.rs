//! In-memory component store
//!
//! Plain `HashMap` storage implementing [`ComponentStore`]. Enough for demo
//! scenes, tools and tests; real engines implement the trait over their own
//! ECS instead.

use std::collections::{BTreeSet, HashMap};

use super::{
    ComponentStore, ComponentType, Entity, MaterialDescription, MeshData, ScissorRect,
    ShaderDescription, TextureData,
};

/// Simple world storing renderer-facing components per entity
#[derive(Debug, Default)]
pub struct MemoryWorld {
    next_entity_id: Entity,
    entities: BTreeSet<Entity>,
    components: HashMap<(Entity, ComponentType), Vec<u8>>,
    children: HashMap<Entity, Vec<Entity>>,
    shaders: HashMap<Entity, ShaderDescription>,
    meshes: HashMap<Entity, MeshData>,
    materials: HashMap<Entity, MaterialDescription>,
    textures: HashMap<Entity, TextureData>,
    scissors: HashMap<Entity, ScissorRect>,
}

impl MemoryWorld {
    /// Create an empty world
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new entity
    pub fn create_entity(&mut self) -> Entity {
        let entity = self.next_entity_id;
        self.next_entity_id += 1;
        self.entities.insert(entity);
        entity
    }

    /// Remove an entity and everything attached to it
    pub fn destroy_entity(&mut self, entity: Entity) {
        self.entities.remove(&entity);
        self.components.retain(|(owner, _), _| *owner != entity);
        self.children.remove(&entity);
        for children in self.children.values_mut() {
            children.retain(|child| *child != entity);
        }
        self.shaders.remove(&entity);
        self.meshes.remove(&entity);
        self.materials.remove(&entity);
        self.textures.remove(&entity);
        self.scissors.remove(&entity);
    }

    /// Attach or replace raw component bytes
    pub fn set_component(&mut self, entity: Entity, component: ComponentType, bytes: impl Into<Vec<u8>>) {
        self.components.insert((entity, component), bytes.into());
    }

    /// Parent `child` under `parent`
    pub fn add_child(&mut self, parent: Entity, child: Entity) {
        self.children.entry(parent).or_default().push(child);
    }

    /// Attach or replace a shader description
    pub fn set_shader(&mut self, entity: Entity, shader: ShaderDescription) {
        self.shaders.insert(entity, shader);
    }

    /// Attach or replace mesh data
    pub fn set_mesh(&mut self, entity: Entity, mesh: MeshData) {
        self.meshes.insert(entity, mesh);
    }

    /// Attach or replace a material description
    pub fn set_material(&mut self, entity: Entity, material: MaterialDescription) {
        self.materials.insert(entity, material);
    }

    /// Attach or replace texture data
    pub fn set_texture(&mut self, entity: Entity, texture: TextureData) {
        self.textures.insert(entity, texture);
    }

    /// Attach or replace a scissor override
    pub fn set_scissor(&mut self, entity: Entity, scissor: ScissorRect) {
        self.scissors.insert(entity, scissor);
    }

    /// Mutable shader access; callers bump `version` after editing
    pub fn shader_mut(&mut self, entity: Entity) -> Option<&mut ShaderDescription> {
        self.shaders.get_mut(&entity)
    }

    /// Mutable mesh access; callers bump `version` after editing
    pub fn mesh_mut(&mut self, entity: Entity) -> Option<&mut MeshData> {
        self.meshes.get_mut(&entity)
    }

    /// Mutable texture access; callers bump `version` after editing
    pub fn texture_mut(&mut self, entity: Entity) -> Option<&mut TextureData> {
        self.textures.get_mut(&entity)
    }

    /// Number of live entities
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }
}

impl ComponentStore for MemoryWorld {
    fn contains_entity(&self, entity: Entity) -> bool {
        self.entities.contains(&entity)
    }

    fn contains_component(&self, entity: Entity, component: ComponentType) -> bool {
        self.components.contains_key(&(entity, component))
    }

    fn component_bytes(&self, entity: Entity, component: ComponentType) -> Option<&[u8]> {
        self.components.get(&(entity, component)).map(Vec::as_slice)
    }

    fn children(&self, entity: Entity) -> &[Entity] {
        self.children.get(&entity).map_or(&[], Vec::as_slice)
    }

    fn shader(&self, entity: Entity) -> Option<&ShaderDescription> {
        self.shaders.get(&entity)
    }

    fn mesh(&self, entity: Entity) -> Option<&MeshData> {
        self.meshes.get(&entity)
    }

    fn material(&self, entity: Entity) -> Option<&MaterialDescription> {
        self.materials.get(&entity)
    }

    fn texture(&self, entity: Entity) -> Option<&TextureData> {
        self.textures.get(&entity)
    }

    fn scissor(&self, entity: Entity) -> Option<ScissorRect> {
        self.scissors.get(&entity).copied()
    }

    fn scissor_entities(&self) -> Vec<Entity> {
        let mut entities: Vec<Entity> = self.scissors.keys().copied().collect();
        entities.sort_unstable();
        entities
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_destroy() {
        let mut world = MemoryWorld::new();
        let parent = world.create_entity();
        let child = world.create_entity();
        world.add_child(parent, child);
        world.set_component(child, ComponentType(7), vec![1, 2, 3]);

        assert!(world.contains_entity(child));
        assert_eq!(world.children(parent), &[child]);
        assert_eq!(world.component_bytes(child, ComponentType(7)), Some(&[1u8, 2, 3][..]));

        world.destroy_entity(child);
        assert!(!world.contains_entity(child));
        assert!(world.children(parent).is_empty());
        assert!(!world.contains_component(child, ComponentType(7)));
        assert_eq!(world.entity_count(), 1);
    }

    #[test]
    fn test_scissor_entities_sorted() {
        let mut world = MemoryWorld::new();
        let a = world.create_entity();
        let b = world.create_entity();
        world.set_scissor(b, ScissorRect::new(0, 0, 1, 1));
        world.set_scissor(a, ScissorRect::new(0, 0, 2, 2));
        assert_eq!(world.scissor_entities(), vec![a, b]);
    }
}
