//! Entity/component store contract
//!
//! The renderer does not own entity identity or component storage. It reads
//! scene data through [`ComponentStore`], which any ECS can implement, and
//! keys its compiled GPU objects by the entity handles it is given.
//! [`MemoryWorld`] is a small in-memory implementation for tools and tests.

mod components;
mod memory;

pub use components::*;
pub use memory::MemoryWorld;

/// Opaque entity handle issued by the component store
pub type Entity = u32;

/// Read access to the scene data the renderer compiles
///
/// Version counters live on the shader, mesh and texture descriptions; the
/// renderer compares them against the versions it stamped on compiled
/// objects to decide between reuse and rebuild.
pub trait ComponentStore {
    /// Whether the entity exists
    fn contains_entity(&self, entity: Entity) -> bool;

    /// Whether the entity carries a component of the given type
    fn contains_component(&self, entity: Entity, component: ComponentType) -> bool;

    /// Raw bytes of a component, copied verbatim into uniform buffers and push constants
    fn component_bytes(&self, entity: Entity, component: ComponentType) -> Option<&[u8]>;

    /// Direct children of an entity in the scene hierarchy
    fn children(&self, entity: Entity) -> &[Entity];

    /// Shader description carried by a shader entity
    fn shader(&self, entity: Entity) -> Option<&ShaderDescription>;

    /// Mesh channels carried by a mesh entity
    fn mesh(&self, entity: Entity) -> Option<&MeshData>;

    /// Binding assignments carried by a material entity
    fn material(&self, entity: Entity) -> Option<&MaterialDescription>;

    /// Pixel data carried by a texture entity
    fn texture(&self, entity: Entity) -> Option<&TextureData>;

    /// Explicit scissor override carried by an entity
    fn scissor(&self, entity: Entity) -> Option<ScissorRect>;

    /// Every entity that carries a scissor override
    fn scissor_entities(&self) -> Vec<Entity>;
}
