//! Renderer error types

use thiserror::Error;

use super::backends::vulkan::VulkanError;
use crate::config::ConfigError;
use crate::world::{BindingKey, ComponentType, Entity, ShaderStage};

/// Errors raised while compiling or recording a frame
///
/// Everything except [`RenderError::Vulkan`] describes scene data the
/// renderer cannot turn into GPU objects; the operation that discovered it
/// fails and the caller decides what to do.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Native graphics failure
    #[error(transparent)]
    Vulkan(#[from] VulkanError),

    /// Renderer configuration rejected
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A referenced entity does not exist
    #[error("Entity {entity} referenced as {role} does not exist")]
    MissingEntity {
        /// Entity that was looked up
        entity: Entity,
        /// What the entity was expected to be
        role: &'static str,
    },

    /// An entity lacks the description the renderer needs from it
    #[error("Entity {entity} has no {kind} description")]
    MissingSource {
        /// Entity that was looked up
        entity: Entity,
        /// Expected description kind
        kind: &'static str,
    },

    /// A referenced component is not present on its entity
    #[error("Entity {entity} has no component {component:?}")]
    MissingComponent {
        /// Entity that was looked up
        entity: Entity,
        /// Missing component type
        component: ComponentType,
    },

    /// A shader slot has no matching material binding
    #[error("Material {material} has no binding for shader {shader} property '{name}' at {key}")]
    MissingBinding {
        /// Material entity
        material: Entity,
        /// Shader entity
        shader: Entity,
        /// Property name in the shader
        name: String,
        /// Slot the binding was expected at
        key: BindingKey,
    },

    /// No mesh channel could be deduced from an attribute name
    #[error("Mesh {mesh}: cannot deduce a vertex channel for attribute '{attribute}'")]
    AmbiguousAttribute {
        /// Mesh entity
        mesh: Entity,
        /// Attribute name in the shader
        attribute: String,
    },

    /// A required channel is absent and has no synthesized default
    #[error("Mesh {mesh}: attribute '{attribute}' needs a {channel} channel the mesh does not have")]
    MissingChannel {
        /// Mesh entity
        mesh: Entity,
        /// Attribute name in the shader
        attribute: String,
        /// Channel name
        channel: &'static str,
    },

    /// A channel has a different length than the mesh's vertex count
    #[error("Mesh {mesh}: {channel} channel has {actual} entries, expected {expected}")]
    ChannelLengthMismatch {
        /// Mesh entity
        mesh: Entity,
        /// Channel name
        channel: &'static str,
        /// Vertex count of the mesh
        expected: usize,
        /// Entries in the channel
        actual: usize,
    },

    /// A mesh with no vertices or no indices cannot be uploaded
    #[error("Mesh {mesh} has no vertices or no indices")]
    EmptyMesh {
        /// Mesh entity
        mesh: Entity,
    },

    /// A texture binding points at an entity without pixel data
    #[error("Entity {entity} is not a texture")]
    NotATexture {
        /// Entity that was looked up
        entity: Entity,
    },

    /// A texture region selects zero pixels
    #[error("Texture {texture}: region selects no pixels")]
    EmptyTextureRegion {
        /// Texture entity
        texture: Entity,
    },

    /// A texture's pixel buffer is shorter than its dimensions require
    #[error("Texture {texture}: expected {expected} bytes of RGBA8 pixel data, found {actual}")]
    PixelDataTooShort {
        /// Texture entity
        texture: Entity,
        /// Bytes required by `width * height * 4`
        expected: usize,
        /// Bytes present
        actual: usize,
    },

    /// A stage that cannot participate in a graphics pipeline
    #[error("Shader {shader}: stage {stage:?} cannot be used in a graphics pipeline")]
    UnsupportedShaderStage {
        /// Shader entity
        shader: Entity,
        /// Offending stage
        stage: ShaderStage,
    },

    /// Frame driver calls made out of order
    #[error("Invalid frame state: {0}")]
    InvalidFrameState(String),
}

/// Result type for renderer operations
pub type RenderResult<T> = Result<T, RenderError>;
