//! Engine-level component types consumed by the renderer

use crate::foundation::math::{Vec2, Vec3, Vec4};

use super::Entity;

/// Identifier of a component type whose bytes the renderer copies to the GPU
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentType(pub u32);

/// Descriptor binding slot as declared by a shader: `(binding, set)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingKey {
    /// Binding index within the set
    pub binding: u32,
    /// Descriptor set index
    pub set: u32,
}

impl BindingKey {
    /// Create a binding key
    pub const fn new(binding: u32, set: u32) -> Self {
        Self { binding, set }
    }
}

impl std::fmt::Display for BindingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "binding {} set {}", self.binding, self.set)
    }
}

/// Abstract shader stage as stored by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Vertex stage
    Vertex,
    /// Fragment stage
    Fragment,
    /// Geometry stage
    Geometry,
    /// Compute stage (never valid inside a graphics pipeline)
    Compute,
}

impl TryFrom<u32> for ShaderStage {
    type Error = u32;

    /// Decode the engine's serialized stage code, handing back unknown codes
    fn try_from(code: u32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Vertex),
            1 => Ok(Self::Fragment),
            2 => Ok(Self::Geometry),
            3 => Ok(Self::Compute),
            other => Err(other),
        }
    }
}

/// Element type of a vertex input attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeFormat {
    /// One 32-bit float
    Float,
    /// Two 32-bit floats
    Vec2,
    /// Three 32-bit floats
    Vec3,
    /// Four 32-bit floats
    Vec4,
}

impl AttributeFormat {
    /// Number of float components
    pub const fn component_count(self) -> u32 {
        match self {
            Self::Float => 1,
            Self::Vec2 => 2,
            Self::Vec3 => 3,
            Self::Vec4 => 4,
        }
    }

    /// Size in bytes
    pub const fn byte_size(self) -> u32 {
        self.component_count() * 4
    }
}

/// Vertex input attribute declared by a shader
#[derive(Debug, Clone, PartialEq)]
pub struct VertexAttribute {
    /// Name as written in the shader source
    pub name: String,
    /// Input location
    pub location: u32,
    /// Element type
    pub format: AttributeFormat,
}

impl VertexAttribute {
    /// Create a vertex attribute
    pub fn new(name: impl Into<String>, location: u32, format: AttributeFormat) -> Self {
        Self { name: name.into(), location, format }
    }
}

/// Kind of resource a shader property binds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    /// Uniform buffer fed from component bytes
    UniformBuffer,
    /// Combined image sampler fed from a texture
    Sampler,
}

/// Uniform or sampler property declared by a shader
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderProperty {
    /// Name as written in the shader source
    pub name: String,
    /// Descriptor slot
    pub key: BindingKey,
    /// Resource kind
    pub kind: PropertyKind,
    /// Stage reading the property
    pub stage: ShaderStage,
}

/// Push constant block member declared by a shader
#[derive(Debug, Clone, PartialEq)]
pub struct PushConstantDeclaration {
    /// Name as written in the shader source
    pub name: String,
    /// Slot the material's push binding refers to
    pub key: BindingKey,
    /// Byte offset within the push constant block
    pub offset: u32,
    /// Byte size
    pub size: u32,
    /// Stage reading the push constant
    pub stage: ShaderStage,
}

/// Shader component: pre-compiled SPIR-V plus its reflected interface
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShaderDescription {
    /// Bumped by the engine whenever any field changes
    pub version: u64,
    /// Vertex stage SPIR-V bytes
    pub vertex_code: Vec<u8>,
    /// Fragment stage SPIR-V bytes
    pub fragment_code: Vec<u8>,
    /// Vertex inputs
    pub attributes: Vec<VertexAttribute>,
    /// Uniform and sampler properties
    pub properties: Vec<ShaderProperty>,
    /// Push constant members
    pub push_constants: Vec<PushConstantDeclaration>,
}

impl ShaderDescription {
    /// Vertex attributes ordered by location
    pub fn attributes_by_location(&self) -> Vec<&VertexAttribute> {
        let mut attributes: Vec<&VertexAttribute> = self.attributes.iter().collect();
        attributes.sort_by_key(|attribute| attribute.location);
        attributes
    }
}

/// Mesh component: separate per-vertex channels and a triangle index list
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshData {
    /// Bumped by the engine whenever any channel changes
    pub version: u64,
    /// Vertex positions
    pub positions: Option<Vec<Vec3>>,
    /// Vertex normals
    pub normals: Option<Vec<Vec3>>,
    /// Vertex tangents
    pub tangents: Option<Vec<Vec3>>,
    /// Vertex bitangents
    pub bitangents: Option<Vec<Vec3>>,
    /// Texture coordinates
    pub uvs: Option<Vec<Vec2>>,
    /// Vertex colors
    pub colors: Option<Vec<Vec4>>,
    /// Triangle list indices
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Number of vertices, taken from the longest present channel
    pub fn vertex_count(&self) -> usize {
        [
            self.positions.as_ref().map(Vec::len),
            self.normals.as_ref().map(Vec::len),
            self.tangents.as_ref().map(Vec::len),
            self.bitangents.as_ref().map(Vec::len),
            self.uvs.as_ref().map(Vec::len),
            self.colors.as_ref().map(Vec::len),
        ]
        .into_iter()
        .flatten()
        .max()
        .unwrap_or(0)
    }
}

/// Push binding: copy an entity component into a push constant slot at draw time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushBinding {
    /// Shader push constant slot
    pub key: BindingKey,
    /// Component read from each rendered entity
    pub component: ComponentType,
}

/// Component binding: back a uniform buffer with another entity's component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentBinding {
    /// Shader uniform slot
    pub key: BindingKey,
    /// Entity holding the component
    pub entity: Entity,
    /// Component copied into the buffer every frame
    pub component: ComponentType,
}

/// Sampler filter applied to a bound texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    /// Bilinear filtering
    #[default]
    Linear,
    /// Point sampling
    Nearest,
}

/// Normalized sub-rectangle of a texture
///
/// Corners may be given in either order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureRegion {
    /// First corner in `[0, 1]` texture space
    pub a: Vec2,
    /// Opposite corner in `[0, 1]` texture space
    pub b: Vec2,
}

impl TextureRegion {
    /// Create a region from two corners
    pub fn new(a: Vec2, b: Vec2) -> Self {
        Self { a, b }
    }

    /// The whole texture
    pub fn full() -> Self {
        Self::new(Vec2::new(0.0, 0.0), Vec2::new(1.0, 1.0))
    }
}

impl Default for TextureRegion {
    fn default() -> Self {
        Self::full()
    }
}

/// Texture binding: sample a region of a texture entity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureBinding {
    /// Shader sampler slot
    pub key: BindingKey,
    /// Texture entity
    pub texture: Entity,
    /// Region of the texture to upload
    pub region: TextureRegion,
    /// Sampler filter
    pub filter: FilterMode,
}

/// Material component: which data feeds each shader slot
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MaterialDescription {
    /// Push constant bindings, in push order
    pub push_bindings: Vec<PushBinding>,
    /// Uniform buffer bindings
    pub component_bindings: Vec<ComponentBinding>,
    /// Sampler bindings
    pub texture_bindings: Vec<TextureBinding>,
}

/// Texture component: tightly packed RGBA8 pixels
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextureData {
    /// Bumped by the engine whenever the pixels change
    pub version: u64,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Row-major RGBA8 pixels
    pub pixels: Vec<u8>,
}

/// Scissor override in framebuffer pixels, inherited by descendants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScissorRect {
    /// Left edge
    pub x: i32,
    /// Top edge
    pub y: i32,
    /// Width
    pub width: u32,
    /// Height
    pub height: u32,
}

impl ScissorRect {
    /// Create a scissor rectangle
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shader_stage_codes() {
        assert_eq!(ShaderStage::try_from(0), Ok(ShaderStage::Vertex));
        assert_eq!(ShaderStage::try_from(1), Ok(ShaderStage::Fragment));
        assert_eq!(ShaderStage::try_from(42), Err(42));
    }

    #[test]
    fn test_attributes_sorted_by_location() {
        let shader = ShaderDescription {
            attributes: vec![
                VertexAttribute::new("uv", 1, AttributeFormat::Vec2),
                VertexAttribute::new("position", 0, AttributeFormat::Vec3),
            ],
            ..Default::default()
        };
        let names: Vec<&str> = shader
            .attributes_by_location()
            .iter()
            .map(|attribute| attribute.name.as_str())
            .collect();
        assert_eq!(names, ["position", "uv"]);
    }

    #[test]
    fn test_vertex_count_uses_longest_channel() {
        let mesh = MeshData {
            positions: Some(vec![Vec3::zeros(); 4]),
            uvs: Some(vec![Vec2::zeros(); 4]),
            ..Default::default()
        };
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(MeshData::default().vertex_count(), 0);
    }
}
