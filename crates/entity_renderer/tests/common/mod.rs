//! Scene fixtures shared by the renderer integration tests

#![allow(dead_code)]

use ash::vk;

use entity_renderer::config::RendererConfig;
use entity_renderer::foundation::math::{Vec2, Vec3, Vec4};
use entity_renderer::render::mock::MockDevice;
use entity_renderer::render::{RenderResult, Renderer};
use entity_renderer::world::{
    AttributeFormat, BindingKey, ComponentType, Entity, FilterMode, MaterialDescription, MemoryWorld, MeshData,
    PropertyKind, ShaderDescription, ShaderProperty, ShaderStage, TextureBinding, TextureData, TextureRegion,
    VertexAttribute,
};

/// Component holding a uniform block
pub const CAMERA: ComponentType = ComponentType(1);
/// Component pushed per drawn entity
pub const MODEL: ComponentType = ComponentType(2);

/// Smallest byte string the mock accepts as SPIR-V
pub fn spirv() -> Vec<u8> {
    vec![0x03, 0x02, 0x23, 0x07, 0x00, 0x00, 0x01, 0x00]
}

/// Shader with `position: vec3`, `uv: vec2` and one sampler at binding 0
pub fn textured_shader(version: u64) -> ShaderDescription {
    ShaderDescription {
        version,
        vertex_code: spirv(),
        fragment_code: spirv(),
        attributes: vec![
            VertexAttribute::new("inPosition", 0, AttributeFormat::Vec3),
            VertexAttribute::new("inUV", 1, AttributeFormat::Vec2),
        ],
        properties: vec![ShaderProperty {
            name: "albedo".to_string(),
            key: BindingKey::new(0, 0),
            kind: PropertyKind::Sampler,
            stage: ShaderStage::Fragment,
        }],
        push_constants: Vec::new(),
    }
}

/// Unit quad with positions and UVs: 4 vertices, 6 indices
pub fn quad_mesh(version: u64) -> MeshData {
    MeshData {
        version,
        positions: Some(vec![
            Vec3::new(-0.5, -0.5, 0.0),
            Vec3::new(0.5, -0.5, 0.0),
            Vec3::new(0.5, 0.5, 0.0),
            Vec3::new(-0.5, 0.5, 0.0),
        ]),
        uvs: Some(vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
        ]),
        indices: vec![0, 1, 2, 2, 3, 0],
        ..MeshData::default()
    }
}

/// Opaque RGBA texture filled with one gray level per pixel
pub fn texture(version: u64, width: u32, height: u32) -> TextureData {
    let pixels = (0..width * height)
        .flat_map(|i| {
            let level = (i % 256) as u8;
            [level, level, level, 255]
        })
        .collect();
    TextureData { version, width, height, pixels }
}

/// Sampler binding over the whole texture
pub fn full_texture_binding(texture: Entity) -> TextureBinding {
    TextureBinding {
        key: BindingKey::new(0, 0),
        texture,
        region: TextureRegion::full(),
        filter: FilterMode::Linear,
    }
}

/// Textured quad scene: one shader, mesh, material, texture and draw target
pub struct Scene {
    pub world: MemoryWorld,
    pub shader: Entity,
    pub mesh: Entity,
    pub material: Entity,
    pub texture: Entity,
    pub target: Entity,
}

impl Scene {
    /// Build the textured quad scene with a 4x4 texture
    pub fn textured_quad() -> Self {
        let mut world = MemoryWorld::new();
        let shader = world.create_entity();
        let mesh = world.create_entity();
        let material = world.create_entity();
        let texture_entity = world.create_entity();
        let target = world.create_entity();

        world.set_shader(shader, textured_shader(1));
        world.set_mesh(mesh, quad_mesh(1));
        world.set_texture(texture_entity, texture(1, 4, 4));
        world.set_material(
            material,
            MaterialDescription {
                texture_bindings: vec![full_texture_binding(texture_entity)],
                ..MaterialDescription::default()
            },
        );

        Self { world, shader, mesh, material, texture: texture_entity, target }
    }

    /// Add another drawable entity
    pub fn spawn(&mut self) -> Entity {
        self.world.create_entity()
    }

    /// Record a frame drawing `entities` with the scene's material, shader and mesh
    pub fn draw(&self, renderer: &mut Renderer<MockDevice>, entities: &[Entity]) -> RenderResult<bool> {
        if !renderer.begin_render(&self.world, Vec4::new(0.0, 0.0, 0.0, 1.0))? {
            return Ok(false);
        }
        renderer.render(&self.world, entities, self.material, self.shader, self.mesh)?;
        renderer.end_render()?;
        Ok(true)
    }
}

/// Configuration that never collects garbage on its own
pub fn test_config() -> RendererConfig {
    RendererConfig::new("integration").with_gc_interval_secs(3600.0)
}

/// Renderer over a fresh mock with its surface already created
pub fn renderer() -> Renderer<MockDevice> {
    renderer_with(MockDevice::new(), test_config())
}

/// Renderer over the given mock and configuration with its surface already created
pub fn renderer_with(device: MockDevice, config: RendererConfig) -> Renderer<MockDevice> {
    let mut renderer = Renderer::new(device, config).expect("valid config");
    renderer
        .surface_created(vk::SurfaceKHR::null())
        .expect("mock surface resources");
    renderer
}
