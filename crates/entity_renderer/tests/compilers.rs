//! Mesh and image compilation observed through the device

mod common;

use ash::vk;

use common::{renderer, spirv, Scene};
use entity_renderer::foundation::math::{Vec2, Vec3};
use entity_renderer::render::mock::Command;
use entity_renderer::render::RenderError;
use entity_renderer::world::{
    AttributeFormat, ComponentStore, FilterMode, MaterialDescription, MeshData, ShaderDescription, TextureRegion,
    VertexAttribute,
};

fn floats(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

fn lit_shader(attributes: Vec<VertexAttribute>) -> ShaderDescription {
    ShaderDescription {
        version: 1,
        vertex_code: spirv(),
        fragment_code: spirv(),
        attributes,
        ..ShaderDescription::default()
    }
}

#[test]
fn test_missing_color_and_normal_are_synthesized() {
    let mut scene = Scene::textured_quad();
    scene.world.set_shader(
        scene.shader,
        lit_shader(vec![
            VertexAttribute::new("inPosition", 0, AttributeFormat::Vec3),
            VertexAttribute::new("vertexColor", 1, AttributeFormat::Vec4),
            VertexAttribute::new("inNormal", 2, AttributeFormat::Vec3),
        ]),
    );
    scene.world.set_material(scene.material, MaterialDescription::default());

    let mut renderer = renderer();
    scene.draw(&mut renderer, &[scene.target]).unwrap();

    let device = renderer.device().stats();
    assert_eq!(device.pipelines[0].vertex_stride, 40);

    let vertex_buffer = device
        .commands
        .iter()
        .find_map(|command| match command {
            Command::BindVertexBuffer(buffer) => Some(*buffer),
            _ => None,
        })
        .unwrap();
    let vertices = floats(device.buffer_contents(vertex_buffer).unwrap());
    let positions = scene.world.mesh(scene.mesh).unwrap().positions.clone().unwrap();

    assert_eq!(vertices.len(), 4 * 10);
    for (vertex, position) in vertices.chunks_exact(10).zip(&positions) {
        assert_eq!(&vertex[0..3], position.as_slice());
        assert_eq!(&vertex[3..7], &[1.0, 1.0, 1.0, 1.0]);
        assert_eq!(&vertex[7..10], &[0.0, 0.0, 0.0]);
    }
}

#[test]
fn test_unrecognized_attribute_name_is_ambiguous() {
    let mut scene = Scene::textured_quad();
    scene.world.set_shader(
        scene.shader,
        lit_shader(vec![
            VertexAttribute::new("inPosition", 0, AttributeFormat::Vec3),
            VertexAttribute::new("foo", 1, AttributeFormat::Vec3),
        ]),
    );
    scene.world.set_material(scene.material, MaterialDescription::default());

    let mut renderer = renderer();
    let result = scene.draw(&mut renderer, &[scene.target]);
    assert!(matches!(result, Err(RenderError::AmbiguousAttribute { .. })));
    assert_eq!(renderer.stats().meshes, 0);
}

#[test]
fn test_missing_required_channel_is_an_error() {
    let mut scene = Scene::textured_quad();
    scene.world.set_shader(
        scene.shader,
        lit_shader(vec![
            VertexAttribute::new("inPosition", 0, AttributeFormat::Vec3),
            VertexAttribute::new("inTangent", 1, AttributeFormat::Vec3),
        ]),
    );
    scene.world.set_material(scene.material, MaterialDescription::default());

    let mut renderer = renderer();
    let result = scene.draw(&mut renderer, &[scene.target]);
    assert!(matches!(result, Err(RenderError::MissingChannel { .. })));
}

#[test]
fn test_empty_mesh_is_rejected() {
    let mut scene = Scene::textured_quad();
    scene.world.set_mesh(
        scene.mesh,
        MeshData {
            version: 1,
            positions: Some(Vec::<Vec3>::new()),
            uvs: Some(Vec::<Vec2>::new()),
            ..MeshData::default()
        },
    );

    let mut renderer = renderer();
    let result = scene.draw(&mut renderer, &[scene.target]);
    assert!(matches!(result, Err(RenderError::EmptyMesh { .. })));
}

fn set_region(scene: &mut Scene, region: TextureRegion, filter: FilterMode) {
    let mut material = scene.world.material(scene.material).cloned().unwrap();
    material.texture_bindings[0].region = region;
    material.texture_bindings[0].filter = filter;
    scene.world.set_material(scene.material, material);
}

#[test]
fn test_texture_region_selects_sub_rectangle() {
    let mut scene = Scene::textured_quad();
    // Corners given in reverse order
    set_region(
        &mut scene,
        TextureRegion::new(Vec2::new(1.0, 1.0), Vec2::new(0.5, 0.5)),
        FilterMode::Nearest,
    );

    let mut renderer = renderer();
    scene.draw(&mut renderer, &[scene.target]).unwrap();

    let device = renderer.device().stats();
    let extent = device.image_extents[0];
    assert_eq!((extent.width, extent.height), (2, 2));

    let copy = device.image_copies[0];
    assert_eq!(copy.buffer_offset, (2 * 4 + 2) * 4);
    assert_eq!(copy.buffer_row_length, 4);
    assert_eq!((copy.extent.width, copy.extent.height), (2, 2));
    assert_eq!(device.sampler_filters, vec![vk::Filter::NEAREST]);
}

#[test]
fn test_degenerate_region_is_rejected() {
    let mut scene = Scene::textured_quad();
    set_region(
        &mut scene,
        TextureRegion::new(Vec2::new(0.5, 0.0), Vec2::new(0.5, 1.0)),
        FilterMode::Linear,
    );

    let mut renderer = renderer();
    let result = scene.draw(&mut renderer, &[scene.target]);
    assert!(matches!(result, Err(RenderError::EmptyTextureRegion { .. })));
}

#[test]
fn test_short_pixel_data_is_rejected() {
    let mut scene = Scene::textured_quad();
    scene.world.texture_mut(scene.texture).unwrap().pixels.truncate(10);

    let mut renderer = renderer();
    let result = scene.draw(&mut renderer, &[scene.target]);
    assert!(matches!(
        result,
        Err(RenderError::PixelDataTooShort { expected: 64, actual: 10, .. })
    ));
}

#[test]
fn test_binding_to_non_texture_entity_is_rejected() {
    let mut scene = Scene::textured_quad();
    let mut material = scene.world.material(scene.material).cloned().unwrap();
    material.texture_bindings[0].texture = scene.mesh;
    scene.world.set_material(scene.material, material);

    let mut renderer = renderer();
    let result = scene.draw(&mut renderer, &[scene.target]);
    assert!(matches!(result, Err(RenderError::NotATexture { .. })));
}
