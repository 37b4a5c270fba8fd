//! Textured quad drawn once, from empty caches to a recorded draw

mod common;

use ash::vk;

use common::{renderer, Scene};
use entity_renderer::render::gpu::DescriptorWrite;
use entity_renderer::render::mock::{Command, ObjectKind};

#[test]
fn test_single_render_compiles_everything_once() {
    let scene = Scene::textured_quad();
    let mut renderer = renderer();

    assert!(scene.draw(&mut renderer, &[scene.target]).unwrap());

    let stats = renderer.stats();
    assert_eq!(stats.shaders, 1);
    assert_eq!(stats.meshes, 1);
    assert_eq!(stats.pipelines, 1);
    assert_eq!(stats.images, 1);
    assert_eq!(stats.descriptor_sets, 1);
    assert_eq!(stats.component_buffers, 0);
    assert_eq!(stats.frames_rendered, 1);

    let device = renderer.device().stats();
    assert_eq!(device.created(ObjectKind::ShaderModule), 2);
    assert_eq!(device.created(ObjectKind::Pipeline), 1);
    assert_eq!(device.created(ObjectKind::DescriptorSet), 1);
    assert_eq!(device.draws(), vec![6]);

    // Mesh compiled against the shader's attribute order
    let pipeline = &device.pipelines[0];
    assert_eq!(pipeline.vertex_stride, 20);
    assert_eq!(
        pipeline.attributes,
        vec![(0, 0, vk::Format::R32G32B32_SFLOAT), (1, 12, vk::Format::R32G32_SFLOAT)]
    );

    // One combined image sampler at binding 0
    let set = device
        .commands
        .iter()
        .find_map(|command| match command {
            Command::BindDescriptorSet(set) => Some(*set),
            _ => None,
        })
        .unwrap();
    let writes = &device.descriptor_writes[&set];
    assert_eq!(writes.len(), 1);
    assert!(matches!(writes[0], DescriptorWrite::CombinedImageSampler { binding: 0, .. }));

    // Image covers the texture's full extent, uploaded in three synchronous steps
    assert_eq!(device.image_extents.len(), 1);
    assert_eq!((device.image_extents[0].width, device.image_extents[0].height), (4, 4));
    assert_eq!(
        device.transitions,
        vec![
            (vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL),
            (vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL),
        ]
    );
    assert_eq!(device.image_copies.len(), 1);
    assert_eq!(device.sampler_filters, vec![vk::Filter::LINEAR]);
}

#[test]
fn test_draw_commands_are_recorded_in_order() {
    let scene = Scene::textured_quad();
    let mut renderer = renderer();
    scene.draw(&mut renderer, &[scene.target]).unwrap();

    let device = renderer.device().stats();
    let kinds: Vec<&'static str> = device
        .commands
        .iter()
        .map(|command| match command {
            Command::SetViewport(_) => "viewport",
            Command::SetScissor(..) => "scissor",
            Command::BindPipeline(_) => "pipeline",
            Command::BindVertexBuffer(_) => "vertices",
            Command::BindIndexBuffer(_) => "indices",
            Command::BindDescriptorSet(_) => "set",
            Command::PushConstants { .. } => "push",
            Command::DrawIndexed { .. } => "draw",
        })
        .collect();
    assert_eq!(
        kinds,
        vec!["viewport", "scissor", "pipeline", "vertices", "indices", "scissor", "set", "draw"]
    );
}

#[test]
fn test_teardown_releases_every_object() {
    let scene = Scene::textured_quad();
    let mut renderer = renderer();
    scene.draw(&mut renderer, &[scene.target]).unwrap();

    let recording = renderer.device().recording();
    assert!(recording.borrow().live_total() > 0);

    drop(renderer);

    let recording = recording.borrow();
    assert_eq!(recording.live_total(), 0);
    assert_eq!(recording.invalid_releases, 0);
    assert_eq!(
        recording.created(ObjectKind::ShaderModule),
        recording.destroyed(ObjectKind::ShaderModule)
    );
}
