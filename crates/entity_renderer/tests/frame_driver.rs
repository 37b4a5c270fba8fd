//! Frame state machine, presentation outcomes and per-draw state

mod common;

use approx::assert_relative_eq;
use ash::vk;

use common::{renderer, renderer_with, test_config, Scene, CAMERA, MODEL};
use entity_renderer::foundation::math::Vec4;
use entity_renderer::render::gpu::DescriptorWrite;
use entity_renderer::render::mock::{Command, FrameEvent, MockDevice};
use entity_renderer::render::{AcquireOutcome, PresentOutcome, RenderError};
use entity_renderer::world::{
    BindingKey, ComponentBinding, ComponentStore, PropertyKind, PushBinding, PushConstantDeclaration, ScissorRect, ShaderProperty,
    ShaderStage,
};

fn viewports(renderer: &entity_renderer::render::Renderer<MockDevice>) -> Vec<(f32, f32, f32, f32)> {
    renderer
        .device()
        .stats()
        .commands
        .iter()
        .filter_map(|command| match command {
            Command::SetViewport(v) => Some((v.x, v.y, v.width, v.height)),
            _ => None,
        })
        .collect()
}

fn scissors(renderer: &entity_renderer::render::Renderer<MockDevice>) -> Vec<(i32, i32, u32, u32)> {
    renderer
        .device()
        .stats()
        .commands
        .iter()
        .filter_map(|command| match *command {
            Command::SetScissor(x, y, w, h) => Some((x, y, w, h)),
            _ => None,
        })
        .collect()
}

#[test]
fn test_viewport_is_flipped_to_y_up() {
    let scene = Scene::textured_quad();
    let mut renderer = renderer();
    scene.draw(&mut renderer, &[scene.target]).unwrap();

    let (x, y, width, height) = viewports(&renderer)[0];
    assert_relative_eq!(x, 0.0);
    assert_relative_eq!(y, 600.0);
    assert_relative_eq!(width, 800.0);
    assert_relative_eq!(height, -600.0);
    assert_eq!(scissors(&renderer)[0], (0, 0, 800, 600));
}

#[test]
fn test_scissor_is_inherited_from_ancestors() {
    let mut scene = Scene::textured_quad();
    let root = scene.spawn();
    let middle = scene.spawn();
    let overridden = scene.spawn();
    let unclipped = scene.spawn();

    scene.world.set_scissor(root, ScissorRect::new(10, 20, 100, 50));
    scene.world.add_child(root, middle);
    scene.world.add_child(middle, scene.target);
    scene.world.add_child(middle, overridden);
    scene.world.set_scissor(overridden, ScissorRect::new(1, 2, 3, 4));

    let mut renderer = renderer();
    scene.draw(&mut renderer, &[scene.target, overridden, unclipped]).unwrap();

    // Frame-wide scissor first, then one per drawn entity
    assert_eq!(
        scissors(&renderer),
        vec![(0, 0, 800, 600), (10, 20, 100, 50), (1, 2, 3, 4), (0, 0, 800, 600)]
    );
}

#[test]
fn test_out_of_date_acquire_skips_the_frame() {
    let scene = Scene::textured_quad();
    let mut renderer = renderer();
    renderer.device().queue_acquire_outcome(AcquireOutcome::OutOfDate);

    assert!(!renderer.begin_render(&scene.world, Vec4::zeros()).unwrap());
    assert!(!renderer.is_recording());
    assert!(matches!(
        renderer.render(&scene.world, &[scene.target], scene.material, scene.shader, scene.mesh),
        Err(RenderError::InvalidFrameState(_))
    ));
    assert!(renderer
        .device()
        .stats()
        .frame_events
        .contains(&FrameEvent::RebuildSwapchain));
    assert_eq!(renderer.stats().frames_skipped, 1);

    // The next frame goes through normally
    assert!(scene.draw(&mut renderer, &[scene.target]).unwrap());
    assert_eq!(renderer.stats().frames_rendered, 1);
    assert_eq!(renderer.device().stats().draws(), vec![6]);
}

#[test]
fn test_suboptimal_present_rebuilds_swapchain() {
    let scene = Scene::textured_quad();
    let mut renderer = renderer();
    renderer.device().queue_present_outcome(PresentOutcome::Suboptimal);

    scene.draw(&mut renderer, &[scene.target]).unwrap();

    let events = renderer.device().stats().frame_events.clone();
    let end = events
        .iter()
        .position(|event| matches!(event, FrameEvent::EndFrame { .. }))
        .unwrap();
    assert_eq!(events[end + 1], FrameEvent::RebuildSwapchain);
}

#[test]
fn test_resize_is_picked_up_after_present() {
    let scene = Scene::textured_quad();
    let mut renderer = renderer();
    scene.draw(&mut renderer, &[scene.target]).unwrap();

    renderer.device().set_surface_extent(1024, 768);
    renderer.device().clear_recording();
    scene.draw(&mut renderer, &[scene.target]).unwrap();
    scene.draw(&mut renderer, &[scene.target]).unwrap();

    let viewports = viewports(&renderer);
    assert_eq!(viewports.len(), 2);
    assert_relative_eq!(viewports[0].1, 600.0);
    assert_relative_eq!(viewports[1].1, 768.0);
    assert_relative_eq!(viewports[1].3, -768.0);
}

#[test]
fn test_zero_sized_surface_skips_without_acquiring() {
    let scene = Scene::textured_quad();
    let mut renderer = renderer();
    renderer.device().set_surface_extent(0, 0);

    assert!(!scene.draw(&mut renderer, &[scene.target]).unwrap());
    assert!(!renderer
        .device()
        .stats()
        .frame_events
        .iter()
        .any(|event| matches!(event, FrameEvent::Acquire(_))));

    renderer.device().set_surface_extent(640, 480);
    assert!(scene.draw(&mut renderer, &[scene.target]).unwrap());
}

#[test]
fn test_frame_slots_rotate() {
    let scene = Scene::textured_quad();
    let mut renderer = renderer();

    for _ in 0..3 {
        scene.draw(&mut renderer, &[scene.target]).unwrap();
    }

    let slots: Vec<usize> = renderer
        .device()
        .stats()
        .frame_events
        .iter()
        .filter_map(|event| match event {
            FrameEvent::BeginFrame { slot, .. } => Some(*slot),
            _ => None,
        })
        .collect();
    assert_eq!(slots, vec![0, 1, 0]);
    assert_eq!(renderer.frame_slot(), 1);
}

#[test]
fn test_three_frames_in_flight() {
    let scene = Scene::textured_quad();
    let mut renderer = renderer_with(MockDevice::new(), test_config().with_frames_in_flight(3));

    for _ in 0..4 {
        scene.draw(&mut renderer, &[scene.target]).unwrap();
    }
    assert_eq!(renderer.frame_slot(), 1);
}

#[test]
fn test_uniforms_refresh_and_push_constants_truncate() {
    let mut scene = Scene::textured_quad();
    let camera = scene.spawn();
    scene.world.set_component(camera, CAMERA, vec![1u8; 64]);
    scene.world.set_component(scene.target, MODEL, vec![9u8; 80]);

    let shader = scene.world.shader_mut(scene.shader).unwrap();
    shader.properties.push(ShaderProperty {
        name: "camera".to_string(),
        key: BindingKey::new(1, 0),
        kind: PropertyKind::UniformBuffer,
        stage: ShaderStage::Vertex,
    });
    shader.push_constants.push(PushConstantDeclaration {
        name: "model".to_string(),
        key: BindingKey::new(0, 0),
        offset: 0,
        size: 64,
        stage: ShaderStage::Vertex,
    });

    let mut material = scene.world.material(scene.material).cloned().unwrap();
    material.component_bindings.push(ComponentBinding {
        key: BindingKey::new(1, 0),
        entity: camera,
        component: CAMERA,
    });
    material.push_bindings.push(PushBinding { key: BindingKey::new(0, 0), component: MODEL });
    scene.world.set_material(scene.material, material);

    let mut renderer = renderer();
    scene.draw(&mut renderer, &[scene.target]).unwrap();

    let uniform = {
        let device = renderer.device().stats();
        assert_eq!(device.push_constant_ranges, vec![Some((vk::ShaderStageFlags::VERTEX, 0, 64))]);

        let pushes: Vec<&Command> = device
            .commands
            .iter()
            .filter(|command| matches!(command, Command::PushConstants { .. }))
            .collect();
        assert_eq!(
            pushes,
            vec![&Command::PushConstants {
                stages: vk::ShaderStageFlags::VERTEX,
                offset: 0,
                bytes: vec![9u8; 64],
            }]
        );

        let writes = device.descriptor_writes.values().next().unwrap();
        let uniform = writes
            .iter()
            .find_map(|write| match *write {
                DescriptorWrite::UniformBuffer { binding: 1, buffer, range } => Some((buffer, range)),
                _ => None,
            })
            .unwrap();
        // Rounded up to the device's uniform alignment
        assert_eq!(uniform.1, 256);
        assert_eq!(&device.buffer_contents(uniform.0).unwrap()[..64], &[1u8; 64][..]);
        uniform.0
    };

    // New component bytes land in the same buffer on the next frame
    scene.world.set_component(camera, CAMERA, vec![2u8; 64]);
    scene.draw(&mut renderer, &[scene.target]).unwrap();

    let device = renderer.device().stats();
    assert_eq!(&device.buffer_contents(uniform).unwrap()[..64], &[2u8; 64][..]);
    assert_eq!(renderer.stats().component_buffers, 1);
}
