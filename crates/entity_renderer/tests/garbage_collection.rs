//! Sweeps of cached objects nothing drew since the previous sweep

mod common;

use std::thread;
use std::time::Duration;

use common::{full_texture_binding, renderer, renderer_with, test_config, Scene};
use entity_renderer::foundation::math::Vec4;
use entity_renderer::render::mock::{MockDevice, ObjectKind};
use entity_renderer::render::Renderer;
use entity_renderer::world::{Entity, MaterialDescription};

#[test]
fn test_sweep_keeps_what_was_drawn() {
    let scene = Scene::textured_quad();
    let mut renderer = renderer();
    scene.draw(&mut renderer, &[scene.target]).unwrap();

    assert_eq!(renderer.collect_garbage().unwrap(), 0);
    let stats = renderer.stats();
    assert_eq!((stats.meshes, stats.pipelines, stats.images, stats.descriptor_sets), (1, 1, 1, 1));
    assert_eq!(stats.collections, 1);
}

#[test]
fn test_second_sweep_without_draws_is_a_no_op() {
    let scene = Scene::textured_quad();
    let mut renderer = renderer();
    scene.draw(&mut renderer, &[scene.target]).unwrap();
    renderer.collect_garbage().unwrap();

    // Nothing drawn since: everything but the shader goes
    let waits_before = renderer.device().stats().idle_waits;
    assert_eq!(renderer.collect_garbage().unwrap(), 4);
    assert_eq!(renderer.device().stats().idle_waits - waits_before, 4);

    let stats = renderer.stats();
    assert_eq!((stats.meshes, stats.pipelines, stats.images, stats.descriptor_sets), (0, 0, 0, 0));
    assert_eq!(stats.shaders, 1);

    assert_eq!(renderer.collect_garbage().unwrap(), 0);
    let device = renderer.device().stats();
    assert_eq!(device.invalid_releases, 0);
    assert_eq!(device.live(ObjectKind::ShaderModule), 2);
    assert_eq!(device.live_total(), 2);
}

#[test]
fn test_only_undrawn_entities_lose_their_sets() {
    let mut scene = Scene::textured_quad();
    let other = scene.spawn();
    let mut renderer = renderer();

    scene.draw(&mut renderer, &[scene.target, other]).unwrap();
    renderer.collect_garbage().unwrap();

    scene.draw(&mut renderer, &[scene.target]).unwrap();
    assert_eq!(renderer.collect_garbage().unwrap(), 1);

    let stats = renderer.stats();
    assert_eq!(stats.descriptor_sets, 1);
    assert_eq!(stats.pipelines, 1);
    assert_eq!(renderer.device().stats().live(ObjectKind::DescriptorSet), 1);
}

#[test]
fn test_sets_follow_the_combination_they_were_drawn_with() {
    let mut scene = Scene::textured_quad();
    let second_material = scene.spawn();
    scene.world.set_material(
        second_material,
        MaterialDescription {
            texture_bindings: vec![full_texture_binding(scene.texture)],
            ..MaterialDescription::default()
        },
    );
    let mut renderer = renderer();

    draw_with(&mut renderer, &scene, &[scene.material, second_material]);
    assert_eq!(renderer.collect_garbage().unwrap(), 0);

    // Same entity, but only the second combination drawn: image, set, mesh and pipeline of the first go
    draw_with(&mut renderer, &scene, &[second_material]);
    assert_eq!(renderer.collect_garbage().unwrap(), 4);

    let stats = renderer.stats();
    assert_eq!((stats.descriptor_sets, stats.pipelines, stats.images), (1, 1, 1));
    assert_eq!(renderer.device().stats().invalid_releases, 0);
}

fn draw_with(renderer: &mut Renderer<MockDevice>, scene: &Scene, materials: &[Entity]) {
    assert!(renderer.begin_render(&scene.world, Vec4::zeros()).unwrap());
    for &material in materials {
        renderer
            .render(&scene.world, &[scene.target], material, scene.shader, scene.mesh)
            .unwrap();
    }
    renderer.end_render().unwrap();
}

#[test]
fn test_swept_scene_recompiles_on_next_draw() {
    let scene = Scene::textured_quad();
    let mut renderer = renderer();
    scene.draw(&mut renderer, &[scene.target]).unwrap();
    renderer.collect_garbage().unwrap();
    renderer.collect_garbage().unwrap();

    scene.draw(&mut renderer, &[scene.target]).unwrap();

    let device = renderer.device().stats();
    assert_eq!(device.created(ObjectKind::Pipeline), 2);
    assert_eq!(device.created(ObjectKind::ShaderModule), 2);
    assert_eq!(device.draws(), vec![6, 6]);
}

#[test]
fn test_sweep_runs_when_interval_elapses() {
    let scene = Scene::textured_quad();
    let config = test_config().with_gc_interval_secs(0.01);
    let mut renderer = renderer_with(MockDevice::new(), config);

    thread::sleep(Duration::from_millis(30));
    scene.draw(&mut renderer, &[scene.target]).unwrap();

    assert_eq!(renderer.stats().collections, 1);
    // Drawn in the same frame, so kept
    assert_eq!(renderer.stats().pipelines, 1);
}
