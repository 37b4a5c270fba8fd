//! Frame driver
//!
//! [`Renderer`] owns every cached GPU object and drives the frame cycle:
//! `surface_created` once, then per frame `begin_render`, any number of
//! `render` calls, and `end_render`. Compilation happens lazily inside
//! `render`, and objects nobody drew for a while are swept at the end of a
//! frame.

use std::collections::HashSet;

use ash::vk;
use log::{debug, info, trace, warn};

use super::cache::{BindingSlot, DrawSlot, IdleLatch, RendererKey, Versioned, VersionedCache};
use super::compiler::pipeline::resolve_bindings;
use super::compiler::{
    BindingSource, CompiledComponentBuffer, CompiledImage, CompiledMesh, CompiledPipeline,
    CompiledShader, ImageStamp, MeshStamp, PipelineSource,
    PushConstantLayout, ResolvedBinding,
};
use super::error::{RenderError, RenderResult};
use super::gc::RenderedSet;
use super::gpu::{AcquireOutcome, DescriptorWrite, Disposable, GpuDevice, PresentOutcome};
use super::scissor::ScissorMap;
use crate::config::RendererConfig;
use crate::foundation::math::Vec4;
use crate::foundation::time::IntervalTimer;
use crate::world::{ComponentStore, Entity, TextureBinding, TextureData};

/// Descriptor set bound when drawing one entity
#[derive(Debug)]
pub struct CompiledRenderer {
    key: RendererKey,
    /// Descriptor set pointing at the material's resources
    pub descriptor_set: vk::DescriptorSet,
    pool: vk::DescriptorPool,
}

impl Versioned for CompiledRenderer {
    type Stamp = RendererKey;

    fn stamp(&self) -> &RendererKey {
        &self.key
    }
}

impl Disposable for CompiledRenderer {
    fn dispose<D: GpuDevice + ?Sized>(self, device: &D) {
        if let Err(error) = device.free_descriptor_set(self.pool, self.descriptor_set) {
            warn!("Failed to free descriptor set for {}: {error}", self.key);
        }
    }
}

/// Cache sizes and frame counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RendererStats {
    /// Compiled shaders
    pub shaders: usize,
    /// Compiled meshes
    pub meshes: usize,
    /// Compiled pipelines
    pub pipelines: usize,
    /// Per-entity descriptor sets
    pub descriptor_sets: usize,
    /// Component-backed uniform buffers
    pub component_buffers: usize,
    /// Texture images
    pub images: usize,
    /// Frames submitted
    pub frames_rendered: u64,
    /// Frames skipped because the swapchain was out of date or the surface was empty
    pub frames_skipped: u64,
    /// Garbage collection sweeps run
    pub collections: u64,
}

#[derive(Debug, Clone, Copy)]
enum FrameState {
    Uninitialized,
    Idle,
    Recording {
        image_index: u32,
        command_buffer: vk::CommandBuffer,
    },
}

/// Entity renderer over a [`GpuDevice`]
pub struct Renderer<D: GpuDevice> {
    device: D,
    config: RendererConfig,
    state: FrameState,
    frame_slot: usize,

    shaders: VersionedCache<Entity, CompiledShader>,
    meshes: VersionedCache<RendererKey, CompiledMesh>,
    pipelines: VersionedCache<RendererKey, CompiledPipeline>,
    renderers: VersionedCache<DrawSlot, CompiledRenderer>,
    component_buffers: VersionedCache<BindingSlot, CompiledComponentBuffer>,
    images: VersionedCache<BindingSlot, CompiledImage>,

    scissors: ScissorMap,
    dirty_materials: HashSet<Entity>,
    rendered: RenderedSet,
    gc_timer: IntervalTimer,

    frames_rendered: u64,
    frames_skipped: u64,
    collections: u64,
}

fn retire<D: GpuDevice + ?Sized, T: Disposable>(device: &D, latch: &mut IdleLatch, stale: T) -> RenderResult<()> {
    latch.wait_once(device)?;
    stale.dispose(device);
    Ok(())
}

fn wait_and_dispose<D: GpuDevice + ?Sized, T: Disposable>(device: &D, stale: T) -> RenderResult<()> {
    device.wait_idle()?;
    stale.dispose(device);
    Ok(())
}

fn texture_source<'w, W: ComponentStore + ?Sized>(world: &'w W, binding: &TextureBinding) -> RenderResult<&'w TextureData> {
    if !world.contains_entity(binding.texture) {
        return Err(RenderError::MissingEntity { entity: binding.texture, role: "texture" });
    }
    world
        .texture(binding.texture)
        .ok_or(RenderError::NotATexture { entity: binding.texture })
}

fn flipped_viewport(extent: vk::Extent2D) -> vk::Viewport {
    vk::Viewport {
        x: 0.0,
        y: extent.height as f32,
        width: extent.width as f32,
        height: -(extent.height as f32),
        min_depth: 0.0,
        max_depth: 1.0,
    }
}

fn full_rect(extent: vk::Extent2D) -> vk::Rect2D {
    vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent,
    }
}

fn same_extent(a: vk::Extent2D, b: vk::Extent2D) -> bool {
    a.width == b.width && a.height == b.height
}

fn descriptor_writes(
    material: Entity,
    bindings: &[ResolvedBinding],
    buffers: &VersionedCache<BindingSlot, CompiledComponentBuffer>,
    images: &VersionedCache<BindingSlot, CompiledImage>,
) -> Vec<DescriptorWrite> {
    bindings
        .iter()
        .filter_map(|binding| {
            let slot = BindingSlot::new(material, binding.key);
            match binding.source {
                BindingSource::Component(_) => buffers.get(&slot).map(|buffer| DescriptorWrite::UniformBuffer {
                    binding: binding.key.binding,
                    buffer: buffer.buffer.buffer,
                    range: buffer.range(),
                }),
                BindingSource::Texture(_) => images.get(&slot).map(|image| DescriptorWrite::CombinedImageSampler {
                    binding: binding.key.binding,
                    view: image.view,
                    sampler: image.sampler,
                }),
            }
        })
        .collect()
}

impl<D: GpuDevice> Renderer<D> {
    /// Create a renderer; no GPU work happens until [`Renderer::surface_created`]
    pub fn new(device: D, config: RendererConfig) -> RenderResult<Self> {
        config.validate()?;
        let gc_timer = IntervalTimer::new(config.gc_interval());
        Ok(Self {
            device,
            config,
            state: FrameState::Uninitialized,
            frame_slot: 0,
            shaders: VersionedCache::new(),
            meshes: VersionedCache::new(),
            pipelines: VersionedCache::new(),
            renderers: VersionedCache::new(),
            component_buffers: VersionedCache::new(),
            images: VersionedCache::new(),
            scissors: ScissorMap::default(),
            dirty_materials: HashSet::new(),
            rendered: RenderedSet::new(),
            gc_timer,
            frames_rendered: 0,
            frames_skipped: 0,
            collections: 0,
        })
    }

    /// Build device, swapchain and per-frame objects for a window surface
    ///
    /// The renderer takes ownership of the surface.
    pub fn surface_created(&mut self, surface: vk::SurfaceKHR) -> RenderResult<()> {
        if !matches!(self.state, FrameState::Uninitialized) {
            return Err(RenderError::InvalidFrameState("surface_created called twice".to_string()));
        }
        self.device.create_surface_resources(surface, self.config.frames_in_flight)?;
        self.state = FrameState::Idle;

        let extent = self.device.render_extent();
        info!(
            "Surface ready: {}x{}, {} frames in flight",
            extent.width, extent.height, self.config.frames_in_flight
        );
        Ok(())
    }

    /// Start recording a frame
    ///
    /// Returns `false` when the frame must be skipped because the swapchain
    /// was out of date (it has been rebuilt) or the surface has no area.
    /// Skipped frames need no matching [`Renderer::end_render`].
    pub fn begin_render<W: ComponentStore + ?Sized>(&mut self, world: &W, clear_color: Vec4) -> RenderResult<bool> {
        match self.state {
            FrameState::Uninitialized => {
                return Err(RenderError::InvalidFrameState("begin_render before surface_created".to_string()));
            }
            FrameState::Recording { .. } => {
                return Err(RenderError::InvalidFrameState("begin_render while a frame is recording".to_string()));
            }
            FrameState::Idle => {}
        }

        let surface = self.device.surface_extent()?;
        if surface.width == 0 || surface.height == 0 {
            debug!("Surface has no area, skipping frame");
            self.frames_skipped += 1;
            return Ok(false);
        }

        let slot = self.frame_slot;
        self.device.wait_for_frame(slot)?;
        let image_index = match self.device.acquire_next_image(slot)? {
            AcquireOutcome::Acquired(index) => index,
            AcquireOutcome::OutOfDate => {
                warn!("Swapchain out of date on acquire, skipping frame");
                self.rebuild_swapchain()?;
                self.frames_skipped += 1;
                return Ok(false);
            }
        };

        self.refresh_frame_resources(world)?;

        let command_buffer = self
            .device
            .begin_frame(slot, image_index, [clear_color.x, clear_color.y, clear_color.z, clear_color.w])?;
        let extent = self.device.render_extent();
        self.device.cmd_set_viewport(command_buffer, flipped_viewport(extent));
        self.device.cmd_set_scissor(command_buffer, full_rect(extent));

        self.state = FrameState::Recording { image_index, command_buffer };
        trace!("Recording frame slot {slot} into image {image_index}");
        Ok(true)
    }

    /// Copy component data into uniform buffers, rebuild stale images and recompute scissors
    fn refresh_frame_resources<W: ComponentStore + ?Sized>(&mut self, world: &W) -> RenderResult<()> {
        let device = &self.device;
        for (_, buffer) in self.component_buffers.iter() {
            buffer.refresh(device, world)?;
        }

        let stale: Vec<(BindingSlot, TextureBinding)> = self
            .images
            .iter()
            .filter(|(_, image)| {
                let stamp = image.stamp();
                world
                    .texture(stamp.binding.texture)
                    .is_some_and(|texture| texture.version != stamp.texture_version)
            })
            .map(|(slot, image)| (*slot, image.stamp().binding))
            .collect();

        let mut latch = IdleLatch::new();
        for (slot, binding) in stale {
            let Some(texture) = world.texture(binding.texture) else { continue };
            let stamp = ImageStamp { texture_version: texture.version, binding };
            self.images.get_or_compile(
                slot,
                stamp,
                || CompiledImage::compile(device, &binding, texture),
                |old| retire(device, &mut latch, old),
            )?;
            self.dirty_materials.insert(slot.material);
        }

        self.scissors = ScissorMap::propagate(world);
        Ok(())
    }

    /// Draw `entities` with a material, shader and mesh
    ///
    /// Compiles or reuses everything the combination needs, then records
    /// one indexed draw per entity with its own scissor, push constants and
    /// descriptor set.
    pub fn render<W: ComponentStore + ?Sized>(
        &mut self,
        world: &W,
        entities: &[Entity],
        material: Entity,
        shader: Entity,
        mesh: Entity,
    ) -> RenderResult<()> {
        let FrameState::Recording { command_buffer, .. } = self.state else {
            return Err(RenderError::InvalidFrameState("render outside begin_render/end_render".to_string()));
        };

        let shader_description = world
            .shader(shader)
            .ok_or(RenderError::MissingSource { entity: shader, kind: "shader" })?;
        let mesh_data = world
            .mesh(mesh)
            .ok_or(RenderError::MissingSource { entity: mesh, kind: "mesh" })?;
        let material_description = world
            .material(material)
            .ok_or(RenderError::MissingSource { entity: material, kind: "material" })?;
        if let Some(&missing) = entities.iter().find(|entity| !world.contains_entity(**entity)) {
            return Err(RenderError::MissingEntity { entity: missing, role: "render target" });
        }

        let key = RendererKey::new(material, mesh);
        let device = &self.device;
        let mut latch = IdleLatch::new();

        let (compiled_shader, shader_rebuilt) = self.shaders.get_or_compile(
            shader,
            shader_description.version,
            || CompiledShader::compile(device, shader, shader_description),
            |stale| retire(device, &mut latch, stale),
        )?;

        let stamp = MeshStamp::new(shader, shader_description, mesh_data);
        let (compiled_mesh, mesh_rebuilt) = self.meshes.get_or_compile(
            key,
            stamp,
            || CompiledMesh::compile(device, mesh, mesh_data, shader, shader_description),
            |stale| retire(device, &mut latch, stale),
        )?;

        let push_layout = PushConstantLayout::resolve(material, material_description, shader, shader_description)?;
        let bindings = resolve_bindings(material, material_description, shader, shader_description)?;

        // Sets allocated from a pipeline's pools must go before the pools do
        if self.pipelines.get(&key).is_some() && !self.pipelines.is_current(&key, &stamp) {
            latch.wait_once(device)?;
            self.renderers.sweep(
                |_, renderer| renderer.key != key,
                |_, stale| {
                    stale.dispose(device);
                    Ok::<_, RenderError>(())
                },
            )?;
        }

        let source = PipelineSource {
            stamp,
            vertex_module: compiled_shader.vertex_module,
            fragment_module: compiled_shader.fragment_module,
            vertex_layout: &compiled_mesh.vertex_layout,
            stride: compiled_mesh.stride,
            bindings: &bindings,
            push_constant_range: push_layout.range,
            max_sets_per_pool: self.config.max_sets_per_pool,
        };
        let (pipeline, pipeline_rebuilt) = self.pipelines.get_or_compile(
            key,
            stamp,
            || CompiledPipeline::compile(device, &source),
            |stale| retire(device, &mut latch, stale),
        )?;

        // Bindings come from the material as it is now, not as it was when the pipeline was built
        let mut bindings_rebuilt = false;
        for binding in &bindings {
            let slot = BindingSlot::new(material, binding.key);
            match binding.source {
                BindingSource::Component(component) => {
                    let (_, rebuilt) = self.component_buffers.get_or_compile(
                        slot,
                        component,
                        || CompiledComponentBuffer::compile(device, world, &component),
                        |stale| retire(device, &mut latch, stale),
                    )?;
                    bindings_rebuilt |= rebuilt;
                }
                BindingSource::Texture(texture_binding) => {
                    let texture = texture_source(world, &texture_binding)?;
                    let image_stamp = ImageStamp { texture_version: texture.version, binding: texture_binding };
                    let (_, rebuilt) = self.images.get_or_compile(
                        slot,
                        image_stamp,
                        || CompiledImage::compile(device, &texture_binding, texture),
                        |stale| retire(device, &mut latch, stale),
                    )?;
                    bindings_rebuilt |= rebuilt;
                }
            }
        }

        let marked_dirty = self.dirty_materials.remove(&material);
        let material_dirty = bindings_rebuilt || marked_dirty;
        if material_dirty || shader_rebuilt || mesh_rebuilt || pipeline_rebuilt {
            // Sets may point at replaced buffers or images, or come from replaced pools
            let mut freed = 0;
            self.renderers.sweep(
                |_, renderer| {
                    if material_dirty {
                        renderer.key.material() != material
                    } else {
                        renderer.key != key
                    }
                },
                |_, stale| {
                    latch.wait_once(device)?;
                    stale.dispose(device);
                    freed += 1;
                    Ok::<_, RenderError>(())
                },
            )?;
            if freed > 0 {
                debug!("Reallocating descriptor sets for {key} ({freed} freed)");
            }
        }

        for &entity in entities {
            self.renderers.get_or_compile(
                DrawSlot::new(entity, key),
                key,
                || {
                    let (descriptor_set, pool) = pipeline.allocate_set(device)?;
                    let writes = descriptor_writes(material, &bindings, &self.component_buffers, &self.images);
                    device.write_descriptor_set(descriptor_set, &writes);
                    Ok::<_, RenderError>(CompiledRenderer { key, descriptor_set, pool })
                },
                |stale| retire(device, &mut latch, stale),
            )?;
        }

        let render_area = device.render_extent();
        device.cmd_bind_pipeline(command_buffer, pipeline.pipeline);
        device.cmd_bind_vertex_buffer(command_buffer, compiled_mesh.vertex_buffer.buffer);
        device.cmd_bind_index_buffer(command_buffer, compiled_mesh.index_buffer.buffer);

        for &entity in entities {
            let Some(renderer) = self.renderers.get(&DrawSlot::new(entity, key)) else { continue };
            device.cmd_set_scissor(command_buffer, self.scissors.rect_for(entity, render_area));

            for constant in &push_layout.constants {
                let bytes = world
                    .component_bytes(entity, constant.component)
                    .ok_or(RenderError::MissingComponent { entity, component: constant.component })?;
                let len = bytes.len().min(constant.size as usize);
                device.cmd_push_constants(command_buffer, pipeline.layout, constant.stages, constant.offset, &bytes[..len]);
            }

            device.cmd_bind_descriptor_set(command_buffer, pipeline.layout, renderer.descriptor_set);
            device.cmd_draw_indexed(command_buffer, compiled_mesh.index_count);
            trace!("Drew entity {entity} with {key}");
        }

        self.rendered.record(key, entities);
        Ok(())
    }

    /// Submit and present the recorded frame
    ///
    /// Rebuilds the swapchain when presentation reports it out of date or
    /// suboptimal, or when the surface size changed, and runs a garbage
    /// collection sweep once the collection interval has elapsed.
    pub fn end_render(&mut self) -> RenderResult<()> {
        let FrameState::Recording { image_index, .. } = self.state else {
            return Err(RenderError::InvalidFrameState("end_render without begin_render".to_string()));
        };
        self.state = FrameState::Idle;

        let slot = self.frame_slot;
        let outcome = self.device.end_frame(slot, image_index)?;
        let resized = !same_extent(self.device.surface_extent()?, self.device.render_extent());
        if outcome != PresentOutcome::Presented || resized {
            info!("Rebuilding swapchain after present ({outcome:?}, resized: {resized})");
            self.rebuild_swapchain()?;
        }

        self.frame_slot = (slot + 1) % self.config.frames_in_flight;
        self.frames_rendered += 1;

        if self.gc_timer.tick() {
            self.collect_garbage()?;
        }
        Ok(())
    }

    fn rebuild_swapchain(&mut self) -> RenderResult<()> {
        let surface = self.device.surface_extent()?;
        if surface.width == 0 || surface.height == 0 {
            debug!("Deferring swapchain rebuild until the surface has area");
            return Ok(());
        }
        self.device.rebuild_swapchain()?;
        let extent = self.device.render_extent();
        info!("Swapchain rebuilt at {}x{}", extent.width, extent.height);
        Ok(())
    }

    /// Dispose cached objects nothing drew since the previous sweep
    ///
    /// Sweeps component buffers and images of undrawn materials, descriptor
    /// sets of entities not drawn with their combination, then meshes and pipelines of undrawn
    /// material/mesh combinations. Waits for the device before each
    /// removal. Returns the number of objects disposed.
    pub fn collect_garbage(&mut self) -> RenderResult<usize> {
        let device = &self.device;
        let rendered = &self.rendered;

        let mut removed = 0;
        removed += self.component_buffers.sweep(
            |slot, _| rendered.contains_material(slot.material),
            |_, stale| wait_and_dispose(device, stale),
        )?;
        removed += self.images.sweep(
            |slot, _| rendered.contains_material(slot.material),
            |_, stale| wait_and_dispose(device, stale),
        )?;
        removed += self.renderers.sweep(
            |slot, _| rendered.contains_draw(*slot),
            |_, stale| wait_and_dispose(device, stale),
        )?;
        removed += self.meshes.sweep(
            |key, _| rendered.contains_key(*key),
            |_, stale| wait_and_dispose(device, stale),
        )?;

        let renderers = &mut self.renderers;
        removed += self.pipelines.sweep(
            |key, _| rendered.contains_key(*key),
            |key, stale| {
                device.wait_idle()?;
                renderers.sweep(
                    |_, renderer| renderer.key != key,
                    |_, orphan| {
                        orphan.dispose(device);
                        Ok::<_, RenderError>(())
                    },
                )?;
                stale.dispose(device);
                Ok::<_, RenderError>(())
            },
        )?;

        self.dirty_materials.retain(|material| rendered.contains_material(*material));
        self.rendered.clear();
        self.collections += 1;

        if removed > 0 {
            debug!("Garbage collection disposed {removed} cached objects");
        }
        Ok(removed)
    }

    /// Cache sizes and frame counters
    pub fn stats(&self) -> RendererStats {
        RendererStats {
            shaders: self.shaders.len(),
            meshes: self.meshes.len(),
            pipelines: self.pipelines.len(),
            descriptor_sets: self.renderers.len(),
            component_buffers: self.component_buffers.len(),
            images: self.images.len(),
            frames_rendered: self.frames_rendered,
            frames_skipped: self.frames_skipped,
            collections: self.collections,
        }
    }

    /// Descriptor pools allocated by the pipeline of a material/mesh combination
    pub fn descriptor_pool_count(&self, material: Entity, mesh: Entity) -> Option<usize> {
        self.pipelines
            .get(&RendererKey::new(material, mesh))
            .map(CompiledPipeline::pool_count)
    }

    /// Whether a frame is being recorded
    pub fn is_recording(&self) -> bool {
        matches!(self.state, FrameState::Recording { .. })
    }

    /// Frame slot the next frame records into
    pub fn frame_slot(&self) -> usize {
        self.frame_slot
    }

    /// Renderer configuration
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Underlying device
    pub fn device(&self) -> &D {
        &self.device
    }

    fn dispose_all(&mut self) {
        let device = &self.device;
        for (_, renderer) in self.renderers.drain() {
            renderer.dispose(device);
        }
        for (_, pipeline) in self.pipelines.drain() {
            pipeline.dispose(device);
        }
        for (_, mesh) in self.meshes.drain() {
            mesh.dispose(device);
        }
        for (_, image) in self.images.drain() {
            image.dispose(device);
        }
        for (_, buffer) in self.component_buffers.drain() {
            buffer.dispose(device);
        }
        for (_, shader) in self.shaders.drain() {
            shader.dispose(device);
        }
        self.dirty_materials.clear();
        self.rendered.clear();
    }
}

impl<D: GpuDevice> Drop for Renderer<D> {
    fn drop(&mut self) {
        if let Err(error) = self.device.wait_idle() {
            warn!("Device wait failed during renderer teardown: {error}");
        }
        self.dispose_all();
        debug!("Renderer disposed all cached GPU objects");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::mock::MockDevice;
    use crate::world::MemoryWorld;

    fn renderer() -> Renderer<MockDevice> {
        let config = RendererConfig::new("test").with_gc_interval_secs(3600.0);
        Renderer::new(MockDevice::new(), config).unwrap()
    }

    #[test]
    fn test_viewport_is_flipped() {
        let viewport = flipped_viewport(vk::Extent2D { width: 800, height: 600 });
        assert_eq!((viewport.x, viewport.y, viewport.width, viewport.height), (0.0, 600.0, 800.0, -600.0));
        assert_eq!((viewport.min_depth, viewport.max_depth), (0.0, 1.0));
    }

    #[test]
    fn test_frame_calls_out_of_order_are_rejected() {
        let world = MemoryWorld::new();
        let mut renderer = renderer();

        assert!(matches!(
            renderer.begin_render(&world, Vec4::zeros()),
            Err(RenderError::InvalidFrameState(_))
        ));
        assert!(matches!(renderer.end_render(), Err(RenderError::InvalidFrameState(_))));
        assert!(matches!(
            renderer.render(&world, &[], 0, 0, 0),
            Err(RenderError::InvalidFrameState(_))
        ));

        renderer.surface_created(vk::SurfaceKHR::null()).unwrap();
        assert!(renderer.surface_created(vk::SurfaceKHR::null()).is_err());
        assert!(renderer.begin_render(&world, Vec4::zeros()).unwrap());
        assert!(matches!(
            renderer.begin_render(&world, Vec4::zeros()),
            Err(RenderError::InvalidFrameState(_))
        ));
        renderer.end_render().unwrap();
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = RendererConfig::new("test").with_frames_in_flight(0);
        assert!(matches!(Renderer::new(MockDevice::new(), config), Err(RenderError::Config(_))));
    }
}
