//! Recording device for tests and headless tooling
//!
//! [`MockDevice`] implements [`GpuDevice`] without touching a GPU. It hands
//! out fabricated handles, tracks which objects are alive, enforces
//! descriptor pool capacity the way a driver would, keeps the bytes written
//! to host-visible buffers, and records every command so tests can assert
//! on what a frame would have drawn.

use std::cell::{Ref, RefCell};
use std::rc::Rc;
use std::collections::{HashMap, VecDeque};

use ash::vk::{self, Handle};

use super::backends::vulkan::{VulkanError, VulkanResult};
use super::gpu::{
    AcquireOutcome, BufferImageRegion, DescriptorLayoutBinding, DescriptorWrite, GpuBuffer,
    GpuDevice, GpuImage, MemoryLocation, PipelineDescription, PresentOutcome,
};

/// Kinds of native objects the mock tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// Shader module
    ShaderModule,
    /// Buffer
    Buffer,
    /// Image
    Image,
    /// Image view
    ImageView,
    /// Sampler
    Sampler,
    /// Descriptor set layout
    DescriptorSetLayout,
    /// Pipeline layout
    PipelineLayout,
    /// Graphics pipeline
    Pipeline,
    /// Descriptor pool
    DescriptorPool,
    /// Descriptor set
    DescriptorSet,
}

/// Frame-level call made on the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameEvent {
    /// Surface resources built
    SurfaceResources,
    /// Waited on a slot's fence
    WaitForFrame(usize),
    /// Acquired (or failed to acquire) an image for a slot
    Acquire(usize),
    /// Began recording a slot into an image
    BeginFrame {
        /// Frame slot
        slot: usize,
        /// Swapchain image
        image: u32,
    },
    /// Submitted and presented a slot
    EndFrame {
        /// Frame slot
        slot: usize,
        /// Swapchain image
        image: u32,
    },
    /// Swapchain rebuilt
    RebuildSwapchain,
}

/// Viewport as recorded, comparable in tests
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordedViewport {
    /// Left edge
    pub x: f32,
    /// Top edge
    pub y: f32,
    /// Width
    pub width: f32,
    /// Height, negative when the viewport is flipped
    pub height: f32,
}

/// Recorded command buffer command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Dynamic viewport
    SetViewport(RecordedViewport),
    /// Dynamic scissor as `(x, y, width, height)`
    SetScissor(i32, i32, u32, u32),
    /// Pipeline bind
    BindPipeline(vk::Pipeline),
    /// Vertex buffer bind
    BindVertexBuffer(vk::Buffer),
    /// Index buffer bind
    BindIndexBuffer(vk::Buffer),
    /// Descriptor set bind
    BindDescriptorSet(vk::DescriptorSet),
    /// Push constant upload
    PushConstants {
        /// Stages receiving the bytes
        stages: vk::ShaderStageFlags,
        /// Byte offset
        offset: u32,
        /// Uploaded bytes
        bytes: Vec<u8>,
    },
    /// Indexed draw
    DrawIndexed {
        /// Number of indices
        index_count: u32,
    },
}

/// Pipeline creation parameters as recorded
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedPipeline {
    /// Created handle
    pub pipeline: vk::Pipeline,
    /// Vertex stride
    pub vertex_stride: u32,
    /// `(location, offset, format)` per attribute
    pub attributes: Vec<(u32, u32, vk::Format)>,
}

#[derive(Debug)]
struct PoolState {
    capacity: u32,
    allocated: u32,
}

/// Everything the mock observed
#[derive(Debug, Default)]
pub struct MockStats {
    created: HashMap<ObjectKind, usize>,
    destroyed: HashMap<ObjectKind, usize>,
    live: HashMap<u64, ObjectKind>,
    buffer_locations: HashMap<u64, MemoryLocation>,
    buffer_contents: HashMap<u64, Vec<u8>>,
    pools: HashMap<u64, PoolState>,
    set_pools: HashMap<u64, u64>,

    /// Destroy or free calls on handles that were not alive
    pub invalid_releases: usize,
    /// Number of device idle waits
    pub idle_waits: usize,
    /// Frame-level calls in order
    pub frame_events: Vec<FrameEvent>,
    /// Recorded commands in order, across all frames
    pub commands: Vec<Command>,
    /// Descriptor writes per set, latest write last
    pub descriptor_writes: HashMap<vk::DescriptorSet, Vec<DescriptorWrite>>,
    /// Image layout transitions in order
    pub transitions: Vec<(vk::ImageLayout, vk::ImageLayout)>,
    /// Buffer to image copies in order
    pub image_copies: Vec<BufferImageRegion>,
    /// Images created, with their extent
    pub image_extents: Vec<vk::Extent2D>,
    /// Sampler filters in creation order
    pub sampler_filters: Vec<vk::Filter>,
    /// Pipeline creations in order
    pub pipelines: Vec<RecordedPipeline>,
    /// Push constant ranges of created pipeline layouts
    pub push_constant_ranges: Vec<Option<(vk::ShaderStageFlags, u32, u32)>>,
    /// Synchronous submissions (copies and transitions)
    pub one_shot_submits: usize,
}

impl MockStats {
    /// Objects of a kind created so far
    pub fn created(&self, kind: ObjectKind) -> usize {
        self.created.get(&kind).copied().unwrap_or(0)
    }

    /// Objects of a kind destroyed so far
    pub fn destroyed(&self, kind: ObjectKind) -> usize {
        self.destroyed.get(&kind).copied().unwrap_or(0)
    }

    /// Objects of a kind currently alive
    pub fn live(&self, kind: ObjectKind) -> usize {
        self.live.values().filter(|live| **live == kind).count()
    }

    /// Objects of any kind currently alive
    pub fn live_total(&self) -> usize {
        self.live.len()
    }

    /// Bytes last written to a buffer
    pub fn buffer_contents(&self, buffer: vk::Buffer) -> Option<&[u8]> {
        self.buffer_contents.get(&buffer.as_raw()).map(Vec::as_slice)
    }

    /// Recorded indexed draws
    pub fn draws(&self) -> Vec<u32> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                Command::DrawIndexed { index_count } => Some(*index_count),
                _ => None,
            })
            .collect()
    }

    /// Sets allocated from a pool that are still alive
    pub fn pool_usage(&self, pool: vk::DescriptorPool) -> Option<u32> {
        self.pools.get(&pool.as_raw()).map(|state| state.allocated)
    }
}

#[derive(Debug)]
struct MockFrame {
    initialized: bool,
    frames_in_flight: usize,
    image_count: u32,
    next_image: u32,
    surface_extent: vk::Extent2D,
    render_extent: vk::Extent2D,
    acquire_outcomes: VecDeque<AcquireOutcome>,
    present_outcomes: VecDeque<PresentOutcome>,
}

/// Device double that records instead of rendering
#[derive(Debug)]
pub struct MockDevice {
    next_handle: RefCell<u64>,
    frame: RefCell<MockFrame>,
    pool_capacity_override: Option<u32>,
    alignment: vk::DeviceSize,
    stats: Rc<RefCell<MockStats>>,
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDevice {
    /// Create a mock with an 800x600 surface and three swapchain images
    pub fn new() -> Self {
        let extent = vk::Extent2D { width: 800, height: 600 };
        Self {
            next_handle: RefCell::new(0x1000),
            frame: RefCell::new(MockFrame {
                initialized: false,
                frames_in_flight: 0,
                image_count: 3,
                next_image: 0,
                surface_extent: extent,
                render_extent: vk::Extent2D::default(),
                acquire_outcomes: VecDeque::new(),
                present_outcomes: VecDeque::new(),
            }),
            pool_capacity_override: None,
            alignment: 256,
            stats: Rc::new(RefCell::new(MockStats::default())),
        }
    }

    /// Cap every descriptor pool at `capacity` sets regardless of what was requested
    pub fn with_pool_capacity(mut self, capacity: u32) -> Self {
        self.pool_capacity_override = Some(capacity);
        self
    }

    /// Report a different uniform buffer alignment
    pub fn with_uniform_alignment(mut self, alignment: vk::DeviceSize) -> Self {
        self.alignment = alignment;
        self
    }

    /// Change the size the surface reports
    pub fn set_surface_extent(&self, width: u32, height: u32) {
        self.frame.borrow_mut().surface_extent = vk::Extent2D { width, height };
    }

    /// Make an upcoming acquire report this outcome
    pub fn queue_acquire_outcome(&self, outcome: AcquireOutcome) {
        self.frame.borrow_mut().acquire_outcomes.push_back(outcome);
    }

    /// Make an upcoming present report this outcome
    pub fn queue_present_outcome(&self, outcome: PresentOutcome) {
        self.frame.borrow_mut().present_outcomes.push_back(outcome);
    }

    /// Everything recorded so far
    pub fn stats(&self) -> Ref<'_, MockStats> {
        self.stats.borrow()
    }

    /// Handle to the recording that stays readable after the device is dropped
    pub fn recording(&self) -> Rc<RefCell<MockStats>> {
        Rc::clone(&self.stats)
    }

    /// Forget recorded commands and frame events, keeping object tracking
    pub fn clear_recording(&self) {
        let mut stats = self.stats.borrow_mut();
        stats.commands.clear();
        stats.frame_events.clear();
    }

    fn fabricate(&self, kind: ObjectKind) -> u64 {
        let raw = {
            let mut next = self.next_handle.borrow_mut();
            *next += 1;
            *next
        };
        let mut stats = self.stats.borrow_mut();
        *stats.created.entry(kind).or_default() += 1;
        stats.live.insert(raw, kind);
        raw
    }

    fn release(&self, kind: ObjectKind, raw: u64) {
        let mut stats = self.stats.borrow_mut();
        match stats.live.get(&raw) {
            Some(live) if *live == kind => {
                stats.live.remove(&raw);
                *stats.destroyed.entry(kind).or_default() += 1;
            }
            _ => stats.invalid_releases += 1,
        }
    }

    fn require_initialized(&self, operation: &str) -> VulkanResult<()> {
        if self.frame.borrow().initialized {
            Ok(())
        } else {
            Err(VulkanError::not_initialized(operation))
        }
    }

    fn require_live(&self, kind: ObjectKind, raw: u64) -> VulkanResult<()> {
        match self.stats.borrow().live.get(&raw) {
            Some(live) if *live == kind => Ok(()),
            _ => Err(VulkanError::InvalidOperation {
                reason: format!("{kind:?} {raw:#x} is not alive"),
            }),
        }
    }

    fn frame_event(&self, event: FrameEvent) {
        self.stats.borrow_mut().frame_events.push(event);
    }

    fn record(&self, command: Command) {
        self.stats.borrow_mut().commands.push(command);
    }
}

impl GpuDevice for MockDevice {
    fn create_surface_resources(&mut self, _surface: vk::SurfaceKHR, frames_in_flight: usize) -> VulkanResult<()> {
        {
            let frame = self.frame.get_mut();
            frame.initialized = true;
            frame.frames_in_flight = frames_in_flight;
            frame.render_extent = frame.surface_extent;
        }
        self.frame_event(FrameEvent::SurfaceResources);
        Ok(())
    }

    fn wait_for_frame(&mut self, slot: usize) -> VulkanResult<()> {
        self.require_initialized("wait_for_frame")?;
        self.frame_event(FrameEvent::WaitForFrame(slot));
        Ok(())
    }

    fn acquire_next_image(&mut self, slot: usize) -> VulkanResult<AcquireOutcome> {
        self.require_initialized("acquire_next_image")?;
        self.frame_event(FrameEvent::Acquire(slot));
        let frame = self.frame.get_mut();
        if let Some(outcome) = frame.acquire_outcomes.pop_front() {
            return Ok(outcome);
        }
        let image = frame.next_image;
        frame.next_image = (frame.next_image + 1) % frame.image_count;
        Ok(AcquireOutcome::Acquired(image))
    }

    fn begin_frame(&mut self, slot: usize, image_index: u32, _clear_color: [f32; 4]) -> VulkanResult<vk::CommandBuffer> {
        self.require_initialized("begin_frame")?;
        let frames_in_flight = self.frame.get_mut().frames_in_flight;
        if slot >= frames_in_flight {
            return Err(VulkanError::InvalidOperation {
                reason: format!("frame slot {slot} out of range for {frames_in_flight} frames"),
            });
        }
        self.frame_event(FrameEvent::BeginFrame { slot, image: image_index });
        Ok(vk::CommandBuffer::from_raw(0x100 + slot as u64))
    }

    fn end_frame(&mut self, slot: usize, image_index: u32) -> VulkanResult<PresentOutcome> {
        self.require_initialized("end_frame")?;
        self.frame_event(FrameEvent::EndFrame { slot, image: image_index });
        Ok(self.frame.get_mut().present_outcomes.pop_front().unwrap_or(PresentOutcome::Presented))
    }

    fn rebuild_swapchain(&mut self) -> VulkanResult<()> {
        self.require_initialized("rebuild_swapchain")?;
        let frame = self.frame.get_mut();
        frame.render_extent = frame.surface_extent;
        frame.next_image = 0;
        self.frame_event(FrameEvent::RebuildSwapchain);
        Ok(())
    }

    fn render_extent(&self) -> vk::Extent2D {
        self.frame.borrow().render_extent
    }

    fn surface_extent(&self) -> VulkanResult<vk::Extent2D> {
        Ok(self.frame.borrow().surface_extent)
    }

    fn wait_idle(&self) -> VulkanResult<()> {
        self.stats.borrow_mut().idle_waits += 1;
        Ok(())
    }

    fn min_uniform_buffer_offset_alignment(&self) -> vk::DeviceSize {
        self.alignment
    }

    fn create_shader_module(&self, code: &[u8]) -> VulkanResult<vk::ShaderModule> {
        if code.is_empty() || code.len() % 4 != 0 {
            return Err(VulkanError::Api(vk::Result::ERROR_INVALID_SHADER_NV));
        }
        Ok(vk::ShaderModule::from_raw(self.fabricate(ObjectKind::ShaderModule)))
    }

    fn destroy_shader_module(&self, module: vk::ShaderModule) {
        self.release(ObjectKind::ShaderModule, module.as_raw());
    }

    fn create_buffer(&self, size: vk::DeviceSize, _usage: vk::BufferUsageFlags, location: MemoryLocation) -> VulkanResult<GpuBuffer> {
        if size == 0 {
            return Err(VulkanError::InvalidOperation { reason: "zero-sized buffer".to_string() });
        }
        let raw = self.fabricate(ObjectKind::Buffer);
        {
            let mut stats = self.stats.borrow_mut();
            stats.buffer_locations.insert(raw, location);
            stats.buffer_contents.insert(raw, vec![0; size as usize]);
        }
        Ok(GpuBuffer {
            buffer: vk::Buffer::from_raw(raw),
            memory: vk::DeviceMemory::from_raw(raw),
            size,
        })
    }

    fn destroy_buffer(&self, buffer: GpuBuffer) {
        let raw = buffer.buffer.as_raw();
        self.release(ObjectKind::Buffer, raw);
        let mut stats = self.stats.borrow_mut();
        stats.buffer_locations.remove(&raw);
        stats.buffer_contents.remove(&raw);
    }

    fn write_buffer(&self, buffer: &GpuBuffer, offset: vk::DeviceSize, bytes: &[u8]) -> VulkanResult<()> {
        let raw = buffer.buffer.as_raw();
        self.require_live(ObjectKind::Buffer, raw)?;
        let mut stats = self.stats.borrow_mut();
        if stats.buffer_locations.get(&raw) != Some(&MemoryLocation::HostVisible) {
            return Err(VulkanError::InvalidOperation { reason: "write to device-local buffer".to_string() });
        }
        let end = offset as usize + bytes.len();
        let contents = stats.buffer_contents.entry(raw).or_default();
        if end > contents.len() {
            return Err(VulkanError::InvalidOperation { reason: "write past end of buffer".to_string() });
        }
        contents[offset as usize..end].copy_from_slice(bytes);
        Ok(())
    }

    fn copy_buffer(&self, src: &GpuBuffer, dst: &GpuBuffer, size: vk::DeviceSize) -> VulkanResult<()> {
        self.require_live(ObjectKind::Buffer, src.buffer.as_raw())?;
        self.require_live(ObjectKind::Buffer, dst.buffer.as_raw())?;
        let mut stats = self.stats.borrow_mut();
        let bytes: Vec<u8> = stats
            .buffer_contents
            .get(&src.buffer.as_raw())
            .map(|contents| contents[..size as usize].to_vec())
            .unwrap_or_default();
        if let Some(contents) = stats.buffer_contents.get_mut(&dst.buffer.as_raw()) {
            contents[..bytes.len()].copy_from_slice(&bytes);
        }
        stats.one_shot_submits += 1;
        Ok(())
    }

    fn create_image(&self, extent: vk::Extent2D, format: vk::Format, _usage: vk::ImageUsageFlags) -> VulkanResult<GpuImage> {
        if extent.width == 0 || extent.height == 0 {
            return Err(VulkanError::InvalidOperation { reason: "zero-sized image".to_string() });
        }
        let raw = self.fabricate(ObjectKind::Image);
        self.stats.borrow_mut().image_extents.push(extent);
        Ok(GpuImage {
            image: vk::Image::from_raw(raw),
            memory: vk::DeviceMemory::from_raw(raw),
            extent,
            format,
        })
    }

    fn destroy_image(&self, image: GpuImage) {
        self.release(ObjectKind::Image, image.image.as_raw());
    }

    fn transition_image_layout(&self, image: &GpuImage, old_layout: vk::ImageLayout, new_layout: vk::ImageLayout) -> VulkanResult<()> {
        self.require_live(ObjectKind::Image, image.image.as_raw())?;
        let mut stats = self.stats.borrow_mut();
        stats.transitions.push((old_layout, new_layout));
        stats.one_shot_submits += 1;
        Ok(())
    }

    fn copy_buffer_to_image(&self, src: &GpuBuffer, dst: &GpuImage, region: &BufferImageRegion) -> VulkanResult<()> {
        self.require_live(ObjectKind::Buffer, src.buffer.as_raw())?;
        self.require_live(ObjectKind::Image, dst.image.as_raw())?;
        let mut stats = self.stats.borrow_mut();
        stats.image_copies.push(*region);
        stats.one_shot_submits += 1;
        Ok(())
    }

    fn create_image_view(&self, image: &GpuImage) -> VulkanResult<vk::ImageView> {
        self.require_live(ObjectKind::Image, image.image.as_raw())?;
        Ok(vk::ImageView::from_raw(self.fabricate(ObjectKind::ImageView)))
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        self.release(ObjectKind::ImageView, view.as_raw());
    }

    fn create_sampler(&self, filter: vk::Filter) -> VulkanResult<vk::Sampler> {
        self.stats.borrow_mut().sampler_filters.push(filter);
        Ok(vk::Sampler::from_raw(self.fabricate(ObjectKind::Sampler)))
    }

    fn destroy_sampler(&self, sampler: vk::Sampler) {
        self.release(ObjectKind::Sampler, sampler.as_raw());
    }

    fn create_descriptor_set_layout(&self, _bindings: &[DescriptorLayoutBinding]) -> VulkanResult<vk::DescriptorSetLayout> {
        Ok(vk::DescriptorSetLayout::from_raw(self.fabricate(ObjectKind::DescriptorSetLayout)))
    }

    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout) {
        self.release(ObjectKind::DescriptorSetLayout, layout.as_raw());
    }

    fn create_pipeline_layout(&self, set_layout: vk::DescriptorSetLayout, push_constant_range: Option<vk::PushConstantRange>) -> VulkanResult<vk::PipelineLayout> {
        self.require_live(ObjectKind::DescriptorSetLayout, set_layout.as_raw())?;
        self.stats
            .borrow_mut()
            .push_constant_ranges
            .push(push_constant_range.map(|range| (range.stage_flags, range.offset, range.size)));
        Ok(vk::PipelineLayout::from_raw(self.fabricate(ObjectKind::PipelineLayout)))
    }

    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        self.release(ObjectKind::PipelineLayout, layout.as_raw());
    }

    fn create_graphics_pipeline(&self, description: &PipelineDescription<'_>) -> VulkanResult<vk::Pipeline> {
        self.require_live(ObjectKind::ShaderModule, description.vertex_module.as_raw())?;
        self.require_live(ObjectKind::ShaderModule, description.fragment_module.as_raw())?;
        self.require_live(ObjectKind::PipelineLayout, description.layout.as_raw())?;
        let pipeline = vk::Pipeline::from_raw(self.fabricate(ObjectKind::Pipeline));
        self.stats.borrow_mut().pipelines.push(RecordedPipeline {
            pipeline,
            vertex_stride: description.vertex_stride,
            attributes: description
                .vertex_attributes
                .iter()
                .map(|attribute| (attribute.location, attribute.offset, attribute.format))
                .collect(),
        });
        Ok(pipeline)
    }

    fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        self.release(ObjectKind::Pipeline, pipeline.as_raw());
    }

    fn create_descriptor_pool(&self, _sizes: &[vk::DescriptorPoolSize], max_sets: u32) -> VulkanResult<vk::DescriptorPool> {
        let raw = self.fabricate(ObjectKind::DescriptorPool);
        let capacity = self.pool_capacity_override.unwrap_or(max_sets);
        self.stats.borrow_mut().pools.insert(raw, PoolState { capacity, allocated: 0 });
        Ok(vk::DescriptorPool::from_raw(raw))
    }

    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        let raw = pool.as_raw();
        self.release(ObjectKind::DescriptorPool, raw);
        let mut stats = self.stats.borrow_mut();
        stats.pools.remove(&raw);
        let orphaned: Vec<u64> = stats
            .set_pools
            .iter()
            .filter(|(_, owner)| **owner == raw)
            .map(|(set, _)| *set)
            .collect();
        for set in orphaned {
            stats.set_pools.remove(&set);
            if stats.live.remove(&set).is_some() {
                *stats.destroyed.entry(ObjectKind::DescriptorSet).or_default() += 1;
            }
        }
    }

    fn allocate_descriptor_set(&self, pool: vk::DescriptorPool, layout: vk::DescriptorSetLayout) -> VulkanResult<vk::DescriptorSet> {
        self.require_live(ObjectKind::DescriptorPool, pool.as_raw())?;
        self.require_live(ObjectKind::DescriptorSetLayout, layout.as_raw())?;
        {
            let mut stats = self.stats.borrow_mut();
            let state = stats
                .pools
                .get_mut(&pool.as_raw())
                .ok_or(VulkanError::Api(vk::Result::ERROR_UNKNOWN))?;
            if state.allocated >= state.capacity {
                return Err(VulkanError::Api(vk::Result::ERROR_OUT_OF_POOL_MEMORY));
            }
            state.allocated += 1;
        }
        let raw = self.fabricate(ObjectKind::DescriptorSet);
        self.stats.borrow_mut().set_pools.insert(raw, pool.as_raw());
        Ok(vk::DescriptorSet::from_raw(raw))
    }

    fn free_descriptor_set(&self, pool: vk::DescriptorPool, set: vk::DescriptorSet) -> VulkanResult<()> {
        let owner = self.stats.borrow().set_pools.get(&set.as_raw()).copied();
        if owner != Some(pool.as_raw()) {
            self.stats.borrow_mut().invalid_releases += 1;
            return Err(VulkanError::InvalidOperation {
                reason: format!("descriptor set {:#x} was not allocated from pool {:#x}", set.as_raw(), pool.as_raw()),
            });
        }
        self.release(ObjectKind::DescriptorSet, set.as_raw());
        let mut stats = self.stats.borrow_mut();
        stats.set_pools.remove(&set.as_raw());
        stats.descriptor_writes.remove(&set);
        if let Some(state) = stats.pools.get_mut(&pool.as_raw()) {
            state.allocated -= 1;
        }
        Ok(())
    }

    fn write_descriptor_set(&self, set: vk::DescriptorSet, writes: &[DescriptorWrite]) {
        self.stats.borrow_mut().descriptor_writes.insert(set, writes.to_vec());
    }

    fn cmd_set_viewport(&self, _command_buffer: vk::CommandBuffer, viewport: vk::Viewport) {
        self.record(Command::SetViewport(RecordedViewport {
            x: viewport.x,
            y: viewport.y,
            width: viewport.width,
            height: viewport.height,
        }));
    }

    fn cmd_set_scissor(&self, _command_buffer: vk::CommandBuffer, scissor: vk::Rect2D) {
        self.record(Command::SetScissor(
            scissor.offset.x,
            scissor.offset.y,
            scissor.extent.width,
            scissor.extent.height,
        ));
    }

    fn cmd_bind_pipeline(&self, _command_buffer: vk::CommandBuffer, pipeline: vk::Pipeline) {
        self.record(Command::BindPipeline(pipeline));
    }

    fn cmd_bind_vertex_buffer(&self, _command_buffer: vk::CommandBuffer, buffer: vk::Buffer) {
        self.record(Command::BindVertexBuffer(buffer));
    }

    fn cmd_bind_index_buffer(&self, _command_buffer: vk::CommandBuffer, buffer: vk::Buffer) {
        self.record(Command::BindIndexBuffer(buffer));
    }

    fn cmd_bind_descriptor_set(&self, _command_buffer: vk::CommandBuffer, _layout: vk::PipelineLayout, set: vk::DescriptorSet) {
        self.record(Command::BindDescriptorSet(set));
    }

    fn cmd_push_constants(&self, _command_buffer: vk::CommandBuffer, _layout: vk::PipelineLayout, stages: vk::ShaderStageFlags, offset: u32, bytes: &[u8]) {
        self.record(Command::PushConstants { stages, offset, bytes: bytes.to_vec() });
    }

    fn cmd_draw_indexed(&self, _command_buffer: vk::CommandBuffer, index_count: u32) {
        self.record(Command::DrawIndexed { index_count });
    }
}
