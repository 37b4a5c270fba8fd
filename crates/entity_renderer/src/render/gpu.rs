//! Native graphics object layer
//!
//! [`GpuDevice`] is the seam between the renderer's caching logic and the
//! actual Vulkan calls. The renderer only ever talks to this trait, using
//! `ash::vk` handles as opaque currency; [`VulkanDevice`] implements it on top
//! of `ash`, and [`MockDevice`] records the calls for tests.
//!
//! Resources created through the trait are plain handle bundles without
//! `Drop` glue. Their owners dispose them explicitly, because the renderer
//! must decide *when* destruction is safe (after waiting for the device).
//!
//! [`VulkanDevice`]: super::backends::vulkan::VulkanDevice
//! [`MockDevice`]: super::mock::MockDevice

use ash::vk;

use super::backends::vulkan::VulkanResult;

/// Where a buffer's memory lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryLocation {
    /// Host-visible, host-coherent memory the CPU writes directly
    HostVisible,
    /// Device-local memory filled through a staging copy
    DeviceLocal,
}

/// Buffer handle plus its bound memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GpuBuffer {
    /// Buffer handle
    pub buffer: vk::Buffer,
    /// Backing memory
    pub memory: vk::DeviceMemory,
    /// Size in bytes
    pub size: vk::DeviceSize,
}

/// 2D image handle plus its bound memory
#[derive(Debug, Clone, Copy)]
pub struct GpuImage {
    /// Image handle
    pub image: vk::Image,
    /// Backing memory
    pub memory: vk::DeviceMemory,
    /// Dimensions in pixels
    pub extent: vk::Extent2D,
    /// Texel format
    pub format: vk::Format,
}

/// Region of a tightly packed staging buffer copied into a whole image
#[derive(Debug, Clone, Copy)]
pub struct BufferImageRegion {
    /// Byte offset of the first copied texel
    pub buffer_offset: vk::DeviceSize,
    /// Row pitch of the staging data, in texels
    pub buffer_row_length: u32,
    /// Image height of the staging data, in texels
    pub buffer_image_height: u32,
    /// Size of the copied rectangle
    pub extent: vk::Extent2D,
}

/// One binding of a descriptor set layout
#[derive(Debug, Clone, Copy)]
pub struct DescriptorLayoutBinding {
    /// Binding index
    pub binding: u32,
    /// Descriptor type
    pub descriptor_type: vk::DescriptorType,
    /// Stages that read the binding
    pub stages: vk::ShaderStageFlags,
}

/// Resource written into one binding of a descriptor set
#[derive(Debug, Clone, Copy)]
pub enum DescriptorWrite {
    /// Uniform buffer range starting at offset zero
    UniformBuffer {
        /// Binding index
        binding: u32,
        /// Buffer handle
        buffer: vk::Buffer,
        /// Bytes visible to the shader
        range: vk::DeviceSize,
    },
    /// Combined image sampler in shader-read-only layout
    CombinedImageSampler {
        /// Binding index
        binding: u32,
        /// Image view
        view: vk::ImageView,
        /// Sampler
        sampler: vk::Sampler,
    },
}

/// Everything that varies between the renderer's graphics pipelines
///
/// Fixed state (triangle lists, back-face culling off, depth test, alpha
/// blending, dynamic viewport and scissor) is owned by the device.
#[derive(Debug, Clone, Copy)]
pub struct PipelineDescription<'a> {
    /// Vertex stage module
    pub vertex_module: vk::ShaderModule,
    /// Fragment stage module
    pub fragment_module: vk::ShaderModule,
    /// Pipeline layout
    pub layout: vk::PipelineLayout,
    /// Interleaved vertex stride in bytes
    pub vertex_stride: u32,
    /// Vertex attributes within binding 0
    pub vertex_attributes: &'a [vk::VertexInputAttributeDescription],
}

/// Result of acquiring a swapchain image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// Image ready to render into
    Acquired(u32),
    /// Swapchain no longer matches the surface
    OutOfDate,
}

/// Result of presenting a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    /// Presented normally
    Presented,
    /// Presented, but the swapchain should be rebuilt
    Suboptimal,
    /// Swapchain no longer matches the surface
    OutOfDate,
}

/// Native graphics operations consumed by the renderer
pub trait GpuDevice {
    // Frame and presentation

    /// Build device, swapchain, render pass and per-frame objects for a surface
    fn create_surface_resources(&mut self, surface: vk::SurfaceKHR, frames_in_flight: usize) -> VulkanResult<()>;

    /// Block until the frame slot's previous submission finished
    fn wait_for_frame(&mut self, slot: usize) -> VulkanResult<()>;

    /// Acquire the next swapchain image for a frame slot
    fn acquire_next_image(&mut self, slot: usize) -> VulkanResult<AcquireOutcome>;

    /// Reset the slot's fence and command buffer, begin recording and the render pass
    fn begin_frame(&mut self, slot: usize, image_index: u32, clear_color: [f32; 4]) -> VulkanResult<vk::CommandBuffer>;

    /// End the render pass, submit the slot's command buffer and present
    fn end_frame(&mut self, slot: usize, image_index: u32) -> VulkanResult<PresentOutcome>;

    /// Recreate swapchain, depth buffer and framebuffers for the current surface size
    fn rebuild_swapchain(&mut self) -> VulkanResult<()>;

    /// Extent of the current swapchain images
    fn render_extent(&self) -> vk::Extent2D;

    /// Current extent of the window surface
    fn surface_extent(&self) -> VulkanResult<vk::Extent2D>;

    /// Block until the device has no work in flight
    fn wait_idle(&self) -> VulkanResult<()>;

    /// Required alignment for uniform buffer sizes and offsets
    fn min_uniform_buffer_offset_alignment(&self) -> vk::DeviceSize;

    // Resources

    /// Create a shader module from SPIR-V bytes
    fn create_shader_module(&self, code: &[u8]) -> VulkanResult<vk::ShaderModule>;
    /// Destroy a shader module
    fn destroy_shader_module(&self, module: vk::ShaderModule);

    /// Create a buffer with bound memory
    fn create_buffer(&self, size: vk::DeviceSize, usage: vk::BufferUsageFlags, location: MemoryLocation) -> VulkanResult<GpuBuffer>;
    /// Destroy a buffer and free its memory
    fn destroy_buffer(&self, buffer: GpuBuffer);
    /// Copy bytes into a host-visible buffer
    fn write_buffer(&self, buffer: &GpuBuffer, offset: vk::DeviceSize, bytes: &[u8]) -> VulkanResult<()>;
    /// Copy between buffers and wait for completion
    fn copy_buffer(&self, src: &GpuBuffer, dst: &GpuBuffer, size: vk::DeviceSize) -> VulkanResult<()>;

    /// Create a 2D optimal-tiling image with bound device-local memory
    fn create_image(&self, extent: vk::Extent2D, format: vk::Format, usage: vk::ImageUsageFlags) -> VulkanResult<GpuImage>;
    /// Destroy an image and free its memory
    fn destroy_image(&self, image: GpuImage);
    /// Transition an image's layout and wait for completion
    fn transition_image_layout(&self, image: &GpuImage, old_layout: vk::ImageLayout, new_layout: vk::ImageLayout) -> VulkanResult<()>;
    /// Copy a buffer region into an image in transfer-destination layout and wait for completion
    fn copy_buffer_to_image(&self, src: &GpuBuffer, dst: &GpuImage, region: &BufferImageRegion) -> VulkanResult<()>;
    /// Create a color view over a whole image
    fn create_image_view(&self, image: &GpuImage) -> VulkanResult<vk::ImageView>;
    /// Destroy an image view
    fn destroy_image_view(&self, view: vk::ImageView);
    /// Create a clamp-to-edge sampler with the given filter
    fn create_sampler(&self, filter: vk::Filter) -> VulkanResult<vk::Sampler>;
    /// Destroy a sampler
    fn destroy_sampler(&self, sampler: vk::Sampler);

    /// Create a descriptor set layout
    fn create_descriptor_set_layout(&self, bindings: &[DescriptorLayoutBinding]) -> VulkanResult<vk::DescriptorSetLayout>;
    /// Destroy a descriptor set layout
    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout);
    /// Create a pipeline layout with one set layout and an optional push constant range
    fn create_pipeline_layout(&self, set_layout: vk::DescriptorSetLayout, push_constant_range: Option<vk::PushConstantRange>) -> VulkanResult<vk::PipelineLayout>;
    /// Destroy a pipeline layout
    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout);
    /// Create a graphics pipeline for the device's render pass
    fn create_graphics_pipeline(&self, description: &PipelineDescription<'_>) -> VulkanResult<vk::Pipeline>;
    /// Destroy a pipeline
    fn destroy_pipeline(&self, pipeline: vk::Pipeline);

    /// Create a descriptor pool whose sets can be freed individually
    fn create_descriptor_pool(&self, sizes: &[vk::DescriptorPoolSize], max_sets: u32) -> VulkanResult<vk::DescriptorPool>;
    /// Destroy a descriptor pool and every set allocated from it
    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool);
    /// Allocate one descriptor set
    ///
    /// An exhausted pool is reported as `ERROR_OUT_OF_POOL_MEMORY` or
    /// `ERROR_FRAGMENTED_POOL`.
    fn allocate_descriptor_set(&self, pool: vk::DescriptorPool, layout: vk::DescriptorSetLayout) -> VulkanResult<vk::DescriptorSet>;
    /// Return a descriptor set to its pool
    fn free_descriptor_set(&self, pool: vk::DescriptorPool, set: vk::DescriptorSet) -> VulkanResult<()>;
    /// Point a descriptor set's bindings at resources
    fn write_descriptor_set(&self, set: vk::DescriptorSet, writes: &[DescriptorWrite]);

    // Recording

    /// Set the dynamic viewport
    fn cmd_set_viewport(&self, command_buffer: vk::CommandBuffer, viewport: vk::Viewport);
    /// Set the dynamic scissor
    fn cmd_set_scissor(&self, command_buffer: vk::CommandBuffer, scissor: vk::Rect2D);
    /// Bind a graphics pipeline
    fn cmd_bind_pipeline(&self, command_buffer: vk::CommandBuffer, pipeline: vk::Pipeline);
    /// Bind a vertex buffer at binding 0
    fn cmd_bind_vertex_buffer(&self, command_buffer: vk::CommandBuffer, buffer: vk::Buffer);
    /// Bind a `u32` index buffer
    fn cmd_bind_index_buffer(&self, command_buffer: vk::CommandBuffer, buffer: vk::Buffer);
    /// Bind a descriptor set at set 0
    fn cmd_bind_descriptor_set(&self, command_buffer: vk::CommandBuffer, layout: vk::PipelineLayout, set: vk::DescriptorSet);
    /// Upload push constant bytes
    fn cmd_push_constants(&self, command_buffer: vk::CommandBuffer, layout: vk::PipelineLayout, stages: vk::ShaderStageFlags, offset: u32, bytes: &[u8]);
    /// Draw one instance of an indexed triangle list
    fn cmd_draw_indexed(&self, command_buffer: vk::CommandBuffer, index_count: u32);
}

/// GPU objects released explicitly through the device that created them
pub trait Disposable {
    /// Destroy every native object held by `self`
    fn dispose<D: GpuDevice + ?Sized>(self, device: &D);
}

impl Disposable for GpuBuffer {
    fn dispose<D: GpuDevice + ?Sized>(self, device: &D) {
        device.destroy_buffer(self);
    }
}
