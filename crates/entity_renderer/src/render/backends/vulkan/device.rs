//! [`GpuDevice`] implementation over `ash`

use std::io::Cursor;
use std::sync::Arc;

use ash::extensions::khr::Surface;
use ash::vk;
use log::{debug, info};

use crate::config::RendererConfig;
use crate::render::gpu::{
    AcquireOutcome, BufferImageRegion, DescriptorLayoutBinding, DescriptorWrite, GpuBuffer, GpuDevice, GpuImage,
    MemoryLocation, PipelineDescription, PresentOutcome,
};

use super::initialization::{LogicalDevice, PhysicalDeviceInfo, VulkanLibrary};
use super::rendering::{pipeline, CommandPool, RenderPass};
use super::resources::{buffer, descriptor, image};
use super::state::{DepthBuffer, Framebuffer, FrameSync, Semaphore, Swapchain};
use super::{VulkanError, VulkanResult};

/// Alignment assumed before a physical device is selected
const FALLBACK_UNIFORM_ALIGNMENT: vk::DeviceSize = 256;

/// Objects rebuilt together whenever the swapchain is recreated
struct PresentTargets {
    framebuffers: Vec<Framebuffer>,
    // Only referenced through the framebuffers' attachments
    #[allow(dead_code)]
    depth: DepthBuffer,
    // Indexed by swapchain image: a present may still wait on the semaphore
    // after the slot that signaled it has moved on
    render_finished: Vec<Semaphore>,
    swapchain: Swapchain,
}

impl PresentTargets {
    fn new(logical: &LogicalDevice, physical: &PhysicalDeviceInfo, render_pass: vk::RenderPass, swapchain: Swapchain) -> VulkanResult<Self> {
        let extent = swapchain.extent();
        let depth = DepthBuffer::new(logical.device.clone(), physical, extent)?;

        let framebuffers = swapchain
            .image_views()
            .iter()
            .map(|&view| Framebuffer::new(logical.device.clone(), render_pass, &[view, depth.view()], extent))
            .collect::<VulkanResult<Vec<_>>>()?;

        let render_finished = (0..swapchain.image_count())
            .map(|_| Semaphore::new(logical.device.clone()))
            .collect::<VulkanResult<Vec<_>>>()?;

        Ok(Self { framebuffers, depth, render_finished, swapchain })
    }
}

/// Everything created once a surface exists; fields drop top to bottom
struct DeviceState {
    frames: Vec<FrameSync>,
    targets: PresentTargets,
    render_pass: RenderPass,
    command_pool: CommandPool,
    logical: LogicalDevice,
    physical: PhysicalDeviceInfo,
}

/// Vulkan device bound to one window surface
///
/// Created without GPU objects; [`GpuDevice::create_surface_resources`]
/// picks the physical device and builds the swapchain, render pass and frame
/// slots. The surface handed to it is owned and destroyed by this device.
pub struct VulkanDevice {
    library: Arc<VulkanLibrary>,
    surface_loader: Surface,
    surface: vk::SurfaceKHR,
    window_extent: vk::Extent2D,
    vsync: bool,
    state: Option<DeviceState>,
}

impl VulkanDevice {
    /// Create a device that will present through surfaces of `library`'s instance
    pub fn new(library: Arc<VulkanLibrary>, config: &RendererConfig) -> Self {
        let surface_loader = Surface::new(library.entry(), library.instance());
        Self {
            library,
            surface_loader,
            surface: vk::SurfaceKHR::null(),
            window_extent: vk::Extent2D { width: 800, height: 600 },
            vsync: config.vsync,
            state: None,
        }
    }

    /// Window size used when the surface leaves the swapchain extent open
    pub fn set_window_extent(&mut self, width: u32, height: u32) {
        self.window_extent = vk::Extent2D { width, height };
    }

    /// Name of the selected GPU, once surface resources exist
    pub fn device_name(&self) -> Option<String> {
        self.state.as_ref().map(|state| state.physical.name())
    }

    fn state(&self, operation: &str) -> VulkanResult<&DeviceState> {
        self.state.as_ref().ok_or_else(|| VulkanError::not_initialized(operation))
    }

    fn state_mut(&mut self, operation: &str) -> VulkanResult<&mut DeviceState> {
        self.state.as_mut().ok_or_else(|| VulkanError::not_initialized(operation))
    }

    fn frame<'a>(state: &'a DeviceState, slot: usize) -> VulkanResult<&'a FrameSync> {
        state.frames.get(slot).ok_or_else(|| VulkanError::InvalidOperation {
            reason: format!("Frame slot {slot} out of range ({} slots)", state.frames.len()),
        })
    }

    fn build_state(&self, frames_in_flight: usize) -> VulkanResult<DeviceState> {
        let instance = self.library.instance();
        let physical = PhysicalDeviceInfo::select_suitable_device(instance, self.surface, &self.surface_loader)?;
        let logical = LogicalDevice::new(instance, &physical)?;
        let command_pool = CommandPool::new(logical.device.clone(), physical.graphics_family)?;

        let swapchain = Swapchain::new(
            logical.device.clone(),
            logical.swapchain_loader.clone(),
            self.surface,
            &self.surface_loader,
            &physical,
            self.window_extent,
            self.vsync,
            vk::SwapchainKHR::null(),
        )?;
        let render_pass = RenderPass::new_forward_pass(logical.device.clone(), swapchain.format())?;
        let targets = PresentTargets::new(&logical, &physical, render_pass.handle(), swapchain)?;

        let frame_count = u32::try_from(frames_in_flight).map_err(|_| VulkanError::InvalidOperation {
            reason: format!("Too many frames in flight: {frames_in_flight}"),
        })?;
        let frames = command_pool
            .allocate_command_buffers(frame_count)?
            .into_iter()
            .map(|command_buffer| FrameSync::new(logical.device.clone(), command_buffer))
            .collect::<VulkanResult<Vec<_>>>()?;

        Ok(DeviceState { frames, targets, render_pass, command_pool, logical, physical })
    }
}

impl GpuDevice for VulkanDevice {
    fn create_surface_resources(&mut self, surface: vk::SurfaceKHR, frames_in_flight: usize) -> VulkanResult<()> {
        if self.state.is_some() || self.surface != vk::SurfaceKHR::null() {
            return Err(VulkanError::InvalidOperation {
                reason: "Surface resources already created".to_string(),
            });
        }
        self.surface = surface;

        let state = self.build_state(frames_in_flight)?;
        let extent = state.targets.swapchain.extent();
        info!(
            "Surface resources ready on {}: {}x{}, {} frames in flight",
            state.physical.name(),
            extent.width,
            extent.height,
            frames_in_flight
        );
        self.state = Some(state);
        Ok(())
    }

    fn wait_for_frame(&mut self, slot: usize) -> VulkanResult<()> {
        let state = self.state("wait_for_frame")?;
        Self::frame(state, slot)?.in_flight.wait()
    }

    fn acquire_next_image(&mut self, slot: usize) -> VulkanResult<AcquireOutcome> {
        let state = self.state("acquire_next_image")?;
        let frame = Self::frame(state, slot)?;
        let swapchain = &state.targets.swapchain;

        let result = unsafe {
            swapchain.loader().acquire_next_image(
                swapchain.handle(),
                u64::MAX,
                frame.image_available.handle(),
                vk::Fence::null(),
            )
        };
        match result {
            // A suboptimal image is still usable; presentation reports it
            Ok((index, _)) => Ok(AcquireOutcome::Acquired(index)),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
            Err(e) => Err(VulkanError::Api(e)),
        }
    }

    fn begin_frame(&mut self, slot: usize, image_index: u32, clear_color: [f32; 4]) -> VulkanResult<vk::CommandBuffer> {
        let state = self.state("begin_frame")?;
        let frame = Self::frame(state, slot)?;
        let framebuffer = state
            .targets
            .framebuffers
            .get(image_index as usize)
            .ok_or_else(|| VulkanError::InvalidOperation {
                reason: format!("Swapchain image {image_index} out of range"),
            })?;
        let device = &state.logical.device;
        let command_buffer = frame.command_buffer;

        frame.in_flight.reset()?;
        unsafe {
            device
                .reset_command_buffer(command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(VulkanError::Api)?;
            let begin_info = vk::CommandBufferBeginInfo::builder().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            device
                .begin_command_buffer(command_buffer, &begin_info)
                .map_err(VulkanError::Api)?;
        }

        let clear_values = [
            vk::ClearValue { color: vk::ClearColorValue { float32: clear_color } },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 },
            },
        ];
        let render_area = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: state.targets.swapchain.extent(),
        };
        let render_pass_begin = vk::RenderPassBeginInfo::builder()
            .render_pass(state.render_pass.handle())
            .framebuffer(framebuffer.handle())
            .render_area(render_area)
            .clear_values(&clear_values);

        unsafe {
            device.cmd_begin_render_pass(command_buffer, &render_pass_begin, vk::SubpassContents::INLINE);
        }
        Ok(command_buffer)
    }

    fn end_frame(&mut self, slot: usize, image_index: u32) -> VulkanResult<PresentOutcome> {
        let state = self.state("end_frame")?;
        let frame = Self::frame(state, slot)?;
        let render_finished = state
            .targets
            .render_finished
            .get(image_index as usize)
            .ok_or_else(|| VulkanError::InvalidOperation {
                reason: format!("Swapchain image {image_index} out of range"),
            })?;
        let device = &state.logical.device;

        unsafe {
            device.cmd_end_render_pass(frame.command_buffer);
            device.end_command_buffer(frame.command_buffer).map_err(VulkanError::Api)?;
        }

        let wait_semaphores = [frame.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [frame.command_buffer];
        let signal_semaphores = [render_finished.handle()];
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores)
            .build();

        unsafe {
            device
                .queue_submit(state.logical.graphics_queue, &[submit_info], frame.in_flight.handle())
                .map_err(VulkanError::Api)?;
        }

        let swapchains = [state.targets.swapchain.handle()];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&signal_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = unsafe {
            state
                .targets
                .swapchain
                .loader()
                .queue_present(state.logical.present_queue, &present_info)
        };
        match result {
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) => Ok(PresentOutcome::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::OutOfDate),
            Err(e) => Err(VulkanError::Api(e)),
        }
    }

    fn rebuild_swapchain(&mut self) -> VulkanResult<()> {
        let surface = self.surface;
        let window_extent = self.window_extent;
        let vsync = self.vsync;
        let surface_loader = self.surface_loader.clone();
        let state = self.state_mut("rebuild_swapchain")?;

        unsafe { state.logical.device.device_wait_idle() }.map_err(VulkanError::Api)?;

        let swapchain = Swapchain::new(
            state.logical.device.clone(),
            state.logical.swapchain_loader.clone(),
            surface,
            &surface_loader,
            &state.physical,
            window_extent,
            vsync,
            state.targets.swapchain.handle(),
        )?;
        if swapchain.format() != state.targets.swapchain.format() {
            return Err(VulkanError::InvalidOperation {
                reason: format!(
                    "Surface format changed from {:?} to {:?}",
                    state.targets.swapchain.format(),
                    swapchain.format()
                ),
            });
        }

        let extent = swapchain.extent();
        state.targets = PresentTargets::new(&state.logical, &state.physical, state.render_pass.handle(), swapchain)?;
        debug!("Rebuilt swapchain at {}x{}", extent.width, extent.height);
        Ok(())
    }

    fn render_extent(&self) -> vk::Extent2D {
        self.state
            .as_ref()
            .map_or_else(vk::Extent2D::default, |state| state.targets.swapchain.extent())
    }

    fn surface_extent(&self) -> VulkanResult<vk::Extent2D> {
        let state = self.state("surface_extent")?;
        let capabilities = unsafe {
            self.surface_loader
                .get_physical_device_surface_capabilities(state.physical.device, self.surface)
        }
        .map_err(VulkanError::Api)?;

        if capabilities.current_extent.width == u32::MAX {
            Ok(self.window_extent)
        } else {
            Ok(capabilities.current_extent)
        }
    }

    fn wait_idle(&self) -> VulkanResult<()> {
        match &self.state {
            Some(state) => unsafe { state.logical.device.device_wait_idle() }.map_err(VulkanError::Api),
            None => Ok(()),
        }
    }

    fn min_uniform_buffer_offset_alignment(&self) -> vk::DeviceSize {
        self.state.as_ref().map_or(FALLBACK_UNIFORM_ALIGNMENT, |state| {
            state.physical.properties.limits.min_uniform_buffer_offset_alignment.max(1)
        })
    }

    fn create_shader_module(&self, code: &[u8]) -> VulkanResult<vk::ShaderModule> {
        let state = self.state("create_shader_module")?;
        let words = ash::util::read_spv(&mut Cursor::new(code)).map_err(|e| VulkanError::InvalidOperation {
            reason: format!("Invalid SPIR-V: {e}"),
        })?;
        let create_info = vk::ShaderModuleCreateInfo::builder().code(&words);
        unsafe { state.logical.device.create_shader_module(&create_info, None) }.map_err(VulkanError::Api)
    }

    fn destroy_shader_module(&self, module: vk::ShaderModule) {
        if let Some(state) = &self.state {
            unsafe { state.logical.device.destroy_shader_module(module, None) };
        }
    }

    fn create_buffer(&self, size: vk::DeviceSize, usage: vk::BufferUsageFlags, location: MemoryLocation) -> VulkanResult<GpuBuffer> {
        let state = self.state("create_buffer")?;
        buffer::create_buffer(&state.logical.device, &state.physical, size, usage, location)
    }

    fn destroy_buffer(&self, gpu_buffer: GpuBuffer) {
        if let Some(state) = &self.state {
            buffer::destroy_buffer(&state.logical.device, gpu_buffer);
        }
    }

    fn write_buffer(&self, gpu_buffer: &GpuBuffer, offset: vk::DeviceSize, bytes: &[u8]) -> VulkanResult<()> {
        let state = self.state("write_buffer")?;
        buffer::write_buffer(&state.logical.device, gpu_buffer, offset, bytes)
    }

    fn copy_buffer(&self, src: &GpuBuffer, dst: &GpuBuffer, size: vk::DeviceSize) -> VulkanResult<()> {
        let state = self.state("copy_buffer")?;
        state.command_pool.submit_once(state.logical.graphics_queue, |device, command_buffer| {
            let region = vk::BufferCopy { src_offset: 0, dst_offset: 0, size };
            unsafe { device.cmd_copy_buffer(command_buffer, src.buffer, dst.buffer, &[region]) };
            Ok(())
        })
    }

    fn create_image(&self, extent: vk::Extent2D, format: vk::Format, usage: vk::ImageUsageFlags) -> VulkanResult<GpuImage> {
        let state = self.state("create_image")?;
        image::create_image(&state.logical.device, &state.physical, extent, format, usage)
    }

    fn destroy_image(&self, gpu_image: GpuImage) {
        if let Some(state) = &self.state {
            image::destroy_image(&state.logical.device, gpu_image);
        }
    }

    fn transition_image_layout(&self, gpu_image: &GpuImage, old_layout: vk::ImageLayout, new_layout: vk::ImageLayout) -> VulkanResult<()> {
        let state = self.state("transition_image_layout")?;
        state.command_pool.submit_once(state.logical.graphics_queue, |device, command_buffer| {
            image::record_transition(device, command_buffer, gpu_image.image, old_layout, new_layout)
        })
    }

    fn copy_buffer_to_image(&self, src: &GpuBuffer, dst: &GpuImage, region: &BufferImageRegion) -> VulkanResult<()> {
        let state = self.state("copy_buffer_to_image")?;
        let copy = vk::BufferImageCopy {
            buffer_offset: region.buffer_offset,
            buffer_row_length: region.buffer_row_length,
            buffer_image_height: region.buffer_image_height,
            image_subresource: vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: 0,
                base_array_layer: 0,
                layer_count: 1,
            },
            image_offset: vk::Offset3D { x: 0, y: 0, z: 0 },
            image_extent: vk::Extent3D {
                width: region.extent.width,
                height: region.extent.height,
                depth: 1,
            },
        };
        state.command_pool.submit_once(state.logical.graphics_queue, |device, command_buffer| {
            unsafe {
                device.cmd_copy_buffer_to_image(
                    command_buffer,
                    src.buffer,
                    dst.image,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &[copy],
                );
            }
            Ok(())
        })
    }

    fn create_image_view(&self, gpu_image: &GpuImage) -> VulkanResult<vk::ImageView> {
        let state = self.state("create_image_view")?;
        image::create_image_view(&state.logical.device, gpu_image.image, gpu_image.format, vk::ImageAspectFlags::COLOR)
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        if let Some(state) = &self.state {
            unsafe { state.logical.device.destroy_image_view(view, None) };
        }
    }

    fn create_sampler(&self, filter: vk::Filter) -> VulkanResult<vk::Sampler> {
        let state = self.state("create_sampler")?;
        image::create_sampler(&state.logical.device, filter)
    }

    fn destroy_sampler(&self, sampler: vk::Sampler) {
        if let Some(state) = &self.state {
            unsafe { state.logical.device.destroy_sampler(sampler, None) };
        }
    }

    fn create_descriptor_set_layout(&self, bindings: &[DescriptorLayoutBinding]) -> VulkanResult<vk::DescriptorSetLayout> {
        let state = self.state("create_descriptor_set_layout")?;
        descriptor::create_set_layout(&state.logical.device, bindings)
    }

    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout) {
        if let Some(state) = &self.state {
            unsafe { state.logical.device.destroy_descriptor_set_layout(layout, None) };
        }
    }

    fn create_pipeline_layout(&self, set_layout: vk::DescriptorSetLayout, push_constant_range: Option<vk::PushConstantRange>) -> VulkanResult<vk::PipelineLayout> {
        let state = self.state("create_pipeline_layout")?;
        pipeline::create_pipeline_layout(&state.logical.device, set_layout, push_constant_range)
    }

    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        if let Some(state) = &self.state {
            unsafe { state.logical.device.destroy_pipeline_layout(layout, None) };
        }
    }

    fn create_graphics_pipeline(&self, description: &PipelineDescription<'_>) -> VulkanResult<vk::Pipeline> {
        let state = self.state("create_graphics_pipeline")?;
        pipeline::create_graphics_pipeline(&state.logical.device, state.render_pass.handle(), description)
    }

    fn destroy_pipeline(&self, handle: vk::Pipeline) {
        if let Some(state) = &self.state {
            unsafe { state.logical.device.destroy_pipeline(handle, None) };
        }
    }

    fn create_descriptor_pool(&self, sizes: &[vk::DescriptorPoolSize], max_sets: u32) -> VulkanResult<vk::DescriptorPool> {
        let state = self.state("create_descriptor_pool")?;
        descriptor::create_pool(&state.logical.device, sizes, max_sets)
    }

    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        if let Some(state) = &self.state {
            unsafe { state.logical.device.destroy_descriptor_pool(pool, None) };
        }
    }

    fn allocate_descriptor_set(&self, pool: vk::DescriptorPool, layout: vk::DescriptorSetLayout) -> VulkanResult<vk::DescriptorSet> {
        let state = self.state("allocate_descriptor_set")?;
        descriptor::allocate_set(&state.logical.device, pool, layout)
    }

    fn free_descriptor_set(&self, pool: vk::DescriptorPool, set: vk::DescriptorSet) -> VulkanResult<()> {
        let state = self.state("free_descriptor_set")?;
        unsafe { state.logical.device.free_descriptor_sets(pool, &[set]) }.map_err(VulkanError::Api)
    }

    fn write_descriptor_set(&self, set: vk::DescriptorSet, writes: &[DescriptorWrite]) {
        if let Some(state) = &self.state {
            descriptor::write_set(&state.logical.device, set, writes);
        }
    }

    fn cmd_set_viewport(&self, command_buffer: vk::CommandBuffer, viewport: vk::Viewport) {
        if let Some(state) = &self.state {
            unsafe { state.logical.device.cmd_set_viewport(command_buffer, 0, &[viewport]) };
        }
    }

    fn cmd_set_scissor(&self, command_buffer: vk::CommandBuffer, scissor: vk::Rect2D) {
        if let Some(state) = &self.state {
            unsafe { state.logical.device.cmd_set_scissor(command_buffer, 0, &[scissor]) };
        }
    }

    fn cmd_bind_pipeline(&self, command_buffer: vk::CommandBuffer, handle: vk::Pipeline) {
        if let Some(state) = &self.state {
            unsafe {
                state
                    .logical
                    .device
                    .cmd_bind_pipeline(command_buffer, vk::PipelineBindPoint::GRAPHICS, handle);
            }
        }
    }

    fn cmd_bind_vertex_buffer(&self, command_buffer: vk::CommandBuffer, vertex_buffer: vk::Buffer) {
        if let Some(state) = &self.state {
            unsafe {
                state
                    .logical
                    .device
                    .cmd_bind_vertex_buffers(command_buffer, 0, &[vertex_buffer], &[0]);
            }
        }
    }

    fn cmd_bind_index_buffer(&self, command_buffer: vk::CommandBuffer, index_buffer: vk::Buffer) {
        if let Some(state) = &self.state {
            unsafe {
                state
                    .logical
                    .device
                    .cmd_bind_index_buffer(command_buffer, index_buffer, 0, vk::IndexType::UINT32);
            }
        }
    }

    fn cmd_bind_descriptor_set(&self, command_buffer: vk::CommandBuffer, layout: vk::PipelineLayout, set: vk::DescriptorSet) {
        if let Some(state) = &self.state {
            unsafe {
                state.logical.device.cmd_bind_descriptor_sets(
                    command_buffer,
                    vk::PipelineBindPoint::GRAPHICS,
                    layout,
                    0,
                    &[set],
                    &[],
                );
            }
        }
    }

    fn cmd_push_constants(&self, command_buffer: vk::CommandBuffer, layout: vk::PipelineLayout, stages: vk::ShaderStageFlags, offset: u32, bytes: &[u8]) {
        if let Some(state) = &self.state {
            unsafe {
                state
                    .logical
                    .device
                    .cmd_push_constants(command_buffer, layout, stages, offset, bytes);
            }
        }
    }

    fn cmd_draw_indexed(&self, command_buffer: vk::CommandBuffer, index_count: u32) {
        if let Some(state) = &self.state {
            unsafe { state.logical.device.cmd_draw_indexed(command_buffer, index_count, 1, 0, 0, 0) };
        }
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        if let Some(state) = self.state.take() {
            unsafe {
                let _ = state.logical.device.device_wait_idle();
            }
            drop(state);
        }
        if self.surface != vk::SurfaceKHR::null() {
            unsafe { self.surface_loader.destroy_surface(self.surface, None) };
        }
    }
}
