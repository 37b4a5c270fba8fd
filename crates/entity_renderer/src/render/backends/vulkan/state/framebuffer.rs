//! Framebuffers and the shared depth attachment

use ash::{vk, Device};

use crate::render::backends::vulkan::initialization::PhysicalDeviceInfo;
use crate::render::backends::vulkan::resources::image;
use crate::render::backends::vulkan::rendering::DEPTH_FORMAT;
use crate::render::backends::vulkan::{VulkanError, VulkanResult};
use crate::render::gpu::GpuImage;

/// Framebuffer wrapper with RAII cleanup
pub struct Framebuffer {
    device: Device,
    framebuffer: vk::Framebuffer,
}

impl Framebuffer {
    /// Create a framebuffer over the given attachments
    pub fn new(
        device: Device,
        render_pass: vk::RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> VulkanResult<Self> {
        let create_info = vk::FramebufferCreateInfo::builder()
            .render_pass(render_pass)
            .attachments(attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        let framebuffer = unsafe { device.create_framebuffer(&create_info, None) }.map_err(VulkanError::Api)?;
        Ok(Self { device, framebuffer })
    }

    /// Framebuffer handle
    pub fn handle(&self) -> vk::Framebuffer {
        self.framebuffer
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_framebuffer(self.framebuffer, None);
        }
    }
}

/// Depth image shared by every framebuffer of a swapchain
pub struct DepthBuffer {
    device: Device,
    image: GpuImage,
    view: vk::ImageView,
}

impl DepthBuffer {
    /// Create a depth attachment matching the swapchain extent
    pub fn new(device: Device, physical: &PhysicalDeviceInfo, extent: vk::Extent2D) -> VulkanResult<Self> {
        let depth = image::create_image(
            &device,
            physical,
            extent,
            DEPTH_FORMAT,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
        )?;

        let view = match image::create_image_view(&device, depth.image, DEPTH_FORMAT, vk::ImageAspectFlags::DEPTH) {
            Ok(view) => view,
            Err(e) => {
                image::destroy_image(&device, depth);
                return Err(e);
            }
        };

        Ok(Self { device, image: depth, view })
    }

    /// Depth view handle
    pub fn view(&self) -> vk::ImageView {
        self.view
    }
}

impl Drop for DepthBuffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_image_view(self.view, None);
        }
        image::destroy_image(&self.device, self.image);
    }
}
