//! Texture image compilation
//!
//! A texture binding selects a normalized sub-rectangle of a texture. Only
//! that rectangle is uploaded: the full pixel buffer goes into a staging
//! buffer and a strided copy pulls the region into a device-local image,
//! bracketed by the two layout transitions a sampled image needs.

use ash::vk;
use log::debug;

use crate::render::backends::vulkan::VulkanResult;
use crate::render::cache::Versioned;
use crate::render::error::{RenderError, RenderResult};
use crate::render::gpu::{BufferImageRegion, Disposable, GpuBuffer, GpuDevice, GpuImage, MemoryLocation};
use crate::world::{Entity, FilterMode, TextureBinding, TextureData, TextureRegion};

/// Texel format of every uploaded texture
pub const TEXTURE_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;

const BYTES_PER_PIXEL: usize = 4;

/// Region of a texture in whole pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    /// Left edge
    pub x: u32,
    /// Top edge
    pub y: u32,
    /// Width
    pub width: u32,
    /// Height
    pub height: u32,
}

/// Convert a normalized region to pixels
///
/// The corners may be given in any order; the rectangle spans their
/// component-wise minimum to maximum, clamped to the texture.
pub fn pixel_rect(texture: Entity, region: &TextureRegion, width: u32, height: u32) -> RenderResult<PixelRect> {
    let to_pixels = |coordinate: f32, size: u32| -> u32 {
        (coordinate.clamp(0.0, 1.0) * size as f32).round() as u32
    };

    let x0 = to_pixels(region.a.x.min(region.b.x), width);
    let x1 = to_pixels(region.a.x.max(region.b.x), width);
    let y0 = to_pixels(region.a.y.min(region.b.y), height);
    let y1 = to_pixels(region.a.y.max(region.b.y), height);

    if x1 <= x0 || y1 <= y0 {
        return Err(RenderError::EmptyTextureRegion { texture });
    }
    Ok(PixelRect { x: x0, y: y0, width: x1 - x0, height: y1 - y0 })
}

/// Vulkan filter for an engine filter mode
pub const fn filter(mode: FilterMode) -> vk::Filter {
    match mode {
        FilterMode::Linear => vk::Filter::LINEAR,
        FilterMode::Nearest => vk::Filter::NEAREST,
    }
}

/// Versions a compiled image was built from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageStamp {
    /// Texture version
    pub texture_version: u64,
    /// Binding the image serves
    pub binding: TextureBinding,
}

/// Sampled image holding one texture region
#[derive(Debug)]
pub struct CompiledImage {
    stamp: ImageStamp,
    image: GpuImage,
    /// View over the whole image
    pub view: vk::ImageView,
    /// Sampler using the binding's filter
    pub sampler: vk::Sampler,
}

impl CompiledImage {
    /// Upload a texture region and create its view and sampler
    pub fn compile<D: GpuDevice + ?Sized>(device: &D, binding: &TextureBinding, texture: &TextureData) -> RenderResult<Self> {
        let texture_entity = binding.texture;
        let expected = texture.width as usize * texture.height as usize * BYTES_PER_PIXEL;
        if texture.pixels.len() < expected {
            return Err(RenderError::PixelDataTooShort {
                texture: texture_entity,
                expected,
                actual: texture.pixels.len(),
            });
        }
        let rect = pixel_rect(texture_entity, &binding.region, texture.width, texture.height)?;

        let image = upload_region(device, texture, rect)?;
        let view = match device.create_image_view(&image) {
            Ok(view) => view,
            Err(error) => {
                device.destroy_image(image);
                return Err(error.into());
            }
        };
        let sampler = match device.create_sampler(filter(binding.filter)) {
            Ok(sampler) => sampler,
            Err(error) => {
                device.destroy_image_view(view);
                device.destroy_image(image);
                return Err(error.into());
            }
        };

        debug!(
            "Compiled texture {texture_entity} v{} region {}x{} at ({}, {})",
            texture.version, rect.width, rect.height, rect.x, rect.y
        );
        Ok(Self {
            stamp: ImageStamp { texture_version: texture.version, binding: *binding },
            image,
            view,
            sampler,
        })
    }
}

fn upload_region<D: GpuDevice + ?Sized>(device: &D, texture: &TextureData, rect: PixelRect) -> VulkanResult<GpuImage> {
    let staging_size = texture.width as usize * texture.height as usize * BYTES_PER_PIXEL;
    let staging = device.create_buffer(
        staging_size as vk::DeviceSize,
        vk::BufferUsageFlags::TRANSFER_SRC,
        MemoryLocation::HostVisible,
    )?;

    let result = fill_image(device, &staging, texture, rect);
    device.destroy_buffer(staging);
    result
}

fn fill_image<D: GpuDevice + ?Sized>(device: &D, staging: &GpuBuffer, texture: &TextureData, rect: PixelRect) -> VulkanResult<GpuImage> {
    let staging_size = staging.size as usize;
    device.write_buffer(staging, 0, &texture.pixels[..staging_size])?;

    let image = device.create_image(
        vk::Extent2D { width: rect.width, height: rect.height },
        TEXTURE_FORMAT,
        vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
    )?;

    let region = BufferImageRegion {
        buffer_offset: (u64::from(rect.y) * u64::from(texture.width) + u64::from(rect.x)) * BYTES_PER_PIXEL as u64,
        buffer_row_length: texture.width,
        buffer_image_height: texture.height,
        extent: image.extent,
    };
    let copied = device
        .transition_image_layout(&image, vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL)
        .and_then(|()| device.copy_buffer_to_image(staging, &image, &region))
        .and_then(|()| {
            device.transition_image_layout(
                &image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            )
        });

    match copied {
        Ok(()) => Ok(image),
        Err(error) => {
            device.destroy_image(image);
            Err(error)
        }
    }
}

impl Versioned for CompiledImage {
    type Stamp = ImageStamp;

    fn stamp(&self) -> &ImageStamp {
        &self.stamp
    }
}

impl Disposable for CompiledImage {
    fn dispose<D: GpuDevice + ?Sized>(self, device: &D) {
        device.destroy_sampler(self.sampler);
        device.destroy_image_view(self.view);
        device.destroy_image(self.image);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec2;
    use crate::render::mock::{MockDevice, ObjectKind};
    use crate::world::BindingKey;

    fn region(ax: f32, ay: f32, bx: f32, by: f32) -> TextureRegion {
        TextureRegion::new(Vec2::new(ax, ay), Vec2::new(bx, by))
    }

    fn texture(width: u32, height: u32) -> TextureData {
        TextureData {
            version: 1,
            width,
            height,
            pixels: vec![255; (width * height * 4) as usize],
        }
    }

    fn binding(region: TextureRegion, filter: FilterMode) -> TextureBinding {
        TextureBinding { key: BindingKey::new(0, 0), texture: 30, region, filter }
    }

    #[test]
    fn test_pixel_rect_full_and_partial() {
        assert_eq!(
            pixel_rect(1, &region(0.0, 0.0, 1.0, 1.0), 64, 32).unwrap(),
            PixelRect { x: 0, y: 0, width: 64, height: 32 }
        );
        assert_eq!(
            pixel_rect(1, &region(0.25, 0.5, 0.75, 1.0), 64, 32).unwrap(),
            PixelRect { x: 16, y: 16, width: 32, height: 16 }
        );
    }

    #[test]
    fn test_pixel_rect_accepts_swapped_corners() {
        assert_eq!(
            pixel_rect(1, &region(1.0, 1.0, 0.5, 0.0), 10, 10).unwrap(),
            PixelRect { x: 5, y: 0, width: 5, height: 10 }
        );
    }

    #[test]
    fn test_degenerate_region_is_rejected() {
        assert!(matches!(
            pixel_rect(7, &region(0.5, 0.0, 0.5, 1.0), 10, 10),
            Err(RenderError::EmptyTextureRegion { texture: 7 })
        ));
        assert!(matches!(
            pixel_rect(7, &region(0.0, 0.0, 1.0, 1.0), 0, 10),
            Err(RenderError::EmptyTextureRegion { texture: 7 })
        ));
    }

    #[test]
    fn test_upload_sequence() {
        let device = MockDevice::new();
        let binding = binding(region(0.5, 0.5, 1.0, 1.0), FilterMode::Nearest);

        let image = CompiledImage::compile(&device, &binding, &texture(8, 4)).unwrap();
        assert_eq!((image.image.extent.width, image.image.extent.height), (4, 2));

        {
            let stats = device.stats();
            assert_eq!(
                stats.transitions,
                [
                    (vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL),
                    (vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL),
                ]
            );
            assert_eq!(stats.image_copies.len(), 1);
            let copy = stats.image_copies[0];
            assert_eq!(copy.buffer_offset, (2 * 8 + 4) * 4);
            assert_eq!(copy.buffer_row_length, 8);
            assert_eq!(stats.one_shot_submits, 3);
            assert_eq!(stats.sampler_filters, [vk::Filter::NEAREST]);
            // Staging buffer released
            assert_eq!(stats.live(ObjectKind::Buffer), 0);
        }

        image.dispose(&device);
        assert_eq!(device.stats().live_total(), 0);
    }

    #[test]
    fn test_short_pixel_data_is_rejected() {
        let device = MockDevice::new();
        let mut short = texture(4, 4);
        short.pixels.truncate(10);

        let error = CompiledImage::compile(&device, &binding(TextureRegion::full(), FilterMode::Linear), &short).unwrap_err();
        assert!(matches!(error, RenderError::PixelDataTooShort { expected: 64, actual: 10, .. }));
        assert_eq!(device.stats().live_total(), 0);
    }
}
