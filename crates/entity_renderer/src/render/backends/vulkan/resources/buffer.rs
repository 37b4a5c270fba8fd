//! Buffers and their device memory

use ash::{vk, Device};

use crate::render::backends::vulkan::initialization::PhysicalDeviceInfo;
use crate::render::backends::vulkan::{VulkanError, VulkanResult};
use crate::render::gpu::{GpuBuffer, MemoryLocation};

/// Memory property flags for a buffer location
pub fn memory_properties(location: MemoryLocation) -> vk::MemoryPropertyFlags {
    match location {
        MemoryLocation::HostVisible => {
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT
        }
        MemoryLocation::DeviceLocal => vk::MemoryPropertyFlags::DEVICE_LOCAL,
    }
}

/// Allocate memory satisfying `requirements` with the given properties
pub fn allocate_memory(
    device: &Device,
    physical: &PhysicalDeviceInfo,
    requirements: vk::MemoryRequirements,
    properties: vk::MemoryPropertyFlags,
) -> VulkanResult<vk::DeviceMemory> {
    let memory_type_index = physical.find_memory_type(requirements.memory_type_bits, properties)?;
    let alloc_info = vk::MemoryAllocateInfo::builder()
        .allocation_size(requirements.size)
        .memory_type_index(memory_type_index);

    unsafe { device.allocate_memory(&alloc_info, None) }.map_err(VulkanError::Api)
}

/// Create an exclusive buffer and bind freshly allocated memory to it
pub fn create_buffer(
    device: &Device,
    physical: &PhysicalDeviceInfo,
    size: vk::DeviceSize,
    usage: vk::BufferUsageFlags,
    location: MemoryLocation,
) -> VulkanResult<GpuBuffer> {
    let buffer_info = vk::BufferCreateInfo::builder()
        .size(size)
        .usage(usage)
        .sharing_mode(vk::SharingMode::EXCLUSIVE);

    let buffer = unsafe { device.create_buffer(&buffer_info, None) }.map_err(VulkanError::Api)?;
    let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };

    let memory = match allocate_memory(device, physical, requirements, memory_properties(location)) {
        Ok(memory) => memory,
        Err(e) => {
            unsafe { device.destroy_buffer(buffer, None) };
            return Err(e);
        }
    };

    if let Err(e) = unsafe { device.bind_buffer_memory(buffer, memory, 0) } {
        unsafe {
            device.destroy_buffer(buffer, None);
            device.free_memory(memory, None);
        }
        return Err(VulkanError::Api(e));
    }

    Ok(GpuBuffer { buffer, memory, size })
}

/// Destroy a buffer and free its memory
pub fn destroy_buffer(device: &Device, buffer: GpuBuffer) {
    unsafe {
        device.destroy_buffer(buffer.buffer, None);
        device.free_memory(buffer.memory, None);
    }
}

/// Map a host-visible buffer and copy bytes into it
pub fn write_buffer(device: &Device, buffer: &GpuBuffer, offset: vk::DeviceSize, bytes: &[u8]) -> VulkanResult<()> {
    let len = bytes.len() as vk::DeviceSize;
    if offset + len > buffer.size {
        return Err(VulkanError::InvalidOperation {
            reason: format!("Write of {len} bytes at offset {offset} exceeds buffer size {}", buffer.size),
        });
    }
    if bytes.is_empty() {
        return Ok(());
    }

    unsafe {
        let ptr = device
            .map_memory(buffer.memory, offset, len, vk::MemoryMapFlags::empty())
            .map_err(VulkanError::Api)?;
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.cast::<u8>(), bytes.len());
        device.unmap_memory(buffer.memory);
    }
    Ok(())
}
