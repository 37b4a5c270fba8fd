//! Descriptor set layouts, pools and set writes

use ash::{vk, Device};

use crate::render::backends::vulkan::{VulkanError, VulkanResult};
use crate::render::gpu::{DescriptorLayoutBinding, DescriptorWrite};

/// Create a descriptor set layout with one descriptor per binding
pub fn create_set_layout(device: &Device, bindings: &[DescriptorLayoutBinding]) -> VulkanResult<vk::DescriptorSetLayout> {
    let layout_bindings: Vec<vk::DescriptorSetLayoutBinding> = bindings
        .iter()
        .map(|binding| {
            vk::DescriptorSetLayoutBinding::builder()
                .binding(binding.binding)
                .descriptor_type(binding.descriptor_type)
                .descriptor_count(1)
                .stage_flags(binding.stages)
                .build()
        })
        .collect();

    let layout_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&layout_bindings);
    unsafe { device.create_descriptor_set_layout(&layout_info, None) }.map_err(VulkanError::Api)
}

/// Create a pool whose sets may be freed one at a time
pub fn create_pool(device: &Device, sizes: &[vk::DescriptorPoolSize], max_sets: u32) -> VulkanResult<vk::DescriptorPool> {
    let pool_info = vk::DescriptorPoolCreateInfo::builder()
        .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
        .pool_sizes(sizes)
        .max_sets(max_sets);

    unsafe { device.create_descriptor_pool(&pool_info, None) }.map_err(VulkanError::Api)
}

/// Allocate a single set from `pool`
pub fn allocate_set(
    device: &Device,
    pool: vk::DescriptorPool,
    layout: vk::DescriptorSetLayout,
) -> VulkanResult<vk::DescriptorSet> {
    let layouts = [layout];
    let alloc_info = vk::DescriptorSetAllocateInfo::builder()
        .descriptor_pool(pool)
        .set_layouts(&layouts);

    let sets = unsafe { device.allocate_descriptor_sets(&alloc_info) }.map_err(VulkanError::Api)?;
    sets.into_iter()
        .next()
        .ok_or(VulkanError::Api(vk::Result::ERROR_OUT_OF_POOL_MEMORY))
}

/// Write buffer and image descriptors into `set`
pub fn write_set(device: &Device, set: vk::DescriptorSet, writes: &[DescriptorWrite]) {
    // Info arrays must stay alive until the update call
    let buffer_infos: Vec<[vk::DescriptorBufferInfo; 1]> = writes
        .iter()
        .map(|write| match *write {
            DescriptorWrite::UniformBuffer { buffer, range, .. } => [vk::DescriptorBufferInfo { buffer, offset: 0, range }],
            DescriptorWrite::CombinedImageSampler { .. } => [vk::DescriptorBufferInfo::default()],
        })
        .collect();
    let image_infos: Vec<[vk::DescriptorImageInfo; 1]> = writes
        .iter()
        .map(|write| match *write {
            DescriptorWrite::CombinedImageSampler { view, sampler, .. } => [vk::DescriptorImageInfo {
                sampler,
                image_view: view,
                image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            }],
            DescriptorWrite::UniformBuffer { .. } => [vk::DescriptorImageInfo::default()],
        })
        .collect();

    let descriptor_writes: Vec<vk::WriteDescriptorSet> = writes
        .iter()
        .enumerate()
        .map(|(index, write)| match *write {
            DescriptorWrite::UniformBuffer { binding, .. } => vk::WriteDescriptorSet::builder()
                .dst_set(set)
                .dst_binding(binding)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .buffer_info(&buffer_infos[index])
                .build(),
            DescriptorWrite::CombinedImageSampler { binding, .. } => vk::WriteDescriptorSet::builder()
                .dst_set(set)
                .dst_binding(binding)
                .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .image_info(&image_infos[index])
                .build(),
        })
        .collect();

    unsafe { device.update_descriptor_sets(&descriptor_writes, &[]) };
}
