//! Growable descriptor pool chain
//!
//! A pipeline owns a chain of descriptor pools sized for its layout. Sets are
//! allocated from the newest pool; when that pool reports exhaustion a new
//! pool with the same sizes is appended and the allocation retried once.

use ash::vk;
use log::{debug, info};

use crate::render::backends::vulkan::VulkanResult;
use crate::render::gpu::{Disposable, GpuDevice};

/// Pools sharing one size table, newest last
#[derive(Debug)]
pub struct DescriptorPoolChain {
    pools: Vec<vk::DescriptorPool>,
    sizes: Vec<vk::DescriptorPoolSize>,
    max_sets: u32,
}

impl DescriptorPoolChain {
    /// Create the chain with its first pool
    pub fn new<D: GpuDevice + ?Sized>(device: &D, sizes: Vec<vk::DescriptorPoolSize>, max_sets: u32) -> VulkanResult<Self> {
        let first = device.create_descriptor_pool(&sizes, max_sets)?;
        Ok(Self { pools: vec![first], sizes, max_sets })
    }

    /// Allocate a set, growing the chain once if the newest pool is full
    ///
    /// Returns the set and the pool it came from. A second exhaustion right
    /// after growing is returned as an error.
    pub fn allocate<D: GpuDevice + ?Sized>(
        &mut self,
        device: &D,
        layout: vk::DescriptorSetLayout,
    ) -> VulkanResult<(vk::DescriptorSet, vk::DescriptorPool)> {
        if let Some(&pool) = self.pools.last() {
            match device.allocate_descriptor_set(pool, layout) {
                Ok(set) => return Ok((set, pool)),
                Err(error) if error.is_pool_exhausted() => {
                    info!("Descriptor pool {} exhausted, growing chain", self.pools.len());
                }
                Err(error) => return Err(error),
            }
        }

        let pool = device.create_descriptor_pool(&self.sizes, self.max_sets)?;
        self.pools.push(pool);
        debug!("Descriptor pool chain now holds {} pools", self.pools.len());
        let set = device.allocate_descriptor_set(pool, layout)?;
        Ok((set, pool))
    }

    /// Number of pools in the chain
    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }
}

impl Disposable for DescriptorPoolChain {
    fn dispose<D: GpuDevice + ?Sized>(self, device: &D) {
        for pool in self.pools {
            device.destroy_descriptor_pool(pool);
        }
    }
}

/// Pool sizes for a layout holding `uniform_count` uniform buffers and `sampler_count` samplers
///
/// Each descriptor type is multiplied by the per-pool set ceiling. Zero
/// counts are left out; a layout with no descriptors still gets a minimal
/// uniform-buffer entry because a pool needs at least one size.
pub fn pool_sizes(uniform_count: u32, sampler_count: u32, max_sets: u32) -> Vec<vk::DescriptorPoolSize> {
    let mut sizes = Vec::with_capacity(2);
    if uniform_count > 0 {
        sizes.push(vk::DescriptorPoolSize {
            ty: vk::DescriptorType::UNIFORM_BUFFER,
            descriptor_count: uniform_count * max_sets,
        });
    }
    if sampler_count > 0 {
        sizes.push(vk::DescriptorPoolSize {
            ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            descriptor_count: sampler_count * max_sets,
        });
    }
    if sizes.is_empty() {
        sizes.push(vk::DescriptorPoolSize {
            ty: vk::DescriptorType::UNIFORM_BUFFER,
            descriptor_count: 1,
        });
    }
    sizes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::mock::{MockDevice, ObjectKind};

    #[test]
    fn test_pool_sizes_scale_with_ceiling() {
        let sizes = pool_sizes(2, 1, 1024);
        assert_eq!(sizes.len(), 2);
        assert_eq!(sizes[0].ty, vk::DescriptorType::UNIFORM_BUFFER);
        assert_eq!(sizes[0].descriptor_count, 2048);
        assert_eq!(sizes[1].ty, vk::DescriptorType::COMBINED_IMAGE_SAMPLER);
        assert_eq!(sizes[1].descriptor_count, 1024);

        let samplers_only = pool_sizes(0, 1, 16);
        assert_eq!(samplers_only.len(), 1);
        assert_eq!(samplers_only[0].ty, vk::DescriptorType::COMBINED_IMAGE_SAMPLER);

        let empty = pool_sizes(0, 0, 16);
        assert_eq!(empty.len(), 1);
        assert_eq!(empty[0].descriptor_count, 1);
    }

    #[test]
    fn test_chain_grows_when_pool_is_full() {
        let device = MockDevice::new();
        let layout = device.create_descriptor_set_layout(&[]).unwrap();
        let mut chain = DescriptorPoolChain::new(&device, pool_sizes(1, 0, 2), 2).unwrap();

        let (_, first_pool) = chain.allocate(&device, layout).unwrap();
        chain.allocate(&device, layout).unwrap();
        assert_eq!(chain.pool_count(), 1);

        let (_, third_pool) = chain.allocate(&device, layout).unwrap();
        assert_eq!(chain.pool_count(), 2);
        assert_ne!(first_pool, third_pool);
        assert_eq!(device.stats().live(ObjectKind::DescriptorSet), 3);

        chain.dispose(&device);
        let stats = device.stats();
        assert_eq!(stats.live(ObjectKind::DescriptorPool), 0);
        assert_eq!(stats.live(ObjectKind::DescriptorSet), 0);
    }

    #[test]
    fn test_exhaustion_after_growth_is_fatal() {
        let device = MockDevice::new().with_pool_capacity(0);
        let layout = device.create_descriptor_set_layout(&[]).unwrap();
        let mut chain = DescriptorPoolChain::new(&device, pool_sizes(1, 0, 4), 4).unwrap();

        let error = chain.allocate(&device, layout).unwrap_err();
        assert!(error.is_pool_exhausted());
        assert_eq!(chain.pool_count(), 2);
    }

    #[test]
    fn test_freed_set_makes_room() {
        let device = MockDevice::new();
        let layout = device.create_descriptor_set_layout(&[]).unwrap();
        let mut chain = DescriptorPoolChain::new(&device, pool_sizes(1, 0, 1), 1).unwrap();

        let (set, pool) = chain.allocate(&device, layout).unwrap();
        device.free_descriptor_set(pool, set).unwrap();
        chain.allocate(&device, layout).unwrap();
        assert_eq!(chain.pool_count(), 1);
    }
}
