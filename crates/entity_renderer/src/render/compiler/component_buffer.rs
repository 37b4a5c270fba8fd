//! Uniform buffers backed by entity components

use ash::vk;
use log::{debug, warn};

use crate::foundation::math::align_up;
use crate::render::cache::Versioned;
use crate::render::error::{RenderError, RenderResult};
use crate::render::gpu::{Disposable, GpuBuffer, GpuDevice, MemoryLocation};
use crate::world::{ComponentBinding, ComponentStore};

/// Host-visible uniform buffer mirroring one component of one entity
#[derive(Debug)]
pub struct CompiledComponentBuffer {
    binding: ComponentBinding,
    /// Backing buffer, sized to the component rounded up to the uniform alignment
    pub buffer: GpuBuffer,
}

impl CompiledComponentBuffer {
    /// Create the buffer and fill it with the component's current bytes
    pub fn compile<D, W>(device: &D, world: &W, binding: &ComponentBinding) -> RenderResult<Self>
    where
        D: GpuDevice + ?Sized,
        W: ComponentStore + ?Sized,
    {
        let bytes = source_bytes(world, binding)?;
        let alignment = device.min_uniform_buffer_offset_alignment();
        let size = align_up(bytes.len().max(1) as vk::DeviceSize, alignment);

        let buffer = device.create_buffer(size, vk::BufferUsageFlags::UNIFORM_BUFFER, MemoryLocation::HostVisible)?;
        if let Err(error) = device.write_buffer(&buffer, 0, bytes) {
            device.destroy_buffer(buffer);
            return Err(error.into());
        }

        debug!(
            "Compiled uniform buffer for entity {} component {:?}: {size} bytes",
            binding.entity, binding.component
        );
        Ok(Self { binding: *binding, buffer })
    }

    /// Copy the component's current bytes into the buffer
    ///
    /// A source that disappeared since compilation is skipped with a
    /// warning; the buffer keeps its last contents until it is swept.
    pub fn refresh<D, W>(&self, device: &D, world: &W) -> RenderResult<()>
    where
        D: GpuDevice + ?Sized,
        W: ComponentStore + ?Sized,
    {
        match world.component_bytes(self.binding.entity, self.binding.component) {
            Some(bytes) => {
                let len = bytes.len().min(self.buffer.size as usize);
                device.write_buffer(&self.buffer, 0, &bytes[..len])?;
            }
            None => warn!(
                "Uniform source entity {} component {:?} is gone; keeping stale contents",
                self.binding.entity, self.binding.component
            ),
        }
        Ok(())
    }

    /// Bytes the shader sees
    pub fn range(&self) -> vk::DeviceSize {
        self.buffer.size
    }
}

fn source_bytes<'w, W: ComponentStore + ?Sized>(world: &'w W, binding: &ComponentBinding) -> RenderResult<&'w [u8]> {
    if !world.contains_entity(binding.entity) {
        return Err(RenderError::MissingEntity { entity: binding.entity, role: "uniform source" });
    }
    world
        .component_bytes(binding.entity, binding.component)
        .ok_or(RenderError::MissingComponent { entity: binding.entity, component: binding.component })
}

impl Versioned for CompiledComponentBuffer {
    type Stamp = ComponentBinding;

    fn stamp(&self) -> &ComponentBinding {
        &self.binding
    }
}

impl Disposable for CompiledComponentBuffer {
    fn dispose<D: GpuDevice + ?Sized>(self, device: &D) {
        device.destroy_buffer(self.buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::mock::MockDevice;
    use crate::world::{BindingKey, ComponentType, MemoryWorld};

    const TRANSFORM: ComponentType = ComponentType(1);

    fn setup() -> (MemoryWorld, ComponentBinding) {
        let mut world = MemoryWorld::new();
        let entity = world.create_entity();
        world.set_component(entity, TRANSFORM, vec![1u8; 80]);
        let binding = ComponentBinding { key: BindingKey::new(0, 0), entity, component: TRANSFORM };
        (world, binding)
    }

    #[test]
    fn test_size_rounds_up_to_alignment() {
        let device = MockDevice::new().with_uniform_alignment(64);
        let (world, binding) = setup();

        let buffer = CompiledComponentBuffer::compile(&device, &world, &binding).unwrap();
        assert_eq!(buffer.range(), 128);
        assert_eq!(&device.stats().buffer_contents(buffer.buffer.buffer).unwrap()[..80], &[1u8; 80][..]);
    }

    #[test]
    fn test_refresh_copies_new_bytes() {
        let device = MockDevice::new();
        let (mut world, binding) = setup();
        let buffer = CompiledComponentBuffer::compile(&device, &world, &binding).unwrap();

        world.set_component(binding.entity, TRANSFORM, vec![7u8; 80]);
        buffer.refresh(&device, &world).unwrap();
        assert_eq!(&device.stats().buffer_contents(buffer.buffer.buffer).unwrap()[..80], &[7u8; 80][..]);

        // Vanished source keeps the old bytes
        world.destroy_entity(binding.entity);
        buffer.refresh(&device, &world).unwrap();
        assert_eq!(device.stats().buffer_contents(buffer.buffer.buffer).unwrap()[0], 7);
    }

    #[test]
    fn test_missing_source_is_an_error() {
        let device = MockDevice::new();
        let (world, mut binding) = setup();

        binding.component = ComponentType(99);
        let error = CompiledComponentBuffer::compile(&device, &world, &binding).unwrap_err();
        assert!(matches!(error, RenderError::MissingComponent { component: ComponentType(99), .. }));

        binding.entity = 1234;
        let error = CompiledComponentBuffer::compile(&device, &world, &binding).unwrap_err();
        assert!(matches!(error, RenderError::MissingEntity { entity: 1234, .. }));
    }
}
