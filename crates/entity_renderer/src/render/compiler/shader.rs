//! Shader module compilation

use ash::vk;
use log::debug;

use crate::render::cache::Versioned;
use crate::render::error::RenderResult;
use crate::render::gpu::{Disposable, GpuDevice};
use crate::world::{Entity, ShaderDescription};

/// Vertex and fragment modules built from one shader entity
#[derive(Debug)]
pub struct CompiledShader {
    version: u64,
    /// Vertex stage module
    pub vertex_module: vk::ShaderModule,
    /// Fragment stage module
    pub fragment_module: vk::ShaderModule,
}

impl CompiledShader {
    /// Create both stage modules from a shader description
    pub fn compile<D: GpuDevice + ?Sized>(device: &D, entity: Entity, shader: &ShaderDescription) -> RenderResult<Self> {
        let vertex_module = device.create_shader_module(&shader.vertex_code)?;
        let fragment_module = match device.create_shader_module(&shader.fragment_code) {
            Ok(module) => module,
            Err(error) => {
                device.destroy_shader_module(vertex_module);
                return Err(error.into());
            }
        };

        debug!("Compiled shader {entity} v{}", shader.version);
        Ok(Self { version: shader.version, vertex_module, fragment_module })
    }
}

impl Versioned for CompiledShader {
    type Stamp = u64;

    fn stamp(&self) -> &u64 {
        &self.version
    }
}

impl Disposable for CompiledShader {
    fn dispose<D: GpuDevice + ?Sized>(self, device: &D) {
        device.destroy_shader_module(self.vertex_module);
        device.destroy_shader_module(self.fragment_module);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::mock::{MockDevice, ObjectKind};

    #[test]
    fn test_compile_and_dispose() {
        let device = MockDevice::new();
        let shader = ShaderDescription {
            version: 3,
            vertex_code: vec![0; 8],
            fragment_code: vec![0; 8],
            ..Default::default()
        };

        let compiled = CompiledShader::compile(&device, 1, &shader).unwrap();
        assert_eq!(*compiled.stamp(), 3);
        assert_eq!(device.stats().live(ObjectKind::ShaderModule), 2);

        compiled.dispose(&device);
        assert_eq!(device.stats().live(ObjectKind::ShaderModule), 0);
    }

    #[test]
    fn test_failed_fragment_releases_vertex_module() {
        let device = MockDevice::new();
        let shader = ShaderDescription {
            vertex_code: vec![0; 8],
            fragment_code: Vec::new(),
            ..Default::default()
        };

        assert!(CompiledShader::compile(&device, 1, &shader).is_err());
        let stats = device.stats();
        assert_eq!(stats.live(ObjectKind::ShaderModule), 0);
        assert_eq!(stats.invalid_releases, 0);
    }
}
