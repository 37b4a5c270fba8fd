//! Pipeline and descriptor compilation
//!
//! A pipeline is compiled per material-on-mesh combination. Its descriptor
//! set layout mirrors the shader's uniform and sampler properties, each of
//! which must be fed by a material binding at the same `(binding, set)`
//! slot. Push constant members are coalesced into one range.

use ash::vk;
use log::{debug, warn};

use super::descriptor_pool::{pool_sizes, DescriptorPoolChain};
use super::mesh::MeshStamp;
use crate::render::backends::vulkan::VulkanResult;
use crate::render::cache::Versioned;
use crate::render::error::{RenderError, RenderResult};
use crate::render::gpu::{DescriptorLayoutBinding, Disposable, GpuDevice, PipelineDescription};
use crate::world::{
    AttributeFormat, BindingKey, ComponentBinding, ComponentType, Entity, MaterialDescription,
    PropertyKind, ShaderDescription, ShaderStage, TextureBinding, VertexAttribute,
};

/// Map an engine shader stage to Vulkan stage flags
///
/// Compute cannot take part in a graphics pipeline and is rejected.
pub fn stage_flags(shader: Entity, stage: ShaderStage) -> RenderResult<vk::ShaderStageFlags> {
    match stage {
        ShaderStage::Vertex => Ok(vk::ShaderStageFlags::VERTEX),
        ShaderStage::Fragment => Ok(vk::ShaderStageFlags::FRAGMENT),
        ShaderStage::Geometry => Ok(vk::ShaderStageFlags::GEOMETRY),
        ShaderStage::Compute => Err(RenderError::UnsupportedShaderStage { shader, stage }),
    }
}

/// Vulkan format of a vertex attribute
pub const fn attribute_format(format: AttributeFormat) -> vk::Format {
    match format {
        AttributeFormat::Float => vk::Format::R32_SFLOAT,
        AttributeFormat::Vec2 => vk::Format::R32G32_SFLOAT,
        AttributeFormat::Vec3 => vk::Format::R32G32B32_SFLOAT,
        AttributeFormat::Vec4 => vk::Format::R32G32B32A32_SFLOAT,
    }
}

/// Attribute descriptions for vertices interleaved in `layout` order
pub fn vertex_input_attributes(layout: &[VertexAttribute]) -> Vec<vk::VertexInputAttributeDescription> {
    let mut offset = 0;
    layout
        .iter()
        .map(|attribute| {
            let description = vk::VertexInputAttributeDescription {
                location: attribute.location,
                binding: 0,
                format: attribute_format(attribute.format),
                offset,
            };
            offset += attribute.format.byte_size();
            description
        })
        .collect()
}

/// Material data feeding one descriptor binding
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BindingSource {
    /// Uniform buffer backed by an entity component
    Component(ComponentBinding),
    /// Combined image sampler backed by a texture region
    Texture(TextureBinding),
}

/// Shader property paired with the material binding that feeds it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedBinding {
    /// Shader slot
    pub key: BindingKey,
    /// Stages reading the binding
    pub stages: vk::ShaderStageFlags,
    /// Material data
    pub source: BindingSource,
}

impl ResolvedBinding {
    /// Descriptor type of the binding
    pub const fn descriptor_type(&self) -> vk::DescriptorType {
        match self.source {
            BindingSource::Component(_) => vk::DescriptorType::UNIFORM_BUFFER,
            BindingSource::Texture(_) => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
        }
    }
}

/// Pair every uniform and sampler property of a shader with its material binding
pub fn resolve_bindings(
    material_entity: Entity,
    material: &MaterialDescription,
    shader_entity: Entity,
    shader: &ShaderDescription,
) -> RenderResult<Vec<ResolvedBinding>> {
    shader
        .properties
        .iter()
        .map(|property| {
            let source = match property.kind {
                PropertyKind::UniformBuffer => material
                    .component_bindings
                    .iter()
                    .find(|binding| binding.key == property.key)
                    .map(|binding| BindingSource::Component(*binding)),
                PropertyKind::Sampler => material
                    .texture_bindings
                    .iter()
                    .find(|binding| binding.key == property.key)
                    .map(|binding| BindingSource::Texture(*binding)),
            };
            let source = source.ok_or_else(|| RenderError::MissingBinding {
                material: material_entity,
                shader: shader_entity,
                name: property.name.clone(),
                key: property.key,
            })?;

            Ok(ResolvedBinding {
                key: property.key,
                stages: stage_flags(shader_entity, property.stage)?,
                source,
            })
        })
        .collect()
}

/// One component copied into push constants for every drawn entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompiledPushConstant {
    /// Component read from the drawn entity
    pub component: ComponentType,
    /// Stages the bytes are pushed to
    pub stages: vk::ShaderStageFlags,
    /// Byte offset in the push constant block
    pub offset: u32,
    /// Declared size; longer component data is truncated
    pub size: u32,
}

/// Push constant range of a pipeline plus the per-draw uploads that fill it
#[derive(Debug, Clone, Default)]
pub struct PushConstantLayout {
    /// Single range covering every member, if any
    pub range: Option<vk::PushConstantRange>,
    /// Uploads in material push order
    pub constants: Vec<CompiledPushConstant>,
}

impl PushConstantLayout {
    /// Coalesce a shader's push constant members and pair them with material push bindings
    ///
    /// The range starts at the smallest member offset and spans the sum of
    /// member sizes. Only the vertex stage receives push constants; members
    /// declared for other stages are still pushed to the vertex stage.
    pub fn resolve(
        material_entity: Entity,
        material: &MaterialDescription,
        shader_entity: Entity,
        shader: &ShaderDescription,
    ) -> RenderResult<Self> {
        for declaration in &shader.push_constants {
            stage_flags(shader_entity, declaration.stage)?;
            if declaration.stage != ShaderStage::Vertex {
                warn!(
                    "Shader {shader_entity} push constant '{}' is declared for {:?}; push constants are only delivered to the vertex stage",
                    declaration.name, declaration.stage
                );
            }
            if !material.push_bindings.iter().any(|binding| binding.key == declaration.key) {
                return Err(RenderError::MissingBinding {
                    material: material_entity,
                    shader: shader_entity,
                    name: declaration.name.clone(),
                    key: declaration.key,
                });
            }
        }

        let constants: Vec<CompiledPushConstant> = material
            .push_bindings
            .iter()
            .filter_map(|binding| {
                shader
                    .push_constants
                    .iter()
                    .find(|declaration| declaration.key == binding.key)
                    .map(|declaration| CompiledPushConstant {
                        component: binding.component,
                        stages: vk::ShaderStageFlags::VERTEX,
                        offset: declaration.offset,
                        size: declaration.size,
                    })
            })
            .collect();

        let range = shader
            .push_constants
            .iter()
            .map(|declaration| declaration.offset)
            .min()
            .map(|offset| vk::PushConstantRange {
                stage_flags: vk::ShaderStageFlags::VERTEX,
                offset,
                size: shader.push_constants.iter().map(|declaration| declaration.size).sum(),
            });

        Ok(Self { range, constants })
    }
}

/// Graphics pipeline, its layouts and the descriptor pools its sets come from
#[derive(Debug)]
pub struct CompiledPipeline {
    stamp: MeshStamp,
    /// Pipeline handle
    pub pipeline: vk::Pipeline,
    /// Pipeline layout
    pub layout: vk::PipelineLayout,
    /// Descriptor set layout
    pub descriptor_set_layout: vk::DescriptorSetLayout,
    pools: DescriptorPoolChain,
}

/// Inputs a pipeline is compiled from
#[derive(Debug, Clone, Copy)]
pub struct PipelineSource<'a> {
    /// Versions the pipeline is stamped with
    pub stamp: MeshStamp,
    /// Vertex stage module
    pub vertex_module: vk::ShaderModule,
    /// Fragment stage module
    pub fragment_module: vk::ShaderModule,
    /// Attributes in interleaving order
    pub vertex_layout: &'a [VertexAttribute],
    /// Bytes per interleaved vertex
    pub stride: u32,
    /// Descriptor bindings
    pub bindings: &'a [ResolvedBinding],
    /// Push constant range
    pub push_constant_range: Option<vk::PushConstantRange>,
    /// Per-pool set ceiling
    pub max_sets_per_pool: u32,
}

impl CompiledPipeline {
    /// Create layouts, the first descriptor pool and the pipeline
    pub fn compile<D: GpuDevice + ?Sized>(device: &D, source: &PipelineSource<'_>) -> RenderResult<Self> {
        let layout_bindings: Vec<DescriptorLayoutBinding> = source
            .bindings
            .iter()
            .map(|binding| DescriptorLayoutBinding {
                binding: binding.key.binding,
                descriptor_type: binding.descriptor_type(),
                stages: binding.stages,
            })
            .collect();
        let uniform_count = source
            .bindings
            .iter()
            .filter(|binding| matches!(binding.source, BindingSource::Component(_)))
            .count() as u32;
        let sampler_count = source.bindings.len() as u32 - uniform_count;

        let descriptor_set_layout = device.create_descriptor_set_layout(&layout_bindings)?;
        let layout = match device.create_pipeline_layout(descriptor_set_layout, source.push_constant_range) {
            Ok(layout) => layout,
            Err(error) => {
                device.destroy_descriptor_set_layout(descriptor_set_layout);
                return Err(error.into());
            }
        };

        let built = create_pipeline_and_pools(device, source, layout, uniform_count, sampler_count);
        let (pipeline, pools) = match built {
            Ok(built) => built,
            Err(error) => {
                device.destroy_pipeline_layout(layout);
                device.destroy_descriptor_set_layout(descriptor_set_layout);
                return Err(error.into());
            }
        };

        debug!(
            "Compiled pipeline with {uniform_count} uniform and {sampler_count} sampler bindings, stride {}",
            source.stride
        );
        Ok(Self {
            stamp: source.stamp,
            pipeline,
            layout,
            descriptor_set_layout,
            pools,
        })
    }

    /// Allocate a descriptor set for one rendered entity
    pub fn allocate_set<D: GpuDevice + ?Sized>(&mut self, device: &D) -> VulkanResult<(vk::DescriptorSet, vk::DescriptorPool)> {
        self.pools.allocate(device, self.descriptor_set_layout)
    }

    /// Number of descriptor pools allocated so far
    pub fn pool_count(&self) -> usize {
        self.pools.pool_count()
    }
}

fn create_pipeline_and_pools<D: GpuDevice + ?Sized>(
    device: &D,
    source: &PipelineSource<'_>,
    layout: vk::PipelineLayout,
    uniform_count: u32,
    sampler_count: u32,
) -> VulkanResult<(vk::Pipeline, DescriptorPoolChain)> {
    let attributes = vertex_input_attributes(source.vertex_layout);
    let pipeline = device.create_graphics_pipeline(&PipelineDescription {
        vertex_module: source.vertex_module,
        fragment_module: source.fragment_module,
        layout,
        vertex_stride: source.stride,
        vertex_attributes: &attributes,
    })?;

    let sizes = pool_sizes(uniform_count, sampler_count, source.max_sets_per_pool);
    match DescriptorPoolChain::new(device, sizes, source.max_sets_per_pool) {
        Ok(pools) => Ok((pipeline, pools)),
        Err(error) => {
            device.destroy_pipeline(pipeline);
            Err(error)
        }
    }
}

impl Versioned for CompiledPipeline {
    type Stamp = MeshStamp;

    fn stamp(&self) -> &MeshStamp {
        &self.stamp
    }
}

impl Disposable for CompiledPipeline {
    fn dispose<D: GpuDevice + ?Sized>(self, device: &D) {
        device.destroy_pipeline(self.pipeline);
        self.pools.dispose(device);
        device.destroy_pipeline_layout(self.layout);
        device.destroy_descriptor_set_layout(self.descriptor_set_layout);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec2;
    use crate::render::mock::{MockDevice, ObjectKind};
    use crate::world::{
        FilterMode, PushBinding, PushConstantDeclaration, ShaderProperty, TextureRegion,
    };

    fn property(name: &str, binding: u32, kind: PropertyKind, stage: ShaderStage) -> ShaderProperty {
        ShaderProperty {
            name: name.to_string(),
            key: BindingKey::new(binding, 0),
            kind,
            stage,
        }
    }

    fn push(name: &str, binding: u32, offset: u32, size: u32, stage: ShaderStage) -> PushConstantDeclaration {
        PushConstantDeclaration {
            name: name.to_string(),
            key: BindingKey::new(binding, 0),
            offset,
            size,
            stage,
        }
    }

    fn texture_binding(binding: u32) -> TextureBinding {
        TextureBinding {
            key: BindingKey::new(binding, 0),
            texture: 30,
            region: TextureRegion::new(Vec2::new(0.0, 0.0), Vec2::new(1.0, 1.0)),
            filter: FilterMode::Linear,
        }
    }

    #[test]
    fn test_stage_mapping() {
        assert_eq!(stage_flags(1, ShaderStage::Vertex).unwrap(), vk::ShaderStageFlags::VERTEX);
        assert_eq!(stage_flags(1, ShaderStage::Fragment).unwrap(), vk::ShaderStageFlags::FRAGMENT);
        assert_eq!(stage_flags(1, ShaderStage::Geometry).unwrap(), vk::ShaderStageFlags::GEOMETRY);
        assert!(matches!(
            stage_flags(1, ShaderStage::Compute),
            Err(RenderError::UnsupportedShaderStage { shader: 1, stage: ShaderStage::Compute })
        ));
    }

    #[test]
    fn test_vertex_attribute_offsets() {
        let layout = [
            VertexAttribute::new("position", 0, AttributeFormat::Vec3),
            VertexAttribute::new("uv", 1, AttributeFormat::Vec2),
            VertexAttribute::new("color", 2, AttributeFormat::Vec4),
        ];
        let offsets: Vec<(u32, u32)> = vertex_input_attributes(&layout)
            .iter()
            .map(|attribute| (attribute.location, attribute.offset))
            .collect();
        assert_eq!(offsets, [(0, 0), (1, 12), (2, 20)]);
    }

    #[test]
    fn test_resolve_bindings_by_key() {
        let shader = ShaderDescription {
            properties: vec![
                property("albedo", 0, PropertyKind::Sampler, ShaderStage::Fragment),
                property("camera", 1, PropertyKind::UniformBuffer, ShaderStage::Vertex),
            ],
            ..Default::default()
        };
        let material = MaterialDescription {
            component_bindings: vec![ComponentBinding {
                key: BindingKey::new(1, 0),
                entity: 12,
                component: ComponentType(5),
            }],
            texture_bindings: vec![texture_binding(0)],
            ..Default::default()
        };

        let bindings = resolve_bindings(2, &material, 1, &shader).unwrap();
        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings[0].descriptor_type(), vk::DescriptorType::COMBINED_IMAGE_SAMPLER);
        assert_eq!(bindings[0].stages, vk::ShaderStageFlags::FRAGMENT);
        assert_eq!(bindings[1].descriptor_type(), vk::DescriptorType::UNIFORM_BUFFER);
    }

    #[test]
    fn test_missing_binding_names_the_property() {
        let shader = ShaderDescription {
            properties: vec![property("albedo", 0, PropertyKind::Sampler, ShaderStage::Fragment)],
            ..Default::default()
        };
        // A uniform at the same slot does not satisfy a sampler
        let material = MaterialDescription {
            component_bindings: vec![ComponentBinding {
                key: BindingKey::new(0, 0),
                entity: 12,
                component: ComponentType(5),
            }],
            ..Default::default()
        };

        let error = resolve_bindings(2, &material, 1, &shader).unwrap_err();
        match error {
            RenderError::MissingBinding { material, shader, name, key } => {
                assert_eq!((material, shader, name.as_str(), key), (2, 1, "albedo", BindingKey::new(0, 0)));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_push_constants_coalesce_into_vertex_range() {
        let shader = ShaderDescription {
            push_constants: vec![
                push("model", 0, 0, 64, ShaderStage::Vertex),
                push("tint", 1, 64, 16, ShaderStage::Fragment),
            ],
            ..Default::default()
        };
        let material = MaterialDescription {
            push_bindings: vec![
                PushBinding { key: BindingKey::new(1, 0), component: ComponentType(9) },
                PushBinding { key: BindingKey::new(0, 0), component: ComponentType(8) },
            ],
            ..Default::default()
        };

        let layout = PushConstantLayout::resolve(2, &material, 1, &shader).unwrap();
        let range = layout.range.unwrap();
        assert_eq!((range.stage_flags, range.offset, range.size), (vk::ShaderStageFlags::VERTEX, 0, 80));
        assert_eq!(layout.constants.len(), 2);
        assert_eq!(layout.constants[0].component, ComponentType(9));
        assert_eq!(layout.constants[0].offset, 64);
        assert!(layout.constants.iter().all(|constant| constant.stages == vk::ShaderStageFlags::VERTEX));
    }

    #[test]
    fn test_push_constant_without_binding_fails() {
        let shader = ShaderDescription {
            push_constants: vec![push("model", 0, 0, 64, ShaderStage::Vertex)],
            ..Default::default()
        };
        let error = PushConstantLayout::resolve(2, &MaterialDescription::default(), 1, &shader).unwrap_err();
        assert!(matches!(error, RenderError::MissingBinding { .. }));
    }

    #[test]
    fn test_no_push_constants_means_no_range() {
        let layout = PushConstantLayout::resolve(2, &MaterialDescription::default(), 1, &ShaderDescription::default()).unwrap();
        assert!(layout.range.is_none());
        assert!(layout.constants.is_empty());
    }

    #[test]
    fn test_compile_and_dispose_pipeline() {
        let device = MockDevice::new();
        let vertex_module = device.create_shader_module(&[0; 4]).unwrap();
        let fragment_module = device.create_shader_module(&[0; 4]).unwrap();
        let layout = [VertexAttribute::new("position", 0, AttributeFormat::Vec3)];
        let bindings = [ResolvedBinding {
            key: BindingKey::new(0, 0),
            stages: vk::ShaderStageFlags::FRAGMENT,
            source: BindingSource::Texture(texture_binding(0)),
        }];

        let mut pipeline = CompiledPipeline::compile(
            &device,
            &PipelineSource {
                stamp: MeshStamp { shader: 1, shader_version: 0, mesh_version: 0 },
                vertex_module,
                fragment_module,
                vertex_layout: &layout,
                stride: 12,
                bindings: &bindings,
                push_constant_range: None,
                max_sets_per_pool: 1024,
            },
        )
        .unwrap();
        pipeline.allocate_set(&device).unwrap();
        assert_eq!(pipeline.pool_count(), 1);
        assert_eq!(device.stats().pipelines[0].vertex_stride, 12);

        pipeline.dispose(&device);
        let stats = device.stats();
        assert_eq!(stats.live(ObjectKind::Pipeline), 0);
        assert_eq!(stats.live(ObjectKind::PipelineLayout), 0);
        assert_eq!(stats.live(ObjectKind::DescriptorSetLayout), 0);
        assert_eq!(stats.live(ObjectKind::DescriptorPool), 0);
        assert_eq!(stats.live(ObjectKind::DescriptorSet), 0);
        assert_eq!(stats.invalid_releases, 0);
    }
}
