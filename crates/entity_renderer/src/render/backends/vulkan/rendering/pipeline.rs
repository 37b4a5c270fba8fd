//! Graphics pipelines with the renderer's fixed state

use std::ffi::CString;

use ash::{vk, Device};

use crate::render::backends::vulkan::{VulkanError, VulkanResult};
use crate::render::gpu::PipelineDescription;

/// Create a triangle-list pipeline with depth testing, alpha blending and dynamic viewport/scissor
///
/// Culling is disabled: the renderer flips the viewport's Y axis, which
/// would otherwise invert the winding of every triangle.
pub fn create_graphics_pipeline(
    device: &Device,
    render_pass: vk::RenderPass,
    description: &PipelineDescription<'_>,
) -> VulkanResult<vk::Pipeline> {
    let entry_point = CString::new("main").map_err(|e| VulkanError::InitializationFailed(e.to_string()))?;

    let stages = [
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(vk::ShaderStageFlags::VERTEX)
            .module(description.vertex_module)
            .name(&entry_point)
            .build(),
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(vk::ShaderStageFlags::FRAGMENT)
            .module(description.fragment_module)
            .name(&entry_point)
            .build(),
    ];

    let binding_descriptions = [vk::VertexInputBindingDescription {
        binding: 0,
        stride: description.vertex_stride,
        input_rate: vk::VertexInputRate::VERTEX,
    }];
    let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder()
        .vertex_binding_descriptions(&binding_descriptions)
        .vertex_attribute_descriptions(description.vertex_attributes);

    let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
        .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
        .primitive_restart_enable(false);

    let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
        .viewport_count(1)
        .scissor_count(1);

    let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
        .depth_clamp_enable(false)
        .rasterizer_discard_enable(false)
        .polygon_mode(vk::PolygonMode::FILL)
        .line_width(1.0)
        .cull_mode(vk::CullModeFlags::NONE)
        .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
        .depth_bias_enable(false);

    let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
        .sample_shading_enable(false)
        .rasterization_samples(vk::SampleCountFlags::TYPE_1);

    let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::builder()
        .depth_test_enable(true)
        .depth_write_enable(true)
        .depth_compare_op(vk::CompareOp::LESS)
        .depth_bounds_test_enable(false)
        .stencil_test_enable(false);

    let blend_attachments = [vk::PipelineColorBlendAttachmentState::builder()
        .color_write_mask(vk::ColorComponentFlags::RGBA)
        .blend_enable(true)
        .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
        .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
        .color_blend_op(vk::BlendOp::ADD)
        .src_alpha_blend_factor(vk::BlendFactor::ONE)
        .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
        .alpha_blend_op(vk::BlendOp::ADD)
        .build()];
    let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
        .logic_op_enable(false)
        .attachments(&blend_attachments);

    let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
    let dynamic_state = vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);

    let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
        .stages(&stages)
        .vertex_input_state(&vertex_input)
        .input_assembly_state(&input_assembly)
        .viewport_state(&viewport_state)
        .rasterization_state(&rasterizer)
        .multisample_state(&multisampling)
        .depth_stencil_state(&depth_stencil)
        .color_blend_state(&color_blending)
        .dynamic_state(&dynamic_state)
        .layout(description.layout)
        .render_pass(render_pass)
        .subpass(0)
        .build();

    let pipelines = unsafe { device.create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None) }
        .map_err(|(_, e)| VulkanError::Api(e))?;

    pipelines
        .into_iter()
        .next()
        .ok_or_else(|| VulkanError::InitializationFailed("Driver returned no pipeline".to_string()))
}

/// Create a pipeline layout over one descriptor set layout
pub fn create_pipeline_layout(
    device: &Device,
    set_layout: vk::DescriptorSetLayout,
    push_constant_range: Option<vk::PushConstantRange>,
) -> VulkanResult<vk::PipelineLayout> {
    let set_layouts = [set_layout];
    let ranges: Vec<vk::PushConstantRange> = push_constant_range.into_iter().collect();
    let layout_info = vk::PipelineLayoutCreateInfo::builder()
        .set_layouts(&set_layouts)
        .push_constant_ranges(&ranges);

    unsafe { device.create_pipeline_layout(&layout_info, None) }.map_err(VulkanError::Api)
}
