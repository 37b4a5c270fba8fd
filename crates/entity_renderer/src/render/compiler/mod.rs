//! Compilers turning scene descriptions into cached GPU objects

pub mod component_buffer;
pub mod descriptor_pool;
pub mod image;
pub mod mesh;
pub mod pipeline;
pub mod shader;

pub use component_buffer::CompiledComponentBuffer;
pub use descriptor_pool::DescriptorPoolChain;
pub use image::{CompiledImage, ImageStamp};
pub use mesh::{CompiledMesh, MeshStamp, VertexChannel};
pub use pipeline::{BindingSource, CompiledPipeline, CompiledPushConstant, PipelineSource, PushConstantLayout, ResolvedBinding};
pub use shader::CompiledShader;
