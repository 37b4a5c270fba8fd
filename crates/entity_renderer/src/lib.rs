//! # Entity Renderer
//!
//! A Vulkan rendering backend for entity-oriented engines. The application
//! describes its scene as entities carrying shader, mesh, material and
//! texture components; the renderer compiles those into GPU pipelines,
//! buffers, images and descriptor sets, caches them across frames, rebuilds
//! them when their source version changes, and sweeps out the ones that
//! stopped being drawn.
//!
//! ## Frame Loop
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use entity_renderer::prelude::*;
//! # fn surface_from_platform(_library: &VulkanLibrary) -> ash::vk::SurfaceKHR { unimplemented!() }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     entity_renderer::foundation::logging::init();
//!
//!     let config = RendererConfig::default();
//!     let library = Arc::new(VulkanLibrary::new(&config, &[])?);
//!     let surface = surface_from_platform(&library);
//!
//!     let device = VulkanDevice::new(library, &config);
//!     let mut renderer = Renderer::new(device, config)?;
//!     renderer.surface_created(surface)?;
//!
//!     let world = MemoryWorld::new();
//!     if renderer.begin_render(&world, Vec4::new(0.1, 0.1, 0.1, 1.0))? {
//!         // renderer.render(&world, &entities, material, shader, mesh)?;
//!         renderer.end_render()?;
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod foundation;
pub mod config;
pub mod world;
pub mod render;

/// Common imports for renderer users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError, ConfigFormat, RendererConfig},
        foundation::math::{Vec2, Vec3, Vec4},
        render::{
            Renderer, RenderError, RenderResult, RendererKey, RendererStats,
            GpuDevice,
            backends::vulkan::{VulkanDevice, VulkanLibrary, VulkanError, VulkanResult},
        },
        world::{
            ComponentStore, ComponentType, Entity, MemoryWorld,
            MaterialDescription, MeshData, ShaderDescription, TextureData,
        },
    };
}
