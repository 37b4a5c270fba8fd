//! Vulkan backend built on `ash`
//!
//! [`VulkanLibrary`] owns the instance, [`VulkanDevice`] owns everything
//! created for one window surface and implements
//! [`GpuDevice`](crate::render::GpuDevice).

pub mod device;
pub mod error;
pub mod initialization;
pub mod rendering;
pub mod resources;
pub mod state;

pub use device::VulkanDevice;
pub use error::{VulkanError, VulkanResult};
pub use initialization::VulkanLibrary;
