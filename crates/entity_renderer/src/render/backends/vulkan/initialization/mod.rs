//! Instance and device bring-up

pub mod device;
pub mod library;

pub use device::{LogicalDevice, PhysicalDeviceInfo};
pub use library::VulkanLibrary;
