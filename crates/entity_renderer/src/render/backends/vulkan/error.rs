//! Vulkan error types

use ash::vk;
use thiserror::Error;

/// Vulkan-specific error types
#[derive(Error, Debug)]
pub enum VulkanError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// Invalid operation attempted
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Description of why the operation is invalid
        reason: String,
    },

    /// Vulkan context initialization failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// No suitable memory type found for allocation
    #[error("No suitable memory type found")]
    NoSuitableMemoryType,

    /// The selected physical device lacks something the renderer requires
    #[error("Missing device feature: {0}")]
    MissingDeviceFeature(String),
}

impl VulkanError {
    /// Whether the error means a descriptor pool ran out of room
    pub fn is_pool_exhausted(&self) -> bool {
        matches!(
            self,
            Self::Api(vk::Result::ERROR_OUT_OF_POOL_MEMORY | vk::Result::ERROR_FRAGMENTED_POOL)
        )
    }

    pub(crate) fn not_initialized(operation: &str) -> Self {
        Self::InvalidOperation {
            reason: format!("{operation} called before surface resources were created"),
        }
    }
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_exhaustion_detection() {
        assert!(VulkanError::Api(vk::Result::ERROR_OUT_OF_POOL_MEMORY).is_pool_exhausted());
        assert!(VulkanError::Api(vk::Result::ERROR_FRAGMENTED_POOL).is_pool_exhausted());
        assert!(!VulkanError::Api(vk::Result::ERROR_DEVICE_LOST).is_pool_exhausted());
        assert!(!VulkanError::NoSuitableMemoryType.is_pool_exhausted());
    }
}
