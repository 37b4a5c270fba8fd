//! Presentation state: swapchain, framebuffers and frame synchronization

pub mod framebuffer;
pub mod swapchain;
pub mod sync;

pub use framebuffer::{DepthBuffer, Framebuffer};
pub use swapchain::Swapchain;
pub use sync::{Fence, FrameSync, Semaphore};
