//! Rendering
//!
//! [`Renderer`] turns entities into draw calls through a [`GpuDevice`].
//! Compiled objects live in [`cache`] keyed by entity, material/mesh pair or
//! material binding slot; [`compiler`] builds them; [`backends::vulkan`]
//! provides the real device.

pub mod backends;
pub mod cache;
pub mod compiler;
pub mod error;
pub mod gc;
pub mod gpu;
pub mod mock;
pub mod renderer;
pub mod scissor;

pub use cache::{BindingSlot, DrawSlot, RendererKey};
pub use error::{RenderError, RenderResult};
pub use gpu::{AcquireOutcome, GpuDevice, PresentOutcome};
pub use renderer::{Renderer, RendererStats};
