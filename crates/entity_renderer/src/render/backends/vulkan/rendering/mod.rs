//! Render pass, pipelines and command submission

pub mod commands;
pub mod pipeline;
pub mod render_pass;

pub use commands::CommandPool;
pub use render_pass::{RenderPass, DEPTH_FORMAT};
