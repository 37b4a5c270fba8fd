//! Native graphics backends

pub mod vulkan;
