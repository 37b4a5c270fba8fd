//! GPU resource creation helpers

pub mod buffer;
pub mod descriptor;
pub mod image;
