//! Mesh compilation
//!
//! Meshes store each vertex channel separately; shaders declare the
//! attributes they read. Compilation matches every attribute to a channel by
//! name, synthesizes the channels that have a sensible default, interleaves
//! the result in the shader's attribute order and uploads it to device-local
//! memory through a staging buffer.

use ash::vk;
use log::debug;

use crate::render::cache::Versioned;
use crate::render::error::{RenderError, RenderResult};
use crate::render::gpu::{Disposable, GpuBuffer, GpuDevice, MemoryLocation};
use crate::world::{AttributeFormat, Entity, MeshData, ShaderDescription, VertexAttribute};

/// Mesh channel a vertex attribute can be fed from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexChannel {
    /// Positions
    Position,
    /// Normals
    Normal,
    /// Tangents
    Tangent,
    /// Bitangents
    Bitangent,
    /// Texture coordinates
    Uv,
    /// Colors
    Color,
}

impl VertexChannel {
    /// Channel name used in diagnostics
    pub const fn name(self) -> &'static str {
        match self {
            Self::Position => "position",
            Self::Normal => "normal",
            Self::Tangent => "tangent",
            Self::Bitangent => "bitangent",
            Self::Uv => "uv",
            Self::Color => "color",
        }
    }
}

// Checked in order: "bitangent" contains "tangent", so it must come first.
const CHANNEL_PATTERNS: [(&str, AttributeFormat, VertexChannel); 6] = [
    ("uv", AttributeFormat::Vec2, VertexChannel::Uv),
    ("normal", AttributeFormat::Vec3, VertexChannel::Normal),
    ("bitangent", AttributeFormat::Vec3, VertexChannel::Bitangent),
    ("tangent", AttributeFormat::Vec3, VertexChannel::Tangent),
    ("position", AttributeFormat::Vec3, VertexChannel::Position),
    ("color", AttributeFormat::Vec4, VertexChannel::Color),
];

/// Deduce the channel feeding an attribute from its name and format
///
/// The name must contain the channel name (case-insensitive) and the
/// attribute format must match the channel's element type.
pub fn deduce_channel(attribute: &VertexAttribute) -> Option<VertexChannel> {
    let name = attribute.name.to_lowercase();
    CHANNEL_PATTERNS
        .iter()
        .find(|(pattern, format, _)| name.contains(pattern) && attribute.format == *format)
        .map(|(_, _, channel)| *channel)
}

/// Versions a mesh-derived object was built from
///
/// Interleaving depends on the shader's attribute order, so the shader's
/// identity and version are part of the stamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshStamp {
    /// Shader entity
    pub shader: Entity,
    /// Shader version
    pub shader_version: u64,
    /// Mesh version
    pub mesh_version: u64,
}

impl MeshStamp {
    /// Stamp for a shader/mesh pair
    pub fn new(shader: Entity, shader_description: &ShaderDescription, mesh: &MeshData) -> Self {
        Self {
            shader,
            shader_version: shader_description.version,
            mesh_version: mesh.version,
        }
    }
}

/// Interleaved vertex data and indices resident on the GPU
#[derive(Debug)]
pub struct CompiledMesh {
    stamp: MeshStamp,
    /// Interleaved vertices
    pub vertex_buffer: GpuBuffer,
    /// `u32` indices
    pub index_buffer: GpuBuffer,
    /// Number of indices to draw
    pub index_count: u32,
    /// Attributes in interleaving order
    pub vertex_layout: Vec<VertexAttribute>,
    /// Bytes per interleaved vertex
    pub stride: u32,
}

impl CompiledMesh {
    /// Interleave a mesh for a shader and upload it
    ///
    /// Every draw binds a vertex buffer, so the shader must declare at least
    /// one vertex attribute. A shader without vertex inputs (one that builds
    /// positions from the vertex index, say) leaves nothing to upload and is
    /// reported as [`RenderError::EmptyMesh`].
    pub fn compile<D: GpuDevice + ?Sized>(
        device: &D,
        mesh_entity: Entity,
        mesh: &MeshData,
        shader_entity: Entity,
        shader: &ShaderDescription,
    ) -> RenderResult<Self> {
        if mesh.vertex_count() == 0 || mesh.indices.is_empty() {
            return Err(RenderError::EmptyMesh { mesh: mesh_entity });
        }
        let layout = shader.attributes_by_location();
        let vertices = interleave(mesh_entity, mesh, &layout)?;
        if vertices.is_empty() {
            return Err(RenderError::EmptyMesh { mesh: mesh_entity });
        }

        let vertex_buffer = upload(
            device,
            bytemuck::cast_slice(&vertices),
            vk::BufferUsageFlags::VERTEX_BUFFER,
        )?;
        let index_buffer = match upload(
            device,
            bytemuck::cast_slice(&mesh.indices),
            vk::BufferUsageFlags::INDEX_BUFFER,
        ) {
            Ok(buffer) => buffer,
            Err(error) => {
                device.destroy_buffer(vertex_buffer);
                return Err(error);
            }
        };

        let stride = layout.iter().map(|attribute| attribute.format.byte_size()).sum();
        debug!(
            "Compiled mesh {mesh_entity} for shader {shader_entity}: {} vertices, {} indices, stride {stride}",
            mesh.vertex_count(),
            mesh.indices.len()
        );

        Ok(Self {
            stamp: MeshStamp::new(shader_entity, shader, mesh),
            vertex_buffer,
            index_buffer,
            index_count: mesh.indices.len() as u32,
            vertex_layout: layout.into_iter().cloned().collect(),
            stride,
        })
    }
}

impl Versioned for CompiledMesh {
    type Stamp = MeshStamp;

    fn stamp(&self) -> &MeshStamp {
        &self.stamp
    }
}

impl Disposable for CompiledMesh {
    fn dispose<D: GpuDevice + ?Sized>(self, device: &D) {
        device.destroy_buffer(self.vertex_buffer);
        device.destroy_buffer(self.index_buffer);
    }
}

/// Source of one attribute's floats for every vertex
enum ChannelSource<'a> {
    Floats(Vec<&'a [f32]>),
    Constant(&'a [f32]),
}

const WHITE: [f32; 4] = [1.0, 1.0, 1.0, 1.0];
const ZERO_NORMAL: [f32; 3] = [0.0, 0.0, 0.0];

fn checked<'a, T>(
    mesh_entity: Entity,
    channel: VertexChannel,
    values: &'a Option<Vec<T>>,
    vertex_count: usize,
) -> RenderResult<Option<&'a [T]>> {
    match values {
        Some(values) if values.len() != vertex_count => Err(RenderError::ChannelLengthMismatch {
            mesh: mesh_entity,
            channel: channel.name(),
            expected: vertex_count,
            actual: values.len(),
        }),
        Some(values) => Ok(Some(values.as_slice())),
        None => Ok(None),
    }
}

fn channel_source<'a>(
    mesh_entity: Entity,
    mesh: &'a MeshData,
    attribute: &VertexAttribute,
    vertex_count: usize,
) -> RenderResult<ChannelSource<'a>> {
    let channel = deduce_channel(attribute).ok_or_else(|| RenderError::AmbiguousAttribute {
        mesh: mesh_entity,
        attribute: attribute.name.clone(),
    })?;

    let floats: Option<Vec<&'a [f32]>> = match channel {
        VertexChannel::Position => checked(mesh_entity, channel, &mesh.positions, vertex_count)?
            .map(|values| values.iter().map(|v| v.as_slice()).collect()),
        VertexChannel::Normal => checked(mesh_entity, channel, &mesh.normals, vertex_count)?
            .map(|values| values.iter().map(|v| v.as_slice()).collect()),
        VertexChannel::Tangent => checked(mesh_entity, channel, &mesh.tangents, vertex_count)?
            .map(|values| values.iter().map(|v| v.as_slice()).collect()),
        VertexChannel::Bitangent => checked(mesh_entity, channel, &mesh.bitangents, vertex_count)?
            .map(|values| values.iter().map(|v| v.as_slice()).collect()),
        VertexChannel::Uv => checked(mesh_entity, channel, &mesh.uvs, vertex_count)?
            .map(|values| values.iter().map(|v| v.as_slice()).collect()),
        VertexChannel::Color => checked(mesh_entity, channel, &mesh.colors, vertex_count)?
            .map(|values| values.iter().map(|v| v.as_slice()).collect()),
    };

    match (floats, channel) {
        (Some(floats), _) => Ok(ChannelSource::Floats(floats)),
        (None, VertexChannel::Color) => Ok(ChannelSource::Constant(&WHITE)),
        (None, VertexChannel::Normal) => Ok(ChannelSource::Constant(&ZERO_NORMAL)),
        (None, channel) => Err(RenderError::MissingChannel {
            mesh: mesh_entity,
            attribute: attribute.name.clone(),
            channel: channel.name(),
        }),
    }
}

/// Interleave mesh channels in the given attribute order
///
/// Absent colors become opaque white and absent normals become zero
/// vectors; any other absent channel is an error.
pub fn interleave(mesh_entity: Entity, mesh: &MeshData, layout: &[&VertexAttribute]) -> RenderResult<Vec<f32>> {
    let vertex_count = mesh.vertex_count();
    let sources = layout
        .iter()
        .map(|attribute| channel_source(mesh_entity, mesh, attribute, vertex_count))
        .collect::<RenderResult<Vec<_>>>()?;

    let floats_per_vertex: usize = layout
        .iter()
        .map(|attribute| attribute.format.component_count() as usize)
        .sum();
    let mut vertices = Vec::with_capacity(vertex_count * floats_per_vertex);
    for vertex in 0..vertex_count {
        for source in &sources {
            match source {
                ChannelSource::Floats(values) => vertices.extend_from_slice(values[vertex]),
                ChannelSource::Constant(value) => vertices.extend_from_slice(value),
            }
        }
    }
    Ok(vertices)
}

/// Copy bytes into a new device-local buffer through a temporary staging buffer
pub(crate) fn upload<D: GpuDevice + ?Sized>(
    device: &D,
    bytes: &[u8],
    usage: vk::BufferUsageFlags,
) -> RenderResult<GpuBuffer> {
    let size = bytes.len() as vk::DeviceSize;
    let staging = device.create_buffer(size, vk::BufferUsageFlags::TRANSFER_SRC, MemoryLocation::HostVisible)?;

    let result = device.write_buffer(&staging, 0, bytes).and_then(|()| {
        let target = device.create_buffer(size, usage | vk::BufferUsageFlags::TRANSFER_DST, MemoryLocation::DeviceLocal)?;
        match device.copy_buffer(&staging, &target, size) {
            Ok(()) => Ok(target),
            Err(error) => {
                device.destroy_buffer(target);
                Err(error)
            }
        }
    });

    device.destroy_buffer(staging);
    result.map_err(RenderError::from)
}
