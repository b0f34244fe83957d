//! Compiled program handle.
//!
//! The cache does not compile shaders. It consumes an opaque
//! [`CompiledProgram`] produced by the shader system: module handles plus
//! the reflection metadata the pipeline needs (attribute locations in
//! declared order, and per-group binding descriptions).

use std::sync::atomic::{AtomicU64, Ordering};

use crate::device::RenderDevice;

static NEXT_PROGRAM_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate a process-unique program id (the shader-stage cache key).
pub fn generate_program_id() -> u64 {
    NEXT_PROGRAM_ID.fetch_add(1, Ordering::Relaxed)
}

/// One vertex attribute declared by the program, in shader declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeInfo {
    /// Attribute name, matched against the bound vertex buffer set
    pub name: String,
    /// `@location` index in the vertex shader
    pub location: u32,
}

/// Resource kind of one binding, as reported by shader reflection.
#[derive(Debug, Clone, PartialEq)]
pub enum BindingKind {
    Buffer {
        ty: wgpu::BufferBindingType,
        has_dynamic_offset: bool,
    },
    Sampler(wgpu::SamplerBindingType),
    Texture {
        sample_type: wgpu::TextureSampleType,
        dimension: wgpu::TextureViewDimension,
        multisampled: bool,
        /// Index into the program's texture list; bit `texture_index` of the
        /// texture-state bitmask selects this binding for a sample-type
        /// downgrade (unfilterable float textures, depth sampled as float).
        texture_index: u32,
        /// Binding index (same group) of the sampler auto-bound to this
        /// texture, if any. A downgraded texture downgrades its sampler too.
        auto_sampler: Option<u32>,
    },
    StorageTexture {
        access: wgpu::StorageTextureAccess,
        format: wgpu::TextureFormat,
        dimension: wgpu::TextureViewDimension,
    },
}

/// One binding within a bind group.
#[derive(Debug, Clone, PartialEq)]
pub struct BindingInfo {
    pub binding: u32,
    pub visibility: wgpu::ShaderStages,
    pub kind: BindingKind,
}

/// One bind group of the program, `bind_groups[i]` = group `i`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BindGroupInfo {
    pub entries: Vec<BindingInfo>,
}

/// Opaque compiled program handle with reflection metadata.
///
/// `id` must be stable and unique per program: it is packed directly into
/// the shader-stage state slot, so two distinct programs with the same id
/// would alias in the pipeline cache.
pub struct CompiledProgram<D: RenderDevice> {
    pub id: u64,
    pub label: Option<String>,
    pub vertex_module: D::ShaderModule,
    pub vertex_entry: String,
    pub fragment_module: Option<D::ShaderModule>,
    pub fragment_entry: String,
    pub attributes: Vec<AttributeInfo>,
    pub bind_groups: Vec<BindGroupInfo>,
}

impl<D: RenderDevice> Clone for CompiledProgram<D> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            label: self.label.clone(),
            vertex_module: self.vertex_module.clone(),
            vertex_entry: self.vertex_entry.clone(),
            fragment_module: self.fragment_module.clone(),
            fragment_entry: self.fragment_entry.clone(),
            attributes: self.attributes.clone(),
            bind_groups: self.bind_groups.clone(),
        }
    }
}
