//! Vertex / index buffer descriptions.
//!
//! The cache never touches buffer contents. It consumes lightweight
//! descriptions provided by the buffer system: underlying buffer identity,
//! effective offset/stride, element layout, instancing flag, and a
//! precomputed layout hash used for vertex-state slot packing.

use rustc_hash::FxHashMap;
use xxhash_rust::xxh3::xxh3_64;

use crate::errors::{Result, SagaError};

/// Per-component element type of a vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    Sint8,
    Uint8,
    Sint16,
    Uint16,
    Float16,
    Sint32,
    Uint32,
    Float32,
}

/// One vertex buffer binding as seen by the pipeline cache.
///
/// `hash` is the layout hash packed into the vertex-state slots; it is
/// computed by [`VertexBufferRef::new`] from every descriptor-relevant field
/// and must be recomputed if any of them changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexBufferRef {
    /// Identity of the underlying GPU buffer (merging key); the layout does
    /// not depend on it, consecutive attributes with the same id share one
    /// layout entry.
    pub buffer_id: u64,
    /// Layout hash over offset/stride/element fields
    pub hash: u64,
    pub byte_offset: u64,
    pub byte_stride: u64,
    pub element_type: ElementType,
    /// Components per element, 1-4
    pub size: u32,
    pub normalized: bool,
    pub instanced: bool,
}

impl VertexBufferRef {
    pub fn new(
        buffer_id: u64,
        byte_offset: u64,
        byte_stride: u64,
        element_type: ElementType,
        size: u32,
        normalized: bool,
        instanced: bool,
    ) -> Self {
        let mut buf = Self {
            buffer_id,
            hash: 0,
            byte_offset,
            byte_stride,
            element_type,
            size,
            normalized,
            instanced,
        };
        buf.hash = buf.compute_layout_hash();
        buf
    }

    /// The shared placeholder standing in for attributes with no bound
    /// buffer, so the backend never receives fewer buffer bindings than the
    /// shader declares. Id 0 is reserved for it.
    pub fn placeholder() -> Self {
        Self::new(0, 0, 0, ElementType::Float32, 1, false, false)
    }

    /// Hash of every field that feeds the vertex input layout.
    pub fn compute_layout_hash(&self) -> u64 {
        let mut bytes = [0u8; 22];
        bytes[0..8].copy_from_slice(&self.byte_offset.to_le_bytes());
        bytes[8..16].copy_from_slice(&self.byte_stride.to_le_bytes());
        bytes[16..20].copy_from_slice(&self.size.to_le_bytes());
        bytes[20] = self.element_type as u8;
        bytes[21] = u8::from(self.normalized) | (u8::from(self.instanced) << 1);
        xxh3_64(&bytes)
    }

    /// Map the element description to a WebGPU vertex format.
    ///
    /// Combinations the backend cannot express (e.g. 3-component byte
    /// attributes) are configuration errors, not fallbacks.
    pub fn vertex_format(&self) -> Result<wgpu::VertexFormat> {
        use wgpu::VertexFormat as F;

        let format = match (self.element_type, self.size, self.normalized) {
            (ElementType::Sint8, 2, false) => F::Sint8x2,
            (ElementType::Sint8, 4, false) => F::Sint8x4,
            (ElementType::Sint8, 2, true) => F::Snorm8x2,
            (ElementType::Sint8, 4, true) => F::Snorm8x4,
            (ElementType::Uint8, 2, false) => F::Uint8x2,
            (ElementType::Uint8, 4, false) => F::Uint8x4,
            (ElementType::Uint8, 2, true) => F::Unorm8x2,
            (ElementType::Uint8, 4, true) => F::Unorm8x4,
            (ElementType::Sint16, 2, false) => F::Sint16x2,
            (ElementType::Sint16, 4, false) => F::Sint16x4,
            (ElementType::Sint16, 2, true) => F::Snorm16x2,
            (ElementType::Sint16, 4, true) => F::Snorm16x4,
            (ElementType::Uint16, 2, false) => F::Uint16x2,
            (ElementType::Uint16, 4, false) => F::Uint16x4,
            (ElementType::Uint16, 2, true) => F::Unorm16x2,
            (ElementType::Uint16, 4, true) => F::Unorm16x4,
            (ElementType::Float16, 2, _) => F::Float16x2,
            (ElementType::Float16, 4, _) => F::Float16x4,
            (ElementType::Float32, 1, _) => F::Float32,
            (ElementType::Float32, 2, _) => F::Float32x2,
            (ElementType::Float32, 3, _) => F::Float32x3,
            (ElementType::Float32, 4, _) => F::Float32x4,
            // 32-bit integer attributes are never normalized in WebGPU
            (ElementType::Sint32, 1, _) => F::Sint32,
            (ElementType::Sint32, 2, _) => F::Sint32x2,
            (ElementType::Sint32, 3, _) => F::Sint32x3,
            (ElementType::Sint32, 4, _) => F::Sint32x4,
            (ElementType::Uint32, 1, _) => F::Uint32,
            (ElementType::Uint32, 2, _) => F::Uint32x2,
            (ElementType::Uint32, 3, _) => F::Uint32x3,
            (ElementType::Uint32, 4, _) => F::Uint32x4,
            (element_type, size, normalized) => {
                return Err(SagaError::InvalidVertexFormat {
                    element_type,
                    size,
                    normalized,
                });
            }
        };

        Ok(format)
    }

    #[inline]
    pub fn step_mode(&self) -> wgpu::VertexStepMode {
        if self.instanced {
            wgpu::VertexStepMode::Instance
        } else {
            wgpu::VertexStepMode::Vertex
        }
    }
}

/// Index buffer binding; only the element format feeds pipeline state
/// (strip topologies bake the index format into the pipeline).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexBufferRef {
    pub buffer_id: u64,
    pub format: wgpu::IndexFormat,
}

/// The set of vertex buffers currently bound, keyed by attribute name.
#[derive(Debug, Clone, Default)]
pub struct VertexBuffers {
    buffers: FxHashMap<String, VertexBufferRef>,
}

impl VertexBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, buffer: VertexBufferRef) {
        self.buffers.insert(name.into(), buffer);
    }

    pub fn get(&self, name: &str) -> Option<&VertexBufferRef> {
        self.buffers.get(name)
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}
