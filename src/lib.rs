//! Saga render pipeline cache
//!
//! WebGPU render pipeline state cache for the Saga engine: deduplicates and
//! reuses native render-pipeline objects by encoding the full pipeline
//! configuration (rasterizer, depth/stencil, blend, vertex layout, shader
//! stage, multisample, texture binding layout) into a compact vector of
//! `u64` state slots, and only creating a new backend object when those
//! slots change in a way no cache level can resolve.

pub mod buffer;
pub mod device;
pub mod errors;
pub mod pipeline;
pub mod shader;

pub use buffer::{ElementType, IndexBufferRef, VertexBufferRef, VertexBuffers};
pub use device::RenderDevice;
pub use errors::{Result, SagaError};
pub use pipeline::cache::RenderPipelineCache;
pub use pipeline::descriptor::{FragmentStageDesc, RenderPipelineDescriptor, VertexStageDesc};
pub use pipeline::lookup::{IndexedStore, NoStore, PipelineStore};
pub use pipeline::state::{DrawMode, MrtMask};
pub use pipeline::stats::CacheStats;
pub use pipeline::vertex::VertexBufferLayoutDesc;
pub use shader::{AttributeInfo, BindGroupInfo, BindingInfo, BindingKind, CompiledProgram};
