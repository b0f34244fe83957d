//! Error Types
//!
//! This module defines the error types used throughout the render cache.
//!
//! # Overview
//!
//! The main error type [`SagaError`] covers all failure modes including:
//! - Pipeline configuration errors (unsupported topologies, formats, MRT limits)
//! - Backend pipeline creation failures
//!
//! Configuration errors are raised at the point of detection and are never
//! retried or silently substituted: they represent programmer or content
//! errors upstream of the cache.
//!
//! # Usage
//!
//! All fallible APIs return [`Result<T>`] which is an alias for
//! `std::result::Result<T, SagaError>`.

use thiserror::Error;

use crate::buffer::ElementType;
use crate::pipeline::state::DrawMode;

/// The main error type for the Saga render cache.
#[derive(Error, Debug)]
pub enum SagaError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// The draw mode has no WebGPU topology equivalent (fan/loop modes).
    #[error("Draw mode {0:?} has no WebGPU primitive topology")]
    UnsupportedDrawMode(DrawMode),

    /// More color attachments were requested than the backend supports.
    #[error("Too many color attachments: {count} (max {max})")]
    TooManyColorAttachments {
        /// Number of attachments requested
        count: usize,
        /// Maximum supported by the backend
        max: usize,
    },

    /// The element type / component count / normalization combination has no
    /// WebGPU vertex format.
    #[error("No WebGPU vertex format for {element_type:?} x{size} (normalized: {normalized})")]
    InvalidVertexFormat {
        /// Per-component element type
        element_type: ElementType,
        /// Number of components (1-4)
        size: u32,
        /// Whether integer data is normalized to [0, 1] / [-1, 1]
        normalized: bool,
    },

    /// The texture format cannot be used as a color attachment.
    #[error("Texture format {0:?} is not usable as a color attachment")]
    UnsupportedColorFormat(wgpu::TextureFormat),

    /// The texture format is not a depth/stencil format.
    #[error("Texture format {0:?} is not a depth/stencil format")]
    UnsupportedDepthStencilFormat(wgpu::TextureFormat),

    // ========================================================================
    // Backend Errors
    // ========================================================================
    /// The device rejected a render pipeline descriptor.
    #[error("Render pipeline creation failed: {0}")]
    PipelineCreation(String),
}

/// Alias for `Result<T, SagaError>`.
pub type Result<T> = std::result::Result<T, SagaError>;
