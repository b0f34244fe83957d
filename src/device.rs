//! Backend device abstraction.
//!
//! The cache only needs a device that can turn descriptors into opaque
//! layout/pipeline handles plus one capability query. Everything else about
//! the backend (queues, surfaces, resource upload) lives outside this crate.
//!
//! [`RenderDevice`] is implemented for [`wgpu::Device`]; tests drive the
//! cache with a mock device instead, so no GPU is required.

use crate::errors::Result;
use crate::pipeline::descriptor::RenderPipelineDescriptor;

/// Minimal device surface required to materialize pipelines.
///
/// All creation calls are synchronous and return opaque, cheaply clonable
/// handles (wgpu resources are internally reference counted).
pub trait RenderDevice {
    type ShaderModule: Clone;
    type BindGroupLayout: Clone;
    type PipelineLayout: Clone;
    type RenderPipeline: Clone;

    /// Create a bind group layout from plain entry descriptions.
    fn create_bind_group_layout(
        &self,
        label: Option<&str>,
        entries: &[wgpu::BindGroupLayoutEntry],
    ) -> Self::BindGroupLayout;

    /// Create a pipeline layout from a list of bind group layouts.
    fn create_pipeline_layout(
        &self,
        label: Option<&str>,
        bind_group_layouts: &[Self::BindGroupLayout],
    ) -> Self::PipelineLayout;

    /// Create a render pipeline from an owned descriptor.
    ///
    /// A rejected descriptor propagates as
    /// [`SagaError::PipelineCreation`](crate::errors::SagaError::PipelineCreation);
    /// the cache never retries and stores nothing for a failed creation.
    fn create_render_pipeline(
        &self,
        descriptor: &RenderPipelineDescriptor<Self>,
    ) -> Result<Self::RenderPipeline>
    where
        Self: Sized;

    /// `limits.maxVertexBufferArrayStride` capability query.
    fn max_vertex_buffer_array_stride(&self) -> u32;
}

impl RenderDevice for wgpu::Device {
    type ShaderModule = wgpu::ShaderModule;
    type BindGroupLayout = wgpu::BindGroupLayout;
    type PipelineLayout = wgpu::PipelineLayout;
    type RenderPipeline = wgpu::RenderPipeline;

    fn create_bind_group_layout(
        &self,
        label: Option<&str>,
        entries: &[wgpu::BindGroupLayoutEntry],
    ) -> Self::BindGroupLayout {
        wgpu::Device::create_bind_group_layout(
            self,
            &wgpu::BindGroupLayoutDescriptor { label, entries },
        )
    }

    fn create_pipeline_layout(
        &self,
        label: Option<&str>,
        bind_group_layouts: &[Self::BindGroupLayout],
    ) -> Self::PipelineLayout {
        let layout_refs: Vec<Option<&wgpu::BindGroupLayout>> =
            bind_group_layouts.iter().map(Some).collect();
        wgpu::Device::create_pipeline_layout(
            self,
            &wgpu::PipelineLayoutDescriptor {
                label,
                bind_group_layouts: &layout_refs,
                immediate_size: 0,
            },
        )
    }

    fn create_render_pipeline(
        &self,
        descriptor: &RenderPipelineDescriptor<Self>,
    ) -> Result<Self::RenderPipeline> {
        let vertex_buffers: Vec<wgpu::VertexBufferLayout<'_>> =
            descriptor.vertex.buffers.iter().map(|b| b.as_wgpu()).collect();

        let pipeline = wgpu::Device::create_render_pipeline(
            self,
            &wgpu::RenderPipelineDescriptor {
                label: descriptor.label.as_deref(),
                layout: Some(&descriptor.layout),
                vertex: wgpu::VertexState {
                    module: &descriptor.vertex.module,
                    entry_point: Some(descriptor.vertex.entry_point.as_str()),
                    buffers: &vertex_buffers,
                    compilation_options: Default::default(),
                },
                fragment: descriptor.fragment.as_ref().map(|f| wgpu::FragmentState {
                    module: &f.module,
                    entry_point: Some(f.entry_point.as_str()),
                    targets: &f.targets,
                    compilation_options: Default::default(),
                }),
                primitive: descriptor.primitive,
                depth_stencil: descriptor.depth_stencil.clone(),
                multisample: descriptor.multisample,
                multiview_mask: None,
                cache: None,
            },
        );

        Ok(pipeline)
    }

    fn max_vertex_buffer_array_stride(&self) -> u32 {
        self.limits().max_vertex_buffer_array_stride
    }
}
