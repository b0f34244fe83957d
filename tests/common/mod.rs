//! Shared test harness: a mock render device that records every creation
//! call, so cache behavior is observable without a GPU.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};

use saga_render::{
    AttributeInfo, CompiledProgram, ElementType, RenderDevice, RenderPipelineDescriptor, Result,
    SagaError, VertexBufferRef,
};

/// Mock device: opaque handles are plain integers, pipeline ids count up
/// from 1, and every descriptor that reaches the backend is captured.
#[derive(Default)]
pub struct MockDevice {
    pub pipelines_created: Cell<u64>,
    pub layouts_created: Cell<u64>,
    pub captured_descriptors: RefCell<Vec<RenderPipelineDescriptor<MockDevice>>>,
    pub captured_bind_group_entries: RefCell<Vec<Vec<wgpu::BindGroupLayoutEntry>>>,
    /// When set, the next pipeline creation fails like a backend rejection.
    pub fail_creation: Cell<bool>,
}

impl MockDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_descriptor(&self) -> RenderPipelineDescriptor<MockDevice> {
        self.captured_descriptors
            .borrow()
            .last()
            .expect("no pipeline was created")
            .clone()
    }
}

impl RenderDevice for MockDevice {
    type ShaderModule = u32;
    type BindGroupLayout = u32;
    type PipelineLayout = u32;
    type RenderPipeline = u64;

    fn create_bind_group_layout(
        &self,
        _label: Option<&str>,
        entries: &[wgpu::BindGroupLayoutEntry],
    ) -> Self::BindGroupLayout {
        self.captured_bind_group_entries
            .borrow_mut()
            .push(entries.to_vec());
        self.layouts_created.set(self.layouts_created.get() + 1);
        self.layouts_created.get() as u32
    }

    fn create_pipeline_layout(
        &self,
        _label: Option<&str>,
        _bind_group_layouts: &[Self::BindGroupLayout],
    ) -> Self::PipelineLayout {
        0
    }

    fn create_render_pipeline(
        &self,
        descriptor: &RenderPipelineDescriptor<Self>,
    ) -> Result<Self::RenderPipeline> {
        if self.fail_creation.get() {
            return Err(SagaError::PipelineCreation("mock device rejection".into()));
        }
        self.captured_descriptors.borrow_mut().push(descriptor.clone());
        let id = self.pipelines_created.get() + 1;
        self.pipelines_created.set(id);
        Ok(id)
    }

    fn max_vertex_buffer_array_stride(&self) -> u32 {
        2048
    }
}

/// Program with the given id and `(attribute name, shader location)` list.
pub fn test_program(id: u64, attributes: &[(&str, u32)]) -> CompiledProgram<MockDevice> {
    CompiledProgram {
        id,
        label: Some(format!("test-program-{id}")),
        vertex_module: 1,
        vertex_entry: "vs_main".to_string(),
        fragment_module: Some(2),
        fragment_entry: "fs_main".to_string(),
        attributes: attributes
            .iter()
            .map(|(name, location)| AttributeInfo {
                name: (*name).to_string(),
                location: *location,
            })
            .collect(),
        bind_groups: Vec::new(),
    }
}

/// Float32x3 vertex buffer description (position-like attribute).
pub fn float3_buffer(buffer_id: u64, byte_offset: u64, byte_stride: u64) -> VertexBufferRef {
    VertexBufferRef::new(
        buffer_id,
        byte_offset,
        byte_stride,
        ElementType::Float32,
        3,
        false,
        false,
    )
}

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
