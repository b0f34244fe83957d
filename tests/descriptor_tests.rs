//! Descriptor Builder Tests
//!
//! Tests for:
//! - Stencil aspect gating (depth-only formats never receive stencil state)
//! - Depth-test-disabled -> Always compare
//! - Vertex buffer merging and the shared placeholder buffer
//! - Strip topologies and index formats
//! - MRT target emission and blend parameter fallback
//! - Vertex format mapping errors
//! - Bind group layout sample-type overrides
//! - State key injectivity over a rasterizer configuration matrix

mod common;

use common::{MockDevice, float3_buffer, test_program};
use std::sync::Arc;

use saga_render::{
    BindGroupInfo, BindingInfo, BindingKind, DrawMode, ElementType, IndexBufferRef, MrtMask,
    RenderPipelineCache, SagaError, VertexBufferRef, VertexBuffers,
};

// ============================================================================
// Depth / stencil
// ============================================================================

#[test]
fn depth_only_format_never_receives_stencil_state() {
    let device = MockDevice::new();
    let mut cache = RenderPipelineCache::<MockDevice>::new();
    let program = test_program(1, &[]);

    cache.set_depth_stencil_format(Some(wgpu::TextureFormat::Depth32Float));
    cache.set_stencil_enabled(true);
    cache.set_stencil_front(wgpu::StencilFaceState {
        compare: wgpu::CompareFunction::Equal,
        fail_op: wgpu::StencilOperation::Zero,
        depth_fail_op: wgpu::StencilOperation::Invert,
        pass_op: wgpu::StencilOperation::Replace,
    });
    cache.set_stencil_read_mask(0x0F);

    cache
        .get_render_pipeline(&device, DrawMode::TriangleList, &program, 1, 0)
        .unwrap();

    let depth_stencil = device.last_descriptor().depth_stencil.unwrap();
    assert_eq!(depth_stencil.format, wgpu::TextureFormat::Depth32Float);
    assert_eq!(
        depth_stencil.stencil,
        wgpu::StencilState::default(),
        "A format without a stencil aspect must not carry stencil state"
    );
}

#[test]
fn stencil_capable_format_receives_full_stencil_state() {
    let device = MockDevice::new();
    let mut cache = RenderPipelineCache::<MockDevice>::new();
    let program = test_program(1, &[]);

    let front = wgpu::StencilFaceState {
        compare: wgpu::CompareFunction::Equal,
        fail_op: wgpu::StencilOperation::Zero,
        depth_fail_op: wgpu::StencilOperation::Invert,
        pass_op: wgpu::StencilOperation::Replace,
    };
    cache.set_depth_stencil_format(Some(wgpu::TextureFormat::Depth24PlusStencil8));
    cache.set_stencil_enabled(true);
    cache.set_stencil_front(front);
    cache.set_stencil_read_mask(0x0F);
    cache.set_stencil_write_mask(0xF0);

    cache
        .get_render_pipeline(&device, DrawMode::TriangleList, &program, 1, 0)
        .unwrap();

    let stencil = device.last_descriptor().depth_stencil.unwrap().stencil;
    assert_eq!(stencil.front, front);
    assert_eq!(stencil.back, wgpu::StencilFaceState::IGNORE);
    assert_eq!(stencil.read_mask, 0x0F);
    assert_eq!(stencil.write_mask, 0xF0);
}

#[test]
fn no_depth_stencil_format_omits_the_attachment() {
    let device = MockDevice::new();
    let mut cache = RenderPipelineCache::<MockDevice>::new();
    let program = test_program(1, &[]);

    cache.set_depth_stencil_format(None);
    cache
        .get_render_pipeline(&device, DrawMode::TriangleList, &program, 1, 0)
        .unwrap();

    assert!(device.last_descriptor().depth_stencil.is_none());
}

#[test]
fn disabled_depth_test_compares_always() {
    let device = MockDevice::new();
    let mut cache = RenderPipelineCache::<MockDevice>::new();
    let program = test_program(1, &[]);

    cache.set_depth_test_enabled(false);
    cache
        .get_render_pipeline(&device, DrawMode::TriangleList, &program, 1, 0)
        .unwrap();

    let depth_stencil = device.last_descriptor().depth_stencil.unwrap();
    assert_eq!(depth_stencil.depth_compare, Some(wgpu::CompareFunction::Always));
}

#[test]
fn depth_bias_is_not_gated_on_the_stencil_aspect() {
    let device = MockDevice::new();
    let mut cache = RenderPipelineCache::<MockDevice>::new();
    let program = test_program(1, &[]);

    cache.set_depth_stencil_format(Some(wgpu::TextureFormat::Depth32Float));
    cache.set_depth_bias(4);
    cache.set_depth_bias_slope_scale(2.0);

    cache
        .get_render_pipeline(&device, DrawMode::TriangleList, &program, 1, 0)
        .unwrap();

    let bias = device.last_descriptor().depth_stencil.unwrap().bias;
    assert_eq!(bias.constant, 4);
    assert_eq!(bias.slope_scale, 2.0);
}

// ============================================================================
// Vertex input layout
// ============================================================================

#[test]
fn attributes_sharing_a_buffer_merge_into_one_layout_entry() {
    let device = MockDevice::new();
    let mut cache = RenderPipelineCache::<MockDevice>::new();
    let program = test_program(1, &[("position", 0), ("normal", 1)]);

    let mut buffers = VertexBuffers::new();
    buffers.insert("position", float3_buffer(7, 0, 24));
    buffers.insert("normal", float3_buffer(7, 12, 24));
    cache.set_buffers(Some(&Arc::new(buffers)), None);

    cache
        .get_render_pipeline(&device, DrawMode::TriangleList, &program, 1, 0)
        .unwrap();

    let layouts = device.last_descriptor().vertex.buffers;
    assert_eq!(layouts.len(), 1, "Interleaved attributes share one entry");
    assert_eq!(layouts[0].array_stride, 24);
    assert_eq!(layouts[0].attributes.len(), 2);
    assert_eq!(layouts[0].attributes[0].offset, 0);
    assert_eq!(layouts[0].attributes[1].offset, 12);
    assert_eq!(layouts[0].attributes[1].shader_location, 1);
}

#[test]
fn attributes_on_distinct_buffers_get_separate_entries() {
    let device = MockDevice::new();
    let mut cache = RenderPipelineCache::<MockDevice>::new();
    let program = test_program(1, &[("position", 0), ("normal", 1)]);

    let mut buffers = VertexBuffers::new();
    buffers.insert("position", float3_buffer(7, 0, 12));
    buffers.insert("normal", float3_buffer(8, 0, 12));
    cache.set_buffers(Some(&Arc::new(buffers)), None);

    cache
        .get_render_pipeline(&device, DrawMode::TriangleList, &program, 1, 0)
        .unwrap();

    let layouts = device.last_descriptor().vertex.buffers;
    assert_eq!(layouts.len(), 2);
    assert_eq!(layouts[0].attributes.len(), 1);
    assert_eq!(layouts[1].attributes.len(), 1);
}

#[test]
fn out_of_stride_offset_starts_a_new_entry() {
    let device = MockDevice::new();
    let mut cache = RenderPipelineCache::<MockDevice>::new();
    let program = test_program(1, &[("position", 0), ("normal", 1)]);

    let mut buffers = VertexBuffers::new();
    buffers.insert("position", float3_buffer(7, 0, 12));
    // Same buffer, but offset + element size exceeds the stride
    buffers.insert("normal", float3_buffer(7, 12, 12));
    cache.set_buffers(Some(&Arc::new(buffers)), None);

    cache
        .get_render_pipeline(&device, DrawMode::TriangleList, &program, 1, 0)
        .unwrap();

    assert_eq!(device.last_descriptor().vertex.buffers.len(), 2);
}

#[test]
fn unbound_attribute_falls_back_to_the_placeholder_buffer() {
    let device = MockDevice::new();
    let mut cache = RenderPipelineCache::<MockDevice>::new();
    let program = test_program(1, &[("position", 0), ("color", 1)]);

    let mut buffers = VertexBuffers::new();
    buffers.insert("position", float3_buffer(7, 0, 12));
    cache.set_buffers(Some(&Arc::new(buffers)), None);

    cache
        .get_render_pipeline(&device, DrawMode::TriangleList, &program, 1, 0)
        .unwrap();

    let layouts = device.last_descriptor().vertex.buffers;
    assert_eq!(layouts.len(), 2, "The backend still sees a binding per buffer");
    assert_eq!(layouts[1].buffer_id, 0, "Placeholder buffer id is reserved");
    assert_eq!(layouts[1].attributes[0].format, wgpu::VertexFormat::Float32);
}

#[test]
fn instanced_buffer_uses_instance_step_mode() {
    let device = MockDevice::new();
    let mut cache = RenderPipelineCache::<MockDevice>::new();
    let program = test_program(1, &[("instance_matrix", 0)]);

    let mut buffers = VertexBuffers::new();
    buffers.insert(
        "instance_matrix",
        VertexBufferRef::new(9, 0, 64, ElementType::Float32, 4, false, true),
    );
    cache.set_buffers(Some(&Arc::new(buffers)), None);

    cache
        .get_render_pipeline(&device, DrawMode::TriangleList, &program, 1, 0)
        .unwrap();

    let layouts = device.last_descriptor().vertex.buffers;
    assert_eq!(layouts[0].step_mode, wgpu::VertexStepMode::Instance);
}

#[test]
fn unrepresentable_vertex_format_is_a_configuration_error() {
    let device = MockDevice::new();
    let mut cache = RenderPipelineCache::<MockDevice>::new();
    let program = test_program(1, &[("color", 0)]);

    let mut buffers = VertexBuffers::new();
    // 3-component byte attribute: no WebGPU vertex format exists
    buffers.insert(
        "color",
        VertexBufferRef::new(7, 0, 3, ElementType::Uint8, 3, true, false),
    );
    cache.set_buffers(Some(&Arc::new(buffers)), None);

    let result = cache.get_render_pipeline(&device, DrawMode::TriangleList, &program, 1, 0);
    assert!(matches!(
        result,
        Err(SagaError::InvalidVertexFormat { size: 3, .. })
    ));
    assert_eq!(device.pipelines_created.get(), 0);
}

// ============================================================================
// Topology / index format
// ============================================================================

#[test]
fn strip_topology_bakes_the_bound_index_format() {
    let device = MockDevice::new();
    let mut cache = RenderPipelineCache::<MockDevice>::new();
    let program = test_program(1, &[]);

    cache.set_buffers(
        None,
        Some(IndexBufferRef {
            buffer_id: 3,
            format: wgpu::IndexFormat::Uint32,
        }),
    );

    cache
        .get_render_pipeline(&device, DrawMode::TriangleStrip, &program, 1, 0)
        .unwrap();
    assert_eq!(
        device.last_descriptor().primitive.strip_index_format,
        Some(wgpu::IndexFormat::Uint32)
    );

    cache
        .get_render_pipeline(&device, DrawMode::TriangleList, &program, 1, 0)
        .unwrap();
    assert_eq!(device.last_descriptor().primitive.strip_index_format, None);
}

#[test]
fn wireframe_renders_as_a_line_list() {
    let device = MockDevice::new();
    let mut cache = RenderPipelineCache::<MockDevice>::new();
    let program = test_program(1, &[]);

    cache
        .get_render_pipeline(&device, DrawMode::Wireframe, &program, 1, 0)
        .unwrap();
    assert_eq!(
        device.last_descriptor().primitive.topology,
        wgpu::PrimitiveTopology::LineList
    );
}

// ============================================================================
// Color targets / MRT
// ============================================================================

#[test]
fn mrt_emits_one_target_per_enabled_mask_bit() {
    let device = MockDevice::new();
    let mut cache = RenderPipelineCache::<MockDevice>::new();
    let program = test_program(1, &[]);

    cache
        .set_mrt_formats(&[
            Some(wgpu::TextureFormat::Rgba8Unorm),
            Some(wgpu::TextureFormat::Rgba16Float),
            Some(wgpu::TextureFormat::Rg16Float),
            Some(wgpu::TextureFormat::R32Float),
        ])
        .unwrap();
    cache.set_mrt_attachments(MrtMask::TARGET_0 | MrtMask::TARGET_2);

    cache
        .get_render_pipeline(&device, DrawMode::TriangleList, &program, 1, 0)
        .unwrap();

    let targets = device.last_descriptor().fragment.unwrap().targets;
    assert_eq!(targets.len(), 4);
    assert_eq!(
        targets[0].as_ref().unwrap().format,
        wgpu::TextureFormat::Rgba8Unorm
    );
    assert!(targets[1].is_none(), "Disabled targets emit no state");
    assert_eq!(
        targets[2].as_ref().unwrap().format,
        wgpu::TextureFormat::Rg16Float
    );
    assert!(targets[3].is_none());
}

#[test]
fn blend_parameters_beyond_the_configured_count_reuse_target_zero() {
    let device = MockDevice::new();
    let mut cache = RenderPipelineCache::<MockDevice>::new();
    let program = test_program(1, &[]);

    cache
        .set_mrt_formats(&[
            Some(wgpu::TextureFormat::Rgba8Unorm),
            Some(wgpu::TextureFormat::Rgba8Unorm),
        ])
        .unwrap();
    cache.set_mrt_attachments(MrtMask::TARGET_0 | MrtMask::TARGET_1);
    cache.set_alpha_blend_enabled(true);
    cache.set_blend_state(wgpu::BlendState::ALPHA_BLENDING);

    cache
        .get_render_pipeline(&device, DrawMode::TriangleList, &program, 1, 0)
        .unwrap();

    let targets = device.last_descriptor().fragment.unwrap().targets;
    assert_eq!(
        targets[1].as_ref().unwrap().blend,
        Some(wgpu::BlendState::ALPHA_BLENDING),
        "Targets past the blend-state list reuse entry 0"
    );
}

#[test]
fn no_color_output_emits_no_targets() {
    let device = MockDevice::new();
    let mut cache = RenderPipelineCache::<MockDevice>::new();
    let program = test_program(1, &[]);

    cache.set_color_format(None);
    cache
        .get_render_pipeline(&device, DrawMode::TriangleList, &program, 1, 0)
        .unwrap();

    assert!(device.last_descriptor().fragment.unwrap().targets.is_empty());
}

#[test]
fn blend_toggle_changes_identity_and_back() {
    let device = MockDevice::new();
    let mut cache = RenderPipelineCache::<MockDevice>::new();
    let program = test_program(1, &[]);

    let opaque = cache
        .get_render_pipeline(&device, DrawMode::TriangleList, &program, 1, 0)
        .unwrap();

    cache.set_alpha_blend_enabled(true);
    cache.set_blend_state(wgpu::BlendState::ALPHA_BLENDING);
    let blended = cache
        .get_render_pipeline(&device, DrawMode::TriangleList, &program, 1, 0)
        .unwrap();
    assert_ne!(opaque, blended);

    cache.set_alpha_blend_enabled(false);
    let opaque_again = cache
        .get_render_pipeline(&device, DrawMode::TriangleList, &program, 1, 0)
        .unwrap();
    assert_eq!(opaque, opaque_again);
    assert_eq!(device.pipelines_created.get(), 2);
}

// ============================================================================
// Bind group layout overrides
// ============================================================================

fn textured_program(id: u64) -> saga_render::CompiledProgram<MockDevice> {
    let mut program = test_program(id, &[]);
    program.bind_groups = vec![BindGroupInfo {
        entries: vec![
            BindingInfo {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                kind: BindingKind::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                },
            },
            BindingInfo {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                kind: BindingKind::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                    texture_index: 0,
                    auto_sampler: Some(2),
                },
            },
            BindingInfo {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                kind: BindingKind::Sampler(wgpu::SamplerBindingType::Filtering),
            },
        ],
    }];
    program
}

#[test]
fn texture_override_downgrades_texture_and_auto_bound_sampler() {
    let device = MockDevice::new();
    let mut cache = RenderPipelineCache::<MockDevice>::new();
    let program = textured_program(1);

    cache
        .get_render_pipeline(&device, DrawMode::TriangleList, &program, 1, 0b1)
        .unwrap();

    let entries = device.captured_bind_group_entries.borrow().last().unwrap().clone();
    assert_eq!(
        entries[1].ty,
        wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: false },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        }
    );
    assert_eq!(
        entries[2].ty,
        wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering),
        "The auto-bound sampler must be downgraded with its texture"
    );
}

#[test]
fn without_override_the_reflected_sample_type_is_kept() {
    let device = MockDevice::new();
    let mut cache = RenderPipelineCache::<MockDevice>::new();
    let program = textured_program(1);

    cache
        .get_render_pipeline(&device, DrawMode::TriangleList, &program, 1, 0)
        .unwrap();

    let entries = device.captured_bind_group_entries.borrow().last().unwrap().clone();
    assert_eq!(
        entries[1].ty,
        wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        }
    );
    assert_eq!(
        entries[2].ty,
        wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering)
    );
}

#[test]
fn pipeline_layouts_are_cached_per_program_and_texture_state() {
    let device = MockDevice::new();
    let mut cache = RenderPipelineCache::<MockDevice>::new();
    let program = textured_program(1);

    cache
        .get_render_pipeline(&device, DrawMode::TriangleList, &program, 1, 0)
        .unwrap();
    let layouts_after_first = device.layouts_created.get();

    // Same texture state but a different pipeline state: layout is reused
    cache.set_depth_bias(7);
    cache
        .get_render_pipeline(&device, DrawMode::TriangleList, &program, 1, 0)
        .unwrap();
    assert_eq!(device.layouts_created.get(), layouts_after_first);

    // A new texture state rebuilds the bind group layouts
    cache
        .get_render_pipeline(&device, DrawMode::TriangleList, &program, 1, 0b1)
        .unwrap();
    assert!(device.layouts_created.get() > layouts_after_first);
}

// ============================================================================
// State key injectivity
// ============================================================================

#[test]
fn rasterizer_configuration_matrix_produces_distinct_pipelines() {
    let device = MockDevice::new();
    let mut cache = RenderPipelineCache::<MockDevice>::new();
    let program = test_program(1, &[]);

    let front_faces = [wgpu::FrontFace::Ccw, wgpu::FrontFace::Cw];
    let cull_modes = [None, Some(wgpu::Face::Front), Some(wgpu::Face::Back)];
    let draw_modes = [
        DrawMode::PointList,
        DrawMode::LineList,
        DrawMode::TriangleList,
        DrawMode::TriangleStrip,
    ];
    let sample_counts = [1, 4];

    let mut resolve_matrix = |cache: &mut RenderPipelineCache<MockDevice>| {
        for front_face in front_faces {
            for cull in cull_modes {
                for mode in draw_modes {
                    for samples in sample_counts {
                        cache.set_front_face(front_face);
                        cache.set_cull_enabled(cull.is_some());
                        if let Some(face) = cull {
                            cache.set_cull_face(face);
                        }
                        cache
                            .get_render_pipeline(&device, mode, &program, samples, 0)
                            .unwrap();
                    }
                }
            }
        }
    };

    let combinations = 2 * 3 * 4 * 2;
    resolve_matrix(&mut cache);
    assert_eq!(
        device.pipelines_created.get(),
        combinations,
        "Every distinct combination must produce a distinct pipeline"
    );

    // Identical combinations must re-pack to identical keys: a second sweep
    // creates nothing new
    resolve_matrix(&mut cache);
    assert_eq!(device.pipelines_created.get(), combinations);
    assert_eq!(cache.pipeline_count(), combinations as usize);
}
