//! Descriptor 构建
//!
//! 把当前字段值 (不是槽位!) 翻译成创建 Pipeline 所需的持有型 Descriptor。
//! 槽位只是缓存 Key；这里读取的永远是配置结构体本身。

use smallvec::SmallVec;

use crate::device::RenderDevice;
use crate::errors::Result;
use crate::pipeline::cache::RenderPipelineCache;
use crate::pipeline::lookup::PipelineStore;
use crate::pipeline::state::format_has_stencil;
use crate::pipeline::vertex::VertexBufferLayoutDesc;
use crate::shader::{BindGroupInfo, BindingKind, CompiledProgram};

/// Owned vertex stage description.
pub struct VertexStageDesc<D: RenderDevice> {
    pub module: D::ShaderModule,
    pub entry_point: String,
    pub buffers: Vec<VertexBufferLayoutDesc>,
}

/// Owned fragment stage description.
pub struct FragmentStageDesc<D: RenderDevice> {
    pub module: D::ShaderModule,
    pub entry_point: String,
    pub targets: Vec<Option<wgpu::ColorTargetState>>,
}

/// Owned render pipeline descriptor, handed to [`RenderDevice::create_render_pipeline`].
pub struct RenderPipelineDescriptor<D: RenderDevice> {
    pub label: Option<String>,
    pub layout: D::PipelineLayout,
    pub vertex: VertexStageDesc<D>,
    pub fragment: Option<FragmentStageDesc<D>>,
    pub primitive: wgpu::PrimitiveState,
    pub depth_stencil: Option<wgpu::DepthStencilState>,
    pub multisample: wgpu::MultisampleState,
}

// Clone 手动实现：约束落在关联类型上，Device 本身无需 Clone
impl<D: RenderDevice> Clone for VertexStageDesc<D> {
    fn clone(&self) -> Self {
        Self {
            module: self.module.clone(),
            entry_point: self.entry_point.clone(),
            buffers: self.buffers.clone(),
        }
    }
}

impl<D: RenderDevice> Clone for FragmentStageDesc<D> {
    fn clone(&self) -> Self {
        Self {
            module: self.module.clone(),
            entry_point: self.entry_point.clone(),
            targets: self.targets.clone(),
        }
    }
}

impl<D: RenderDevice> Clone for RenderPipelineDescriptor<D> {
    fn clone(&self) -> Self {
        Self {
            label: self.label.clone(),
            layout: self.layout.clone(),
            vertex: self.vertex.clone(),
            fragment: self.fragment.clone(),
            primitive: self.primitive,
            depth_stencil: self.depth_stencil.clone(),
            multisample: self.multisample,
        }
    }
}

/// Translate one bind group's reflection metadata into layout entries,
/// applying texture sample-type overrides.
///
/// 纹理被标记为不可过滤 (unfilterable float / 以 float 采样的 depth) 时，
/// 降级其 sample type，并同步降级自动绑定的 Sampler。
pub(crate) fn bind_group_layout_entries(
    group: &BindGroupInfo,
    texture_state: u32,
) -> Vec<wgpu::BindGroupLayoutEntry> {
    let overridden = |texture_index: u32| texture_state & (1 << texture_index) != 0;

    // Samplers dragged down by their overridden texture
    let mut non_filtering_samplers: SmallVec<[u32; 4]> = SmallVec::new();
    for entry in &group.entries {
        if let BindingKind::Texture {
            texture_index,
            auto_sampler: Some(sampler_binding),
            ..
        } = &entry.kind
            && overridden(*texture_index)
        {
            non_filtering_samplers.push(*sampler_binding);
        }
    }

    group
        .entries
        .iter()
        .map(|entry| {
            let ty = match &entry.kind {
                BindingKind::Buffer {
                    ty,
                    has_dynamic_offset,
                } => wgpu::BindingType::Buffer {
                    ty: *ty,
                    has_dynamic_offset: *has_dynamic_offset,
                    min_binding_size: None,
                },
                BindingKind::Sampler(sampler_type) => {
                    if non_filtering_samplers.contains(&entry.binding) {
                        wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering)
                    } else {
                        wgpu::BindingType::Sampler(*sampler_type)
                    }
                }
                BindingKind::Texture {
                    sample_type,
                    dimension,
                    multisampled,
                    texture_index,
                    ..
                } => wgpu::BindingType::Texture {
                    sample_type: if overridden(*texture_index) {
                        wgpu::TextureSampleType::Float { filterable: false }
                    } else {
                        *sample_type
                    },
                    view_dimension: *dimension,
                    multisampled: *multisampled,
                },
                BindingKind::StorageTexture {
                    access,
                    format,
                    dimension,
                } => wgpu::BindingType::StorageTexture {
                    access: *access,
                    format: *format,
                    view_dimension: *dimension,
                },
            };

            wgpu::BindGroupLayoutEntry {
                binding: entry.binding,
                visibility: entry.visibility,
                ty,
                count: None,
            }
        })
        .collect()
}

impl<D, S> RenderPipelineCache<D, S>
where
    D: RenderDevice,
    S: PipelineStore<D::RenderPipeline>,
{
    /// Pipeline layout for `(program, texture_state)`, cached: the layout
    /// only changes when the sample-type overrides do.
    pub(crate) fn pipeline_layout(
        &mut self,
        device: &D,
        program: &CompiledProgram<D>,
    ) -> D::PipelineLayout {
        let key = (program.id, self.texture_state);
        if let Some(layout) = self.layout_cache.get(&key) {
            return layout.clone();
        }

        let group_layouts: Vec<D::BindGroupLayout> = program
            .bind_groups
            .iter()
            .map(|group| {
                let entries = bind_group_layout_entries(group, self.texture_state);
                device.create_bind_group_layout(Some("Render Bind Group Layout"), &entries)
            })
            .collect();

        let layout = device.create_pipeline_layout(Some("Render Pipeline Layout"), &group_layouts);
        self.layout_cache.insert(key, layout.clone());
        layout
    }

    /// Build the full owned descriptor from the current field values.
    pub(crate) fn build_descriptor(
        &mut self,
        device: &D,
        program: &CompiledProgram<D>,
    ) -> Result<RenderPipelineDescriptor<D>> {
        let layout = self.pipeline_layout(device, program);
        let vertex_buffers = crate::pipeline::vertex::build_vertex_layout(
            &program.attributes,
            self.vertex_buffers.as_deref(),
            device.max_vertex_buffer_array_stride(),
        )?;
        let targets = self.build_color_targets();

        let fragment = program
            .fragment_module
            .as_ref()
            .map(|module| FragmentStageDesc {
                module: module.clone(),
                entry_point: program.fragment_entry.clone(),
                targets,
            });

        Ok(RenderPipelineDescriptor {
            label: program.label.clone(),
            layout,
            vertex: VertexStageDesc {
                module: program.vertex_module.clone(),
                entry_point: program.vertex_entry.clone(),
                buffers: vertex_buffers,
            },
            fragment,
            primitive: self.build_primitive(),
            depth_stencil: self.build_depth_stencil(),
            multisample: wgpu::MultisampleState {
                count: self.sample_count,
                mask: !0,
                alpha_to_coverage_enabled: self.alpha_to_coverage,
            },
        })
    }

    /// MRT 模式按使能掩码逐目标发射；单目标模式发射主颜色格式；
    /// 未绑定颜色输出时为空。
    fn build_color_targets(&self) -> Vec<Option<wgpu::ColorTargetState>> {
        let mut targets = Vec::new();

        if self.mrt_enabled {
            for (i, format) in self.mrt_formats.iter().enumerate() {
                let enabled = self.mrt_mask.bits() & (1 << i) != 0;
                match (enabled, format) {
                    (true, Some(format)) => targets.push(Some(wgpu::ColorTargetState {
                        format: *format,
                        blend: self.blend_for_target(i),
                        write_mask: self.write_mask,
                    })),
                    _ => targets.push(None),
                }
            }
        } else if let Some(format) = self.color_format {
            targets.push(Some(wgpu::ColorTargetState {
                format,
                blend: self.blend_for_target(0),
                write_mask: self.write_mask,
            }));
        }

        targets
    }

    /// Blend state for one target; targets beyond the configured blend-state
    /// count reuse target 0's parameters.
    pub(crate) fn blend_for_target(&self, target: usize) -> Option<wgpu::BlendState> {
        if !self.alpha_blend_enabled {
            return None;
        }
        let index = if target < self.blend_states.len() {
            target
        } else {
            0
        };
        self.blend_states.get(index).copied()
    }

    fn build_depth_stencil(&self) -> Option<wgpu::DepthStencilState> {
        let format = self.depth_stencil_format?;

        // 无 stencil aspect 的格式绝不能携带 stencil 状态
        let stencil = if self.stencil_enabled && format_has_stencil(format) {
            wgpu::StencilState {
                front: self.stencil_front,
                back: self.stencil_back,
                read_mask: self.stencil_read_mask,
                write_mask: self.stencil_write_mask,
            }
        } else {
            wgpu::StencilState::default()
        };

        Some(wgpu::DepthStencilState {
            format,
            depth_write_enabled: Some(self.depth_write_enabled),
            depth_compare: Some(if self.depth_test_enabled {
                self.depth_compare
            } else {
                wgpu::CompareFunction::Always
            }),
            stencil,
            bias: wgpu::DepthBiasState {
                constant: self.depth_bias,
                slope_scale: self.depth_bias_slope_scale,
                clamp: 0.0,
            },
        })
    }

    fn build_primitive(&self) -> wgpu::PrimitiveState {
        let strip_index_format = match self.topology {
            wgpu::PrimitiveTopology::LineStrip | wgpu::PrimitiveTopology::TriangleStrip => {
                self.index_buffer.as_ref().map(|ib| ib.format)
            }
            _ => None,
        };

        wgpu::PrimitiveState {
            topology: self.topology,
            strip_index_format,
            front_face: self.front_face,
            cull_mode: self.cull_enabled.then_some(self.cull_face),
            unclipped_depth: self.clamp_depth,
            polygon_mode: wgpu::PolygonMode::Fill,
            conservative: false,
        }
    }
}
