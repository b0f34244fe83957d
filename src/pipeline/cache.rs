//! Render Pipeline 状态缓存
//!
//! 两级解析：
//! - L0: 单槽 memo (上一次解析结果)。状态未脏时直接返回，零哈希开销 —
//!   连续 draw 共用同一 Pipeline 的常见情况 (同材质批次) 走这条路。
//! - L1: 可插拔查找存储 ([`PipelineStore`])，以完整状态向量为 Key，
//!   处理在一组有限配置之间切换的情况。
//! - Miss: 构建 Descriptor 并请求 Device 创建，同时写回 L1 与 L0。
//!
//! 配置字段是唯一数据源；槽位向量仅由字段打包而来，作为缓存 Key。
//! 任何 Setter 生效后，槽位必须能纯粹由当前字段值推导出来。

use std::sync::Arc;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::buffer::{IndexBufferRef, VertexBufferRef, VertexBuffers};
use crate::device::RenderDevice;
use crate::errors::{Result, SagaError};
use crate::pipeline::lookup::{IndexedStore, PipelineStore};
use crate::pipeline::state::{self, DrawMode, MrtMask, MAX_COLOR_ATTACHMENTS, slot};
use crate::pipeline::stats::CacheStats;
use crate::shader::CompiledProgram;

/// 状态向量：14 个固定槽 + 每个顶点属性一个槽
pub(crate) type StateVec = SmallVec<[u64; 20]>;

const DEFAULT_STENCIL_MASK: u32 = 0xFF;
const DEFAULT_COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Bgra8Unorm;
const DEFAULT_DEPTH_STENCIL_FORMAT: wgpu::TextureFormat =
    wgpu::TextureFormat::Depth24PlusStencil8;

/// Render pipeline state cache.
///
/// Accumulates pipeline configuration through setters and resolves the
/// current configuration to a backend pipeline object, preferring reuse.
/// One instance exclusively owns its state vector, memo and store; it is
/// driven by the single render thread, once per draw call.
pub struct RenderPipelineCache<
    D: RenderDevice,
    S: PipelineStore<D::RenderPipeline> = IndexedStore<<D as RenderDevice>::RenderPipeline>,
> {
    // === 状态槽位 (缓存 Key) ===
    states: StateVec,
    dirty: bool,
    /// 自上次解析以来脏掉的最低槽位；供前缀敏感的存储策略使用
    lowest_dirty_index: usize,

    // === 光栅化 ===
    pub(crate) fill_mode: DrawMode,
    pub(crate) topology: wgpu::PrimitiveTopology,
    pub(crate) front_face: wgpu::FrontFace,
    pub(crate) cull_enabled: bool,
    pub(crate) cull_face: wgpu::Face,
    pub(crate) clamp_depth: bool,
    pub(crate) alpha_to_coverage: bool,
    pub(crate) sample_count: u32,
    pub(crate) depth_bias: i32,
    pub(crate) depth_bias_slope_scale: f32,

    // === 颜色目标 ===
    pub(crate) color_format: Option<wgpu::TextureFormat>,
    pub(crate) mrt_enabled: bool,
    pub(crate) mrt_formats: SmallVec<[Option<wgpu::TextureFormat>; MAX_COLOR_ATTACHMENTS]>,
    pub(crate) mrt_mask: MrtMask,
    pub(crate) write_mask: wgpu::ColorWrites,
    pub(crate) alpha_blend_enabled: bool,
    pub(crate) blend_states: SmallVec<[wgpu::BlendState; 1]>,

    // === 深度 / 模板 ===
    pub(crate) depth_stencil_format: Option<wgpu::TextureFormat>,
    pub(crate) depth_test_enabled: bool,
    pub(crate) depth_write_enabled: bool,
    pub(crate) depth_compare: wgpu::CompareFunction,
    pub(crate) stencil_enabled: bool,
    pub(crate) stencil_front: wgpu::StencilFaceState,
    pub(crate) stencil_back: wgpu::StencilFaceState,
    pub(crate) stencil_read_mask: u32,
    pub(crate) stencil_write_mask: u32,

    // === 顶点 / 索引 Buffer ===
    pub(crate) vertex_buffers: Option<Arc<VertexBuffers>>,
    pub(crate) index_buffer: Option<IndexBufferRef>,

    // === Shader / 纹理绑定 ===
    pub(crate) shader_id: u64,
    pub(crate) texture_state: u32,

    // === 解析器 ===
    disabled: bool,
    store: S,
    last_pipeline: Option<D::RenderPipeline>,
    /// (program id, texture state) -> PipelineLayout；Layout 只随采样类型
    /// 覆盖位变化，miss 时无需重复创建
    pub(crate) layout_cache: FxHashMap<(u64, u32), D::PipelineLayout>,
    stats: CacheStats,
}

impl<D: RenderDevice> RenderPipelineCache<D> {
    /// Cache with the default hash-indexed store.
    pub fn new() -> Self {
        Self::with_store(IndexedStore::new())
    }
}

impl<D: RenderDevice> Default for RenderPipelineCache<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D, S> RenderPipelineCache<D, S>
where
    D: RenderDevice,
    S: PipelineStore<D::RenderPipeline>,
{
    /// Cache with an injected lookup store ([`IndexedStore`] or
    /// [`NoStore`](crate::pipeline::lookup::NoStore)).
    pub fn with_store(store: S) -> Self {
        let mut cache = Self {
            states: SmallVec::new(),
            dirty: true,
            lowest_dirty_index: 0,

            fill_mode: DrawMode::TriangleList,
            topology: wgpu::PrimitiveTopology::TriangleList,
            front_face: wgpu::FrontFace::Ccw,
            cull_enabled: false,
            cull_face: wgpu::Face::Back,
            clamp_depth: false,
            alpha_to_coverage: false,
            sample_count: 1,
            depth_bias: 0,
            depth_bias_slope_scale: 0.0,

            color_format: Some(DEFAULT_COLOR_FORMAT),
            mrt_enabled: false,
            mrt_formats: SmallVec::new(),
            mrt_mask: MrtMask::empty(),
            write_mask: wgpu::ColorWrites::ALL,
            alpha_blend_enabled: false,
            blend_states: SmallVec::from_slice(&[wgpu::BlendState::REPLACE]),

            depth_stencil_format: Some(DEFAULT_DEPTH_STENCIL_FORMAT),
            depth_test_enabled: true,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil_enabled: false,
            stencil_front: wgpu::StencilFaceState::IGNORE,
            stencil_back: wgpu::StencilFaceState::IGNORE,
            stencil_read_mask: DEFAULT_STENCIL_MASK,
            stencil_write_mask: DEFAULT_STENCIL_MASK,

            vertex_buffers: None,
            index_buffer: None,

            shader_id: 0,
            texture_state: 0,

            disabled: false,
            store,
            last_pipeline: None,
            layout_cache: FxHashMap::default(),
            stats: CacheStats::default(),
        };
        cache.reset();
        cache
    }

    // ========================================================================
    // 生命周期
    // ========================================================================

    /// Reinitialize every field to its default and start a new cache
    /// generation (store, memo and layout cache are dropped). Used after
    /// context loss, when previously created pipelines are no longer valid.
    pub fn reset(&mut self) {
        self.fill_mode = DrawMode::TriangleList;
        self.topology = wgpu::PrimitiveTopology::TriangleList;
        self.front_face = wgpu::FrontFace::Ccw;
        self.cull_enabled = false;
        self.cull_face = wgpu::Face::Back;
        self.clamp_depth = false;
        self.alpha_to_coverage = false;
        self.sample_count = 1;
        self.depth_bias = 0;
        self.depth_bias_slope_scale = 0.0;

        self.color_format = Some(DEFAULT_COLOR_FORMAT);
        self.mrt_enabled = false;
        self.mrt_formats.clear();
        self.mrt_mask = MrtMask::empty();
        self.write_mask = wgpu::ColorWrites::ALL;
        self.alpha_blend_enabled = false;
        self.blend_states.clear();
        self.blend_states.push(wgpu::BlendState::REPLACE);

        self.depth_stencil_format = Some(DEFAULT_DEPTH_STENCIL_FORMAT);
        self.depth_test_enabled = true;
        self.depth_write_enabled = true;
        self.depth_compare = wgpu::CompareFunction::Less;
        self.stencil_enabled = false;
        self.stencil_front = wgpu::StencilFaceState::IGNORE;
        self.stencil_back = wgpu::StencilFaceState::IGNORE;
        self.stencil_read_mask = DEFAULT_STENCIL_MASK;
        self.stencil_write_mask = DEFAULT_STENCIL_MASK;

        self.vertex_buffers = None;
        self.index_buffer = None;
        self.shader_id = 0;
        self.texture_state = 0;

        // 固定槽清零；掩码槽直接由默认字段写入 (解析时不会重算它们)
        self.states.clear();
        self.states.resize(slot::NUM_FIXED, 0);
        self.states[slot::STENCIL_READ_MASK] = u64::from(DEFAULT_STENCIL_MASK);
        self.states[slot::STENCIL_WRITE_MASK] = u64::from(DEFAULT_STENCIL_MASK);

        self.dirty = true;
        self.lowest_dirty_index = 0;
        self.last_pipeline = None;
        self.store.clear();
        self.layout_cache.clear();
    }

    /// Frame boundary: roll the creation counter over.
    pub fn end_frame(&mut self) {
        self.stats.end_frame();
    }

    #[must_use]
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Bypass mode: every resolve rebuilds the descriptor and creates a
    /// fresh pipeline. For inherently single-use states (debug/comparison
    /// rendering), not an error path.
    pub fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
    }

    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Read-only view of the packed state vector (diagnostics only).
    #[must_use]
    pub fn state_key(&self) -> &[u64] {
        &self.states
    }

    /// Number of pipelines held by the lookup store.
    #[must_use]
    pub fn pipeline_count(&self) -> usize {
        self.store.len()
    }

    // ========================================================================
    // Setters — 光栅化
    // ========================================================================
    // 分组槽位 (光栅化/颜色/深度模板/顶点) 在每次解析时重算并与旧值比较，
    // 因此这些 Setter 只写字段。单值槽位 (掩码/偏置) 由 Setter 直接打包。

    pub fn set_front_face(&mut self, face: wgpu::FrontFace) {
        self.front_face = face;
    }

    pub fn set_cull_enabled(&mut self, enabled: bool) {
        self.cull_enabled = enabled;
    }

    pub fn set_cull_face(&mut self, face: wgpu::Face) {
        self.cull_face = face;
    }

    pub fn set_clamp_depth(&mut self, clamp: bool) {
        self.clamp_depth = clamp;
    }

    pub fn set_alpha_to_coverage(&mut self, enabled: bool) {
        self.alpha_to_coverage = enabled;
    }

    pub fn set_depth_bias(&mut self, bias: i32) {
        if self.depth_bias != bias {
            self.depth_bias = bias;
            self.set_slot(slot::DEPTH_BIAS, u64::from(bias as u32));
        }
    }

    pub fn set_depth_bias_slope_scale(&mut self, slope_scale: f32) {
        if self.depth_bias_slope_scale.to_bits() != slope_scale.to_bits() {
            self.depth_bias_slope_scale = slope_scale;
            self.set_slot(slot::DEPTH_BIAS_SLOPE_SCALE, u64::from(slope_scale.to_bits()));
        }
    }

    // ========================================================================
    // Setters — 颜色目标
    // ========================================================================

    /// Primary color format for single-target rendering; `None` when no
    /// color output is bound.
    pub fn set_color_format(&mut self, format: Option<wgpu::TextureFormat>) {
        self.color_format = format;
    }

    /// Enter MRT mode with one format slot per target (`None` = target slot
    /// unused). An empty slice leaves MRT mode. More than 8 targets is a
    /// configuration error and mutates nothing.
    pub fn set_mrt_formats(&mut self, formats: &[Option<wgpu::TextureFormat>]) -> Result<()> {
        if formats.len() > MAX_COLOR_ATTACHMENTS {
            return Err(SagaError::TooManyColorAttachments {
                count: formats.len(),
                max: MAX_COLOR_ATTACHMENTS,
            });
        }
        self.mrt_formats = SmallVec::from_slice(formats);
        self.mrt_enabled = !formats.is_empty();
        Ok(())
    }

    /// Per-target enable bitmask for MRT mode.
    pub fn set_mrt_attachments(&mut self, mask: MrtMask) {
        if self.mrt_mask != mask {
            self.mrt_mask = mask;
            self.set_slot(slot::MRT_ATTACHMENTS, u64::from(mask.bits()));
        }
    }

    pub fn set_write_mask(&mut self, mask: wgpu::ColorWrites) {
        self.write_mask = mask;
    }

    pub fn set_alpha_blend_enabled(&mut self, enabled: bool) {
        self.alpha_blend_enabled = enabled;
    }

    /// Per-target blend parameters; enabled targets beyond the slice reuse
    /// entry 0. An empty slice resets to the replace blend.
    pub fn set_blend_states(&mut self, states: &[wgpu::BlendState]) {
        self.blend_states.clear();
        if states.is_empty() {
            self.blend_states.push(wgpu::BlendState::REPLACE);
        } else {
            self.blend_states.extend_from_slice(states);
        }
    }

    /// Single blend state applied to every enabled target.
    pub fn set_blend_state(&mut self, state: wgpu::BlendState) {
        self.set_blend_states(std::slice::from_ref(&state));
    }

    // ========================================================================
    // Setters — 深度 / 模板
    // ========================================================================

    /// `None` omits the depth/stencil attachment entirely.
    pub fn set_depth_stencil_format(&mut self, format: Option<wgpu::TextureFormat>) {
        self.depth_stencil_format = format;
    }

    pub fn set_depth_test_enabled(&mut self, enabled: bool) {
        self.depth_test_enabled = enabled;
    }

    pub fn set_depth_write_enabled(&mut self, enabled: bool) {
        self.depth_write_enabled = enabled;
    }

    pub fn set_depth_compare(&mut self, compare: wgpu::CompareFunction) {
        self.depth_compare = compare;
    }

    pub fn set_stencil_enabled(&mut self, enabled: bool) {
        self.stencil_enabled = enabled;
    }

    pub fn set_stencil_front(&mut self, face: wgpu::StencilFaceState) {
        self.stencil_front = face;
    }

    pub fn set_stencil_back(&mut self, face: wgpu::StencilFaceState) {
        self.stencil_back = face;
    }

    pub fn set_stencil_read_mask(&mut self, mask: u32) {
        if self.stencil_read_mask != mask {
            self.stencil_read_mask = mask;
            self.set_slot(slot::STENCIL_READ_MASK, u64::from(mask));
        }
    }

    pub fn set_stencil_write_mask(&mut self, mask: u32) {
        if self.stencil_write_mask != mask {
            self.stencil_write_mask = mask;
            self.set_slot(slot::STENCIL_WRITE_MASK, u64::from(mask));
        }
    }

    // ========================================================================
    // Setters — Buffer
    // ========================================================================

    /// Bind the vertex buffer set (attribute name -> buffer) and the index
    /// buffer for subsequent resolves. Vertex-state slots are recomputed per
    /// resolve against the active program's attribute list.
    pub fn set_buffers(
        &mut self,
        vertex_buffers: Option<&Arc<VertexBuffers>>,
        index_buffer: Option<IndexBufferRef>,
    ) {
        self.vertex_buffers = vertex_buffers.cloned();
        self.index_buffer = index_buffer;
    }

    // ========================================================================
    // 解析
    // ========================================================================

    /// Resolve the current configuration to a pipeline, preferring reuse.
    ///
    /// Fast path: clean state + memoized pipeline. Second tier: lookup store
    /// keyed by the state vector. Miss: build descriptor, ask the device,
    /// store and memoize. A failed creation propagates without storing
    /// anything and leaves prior entries untouched.
    pub fn get_render_pipeline(
        &mut self,
        device: &D,
        fill_mode: DrawMode,
        program: &CompiledProgram<D>,
        sample_count: u32,
        texture_state: u32,
    ) -> Result<D::RenderPipeline> {
        let sample_count = sample_count.max(1);

        if self.disabled {
            // Bypass: 不读不写任何缓存层 (Layout 缓存除外)
            self.topology = fill_mode.topology()?;
            self.fill_mode = fill_mode;
            self.sample_count = sample_count;
            self.texture_state = texture_state;
            return self.create_pipeline(device, program);
        }

        self.apply_shader_stage(program.id);
        self.apply_rasterization_state(fill_mode, sample_count)?;
        self.apply_color_states()?;
        self.apply_depth_stencil_state()?;
        self.apply_target_state();
        self.apply_vertex_state(program);
        self.apply_texture_state(texture_state);

        if !self.dirty
            && let Some(pipeline) = &self.last_pipeline
        {
            self.stats.hits_without_hash += 1;
            return Ok(pipeline.clone());
        }

        if let Some(pipeline) = self.store.lookup(&self.states, self.lowest_dirty_index) {
            self.stats.hits_with_hash += 1;
            self.last_pipeline = Some(pipeline.clone());
            self.mark_resolved();
            return Ok(pipeline);
        }

        let pipeline = self.create_pipeline(device, program)?;
        self.stats.misses += 1;
        self.store.insert(&self.states, pipeline.clone());
        self.last_pipeline = Some(pipeline.clone());
        self.mark_resolved();
        Ok(pipeline)
    }

    // ========================================================================
    // 内部: 槽位重算
    // ========================================================================

    #[inline]
    fn set_slot(&mut self, index: usize, value: u64) {
        if self.states[index] != value {
            self.states[index] = value;
            self.dirty = true;
            self.lowest_dirty_index = self.lowest_dirty_index.min(index);
        }
    }

    #[inline]
    fn mark_resolved(&mut self) {
        self.dirty = false;
        self.lowest_dirty_index = self.states.len();
    }

    fn apply_shader_stage(&mut self, program_id: u64) {
        self.shader_id = program_id;
        self.set_slot(slot::SHADER_STAGE, program_id);
    }

    fn apply_texture_state(&mut self, texture_state: u32) {
        self.texture_state = texture_state;
        self.set_slot(slot::TEXTURE_STATE, u64::from(texture_state));
    }

    fn apply_rasterization_state(&mut self, fill_mode: DrawMode, sample_count: u32) -> Result<()> {
        if self.fill_mode != fill_mode {
            // 无对应拓扑的绘制模式在改动任何状态之前拒绝
            self.topology = fill_mode.topology()?;
            self.fill_mode = fill_mode;
        }
        self.sample_count = sample_count;

        let bits = state::front_face_bits(self.front_face)
            + (state::cull_mode_bits(self.cull_enabled.then_some(self.cull_face)) << 1)
            + (u64::from(self.clamp_depth) << 3)
            + (u64::from(self.alpha_to_coverage) << 4)
            + (state::topology_bits(self.topology) << 5)
            + (u64::from(sample_count) << 8);
        self.set_slot(slot::RASTERIZATION_STATE, bits);
        Ok(())
    }

    fn apply_depth_stencil_state(&mut self) -> Result<()> {
        let format_index = state::depth_stencil_format_index(self.depth_stencil_format)?;
        let compare = if self.depth_test_enabled {
            self.depth_compare
        } else {
            wgpu::CompareFunction::Always
        };
        let stencil_bits = if self.stencil_enabled {
            state::stencil_face_bits(&self.stencil_front)
                + (state::stencil_face_bits(&self.stencil_back) << 12)
        } else {
            0
        };

        let bits = format_index
            + (state::compare_bits(compare) << 6)
            + (u64::from(self.depth_write_enabled) << 9)
            + (stencil_bits << 10)
            + (u64::from(self.stencil_enabled) << 34);
        self.set_slot(slot::DEPTH_STENCIL_STATE, bits);
        Ok(())
    }

    fn apply_color_states(&mut self) -> Result<()> {
        // 每槽两个 32-bit lane；未发射的目标 (禁用/无格式) lane 为 0，
        // 与 Descriptor 构建保持一致，避免混叠
        let mut packed = [0u64; slot::COLOR_STATE_SLOTS];

        if self.mrt_enabled {
            for i in 0..self.mrt_formats.len() {
                let format = self.mrt_formats[i];
                let enabled = self.mrt_mask.bits() & (1 << i) != 0;
                let lane = if enabled && format.is_some() {
                    self.color_lane_bits(i, format)?
                } else {
                    0
                };
                packed[i / 2] |= lane << ((i % 2) * 32);
            }
        } else if self.color_format.is_some() {
            packed[0] = self.color_lane_bits(0, self.color_format)?;
        }

        for (k, bits) in packed.iter().enumerate() {
            self.set_slot(slot::COLOR_STATES + k, *bits);
        }
        Ok(())
    }

    /// 32-bit lane: blend(25) | formatIndex<<26 (6).
    fn color_lane_bits(&self, target: usize, format: Option<wgpu::TextureFormat>) -> Result<u64> {
        let blend_bits = match self.blend_for_target(target) {
            Some(blend) => state::blend_state_bits(&blend),
            None => 0,
        };
        Ok(blend_bits + (state::color_format_index(format)? << 26))
    }

    fn apply_target_state(&mut self) {
        let mrt_count = if self.mrt_enabled {
            self.mrt_formats.len() as u64
        } else {
            0
        };
        let index_format_bits = match self.index_buffer {
            None => 0,
            Some(ib) => match ib.format {
                wgpu::IndexFormat::Uint16 => 1,
                wgpu::IndexFormat::Uint32 => 2,
            },
        };
        let bits = mrt_count + (u64::from(self.write_mask.bits()) << 8) + (index_format_bits << 12);
        self.set_slot(slot::TARGET_STATE, bits);
    }

    fn apply_vertex_state(&mut self, program: &CompiledProgram<D>) {
        let required_len = slot::VERTEX_STATE + program.attributes.len();
        if self.states.len() != required_len {
            // 属性数量变化本身就是脏：即使共同前缀槽位全部相同
            self.states.resize(required_len, 0);
            self.dirty = true;
            self.lowest_dirty_index = self.lowest_dirty_index.min(slot::VERTEX_STATE);
        }

        let placeholder = VertexBufferRef::placeholder();
        let mut values: SmallVec<[u64; 8]> = SmallVec::new();
        for attr in &program.attributes {
            let vb = self
                .vertex_buffers
                .as_deref()
                .and_then(|buffers| buffers.get(&attr.name))
                .unwrap_or(&placeholder);
            values.push(vb.hash.wrapping_add(u64::from(attr.location) << 7));
        }
        for (i, value) in values.into_iter().enumerate() {
            self.set_slot(slot::VERTEX_STATE + i, value);
        }
    }

    // ========================================================================
    // 内部: 创建
    // ========================================================================

    fn create_pipeline(
        &mut self,
        device: &D,
        program: &CompiledProgram<D>,
    ) -> Result<D::RenderPipeline> {
        let descriptor = self.build_descriptor(device, program)?;
        let pipeline = device.create_render_pipeline(&descriptor)?;
        self.stats.creations_this_frame += 1;
        log::debug!(
            "Created render pipeline (program {}, {} this frame)",
            program.id,
            self.stats.creations_this_frame
        );
        Ok(pipeline)
    }
}
