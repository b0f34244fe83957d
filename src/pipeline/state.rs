//! 状态槽位布局与数值编码
//!
//! Pipeline 配置被编码为一组 u64 槽位 (14 个固定槽 + 每个顶点属性一个槽)，
//! 仅作为缓存 Key 使用。配置结构体本身才是唯一数据源：Descriptor 构建
//! 永远读取字段，不读槽位。
//!
//! 槽位打包必须是单射的 (不同配置 -> 不同槽位向量)，否则缓存会发生混叠。

use crate::errors::{Result, SagaError};

// ============================================================================
// 槽位布局 (Slot layout)
// ============================================================================

/// Fixed slot positions inside the state vector.
///
/// ```text
///  0  STENCIL_READ_MASK        raw mask
///  1  STENCIL_WRITE_MASK       raw mask
///  2  DEPTH_BIAS               i32, bit-cast
///  3  DEPTH_BIAS_SLOPE_SCALE   f32, bit-cast
///  4  DEPTH_STENCIL_STATE      fmt(6) | compare<<6 | depthWrite<<9
///                              | stencil<<10 (24) | stencilEnabled<<34
///  5  MRT_ATTACHMENTS          enabled-target bitmask
///  6  TARGET_STATE             mrtCount(4) | writeMask<<8 (4) | indexFmt<<12 (2)
///  7  RASTERIZATION_STATE      frontFace | cull<<1 | clampDepth<<3
///                              | alphaToCoverage<<4 | topology<<5 | samples<<8
///  8..=11  COLOR_STATES        two 32-bit target lanes per slot:
///                              blend(25) | format<<26 (6)
/// 12  SHADER_STAGE             program unique id
/// 13  TEXTURE_STATE            sample-type override bitmask
/// 14.. VERTEX_STATE            per attribute: layoutHash +wrap (location<<7)
/// ```
pub(crate) mod slot {
    pub const STENCIL_READ_MASK: usize = 0;
    pub const STENCIL_WRITE_MASK: usize = 1;
    pub const DEPTH_BIAS: usize = 2;
    pub const DEPTH_BIAS_SLOPE_SCALE: usize = 3;
    pub const DEPTH_STENCIL_STATE: usize = 4;
    pub const MRT_ATTACHMENTS: usize = 5;
    pub const TARGET_STATE: usize = 6;
    pub const RASTERIZATION_STATE: usize = 7;
    pub const COLOR_STATES: usize = 8;
    pub const COLOR_STATE_SLOTS: usize = 4;
    pub const SHADER_STAGE: usize = 12;
    pub const TEXTURE_STATE: usize = 13;
    pub const VERTEX_STATE: usize = 14;
    pub const NUM_FIXED: usize = 14;
}

/// Maximum number of simultaneous color attachments.
pub const MAX_COLOR_ATTACHMENTS: usize = 8;

bitflags::bitflags! {
    /// Enabled-target bitmask for multi-render-target mode.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MrtMask: u8 {
        const TARGET_0 = 1 << 0;
        const TARGET_1 = 1 << 1;
        const TARGET_2 = 1 << 2;
        const TARGET_3 = 1 << 3;
        const TARGET_4 = 1 << 4;
        const TARGET_5 = 1 << 5;
        const TARGET_6 = 1 << 6;
        const TARGET_7 = 1 << 7;
    }
}

// ============================================================================
// Draw mode
// ============================================================================

/// Engine-level fill/draw mode requested per draw call.
///
/// WebGPU has no fan or loop topologies; requesting them is a configuration
/// error, never a silent substitution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DrawMode {
    #[default]
    TriangleList,
    TriangleStrip,
    TriangleFan,
    LineList,
    LineStrip,
    LineLoop,
    PointList,
    /// Wireframe fill of a triangle mesh (rendered as a line list)
    Wireframe,
}

impl DrawMode {
    pub fn topology(self) -> Result<wgpu::PrimitiveTopology> {
        match self {
            DrawMode::TriangleList => Ok(wgpu::PrimitiveTopology::TriangleList),
            DrawMode::TriangleStrip => Ok(wgpu::PrimitiveTopology::TriangleStrip),
            DrawMode::LineList | DrawMode::Wireframe => Ok(wgpu::PrimitiveTopology::LineList),
            DrawMode::LineStrip => Ok(wgpu::PrimitiveTopology::LineStrip),
            DrawMode::PointList => Ok(wgpu::PrimitiveTopology::PointList),
            DrawMode::TriangleFan | DrawMode::LineLoop => {
                Err(SagaError::UnsupportedDrawMode(self))
            }
        }
    }
}

// ============================================================================
// 枚举 -> 位域编码 (打包辅助函数)
// ============================================================================

#[inline]
pub(crate) fn front_face_bits(face: wgpu::FrontFace) -> u64 {
    match face {
        wgpu::FrontFace::Ccw => 0,
        wgpu::FrontFace::Cw => 1,
    }
}

/// 2 bits: 0 = no culling, 1 = front, 2 = back.
#[inline]
pub(crate) fn cull_mode_bits(cull_mode: Option<wgpu::Face>) -> u64 {
    match cull_mode {
        None => 0,
        Some(wgpu::Face::Front) => 1,
        Some(wgpu::Face::Back) => 2,
    }
}

#[inline]
pub(crate) fn topology_bits(topology: wgpu::PrimitiveTopology) -> u64 {
    match topology {
        wgpu::PrimitiveTopology::PointList => 0,
        wgpu::PrimitiveTopology::LineList => 1,
        wgpu::PrimitiveTopology::LineStrip => 2,
        wgpu::PrimitiveTopology::TriangleList => 3,
        wgpu::PrimitiveTopology::TriangleStrip => 4,
    }
}

/// 3 bits.
#[inline]
pub(crate) fn compare_bits(compare: wgpu::CompareFunction) -> u64 {
    match compare {
        wgpu::CompareFunction::Never => 0,
        wgpu::CompareFunction::Less => 1,
        wgpu::CompareFunction::Equal => 2,
        wgpu::CompareFunction::LessEqual => 3,
        wgpu::CompareFunction::Greater => 4,
        wgpu::CompareFunction::NotEqual => 5,
        wgpu::CompareFunction::GreaterEqual => 6,
        wgpu::CompareFunction::Always => 7,
    }
}

/// 3 bits.
#[inline]
pub(crate) fn stencil_op_bits(op: wgpu::StencilOperation) -> u64 {
    match op {
        wgpu::StencilOperation::Keep => 0,
        wgpu::StencilOperation::Zero => 1,
        wgpu::StencilOperation::Replace => 2,
        wgpu::StencilOperation::Invert => 3,
        wgpu::StencilOperation::IncrementClamp => 4,
        wgpu::StencilOperation::DecrementClamp => 5,
        wgpu::StencilOperation::IncrementWrap => 6,
        wgpu::StencilOperation::DecrementWrap => 7,
    }
}

/// 12 bits: compare | depthFailOp<<3 | passOp<<6 | failOp<<9.
#[inline]
pub(crate) fn stencil_face_bits(face: &wgpu::StencilFaceState) -> u64 {
    compare_bits(face.compare)
        + (stencil_op_bits(face.depth_fail_op) << 3)
        + (stencil_op_bits(face.pass_op) << 6)
        + (stencil_op_bits(face.fail_op) << 9)
}

/// 5 bits.
#[inline]
pub(crate) fn blend_factor_bits(factor: wgpu::BlendFactor) -> u64 {
    match factor {
        wgpu::BlendFactor::Zero => 0,
        wgpu::BlendFactor::One => 1,
        wgpu::BlendFactor::Src => 2,
        wgpu::BlendFactor::OneMinusSrc => 3,
        wgpu::BlendFactor::SrcAlpha => 4,
        wgpu::BlendFactor::OneMinusSrcAlpha => 5,
        wgpu::BlendFactor::Dst => 6,
        wgpu::BlendFactor::OneMinusDst => 7,
        wgpu::BlendFactor::DstAlpha => 8,
        wgpu::BlendFactor::OneMinusDstAlpha => 9,
        wgpu::BlendFactor::SrcAlphaSaturated => 10,
        wgpu::BlendFactor::Constant => 11,
        wgpu::BlendFactor::OneMinusConstant => 12,
        wgpu::BlendFactor::Src1 => 13,
        wgpu::BlendFactor::OneMinusSrc1 => 14,
        wgpu::BlendFactor::Src1Alpha => 15,
        wgpu::BlendFactor::OneMinusSrc1Alpha => 16,
    }
}

#[inline]
pub(crate) fn blend_operation_bits(op: wgpu::BlendOperation) -> u64 {
    match op {
        wgpu::BlendOperation::Add => 0,
        wgpu::BlendOperation::Subtract => 1,
        wgpu::BlendOperation::ReverseSubtract => 2,
        wgpu::BlendOperation::Min => 3,
        wgpu::BlendOperation::Max => 4,
    }
}

/// 25 bits per enabled blend target:
/// 4x5-bit factors, then the two operations combined into one 5-bit field.
/// 组合运算编码偏移 +1，保证启用混合时该字段非零，不会与「未启用」混叠。
#[inline]
pub(crate) fn blend_state_bits(blend: &wgpu::BlendState) -> u64 {
    blend_factor_bits(blend.color.src_factor)
        + (blend_factor_bits(blend.color.dst_factor) << 5)
        + (blend_factor_bits(blend.alpha.src_factor) << 10)
        + (blend_factor_bits(blend.alpha.dst_factor) << 15)
        + ((blend_operation_bits(blend.color.operation)
            + blend_operation_bits(blend.alpha.operation) * 5
            + 1)
            << 20)
}

// ============================================================================
// 格式索引表 (6-bit, 0 = 无附件)
// ============================================================================

/// Index of a color-renderable format, 6 bits, 0 reserved for "no target".
///
/// Formats outside this table cannot be color attachments; rejecting them
/// here keeps the color-state packing injective.
pub(crate) fn color_format_index(format: Option<wgpu::TextureFormat>) -> Result<u64> {
    use wgpu::TextureFormat as F;

    let Some(format) = format else {
        return Ok(0);
    };

    let index = match format {
        F::R8Unorm => 1,
        F::R8Snorm => 2,
        F::R8Uint => 3,
        F::R8Sint => 4,
        F::R16Uint => 5,
        F::R16Sint => 6,
        F::R16Float => 7,
        F::Rg8Unorm => 8,
        F::Rg8Snorm => 9,
        F::Rg8Uint => 10,
        F::Rg8Sint => 11,
        F::R32Float => 12,
        F::R32Uint => 13,
        F::R32Sint => 14,
        F::Rg16Uint => 15,
        F::Rg16Sint => 16,
        F::Rg16Float => 17,
        F::Rgba8Unorm => 18,
        F::Rgba8UnormSrgb => 19,
        F::Rgba8Snorm => 20,
        F::Rgba8Uint => 21,
        F::Rgba8Sint => 22,
        F::Bgra8Unorm => 23,
        F::Bgra8UnormSrgb => 24,
        F::Rgb10a2Uint => 25,
        F::Rgb10a2Unorm => 26,
        F::Rg11b10Ufloat => 27,
        F::Rg32Float => 28,
        F::Rg32Uint => 29,
        F::Rg32Sint => 30,
        F::Rgba16Uint => 31,
        F::Rgba16Sint => 32,
        F::Rgba16Float => 33,
        F::Rgba32Float => 34,
        F::Rgba32Uint => 35,
        F::Rgba32Sint => 36,
        _ => return Err(SagaError::UnsupportedColorFormat(format)),
    };

    Ok(index)
}

/// Index of a depth/stencil format, 6 bits, 0 reserved for "no attachment".
pub(crate) fn depth_stencil_format_index(format: Option<wgpu::TextureFormat>) -> Result<u64> {
    use wgpu::TextureFormat as F;

    let Some(format) = format else {
        return Ok(0);
    };

    let index = match format {
        F::Stencil8 => 1,
        F::Depth16Unorm => 2,
        F::Depth24Plus => 3,
        F::Depth24PlusStencil8 => 4,
        F::Depth32Float => 5,
        F::Depth32FloatStencil8 => 6,
        _ => return Err(SagaError::UnsupportedDepthStencilFormat(format)),
    };

    Ok(index)
}

/// Whether a depth/stencil format carries a stencil aspect.
///
/// Formats without one must never receive stencil state, even if the caller
/// enabled stencil testing.
pub(crate) fn format_has_stencil(format: wgpu::TextureFormat) -> bool {
    matches!(
        format,
        wgpu::TextureFormat::Stencil8
            | wgpu::TextureFormat::Depth24PlusStencil8
            | wgpu::TextureFormat::Depth32FloatStencil8
    )
}
