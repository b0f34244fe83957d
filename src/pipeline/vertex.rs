//! 顶点输入布局生成
//!
//! 按 Shader 声明顺序遍历属性，把共享同一底层 Buffer 的相邻属性合并进同一个
//! Layout 条目；未绑定的属性使用共享的占位 Buffer，保证 Backend 收到的
//! Buffer 绑定数量永远不少于属性数量。

use crate::buffer::{VertexBufferRef, VertexBuffers};
use crate::errors::Result;
use crate::shader::AttributeInfo;

/// Pipeline 需要的单个 Buffer Layout (持有数据，便于缓存与重用)
#[derive(Debug, Clone)]
pub struct VertexBufferLayoutDesc {
    pub array_stride: u64,
    pub step_mode: wgpu::VertexStepMode,
    pub attributes: Vec<wgpu::VertexAttribute>,
    /// 底层 Buffer 身份，调用方据此按槽位顺序绑定实际 Buffer
    pub buffer_id: u64,
}

impl VertexBufferLayoutDesc {
    pub fn as_wgpu(&self) -> wgpu::VertexBufferLayout<'_> {
        wgpu::VertexBufferLayout {
            array_stride: self.array_stride,
            step_mode: self.step_mode,
            attributes: &self.attributes,
        }
    }
}

/// Build the merged vertex input layout for a program's attribute list.
///
/// Merging rule: an attribute joins the previous attribute's layout entry
/// only when both reference the same underlying buffer AND its byte offset
/// stays inside the valid range for that buffer (`offset + element size <=
/// max supported stride` for tightly packed buffers, else `<= byte stride`).
/// Anything else starts a new entry.
pub(crate) fn build_vertex_layout(
    attributes: &[AttributeInfo],
    buffers: Option<&VertexBuffers>,
    max_stride: u32,
) -> Result<Vec<VertexBufferLayoutDesc>> {
    let placeholder = VertexBufferRef::placeholder();
    let mut layouts: Vec<VertexBufferLayoutDesc> = Vec::new();
    let mut previous_buffer: Option<u64> = None;

    for attr in attributes {
        let vb = buffers
            .and_then(|b| b.get(&attr.name))
            .unwrap_or(&placeholder);

        let format = vb.vertex_format()?;
        let element_size = format.size();

        // stride 为 0 的 Buffer 以 maxVertexBufferArrayStride 为偏移上界
        let offset_in_range = if vb.byte_stride == 0 {
            vb.byte_offset + element_size <= u64::from(max_stride)
        } else {
            vb.byte_offset + element_size <= vb.byte_stride
        };

        if previous_buffer != Some(vb.buffer_id) || !offset_in_range {
            layouts.push(VertexBufferLayoutDesc {
                array_stride: vb.byte_stride,
                step_mode: vb.step_mode(),
                attributes: Vec::new(),
                buffer_id: vb.buffer_id,
            });
        }
        previous_buffer = Some(vb.buffer_id);

        if let Some(entry) = layouts.last_mut() {
            entry.attributes.push(wgpu::VertexAttribute {
                format,
                offset: vb.byte_offset,
                shader_location: attr.location,
            });
        }
    }

    Ok(layouts)
}
