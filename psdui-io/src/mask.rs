use psdui_core::diagnostics::Diagnostic;
use psdui_core::document::{BitDepth, Mask, MaskPixels};
use psdui_core::geometry::Rect;
use tracing::warn;

use crate::PsdError;
use crate::channel::{load_channel_plane, plane_budget};
use crate::cursor::BinaryCursor;

/// 带有旧版附加子记录（标志、填充、重复矩形）的掩码记录长度。
const LEGACY_RECORD_LEN: usize = 36;
/// 矩形 16 字节 + 默认颜色 + 标志。
const MIN_RECORD_LEN: usize = 18;

/// 读取图层掩码记录。长度为 0 时返回 `None`；读取后游标总是落在记录末尾。
pub(crate) fn read_mask_record(
    cursor: &mut BinaryCursor<'_>,
    block_end: usize,
) -> Result<Option<Mask>, PsdError> {
    let offset = cursor.absolute_position();
    let record_len = cursor.read_u32()? as usize;
    if record_len == 0 {
        return Ok(None);
    }

    let start = cursor.position();
    if start + record_len > block_end {
        return Err(PsdError::malformed(
            offset,
            format!("掩码记录长度 {record_len} 超出图层附加数据范围"),
        ));
    }
    if record_len < MIN_RECORD_LEN {
        return Err(PsdError::malformed(
            offset,
            format!("掩码记录长度 {record_len} 不足 {MIN_RECORD_LEN} 字节"),
        ));
    }

    let [top, left, bottom, right] = read_rect(cursor)?;
    let default_color = cursor.read_u8()?;
    let flags = cursor.read_u8()?;
    if record_len == LEGACY_RECORD_LEN {
        cursor.skip(2)?;
        let _legacy_rect = read_rect(cursor)?;
    }
    cursor.set_position(start + record_len)?;

    let rect = Rect::new(top, left, bottom, right);
    if rect.exceeds_extent() {
        return Err(PsdError::malformed(offset, "掩码矩形跨度超出范围"));
    }
    Ok(Some(Mask::new(rect, default_color, flags)))
}

fn read_rect(cursor: &mut BinaryCursor<'_>) -> Result<[i32; 4], PsdError> {
    let values = cursor.read_i32s(4)?;
    Ok([values[0], values[1], values[2], values[3]])
}

/// 解码掩码像素。失败时不会中断解析：掩码改为全零占位平面并记录诊断。
pub(crate) fn load_mask_pixels(
    cursor: &mut BinaryCursor<'_>,
    mask: &mut Mask,
    depth: BitDepth,
    layer_name: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if mask.rect.is_empty() {
        return;
    }
    let rows = mask.rect.height() as usize;
    let columns = mask.rect.width() as usize;
    let offset = cursor.absolute_position();
    let budget = plane_budget(cursor.remaining());
    mask.pixels = match load_channel_plane(cursor, rows, columns, depth) {
        Ok((_, plane)) => MaskPixels::Decoded(plane),
        Err(err) => {
            warn!(layer = layer_name, offset, error = %err, "掩码解码失败，使用占位平面");
            diagnostics.push(Diagnostic::MaskDecodeFailed {
                layer: layer_name.to_string(),
                offset,
                reason: err.to_string(),
            });
            // 占位平面不超过通道数据可能解码出的长度
            let len = rows.saturating_mul(columns).saturating_mul(depth.bytes_per_sample());
            let placeholder = if len <= budget { vec![0u8; len] } else { Vec::new() };
            MaskPixels::Corrupt {
                placeholder,
                reason: err.to_string(),
            }
        }
    };
}
