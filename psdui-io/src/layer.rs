use psdui_core::diagnostics::Diagnostic;
use psdui_core::document::{Channel, ChannelId, Color, LayerRecord, SectionDivider};
use psdui_core::geometry::Rect;
use tracing::{debug, trace, warn};

use crate::PsdError;
use crate::cursor::BinaryCursor;
use crate::descriptor::{Descriptor, DescriptorValue, read_unicode};
use crate::mask::read_mask_record;
use crate::text::read_type_tool;
use crate::writer::put_u32;

const SOLID_COLOR_VERSION: u32 = 16;
/// 签名 + 键 + 长度。
const BLOCK_HEADER_LEN: usize = 12;

/// 读取一条图层记录（不含通道像素），游标停在记录末尾。
pub(crate) fn read_layer_record(
    cursor: &mut BinaryCursor<'_>,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<LayerRecord, PsdError> {
    let offset = cursor.absolute_position();
    let edges = cursor.read_i32s(4)?;
    let rect = Rect::new(edges[0], edges[1], edges[2], edges[3]);
    if rect.is_inverted() {
        return Err(PsdError::malformed(
            offset,
            format!(
                "图层矩形倒置 (top {}, left {}, bottom {}, right {})",
                rect.top, rect.left, rect.bottom, rect.right
            ),
        ));
    }
    if rect.exceeds_extent() {
        return Err(PsdError::malformed(
            offset,
            format!(
                "图层矩形跨度超出范围 (top {}, left {}, bottom {}, right {})",
                rect.top, rect.left, rect.bottom, rect.right
            ),
        ));
    }

    let mut record = LayerRecord::new(String::new(), rect);
    let channel_count = cursor.read_u16()?;
    for _ in 0..channel_count {
        let id = cursor.read_i16()?;
        let declared_len = cursor.read_u32()?;
        record.channels.push(Channel::new(ChannelId(id), declared_len));
    }

    let signature_offset = cursor.absolute_position();
    if &cursor.read_array::<4>()? != b"8BIM" {
        return Err(PsdError::malformed(signature_offset, "混合模式签名不是 8BIM"));
    }
    record.blend_mode = String::from_utf8_lossy(&cursor.read_array::<4>()?).into_owned();
    record.opacity = cursor.read_u8()?;
    record.clipping = cursor.read_u8()?;
    record.flags = cursor.read_u8()?;
    cursor.skip(1)?;

    let extra_offset = cursor.absolute_position();
    let extra_len = cursor.read_u32()? as usize;
    if extra_len > cursor.remaining() {
        return Err(PsdError::malformed(
            extra_offset,
            format!("附加数据长度 {extra_len} 超出图层信息范围"),
        ));
    }
    let mut extra = cursor.sub_cursor(extra_len)?;
    let block_end = extra.len();

    record.mask = read_mask_record(&mut extra, block_end)?;

    let ranges_offset = extra.absolute_position();
    let ranges_len = extra.read_u32()? as usize;
    if ranges_len > extra.remaining() {
        return Err(PsdError::malformed(
            ranges_offset,
            format!("混合范围长度 {ranges_len} 超出附加数据范围"),
        ));
    }
    extra.skip(ranges_len)?;

    record.name = read_pascal_name(&mut extra)?;
    read_tagged_blocks(&mut extra, &mut record, diagnostics)?;

    trace!(
        layer = record.name.as_str(),
        offset,
        channels = record.channels.len(),
        "图层记录已读取"
    );
    Ok(record)
}

/// 1 字节长度 + 字符，整体补齐到 4 字节。
fn read_pascal_name(cursor: &mut BinaryCursor<'_>) -> Result<String, PsdError> {
    let len = cursor.read_u8()? as usize;
    let name = String::from_utf8_lossy(cursor.read_bytes(len)?).into_owned();
    let padded = (1 + len).div_ceil(4) * 4;
    let padding = (padded - 1 - len).min(cursor.remaining());
    cursor.skip(padding)?;
    Ok(name)
}

fn read_tagged_blocks(
    extra: &mut BinaryCursor<'_>,
    record: &mut LayerRecord,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<(), PsdError> {
    while extra.remaining() >= BLOCK_HEADER_LEN {
        let offset = extra.absolute_position();
        let signature = extra.read_array::<4>()?;
        if &signature != b"8BIM" && &signature != b"8B64" {
            return Err(PsdError::malformed(offset, "附加信息块签名无效"));
        }
        let key = extra.read_array::<4>()?;
        let tag = String::from_utf8_lossy(&key).into_owned();
        let len = extra.read_u32()? as usize;
        if len > extra.remaining() {
            return Err(PsdError::malformed(
                offset,
                format!("附加信息块 {tag} 长度 {len} 超出附加数据范围"),
            ));
        }
        let mut block = extra.sub_cursor(len)?;

        let outcome = match &key {
            b"luni" => read_unicode(&mut block).map(|name| {
                if !name.is_empty() {
                    record.name = name;
                }
            }),
            b"lsct" | b"lsdk" => block
                .read_u32()
                .map(|kind| record.section = Some(SectionDivider::from_raw(kind))),
            b"TySh" => read_type_tool(&mut block).map(|text| record.text = Some(text)),
            b"SoCo" => read_solid_color(&mut block).map(|color| record.solid_fill = Some(color)),
            _ => {
                debug!(layer = record.name.as_str(), tag = tag.as_str(), offset, "跳过未识别的附加信息块");
                diagnostics.push(Diagnostic::UnknownMetadataTag {
                    layer: record.name.clone(),
                    tag,
                    offset,
                });
                continue;
            }
        };

        if let Err(err) = outcome {
            warn!(layer = record.name.as_str(), tag = tag.as_str(), error = %err, "附加信息块解析失败，已跳过");
            diagnostics.push(Diagnostic::MetadataDecodeFailed {
                layer: record.name.clone(),
                tag,
                reason: err.to_string(),
            });
        }
    }
    Ok(())
}

/// `SoCo`：版本 16 + 描述符，颜色位于 `Clr ` 对象的 `Rd  `/`Grn `/`Bl  ` 字段（0..=255）。
pub(crate) fn read_solid_color(cursor: &mut BinaryCursor<'_>) -> Result<Color, PsdError> {
    let offset = cursor.absolute_position();
    let version = cursor.read_u32()?;
    if version != SOLID_COLOR_VERSION {
        return Err(PsdError::malformed(offset, format!("不支持的纯色填充版本 {version}")));
    }
    let descriptor = Descriptor::read(cursor)?;
    let color = descriptor
        .get("Clr ")
        .and_then(DescriptorValue::as_object)
        .ok_or_else(|| PsdError::malformed(offset, "纯色填充缺少 Clr 对象"))?;
    let component = |key: &str| -> Result<u8, PsdError> {
        let value = color
            .get(key)
            .and_then(DescriptorValue::as_f64)
            .ok_or_else(|| PsdError::malformed(offset, format!("纯色填充缺少 {} 分量", key.trim_end())))?;
        Ok(value.clamp(0.0, 255.0).round() as u8)
    };
    Ok(Color::rgb(component("Rd  ")?, component("Grn ")?, component("Bl  ")?))
}

pub(crate) fn write_solid_color(out: &mut Vec<u8>, color: Color) {
    put_u32(out, SOLID_COLOR_VERSION);
    let rgb = Descriptor::new("RGBC")
        .with("Rd  ", DescriptorValue::Double(f64::from(color.r)))
        .with("Grn ", DescriptorValue::Double(f64::from(color.g)))
        .with("Bl  ", DescriptorValue::Double(f64::from(color.b)));
    Descriptor::new("null")
        .with("Clr ", DescriptorValue::Object(rgb))
        .write(out);
}
