use psdui_core::diagnostics::Diagnostic;
use psdui_core::document::{
    BitDepth, ChannelId, ColorMode, Document, Header, LayerRecord,
};
use tracing::{debug, warn};

use crate::PsdError;
use crate::channel::load_channel_plane;
use crate::cursor::BinaryCursor;
use crate::layer::read_layer_record;
use crate::mask::load_mask_pixels;

const SIGNATURE: &[u8; 4] = b"8BPS";
const SUPPORTED_VERSION: u16 = 1;
const MAX_CHANNELS: u16 = 56;

/// 解析选项。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// 为 `false` 时只读取图层结构，跳过全部通道像素。
    pub read_channel_data: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            read_channel_data: true,
        }
    }
}

/// 单遍解析整个文件。结构性错误立即返回；可恢复的问题记录在 `Document::diagnostics`。
pub fn parse_document(data: &[u8], options: &ParseOptions) -> Result<Document, PsdError> {
    let mut cursor = BinaryCursor::new(data);
    let header = read_header(&mut cursor)?;
    let mut document = Document::new(header);
    document.has_channel_data = options.read_channel_data;

    skip_section(&mut cursor)?;
    skip_section(&mut cursor)?;
    read_layer_and_mask_info(&mut cursor, &mut document, options)?;

    debug!(
        width = header.width,
        height = header.height,
        depth = header.depth.bits(),
        layers = document.layers.len(),
        diagnostics = document.diagnostics.len(),
        "文档解析完成"
    );
    Ok(document)
}

fn read_header(cursor: &mut BinaryCursor<'_>) -> Result<Header, PsdError> {
    if &cursor.read_array::<4>()? != SIGNATURE {
        return Err(PsdError::unsupported(0, "文件签名不是 8BPS"));
    }

    let offset = cursor.absolute_position();
    let version = cursor.read_u16()?;
    if version != SUPPORTED_VERSION {
        return Err(PsdError::unsupported(
            offset,
            format!("不支持的文件版本 {version}"),
        ));
    }
    cursor.skip(6)?;

    let offset = cursor.absolute_position();
    let channel_count = cursor.read_u16()?;
    if !(1..=MAX_CHANNELS).contains(&channel_count) {
        return Err(PsdError::unsupported(
            offset,
            format!("通道数 {channel_count} 超出 1..={MAX_CHANNELS}"),
        ));
    }

    let offset = cursor.absolute_position();
    let height = cursor.read_u32()?;
    let width = cursor.read_u32()?;
    if width == 0 || height == 0 {
        return Err(PsdError::unsupported(
            offset,
            format!("画布尺寸 {width}x{height} 无效"),
        ));
    }

    let offset = cursor.absolute_position();
    let raw_depth = cursor.read_u16()?;
    let depth = BitDepth::from_raw(raw_depth)
        .ok_or_else(|| PsdError::unsupported(offset, format!("不支持的位深 {raw_depth}")))?;

    let offset = cursor.absolute_position();
    let raw_mode = cursor.read_u16()?;
    let color_mode = ColorMode::from_raw(raw_mode)
        .ok_or_else(|| PsdError::unsupported(offset, format!("未知的色彩模式 {raw_mode}")))?;

    Ok(Header {
        version,
        channel_count,
        width,
        height,
        depth,
        color_mode,
    })
}

/// 跳过一个以 `u32` 长度开头的区段。
fn skip_section(cursor: &mut BinaryCursor<'_>) -> Result<(), PsdError> {
    let len = cursor.read_u32()? as usize;
    cursor.skip(len)
}

fn read_layer_and_mask_info(
    cursor: &mut BinaryCursor<'_>,
    document: &mut Document,
    options: &ParseOptions,
) -> Result<(), PsdError> {
    let section_len = cursor.read_u32()? as usize;
    let mut section = cursor.sub_cursor(section_len)?;
    if section.remaining() < 4 {
        return Ok(());
    }

    let info_len = section.read_u32()? as usize;
    let mut info = section.sub_cursor(info_len)?;
    if info.remaining() < 2 {
        return Ok(());
    }

    // 负数表示首个 alpha 通道保存合成结果的透明度，这里只关心数量。
    let count = info.read_i16()?.unsigned_abs();
    for _ in 0..count {
        let record = read_layer_record(&mut info, &mut document.diagnostics)?;
        document.push_layer(record);
    }

    if options.read_channel_data {
        read_channel_planes(&mut info, document)?;
    }
    Ok(())
}

fn read_channel_planes(cursor: &mut BinaryCursor<'_>, document: &mut Document) -> Result<(), PsdError> {
    let depth = document.depth();
    let Document {
        layers,
        diagnostics,
        ..
    } = document;

    for record in layers.iter_mut() {
        let LayerRecord {
            channels,
            mask,
            rect,
            name,
            ..
        } = record;

        for channel in channels.iter_mut() {
            if channel.declared_len == 0 {
                continue;
            }
            let mut plane = cursor.sub_cursor(channel.declared_len as usize)?;
            match channel.id {
                ChannelId::USER_MASK => {
                    if let Some(mask) = mask.as_mut() {
                        load_mask_pixels(&mut plane, mask, depth, name, diagnostics);
                    }
                }
                id if id.is_layer_sized() => {
                    let rows = rect.height() as usize;
                    let columns = rect.width() as usize;
                    match load_channel_plane(&mut plane, rows, columns, depth) {
                        Ok((compression, data)) => {
                            channel.compression = Some(compression);
                            channel.data = Some(data);
                        }
                        Err(err @ PsdError::UnsupportedCompression { .. }) => {
                            warn!(layer = name.as_str(), channel = id.get(), error = %err, "通道无法解码，已保留为空");
                            diagnostics.push(Diagnostic::ChannelUndecodable {
                                layer: name.clone(),
                                channel: id.get(),
                                reason: err.to_string(),
                            });
                        }
                        Err(err) => return Err(err),
                    }
                }
                _ => {}
            }
        }
    }
    Ok(())
}
