//! 将 `Document` 写回 PSD 字节流：文件头、空的色彩模式与资源区段、图层与掩码信息。
//!
//! 只写出本库能够解析的子集（`luni`、`lsct`、`TySh`、`SoCo`），不生成合成图像数据。

use psdui_core::document::{
    BitDepth, Channel, ChannelId, Compression, Document, LayerRecord, Mask,
};
use psdui_core::geometry::Rect;
use tracing::debug;

use crate::IoError;
use crate::descriptor::write_unicode;
use crate::layer::write_solid_color;
use crate::rle;
use crate::text::write_type_tool;

/// 掩码记录：矩形 16 字节 + 默认颜色 + 标志 + 2 字节填充。
const MASK_RECORD_LEN: u32 = 20;

pub(crate) fn put_u8(out: &mut Vec<u8>, value: u8) {
    out.push(value);
}

pub(crate) fn put_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

pub(crate) fn put_i16(out: &mut Vec<u8>, value: i16) {
    out.extend_from_slice(&value.to_be_bytes());
}

pub(crate) fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}

pub(crate) fn put_i32(out: &mut Vec<u8>, value: i32) {
    out.extend_from_slice(&value.to_be_bytes());
}

pub(crate) fn put_i64(out: &mut Vec<u8>, value: i64) {
    out.extend_from_slice(&value.to_be_bytes());
}

pub(crate) fn put_f64(out: &mut Vec<u8>, value: f64) {
    out.extend_from_slice(&value.to_be_bytes());
}

pub(crate) fn put_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(bytes);
}

fn put_rect(out: &mut Vec<u8>, rect: Rect) {
    for edge in [rect.top, rect.left, rect.bottom, rect.right] {
        put_i32(out, edge);
    }
}

/// 序列化整个文档。通道缺少像素数据且矩形非空时返回 `UnsupportedFeature`。
pub fn write_document(document: &Document) -> Result<Vec<u8>, IoError> {
    let header = &document.header;
    let mut out = Vec::new();
    put_bytes(&mut out, b"8BPS");
    put_u16(&mut out, 1);
    put_bytes(&mut out, &[0; 6]);
    put_u16(&mut out, header.channel_count);
    put_u32(&mut out, header.height);
    put_u32(&mut out, header.width);
    put_u16(&mut out, header.depth.bits());
    put_u16(&mut out, header.color_mode.raw());

    // 色彩模式数据、图像资源
    put_u32(&mut out, 0);
    put_u32(&mut out, 0);

    let layer_info = write_layer_info(document)?;
    let mut section = Vec::with_capacity(layer_info.len() + 8);
    put_u32(&mut section, layer_info.len() as u32);
    put_bytes(&mut section, &layer_info);
    // 全局图层掩码
    put_u32(&mut section, 0);

    put_u32(&mut out, section.len() as u32);
    put_bytes(&mut out, &section);

    debug!(layers = document.layers.len(), bytes = out.len(), "文档已序列化");
    Ok(out)
}

fn write_layer_info(document: &Document) -> Result<Vec<u8>, IoError> {
    if document.layers.is_empty() {
        return Ok(Vec::new());
    }

    let depth = document.depth();
    let mut records = Vec::new();
    let mut planes = Vec::new();
    let count = i16::try_from(document.layers.len()).map_err(|_| {
        IoError::UnsupportedFeature(format!(
            "图层数量 {} 超出图层计数字段上限 {}",
            document.layers.len(),
            i16::MAX
        ))
    })?;
    put_i16(&mut records, count);

    for layer in &document.layers {
        // 记录中需要写入每个通道的字节长度，因此先编码通道数据。
        let encoded = layer
            .channels
            .iter()
            .map(|channel| encode_channel(layer, channel, depth))
            .collect::<Result<Vec<_>, _>>()?;
        write_record(&mut records, layer, &encoded);
        for plane in encoded {
            put_bytes(&mut planes, &plane);
        }
    }

    records.extend(planes);
    if records.len() % 2 != 0 {
        records.push(0);
    }
    Ok(records)
}

fn write_record(out: &mut Vec<u8>, layer: &LayerRecord, encoded: &[Vec<u8>]) {
    put_rect(out, layer.rect);
    put_u16(out, layer.channels.len() as u16);
    for (channel, plane) in layer.channels.iter().zip(encoded) {
        put_i16(out, channel.id.get());
        put_u32(out, plane.len() as u32);
    }

    put_bytes(out, b"8BIM");
    let mut blend_key = [b' '; 4];
    for (slot, byte) in blend_key.iter_mut().zip(layer.blend_mode.bytes()) {
        *slot = byte;
    }
    put_bytes(out, &blend_key);
    put_u8(out, layer.opacity);
    put_u8(out, layer.clipping);
    put_u8(out, layer.flags);
    put_u8(out, 0);

    let extra = write_extra_data(layer);
    put_u32(out, extra.len() as u32);
    put_bytes(out, &extra);
}

fn write_extra_data(layer: &LayerRecord) -> Vec<u8> {
    let mut extra = Vec::new();
    match &layer.mask {
        Some(mask) => write_mask_record(&mut extra, mask),
        None => put_u32(&mut extra, 0),
    }
    // 混合范围
    put_u32(&mut extra, 0);
    write_pascal_name(&mut extra, &layer.name);

    let mut luni = Vec::new();
    write_unicode(&mut luni, &layer.name);
    write_block(&mut extra, b"luni", &luni);

    if let Some(section) = layer.section {
        write_block(&mut extra, b"lsct", &section.raw().to_be_bytes());
    }
    if let Some(text) = &layer.text {
        let mut body = Vec::new();
        write_type_tool(&mut body, text);
        write_block(&mut extra, b"TySh", &body);
    }
    if let Some(color) = layer.solid_fill {
        let mut body = Vec::new();
        write_solid_color(&mut body, color);
        write_block(&mut extra, b"SoCo", &body);
    }
    extra
}

fn write_mask_record(out: &mut Vec<u8>, mask: &Mask) {
    put_u32(out, MASK_RECORD_LEN);
    put_rect(out, mask.rect);
    put_u8(out, mask.default_color);
    put_u8(out, mask.flags);
    put_bytes(out, &[0; 2]);
}

/// 名称截断到 255 字节（不拆分字符），连同长度字节补齐到 4 字节。
fn write_pascal_name(out: &mut Vec<u8>, name: &str) {
    let mut end = name.len().min(255);
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    let bytes = &name.as_bytes()[..end];
    put_u8(out, bytes.len() as u8);
    put_bytes(out, bytes);
    let padded = (1 + bytes.len()).div_ceil(4) * 4;
    put_bytes(out, &vec![0; padded - 1 - bytes.len()]);
}

/// 附加信息块的数据区补齐到偶数长度，长度字段包含填充。
fn write_block(out: &mut Vec<u8>, key: &[u8; 4], body: &[u8]) {
    put_bytes(out, b"8BIM");
    put_bytes(out, key);
    let padded = body.len() + body.len() % 2;
    put_u32(out, padded as u32);
    put_bytes(out, body);
    if padded != body.len() {
        put_u8(out, 0);
    }
}

fn encode_channel(layer: &LayerRecord, channel: &Channel, depth: BitDepth) -> Result<Vec<u8>, IoError> {
    let compression = channel.compression.unwrap_or(Compression::Rle);

    if channel.id == ChannelId::USER_MASK {
        let Some(mask) = &layer.mask else {
            return Ok(encode_plane(Compression::Raw, &[], 0, 0));
        };
        let rows = mask.rect.height() as usize;
        let row_bytes = mask.rect.width() as usize * depth.bytes_per_sample();
        return Ok(match mask.pixels.plane() {
            Some(plane) if plane.len() == rows * row_bytes => {
                encode_plane(compression, plane, rows, row_bytes)
            }
            _ => encode_plane(Compression::Raw, &vec![0; rows * row_bytes], rows, row_bytes),
        });
    }

    if !channel.id.is_layer_sized() {
        let data = channel.data.as_deref().unwrap_or(&[]);
        return Ok(encode_plane(Compression::Raw, data, 1, data.len()));
    }

    let rows = layer.rect.height() as usize;
    let row_bytes = layer.rect.width() as usize * depth.bytes_per_sample();
    if rows * row_bytes == 0 {
        return Ok(encode_plane(Compression::Raw, &[], 0, 0));
    }
    let data = channel.data.as_deref().ok_or_else(|| {
        IoError::UnsupportedFeature(format!(
            "图层 {} 的通道 {} 没有像素数据，无法写出",
            layer.name,
            channel.id.get()
        ))
    })?;
    if data.len() != rows * row_bytes {
        return Err(IoError::UnsupportedFeature(format!(
            "图层 {} 的通道 {} 数据长度 {} 与矩形 {}x{} 不符",
            layer.name,
            channel.id.get(),
            data.len(),
            layer.rect.width(),
            layer.rect.height()
        )));
    }
    Ok(encode_plane(compression, data, rows, row_bytes))
}

fn encode_plane(compression: Compression, data: &[u8], rows: usize, row_bytes: usize) -> Vec<u8> {
    let mut out = Vec::new();
    put_u16(&mut out, compression.raw());
    match compression {
        Compression::Raw => put_bytes(&mut out, data),
        Compression::Rle => {
            let encoded: Vec<Vec<u8>> = if row_bytes == 0 {
                vec![Vec::new(); rows]
            } else {
                data.chunks(row_bytes).map(rle::encode_row).collect()
            };
            for row in &encoded {
                put_u16(&mut out, row.len() as u16);
            }
            for row in &encoded {
                put_bytes(&mut out, row);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ParseOptions, parse_document};
    use psdui_core::document::{Color, Header, MaskPixels, SectionDivider, TextAttributes};

    fn rgba_layer(name: &str, rect: Rect, compression: Compression) -> LayerRecord {
        let mut layer = LayerRecord::new(name, rect);
        let len = rect.pixel_count();
        for (index, id) in [ChannelId::TRANSPARENCY, ChannelId::RED, ChannelId::GREEN, ChannelId::BLUE]
            .into_iter()
            .enumerate()
        {
            let plane = (0..len).map(|i| (i * 7 + index * 50) as u8).collect();
            layer.channels.push(Channel::with_data(id, compression, plane));
        }
        layer
    }

    fn reparse(document: &Document) -> Document {
        let bytes = write_document(document).unwrap();
        parse_document(&bytes, &ParseOptions::default()).unwrap()
    }

    #[test]
    fn layers_survive_a_write_and_parse() {
        let mut document = Document::new(Header::rgb(16, 8, BitDepth::Eight));
        document.push_layer(rgba_layer("背景", Rect::new(0, 0, 8, 16), Compression::Rle));
        document.push_layer(rgba_layer("raw", Rect::new(2, 3, 5, 4), Compression::Raw));
        let mut folder = LayerRecord::new("group", Rect::default());
        folder.section = Some(SectionDivider::ClosedFolder);
        folder.set_visible(false);
        document.push_layer(folder);

        let parsed = reparse(&document);
        assert_eq!(parsed.layers.len(), 3);
        for (original, parsed) in document.layers.iter().zip(&parsed.layers) {
            assert_eq!(parsed.name, original.name);
            assert_eq!(parsed.rect, original.rect);
            assert_eq!(parsed.flags, original.flags);
            assert_eq!(parsed.section, original.section);
            for (a, b) in original.channels.iter().zip(&parsed.channels) {
                assert_eq!(a.id, b.id);
                assert_eq!(a.data, b.data);
                assert_eq!(a.compression, b.compression);
            }
        }
        assert!(parsed.diagnostics.is_empty());
    }

    #[test]
    fn text_fill_and_mask_are_written() {
        let mut document = Document::new(Header::rgb(4, 4, BitDepth::Eight));
        let mut layer = rgba_layer("标题", Rect::new(0, 0, 2, 2), Compression::Rle);
        let mut text = TextAttributes::new("Hello");
        text.font_name = "Arial".to_string();
        text.font_size = 12.0;
        layer.text = Some(text.clone());
        layer.solid_fill = Some(Color::rgb(1, 2, 3));
        let mut mask = Mask::new(Rect::new(0, 0, 1, 2), 255, 0);
        mask.pixels = MaskPixels::Decoded(vec![9, 8]);
        layer.mask = Some(mask);
        layer
            .channels
            .push(Channel::with_data(ChannelId::USER_MASK, Compression::Raw, Vec::new()));
        document.push_layer(layer);

        let parsed = reparse(&document);
        let layer = &parsed.layers[0];
        assert_eq!(layer.text.as_ref(), Some(&text));
        assert_eq!(layer.solid_fill, Some(Color::rgb(1, 2, 3)));
        let mask = layer.mask.as_ref().unwrap();
        assert_eq!(mask.default_color, 255);
        assert_eq!(mask.pixels, MaskPixels::Decoded(vec![9, 8]));
    }

    #[test]
    fn missing_pixel_data_is_rejected() {
        let mut document = Document::new(Header::rgb(2, 2, BitDepth::Eight));
        let mut layer = LayerRecord::new("empty", Rect::new(0, 0, 2, 2));
        layer.channels.push(Channel::new(ChannelId::RED, 0));
        document.push_layer(layer);
        assert!(matches!(
            write_document(&document),
            Err(IoError::UnsupportedFeature(_))
        ));
    }

    #[test]
    fn layer_count_beyond_i16_is_rejected() {
        let mut document = Document::new(Header::rgb(1, 1, BitDepth::Eight));
        for _ in 0..=i16::MAX as usize {
            document.push_layer(LayerRecord::new("x", Rect::default()));
        }
        assert!(matches!(
            write_document(&document),
            Err(IoError::UnsupportedFeature(message)) if message.contains("32768")
        ));

        document.layers.pop();
        let parsed = reparse(&document);
        assert_eq!(parsed.layers.len(), i16::MAX as usize);
    }

    #[test]
    fn long_names_are_truncated_on_char_boundary() {
        let name = "图".repeat(100);
        let mut out = Vec::new();
        write_pascal_name(&mut out, &name);
        assert_eq!(out[0], 255);
        assert_eq!(out.len() % 4, 0);
        assert!(std::str::from_utf8(&out[1..256]).is_ok());
    }
}
