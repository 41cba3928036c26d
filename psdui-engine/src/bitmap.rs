use std::borrow::Cow;

use psdui_core::bitmap::AssembledBitmap;
use psdui_core::document::{BitDepth, ChannelId, LayerRecord};
use tracing::debug;

use crate::errors::EngineError;

/// 导出顺序：R、G、B、A。
const RGBA_ORDER: [ChannelId; 4] = [
    ChannelId::RED,
    ChannelId::GREEN,
    ChannelId::BLUE,
    ChannelId::TRANSPARENCY,
];

/// 将自上而下存储的平面交错为自下而上的位图：输出第 `y` 行取自输入第 `H-1-y` 行。
pub fn assemble(width: u32, height: u32, planes: &[&[u8]]) -> Result<AssembledBitmap, EngineError> {
    if planes.is_empty() || planes.len() > u8::MAX as usize {
        return Err(EngineError::ChannelCount(planes.len()));
    }
    let w = width as usize;
    let h = height as usize;
    let expected = w * h;
    for (index, plane) in planes.iter().enumerate() {
        if plane.len() != expected {
            return Err(EngineError::PlaneSizeMismatch {
                index,
                expected,
                actual: plane.len(),
            });
        }
    }

    let channels = planes.len();
    let mut data = vec![0u8; expected * channels];
    for y in 0..h {
        let source_row = (h - 1 - y) * w;
        let target_row = y * w * channels;
        for x in 0..w {
            for (i, plane) in planes.iter().enumerate() {
                data[target_row + x * channels + i] = plane[source_row + x];
            }
        }
    }

    AssembledBitmap::new(width, height, channels as u8, data).ok_or(EngineError::ChannelCount(channels))
}

/// 仅导出恰好 4 个通道、非文字且像素数据有意义的图层。
pub fn can_extract(record: &LayerRecord) -> bool {
    !record.pixel_data_irrelevant() && record.channels.len() == 4 && !record.is_text_layer()
}

/// 将图层像素组装为 RGBA 位图。矩形为空、缺少通道或数据长度不符时返回 `None`。
pub fn extract_layer(record: &LayerRecord, depth: BitDepth) -> Option<AssembledBitmap> {
    if !can_extract(record) || record.rect.is_empty() {
        return None;
    }

    let mut planes = Vec::with_capacity(RGBA_ORDER.len());
    for id in RGBA_ORDER {
        let data = record.channel(id)?.data.as_deref()?;
        planes.push(narrow(data, depth));
    }
    let views: Vec<&[u8]> = planes.iter().map(|plane| plane.as_ref()).collect();

    match assemble(record.width() as u32, record.height() as u32, &views) {
        Ok(bitmap) => Some(bitmap),
        Err(err) => {
            debug!(layer = record.name.as_str(), error = %err, "图层像素无法组装");
            None
        }
    }
}

/// 16 位采样只保留高字节。
fn narrow(plane: &[u8], depth: BitDepth) -> Cow<'_, [u8]> {
    match depth {
        BitDepth::Sixteen => Cow::Owned(plane.chunks_exact(2).map(|sample| sample[0]).collect()),
        BitDepth::One | BitDepth::Eight => Cow::Borrowed(plane),
    }
}
