use psdui_core::document::{Color, TextAttributes, TextJustification};

use crate::PsdError;
use crate::cursor::BinaryCursor;
use crate::descriptor::{Descriptor, DescriptorValue};
use crate::engine_data;
use crate::writer::{put_f64, put_u16, put_u32};

const TYPE_TOOL_VERSION: u16 = 1;
const TEXT_VERSION: u16 = 50;
const DESCRIPTOR_VERSION: u32 = 16;
const WARP_VERSION: u16 = 1;

/// 解析 `TySh` 文字块。变换矩阵只用其纵向缩放换算实际字号。
pub(crate) fn read_type_tool(cursor: &mut BinaryCursor<'_>) -> Result<TextAttributes, PsdError> {
    let offset = cursor.absolute_position();
    let version = cursor.read_u16()?;
    if version != TYPE_TOOL_VERSION {
        return Err(PsdError::malformed(offset, format!("不支持的文字块版本 {version}")));
    }
    let mut transform = [0.0f64; 6];
    for value in &mut transform {
        *value = cursor.read_f64()?;
    }
    let offset = cursor.absolute_position();
    let text_version = cursor.read_u16()?;
    let descriptor_version = cursor.read_u32()?;
    if text_version != TEXT_VERSION || descriptor_version != DESCRIPTOR_VERSION {
        return Err(PsdError::malformed(
            offset,
            format!("不支持的文字描述符版本 {text_version}/{descriptor_version}"),
        ));
    }

    let descriptor = Descriptor::read(cursor)?;
    let content = descriptor
        .get("Txt ")
        .and_then(DescriptorValue::as_text)
        .ok_or_else(|| PsdError::malformed(offset, "文字描述符缺少 Txt 字段"))?
        .replace('\r', "\n");

    let mut text = TextAttributes::new(content);
    if let Some(raw) = descriptor.get("EngineData").and_then(DescriptorValue::as_raw) {
        let summary = engine_data::scan(raw);
        if let Some(name) = summary.font_name() {
            text.font_name = name.to_string();
        }
        if let Some(size) = summary.font_size {
            let scale = transform[3];
            let size = if scale.is_finite() && scale > 0.0 {
                size * scale
            } else {
                size
            };
            text.font_size = size as f32;
        }
        if let Some(code) = summary.justification {
            text.justification = TextJustification::from_raw(code);
        }
        if let Some([a, r, g, b]) = summary.fill_color {
            text.fill_color = Color::from_unit(r, g, b, a);
        }
    }
    Ok(text)
}

pub(crate) fn write_type_tool(out: &mut Vec<u8>, text: &TextAttributes) {
    put_u16(out, TYPE_TOOL_VERSION);
    for value in [1.0, 0.0, 0.0, 1.0, 0.0, 0.0] {
        put_f64(out, value);
    }

    put_u16(out, TEXT_VERSION);
    put_u32(out, DESCRIPTOR_VERSION);
    Descriptor::new("TxLr")
        .with("Txt ", DescriptorValue::Text(text.content.replace('\n', "\r")))
        .with(
            "EngineData",
            DescriptorValue::RawData(engine_data::render(text)),
        )
        .write(out);

    put_u16(out, WARP_VERSION);
    put_u32(out, DESCRIPTOR_VERSION);
    Descriptor::new("warp")
        .with(
            "warpStyle",
            DescriptorValue::Enum {
                type_id: "warpStyle".to_string(),
                value: "warpNone".to_string(),
            },
        )
        .write(out);

    // 文字边界：left, top, right, bottom
    for _ in 0..4 {
        put_f64(out, 0.0);
    }
}
