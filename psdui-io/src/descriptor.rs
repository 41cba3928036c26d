//! 附加信息块中使用的键值描述符（`Objc` 结构）的读写。

use crate::PsdError;
use crate::cursor::BinaryCursor;
use crate::writer::{put_bytes, put_f64, put_i32, put_i64, put_u8, put_u32};

const MAX_DEPTH: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum DescriptorValue {
    Long(i32),
    Double(f64),
    UnitFloat { unit: String, value: f64 },
    Bool(bool),
    Text(String),
    Enum { type_id: String, value: String },
    Object(Descriptor),
    List(Vec<DescriptorValue>),
    RawData(Vec<u8>),
    Class { name: String, class_id: String },
    LargeInteger(i64),
    Alias(Vec<u8>),
}

impl DescriptorValue {
    pub(crate) fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Double(value) | Self::UnitFloat { value, .. } => Some(*value),
            Self::Long(value) => Some(f64::from(*value)),
            _ => None,
        }
    }

    pub(crate) fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub(crate) fn as_object(&self) -> Option<&Descriptor> {
        match self {
            Self::Object(descriptor) => Some(descriptor),
            _ => None,
        }
    }

    pub(crate) fn as_raw(&self) -> Option<&[u8]> {
        match self {
            Self::RawData(data) => Some(data),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Descriptor {
    pub name: String,
    pub class_id: String,
    pub items: Vec<(String, DescriptorValue)>,
}

impl Descriptor {
    pub(crate) fn new(class_id: impl Into<String>) -> Self {
        Self {
            name: String::new(),
            class_id: class_id.into(),
            items: Vec::new(),
        }
    }

    pub(crate) fn with(mut self, key: impl Into<String>, value: DescriptorValue) -> Self {
        self.items.push((key.into(), value));
        self
    }

    pub(crate) fn get(&self, key: &str) -> Option<&DescriptorValue> {
        self.items
            .iter()
            .find(|(item_key, _)| item_key == key)
            .map(|(_, value)| value)
    }

    pub(crate) fn read(cursor: &mut BinaryCursor<'_>) -> Result<Self, PsdError> {
        read_descriptor(cursor, 0)
    }

    pub(crate) fn write(&self, out: &mut Vec<u8>) {
        write_unicode(out, &self.name);
        write_key(out, &self.class_id);
        put_u32(out, self.items.len() as u32);
        for (key, value) in &self.items {
            write_key(out, key);
            write_value(out, value);
        }
    }
}

fn read_descriptor(cursor: &mut BinaryCursor<'_>, depth: usize) -> Result<Descriptor, PsdError> {
    if depth > MAX_DEPTH {
        return Err(PsdError::malformed(
            cursor.absolute_position(),
            "描述符嵌套层级过深",
        ));
    }
    let name = read_unicode(cursor)?;
    let class_id = read_key(cursor)?;
    let count = cursor.read_u32()?;
    let mut items = Vec::new();
    for _ in 0..count {
        let key = read_key(cursor)?;
        let value = read_value(cursor, depth)?;
        items.push((key, value));
    }
    Ok(Descriptor {
        name,
        class_id,
        items,
    })
}

fn read_value(cursor: &mut BinaryCursor<'_>, depth: usize) -> Result<DescriptorValue, PsdError> {
    let offset = cursor.absolute_position();
    let os_type = cursor.read_array::<4>()?;
    let value = match &os_type {
        b"long" => DescriptorValue::Long(cursor.read_i32()?),
        b"doub" => DescriptorValue::Double(cursor.read_f64()?),
        b"UntF" => DescriptorValue::UnitFloat {
            unit: fourcc(cursor.read_array::<4>()?),
            value: cursor.read_f64()?,
        },
        b"bool" => DescriptorValue::Bool(cursor.read_u8()? != 0),
        b"TEXT" => DescriptorValue::Text(read_unicode(cursor)?),
        b"enum" => DescriptorValue::Enum {
            type_id: read_key(cursor)?,
            value: read_key(cursor)?,
        },
        b"Objc" | b"GlbO" => DescriptorValue::Object(read_descriptor(cursor, depth + 1)?),
        b"VlLs" => {
            let count = cursor.read_u32()?;
            let mut values = Vec::new();
            for _ in 0..count {
                values.push(read_value(cursor, depth + 1)?);
            }
            DescriptorValue::List(values)
        }
        b"tdta" => {
            let len = cursor.read_u32()? as usize;
            DescriptorValue::RawData(cursor.read_bytes(len)?.to_vec())
        }
        b"type" | b"GlbC" => DescriptorValue::Class {
            name: read_unicode(cursor)?,
            class_id: read_key(cursor)?,
        },
        b"comp" => DescriptorValue::LargeInteger(cursor.read_i64()?),
        b"alis" => {
            let len = cursor.read_u32()? as usize;
            DescriptorValue::Alias(cursor.read_bytes(len)?.to_vec())
        }
        other => {
            return Err(PsdError::malformed(
                offset,
                format!("未知的描述符值类型 {}", fourcc(*other)),
            ));
        }
    };
    Ok(value)
}

/// 长度为 0 表示紧随其后的 4 字节标识。
fn read_key(cursor: &mut BinaryCursor<'_>) -> Result<String, PsdError> {
    let len = match cursor.read_u32()? as usize {
        0 => 4,
        len => len,
    };
    Ok(String::from_utf8_lossy(cursor.read_bytes(len)?).into_owned())
}

/// `u32` 字符数 + UTF-16BE 字符，去掉末尾的空字符。
pub(crate) fn read_unicode(cursor: &mut BinaryCursor<'_>) -> Result<String, PsdError> {
    let count = cursor.read_u32()? as usize;
    let units = cursor.read_u16s(count)?;
    Ok(String::from_utf16_lossy(&units)
        .trim_end_matches('\0')
        .to_string())
}

fn fourcc(bytes: [u8; 4]) -> String {
    String::from_utf8_lossy(&bytes).into_owned()
}

pub(crate) fn write_unicode(out: &mut Vec<u8>, text: &str) {
    let units: Vec<u16> = text.encode_utf16().collect();
    put_u32(out, units.len() as u32);
    for unit in units {
        put_bytes(out, &unit.to_be_bytes());
    }
}

fn write_key(out: &mut Vec<u8>, key: &str) {
    if key.len() == 4 {
        put_u32(out, 0);
    } else {
        put_u32(out, key.len() as u32);
    }
    put_bytes(out, key.as_bytes());
}

fn write_value(out: &mut Vec<u8>, value: &DescriptorValue) {
    match value {
        DescriptorValue::Long(v) => {
            put_bytes(out, b"long");
            put_i32(out, *v);
        }
        DescriptorValue::Double(v) => {
            put_bytes(out, b"doub");
            put_f64(out, *v);
        }
        DescriptorValue::UnitFloat { unit, value } => {
            put_bytes(out, b"UntF");
            let mut tag = [b' '; 4];
            for (slot, byte) in tag.iter_mut().zip(unit.bytes()) {
                *slot = byte;
            }
            put_bytes(out, &tag);
            put_f64(out, *value);
        }
        DescriptorValue::Bool(v) => {
            put_bytes(out, b"bool");
            put_u8(out, u8::from(*v));
        }
        DescriptorValue::Text(text) => {
            put_bytes(out, b"TEXT");
            write_unicode(out, text);
        }
        DescriptorValue::Enum { type_id, value } => {
            put_bytes(out, b"enum");
            write_key(out, type_id);
            write_key(out, value);
        }
        DescriptorValue::Object(descriptor) => {
            put_bytes(out, b"Objc");
            descriptor.write(out);
        }
        DescriptorValue::List(values) => {
            put_bytes(out, b"VlLs");
            put_u32(out, values.len() as u32);
            for item in values {
                write_value(out, item);
            }
        }
        DescriptorValue::RawData(data) => {
            put_bytes(out, b"tdta");
            put_u32(out, data.len() as u32);
            put_bytes(out, data);
        }
        DescriptorValue::Class { name, class_id } => {
            put_bytes(out, b"type");
            write_unicode(out, name);
            write_key(out, class_id);
        }
        DescriptorValue::LargeInteger(v) => {
            put_bytes(out, b"comp");
            put_i64(out, *v);
        }
        DescriptorValue::Alias(data) => {
            put_bytes(out, b"alis");
            put_u32(out, data.len() as u32);
            put_bytes(out, data);
        }
    }
}
