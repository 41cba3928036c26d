//! PackBits 风格的逐行游程编码。

use crate::PsdError;
use crate::cursor::BinaryCursor;

/// 从游标中解码，直到填满 `out`。
pub fn decode_into(cursor: &mut BinaryCursor<'_>, out: &mut [u8]) -> Result<(), PsdError> {
    let mut written = 0usize;
    while written < out.len() {
        let offset = cursor.absolute_position();
        let control = cursor
            .read_u8()
            .map_err(|_| exhausted(offset, written, out.len()))? as i8;
        match control {
            -128 => {}
            0..=127 => {
                let count = control as usize + 1;
                if written + count > out.len() {
                    return Err(overrun(offset, count, out.len() - written));
                }
                let literal = cursor
                    .read_bytes(count)
                    .map_err(|_| exhausted(offset, written, out.len()))?;
                out[written..written + count].copy_from_slice(literal);
                written += count;
            }
            _ => {
                let count = 1 - control as isize;
                let count = count as usize;
                if written + count > out.len() {
                    return Err(overrun(offset, count, out.len() - written));
                }
                let value = cursor
                    .read_u8()
                    .map_err(|_| exhausted(offset, written, out.len()))?;
                out[written..written + count].fill(value);
                written += count;
            }
        }
    }
    Ok(())
}

/// 解码一段完整的游程数据，期望输出长度为 `expected`。
pub fn decode(data: &[u8], expected: usize) -> Result<Vec<u8>, PsdError> {
    let mut cursor = BinaryCursor::new(data);
    let mut out = vec![0u8; expected];
    decode_into(&mut cursor, &mut out)?;
    Ok(out)
}

/// 编码单行数据。连续两个及以上相同字节编码为重复段，其余编码为字面段。
pub fn encode_row(row: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(row.len() + row.len() / 128 + 1);
    let mut i = 0usize;
    while i < row.len() {
        let mut run = 1usize;
        while i + run < row.len() && run < 128 && row[i + run] == row[i] {
            run += 1;
        }
        if run >= 2 {
            out.push((1 - run as i16) as i8 as u8);
            out.push(row[i]);
            i += run;
            continue;
        }

        let start = i;
        i += 1;
        while i < row.len() && i - start < 128 {
            if i + 2 < row.len() && row[i] == row[i + 1] && row[i] == row[i + 2] {
                break;
            }
            i += 1;
        }
        out.push((i - start - 1) as u8);
        out.extend_from_slice(&row[start..i]);
    }
    out
}

fn exhausted(offset: u64, written: usize, expected: usize) -> PsdError {
    PsdError::InvalidRunLength {
        offset,
        message: format!("源数据在游程中途耗尽（已输出 {written}/{expected} 字节）"),
    }
}

fn overrun(offset: u64, count: usize, room: usize) -> PsdError {
    PsdError::InvalidRunLength {
        offset,
        message: format!("游程长度 {count} 超出目标剩余空间 {room}"),
    }
}
