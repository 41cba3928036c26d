use psdui_core::document::{BitDepth, Compression};
use tracing::trace;

use crate::PsdError;
use crate::cursor::BinaryCursor;
use crate::rle;

/// 游程编码的最大膨胀倍数：2 字节（控制字节 + 值）最多展开为 128 字节。
const MAX_RUN_EXPANSION: usize = 64;

/// `available` 字节的通道数据最多能解码出的平面长度。
pub(crate) fn plane_budget(available: usize) -> usize {
    available.saturating_mul(MAX_RUN_EXPANSION)
}

/// 读取一个通道平面：2 字节压缩标记，随后是原始数据或逐行游程数据。
///
/// `cursor` 应只覆盖该通道声明的字节范围；`columns` 为采样列数，
/// 16 位深度时每行实际字节数为 `columns * 2`。
pub fn load_channel_plane(
    cursor: &mut BinaryCursor<'_>,
    rows: usize,
    columns: usize,
    depth: BitDepth,
) -> Result<(Compression, Vec<u8>), PsdError> {
    let row_bytes = columns.saturating_mul(depth.bytes_per_sample());
    let offset = cursor.absolute_position();
    let tag = cursor.read_u16()?;
    let compression =
        Compression::from_raw(tag).ok_or(PsdError::UnsupportedCompression { offset, mode: tag })?;

    let plane_len = rows.saturating_mul(row_bytes);
    let plane = match compression {
        Compression::Raw => cursor.read_bytes(plane_len)?.to_vec(),
        Compression::Rle => {
            // 行长度表只用于确认行数，行边界由列预算自行界定。
            let _row_lengths = cursor.read_u16s(rows)?;
            if plane_len > plane_budget(cursor.remaining()) {
                return Err(PsdError::InvalidRunLength {
                    offset,
                    message: format!(
                        "平面需要 {plane_len} 字节，剩余 {} 字节的游程数据无法展开到该长度",
                        cursor.remaining()
                    ),
                });
            }
            let mut plane = vec![0u8; plane_len];
            if row_bytes > 0 {
                for row in plane.chunks_mut(row_bytes) {
                    rle::decode_into(cursor, row)?;
                }
            }
            plane
        }
    };
    trace!(offset, rows, row_bytes, ?compression, "通道平面已解码");
    Ok((compression, plane))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_plane_is_copied_verbatim() {
        let mut data = vec![0, 0];
        let pixels: Vec<u8> = (0..12).collect();
        data.extend(&pixels);
        let mut cursor = BinaryCursor::new(&data);
        let (compression, plane) = load_channel_plane(&mut cursor, 3, 2, BitDepth::Sixteen).unwrap();
        assert_eq!(compression, Compression::Raw);
        assert_eq!(plane, pixels);
        assert_eq!(cursor.remaining(), 0);
    }

    #[test]
    fn rle_rows_are_decoded_independently() {
        let rows = [vec![1u8, 1, 1, 1], vec![1, 2, 3, 4]];
        let mut data = vec![0, 1];
        let encoded: Vec<Vec<u8>> = rows.iter().map(|row| rle::encode_row(row)).collect();
        for row in &encoded {
            data.extend((row.len() as u16).to_be_bytes());
        }
        for row in &encoded {
            data.extend(row);
        }
        let mut cursor = BinaryCursor::new(&data);
        let (compression, plane) = load_channel_plane(&mut cursor, 2, 4, BitDepth::Eight).unwrap();
        assert_eq!(compression, Compression::Rle);
        assert_eq!(plane, vec![1, 1, 1, 1, 1, 2, 3, 4]);
    }

    #[test]
    fn unknown_compression_tag_is_rejected() {
        let data = [0, 2, 0, 0];
        let mut cursor = BinaryCursor::with_base(&data, 100);
        let err = load_channel_plane(&mut cursor, 1, 1, BitDepth::Eight).unwrap_err();
        assert_eq!(
            err,
            PsdError::UnsupportedCompression {
                offset: 100,
                mode: 2
            }
        );
    }

    #[test]
    fn plane_larger_than_run_data_can_expand_is_rejected() {
        // 一行、一个最长重复段：最多展开 128 字节
        let data = [0, 1, 0, 2, 0x81, 7];
        let err = load_channel_plane(&mut BinaryCursor::new(&data), 1, 1 << 31, BitDepth::Eight).unwrap_err();
        assert!(matches!(err, PsdError::InvalidRunLength { offset: 0, .. }));

        let (_, plane) = load_channel_plane(&mut BinaryCursor::new(&data), 1, 128, BitDepth::Eight).unwrap();
        assert_eq!(plane, vec![7; 128]);
    }

    #[test]
    fn oversized_raw_plane_is_truncated() {
        let data = [0, 0, 1, 2, 3];
        let err = load_channel_plane(&mut BinaryCursor::new(&data), 1 << 20, 1 << 20, BitDepth::Sixteen).unwrap_err();
        assert!(matches!(err, PsdError::Truncated { .. }));
    }

    #[test]
    fn empty_plane_only_consumes_the_tag() {
        let data = [0, 1];
        let mut cursor = BinaryCursor::new(&data);
        let (_, plane) = load_channel_plane(&mut cursor, 0, 5, BitDepth::Eight).unwrap();
        assert!(plane.is_empty());
    }
}
