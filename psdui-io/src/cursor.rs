use crate::PsdError;

/// 大端序的顺序读取器。子游标保留在原始流中的基准偏移，错误信息始终报告绝对位置。
#[derive(Debug, Clone)]
pub struct BinaryCursor<'a> {
    data: &'a [u8],
    pos: usize,
    base: u64,
}

impl<'a> BinaryCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_base(data, 0)
    }

    pub fn with_base(data: &'a [u8], base: u64) -> Self {
        Self { data, pos: 0, base }
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// 在原始输入中的绝对偏移。
    #[inline]
    pub fn absolute_position(&self) -> u64 {
        self.base + self.pos as u64
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn set_position(&mut self, pos: usize) -> Result<(), PsdError> {
        if pos > self.data.len() {
            return Err(PsdError::Truncated {
                offset: self.base + pos as u64,
                needed: (pos - self.pos) as u64,
                available: self.remaining() as u64,
            });
        }
        self.pos = pos;
        Ok(())
    }

    pub fn skip(&mut self, count: usize) -> Result<(), PsdError> {
        self.ensure(count)?;
        self.pos += count;
        Ok(())
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8], PsdError> {
        self.ensure(count)?;
        let slice = &self.data[self.pos..self.pos + count];
        self.pos += count;
        Ok(slice)
    }

    /// 截取接下来的 `count` 字节作为独立游标，当前游标越过这段数据。
    pub fn sub_cursor(&mut self, count: usize) -> Result<BinaryCursor<'a>, PsdError> {
        let base = self.absolute_position();
        let slice = self.read_bytes(count)?;
        Ok(BinaryCursor::with_base(slice, base))
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], PsdError> {
        let bytes = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, PsdError> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, PsdError> {
        self.read_array().map(u16::from_be_bytes)
    }

    pub fn read_i16(&mut self) -> Result<i16, PsdError> {
        self.read_array().map(i16::from_be_bytes)
    }

    pub fn read_u32(&mut self) -> Result<u32, PsdError> {
        self.read_array().map(u32::from_be_bytes)
    }

    pub fn read_i32(&mut self) -> Result<i32, PsdError> {
        self.read_array().map(i32::from_be_bytes)
    }

    pub fn read_u64(&mut self) -> Result<u64, PsdError> {
        self.read_array().map(u64::from_be_bytes)
    }

    pub fn read_i64(&mut self) -> Result<i64, PsdError> {
        self.read_array().map(i64::from_be_bytes)
    }

    pub fn read_f64(&mut self) -> Result<f64, PsdError> {
        self.read_array().map(f64::from_be_bytes)
    }

    pub fn read_u16s(&mut self, count: usize) -> Result<Vec<u16>, PsdError> {
        self.ensure(count.saturating_mul(2))?;
        (0..count).map(|_| self.read_u16()).collect()
    }

    pub fn read_i32s(&mut self, count: usize) -> Result<Vec<i32>, PsdError> {
        self.ensure(count.saturating_mul(4))?;
        (0..count).map(|_| self.read_i32()).collect()
    }

    fn ensure(&self, count: usize) -> Result<(), PsdError> {
        if count > self.remaining() {
            return Err(PsdError::Truncated {
                offset: self.absolute_position(),
                needed: count as u64,
                available: self.remaining() as u64,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_big_endian_values() {
        let data = [0x12, 0x34, 0xff, 0xfe, 0x00, 0x00, 0x01, 0x00, 0x80];
        let mut cursor = BinaryCursor::new(&data);
        assert_eq!(cursor.read_u16().unwrap(), 0x1234);
        assert_eq!(cursor.read_i16().unwrap(), -2);
        assert_eq!(cursor.read_u32().unwrap(), 256);
        assert_eq!(cursor.read_u8().unwrap() as i8, -128);
        assert_eq!(cursor.remaining(), 0);
    }

    #[test]
    fn counted_reads_consume_all_values() {
        let data = [0, 1, 0, 2, 0, 3];
        let mut cursor = BinaryCursor::new(&data);
        assert_eq!(cursor.read_u16s(3).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn truncated_read_reports_offset_and_keeps_position() {
        let data = [1, 2, 3];
        let mut cursor = BinaryCursor::new(&data);
        cursor.skip(1).unwrap();
        let err = cursor.read_u32().unwrap_err();
        assert_eq!(
            err,
            PsdError::Truncated {
                offset: 1,
                needed: 4,
                available: 2
            }
        );
        assert_eq!(cursor.position(), 1);
    }

    #[test]
    fn sub_cursor_reports_absolute_offsets() {
        let data = [0u8; 10];
        let mut cursor = BinaryCursor::new(&data);
        cursor.skip(4).unwrap();
        let mut child = cursor.sub_cursor(2).unwrap();
        assert_eq!(cursor.position(), 6);
        child.read_u8().unwrap();
        let err = child.read_u16().unwrap_err();
        assert_eq!(err.offset(), 5);
    }

    #[test]
    fn set_position_allows_end_but_not_beyond() {
        let data = [0u8; 4];
        let mut cursor = BinaryCursor::new(&data);
        assert!(cursor.set_position(4).is_ok());
        assert!(cursor.set_position(5).is_err());
        cursor.set_position(0).unwrap();
        assert_eq!(cursor.read_i32().unwrap(), 0);
    }
}
