use byteorder::{ByteOrder, LittleEndian};

use crate::error::{DecompileError, Result};

/// Fixed-width reader over a chunk image.
///
/// Values are decoded in little-endian order and byte-swapped afterwards when
/// the chunk declares itself big-endian.
pub struct ByteStream<'a> {
    buf: &'a [u8],
    pos: usize,
    big_endian: bool,
}

impl<'a> ByteStream<'a> {
    pub fn new(buf: &'a [u8], big_endian: bool) -> Self {
        Self {
            buf,
            pos: 0,
            big_endian,
        }
    }

    pub fn set_big_endian(&mut self, big_endian: bool) {
        self.big_endian = big_endian;
    }

    pub fn big_endian(&self) -> bool {
        self.big_endian
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    /// Copies up to `out.len()` bytes; returns how many were available.
    pub fn read(&mut self, out: &mut [u8]) -> usize {
        let n = out.len().min(self.remaining());
        out[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
        self.pos += n;
        n
    }

    /// Reads up to `n` raw bytes, stopping short at end of stream.
    pub fn read_chars(&mut self, n: usize) -> Vec<u8> {
        let mut out = vec![0u8; n.min(self.remaining())];
        let got = self.read(&mut out);
        out.truncate(got);
        out
    }

    fn fill<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut raw = [0u8; N];
        let got = self.read(&mut raw);
        if got < N {
            return Err(DecompileError::Truncated { wanted: N, got });
        }
        Ok(raw)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let [b] = self.fill::<1>()?;
        Ok(b)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let v = LittleEndian::read_u16(&self.fill::<2>()?);
        Ok(if self.big_endian { v.swap_bytes() } else { v })
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let v = LittleEndian::read_u32(&self.fill::<4>()?);
        Ok(if self.big_endian { v.swap_bytes() } else { v })
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let v = LittleEndian::read_u64(&self.fill::<8>()?);
        Ok(if self.big_endian { v.swap_bytes() } else { v })
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(self.read_u16()? as i16)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(self.read_u32()? as i32)
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(self.read_u64()? as i64)
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.read_u64()?))
    }

    /// Single-precision value widened and rounded to 3 decimal digits.
    pub fn read_float_as_double(&mut self) -> Result<f64> {
        let v = self.read_f32()? as f64;
        Ok((v * 1000.0).round() / 1000.0)
    }

    /// Reads a signed integer whose width comes from the chunk header.
    pub fn read_int(&mut self, size: u8) -> Result<i64> {
        match size {
            4 => Ok(self.read_i32()? as i64),
            8 => self.read_i64(),
            _ => Err(DecompileError::UnsupportedFormat(format!(
                "integer size {size}"
            ))),
        }
    }

    /// Reads a `size_t` whose width comes from the chunk header.
    pub fn read_size_t(&mut self, size: u8) -> Result<u64> {
        match size {
            4 => Ok(self.read_u32()? as u64),
            8 => self.read_u64(),
            _ => Err(DecompileError::UnsupportedFormat(format!(
                "size_t size {size}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::BigEndian;

    #[test]
    fn big_endian_round_trip() {
        let mut raw = [0u8; 4];
        BigEndian::write_u32(&mut raw, 0x1234_5678);

        let mut s = ByteStream::new(&raw, true);
        assert_eq!(s.read_u32().unwrap(), 0x1234_5678);

        let mut s = ByteStream::new(&raw, false);
        assert_eq!(s.read_u32().unwrap(), 0x7856_3412);
        assert_eq!(0x1234_5678u32.swap_bytes(), 0x7856_3412);
    }

    #[test]
    fn signed_reads() {
        let raw = (-2i32).to_le_bytes();
        let mut s = ByteStream::new(&raw, false);
        assert_eq!(s.read_i32().unwrap(), -2);

        let raw = (-300i16).to_be_bytes();
        let mut s = ByteStream::new(&raw, true);
        assert_eq!(s.read_i16().unwrap(), -300);
    }

    #[test]
    fn short_read_stops_at_available_count() {
        let raw = [1u8, 2, 3];
        let mut s = ByteStream::new(&raw, false);
        let mut out = [0u8; 8];
        assert_eq!(s.read(&mut out), 3);
        assert_eq!(&out[..3], &[1, 2, 3]);
        assert_eq!(s.remaining(), 0);

        let mut s = ByteStream::new(&raw, false);
        assert_eq!(s.read_chars(5), vec![1, 2, 3]);
    }

    #[test]
    fn oversized_char_reads_only_take_what_is_left() {
        let raw = [7u8, 8];
        let mut s = ByteStream::new(&raw, false);
        assert_eq!(s.read_chars(usize::MAX), vec![7, 8]);
        assert!(s.read_chars(usize::MAX).is_empty());
    }

    #[test]
    fn typed_read_reports_truncation() {
        let raw = [1u8, 2];
        let mut s = ByteStream::new(&raw, false);
        match s.read_u32() {
            Err(DecompileError::Truncated { wanted, got }) => {
                assert_eq!(wanted, 4);
                assert_eq!(got, 2);
            }
            other => panic!("expected truncation, got {other:?}"),
        }
    }

    #[test]
    fn floats() {
        let raw = 1.5f64.to_le_bytes();
        let mut s = ByteStream::new(&raw, false);
        assert_eq!(s.read_f64().unwrap(), 1.5);

        let raw = 0.1f32.to_be_bytes();
        let mut s = ByteStream::new(&raw, true);
        assert_eq!(s.read_float_as_double().unwrap(), 0.1);
    }

    #[test]
    fn header_sized_ints() {
        let mut raw = Vec::new();
        raw.extend_from_slice(&7u32.to_le_bytes());
        raw.extend_from_slice(&9u64.to_le_bytes());
        let mut s = ByteStream::new(&raw, false);
        assert_eq!(s.read_int(4).unwrap(), 7);
        assert_eq!(s.read_size_t(8).unwrap(), 9);
        assert!(s.read_int(3).is_err());
    }
}
