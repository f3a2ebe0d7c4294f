// Byte cursor for wire format decoding

use byteorder::{BigEndian, ByteOrder};

use crate::error::RtmpError;

/// Cursor over a byte slice
///
/// Every read fails with InvalidFormat when the slice is exhausted,
/// so truncated input surfaces as a decode error at the exact field.
pub struct ByteCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    /// Creates a cursor at the start of the buffer
    pub fn new(buf: &'a [u8]) -> ByteCursor<'a> {
        ByteCursor { buf, pos: 0 }
    }

    /// Reads n bytes, advancing the cursor
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], RtmpError> {
        if self.pos + n > self.buf.len() {
            return Err(RtmpError::invalid_format(format!(
                "unexpected end of data: wanted {} bytes, {} available",
                n,
                self.buf.len() - self.pos
            )));
        }

        let pos = self.pos;
        self.pos += n;

        Ok(&self.buf[pos..pos + n])
    }

    /// Reads the next byte without advancing the cursor
    pub fn peek_u8(&self) -> Result<u8, RtmpError> {
        if self.pos >= self.buf.len() {
            return Err(RtmpError::invalid_format(
                "unexpected end of data: wanted 1 byte",
            ));
        }

        Ok(self.buf[self.pos])
    }

    pub fn read_u8(&mut self) -> Result<u8, RtmpError> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, RtmpError> {
        Ok(BigEndian::read_u16(self.read_bytes(2)?))
    }

    pub fn read_i16(&mut self) -> Result<i16, RtmpError> {
        Ok(BigEndian::read_i16(self.read_bytes(2)?))
    }

    pub fn read_u24(&mut self) -> Result<u32, RtmpError> {
        Ok(BigEndian::read_u24(self.read_bytes(3)?))
    }

    /// Reads a signed 24-bit integer, sign-extended to i32
    pub fn read_i24(&mut self) -> Result<i32, RtmpError> {
        Ok(BigEndian::read_i24(self.read_bytes(3)?))
    }

    pub fn read_u32(&mut self) -> Result<u32, RtmpError> {
        Ok(BigEndian::read_u32(self.read_bytes(4)?))
    }

    pub fn read_f64(&mut self) -> Result<f64, RtmpError> {
        Ok(BigEndian::read_f64(self.read_bytes(8)?))
    }

    /// Reads a 4-byte code, such as a FourCC
    pub fn read_four_bytes(&mut self) -> Result<[u8; 4], RtmpError> {
        let b = self.read_bytes(4)?;
        Ok([b[0], b[1], b[2], b[3]])
    }

    /// Reads every remaining byte
    pub fn read_remaining(&mut self) -> &'a [u8] {
        let pos = self.pos;
        self.pos = self.buf.len();
        &self.buf[pos..]
    }

    /// Number of bytes left to read
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Returns true if the cursor is at the end
    pub fn ended(&self) -> bool {
        self.pos >= self.buf.len()
    }

    /// Current position from the start of the buffer
    pub fn position(&self) -> usize {
        self.pos
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_reads() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05];
        let mut cursor = ByteCursor::new(&data);

        assert_eq!(cursor.read_u8().unwrap(), 0x01);
        assert_eq!(cursor.read_u16().unwrap(), 0x0203);
        assert_eq!(cursor.remaining(), 2);
        assert_eq!(cursor.peek_u8().unwrap(), 0x04);
        assert_eq!(cursor.read_bytes(2).unwrap(), &[0x04, 0x05]);
        assert!(cursor.ended());
        assert!(cursor.read_u8().is_err());
    }

    #[test]
    fn test_cursor_signed_24() {
        let data = [0xFF, 0xFF, 0xFF, 0x00, 0x00, 0x01];
        let mut cursor = ByteCursor::new(&data);

        assert_eq!(cursor.read_i24().unwrap(), -1);
        assert_eq!(cursor.read_i24().unwrap(), 1);
    }

    #[test]
    fn test_cursor_truncated() {
        let data = [0x00, 0x01];
        let mut cursor = ByteCursor::new(&data);

        assert!(cursor.read_u32().is_err());
        // A failed read does not advance
        assert_eq!(cursor.read_u16().unwrap(), 1);
    }
}
