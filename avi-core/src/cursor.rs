//! Little-endian reader over a random-access byte source

use crate::FourCc;
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{self, Read, Seek, SeekFrom};

/// Binary cursor used by the chunk walker, header parser and index builder
#[derive(Debug)]
pub struct BinaryCursor<R> {
    inner: R,
}

impl<R: Read + Seek> BinaryCursor<R> {
    /// Wraps a reader
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn read_u8(&mut self) -> io::Result<u8> {
        self.inner.read_u8()
    }

    pub fn read_u16(&mut self) -> io::Result<u16> {
        self.inner.read_u16::<LittleEndian>()
    }

    pub fn read_u32(&mut self) -> io::Result<u32> {
        self.inner.read_u32::<LittleEndian>()
    }

    pub fn read_i32(&mut self) -> io::Result<i32> {
        self.inner.read_i32::<LittleEndian>()
    }

    /// Reads a 64-bit value stored as the low word followed by the high word
    pub fn read_u64(&mut self) -> io::Result<u64> {
        let low = self.read_u32()? as u64;
        let high = self.read_u32()? as u64;
        Ok((high << 32) | low)
    }

    pub fn read_fourcc(&mut self) -> io::Result<FourCc> {
        let mut tag = [0u8; 4];
        self.inner.read_exact(&mut tag)?;
        Ok(FourCc(tag))
    }

    /// Reads exactly `len` bytes
    pub fn read_bytes(&mut self, len: usize) -> io::Result<Vec<u8>> {
        let mut data = vec![0u8; len];
        self.inner.read_exact(&mut data)?;
        Ok(data)
    }

    pub fn seek(&mut self, pos: u64) -> io::Result<()> {
        self.inner.seek(SeekFrom::Start(pos))?;
        Ok(())
    }

    pub fn skip(&mut self, len: u64) -> io::Result<()> {
        self.inner.seek(SeekFrom::Current(len as i64))?;
        Ok(())
    }

    pub fn position(&mut self) -> io::Result<u64> {
        self.inner.stream_position()
    }

    /// Total length of the source; leaves the position unchanged
    pub fn stream_len(&mut self) -> io::Result<u64> {
        let pos = self.position()?;
        let end = self.inner.seek(SeekFrom::End(0))?;
        self.seek(pos)?;
        Ok(end)
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_little_endian_reads() {
        let bytes = vec![
            0x34, 0x12, // u16
            0x78, 0x56, 0x34, 0x12, // u32
            0x01, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, // u64 low, high
            b'm', b'o', b'v', b'i',
        ];
        let mut cursor = BinaryCursor::new(Cursor::new(bytes));

        assert_eq!(cursor.read_u16().unwrap(), 0x1234);
        assert_eq!(cursor.read_u32().unwrap(), 0x1234_5678);
        assert_eq!(cursor.read_u64().unwrap(), 0x0000_0002_0000_0001);
        assert_eq!(cursor.read_fourcc().unwrap(), FourCc::MOVI);
        assert_eq!(cursor.position().unwrap(), 18);
        assert_eq!(cursor.stream_len().unwrap(), 18);
    }

    #[test]
    fn test_short_read_is_an_error() {
        let mut cursor = BinaryCursor::new(Cursor::new(vec![1u8, 2, 3]));
        let err = cursor.read_u32().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
