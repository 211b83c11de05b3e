//! Four-character codes used by RIFF/AVI

use std::fmt;

/// A four-character code, stored in file byte order
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FourCc(pub [u8; 4]);

impl FourCc {
    pub const RIFF: FourCc = FourCc(*b"RIFF");
    pub const AVI: FourCc = FourCc(*b"AVI ");
    pub const AVIX: FourCc = FourCc(*b"AVIX");
    pub const LIST: FourCc = FourCc(*b"LIST");
    pub const JUNK: FourCc = FourCc(*b"JUNK");
    pub const HDRL: FourCc = FourCc(*b"hdrl");
    pub const AVIH: FourCc = FourCc(*b"avih");
    pub const STRL: FourCc = FourCc(*b"strl");
    pub const STRH: FourCc = FourCc(*b"strh");
    pub const STRF: FourCc = FourCc(*b"strf");
    pub const INDX: FourCc = FourCc(*b"indx");
    pub const ODML: FourCc = FourCc(*b"odml");
    pub const DMLH: FourCc = FourCc(*b"dmlh");
    pub const MOVI: FourCc = FourCc(*b"movi");
    pub const REC: FourCc = FourCc(*b"rec ");
    pub const IDX1: FourCc = FourCc(*b"idx1");
    pub const VIDS: FourCc = FourCc(*b"vids");

    /// Builds a FourCC from the little-endian integer it was read as
    pub const fn from_u32(value: u32) -> Self {
        FourCc(value.to_le_bytes())
    }

    pub const fn as_u32(self) -> u32 {
        u32::from_le_bytes(self.0)
    }

    /// Data chunk tag of stream `stream`, e.g. `01dc` for stream 1.
    /// `None` above stream 99, which two digits cannot name.
    pub fn stream_chunk(stream: u32, suffix: &[u8; 2]) -> Option<Self> {
        if stream > 99 {
            return None;
        }
        Some(FourCc([
            b'0' + (stream / 10) as u8,
            b'0' + (stream % 10) as u8,
            suffix[0],
            suffix[1],
        ]))
    }
}

impl From<[u8; 4]> for FourCc {
    fn from(bytes: [u8; 4]) -> Self {
        FourCc(bytes)
    }
}

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
            for &b in &self.0 {
                write!(f, "{}", b as char)?;
            }
            Ok(())
        } else {
            // Numeric compression codes such as BI_RGB (0) or BI_JPEG (4)
            write!(f, "{:#x}", self.as_u32())
        }
    }
}

impl fmt::Debug for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCc({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_chunk_tags() {
        assert_eq!(FourCc::stream_chunk(0, b"db"), Some(FourCc(*b"00db")));
        assert_eq!(FourCc::stream_chunk(12, b"dc"), Some(FourCc(*b"12dc")));
        assert_eq!(FourCc::stream_chunk(99, b"db"), Some(FourCc(*b"99db")));
        assert_eq!(FourCc::stream_chunk(100, b"db"), None);
        assert_eq!(FourCc::stream_chunk(112, b"dc"), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(FourCc::MOVI.to_string(), "movi");
        assert_eq!(FourCc::from_u32(0).to_string(), "0x0");
        assert_eq!(FourCc::from_u32(4).to_string(), "0x4");
        assert_eq!(FourCc::from_u32(0x4646_4952), FourCc::RIFF);
    }
}
