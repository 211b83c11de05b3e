//! AVI Core Library
//!
//! This library provides the RIFF/AVI container plumbing: a little-endian
//! binary cursor, the chunk walker, header parsing into a pixel format
//! descriptor, and the frame index builder (OpenDML `indx`/`ix00`, AVI-1
//! `idx1`, or a linear scan of the `movi` data).

pub mod context;
pub mod cursor;
pub mod format;
pub mod fourcc;
pub mod header;
pub mod index;
pub mod parser;
pub mod walker;

#[cfg(any(test, feature = "fixtures"))]
pub mod fixture;

pub use context::{ParseContext, StreamHeaderState};
pub use cursor::BinaryCursor;
pub use format::{Compression, PixelFormat};
pub use fourcc::FourCc;
pub use header::{BitmapInfo, MainHeader, StreamHeader};
pub use index::{FrameRange, FrameTableEntry, FrameWindow, IndexKind};
pub use parser::{AviIndex, AviInfo, AviParser};

/// Result type for avi-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// A recoverable problem found while walking the file.
///
/// Soft errors carry a diagnostic message. The code that receives one decides
/// whether it is fatal (header parsing) or only worth recording (indexing).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct SoftError {
    pub message: String,
}

impl SoftError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Error types for avi-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not an AVI file")]
    NotAvi,

    #[error("Required item '{0}' not found")]
    MissingChunk(FourCc),

    #[error("No video stream found")]
    NoVideoStream,

    #[error("Unsupported compression: '{0}'")]
    UnsupportedCompression(FourCc),

    #[error("Unsupported bit depth {bits} for compression '{compression}'")]
    UnsupportedBitDepth { compression: FourCc, bits: u16 },

    #[error("Video stream with {0} (more than 1) frames/chunk not supported")]
    MultipleSamplesPerChunk(u32),

    #[error("Invalid frame size {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Width and height must be even for '{compression}' ({width}x{height})")]
    OddDimensions {
        compression: FourCc,
        width: u32,
        height: u32,
    },

    #[error("Stream number {0} above 99 not supported")]
    InvalidStreamNumber(u32),

    #[error("Invalid index: {0}")]
    InvalidIndex(String),

    #[error(transparent)]
    Soft(#[from] SoftError),
}

impl Error {
    /// Returns true for errors that only describe damaged or unusual data
    pub fn is_soft(&self) -> bool {
        matches!(self, Error::Soft(_) | Error::InvalidIndex(_))
    }
}
