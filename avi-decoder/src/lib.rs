//! AVI Decoder Library
//!
//! This library turns the frame table built by `avi-core` into pixel rasters:
//! fixed-point unpacking of raw RGB, grayscale and YUV frames, JPEG/PNG frames
//! through the `image` crate, and eager or lazy frame sequences on top.

pub mod decoder;
pub mod embedded;
pub mod mjpeg;
pub mod options;
pub mod progress;
pub mod raster;
pub mod reader;
pub mod source;
pub mod unpack;
pub mod yuv;

pub use decoder::FrameDecoder;
pub use options::OpenOptions;
pub use raster::{DecodedRaster, PixelBuffer, PixelKind};
pub use reader::{open, AviStack, StackFrames};
pub use source::{EagerFrameSource, FrameSource, LazyFrameSource};

/// Result type for avi-decoder operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for avi-decoder operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("AVI error: {0}")]
    Core(#[from] avi_core::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Frame ended prematurely")]
    FrameEndedPrematurely,

    #[error("Frame too small: {actual} bytes, {expected} expected")]
    FrameTooSmall { expected: usize, actual: usize },

    #[error("Out of memory decoding frame of {0} bytes")]
    OutOfMemory(usize),

    #[error("Frame size {width}x{height} too large")]
    FrameSizeOverflow { width: u32, height: u32 },

    #[error("Frame {0} out of range")]
    FrameOutOfRange(usize),

    #[error("No frames found")]
    NoFrames,

    #[error("No frames decoded: {0}")]
    NothingDecoded(String),
}
