//! Frame decoder: reads one frame table entry and produces a raster

use crate::embedded::decode_embedded;
use crate::raster::DecodedRaster;
use crate::unpack::{try_alloc, unpack};
use crate::{Error, Result};
use avi_core::{FrameTableEntry, PixelFormat};
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;

/// Decodes frames of one video stream
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    format: Arc<PixelFormat>,
    convert_to_gray: bool,
    flip_vertical: bool,
}

impl FrameDecoder {
    pub fn new(format: Arc<PixelFormat>, convert_to_gray: bool, flip_vertical: bool) -> Self {
        Self {
            format,
            convert_to_gray,
            flip_vertical,
        }
    }

    pub fn format(&self) -> &PixelFormat {
        &self.format
    }

    /// Reads and decodes the frame at `entry`
    pub fn decode<R: Read + Seek>(
        &self,
        reader: &mut R,
        entry: &FrameTableEntry,
    ) -> Result<DecodedRaster> {
        let mut data = try_alloc::<u8>(entry.byte_size as usize)?;
        reader.seek(SeekFrom::Start(entry.file_offset))?;
        reader.read_exact(&mut data).map_err(|err| match err.kind() {
            io::ErrorKind::UnexpectedEof => Error::FrameEndedPrematurely,
            _ => Error::Io(err),
        })?;
        self.decode_bytes(&data)
    }

    /// Decodes the contents of one data chunk
    pub fn decode_bytes(&self, data: &[u8]) -> Result<DecodedRaster> {
        let top_down = self.format.top_down ^ self.flip_vertical;
        if self.format.is_variable_length() {
            decode_embedded(&self.format, data, self.convert_to_gray, !top_down)
        } else {
            unpack(&self.format, data, self.convert_to_gray, top_down)
        }
    }
}
