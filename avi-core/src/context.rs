//! Parser state threaded through the chunk walker, header parser and index builder

use crate::header::{MainHeader, StreamHeader};
use crate::{BinaryCursor, Error, FourCc, PixelFormat, Result};
use std::io::{Read, Seek};

/// Byte range `[start, end)` within the file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub start: u64,
    pub end: u64,
}

/// Location of a `movi` list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoviRegion {
    /// Position of the `movi` FourCC; AVI-1 relative offsets count from here
    pub list_pos: u64,
    /// First chunk inside the list
    pub data_start: u64,
    /// End of the list, clamped to the file size
    pub end: u64,
}

/// Per-stream bookkeeping while the headers and the index are read
#[derive(Debug, Clone, Default)]
pub struct StreamHeaderState {
    /// Number of the stream currently examined; becomes the video stream's
    /// number once a `vids` header is accepted
    pub stream_number: u32,
    /// `NNdb` and `NNdc` tags of the selected video stream
    pub chunk_tags: Option<[FourCc; 2]>,
    /// Running frame number, 1-based once the first frame is seen
    pub frame_counter: u64,
    /// The `indx` record of the selected stream, if any
    pub indx: Option<Region>,
}

impl StreamHeaderState {
    /// True if `tag` identifies a data chunk of the selected video stream
    pub fn is_video_chunk(&self, tag: FourCc) -> bool {
        self.chunk_tags.is_some_and(|tags| tags.contains(&tag))
    }
}

/// State shared by every stage of parsing one file
#[derive(Debug)]
pub struct ParseContext<R> {
    pub cursor: BinaryCursor<R>,
    pub file_size: u64,
    pub stream: StreamHeaderState,
    pub main_header: Option<MainHeader>,
    pub stream_header: Option<StreamHeader>,
    pub format: Option<PixelFormat>,
    /// Total frames from the OpenDML `dmlh` record
    pub odml_total_frames: Option<u32>,
    pub movi: Option<MoviRegion>,
    /// Non-fatal problems, in the order they were found
    pub diagnostics: Vec<String>,
}

impl<R: Read + Seek> ParseContext<R> {
    /// Creates a context positioned at the start of `reader`
    pub fn new(reader: R) -> Result<Self> {
        let mut cursor = BinaryCursor::new(reader);
        let file_size = cursor.stream_len()?;
        cursor.seek(0)?;
        Ok(Self {
            cursor,
            file_size,
            stream: StreamHeaderState::default(),
            main_header: None,
            stream_header: None,
            format: None,
            odml_total_frames: None,
            movi: None,
            diagnostics: Vec::new(),
        })
    }

    /// Records a non-fatal problem
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{}", message);
        self.diagnostics.push(message);
    }

    /// Downgrades soft errors to a recorded diagnostic and "not found".
    /// Any other error is passed through.
    pub fn soften<T>(&mut self, result: Result<Option<T>>) -> Result<Option<T>> {
        match result {
            Err(err) if err.is_soft() => {
                self.warn(err.to_string());
                Ok(None)
            }
            other => other,
        }
    }

    /// Microseconds per frame, falling back to the stream rate when the
    /// main header leaves it at zero
    pub fn microsec_per_frame(&self) -> u64 {
        let from_main = self.main_header.as_ref().map_or(0, |h| h.microsec_per_frame);
        if from_main > 0 {
            return from_main as u64;
        }
        match &self.stream_header {
            Some(strh) if strh.rate > 0 => {
                (1_000_000f64 * strh.scale as f64 / strh.rate as f64).round() as u64
            }
            _ => 0,
        }
    }

    /// Timestamp of 1-based frame `frame`
    pub fn timestamp_of(&self, frame: u64) -> i64 {
        (frame * self.microsec_per_frame()) as i64
    }

    pub(crate) fn require_format(&self) -> Result<&PixelFormat> {
        self.format.as_ref().ok_or(Error::NoVideoStream)
    }
}
