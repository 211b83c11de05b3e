//! Opening an AVI file as a frame stack

use crate::decoder::FrameDecoder;
use crate::options::OpenOptions;
use crate::raster::DecodedRaster;
use crate::source::{EagerFrameSource, FrameSource, LazyFrameSource};
use crate::{Error, Result};
use avi_core::{AviInfo, AviParser};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

/// Frames of an opened file
#[derive(Debug)]
pub enum StackFrames {
    Eager(EagerFrameSource),
    Lazy(LazyFrameSource),
}

/// An opened AVI file: metadata, frames and non-fatal diagnostics
#[derive(Debug)]
pub struct AviStack {
    info: AviInfo,
    frames: StackFrames,
    diagnostics: Vec<String>,
}

/// Parses `path` and decodes the frames selected by `options`.
///
/// Damaged files are read as far as possible; what went wrong is reported by
/// [`AviStack::error_text`]. Fails if no frame can be produced.
pub fn open(path: impl AsRef<Path>, options: &OpenOptions) -> Result<AviStack> {
    let path = path.as_ref();
    let mut reader = BufReader::new(File::open(path)?);
    let index = AviParser::new(options.frame_range()).parse(&mut reader)?;
    if index.frames.is_empty() {
        return Err(Error::NoFrames);
    }

    let info = index.info();
    tracing::info!(
        "{}: {}x{} '{}', {} of {} frames ({:?})",
        path.display(),
        info.width,
        info.height,
        info.compression,
        info.frame_count,
        info.total_frames,
        info.index_kind
    );

    let decoder = FrameDecoder::new(
        Arc::new(index.format),
        options.convert_to_gray,
        options.flip_vertical,
    );
    let mut diagnostics = index.diagnostics;
    let frames = if options.virtual_stack {
        StackFrames::Lazy(LazyFrameSource::new(path, index.frames, decoder))
    } else {
        let (source, error) = EagerFrameSource::decode(&mut reader, &index.frames, &decoder, options);
        if let Some(message) = error {
            tracing::warn!("{}", message);
            if source.is_empty() {
                return Err(Error::NothingDecoded(message));
            }
            diagnostics.push(message);
        }
        StackFrames::Eager(source)
    };

    Ok(AviStack {
        info,
        frames,
        diagnostics,
    })
}

impl AviStack {
    pub fn info(&self) -> &AviInfo {
        &self.info
    }

    pub fn frames(&self) -> &dyn FrameSource {
        match &self.frames {
            StackFrames::Eager(source) => source,
            StackFrames::Lazy(source) => source,
        }
    }

    pub fn len(&self) -> usize {
        self.frames().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self.frames, StackFrames::Lazy(_))
    }

    /// Frame `index`, counted from 0
    pub fn get(&self, index: usize) -> Result<DecodedRaster> {
        self.frames().get(index)
    }

    pub fn label(&self, index: usize) -> Option<String> {
        self.frames().label(index)
    }

    /// The lazy source, for deleting frames
    pub fn lazy_mut(&mut self) -> Option<&mut LazyFrameSource> {
        match &mut self.frames {
            StackFrames::Lazy(source) => Some(source),
            StackFrames::Eager(_) => None,
        }
    }

    pub fn into_frames(self) -> StackFrames {
        self.frames
    }

    /// Non-fatal problems found while opening
    pub fn diagnostics(&self) -> &[String] {
        &self.diagnostics
    }

    /// The most recent non-fatal problem, including failed lazy accesses
    pub fn error_text(&self) -> Option<String> {
        if let StackFrames::Lazy(source) = &self.frames {
            if let Some(message) = source.last_error() {
                return Some(message);
            }
        }
        self.diagnostics.last().cloned()
    }
}
