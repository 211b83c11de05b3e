//! Frame sequences: decoded up front, or decoded on each access

use crate::decoder::FrameDecoder;
use crate::options::OpenOptions;
use crate::progress::DecodeProgress;
use crate::raster::DecodedRaster;
use crate::{Error, Result};
use avi_core::FrameTableEntry;
use parking_lot::Mutex;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::{Path, PathBuf};

/// A sequence of video frames, indexed from 0
pub trait FrameSource: Send + Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Width of the decoded frames
    fn width(&self) -> u32;

    /// Height of the decoded frames
    fn height(&self) -> u32;

    /// Decodes (or clones) frame `index`
    fn get(&self, index: usize) -> Result<DecodedRaster>;

    /// Display label of frame `index`: its timestamp in seconds
    fn label(&self, index: usize) -> Option<String>;
}

/// Formats a timestamp as seconds with three decimals
pub fn timestamp_label(micros: i64) -> String {
    format!("{:.3} s", micros as f64 / 1e6)
}

/// All frames decoded into memory
#[derive(Debug, Clone)]
pub struct EagerFrameSource {
    width: u32,
    height: u32,
    frames: Vec<DecodedRaster>,
    timestamps: Vec<i64>,
}

impl EagerFrameSource {
    /// Decodes every entry in order.
    ///
    /// Decoding stops at the first failure, on allocation failure, or when
    /// the abort flag of `options` is raised. The frames decoded so far are
    /// kept and the reason is returned alongside.
    pub fn decode<R: Read + Seek>(
        reader: &mut R,
        entries: &[FrameTableEntry],
        decoder: &FrameDecoder,
        options: &OpenOptions,
    ) -> (Self, Option<String>) {
        let total = entries.len();
        let mut source = Self {
            width: decoder.format().width,
            height: decoder.format().height,
            frames: Vec::new(),
            timestamps: Vec::new(),
        };
        if source.frames.try_reserve_exact(total).is_err() {
            return (source, Some(format!("Out of memory: only 0 of {total} frames")));
        }

        let mut progress = DecodeProgress::new(total);
        for (i, entry) in entries.iter().enumerate() {
            if options.is_aborted() {
                return (source, Some(format!("Aborted after {i} of {total} frames")));
            }
            match decoder.decode(reader, entry) {
                Ok(raster) => {
                    source.frames.push(raster);
                    source.timestamps.push(entry.timestamp_micros);
                    progress.record(entry);
                }
                Err(Error::OutOfMemory(_)) => {
                    return (source, Some(format!("Out of memory: only {i} of {total} frames")));
                }
                Err(err) => {
                    let message = format!("{err} (frame at {})", timestamp_label(entry.timestamp_micros));
                    return (source, Some(message));
                }
            }
        }
        (source, None)
    }

    pub fn frames(&self) -> &[DecodedRaster] {
        &self.frames
    }

    pub fn into_frames(self) -> Vec<DecodedRaster> {
        self.frames
    }
}

impl FrameSource for EagerFrameSource {
    fn len(&self) -> usize {
        self.frames.len()
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn get(&self, index: usize) -> Result<DecodedRaster> {
        self.frames
            .get(index)
            .cloned()
            .ok_or(Error::FrameOutOfRange(index))
    }

    fn label(&self, index: usize) -> Option<String> {
        self.timestamps.get(index).map(|&ts| timestamp_label(ts))
    }
}

/// Frames decoded from the file on every access
#[derive(Debug)]
pub struct LazyFrameSource {
    path: PathBuf,
    entries: Vec<FrameTableEntry>,
    decoder: FrameDecoder,
    last_error: Mutex<Option<String>>,
}

impl LazyFrameSource {
    pub fn new(path: impl AsRef<Path>, entries: Vec<FrameTableEntry>, decoder: FrameDecoder) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            entries,
            decoder,
            last_error: Mutex::new(None),
        }
    }

    /// Decodes frame `index`, or returns `None`; the failure is kept as
    /// [`last_error`](Self::last_error)
    pub fn frame(&self, index: usize) -> Option<DecodedRaster> {
        self.get(index).ok()
    }

    fn read_frame(&self, entry: &FrameTableEntry) -> Result<DecodedRaster> {
        let mut reader = BufReader::new(File::open(&self.path)?);
        self.decoder.decode(&mut reader, entry)
    }

    /// Removes frame `index` from the sequence
    pub fn delete(&mut self, index: usize) -> Option<FrameTableEntry> {
        (index < self.entries.len()).then(|| self.entries.remove(index))
    }

    pub fn entries(&self) -> &[FrameTableEntry] {
        &self.entries
    }

    /// Message of the most recent failed access
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }
}

impl FrameSource for LazyFrameSource {
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn width(&self) -> u32 {
        self.decoder.format().width
    }

    fn height(&self) -> u32 {
        self.decoder.format().height
    }

    /// Decodes frame `index` from the file. A failed read is logged and
    /// kept as the last error.
    fn get(&self, index: usize) -> Result<DecodedRaster> {
        let entry = self.entries.get(index).ok_or(Error::FrameOutOfRange(index))?;
        self.read_frame(entry).inspect_err(|err| {
            let message = format!("Frame {}: {}", index + 1, err);
            tracing::warn!("{}", message);
            *self.last_error.lock() = Some(message);
        })
    }

    fn label(&self, index: usize) -> Option<String> {
        self.entries
            .get(index)
            .map(|entry| timestamp_label(entry.timestamp_micros))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use avi_core::{FourCc, PixelFormat};
    use std::io::Cursor;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    fn entry(offset: u64, frame: i64) -> FrameTableEntry {
        FrameTableEntry {
            file_offset: offset,
            byte_size: 4,
            timestamp_micros: frame * 40_000,
        }
    }

    fn decoder() -> FrameDecoder {
        let format = PixelFormat::resolve(FourCc(*b"Y800"), 8, 2, 2).unwrap();
        FrameDecoder::new(Arc::new(format), false, false)
    }

    #[test]
    fn test_labels() {
        assert_eq!(timestamp_label(40_000), "0.040 s");
        assert_eq!(timestamp_label(1_234_567), "1.235 s");
    }

    #[test]
    fn test_eager_decodes_all() {
        let data: Vec<u8> = (0..8).collect();
        let entries = [entry(0, 1), entry(4, 2)];
        let (source, error) = EagerFrameSource::decode(
            &mut Cursor::new(data),
            &entries,
            &decoder(),
            &OpenOptions::default(),
        );
        assert!(error.is_none());
        assert_eq!(source.len(), 2);
        assert_eq!((source.width(), source.height()), (2, 2));
        assert_eq!(source.label(1).as_deref(), Some("0.080 s"));
        assert!(matches!(source.get(2), Err(Error::FrameOutOfRange(2))));
    }

    #[test]
    fn test_eager_keeps_frames_before_failure() {
        let data: Vec<u8> = (0..10).collect();
        let entries = [entry(0, 1), entry(4, 2), entry(8, 3)];
        let (source, error) = EagerFrameSource::decode(
            &mut Cursor::new(data),
            &entries,
            &decoder(),
            &OpenOptions::default(),
        );
        assert_eq!(source.len(), 2);
        assert_eq!(error.unwrap(), "Frame ended prematurely (frame at 0.120 s)");
    }

    #[test]
    fn test_eager_abort() {
        let options = OpenOptions {
            abort: Some(Arc::new(AtomicBool::new(true))),
            ..OpenOptions::default()
        };
        let (source, error) =
            EagerFrameSource::decode(&mut Cursor::new(vec![0u8; 8]), &[entry(0, 1)], &decoder(), &options);
        assert!(source.is_empty());
        assert_eq!(error.unwrap(), "Aborted after 0 of 1 frames");
    }

    #[test]
    fn test_lazy_source_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<LazyFrameSource>();
        assert_send_sync::<EagerFrameSource>();
    }
}
