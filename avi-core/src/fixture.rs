//! Builder for small synthetic AVI files used by tests

use byteorder::{LittleEndian, WriteBytesExt};
use std::io::{self, Write};

/// How `idx1` offsets are written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Idx1Offsets {
    /// From the start of the file
    Absolute,
    /// From the `movi` FourCC
    Relative,
}

/// Describes a single-video-stream AVI file
#[derive(Debug, Clone)]
pub struct AviFixture {
    compression: [u8; 4],
    bit_count: u16,
    width: i32,
    height: i32,
    microsec_per_frame: u32,
    sample_size: u32,
    frames: Vec<Vec<u8>>,
    extension_frames: Vec<Vec<u8>>,
    palette: Option<Vec<[u8; 3]>>,
    idx1: Option<Idx1Offsets>,
    audio_first: bool,
    odml_index: bool,
    rec_lists: bool,
    junk: bool,
}

/// Header position and size of every data chunk of a `movi` list
type ChunkList = Vec<([u8; 4], usize, u32)>;

impl AviFixture {
    pub fn new(compression: [u8; 4], bit_count: u16, width: i32, height: i32) -> Self {
        Self {
            compression,
            bit_count,
            width,
            height,
            microsec_per_frame: 40_000,
            sample_size: 0,
            frames: Vec::new(),
            extension_frames: Vec::new(),
            palette: None,
            idx1: None,
            audio_first: false,
            odml_index: false,
            rec_lists: false,
            junk: false,
        }
    }

    pub fn microsec_per_frame(mut self, value: u32) -> Self {
        self.microsec_per_frame = value;
        self
    }

    pub fn sample_size(mut self, value: u32) -> Self {
        self.sample_size = value;
        self
    }

    /// Frame payloads of the first RIFF segment; an empty payload is a blank frame
    pub fn frames(mut self, frames: Vec<Vec<u8>>) -> Self {
        self.frames = frames;
        self
    }

    /// Frame payloads of a following `RIFF AVIX` segment
    pub fn extension_frames(mut self, frames: Vec<Vec<u8>>) -> Self {
        self.extension_frames = frames;
        self
    }

    pub fn palette(mut self, palette: Vec<[u8; 3]>) -> Self {
        self.palette = Some(palette);
        self
    }

    pub fn idx1(mut self, offsets: Idx1Offsets) -> Self {
        self.idx1 = Some(offsets);
        self
    }

    /// Puts an audio stream before the video stream and interleaves its chunks
    pub fn audio_first(mut self, value: bool) -> Self {
        self.audio_first = value;
        self
    }

    /// Writes `dmlh`, a super index and one `ix` chunk per segment
    pub fn odml_index(mut self, value: bool) -> Self {
        self.odml_index = value;
        self
    }

    /// Wraps every video chunk in a `LIST rec `
    pub fn rec_lists(mut self, value: bool) -> Self {
        self.rec_lists = value;
        self
    }

    /// Adds odd-sized `JUNK` chunks to `hdrl` and `movi`
    pub fn junk(mut self, value: bool) -> Self {
        self.junk = value;
        self
    }

    /// Data chunk tag of the video stream
    pub fn video_tag(&self) -> [u8; 4] {
        let stream = if self.audio_first { b'1' } else { b'0' };
        let kind = if self.compression == [0; 4] { *b"db" } else { *b"dc" };
        [b'0', stream, kind[0], kind[1]]
    }

    fn total_frames(&self) -> usize {
        self.frames.len() + self.extension_frames.len()
    }

    pub fn build(&self) -> io::Result<Vec<u8>> {
        let mut w = RiffWriter::default();
        let tag = self.video_tag();

        let riff = w.begin(b"RIFF")?;
        w.fourcc(b"AVI ")?;
        let hdrl = w.begin_list(b"hdrl")?;
        self.write_avih(&mut w)?;
        if self.junk {
            w.chunk(b"JUNK", &[0; 3])?;
        }
        if self.audio_first {
            write_audio_strl(&mut w)?;
        }
        let super_index = self.write_video_strl(&mut w, tag)?;
        if self.odml_index {
            let odml = w.begin_list(b"odml")?;
            let dmlh = w.begin(b"dmlh")?;
            w.u32(self.total_frames() as u32)?;
            w.zeros(244)?;
            w.end(dmlh)?;
            w.end(odml)?;
        }
        w.end(hdrl)?;

        let mut ix_chunks = Vec::new();
        let (list_pos, chunks) = self.write_movi(&mut w, &self.frames, tag, &mut ix_chunks)?;
        if let Some(offsets) = self.idx1 {
            let idx1 = w.begin(b"idx1")?;
            for (chunk_tag, pos, size) in &chunks {
                w.fourcc(chunk_tag)?;
                w.u32(0x10)?;
                let offset = match offsets {
                    Idx1Offsets::Absolute => *pos,
                    Idx1Offsets::Relative => pos - list_pos,
                };
                w.u32(offset as u32)?;
                w.u32(*size)?;
            }
            w.end(idx1)?;
        }
        w.end(riff)?;

        if !self.extension_frames.is_empty() {
            let avix = w.begin(b"RIFF")?;
            w.fourcc(b"AVIX")?;
            self.write_movi(&mut w, &self.extension_frames, tag, &mut ix_chunks)?;
            w.end(avix)?;
        }

        if let Some(entries) = super_index {
            for (i, (offset, size, duration)) in ix_chunks.into_iter().enumerate() {
                let entry = entries + 16 * i;
                w.patch_u64(entry, offset as u64)?;
                w.patch_u32(entry + 8, size)?;
                w.patch_u32(entry + 12, duration)?;
            }
        }
        Ok(w.buf)
    }

    fn write_avih(&self, w: &mut RiffWriter) -> io::Result<()> {
        let avih = w.begin(b"avih")?;
        w.u32(self.microsec_per_frame)?;
        w.u32(0)?;
        w.u32(0)?;
        w.u32(if self.idx1.is_some() { 0x10 } else { 0 })?;
        w.u32(self.frames.len() as u32)?;
        w.u32(0)?;
        w.u32(if self.audio_first { 2 } else { 1 })?;
        w.u32(0)?;
        w.u32(self.width.unsigned_abs())?;
        w.u32(self.height.unsigned_abs())?;
        w.zeros(16)?;
        w.end(avih)
    }

    /// Returns the position of the first super index entry
    fn write_video_strl(&self, w: &mut RiffWriter, tag: [u8; 4]) -> io::Result<Option<usize>> {
        let strl = w.begin_list(b"strl")?;

        let strh = w.begin(b"strh")?;
        w.fourcc(b"vids")?;
        w.fourcc(&self.compression)?;
        w.u32(0)?;
        w.u32(0)?;
        w.u32(0)?;
        w.u32(self.microsec_per_frame)?;
        w.u32(1_000_000)?;
        w.u32(0)?;
        w.u32(self.total_frames() as u32)?;
        w.u32(0)?;
        w.u32(0)?;
        w.u32(self.sample_size)?;
        w.zeros(8)?;
        w.end(strh)?;

        let strf = w.begin(b"strf")?;
        w.u32(40)?;
        w.i32(self.width)?;
        w.i32(self.height)?;
        w.u16(1)?;
        w.u16(self.bit_count)?;
        w.fourcc(&self.compression)?;
        w.u32(self.frames.first().map_or(0, |f| f.len() as u32))?;
        w.i32(0)?;
        w.i32(0)?;
        w.u32(self.palette.as_ref().map_or(0, |p| p.len() as u32))?;
        w.u32(0)?;
        for [r, g, b] in self.palette.iter().flatten() {
            w.buf.write_all(&[*b, *g, *r, 0])?;
        }
        w.end(strf)?;

        let super_index = if self.odml_index {
            let segments = 1 + usize::from(!self.extension_frames.is_empty());
            let indx = w.begin(b"indx")?;
            w.u16(4)?;
            w.u8(0)?;
            w.u8(0)?;
            w.u32(segments as u32)?;
            w.fourcc(&tag)?;
            w.zeros(12)?;
            let entries = w.buf.len();
            w.zeros(16 * segments)?;
            w.end(indx)?;
            Some(entries)
        } else {
            None
        };

        w.end(strl)?;
        Ok(super_index)
    }

    /// Writes a `movi` list. Returns the position of its FourCC and the
    /// header position of every data chunk, for `idx1`.
    fn write_movi(
        &self,
        w: &mut RiffWriter,
        frames: &[Vec<u8>],
        tag: [u8; 4],
        ix_chunks: &mut Vec<(usize, u32, u32)>,
    ) -> io::Result<(usize, ChunkList)> {
        let movi = w.begin_list(b"movi")?;
        let list_pos = movi + 4;
        if self.junk {
            w.chunk(b"JUNK", &[0; 3])?;
        }

        let ix_entries = if self.odml_index {
            let header = w.buf.len();
            let ix = w.begin(&[b'i', b'x', tag[0], tag[1]])?;
            w.u16(2)?;
            w.u8(0)?;
            w.u8(1)?;
            w.u32(frames.len() as u32)?;
            w.fourcc(&tag)?;
            w.u64(list_pos as u64)?;
            w.u32(0)?;
            let entries = w.buf.len();
            w.zeros(8 * frames.len())?;
            w.end(ix)?;
            ix_chunks.push((header, (w.buf.len() - header) as u32, frames.len() as u32));
            Some(entries)
        } else {
            None
        };

        let mut chunks = Vec::new();
        for (i, frame) in frames.iter().enumerate() {
            if self.audio_first {
                chunks.push((*b"00wb", w.buf.len(), 4));
                w.chunk(b"00wb", &[0; 4])?;
            }
            let rec = if self.rec_lists {
                Some(w.begin_list(b"rec ")?)
            } else {
                None
            };
            let pos = w.buf.len();
            w.chunk(&tag, frame)?;
            chunks.push((tag, pos, frame.len() as u32));
            if let Some(rec) = rec {
                w.end(rec)?;
            }
            if let Some(entries) = ix_entries {
                let delta_flag = if i == 0 { 0 } else { 0x8000_0000 };
                w.patch_u32(entries + 8 * i, (pos + 8 - list_pos) as u32)?;
                w.patch_u32(entries + 8 * i + 4, frame.len() as u32 | delta_flag)?;
            }
        }
        w.end(movi)?;
        Ok((list_pos, chunks))
    }
}

fn write_audio_strl(w: &mut RiffWriter) -> io::Result<()> {
    let strl = w.begin_list(b"strl")?;
    let strh = w.begin(b"strh")?;
    w.fourcc(b"auds")?;
    for value in [0, 0, 0, 0, 1, 44_100, 0, 0, 0, 0, 4] {
        w.u32(value)?;
    }
    w.zeros(8)?;
    w.end(strh)?;
    let strf = w.begin(b"strf")?;
    w.u16(1)?;
    w.u16(2)?;
    w.u32(44_100)?;
    w.u32(176_400)?;
    w.u16(4)?;
    w.u16(16)?;
    w.end(strf)?;
    w.end(strl)
}

#[derive(Debug, Default)]
struct RiffWriter {
    buf: Vec<u8>,
}

impl RiffWriter {
    fn fourcc(&mut self, tag: &[u8; 4]) -> io::Result<()> {
        self.buf.write_all(tag)
    }

    fn u8(&mut self, value: u8) -> io::Result<()> {
        self.buf.write_u8(value)
    }

    fn u16(&mut self, value: u16) -> io::Result<()> {
        self.buf.write_u16::<LittleEndian>(value)
    }

    fn u32(&mut self, value: u32) -> io::Result<()> {
        self.buf.write_u32::<LittleEndian>(value)
    }

    fn i32(&mut self, value: i32) -> io::Result<()> {
        self.buf.write_i32::<LittleEndian>(value)
    }

    fn u64(&mut self, value: u64) -> io::Result<()> {
        self.buf.write_u64::<LittleEndian>(value)
    }

    fn zeros(&mut self, len: usize) -> io::Result<()> {
        self.buf.write_all(&vec![0; len])
    }

    /// Starts a chunk; returns the position of its size field
    fn begin(&mut self, tag: &[u8; 4]) -> io::Result<usize> {
        self.fourcc(tag)?;
        let size_pos = self.buf.len();
        self.u32(0)?;
        Ok(size_pos)
    }

    fn begin_list(&mut self, list_type: &[u8; 4]) -> io::Result<usize> {
        let size_pos = self.begin(b"LIST")?;
        self.fourcc(list_type)?;
        Ok(size_pos)
    }

    /// Patches the size of the chunk started at `size_pos` and pads it
    fn end(&mut self, size_pos: usize) -> io::Result<()> {
        let size = self.buf.len() - size_pos - 4;
        self.patch_u32(size_pos, size as u32)?;
        if size % 2 == 1 {
            self.u8(0)?;
        }
        Ok(())
    }

    fn chunk(&mut self, tag: &[u8; 4], payload: &[u8]) -> io::Result<()> {
        let size_pos = self.begin(tag)?;
        self.buf.write_all(payload)?;
        self.end(size_pos)
    }

    fn patch_u32(&mut self, pos: usize, value: u32) -> io::Result<()> {
        (&mut self.buf[pos..pos + 4]).write_u32::<LittleEndian>(value)
    }

    fn patch_u64(&mut self, pos: usize, value: u64) -> io::Result<()> {
        (&mut self.buf[pos..pos + 8]).write_u64::<LittleEndian>(value)
    }
}
