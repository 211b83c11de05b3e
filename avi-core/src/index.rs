//! Frame table construction
//!
//! Three sources are supported, in order of preference: the OpenDML
//! `indx`/`ix00` hierarchy, the AVI-1 `idx1` chunk, and a linear scan of the
//! `movi` lists (including any `RIFF AVIX` extension segments).

use crate::context::{MoviRegion, Region};
use crate::walker::{find_chunk, read_type};
use crate::{Error, FourCc, ParseContext, Result, SoftError};
use std::io::{Read, Seek};

const AVI_INDEX_OF_INDEXES: u8 = 0x00;
const AVI_INDEX_OF_CHUNKS: u8 = 0x01;
/// Size of the header shared by `indx` and `ixNN` records
const INDEX_HEADER_SIZE: u64 = 24;
/// Bit 31 of an `ixNN` entry size marks a delta frame
const INDEX_SIZE_MASK: u32 = 0x7FFF_FFFF;
const MAX_INDEX_DEPTH: u32 = 4;
const IDX1_ENTRY_SIZE: u64 = 16;
/// Number of `idx1` records tried when guessing how offsets are stored
const IDX1_PROBES: usize = 4;
const WRAP: u64 = 1 << 32;

/// One retained video frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTableEntry {
    /// Position of the frame data (after the chunk header)
    pub file_offset: u64,
    pub byte_size: u32,
    pub timestamp_micros: i64,
}

/// Where the frame table came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IndexKind {
    OpenDml,
    Idx1,
    Scan,
}

/// Frames requested by the caller, as 1-based frame numbers.
///
/// `last == 0` reads to the end; a negative `last` counts back from the total
/// number of frames in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRange {
    pub first: u64,
    pub last: i64,
}

impl Default for FrameRange {
    fn default() -> Self {
        Self { first: 1, last: 0 }
    }
}

impl FrameRange {
    pub fn new(first: u64, last: i64) -> Self {
        Self { first, last }
    }

    /// Resolves the range against the total frame count
    pub fn resolve(&self, total: u64) -> FrameWindow {
        let last = match self.last {
            0 => None,
            n if n > 0 => Some(n as u64),
            n => Some((total as i64 + n).max(0) as u64),
        };
        FrameWindow {
            first: self.first.max(1),
            last,
        }
    }
}

/// A resolved [`FrameRange`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameWindow {
    pub first: u64,
    pub last: Option<u64>,
}

impl FrameWindow {
    pub const ALL: FrameWindow = FrameWindow {
        first: 1,
        last: None,
    };

    pub fn contains(&self, frame: u64) -> bool {
        frame >= self.first && self.last.map_or(true, |last| frame <= last)
    }

    /// True once no frame after `frame` can be in the window
    pub fn passed(&self, frame: u64) -> bool {
        self.last.is_some_and(|last| frame >= last)
    }
}

/// Frame table under construction
#[derive(Debug)]
pub struct FrameTable {
    pub entries: Vec<FrameTableEntry>,
    pub window: FrameWindow,
    counting: bool,
}

impl FrameTable {
    pub fn new(window: FrameWindow) -> Self {
        Self {
            entries: Vec::new(),
            window,
            counting: false,
        }
    }

    /// A table that only advances the frame counter
    pub fn counting() -> Self {
        Self {
            counting: true,
            ..Self::new(FrameWindow::ALL)
        }
    }

    /// Counts one video chunk and keeps it if it is in the window.
    /// Zero-size chunks are blank frames: counted, never kept.
    fn record<R: Read + Seek>(&mut self, ctx: &mut ParseContext<R>, position: u64, size: u32) {
        ctx.stream.frame_counter += 1;
        let frame = ctx.stream.frame_counter;
        if self.counting || size == 0 || !self.window.contains(frame) {
            return;
        }
        self.entries.push(FrameTableEntry {
            file_offset: position,
            byte_size: size,
            timestamp_micros: ctx.timestamp_of(frame),
        });
    }

    fn done<R>(&self, ctx: &ParseContext<R>) -> bool {
        !self.counting && self.window.passed(ctx.stream.frame_counter)
    }
}

/// Location of a `movi` list whose sub-type was just read
pub fn movi_region<R: Read + Seek>(ctx: &mut ParseContext<R>, end: u64) -> Result<MoviRegion> {
    let data_start = ctx.cursor.position()?;
    Ok(MoviRegion {
        list_pos: data_start - 4,
        data_start,
        end,
    })
}

/// Reads an OpenDML index record (`indx` or `ixNN`) spanning `region`
pub fn read_indx<R: Read + Seek>(
    ctx: &mut ParseContext<R>,
    table: &mut FrameTable,
    region: Region,
    depth: u32,
) -> Result<()> {
    if region.start + INDEX_HEADER_SIZE > region.end {
        return Err(Error::InvalidIndex("index record too short".into()));
    }
    ctx.cursor.seek(region.start)?;
    let entry_size = ctx.cursor.read_u16()?;
    let _sub_type = ctx.cursor.read_u8()?;
    let index_type = ctx.cursor.read_u8()?;
    let count = ctx.cursor.read_u32()? as u64;
    let chunk_id = ctx.cursor.read_fourcc()?;
    let base = ctx.cursor.read_u64()?;
    let _reserved = ctx.cursor.read_u32()?;

    match index_type {
        AVI_INDEX_OF_INDEXES => {
            if entry_size != 4 {
                return Err(Error::InvalidIndex(format!(
                    "super index entries of {entry_size} dwords, expected 4"
                )));
            }
            if depth >= MAX_INDEX_DEPTH {
                return Err(Error::InvalidIndex("index nested too deeply".into()));
            }
            for i in 0..count {
                let entry = region.start + INDEX_HEADER_SIZE + i * 16;
                if entry + 16 > region.end {
                    break;
                }
                ctx.cursor.seek(entry)?;
                let offset = ctx.cursor.read_u64()?;
                let _size = ctx.cursor.read_u32()?;
                let _duration = ctx.cursor.read_u32()?;
                let Some(start) = offset.checked_add(8).filter(|&s| s <= ctx.file_size) else {
                    return Err(SoftError::new(format!(
                        "Broken or invalid AVI file: sub-index at {offset:#x} beyond the end of the file"
                    ))
                    .into());
                };

                ctx.cursor.seek(offset)?;
                let tag = ctx.cursor.read_fourcc()?;
                let size = ctx.cursor.read_u32()? as u64;
                tracing::debug!("sub-index '{}' at {:#x}, {} bytes", tag, offset, size);
                let end = (start + size).min(ctx.file_size);
                read_indx(ctx, table, Region { start, end }, depth + 1)?;
                if table.done(ctx) {
                    break;
                }
            }
        }
        AVI_INDEX_OF_CHUNKS => {
            if entry_size != 2 {
                return Err(Error::InvalidIndex(format!(
                    "chunk index entries of {entry_size} dwords, expected 2"
                )));
            }
            if !ctx.stream.is_video_chunk(chunk_id) {
                return Err(Error::InvalidIndex(format!(
                    "index of '{chunk_id}' found for the video stream"
                )));
            }
            for i in 0..count {
                if region.start + INDEX_HEADER_SIZE + (i + 1) * 8 > region.end {
                    ctx.warn(format!("Index for '{chunk_id}' truncated after {i} of {count} entries"));
                    break;
                }
                let relative = ctx.cursor.read_u32()? as u64;
                let size = ctx.cursor.read_u32()? & INDEX_SIZE_MASK;
                let position = base.checked_add(relative).ok_or_else(|| {
                    Error::InvalidIndex(format!("chunk offset {relative:#x} overflows base {base:#x}"))
                })?;
                table.record(ctx, position, size);
                if table.done(ctx) {
                    break;
                }
            }
        }
        other => {
            return Err(Error::InvalidIndex(format!(
                "unsupported index type {other:#x}"
            )));
        }
    }
    Ok(())
}

/// Reads an `idx1` chunk spanning `region`.
///
/// Returns `false` if it lists no chunk of the video stream. Fails with a
/// soft error when none of the first records points at a video chunk, under
/// either offset convention.
pub fn read_idx1<R: Read + Seek>(
    ctx: &mut ParseContext<R>,
    table: &mut FrameTable,
    region: Region,
) -> Result<bool> {
    let movi = ctx.movi.ok_or(Error::MissingChunk(FourCc::MOVI))?;

    ctx.cursor.seek(region.start)?;
    let mut records = Vec::new();
    let mut pos = region.start;
    while pos + IDX1_ENTRY_SIZE <= region.end {
        let tag = ctx.cursor.read_fourcc()?;
        let _flags = ctx.cursor.read_u32()?;
        let offset = ctx.cursor.read_u32()? as u64;
        let size = ctx.cursor.read_u32()?;
        if ctx.stream.is_video_chunk(tag) {
            records.push((offset, size));
        }
        pos += IDX1_ENTRY_SIZE;
    }
    if records.is_empty() {
        tracing::debug!("idx1 has no entries for the video stream");
        return Ok(false);
    }

    let base = probe_idx1_base(ctx, &records, movi)?
        .ok_or_else(|| SoftError::new("Unusable idx1 index: offsets do not point at video chunks"))?;

    let unwrap = ctx.file_size > WRAP;
    record_idx1(ctx, table, &records, base, unwrap);
    Ok(true)
}

/// Adds the video records of `idx1` to the table. With `unwrap`, positions
/// are kept ascending by undoing 32-bit wraparound.
fn record_idx1<R: Read + Seek>(
    ctx: &mut ParseContext<R>,
    table: &mut FrameTable,
    records: &[(u64, u32)],
    base: u64,
    unwrap: bool,
) {
    let mut previous = 0;
    for &(offset, size) in records {
        let mut header = base + offset;
        if unwrap {
            header = unwrap_offset(header, previous);
            previous = header;
        }
        table.record(ctx, header + 8, size);
        if table.done(ctx) {
            break;
        }
    }
}

/// Finds whether `idx1` offsets count from the file start or from the `movi`
/// FourCC, by checking the first records against the video chunk tags.
fn probe_idx1_base<R: Read + Seek>(
    ctx: &mut ParseContext<R>,
    records: &[(u64, u32)],
    movi: MoviRegion,
) -> Result<Option<u64>> {
    for &(offset, _) in records.iter().take(IDX1_PROBES) {
        for base in [0, movi.list_pos] {
            let pos = base + offset;
            if pos + 4 > ctx.file_size {
                continue;
            }
            ctx.cursor.seek(pos)?;
            let tag = ctx.cursor.read_fourcc()?;
            if ctx.stream.is_video_chunk(tag) {
                tracing::debug!(
                    "idx1 offsets are {}",
                    if base == 0 { "absolute" } else { "relative to movi" }
                );
                return Ok(Some(base));
            }
        }
    }
    Ok(None)
}

/// Undoes 32-bit wraparound of an `idx1` position in files over 4 GiB:
/// adds 2^32 until the position is not before `previous`.
pub fn unwrap_offset(mut position: u64, previous: u64) -> u64 {
    while position < previous {
        position += WRAP;
    }
    position
}

/// Walks one `movi` list, recording the video chunks. Descends into
/// `LIST rec ` groups and stops at a chunk running past the end of the file.
pub fn scan_movi<R: Read + Seek>(
    ctx: &mut ParseContext<R>,
    table: &mut FrameTable,
    movi: MoviRegion,
) -> Result<()> {
    ctx.cursor.seek(movi.data_start)?;
    while let Some(tag) = read_type(ctx, movi.end)? {
        let size = ctx.cursor.read_u32()?;
        let data = ctx.cursor.position()?;
        let next = data + size as u64;

        // A group whose sub-type is cut off falls through to the overrun check
        if tag == FourCc::LIST
            && data + 4 <= ctx.file_size
            && ctx.cursor.read_fourcc()? == FourCc::REC
        {
            continue;
        }
        if next > ctx.file_size {
            ctx.warn(format!(
                "Broken or invalid AVI file: chunk '{}' at {:#x} runs past the end of the file",
                tag,
                data - 8
            ));
            break;
        }
        if ctx.stream.is_video_chunk(tag) {
            table.record(ctx, data, size);
            if table.done(ctx) {
                break;
            }
        }
        ctx.cursor.seek(next)?;
    }
    Ok(())
}

/// Scans the `movi` lists of the `RIFF AVIX` segments following `riff_end`
pub fn scan_extensions<R: Read + Seek>(
    ctx: &mut ParseContext<R>,
    table: &mut FrameTable,
    riff_end: u64,
) -> Result<()> {
    let mut pos = riff_end;
    while !table.done(ctx) {
        ctx.cursor.seek(pos)?;
        let file_size = ctx.file_size;
        let found = find_chunk(ctx, FourCc::RIFF, false, file_size, false, |ctx, end| {
            let form = ctx.cursor.read_fourcc()?;
            if form != FourCc::AVIX {
                tracing::debug!("skip RIFF '{}'", form);
                return Ok(false);
            }
            let movi = find_chunk(ctx, FourCc::MOVI, true, end, false, |ctx, end| {
                let region = movi_region(ctx, end)?;
                scan_movi(ctx, table, region)?;
                Ok(true)
            });
            ctx.soften(movi)?;
            Ok(true)
        });
        match ctx.soften(found)? {
            Some(next) => pos = next,
            None => break,
        }
    }
    Ok(())
}
