//! Top-level AVI parsing: headers, then the frame table

use crate::context::{MoviRegion, Region};
use crate::header::read_hdrl;
use crate::index::{
    movi_region, read_idx1, read_indx, scan_extensions, scan_movi, FrameRange, FrameTable,
    FrameTableEntry, FrameWindow, IndexKind,
};
use crate::walker::find_chunk;
use crate::{Error, FourCc, MainHeader, ParseContext, PixelFormat, Result, StreamHeader};
use std::io::{Read, Seek};

/// Result of parsing a file: headers, pixel format and frame table
#[derive(Debug, Clone)]
pub struct AviIndex {
    pub main_header: MainHeader,
    pub stream_header: StreamHeader,
    pub format: PixelFormat,
    /// Frames of the requested range, in presentation order
    pub frames: Vec<FrameTableEntry>,
    /// Frames of the video stream in the whole file
    pub total_frames: u64,
    pub microsec_per_frame: u64,
    pub index_kind: IndexKind,
    /// Non-fatal problems found while parsing
    pub diagnostics: Vec<String>,
}

/// Summary of an opened file
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AviInfo {
    pub width: u32,
    pub height: u32,
    pub bits_per_pixel: u16,
    pub compression: String,
    pub frame_count: usize,
    pub total_frames: u64,
    pub microsec_per_frame: u64,
    pub frames_per_second: Option<f64>,
    pub index_kind: IndexKind,
    pub variable_length: bool,
}

impl AviIndex {
    pub fn info(&self) -> AviInfo {
        let frames_per_second = if self.microsec_per_frame > 0 {
            Some(1e6 / self.microsec_per_frame as f64)
        } else {
            self.stream_header.frame_rate()
        };
        AviInfo {
            width: self.format.width,
            height: self.format.height,
            bits_per_pixel: self.format.bits_per_pixel,
            compression: self.format.compression_tag.to_string(),
            frame_count: self.frames.len(),
            total_frames: self.total_frames,
            microsec_per_frame: self.microsec_per_frame,
            frames_per_second,
            index_kind: self.index_kind,
            variable_length: self.format.is_variable_length(),
        }
    }
}

/// AVI parser for a range of frames
#[derive(Debug, Clone, Copy, Default)]
pub struct AviParser {
    range: FrameRange,
}

impl AviParser {
    pub fn new(range: FrameRange) -> Self {
        Self { range }
    }

    /// Parses the headers of `reader` and indexes the requested frames
    pub fn parse<R: Read + Seek>(&self, reader: R) -> Result<AviIndex> {
        let mut ctx = ParseContext::new(reader)?;
        let riff_end = read_riff_header(&mut ctx)?;

        find_chunk(&mut ctx, FourCc::HDRL, true, riff_end, true, read_hdrl)?;
        ctx.require_format()?;
        find_chunk(&mut ctx, FourCc::MOVI, true, riff_end, true, |ctx, end| {
            ctx.movi = Some(movi_region(ctx, end)?);
            Ok(true)
        })?;

        let (frames, index_kind, total_frames) = self.build_index(&mut ctx, riff_end)?;
        tracing::debug!(
            "{} of {} frames indexed ({:?})",
            frames.len(),
            total_frames,
            index_kind
        );

        let microsec_per_frame = ctx.microsec_per_frame();
        Ok(AviIndex {
            main_header: ctx.main_header.ok_or(Error::MissingChunk(FourCc::AVIH))?,
            stream_header: ctx.stream_header.ok_or(Error::MissingChunk(FourCc::STRH))?,
            format: ctx.format.ok_or(Error::NoVideoStream)?,
            frames,
            total_frames,
            microsec_per_frame,
            index_kind,
            diagnostics: ctx.diagnostics,
        })
    }

    /// Tries the OpenDML index, then `idx1`, then a scan of the data
    fn build_index<R: Read + Seek>(
        &self,
        ctx: &mut ParseContext<R>,
        riff_end: u64,
    ) -> Result<(Vec<FrameTableEntry>, IndexKind, u64)> {
        let movi = ctx.movi.ok_or(Error::MissingChunk(FourCc::MOVI))?;
        let header_total = match ctx.odml_total_frames {
            Some(total) if total > 0 => total as u64,
            _ => ctx.main_header.as_ref().map_or(0, |h| h.total_frames as u64),
        };

        let mut total = header_total;
        if let Some(indx) = ctx.stream.indx {
            let odml = read_odml_index(ctx, self.range, indx);
            if let Some((table, counted)) = ctx.soften(odml)? {
                total = counted;
                if !table.entries.is_empty() {
                    return Ok((table.entries, IndexKind::OpenDml, total));
                }
                ctx.warn("OpenDML index lists no frames of the video stream");
            }
        }
        let window = self.range.resolve(total);

        ctx.stream.frame_counter = 0;
        let mut table = FrameTable::new(window);
        ctx.cursor.seek(movi.end)?;
        let idx1 = find_chunk(ctx, FourCc::IDX1, false, riff_end, false, |ctx, end| {
            let start = ctx.cursor.position()?;
            read_idx1(ctx, &mut table, Region { start, end })
        });
        if ctx.soften(idx1)?.is_some() {
            scan_extensions(ctx, &mut table, riff_end)?;
            let total = total.max(ctx.stream.frame_counter);
            return Ok((table.entries, IndexKind::Idx1, total));
        }

        let entries = scan(ctx, window, movi, riff_end)?;
        let total = total.max(ctx.stream.frame_counter);
        Ok((entries, IndexKind::Scan, total))
    }
}

/// Linear scan of every `movi` list in the file
fn scan<R: Read + Seek>(
    ctx: &mut ParseContext<R>,
    window: FrameWindow,
    movi: MoviRegion,
    riff_end: u64,
) -> Result<Vec<FrameTableEntry>> {
    ctx.stream.frame_counter = 0;
    let mut table = FrameTable::new(window);
    scan_movi(ctx, &mut table, movi)?;
    scan_extensions(ctx, &mut table, riff_end)?;
    Ok(table.entries)
}

/// Counting pass over the OpenDML index, then the building pass
fn read_odml_index<R: Read + Seek>(
    ctx: &mut ParseContext<R>,
    range: FrameRange,
    indx: Region,
) -> Result<Option<(FrameTable, u64)>> {
    ctx.stream.frame_counter = 0;
    read_indx(ctx, &mut FrameTable::counting(), indx, 0)?;
    let total = ctx.stream.frame_counter;

    ctx.stream.frame_counter = 0;
    let mut table = FrameTable::new(range.resolve(total));
    read_indx(ctx, &mut table, indx, 0)?;
    Ok(Some((table, total)))
}

/// Checks the `RIFF AVI ` header; returns the end of the first segment
fn read_riff_header<R: Read + Seek>(ctx: &mut ParseContext<R>) -> Result<u64> {
    if ctx.file_size < 12 {
        return Err(Error::NotAvi);
    }
    let tag = ctx.cursor.read_fourcc()?;
    let size = ctx.cursor.read_u32()? as u64;
    let form = ctx.cursor.read_fourcc()?;
    if tag != FourCc::RIFF || form != FourCc::AVI {
        return Err(Error::NotAvi);
    }
    let end = 8 + size;
    if end > ctx.file_size {
        ctx.warn("Broken or invalid AVI file: RIFF size exceeds the file size");
        return Ok(ctx.file_size);
    }
    Ok(end)
}
