//! Header records: `avih`, `strh`, `strf` and the OpenDML `dmlh`

use crate::context::Region;
use crate::walker::find_chunk;
use crate::{Error, FourCc, ParseContext, PixelFormat, Result};
use std::io::{Read, Seek};

/// `avih` flag: the file has an `idx1` index
pub const AVIF_HASINDEX: u32 = 0x10;

/// Stream-independent header (`avih`)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MainHeader {
    pub microsec_per_frame: u32,
    pub max_bytes_per_sec: u32,
    pub padding_granularity: u32,
    pub flags: u32,
    /// Frames in the first RIFF segment; may be stale in OpenDML files
    pub total_frames: u32,
    pub initial_frames: u32,
    pub streams: u32,
    pub suggested_buffer_size: u32,
    pub width: u32,
    pub height: u32,
}

impl MainHeader {
    pub fn read<R: Read + Seek>(ctx: &mut ParseContext<R>) -> Result<Self> {
        let c = &mut ctx.cursor;
        Ok(Self {
            microsec_per_frame: c.read_u32()?,
            max_bytes_per_sec: c.read_u32()?,
            padding_granularity: c.read_u32()?,
            flags: c.read_u32()?,
            total_frames: c.read_u32()?,
            initial_frames: c.read_u32()?,
            streams: c.read_u32()?,
            suggested_buffer_size: c.read_u32()?,
            width: c.read_u32()?,
            height: c.read_u32()?,
        })
    }

    pub fn has_index(&self) -> bool {
        self.flags & AVIF_HASINDEX != 0
    }
}

/// Video stream header (`strh`), read after its `vids` type tag
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StreamHeader {
    pub handler: FourCc,
    pub flags: u32,
    /// Priority (low word) and language (high word)
    pub priority_language: u32,
    pub initial_frames: u32,
    pub scale: u32,
    pub rate: u32,
    pub start: u32,
    pub length: u32,
    pub suggested_buffer_size: u32,
    pub quality: u32,
    pub sample_size: u32,
}

impl StreamHeader {
    pub fn read<R: Read + Seek>(ctx: &mut ParseContext<R>) -> Result<Self> {
        let c = &mut ctx.cursor;
        Ok(Self {
            handler: c.read_fourcc()?,
            flags: c.read_u32()?,
            priority_language: c.read_u32()?,
            initial_frames: c.read_u32()?,
            scale: c.read_u32()?,
            rate: c.read_u32()?,
            start: c.read_u32()?,
            length: c.read_u32()?,
            suggested_buffer_size: c.read_u32()?,
            quality: c.read_u32()?,
            sample_size: c.read_u32()?,
        })
    }

    /// Frames per second from `rate / scale`
    pub fn frame_rate(&self) -> Option<f64> {
        (self.scale > 0 && self.rate > 0).then(|| self.rate as f64 / self.scale as f64)
    }
}

/// BITMAPINFOHEADER stored in the video stream's `strf`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitmapInfo {
    pub size: u32,
    pub width: i32,
    pub height: i32,
    pub planes: u16,
    pub bit_count: u16,
    pub compression: FourCc,
    pub size_image: u32,
    pub x_pels_per_meter: i32,
    pub y_pels_per_meter: i32,
    pub clr_used: u32,
    pub clr_important: u32,
}

impl BitmapInfo {
    pub fn read<R: Read + Seek>(ctx: &mut ParseContext<R>) -> Result<Self> {
        let c = &mut ctx.cursor;
        Ok(Self {
            size: c.read_u32()?,
            width: c.read_i32()?,
            height: c.read_i32()?,
            planes: c.read_u16()?,
            bit_count: c.read_u16()?,
            compression: c.read_fourcc()?,
            size_image: c.read_u32()?,
            x_pels_per_meter: c.read_i32()?,
            y_pels_per_meter: c.read_i32()?,
            clr_used: c.read_u32()?,
            clr_important: c.read_u32()?,
        })
    }
}

/// Contents of `LIST hdrl`: the main header, then the first video stream
pub fn read_hdrl<R: Read + Seek>(ctx: &mut ParseContext<R>, end: u64) -> Result<bool> {
    find_chunk(ctx, FourCc::AVIH, false, end, true, |ctx, _| {
        let main = MainHeader::read(ctx)?;
        tracing::debug!(
            "avih: {} frames, {} us/frame, has index: {}",
            main.total_frames,
            main.microsec_per_frame,
            main.has_index()
        );
        ctx.main_header = Some(main);
        Ok(true)
    })?;

    if find_chunk(ctx, FourCc::STRL, true, end, false, read_strl)?.is_none() {
        return Err(Error::NoVideoStream);
    }

    let odml = find_chunk(ctx, FourCc::ODML, true, end, false, |ctx, end| {
        find_chunk(ctx, FourCc::DMLH, false, end, false, |ctx, _| {
            ctx.odml_total_frames = Some(ctx.cursor.read_u32()?);
            Ok(true)
        })?;
        Ok(true)
    });
    ctx.soften(odml)?;
    Ok(true)
}

/// Contents of one `LIST strl`. Rejects the list unless it holds a video
/// stream, so that the search moves on to the next stream.
pub fn read_strl<R: Read + Seek>(ctx: &mut ParseContext<R>, end: u64) -> Result<bool> {
    if find_chunk(ctx, FourCc::STRH, false, end, false, read_strh)?.is_none() {
        return Ok(false);
    }
    find_chunk(ctx, FourCc::STRF, false, end, true, |ctx, end| read_strf(ctx, end))?;

    let indx = find_chunk(ctx, FourCc::INDX, false, end, false, |ctx, end| {
        let start = ctx.cursor.position()?;
        ctx.stream.indx = Some(Region { start, end });
        Ok(true)
    });
    ctx.soften(indx)?;
    Ok(true)
}

/// Reads a stream header; non-video streams are counted and rejected
pub fn read_strh<R: Read + Seek>(ctx: &mut ParseContext<R>, _end: u64) -> Result<bool> {
    let stream_type = ctx.cursor.read_fourcc()?;
    if stream_type != FourCc::VIDS {
        tracing::debug!(
            "non-video stream '{}' #{} skipped",
            stream_type,
            ctx.stream.stream_number
        );
        ctx.stream.stream_number += 1;
        return Ok(false);
    }

    let header = StreamHeader::read(ctx)?;
    if header.sample_size > 1 {
        return Err(Error::MultipleSamplesPerChunk(header.sample_size));
    }
    let number = ctx.stream.stream_number;
    let tags = FourCc::stream_chunk(number, b"db").zip(FourCc::stream_chunk(number, b"dc"));
    let (uncompressed, compressed) = tags.ok_or(Error::InvalidStreamNumber(number))?;
    ctx.stream.chunk_tags = Some([uncompressed, compressed]);
    tracing::debug!("video stream #{} handler '{}'", number, header.handler);
    ctx.stream_header = Some(header);
    Ok(true)
}

/// Reads the BITMAPINFOHEADER and palette into the pixel format descriptor
pub fn read_strf<R: Read + Seek>(ctx: &mut ParseContext<R>, end: u64) -> Result<bool> {
    let start = ctx.cursor.position()?;
    let info = BitmapInfo::read(ctx)?;
    let width = info.width.unsigned_abs();
    let mut format = PixelFormat::resolve(info.compression, info.bit_count, width, info.height)?;

    if format.needs_palette() {
        let full = 1usize << format.bits_per_pixel;
        let wanted = match info.clr_used as usize {
            0 => full,
            n => n.min(full),
        };
        let palette_start = start + info.size as u64;
        let available = (end.saturating_sub(palette_start) / 4) as usize;
        let count = wanted.min(available);
        if count > 0 {
            ctx.cursor.seek(palette_start)?;
            let mut palette = Vec::with_capacity(count);
            for _ in 0..count {
                let bgr0 = ctx.cursor.read_bytes(4)?;
                palette.push([bgr0[2], bgr0[1], bgr0[0]]);
            }
            format.palette = Some(palette);
        }
    }

    tracing::debug!(
        "strf: {}x{} {} bit '{}' top-down={}",
        format.width,
        format.height,
        format.bits_per_pixel,
        format.compression_tag,
        format.top_down
    );
    ctx.format = Some(format);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::AviFixture;
    use crate::Compression;
    use std::io::Cursor;

    fn parse_headers(bytes: Vec<u8>) -> Result<ParseContext<Cursor<Vec<u8>>>> {
        let mut ctx = ParseContext::new(Cursor::new(bytes))?;
        ctx.cursor.seek(12)?;
        let size = ctx.file_size;
        find_chunk(&mut ctx, FourCc::HDRL, true, size, true, read_hdrl)?;
        Ok(ctx)
    }

    #[test]
    fn test_reads_main_and_stream_headers() {
        let bytes = AviFixture::new(*b"Y800", 8, 4, 4)
            .microsec_per_frame(40_000)
            .frames(vec![vec![0; 16]; 2])
            .build()
            .unwrap();
        let ctx = parse_headers(bytes).unwrap();

        let main = ctx.main_header.as_ref().unwrap();
        assert_eq!(main.microsec_per_frame, 40_000);
        assert_eq!(main.total_frames, 2);
        assert_eq!((main.width, main.height), (4, 4));

        let format = ctx.format.as_ref().unwrap();
        assert_eq!(format.compression, Compression::Gray8);
        assert!(format.top_down);
        assert_eq!(format.scan_line_stride, 4);
        assert_eq!(ctx.stream.chunk_tags, Some([FourCc(*b"00db"), FourCc(*b"00dc")]));
    }

    #[test]
    fn test_skips_audio_stream_before_video() {
        let bytes = AviFixture::new(*b"Y800", 8, 4, 4)
            .audio_first(true)
            .frames(vec![vec![0; 16]])
            .build()
            .unwrap();
        let ctx = parse_headers(bytes).unwrap();
        assert_eq!(ctx.stream.stream_number, 1);
        assert_eq!(ctx.stream.chunk_tags, Some([FourCc(*b"01db"), FourCc(*b"01dc")]));
    }

    #[test]
    fn test_reads_palette() {
        let palette: Vec<[u8; 3]> = (0..4u8).map(|i| [i, 10 + i, 20 + i]).collect();
        let bytes = AviFixture::new([0; 4], 8, 4, 2)
            .palette(palette.clone())
            .frames(vec![vec![0; 8]])
            .build()
            .unwrap();
        let ctx = parse_headers(bytes).unwrap();
        let format = ctx.format.as_ref().unwrap();
        assert_eq!(format.palette.as_deref(), Some(&palette[..]));
        assert!(!format.top_down);
    }

    #[test]
    fn test_rejects_multiple_samples_per_chunk() {
        let bytes = AviFixture::new(*b"Y800", 8, 4, 4)
            .sample_size(2)
            .frames(vec![vec![0; 16]])
            .build()
            .unwrap();
        let err = parse_headers(bytes).unwrap_err();
        assert!(matches!(err, Error::MultipleSamplesPerChunk(2)));
    }

    #[test]
    fn test_rejects_unsupported_compression() {
        let bytes = AviFixture::new(*b"DIVX", 24, 4, 4)
            .frames(vec![vec![0; 48]])
            .build()
            .unwrap();
        let err = parse_headers(bytes).unwrap_err();
        assert_eq!(err.to_string(), "Unsupported compression: 'DIVX'");
    }

    #[test]
    fn test_reads_odml_total_frames() {
        let bytes = AviFixture::new(*b"Y800", 8, 4, 4)
            .odml_index(true)
            .frames(vec![vec![1; 16]; 3])
            .build()
            .unwrap();
        let ctx = parse_headers(bytes).unwrap();
        assert_eq!(ctx.odml_total_frames, Some(3));
        assert!(ctx.stream.indx.is_some());
    }

    #[test]
    fn test_rejects_stream_number_above_99() {
        let bytes = AviFixture::new(*b"Y800", 8, 4, 4)
            .frames(vec![vec![0; 16]])
            .build()
            .unwrap();
        let strh = bytes.windows(4).position(|w| w == b"strh").unwrap() as u64;
        let mut ctx = ParseContext::new(Cursor::new(bytes)).unwrap();
        ctx.cursor.seek(strh + 8).unwrap();
        ctx.stream.stream_number = 100;

        let size = ctx.file_size;
        let err = read_strh(&mut ctx, size).unwrap_err();
        assert!(matches!(err, Error::InvalidStreamNumber(100)));
        assert_eq!(ctx.stream.chunk_tags, None);
    }
}
