//! Generic RIFF chunk traversal

use crate::{Error, FourCc, ParseContext, Result, SoftError};
use std::io::{Read, Seek};

/// Chunks start on even file positions
const PADDING_GRANULARITY: u64 = 2;

/// Reads the tag of the next chunk that starts before `end`.
///
/// Aligns to the padding granularity first and skips `JUNK` filler chunks.
/// Returns `None` once no complete chunk header fits before `end`.
pub fn read_type<R: Read + Seek>(ctx: &mut ParseContext<R>, end: u64) -> Result<Option<FourCc>> {
    let limit = end.min(ctx.file_size);
    loop {
        let mut pos = ctx.cursor.position()?;
        if pos % PADDING_GRANULARITY != 0 {
            pos += PADDING_GRANULARITY - pos % PADDING_GRANULARITY;
            ctx.cursor.seek(pos)?;
        }
        if pos + 8 > limit {
            return Ok(None);
        }
        let tag = ctx.cursor.read_fourcc()?;
        if tag != FourCc::JUNK {
            return Ok(Some(tag));
        }
        let size = ctx.cursor.read_u32()? as u64;
        ctx.cursor.seek(pos + 8 + size)?;
    }
}

/// Finds the next chunk of type `wanted` before `end` and hands its contents
/// to `handler`.
///
/// With `list_wrapped`, a `LIST` chunk is identified by its sub-type. The
/// handler receives the context (positioned at the chunk contents) and the
/// position after the chunk; it returns `false` to reject the chunk, in which
/// case the search goes on. On success the cursor is left after the chunk and
/// that position is returned.
///
/// A chunk overrunning `end` or the file is treated as truncation: a `movi`
/// list is clamped to the end of the file, anything else aborts the search
/// with a [`SoftError`].
pub fn find_chunk<R, F>(
    ctx: &mut ParseContext<R>,
    wanted: FourCc,
    list_wrapped: bool,
    end: u64,
    must_exist: bool,
    mut handler: F,
) -> Result<Option<u64>>
where
    R: Read + Seek,
    F: FnMut(&mut ParseContext<R>, u64) -> Result<bool>,
{
    loop {
        let Some(mut tag) = read_type(ctx, end)? else {
            if must_exist {
                return Err(Error::MissingChunk(wanted));
            }
            return Ok(None);
        };
        let size = ctx.cursor.read_u32()? as u64;
        let mut next_pos = ctx.cursor.position()? + size;

        if list_wrapped && tag == FourCc::LIST && ctx.cursor.position()? + 4 <= ctx.file_size {
            tag = ctx.cursor.read_fourcc()?;
        }

        if next_pos > end || next_pos > ctx.file_size {
            let message = format!("Broken or invalid AVI file: size of '{}' too large", tag);
            if wanted == FourCc::MOVI && tag == FourCc::MOVI {
                ctx.warn(format!("{message}, reading up to the end of the file"));
                next_pos = ctx.file_size;
            } else {
                return Err(SoftError::new(message).into());
            }
        }

        if tag == wanted {
            if handler(ctx, next_pos)? {
                ctx.cursor.seek(next_pos)?;
                return Ok(Some(next_pos));
            }
        } else {
            tracing::debug!("skip '{}'", tag);
        }
        ctx.cursor.seek(next_pos)?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{LittleEndian, WriteBytesExt};
    use std::io::{Cursor, Write};

    fn chunk(out: &mut Vec<u8>, tag: &[u8; 4], payload: &[u8]) {
        out.write_all(tag).unwrap();
        out.write_u32::<LittleEndian>(payload.len() as u32).unwrap();
        out.write_all(payload).unwrap();
        if payload.len() % 2 == 1 {
            out.push(0);
        }
    }

    fn context(bytes: Vec<u8>) -> ParseContext<Cursor<Vec<u8>>> {
        ParseContext::new(Cursor::new(bytes)).unwrap()
    }

    #[test]
    fn test_skips_junk_and_padding() {
        let mut bytes = Vec::new();
        chunk(&mut bytes, b"JUNK", &[0; 5]);
        chunk(&mut bytes, b"abcd", &[1, 2, 3]);
        chunk(&mut bytes, b"wxyz", &[9, 9]);
        let len = bytes.len() as u64;
        let mut ctx = context(bytes);

        let mut seen = Vec::new();
        let next = find_chunk(&mut ctx, FourCc(*b"wxyz"), false, len, true, |ctx, _| {
            seen.push(ctx.cursor.read_u8()?);
            Ok(true)
        })
        .unwrap();
        assert_eq!(next, Some(len));
        assert_eq!(seen, vec![9]);
    }

    #[test]
    fn test_unwraps_lists_and_honours_rejection() {
        let mut bytes = Vec::new();
        let mut first = b"strl".to_vec();
        first.push(1);
        chunk(&mut bytes, b"LIST", &first);
        let mut second = b"strl".to_vec();
        second.push(2);
        chunk(&mut bytes, b"LIST", &second);
        let len = bytes.len() as u64;
        let mut ctx = context(bytes);

        let mut accepted = None;
        find_chunk(&mut ctx, FourCc::STRL, true, len, true, |ctx, _| {
            let value = ctx.cursor.read_u8()?;
            accepted = Some(value);
            Ok(value == 2)
        })
        .unwrap();
        assert_eq!(accepted, Some(2));
    }

    #[test]
    fn test_missing_chunk() {
        let mut bytes = Vec::new();
        chunk(&mut bytes, b"abcd", &[0; 4]);
        let len = bytes.len() as u64;
        let mut ctx = context(bytes);

        let found = find_chunk(&mut ctx, FourCc::IDX1, false, len, false, |_, _| Ok(true));
        assert_eq!(found.unwrap(), None);

        ctx.cursor.seek(0).unwrap();
        let err = find_chunk(&mut ctx, FourCc::IDX1, false, len, true, |_, _| Ok(true));
        assert!(matches!(err, Err(Error::MissingChunk(tag)) if tag == FourCc::IDX1));
    }

    #[test]
    fn test_oversized_chunk_is_a_soft_error() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"idx1");
        bytes.write_u32::<LittleEndian>(1000).unwrap();
        bytes.extend_from_slice(&[0; 16]);
        let len = bytes.len() as u64;
        let mut ctx = context(bytes);

        let err = find_chunk(&mut ctx, FourCc::IDX1, false, len, false, |_, _| Ok(true)).unwrap_err();
        assert!(err.is_soft());
        assert!(err.to_string().contains("'idx1' too large"));
    }

    #[test]
    fn test_truncated_movi_is_clamped() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"LIST");
        bytes.write_u32::<LittleEndian>(5000).unwrap();
        bytes.extend_from_slice(b"movi");
        bytes.extend_from_slice(&[0; 20]);
        let len = bytes.len() as u64;
        let mut ctx = context(bytes);

        let mut handler_end = 0;
        let next = find_chunk(&mut ctx, FourCc::MOVI, true, u64::MAX, true, |_, end| {
            handler_end = end;
            Ok(true)
        })
        .unwrap();
        assert_eq!(next, Some(len));
        assert_eq!(handler_end, len);
        assert_eq!(ctx.diagnostics.len(), 1);
    }
}
