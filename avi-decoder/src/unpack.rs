//! Unpacking of fixed-length frames: raw RGB, grayscale and YUV

use crate::raster::DecodedRaster;
use crate::yuv::{bgr_to_gray, rgb_to_argb, yuv_to_argb};
use crate::{Error, Result};
use avi_core::{Compression, PixelFormat};

/// Byte offsets of the components in a 4-byte 4:2:2 macropixel
#[derive(Debug, Clone, Copy)]
struct PackedLayout {
    y0: usize,
    u: usize,
    y1: usize,
    v: usize,
}

const YUY2: PackedLayout = PackedLayout { y0: 0, u: 1, y1: 2, v: 3 };
const UYVY: PackedLayout = PackedLayout { y0: 1, u: 0, y1: 3, v: 2 };
const YVYU: PackedLayout = PackedLayout { y0: 0, u: 3, y1: 2, v: 1 };

/// Allocates a zeroed buffer, reporting allocation failure as an error
pub(crate) fn try_alloc<T: Clone + Default>(len: usize) -> Result<Vec<T>> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|_| Error::OutOfMemory(len.saturating_mul(std::mem::size_of::<T>())))?;
    buffer.resize(len, T::default());
    Ok(buffer)
}

/// Number of pixels in a `width` x `height` frame
pub(crate) fn pixel_count(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .ok_or(Error::FrameSizeOverflow { width, height })
}

/// Frame rows in display order
struct Rows<'a> {
    data: &'a [u8],
    stride: usize,
    height: usize,
    top_down: bool,
}

impl<'a> Rows<'a> {
    /// Stored row shown as row `y`
    fn source_row(&self, y: usize) -> usize {
        if self.top_down {
            y
        } else {
            self.height - 1 - y
        }
    }

    fn row(&self, y: usize) -> &'a [u8] {
        let start = self.source_row(y) * self.stride;
        &self.data[start..start + self.stride]
    }
}

/// Decodes one fixed-length frame.
///
/// `top_down` is the effective row order, after any requested flip.
pub fn unpack(
    format: &PixelFormat,
    data: &[u8],
    convert_to_gray: bool,
    top_down: bool,
) -> Result<DecodedRaster> {
    let (width, height) = (format.width as usize, format.height as usize);
    let overflow = || Error::FrameSizeOverflow {
        width: format.width,
        height: format.height,
    };

    let mut stride = format.scan_line_stride;
    let mut expected = format.frame_size().ok_or_else(overflow)?;
    if format.compression == Compression::Uncompressed
        && format.bits_per_pixel == 24
        && data.len() < expected
    {
        // Some writers do not pad 24-bit rows
        let unpadded = (width * 3).checked_mul(height).ok_or_else(overflow)?;
        if data.len() >= unpadded {
            stride = width * 3;
            expected = unpadded;
        }
    }
    if data.len() < expected {
        return Err(Error::FrameTooSmall {
            expected,
            actual: data.len(),
        });
    }

    let rows = Rows {
        data,
        stride,
        height,
        top_down,
    };
    let (w, h) = (format.width, format.height);
    match format.compression {
        Compression::Uncompressed => match format.bits_per_pixel {
            8 => unpack_indexed(format, &rows, width, convert_to_gray),
            bits => unpack_bgr(&rows, w, h, bits as usize / 8, convert_to_gray),
        },
        Compression::Gray8 => {
            let pixels = unpack_bytes(&rows, width, |row, x| row[x])?;
            Ok(DecodedRaster::gray8(w, h, pixels))
        }
        Compression::Gray16 => {
            let mut pixels = try_alloc::<u16>(width * height)?;
            for (y, out) in pixels.chunks_exact_mut(width).enumerate() {
                let row = rows.row(y);
                for (x, value) in out.iter_mut().enumerate() {
                    *value = u16::from_le_bytes([row[2 * x], row[2 * x + 1]]);
                }
            }
            Ok(DecodedRaster::gray16(w, h, pixels))
        }
        Compression::Ayuv => {
            // Memory order V, U, Y, A
            if convert_to_gray {
                let pixels = unpack_bytes(&rows, width, |row, x| row[4 * x + 2])?;
                Ok(DecodedRaster::gray8(w, h, pixels))
            } else {
                let pixels = unpack_ints(&rows, width, |row, x| {
                    let p = &row[4 * x..4 * x + 3];
                    yuv_to_argb(p[2], p[1], p[0])
                })?;
                Ok(DecodedRaster::rgb32(w, h, pixels))
            }
        }
        Compression::Yuy2 => unpack_packed(&rows, w, h, YUY2, convert_to_gray),
        Compression::Uyvy => unpack_packed(&rows, w, h, UYVY, convert_to_gray),
        Compression::Yvyu => unpack_packed(&rows, w, h, YVYU, convert_to_gray),
        Compression::I420 | Compression::Yv12 | Compression::Nv12 | Compression::Nv21 => {
            unpack_planar(format, data, top_down, convert_to_gray)
        }
        Compression::Jpeg { .. } | Compression::Png => Err(avi_core::Error::UnsupportedCompression(
            format.compression_tag,
        )
        .into()),
    }
}

fn unpack_bytes(rows: &Rows, width: usize, pixel: impl Fn(&[u8], usize) -> u8) -> Result<Vec<u8>> {
    let mut pixels = try_alloc::<u8>(width * rows.height)?;
    for (y, out) in pixels.chunks_exact_mut(width).enumerate() {
        let row = rows.row(y);
        for (x, value) in out.iter_mut().enumerate() {
            *value = pixel(row, x);
        }
    }
    Ok(pixels)
}

fn unpack_ints(rows: &Rows, width: usize, pixel: impl Fn(&[u8], usize) -> u32) -> Result<Vec<u32>> {
    let mut pixels = try_alloc::<u32>(width * rows.height)?;
    for (y, out) in pixels.chunks_exact_mut(width).enumerate() {
        let row = rows.row(y);
        for (x, value) in out.iter_mut().enumerate() {
            *value = pixel(row, x);
        }
    }
    Ok(pixels)
}

fn unpack_indexed(
    format: &PixelFormat,
    rows: &Rows,
    width: usize,
    convert_to_gray: bool,
) -> Result<DecodedRaster> {
    let (w, h) = (format.width, format.height);
    let indices = unpack_bytes(rows, width, |row, x| row[x])?;
    match &format.palette {
        Some(palette) if convert_to_gray => {
            let mut lut = [0u8; 256];
            for (entry, &[r, g, b]) in lut.iter_mut().zip(palette.iter()) {
                *entry = bgr_to_gray(b, g, r);
            }
            let pixels = indices.iter().map(|&i| lut[i as usize]).collect();
            Ok(DecodedRaster::gray8(w, h, pixels))
        }
        Some(palette) => Ok(DecodedRaster::indexed8(w, h, indices, palette.clone())),
        None => Ok(DecodedRaster::gray8(w, h, indices)),
    }
}

fn unpack_bgr(
    rows: &Rows,
    w: u32,
    h: u32,
    bytes_per_pixel: usize,
    convert_to_gray: bool,
) -> Result<DecodedRaster> {
    let width = w as usize;
    if convert_to_gray {
        let pixels = unpack_bytes(rows, width, |row, x| {
            let p = &row[x * bytes_per_pixel..];
            bgr_to_gray(p[0], p[1], p[2])
        })?;
        Ok(DecodedRaster::gray8(w, h, pixels))
    } else {
        let pixels = unpack_ints(rows, width, |row, x| {
            let p = &row[x * bytes_per_pixel..];
            rgb_to_argb(p[2], p[1], p[0])
        })?;
        Ok(DecodedRaster::rgb32(w, h, pixels))
    }
}

fn unpack_packed(
    rows: &Rows,
    w: u32,
    h: u32,
    layout: PackedLayout,
    convert_to_gray: bool,
) -> Result<DecodedRaster> {
    let width = w as usize;
    let luma = |row: &[u8], x: usize| {
        let pair = &row[(x / 2) * 4..(x / 2) * 4 + 4];
        if x % 2 == 0 {
            pair[layout.y0]
        } else {
            pair[layout.y1]
        }
    };
    if convert_to_gray {
        let pixels = unpack_bytes(rows, width, luma)?;
        return Ok(DecodedRaster::gray8(w, h, pixels));
    }
    let pixels = unpack_ints(rows, width, |row, x| {
        let pair = &row[(x / 2) * 4..(x / 2) * 4 + 4];
        yuv_to_argb(luma(row, x), pair[layout.u], pair[layout.v])
    })?;
    Ok(DecodedRaster::rgb32(w, h, pixels))
}

/// 4:2:0 frames: a full-size luma plane followed by quarter-size chroma,
/// either as two planes or interleaved. Each 2x2 block shares its chroma.
fn unpack_planar(
    format: &PixelFormat,
    data: &[u8],
    top_down: bool,
    convert_to_gray: bool,
) -> Result<DecodedRaster> {
    let (w, h) = (format.width, format.height);
    let (width, height) = (w as usize, h as usize);
    let luma = Rows {
        data,
        stride: width,
        height,
        top_down,
    };
    if convert_to_gray {
        let pixels = unpack_bytes(&luma, width, |row, x| row[x])?;
        return Ok(DecodedRaster::gray8(w, h, pixels));
    }

    let luma_size = width * height;
    let chroma_size = (width / 2) * (height / 2);
    // (U offset, V offset, distance between samples)
    let (u_at, v_at, step) = match format.compression {
        Compression::I420 => (luma_size, luma_size + chroma_size, 1),
        Compression::Yv12 => (luma_size + chroma_size, luma_size, 1),
        Compression::Nv12 => (luma_size, luma_size + 1, 2),
        _ => (luma_size + 1, luma_size, 2),
    };

    let mut pixels = try_alloc::<u32>(width * height)?;
    for (y, out) in pixels.chunks_exact_mut(width).enumerate() {
        let source = luma.source_row(y);
        let luma_row = &data[source * width..(source + 1) * width];
        let chroma_row = (source / 2) * (width / 2);
        for (x, value) in out.iter_mut().enumerate() {
            let c = (chroma_row + x / 2) * step;
            *value = yuv_to_argb(luma_row[x], data[u_at + c], data[v_at + c]);
        }
    }
    Ok(DecodedRaster::rgb32(w, h, pixels))
}
