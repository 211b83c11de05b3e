//! Pixel format descriptor derived from the `strf` record

use crate::{Error, FourCc, Result};

/// Normalized compression kind of the video stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Compression {
    /// Raw BGR(A) or palette-indexed data
    Uncompressed,
    /// Raw 8-bit luma ('Y800', 'GREY', ...)
    Gray8,
    /// Raw 16-bit little-endian luma
    Gray16,
    Ayuv,
    Uyvy,
    Yuy2,
    Yvyu,
    I420,
    Yv12,
    Nv12,
    Nv21,
    /// One JPEG image per frame; `mjpeg` is set for the 'MJPG' tag
    Jpeg { mjpeg: bool },
    /// One PNG image per frame
    Png,
}

const BITS_RGB: &[u16] = &[8, 24, 32];
const BITS_8: &[u16] = &[8];
const BITS_12: &[u16] = &[12];
const BITS_16: &[u16] = &[16];
const BITS_32: &[u16] = &[32];
const BITS_ANY: &[u16] = &[];

/// Windows `BI_JPEG` compression code
const BI_JPEG: FourCc = FourCc::from_u32(4);
/// Windows `BI_PNG` compression code
const BI_PNG: FourCc = FourCc::from_u32(5);

impl Compression {
    /// Maps a `biCompression` tag to its kind, the bit counts it allows and
    /// its top-down flag. Returns `None` for unsupported tags.
    ///
    /// The top-down flag of uncompressed RGB and of planar formats depends
    /// on the sign of the height, which is resolved by the caller.
    fn resolve(tag: FourCc) -> Option<(Compression, &'static [u16], Option<bool>)> {
        let entry = match &tag.0 {
            &[0, 0, 0, 0] | b"RGB " | b"RAW " => (Compression::Uncompressed, BITS_RGB, None),
            b"Y800" | b"Y8  " | b"GREY" => (Compression::Gray8, BITS_8, Some(true)),
            b"Y16 " | b"MIL " => (Compression::Gray16, BITS_16, Some(false)),
            b"AYUV" => (Compression::Ayuv, BITS_32, Some(false)),
            b"UYVY" | b"UYNV" => (Compression::Uyvy, BITS_16, Some(true)),
            b"CYUV" | b"V422" => (Compression::Uyvy, BITS_16, Some(false)),
            b"YUY2" | b"YUNV" | b"YUYV" => (Compression::Yuy2, BITS_16, Some(true)),
            b"YVYU" => (Compression::Yvyu, BITS_16, Some(true)),
            b"IYUV" | b"I420" => (Compression::I420, BITS_12, None),
            b"YV12" => (Compression::Yv12, BITS_12, None),
            b"NV12" => (Compression::Nv12, BITS_12, None),
            b"NV21" => (Compression::Nv21, BITS_12, None),
            b"MJPG" => (Compression::Jpeg { mjpeg: true }, BITS_ANY, Some(true)),
            b"jpeg" | b"JPEG" => (Compression::Jpeg { mjpeg: false }, BITS_ANY, Some(true)),
            b"png " | b"PNG " => (Compression::Png, BITS_ANY, Some(true)),
            _ if tag == BI_JPEG => (Compression::Jpeg { mjpeg: false }, BITS_ANY, Some(true)),
            _ if tag == BI_PNG => (Compression::Png, BITS_ANY, Some(true)),
            _ => return None,
        };
        Some(entry)
    }

    /// Formats storing one embedded image per chunk
    pub fn is_variable_length(self) -> bool {
        matches!(self, Compression::Jpeg { .. } | Compression::Png)
    }

    pub fn is_planar_yuv(self) -> bool {
        matches!(
            self,
            Compression::I420 | Compression::Yv12 | Compression::Nv12 | Compression::Nv21
        )
    }

    pub fn is_packed_yuv(self) -> bool {
        matches!(
            self,
            Compression::Ayuv | Compression::Uyvy | Compression::Yuy2 | Compression::Yvyu
        )
    }
}

/// Everything the frame decoder needs to know about the stream's pixels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelFormat {
    /// Tag as stored in `biCompression`
    pub compression_tag: FourCc,
    pub compression: Compression,
    pub bits_per_pixel: u16,
    pub width: u32,
    /// Always positive; the sign of `biHeight` is folded into `top_down`
    pub height: u32,
    /// Row 0 of the stored frame is the top row; always set for embedded images
    pub top_down: bool,
    /// Bytes per stored scan line; zero for variable-length formats
    pub scan_line_stride: usize,
    /// RGB palette entries of palette-indexed uncompressed data
    pub palette: Option<Vec<[u8; 3]>>,
}

impl PixelFormat {
    /// Resolves a BITMAPINFOHEADER's compression, bit count and dimensions.
    ///
    /// `height` is the signed `biHeight`; a palette is attached separately.
    pub fn resolve(tag: FourCc, bits_per_pixel: u16, width: u32, height: i32) -> Result<Self> {
        let (compression, allowed_bits, fixed_top_down) =
            Compression::resolve(tag).ok_or(Error::UnsupportedCompression(tag))?;

        if !compression.is_variable_length() && !allowed_bits.contains(&bits_per_pixel) {
            return Err(Error::UnsupportedBitDepth {
                compression: tag,
                bits: bits_per_pixel,
            });
        }

        let top_down = match fixed_top_down {
            Some(top_down) => top_down,
            None if compression.is_planar_yuv() => height > 0,
            None => height < 0,
        };
        let height = height.unsigned_abs();
        if width == 0 || height == 0 {
            return Err(Error::InvalidDimensions { width, height });
        }

        if compression.is_planar_yuv() && (width % 2 != 0 || height % 2 != 0) {
            return Err(Error::OddDimensions {
                compression: tag,
                width,
                height,
            });
        }

        let bits = bits_per_pixel as usize;
        let scan_line_stride = if compression.is_variable_length() {
            0
        } else if compression.is_planar_yuv() {
            width as usize * bits / 8
        } else {
            (width as usize * bits).div_ceil(32) * 4
        };

        Ok(Self {
            compression_tag: tag,
            compression,
            bits_per_pixel,
            width,
            height,
            top_down,
            scan_line_stride,
            palette: None,
        })
    }

    pub fn is_planar_yuv(&self) -> bool {
        self.compression.is_planar_yuv()
    }

    pub fn is_variable_length(&self) -> bool {
        self.compression.is_variable_length()
    }

    /// Bytes a fixed-length frame must provide; `None` if that overflows `usize`
    pub fn frame_size(&self) -> Option<usize> {
        self.scan_line_stride.checked_mul(self.height as usize)
    }

    /// Uncompressed data with a palette or 8-bit indices
    pub fn needs_palette(&self) -> bool {
        self.compression == Compression::Uncompressed && self.bits_per_pixel <= 8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(s: &[u8; 4]) -> FourCc {
        FourCc(*s)
    }

    #[test]
    fn test_uncompressed_top_down_from_height_sign() {
        let bottom_up = PixelFormat::resolve(FourCc::from_u32(0), 24, 3, 2).unwrap();
        assert!(!bottom_up.top_down);
        assert_eq!(bottom_up.scan_line_stride, 12);

        let top_down = PixelFormat::resolve(tag(b"RGB "), 32, 3, -2).unwrap();
        assert!(top_down.top_down);
        assert_eq!(top_down.height, 2);
        assert_eq!(top_down.scan_line_stride, 12);
    }

    #[test]
    fn test_packed_yuv_flags() {
        assert!(PixelFormat::resolve(tag(b"UYVY"), 16, 4, 2).unwrap().top_down);
        assert!(!PixelFormat::resolve(tag(b"CYUV"), 16, 4, 2).unwrap().top_down);
        assert!(!PixelFormat::resolve(tag(b"V422"), 16, 4, 2).unwrap().top_down);
        let yuy2 = PixelFormat::resolve(tag(b"YUNV"), 16, 3, 2).unwrap();
        assert_eq!(yuy2.compression, Compression::Yuy2);
        assert_eq!(yuy2.scan_line_stride, 8);
    }

    #[test]
    fn test_planar_stride_and_orientation() {
        let i420 = PixelFormat::resolve(tag(b"IYUV"), 12, 6, 4).unwrap();
        assert_eq!(i420.compression, Compression::I420);
        assert!(i420.is_planar_yuv());
        assert!(i420.top_down);
        assert_eq!(i420.scan_line_stride, 9);
        assert_eq!(i420.frame_size(), Some(36));

        let nv21 = PixelFormat::resolve(tag(b"NV21"), 12, 4, -4).unwrap();
        assert!(!nv21.top_down);
    }

    #[test]
    fn test_planar_rejects_odd_dimensions() {
        let err = PixelFormat::resolve(tag(b"YV12"), 12, 5, 4).unwrap_err();
        assert!(matches!(err, Error::OddDimensions { width: 5, .. }));
    }

    #[test]
    fn test_unsupported_tag_and_depth() {
        let err = PixelFormat::resolve(tag(b"XVID"), 24, 4, 4).unwrap_err();
        assert_eq!(err.to_string(), "Unsupported compression: 'XVID'");

        let err = PixelFormat::resolve(tag(b"Y800"), 16, 4, 4).unwrap_err();
        assert!(matches!(err, Error::UnsupportedBitDepth { bits: 16, .. }));

        let err = PixelFormat::resolve(FourCc::from_u32(0), 16, 4, 4).unwrap_err();
        assert!(matches!(err, Error::UnsupportedBitDepth { bits: 16, .. }));
    }

    #[test]
    fn test_rejects_empty_frames() {
        let err = PixelFormat::resolve(tag(b"Y800"), 8, 0, 4).unwrap_err();
        assert!(matches!(err, Error::InvalidDimensions { width: 0, height: 4 }));
    }

    #[test]
    fn test_variable_length_formats_accept_any_depth() {
        let mjpg = PixelFormat::resolve(tag(b"MJPG"), 24, 320, 240).unwrap();
        assert_eq!(mjpg.compression, Compression::Jpeg { mjpeg: true });
        assert!(mjpg.is_variable_length());
        assert_eq!(mjpg.scan_line_stride, 0);

        let bi_png = PixelFormat::resolve(FourCc::from_u32(5), 0, 8, 8).unwrap();
        assert_eq!(bi_png.compression, Compression::Png);
        let bi_jpeg = PixelFormat::resolve(FourCc::from_u32(4), 0, 8, 8).unwrap();
        assert_eq!(bi_jpeg.compression, Compression::Jpeg { mjpeg: false });
    }
}
