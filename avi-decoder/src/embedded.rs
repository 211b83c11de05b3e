//! JPEG and PNG frames

use crate::mjpeg::patch_missing_dht;
use crate::raster::DecodedRaster;
use crate::unpack::{pixel_count, try_alloc};
use crate::yuv::{bgr_to_gray, rgb_to_argb};
use crate::Result;
use avi_core::{Compression, PixelFormat};
use image::imageops::{self, FilterType};
use image::{ColorType, ImageFormat, RgbImage};
use std::borrow::Cow;

/// Decodes an image stored in one chunk.
///
/// The result always has the stream's declared size; images of another size
/// are resized. `flip` mirrors the rows.
pub fn decode_embedded(
    format: &PixelFormat,
    data: &[u8],
    convert_to_gray: bool,
    flip: bool,
) -> Result<DecodedRaster> {
    let (bytes, image_format) = match format.compression {
        Compression::Jpeg { mjpeg: true } => (patch_missing_dht(data), ImageFormat::Jpeg),
        Compression::Png => (Cow::Borrowed(data), ImageFormat::Png),
        _ => (Cow::Borrowed(data), ImageFormat::Jpeg),
    };
    let image = image::load_from_memory_with_format(&bytes, image_format)?;
    let grayscale = convert_to_gray || !has_color(image.color());

    let mut rgb = image.to_rgb8();
    if flip {
        imageops::flip_vertical_in_place(&mut rgb);
    }
    let (w, h) = (format.width, format.height);
    let count = pixel_count(w, h)?;
    if rgb.dimensions() != (w, h) {
        tracing::debug!(
            "resizing {}x{} frame to {}x{}",
            rgb.width(),
            rgb.height(),
            w,
            h
        );
        rgb = imageops::resize(&rgb, w, h, FilterType::Triangle);
    }

    if grayscale {
        let mut pixels = try_alloc::<u8>(count)?;
        for (out, p) in pixels.iter_mut().zip(rgb.pixels()) {
            *out = bgr_to_gray(p[2], p[1], p[0]);
        }
        Ok(DecodedRaster::gray8(w, h, pixels))
    } else {
        Ok(DecodedRaster::rgb32(w, h, to_argb(&rgb, count)?))
    }
}

fn has_color(color: ColorType) -> bool {
    !matches!(
        color,
        ColorType::L8 | ColorType::La8 | ColorType::L16 | ColorType::La16
    )
}

fn to_argb(rgb: &RgbImage, count: usize) -> Result<Vec<u32>> {
    let mut pixels = try_alloc::<u32>(count)?;
    for (out, p) in pixels.iter_mut().zip(rgb.pixels()) {
        *out = rgb_to_argb(p[0], p[1], p[2]);
    }
    Ok(pixels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::{PixelBuffer, PixelKind};
    use avi_core::FourCc;
    use image::{DynamicImage, GrayImage, Rgb};
    use std::io::Cursor;

    fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        image.write_to(&mut out, format).unwrap();
        out.into_inner()
    }

    fn two_rows() -> DynamicImage {
        let mut image = RgbImage::new(2, 2);
        for x in 0..2 {
            image.put_pixel(x, 0, Rgb([255, 0, 0]));
            image.put_pixel(x, 1, Rgb([0, 0, 255]));
        }
        DynamicImage::ImageRgb8(image)
    }

    #[test]
    fn test_png_frame() {
        let format = PixelFormat::resolve(FourCc(*b"png "), 24, 2, 2).unwrap();
        let data = encode(two_rows(), ImageFormat::Png);

        let raster = decode_embedded(&format, &data, false, false).unwrap();
        assert_eq!(raster.kind, PixelKind::Rgb32);
        assert_eq!(
            raster.pixels,
            PixelBuffer::Ints(vec![0xFFFF_0000, 0xFFFF_0000, 0xFF00_00FF, 0xFF00_00FF])
        );

        let flipped = decode_embedded(&format, &data, false, true).unwrap();
        assert_eq!(
            flipped.pixels,
            PixelBuffer::Ints(vec![0xFF00_00FF, 0xFF00_00FF, 0xFFFF_0000, 0xFFFF_0000])
        );

        let gray = decode_embedded(&format, &data, true, false).unwrap();
        assert_eq!(gray.pixels, PixelBuffer::Bytes(vec![76, 76, 29, 29]));
    }

    #[test]
    fn test_resizes_to_declared_size() {
        let format = PixelFormat::resolve(FourCc(*b"PNG "), 24, 4, 4).unwrap();
        let data = encode(two_rows(), ImageFormat::Png);
        let raster = decode_embedded(&format, &data, false, false).unwrap();
        assert_eq!((raster.width, raster.height), (4, 4));
        assert_eq!(raster.pixels.len(), 16);
    }

    #[test]
    fn test_gray_jpeg_stays_gray() {
        let format = PixelFormat::resolve(FourCc(*b"MJPG"), 24, 8, 8).unwrap();
        let image = DynamicImage::ImageLuma8(GrayImage::from_pixel(8, 8, image::Luma([128])));
        let data = encode(image, ImageFormat::Jpeg);

        let raster = decode_embedded(&format, &data, false, false).unwrap();
        assert_eq!(raster.kind, PixelKind::Gray8);
        match raster.pixels {
            PixelBuffer::Bytes(pixels) => assert!(pixels.iter().all(|&p| (126..=130).contains(&p))),
            other => panic!("unexpected buffer {:?}", other),
        }
    }

    #[test]
    fn test_corrupt_data_is_an_error() {
        let format = PixelFormat::resolve(FourCc(*b"MJPG"), 24, 8, 8).unwrap();
        assert!(decode_embedded(&format, &[0xFF, 0xD8, 0x00], false, false).is_err());
    }
}
