//! Decoded frame rasters

use image::{DynamicImage, GrayImage, ImageBuffer, Luma, RgbImage};

/// Pixel type of a decoded frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelKind {
    Gray8,
    Gray16,
    /// `0xAARRGGBB` per pixel
    Rgb32,
    /// 8-bit indices into the raster's palette
    PaletteIndexed8,
}

/// Pixel storage, row-major from the top row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PixelBuffer {
    Bytes(Vec<u8>),
    Shorts(Vec<u16>),
    Ints(Vec<u32>),
}

impl PixelBuffer {
    pub fn len(&self) -> usize {
        match self {
            PixelBuffer::Bytes(data) => data.len(),
            PixelBuffer::Shorts(data) => data.len(),
            PixelBuffer::Ints(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One decoded video frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedRaster {
    pub width: u32,
    pub height: u32,
    pub kind: PixelKind,
    pub pixels: PixelBuffer,
    /// RGB entries for [`PixelKind::PaletteIndexed8`]
    pub palette: Option<Vec<[u8; 3]>>,
}

impl DecodedRaster {
    pub fn gray8(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            kind: PixelKind::Gray8,
            pixels: PixelBuffer::Bytes(pixels),
            palette: None,
        }
    }

    pub fn gray16(width: u32, height: u32, pixels: Vec<u16>) -> Self {
        Self {
            width,
            height,
            kind: PixelKind::Gray16,
            pixels: PixelBuffer::Shorts(pixels),
            palette: None,
        }
    }

    pub fn rgb32(width: u32, height: u32, pixels: Vec<u32>) -> Self {
        Self {
            width,
            height,
            kind: PixelKind::Rgb32,
            pixels: PixelBuffer::Ints(pixels),
            palette: None,
        }
    }

    pub fn indexed8(width: u32, height: u32, pixels: Vec<u8>, palette: Vec<[u8; 3]>) -> Self {
        Self {
            width,
            height,
            kind: PixelKind::PaletteIndexed8,
            pixels: PixelBuffer::Bytes(pixels),
            palette: Some(palette),
        }
    }

    /// Converts to an `image` crate buffer; palette indices are expanded to RGB
    pub fn to_dynamic_image(&self) -> Option<DynamicImage> {
        let (w, h) = (self.width, self.height);
        match (&self.pixels, self.kind) {
            (PixelBuffer::Bytes(data), PixelKind::Gray8) => {
                GrayImage::from_raw(w, h, data.clone()).map(DynamicImage::ImageLuma8)
            }
            (PixelBuffer::Shorts(data), PixelKind::Gray16) => {
                ImageBuffer::<Luma<u16>, _>::from_raw(w, h, data.clone())
                    .map(DynamicImage::ImageLuma16)
            }
            (PixelBuffer::Ints(data), PixelKind::Rgb32) => {
                let rgb = data
                    .iter()
                    .flat_map(|&p| [(p >> 16) as u8, (p >> 8) as u8, p as u8])
                    .collect();
                RgbImage::from_raw(w, h, rgb).map(DynamicImage::ImageRgb8)
            }
            (PixelBuffer::Bytes(data), PixelKind::PaletteIndexed8) => {
                let palette = self.palette.as_deref().unwrap_or(&[]);
                let rgb = data
                    .iter()
                    .flat_map(|&i| palette.get(i as usize).copied().unwrap_or([0; 3]))
                    .collect();
                RgbImage::from_raw(w, h, rgb).map(DynamicImage::ImageRgb8)
            }
            _ => None,
        }
    }
}
