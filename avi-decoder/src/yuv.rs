//! Fixed-point color conversions

/// Luma of a BGR pixel, without rescaling to the 16-235 range
#[inline]
pub fn bgr_to_gray(b: u8, g: u8, r: u8) -> u8 {
    ((b as u32 * 934 + g as u32 * 4809 + r as u32 * 2449 + 4096) >> 13) as u8
}

/// Luma of an `0xAARRGGBB` pixel
#[inline]
pub fn argb_to_gray(pixel: u32) -> u8 {
    bgr_to_gray(pixel as u8, (pixel >> 8) as u8, (pixel >> 16) as u8)
}

/// BT.601 studio-range YUV to `0xFFRRGGBB`
#[inline]
pub fn yuv_to_argb(y: u8, u: u8, v: u8) -> u32 {
    let y = 9535 * y as i32 - 148_464;
    let u = (u ^ 0x80) as i8 as i32;
    let v = (v ^ 0x80) as i8 as i32;
    let r = clamp((y + 13074 * v) >> 13);
    let g = clamp((y - 6660 * v - 3203 * u) >> 13);
    let b = clamp((y + 16531 * u) >> 13);
    0xFF00_0000 | (r << 16) | (g << 8) | b
}

/// `0xFFRRGGBB` from byte components
#[inline]
pub fn rgb_to_argb(r: u8, g: u8, b: u8) -> u32 {
    0xFF00_0000 | ((r as u32) << 16) | ((g as u32) << 8) | b as u32
}

#[inline]
fn clamp(value: i32) -> u32 {
    value.clamp(0, 255) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gray_weights() {
        assert_eq!(bgr_to_gray(255, 255, 255), 255);
        assert_eq!(bgr_to_gray(0, 0, 0), 0);
        assert_eq!(bgr_to_gray(0, 0, 255), 76);
        assert_eq!(bgr_to_gray(0, 255, 0), 150);
        assert_eq!(bgr_to_gray(255, 0, 0), 29);
        assert_eq!(argb_to_gray(0xFFFF_0000), 76);
    }

    #[test]
    fn test_yuv_black_and_white() {
        assert_eq!(yuv_to_argb(16, 128, 128), 0xFF00_0000);
        assert_eq!(yuv_to_argb(235, 128, 128), 0xFFFF_FFFF);
        // Below black and above white clamp
        assert_eq!(yuv_to_argb(0, 128, 128), 0xFF00_0000);
        assert_eq!(yuv_to_argb(255, 128, 128), 0xFFFF_FFFF);
    }

    #[test]
    fn test_yuv_chroma() {
        // y=81, u=90, v=240 is close to pure red
        let pixel = yuv_to_argb(81, 90, 240);
        let y = 9535 * 81 - 148_464;
        let (u, v) = (90 - 128, 240 - 128);
        let r = ((y + 13074 * v) >> 13).clamp(0, 255) as u32;
        let g = ((y - 6660 * v - 3203 * u) >> 13).clamp(0, 255) as u32;
        let b = ((y + 16531 * u) >> 13).clamp(0, 255) as u32;
        assert_eq!(pixel, 0xFF00_0000 | (r << 16) | (g << 8) | b);
        assert_eq!(r, 254);
        assert_eq!(b, 0);
    }

    #[test]
    fn test_rgb_to_argb() {
        assert_eq!(rgb_to_argb(1, 2, 3), 0xFF01_0203);
    }
}
