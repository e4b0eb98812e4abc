use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::contrast::{ThresholdType, threshold};

use crate::config::HsvRange;

/// BT.601 luma, rounded to the nearest integer.
pub fn rgb_to_gray(image: &RgbImage) -> GrayImage {
    let (width, height) = image.dimensions();
    let mut gray = GrayImage::new(width, height);

    for (x, y, pixel) in image.enumerate_pixels() {
        let lum =
            0.299 * pixel[0] as f64 + 0.587 * pixel[1] as f64 + 0.114 * pixel[2] as f64;
        gray.put_pixel(x, y, Luma([lum.round().clamp(0.0, 255.0) as u8]));
    }

    gray
}

/// Converts to 8-bit HSV stored in the three channels of an `RgbImage`:
/// hue in `0..180` (degrees halved), saturation and value in `0..=255`.
pub fn rgb_to_hsv(image: &RgbImage) -> RgbImage {
    let (width, height) = image.dimensions();
    let mut hsv = RgbImage::new(width, height);

    for (x, y, pixel) in image.enumerate_pixels() {
        hsv.put_pixel(x, y, Rgb(pixel_to_hsv(pixel[0], pixel[1], pixel[2])));
    }

    hsv
}

pub fn pixel_to_hsv(r: u8, g: u8, b: u8) -> [u8; 3] {
    let (r, g, b) = (r as f64, g as f64, b as f64);
    let v = r.max(g).max(b);
    let min = r.min(g).min(b);
    let diff = v - min;

    let s = if v > 0.0 { 255.0 * diff / v } else { 0.0 };

    let mut h = if diff == 0.0 {
        0.0
    } else if v == r {
        60.0 * (g - b) / diff
    } else if v == g {
        120.0 + 60.0 * (b - r) / diff
    } else {
        240.0 + 60.0 * (r - g) / diff
    };
    if h < 0.0 {
        h += 360.0;
    }

    let h = ((h / 2.0).round() as u32 % 180) as u8;
    [h, s.round().min(255.0) as u8, v as u8]
}

/// Binary mask of pixels whose three channels all lie within the inclusive bounds.
pub fn in_range(image: &RgbImage, range: &HsvRange) -> GrayImage {
    let (width, height) = image.dimensions();
    let mut mask = GrayImage::new(width, height);

    for (x, y, pixel) in image.enumerate_pixels() {
        if range.contains(pixel.0) {
            mask.put_pixel(x, y, Luma([255]));
        }
    }

    mask
}

/// Pixels strictly below `cutoff` become 255, everything else 0.
pub fn dark_pixels(image: &GrayImage, cutoff: u8) -> GrayImage {
    match cutoff.checked_sub(1) {
        Some(level) => threshold(image, level, ThresholdType::BinaryInverted),
        None => GrayImage::new(image.width(), image.height()),
    }
}

/// Keeps `image` values where `mask` is non-zero and zeroes the rest.
pub fn apply_mask(image: &GrayImage, mask: &GrayImage) -> GrayImage {
    let (width, height) = image.dimensions();
    let mut result = GrayImage::new(width, height);

    for (x, y, pixel) in image.enumerate_pixels() {
        if mask.get_pixel(x, y)[0] > 0 {
            result.put_pixel(x, y, *pixel);
        }
    }

    result
}

/// Intersection of two binary masks.
pub fn mask_and(a: &GrayImage, b: &GrayImage) -> GrayImage {
    let (width, height) = a.dimensions();
    let mut result = GrayImage::new(width, height);

    for (x, y, pixel) in a.enumerate_pixels() {
        if pixel[0] > 0 && b.get_pixel(x, y)[0] > 0 {
            result.put_pixel(x, y, Luma([255]));
        }
    }

    result
}

pub fn count_nonzero(image: &GrayImage) -> u64 {
    image.pixels().filter(|p| p[0] > 0).count() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gray_conversion_rounds() {
        let image = RgbImage::from_pixel(2, 2, Rgb([200, 130, 60]));
        let gray = rgb_to_gray(&image);
        // 59.8 + 76.31 + 6.84 = 142.95
        assert_eq!(gray.get_pixel(1, 1)[0], 143);
    }

    #[test]
    fn test_hsv_known_colors() {
        assert_eq!(pixel_to_hsv(255, 0, 0), [0, 255, 255]);
        assert_eq!(pixel_to_hsv(0, 255, 0), [60, 255, 255]);
        assert_eq!(pixel_to_hsv(0, 0, 255), [120, 255, 255]);
        assert_eq!(pixel_to_hsv(0, 0, 0), [0, 0, 0]);
        assert_eq!(pixel_to_hsv(128, 128, 128), [0, 0, 128]);
    }

    #[test]
    fn test_golden_brown_lands_in_range() {
        let hsv = pixel_to_hsv(200, 130, 60);
        assert_eq!(hsv[0], 15);
        assert!(hsv[1] >= 80);
        assert_eq!(hsv[2], 200);
    }

    #[test]
    fn test_in_range_is_inclusive() {
        let mut image = RgbImage::new(3, 1);
        image.put_pixel(0, 0, Rgb([10, 80, 50]));
        image.put_pixel(1, 0, Rgb([30, 255, 200]));
        image.put_pixel(2, 0, Rgb([31, 255, 200]));
        let mask = in_range(&image, &HsvRange::golden_brown());
        assert_eq!(mask.get_pixel(0, 0)[0], 255);
        assert_eq!(mask.get_pixel(1, 0)[0], 255);
        assert_eq!(mask.get_pixel(2, 0)[0], 0);
    }

    #[test]
    fn test_threshold_and_masks() {
        let mut gray = GrayImage::new(4, 1);
        gray.put_pixel(0, 0, Luma([10]));
        gray.put_pixel(1, 0, Luma([49]));
        gray.put_pixel(2, 0, Luma([50]));
        gray.put_pixel(3, 0, Luma([200]));

        let dark = dark_pixels(&gray, 50);
        assert_eq!(dark.as_raw(), &vec![255, 255, 0, 0]);
        assert_eq!(count_nonzero(&dark_pixels(&gray, 0)), 0);

        let mut mask = GrayImage::new(4, 1);
        mask.put_pixel(1, 0, Luma([255]));
        mask.put_pixel(3, 0, Luma([255]));

        assert_eq!(apply_mask(&gray, &mask).as_raw(), &vec![0, 49, 0, 200]);
        assert_eq!(count_nonzero(&mask_and(&dark, &mask)), 1);
    }
}
