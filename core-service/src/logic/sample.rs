//! Image Sample - decoded input shared by every stage
//!
//! Decodes once, keeps the full RGB frame for the model-backed detector and a
//! 128×128 thumbnail + its color statistics for the water gate and heuristic.

use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};
use serde::{Deserialize, Serialize};

use crate::constants::STATS_SIZE;

/// Per-channel means in normalized [0, 1] space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorStats {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub brightness: f32,
    pub red_ratio: f32,
    pub green_ratio: f32,
    pub blue_ratio: f32,
}

impl ColorStats {
    /// Statistics over every pixel of `img` (no resizing)
    pub fn from_rgb(img: &RgbImage) -> Self {
        let count = (img.width() as u64 * img.height() as u64).max(1) as f64;
        let (mut sr, mut sg, mut sb) = (0u64, 0u64, 0u64);
        for px in img.pixels() {
            sr += px[0] as u64;
            sg += px[1] as u64;
            sb += px[2] as u64;
        }

        let r = (sr as f64 / count / 255.0) as f32;
        let g = (sg as f64 / count / 255.0) as f32;
        let b = (sb as f64 / count / 255.0) as f32;
        Self::from_means(r, g, b)
    }

    pub fn from_means(r: f32, g: f32, b: f32) -> Self {
        let total = r + g + b + 1e-6;
        Self {
            r,
            g,
            b,
            brightness: (r + g + b) / 3.0,
            red_ratio: r / total,
            green_ratio: g / total,
            blue_ratio: b / total,
        }
    }
}

/// A decoded image ready for classification
#[derive(Debug, Clone)]
pub struct ImageSample {
    pub rgb: RgbImage,
    pub thumbnail: RgbImage,
    pub stats: ColorStats,
}

impl ImageSample {
    pub fn decode(bytes: &[u8]) -> Result<Self, image::ImageError> {
        let img = image::load_from_memory(bytes)?;
        Ok(Self::from_dynamic(&img))
    }

    pub fn from_dynamic(img: &DynamicImage) -> Self {
        Self::from_rgb(img.to_rgb8())
    }

    pub fn from_rgb(rgb: RgbImage) -> Self {
        let thumbnail = image::imageops::resize(&rgb, STATS_SIZE, STATS_SIZE, FilterType::CatmullRom);
        let stats = ColorStats::from_rgb(&thumbnail);
        log::debug!(
            "Color stats: R={:.3} G={:.3} B={:.3} brightness={:.3} ratios=({:.3}, {:.3}, {:.3})",
            stats.r, stats.g, stats.b, stats.brightness,
            stats.red_ratio, stats.green_ratio, stats.blue_ratio
        );

        Self { rgb, thumbnail, stats }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_uniform_image_stats() {
        let img = RgbImage::from_pixel(10, 10, Rgb([255, 0, 51]));
        let stats = ColorStats::from_rgb(&img);

        assert!((stats.r - 1.0).abs() < 1e-6);
        assert_eq!(stats.g, 0.0);
        assert!((stats.b - 0.2).abs() < 1e-6);
        assert!((stats.brightness - 0.4).abs() < 1e-6);
        assert!((stats.red_ratio + stats.green_ratio + stats.blue_ratio - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_black_image_has_zero_ratios() {
        let stats = ColorStats::from_rgb(&RgbImage::new(4, 4));
        assert_eq!(stats.brightness, 0.0);
        assert_eq!(stats.blue_ratio, 0.0);
    }

    #[test]
    fn test_sample_thumbnail_is_fixed_size() {
        let sample = ImageSample::from_rgb(RgbImage::from_pixel(640, 480, Rgb([10, 20, 30])));
        assert_eq!(sample.thumbnail.dimensions(), (STATS_SIZE, STATS_SIZE));
        assert_eq!(sample.rgb.dimensions(), (640, 480));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(ImageSample::decode(b"definitely not a png").is_err());
    }
}
