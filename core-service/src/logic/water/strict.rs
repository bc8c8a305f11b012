//! Strict water check
//!
//! Returns water only for pure water frames: blue/green dominant, red low,
//! mean HSV saturation low, not black. Every condition must hold.

use image::RgbImage;

use super::WaterVerdict;
use crate::logic::sample::ImageSample;

const MIN_BLUE: f32 = 0.2;
const MIN_BLUE_GREEN_RATIO: f32 = 1.1;
const MAX_RED_TO_BLUE: f32 = 0.8;
const MAX_SATURATION: f32 = 0.4;
const MIN_BRIGHTNESS: f32 = 0.15;

/// Mean HSV saturation over all pixels
pub fn mean_saturation(img: &RgbImage) -> f32 {
    let count = img.pixels().len();
    if count == 0 {
        return 0.0;
    }

    let sum: f64 = img
        .pixels()
        .map(|px| {
            let max = px[0].max(px[1]).max(px[2]) as f64;
            let min = px[0].min(px[1]).min(px[2]) as f64;
            if max == 0.0 { 0.0 } else { (max - min) / max }
        })
        .sum();

    (sum / count as f64) as f32
}

pub fn detect_pure_water(sample: &ImageSample) -> WaterVerdict {
    let s = &sample.stats;
    let saturation = mean_saturation(&sample.thumbnail);

    let total = (s.r + s.g + s.b).max(1e-6);
    let blue_green_ratio = (s.b + s.g) / (total / 3.0);
    let red_to_blue = s.r / (s.b + 1e-6);

    let is_water = s.b > MIN_BLUE
        && blue_green_ratio > MIN_BLUE_GREEN_RATIO
        && red_to_blue < MAX_RED_TO_BLUE
        && saturation < MAX_SATURATION
        && s.brightness > MIN_BRIGHTNESS;

    log::debug!(
        "Strict water check: water={} (b={:.3}, bgr={:.3}, rbr={:.3}, sat={:.3}, bright={:.3})",
        is_water, s.b, blue_green_ratio, red_to_blue, saturation, s.brightness
    );

    let reason = format!(
        "{} (b={:.3}, bgr={:.3}, rbr={:.3}, sat={:.3}, bright={:.3})",
        if is_water { "Pure water, low saturation" } else { "Not pure water" },
        s.b, blue_green_ratio, red_to_blue, saturation, s.brightness
    );

    WaterVerdict { is_water, rule: None, reason }
}
