use image::{Rgb, RgbImage};

use super::strict::{detect_pure_water, mean_saturation};
use super::{detect_water, WaterGate, WaterRule};
use crate::logic::sample::{ColorStats, ImageSample};

fn uniform(r: u8, g: u8, b: u8) -> ImageSample {
    ImageSample::from_rgb(RgbImage::from_pixel(64, 64, Rgb([r, g, b])))
}

#[test]
fn test_blue_dominant_ocean() {
    let verdict = detect_water(&ColorStats::from_means(0.1, 0.3, 0.6));
    assert!(verdict.is_water);
    assert_eq!(verdict.rule, Some(WaterRule::BlueDominant));
}

#[test]
fn test_blue_green_pool() {
    // Green too strong for the blue-dominant rule
    let stats = ColorStats::from_means(0.2, 0.6, 0.3);
    assert!(!WaterRule::BlueDominant.matches(&stats));

    let verdict = detect_water(&stats);
    assert_eq!(verdict.rule, Some(WaterRule::BlueGreen));
}

#[test]
fn test_dark_blue_rule_predicate() {
    let stats = ColorStats::from_means(0.05, 0.1, 0.3);
    assert!(WaterRule::DarkBlue.matches(&stats));
    // Earlier rule wins when both hold
    assert_eq!(detect_water(&stats).rule, Some(WaterRule::BlueDominant));
}

#[test]
fn test_light_cyan() {
    let stats = ColorStats::from_means(0.3, 0.7, 0.62);
    assert!(!WaterRule::BlueDominant.matches(&stats));
    assert!(!WaterRule::BlueGreen.matches(&stats));
    assert!(!WaterRule::DarkBlue.matches(&stats));

    let verdict = detect_water(&stats);
    assert_eq!(verdict.rule, Some(WaterRule::LightCyan));
    assert_eq!(verdict.reason, "Light blue/cyan water");
}

#[test]
fn test_brown_debris_is_not_water() {
    let verdict = detect_water(&ColorStats::from_means(0.6, 0.3, 0.2));
    assert!(!verdict.is_water);
    assert!(verdict.rule.is_none());
}

#[test]
fn test_mean_saturation() {
    let grey = RgbImage::from_pixel(4, 4, Rgb([120, 120, 120]));
    assert_eq!(mean_saturation(&grey), 0.0);

    let pure_blue = RgbImage::from_pixel(4, 4, Rgb([0, 0, 255]));
    assert!((mean_saturation(&pure_blue) - 1.0).abs() < 1e-6);

    assert_eq!(mean_saturation(&RgbImage::new(4, 4)), 0.0);
}

#[test]
fn test_strict_gate_accepts_pale_water() {
    let verdict = detect_pure_water(&uniform(150, 170, 200));
    assert!(verdict.is_water, "{}", verdict.reason);
}

#[test]
fn test_strict_gate_rejects_saturated_blue() {
    let sample = uniform(0, 50, 200);

    // Standard gate calls it ocean, strict gate wants low saturation
    assert!(WaterGate::Standard.check(&sample).is_water);
    assert!(!WaterGate::Strict.check(&sample).is_water);
}

#[test]
fn test_off_gate_never_fires() {
    assert!(!WaterGate::Off.check(&uniform(0, 50, 200)).is_water);
}

#[test]
fn test_gate_parse() {
    assert_eq!(WaterGate::parse("Strict"), Some(WaterGate::Strict));
    assert_eq!(WaterGate::parse(" standard "), Some(WaterGate::Standard));
    assert_eq!(WaterGate::parse("disabled"), Some(WaterGate::Off));
    assert_eq!(WaterGate::parse("ocean"), None);
}
