//! Water Gate - cheap color pre-filter
//!
//! Decides whether an image is plain water before the detectors run.
//! Pure functions over `ColorStats`; never consults a model.
//!
//! - `WaterGate::Standard`: four disjoint color rules, any one fires.
//! - `WaterGate::Strict`: saturation-gated variant (`strict.rs`), all checks must pass.
//! - `WaterGate::Off`: never short-circuits.

pub mod strict;
#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};

use crate::logic::sample::{ColorStats, ImageSample};

/// Which standard rule classified the image as water
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaterRule {
    BlueDominant,
    BlueGreen,
    DarkBlue,
    LightCyan,
}

/// Standard rules in evaluation order
pub const STANDARD_RULES: [WaterRule; 4] = [
    WaterRule::BlueDominant,
    WaterRule::BlueGreen,
    WaterRule::DarkBlue,
    WaterRule::LightCyan,
];

impl WaterRule {
    pub fn description(&self) -> &'static str {
        match self {
            WaterRule::BlueDominant => "Blue dominant (ocean/sea water)",
            WaterRule::BlueGreen => "Blue-green water (tropical/pool)",
            WaterRule::DarkBlue => "Dark blue water",
            WaterRule::LightCyan => "Light blue/cyan water",
        }
    }

    pub fn matches(&self, s: &ColorStats) -> bool {
        match self {
            WaterRule::BlueDominant => s.b > s.r && s.b > s.g * 0.9 && s.r < 0.35,
            WaterRule::BlueGreen => {
                s.b > 0.25 && s.g > 0.25 && s.r < 0.3 && (s.b + s.g) > s.r * 2.0
            }
            WaterRule::DarkBlue => {
                s.b > s.r * 1.3 && s.b > s.g && s.brightness < 0.5 && s.r < 0.25
            }
            WaterRule::LightCyan => {
                s.blue_ratio > 0.38 && s.red_ratio < 0.28 && s.brightness > 0.4
            }
        }
    }
}

/// Output of a water check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterVerdict {
    pub is_water: bool,
    pub rule: Option<WaterRule>,
    pub reason: String,
}

impl WaterVerdict {
    fn water(rule: WaterRule) -> Self {
        Self {
            is_water: true,
            rule: Some(rule),
            reason: rule.description().to_string(),
        }
    }

    fn not_water() -> Self {
        Self {
            is_water: false,
            rule: None,
            reason: "Not water".to_string(),
        }
    }
}

/// Selectable water gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaterGate {
    #[default]
    Standard,
    Strict,
    Off,
}

impl WaterGate {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "standard" => Some(WaterGate::Standard),
            "strict" => Some(WaterGate::Strict),
            "off" | "none" | "disabled" => Some(WaterGate::Off),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WaterGate::Standard => "standard",
            WaterGate::Strict => "strict",
            WaterGate::Off => "off",
        }
    }

    pub fn check(&self, sample: &ImageSample) -> WaterVerdict {
        let verdict = match self {
            WaterGate::Standard => detect_water(&sample.stats),
            WaterGate::Strict => strict::detect_pure_water(sample),
            WaterGate::Off => WaterVerdict::not_water(),
        };
        log::debug!("Water gate ({}): {} ({})", self.as_str(), verdict.is_water, verdict.reason);
        verdict
    }
}

/// Standard water check: first matching rule wins
pub fn detect_water(s: &ColorStats) -> WaterVerdict {
    STANDARD_RULES
        .iter()
        .find(|rule| rule.matches(s))
        .map(|rule| WaterVerdict::water(*rule))
        .unwrap_or_else(WaterVerdict::not_water)
}
