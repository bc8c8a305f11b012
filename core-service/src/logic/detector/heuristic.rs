//! Heuristic fallback detector
//!
//! Color analysis used when no model runtime is available.
//! Dark frames lean oil, red/brown frames lean plastic.

use super::{DetectorError, DetectorKind, DualDetector, ProbabilityPair};
use crate::logic::decision::clamp_prob;
use crate::logic::sample::{ColorStats, ImageSample};

#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicDetector;

impl HeuristicDetector {
    pub fn new() -> Self {
        Self
    }

    pub fn estimate(stats: &ColorStats) -> ProbabilityPair {
        let darkness = 1.0 - stats.brightness;
        let redness = (stats.r - stats.g.max(stats.b)).max(0.0) * 3.0;

        let p_plastic = clamp_prob(redness * 0.8 + stats.brightness * 0.2);
        let p_oil = clamp_prob(darkness * 0.7 + (1.0 - stats.blue_ratio) * 0.3);

        log::debug!(
            "Heuristic: darkness={:.3} redness={:.3} -> plastic={:.4} oil={:.4}",
            darkness, redness, p_plastic, p_oil
        );

        ProbabilityPair { p_plastic, p_oil }
    }
}

impl DualDetector for HeuristicDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Heuristic
    }

    fn predict(&self, sample: &ImageSample) -> Result<ProbabilityPair, DetectorError> {
        Ok(Self::estimate(&sample.stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_black_frame_leans_oil() {
        let pair = HeuristicDetector::estimate(&ColorStats::from_means(0.0, 0.0, 0.0));
        assert_eq!(pair.p_plastic, 0.0);
        // darkness 1.0 * 0.7 + (1 - 0) * 0.3
        assert!((pair.p_oil - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_red_frame_leans_plastic() {
        let stats = ColorStats::from_means(0.8, 0.2, 0.1);
        let pair = HeuristicDetector::estimate(&stats);
        // redness = 0.6 * 3 = 1.8 -> clamped
        assert_eq!(pair.p_plastic, 1.0);
        assert!(pair.p_oil < pair.p_plastic);
    }

    #[test]
    fn test_formula_on_mid_grey() {
        let stats = ColorStats::from_means(0.5, 0.5, 0.5);
        let pair = HeuristicDetector::estimate(&stats);
        assert!((pair.p_plastic - 0.1).abs() < 1e-5);
        // 0.5 * 0.7 + (1 - 1/3) * 0.3
        assert!((pair.p_oil - 0.55).abs() < 1e-4);
    }
}
