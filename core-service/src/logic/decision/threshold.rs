//! Threshold Configuration
//!
//! Per-policy threshold sets. Immutable once the service is built.

use serde::{Deserialize, Serialize};

use super::types::PolicyName;
use crate::constants::*;

/// Threshold Configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdSet {
    /// Plastic probability needed for a strong plastic call
    pub plastic_threshold: f32,

    /// Oil probability needed for a strong oil call
    pub oil_threshold: f32,

    /// Below this maximum probability nothing is reported
    pub none_threshold: f32,

    /// Minimum distance between margins (margin-balanced policy)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub margin: Option<f32>,

    /// Single strictness knob (confidence-gated policy)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_threshold: Option<f32>,
}

impl Default for ThresholdSet {
    fn default() -> Self {
        Self::sequential()
    }
}

impl ThresholdSet {
    pub fn new(plastic_threshold: f32, oil_threshold: f32, none_threshold: f32) -> Self {
        Self {
            plastic_threshold,
            oil_threshold,
            none_threshold,
            margin: None,
            confidence_threshold: None,
        }
        .clamped()
    }

    /// Primary prediction path
    pub fn sequential() -> Self {
        Self::new(DEFAULT_PLASTIC_THRESHOLD, DEFAULT_OIL_THRESHOLD, DEFAULT_NONE_THRESHOLD)
    }

    pub fn confidence_gated() -> Self {
        Self {
            confidence_threshold: Some(DEFAULT_CONFIDENCE_THRESHOLD),
            ..Self::sequential()
        }
    }

    /// Stricter endpoint thresholds
    pub fn margin_balanced() -> Self {
        Self {
            margin: Some(DEFAULT_MARGIN),
            ..Self::new(
                DEFAULT_MARGIN_PLASTIC_THRESHOLD,
                DEFAULT_MARGIN_OIL_THRESHOLD,
                DEFAULT_MARGIN_NONE_THRESHOLD,
            )
        }
    }

    pub fn with_margin(mut self, margin: f32) -> Self {
        self.margin = Some(margin);
        self.clamped()
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence_threshold = Some(confidence);
        self.clamped()
    }

    /// Force every value into [0, 1]
    pub fn clamped(self) -> Self {
        let unit = |v: f32| if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 };
        Self {
            plastic_threshold: unit(self.plastic_threshold),
            oil_threshold: unit(self.oil_threshold),
            none_threshold: unit(self.none_threshold),
            margin: self.margin.map(unit),
            confidence_threshold: self.confidence_threshold.map(unit),
        }
    }

    pub fn margin_or_default(&self) -> f32 {
        self.margin.unwrap_or(DEFAULT_MARGIN)
    }

    pub fn confidence_or_default(&self) -> f32 {
        self.confidence_threshold.unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD)
    }
}

/// One threshold set per policy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolicyThresholds {
    pub sequential: ThresholdSet,
    pub confidence_gated: ThresholdSet,
    pub margin_balanced: ThresholdSet,
}

impl Default for PolicyThresholds {
    fn default() -> Self {
        Self {
            sequential: ThresholdSet::sequential(),
            confidence_gated: ThresholdSet::confidence_gated(),
            margin_balanced: ThresholdSet::margin_balanced(),
        }
    }
}

impl PolicyThresholds {
    pub fn for_policy(&self, policy: PolicyName) -> ThresholdSet {
        match policy {
            PolicyName::Sequential => self.sequential,
            PolicyName::ConfidenceGated => self.confidence_gated,
            PolicyName::MarginBalanced => self.margin_balanced,
        }
    }
}
