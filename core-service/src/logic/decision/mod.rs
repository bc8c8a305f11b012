//! Decision Engine - probabilities to label
//!
//! One engine, three policies. All branches are total: inputs are clamped
//! into [0, 1] first, so there is no error path.
//!
//! # Policies
//! - `Sequential` (A): water override, strong plastic, strong oil, none, weak pick.
//! - `ConfidenceGated` (B): rejects when `max < confidence_threshold`, then A steps 1-4.
//! - `MarginBalanced` (C): both-above calls need `|Δmargin| >= margin`.
//!
//! Every `Decision` carries a `Branch` and a `reason` of the form
//! `"<branch_tag>: plastic=<p> oil=<o> ..."`.

pub mod threshold;
pub mod types;

use serde::{Deserialize, Serialize};

pub use threshold::{PolicyThresholds, ThresholdSet};
pub use types::{Label, PolicyName};

/// Penalty applied to confidence when the water override fires
const WATER_PENALTY: f32 = 0.7;
/// Weight of the plastic/oil spread in the confidence score
const SPREAD_WEIGHT: f32 = 0.5;
/// Reference point for margin comparisons
const MARGIN_PIVOT: f32 = 0.5;

// ============================================================================
// PRIMITIVES
// ============================================================================

/// Clamp a probability into [0, 1]; NaN counts as 0
pub fn clamp_prob(v: f32) -> f32 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

/// `max · (1 + |p - o| · 0.5)`, times 0.7 for water, clamped
pub fn confidence_score(p_plastic: f32, p_oil: f32, is_water: bool) -> f32 {
    let p = clamp_prob(p_plastic);
    let o = clamp_prob(p_oil);

    let spread_factor = 1.0 + (p - o).abs() * SPREAD_WEIGHT;
    let water_penalty = if is_water { WATER_PENALTY } else { 1.0 };

    (p.max(o) * spread_factor * water_penalty).clamp(0.0, 1.0)
}

// ============================================================================
// DECISION
// ============================================================================

/// Which branch of a policy produced the label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Branch {
    WaterOverride,
    LowConfidence,
    StrongPlastic,
    StrongOil,
    BelowNone,
    WeakPlastic,
    WeakOil,
    MarginTooSmall,
    BothAbovePlastic,
    BothAboveOil,
    OnlyPlastic,
    OnlyOil,
    NoClearSignal,
}

impl Branch {
    pub fn tag(&self) -> &'static str {
        match self {
            Branch::WaterOverride => "water_override",
            Branch::LowConfidence => "low_confidence",
            Branch::StrongPlastic => "strong_plastic",
            Branch::StrongOil => "strong_oil",
            Branch::BelowNone => "below_none_threshold",
            Branch::WeakPlastic => "weak_plastic",
            Branch::WeakOil => "weak_oil",
            Branch::MarginTooSmall => "margin_too_small",
            Branch::BothAbovePlastic => "both_above_plastic_stronger",
            Branch::BothAboveOil => "both_above_oil_stronger",
            Branch::OnlyPlastic => "only_plastic_above",
            Branch::OnlyOil => "only_oil_above",
            Branch::NoClearSignal => "no_clear_signal",
        }
    }
}

/// Engine output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub label: Label,
    pub policy: PolicyName,
    pub branch: Branch,
    pub confidence: f32,
    pub plastic_prob: f32,
    pub oil_prob: f32,
    pub reason: String,
}

impl Decision {
    /// Label name under the deciding policy
    pub fn label_name(&self) -> &'static str {
        self.policy.label_name(self.label)
    }
}

// ============================================================================
// ENGINE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecisionEngine {
    policy: PolicyName,
    thresholds: ThresholdSet,
}

impl DecisionEngine {
    pub fn new(policy: PolicyName, thresholds: ThresholdSet) -> Self {
        Self {
            policy,
            thresholds: thresholds.clamped(),
        }
    }

    pub fn from_thresholds(policy: PolicyName, all: &PolicyThresholds) -> Self {
        Self::new(policy, all.for_policy(policy))
    }

    pub fn policy(&self) -> PolicyName {
        self.policy
    }

    pub fn thresholds(&self) -> &ThresholdSet {
        &self.thresholds
    }

    pub fn decide(&self, p_plastic: f32, p_oil: f32, is_water: bool) -> Decision {
        let p = clamp_prob(p_plastic);
        let o = clamp_prob(p_oil);

        let decision = match self.policy {
            PolicyName::Sequential => self.sequential(p, o, is_water),
            PolicyName::ConfidenceGated => self.confidence_gated(p, o),
            PolicyName::MarginBalanced => self.margin_balanced(p, o),
        };

        log::info!(
            "Decision ({}): plastic={:.4} oil={:.4} water={} -> {} ({}, confidence={:.4})",
            self.policy, p, o, is_water, decision.label_name(), decision.branch.tag(), decision.confidence
        );
        decision
    }

    fn outcome(&self, label: Label, branch: Branch, confidence: f32, p: f32, o: f32, detail: String) -> Decision {
        let reason = if detail.is_empty() {
            format!("{}: plastic={:.4} oil={:.4}", branch.tag(), p, o)
        } else {
            format!("{}: plastic={:.4} oil={:.4} {}", branch.tag(), p, o, detail)
        };

        Decision {
            label,
            policy: self.policy,
            branch,
            confidence: confidence.clamp(0.0, 1.0),
            plastic_prob: p,
            oil_prob: o,
            reason,
        }
    }

    /// Policy A steps 1-4, shared with policy B
    fn threshold_steps(&self, p: f32, o: f32, confidence: f32) -> Decision {
        let t = &self.thresholds;

        if p >= t.plastic_threshold {
            return self.outcome(Label::Plastic, Branch::StrongPlastic, confidence, p, o,
                format!("plastic_threshold={:.2}", t.plastic_threshold));
        }

        if o >= t.oil_threshold {
            return self.outcome(Label::OilSpill, Branch::StrongOil, confidence, p, o,
                format!("oil_threshold={:.2}", t.oil_threshold));
        }

        if p.max(o) < t.none_threshold {
            return self.outcome(Label::Undetected, Branch::BelowNone, confidence, p, o,
                format!("none_threshold={:.2}", t.none_threshold));
        }

        // Weak band: ties go to plastic
        if p >= o {
            self.outcome(Label::Plastic, Branch::WeakPlastic, confidence, p, o, String::new())
        } else {
            self.outcome(Label::OilSpill, Branch::WeakOil, confidence, p, o, String::new())
        }
    }

    fn sequential(&self, p: f32, o: f32, is_water: bool) -> Decision {
        let confidence = confidence_score(p, o, is_water);

        if is_water {
            return self.outcome(Label::Undetected, Branch::WaterOverride, confidence, p, o, String::new());
        }

        self.threshold_steps(p, o, confidence)
    }

    fn confidence_gated(&self, p: f32, o: f32) -> Decision {
        let max_prob = p.max(o);
        let gate = self.thresholds.confidence_or_default();

        if max_prob < gate {
            return self.outcome(Label::Undetected, Branch::LowConfidence, max_prob, p, o,
                format!("confidence_threshold={:.2}", gate));
        }

        self.threshold_steps(p, o, max_prob)
    }

    fn margin_balanced(&self, p: f32, o: f32) -> Decision {
        let t = &self.thresholds;
        let margin = t.margin_or_default();
        let confidence = confidence_score(p, o, false);

        if p < t.none_threshold && o < t.none_threshold {
            return self.outcome(Label::Undetected, Branch::BelowNone, confidence, p, o,
                format!("none_threshold={:.2}", t.none_threshold));
        }

        let plastic_above = p >= t.plastic_threshold;
        let oil_above = o >= t.oil_threshold;

        if plastic_above && oil_above {
            let margin_p = p - MARGIN_PIVOT;
            let margin_o = o - MARGIN_PIVOT;
            let diff = (margin_p - margin_o).abs();
            let detail = format!("diff={:.4} margin={:.2}", diff, margin);

            if diff < margin {
                return self.outcome(Label::Undetected, Branch::MarginTooSmall, confidence, p, o, detail);
            }
            return if margin_p > margin_o {
                self.outcome(Label::Plastic, Branch::BothAbovePlastic, confidence, p, o, detail)
            } else {
                self.outcome(Label::OilSpill, Branch::BothAboveOil, confidence, p, o, detail)
            };
        }

        if plastic_above {
            return self.outcome(Label::Plastic, Branch::OnlyPlastic, confidence, p, o,
                format!("plastic_threshold={:.2}", t.plastic_threshold));
        }

        if oil_above {
            return self.outcome(Label::OilSpill, Branch::OnlyOil, confidence, p, o,
                format!("oil_threshold={:.2}", t.oil_threshold));
        }

        if p.max(o) >= t.none_threshold {
            return if p >= o {
                self.outcome(Label::Plastic, Branch::WeakPlastic, confidence, p, o, String::new())
            } else {
                self.outcome(Label::OilSpill, Branch::WeakOil, confidence, p, o, String::new())
            };
        }

        self.outcome(Label::Undetected, Branch::NoClearSignal, confidence, p, o, String::new())
    }
}
