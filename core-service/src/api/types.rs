use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MarineError;
use crate::logic::decision::{Branch, Decision, Label, PolicyName, PolicyThresholds};
use crate::logic::detector::{DetectorKind, EngineStatus};
use crate::logic::water::{WaterGate, WaterRule};

// ============================================================================
// CLASSIFICATION
// ============================================================================

/// One classified image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub label: Label,
    /// Label as the deciding policy names it
    pub label_name: String,
    /// Dashboard category
    pub category: String,
    pub plastic_prob: f32,
    pub oil_prob: f32,
    pub confidence: f32,
    pub is_water: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub water_rule: Option<WaterRule>,
    pub policy: PolicyName,
    pub branch: Branch,
    /// `None` when the water gate answered without running a detector
    pub detector: Option<DetectorKind>,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

impl PredictionResult {
    pub fn from_decision(
        decision: Decision,
        water_rule: Option<WaterRule>,
        detector: Option<DetectorKind>,
    ) -> Self {
        Self {
            label: decision.label,
            label_name: decision.label_name().to_string(),
            category: decision.label.category().to_string(),
            plastic_prob: decision.plastic_prob,
            oil_prob: decision.oil_prob,
            confidence: decision.confidence,
            is_water: decision.branch == Branch::WaterOverride,
            water_rule,
            policy: decision.policy,
            branch: decision.branch,
            detector,
            reason: decision.reason,
            timestamp: Utc::now(),
        }
    }
}

// ============================================================================
// BATCH
// ============================================================================

/// Per-input outcome, in input order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItem {
    pub index: usize,
    pub source: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<PredictionResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchItem {
    pub fn from_outcome(index: usize, source: &str, outcome: Result<PredictionResult, MarineError>) -> Self {
        match outcome {
            Ok(result) => Self {
                index,
                source: source.to_string(),
                success: true,
                result: Some(result),
                error: None,
            },
            Err(e) => Self {
                index,
                source: source.to_string(),
                success: false,
                result: None,
                error: Some(e.to_string()),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub batch_size: usize,
    pub successful: usize,
    pub failed: usize,
    pub results: Vec<BatchItem>,
}

impl BatchReport {
    pub fn new(results: Vec<BatchItem>) -> Self {
        let successful = results.iter().filter(|item| item.success).count();
        Self {
            batch_size: results.len(),
            successful,
            failed: results.len() - successful,
            results,
        }
    }
}

// ============================================================================
// STATUS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub app: String,
    pub version: String,
    pub started_at: DateTime<Utc>,
    pub policy: PolicyName,
    pub water_gate: WaterGate,
    pub thresholds: PolicyThresholds,
    pub target_size: (u32, u32),
    pub engine: EngineStatus,
    pub cache_directory: PathBuf,
    pub predictions_file: PathBuf,
    pub stored_predictions: usize,
    pub max_batch_size: usize,
    pub gateways: Vec<String>,
}
