//! Detector Module - two probabilities per image
//!
//! `DualDetector` is the capability: `predict(sample) -> (p_plastic, p_oil)`.
//!
//! # Variants
//! - `onnx.rs`: model-backed, two ONNX binary classifiers.
//! - `heuristic.rs`: color-statistics fallback, never fails.
//!
//! # Failure Strategy
//! `DetectorContext` is built once at startup and holds the tagged mode.
//! A failed load, or any later inference error, demotes it to the heuristic
//! for the rest of the process (until `reload()`), logging the cause once.
//! Callers never see detector errors.

pub mod heuristic;
pub mod onnx;
pub mod output;
#[cfg(test)]
mod tests;

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

pub use heuristic::HeuristicDetector;
pub use onnx::{BinaryClassifier, ModelBackedDetector, OnnxClassifier};
pub use output::{normalize_output, RawOutput};

use crate::logic::sample::ImageSample;

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum DetectorError {
    #[error("model not found: {}", .0.display())]
    ModelNotFound(PathBuf),

    #[error("session error: {0}")]
    Session(String),

    #[error("inference error: {0}")]
    Inference(String),

    #[error("unsupported model output shape {shape:?}")]
    UnsupportedOutputShape { shape: Vec<usize> },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityPair {
    pub p_plastic: f32,
    pub p_oil: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    Model,
    Heuristic,
}

/// Probabilities plus the detector that produced them
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub probabilities: ProbabilityPair,
    pub kind: DetectorKind,
}

/// Source of two probabilities per image
pub trait DualDetector: Send + Sync {
    fn kind(&self) -> DetectorKind;
    fn predict(&self, sample: &ImageSample) -> Result<ProbabilityPair, DetectorError>;
}

/// Model file locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub plastic_model: PathBuf,
    pub oil_model: PathBuf,
    pub target_size: (u32, u32),
}

/// Typed result of a load attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded,
    Unavailable(String),
}

/// Current detector
enum DetectorMode {
    ModelBacked(Arc<dyn DualDetector>),
    Heuristic { reason: String },
}

/// Engine status for operators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStatus {
    pub mode: DetectorKind,
    pub models_loaded: bool,
    pub reason: Option<String>,
    pub plastic_model: Option<String>,
    pub oil_model: Option<String>,
    pub inference_device: String,
    pub inference_count: u64,
    pub avg_latency_ms: f32,
}

// ============================================================================
// CONTEXT
// ============================================================================

pub struct DetectorContext {
    mode: RwLock<DetectorMode>,
    fallback: HeuristicDetector,
    models: Option<ModelConfig>,
    latency_sum_us: AtomicU64,
    inference_count: AtomicU64,
}

impl DetectorContext {
    /// Try the model-backed detector; demote to the heuristic on any failure
    pub fn load(models: ModelConfig) -> (Self, LoadOutcome) {
        let (mode, outcome) = Self::try_load(&models);
        let ctx = Self::with_mode(mode, Some(models));
        (ctx, outcome)
    }

    /// Context around an already-built detector
    pub fn with_detector(detector: Arc<dyn DualDetector>) -> Self {
        Self::with_mode(DetectorMode::ModelBacked(detector), None)
    }

    pub fn heuristic_only(reason: impl Into<String>) -> Self {
        Self::with_mode(DetectorMode::Heuristic { reason: reason.into() }, None)
    }

    fn with_mode(mode: DetectorMode, models: Option<ModelConfig>) -> Self {
        Self {
            mode: RwLock::new(mode),
            fallback: HeuristicDetector::new(),
            models,
            latency_sum_us: AtomicU64::new(0),
            inference_count: AtomicU64::new(0),
        }
    }

    fn try_load(models: &ModelConfig) -> (DetectorMode, LoadOutcome) {
        match ModelBackedDetector::load(models) {
            Ok(detector) => {
                log::info!("Both models loaded - using model-backed detector");
                (DetectorMode::ModelBacked(Arc::new(detector)), LoadOutcome::Loaded)
            }
            Err(e) => {
                let reason = e.to_string();
                log::warn!("Models unavailable ({}) - using heuristic fallback", reason);
                (DetectorMode::Heuristic { reason: reason.clone() }, LoadOutcome::Unavailable(reason))
            }
        }
    }

    /// Re-attempt model load, lifting any earlier demotion
    pub fn reload(&self) -> LoadOutcome {
        let Some(models) = &self.models else {
            return LoadOutcome::Unavailable("no model paths configured".to_string());
        };

        let (mode, outcome) = Self::try_load(models);
        *self.mode.write() = mode;
        outcome
    }

    pub fn is_model_loaded(&self) -> bool {
        matches!(*self.mode.read(), DetectorMode::ModelBacked(_))
    }

    pub fn current_kind(&self) -> DetectorKind {
        match *self.mode.read() {
            DetectorMode::ModelBacked(_) => DetectorKind::Model,
            DetectorMode::Heuristic { .. } => DetectorKind::Heuristic,
        }
    }

    /// Switch to the heuristic; only the first caller logs
    fn demote(&self, reason: String) {
        let mut mode = self.mode.write();
        if let DetectorMode::ModelBacked(_) = *mode {
            log::warn!("Model-backed detector demoted to heuristic: {}", reason);
            *mode = DetectorMode::Heuristic { reason };
        }
    }

    /// Never fails; falls back to the heuristic
    pub fn detect(&self, sample: &ImageSample) -> Detection {
        let start = Instant::now();

        let model = match &*self.mode.read() {
            DetectorMode::ModelBacked(detector) => Some(Arc::clone(detector)),
            DetectorMode::Heuristic { .. } => None,
        };

        let detection = model
            .and_then(|detector| match detector.predict(sample) {
                Ok(probabilities) => Some(Detection { probabilities, kind: DetectorKind::Model }),
                Err(e) => {
                    self.demote(e.to_string());
                    None
                }
            })
            .unwrap_or_else(|| Detection {
                probabilities: HeuristicDetector::estimate(&sample.stats),
                kind: self.fallback.kind(),
            });

        self.latency_sum_us.fetch_add(start.elapsed().as_micros() as u64, Ordering::Relaxed);
        self.inference_count.fetch_add(1, Ordering::Relaxed);

        detection
    }

    pub fn status(&self) -> EngineStatus {
        let (mode, reason) = match &*self.mode.read() {
            DetectorMode::ModelBacked(_) => (DetectorKind::Model, None),
            DetectorMode::Heuristic { reason } => (DetectorKind::Heuristic, Some(reason.clone())),
        };

        let sum = self.latency_sum_us.load(Ordering::Relaxed);
        let count = self.inference_count.load(Ordering::Relaxed);
        let avg = if count > 0 { (sum as f32 / count as f32) / 1000.0 } else { 0.0 };

        EngineStatus {
            mode,
            models_loaded: mode == DetectorKind::Model,
            reason,
            plastic_model: self.models.as_ref().map(|m| m.plastic_model.display().to_string()),
            oil_model: self.models.as_ref().map(|m| m.oil_model.display().to_string()),
            inference_device: match mode {
                DetectorKind::Model => "ONNX Runtime (CPU)".to_string(),
                DetectorKind::Heuristic => "color heuristic".to_string(),
            },
            inference_count: count,
            avg_latency_ms: avg,
        }
    }
}

impl DualDetector for DetectorContext {
    fn kind(&self) -> DetectorKind {
        self.current_kind()
    }

    fn predict(&self, sample: &ImageSample) -> Result<ProbabilityPair, DetectorError> {
        Ok(self.detect(sample).probabilities)
    }
}
