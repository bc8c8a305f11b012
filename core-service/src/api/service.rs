//! Marine Service - the one entry point collaborators talk to
//!
//! Owns every shared resource: detector context, fetcher + cache, prediction
//! store, batch worker pool. Built once, then shared by reference.
//!
//! Control flow per image:
//! decode → water gate → (water: undetected) | detector → decision engine.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rayon::prelude::*;

use super::types::{BatchItem, BatchReport, PredictionResult, ServiceStatus};
use crate::constants::{APP_NAME, APP_VERSION, WATER_GATE_CONFIDENCE};
use crate::error::{MarineError, MarineResult};
use crate::logic::acquisition::{CachedImage, GatewayProbe, HttpTransport, ImageCache, ImageFetcher, UreqTransport};
use crate::logic::config::ServiceConfig;
use crate::logic::decision::{Branch, Decision, DecisionEngine, Label, PolicyName};
use crate::logic::detector::{DetectorContext, LoadOutcome};
use crate::logic::sample::ImageSample;
use crate::logic::store::{PersistedPrediction, PredictionStore, PredictionSummary};
use crate::logic::water::WaterVerdict;

pub struct MarineService {
    config: ServiceConfig,
    detectors: DetectorContext,
    fetcher: ImageFetcher,
    store: PredictionStore,
    batch_pool: Option<rayon::ThreadPool>,
    started_at: DateTime<Utc>,
}

impl MarineService {
    /// Production wiring: ONNX models from disk, `ureq` transport
    pub fn new(config: ServiceConfig) -> MarineResult<Self> {
        let (detectors, _) = DetectorContext::load(config.models.clone());
        Self::from_parts(config, detectors, Arc::new(UreqTransport::new()))
    }

    pub fn from_parts(
        config: ServiceConfig,
        detectors: DetectorContext,
        transport: Arc<dyn HttpTransport>,
    ) -> MarineResult<Self> {
        let cache = ImageCache::new(&config.cache_dir, config.cache_max_age);
        let fetcher = ImageFetcher::new(transport, cache, config.fetch.clone());
        let store = PredictionStore::open(&config.predictions_file)?;

        let batch_pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(config.batch_workers.max(1))
            .thread_name(|i| format!("{}-batch-{}", APP_NAME, i))
            .build()
        {
            Ok(pool) => Some(pool),
            Err(e) => {
                log::warn!("Batch worker pool unavailable, batches run sequentially: {}", e);
                None
            }
        };

        log::info!(
            "{} v{} ready: policy={} water_gate={} detector={:?}",
            APP_NAME, APP_VERSION, config.policy, config.water_gate.as_str(), detectors.current_kind()
        );

        Ok(Self {
            config,
            detectors,
            fetcher,
            store,
            batch_pool,
            started_at: Utc::now(),
        })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    // ========================================================================
    // CLASSIFICATION
    // ========================================================================

    /// Classify in-memory bytes under the configured policy
    pub fn classify(&self, image_bytes: &[u8]) -> MarineResult<PredictionResult> {
        self.classify_with_policy(image_bytes, self.config.policy)
    }

    pub fn classify_with_policy(&self, image_bytes: &[u8], policy: PolicyName) -> MarineResult<PredictionResult> {
        let sample = ImageSample::decode(image_bytes)?;
        Ok(self.classify_sample(&sample, policy))
    }

    /// Fetch (cache, gateways, retries) then classify
    pub fn classify_from_source(&self, source: &str) -> MarineResult<PredictionResult> {
        let fetched = self.fetcher.fetch(source)?;
        log::debug!("Classifying {} ({} bytes, {:?})", source, fetched.bytes.len(), fetched.source);
        self.classify(&fetched.bytes)
    }

    fn classify_sample(&self, sample: &ImageSample, policy: PolicyName) -> PredictionResult {
        let verdict = self.config.water_gate.check(sample);
        if verdict.is_water {
            log::info!("Water detected ({}), skipping detectors", verdict.reason);
            let rule = verdict.rule;
            return PredictionResult::from_decision(water_decision(policy, verdict), rule, None);
        }

        let detection = self.detectors.detect(sample);
        let engine = DecisionEngine::from_thresholds(policy, &self.config.thresholds);
        let decision = engine.decide(
            detection.probabilities.p_plastic,
            detection.probabilities.p_oil,
            false,
        );

        PredictionResult::from_decision(decision, None, Some(detection.kind))
    }

    /// Up to `max_batch_size` sources, results in input order
    pub fn classify_batch<S>(&self, sources: &[S]) -> MarineResult<BatchReport>
    where
        S: AsRef<str> + Sync,
    {
        let max = self.config.max_batch_size;
        if sources.is_empty() {
            return Err(MarineError::EmptyBatch);
        }
        if sources.len() > max {
            return Err(MarineError::BatchTooLarge { len: sources.len(), max });
        }

        log::info!("Batch: processing {} sources", sources.len());
        let total = sources.len();

        let classify_one = |(index, source): (usize, &S)| {
            let source = source.as_ref();
            log::info!("  [{}/{}] Processing: {}", index + 1, total, source);
            let outcome = self.classify_from_source(source);
            if let Err(e) = &outcome {
                log::warn!("  [{}/{}] Failed: {}", index + 1, total, e);
            }
            BatchItem::from_outcome(index, source, outcome)
        };

        let results: Vec<BatchItem> = match &self.batch_pool {
            Some(pool) => pool.install(|| sources.par_iter().enumerate().map(&classify_one).collect()),
            None => sources.iter().enumerate().map(&classify_one).collect(),
        };

        let report = BatchReport::new(results);
        log::info!("Batch: completed {}/{}", report.successful, report.batch_size);
        Ok(report)
    }

    // ========================================================================
    // CACHE / STORE
    // ========================================================================

    /// Fresh cached bytes for a URL or CID
    pub fn get_cached_bytes(&self, key: &str) -> MarineResult<CachedImage> {
        let key = key.trim();
        match self.fetcher.cache().get_consistent(key) {
            Ok(Some(cached)) => Ok(cached),
            Ok(None) => Err(MarineError::NotFound(key.to_string())),
            Err(e) => {
                log::warn!("Cache read failed for {}: {}", key, e);
                Err(MarineError::NotFound(key.to_string()))
            }
        }
    }

    /// Persist a label; accepts wire names and display names
    pub fn save_prediction(&self, report_id: &str, label: &str, forced: bool) -> MarineResult<PersistedPrediction> {
        let label: Label = label.parse().map_err(MarineError::InvalidLabel)?;
        Ok(self.store.put(report_id, label, forced)?)
    }

    pub fn get_prediction(&self, report_id: &str) -> MarineResult<PersistedPrediction> {
        self.store
            .get(report_id)
            .ok_or_else(|| MarineError::NotFound(report_id.trim().to_string()))
    }

    pub fn prediction_summary(&self) -> PredictionSummary {
        self.store.summary()
    }

    // ========================================================================
    // OPERATIONS
    // ========================================================================

    pub fn status(&self) -> ServiceStatus {
        ServiceStatus {
            app: APP_NAME.to_string(),
            version: APP_VERSION.to_string(),
            started_at: self.started_at,
            policy: self.config.policy,
            water_gate: self.config.water_gate,
            thresholds: self.config.thresholds,
            target_size: self.config.models.target_size,
            engine: self.detectors.status(),
            cache_directory: self.config.cache_dir.clone(),
            predictions_file: self.config.predictions_file.clone(),
            stored_predictions: self.store.len(),
            max_batch_size: self.config.max_batch_size,
            gateways: self.config.fetch.gateways.clone(),
        }
    }

    /// Re-attempt model load; lifts an earlier demotion on success
    pub fn reload_detectors(&self) -> LoadOutcome {
        self.detectors.reload()
    }

    pub fn probe_gateways(&self, cid: &str) -> GatewayProbe {
        self.fetcher.probe_gateways(cid)
    }
}

/// Water-gate answer; the detectors never ran
fn water_decision(policy: PolicyName, verdict: WaterVerdict) -> Decision {
    Decision {
        label: Label::Undetected,
        policy,
        branch: Branch::WaterOverride,
        confidence: WATER_GATE_CONFIDENCE,
        plastic_prob: 0.0,
        oil_prob: 0.0,
        reason: format!(
            "{}: plastic={:.4} oil={:.4} {}",
            Branch::WaterOverride.tag(), 0.0, 0.0, verdict.reason
        ),
    }
}
