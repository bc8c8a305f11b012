//! Service configuration
//!
//! `ServiceConfig::from_env()` reads the enumerated environment surface,
//! falling back to the defaults in `constants.rs`. The result is immutable
//! for the lifetime of a `MarineService`.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::logic::acquisition::FetchConfig;
use crate::logic::decision::{PolicyName, PolicyThresholds, ThresholdSet};
use crate::logic::detector::ModelConfig;
use crate::logic::water::WaterGate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub policy: PolicyName,
    pub thresholds: PolicyThresholds,
    pub water_gate: WaterGate,
    pub models: ModelConfig,
    pub cache_dir: PathBuf,
    pub cache_max_age: Duration,
    pub predictions_file: PathBuf,
    pub max_batch_size: usize,
    pub batch_workers: usize,
    pub fetch: FetchConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            policy: PolicyName::default(),
            thresholds: PolicyThresholds::default(),
            water_gate: WaterGate::default(),
            models: ModelConfig {
                plastic_model: PathBuf::from(DEFAULT_PLASTIC_MODEL),
                oil_model: PathBuf::from(DEFAULT_OIL_MODEL),
                target_size: DEFAULT_TARGET_SIZE,
            },
            cache_dir: data_dir.join(DEFAULT_CACHE_DIR_NAME),
            cache_max_age: hours(DEFAULT_CACHE_MAX_AGE_HOURS),
            predictions_file: data_dir.join(DEFAULT_PREDICTIONS_FILE_NAME),
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            batch_workers: DEFAULT_BATCH_WORKERS,
            fetch: FetchConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let plastic = env_threshold("PRED_PLASTIC_THRESHOLD", DEFAULT_PLASTIC_THRESHOLD);
        let oil = env_threshold("PRED_OIL_THRESHOLD", DEFAULT_OIL_THRESHOLD);
        let none = env_threshold("PRED_NONE_THRESHOLD", DEFAULT_NONE_THRESHOLD);
        let sequential = ThresholdSet::new(plastic, oil, none);

        let thresholds = PolicyThresholds {
            sequential,
            confidence_gated: sequential.with_confidence(env_threshold(
                "PRED_CONFIDENCE_THRESHOLD",
                DEFAULT_CONFIDENCE_THRESHOLD,
            )),
            margin_balanced: ThresholdSet::new(
                env_threshold("CLASSIFY_PLASTIC_THRESHOLD", DEFAULT_MARGIN_PLASTIC_THRESHOLD),
                env_threshold("CLASSIFY_OIL_THRESHOLD", DEFAULT_MARGIN_OIL_THRESHOLD),
                env_threshold("CLASSIFY_NONE_THRESHOLD", DEFAULT_MARGIN_NONE_THRESHOLD),
            )
            .with_margin(env_threshold("CLASSIFY_MARGIN", DEFAULT_MARGIN)),
        };

        let policy = std::env::var("PRED_POLICY")
            .ok()
            .and_then(|raw| {
                PolicyName::parse(&raw).or_else(|| {
                    log::warn!("PRED_POLICY={:?} is not a known policy, using default", raw);
                    None
                })
            })
            .unwrap_or_default();

        let water_gate = std::env::var("PRED_WATER_GATE")
            .ok()
            .and_then(|raw| {
                WaterGate::parse(&raw).or_else(|| {
                    log::warn!("PRED_WATER_GATE={:?} is not a known gate, using standard", raw);
                    None
                })
            })
            .unwrap_or_default();

        let target_size = std::env::var("PRED_TARGET_SIZE")
            .ok()
            .and_then(|raw| {
                parse_target_size(&raw).or_else(|| {
                    log::warn!("PRED_TARGET_SIZE={:?} is not a size, using default", raw);
                    None
                })
            })
            .unwrap_or(DEFAULT_TARGET_SIZE);

        let defaults = FetchConfig::default();
        let fetch = FetchConfig {
            gateways: std::env::var("IPFS_GATEWAYS")
                .ok()
                .map(|raw| parse_gateways(&raw))
                .filter(|list| !list.is_empty())
                .unwrap_or(defaults.gateways),
            timeout: Duration::from_secs(env_parse("FETCH_TIMEOUT_SECS", DEFAULT_FETCH_TIMEOUT_SECS)),
            final_timeout: Duration::from_secs(env_parse("FETCH_FINAL_TIMEOUT_SECS", DEFAULT_FINAL_TIMEOUT_SECS)),
            status_timeout: Duration::from_secs(env_parse("STATUS_TIMEOUT_SECS", DEFAULT_STATUS_TIMEOUT_SECS)),
            attempts: env_parse("FETCH_ATTEMPTS", DEFAULT_FETCH_ATTEMPTS).max(1),
            backoff: Duration::from_millis(env_parse("FETCH_BACKOFF_MS", DEFAULT_BACKOFF_MS)),
            backoff_max: Duration::from_millis(env_parse("FETCH_BACKOFF_MAX_MS", DEFAULT_BACKOFF_MAX_MS)),
        };

        Self {
            policy,
            thresholds,
            water_gate,
            models: ModelConfig {
                plastic_model: PathBuf::from(env_string("PLASTIC_MODEL_PATH", DEFAULT_PLASTIC_MODEL)),
                oil_model: PathBuf::from(env_string("OIL_MODEL_PATH", DEFAULT_OIL_MODEL)),
                target_size,
            },
            cache_dir: env_path("CACHE_DIR", DEFAULT_CACHE_DIR_NAME),
            cache_max_age: hours(env_parse("CACHE_MAX_AGE_HOURS", DEFAULT_CACHE_MAX_AGE_HOURS)),
            predictions_file: env_path("PREDICTIONS_FILE", DEFAULT_PREDICTIONS_FILE_NAME),
            max_batch_size: env_parse("MAX_BATCH_SIZE", DEFAULT_MAX_BATCH_SIZE).max(1),
            batch_workers: env_parse("BATCH_WORKERS", DEFAULT_BATCH_WORKERS).max(1),
            fetch,
        }
    }

    /// Everything under one directory (tests, sandboxes)
    pub fn rooted_at(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            models: ModelConfig {
                plastic_model: dir.join(DEFAULT_PLASTIC_MODEL),
                oil_model: dir.join(DEFAULT_OIL_MODEL),
                target_size: DEFAULT_TARGET_SIZE,
            },
            cache_dir: dir.join(DEFAULT_CACHE_DIR_NAME),
            predictions_file: dir.join(DEFAULT_PREDICTIONS_FILE_NAME),
            ..Self::default()
        }
    }
}

/// `224`, `224,224` or `224x224`
pub fn parse_target_size(raw: &str) -> Option<(u32, u32)> {
    let parts: Vec<u32> = raw
        .split(|c| c == ',' || c == 'x' || c == 'X')
        .map(|p| p.trim().parse().ok())
        .collect::<Option<_>>()?;

    match parts[..] {
        [side] if side > 0 => Some((side, side)),
        [w, h] if w > 0 && h > 0 => Some((w, h)),
        _ => None,
    }
}

/// Comma-separated gateway prefixes, order preserved
pub fn parse_gateways(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .map(str::to_string)
        .collect()
}

/// Saturates instead of overflowing on absurd env values
fn hours(h: u64) -> Duration {
    Duration::from_secs(h.saturating_mul(3600))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_target_size() {
        assert_eq!(parse_target_size("224"), Some((224, 224)));
        assert_eq!(parse_target_size("320, 240"), Some((320, 240)));
        assert_eq!(parse_target_size("128x96"), Some((128, 96)));
        assert_eq!(parse_target_size("0,10"), None);
        assert_eq!(parse_target_size("big"), None);
        assert_eq!(parse_target_size("1,2,3"), None);
    }

    #[test]
    fn test_parse_gateways_keeps_order() {
        assert_eq!(
            parse_gateways(" https://a/ipfs/, ,https://b/ipfs/ "),
            vec!["https://a/ipfs/".to_string(), "https://b/ipfs/".to_string()]
        );
    }

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.policy, PolicyName::Sequential);
        assert_eq!(config.water_gate, WaterGate::Standard);
        assert_eq!(config.models.target_size, (224, 224));
        assert_eq!(config.cache_max_age, Duration::from_secs(24 * 3600));
        assert_eq!(config.max_batch_size, 20);
        assert_eq!(config.thresholds.margin_balanced.margin, Some(0.15));
        assert_eq!(config.fetch.attempts, 3);
    }

    #[test]
    fn test_huge_cache_age_saturates() {
        assert_eq!(hours(24), Duration::from_secs(86_400));
        assert_eq!(hours(u64::MAX), Duration::from_secs(u64::MAX));
    }

    #[test]
    fn test_rooted_at_keeps_files_together() {
        let config = ServiceConfig::rooted_at("/tmp/marine");
        assert!(config.cache_dir.starts_with("/tmp/marine"));
        assert!(config.predictions_file.starts_with("/tmp/marine"));
        assert!(config.models.plastic_model.starts_with("/tmp/marine"));
    }
}
