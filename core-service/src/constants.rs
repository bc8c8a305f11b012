//! Central Configuration Constants
//!
//! Single source of truth for all configuration defaults.
//! `ServiceConfig::from_env()` reads the environment through the helpers below.

use std::path::PathBuf;

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// App name
pub const APP_NAME: &str = "marine-core";

/// Value written to `saved_by` for persisted predictions
pub const SAVED_BY: &str = "predict_service";

// ============================================
// Image processing
// ============================================

/// Default model input size (width, height)
pub const DEFAULT_TARGET_SIZE: (u32, u32) = (224, 224);

/// Resolution used for color statistics (water gate + heuristic detector)
pub const STATS_SIZE: u32 = 128;

pub const DEFAULT_PLASTIC_MODEL: &str = "models/plastic_detection_model.onnx";
pub const DEFAULT_OIL_MODEL: &str = "models/oil_spill_detection_model.onnx";

/// Confidence reported when the water gate short-circuits a request
pub const WATER_GATE_CONFIDENCE: f32 = 0.95;

// ============================================
// Decision thresholds
// ============================================

pub const DEFAULT_PLASTIC_THRESHOLD: f32 = 0.25;
pub const DEFAULT_OIL_THRESHOLD: f32 = 0.35;
pub const DEFAULT_NONE_THRESHOLD: f32 = 0.15;
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.35;

pub const DEFAULT_MARGIN_PLASTIC_THRESHOLD: f32 = 0.7;
pub const DEFAULT_MARGIN_OIL_THRESHOLD: f32 = 0.7;
pub const DEFAULT_MARGIN_NONE_THRESHOLD: f32 = 0.5;
pub const DEFAULT_MARGIN: f32 = 0.15;

// ============================================
// Acquisition
// ============================================

/// IPFS gateways, ordered by preference
pub const DEFAULT_GATEWAYS: [&str; 5] = [
    "https://ipfs.io/ipfs/",
    "https://cloudflare-ipfs.com/ipfs/",
    "https://dweb.link/ipfs/",
    "https://gateway.pinata.cloud/ipfs/",
    "https://infura-ipfs.io/ipfs/",
];

/// Lengths of a bare CID (CIDv0 base58 and CIDv1 base32)
pub const CID_LENGTHS: [usize; 2] = [46, 59];

pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_FINAL_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_STATUS_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_FETCH_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF_MS: u64 = 500;
pub const DEFAULT_BACKOFF_MAX_MS: u64 = 3000;

/// Hard ceiling on a single response body
pub const MAX_IMAGE_BYTES: u64 = 25 * 1024 * 1024;

pub const USER_AGENT: &str = "marine-db-fetcher/1.0";

// ============================================
// Cache / store / batch
// ============================================

pub const DEFAULT_CACHE_DIR_NAME: &str = "cache_images";
pub const DEFAULT_PREDICTIONS_FILE_NAME: &str = "predictions.json";
pub const DEFAULT_CACHE_MAX_AGE_HOURS: u64 = 24;
pub const DEFAULT_MAX_BATCH_SIZE: usize = 20;
pub const DEFAULT_BATCH_WORKERS: usize = 4;

// ============================================
// Helper functions to read from env with fallback
// ============================================

/// Base directory for cache and prediction document
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Read a string variable, falling back to `default`
pub fn env_string(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Read and parse a variable; unparsable values fall back with a warning
pub fn env_parse<T: std::str::FromStr + Copy + std::fmt::Debug>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            log::warn!("{}={:?} is not valid, using default {:?}", name, raw, default);
            default
        }),
        Err(_) => default,
    }
}

/// Read a probability-like threshold, clamped into [0, 1]
pub fn env_threshold(name: &str, default: f32) -> f32 {
    let value = env_parse(name, default);
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        default
    }
}

/// Read a path variable, defaulting under the data directory
pub fn env_path(name: &str, file_name: &str) -> PathBuf {
    std::env::var(name)
        .map(PathBuf::from)
        .unwrap_or_else(|_| default_data_dir().join(file_name))
}
