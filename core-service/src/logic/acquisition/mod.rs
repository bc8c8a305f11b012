//! Image Acquisition Module - resilient fetch with gateway fallback
//!
//! # Flow
//! 1. Cache lookup by `sha256(source)`; a fresh hit never touches the network.
//! 2. Candidate list (`candidates.rs`): original URL, then gateway mirrors.
//! 3. Each candidate gets `attempts` tries with exponential backoff;
//!    only HTTP 200 counts as success.
//! 4. When every candidate is exhausted, one unretried attempt with the
//!    longer final timeout.
//! 5. Successful bytes are written back to the cache. Write failures are
//!    logged and the bytes are still returned.
//!
//! The per-key cache lock is held across 1-5, so concurrent requests for the
//! same source perform a single fetch.

pub mod cache;
pub mod candidates;
pub mod transport;
#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use cache::{key_hash, CacheEntry, CacheError, CachedImage, ImageCache};
pub use candidates::{expand_candidates, extract_cid, gateway_url, is_bare_cid, is_http_url};
pub use transport::{HttpResponse, HttpTransport, TransportError, UreqTransport};

use crate::constants::{
    CID_LENGTHS, DEFAULT_BACKOFF_MAX_MS, DEFAULT_BACKOFF_MS, DEFAULT_FETCH_ATTEMPTS,
    DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_FINAL_TIMEOUT_SECS, DEFAULT_GATEWAYS,
    DEFAULT_STATUS_TIMEOUT_SECS,
};

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AcquisitionError {
    #[error("failed to fetch {key} after {attempts} attempts: {last_cause}")]
    Exhausted {
        key: String,
        attempts: u32,
        last_cause: String,
    },

    #[error("empty image source")]
    EmptySource,

    #[error("not a URL or content identifier: {0}")]
    UnsupportedSource(String),
}

/// Retry schedule, timeouts and gateway mirrors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchConfig {
    pub gateways: Vec<String>,
    pub timeout: Duration,
    pub final_timeout: Duration,
    pub status_timeout: Duration,
    pub attempts: u32,
    pub backoff: Duration,
    pub backoff_max: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            gateways: DEFAULT_GATEWAYS.iter().map(|g| g.to_string()).collect(),
            timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            final_timeout: Duration::from_secs(DEFAULT_FINAL_TIMEOUT_SECS),
            status_timeout: Duration::from_secs(DEFAULT_STATUS_TIMEOUT_SECS),
            attempts: DEFAULT_FETCH_ATTEMPTS,
            backoff: Duration::from_millis(DEFAULT_BACKOFF_MS),
            backoff_max: Duration::from_millis(DEFAULT_BACKOFF_MAX_MS),
        }
    }
}

impl FetchConfig {
    /// Pauses between tries of one candidate: `backoff`, doubling, capped at
    /// `backoff_max`. One fewer than `attempts`, so nothing follows the last try.
    pub fn backoff_schedule(&self) -> impl Iterator<Item = Duration> {
        let cap = self.backoff_max;
        std::iter::successors(Some(self.backoff.min(cap)), move |delay| {
            Some(delay.saturating_mul(2).min(cap))
        })
        .take(self.attempts.max(1) as usize - 1)
    }
}

/// Where the bytes came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FetchSource {
    Cache,
    Candidate { index: usize, url: String },
    FinalAttempt { url: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    pub key_hash: String,
    pub source: FetchSource,
}

/// One row of a gateway probe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayCheck {
    pub url: String,
    pub status: Option<u16>,
    pub content_length: Option<usize>,
    pub content_type: Option<String>,
    pub error: Option<String>,
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayProbe {
    pub cid: String,
    pub cid_valid: bool,
    pub gateways_tested: Vec<GatewayCheck>,
}

// ============================================================================
// FETCHER
// ============================================================================

pub struct ImageFetcher {
    transport: Arc<dyn HttpTransport>,
    cache: ImageCache,
    config: FetchConfig,
}

impl ImageFetcher {
    pub fn new(transport: Arc<dyn HttpTransport>, cache: ImageCache, config: FetchConfig) -> Self {
        Self { transport, cache, config }
    }

    pub fn cache(&self) -> &ImageCache {
        &self.cache
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Bytes for a URL or CID, from cache when fresh
    pub fn fetch(&self, source: &str) -> Result<FetchedImage, AcquisitionError> {
        let source = source.trim();
        if source.is_empty() {
            return Err(AcquisitionError::EmptySource);
        }

        let hash = key_hash(source);
        let lock = self.cache.key_lock(&hash);
        let _guard = lock.lock();

        match self.cache.get_by_hash(&hash) {
            Ok(Some(cached)) => {
                log::info!("Serving {} from cache ({} bytes)", source, cached.bytes.len());
                return Ok(FetchedImage {
                    bytes: cached.bytes,
                    content_type: cached.entry.content_type,
                    key_hash: hash,
                    source: FetchSource::Cache,
                });
            }
            Ok(None) => {}
            Err(e) => log::warn!("Cache read failed for {}, refetching: {}", source, e),
        }

        let (response, origin) = self.fetch_network(source)?;

        if let Err(e) = self.cache.put(source, &response.body, response.content_type.as_deref()) {
            log::warn!("Failed to write image cache for {}: {}", source, e);
        }

        Ok(FetchedImage {
            bytes: response.body,
            content_type: response.content_type,
            key_hash: hash,
            source: origin,
        })
    }

    fn fetch_network(&self, source: &str) -> Result<(HttpResponse, FetchSource), AcquisitionError> {
        let candidates = expand_candidates(source, &self.config.gateways);
        let Some(first) = candidates.first() else {
            return Err(AcquisitionError::UnsupportedSource(source.to_string()));
        };

        let mut attempts = 0;
        let mut last_cause = String::new();

        for (index, url) in candidates.iter().enumerate() {
            match self.try_candidate(url, &mut attempts) {
                Ok(response) => {
                    log::info!("Fetched image from candidate {} ({})", index, url);
                    return Ok((response, FetchSource::Candidate { index, url: url.clone() }));
                }
                Err(cause) => {
                    log::debug!("Candidate {} failed: {}", url, cause);
                    last_cause = cause;
                }
            }
        }

        let final_url = if is_http_url(source) { source } else { first.as_str() };
        log::warn!("All {} candidates failed, final attempt against {}", candidates.len(), final_url);
        attempts += 1;

        match self.transport.get(final_url, self.config.final_timeout) {
            Ok(response) if (200..300).contains(&response.status) => {
                Ok((response, FetchSource::FinalAttempt { url: final_url.to_string() }))
            }
            Ok(response) => Err(self.exhausted(source, attempts, format!("{} from {}", response.status, final_url))),
            Err(e) => Err(self.exhausted(source, attempts, e.to_string())),
        }
    }

    /// Up to `attempts` tries against one URL; returns the last failure cause
    fn try_candidate(&self, url: &str, attempts: &mut u32) -> Result<HttpResponse, String> {
        let mut delays = self.config.backoff_schedule();
        let mut cause = format!("no attempt made for {}", url);

        for attempt in 1..=self.config.attempts.max(1) {
            *attempts += 1;

            match self.transport.get(url, self.config.timeout) {
                Ok(response) if response.status == 200 => return Ok(response),
                Ok(response) if response.status == 429 => {
                    log::warn!("Rate limited (429) from {}", url);
                    cause = format!("429 from {}", url);
                }
                Ok(response) => {
                    log::warn!("Non-200 response {} from {}", response.status, url);
                    cause = format!("{} from {}", response.status, url);
                }
                Err(e @ TransportError::InvalidUrl(_)) => return Err(e.to_string()),
                Err(e) => {
                    log::warn!("Fetch error for {}: {}", url, e);
                    cause = e.to_string();
                }
            }

            if let Some(delay) = delays.next() {
                log::debug!("Retrying {} in {:?} (attempt {})", url, delay, attempt);
                if !delay.is_zero() {
                    std::thread::sleep(delay);
                }
            }
        }

        Err(cause)
    }

    fn exhausted(&self, source: &str, attempts: u32, last_cause: String) -> AcquisitionError {
        log::warn!("Giving up on {} after {} attempts: {}", source, attempts, last_cause);
        AcquisitionError::Exhausted {
            key: source.to_string(),
            attempts,
            last_cause,
        }
    }

    /// One unretried GET per configured gateway, for diagnostics
    pub fn probe_gateways(&self, cid: &str) -> GatewayProbe {
        let cid = cid.trim();
        log::info!("Probing {} gateways for CID {}", self.config.gateways.len(), cid);

        let gateways_tested = self.config.gateways
            .iter()
            .map(|gateway| {
                let url = gateway_url(gateway, cid);
                match self.transport.get(&url, self.config.status_timeout) {
                    Ok(response) => {
                        log::info!("  {}: {} ({} bytes)", url, response.status, response.body.len());
                        GatewayCheck {
                            success: response.status == 200,
                            status: Some(response.status),
                            content_length: Some(response.body.len()),
                            content_type: response.content_type,
                            error: None,
                            url,
                        }
                    }
                    Err(e) => {
                        log::warn!("  {}: FAILED - {}", url, e);
                        GatewayCheck {
                            url,
                            status: None,
                            content_length: None,
                            content_type: None,
                            error: Some(e.to_string()),
                            success: false,
                        }
                    }
                }
            })
            .collect();

        GatewayProbe {
            cid: cid.to_string(),
            cid_valid: CID_LENGTHS.contains(&cid.len()),
            gateways_tested,
        }
    }
}
