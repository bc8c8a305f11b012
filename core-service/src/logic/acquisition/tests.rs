use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::*;

const CID: &str = "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG";
const DAY: Duration = Duration::from_secs(24 * 3600);

type Scripted = Result<HttpResponse, TransportError>;

/// Replays queued responses per URL and records every request
#[derive(Default)]
struct ScriptedTransport {
    script: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: Mutex<Vec<(String, Duration)>>,
}

impl ScriptedTransport {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push(&self, url: &str, response: Scripted) {
        self.script.lock().entry(url.to_string()).or_default().push_back(response);
    }

    fn push_status(&self, url: &str, status: u16, times: usize) {
        for _ in 0..times {
            self.push(url, Ok(HttpResponse::status(status)));
        }
    }

    fn calls(&self) -> Vec<(String, Duration)> {
        self.calls.lock().clone()
    }

    fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

impl HttpTransport for ScriptedTransport {
    fn get(&self, url: &str, timeout: Duration) -> Result<HttpResponse, TransportError> {
        self.calls.lock().push((url.to_string(), timeout));
        self.script
            .lock()
            .get_mut(url)
            .and_then(|queue| queue.pop_front())
            .unwrap_or_else(|| Err(TransportError::Network(format!("connection refused: {}", url))))
    }
}

fn test_config() -> FetchConfig {
    FetchConfig {
        gateways: vec![
            "https://ipfs.io/ipfs/".to_string(),
            "https://cloudflare-ipfs.com/ipfs/".to_string(),
            "https://dweb.link/ipfs/".to_string(),
            "https://gateway.pinata.cloud/ipfs/".to_string(),
        ],
        backoff: Duration::ZERO,
        backoff_max: Duration::ZERO,
        ..FetchConfig::default()
    }
}

fn fetcher(transport: &Arc<ScriptedTransport>, dir: &std::path::Path, ttl: Duration) -> ImageFetcher {
    ImageFetcher::new(transport.clone(), ImageCache::new(dir, ttl), test_config())
}

#[test]
fn test_second_fetch_within_ttl_is_served_from_cache() {
    let dir = tempfile::tempdir().unwrap();
    let transport = ScriptedTransport::new();
    let url = "https://example.org/beach.png";
    transport.push(url, Ok(HttpResponse::ok(vec![9, 8, 7], Some("image/png"))));

    let fetcher = fetcher(&transport, dir.path(), DAY);
    let first = fetcher.fetch(url).unwrap();
    let second = fetcher.fetch(url).unwrap();

    assert_eq!(transport.call_count(), 1);
    assert_eq!(first.bytes, second.bytes);
    assert_eq!(second.content_type.as_deref(), Some("image/png"));
    assert_eq!(first.source, FetchSource::Candidate { index: 0, url: url.to_string() });
    assert_eq!(second.source, FetchSource::Cache);
}

#[test]
fn test_fourth_candidate_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let transport = ScriptedTransport::new();
    let source = format!("https://gateway.pinata.cloud/ipfs/{}", CID);
    let ipfs_io = format!("https://ipfs.io/ipfs/{}", CID);
    let cloudflare = format!("https://cloudflare-ipfs.com/ipfs/{}", CID);
    let dweb = format!("https://dweb.link/ipfs/{}", CID);

    transport.push_status(&source, 500, 3);
    transport.push_status(&ipfs_io, 429, 3);
    transport.push_status(&cloudflare, 404, 3);
    transport.push(&dweb, Ok(HttpResponse::ok(b"pixels".to_vec(), None)));

    let fetched = fetcher(&transport, dir.path(), DAY).fetch(&source).unwrap();

    assert_eq!(fetched.bytes, b"pixels");
    assert_eq!(fetched.source, FetchSource::Candidate { index: 3, url: dweb.clone() });
    assert_eq!(transport.call_count(), 10);
    assert_eq!(transport.calls().last().unwrap().0, dweb);
}

#[test]
fn test_rate_limit_is_retried_on_same_candidate() {
    let dir = tempfile::tempdir().unwrap();
    let transport = ScriptedTransport::new();
    let url = "https://example.org/a.jpg";
    transport.push_status(url, 429, 1);
    transport.push(url, Err(TransportError::Network("timed out".to_string())));
    transport.push(url, Ok(HttpResponse::ok(b"ok".to_vec(), Some("image/jpeg"))));

    let fetched = fetcher(&transport, dir.path(), DAY).fetch(url).unwrap();

    assert_eq!(fetched.source, FetchSource::Candidate { index: 0, url: url.to_string() });
    assert_eq!(transport.call_count(), 3);
}

#[test]
fn test_exhaustion_ends_with_final_attempt() {
    let dir = tempfile::tempdir().unwrap();
    let transport = ScriptedTransport::new();
    let url = "https://example.org/gone.png";
    transport.push_status(url, 503, 3);
    transport.push_status(url, 410, 1);

    let err = fetcher(&transport, dir.path(), DAY).fetch(url).unwrap_err();

    match err {
        AcquisitionError::Exhausted { key, attempts, last_cause } => {
            assert_eq!(key, url);
            assert_eq!(attempts, 4);
            assert!(last_cause.contains("410"), "{}", last_cause);
        }
        other => panic!("expected Exhausted, got {:?}", other),
    }

    let calls = transport.calls();
    assert_eq!(calls[2].1, Duration::from_secs(15));
    assert_eq!(calls[3], (url.to_string(), Duration::from_secs(30)));
    assert!(fetcher(&transport, dir.path(), DAY).cache().get(url).unwrap().is_none());
}

#[test]
fn test_final_attempt_can_succeed() {
    let dir = tempfile::tempdir().unwrap();
    let transport = ScriptedTransport::new();
    let url = "https://example.org/slow.png";
    transport.push_status(url, 502, 3);
    transport.push(url, Ok(HttpResponse::ok(b"late".to_vec(), None)));

    let fetched = fetcher(&transport, dir.path(), DAY).fetch(url).unwrap();
    assert_eq!(fetched.source, FetchSource::FinalAttempt { url: url.to_string() });
    assert_eq!(fetched.bytes, b"late");
}

#[test]
fn test_bare_cid_never_requests_the_cid_itself() {
    let dir = tempfile::tempdir().unwrap();
    let transport = ScriptedTransport::new();
    let cloudflare = format!("https://cloudflare-ipfs.com/ipfs/{}", CID);
    transport.push(&cloudflare, Ok(HttpResponse::ok(b"cid".to_vec(), None)));

    let fetched = fetcher(&transport, dir.path(), DAY).fetch(CID).unwrap();

    assert_eq!(fetched.source, FetchSource::Candidate { index: 1, url: cloudflare });
    assert!(transport.calls().iter().all(|(url, _)| url.starts_with("https://")));
}

#[test]
fn test_stale_entry_is_refetched_and_overwritten() {
    let dir = tempfile::tempdir().unwrap();
    let transport = ScriptedTransport::new();
    let url = "https://example.org/tide.png";
    transport.push(url, Ok(HttpResponse::ok(b"old".to_vec(), None)));
    transport.push(url, Ok(HttpResponse::ok(b"new".to_vec(), None)));

    let stale = fetcher(&transport, dir.path(), Duration::ZERO);
    stale.fetch(url).unwrap();
    let refetched = stale.fetch(url).unwrap();

    assert_eq!(transport.call_count(), 2);
    assert_eq!(refetched.bytes, b"new");

    let fresh = fetcher(&transport, dir.path(), DAY);
    assert_eq!(fresh.cache().get(url).unwrap().unwrap().bytes, b"new");
}

#[test]
fn test_cache_write_failure_still_returns_bytes() {
    let blocker = tempfile::NamedTempFile::new().unwrap();
    let transport = ScriptedTransport::new();
    let url = "https://example.org/a.png";
    transport.push(url, Ok(HttpResponse::ok(b"bytes".to_vec(), None)));

    // Cache directory path is a regular file
    let fetcher = fetcher(&transport, blocker.path(), DAY);
    let fetched = fetcher.fetch(url).unwrap();

    assert_eq!(fetched.bytes, b"bytes");
}

#[test]
fn test_empty_and_unsupported_sources() {
    let dir = tempfile::tempdir().unwrap();
    let transport = ScriptedTransport::new();
    let fetcher = fetcher(&transport, dir.path(), DAY);

    assert!(matches!(fetcher.fetch("   "), Err(AcquisitionError::EmptySource)));
    assert!(matches!(fetcher.fetch("beach.png"), Err(AcquisitionError::UnsupportedSource(_))));
    assert_eq!(transport.call_count(), 0);
}

#[test]
fn test_concurrent_fetches_share_one_download() {
    let dir = tempfile::tempdir().unwrap();
    let transport = ScriptedTransport::new();
    let url = "https://example.org/shared.png";
    transport.push(url, Ok(HttpResponse::ok(b"once".to_vec(), None)));

    let fetcher = fetcher(&transport, dir.path(), DAY);
    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4).map(|_| scope.spawn(|| fetcher.fetch(url))).collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap().unwrap().bytes, b"once");
        }
    });

    assert_eq!(transport.call_count(), 1);
}

#[test]
fn test_probe_reports_each_gateway() {
    let dir = tempfile::tempdir().unwrap();
    let transport = ScriptedTransport::new();
    transport.push(&format!("https://ipfs.io/ipfs/{}", CID), Ok(HttpResponse::ok(vec![0; 12], Some("image/png"))));
    transport.push(&format!("https://dweb.link/ipfs/{}", CID), Ok(HttpResponse::status(504)));

    let probe = fetcher(&transport, dir.path(), DAY).probe_gateways(CID);

    assert!(probe.cid_valid);
    assert_eq!(probe.gateways_tested.len(), 4);
    assert!(probe.gateways_tested[0].success);
    assert_eq!(probe.gateways_tested[0].content_length, Some(12));
    assert!(probe.gateways_tested[1].error.is_some());
    assert_eq!(probe.gateways_tested[2].status, Some(504));
    assert!(!probe.gateways_tested[2].success);
    assert!(transport.calls().iter().all(|(_, timeout)| *timeout == Duration::from_secs(5)));
}

#[test]
fn test_default_backoff_schedule() {
    let delays: Vec<Duration> = FetchConfig::default().backoff_schedule().collect();
    assert_eq!(delays, vec![Duration::from_millis(500), Duration::from_millis(1000)]);
}

#[test]
fn test_backoff_doubles_up_to_cap() {
    let config = FetchConfig {
        attempts: 5,
        backoff: Duration::from_millis(500),
        backoff_max: Duration::from_secs(3),
        ..FetchConfig::default()
    };

    let delays: Vec<Duration> = config.backoff_schedule().collect();
    assert_eq!(
        delays,
        vec![
            Duration::from_millis(500),
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(3),
        ]
    );
}

#[test]
fn test_single_attempt_never_waits() {
    let config = FetchConfig { attempts: 1, ..FetchConfig::default() };
    assert_eq!(config.backoff_schedule().count(), 0);

    let config = FetchConfig { attempts: 0, ..FetchConfig::default() };
    assert_eq!(config.backoff_schedule().count(), 0);
}
