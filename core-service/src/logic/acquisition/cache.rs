//! Content-addressed image cache
//!
//! Layout: `<dir>/<sha256(key)>.bin` holds the bytes, `<sha256(key)>.bin.meta`
//! holds a JSON `CacheEntry`. An entry is fresh while `now - stored_at < max_age`;
//! stale entries are ignored and later overwritten whole.
//!
//! Writers for the same key serialise on a per-key lock (`key_lock`);
//! `get_consistent` takes the same lock for readers outside the fetch path.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::logic::storage::write_atomic;

/// Idle locks are dropped once the table grows past this
const LOCK_TABLE_PRUNE_AT: usize = 1024;

/// Largest tolerated `stored_at` lead over the local clock
const MAX_CLOCK_SKEW: Duration = Duration::from_secs(300);

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache metadata error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key_hash: String,
    pub content_type: Option<String>,
    pub stored_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CachedImage {
    pub entry: CacheEntry,
    pub bytes: Vec<u8>,
}

pub fn key_hash(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

pub struct ImageCache {
    dir: PathBuf,
    max_age: Duration,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ImageCache {
    pub fn new(dir: impl Into<PathBuf>, max_age: Duration) -> Self {
        Self {
            dir: dir.into(),
            max_age,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    fn data_path(&self, hash: &str) -> PathBuf {
        self.dir.join(format!("{}.bin", hash))
    }

    fn meta_path(&self, hash: &str) -> PathBuf {
        self.dir.join(format!("{}.bin.meta", hash))
    }

    /// Lock shared by every caller working on the same key hash
    pub fn key_lock(&self, hash: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock();
        if locks.len() >= LOCK_TABLE_PRUNE_AT {
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
        Arc::clone(locks.entry(hash.to_string()).or_default())
    }

    pub fn is_fresh(&self, entry: &CacheEntry) -> bool {
        if self.max_age.is_zero() {
            return false;
        }

        let now = Utc::now();
        match now.signed_duration_since(entry.stored_at).to_std() {
            Ok(age) => age < self.max_age,
            // stored_at ahead of the clock
            Err(_) => entry
                .stored_at
                .signed_duration_since(now)
                .to_std()
                .is_ok_and(|skew| skew <= MAX_CLOCK_SKEW.min(self.max_age)),
        }
    }

    /// Sidecar metadata. A plain-text sidecar is read as a bare content type,
    /// and a missing one falls back to the data file's mtime.
    fn read_entry(&self, hash: &str) -> Result<Option<CacheEntry>, CacheError> {
        let data_path = self.data_path(hash);
        let modified = match fs::metadata(&data_path) {
            Ok(meta) => meta.modified()?,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut entry = CacheEntry {
            key_hash: hash.to_string(),
            content_type: None,
            stored_at: DateTime::<Utc>::from(modified),
        };

        if let Ok(raw) = fs::read_to_string(self.meta_path(hash)) {
            match serde_json::from_str::<CacheEntry>(&raw) {
                Ok(stored) => entry = stored,
                Err(_) => {
                    let raw = raw.trim();
                    if !raw.is_empty() {
                        entry.content_type = Some(raw.to_string());
                    }
                }
            }
        }

        Ok(Some(entry))
    }

    /// Fresh entry for a lookup key
    pub fn get(&self, key: &str) -> Result<Option<CachedImage>, CacheError> {
        self.get_by_hash(&key_hash(key))
    }

    /// Like `get`, but waits out any writer holding the key lock so bytes and
    /// metadata come from the same `put`. Must not be called with that lock held.
    pub fn get_consistent(&self, key: &str) -> Result<Option<CachedImage>, CacheError> {
        let hash = key_hash(key);
        let lock = self.key_lock(&hash);
        let _guard = lock.lock();
        self.get_by_hash(&hash)
    }

    pub fn get_by_hash(&self, hash: &str) -> Result<Option<CachedImage>, CacheError> {
        let Some(entry) = self.read_entry(hash)? else {
            return Ok(None);
        };

        if !self.is_fresh(&entry) {
            log::debug!("Cache entry {} is stale (stored {})", hash, entry.stored_at);
            return Ok(None);
        }

        match fs::read(self.data_path(hash)) {
            Ok(bytes) => Ok(Some(CachedImage { entry, bytes })),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Store bytes under a key, replacing whatever was there
    pub fn put(&self, key: &str, bytes: &[u8], content_type: Option<&str>) -> Result<CacheEntry, CacheError> {
        let hash = key_hash(key);
        let entry = CacheEntry {
            key_hash: hash.clone(),
            content_type: content_type.map(str::to_string),
            stored_at: Utc::now(),
        };

        write_atomic(&self.data_path(&hash), bytes)?;
        write_atomic(&self.meta_path(&hash), &serde_json::to_vec_pretty(&entry)?)?;

        log::info!("Cached {} bytes for key {}", bytes.len(), hash);
        Ok(entry)
    }
}
