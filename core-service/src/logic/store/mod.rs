//! Prediction Store - report id → persisted label
//!
//! One flat JSON document:
//! ```json
//! { "42": { "predicted_label": "plastic", "saved_by": "predict_service", "forced": false } }
//! ```
//! The document is loaded once at open and held behind a mutex. Every `put`
//! rewrites the whole document while holding the lock; a failed write rolls
//! the in-memory entry back so memory and disk never disagree.
//! Writes are last-write-wins.
//!
//! Entries whose label this build does not know (e.g. `unclassified`) are kept
//! verbatim: they count toward the total, never toward a label breakdown, are
//! not returned by `get`, and survive every rewrite.


use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::constants::SAVED_BY;
use crate::logic::decision::Label;
use crate::logic::storage::{save_json, SaveError};

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid report id: {0:?}")]
    InvalidReportId(String),
}

impl From<SaveError> for StoreError {
    fn from(e: SaveError) -> Self {
        match e {
            SaveError::Io(e) => StoreError::Io(e),
            SaveError::Serialization(e) => StoreError::Serialization(e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedPrediction {
    pub predicted_label: Label,
    pub saved_by: String,
    #[serde(default)]
    pub forced: bool,
}

/// Counts per label across the whole document; unrecognized entries only
/// count toward the total
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionSummary {
    pub total_predictions: usize,
    pub breakdown: BTreeMap<String, usize>,
    /// Share of the total per label, rounded to 0.1
    pub percentages: BTreeMap<String, f64>,
}

// ============================================================================
// STORE
// ============================================================================

/// Document entry as written back to disk
#[derive(Serialize)]
#[serde(untagged)]
enum StoredEntry<'a> {
    Known(&'a PersistedPrediction),
    Raw(&'a serde_json::Value),
}

#[derive(Default)]
struct Document {
    entries: BTreeMap<String, PersistedPrediction>,
    unrecognized: BTreeMap<String, serde_json::Value>,
}

impl Document {
    fn parse(data: &[u8]) -> Result<Self, serde_json::Error> {
        let raw: BTreeMap<String, serde_json::Value> = serde_json::from_slice(data)?;
        let mut doc = Document::default();

        for (report_id, value) in raw {
            match PersistedPrediction::deserialize(&value) {
                Ok(record) => {
                    doc.entries.insert(report_id, record);
                }
                Err(e) => {
                    log::warn!("Keeping unrecognized prediction for report {} as-is: {}", report_id, e);
                    doc.unrecognized.insert(report_id, value);
                }
            }
        }
        Ok(doc)
    }

    fn len(&self) -> usize {
        self.entries.len() + self.unrecognized.len()
    }

    fn to_disk(&self) -> BTreeMap<&str, StoredEntry<'_>> {
        let mut out: BTreeMap<&str, StoredEntry<'_>> = self
            .unrecognized
            .iter()
            .map(|(id, value)| (id.as_str(), StoredEntry::Raw(value)))
            .collect();
        out.extend(self.entries.iter().map(|(id, record)| (id.as_str(), StoredEntry::Known(record))));
        out
    }
}

pub struct PredictionStore {
    path: PathBuf,
    doc: Mutex<Document>,
}

impl PredictionStore {
    /// Load the document; a missing file is an empty store, malformed JSON an error
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();

        let doc = match fs::read(&path) {
            Ok(data) if data.iter().all(u8::is_ascii_whitespace) => Document::default(),
            Ok(data) => Document::parse(&data)?,
            Err(e) if e.kind() == ErrorKind::NotFound => Document::default(),
            Err(e) => return Err(e.into()),
        };

        log::info!(
            "Prediction store {} opened ({} entries, {} unrecognized)",
            path.display(), doc.len(), doc.unrecognized.len()
        );
        Ok(Self { path, doc: Mutex::new(doc) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every entry in the document, unrecognized ones included
    pub fn len(&self) -> usize {
        self.doc.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, report_id: &str) -> Option<PersistedPrediction> {
        self.doc.lock().entries.get(report_id.trim()).cloned()
    }

    /// Overwrite any earlier entry and flush the whole document
    pub fn put(&self, report_id: &str, label: Label, forced: bool) -> Result<PersistedPrediction, StoreError> {
        let report_id = report_id.trim();
        if report_id.is_empty() {
            return Err(StoreError::InvalidReportId(report_id.to_string()));
        }

        let record = PersistedPrediction {
            predicted_label: label,
            saved_by: SAVED_BY.to_string(),
            forced,
        };

        let mut doc = self.doc.lock();
        let previous = doc.entries.insert(report_id.to_string(), record.clone());
        let replaced_raw = doc.unrecognized.remove(report_id);

        if let Err(e) = save_json(&doc.to_disk(), &self.path) {
            log::error!("Failed to persist prediction for report {}: {}", report_id, e);
            match previous {
                Some(prev) => doc.entries.insert(report_id.to_string(), prev),
                None => doc.entries.remove(report_id),
            };
            if let Some(raw) = replaced_raw {
                doc.unrecognized.insert(report_id.to_string(), raw);
            }
            return Err(e.into());
        }

        log::info!("Persisted prediction for report {} -> {}", report_id, label);
        Ok(record)
    }

    pub fn summary(&self) -> PredictionSummary {
        let doc = self.doc.lock();
        let total = doc.len();

        let mut breakdown: BTreeMap<String, usize> =
            Label::ALL.iter().map(|l| (l.as_str().to_string(), 0)).collect();
        for record in doc.entries.values() {
            *breakdown.entry(record.predicted_label.as_str().to_string()).or_default() += 1;
        }

        let percentages = breakdown
            .iter()
            .map(|(label, count)| {
                let pct = if total == 0 { 0.0 } else { *count as f64 / total as f64 * 100.0 };
                (label.clone(), (pct * 10.0).round() / 10.0)
            })
            .collect();

        PredictionSummary {
            total_predictions: total,
            breakdown,
            percentages,
        }
    }
}
