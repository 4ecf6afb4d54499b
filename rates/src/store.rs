//! Persistent rate snapshot and history storage.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::debug;

use fxhub_common::{format_compact, storage, RatePair, Result, Timestamp};

/// One cached rate value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateEntry {
    /// Units of the quote currency per one unit of the base currency.
    pub rate: f64,
    /// When this value was produced.
    pub updated_at: Timestamp,
    /// Where the value came from, e.g. `CoinGecko` or `local-fallback`.
    pub source: String,
}

/// The current-rates document: the newest known value per pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RateSnapshot {
    /// Entries keyed by `FROM_TO`.
    #[serde(default)]
    pub pairs: BTreeMap<String, RateEntry>,
    /// Timestamp of the last completed update run, if any.
    #[serde(default)]
    pub last_refresh: Option<Timestamp>,
}

impl RateSnapshot {
    /// Look up the entry for a pair.
    pub fn entry(&self, pair: &RatePair) -> Option<&RateEntry> {
        self.pairs.get(&pair.key())
    }

    /// Merge a candidate entry, keeping whichever value is newer.
    ///
    /// The stored entry wins ties: a candidate is applied only when its
    /// `updated_at` is strictly newer. Returns whether the candidate landed.
    pub fn merge_entry(&mut self, pair: &RatePair, candidate: RateEntry) -> bool {
        let key = pair.key();
        match self.pairs.get(&key) {
            Some(current) if current.updated_at >= candidate.updated_at => {
                debug!(
                    pair = %pair,
                    current = %current.updated_at,
                    candidate = %candidate.updated_at,
                    "Keeping newer stored entry"
                );
                false
            }
            _ => {
                self.pairs.insert(key, candidate);
                true
            }
        }
    }
}

/// One append-only history line for a fetched rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// Deterministic id, `FROM_TO_<run timestamp>`.
    pub id: String,
    pub from_currency: String,
    pub to_currency: String,
    pub rate: f64,
    pub timestamp: Timestamp,
    /// Source that produced the value.
    pub source: String,
    /// Source-specific details, e.g. HTTP status and request latency.
    #[serde(default)]
    pub meta: serde_json::Value,
}

impl HistoryRecord {
    /// Build a record for one fetched pair within an update run.
    ///
    /// Records from the same run share `run_at`, so re-fetching a pair in
    /// the same run produces the same id and deduplicates on append.
    pub fn new(
        pair: &RatePair,
        rate: f64,
        run_at: Timestamp,
        source: &str,
        meta: serde_json::Value,
    ) -> Self {
        Self {
            id: format!("{}_{}", pair.key(), format_compact(run_at)),
            from_currency: pair.from.as_str().to_string(),
            to_currency: pair.to.as_str().to_string(),
            rate,
            timestamp: run_at,
            source: source.to_string(),
            meta,
        }
    }
}

/// File-backed store for the rate snapshot and the fetch history.
///
/// The documents on disk are the source of truth: every operation re-reads
/// them rather than caching across calls. A single writing process is
/// assumed; writes themselves are atomic temp-file renames.
#[derive(Debug, Clone)]
pub struct RateStore {
    rates_path: PathBuf,
    history_path: PathBuf,
}

impl RateStore {
    /// Store over the given snapshot and history files.
    pub fn new(rates_path: impl Into<PathBuf>, history_path: impl Into<PathBuf>) -> Self {
        Self {
            rates_path: rates_path.into(),
            history_path: history_path.into(),
        }
    }

    /// Path of the snapshot document.
    pub fn rates_path(&self) -> &Path {
        &self.rates_path
    }

    /// Path of the history document.
    pub fn history_path(&self) -> &Path {
        &self.history_path
    }

    /// Read the current snapshot. Missing or empty file means no rates yet.
    pub fn read_snapshot(&self) -> Result<RateSnapshot> {
        storage::read_json_or_default(&self.rates_path)
    }

    /// Atomically replace the snapshot document.
    pub fn write_snapshot(&self, snapshot: &RateSnapshot) -> Result<()> {
        storage::write_json_atomic(&self.rates_path, snapshot)
    }

    /// Read the full fetch history, oldest first.
    pub fn read_history(&self) -> Result<Vec<HistoryRecord>> {
        storage::read_json_or_default(&self.history_path)
    }

    /// Append records to the history, skipping ids already present.
    ///
    /// Returns how many records were actually appended. When every record
    /// is a duplicate the file is left untouched.
    pub fn append_history(&self, records: &[HistoryRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut history = self.read_history()?;
        let mut known: HashSet<String> = history.iter().map(|r| r.id.clone()).collect();

        let mut appended = 0;
        for record in records {
            if known.insert(record.id.clone()) {
                history.push(record.clone());
                appended += 1;
            }
        }

        if appended == 0 {
            debug!(records = records.len(), "All history records are duplicates");
            return Ok(0);
        }

        storage::write_json_atomic(&self.history_path, &history)?;
        Ok(appended)
    }
}
