//! Multi-source rate update runs.

use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use fxhub_common::{now_secs, HubError, RatePair, Result, Timestamp};

use crate::source::RateSource;
use crate::store::{HistoryRecord, RateEntry, RateStore};

/// Configuration for update runs.
#[derive(Debug, Clone)]
pub struct UpdaterConfig {
    /// Per-source fetch budget; a source that exceeds it counts as failed.
    pub source_timeout: Duration,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            source_timeout: fxhub_common::time::constants::default_source_timeout(),
        }
    }
}

/// Outcome of one update run.
#[derive(Debug, Clone)]
pub struct UpdateResult {
    /// Distinct pairs staged from the sources that answered.
    pub updated_count: usize,
    /// Run timestamp stamped on every record and on the snapshot.
    pub last_refresh: Timestamp,
    /// One message per failed source.
    pub errors: Vec<String>,
}

/// One quote accepted from a source during a run. When several sources
/// quote the same pair, the later one replaces the earlier.
struct Staged {
    pair: RatePair,
    rate: f64,
    source: String,
    meta: serde_json::Value,
}

/// Pulls quotes from all configured sources and folds them into the store.
pub struct RateUpdater {
    store: Arc<RateStore>,
    config: UpdaterConfig,
}

impl RateUpdater {
    /// Updater writing into `store`.
    pub fn new(store: Arc<RateStore>, config: UpdaterConfig) -> Self {
        Self { store, config }
    }

    /// Run one update across `sources`.
    ///
    /// Source failures never abort the run: each failing source contributes
    /// one message to `errors` while the rest still land. Only a storage
    /// failure during the final persist makes the run itself fail. All
    /// records of the run share a single whole-second timestamp, and the
    /// snapshot's `last_refresh` advances even when every source failed.
    #[instrument(skip(self, sources), fields(sources = sources.len()))]
    pub async fn run_update(&self, sources: &[Arc<dyn RateSource>]) -> Result<UpdateResult> {
        let started = now_secs();
        info!(run_at = %started, "Starting rate update run");

        let fetches = sources.iter().map(|source| {
            let budget = self.config.source_timeout;
            async move {
                let name = source.name().to_string();
                let outcome = match tokio::time::timeout(budget, source.fetch_rates()).await {
                    Ok(result) => result,
                    Err(_) => Err(HubError::Upstream {
                        reason: format!("{}: timed out after {:?}", name, budget),
                    }),
                };
                (name, outcome)
            }
        });

        let mut staged: BTreeMap<String, Staged> = BTreeMap::new();
        let mut errors = Vec::new();

        for (name, outcome) in join_all(fetches).await {
            let fetched = match outcome {
                Ok(fetched) => fetched,
                Err(err) => {
                    warn!(source = %name, error = %err, "Source failed, continuing with the rest");
                    errors.push(err.to_string());
                    continue;
                }
            };

            debug!(source = %name, pairs = fetched.rates.len(), "Source answered");
            let meta = fetched.meta.to_value();

            for (key, rate) in &fetched.rates {
                let pair = match RatePair::parse_key(key) {
                    Ok(pair) => pair,
                    Err(err) => {
                        debug!(key = %key, error = %err, "Skipping unparseable pair key");
                        continue;
                    }
                };
                if pair.is_identity() {
                    debug!(key = %key, "Skipping identity pair");
                    continue;
                }
                if !rate.is_finite() || *rate <= 0.0 {
                    debug!(key = %key, rate, "Skipping non-positive rate");
                    continue;
                }

                staged.insert(
                    pair.key(),
                    Staged {
                        pair,
                        rate: *rate,
                        source: fetched.meta.source.clone(),
                        meta: meta.clone(),
                    },
                );
            }
        }

        let records: Vec<HistoryRecord> = staged
            .values()
            .map(|s| HistoryRecord::new(&s.pair, s.rate, started, &s.source, s.meta.clone()))
            .collect();
        let appended = self.store.append_history(&records)?;

        let mut snapshot = self.store.read_snapshot()?;
        let mut applied = 0;
        for s in staged.values() {
            let entry = RateEntry {
                rate: s.rate,
                updated_at: started,
                source: s.source.clone(),
            };
            if snapshot.merge_entry(&s.pair, entry) {
                applied += 1;
            }
        }
        snapshot.last_refresh = Some(started);
        self.store.write_snapshot(&snapshot)?;

        info!(
            updated = staged.len(),
            applied,
            appended,
            failed_sources = errors.len(),
            "Update run persisted"
        );

        Ok(UpdateResult {
            updated_count: staged.len(),
            last_refresh: started,
            errors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MockRateSource;
    use crate::store::RateSnapshot;
    use chrono::Duration as ChronoDuration;
    use fxhub_common::CurrencyCode;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Arc<RateStore>, RateUpdater) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(RateStore::new(
            dir.path().join("rates.json"),
            dir.path().join("history.json"),
        ));
        let updater = RateUpdater::new(store.clone(), UpdaterConfig::default());
        (dir, store, updater)
    }

    fn pair(from: &str, to: &str) -> RatePair {
        RatePair::new(
            CurrencyCode::parse(from).unwrap(),
            CurrencyCode::parse(to).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_failing_source_does_not_block_the_rest() {
        let (_dir, store, updater) = setup();

        let good = MockRateSource::new("good");
        good.set_rate("BTC_USD", 60_000.0);
        let sources: Vec<Arc<dyn RateSource>> = vec![
            Arc::new(good),
            Arc::new(MockRateSource::failing("bad", "connection refused")),
        ];

        let result = updater.run_update(&sources).await.unwrap();
        assert_eq!(result.updated_count, 1);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("connection refused"));

        let snapshot = store.read_snapshot().unwrap();
        assert_eq!(snapshot.pairs["BTC_USD"].rate, 60_000.0);
        assert_eq!(snapshot.pairs["BTC_USD"].source, "good");
        assert_eq!(snapshot.last_refresh, Some(result.last_refresh));
        assert_eq!(store.read_history().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_one_timestamp_for_the_whole_run() {
        let (_dir, store, updater) = setup();

        let source = MockRateSource::new("mock");
        source.set_rate("BTC_USD", 60_000.0);
        source.set_rate("ETH_USD", 3_800.0);
        let sources: Vec<Arc<dyn RateSource>> = vec![Arc::new(source)];

        let result = updater.run_update(&sources).await.unwrap();
        assert_eq!(result.last_refresh.timestamp_subsec_nanos(), 0);

        let snapshot = store.read_snapshot().unwrap();
        for entry in snapshot.pairs.values() {
            assert_eq!(entry.updated_at, result.last_refresh);
        }

        let suffix = fxhub_common::format_compact(result.last_refresh);
        for record in store.read_history().unwrap() {
            assert!(record.id.ends_with(&suffix), "odd id: {}", record.id);
            assert_eq!(record.timestamp, result.last_refresh);
        }
    }

    #[tokio::test]
    async fn test_all_sources_failing_still_advances_last_refresh() {
        let (_dir, store, updater) = setup();

        let sources: Vec<Arc<dyn RateSource>> = vec![
            Arc::new(MockRateSource::failing("one", "down")),
            Arc::new(MockRateSource::failing("two", "down")),
        ];

        let result = updater.run_update(&sources).await.unwrap();
        assert_eq!(result.updated_count, 0);
        assert_eq!(result.errors.len(), 2);

        let snapshot = store.read_snapshot().unwrap();
        assert!(snapshot.pairs.is_empty());
        assert_eq!(snapshot.last_refresh, Some(result.last_refresh));
    }

    #[tokio::test]
    async fn test_newer_stored_entry_survives_an_update() {
        let (_dir, store, updater) = setup();

        let mut snapshot = RateSnapshot::default();
        snapshot.merge_entry(
            &pair("BTC", "USD"),
            RateEntry {
                rate: 70_000.0,
                updated_at: fxhub_common::now() + ChronoDuration::hours(1),
                source: "manual".to_string(),
            },
        );
        store.write_snapshot(&snapshot).unwrap();

        let source = MockRateSource::new("mock");
        source.set_rate("BTC_USD", 60_000.0);
        let sources: Vec<Arc<dyn RateSource>> = vec![Arc::new(source)];

        let result = updater.run_update(&sources).await.unwrap();
        // The pair was staged, but the stored entry is newer and stays.
        assert_eq!(result.updated_count, 1);

        let stored = store.read_snapshot().unwrap();
        assert_eq!(stored.pairs["BTC_USD"].rate, 70_000.0);
        assert_eq!(stored.pairs["BTC_USD"].source, "manual");
        assert_eq!(stored.last_refresh, Some(result.last_refresh));
    }

    #[tokio::test]
    async fn test_unusable_quotes_are_skipped() {
        let (_dir, store, updater) = setup();

        let source = MockRateSource::new("mock");
        source.set_rate("USD_USD", 1.0);
        source.set_rate("BTCUSD", 5.0);
        source.set_rate("ETH_USD", -3.0);
        source.set_rate("SOL_USD", 172.0);
        let sources: Vec<Arc<dyn RateSource>> = vec![Arc::new(source)];

        let result = updater.run_update(&sources).await.unwrap();
        assert_eq!(result.updated_count, 1);
        assert!(result.errors.is_empty());

        let snapshot = store.read_snapshot().unwrap();
        assert_eq!(snapshot.pairs.len(), 1);
        assert!(snapshot.pairs.contains_key("SOL_USD"));
    }

    #[tokio::test]
    async fn test_slow_source_counts_as_failed() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(RateStore::new(
            dir.path().join("rates.json"),
            dir.path().join("history.json"),
        ));
        let updater = RateUpdater::new(
            store.clone(),
            UpdaterConfig {
                source_timeout: Duration::from_millis(20),
            },
        );

        let slow = MockRateSource::new("slow").with_delay(Duration::from_millis(200));
        slow.set_rate("BTC_USD", 60_000.0);
        let sources: Vec<Arc<dyn RateSource>> = vec![Arc::new(slow)];

        let result = updater.run_update(&sources).await.unwrap();
        assert_eq!(result.updated_count, 0);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("timed out"));
    }

    #[tokio::test]
    async fn test_later_source_wins_within_a_run() {
        let (_dir, store, updater) = setup();

        let first = MockRateSource::new("first");
        first.set_rate("BTC_USD", 59_000.0);
        let second = MockRateSource::new("second");
        second.set_rate("BTC_USD", 59_500.0);
        let sources: Vec<Arc<dyn RateSource>> = vec![Arc::new(first), Arc::new(second)];

        let result = updater.run_update(&sources).await.unwrap();
        assert_eq!(result.updated_count, 1);

        let snapshot = store.read_snapshot().unwrap();
        assert_eq!(snapshot.pairs["BTC_USD"].rate, 59_500.0);
        assert_eq!(snapshot.pairs["BTC_USD"].source, "second");

        // One record per pair and run, regardless of how many sources quoted it.
        assert_eq!(store.read_history().unwrap().len(), 1);
    }
}
