//! Cached rate resolution with fallback derivation.

use chrono::Duration;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use fxhub_common::{
    is_fresh, now, now_secs, CurrencyCode, CurrencyRegistry, RatePair, Result, Timestamp,
};

use crate::store::{RateEntry, RateSnapshot, RateStore};
use crate::table::RateTable;

/// Source tag stamped on entries derived from the built-in table.
pub const FALLBACK_SOURCE: &str = "local-fallback";

/// Configuration for rate resolution.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// How long a cached entry counts as fresh.
    pub ttl: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            ttl: fxhub_common::time::constants::default_rates_ttl(),
        }
    }
}

/// A priced conversion pair.
#[derive(Debug, Clone, PartialEq)]
pub struct RateQuote {
    pub pair: RatePair,
    /// Units of `pair.to` per one unit of `pair.from`.
    pub rate: f64,
    pub updated_at: Timestamp,
    /// Where the value came from; `None` for the identity pair.
    pub source: Option<String>,
}

/// Resolves pair rates from the cache, deriving stale or missing pairs
/// from the built-in table.
///
/// Resolution never talks to the network: either the persisted snapshot has
/// a fresh entry, or the rate is derived locally through the USD anchors and
/// written back for the next caller.
pub struct RateResolver {
    registry: Arc<dyn CurrencyRegistry>,
    store: Arc<RateStore>,
    table: RateTable,
    config: ResolverConfig,
}

impl RateResolver {
    /// Resolver over a registry and a rate store.
    pub fn new(
        registry: Arc<dyn CurrencyRegistry>,
        store: Arc<RateStore>,
        config: ResolverConfig,
    ) -> Self {
        Self {
            registry,
            store,
            table: RateTable::new(),
            config,
        }
    }

    /// Resolve the `from -> to` rate.
    ///
    /// Both codes must be registered. The identity pair is always `1.0` and
    /// never touches storage.
    #[instrument(skip(self), fields(from = %from, to = %to))]
    pub fn resolve(&self, from: &CurrencyCode, to: &CurrencyCode) -> Result<RateQuote> {
        self.registry.ensure(from)?;
        self.registry.ensure(to)?;

        let pair = RatePair::new(from.clone(), to.clone());
        if pair.is_identity() {
            debug!("Identity pair, short-circuiting");
            return Ok(RateQuote {
                pair,
                rate: 1.0,
                updated_at: now(),
                source: None,
            });
        }

        let snapshot = self.store.read_snapshot()?;
        if let Some(entry) = snapshot.entry(&pair) {
            if is_fresh(entry.updated_at, self.config.ttl) {
                debug!(rate = entry.rate, source = %entry.source, "Cache hit");
                return Ok(RateQuote {
                    rate: entry.rate,
                    updated_at: entry.updated_at,
                    source: Some(entry.source.clone()),
                    pair,
                });
            }
            debug!(updated_at = %entry.updated_at, "Cache entry stale");
        } else {
            debug!("Cache miss");
        }

        self.derive_and_persist(pair, snapshot)
    }

    fn derive_and_persist(&self, pair: RatePair, mut snapshot: RateSnapshot) -> Result<RateQuote> {
        let rate = self.table.derive_rate(&pair.from, &pair.to)?;
        let updated_at = now_secs();

        snapshot.merge_entry(
            &pair,
            RateEntry {
                rate,
                updated_at,
                source: FALLBACK_SOURCE.to_string(),
            },
        );
        self.store.write_snapshot(&snapshot)?;

        info!(pair = %pair, rate, "Derived fallback rate and persisted it");
        Ok(RateQuote {
            pair,
            rate,
            updated_at,
            source: Some(FALLBACK_SOURCE.to_string()),
        })
    }
}
