//! FxHub Rates
//!
//! Rate acquisition and resolution for the hub: the persistent snapshot
//! and history store, cached pair resolution with a built-in fallback
//! table, and concurrent update runs across external sources.
//!
//! # Features
//! - Snapshot storage with newest-wins merging and append-only history
//! - TTL-based freshness with local fallback derivation through USD
//! - Source aggregation with per-source failure isolation and timeouts
//!
//! # Example
//! ```no_run
//! use std::sync::Arc;
//! use fxhub_common::{CurrencyCode, StaticRegistry};
//! use fxhub_rates::{RateResolver, RateStore, ResolverConfig};
//!
//! let store = Arc::new(RateStore::new("data/rates.json", "data/exchange_rates.json"));
//! let resolver = RateResolver::new(
//!     Arc::new(StaticRegistry::builtin()),
//!     store,
//!     ResolverConfig::default(),
//! );
//!
//! let btc = CurrencyCode::parse("BTC").unwrap();
//! let usd = CurrencyCode::parse("USD").unwrap();
//! let quote = resolver.resolve(&btc, &usd).unwrap();
//! println!("BTC/USD = {}", quote.rate);
//! ```

pub mod clients;
pub mod resolver;
pub mod source;
pub mod store;
pub mod table;
pub mod updater;

pub use clients::{CoinGeckoClient, ExchangeRateApiClient};
pub use resolver::{RateQuote, RateResolver, ResolverConfig, FALLBACK_SOURCE};
pub use source::{FetchOutcome, RateSource, SourceMeta};
pub use store::{HistoryRecord, RateEntry, RateSnapshot, RateStore};
pub use table::RateTable;
pub use updater::{RateUpdater, UpdateResult, UpdaterConfig};

#[cfg(any(test, feature = "test-utils"))]
pub use source::MockRateSource;
