//! Built-in fallback rate table.

use fxhub_common::{CurrencyCode, HubError, Result};

/// Fixed USD anchors: units of USD per one unit of the listed currency.
const USD_ANCHORS: &[(&str, f64)] = &[
    ("USD", 1.0),
    ("EUR", 1.0786),
    ("GBP", 1.2712),
    ("RUB", 0.010_16),
    ("BTC", 59_337.21),
    ("ETH", 3_720.0),
    ("SOL", 172.44),
];

/// Immutable table of reference rates anchored in USD.
///
/// This is the source of last resort: when the cache has nothing fresh for
/// a pair, the rate is derived here by routing both sides through USD. The
/// table never changes at runtime.
#[derive(Debug, Clone, Default)]
pub struct RateTable;

impl RateTable {
    /// Create the built-in table.
    pub fn new() -> Self {
        Self
    }

    /// USD value of one unit of `code`.
    pub fn base_rate_to_usd(&self, code: &CurrencyCode) -> Result<f64> {
        USD_ANCHORS
            .iter()
            .find(|(anchor, _)| *anchor == code.as_str())
            .map(|(_, rate)| *rate)
            .ok_or_else(|| HubError::unknown_currency(code))
    }

    /// Derive the `from -> to` rate through the USD anchors.
    pub fn derive_rate(&self, from: &CurrencyCode, to: &CurrencyCode) -> Result<f64> {
        let from_usd = self.base_rate_to_usd(from)?;
        let to_usd = self.base_rate_to_usd(to)?;
        Ok(from_usd / to_usd)
    }
}
