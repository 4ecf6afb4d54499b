//! Currency codes, conversion pairs and the currency registry.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{HubError, Result};

/// A normalized currency code such as `BTC` or `USD`.
///
/// Codes are uppercase ASCII alphanumerics, 2 to 5 characters. Construction
/// goes through [`CurrencyCode::parse`], which normalizes case and rejects
/// anything else.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CurrencyCode(String);

impl CurrencyCode {
    /// Parse a raw string into a code, trimming and uppercasing it.
    pub fn parse(raw: &str) -> Result<Self> {
        let code = raw.trim().to_ascii_uppercase();
        let valid_len = (2..=5).contains(&code.len());
        if !valid_len || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(HubError::unknown_currency(raw.trim()));
        }
        Ok(Self(code))
    }

    /// The code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

/// A directed conversion pair. The rate for `from -> to` is the number of
/// units of `to` one unit of `from` buys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RatePair {
    pub from: CurrencyCode,
    pub to: CurrencyCode,
}

impl RatePair {
    /// Create a pair.
    pub fn new(from: CurrencyCode, to: CurrencyCode) -> Self {
        Self { from, to }
    }

    /// The opposite direction of this pair.
    pub fn inverse(&self) -> Self {
        Self {
            from: self.to.clone(),
            to: self.from.clone(),
        }
    }

    /// True when both sides are the same currency.
    pub fn is_identity(&self) -> bool {
        self.from == self.to
    }

    /// Canonical storage key, `FROM_TO`.
    pub fn key(&self) -> String {
        format!("{}_{}", self.from, self.to)
    }

    /// Parse a storage key back into a pair.
    pub fn parse_key(key: &str) -> Result<Self> {
        match key.split_once('_') {
            Some((from, to)) => Ok(Self::new(
                CurrencyCode::parse(from)?,
                CurrencyCode::parse(to)?,
            )),
            None => Err(HubError::unknown_currency(key)),
        }
    }
}

impl fmt::Display for RatePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.from, self.to)
    }
}

/// What kind of instrument a currency is.
#[derive(Debug, Clone, PartialEq)]
pub enum CurrencyKind {
    /// Government-issued money.
    Fiat { issuing_country: String },
    /// Cryptocurrency with its consensus algorithm and rough market cap.
    Crypto {
        algorithm: String,
        market_cap_usd: f64,
    },
}

/// Descriptive entry for one registered currency.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrencyMetadata {
    pub code: CurrencyCode,
    pub name: String,
    pub kind: CurrencyKind,
}

impl CurrencyMetadata {
    /// One-line description for listings.
    pub fn display_line(&self) -> String {
        match &self.kind {
            CurrencyKind::Fiat { issuing_country } => {
                format!("[FIAT] {} - {} (Issuing: {})", self.code, self.name, issuing_country)
            }
            CurrencyKind::Crypto {
                algorithm,
                market_cap_usd,
            } => format!(
                "[CRYPTO] {} - {} (Algo: {}, MCAP: {:.2e})",
                self.code, self.name, algorithm, market_cap_usd
            ),
        }
    }
}

/// Lookup surface for the set of supported currencies.
///
/// Every operation that accepts a currency code validates it here before
/// touching rates or wallets.
pub trait CurrencyRegistry: Send + Sync {
    /// Whether `code` is a supported currency.
    fn exists(&self, code: &CurrencyCode) -> bool;

    /// Metadata for `code`.
    fn describe(&self, code: &CurrencyCode) -> Result<CurrencyMetadata>;

    /// All registered currencies, in listing order.
    fn list(&self) -> Vec<CurrencyMetadata>;

    /// Fail with [`HubError::CurrencyNotFound`] unless `code` is registered.
    fn ensure(&self, code: &CurrencyCode) -> Result<()> {
        if self.exists(code) {
            Ok(())
        } else {
            Err(HubError::unknown_currency(code))
        }
    }
}

/// Built-in fixed registry of currencies the hub trades.
#[derive(Debug, Clone)]
pub struct StaticRegistry {
    entries: Vec<CurrencyMetadata>,
}

fn fiat(code: &str, name: &str, issuing_country: &str) -> CurrencyMetadata {
    CurrencyMetadata {
        code: CurrencyCode(code.to_string()),
        name: name.to_string(),
        kind: CurrencyKind::Fiat {
            issuing_country: issuing_country.to_string(),
        },
    }
}

fn crypto(code: &str, name: &str, algorithm: &str, market_cap_usd: f64) -> CurrencyMetadata {
    CurrencyMetadata {
        code: CurrencyCode(code.to_string()),
        name: name.to_string(),
        kind: CurrencyKind::Crypto {
            algorithm: algorithm.to_string(),
            market_cap_usd,
        },
    }
}

impl StaticRegistry {
    /// Registry with the built-in fiat and crypto currencies.
    pub fn builtin() -> Self {
        Self {
            entries: vec![
                fiat("USD", "US Dollar", "United States"),
                fiat("EUR", "Euro", "Eurozone"),
                fiat("GBP", "Pound Sterling", "United Kingdom"),
                fiat("RUB", "Russian Ruble", "Russia"),
                crypto("BTC", "Bitcoin", "SHA-256", 1.12e12),
                crypto("ETH", "Ethereum", "Ethash", 4.5e11),
                crypto("SOL", "Solana", "Proof of History", 8.1e10),
            ],
        }
    }
}

impl CurrencyRegistry for StaticRegistry {
    fn exists(&self, code: &CurrencyCode) -> bool {
        self.entries.iter().any(|entry| &entry.code == code)
    }

    fn describe(&self, code: &CurrencyCode) -> Result<CurrencyMetadata> {
        self.entries
            .iter()
            .find(|entry| &entry.code == code)
            .cloned()
            .ok_or_else(|| HubError::unknown_currency(code))
    }

    fn list(&self) -> Vec<CurrencyMetadata> {
        self.entries.clone()
    }
}
