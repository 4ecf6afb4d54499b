//! HTTP clients for the external rate sources.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};
use tracing::debug;

use fxhub_common::{HubError, Result};

use crate::source::{FetchOutcome, RateSource, SourceMeta};

/// Crypto tickers and their CoinGecko asset ids.
const COINGECKO_ASSETS: &[(&str, &str)] = &[
    ("BTC", "bitcoin"),
    ("ETH", "ethereum"),
    ("SOL", "solana"),
];

fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|err| HubError::Upstream {
            reason: format!("failed to build HTTP client: {err}"),
        })
}

/// Crypto quotes from the CoinGecko simple-price endpoint.
pub struct CoinGeckoClient {
    http: reqwest::Client,
    base_url: String,
    vs_currency: String,
}

impl CoinGeckoClient {
    /// Public API endpoint.
    pub const DEFAULT_BASE_URL: &'static str = "https://api.coingecko.com/api/v3";

    /// Client quoting crypto assets against `vs_currency`.
    pub fn new(vs_currency: &str, timeout: Duration) -> Result<Self> {
        Self::with_base_url(Self::DEFAULT_BASE_URL, vs_currency, timeout)
    }

    /// Client against a non-default endpoint, for tests and proxies.
    pub fn with_base_url(base_url: &str, vs_currency: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            vs_currency: vs_currency.to_ascii_lowercase(),
        })
    }

    fn stage(payload: &HashMap<String, HashMap<String, f64>>, vs_currency: &str) -> BTreeMap<String, f64> {
        let quote = vs_currency.to_ascii_uppercase();
        let mut rates = BTreeMap::new();
        for (ticker, asset_id) in COINGECKO_ASSETS {
            if let Some(value) = payload.get(*asset_id).and_then(|quotes| quotes.get(vs_currency)) {
                rates.insert(format!("{ticker}_{quote}"), *value);
            }
        }
        rates
    }
}

#[async_trait]
impl RateSource for CoinGeckoClient {
    fn name(&self) -> &str {
        "CoinGecko"
    }

    async fn fetch_rates(&self) -> Result<FetchOutcome> {
        let ids: Vec<&str> = COINGECKO_ASSETS.iter().map(|(_, id)| *id).collect();
        let url = format!(
            "{}/simple/price?ids={}&vs_currencies={}",
            self.base_url,
            ids.join(","),
            self.vs_currency
        );

        let started = Instant::now();
        let response = self.http.get(&url).send().await.map_err(|err| HubError::Upstream {
            reason: format!("CoinGecko request failed: {err}"),
        })?;
        let request_ms = started.elapsed().as_millis() as u64;
        let status = response.status();

        if !status.is_success() {
            return Err(HubError::Upstream {
                reason: format!("CoinGecko returned HTTP {status}"),
            });
        }

        let payload: HashMap<String, HashMap<String, f64>> =
            response.json().await.map_err(|err| HubError::Upstream {
                reason: format!("CoinGecko returned an unusable payload: {err}"),
            })?;

        let rates = Self::stage(&payload, &self.vs_currency);
        debug!(pairs = rates.len(), request_ms, "CoinGecko batch fetched");

        Ok(FetchOutcome {
            rates,
            meta: SourceMeta {
                source: self.name().to_string(),
                status_code: Some(status.as_u16()),
                request_ms: Some(request_ms),
            },
        })
    }
}

#[derive(Debug, Deserialize)]
struct ExchangeRatePayload {
    result: String,
    #[serde(default)]
    conversion_rates: HashMap<String, f64>,
    #[serde(default, rename = "error-type")]
    error_type: Option<String>,
}

/// Fiat quotes from ExchangeRate-API.
///
/// The upstream `latest/{base}` endpoint quotes how many units of each
/// symbol one unit of the base buys. Staged pairs are keyed `SYM_BASE`, so
/// the values are inverted into units of base per unit of symbol.
pub struct ExchangeRateApiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    base_currency: String,
    symbols: Vec<String>,
}

impl ExchangeRateApiClient {
    /// Public API endpoint.
    pub const DEFAULT_BASE_URL: &'static str = "https://v6.exchangerate-api.com/v6";

    /// Client fetching `symbols` against `base_currency`.
    pub fn new(
        api_key: &str,
        base_currency: &str,
        symbols: &[String],
        timeout: Duration,
    ) -> Result<Self> {
        Self::with_base_url(Self::DEFAULT_BASE_URL, api_key, base_currency, symbols, timeout)
    }

    /// Client against a non-default endpoint, for tests and proxies.
    pub fn with_base_url(
        base_url: &str,
        api_key: &str,
        base_currency: &str,
        symbols: &[String],
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            http: http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            base_currency: base_currency.to_ascii_uppercase(),
            symbols: symbols.iter().map(|s| s.to_ascii_uppercase()).collect(),
        })
    }

    fn stage(&self, conversion_rates: &HashMap<String, f64>) -> BTreeMap<String, f64> {
        let mut rates = BTreeMap::new();
        for symbol in &self.symbols {
            let Some(per_base) = conversion_rates.get(symbol) else {
                debug!(symbol = %symbol, "Symbol missing from upstream payload");
                continue;
            };
            if !per_base.is_finite() || *per_base <= 0.0 {
                debug!(symbol = %symbol, value = per_base, "Skipping unusable quote");
                continue;
            }
            rates.insert(format!("{}_{}", symbol, self.base_currency), 1.0 / per_base);
        }
        rates
    }
}

#[async_trait]
impl RateSource for ExchangeRateApiClient {
    fn name(&self) -> &str {
        "ExchangeRate-API"
    }

    async fn fetch_rates(&self) -> Result<FetchOutcome> {
        if self.api_key.is_empty() {
            return Err(HubError::Upstream {
                reason: "ExchangeRate-API key is not configured".to_string(),
            });
        }

        let url = format!(
            "{}/{}/latest/{}",
            self.base_url, self.api_key, self.base_currency
        );

        let started = Instant::now();
        let response = self.http.get(&url).send().await.map_err(|err| HubError::Upstream {
            reason: format!("ExchangeRate-API request failed: {err}"),
        })?;
        let request_ms = started.elapsed().as_millis() as u64;
        let status = response.status();

        if !status.is_success() {
            return Err(HubError::Upstream {
                reason: format!("ExchangeRate-API returned HTTP {status}"),
            });
        }

        let payload: ExchangeRatePayload =
            response.json().await.map_err(|err| HubError::Upstream {
                reason: format!("ExchangeRate-API returned an unusable payload: {err}"),
            })?;

        if payload.result != "success" {
            let detail = payload.error_type.unwrap_or_else(|| payload.result.clone());
            return Err(HubError::Upstream {
                reason: format!("ExchangeRate-API reported failure: {detail}"),
            });
        }

        let rates = self.stage(&payload.conversion_rates);
        debug!(pairs = rates.len(), request_ms, "ExchangeRate-API batch fetched");

        Ok(FetchOutcome {
            rates,
            meta: SourceMeta {
                source: self.name().to_string(),
                status_code: Some(status.as_u16()),
                request_ms: Some(request_ms),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coingecko_staging_keys_by_ticker() {
        let mut payload = HashMap::new();
        payload.insert(
            "bitcoin".to_string(),
            HashMap::from([("usd".to_string(), 59000.0)]),
        );
        payload.insert(
            "ethereum".to_string(),
            HashMap::from([("usd".to_string(), 3700.0)]),
        );

        let staged = CoinGeckoClient::stage(&payload, "usd");
        assert_eq!(staged.len(), 2);
        assert_eq!(staged["BTC_USD"], 59000.0);
        assert_eq!(staged["ETH_USD"], 3700.0);
        assert!(!staged.contains_key("SOL_USD"));
    }

    #[test]
    fn test_exchangerate_staging_inverts_quotes() {
        let client = ExchangeRateApiClient::new(
            "key",
            "usd",
            &["EUR".to_string(), "GBP".to_string()],
            Duration::from_secs(1),
        )
        .unwrap();

        let conversion = HashMap::from([
            ("EUR".to_string(), 0.92),
            ("GBP".to_string(), 0.79),
            ("JPY".to_string(), 146.0),
        ]);

        let staged = client.stage(&conversion);
        assert_eq!(staged.len(), 2);
        assert!((staged["EUR_USD"] - 1.0 / 0.92).abs() < 1e-12);
        assert!((staged["GBP_USD"] - 1.0 / 0.79).abs() < 1e-12);
        // JPY is not a configured symbol.
        assert!(!staged.contains_key("JPY_USD"));
    }

    #[test]
    fn test_exchangerate_staging_skips_unusable_quotes() {
        let client = ExchangeRateApiClient::new(
            "key",
            "USD",
            &["EUR".to_string(), "GBP".to_string(), "RUB".to_string()],
            Duration::from_secs(1),
        )
        .unwrap();

        let conversion = HashMap::from([
            ("EUR".to_string(), 0.0),
            ("GBP".to_string(), -1.0),
            ("RUB".to_string(), 98.4),
        ]);

        let staged = client.stage(&conversion);
        assert_eq!(staged.len(), 1);
        assert!(staged.contains_key("RUB_USD"));
    }
}
