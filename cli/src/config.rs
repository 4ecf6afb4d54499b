//! Hub configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration for the hub CLI.
///
/// Everything has a usable default; environment variables override.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Directory holding all hub data files.
    pub data_dir: PathBuf,
    /// Rate cache freshness window, in seconds.
    pub rates_ttl_secs: i64,
    /// Per-source fetch budget, in seconds.
    pub source_timeout_secs: u64,
    /// Default base currency for trades and valuations.
    pub base_currency: String,
    /// Fiat symbols requested from the fiat rate source.
    pub fiat_symbols: Vec<String>,
    /// ExchangeRate-API key; the fiat source is skipped when unset.
    pub exchangerate_api_key: Option<String>,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            rates_ttl_secs: 300,
            source_timeout_secs: 10,
            base_currency: "USD".to_string(),
            fiat_symbols: vec!["EUR".to_string(), "GBP".to_string(), "RUB".to_string()],
            exchangerate_api_key: None,
        }
    }
}

impl HubConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("FXHUB_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(raw) = std::env::var("FXHUB_RATES_TTL_SECS") {
            if let Ok(ttl) = raw.parse() {
                config.rates_ttl_secs = ttl;
            }
        }
        if let Ok(raw) = std::env::var("FXHUB_SOURCE_TIMEOUT_SECS") {
            if let Ok(timeout) = raw.parse() {
                config.source_timeout_secs = timeout;
            }
        }
        if let Ok(base) = std::env::var("FXHUB_BASE_CURRENCY") {
            config.base_currency = base;
        }
        if let Ok(key) = std::env::var("EXCHANGERATE_API_KEY") {
            if !key.trim().is_empty() {
                config.exchangerate_api_key = Some(key);
            }
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.rates_ttl_secs < 0 {
            return Err("Rates TTL cannot be negative".to_string());
        }
        if self.source_timeout_secs == 0 {
            return Err("Source timeout cannot be zero".to_string());
        }
        if self.base_currency.trim().is_empty() {
            return Err("Base currency cannot be empty".to_string());
        }
        Ok(())
    }

    /// Snapshot document path.
    pub fn rates_path(&self) -> PathBuf {
        self.data_dir.join("rates.json")
    }

    /// History document path.
    pub fn history_path(&self) -> PathBuf {
        self.data_dir.join("exchange_rates.json")
    }

    /// Portfolio document path.
    pub fn portfolios_path(&self) -> PathBuf {
        self.data_dir.join("portfolios.json")
    }

    /// Account document path.
    pub fn users_path(&self) -> PathBuf {
        self.data_dir.join("users.json")
    }

    /// Freshness window as a duration.
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.rates_ttl_secs)
    }

    /// Fetch budget as a duration.
    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.source_timeout_secs)
    }
}
