//! Rate source traits and implementations.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;

use fxhub_common::Result;

/// Request details recorded alongside every fetched batch.
#[derive(Debug, Clone, Serialize)]
pub struct SourceMeta {
    /// Name of the source that served the batch.
    pub source: String,
    /// HTTP status of the upstream response, when one was received.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Round-trip time of the upstream request in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_ms: Option<u64>,
}

impl SourceMeta {
    /// JSON form stored on history records.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// One successful fetch from a source.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    /// Quotes keyed by `FROM_TO`.
    pub rates: BTreeMap<String, f64>,
    pub meta: SourceMeta,
}

/// Trait for external rate sources.
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Get the source name.
    fn name(&self) -> &str;

    /// Fetch the current batch of quotes from the source.
    async fn fetch_rates(&self) -> Result<FetchOutcome>;
}

/// Mock rate source for testing.
#[cfg(any(test, feature = "test-utils"))]
pub struct MockRateSource {
    name: String,
    rates: dashmap::DashMap<String, f64>,
    failure: Option<String>,
    delay: Option<std::time::Duration>,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockRateSource {
    /// Create a new mock source.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rates: dashmap::DashMap::new(),
            failure: None,
            delay: None,
        }
    }

    /// Create a mock source that always fails.
    pub fn failing(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rates: dashmap::DashMap::new(),
            failure: Some(reason.into()),
            delay: None,
        }
    }

    /// Delay every fetch, for exercising timeouts.
    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Set the quote returned for a pair key.
    pub fn set_rate(&self, key: impl Into<String>, rate: f64) {
        self.rates.insert(key.into(), rate);
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl RateSource for MockRateSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_rates(&self) -> Result<FetchOutcome> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(reason) = &self.failure {
            return Err(fxhub_common::HubError::Upstream {
                reason: format!("{}: {}", self.name, reason),
            });
        }

        Ok(FetchOutcome {
            rates: self
                .rates
                .iter()
                .map(|kv| (kv.key().clone(), *kv.value()))
                .collect(),
            meta: SourceMeta {
                source: self.name.clone(),
                status_code: Some(200),
                request_ms: Some(1),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fxhub_common::HubError;

    #[tokio::test]
    async fn test_mock_source_returns_rates() {
        let source = MockRateSource::new("mock");
        source.set_rate("BTC_USD", 59000.0);
        source.set_rate("ETH_USD", 3700.0);

        let outcome = source.fetch_rates().await.unwrap();
        assert_eq!(outcome.rates.len(), 2);
        assert_eq!(outcome.rates["BTC_USD"], 59000.0);
        assert_eq!(outcome.meta.source, "mock");
    }

    #[tokio::test]
    async fn test_failing_mock_source() {
        let source = MockRateSource::failing("mock", "connection refused");
        let err = source.fetch_rates().await.unwrap_err();
        assert!(matches!(err, HubError::Upstream { reason } if reason.contains("refused")));
    }

    #[test]
    fn test_meta_serializes_without_absent_fields() {
        let meta = SourceMeta {
            source: "mock".to_string(),
            status_code: None,
            request_ms: None,
        };
        assert_eq!(meta.to_value(), serde_json::json!({"source": "mock"}));
    }
}
