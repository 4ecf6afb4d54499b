//! Time utilities and constants for the hub.

use chrono::{DateTime, Duration, SecondsFormat, SubsecRound, Utc};

/// Hub timing constants.
pub mod constants {
    use super::Duration;

    /// Default rate cache freshness window (5 minutes).
    pub fn default_rates_ttl() -> Duration {
        Duration::seconds(300)
    }

    /// Default per-source fetch budget (10 seconds).
    pub fn default_source_timeout() -> std::time::Duration {
        std::time::Duration::from_secs(10)
    }
}

/// A timestamp with timezone (always UTC for the hub).
pub type Timestamp = DateTime<Utc>;

/// Get the current timestamp.
pub fn now() -> Timestamp {
    Utc::now()
}

/// Current timestamp truncated to whole seconds.
///
/// Update runs stamp every record with one of these so snapshot entries and
/// history ids from the same run agree to the character.
pub fn now_secs() -> Timestamp {
    Utc::now().trunc_subsecs(0)
}

/// Check if a timestamp is still within the freshness window `ttl`.
///
/// A timestamp aged exactly `ttl` still counts as fresh.
pub fn is_fresh(timestamp: Timestamp, ttl: Duration) -> bool {
    now().signed_duration_since(timestamp) <= ttl
}

/// Compact RFC 3339 rendering, whole seconds with a `Z` suffix.
pub fn format_compact(timestamp: Timestamp) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}
