//! Error types for hub operations.

use thiserror::Error;

/// Main error type for hub operations.
#[derive(Error, Debug)]
pub enum HubError {
    /// Currency code is not known to the registry or the fallback table.
    #[error("Unknown currency '{code}'")]
    CurrencyNotFound { code: String },

    /// Trade amount is zero, negative or not a number.
    #[error("Invalid amount: {amount}")]
    InvalidAmount { amount: f64 },

    /// User holds no wallet in the requested currency.
    #[error("User {user_id} has no {code} wallet")]
    NoWallet { user_id: i64, code: String },

    /// Wallet balance does not cover the requested withdrawal.
    #[error("Insufficient funds: available {available:.4} {code}, required {required:.4} {code}")]
    InsufficientFunds {
        available: f64,
        required: f64,
        code: String,
    },

    /// A rate source failed or returned an unusable payload.
    #[error("Upstream source error: {reason}")]
    Upstream { reason: String },

    /// A data file exists but does not parse.
    #[error("Corrupt data file {path}: {reason}")]
    StorageCorrupt { path: String, reason: String },

    /// Reading or writing a data file failed.
    #[error("Storage error on {path}: {reason}")]
    StorageIo { path: String, reason: String },
}

impl HubError {
    /// Unknown-currency error for `code`.
    pub fn unknown_currency(code: impl std::fmt::Display) -> Self {
        HubError::CurrencyNotFound {
            code: code.to_string(),
        }
    }

    /// Get stable error code for logs and CLI output.
    pub fn error_code(&self) -> &'static str {
        match self {
            HubError::CurrencyNotFound { .. } => "CURRENCY_NOT_FOUND",
            HubError::InvalidAmount { .. } => "INVALID_AMOUNT",
            HubError::NoWallet { .. } => "NO_WALLET",
            HubError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            HubError::Upstream { .. } => "UPSTREAM_ERROR",
            HubError::StorageCorrupt { .. } => "STORAGE_CORRUPT",
            HubError::StorageIo { .. } => "STORAGE_IO",
        }
    }
}

/// Result type alias for hub operations.
pub type Result<T> = std::result::Result<T, HubError>;
