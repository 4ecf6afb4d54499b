//! Wallets and portfolios.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use fxhub_common::{CurrencyCode, HubError, Result};

/// Reject amounts that are zero, negative or not a number.
pub(crate) fn check_amount(amount: f64) -> Result<()> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(HubError::InvalidAmount { amount });
    }
    Ok(())
}

/// A single-currency balance. Mutated only through [`Portfolio`], which
/// keeps it from ever going negative.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Wallet {
    balance: f64,
}

impl Wallet {
    /// Current balance in units of the wallet's currency.
    pub fn balance(&self) -> f64 {
        self.balance
    }
}

/// All wallets held by one user, keyed by currency code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    user_id: i64,
    #[serde(default)]
    wallets: BTreeMap<CurrencyCode, Wallet>,
}

impl Portfolio {
    /// Empty portfolio for a user.
    pub fn new(user_id: i64) -> Self {
        Self {
            user_id,
            wallets: BTreeMap::new(),
        }
    }

    /// Owner of the portfolio.
    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    /// Read-only view of the wallets.
    pub fn wallets(&self) -> &BTreeMap<CurrencyCode, Wallet> {
        &self.wallets
    }

    /// Whether the user holds a wallet in `code`.
    pub fn has_wallet(&self, code: &CurrencyCode) -> bool {
        self.wallets.contains_key(code)
    }

    /// Balance in `code`; zero when no such wallet exists.
    pub fn balance(&self, code: &CurrencyCode) -> f64 {
        self.wallets.get(code).map(Wallet::balance).unwrap_or(0.0)
    }

    /// Add funds, creating the wallet at zero on first use.
    ///
    /// Returns the new balance.
    pub fn deposit(&mut self, code: &CurrencyCode, amount: f64) -> Result<f64> {
        check_amount(amount)?;
        let wallet = self.wallets.entry(code.clone()).or_default();
        wallet.balance += amount;
        Ok(wallet.balance)
    }

    /// Check that a withdrawal could go through, without mutating.
    ///
    /// Fails with [`HubError::NoWallet`] when no wallet exists and with
    /// [`HubError::InsufficientFunds`] when the balance does not cover it.
    pub fn check_withdraw(&self, code: &CurrencyCode, amount: f64) -> Result<()> {
        check_amount(amount)?;
        let wallet = self.wallets.get(code).ok_or_else(|| HubError::NoWallet {
            user_id: self.user_id,
            code: code.as_str().to_string(),
        })?;
        if amount > wallet.balance {
            return Err(HubError::InsufficientFunds {
                available: wallet.balance,
                required: amount,
                code: code.as_str().to_string(),
            });
        }
        Ok(())
    }

    /// Remove funds from an existing wallet. Never auto-creates.
    ///
    /// Returns the new balance.
    pub fn withdraw(&mut self, code: &CurrencyCode, amount: f64) -> Result<f64> {
        self.check_withdraw(code, amount)?;
        let wallet = self.wallets.get_mut(code).ok_or_else(|| HubError::NoWallet {
            user_id: self.user_id,
            code: code.as_str().to_string(),
        })?;
        wallet.balance -= amount;
        Ok(wallet.balance)
    }
}
