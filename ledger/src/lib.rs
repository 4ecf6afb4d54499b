//! FxHub Ledger
//!
//! Wallets, portfolios and the trading engine that mutates them.

pub mod engine;
pub mod store;
pub mod trade;
pub mod wallet;

pub use engine::LedgerEngine;
pub use store::PortfolioStore;
pub use trade::{PortfolioItem, PortfolioValuation, Trade, TradeKind, TradeResult, TradeStatus};
pub use wallet::{Portfolio, Wallet};
