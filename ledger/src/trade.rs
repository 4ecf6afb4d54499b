//! Trade lifecycle and result types.

use std::fmt;
use tracing::debug;

use fxhub_common::{CurrencyCode, Timestamp};

/// Direction of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeKind {
    Buy,
    Sell,
}

impl fmt::Display for TradeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeKind::Buy => write!(f, "buy"),
            TradeKind::Sell => write!(f, "sell"),
        }
    }
}

/// Lifecycle state of one trade request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TradeStatus {
    /// Codes, amount and funds checks passed.
    Validated,
    /// Pricing attempted; the trade proceeds even when no quote came back.
    Priced,
    /// Balance mutation applied in memory.
    Applied,
    /// Mutation persisted; the trade is complete.
    Persisted,
    /// Terminal failure.
    Failed,
}

impl TradeStatus {
    /// Check if this is a terminal state.
    pub fn is_final(&self) -> bool {
        matches!(self, TradeStatus::Persisted | TradeStatus::Failed)
    }

    /// Valid next states from this state.
    pub fn valid_transitions(&self) -> &[TradeStatus] {
        match self {
            TradeStatus::Validated => &[TradeStatus::Priced, TradeStatus::Failed],
            TradeStatus::Priced => &[TradeStatus::Applied, TradeStatus::Failed],
            TradeStatus::Applied => &[TradeStatus::Persisted, TradeStatus::Failed],
            TradeStatus::Persisted => &[],
            TradeStatus::Failed => &[],
        }
    }

    /// Check if transition to the given state is valid.
    pub fn can_transition_to(&self, next: TradeStatus) -> bool {
        self.valid_transitions().contains(&next)
    }
}

/// One in-flight trade request.
///
/// A trade only exists once its inputs validated, so the lifecycle starts
/// at [`TradeStatus::Validated`].
#[derive(Debug, Clone)]
pub struct Trade {
    pub kind: TradeKind,
    pub user_id: i64,
    /// Currency being bought or sold.
    pub currency: CurrencyCode,
    /// Base currency the trade is priced in.
    pub base: CurrencyCode,
    /// Amount in units of `currency`.
    pub amount: f64,
    status: TradeStatus,
}

impl Trade {
    /// A freshly validated trade.
    pub fn new(
        kind: TradeKind,
        user_id: i64,
        currency: CurrencyCode,
        base: CurrencyCode,
        amount: f64,
    ) -> Self {
        Self {
            kind,
            user_id,
            currency,
            base,
            amount,
            status: TradeStatus::Validated,
        }
    }

    /// Current lifecycle state.
    pub fn status(&self) -> TradeStatus {
        self.status
    }

    /// Advance the lifecycle. Transitions outside the table indicate an
    /// engine bug and panic in debug builds.
    pub fn advance(&mut self, next: TradeStatus) {
        debug_assert!(
            self.status.can_transition_to(next),
            "invalid trade transition {:?} -> {:?}",
            self.status,
            next
        );
        debug!(kind = %self.kind, user_id = self.user_id, from = ?self.status, to = ?next, "Trade state");
        self.status = next;
    }

    /// Mark the trade failed from any non-terminal state.
    pub fn fail(&mut self) {
        self.advance(TradeStatus::Failed);
    }
}

/// Outcome of a completed buy or sell.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeResult {
    pub user_id: i64,
    /// Currency bought or sold.
    pub currency: CurrencyCode,
    /// Base currency the trade was priced in.
    pub base: CurrencyCode,
    /// Traded amount, in units of `currency`.
    pub amount: f64,
    /// Wallet balance before the trade.
    pub before: f64,
    /// Wallet balance after the trade.
    pub after: f64,
    /// The `currency -> base` rate, when pricing succeeded.
    pub rate: Option<f64>,
    /// `amount * rate`, when pricing succeeded.
    pub estimated_value: Option<f64>,
    /// When the trade completed.
    pub executed_at: Timestamp,
}

/// One priced line of a portfolio valuation.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioItem {
    pub currency: CurrencyCode,
    pub balance: f64,
    /// Rate into the valuation base.
    pub rate: f64,
    pub value_in_base: f64,
}

/// A fully priced portfolio.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioValuation {
    pub user_id: i64,
    pub base: CurrencyCode,
    pub items: Vec<PortfolioItem>,
    /// Sum of all item values in `base`.
    pub total: f64,
}
