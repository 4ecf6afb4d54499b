//! Trading and valuation engine.

use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use fxhub_common::{now, CurrencyCode, CurrencyRegistry, Result};
use fxhub_rates::{RateQuote, RateResolver};

use crate::store::PortfolioStore;
use crate::trade::{
    PortfolioItem, PortfolioValuation, Trade, TradeKind, TradeResult, TradeStatus,
};
use crate::wallet::{self, Portfolio};

/// Executes trades and valuations against the persisted portfolios.
///
/// Trades treat pricing as best effort: a trade settles even when no rate
/// is available, it just carries no estimate. Valuations are the opposite,
/// one unpriceable wallet fails the whole call.
pub struct LedgerEngine {
    registry: Arc<dyn CurrencyRegistry>,
    portfolios: PortfolioStore,
    resolver: RateResolver,
}

impl LedgerEngine {
    /// Engine over a registry, portfolio store and rate resolver.
    pub fn new(
        registry: Arc<dyn CurrencyRegistry>,
        portfolios: PortfolioStore,
        resolver: RateResolver,
    ) -> Self {
        Self {
            registry,
            portfolios,
            resolver,
        }
    }

    /// Buy `amount` of `currency`, priced in `base`.
    ///
    /// Creates the user's portfolio and wallet on first use. The mutation
    /// is persisted before the call returns.
    #[instrument(skip(self), fields(currency = %currency, base = %base))]
    pub fn buy(
        &self,
        user_id: i64,
        currency: &CurrencyCode,
        amount: f64,
        base: &CurrencyCode,
    ) -> Result<TradeResult> {
        self.validate(currency, base, amount)?;

        let mut portfolio = self.load_or_create(user_id)?;
        let before = portfolio.balance(currency);
        let mut trade = Trade::new(TradeKind::Buy, user_id, currency.clone(), base.clone(), amount);

        let quote = self.price(&mut trade);

        portfolio.deposit(currency, amount)?;
        trade.advance(TradeStatus::Applied);
        let after = portfolio.balance(currency);

        self.persist(&mut trade, &portfolio)?;
        info!(user_id, amount, before, after, "Buy settled");
        Ok(finish(trade, before, after, quote))
    }

    /// Sell `amount` of `currency`, priced in `base`.
    ///
    /// Requires an existing wallet with sufficient funds; selling never
    /// creates wallets. Funds are checked before pricing, so an overdraft
    /// fails fast without touching the rate cache.
    #[instrument(skip(self), fields(currency = %currency, base = %base))]
    pub fn sell(
        &self,
        user_id: i64,
        currency: &CurrencyCode,
        amount: f64,
        base: &CurrencyCode,
    ) -> Result<TradeResult> {
        self.validate(currency, base, amount)?;

        let mut portfolio = self
            .portfolios
            .find(user_id)?
            .unwrap_or_else(|| Portfolio::new(user_id));
        portfolio.check_withdraw(currency, amount)?;

        let before = portfolio.balance(currency);
        let mut trade = Trade::new(TradeKind::Sell, user_id, currency.clone(), base.clone(), amount);

        let quote = self.price(&mut trade);

        portfolio.withdraw(currency, amount)?;
        trade.advance(TradeStatus::Applied);
        let after = portfolio.balance(currency);

        self.persist(&mut trade, &portfolio)?;
        info!(user_id, amount, before, after, "Sell settled");
        Ok(finish(trade, before, after, quote))
    }

    /// Value every wallet of the user in `base`.
    ///
    /// Unlike trades, valuation refuses to render a partial picture: any
    /// wallet that cannot be priced fails the call.
    #[instrument(skip(self), fields(base = %base))]
    pub fn show_portfolio(&self, user_id: i64, base: &CurrencyCode) -> Result<PortfolioValuation> {
        self.registry.ensure(base)?;

        let portfolio = self.load_or_create(user_id)?;

        let mut items = Vec::new();
        let mut total = 0.0;
        for (code, wallet) in portfolio.wallets() {
            let quote = self.resolver.resolve(code, base)?;
            let value = wallet.balance() * quote.rate;
            items.push(PortfolioItem {
                currency: code.clone(),
                balance: wallet.balance(),
                rate: quote.rate,
                value_in_base: value,
            });
            total += value;
        }

        debug!(user_id, wallets = items.len(), total, "Portfolio valued");
        Ok(PortfolioValuation {
            user_id,
            base: base.clone(),
            items,
            total,
        })
    }

    fn validate(&self, currency: &CurrencyCode, base: &CurrencyCode, amount: f64) -> Result<()> {
        self.registry.ensure(currency)?;
        self.registry.ensure(base)?;
        wallet::check_amount(amount)
    }

    fn load_or_create(&self, user_id: i64) -> Result<Portfolio> {
        Ok(self.portfolios.find(user_id)?.unwrap_or_else(|| {
            debug!(user_id, "No stored portfolio, starting empty");
            Portfolio::new(user_id)
        }))
    }

    /// Attempt pricing. Failures are logged and swallowed so the trade
    /// still settles.
    fn price(&self, trade: &mut Trade) -> Option<RateQuote> {
        let quote = match self.resolver.resolve(&trade.currency, &trade.base) {
            Ok(quote) => Some(quote),
            Err(err) => {
                warn!(
                    currency = %trade.currency,
                    base = %trade.base,
                    code = err.error_code(),
                    error = %err,
                    "Pricing unavailable, settling trade without an estimate"
                );
                None
            }
        };
        trade.advance(TradeStatus::Priced);
        quote
    }

    fn persist(&self, trade: &mut Trade, portfolio: &Portfolio) -> Result<()> {
        match self.portfolios.upsert(portfolio) {
            Ok(()) => {
                trade.advance(TradeStatus::Persisted);
                Ok(())
            }
            Err(err) => {
                trade.fail();
                error!(
                    user_id = portfolio.user_id(),
                    error = %err,
                    "Persist failed, discarding the applied mutation"
                );
                Err(err)
            }
        }
    }
}

fn finish(trade: Trade, before: f64, after: f64, quote: Option<RateQuote>) -> TradeResult {
    let rate = quote.map(|q| q.rate);
    TradeResult {
        user_id: trade.user_id,
        currency: trade.currency,
        base: trade.base,
        amount: trade.amount,
        before,
        after,
        rate,
        estimated_value: rate.map(|r| trade.amount * r),
        executed_at: now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fxhub_common::{CurrencyMetadata, HubError, StaticRegistry};
    use fxhub_rates::{RateStore, ResolverConfig};
    use tempfile::TempDir;

    fn code(raw: &str) -> CurrencyCode {
        CurrencyCode::parse(raw).unwrap()
    }

    fn build_engine(dir: &TempDir, registry: Arc<dyn CurrencyRegistry>) -> LedgerEngine {
        let rate_store = Arc::new(RateStore::new(
            dir.path().join("rates.json"),
            dir.path().join("history.json"),
        ));
        let resolver = RateResolver::new(registry.clone(), rate_store, ResolverConfig::default());
        LedgerEngine::new(
            registry,
            PortfolioStore::new(dir.path().join("portfolios.json")),
            resolver,
        )
    }

    fn setup_engine() -> (TempDir, LedgerEngine) {
        let dir = tempfile::tempdir().unwrap();
        let engine = build_engine(&dir, Arc::new(StaticRegistry::builtin()));
        (dir, engine)
    }

    #[test]
    fn test_first_buy_creates_portfolio_and_wallet() {
        let (dir, engine) = setup_engine();

        let result = engine.buy(1, &code("BTC"), 0.5, &code("USD")).unwrap();
        assert_eq!(result.before, 0.0);
        assert_eq!(result.after, 0.5);
        let rate = result.rate.unwrap();
        assert!((rate - 59_337.21).abs() < 1e-9);
        assert!((result.estimated_value.unwrap() - 0.5 * rate).abs() < 1e-9);

        // The mutation survived to disk.
        let store = PortfolioStore::new(dir.path().join("portfolios.json"));
        let stored = store.find(1).unwrap().unwrap();
        assert_eq!(stored.balance(&code("BTC")), 0.5);
    }

    #[test]
    fn test_buys_accumulate() {
        let (_dir, engine) = setup_engine();
        engine.buy(1, &code("ETH"), 1.0, &code("USD")).unwrap();
        let result = engine.buy(1, &code("ETH"), 0.5, &code("USD")).unwrap();
        assert_eq!(result.before, 1.0);
        assert_eq!(result.after, 1.5);
    }

    #[test]
    fn test_buy_rejects_bad_amount_before_anything_else() {
        let (dir, engine) = setup_engine();
        for amount in [0.0, -3.0, f64::NAN] {
            assert!(matches!(
                engine.buy(1, &code("BTC"), amount, &code("USD")),
                Err(HubError::InvalidAmount { .. })
            ));
        }
        // Nothing was created or persisted.
        assert!(!dir.path().join("portfolios.json").exists());
        assert!(!dir.path().join("rates.json").exists());
    }

    #[test]
    fn test_buy_rejects_unknown_currency() {
        let (_dir, engine) = setup_engine();
        assert!(matches!(
            engine.buy(1, &code("DKK"), 1.0, &code("USD")),
            Err(HubError::CurrencyNotFound { code }) if code == "DKK"
        ));
    }

    #[test]
    fn test_sell_roundtrip() {
        let (_dir, engine) = setup_engine();
        engine.buy(1, &code("BTC"), 0.5, &code("USD")).unwrap();

        let result = engine.sell(1, &code("BTC"), 0.2, &code("USD")).unwrap();
        assert_eq!(result.before, 0.5);
        assert!((result.after - 0.3).abs() < 1e-12);
        assert!(result.rate.is_some());
    }

    #[test]
    fn test_sell_without_wallet_fails() {
        let (_dir, engine) = setup_engine();
        engine.buy(2, &code("ETH"), 1.0, &code("USD")).unwrap();

        let err = engine.sell(2, &code("BTC"), 0.1, &code("USD")).unwrap_err();
        assert!(matches!(
            err,
            HubError::NoWallet { user_id: 2, code } if code == "BTC"
        ));
    }

    #[test]
    fn test_sell_for_unknown_user_fails_with_no_wallet() {
        let (_dir, engine) = setup_engine();
        let err = engine.sell(99, &code("BTC"), 0.1, &code("USD")).unwrap_err();
        assert!(matches!(err, HubError::NoWallet { user_id: 99, .. }));
    }

    #[test]
    fn test_overdraft_reports_both_sides_and_changes_nothing() {
        let (dir, engine) = setup_engine();
        engine.buy(1, &code("BTC"), 0.5, &code("USD")).unwrap();

        let err = engine.sell(1, &code("BTC"), 10.0, &code("USD")).unwrap_err();
        match err {
            HubError::InsufficientFunds {
                available,
                required,
                code: currency,
            } => {
                assert_eq!(available, 0.5);
                assert_eq!(required, 10.0);
                assert_eq!(currency, "BTC");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let store = PortfolioStore::new(dir.path().join("portfolios.json"));
        assert_eq!(store.find(1).unwrap().unwrap().balance(&code("BTC")), 0.5);
    }

    #[test]
    fn test_portfolio_valuation_totals_in_base() {
        let (_dir, engine) = setup_engine();
        engine.buy(1, &code("BTC"), 0.5, &code("USD")).unwrap();
        engine.buy(1, &code("EUR"), 100.0, &code("USD")).unwrap();

        let valuation = engine.show_portfolio(1, &code("USD")).unwrap();
        assert_eq!(valuation.items.len(), 2);

        let expected = 0.5 * 59_337.21 + 100.0 * 1.0786;
        assert!((valuation.total - expected).abs() < 1e-6);

        // Wallets come back in code order.
        assert_eq!(valuation.items[0].currency, code("BTC"));
        assert_eq!(valuation.items[1].currency, code("EUR"));
    }

    #[test]
    fn test_empty_portfolio_values_to_zero() {
        let (_dir, engine) = setup_engine();
        let valuation = engine.show_portfolio(42, &code("USD")).unwrap();
        assert!(valuation.items.is_empty());
        assert_eq!(valuation.total, 0.0);
    }

    // Registry that admits a code the fallback table cannot price, to
    // drive pricing failures through otherwise valid trades.
    struct WideRegistry(StaticRegistry);

    impl CurrencyRegistry for WideRegistry {
        fn exists(&self, code: &CurrencyCode) -> bool {
            code.as_str() == "XXX" || self.0.exists(code)
        }

        fn describe(&self, code: &CurrencyCode) -> fxhub_common::Result<CurrencyMetadata> {
            self.0.describe(code)
        }

        fn list(&self) -> Vec<CurrencyMetadata> {
            self.0.list()
        }
    }

    fn setup_wide_engine() -> (TempDir, LedgerEngine) {
        let dir = tempfile::tempdir().unwrap();
        let engine = build_engine(&dir, Arc::new(WideRegistry(StaticRegistry::builtin())));
        (dir, engine)
    }

    #[test]
    fn test_unpriceable_buy_still_settles() {
        let (dir, engine) = setup_wide_engine();

        let result = engine.buy(1, &code("XXX"), 5.0, &code("USD")).unwrap();
        assert_eq!(result.after, 5.0);
        assert!(result.rate.is_none());
        assert!(result.estimated_value.is_none());

        let store = PortfolioStore::new(dir.path().join("portfolios.json"));
        assert_eq!(store.find(1).unwrap().unwrap().balance(&code("XXX")), 5.0);
    }

    #[test]
    fn test_unpriceable_sell_still_settles() {
        let (_dir, engine) = setup_wide_engine();
        engine.buy(1, &code("XXX"), 5.0, &code("USD")).unwrap();

        let result = engine.sell(1, &code("XXX"), 2.0, &code("USD")).unwrap();
        assert_eq!(result.after, 3.0);
        assert!(result.rate.is_none());
    }

    #[test]
    fn test_valuation_aborts_on_unpriceable_wallet() {
        let (_dir, engine) = setup_wide_engine();
        engine.buy(1, &code("BTC"), 0.5, &code("USD")).unwrap();
        engine.buy(1, &code("XXX"), 5.0, &code("USD")).unwrap();

        let err = engine.show_portfolio(1, &code("USD")).unwrap_err();
        assert!(matches!(
            err,
            HubError::CurrencyNotFound { code } if code == "XXX"
        ));
    }
}
