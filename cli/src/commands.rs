//! Subcommand definitions and handlers.

use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use fxhub_common::{format_compact, CurrencyCode, CurrencyRegistry, StaticRegistry};
use fxhub_ledger::{LedgerEngine, PortfolioStore, PortfolioValuation, TradeResult};
use fxhub_rates::{
    CoinGeckoClient, ExchangeRateApiClient, RateResolver, RateSource, RateStore, RateUpdater,
    ResolverConfig, UpdateResult, UpdaterConfig,
};

use crate::auth::{self, UserStore};
use crate::config::HubConfig;

/// FxHub CLI
#[derive(Parser, Debug)]
#[command(name = "fxhub")]
#[command(about = "Multi-currency rate cache and trading ledger")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a new user account
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },

    /// Verify credentials and show account details
    Login {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },

    /// Buy an amount of a currency
    Buy {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        /// Currency to buy
        #[arg(long)]
        currency: String,
        /// Amount in units of the bought currency
        #[arg(long)]
        amount: f64,
        /// Base currency the trade is priced in
        #[arg(long)]
        base: Option<String>,
    },

    /// Sell an amount of a currency
    Sell {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        /// Currency to sell
        #[arg(long)]
        currency: String,
        /// Amount in units of the sold currency
        #[arg(long)]
        amount: f64,
        /// Base currency the trade is priced in
        #[arg(long)]
        base: Option<String>,
    },

    /// Show the portfolio valued in a base currency
    Portfolio {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        /// Valuation base currency
        #[arg(long)]
        base: Option<String>,
    },

    /// Show the current rate for a pair, with its inverse
    Rate {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
    },

    /// Pull fresh rates from the configured sources
    Update {
        /// Keep updating on an interval instead of exiting
        #[arg(long)]
        watch: bool,
        /// Seconds between watch-mode runs
        #[arg(long, default_value = "300")]
        interval: u64,
    },

    /// List the supported currencies
    Currencies,
}

fn rate_store(config: &HubConfig) -> Arc<RateStore> {
    Arc::new(RateStore::new(config.rates_path(), config.history_path()))
}

fn make_resolver(config: &HubConfig, registry: Arc<dyn CurrencyRegistry>) -> RateResolver {
    RateResolver::new(
        registry,
        rate_store(config),
        ResolverConfig { ttl: config.ttl() },
    )
}

fn make_engine(config: &HubConfig, registry: Arc<dyn CurrencyRegistry>) -> LedgerEngine {
    LedgerEngine::new(
        registry.clone(),
        PortfolioStore::new(config.portfolios_path()),
        make_resolver(config, registry),
    )
}

fn build_sources(config: &HubConfig) -> anyhow::Result<Vec<Arc<dyn RateSource>>> {
    let mut sources: Vec<Arc<dyn RateSource>> = vec![Arc::new(CoinGeckoClient::new(
        &config.base_currency,
        config.source_timeout(),
    )?)];

    match &config.exchangerate_api_key {
        Some(key) => sources.push(Arc::new(ExchangeRateApiClient::new(
            key,
            &config.base_currency,
            &config.fiat_symbols,
            config.source_timeout(),
        )?)),
        None => warn!("EXCHANGERATE_API_KEY is not set, skipping the fiat source"),
    }

    Ok(sources)
}

fn resolve_base(arg: Option<&str>, config: &HubConfig) -> anyhow::Result<CurrencyCode> {
    Ok(CurrencyCode::parse(arg.unwrap_or(&config.base_currency))?)
}

/// Dispatch one parsed invocation.
pub async fn run(cli: Cli, config: HubConfig) -> anyhow::Result<()> {
    let registry: Arc<dyn CurrencyRegistry> = Arc::new(StaticRegistry::builtin());

    match cli.command {
        Command::Register { username, password } => {
            let users = UserStore::new(config.users_path());
            let portfolios = PortfolioStore::new(config.portfolios_path());
            let user = auth::register(&users, &portfolios, &username, &password)?;
            println!("User '{}' registered with id {}.", user.username, user.user_id);
        }

        Command::Login { username, password } => {
            let users = UserStore::new(config.users_path());
            let user = auth::login(&users, &username, &password)?;
            println!(
                "Logged in as '{}' (id {}, registered {}).",
                user.username,
                user.user_id,
                format_compact(user.registration_date)
            );
        }

        Command::Buy {
            username,
            password,
            currency,
            amount,
            base,
        } => {
            let user = auth::login(&UserStore::new(config.users_path()), &username, &password)?;
            let currency = CurrencyCode::parse(&currency)?;
            let base = resolve_base(base.as_deref(), &config)?;
            let result = make_engine(&config, registry).buy(user.user_id, &currency, amount, &base)?;
            print_trade("Bought", &result);
        }

        Command::Sell {
            username,
            password,
            currency,
            amount,
            base,
        } => {
            let user = auth::login(&UserStore::new(config.users_path()), &username, &password)?;
            let currency = CurrencyCode::parse(&currency)?;
            let base = resolve_base(base.as_deref(), &config)?;
            let result =
                make_engine(&config, registry).sell(user.user_id, &currency, amount, &base)?;
            print_trade("Sold", &result);
        }

        Command::Portfolio {
            username,
            password,
            base,
        } => {
            let user = auth::login(&UserStore::new(config.users_path()), &username, &password)?;
            let base = resolve_base(base.as_deref(), &config)?;
            let valuation =
                make_engine(&config, registry).show_portfolio(user.user_id, &base)?;
            print_valuation(&user.username, &valuation);
        }

        Command::Rate { from, to } => {
            let from = CurrencyCode::parse(&from)?;
            let to = CurrencyCode::parse(&to)?;
            let resolver = make_resolver(&config, registry);

            let quote = resolver.resolve(&from, &to)?;
            let inverse = resolver.resolve(&to, &from)?;
            println!(
                "Rate {}: {:.8} (updated {}, source {})",
                quote.pair,
                quote.rate,
                format_compact(quote.updated_at),
                quote.source.as_deref().unwrap_or("identity")
            );
            println!("Inverse {}: {:.8}", inverse.pair, inverse.rate);
        }

        Command::Update { watch, interval } => {
            let updater = RateUpdater::new(
                rate_store(&config),
                UpdaterConfig {
                    source_timeout: config.source_timeout(),
                },
            );
            let sources = build_sources(&config)?;
            info!(sources = sources.len(), "Configured rate sources");

            if watch {
                let mut ticker = tokio::time::interval(Duration::from_secs(interval.max(1)));
                loop {
                    ticker.tick().await;
                    report_update(&updater.run_update(&sources).await?);
                }
            }
            report_update(&updater.run_update(&sources).await?);
        }

        Command::Currencies => {
            for meta in registry.list() {
                println!("{}", meta.display_line());
            }
        }
    }

    Ok(())
}

fn print_trade(verb: &str, result: &TradeResult) {
    println!(
        "{} {:.4} {} (balance {:.4} -> {:.4})",
        verb, result.amount, result.currency, result.before, result.after
    );
    match (result.rate, result.estimated_value) {
        (Some(rate), Some(value)) => {
            println!("Rate {}/{}: {:.8}", result.currency, result.base, rate);
            println!("Estimated value: {:.4} {}", value, result.base);
        }
        _ => println!("No rate available right now; trade settled without an estimate."),
    }
}

fn print_valuation(username: &str, valuation: &PortfolioValuation) {
    if valuation.items.is_empty() {
        println!("Portfolio of '{}' is empty.", username);
        return;
    }

    println!("Portfolio of '{}' (in {}):", username, valuation.base);
    for item in &valuation.items {
        println!(
            "  {:<5} {:>16.4}  -> {:>16.4} {}",
            item.currency, item.balance, item.value_in_base, valuation.base
        );
    }
    println!("  TOTAL {:>37.4} {}", valuation.total, valuation.base);
}

fn report_update(result: &UpdateResult) {
    println!(
        "Updated {} pair(s) at {}.",
        result.updated_count,
        format_compact(result.last_refresh)
    );
    for error in &result.errors {
        println!("  source error: {}", error);
    }
}
