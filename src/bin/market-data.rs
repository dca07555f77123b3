//! Command-line front end for the market data engine.
//!
//! Every command prints JSON on stdout; logs go to stderr.
use anyhow::Context;
use clap::{Parser, Subcommand};
use market_data_engine::{EngineConfig, HistoryPeriod, MarketDataEngine, MarketSnapshot};
use serde::Serialize;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Quotes, snapshots and histories for Indian equities, indices and mutual funds.
#[derive(Debug, Parser)]
#[command(name = "market-data", version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Current quote for one symbol (`RELIANCE`, `NSE:TCS`, `NIFTY`, `MF:119598`)
    Quote { symbol: String },

    /// Quotes for several symbols; the default indices when none are given
    Snapshot { symbols: Vec<String> },

    /// Daily price history, oldest first
    History {
        symbol: String,

        /// 1w, 1mo, 3mo, 6mo, 1y or 3y
        #[arg(long, default_value = "1mo")]
        period: HistoryPeriod,
    },

    /// Search the instrument catalog by name, AMC, category or code
    Search { query: String },
}

fn init_tracing() {
    let log_format =
        std::env::var("MARKET_DATA_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false).with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let args = Args::parse();
    let config = EngineConfig::from_env().context("invalid engine configuration")?;
    let engine = MarketDataEngine::new(config).context("failed to build market data engine")?;

    match args.command {
        Command::Quote { symbol } => {
            let quote = engine.get_quote(&symbol).await?;
            print_json(&quote)?;
        }
        Command::Snapshot { symbols } => {
            let requested: Vec<&str> = if symbols.is_empty() {
                MarketSnapshot::default_indices().to_vec()
            } else {
                symbols.iter().map(String::as_str).collect()
            };
            let snapshot = engine.get_snapshot(&requested).await;
            if !snapshot.unavailable().is_empty() {
                tracing::warn!(
                    unavailable = ?snapshot.unavailable(),
                    "Some symbols could not be quoted"
                );
            }
            print_json(&snapshot)?;
        }
        Command::History { symbol, period } => {
            let points = engine.get_history(&symbol, period).await?;
            print_json(&points)?;
        }
        Command::Search { query } => {
            print_json(&engine.search(&query))?;
        }
    }

    Ok(())
}
