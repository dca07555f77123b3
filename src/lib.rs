//! # Indian Market Data Engine
//!
//! Current prices, price histories and market snapshots for NSE/BSE
//! equities, market indices and mutual funds.
//!
//! Quotes are served from a TTL cache, then from an ordered chain of
//! sources (Alpha Vantage, Yahoo Finance, the NSE/MFAPI endpoints and a
//! Google Finance page scrape), and finally from a static table of
//! last-known prices. Callers only ever see a quote or a
//! "temporarily unavailable" error.
//!
//! ## Usage
//!
//! The engine uses a singleton pattern for easy access throughout the application:
//!
//! ```no_run
//! use market_data_engine::{HistoryPeriod, MarketDataEngine};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = MarketDataEngine::global().await?;
//!
//! // A single quote
//! let quote = engine.get_quote("NSE:RELIANCE").await?;
//! println!("{}: ₹{} ({:+}%)", quote.symbol, quote.price, quote.change_percent);
//!
//! // The default index snapshot
//! let snapshot = engine.get_market_snapshot().await;
//! for entry in &snapshot {
//!     println!("{}: ₹{}", entry.key, entry.quote.price);
//! }
//!
//! // A month of daily closes
//! let history = engine.get_history("TCS", HistoryPeriod::Month).await?;
//! println!("{} points", history.len());
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod catalog;
pub mod config;
pub mod constants;
pub mod cooldown;
pub mod engine;
pub mod error;
pub mod fallback;
pub mod metrics;
pub mod provider;
pub mod providers;
pub mod snapshot;
pub mod symbol;
pub mod types;

// Re-export commonly used types
pub use cache::{CacheStats, QuoteCache};
pub use catalog::{CatalogEntry, SearchHit, SymbolCatalog};
pub use config::EngineConfig;
pub use engine::MarketDataEngine;
pub use error::{ConfigError, FetchError, QuoteError};
pub use fallback::FallbackPriceTable;
pub use metrics::SourceMetrics;
pub use provider::QuoteSource;
pub use snapshot::{MarketSnapshot, SnapshotEntry};
pub use symbol::{Exchange, Symbol};
pub use types::{
    ComponentHealth, HealthStatus, HistoryPeriod, PricePoint, Quote, QuoteEvent, SourceKind,
};
