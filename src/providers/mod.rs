//! Quote source implementations

pub mod alpha_vantage;
pub mod failover;
mod http;
pub mod nse;
pub mod scrape;
pub mod yahoo;

pub use alpha_vantage::AlphaVantageSource;
pub use failover::{FailoverChain, Served, SourceFailure};
pub use nse::NseSource;
pub use scrape::GoogleFinanceSource;
pub use yahoo::YahooSource;

use crate::{config::EngineConfig, error::ConfigError, provider::QuoteSource};
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;

/// The production chain: primary API, secondary API, exchange, scrape
pub fn default_sources(config: &EngineConfig) -> Result<Vec<Arc<dyn QuoteSource>>, ConfigError> {
    if config.api_key.is_none() {
        tracing::warn!("ALPHA_VANTAGE_API_KEY is not set; the primary source will be skipped");
    }

    Ok(vec![
        Arc::new(AlphaVantageSource::new(config)?),
        Arc::new(YahooSource::new(config)?),
        Arc::new(NseSource::new(config)?),
        Arc::new(GoogleFinanceSource::new(config)?),
    ])
}

pub(crate) fn parse_decimal(text: &str) -> Option<Decimal> {
    Decimal::from_str(text.trim()).ok()
}

pub(crate) fn decimal_from_f64(value: f64) -> Option<Decimal> {
    Decimal::try_from(value).ok()
}

/// Midnight UTC of a trading date
pub(crate) fn utc_midnight(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}
