//! Types for the market data engine

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::symbol::Symbol;

/// Which kind of source produced a quote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceKind {
    /// Primary quote API (keyed)
    PrimaryApi,
    /// Secondary quote API
    SecondaryApi,
    /// Official exchange / fund registry API
    ExchangeApi,
    /// HTML quote page
    Scrape,
    /// Hand-curated last-known price
    StaticFallback,
}

impl SourceKind {
    /// Stable label used in logs and serialized output
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::PrimaryApi => "PRIMARY_API",
            SourceKind::SecondaryApi => "SECONDARY_API",
            SourceKind::ExchangeApi => "EXCHANGE_API",
            SourceKind::Scrape => "SCRAPE",
            SourceKind::StaticFallback => "STATIC_FALLBACK",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A point-in-time price observation with provenance
///
/// Deserializing applies the same checks as the constructors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawQuote")]
pub struct Quote {
    /// Canonical symbol
    pub symbol: Symbol,

    /// Last traded price or NAV
    pub price: Decimal,

    /// Absolute change versus the previous close
    pub change: Decimal,

    /// Percentage change versus the previous close
    pub change_percent: Decimal,

    /// When the observation was taken
    pub as_of: DateTime<Utc>,

    /// Which source served it
    pub source: SourceKind,
}

impl Quote {
    /// Creates a quote with no change information
    ///
    /// Returns `None` for a negative price.
    pub fn new(symbol: Symbol, price: Decimal, source: SourceKind) -> Option<Self> {
        Self::with_change(symbol, price, Decimal::ZERO, Decimal::ZERO, source)
    }

    /// Creates a quote with change information
    ///
    /// Returns `None` for a negative price.
    pub fn with_change(
        symbol: Symbol,
        price: Decimal,
        change: Decimal,
        change_percent: Decimal,
        source: SourceKind,
    ) -> Option<Self> {
        if price.is_sign_negative() && !price.is_zero() {
            return None;
        }

        Some(Self {
            symbol,
            price,
            change,
            change_percent,
            as_of: Utc::now(),
            source,
        })
    }

    /// Derives change and change percent from a previous close
    pub fn from_previous_close(
        symbol: Symbol,
        price: Decimal,
        previous_close: Option<Decimal>,
        source: SourceKind,
    ) -> Option<Self> {
        match previous_close.filter(|prev| !prev.is_zero()) {
            Some(prev) => {
                let change = price - prev;
                let change_percent = (change / prev * Decimal::ONE_HUNDRED).round_dp(2);
                Self::with_change(symbol, price, change, change_percent, source)
            }
            None => Self::new(symbol, price, source),
        }
    }

    /// True when the quote came from a live source
    pub fn is_live(&self) -> bool {
        self.source != SourceKind::StaticFallback
    }

    /// Check if the quote is older than `threshold_seconds`
    pub fn is_stale(&self, threshold_seconds: u64) -> bool {
        let age = Utc::now().signed_duration_since(self.as_of);
        age.num_seconds() > threshold_seconds as i64
    }

    /// Get the age of the quote
    pub fn age(&self) -> std::time::Duration {
        let duration = Utc::now().signed_duration_since(self.as_of);
        std::time::Duration::from_secs(duration.num_seconds().max(0) as u64)
    }
}

/// Unchecked wire form of a [`Quote`]
#[derive(Deserialize)]
struct RawQuote {
    symbol: Symbol,
    price: Decimal,
    change: Decimal,
    change_percent: Decimal,
    as_of: DateTime<Utc>,
    source: SourceKind,
}

impl TryFrom<RawQuote> for Quote {
    type Error = String;

    fn try_from(raw: RawQuote) -> Result<Self, Self::Error> {
        let quote = Quote::with_change(
            raw.symbol,
            raw.price,
            raw.change,
            raw.change_percent,
            raw.source,
        )
        .ok_or_else(|| format!("negative price {}", raw.price))?;

        Ok(Quote {
            as_of: raw.as_of,
            ..quote
        })
    }
}

/// One observation in a price history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub price: Decimal,
}

/// Length of a requested price history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HistoryPeriod {
    Week,
    Month,
    Quarter,
    HalfYear,
    Year,
    ThreeYears,
}

impl HistoryPeriod {
    /// Number of calendar days covered
    pub fn days(&self) -> i64 {
        match self {
            HistoryPeriod::Week => 7,
            HistoryPeriod::Month => 30,
            HistoryPeriod::Quarter => 91,
            HistoryPeriod::HalfYear => 182,
            HistoryPeriod::Year => 365,
            HistoryPeriod::ThreeYears => 1095,
        }
    }

    /// Yahoo chart `range` parameter covering at least this period
    pub fn yahoo_range(&self) -> &'static str {
        match self {
            HistoryPeriod::Week => "5d",
            HistoryPeriod::Month => "1mo",
            HistoryPeriod::Quarter => "3mo",
            HistoryPeriod::HalfYear => "6mo",
            HistoryPeriod::Year => "1y",
            HistoryPeriod::ThreeYears => "5y",
        }
    }

    /// Earliest timestamp included in the period, counted back from `now`
    pub fn start_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - ChronoDuration::days(self.days())
    }
}

impl FromStr for HistoryPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1w" | "5d" | "7d" | "week" => Ok(HistoryPeriod::Week),
            "1mo" | "1m" | "30d" | "month" => Ok(HistoryPeriod::Month),
            "3mo" | "3m" | "quarter" => Ok(HistoryPeriod::Quarter),
            "6mo" | "6m" => Ok(HistoryPeriod::HalfYear),
            "1y" | "12mo" | "year" => Ok(HistoryPeriod::Year),
            "3y" => Ok(HistoryPeriod::ThreeYears),
            other => Err(format!("unknown history period: {other}")),
        }
    }
}

/// Engine events for observers such as a "data may be stale" banner
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuoteEvent {
    /// A live source served a quote
    QuoteServed {
        id: Uuid,
        symbol: String,
        source: SourceKind,
        price: Decimal,
        timestamp: DateTime<Utc>,
    },

    /// A source failed for a symbol
    SourceFailed {
        id: Uuid,
        symbol: String,
        source: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },

    /// Every live source failed and the static table answered
    FallbackServed {
        id: Uuid,
        symbol: String,
        price: Decimal,
        timestamp: DateTime<Utc>,
    },
}

impl QuoteEvent {
    /// Get the event ID
    pub fn id(&self) -> Uuid {
        match self {
            QuoteEvent::QuoteServed { id, .. } => *id,
            QuoteEvent::SourceFailed { id, .. } => *id,
            QuoteEvent::FallbackServed { id, .. } => *id,
        }
    }

    /// Get the event type as string
    pub fn event_type(&self) -> &'static str {
        match self {
            QuoteEvent::QuoteServed { .. } => "QUOTE_SERVED",
            QuoteEvent::SourceFailed { .. } => "SOURCE_FAILED",
            QuoteEvent::FallbackServed { .. } => "FALLBACK_SERVED",
        }
    }
}

impl fmt::Display for QuoteEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuoteEvent::QuoteServed {
                symbol,
                source,
                price,
                ..
            } => write!(f, "Quote served: {symbol} = {price} ({source})"),
            QuoteEvent::SourceFailed {
                symbol,
                source,
                error_message,
                ..
            } => write!(f, "Source {source} failed for {symbol}: {error_message}"),
            QuoteEvent::FallbackServed { symbol, price, .. } => {
                write!(f, "Static fallback served: {symbol} = {price}")
            }
        }
    }
}

/// Overall system health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// All sources are answering
    Healthy,
    /// Some sources are failing or cooling down
    Degraded,
    /// No source is answering
    Unhealthy,
}

/// Component health information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    /// Component name
    pub name: String,
    /// Component status
    pub status: HealthStatus,
    /// Optional status message
    pub message: Option<String>,
    /// Component-specific details
    pub details: std::collections::HashMap<String, serde_json::Value>,
    /// Last checked timestamp
    pub last_checked: DateTime<Utc>,
}
