//! Market snapshot: one quote per requested index, in request order

use crate::{
    constants::DEFAULT_INDICES,
    symbol::Symbol,
    types::{Quote, SourceKind},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// One line of a snapshot
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotEntry {
    /// The symbol as the caller asked for it
    pub key: String,
    pub quote: Quote,
    /// False when no source and no fallback knew the symbol; the quote
    /// is then a zero-priced placeholder
    pub available: bool,
}

/// Quotes for a set of symbols fetched in one pass
///
/// Every requested label has an entry, so callers never special-case
/// missing keys. Labels that resolve to the same instrument (`NIFTY`,
/// `^NSEI`) each get an entry carrying the same quote.
#[derive(Debug, Clone, Serialize)]
pub struct MarketSnapshot {
    entries: Vec<SnapshotEntry>,
    pub as_of: DateTime<Utc>,
}

impl MarketSnapshot {
    pub(crate) fn new(entries: Vec<SnapshotEntry>) -> Self {
        Self {
            entries,
            as_of: Utc::now(),
        }
    }

    /// Indices shown when the caller does not pick any
    pub fn default_indices() -> &'static [&'static str] {
        DEFAULT_INDICES
    }

    /// Zero-priced stand-in for a symbol nobody could quote
    pub(crate) fn placeholder(symbol: Symbol) -> Quote {
        Quote {
            symbol,
            price: Decimal::ZERO,
            change: Decimal::ZERO,
            change_percent: Decimal::ZERO,
            as_of: Utc::now(),
            source: SourceKind::StaticFallback,
        }
    }

    /// Quote for a requested key or its canonical symbol
    pub fn get(&self, key: &str) -> Option<&Quote> {
        let key = key.trim();
        self.entries
            .iter()
            .find(|entry| entry.key == key)
            .or_else(|| {
                let symbol = Symbol::parse(key).ok()?;
                self.entries.iter().find(|entry| entry.quote.symbol == symbol)
            })
            .map(|entry| &entry.quote)
    }

    /// Requested keys in request order
    pub fn keys(&self) -> Vec<&str> {
        self.entries.iter().map(|entry| entry.key.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SnapshotEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys that only have a placeholder
    pub fn unavailable(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|entry| !entry.available)
            .map(|entry| entry.key.as_str())
            .collect()
    }

    /// True if any entry is not from a live source
    pub fn is_degraded(&self) -> bool {
        self.entries.iter().any(|entry| !entry.quote.is_live())
    }
}

impl<'a> IntoIterator for &'a MarketSnapshot {
    type Item = &'a SnapshotEntry;
    type IntoIter = std::slice::Iter<'a, SnapshotEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
