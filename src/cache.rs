//! In-memory quote cache with per-entry expiry
//!
//! The cache is an explicit object handed to the engine, backed by a
//! [`CacheStore`] so tests (or an external cache service) can swap the
//! storage. Expired entries are never served: a read at or after
//! `expires_at` is a miss and drops the entry.

use crate::{
    symbol::Symbol,
    types::{HistoryPeriod, PricePoint, Quote, SourceKind},
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Value held by a cache entry
#[derive(Debug, Clone, PartialEq)]
pub enum CachedValue {
    Quote(Quote),
    History {
        points: Vec<PricePoint>,
        source: SourceKind,
    },
}

/// A stored value with its absolute expiry
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub value: CachedValue,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    /// True once `now` has reached `expires_at`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Backing storage for [`QuoteCache`]
///
/// Implementations must apply each call atomically; the cache never
/// holds a store lock across calls.
pub trait CacheStore: Send + Sync {
    /// Returns the entry for `key`, expired or not
    fn load(&self, key: &str) -> Option<CacheEntry>;

    /// Inserts or replaces the entry
    fn store(&self, entry: CacheEntry);

    /// Removes the entry for `key`
    fn remove(&self, key: &str);

    /// Removes the entry for `key` only if it expired at `now`
    fn remove_if_expired(&self, key: &str, now: DateTime<Utc>);

    /// Drops every entry that expired at `now`, returning how many went
    fn purge_expired(&self, now: DateTime<Utc>) -> usize;

    /// Drops everything
    fn clear(&self);

    /// Number of entries currently held (expired ones included)
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Default backing store: a mutex-guarded map
#[derive(Default)]
pub struct InMemoryStore {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recovers from a poisoned lock; a half-finished panic elsewhere
    /// cannot leave a partially written entry because inserts are a
    /// single map operation.
    fn entries(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Cache mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

impl CacheStore for InMemoryStore {
    fn load(&self, key: &str) -> Option<CacheEntry> {
        self.entries().get(key).cloned()
    }

    fn store(&self, entry: CacheEntry) {
        self.entries().insert(entry.key.clone(), entry);
    }

    fn remove(&self, key: &str) {
        self.entries().remove(key);
    }

    fn remove_if_expired(&self, key: &str, now: DateTime<Utc>) {
        let mut entries = self.entries();
        if entries.get(key).is_some_and(|entry| entry.is_expired_at(now)) {
            entries.remove(key);
        }
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired_at(now));
        before - entries.len()
    }

    fn clear(&self) {
        self.entries().clear();
    }

    fn len(&self) -> usize {
        self.entries().len()
    }
}

/// Cache hit/miss counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Quote and history cache used by the engine
pub struct QuoteCache {
    store: Arc<dyn CacheStore>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Default for QuoteCache {
    fn default() -> Self {
        Self::new()
    }
}

impl QuoteCache {
    /// Creates a cache backed by an [`InMemoryStore`]
    pub fn new() -> Self {
        Self::with_store(Arc::new(InMemoryStore::new()))
    }

    /// Creates a cache over a custom backing store
    pub fn with_store(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Cache key for a live or fallback quote
    pub fn quote_key(symbol: &Symbol) -> String {
        format!("{symbol}|quote")
    }

    /// Cache key for a price history
    pub fn history_key(symbol: &Symbol, period: HistoryPeriod) -> String {
        format!("{symbol}|history:{}", period.yahoo_range())
    }

    /// Returns the unexpired value for `key`
    pub fn get(&self, key: &str) -> Option<CachedValue> {
        let now = Utc::now();
        match self.store.load(key) {
            Some(entry) if !entry.is_expired_at(now) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value)
            }
            Some(_) => {
                self.store.remove_if_expired(key, now);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Stores `value` under `key` for `ttl`
    pub fn set(&self, key: &str, value: CachedValue, ttl: Duration) {
        let ttl = ChronoDuration::from_std(ttl).unwrap_or(ChronoDuration::MAX);
        let expires_at = Utc::now()
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        self.store.store(CacheEntry {
            key: key.to_string(),
            value,
            expires_at,
        });
    }

    /// Cached quote for `symbol`, if fresh
    pub fn get_quote(&self, symbol: &Symbol) -> Option<Quote> {
        match self.get(&Self::quote_key(symbol))? {
            CachedValue::Quote(quote) => Some(quote),
            CachedValue::History { .. } => None,
        }
    }

    /// Caches a quote under its own symbol
    pub fn set_quote(&self, quote: &Quote, ttl: Duration) {
        self.set_quote_for(&quote.symbol, quote, ttl);
    }

    /// Caches a quote under `symbol`, which may differ from the quote's
    /// own symbol when another listing answered for it
    pub fn set_quote_for(&self, symbol: &Symbol, quote: &Quote, ttl: Duration) {
        tracing::debug!(
            symbol = %symbol,
            source = %quote.source,
            ttl_secs = ttl.as_secs(),
            "Caching quote"
        );
        self.set(
            &Self::quote_key(symbol),
            CachedValue::Quote(quote.clone()),
            ttl,
        );
    }

    /// Cached history for `symbol` and `period`, if fresh
    pub fn get_history(&self, symbol: &Symbol, period: HistoryPeriod) -> Option<Vec<PricePoint>> {
        self.get_history_with_source(symbol, period)
            .map(|(points, _)| points)
    }

    /// Cached history and the kind of source that served it
    pub fn get_history_with_source(
        &self,
        symbol: &Symbol,
        period: HistoryPeriod,
    ) -> Option<(Vec<PricePoint>, SourceKind)> {
        match self.get(&Self::history_key(symbol, period))? {
            CachedValue::History { points, source } => Some((points, source)),
            CachedValue::Quote(_) => None,
        }
    }

    /// Caches a history series served by `source`
    pub fn set_history(
        &self,
        symbol: &Symbol,
        period: HistoryPeriod,
        points: Vec<PricePoint>,
        source: SourceKind,
        ttl: Duration,
    ) {
        self.set(
            &Self::history_key(symbol, period),
            CachedValue::History { points, source },
            ttl,
        );
    }

    /// Drops one entry
    pub fn invalidate(&self, key: &str) {
        self.store.remove(key);
    }

    /// Drops every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        self.store.purge_expired(Utc::now())
    }

    /// Drops everything and resets the counters
    pub fn clear(&self) {
        self.store.clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Hit/miss counters and current size
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.store.len(),
        }
    }
}
