//! Market data engine service
//!
//! Cache check, ordered source walk, static fallback. Also hosts the
//! snapshot aggregator, history lookups and catalog search.

use crate::{
    cache::QuoteCache,
    catalog::{SearchHit, SymbolCatalog},
    config::EngineConfig,
    constants::{CACHE_SWEEP_INTERVAL_SECS, DEFAULT_INDICES, EVENT_CHANNEL_CAPACITY},
    error::{ConfigError, FetchError, QuoteError},
    fallback::FallbackPriceTable,
    metrics::SourceMetrics,
    provider::QuoteSource,
    providers::{self, FailoverChain, SourceFailure},
    snapshot::{MarketSnapshot, SnapshotEntry},
    symbol::{Exchange, Symbol},
    types::{
        ComponentHealth, HealthStatus, HistoryPeriod, PricePoint, Quote, QuoteEvent, SourceKind,
    },
};
use chrono::Utc;
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, OnceCell};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use uuid::Uuid;

static GLOBAL_ENGINE: OnceCell<Arc<MarketDataEngine>> = OnceCell::const_new();

/// Success rate under which a source counts as degraded
const DEGRADED_SUCCESS_RATE: f64 = 0.5;

/// Cached histories consulted for a last close, shortest first
const HISTORY_PERIODS: [HistoryPeriod; 6] = [
    HistoryPeriod::Week,
    HistoryPeriod::Month,
    HistoryPeriod::Quarter,
    HistoryPeriod::HalfYear,
    HistoryPeriod::Year,
    HistoryPeriod::ThreeYears,
];

/// Market data engine
///
/// Returns a price for any supported instrument, degrading through the
/// source chain and finally the static fallback table. Only
/// [`QuoteError`] ever reaches the caller.
///
/// # Example
/// ```no_run
/// use market_data_engine::MarketDataEngine;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let engine = MarketDataEngine::global().await?;
/// let quote = engine.get_quote("RELIANCE").await?;
/// println!("{}: ₹{} ({})", quote.symbol, quote.price, quote.source);
/// # Ok(())
/// # }
/// ```
pub struct MarketDataEngine {
    chain: FailoverChain,
    cache: Arc<QuoteCache>,
    fallback: FallbackPriceTable,
    catalog: SymbolCatalog,
    config: EngineConfig,
    events: broadcast::Sender<QuoteEvent>,
}

impl MarketDataEngine {
    /// Returns the process-wide instance
    ///
    /// On first call this reads configuration from the environment,
    /// builds the production source chain and starts the cache sweep.
    /// Subsequent calls return the same instance.
    pub async fn global() -> Result<Arc<Self>, ConfigError> {
        GLOBAL_ENGINE
            .get_or_try_init(|| async {
                let engine = Arc::new(Self::from_env()?);
                engine.start_background_sweep(Duration::from_secs(CACHE_SWEEP_INTERVAL_SECS));
                Ok::<_, ConfigError>(engine)
            })
            .await
            .cloned()
    }

    /// Creates an engine from environment configuration
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::new(EngineConfig::from_env()?)
    }

    /// Creates an engine with the production source chain
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        let sources = providers::default_sources(&config)?;
        Ok(Self::with_sources(
            sources,
            Arc::new(QuoteCache::new()),
            FallbackPriceTable::builtin(),
            config,
        ))
    }

    /// Creates an engine over custom sources, cache and fallback table
    ///
    /// Sources are tried in the order given. Primarily for testing.
    pub fn with_sources(
        sources: Vec<Arc<dyn QuoteSource>>,
        cache: Arc<QuoteCache>,
        fallback: FallbackPriceTable,
        config: EngineConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let chain = FailoverChain::new(sources, &config, events.clone());

        Self {
            chain,
            cache,
            fallback,
            catalog: SymbolCatalog::builtin(),
            config,
            events,
        }
    }

    /// Starts a task that periodically drops expired cache entries
    pub fn start_background_sweep(&self, interval: Duration) -> JoinHandle<()> {
        let cache = self.cache.clone();

        tokio::spawn(async move {
            tracing::info!(
                sweep_interval_secs = interval.as_secs(),
                "Starting cache sweep background task"
            );

            loop {
                sleep(interval).await;
                let purged = cache.purge_expired();
                if purged > 0 {
                    tracing::debug!(purged, remaining = cache.len(), "Purged expired cache entries");
                }
            }
        })
    }

    /// Gets the current quote for a symbol
    ///
    /// # Arguments
    /// * `symbol` - Anything [`Symbol::parse`] accepts (`"RELIANCE"`,
    ///   `"NSE:TCS"`, `"NIFTY"`, `"MF:119598"`)
    ///
    /// # Returns
    /// In order of preference: a live quote, a quote from the BSE listing
    /// of an NSE ticker no source knows, the last close of a recent
    /// history, or the static fallback price. `QuoteUnavailable` only
    /// when none of those exist.
    pub async fn get_quote(&self, symbol: &str) -> Result<Quote, QuoteError> {
        let symbol = Symbol::parse(symbol)?;
        self.quote(&symbol).await
    }

    /// Gets the current quote for a canonical symbol
    pub async fn quote(&self, symbol: &Symbol) -> Result<Quote, QuoteError> {
        if let Some(quote) = self.cache.get_quote(symbol) {
            tracing::debug!(symbol = %symbol, source = %quote.source, "Serving cached quote");
            return Ok(quote);
        }

        let failures = match self.chain.fetch(symbol).await {
            Ok(quote) => {
                self.cache.set_quote(&quote, self.config.quote_ttl);
                return Ok(quote);
            }
            Err(failures) => failures,
        };

        if let Some(quote) = self.alternate_listing(symbol, &failures).await {
            return Ok(quote);
        }

        if let Some(quote) = self.last_close(symbol).await {
            return Ok(quote);
        }

        self.serve_fallback(symbol, &failures)
    }

    /// Retries an NSE ticker on BSE when every source said it does not exist
    async fn alternate_listing(
        &self,
        symbol: &Symbol,
        failures: &[SourceFailure],
    ) -> Option<Quote> {
        let unknown_everywhere = !failures.is_empty()
            && failures
                .iter()
                .all(|f| matches!(f.error, FetchError::NotFound(_)));
        if symbol.exchange() != Exchange::Nse || !unknown_everywhere {
            return None;
        }

        let bse = Symbol::bse(symbol.code());
        let quote = match self.cache.get_quote(&bse) {
            Some(quote) => quote,
            None => {
                let quote = self.chain.fetch(&bse).await.ok()?;
                self.cache.set_quote(&quote, self.config.quote_ttl);
                quote
            }
        };

        tracing::info!(symbol = %symbol, listing = %bse, "Serving quote from BSE listing");
        self.cache.set_quote_for(symbol, &quote, self.config.quote_ttl);
        Some(quote)
    }

    /// Quote built from the newest close of a cached or freshly fetched history
    ///
    /// Histories that were themselves served from the static table are
    /// ignored. The quote carries the close's timestamp and is cached with
    /// the fallback TTL.
    async fn last_close(&self, symbol: &Symbol) -> Option<Quote> {
        let cached = HISTORY_PERIODS
            .iter()
            .filter_map(|period| self.cache.get_history_with_source(symbol, *period))
            .filter(|(points, source)| *source != SourceKind::StaticFallback && !points.is_empty())
            .max_by_key(|(points, _)| points.last().map(|p| p.timestamp));

        let (points, source) = match cached {
            Some(found) => found,
            None => {
                let served = self
                    .chain
                    .fetch_history(symbol, HistoryPeriod::Week)
                    .await
                    .ok()?;
                self.cache.set_history(
                    symbol,
                    HistoryPeriod::Week,
                    served.value.clone(),
                    served.kind,
                    self.config.history_ttl,
                );
                (served.value, served.kind)
            }
        };

        let (last, earlier) = points.split_last()?;
        let previous = earlier.last().map(|p| p.price);
        let mut quote = Quote::from_previous_close(symbol.clone(), last.price, previous, source)?;
        quote.as_of = last.timestamp;

        tracing::warn!(
            symbol = %symbol,
            price = %quote.price,
            as_of = %quote.as_of,
            source = %source,
            "No live quote, serving last close from history"
        );
        self.cache.set_quote(&quote, self.config.fallback_ttl);
        Some(quote)
    }

    fn serve_fallback(
        &self,
        symbol: &Symbol,
        failures: &[SourceFailure],
    ) -> Result<Quote, QuoteError> {
        let Some(quote) = self.fallback.quote(symbol) else {
            tracing::warn!(
                symbol = %symbol,
                failures = %summarize(failures),
                "No source or fallback price for symbol"
            );
            return Err(QuoteError::unavailable(symbol.to_string()));
        };

        tracing::warn!(
            symbol = %symbol,
            price = %quote.price,
            failures = %summarize(failures),
            "All sources failed, serving static fallback"
        );
        self.cache.set_quote(&quote, self.config.fallback_ttl);
        let _ = self.events.send(QuoteEvent::FallbackServed {
            id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            price: quote.price,
            timestamp: Utc::now(),
        });
        Ok(quote)
    }

    /// Gets quotes for several symbols concurrently
    ///
    /// Every distinct non-blank label gets an entry, in request order.
    /// Labels naming the same instrument share one lookup and one quote.
    /// Unknown symbols get a zero-priced placeholder listed in
    /// [`MarketSnapshot::unavailable`].
    pub async fn get_snapshot(&self, symbols: &[&str]) -> MarketSnapshot {
        let mut seen_keys = HashSet::new();
        let mut labels: Vec<(String, Option<Symbol>)> = Vec::new();
        let mut unique: Vec<Symbol> = Vec::new();

        for raw in symbols {
            let key = raw.trim();
            if key.is_empty() || !seen_keys.insert(key.to_string()) {
                continue;
            }
            let symbol = Symbol::parse(key).ok();
            if let Some(symbol) = &symbol {
                if !unique.contains(symbol) {
                    unique.push(symbol.clone());
                }
            }
            labels.push((key.to_string(), symbol));
        }

        let quotes = join_all(unique.iter().map(|symbol| self.quote(symbol))).await;
        let found: HashMap<&Symbol, Quote> = unique
            .iter()
            .zip(quotes)
            .filter_map(|(symbol, quote)| Some((symbol, quote.ok()?)))
            .collect();

        let entries = labels
            .into_iter()
            .map(|(key, symbol)| {
                let quote = symbol.as_ref().and_then(|symbol| found.get(symbol)).cloned();
                match quote {
                    Some(quote) => SnapshotEntry {
                        key,
                        quote,
                        available: true,
                    },
                    None => {
                        let symbol = symbol.unwrap_or_else(|| Symbol::nse(&key));
                        SnapshotEntry {
                            key,
                            quote: MarketSnapshot::placeholder(symbol),
                            available: false,
                        }
                    }
                }
            })
            .collect();

        MarketSnapshot::new(entries)
    }

    /// Snapshot of the default market indices
    pub async fn get_market_snapshot(&self) -> MarketSnapshot {
        self.get_snapshot(DEFAULT_INDICES).await
    }

    /// Gets a price history, oldest point first
    ///
    /// Walks the sources that can serve history in chain order. When none
    /// can but the symbol has a fallback price, returns that single point.
    pub async fn get_history(
        &self,
        symbol: &str,
        period: HistoryPeriod,
    ) -> Result<Vec<PricePoint>, QuoteError> {
        let symbol = Symbol::parse(symbol)?;

        if let Some(points) = self.cache.get_history(&symbol, period) {
            return Ok(points);
        }

        match self.chain.fetch_history(&symbol, period).await {
            Ok(served) => {
                tracing::debug!(
                    symbol = %symbol,
                    source = served.source,
                    points = served.value.len(),
                    "Fetched price history"
                );
                self.cache.set_history(
                    &symbol,
                    period,
                    served.value.clone(),
                    served.kind,
                    self.config.history_ttl,
                );
                Ok(served.value)
            }
            Err(failures) => {
                let Some(price) = self.fallback.price(&symbol) else {
                    tracing::warn!(
                        symbol = %symbol,
                        failures = %summarize(&failures),
                        "No history available"
                    );
                    return Err(QuoteError::unavailable(symbol.to_string()));
                };

                tracing::warn!(
                    symbol = %symbol,
                    failures = %summarize(&failures),
                    "No history source answered, serving last-known price"
                );
                let points = vec![PricePoint {
                    timestamp: Utc::now(),
                    price,
                }];
                self.cache.set_history(
                    &symbol,
                    period,
                    points.clone(),
                    SourceKind::StaticFallback,
                    self.config.fallback_ttl,
                );
                Ok(points)
            }
        }
    }

    /// Searches the instrument catalog
    pub fn search(&self, query: &str) -> Vec<SearchHit> {
        self.catalog.search(query)
    }

    pub fn catalog(&self) -> &SymbolCatalog {
        &self.catalog
    }

    pub fn cache(&self) -> &Arc<QuoteCache> {
        &self.cache
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Subscribes to quote events
    pub fn subscribe(&self) -> broadcast::Receiver<QuoteEvent> {
        self.events.subscribe()
    }

    /// Per-source latency percentiles and success rates, in chain order
    ///
    /// # Example
    /// ```no_run
    /// # use market_data_engine::MarketDataEngine;
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let engine = MarketDataEngine::global().await?;
    /// for metrics in engine.provider_metrics().await {
    ///     println!("{}: p50={}ms, p99={}ms, success_rate={:.1}%",
    ///         metrics.source_name,
    ///         metrics.latency_p50_ms,
    ///         metrics.latency_p99_ms,
    ///         metrics.success_rate * 100.0
    ///     );
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn provider_metrics(&self) -> Vec<SourceMetrics> {
        self.chain.metrics().await
    }

    /// Perform a health check on the engine
    ///
    /// # Returns
    /// ComponentHealth indicating the status of the engine and its sources
    pub async fn health_check(&self) -> ComponentHealth {
        let mut details = HashMap::new();

        let metrics = self.provider_metrics().await;
        let cooling_down = self.chain.cooling_down();
        let stats = self.cache.stats();

        details.insert(
            "sources".to_string(),
            serde_json::json!(self.chain.source_names()),
        );
        details.insert(
            "success_rates".to_string(),
            serde_json::json!(metrics
                .iter()
                .map(|m| (m.source_name.clone(), m.success_rate))
                .collect::<HashMap<_, _>>()),
        );
        details.insert("cooling_down".to_string(), serde_json::json!(cooling_down));
        details.insert("cache_entries".to_string(), serde_json::json!(stats.entries));
        details.insert("cache_hits".to_string(), serde_json::json!(stats.hits));
        details.insert("cache_misses".to_string(), serde_json::json!(stats.misses));
        details.insert(
            "fallback_symbols".to_string(),
            serde_json::json!(self.fallback.len()),
        );

        let struggling: Vec<&str> = metrics
            .iter()
            .filter(|m| m.has_samples() && m.success_rate < DEGRADED_SUCCESS_RATE)
            .map(|m| m.source_name.as_str())
            .collect();
        let all_failing = !metrics.is_empty()
            && metrics
                .iter()
                .all(|m| m.has_samples() && m.success_rate == 0.0);

        let status = if all_failing {
            HealthStatus::Unhealthy
        } else if self.chain.is_empty() || !struggling.is_empty() || !cooling_down.is_empty() {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        let message = match status {
            HealthStatus::Healthy => "Market data engine is operational".to_string(),
            HealthStatus::Degraded if self.chain.is_empty() => {
                "No live sources configured; serving static fallback only".to_string()
            }
            HealthStatus::Degraded => format!(
                "Market data engine is degraded (failing: [{}], cooling down: [{}])",
                struggling.join(", "),
                cooling_down.join(", ")
            ),
            HealthStatus::Unhealthy => {
                "Every live source is failing; serving static fallback only".to_string()
            }
        };

        ComponentHealth {
            name: "market_data_engine".to_string(),
            status,
            message: Some(message),
            details,
            last_checked: Utc::now(),
        }
    }
}

fn summarize(failures: &[SourceFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{}: {}", f.source, f.error))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::mock::MockSource;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::time::Instant;

    fn test_config() -> EngineConfig {
        EngineConfig {
            request_timeout: Duration::from_millis(100),
            exchange_timeout: Duration::from_millis(100),
            ..EngineConfig::default()
        }
    }

    struct Harness {
        engine: MarketDataEngine,
        primary: Arc<MockSource>,
        secondary: Arc<MockSource>,
    }

    fn harness_with(config: EngineConfig) -> Harness {
        let primary = Arc::new(MockSource::new("primary", SourceKind::PrimaryApi));
        let secondary = Arc::new(MockSource::new("secondary", SourceKind::SecondaryApi));
        let engine = MarketDataEngine::with_sources(
            vec![
                primary.clone() as Arc<dyn QuoteSource>,
                secondary.clone() as Arc<dyn QuoteSource>,
            ],
            Arc::new(QuoteCache::new()),
            FallbackPriceTable::builtin(),
            config,
        );
        Harness {
            engine,
            primary,
            secondary,
        }
    }

    fn harness() -> Harness {
        harness_with(test_config())
    }

    #[tokio::test]
    async fn test_static_fallback_when_every_source_fails() {
        let h = harness();
        let mut events = h.engine.subscribe();
        h.primary
            .set_error(Symbol::nse("RELIANCE"), FetchError::RateLimited);
        h.secondary
            .set_error(Symbol::nse("RELIANCE"), FetchError::Network("reset".into()));

        let quote = h.engine.get_quote("RELIANCE").await.unwrap();
        assert_eq!(quote.source, SourceKind::StaticFallback);
        assert_eq!(quote.price, dec!(2456.70));

        let mut saw_fallback = false;
        while let Ok(event) = events.try_recv() {
            saw_fallback |= event.event_type() == "FALLBACK_SERVED";
        }
        assert!(saw_fallback);
    }

    #[tokio::test]
    async fn test_unknown_symbol_is_unavailable() {
        let h = harness();
        let err = h.engine.get_quote("NSE:ZZZZ").await.unwrap_err();
        assert_eq!(err, QuoteError::unavailable("NSE:ZZZZ"));
        assert_eq!(err.to_string(), "data temporarily unavailable for NSE:ZZZZ");
    }

    #[tokio::test]
    async fn test_invalid_input_is_rejected() {
        let h = harness();
        assert!(matches!(
            h.engine.get_quote("  ").await,
            Err(QuoteError::InvalidSymbol(_))
        ));
        assert_eq!(h.primary.call_count(), 0);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_sources() {
        let h = harness();
        h.primary.set_price(Symbol::nse("TCS"), dec!(3987.45));

        h.engine.get_quote("TCS").await.unwrap();
        h.engine.get_quote("NSE:TCS").await.unwrap();

        assert_eq!(h.primary.call_count(), 1);
        assert_eq!(h.engine.cache().stats().hits, 1);
    }

    #[tokio::test]
    async fn test_primary_has_priority() {
        let h = harness();
        h.primary.set_price(Symbol::nse("TCS"), dec!(3987.45));
        h.secondary.set_price(Symbol::nse("TCS"), dec!(3900));

        let quote = h.engine.get_quote("TCS").await.unwrap();
        assert_eq!(quote.source, SourceKind::PrimaryApi);
        assert_eq!(quote.price, dec!(3987.45));
    }

    #[tokio::test]
    async fn test_rate_limited_primary_falls_through_to_secondary() {
        let h = harness();
        h.primary.set_error(Symbol::nse("TCS"), FetchError::RateLimited);
        h.secondary.set_price(Symbol::nse("TCS"), dec!(3987.45));

        let first = h.engine.get_quote("TCS").await.unwrap();
        assert_eq!(first.source, SourceKind::SecondaryApi);

        let second = h.engine.get_quote("TCS").await.unwrap();
        assert_eq!(second.source, SourceKind::SecondaryApi);
        assert_eq!(h.primary.call_count(), 1);
        assert_eq!(h.secondary.call_count(), 1);
    }

    #[tokio::test]
    async fn test_repeated_calls_are_identical() {
        let h = harness();
        h.secondary.set_price(Symbol::nse("INFY"), dec!(1834.25));

        let first = h.engine.get_quote("INFY").await.unwrap();
        let second = h.engine.get_quote("INFY").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.as_of, second.as_of);
    }

    #[tokio::test]
    async fn test_hanging_source_is_bounded() {
        let hung = Arc::new(
            MockSource::new("hung", SourceKind::PrimaryApi).with_delay(Duration::from_secs(10)),
        );
        hung.set_price(Symbol::nse("ITC"), dec!(1));
        let engine = MarketDataEngine::with_sources(
            vec![hung as Arc<dyn QuoteSource>],
            Arc::new(QuoteCache::new()),
            FallbackPriceTable::builtin(),
            test_config(),
        );

        let start = Instant::now();
        let quote = engine.get_quote("ITC").await.unwrap();

        assert_eq!(quote.source, SourceKind::StaticFallback);
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_fallback_uses_its_own_ttl() {
        let h = harness_with(EngineConfig {
            fallback_ttl: Duration::ZERO,
            ..test_config()
        });

        h.engine.get_quote("RELIANCE").await.unwrap();
        let calls_per_lookup = h.primary.call_count();
        h.engine.get_quote("RELIANCE").await.unwrap();
        assert_eq!(h.primary.call_count(), 2 * calls_per_lookup);
    }

    #[tokio::test]
    async fn test_unknown_nse_ticker_is_tried_on_bse() {
        let h = harness();
        h.secondary.set_price(Symbol::bse("KAYNES"), dec!(5120.40));

        let quote = h.engine.get_quote("KAYNES").await.unwrap();
        assert_eq!(quote.symbol, Symbol::bse("KAYNES"));
        assert_eq!(quote.source, SourceKind::SecondaryApi);

        let calls = h.secondary.call_count();
        let again = h.engine.get_quote("NSE:KAYNES").await.unwrap();
        assert_eq!(again, quote);
        assert_eq!(h.secondary.call_count(), calls);
    }

    #[tokio::test]
    async fn test_bse_is_not_tried_after_other_failures() {
        let h = harness();
        h.primary.set_error(Symbol::nse("KAYNES"), FetchError::RateLimited);
        h.secondary.set_price(Symbol::bse("KAYNES"), dec!(5120.40));

        let err = h.engine.get_quote("KAYNES").await.unwrap_err();
        assert_eq!(err, QuoteError::unavailable("NSE:KAYNES"));
    }

    #[tokio::test]
    async fn test_last_close_from_history_before_static_table() {
        let h = harness();
        let yesterday = Utc::now() - chrono::Duration::days(1);
        let last = PricePoint {
            timestamp: yesterday,
            price: dec!(5120.40),
        };
        h.secondary.set_history(
            Symbol::nse("KAYNES"),
            vec![
                PricePoint {
                    timestamp: yesterday - chrono::Duration::days(1),
                    price: dec!(5000),
                },
                last.clone(),
            ],
        );

        let quote = h.engine.get_quote("KAYNES").await.unwrap();
        assert_eq!(quote.symbol, Symbol::nse("KAYNES"));
        assert_eq!(quote.price, last.price);
        assert_eq!(quote.change, dec!(120.40));
        assert_eq!(quote.as_of, last.timestamp);
        assert_eq!(quote.source, SourceKind::SecondaryApi);
    }

    #[tokio::test]
    async fn test_last_close_uses_cached_history() {
        let h = harness();
        let symbol = Symbol::nse("RELIANCE");
        h.engine.cache().set_history(
            &symbol,
            HistoryPeriod::Year,
            vec![PricePoint {
                timestamp: Utc::now() - chrono::Duration::hours(20),
                price: dec!(2470.10),
            }],
            SourceKind::ExchangeApi,
            Duration::from_secs(60),
        );

        let quote = h.engine.get_quote("RELIANCE").await.unwrap();
        assert_eq!(quote.source, SourceKind::ExchangeApi);
        assert_eq!(quote.price, dec!(2470.10));
    }

    #[tokio::test]
    async fn test_static_history_is_not_reused_as_last_close() {
        let h = harness();
        h.engine
            .get_history("RELIANCE", HistoryPeriod::Week)
            .await
            .unwrap();

        let quote = h.engine.get_quote("RELIANCE").await.unwrap();
        assert_eq!(quote.source, SourceKind::StaticFallback);
    }

    #[tokio::test]
    async fn test_snapshot_has_exactly_the_requested_keys() {
        let h = harness();
        h.secondary
            .set_price(Symbol::parse("NIFTY").unwrap(), dec!(24854.05));

        let snapshot = h
            .engine
            .get_snapshot(&["NIFTY", "SENSEX", "BANKNIFTY"])
            .await;

        assert_eq!(snapshot.keys(), vec!["NIFTY", "SENSEX", "BANKNIFTY"]);
        assert_eq!(snapshot.get("NIFTY").unwrap().source, SourceKind::SecondaryApi);
        assert_eq!(
            snapshot.get("SENSEX").unwrap().source,
            SourceKind::StaticFallback
        );
        assert!(snapshot.unavailable().is_empty());
        assert!(snapshot.is_degraded());
    }

    #[tokio::test]
    async fn test_snapshot_keeps_every_label_and_fills_unknowns() {
        let h = harness();
        let snapshot = h
            .engine
            .get_snapshot(&["NIFTY", "^NSEI", "NIFTY", "NSE:ZZZZ", "", "INDEX:BOGUS"])
            .await;

        assert_eq!(
            snapshot.keys(),
            vec!["NIFTY", "^NSEI", "NSE:ZZZZ", "INDEX:BOGUS"]
        );
        assert_eq!(snapshot.get("NIFTY"), snapshot.get("^NSEI"));
        assert_eq!(snapshot.unavailable(), vec!["NSE:ZZZZ", "INDEX:BOGUS"]);
        assert_eq!(snapshot.get("NSE:ZZZZ").unwrap().price, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_snapshot_aliases_share_one_lookup() {
        let h = harness();
        h.secondary
            .set_price(Symbol::parse("NIFTY").unwrap(), dec!(24854.05));

        let snapshot = h.engine.get_snapshot(&["NIFTY", "^NSEI", "nifty 50"]).await;

        assert_eq!(snapshot.len(), 3);
        assert!(snapshot.iter().all(|entry| entry.available));
        assert_eq!(h.primary.call_count(), 1);
        assert_eq!(h.secondary.call_count(), 1);
    }

    #[tokio::test]
    async fn test_default_market_snapshot() {
        let h = harness();
        let snapshot = h.engine.get_market_snapshot().await;
        assert_eq!(snapshot.keys(), DEFAULT_INDICES.to_vec());
        assert!(snapshot.unavailable().is_empty());
    }

    #[tokio::test]
    async fn test_history_is_fetched_and_cached() {
        let h = harness();
        let points = vec![
            PricePoint {
                timestamp: Utc::now() - chrono::Duration::days(1),
                price: dec!(3950),
            },
            PricePoint {
                timestamp: Utc::now(),
                price: dec!(3987.45),
            },
        ];
        h.secondary.set_history(Symbol::nse("TCS"), points.clone());

        let history = h
            .engine
            .get_history("TCS", HistoryPeriod::Month)
            .await
            .unwrap();
        assert_eq!(history, points);

        h.engine
            .get_history("TCS", HistoryPeriod::Month)
            .await
            .unwrap();
        assert_eq!(h.secondary.call_count(), 1);
    }

    #[tokio::test]
    async fn test_history_falls_back_to_last_known_price() {
        let h = harness();

        let history = h
            .engine
            .get_history("NIFTY", HistoryPeriod::Week)
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].price, dec!(24854.05));

        let err = h
            .engine
            .get_history("NSE:ZZZZ", HistoryPeriod::Week)
            .await
            .unwrap_err();
        assert!(matches!(err, QuoteError::QuoteUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_health_reflects_source_state() {
        let h = harness();
        assert_eq!(h.engine.health_check().await.status, HealthStatus::Healthy);

        h.primary.set_error(Symbol::nse("TCS"), FetchError::RateLimited);
        h.secondary.set_price(Symbol::nse("TCS"), dec!(3987.45));
        h.engine.get_quote("TCS").await.unwrap();

        let health = h.engine.health_check().await;
        assert_eq!(health.status, HealthStatus::Degraded);
        assert_eq!(health.details["cooling_down"], serde_json::json!(["primary"]));
    }

    #[tokio::test]
    async fn test_health_unhealthy_when_every_source_fails() {
        let h = harness();
        h.engine.get_quote("RELIANCE").await.unwrap();

        let health = h.engine.health_check().await;
        assert_eq!(health.status, HealthStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_metrics_are_reported_per_source() {
        let h = harness();
        h.secondary.set_price(Symbol::nse("TCS"), dec!(3987.45));
        h.engine.get_quote("TCS").await.unwrap();

        let metrics = h.engine.provider_metrics().await;
        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics[0].failed_requests, 1);
        assert_eq!(metrics[1].total_requests, 1);
        assert_eq!(metrics[1].failed_requests, 0);
    }

    #[tokio::test]
    async fn test_background_sweep_purges_expired_entries() {
        let h = harness_with(EngineConfig {
            fallback_ttl: Duration::ZERO,
            ..test_config()
        });
        h.engine.get_quote("RELIANCE").await.unwrap();
        assert_eq!(h.engine.cache().len(), 1);

        let handle = h.engine.start_background_sweep(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.abort();

        assert!(h.engine.cache().is_empty());
    }

    #[test]
    fn test_search_uses_catalog() {
        let h = harness();
        let hits = h.engine.search("infosys");
        assert_eq!(hits[0].entry.symbol, Symbol::nse("INFY"));
    }
}
