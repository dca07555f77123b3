//! Ordered fallback over quote sources

use crate::{
    config::EngineConfig,
    constants::TIMEOUT_EPSILON_MS,
    cooldown::CooldownTracker,
    error::FetchError,
    metrics::{MetricsRegistry, SourceMetrics},
    provider::QuoteSource,
    symbol::Symbol,
    types::{HistoryPeriod, PricePoint, Quote, QuoteEvent, SourceKind},
};
use chrono::Utc;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Why one source did not answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFailure {
    pub source: &'static str,
    pub error: FetchError,
}

/// A value and the source that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct Served<T> {
    pub value: T,
    pub source: &'static str,
    pub kind: SourceKind,
}

/// Walks sources in a fixed order until one succeeds
///
/// The first success wins. Rate-limited sources are put on cooldown and
/// skipped until it lapses; every other failure just moves on. Each
/// call is bounded by the source's timeout plus a small grace period,
/// so a hung source cannot stall the walk.
pub struct FailoverChain {
    sources: Vec<Arc<dyn QuoteSource>>,
    cooldown: CooldownTracker,
    metrics: MetricsRegistry,
    events: broadcast::Sender<QuoteEvent>,
    request_timeout: Duration,
    exchange_timeout: Duration,
}

impl FailoverChain {
    /// Creates a chain over `sources`, tried in the order given
    pub fn new(
        sources: Vec<Arc<dyn QuoteSource>>,
        config: &EngineConfig,
        events: broadcast::Sender<QuoteEvent>,
    ) -> Self {
        let metrics = MetricsRegistry::new(sources.iter().map(|s| s.name()));

        Self {
            sources,
            cooldown: CooldownTracker::new(config.rate_limit_cooldown),
            metrics,
            events,
            request_timeout: config.request_timeout,
            exchange_timeout: config.exchange_timeout,
        }
    }

    /// Source names in chain order
    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Per-source metrics in chain order
    pub async fn metrics(&self) -> Vec<SourceMetrics> {
        self.metrics.snapshot().await
    }

    /// Sources currently skipped because they were rate limited
    pub fn cooling_down(&self) -> Vec<String> {
        self.cooldown.active()
    }

    fn call_timeout(&self, source: &dyn QuoteSource) -> Duration {
        let base = match source.kind() {
            SourceKind::ExchangeApi => self.exchange_timeout,
            _ => self.request_timeout,
        };
        base + Duration::from_millis(TIMEOUT_EPSILON_MS)
    }

    fn emit(&self, event: QuoteEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    /// Fetches a quote from the first source that can serve it
    pub async fn fetch(&self, symbol: &Symbol) -> Result<Quote, Vec<SourceFailure>> {
        let quote = self
            .walk(symbol, |source, symbol| source.fetch(symbol))
            .await?
            .value;

        self.emit(QuoteEvent::QuoteServed {
            id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            source: quote.source,
            price: quote.price,
            timestamp: Utc::now(),
        });
        Ok(quote)
    }

    /// Fetches a history from the first source that can serve it
    pub async fn fetch_history(
        &self,
        symbol: &Symbol,
        period: HistoryPeriod,
    ) -> Result<Served<Vec<PricePoint>>, Vec<SourceFailure>> {
        self.walk(symbol, move |source, symbol| {
            source.fetch_history(symbol, period)
        })
        .await
    }

    async fn walk<T, F>(
        &self,
        symbol: &Symbol,
        call: F,
    ) -> Result<Served<T>, Vec<SourceFailure>>
    where
        F: for<'a> Fn(&'a dyn QuoteSource, &'a Symbol) -> BoxFuture<'a, Result<T, FetchError>>,
    {
        let mut failures = Vec::new();

        for source in &self.sources {
            let name = source.name();

            if self.cooldown.is_cooling_down(name) {
                tracing::debug!(source = name, symbol = %symbol, "Skipping source in cooldown");
                failures.push(SourceFailure {
                    source: name,
                    error: FetchError::RateLimited,
                });
                continue;
            }

            let bound = self.call_timeout(source.as_ref());
            let start = Instant::now();
            let result = match tokio::time::timeout(bound, call(source.as_ref(), symbol)).await {
                Ok(result) => result,
                Err(_) => Err(FetchError::Timeout),
            };
            let elapsed = start.elapsed();

            match result {
                Ok(value) => {
                    tracing::debug!(
                        source = name,
                        symbol = %symbol,
                        latency_ms = elapsed.as_millis() as u64,
                        "Source answered"
                    );
                    self.metrics.record(name, elapsed, true).await;
                    return Ok(Served {
                        value,
                        source: name,
                        kind: source.kind(),
                    });
                }
                Err(error) => {
                    tracing::warn!(
                        source = name,
                        symbol = %symbol,
                        error = %error,
                        latency_ms = elapsed.as_millis() as u64,
                        "Source failed"
                    );
                    self.metrics.record(name, elapsed, false).await;

                    if error == FetchError::RateLimited {
                        self.cooldown.mark_rate_limited(name);
                    }

                    self.emit(QuoteEvent::SourceFailed {
                        id: Uuid::new_v4(),
                        symbol: symbol.to_string(),
                        source: name.to_string(),
                        error_message: error.to_string(),
                        timestamp: Utc::now(),
                    });
                    failures.push(SourceFailure {
                        source: name,
                        error,
                    });
                }
            }
        }

        Err(failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::mock::MockSource;
    use rust_decimal_macros::dec;

    fn config() -> EngineConfig {
        EngineConfig {
            request_timeout: Duration::from_millis(100),
            exchange_timeout: Duration::from_millis(100),
            ..EngineConfig::default()
        }
    }

    fn chain(sources: Vec<Arc<MockSource>>, config: &EngineConfig) -> FailoverChain {
        let (tx, _) = broadcast::channel(16);
        let sources = sources
            .into_iter()
            .map(|s| s as Arc<dyn QuoteSource>)
            .collect();
        FailoverChain::new(sources, config, tx)
    }

    #[tokio::test]
    async fn test_first_success_wins() {
        let primary = Arc::new(MockSource::new("primary", SourceKind::PrimaryApi));
        let secondary = Arc::new(MockSource::new("secondary", SourceKind::SecondaryApi));
        primary.set_price(Symbol::nse("TCS"), dec!(3987.45));
        secondary.set_price(Symbol::nse("TCS"), dec!(1));

        let chain = chain(vec![primary.clone(), secondary.clone()], &config());
        let quote = chain.fetch(&Symbol::nse("TCS")).await.unwrap();

        assert_eq!(quote.source, SourceKind::PrimaryApi);
        assert_eq!(secondary.call_count(), 0);
    }

    #[tokio::test]
    async fn test_rate_limited_source_cools_down() {
        let primary = Arc::new(MockSource::new("primary", SourceKind::PrimaryApi));
        let secondary = Arc::new(MockSource::new("secondary", SourceKind::SecondaryApi));
        primary.set_error(Symbol::nse("TCS"), FetchError::RateLimited);
        secondary.set_price(Symbol::nse("TCS"), dec!(3987.45));
        secondary.set_price(Symbol::nse("INFY"), dec!(1834.25));

        let chain = chain(vec![primary.clone(), secondary.clone()], &config());
        let quote = chain.fetch(&Symbol::nse("TCS")).await.unwrap();
        assert_eq!(quote.source, SourceKind::SecondaryApi);
        assert_eq!(chain.cooling_down(), vec!["primary".to_string()]);

        chain.fetch(&Symbol::nse("INFY")).await.unwrap();
        assert_eq!(primary.call_count(), 1);
    }

    #[tokio::test]
    async fn test_zero_cooldown_keeps_asking() {
        let primary = Arc::new(MockSource::new("primary", SourceKind::PrimaryApi));
        let secondary = Arc::new(MockSource::new("secondary", SourceKind::SecondaryApi));
        primary.set_error(Symbol::nse("TCS"), FetchError::RateLimited);
        secondary.set_price(Symbol::nse("TCS"), dec!(3987.45));

        let config = EngineConfig {
            rate_limit_cooldown: Duration::ZERO,
            ..config()
        };
        let chain = chain(vec![primary.clone(), secondary], &config);
        chain.fetch(&Symbol::nse("TCS")).await.unwrap();
        chain.fetch(&Symbol::nse("TCS")).await.unwrap();

        assert_eq!(primary.call_count(), 2);
    }

    #[tokio::test]
    async fn test_hanging_source_is_cut_off() {
        let hung = Arc::new(
            MockSource::new("hung", SourceKind::PrimaryApi).with_delay(Duration::from_secs(10)),
        );
        let fast = Arc::new(MockSource::new("fast", SourceKind::SecondaryApi));
        hung.set_price(Symbol::nse("TCS"), dec!(1));
        fast.set_price(Symbol::nse("TCS"), dec!(3987.45));

        let chain = chain(vec![hung, fast], &config());
        let start = Instant::now();
        let quote = chain.fetch(&Symbol::nse("TCS")).await.unwrap();

        assert_eq!(quote.source, SourceKind::SecondaryApi);
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_all_failures_are_reported_in_order() {
        let primary = Arc::new(MockSource::new("primary", SourceKind::PrimaryApi));
        let secondary = Arc::new(MockSource::new("secondary", SourceKind::SecondaryApi));
        primary.set_error(Symbol::nse("TCS"), FetchError::unauthorized("no key"));

        let chain = chain(vec![primary, secondary], &config());
        let failures = chain.fetch(&Symbol::nse("TCS")).await.unwrap_err();

        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].source, "primary");
        assert!(matches!(failures[0].error, FetchError::Unauthorized(_)));
        assert!(matches!(failures[1].error, FetchError::NotFound(_)));

        let metrics = chain.metrics().await;
        assert!(metrics.iter().all(|m| m.failed_requests == 1));
    }

    #[tokio::test]
    async fn test_events_are_broadcast() {
        let primary = Arc::new(MockSource::new("primary", SourceKind::PrimaryApi));
        let secondary = Arc::new(MockSource::new("secondary", SourceKind::SecondaryApi));
        secondary.set_price(Symbol::nse("TCS"), dec!(3987.45));

        let (tx, mut rx) = broadcast::channel(16);
        let chain = FailoverChain::new(
            vec![
                primary as Arc<dyn QuoteSource>,
                secondary as Arc<dyn QuoteSource>,
            ],
            &config(),
            tx,
        );
        chain.fetch(&Symbol::nse("TCS")).await.unwrap();

        assert_eq!(rx.recv().await.unwrap().event_type(), "SOURCE_FAILED");
        assert_eq!(rx.recv().await.unwrap().event_type(), "QUOTE_SERVED");
    }

    #[tokio::test]
    async fn test_history_walk() {
        let primary = Arc::new(MockSource::new("primary", SourceKind::PrimaryApi));
        let secondary = Arc::new(MockSource::new("secondary", SourceKind::SecondaryApi));
        let points = vec![PricePoint {
            timestamp: Utc::now(),
            price: dec!(3987.45),
        }];
        secondary.set_history(Symbol::nse("TCS"), points.clone());

        let chain = chain(vec![primary, secondary], &config());
        let served = chain
            .fetch_history(&Symbol::nse("TCS"), HistoryPeriod::Month)
            .await
            .unwrap();

        assert_eq!(served.value, points);
        assert_eq!(served.source, "secondary");
        assert_eq!(served.kind, SourceKind::SecondaryApi);
    }
}
