//! Source abstraction for fetching quotes from external services

use crate::{
    error::FetchError,
    symbol::Symbol,
    types::{HistoryPeriod, PricePoint, Quote, SourceKind},
};
use async_trait::async_trait;

/// Trait for quote sources
///
/// Implementations wrap one external service (a quote API, an exchange
/// feed, a scraped page). A source only reports what went wrong; the
/// fallback chain decides what to try next.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Fetches the current quote for a symbol
    ///
    /// # Arguments
    /// * `symbol` - Canonical symbol to quote
    ///
    /// # Returns
    /// A quote tagged with this source's kind, or why it could not be served
    async fn fetch(&self, symbol: &Symbol) -> Result<Quote, FetchError>;

    /// Fetches a price history, oldest point first
    ///
    /// Sources without history support keep the default.
    async fn fetch_history(
        &self,
        symbol: &Symbol,
        _period: HistoryPeriod,
    ) -> Result<Vec<PricePoint>, FetchError> {
        Err(FetchError::not_found(format!(
            "{} has no history for {symbol}",
            self.name()
        )))
    }

    /// Returns the stable name of this source, used in logs and metrics
    fn name(&self) -> &'static str;

    /// Returns which slot of the fallback chain this source fills
    fn kind(&self) -> SourceKind;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use rust_decimal::Decimal;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Mock source for testing
    pub struct MockSource {
        name: &'static str,
        kind: SourceKind,
        responses: Arc<Mutex<HashMap<Symbol, Result<Decimal, FetchError>>>>,
        histories: Arc<Mutex<HashMap<Symbol, Vec<PricePoint>>>>,
        delay: Option<Duration>,
        call_count: Arc<Mutex<usize>>,
    }

    impl MockSource {
        pub fn new(name: &'static str, kind: SourceKind) -> Self {
            Self {
                name,
                kind,
                responses: Arc::new(Mutex::new(HashMap::new())),
                histories: Arc::new(Mutex::new(HashMap::new())),
                delay: None,
                call_count: Arc::new(Mutex::new(0)),
            }
        }

        /// Sleeps before answering every call
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn set_price(&self, symbol: Symbol, price: Decimal) {
            self.responses.lock().unwrap().insert(symbol, Ok(price));
        }

        pub fn set_error(&self, symbol: Symbol, error: FetchError) {
            self.responses.lock().unwrap().insert(symbol, Err(error));
        }

        pub fn set_history(&self, symbol: Symbol, points: Vec<PricePoint>) {
            self.histories.lock().unwrap().insert(symbol, points);
        }

        pub fn call_count(&self) -> usize {
            *self.call_count.lock().unwrap()
        }
    }

    #[async_trait]
    impl QuoteSource for MockSource {
        async fn fetch(&self, symbol: &Symbol) -> Result<Quote, FetchError> {
            *self.call_count.lock().unwrap() += 1;
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            let response = self.responses.lock().unwrap().get(symbol).cloned();
            match response {
                Some(Ok(price)) => Quote::new(symbol.clone(), price, self.kind)
                    .ok_or_else(|| FetchError::malformed("negative price")),
                Some(Err(err)) => Err(err),
                None => Err(FetchError::not_found(symbol.to_string())),
            }
        }

        async fn fetch_history(
            &self,
            symbol: &Symbol,
            _period: HistoryPeriod,
        ) -> Result<Vec<PricePoint>, FetchError> {
            *self.call_count.lock().unwrap() += 1;
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            self.histories
                .lock()
                .unwrap()
                .get(symbol)
                .cloned()
                .ok_or_else(|| FetchError::not_found(symbol.to_string()))
        }

        fn name(&self) -> &'static str {
            self.name
        }

        fn kind(&self) -> SourceKind {
            self.kind
        }
    }
}
