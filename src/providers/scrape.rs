//! Google Finance quote page scraper (last live source)
//!
//! Markup is not an API: every assumption about the page lives in
//! [`QuotePageParser`] and is pinned by fixture tests. A page that no
//! longer matches is reported as a malformed response, never as a
//! network error, so it is not retried.

use crate::{
    config::EngineConfig,
    constants::{BROWSER_USER_AGENT, GOOGLE_FINANCE_URL},
    error::{ConfigError, FetchError},
    provider::QuoteSource,
    providers::{http, parse_decimal},
    symbol::Symbol,
    types::{Quote, SourceKind},
};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use rust_decimal::Decimal;
use scraper::{ElementRef, Html, Selector};
use std::future::Future;

const SOURCE_NAME: &str = "google_finance";

/// Price element selectors, most specific first
const PRICE_SELECTORS: &[&str] = &[".YMlKec.fxKbKc", ".YMlKec"];

/// One label/value row of the "about" panel
const STAT_ROW_SELECTOR: &str = ".gyFHrc";
const STAT_VALUE_SELECTOR: &str = ".P6K39c";
const PREVIOUS_CLOSE_LABEL: &str = "previous close";

/// First number in a text, with thousands separators allowed
const NUMBER_PATTERN: &str = r"[0-9][0-9,]*(?:\.[0-9]+)?";

fn selector(pattern: &str) -> Result<Selector, ConfigError> {
    Selector::parse(pattern).map_err(|e| ConfigError::Pattern {
        pattern: pattern.to_string(),
        reason: format!("{e:?}"),
    })
}

/// Extracts price and previous close from a quote page
pub(crate) struct QuotePageParser {
    price: Vec<Selector>,
    stat_row: Selector,
    stat_value: Selector,
    number: Regex,
}

impl QuotePageParser {
    pub(crate) fn new() -> Result<Self, ConfigError> {
        Ok(Self {
            price: PRICE_SELECTORS
                .iter()
                .map(|pattern| selector(pattern))
                .collect::<Result<_, _>>()?,
            stat_row: selector(STAT_ROW_SELECTOR)?,
            stat_value: selector(STAT_VALUE_SELECTOR)?,
            number: Regex::new(NUMBER_PATTERN).map_err(|e| ConfigError::Pattern {
                pattern: NUMBER_PATTERN.to_string(),
                reason: e.to_string(),
            })?,
        })
    }

    /// `"₹2,456.70"` → `2456.70`
    fn extract_number(&self, text: &str) -> Option<Decimal> {
        let matched = self.number.find(text)?;
        parse_decimal(&matched.as_str().replace(',', ""))
    }

    fn element_number(&self, element: ElementRef<'_>) -> Option<Decimal> {
        self.extract_number(&element.text().collect::<String>())
    }

    fn previous_close(&self, document: &Html) -> Option<Decimal> {
        document
            .select(&self.stat_row)
            .find(|row| {
                row.text()
                    .collect::<String>()
                    .to_lowercase()
                    .contains(PREVIOUS_CLOSE_LABEL)
            })
            .and_then(|row| row.select(&self.stat_value).next())
            .and_then(|value| self.element_number(value))
    }

    pub(crate) fn parse(&self, symbol: &Symbol, html: &str) -> Result<Quote, FetchError> {
        let document = Html::parse_document(html);

        let price = self
            .price
            .iter()
            .find_map(|sel| {
                document
                    .select(sel)
                    .find_map(|element| self.element_number(element))
            })
            .filter(|p| *p > Decimal::ZERO)
            .ok_or_else(|| {
                FetchError::malformed(format!("no price element on quote page for {symbol}"))
            })?;

        let previous = self.previous_close(&document);
        Quote::from_previous_close(symbol.clone(), price, previous, SourceKind::Scrape)
            .ok_or_else(|| FetchError::malformed("negative price"))
    }
}

/// Google Finance scraping source
pub struct GoogleFinanceSource {
    client: Client,
    parser: QuotePageParser,
}

impl GoogleFinanceSource {
    /// Creates the source from engine configuration
    pub fn new(config: &EngineConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            client: http::build_client(config.request_timeout, BROWSER_USER_AGENT)?,
            parser: QuotePageParser::new()?,
        })
    }

    async fn get_page(&self, url: &str) -> Result<String, FetchError> {
        let response = self.client.get(url).query(&[("hl", "en")]).send().await?;
        http::read_body(response).await
    }

    async fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
        retry_once_on_network(url, || self.get_page(url)).await
    }
}

/// Runs `request`, and once more if the first attempt hit a transport
/// failure or 5xx. Parse failures, throttling and timeouts are final.
pub(crate) async fn retry_once_on_network<T, F, Fut>(
    target: &str,
    mut request: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    match request().await {
        Err(FetchError::Network(reason)) => {
            tracing::warn!(target, error = %reason, "Quote page request failed, retrying once");
            request().await
        }
        other => other,
    }
}

#[async_trait]
impl QuoteSource for GoogleFinanceSource {
    async fn fetch(&self, symbol: &Symbol) -> Result<Quote, FetchError> {
        let page_symbol = symbol.google_finance_symbol().ok_or_else(|| {
            FetchError::not_found(format!("{symbol} has no Google Finance page"))
        })?;

        let url = format!("{GOOGLE_FINANCE_URL}/{page_symbol}");
        tracing::debug!(url = %url, "Scraping quote page");

        let html = self.fetch_page(&url).await?;
        self.parser.parse(symbol, &html)
    }

    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Scrape
    }
}
