//! Yahoo Finance chart API source (secondary)

use crate::{
    config::EngineConfig,
    constants::{BROWSER_USER_AGENT, YAHOO_CHART_API_URL},
    error::{ConfigError, FetchError},
    provider::QuoteSource,
    providers::{decimal_from_f64, http},
    symbol::Symbol,
    types::{HistoryPeriod, PricePoint, Quote, SourceKind},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;

const SOURCE_NAME: &str = "yahoo";

/// Yahoo chart API response envelope
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Option<Indicators>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    regular_market_price: Option<f64>,
    chart_previous_close: Option<f64>,
    previous_close: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<IndicatorQuote>,
}

#[derive(Debug, Deserialize)]
struct IndicatorQuote {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

/// Yahoo Finance source
pub struct YahooSource {
    client: Client,
}

impl YahooSource {
    /// Creates the source from engine configuration
    pub fn new(config: &EngineConfig) -> Result<Self, ConfigError> {
        let client = http::build_client(config.request_timeout, BROWSER_USER_AGENT)?;
        Ok(Self { client })
    }

    async fn chart(&self, yahoo_symbol: &str, range: &str) -> Result<String, FetchError> {
        let url = format!("{YAHOO_CHART_API_URL}/{yahoo_symbol}");
        tracing::debug!(url = %url, range, "Fetching Yahoo chart");

        let response = self
            .client
            .get(&url)
            .query(&[("interval", "1d"), ("range", range)])
            .send()
            .await?;

        http::read_body(response).await
    }
}

/// Yahoo reports float32-rounded prices; two places match the exchange tick
fn price(value: f64) -> Option<Decimal> {
    decimal_from_f64(value).map(|d| d.round_dp(2))
}

fn parse_chart(body: &str) -> Result<ChartResult, FetchError> {
    let response: ChartResponse = serde_json::from_str(body).map_err(|e| {
        FetchError::malformed(format!(
            "Failed to parse Yahoo chart response: {e}. Response: {}",
            http::excerpt(body)
        ))
    })?;

    if let Some(error) = response.chart.error {
        return Err(FetchError::not_found(format!(
            "{}: {}",
            error.code.unwrap_or_default(),
            error.description.unwrap_or_default()
        )));
    }

    response
        .chart
        .result
        .and_then(|results| results.into_iter().next())
        .ok_or_else(|| FetchError::not_found("empty chart result"))
}

/// Parses a chart body into the latest quote
pub(crate) fn parse_quote(symbol: &Symbol, body: &str) -> Result<Quote, FetchError> {
    let result = parse_chart(body)?;
    let meta = result.meta;

    let last = meta
        .regular_market_price
        .and_then(price)
        .filter(|p| *p > Decimal::ZERO)
        .ok_or_else(|| FetchError::malformed("missing regularMarketPrice"))?;

    let previous = meta
        .chart_previous_close
        .or(meta.previous_close)
        .and_then(price);

    Quote::from_previous_close(symbol.clone(), last, previous, SourceKind::SecondaryApi)
        .ok_or_else(|| FetchError::malformed("negative price"))
}

/// Parses a chart body into daily closes at or after `since`
pub(crate) fn parse_history(body: &str, since: DateTime<Utc>) -> Result<Vec<PricePoint>, FetchError> {
    let result = parse_chart(body)?;
    let closes = result
        .indicators
        .and_then(|indicators| indicators.quote.into_iter().next())
        .map(|quote| quote.close)
        .ok_or_else(|| FetchError::malformed("missing indicators.quote"))?;

    let mut points: Vec<PricePoint> = result
        .timestamp
        .iter()
        .zip(closes)
        .filter_map(|(ts, close)| {
            Some(PricePoint {
                timestamp: DateTime::from_timestamp(*ts, 0)?,
                price: price(close?)?,
            })
        })
        .filter(|point| point.timestamp >= since)
        .collect();

    points.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
    Ok(points)
}

#[async_trait]
impl QuoteSource for YahooSource {
    async fn fetch(&self, symbol: &Symbol) -> Result<Quote, FetchError> {
        let yahoo_symbol = symbol
            .yahoo_symbol()
            .ok_or_else(|| FetchError::not_found(format!("{symbol} is not covered by Yahoo")))?;

        let body = self.chart(&yahoo_symbol, "1d").await?;
        parse_quote(symbol, &body)
    }

    async fn fetch_history(
        &self,
        symbol: &Symbol,
        period: HistoryPeriod,
    ) -> Result<Vec<PricePoint>, FetchError> {
        let yahoo_symbol = symbol
            .yahoo_symbol()
            .ok_or_else(|| FetchError::not_found(format!("{symbol} is not covered by Yahoo")))?;

        let body = self.chart(&yahoo_symbol, period.yahoo_range()).await?;
        let points = parse_history(&body, period.start_from(Utc::now()))?;
        if points.is_empty() {
            return Err(FetchError::not_found(format!("no history for {symbol}")));
        }
        Ok(points)
    }

    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    fn kind(&self) -> SourceKind {
        SourceKind::SecondaryApi
    }
}
