//! Alpha Vantage quote source (primary)
//!
//! Free keys allow only a handful of calls per minute, and throttling
//! comes back as an HTTP 200 with a "Note" or "Information" body rather
//! than a 429. Those bodies are recognised through [`RateLimitMarkers`].

use crate::{
    config::{EngineConfig, RateLimitMarkers},
    constants::{
        ALPHA_VANTAGE_API_URL, ALPHA_VANTAGE_COMPACT_DAYS, ALPHA_VANTAGE_COMPACT_POINTS, USER_AGENT,
    },
    error::{ConfigError, FetchError},
    provider::QuoteSource,
    providers::{http, parse_decimal, utc_midnight},
    symbol::Symbol,
    types::{HistoryPeriod, PricePoint, Quote, SourceKind},
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;

const SOURCE_NAME: &str = "alpha_vantage";

/// `GLOBAL_QUOTE` payload
#[derive(Debug, Deserialize)]
struct GlobalQuote {
    #[serde(rename = "05. price")]
    price: Option<String>,
    #[serde(rename = "09. change")]
    change: Option<String>,
    #[serde(rename = "10. change percent")]
    change_percent: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote")]
    global_quote: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct DailyBar {
    #[serde(rename = "4. close")]
    close: String,
}

#[derive(Debug, Deserialize)]
struct TimeSeriesResponse {
    #[serde(rename = "Time Series (Daily)")]
    time_series: Option<HashMap<String, DailyBar>>,
}

/// Alpha Vantage source
pub struct AlphaVantageSource {
    client: Client,
    api_key: Option<String>,
    markers: RateLimitMarkers,
}

impl AlphaVantageSource {
    /// Creates the source from engine configuration
    pub fn new(config: &EngineConfig) -> Result<Self, ConfigError> {
        let client = http::build_client(config.request_timeout, USER_AGENT)?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            markers: config.rate_limit_markers.clone(),
        })
    }

    /// Issues one query; a missing key short-circuits without a request
    async fn query(&self, params: &[(&str, &str)]) -> Result<String, FetchError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| FetchError::unauthorized("ALPHA_VANTAGE_API_KEY is not set"))?;

        let response = self
            .client
            .get(ALPHA_VANTAGE_API_URL)
            .query(params)
            .query(&[("apikey", api_key)])
            .send()
            .await?;

        http::read_body(response).await
    }
}

/// Rejects throttling and error bodies that arrive with HTTP 200
fn check_body(
    value: &serde_json::Value,
    raw: &str,
    markers: &RateLimitMarkers,
) -> Result<(), FetchError> {
    if let Some(message) = value.get("Error Message").and_then(|m| m.as_str()) {
        return Err(FetchError::not_found(message));
    }

    if markers.matches(value, raw) {
        return Err(FetchError::RateLimited);
    }

    Ok(())
}

fn parse_json(body: &str) -> Result<serde_json::Value, FetchError> {
    serde_json::from_str(body).map_err(|e| {
        FetchError::malformed(format!(
            "Failed to parse Alpha Vantage response: {e}. Response: {}",
            http::excerpt(body)
        ))
    })
}

/// Parses a `GLOBAL_QUOTE` body
pub(crate) fn parse_global_quote(
    symbol: &Symbol,
    body: &str,
    markers: &RateLimitMarkers,
) -> Result<Quote, FetchError> {
    let value = parse_json(body)?;
    check_body(&value, body, markers)?;

    let response: GlobalQuoteResponse = serde_json::from_value(value)
        .map_err(|e| FetchError::malformed(format!("Unexpected GLOBAL_QUOTE shape: {e}")))?;

    let fields = response
        .global_quote
        .ok_or_else(|| FetchError::malformed("missing \"Global Quote\""))?;
    if fields.is_empty() {
        return Err(FetchError::not_found(symbol.to_string()));
    }

    let quote: GlobalQuote = serde_json::from_value(serde_json::Value::Object(fields))
        .map_err(|e| FetchError::malformed(format!("Unexpected GLOBAL_QUOTE fields: {e}")))?;

    let price = quote
        .price
        .as_deref()
        .and_then(parse_decimal)
        .filter(|p| *p > Decimal::ZERO)
        .ok_or_else(|| FetchError::malformed("missing or non-positive price"))?;

    let change = quote
        .change
        .as_deref()
        .and_then(parse_decimal)
        .unwrap_or_default();
    let change_percent = quote
        .change_percent
        .as_deref()
        .map(|p| p.trim_end_matches('%'))
        .and_then(parse_decimal)
        .unwrap_or_default();

    Quote::with_change(
        symbol.clone(),
        price,
        change,
        change_percent,
        SourceKind::PrimaryApi,
    )
    .ok_or_else(|| FetchError::malformed("negative price"))
}

/// Parses a `TIME_SERIES_DAILY` body into closes at or after `since`
pub(crate) fn parse_daily_series(
    body: &str,
    markers: &RateLimitMarkers,
    since: DateTime<Utc>,
) -> Result<Vec<PricePoint>, FetchError> {
    let value = parse_json(body)?;
    check_body(&value, body, markers)?;

    let response: TimeSeriesResponse = serde_json::from_value(value)
        .map_err(|e| FetchError::malformed(format!("Unexpected time series shape: {e}")))?;

    let series = response
        .time_series
        .ok_or_else(|| FetchError::malformed("missing \"Time Series (Daily)\""))?;

    let rows = series.len();
    let mut points: Vec<PricePoint> = series
        .into_iter()
        .filter_map(|(date, bar)| {
            let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d").ok()?;
            Some(PricePoint {
                timestamp: utc_midnight(date),
                price: parse_decimal(&bar.close)?,
            })
        })
        .collect();
    points.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

    // A full compact page starting after `since` was cut off, not short-lived
    let truncated = rows >= ALPHA_VANTAGE_COMPACT_POINTS
        && points.first().is_some_and(|oldest| oldest.timestamp > since);
    if truncated {
        return Err(FetchError::not_found(format!(
            "compact series does not reach back to {}",
            since.date_naive()
        )));
    }

    points.retain(|point| point.timestamp >= since);
    Ok(points)
}

#[async_trait]
impl QuoteSource for AlphaVantageSource {
    async fn fetch(&self, symbol: &Symbol) -> Result<Quote, FetchError> {
        let av_symbol = symbol.alpha_vantage_symbol().ok_or_else(|| {
            FetchError::not_found(format!("{symbol} is not covered by Alpha Vantage"))
        })?;

        tracing::debug!(symbol = %symbol, av_symbol = %av_symbol, "Fetching Alpha Vantage quote");
        let body = self
            .query(&[("function", "GLOBAL_QUOTE"), ("symbol", av_symbol.as_str())])
            .await?;

        parse_global_quote(symbol, &body, &self.markers)
    }

    async fn fetch_history(
        &self,
        symbol: &Symbol,
        period: HistoryPeriod,
    ) -> Result<Vec<PricePoint>, FetchError> {
        let av_symbol = symbol.alpha_vantage_symbol().ok_or_else(|| {
            FetchError::not_found(format!("{symbol} is not covered by Alpha Vantage"))
        })?;

        // "full" output is premium-only; compact covers about 100 sessions
        if period.days() > ALPHA_VANTAGE_COMPACT_DAYS {
            return Err(FetchError::not_found(format!(
                "Alpha Vantage compact history is shorter than {} days",
                period.days()
            )));
        }

        let body = self
            .query(&[
                ("function", "TIME_SERIES_DAILY"),
                ("symbol", av_symbol.as_str()),
                ("outputsize", "compact"),
            ])
            .await?;

        let points = parse_daily_series(&body, &self.markers, period.start_from(Utc::now()))?;
        if points.is_empty() {
            return Err(FetchError::not_found(format!("no history for {symbol}")));
        }
        Ok(points)
    }

    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    fn kind(&self) -> SourceKind {
        SourceKind::PrimaryApi
    }
}
