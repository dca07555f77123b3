//! Official exchange source: NSE India for listed instruments and the
//! AMFI NAV feed (via mfapi.in) for mutual fund schemes
//!
//! NSE rejects clients without browser headers and a session cookie, so
//! the home page is visited once before the first API call and again
//! after the session is refused. This source never retries within a
//! call; it is the least reliable of the live sources.

use crate::{
    config::EngineConfig,
    constants::{
        BROWSER_USER_AGENT, MAX_NAV_HISTORY_DAYS, MFAPI_URL, NSE_ALL_INDICES_URL, NSE_HOME_URL,
        NSE_QUOTE_EQUITY_URL,
    },
    error::{ConfigError, FetchError},
    provider::QuoteSource,
    providers::{decimal_from_f64, http, parse_decimal, utc_midnight},
    symbol::{Exchange, Symbol},
    types::{HistoryPeriod, PricePoint, Quote, SourceKind},
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER},
    Client,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};

const SOURCE_NAME: &str = "nse";

#[derive(Debug, Deserialize)]
struct AllIndicesResponse {
    data: Vec<IndexRow>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexRow {
    index: String,
    last: Option<f64>,
    variation: Option<f64>,
    percent_change: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EquityQuoteResponse {
    price_info: Option<PriceInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceInfo {
    last_price: Option<f64>,
    change: Option<f64>,
    p_change: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct NavResponse {
    #[serde(default)]
    data: Vec<NavRow>,
}

#[derive(Debug, Deserialize)]
struct NavRow {
    date: String,
    nav: String,
}

/// NSE India + AMFI source
pub struct NseSource {
    client: Client,
    session_primed: AtomicBool,
}

impl NseSource {
    /// Creates the source from engine configuration
    ///
    /// Uses the shorter exchange timeout and a cookie-keeping client.
    pub fn new(config: &EngineConfig) -> Result<Self, ConfigError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/plain, */*"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        headers.insert(REFERER, HeaderValue::from_static("https://www.nseindia.com/"));

        let client = Client::builder()
            .timeout(config.exchange_timeout)
            .user_agent(BROWSER_USER_AGENT)
            .default_headers(headers)
            .cookie_store(true)
            .gzip(true)
            .build()?;

        Ok(Self {
            client,
            session_primed: AtomicBool::new(false),
        })
    }

    /// Visits the home page once so the API accepts our cookies
    async fn ensure_session(&self) -> Result<(), FetchError> {
        if self.session_primed.load(Ordering::Acquire) {
            return Ok(());
        }

        tracing::debug!("Priming NSE session cookies");
        let response = self.client.get(NSE_HOME_URL).send().await?;
        http::classify_status(response.status())?;
        self.session_primed.store(true, Ordering::Release);
        Ok(())
    }

    async fn get_nse(&self, url: &str, query: &[(&str, &str)]) -> Result<String, FetchError> {
        self.ensure_session().await?;

        let response = self.client.get(url).query(query).send().await?;
        let result = http::read_body(response).await;
        if matches!(result, Err(FetchError::Unauthorized(_))) {
            // cookies expired; prime again on the next call
            self.session_primed.store(false, Ordering::Release);
        }
        result
    }

    async fn get_nav_series(&self, scheme_code: &str) -> Result<String, FetchError> {
        let url = format!("{MFAPI_URL}/{scheme_code}");
        let response = self.client.get(&url).send().await?;
        http::read_body(response).await
    }
}

fn malformed(what: &str, err: serde_json::Error, body: &str) -> FetchError {
    FetchError::malformed(format!(
        "Failed to parse {what}: {err}. Response: {}",
        http::excerpt(body)
    ))
}

/// Picks `index_name` out of an `allIndices` body
pub(crate) fn parse_all_indices(
    symbol: &Symbol,
    index_name: &str,
    body: &str,
) -> Result<Quote, FetchError> {
    let response: AllIndicesResponse =
        serde_json::from_str(body).map_err(|e| malformed("NSE allIndices", e, body))?;

    let row = response
        .data
        .into_iter()
        .find(|row| row.index.eq_ignore_ascii_case(index_name))
        .ok_or_else(|| FetchError::not_found(format!("{index_name} not in allIndices")))?;

    let price = row
        .last
        .and_then(decimal_from_f64)
        .filter(|p| *p > Decimal::ZERO)
        .ok_or_else(|| FetchError::malformed("missing index level"))?;

    Quote::with_change(
        symbol.clone(),
        price,
        row.variation.and_then(decimal_from_f64).unwrap_or_default(),
        row.percent_change
            .and_then(decimal_from_f64)
            .unwrap_or_default(),
        SourceKind::ExchangeApi,
    )
    .ok_or_else(|| FetchError::malformed("negative price"))
}

/// Parses a `quote-equity` body
pub(crate) fn parse_equity_quote(symbol: &Symbol, body: &str) -> Result<Quote, FetchError> {
    let response: EquityQuoteResponse =
        serde_json::from_str(body).map_err(|e| malformed("NSE quote-equity", e, body))?;

    // NSE answers unknown symbols with an empty object
    let info = response
        .price_info
        .ok_or_else(|| FetchError::not_found(symbol.to_string()))?;

    let price = info
        .last_price
        .and_then(decimal_from_f64)
        .filter(|p| *p > Decimal::ZERO)
        .ok_or_else(|| FetchError::malformed("missing lastPrice"))?;

    Quote::with_change(
        symbol.clone(),
        price,
        info.change.and_then(decimal_from_f64).unwrap_or_default(),
        info.p_change
            .and_then(decimal_from_f64)
            .map(|p| p.round_dp(2))
            .unwrap_or_default(),
        SourceKind::ExchangeApi,
    )
    .ok_or_else(|| FetchError::malformed("negative price"))
}

/// NAV rows as (date, nav), newest first as published
fn nav_rows(body: &str) -> Result<Vec<(NaiveDate, Decimal)>, FetchError> {
    let response: NavResponse =
        serde_json::from_str(body).map_err(|e| malformed("mfapi NAV series", e, body))?;

    Ok(response
        .data
        .iter()
        .filter_map(|row| {
            let date = NaiveDate::parse_from_str(&row.date, "%d-%m-%Y").ok()?;
            Some((date, parse_decimal(&row.nav)?))
        })
        .collect())
}

/// Latest NAV with change against the previous published NAV
pub(crate) fn parse_latest_nav(symbol: &Symbol, body: &str) -> Result<Quote, FetchError> {
    let rows = nav_rows(body)?;
    let (_, latest) = rows
        .first()
        .copied()
        .ok_or_else(|| FetchError::not_found(format!("no NAV published for {symbol}")))?;

    if latest <= Decimal::ZERO {
        return Err(FetchError::malformed("non-positive NAV"));
    }

    let previous = rows.get(1).map(|(_, nav)| *nav);
    Quote::from_previous_close(symbol.clone(), latest, previous, SourceKind::ExchangeApi)
        .ok_or_else(|| FetchError::malformed("negative NAV"))
}

/// NAV history at or after `since`, oldest first
pub(crate) fn parse_nav_history(
    body: &str,
    since: DateTime<Utc>,
) -> Result<Vec<PricePoint>, FetchError> {
    let mut points: Vec<PricePoint> = nav_rows(body)?
        .into_iter()
        .take(MAX_NAV_HISTORY_DAYS)
        .map(|(date, nav)| PricePoint {
            timestamp: utc_midnight(date),
            price: nav,
        })
        .filter(|point| point.timestamp >= since)
        .collect();

    points.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
    Ok(points)
}

#[async_trait]
impl QuoteSource for NseSource {
    async fn fetch(&self, symbol: &Symbol) -> Result<Quote, FetchError> {
        match symbol.exchange() {
            Exchange::Nse => {
                let body = self
                    .get_nse(NSE_QUOTE_EQUITY_URL, &[("symbol", symbol.code())])
                    .await?;
                parse_equity_quote(symbol, &body)
            }
            Exchange::Index => {
                let index_name = symbol.nse_index_name().ok_or_else(|| {
                    FetchError::not_found(format!("{symbol} is not published by NSE"))
                })?;
                let body = self.get_nse(NSE_ALL_INDICES_URL, &[]).await?;
                parse_all_indices(symbol, index_name, &body)
            }
            Exchange::MutualFund => {
                let body = self.get_nav_series(symbol.code()).await?;
                parse_latest_nav(symbol, &body)
            }
            Exchange::Bse => Err(FetchError::not_found(format!(
                "{symbol} is BSE-only; no official feed"
            ))),
        }
    }

    async fn fetch_history(
        &self,
        symbol: &Symbol,
        period: HistoryPeriod,
    ) -> Result<Vec<PricePoint>, FetchError> {
        if !symbol.is_fund() {
            return Err(FetchError::not_found(format!(
                "{} has no history for {symbol}",
                SOURCE_NAME
            )));
        }

        let body = self.get_nav_series(symbol.code()).await?;
        let points = parse_nav_history(&body, period.start_from(Utc::now()))?;
        if points.is_empty() {
            return Err(FetchError::not_found(format!("no NAV history for {symbol}")));
        }
        Ok(points)
    }

    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    fn kind(&self) -> SourceKind {
        SourceKind::ExchangeApi
    }
}
