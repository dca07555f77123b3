//! Canonical instrument symbols and per-provider symbol mapping
//!
//! Everything inside the engine speaks the canonical `EXCHANGE:CODE`
//! form (`NSE:RELIANCE`, `BSE:RELIANCE`, `INDEX:NIFTY`, `MF:119598`).
//! Each source translates it into its own convention through the
//! mapping methods here, returning `None` when it cannot serve the
//! instrument at all.

use crate::error::QuoteError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Where an instrument is listed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Exchange {
    /// National Stock Exchange of India
    Nse,
    /// Bombay Stock Exchange
    Bse,
    /// Market index (not directly tradable)
    Index,
    /// Mutual fund scheme, identified by its AMFI scheme code
    MutualFund,
}

impl Exchange {
    /// Prefix used in the canonical form
    pub fn prefix(&self) -> &'static str {
        match self {
            Exchange::Nse => "NSE",
            Exchange::Bse => "BSE",
            Exchange::Index => "INDEX",
            Exchange::MutualFund => "MF",
        }
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix.trim().to_ascii_uppercase().as_str() {
            "NSE" | "NSI" => Some(Exchange::Nse),
            "BSE" | "BOM" => Some(Exchange::Bse),
            "INDEX" | "IDX" => Some(Exchange::Index),
            "MF" | "AMFI" => Some(Exchange::MutualFund),
            _ => None,
        }
    }
}

/// Static description of a supported market index
#[derive(Debug)]
struct IndexInfo {
    code: &'static str,
    aliases: &'static [&'static str],
    yahoo: &'static str,
    nse_name: Option<&'static str>,
    google: &'static str,
}

const INDICES: &[IndexInfo] = &[
    IndexInfo {
        code: "NIFTY",
        aliases: &["NIFTY50", "NSEI"],
        yahoo: "^NSEI",
        nse_name: Some("NIFTY 50"),
        google: "NIFTY_50:INDEXNSE",
    },
    IndexInfo {
        code: "SENSEX",
        aliases: &["BSESN", "BSESENSEX"],
        yahoo: "^BSESN",
        nse_name: None,
        google: "SENSEX:INDEXBOM",
    },
    IndexInfo {
        code: "BANKNIFTY",
        aliases: &["NIFTYBANK", "NSEBANK"],
        yahoo: "^NSEBANK",
        nse_name: Some("NIFTY BANK"),
        google: "NIFTY_BANK:INDEXNSE",
    },
    IndexInfo {
        code: "MIDCPNIFTY",
        aliases: &["NIFTYMIDCAP50", "NSEMDCP50"],
        yahoo: "^NSEMDCP50",
        nse_name: Some("NIFTY MIDCAP 50"),
        google: "NIFTY_MIDCAP_50:INDEXNSE",
    },
    IndexInfo {
        code: "FINNIFTY",
        aliases: &["NIFTYFINSERVICE", "NSEFIN", "NIFTYFINANCIALSERVICES"],
        yahoo: "NIFTY_FIN_SERVICE.NS",
        nse_name: Some("NIFTY FINANCIAL SERVICES"),
        google: "NIFTY_FIN_SERVICE:INDEXNSE",
    },
];

fn find_index(normalized: &str) -> Option<&'static IndexInfo> {
    INDICES
        .iter()
        .find(|info| info.code == normalized || info.aliases.contains(&normalized))
}

/// Normalizes a raw ticker: uppercases, drops `$`/`^` markers, exchange
/// suffixes and trading-series suffixes, and removes punctuation other
/// than `&` and `-` (both appear in real NSE codes such as `M&M`).
pub fn normalize_ticker(raw: &str) -> String {
    let mut ticker = raw.trim().to_ascii_uppercase();

    if let Some(rest) = ticker.strip_prefix(['$', '^']) {
        ticker = rest.to_string();
    }

    for suffix in [".NS", ".BO"] {
        if let Some(rest) = ticker.strip_suffix(suffix) {
            ticker = rest.to_string();
            break;
        }
    }

    for series in ["-EQ", "-BE", "-BL"] {
        if let Some(rest) = ticker.strip_suffix(series) {
            ticker = rest.to_string();
            break;
        }
    }

    ticker
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '&' || *c == '-')
        .collect()
}

/// Canonical instrument identifier
///
/// Serializes as its canonical string (`"NSE:RELIANCE"`); deserializing
/// goes through [`Symbol::parse`], so malformed codes are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol {
    exchange: Exchange,
    code: String,
}

impl Symbol {
    /// NSE-listed equity
    pub fn nse(code: &str) -> Self {
        Self {
            exchange: Exchange::Nse,
            code: normalize_ticker(code),
        }
    }

    /// BSE-listed equity
    pub fn bse(code: &str) -> Self {
        Self {
            exchange: Exchange::Bse,
            code: normalize_ticker(code),
        }
    }

    /// Mutual fund scheme by AMFI scheme code
    pub fn fund(scheme_code: &str) -> Self {
        Self {
            exchange: Exchange::MutualFund,
            code: scheme_code.trim().to_string(),
        }
    }

    /// Parses free-form input into a canonical symbol
    ///
    /// Accepts `EXCHANGE:CODE`, Yahoo-style `.NS`/`.BO` suffixes, bare
    /// index names and bare tickers (which default to NSE).
    pub fn parse(input: &str) -> Result<Self, QuoteError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(QuoteError::invalid_symbol(input));
        }

        if let Some((prefix, rest)) = trimmed.split_once(':') {
            let exchange =
                Exchange::from_prefix(prefix).ok_or_else(|| QuoteError::invalid_symbol(input))?;
            return Self::with_exchange(exchange, rest, input);
        }

        let upper = trimmed.to_ascii_uppercase();
        if upper.ends_with(".NS") {
            return Self::with_exchange(Exchange::Nse, trimmed, input);
        }
        if upper.ends_with(".BO") {
            return Self::with_exchange(Exchange::Bse, trimmed, input);
        }

        let normalized = normalize_ticker(trimmed).replace(['-', '&'], "");
        if let Some(info) = find_index(&normalized) {
            return Ok(Self {
                exchange: Exchange::Index,
                code: info.code.to_string(),
            });
        }

        Self::with_exchange(Exchange::Nse, trimmed, input)
    }

    fn with_exchange(exchange: Exchange, raw_code: &str, input: &str) -> Result<Self, QuoteError> {
        let code = match exchange {
            Exchange::Nse | Exchange::Bse => normalize_ticker(raw_code),
            Exchange::Index => {
                let normalized = normalize_ticker(raw_code).replace(['-', '&'], "");
                find_index(&normalized)
                    .map(|info| info.code.to_string())
                    .ok_or_else(|| QuoteError::invalid_symbol(input))?
            }
            Exchange::MutualFund => {
                let code = raw_code.trim();
                if code.is_empty() || !code.chars().all(|c| c.is_ascii_digit()) {
                    return Err(QuoteError::invalid_symbol(input));
                }
                code.to_string()
            }
        };

        if code.is_empty() {
            return Err(QuoteError::invalid_symbol(input));
        }

        Ok(Self { exchange, code })
    }

    /// The listing venue
    pub fn exchange(&self) -> Exchange {
        self.exchange
    }

    /// Exchange-local code (ticker, index code or scheme code)
    pub fn code(&self) -> &str {
        &self.code
    }

    /// True for market indices
    pub fn is_index(&self) -> bool {
        self.exchange == Exchange::Index
    }

    /// True for mutual fund schemes
    pub fn is_fund(&self) -> bool {
        self.exchange == Exchange::MutualFund
    }

    fn index_info(&self) -> Option<&'static IndexInfo> {
        if self.is_index() {
            find_index(&self.code)
        } else {
            None
        }
    }

    /// Alpha Vantage symbol (`RELIANCE.NSE`, `RELIANCE.BSE`)
    pub fn alpha_vantage_symbol(&self) -> Option<String> {
        match self.exchange {
            Exchange::Nse => Some(format!("{}.NSE", self.code)),
            Exchange::Bse => Some(format!("{}.BSE", self.code)),
            Exchange::Index | Exchange::MutualFund => None,
        }
    }

    /// Yahoo Finance symbol (`RELIANCE.NS`, `RELIANCE.BO`, `^NSEI`)
    pub fn yahoo_symbol(&self) -> Option<String> {
        match self.exchange {
            Exchange::Nse => Some(format!("{}.NS", self.code)),
            Exchange::Bse => Some(format!("{}.BO", self.code)),
            Exchange::Index => self.index_info().map(|info| info.yahoo.to_string()),
            Exchange::MutualFund => None,
        }
    }

    /// Index name as published in NSE's all-indices feed
    pub fn nse_index_name(&self) -> Option<&'static str> {
        self.index_info().and_then(|info| info.nse_name)
    }

    /// Google Finance quote page identifier (`RELIANCE:NSE`, `NIFTY_50:INDEXNSE`)
    pub fn google_finance_symbol(&self) -> Option<String> {
        match self.exchange {
            Exchange::Nse => Some(format!("{}:NSE", self.code)),
            Exchange::Bse => Some(format!("{}:BOM", self.code)),
            Exchange::Index => self.index_info().map(|info| info.google.to_string()),
            Exchange::MutualFund => None,
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.exchange.prefix(), self.code)
    }
}

impl FromStr for Symbol {
    type Err = QuoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Symbol {
    type Error = QuoteError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_canonical_forms() {
        assert_eq!(Symbol::parse("NSE:RELIANCE").unwrap().to_string(), "NSE:RELIANCE");
        assert_eq!(Symbol::parse("bse:tcs").unwrap().to_string(), "BSE:TCS");
        assert_eq!(Symbol::parse("MF:119598").unwrap().to_string(), "MF:119598");
        assert_eq!(Symbol::parse("INDEX:NIFTY").unwrap().to_string(), "INDEX:NIFTY");
    }

    #[test]
    fn test_parse_yahoo_suffixes_and_bare_tickers() {
        assert_eq!(Symbol::parse("reliance.ns").unwrap(), Symbol::nse("RELIANCE"));
        assert_eq!(Symbol::parse("RELIANCE.BO").unwrap(), Symbol::bse("RELIANCE"));
        assert_eq!(Symbol::parse(" infy ").unwrap(), Symbol::nse("INFY"));
        assert_eq!(Symbol::parse("$TCS-EQ").unwrap(), Symbol::nse("TCS"));
        assert_eq!(Symbol::parse("M&M").unwrap().code(), "M&M");
    }

    #[test]
    fn test_parse_index_aliases() {
        for input in ["NIFTY", "nifty 50", "^NSEI", "INDEX:NIFTY50"] {
            let symbol = Symbol::parse(input).unwrap();
            assert!(symbol.is_index(), "{input} should be an index");
            assert_eq!(symbol.code(), "NIFTY");
        }
        assert_eq!(Symbol::parse("^BSESN").unwrap().code(), "SENSEX");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Symbol::parse("").is_err());
        assert!(Symbol::parse("   ").is_err());
        assert!(Symbol::parse("XYZ:RELIANCE").is_err());
        assert!(Symbol::parse("MF:SBI-BLUECHIP").is_err());
        assert!(Symbol::parse("INDEX:NOT_AN_INDEX").is_err());
        assert!(Symbol::parse("NSE:%%%").is_err());
    }

    #[test]
    fn test_serializes_as_canonical_string() {
        let symbol = Symbol::nse("M&M");
        let json = serde_json::to_value(&symbol).unwrap();
        assert_eq!(json, serde_json::json!("NSE:M&M"));

        let back: Symbol = serde_json::from_value(json).unwrap();
        assert_eq!(back, symbol);

        let index: Symbol = serde_json::from_str(r#""INDEX:NIFTY""#).unwrap();
        assert!(index.is_index());
    }

    #[test]
    fn test_deserialize_rejects_invalid_symbols() {
        assert!(serde_json::from_str::<Symbol>(r#""NSE:""#).is_err());
        assert!(serde_json::from_str::<Symbol>(r#""MF:ABC""#).is_err());
        assert!(serde_json::from_str::<Symbol>(r#"{"exchange":"NSE","code":""}"#).is_err());
    }

    #[test]
    fn test_provider_mappings() {
        let nse = Symbol::nse("RELIANCE");
        assert_eq!(nse.alpha_vantage_symbol().as_deref(), Some("RELIANCE.NSE"));
        assert_eq!(nse.yahoo_symbol().as_deref(), Some("RELIANCE.NS"));
        assert_eq!(nse.google_finance_symbol().as_deref(), Some("RELIANCE:NSE"));

        let bse = Symbol::bse("RELIANCE");
        assert_eq!(bse.alpha_vantage_symbol().as_deref(), Some("RELIANCE.BSE"));
        assert_eq!(bse.yahoo_symbol().as_deref(), Some("RELIANCE.BO"));
        assert_eq!(bse.google_finance_symbol().as_deref(), Some("RELIANCE:BOM"));

        let nifty = Symbol::parse("NIFTY").unwrap();
        assert_eq!(nifty.alpha_vantage_symbol(), None);
        assert_eq!(nifty.yahoo_symbol().as_deref(), Some("^NSEI"));
        assert_eq!(nifty.nse_index_name(), Some("NIFTY 50"));

        let sensex = Symbol::parse("SENSEX").unwrap();
        assert_eq!(sensex.nse_index_name(), None);
        assert_eq!(sensex.google_finance_symbol().as_deref(), Some("SENSEX:INDEXBOM"));

        let fund = Symbol::fund("119598");
        assert_eq!(fund.yahoo_symbol(), None);
        assert_eq!(fund.google_finance_symbol(), None);
    }
}
