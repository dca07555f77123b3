//! Static catalog of searchable instruments
//!
//! Maps human-searchable names, AMCs and categories to canonical
//! symbols. Built once and read-only afterwards.

use crate::symbol::{Exchange, Symbol};
use serde::Serialize;
use std::collections::BTreeSet;

/// Instrument class of a catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentKind {
    Equity,
    Index,
    MutualFund,
}

/// One searchable instrument
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub symbol: Symbol,
    pub name: String,
    /// Asset management company, for mutual funds
    pub amc: Option<String>,
    pub category: String,
    pub kind: InstrumentKind,
}

/// A search hit with its relevance score
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub entry: CatalogEntry,
    pub score: u32,
}

/// (code, name, category)
const EQUITIES: &[(&str, &str, &str)] = &[
    ("RELIANCE", "Reliance Industries", "Energy"),
    ("TCS", "Tata Consultancy Services", "Information Technology"),
    ("HDFCBANK", "HDFC Bank", "Banking"),
    ("INFY", "Infosys", "Information Technology"),
    ("ITC", "ITC", "FMCG"),
    ("BHARTIARTL", "Bharti Airtel", "Telecom"),
    ("MARUTI", "Maruti Suzuki India", "Automobile"),
    ("ASIANPAINT", "Asian Paints", "Consumer Durables"),
    ("WIPRO", "Wipro", "Information Technology"),
    ("SBIN", "State Bank of India", "Banking"),
    ("ICICIBANK", "ICICI Bank", "Banking"),
    ("KOTAKBANK", "Kotak Mahindra Bank", "Banking"),
    ("AXISBANK", "Axis Bank", "Banking"),
    ("BAJFINANCE", "Bajaj Finance", "Financial Services"),
    ("ULTRACEMCO", "UltraTech Cement", "Cement"),
    ("NESTLEIND", "Nestle India", "FMCG"),
    ("TITAN", "Titan Company", "Consumer Durables"),
    ("TATAMOTORS", "Tata Motors", "Automobile"),
    ("TATAPOWER", "Tata Power", "Power"),
    ("TATACONSUM", "Tata Consumer Products", "FMCG"),
    ("HINDUNILVR", "Hindustan Unilever", "FMCG"),
    ("MOTHERSON", "Samvardhana Motherson International", "Auto Components"),
];

/// (code, name)
const INDICES: &[(&str, &str)] = &[
    ("NIFTY", "NIFTY 50"),
    ("SENSEX", "BSE SENSEX"),
    ("BANKNIFTY", "NIFTY Bank"),
    ("MIDCPNIFTY", "NIFTY Midcap 50"),
    ("FINNIFTY", "NIFTY Financial Services"),
];

/// (scheme code, name, amc, category)
const FUNDS: &[(&str, &str, &str, &str)] = &[
    ("119598", "SBI Bluechip Fund", "SBI Mutual Fund", "Large Cap"),
    ("119018", "HDFC Top 100 Fund", "HDFC Mutual Fund", "Large Cap"),
    ("120586", "ICICI Prudential Bluechip Fund", "ICICI Prudential", "Large Cap"),
    ("120465", "Axis Bluechip Fund", "Axis Mutual Fund", "Large Cap"),
    ("118825", "Mirae Asset Large Cap Fund", "Mirae Asset", "Large Cap"),
    ("118989", "HDFC Mid-Cap Opportunities Fund", "HDFC Mutual Fund", "Mid Cap"),
    ("119716", "SBI Magnum Midcap Fund", "SBI Mutual Fund", "Mid Cap"),
    ("120505", "Axis Midcap Fund", "Axis Mutual Fund", "Mid Cap"),
    ("130503", "HDFC Small Cap Fund", "HDFC Mutual Fund", "Small Cap"),
    ("125497", "SBI Small Cap Fund", "SBI Mutual Fund", "Small Cap"),
    ("120503", "Axis Long Term Equity Fund", "Axis Mutual Fund", "ELSS"),
    ("119773", "SBI Long Term Equity Fund", "SBI Mutual Fund", "ELSS"),
    ("118968", "HDFC Balanced Advantage Fund", "HDFC Mutual Fund", "Hybrid"),
    ("120377", "ICICI Prudential Balanced Advantage Fund", "ICICI Prudential", "Hybrid"),
    ("122639", "Parag Parikh Flexi Cap Fund", "PPFAS Mutual Fund", "Flexi Cap"),
    ("118987", "HDFC Corporate Bond Fund", "HDFC Mutual Fund", "Debt"),
];

const NAME_WEIGHT: u32 = 10;
const AMC_WEIGHT: u32 = 5;
const CATEGORY_WEIGHT: u32 = 3;
const CODE_WEIGHT: u32 = 2;

/// Read-only instrument catalog
#[derive(Debug, Clone)]
pub struct SymbolCatalog {
    entries: Vec<CatalogEntry>,
}

impl Default for SymbolCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl SymbolCatalog {
    /// The catalog compiled into the crate
    pub fn builtin() -> Self {
        let equities = EQUITIES.iter().map(|(code, name, category)| CatalogEntry {
            symbol: Symbol::nse(code),
            name: name.to_string(),
            amc: None,
            category: category.to_string(),
            kind: InstrumentKind::Equity,
        });

        let indices = INDICES.iter().filter_map(|(code, name)| {
            Symbol::parse(code).ok().map(|symbol| CatalogEntry {
                symbol,
                name: name.to_string(),
                amc: None,
                category: "Index".to_string(),
                kind: InstrumentKind::Index,
            })
        });

        let funds = FUNDS.iter().map(|(code, name, amc, category)| CatalogEntry {
            symbol: Symbol::fund(code),
            name: name.to_string(),
            amc: Some(amc.to_string()),
            category: category.to_string(),
            kind: InstrumentKind::MutualFund,
        });

        Self::from_entries(equities.chain(indices).chain(funds).collect())
    }

    /// Builds a catalog from arbitrary entries
    pub fn from_entries(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn score(entry: &CatalogEntry, query: &str) -> u32 {
        let mut score = 0;
        if entry.name.to_lowercase().contains(query) {
            score += NAME_WEIGHT;
        }
        if entry
            .amc
            .as_deref()
            .is_some_and(|amc| amc.to_lowercase().contains(query))
        {
            score += AMC_WEIGHT;
        }
        if entry.category.to_lowercase().contains(query) {
            score += CATEGORY_WEIGHT;
        }
        if entry.symbol.code().to_lowercase().contains(query) {
            score += CODE_WEIGHT;
        }
        score
    }

    /// Case-insensitive search over name, AMC, category and code
    ///
    /// Hits are ordered by relevance, then by catalog order.
    pub fn search(&self, query: &str) -> Vec<SearchHit> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Vec::new();
        }

        let mut hits: Vec<SearchHit> = self
            .entries
            .iter()
            .filter_map(|entry| {
                let score = Self::score(entry, &query);
                (score > 0).then(|| SearchHit {
                    entry: entry.clone(),
                    score,
                })
            })
            .collect();

        // stable sort keeps catalog order among equal scores
        hits.sort_by(|a, b| b.score.cmp(&a.score));
        hits
    }

    /// Entry for an exact canonical symbol
    pub fn get(&self, symbol: &Symbol) -> Option<&CatalogEntry> {
        self.entries.iter().find(|entry| &entry.symbol == symbol)
    }

    /// Entries in a category (case-insensitive exact match)
    pub fn by_category(&self, category: &str) -> Vec<&CatalogEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.category.eq_ignore_ascii_case(category.trim()))
            .collect()
    }

    /// Entries listed on one exchange
    pub fn by_exchange(&self, exchange: Exchange) -> Vec<&CatalogEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.symbol.exchange() == exchange)
            .collect()
    }

    /// Sorted, de-duplicated categories
    pub fn categories(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|entry| entry.category.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Resolves free text to a symbol
    ///
    /// Tries an exact name match, then a canonical symbol the catalog
    /// knows, then the best search hit.
    pub fn resolve(&self, text: &str) -> Option<Symbol> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }

        if let Some(entry) = self
            .entries
            .iter()
            .find(|entry| entry.name.eq_ignore_ascii_case(trimmed))
        {
            return Some(entry.symbol.clone());
        }

        if let Ok(symbol) = Symbol::parse(trimmed) {
            if self.get(&symbol).is_some() {
                return Some(symbol);
            }
        }

        self.search(trimmed)
            .into_iter()
            .next()
            .map(|hit| hit.entry.symbol)
    }
}
