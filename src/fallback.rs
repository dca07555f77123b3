//! Hand-curated last-known prices
//!
//! Consulted only after every live source has failed. The numbers are
//! refreshed with releases; they are a floor for availability, not a
//! price feed.

use crate::{
    symbol::Symbol,
    types::{Quote, SourceKind},
};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;

/// (canonical symbol, price)
const BUILTIN_PRICES: &[(&str, &str)] = &[
    // Indices
    ("INDEX:NIFTY", "24854.05"),
    ("INDEX:SENSEX", "81224.75"),
    ("INDEX:BANKNIFTY", "51531.15"),
    ("INDEX:MIDCPNIFTY", "15927.40"),
    ("INDEX:FINNIFTY", "23764.90"),
    // NSE equities
    ("NSE:RELIANCE", "2456.70"),
    ("NSE:TCS", "3987.45"),
    ("NSE:HDFCBANK", "1678.90"),
    ("NSE:INFY", "1834.25"),
    ("NSE:ITC", "478.60"),
    ("NSE:BHARTIARTL", "1612.35"),
    ("NSE:MARUTI", "12456.80"),
    ("NSE:ASIANPAINT", "2987.15"),
    ("NSE:WIPRO", "542.30"),
    ("NSE:SBIN", "812.45"),
    ("NSE:ICICIBANK", "1245.60"),
    ("NSE:KOTAKBANK", "1789.30"),
    ("NSE:AXISBANK", "1156.75"),
    ("NSE:BAJFINANCE", "7123.40"),
    ("NSE:ULTRACEMCO", "11234.55"),
    ("NSE:NESTLEIND", "2467.85"),
    ("NSE:TITAN", "3456.20"),
    ("NSE:TATAMOTORS", "987.65"),
    ("NSE:TATAPOWER", "432.10"),
    ("NSE:TATACONSUM", "1123.45"),
    ("NSE:HINDUNILVR", "2678.90"),
    ("NSE:MOTHERSON", "189.35"),
    // Mutual fund NAVs
    ("MF:119598", "91.2345"),
    ("MF:119018", "1123.4567"),
    ("MF:120586", "112.8912"),
    ("MF:120465", "65.4321"),
    ("MF:118989", "189.2345"),
    ("MF:122639", "84.5678"),
];

/// Static symbol → last-known quote table
#[derive(Debug, Clone, Default)]
pub struct FallbackPriceTable {
    prices: HashMap<Symbol, Decimal>,
}

impl FallbackPriceTable {
    /// The table compiled into the crate
    pub fn builtin() -> Self {
        let prices = BUILTIN_PRICES
            .iter()
            .filter_map(|(symbol, price)| {
                Some((Symbol::parse(symbol).ok()?, Decimal::from_str(price).ok()?))
            })
            .collect();

        Self { prices }
    }

    /// An empty table
    pub fn empty() -> Self {
        Self::default()
    }

    /// Adds or replaces a price; negative prices are ignored
    pub fn insert(&mut self, symbol: Symbol, price: Decimal) {
        if price.is_sign_negative() && !price.is_zero() {
            tracing::warn!(%symbol, %price, "Ignoring negative fallback price");
            return;
        }
        self.prices.insert(symbol, price);
    }

    /// Builder-style [`insert`](Self::insert)
    pub fn with_price(mut self, symbol: Symbol, price: Decimal) -> Self {
        self.insert(symbol, price);
        self
    }

    /// Last-known price for `symbol`
    pub fn price(&self, symbol: &Symbol) -> Option<Decimal> {
        self.prices.get(symbol).copied()
    }

    pub fn contains(&self, symbol: &Symbol) -> bool {
        self.prices.contains_key(symbol)
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    /// A quote tagged `StaticFallback` with no change, stamped now
    pub fn quote(&self, symbol: &Symbol) -> Option<Quote> {
        let price = self.price(symbol)?;
        Quote::new(symbol.clone(), price, SourceKind::StaticFallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_builtin_table_parses_every_row() {
        let table = FallbackPriceTable::builtin();
        assert_eq!(table.len(), BUILTIN_PRICES.len());
        for index in ["NIFTY", "SENSEX", "BANKNIFTY"] {
            assert!(table.contains(&Symbol::parse(index).unwrap()), "{index} missing");
        }
    }

    #[test]
    fn test_quote_is_tagged_static_fallback() {
        let table = FallbackPriceTable::builtin();
        let quote = table.quote(&Symbol::nse("RELIANCE")).unwrap();
        assert_eq!(quote.source, SourceKind::StaticFallback);
        assert_eq!(quote.price, dec!(2456.70));
        assert!(!quote.is_live());
        assert!(table.quote(&Symbol::nse("UNKNOWN")).is_none());
    }

    #[test]
    fn test_insert_ignores_negative_prices() {
        let table = FallbackPriceTable::empty()
            .with_price(Symbol::nse("A"), dec!(-5))
            .with_price(Symbol::nse("B"), dec!(5));
        assert!(!table.contains(&Symbol::nse("A")));
        assert!(table.contains(&Symbol::nse("B")));
    }
}
