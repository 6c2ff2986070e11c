//! Normalized order book.
//!
//! Bids are kept strictly descending by price and asks strictly ascending.
//! That ordering is a hard invariant: every downstream reader (BBO lookup,
//! mid-price derivation, the market-making strategy) indexes the first level
//! without re-checking.

use rust_decimal::Decimal;
use serde_json::Value;

use super::ids::TokenId;

/// A single price level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceLevel {
    pub price: Decimal,
    pub size: Decimal,
}

impl PriceLevel {
    #[must_use]
    pub const fn new(price: Decimal, size: Decimal) -> Self {
        Self { price, size }
    }
}

/// Normalized order book for a single token.
#[derive(Debug, Clone, Default)]
pub struct Orderbook {
    /// Sorted descending by price.
    bids: Vec<PriceLevel>,
    /// Sorted ascending by price.
    asks: Vec<PriceLevel>,
}

impl Orderbook {
    /// Build a book from raw levels, enforcing the sort invariant.
    ///
    /// Non-positive price or size entries are dropped.
    #[must_use]
    pub fn from_levels(bids: Vec<PriceLevel>, asks: Vec<PriceLevel>) -> Self {
        let mut bids: Vec<PriceLevel> = bids
            .into_iter()
            .filter(|l| l.price > Decimal::ZERO && l.size > Decimal::ZERO)
            .collect();
        let mut asks: Vec<PriceLevel> = asks
            .into_iter()
            .filter(|l| l.price > Decimal::ZERO && l.size > Decimal::ZERO)
            .collect();
        bids.sort_by(|a, b| b.price.cmp(&a.price));
        asks.sort_by(|a, b| a.price.cmp(&b.price));
        Self { bids, asks }
    }

    /// Parse a REST payload of shape
    /// `{"bids": [{"price": "0.5", "size": "100"}, ...], "asks": [...]}`.
    ///
    /// Price and size may be JSON strings or numbers. Unparsable or
    /// non-positive entries are dropped rather than failing the whole parse.
    #[must_use]
    pub fn from_rest_response(data: &Value) -> Self {
        Self::from_levels(parse_side(data.get("bids")), parse_side(data.get("asks")))
    }

    #[must_use]
    pub fn bids(&self) -> &[PriceLevel] {
        &self.bids
    }

    #[must_use]
    pub fn asks(&self) -> &[PriceLevel] {
        &self.asks
    }

    /// Best bid (highest buy price).
    #[must_use]
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.first().map(|l| l.price)
    }

    /// Best ask (lowest sell price).
    #[must_use]
    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.first().map(|l| l.price)
    }

    /// Average of best bid and best ask; undefined if either side is empty.
    #[must_use]
    pub fn mid_price(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid + ask) / Decimal::TWO),
            _ => None,
        }
    }

    /// Bid-ask spread; undefined if either side is empty.
    #[must_use]
    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        }
    }

    /// Whether both sides carry at least one level.
    #[must_use]
    pub fn has_both_sides(&self) -> bool {
        !self.bids.is_empty() && !self.asks.is_empty()
    }
}

/// A book tagged with the token it belongs to, as delivered by feeds.
#[derive(Debug, Clone)]
pub struct TokenBook {
    pub token_id: TokenId,
    pub book: Orderbook,
}

fn parse_side(side: Option<&Value>) -> Vec<PriceLevel> {
    let Some(Value::Array(levels)) = side else {
        return Vec::new();
    };
    levels
        .iter()
        .filter_map(|level| {
            let price = parse_decimal(level.get("price")?)?;
            let size = parse_decimal(level.get("size")?)?;
            Some(PriceLevel::new(price, size))
        })
        .collect()
}

/// Parse a JSON string-or-number into a `Decimal`.
fn parse_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.to_string().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_from_rest_response_sorts_and_filters() {
        let data = json!({
            "bids": [
                {"price": "0.55", "size": "10"},
                {"price": "0.60", "size": "5"},
                {"price": "0", "size": "100"},
                {"price": "abc", "size": "1"},
                {"price": "0.50", "size": "-3"}
            ],
            "asks": [
                {"price": 0.70, "size": 8},
                {"price": "0.62", "size": "5"}
            ]
        });

        let book = Orderbook::from_rest_response(&data);

        let bid_prices: Vec<Decimal> = book.bids().iter().map(|l| l.price).collect();
        let ask_prices: Vec<Decimal> = book.asks().iter().map(|l| l.price).collect();
        assert_eq!(bid_prices, vec![dec!(0.60), dec!(0.55)]);
        assert_eq!(ask_prices, vec![dec!(0.62), dec!(0.70)]);
    }

    #[test]
    fn test_best_bid_below_best_ask() {
        let data = json!({
            "bids": [{"price": "0.60", "size": "10"}],
            "asks": [{"price": "0.62", "size": "5"}]
        });
        let book = Orderbook::from_rest_response(&data);
        assert_eq!(book.best_bid(), Some(dec!(0.60)));
        assert_eq!(book.best_ask(), Some(dec!(0.62)));
        assert_eq!(book.mid_price(), Some(dec!(0.61)));
        assert_eq!(book.spread(), Some(dec!(0.02)));
        assert!(book.has_both_sides());
    }

    #[test]
    fn test_one_sided_book_has_no_mid() {
        let book = Orderbook::from_levels(vec![PriceLevel::new(dec!(0.5), dec!(10))], vec![]);
        assert_eq!(book.best_bid(), Some(dec!(0.5)));
        assert_eq!(book.best_ask(), None);
        assert_eq!(book.mid_price(), None);
        assert!(!book.has_both_sides());
    }

    #[test]
    fn test_missing_sides_yield_empty_book() {
        let book = Orderbook::from_rest_response(&json!({}));
        assert!(book.bids().is_empty());
        assert!(book.asks().is_empty());
    }

    #[test]
    fn test_numeric_levels_accepted() {
        let data = json!({
            "bids": [{"price": 0.45, "size": 100}],
            "asks": [{"price": 0.50, "size": 100}]
        });
        let book = Orderbook::from_rest_response(&data);
        assert_eq!(book.best_bid(), Some(dec!(0.45)));
        assert_eq!(book.best_ask(), Some(dec!(0.50)));
    }
}
