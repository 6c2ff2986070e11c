//! Builders for domain primitives used across tests.

use std::collections::HashMap;

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::domain::{
    Market, MarketId, Order, OrderId, OrderSide, OrderStatus, OutcomeToken, TokenId,
};
use crate::exchange::Trade;

/// A token ID.
pub fn token(id: &str) -> TokenId {
    TokenId::from(id)
}

/// An open binary market `id` with outcomes Yes/No, published prices
/// 0.5/0.5, tick size 0.01, and tokens `{id}-yes` / `{id}-no`.
pub fn binary_market(id: &str) -> Market {
    let mut prices = HashMap::new();
    prices.insert("Yes".to_string(), dec!(0.5));
    prices.insert("No".to_string(), dec!(0.5));
    Market::try_new(
        MarketId::from(id),
        "Will it happen?",
        vec!["Yes".into(), "No".into()],
        None,
        dec!(0),
        dec!(1000),
        prices,
        dec!(0.01),
        serde_json::Map::new(),
        vec![
            OutcomeToken::new("Yes", format!("{id}-yes")),
            OutcomeToken::new("No", format!("{id}-no")),
        ],
    )
    .expect("valid test market")
}

/// An open, unfilled buy order on market `m1`, outcome Yes, at 0.5.
pub fn open_order(id: &str, size: Decimal) -> Order {
    let now = Utc::now();
    Order {
        id: OrderId::from(id),
        market_id: MarketId::from("m1"),
        outcome: "Yes".into(),
        side: OrderSide::Buy,
        price: dec!(0.5),
        size,
        filled: Decimal::ZERO,
        status: OrderStatus::Open,
        created_at: now,
        updated_at: now,
    }
}

/// A trade of `size` against order `order_id` on market `m1`, outcome Yes.
pub fn trade_for(trade_id: &str, order_id: &str, size: Decimal) -> Trade {
    Trade {
        id: trade_id.to_string(),
        order_id: OrderId::from(order_id),
        market_id: MarketId::from("m1"),
        token_id: TokenId::from("m1-yes"),
        outcome: "Yes".into(),
        side: OrderSide::Buy,
        price: dec!(0.5),
        size,
        timestamp: Utc::now(),
    }
}
