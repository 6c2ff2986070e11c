//! Exchange adapter trait.
//!
//! Any venue (order-signing blockchain CLOB, REST/WebSocket matching engine)
//! plugs into the runtime by implementing [`Exchange`]. The runtime treats
//! adapters as stateless: all client-side state lives in
//! [`ExchangeClient`](crate::runtime::ExchangeClient).
//!
//! Optional capabilities (order book REST endpoint, push feeds, slug lookup)
//! are declared once via [`Exchange::capabilities`] and resolved at client
//! construction, not re-probed per call.

use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::{Market, MarketId, Order, OrderId, OrderSide, Orderbook, Position, TokenId};
use crate::error::{Error, Result};

use super::stream::{MarketDataStream, UserDataStream};

/// Asset symbol -> amount, e.g. `{"USDC": 1000.0}`.
pub type Balances = HashMap<String, Decimal>;

/// Filter for market listing.
#[derive(Debug, Clone, Default)]
pub struct MarketFilter {
    /// Maximum number of markets to return.
    pub limit: Option<usize>,
    /// Only markets currently open for trading.
    pub active_only: bool,
}

impl MarketFilter {
    #[must_use]
    pub const fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            active_only: false,
        }
    }
}

/// Parameters for placing an order.
#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub market_id: MarketId,
    pub outcome: String,
    pub side: OrderSide,
    /// Limit price in [0, 1].
    pub price: Decimal,
    /// Share count.
    pub size: Decimal,
    /// Venue token ID for the outcome, when already resolved.
    pub token_id: Option<TokenId>,
}

/// Optional adapter capabilities, declared once at construction.
#[derive(Debug, Clone, Copy, Default)]
pub struct Capabilities {
    /// `fetch_orderbook` is implemented.
    pub orderbook: bool,
    /// `market_stream` returns a push feed.
    pub market_stream: bool,
    /// `user_stream` returns a fill-push feed.
    pub user_stream: bool,
    /// `fetch_markets_by_slug` is implemented.
    pub slug_lookup: bool,
}

/// A prediction-market venue.
///
/// Implementations own wire-format parsing and (for blockchain CLOBs) order
/// signing; both are outside the runtime core. Methods with defaults are
/// optional capabilities and must agree with [`Exchange::capabilities`].
#[async_trait]
pub trait Exchange: Send + Sync {
    /// Short identifier, e.g. `"polymarket"`.
    fn id(&self) -> &'static str;

    /// Human-readable venue name.
    fn name(&self) -> &'static str;

    async fn fetch_markets(&self, filter: &MarketFilter) -> Result<Vec<Market>>;

    async fn fetch_market(&self, market_id: &MarketId) -> Result<Market>;

    /// Fetch all markets of an event by slug or URL.
    async fn fetch_markets_by_slug(&self, _slug: &str) -> Result<Vec<Market>> {
        Err(Error::NotSupported("fetch_markets_by_slug"))
    }

    async fn create_order(&self, request: &OrderRequest) -> Result<Order>;

    async fn cancel_order(&self, order_id: &OrderId, market_id: Option<&MarketId>)
        -> Result<Order>;

    async fn fetch_order(&self, order_id: &OrderId, market_id: Option<&MarketId>) -> Result<Order>;

    async fn fetch_open_orders(&self, market_id: Option<&MarketId>) -> Result<Vec<Order>>;

    async fn fetch_positions(&self, market_id: Option<&MarketId>) -> Result<Vec<Position>>;

    async fn fetch_balance(&self) -> Result<Balances>;

    /// Declared optional capabilities.
    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    /// REST order book snapshot for a token.
    async fn fetch_orderbook(&self, _token_id: &TokenId) -> Result<Orderbook> {
        Err(Error::NotSupported("fetch_orderbook"))
    }

    /// Push feed for order book updates, if the venue has one.
    fn market_stream(&self) -> Option<Box<dyn MarketDataStream>> {
        None
    }

    /// Push feed for the caller's own fills, if the venue has one.
    fn user_stream(&self) -> Option<Box<dyn UserDataStream>> {
        None
    }
}

/// Pick a tradeable market from a listing: open, optionally binary, with
/// resolved tokens and enough liquidity.
pub fn find_tradeable_market(
    markets: Vec<Market>,
    binary_only: bool,
    min_liquidity: Decimal,
) -> Option<Market> {
    markets.into_iter().find(|market| {
        (!binary_only || market.is_binary())
            && market.is_open()
            && market.liquidity() >= min_liquidity
            && !market.outcome_tokens().is_empty()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OutcomeToken;
    use rust_decimal_macros::dec;

    fn market(id: &str, liquidity: Decimal, tokens: bool) -> Market {
        Market::try_new(
            MarketId::from(id),
            "q",
            vec!["Yes".into(), "No".into()],
            None,
            dec!(0),
            liquidity,
            HashMap::new(),
            dec!(0.01),
            serde_json::Map::new(),
            if tokens {
                vec![
                    OutcomeToken::new("Yes", format!("{id}-yes")),
                    OutcomeToken::new("No", format!("{id}-no")),
                ]
            } else {
                vec![]
            },
        )
        .unwrap()
    }

    #[test]
    fn test_find_tradeable_market_skips_unresolved_tokens() {
        let markets = vec![market("m1", dec!(100), false), market("m2", dec!(100), true)];
        let found = find_tradeable_market(markets, true, dec!(50)).unwrap();
        assert_eq!(found.id().as_str(), "m2");
    }

    #[test]
    fn test_find_tradeable_market_respects_liquidity() {
        let markets = vec![market("m1", dec!(10), true)];
        assert!(find_tradeable_market(markets, true, dec!(50)).is_none());
    }
}
