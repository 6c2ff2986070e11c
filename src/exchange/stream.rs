//! Real-time feed traits.
//!
//! Adapters with push transports expose them through [`MarketDataStream`]
//! (order book updates) and [`UserDataStream`] (own-fill notifications).
//! Implementations handle connection setup, subscription messages, and
//! payload parsing for their venue; the runtime only consumes the
//! normalized events.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::{MarketId, OrderId, Orderbook, OrderSide, TokenId};
use crate::error::Result;

/// Events received from a market data stream.
#[derive(Debug, Clone)]
pub enum MarketEvent {
    /// Full order book snapshot for a token.
    BookSnapshot { token_id: TokenId, book: Orderbook },
    /// Top-of-book update collapsed into a (possibly thin) book.
    BookUpdate { token_id: TokenId, book: Orderbook },
    /// Connection established.
    Connected,
    /// Connection lost; the feed decides whether to reconnect.
    Disconnected { reason: String },
}

impl MarketEvent {
    /// Token and book, when this event carries market data.
    #[must_use]
    pub fn book(&self) -> Option<(&TokenId, &Orderbook)> {
        match self {
            Self::BookSnapshot { token_id, book } | Self::BookUpdate { token_id, book } => {
                Some((token_id, book))
            }
            _ => None,
        }
    }
}

/// Real-time order book stream from a venue.
#[async_trait]
pub trait MarketDataStream: Send {
    /// Connect to the venue's push feed.
    async fn connect(&mut self) -> Result<()>;

    /// Subscribe to book updates for the given tokens.
    async fn subscribe(&mut self, token_ids: &[TokenId]) -> Result<()>;

    /// Receive the next event. Blocks until one is available; returns `None`
    /// when the stream is closed for good.
    async fn next_event(&mut self) -> Option<MarketEvent>;

    /// Venue name for logging.
    fn exchange_name(&self) -> &'static str;
}

#[async_trait]
impl MarketDataStream for Box<dyn MarketDataStream> {
    async fn connect(&mut self) -> Result<()> {
        (**self).connect().await
    }

    async fn subscribe(&mut self, token_ids: &[TokenId]) -> Result<()> {
        (**self).subscribe(token_ids).await
    }

    async fn next_event(&mut self) -> Option<MarketEvent> {
        (**self).next_event().await
    }

    fn exchange_name(&self) -> &'static str {
        (**self).exchange_name()
    }
}

/// A trade/fill event from the user channel.
#[derive(Debug, Clone)]
pub struct Trade {
    pub id: String,
    pub order_id: OrderId,
    pub market_id: MarketId,
    pub token_id: TokenId,
    pub outcome: String,
    pub side: OrderSide,
    pub price: Decimal,
    pub size: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Real-time own-fill stream from a venue's authenticated user channel.
#[async_trait]
pub trait UserDataStream: Send {
    /// Connect and authenticate.
    async fn connect(&mut self) -> Result<()>;

    /// Receive the next trade. Returns `None` when the stream is closed.
    async fn next_trade(&mut self) -> Option<Trade>;

    /// Venue name for logging.
    fn exchange_name(&self) -> &'static str;
}
