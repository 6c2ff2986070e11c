//! Order domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::error::DomainError;

use super::ids::{MarketId, OrderId};

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

/// Order lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    /// Accepted by the client, not yet acknowledged by the venue.
    Pending,
    /// Resting on the book.
    Open,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
}

impl OrderStatus {
    /// Whether the order can still trade.
    #[must_use]
    pub const fn is_live(&self) -> bool {
        matches!(self, Self::Pending | Self::Open | Self::PartiallyFilled)
    }
}

/// An order as reported by the venue.
///
/// Value object; each adapter response produces a fresh instance.
#[derive(Debug, Clone)]
pub struct Order {
    pub id: OrderId,
    pub market_id: MarketId,
    pub outcome: String,
    pub side: OrderSide,
    pub price: Decimal,
    pub size: Decimal,
    pub filled: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Validate the filled-quantity invariant (`filled <= size`).
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::OverFilled`] when the venue reports more filled
    /// quantity than the order size.
    pub fn validated(self) -> Result<Self, DomainError> {
        if self.filled > self.size {
            return Err(DomainError::OverFilled {
                filled: self.filled,
                size: self.size,
            });
        }
        Ok(self)
    }

    /// Unfilled remainder.
    #[must_use]
    pub fn remaining(&self) -> Decimal {
        self.size - self.filled
    }

    /// Whether the order can still trade.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.status.is_live()
    }

    /// Whether this order rests within `tolerance` of `price`.
    #[must_use]
    pub fn is_at_price(&self, price: Decimal, tolerance: Decimal) -> bool {
        (self.price - price).abs() < tolerance
    }

    /// Record a new cumulative filled quantity, clamped to the order size,
    /// updating status and timestamp.
    pub fn record_fill(&mut self, filled: Decimal) {
        self.filled = filled.min(self.size);
        self.status = if self.filled >= self.size {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
        self.updated_at = Utc::now();
    }
}
