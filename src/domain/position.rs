//! Position domain type.

use rust_decimal::Decimal;

use crate::error::DomainError;

use super::ids::MarketId;

/// A holding in one outcome of one market.
#[derive(Debug, Clone)]
pub struct Position {
    pub market_id: MarketId,
    pub outcome: String,
    /// Share count, always non-negative.
    pub size: Decimal,
    /// Volume-weighted average entry price.
    pub average_price: Decimal,
    /// Last known market price for this outcome.
    pub current_price: Decimal,
}

impl Position {
    /// Create a position, rejecting negative sizes.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::NegativePositionSize`] when `size < 0`.
    pub fn try_new(
        market_id: MarketId,
        outcome: impl Into<String>,
        size: Decimal,
        average_price: Decimal,
        current_price: Decimal,
    ) -> Result<Self, DomainError> {
        if size < Decimal::ZERO {
            return Err(DomainError::NegativePositionSize(size));
        }
        Ok(Self {
            market_id,
            outcome: outcome.into(),
            size,
            average_price,
            current_price,
        })
    }

    /// Mark-to-market profit: `size * (current - average)`.
    #[must_use]
    pub fn unrealized_pnl(&self) -> Decimal {
        self.size * (self.current_price - self.average_price)
    }

    /// Capital deployed: `size * average`.
    #[must_use]
    pub fn cost_basis(&self) -> Decimal {
        self.size * self.average_price
    }
}
