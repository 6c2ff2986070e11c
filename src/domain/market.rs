//! Market-related domain types.
//!
//! - [`Market`] - A prediction market with N outcomes and a published price map
//! - [`OutcomeToken`] - An outcome name paired with its tradeable token ID

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::error::DomainError;

use super::ids::{MarketId, TokenId};

/// A tradeable outcome paired with its venue token ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeToken {
    pub outcome: String,
    pub token_id: TokenId,
}

impl OutcomeToken {
    pub fn new(outcome: impl Into<String>, token_id: impl Into<TokenId>) -> Self {
        Self {
            outcome: outcome.into(),
            token_id: token_id.into(),
        }
    }
}

/// A prediction market.
///
/// Value object created per adapter response and discarded; the runtime never
/// mutates it. Construction validates the domain invariants: every published
/// price lies within [0, 1], the tick size is positive, and there is at least
/// one outcome.
#[derive(Debug, Clone)]
pub struct Market {
    id: MarketId,
    question: String,
    outcomes: Vec<String>,
    close_time: Option<DateTime<Utc>>,
    volume: Decimal,
    liquidity: Decimal,
    /// Published outcome -> probability map.
    prices: HashMap<String, Decimal>,
    tick_size: Decimal,
    /// Opaque venue metadata (e.g. token IDs, closed flag).
    metadata: serde_json::Map<String, serde_json::Value>,
    /// Outcome -> token mapping, resolved by the adapter.
    outcome_tokens: Vec<OutcomeToken>,
}

impl Market {
    /// Create a market with invariant validation.
    ///
    /// # Errors
    ///
    /// - [`DomainError::EmptyOutcomes`] if `outcomes` is empty
    /// - [`DomainError::PriceOutOfRange`] if any price is outside [0, 1]
    /// - [`DomainError::NonPositiveTickSize`] if `tick_size` is not positive
    #[allow(clippy::too_many_arguments)]
    pub fn try_new(
        id: MarketId,
        question: impl Into<String>,
        outcomes: Vec<String>,
        close_time: Option<DateTime<Utc>>,
        volume: Decimal,
        liquidity: Decimal,
        prices: HashMap<String, Decimal>,
        tick_size: Decimal,
        metadata: serde_json::Map<String, serde_json::Value>,
        outcome_tokens: Vec<OutcomeToken>,
    ) -> Result<Self, DomainError> {
        if outcomes.is_empty() {
            return Err(DomainError::EmptyOutcomes);
        }
        if tick_size <= Decimal::ZERO {
            return Err(DomainError::NonPositiveTickSize(tick_size));
        }
        for (outcome, price) in &prices {
            if *price < Decimal::ZERO || *price > Decimal::ONE {
                return Err(DomainError::PriceOutOfRange {
                    outcome: outcome.clone(),
                    price: *price,
                });
            }
        }
        Ok(Self {
            id,
            question: question.into(),
            outcomes,
            close_time,
            volume,
            liquidity,
            prices,
            tick_size,
            metadata,
            outcome_tokens,
        })
    }

    #[must_use]
    pub const fn id(&self) -> &MarketId {
        &self.id
    }

    #[must_use]
    pub fn question(&self) -> &str {
        &self.question
    }

    #[must_use]
    pub fn outcomes(&self) -> &[String] {
        &self.outcomes
    }

    #[must_use]
    pub const fn close_time(&self) -> Option<DateTime<Utc>> {
        self.close_time
    }

    #[must_use]
    pub const fn volume(&self) -> Decimal {
        self.volume
    }

    #[must_use]
    pub const fn liquidity(&self) -> Decimal {
        self.liquidity
    }

    #[must_use]
    pub const fn prices(&self) -> &HashMap<String, Decimal> {
        &self.prices
    }

    #[must_use]
    pub const fn tick_size(&self) -> Decimal {
        self.tick_size
    }

    #[must_use]
    pub const fn metadata(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.metadata
    }

    #[must_use]
    pub fn outcome_tokens(&self) -> &[OutcomeToken] {
        &self.outcome_tokens
    }

    /// Token ID for an outcome name, if the adapter resolved one.
    #[must_use]
    pub fn token_for(&self, outcome: &str) -> Option<&TokenId> {
        self.outcome_tokens
            .iter()
            .find(|ot| ot.outcome == outcome)
            .map(|ot| &ot.token_id)
    }

    /// All resolved token IDs, in outcome order.
    #[must_use]
    pub fn token_ids(&self) -> Vec<TokenId> {
        self.outcome_tokens
            .iter()
            .map(|ot| ot.token_id.clone())
            .collect()
    }

    /// Whether the market is binary (exactly two outcomes).
    #[must_use]
    pub fn is_binary(&self) -> bool {
        self.outcomes.len() == 2
    }

    /// Whether the market is still open for trading.
    ///
    /// An explicit `closed` metadata flag wins over the close time.
    #[must_use]
    pub fn is_open(&self) -> bool {
        if let Some(closed) = self.metadata.get("closed").and_then(serde_json::Value::as_bool) {
            return !closed;
        }
        match self.close_time {
            Some(close) => Utc::now() < close,
            None => true,
        }
    }

    /// Bid-ask spread proxy for binary markets: |1 - sum of prices|.
    ///
    /// `None` for non-binary markets or incomplete price maps.
    #[must_use]
    pub fn spread(&self) -> Option<Decimal> {
        if !self.is_binary() {
            return None;
        }
        let prices: Vec<Decimal> = self
            .outcomes
            .iter()
            .filter_map(|o| self.prices.get(o).copied())
            .collect();
        if prices.len() != 2 {
            return None;
        }
        Some((Decimal::ONE - (prices[0] + prices[1])).abs())
    }
}
