//! Last-known mid-price cache.
//!
//! Fed by the market data feed on every book event; read by NAV and the
//! strategy. Values survive disconnects so consumers always get the most
//! recent observation rather than a gap.

use std::collections::HashMap;

use parking_lot::RwLock;
use rust_decimal::Decimal;

use crate::domain::{Market, Orderbook, TokenId};

/// Per-token mid-price cache with last-known-value semantics.
#[derive(Default)]
pub struct MidPriceCache {
    mids: RwLock<HashMap<TokenId, Decimal>>,
}

impl MidPriceCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the mid of a freshly-received book. One-sided or empty books
    /// leave the previous value in place.
    pub fn update_from_book(&self, token_id: &TokenId, book: &Orderbook) {
        if let Some(mid) = book.mid_price() {
            self.mids.write().insert(token_id.clone(), mid);
        }
    }

    pub fn set(&self, token_id: TokenId, mid: Decimal) {
        self.mids.write().insert(token_id, mid);
    }

    /// Last observed mid for a token.
    #[must_use]
    pub fn get(&self, token_id: &TokenId) -> Option<Decimal> {
        self.mids.read().get(token_id).copied()
    }

    /// Mid-prices for every outcome of a market, keyed by outcome name.
    ///
    /// For binary markets an outcome with no live mid is derived as the
    /// complement of its sibling. Outcomes still missing fall back to the
    /// market's published price map.
    #[must_use]
    pub fn mid_prices_for(&self, market: &Market) -> HashMap<String, Decimal> {
        let mut mids: HashMap<String, Decimal> = HashMap::new();
        for token in market.outcome_tokens() {
            if let Some(mid) = self.get(&token.token_id) {
                mids.insert(token.outcome.clone(), mid);
            }
        }

        if market.is_binary() && mids.len() == 1 {
            let outcomes: Vec<&str> = market.outcomes().iter().map(String::as_str).collect();
            if let [a, b] = outcomes[..] {
                let (known, missing) = if mids.contains_key(a) { (a, b) } else { (b, a) };
                if let Some(mid) = mids.get(known).copied() {
                    mids.insert(missing.to_string(), Decimal::ONE - mid);
                }
            }
        }

        for outcome in market.outcomes() {
            if !mids.contains_key(outcome) {
                if let Some(price) = market.prices().get(outcome) {
                    mids.insert(outcome.clone(), *price);
                }
            }
        }

        mids
    }

    /// Live mids only, without complement or published-price fallback.
    #[must_use]
    pub fn live_mids_for(&self, market: &Market) -> HashMap<String, Decimal> {
        let mut mids = HashMap::new();
        for token in market.outcome_tokens() {
            if let Some(mid) = self.get(&token.token_id) {
                mids.insert(token.outcome.clone(), mid);
            }
        }
        mids
    }
}
