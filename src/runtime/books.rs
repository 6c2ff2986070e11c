//! Thread-safe order book store.
//!
//! One writer (the feed worker), many readers (strategy ticks, NAV).
//! Updates replace the whole book for a token in a single write - readers
//! never see a half-applied ladder.

use std::collections::HashMap;

use parking_lot::RwLock;
use rust_decimal::Decimal;

use crate::domain::{Orderbook, TokenId};

/// Store of normalized order books keyed by token.
#[derive(Default)]
pub struct OrderBookStore {
    books: RwLock<HashMap<TokenId, Orderbook>>,
}

impl OrderBookStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored book for a token. Last write wins.
    pub fn update(&self, token_id: TokenId, book: Orderbook) {
        self.books.write().insert(token_id, book);
    }

    /// Snapshot of a token's book.
    #[must_use]
    pub fn get(&self, token_id: &TokenId) -> Option<Orderbook> {
        self.books.read().get(token_id).cloned()
    }

    /// Best bid and ask for a token.
    #[must_use]
    pub fn best_bid_ask(&self, token_id: &TokenId) -> (Option<Decimal>, Option<Decimal>) {
        let books = self.books.read();
        match books.get(token_id) {
            Some(book) => (book.best_bid(), book.best_ask()),
            None => (None, None),
        }
    }

    /// Mid-price for a token; `None` if either side is empty.
    #[must_use]
    pub fn mid_price(&self, token_id: &TokenId) -> Option<Decimal> {
        self.books.read().get(token_id).and_then(Orderbook::mid_price)
    }

    /// True only when both sides of the stored book are non-empty.
    #[must_use]
    pub fn has_data(&self, token_id: &TokenId) -> bool {
        self.books
            .read()
            .get(token_id)
            .is_some_and(Orderbook::has_both_sides)
    }

    /// Whether every listed token has a two-sided book.
    #[must_use]
    pub fn has_all_data(&self, token_ids: &[TokenId]) -> bool {
        token_ids.iter().all(|t| self.has_data(t))
    }

    /// Number of stored books.
    #[must_use]
    pub fn len(&self) -> usize {
        self.books.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
