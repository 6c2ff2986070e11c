//! In-memory [`Exchange`] mock.
//!
//! Seeded with builder methods, mutated through interior mutability so
//! tests can flip failure modes mid-scenario. Orders placed through the
//! mock are recorded and served back by the open-order endpoints.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::domain::{
    Market, MarketId, Order, OrderId, Orderbook, OrderStatus, Position, TokenId,
};
use crate::error::{Error, Result};
use crate::exchange::{
    Balances, Capabilities, Exchange, MarketDataStream, MarketFilter, OrderRequest,
    UserDataStream,
};

/// Configurable in-memory exchange.
#[derive(Default)]
pub struct MockExchange {
    markets: Mutex<HashMap<MarketId, Market>>,
    balances: Mutex<Balances>,
    positions: Mutex<Vec<Position>>,
    orderbooks: Mutex<HashMap<TokenId, Orderbook>>,
    placed: Mutex<Vec<Order>>,
    cancelled: Mutex<Vec<OrderId>>,
    market_stream: Mutex<Option<Box<dyn MarketDataStream>>>,
    user_stream: Mutex<Option<Box<dyn UserDataStream>>>,
    has_orderbooks: AtomicBool,
    has_market_stream: AtomicBool,
    has_user_stream: AtomicBool,
    fail_balance: AtomicBool,
    fail_positions: AtomicBool,
    fail_orderbook: AtomicBool,
    fail_create: AtomicBool,
    balance_calls: AtomicUsize,
    position_calls: AtomicUsize,
    orderbook_calls: AtomicUsize,
}

impl MockExchange {
    pub fn new() -> Self {
        Self::default()
    }

    // -- builders -------------------------------------------------------

    pub fn with_market(self, market: Market) -> Self {
        self.markets.lock().insert(market.id().clone(), market);
        self
    }

    pub fn with_balance(self, asset: &str, amount: Decimal) -> Self {
        self.balances.lock().insert(asset.to_string(), amount);
        self
    }

    pub fn with_position(self, market: &str, outcome: &str, size: Decimal) -> Self {
        let position =
            Position::try_new(MarketId::from(market), outcome, size, dec!(0.5), dec!(0.5))
                .expect("valid test position");
        self.positions.lock().push(position);
        self
    }

    pub fn with_orderbook(self, token: &str, book: Orderbook) -> Self {
        self.orderbooks.lock().insert(TokenId::from(token), book);
        self.has_orderbooks.store(true, Ordering::SeqCst);
        self
    }

    pub fn with_market_stream(self, stream: impl MarketDataStream + 'static) -> Self {
        *self.market_stream.lock() = Some(Box::new(stream));
        self.has_market_stream.store(true, Ordering::SeqCst);
        self
    }

    pub fn with_user_stream(self, stream: impl UserDataStream + 'static) -> Self {
        *self.user_stream.lock() = Some(Box::new(stream));
        self.has_user_stream.store(true, Ordering::SeqCst);
        self
    }

    // -- failure toggles ------------------------------------------------

    pub fn fail_balance(&self, fail: bool) {
        self.fail_balance.store(fail, Ordering::SeqCst);
    }

    pub fn fail_positions(&self, fail: bool) {
        self.fail_positions.store(fail, Ordering::SeqCst);
    }

    pub fn fail_orderbook(&self, fail: bool) {
        self.fail_orderbook.store(fail, Ordering::SeqCst);
    }

    pub fn fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    // -- observation ----------------------------------------------------

    pub fn balance_calls(&self) -> usize {
        self.balance_calls.load(Ordering::SeqCst)
    }

    pub fn position_calls(&self) -> usize {
        self.position_calls.load(Ordering::SeqCst)
    }

    pub fn orderbook_calls(&self) -> usize {
        self.orderbook_calls.load(Ordering::SeqCst)
    }

    /// All orders ever placed, in placement order.
    pub fn placed_orders(&self) -> Vec<Order> {
        self.placed.lock().clone()
    }

    pub fn cancelled_orders(&self) -> Vec<OrderId> {
        self.cancelled.lock().clone()
    }

    /// Replace the stored positions for a market outcome, e.g. to simulate
    /// settlement between ticks.
    pub fn set_position(&self, market: &str, outcome: &str, size: Decimal) {
        let mut positions = self.positions.lock();
        positions.retain(|p| !(p.market_id.as_str() == market && p.outcome == outcome));
        let position =
            Position::try_new(MarketId::from(market), outcome, size, dec!(0.5), dec!(0.5))
                .expect("valid test position");
        positions.push(position);
    }
}

#[async_trait]
impl Exchange for MockExchange {
    fn id(&self) -> &'static str {
        "mock"
    }

    fn name(&self) -> &'static str {
        "Mock Exchange"
    }

    async fn fetch_markets(&self, filter: &MarketFilter) -> Result<Vec<Market>> {
        let mut markets: Vec<Market> = self.markets.lock().values().cloned().collect();
        if filter.active_only {
            markets.retain(Market::is_open);
        }
        if let Some(limit) = filter.limit {
            markets.truncate(limit);
        }
        Ok(markets)
    }

    async fn fetch_market(&self, market_id: &MarketId) -> Result<Market> {
        self.markets
            .lock()
            .get(market_id)
            .cloned()
            .ok_or_else(|| Error::MarketNotFound(market_id.to_string()))
    }

    async fn create_order(&self, request: &OrderRequest) -> Result<Order> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(Error::Exchange("create_order: scripted failure".into()));
        }
        let now = Utc::now();
        let order = Order {
            id: OrderId::from(format!("mock-{}", uuid::Uuid::new_v4())),
            market_id: request.market_id.clone(),
            outcome: request.outcome.clone(),
            side: request.side,
            price: request.price,
            size: request.size,
            filled: Decimal::ZERO,
            status: OrderStatus::Open,
            created_at: now,
            updated_at: now,
        };
        self.placed.lock().push(order.clone());
        Ok(order)
    }

    async fn cancel_order(
        &self,
        order_id: &OrderId,
        _market_id: Option<&MarketId>,
    ) -> Result<Order> {
        let mut placed = self.placed.lock();
        let Some(order) = placed.iter_mut().find(|o| o.id == *order_id) else {
            return Err(Error::Exchange(format!("unknown order {order_id}")));
        };
        order.status = OrderStatus::Cancelled;
        order.updated_at = Utc::now();
        self.cancelled.lock().push(order_id.clone());
        Ok(order.clone())
    }

    async fn fetch_order(&self, order_id: &OrderId, _market_id: Option<&MarketId>) -> Result<Order> {
        self.placed
            .lock()
            .iter()
            .find(|o| o.id == *order_id)
            .cloned()
            .ok_or_else(|| Error::Exchange(format!("unknown order {order_id}")))
    }

    async fn fetch_open_orders(&self, market_id: Option<&MarketId>) -> Result<Vec<Order>> {
        Ok(self
            .placed
            .lock()
            .iter()
            .filter(|o| o.is_open())
            .filter(|o| market_id.map_or(true, |m| o.market_id == *m))
            .cloned()
            .collect())
    }

    async fn fetch_positions(&self, market_id: Option<&MarketId>) -> Result<Vec<Position>> {
        self.position_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_positions.load(Ordering::SeqCst) {
            return Err(Error::Network("fetch_positions: scripted failure".into()));
        }
        Ok(self
            .positions
            .lock()
            .iter()
            .filter(|p| market_id.map_or(true, |m| p.market_id == *m))
            .cloned()
            .collect())
    }

    async fn fetch_balance(&self) -> Result<Balances> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_balance.load(Ordering::SeqCst) {
            return Err(Error::Network("fetch_balance: scripted failure".into()));
        }
        Ok(self.balances.lock().clone())
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            orderbook: self.has_orderbooks.load(Ordering::SeqCst),
            market_stream: self.has_market_stream.load(Ordering::SeqCst),
            user_stream: self.has_user_stream.load(Ordering::SeqCst),
            slug_lookup: false,
        }
    }

    async fn fetch_orderbook(&self, token_id: &TokenId) -> Result<Orderbook> {
        self.orderbook_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_orderbook.load(Ordering::SeqCst) {
            return Err(Error::Network("fetch_orderbook: scripted failure".into()));
        }
        self.orderbooks
            .lock()
            .get(token_id)
            .cloned()
            .ok_or_else(|| Error::Exchange(format!("no book for {token_id}")))
    }

    fn market_stream(&self) -> Option<Box<dyn MarketDataStream>> {
        self.market_stream.lock().take()
    }

    fn user_stream(&self) -> Option<Box<dyn UserDataStream>> {
        self.user_stream.lock().take()
    }
}
