//! Stateful client façade over an exchange adapter.
//!
//! Owns the rate-limited executor, account cache, order book store,
//! mid-price cache, market data feed, and fill tracker for one venue
//! connection. Strategies and callers talk to this type; the adapter stays
//! stateless.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::config::ClientConfig;
use crate::domain::{
    self, DeltaInfo, Market, MarketId, Nav, Order, OrderId, OrderSide, Position, TokenId,
};
use crate::error::{Error, Result};
use crate::exchange::{Balances, Exchange, MarketFilter, OrderRequest};

use super::account::AccountStateCache;
use super::books::OrderBookStore;
use super::executor::RetryingExecutor;
use super::feed::{FeedState, MarketDataFeed};
use super::mid_price::MidPriceCache;
use super::nav;
use super::tracker::{FillCallback, OrderTracker};

/// One venue connection with locally-consistent state.
///
/// All caches are owned by this instance; nothing is shared across clients.
pub struct ExchangeClient {
    exchange: Arc<dyn Exchange>,
    config: ClientConfig,
    executor: Arc<RetryingExecutor>,
    account: AccountStateCache,
    books: Arc<OrderBookStore>,
    mids: Arc<MidPriceCache>,
    feed: MarketDataFeed,
    tracker: Arc<OrderTracker>,
    /// Markets seen through this client, for token and price lookups.
    markets: RwLock<HashMap<MarketId, Market>>,
}

impl ExchangeClient {
    #[must_use]
    pub fn new(exchange: Arc<dyn Exchange>, config: ClientConfig) -> Self {
        let executor = Arc::new(RetryingExecutor::new(&config.rate_limit, config.retry.clone()));
        let account = AccountStateCache::new(
            Arc::clone(&exchange),
            Arc::clone(&executor),
            config.cache_ttl(),
        );
        let books = Arc::new(OrderBookStore::new());
        let mids = Arc::new(MidPriceCache::new());
        let feed = MarketDataFeed::new(
            Arc::clone(&exchange),
            config.feed.clone(),
            Arc::clone(&books),
            Arc::clone(&mids),
        );
        let tracker = Arc::new(OrderTracker::new(config.feed.clone()));
        Self {
            exchange,
            config,
            executor,
            account,
            books,
            mids,
            feed,
            tracker,
            markets: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn exchange_id(&self) -> &'static str {
        self.exchange.id()
    }

    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    #[must_use]
    pub fn books(&self) -> &Arc<OrderBookStore> {
        &self.books
    }

    #[must_use]
    pub fn mid_prices(&self) -> &Arc<MidPriceCache> {
        &self.mids
    }

    #[must_use]
    pub fn tracker(&self) -> &Arc<OrderTracker> {
        &self.tracker
    }

    // ------------------------------------------------------------------
    // Markets
    // ------------------------------------------------------------------

    pub async fn fetch_markets(&self, filter: &MarketFilter) -> Result<Vec<Market>> {
        let markets = self
            .executor
            .execute(|| {
                let exchange = Arc::clone(&self.exchange);
                let filter = filter.clone();
                async move { exchange.fetch_markets(&filter).await }
            })
            .await?;
        self.remember_markets(&markets);
        Ok(markets)
    }

    pub async fn get_market(&self, market_id: &MarketId) -> Result<Market> {
        let market = self
            .executor
            .execute(|| {
                let exchange = Arc::clone(&self.exchange);
                let market_id = market_id.clone();
                async move { exchange.fetch_market(&market_id).await }
            })
            .await?;
        self.remember_markets(std::slice::from_ref(&market));
        Ok(market)
    }

    /// All markets of an event, looked up by slug or URL. Venue-optional.
    pub async fn fetch_markets_by_slug(&self, slug: &str) -> Result<Vec<Market>> {
        let markets = self
            .executor
            .execute(|| {
                let exchange = Arc::clone(&self.exchange);
                let slug = slug.to_string();
                async move { exchange.fetch_markets_by_slug(&slug).await }
            })
            .await?;
        self.remember_markets(&markets);
        Ok(markets)
    }

    fn remember_markets(&self, markets: &[Market]) {
        let mut known = self.markets.write();
        for market in markets {
            known.insert(market.id().clone(), market.clone());
        }
    }

    /// A market previously seen through this client.
    #[must_use]
    pub fn known_market(&self, market_id: &MarketId) -> Option<Market> {
        self.markets.read().get(market_id).cloned()
    }

    // ------------------------------------------------------------------
    // Account state
    // ------------------------------------------------------------------

    /// Cached balance plus staleness flag. See [`AccountStateCache`].
    pub async fn get_balance(&self) -> Result<(Balances, bool)> {
        self.account.get_balance().await
    }

    /// Cached positions plus staleness flag, optionally per market.
    pub async fn get_positions(
        &self,
        market_id: Option<&MarketId>,
    ) -> Result<(Vec<Position>, bool)> {
        self.account.get_positions(market_id).await
    }

    /// Force a blocking refresh of balance and positions.
    pub async fn refresh(&self, market_id: Option<&MarketId>) -> Result<()> {
        self.account.refresh(market_id).await
    }

    /// Outcome -> net position size for one market.
    pub async fn positions_map(&self, market_id: &MarketId) -> Result<HashMap<String, Decimal>> {
        let (positions, _) = self.get_positions(Some(market_id)).await?;
        let mut map: HashMap<String, Decimal> = HashMap::new();
        for position in positions {
            *map.entry(position.outcome).or_insert(Decimal::ZERO) += position.size;
        }
        Ok(map)
    }

    /// Position delta across the outcomes of one market.
    pub async fn calculate_delta(&self, market_id: &MarketId) -> Result<DeltaInfo> {
        let positions = self.positions_map(market_id).await?;
        Ok(domain::calculate_delta(&positions))
    }

    /// Available cash (stablecoin balances).
    pub async fn cash_balance(&self) -> Result<Decimal> {
        let (balances, _) = self.get_balance().await?;
        Ok(nav::cash_balance(&balances))
    }

    // ------------------------------------------------------------------
    // Orders
    // ------------------------------------------------------------------

    /// Place an order and start tracking its fills.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidOrder`] if the price leaves [0, 1] or the size is not
    /// positive, before the venue is contacted.
    pub async fn create_order(&self, request: &OrderRequest) -> Result<Order> {
        if request.price < Decimal::ZERO || request.price > Decimal::ONE {
            return Err(Error::InvalidOrder(format!(
                "price {} outside [0, 1]",
                request.price
            )));
        }
        if request.size <= Decimal::ZERO {
            return Err(Error::InvalidOrder(format!(
                "size {} must be positive",
                request.size
            )));
        }

        let order = self
            .executor
            .execute(|| {
                let exchange = Arc::clone(&self.exchange);
                let request = request.clone();
                async move { exchange.create_order(&request).await }
            })
            .await?
            .validated()?;

        info!(
            order_id = %order.id,
            market = %order.market_id,
            outcome = %order.outcome,
            side = %order.side,
            price = %order.price,
            size = %order.size,
            "order placed"
        );
        self.tracker.track_order(order.clone());
        Ok(order)
    }

    pub async fn cancel_order(
        &self,
        order_id: &OrderId,
        market_id: Option<&MarketId>,
    ) -> Result<Order> {
        let order = self
            .executor
            .execute(|| {
                let exchange = Arc::clone(&self.exchange);
                let order_id = order_id.clone();
                let market_id = market_id.cloned();
                async move { exchange.cancel_order(&order_id, market_id.as_ref()).await }
            })
            .await?;
        self.tracker.untrack_order(order_id);
        Ok(order)
    }

    pub async fn fetch_order(
        &self,
        order_id: &OrderId,
        market_id: Option<&MarketId>,
    ) -> Result<Order> {
        let order = self
            .executor
            .execute(|| {
                let exchange = Arc::clone(&self.exchange);
                let order_id = order_id.clone();
                let market_id = market_id.cloned();
                async move { exchange.fetch_order(&order_id, market_id.as_ref()).await }
            })
            .await?;
        self.tracker.reconcile_order(&order);
        Ok(order)
    }

    /// Open orders, reconciled against the fill tracker so polled fill
    /// increments produce callbacks.
    pub async fn fetch_open_orders(&self, market_id: Option<&MarketId>) -> Result<Vec<Order>> {
        let orders = self
            .executor
            .execute(|| {
                let exchange = Arc::clone(&self.exchange);
                let market_id = market_id.cloned();
                async move { exchange.fetch_open_orders(market_id.as_ref()).await }
            })
            .await?;
        for order in &orders {
            self.tracker.reconcile_order(order);
        }
        Ok(orders)
    }

    /// Cancel every open order, optionally scoped to a market. Per-order
    /// failures are logged and skipped. Returns the number cancelled.
    pub async fn cancel_all_orders(&self, market_id: Option<&MarketId>) -> Result<usize> {
        let orders = self.fetch_open_orders(market_id).await?;
        let mut cancelled = 0;
        for order in orders {
            match self.cancel_order(&order.id, Some(&order.market_id)).await {
                Ok(_) => cancelled += 1,
                Err(err) => {
                    warn!(order_id = %order.id, error = %err, "cancel failed, skipping");
                }
            }
        }
        Ok(cancelled)
    }

    /// Register a fill callback.
    pub fn on_fill(&self, callback: FillCallback) {
        self.tracker.on_fill(callback);
    }

    // ------------------------------------------------------------------
    // Market data
    // ------------------------------------------------------------------

    /// Best bid/ask for a token: from the local book store when populated,
    /// else via a REST snapshot that also seeds the store.
    pub async fn best_bid_ask(&self, token_id: &TokenId) -> Result<(Option<Decimal>, Option<Decimal>)> {
        if self.books.has_data(token_id) {
            return Ok(self.books.best_bid_ask(token_id));
        }

        let book = self
            .executor
            .execute(|| {
                let exchange = Arc::clone(&self.exchange);
                let token_id = token_id.clone();
                async move { exchange.fetch_orderbook(&token_id).await }
            })
            .await?;
        let best = (book.best_bid(), book.best_ask());
        self.mids.update_from_book(token_id, &book);
        self.books.update(token_id.clone(), book);
        Ok(best)
    }

    /// Start the market data feed for a token set.
    pub async fn start_market_feed(&self, token_ids: Vec<TokenId>) -> Result<()> {
        self.feed.start(token_ids).await
    }

    #[must_use]
    pub fn feed_state(&self) -> FeedState {
        self.feed.state()
    }

    /// Start the fill push stream, when the venue has one.
    pub fn start_user_stream(&self) {
        if !self.exchange.capabilities().user_stream {
            return;
        }
        if let Some(stream) = self.exchange.user_stream() {
            self.tracker.start_user_stream(stream);
        }
    }

    // ------------------------------------------------------------------
    // NAV and liquidation
    // ------------------------------------------------------------------

    /// Net asset value over all positions, marked with the best available
    /// price per position.
    pub async fn calculate_nav(&self) -> Result<Nav> {
        let (balances, _) = self.get_balance().await?;
        let (positions, _) = self.get_positions(None).await?;

        let markets = self.markets.read().clone();
        let live_mid = |market_id: &MarketId, outcome: &str| {
            markets
                .get(market_id)
                .and_then(|market| market.token_for(outcome))
                .and_then(|token_id| self.mids.get(token_id))
        };
        let published = |market_id: &MarketId, outcome: &str| {
            markets
                .get(market_id)
                .and_then(|market| market.prices().get(outcome).copied())
        };
        Ok(nav::calculate(&positions, &balances, live_mid, published))
    }

    /// Sell off every positive position in a market at the best bid.
    ///
    /// Sizes are floored to whole shares; outcomes with no bid or a zero
    /// floored size are skipped with a warning. Per-outcome placement
    /// failures are logged and do not abort the rest. Returns the placed
    /// sell orders.
    pub async fn liquidate_positions(&self, market_id: &MarketId) -> Result<Vec<Order>> {
        let market = match self.known_market(market_id) {
            Some(market) => market,
            None => self.get_market(market_id).await?,
        };

        self.refresh(Some(market_id)).await?;
        let (positions, _) = self.get_positions(Some(market_id)).await?;

        let mut placed = Vec::new();
        for position in positions {
            let size = position.size.floor();
            if size <= Decimal::ZERO {
                continue;
            }

            let Some(token_id) = market.token_for(&position.outcome) else {
                warn!(outcome = %position.outcome, "no token for outcome, cannot liquidate");
                continue;
            };
            let bid = match self.best_bid_ask(token_id).await {
                Ok((bid, _)) => bid,
                Err(err) => {
                    warn!(outcome = %position.outcome, error = %err, "book fetch failed, skipping");
                    continue;
                }
            };
            let Some(bid) = bid else {
                warn!(outcome = %position.outcome, "no bid available, skipping liquidation");
                continue;
            };

            let price = domain::round_to_tick_size(bid, market.tick_size())?;
            let request = OrderRequest {
                market_id: market_id.clone(),
                outcome: position.outcome.clone(),
                side: OrderSide::Sell,
                price,
                size,
                token_id: Some(token_id.clone()),
            };
            match self.create_order(&request).await {
                Ok(order) => placed.push(order),
                Err(err) => {
                    warn!(outcome = %position.outcome, error = %err, "liquidation order failed");
                }
            }
        }
        Ok(placed)
    }

    /// Stop background workers (feed and user stream). Idempotent; failures
    /// to stop in time are logged, never raised.
    pub async fn stop(&self) {
        self.feed.stop().await;
        self.tracker.stop().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Orderbook, PriceLevel};
    use crate::testkit::domain::binary_market;
    use crate::testkit::exchange::MockExchange;
    use rust_decimal_macros::dec;

    fn client(exchange: Arc<MockExchange>) -> ExchangeClient {
        let mut config = ClientConfig::default();
        config.retry.max_retries = 0;
        config.retry.base_delay_ms = 1;
        ExchangeClient::new(exchange, config)
    }

    fn buy_request(price: Decimal, size: Decimal) -> OrderRequest {
        OrderRequest {
            market_id: MarketId::from("m1"),
            outcome: "Yes".into(),
            side: OrderSide::Buy,
            price,
            size,
            token_id: Some(TokenId::from("m1-yes")),
        }
    }

    #[tokio::test]
    async fn test_create_order_validates_price_range() {
        let client = client(Arc::new(MockExchange::new()));
        let err = client.create_order(&buy_request(dec!(1.5), dec!(5))).await;
        assert!(matches!(err, Err(Error::InvalidOrder(_))));
    }

    #[tokio::test]
    async fn test_create_order_tracks_fills() {
        let exchange = Arc::new(MockExchange::new());
        let client = client(Arc::clone(&exchange));

        let order = client
            .create_order(&buy_request(dec!(0.50), dec!(5)))
            .await
            .unwrap();
        assert_eq!(client.tracker().tracked_count(), 1);
        assert_eq!(exchange.placed_orders().len(), 1);

        client.cancel_order(&order.id, None).await.unwrap();
        assert_eq!(client.tracker().tracked_count(), 0);
    }

    #[tokio::test]
    async fn test_best_bid_ask_prefers_local_books() {
        let exchange = Arc::new(MockExchange::new());
        let client = client(Arc::clone(&exchange));
        let token = TokenId::from("T1");

        client.books().update(
            token.clone(),
            Orderbook::from_levels(
                vec![PriceLevel::new(dec!(0.60), dec!(10))],
                vec![PriceLevel::new(dec!(0.62), dec!(5))],
            ),
        );

        let (bid, ask) = client.best_bid_ask(&token).await.unwrap();
        assert_eq!((bid, ask), (Some(dec!(0.60)), Some(dec!(0.62))));
        assert_eq!(exchange.orderbook_calls(), 0);
    }

    #[tokio::test]
    async fn test_best_bid_ask_rest_fallback_seeds_store() {
        let exchange = Arc::new(MockExchange::new().with_orderbook(
            "T1",
            Orderbook::from_levels(
                vec![PriceLevel::new(dec!(0.40), dec!(10))],
                vec![PriceLevel::new(dec!(0.44), dec!(5))],
            ),
        ));
        let client = client(Arc::clone(&exchange));
        let token = TokenId::from("T1");

        let (bid, ask) = client.best_bid_ask(&token).await.unwrap();
        assert_eq!((bid, ask), (Some(dec!(0.40)), Some(dec!(0.44))));
        assert_eq!(exchange.orderbook_calls(), 1);
        assert!(client.books().has_data(&token));

        // Second call is served locally.
        client.best_bid_ask(&token).await.unwrap();
        assert_eq!(exchange.orderbook_calls(), 1);
    }

    #[tokio::test]
    async fn test_liquidation_noop_without_positive_positions() {
        let exchange = Arc::new(
            MockExchange::new()
                .with_market(binary_market("m1"))
                .with_position("m1", "Yes", dec!(0)),
        );
        let client = client(Arc::clone(&exchange));

        let placed = client
            .liquidate_positions(&MarketId::from("m1"))
            .await
            .unwrap();
        assert!(placed.is_empty());
        assert!(exchange.placed_orders().is_empty());
    }

    #[tokio::test]
    async fn test_liquidation_sells_floored_size_at_bid() {
        let exchange = Arc::new(
            MockExchange::new()
                .with_market(binary_market("m1"))
                .with_position("m1", "Yes", dec!(7.8))
                .with_orderbook(
                    "m1-yes",
                    Orderbook::from_levels(
                        vec![PriceLevel::new(dec!(0.55), dec!(20))],
                        vec![PriceLevel::new(dec!(0.57), dec!(20))],
                    ),
                ),
        );
        let client = client(Arc::clone(&exchange));

        let placed = client
            .liquidate_positions(&MarketId::from("m1"))
            .await
            .unwrap();
        assert_eq!(placed.len(), 1);
        assert_eq!(placed[0].side, OrderSide::Sell);
        assert_eq!(placed[0].size, dec!(7));
        assert_eq!(placed[0].price, dec!(0.55));
    }

    #[tokio::test]
    async fn test_positions_map_aggregates_by_outcome() {
        let exchange = Arc::new(
            MockExchange::new()
                .with_position("m1", "Yes", dec!(10))
                .with_position("m1", "No", dec!(3)),
        );
        let client = client(exchange);

        let map = client.positions_map(&MarketId::from("m1")).await.unwrap();
        assert_eq!(map.get("Yes"), Some(&dec!(10)));
        assert_eq!(map.get("No"), Some(&dec!(3)));

        let delta = client.calculate_delta(&MarketId::from("m1")).await.unwrap();
        assert_eq!(delta.delta, dec!(7));
        assert_eq!(delta.max_outcome.as_deref(), Some("Yes"));
    }

    #[tokio::test]
    async fn test_nav_uses_live_mid_over_published() {
        let exchange = Arc::new(
            MockExchange::new()
                .with_balance("USDC", dec!(100))
                .with_market(binary_market("m1"))
                .with_position("m1", "Yes", dec!(10)),
        );
        let client = client(Arc::clone(&exchange));

        client.get_market(&MarketId::from("m1")).await.unwrap();
        client.mid_prices().set(TokenId::from("m1-yes"), dec!(0.65));

        let nav = client.calculate_nav().await.unwrap();
        assert_eq!(nav.cash, dec!(100));
        assert_eq!(nav.positions_value, dec!(6.5));
        assert_eq!(nav.nav, dec!(106.5));
    }
}
