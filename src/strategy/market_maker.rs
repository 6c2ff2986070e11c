//! Tick-driven market-making strategy.
//!
//! Quotes both sides of every outcome of one market at the current best bid
//! and ask, keeping position within a cap and suspending quotes on an
//! outcome whose position dominates the book (delta gate). Per-outcome
//! placement or cancellation failures are logged and never abort the tick
//! loop; shutdown always runs the full cleanup sequence.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use rust_decimal::Decimal;
use tokio::sync::watch;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::config::StrategyConfig;
use crate::domain::{
    self, DeltaInfo, Market, MarketId, Order, OrderSide, TokenId,
};
use crate::error::{ConfigError, Error, Result};
use crate::exchange::OrderRequest;
use crate::runtime::ExchangeClient;

use super::state::{StrategyPhase, StrategyState};

/// Strategy parameters with exact decimal arithmetic.
#[derive(Debug, Clone)]
pub struct StrategyParams {
    pub max_position: Decimal,
    pub order_size: Decimal,
    pub max_delta: Decimal,
    pub price_tolerance: Decimal,
    pub tick_interval: Duration,
    pub settle_interval: Duration,
}

impl TryFrom<&StrategyConfig> for StrategyParams {
    type Error = ConfigError;

    fn try_from(config: &StrategyConfig) -> std::result::Result<Self, ConfigError> {
        Ok(Self {
            max_position: to_decimal(config.max_position, "strategy.max_position")?,
            order_size: to_decimal(config.order_size, "strategy.order_size")?,
            max_delta: to_decimal(config.max_delta, "strategy.max_delta")?,
            price_tolerance: to_decimal(config.price_tolerance, "strategy.price_tolerance")?,
            tick_interval: Duration::from_secs_f64(config.tick_interval_secs),
            settle_interval: Duration::from_secs_f64(config.settle_interval_secs),
        })
    }
}

fn to_decimal(value: f64, field: &'static str) -> std::result::Result<Decimal, ConfigError> {
    Decimal::from_f64_retain(value).ok_or(ConfigError::InvalidValue {
        field,
        reason: format!("{value} is not representable as a decimal"),
    })
}

/// Market maker for one market on one client.
pub struct MarketMakingStrategy {
    client: Arc<ExchangeClient>,
    market_id: MarketId,
    params: StrategyParams,
    market: RwLock<Option<Market>>,
    state: RwLock<StrategyState>,
    stop_tx: watch::Sender<bool>,
}

impl MarketMakingStrategy {
    /// Build a strategy from the client's configured parameters.
    ///
    /// # Errors
    ///
    /// Returns a config error when a strategy parameter cannot be expressed
    /// as a decimal.
    pub fn new(client: Arc<ExchangeClient>, market_id: MarketId) -> Result<Self> {
        let params = StrategyParams::try_from(&client.config().strategy)?;
        let (stop_tx, _) = watch::channel(false);
        Ok(Self {
            client,
            market_id,
            params,
            market: RwLock::new(None),
            state: RwLock::new(StrategyState::new()),
            stop_tx,
        })
    }

    #[must_use]
    pub fn phase(&self) -> StrategyPhase {
        self.state.read().phase
    }

    /// Snapshot of the last tick's observable state.
    #[must_use]
    pub fn state(&self) -> StrategyState {
        self.state.read().clone()
    }

    /// Request termination. The run loop finishes its current tick and then
    /// executes the full cleanup sequence.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    fn set_phase(&self, phase: StrategyPhase) {
        self.state.write().phase = phase;
        debug!(?phase, market = %self.market_id, "strategy phase change");
    }

    /// Run until stopped or, when given, until `duration` elapses. Cleanup
    /// runs unconditionally once the loop exits.
    ///
    /// # Errors
    ///
    /// Only setup failures are returned; tick and cleanup failures are
    /// logged and absorbed.
    pub async fn run(&self, duration: Option<Duration>) -> Result<()> {
        if let Err(err) = self.setup().await {
            warn!(error = %err, market = %self.market_id, "strategy setup failed");
            self.client.stop().await;
            self.set_phase(StrategyPhase::Terminated);
            return Err(err);
        }

        self.set_phase(StrategyPhase::Running);
        let deadline = duration.map(|d| Instant::now() + d);
        let mut stop_rx = self.stop_tx.subscribe();

        loop {
            if *stop_rx.borrow() {
                break;
            }
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    info!(market = %self.market_id, "run duration elapsed");
                    break;
                }
            }

            if let Err(err) = self.tick().await {
                warn!(error = %err, market = %self.market_id, "tick failed, continuing");
            }

            tokio::select! {
                _ = stop_rx.changed() => break,
                () = sleep(self.params.tick_interval) => {}
            }
        }

        self.shutdown().await;
        Ok(())
    }

    /// Resolve the market, start market data, and load initial state.
    async fn setup(&self) -> Result<()> {
        self.set_phase(StrategyPhase::Setup);

        let market = self.client.get_market(&self.market_id).await?;
        if market.outcome_tokens().is_empty() {
            return Err(Error::MarketNotFound(format!(
                "{}: no resolved outcome tokens",
                self.market_id
            )));
        }
        info!(
            market = %self.market_id,
            question = market.question(),
            outcomes = market.outcomes().len(),
            "strategy setup"
        );

        self.client.start_market_feed(market.token_ids()).await?;
        self.client.start_user_stream();
        self.client.tracker().log_fills();
        self.client.refresh(Some(&self.market_id)).await?;

        *self.market.write() = Some(market);
        Ok(())
    }

    /// One quoting pass over every outcome.
    async fn tick(&self) -> Result<()> {
        let market = self
            .market
            .read()
            .clone()
            .ok_or_else(|| Error::Exchange("tick before setup".into()))?;

        let mut positions = self.client.positions_map(&self.market_id).await?;
        // Unheld outcomes count as zero so the delta spans the full outcome set.
        for outcome in market.outcomes() {
            positions.entry(outcome.clone()).or_insert(Decimal::ZERO);
        }
        let open_orders = self.client.fetch_open_orders(Some(&self.market_id)).await?;
        let delta = domain::calculate_delta(&positions);
        let cash = self.client.cash_balance().await?;
        let nav = self.client.calculate_nav().await?;

        {
            let mut state = self.state.write();
            state.positions = positions.clone();
            state.delta = Some(delta.clone());
            state.open_orders = open_orders.len();
            state.nav = nav.nav;
            state.cash = cash;
            state.ticks += 1;
        }
        debug!(
            market = %self.market_id,
            delta = %delta.delta,
            open_orders = open_orders.len(),
            cash = %cash,
            nav = %nav.nav,
            "tick"
        );

        for outcome in market.outcomes() {
            if let Err(err) = self
                .quote_outcome(&market, outcome, &positions, &open_orders, &delta, cash)
                .await
            {
                warn!(outcome = %outcome, error = %err, "quoting failed for outcome");
            }
        }
        Ok(())
    }

    /// Maintain one buy and one sell quote for a single outcome.
    async fn quote_outcome(
        &self,
        market: &Market,
        outcome: &str,
        positions: &HashMap<String, Decimal>,
        open_orders: &[Order],
        delta: &DeltaInfo,
        cash: Decimal,
    ) -> Result<()> {
        let Some(token_id) = market.token_for(outcome) else {
            debug!(outcome = %outcome, "no token resolved, skipping");
            return Ok(());
        };

        let (bid, ask) = self.client.best_bid_ask(token_id).await?;
        let (Some(bid), Some(ask)) = (bid, ask) else {
            debug!(outcome = %outcome, "book not two-sided, skipping");
            return Ok(());
        };
        let bid = domain::round_to_tick_size(bid, market.tick_size())?;
        let ask = domain::round_to_tick_size(ask, market.tick_size())?;
        if bid >= ask {
            debug!(outcome = %outcome, bid = %bid, ask = %ask, "crossed market, skipping");
            return Ok(());
        }

        let position = positions.get(outcome).copied().unwrap_or(Decimal::ZERO);

        // Suspend both sides for the dominant outcome of an unbalanced book.
        if delta.delta > self.params.max_delta && position == delta.max_position {
            info!(
                outcome = %outcome,
                delta = %delta.delta,
                position = %position,
                "delta cap exceeded on dominant outcome, suspending quotes"
            );
            return Ok(());
        }

        self.quote_buy(market, outcome, token_id, bid, position, cash, open_orders)
            .await;
        self.quote_sell(market, outcome, token_id, ask, position, open_orders)
            .await;
        Ok(())
    }

    async fn quote_buy(
        &self,
        market: &Market,
        outcome: &str,
        token_id: &TokenId,
        bid: Decimal,
        position: Decimal,
        cash: Decimal,
        open_orders: &[Order],
    ) {
        let buys: Vec<&Order> = open_orders
            .iter()
            .filter(|o| o.outcome == outcome && o.side == OrderSide::Buy && o.is_open())
            .collect();
        if buys
            .iter()
            .any(|o| o.is_at_price(bid, self.params.price_tolerance))
        {
            return;
        }

        self.cancel_stale(&buys).await;

        if position + self.params.order_size > self.params.max_position {
            debug!(outcome = %outcome, position = %position, "position cap reached, no buy");
            return;
        }
        if cash < self.params.order_size {
            debug!(outcome = %outcome, cash = %cash, "insufficient cash, no buy");
            return;
        }

        let request = OrderRequest {
            market_id: market.id().clone(),
            outcome: outcome.to_string(),
            side: OrderSide::Buy,
            price: bid,
            size: self.params.order_size,
            token_id: Some(token_id.clone()),
        };
        if let Err(err) = self.client.create_order(&request).await {
            warn!(outcome = %outcome, error = %err, "buy placement failed");
        }
    }

    async fn quote_sell(
        &self,
        market: &Market,
        outcome: &str,
        token_id: &TokenId,
        ask: Decimal,
        position: Decimal,
        open_orders: &[Order],
    ) {
        if position < self.params.order_size {
            return;
        }

        let sells: Vec<&Order> = open_orders
            .iter()
            .filter(|o| o.outcome == outcome && o.side == OrderSide::Sell && o.is_open())
            .collect();
        if sells
            .iter()
            .any(|o| o.is_at_price(ask, self.params.price_tolerance))
        {
            return;
        }

        self.cancel_stale(&sells).await;

        let request = OrderRequest {
            market_id: market.id().clone(),
            outcome: outcome.to_string(),
            side: OrderSide::Sell,
            price: ask,
            size: self.params.order_size,
            token_id: Some(token_id.clone()),
        };
        if let Err(err) = self.client.create_order(&request).await {
            warn!(outcome = %outcome, error = %err, "sell placement failed");
        }
    }

    async fn cancel_stale(&self, orders: &[&Order]) {
        for order in orders {
            if let Err(err) = self
                .client
                .cancel_order(&order.id, Some(&order.market_id))
                .await
            {
                warn!(order_id = %order.id, error = %err, "stale order cancel failed");
            }
        }
    }

    /// Cleanup sequence: cancel all orders, liquidate positions, wait for
    /// settlement, verify, release resources. Failures are logged, never
    /// raised.
    async fn shutdown(&self) {
        self.set_phase(StrategyPhase::Stopping);
        info!(market = %self.market_id, "strategy stopping");

        match self.client.cancel_all_orders(Some(&self.market_id)).await {
            Ok(cancelled) => info!(cancelled, "open orders cancelled"),
            Err(err) => warn!(error = %err, "cancel-all failed during shutdown"),
        }

        match self.client.liquidate_positions(&self.market_id).await {
            Ok(placed) => info!(orders = placed.len(), "liquidation orders placed"),
            Err(err) => warn!(error = %err, "liquidation failed during shutdown"),
        }

        sleep(self.params.settle_interval).await;
        self.verify_flat().await;

        self.client.stop().await;
        self.set_phase(StrategyPhase::Terminated);
        info!(market = %self.market_id, "strategy terminated");
    }

    /// Post-liquidation check. Any residual order or positive position is a
    /// warning, not a failure; sub-share remainders that liquidation cannot
    /// sell still get reported.
    async fn verify_flat(&self) {
        match self.client.fetch_open_orders(Some(&self.market_id)).await {
            Ok(orders) if !orders.is_empty() => {
                warn!(remaining = orders.len(), "open orders remain after shutdown");
            }
            Ok(_) => {}
            Err(err) => warn!(error = %err, "open-order check failed after shutdown"),
        }

        match self.client.get_positions(Some(&self.market_id)).await {
            Ok((positions, _)) => {
                let residual: Vec<_> = positions
                    .iter()
                    .filter(|p| p.size > Decimal::ZERO)
                    .collect();
                if !residual.is_empty() {
                    warn!(remaining = residual.len(), "positions remain after shutdown");
                }
            }
            Err(err) => warn!(error = %err, "position check failed after shutdown"),
        }
    }
}
