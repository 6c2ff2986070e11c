//! Mock push-stream implementations for testing.
//!
//! [`ScriptedStream`] and [`ScriptedUserStream`] replay pre-loaded
//! connect/subscribe results and event queues. An exhausted event queue
//! parks the caller forever, mimicking a healthy but quiet connection; an
//! explicit `None` entry signals stream closure.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::TokenId;
use crate::error::Result;
use crate::exchange::{MarketDataStream, MarketEvent, Trade, UserDataStream};

/// A market data stream with scripted connect/subscribe results and a fixed
/// event queue.
///
/// Each `connect()`/`subscribe()` call pops the next scripted result,
/// defaulting to `Ok(())` when exhausted.
pub struct ScriptedStream {
    connect_results: VecDeque<Result<()>>,
    subscribe_results: VecDeque<Result<()>>,
    events: VecDeque<Option<MarketEvent>>,
    connect_count: Arc<AtomicU32>,
    subscribe_count: Arc<AtomicU32>,
}

impl ScriptedStream {
    pub fn new() -> Self {
        Self {
            connect_results: VecDeque::new(),
            subscribe_results: VecDeque::new(),
            events: VecDeque::new(),
            connect_count: Arc::new(AtomicU32::new(0)),
            subscribe_count: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn with_connect_results(mut self, results: Vec<Result<()>>) -> Self {
        self.connect_results = results.into();
        self
    }

    pub fn with_subscribe_results(mut self, results: Vec<Result<()>>) -> Self {
        self.subscribe_results = results.into();
        self
    }

    pub fn with_events(mut self, events: Vec<Option<MarketEvent>>) -> Self {
        self.events = events.into();
        self
    }

    /// Shared counters for asserting connect/subscribe call counts.
    pub fn counts(&self) -> (Arc<AtomicU32>, Arc<AtomicU32>) {
        (self.connect_count.clone(), self.subscribe_count.clone())
    }
}

impl Default for ScriptedStream {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketDataStream for ScriptedStream {
    async fn connect(&mut self) -> Result<()> {
        self.connect_count.fetch_add(1, Ordering::SeqCst);
        self.connect_results.pop_front().unwrap_or(Ok(()))
    }

    async fn subscribe(&mut self, _token_ids: &[TokenId]) -> Result<()> {
        self.subscribe_count.fetch_add(1, Ordering::SeqCst);
        self.subscribe_results.pop_front().unwrap_or(Ok(()))
    }

    async fn next_event(&mut self) -> Option<MarketEvent> {
        match self.events.pop_front() {
            Some(event) => event,
            // Quiet but healthy connection.
            None => std::future::pending().await,
        }
    }

    fn exchange_name(&self) -> &'static str {
        "mock"
    }
}

/// A user data stream replaying a fixed trade list, then going quiet.
pub struct ScriptedUserStream {
    connect_results: VecDeque<Result<()>>,
    trades: VecDeque<Trade>,
}

impl ScriptedUserStream {
    pub fn new() -> Self {
        Self {
            connect_results: VecDeque::new(),
            trades: VecDeque::new(),
        }
    }

    pub fn with_connect_results(mut self, results: Vec<Result<()>>) -> Self {
        self.connect_results = results.into();
        self
    }

    pub fn with_trades(mut self, trades: Vec<Trade>) -> Self {
        self.trades = trades.into();
        self
    }
}

impl Default for ScriptedUserStream {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserDataStream for ScriptedUserStream {
    async fn connect(&mut self) -> Result<()> {
        self.connect_results.pop_front().unwrap_or(Ok(()))
    }

    async fn next_trade(&mut self) -> Option<Trade> {
        match self.trades.pop_front() {
            Some(trade) => Some(trade),
            None => std::future::pending().await,
        }
    }

    fn exchange_name(&self) -> &'static str {
        "mock"
    }
}
