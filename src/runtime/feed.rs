//! Market data feed.
//!
//! Keeps the [`OrderBookStore`] and [`MidPriceCache`] current for a set of
//! tokens. Prefers the venue's push stream; when the venue has none or the
//! connection cannot be established within the configured timeout, falls back
//! to REST polling for the life of the feed. Push-transport loss after a
//! successful start is handled by reconnecting with bounded exponential
//! backoff, never by switching to polling.

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::config::FeedConfig;
use crate::domain::TokenId;
use crate::error::Result;
use crate::exchange::{Exchange, MarketDataStream, MarketEvent};

use super::books::OrderBookStore;
use super::mid_price::MidPriceCache;

/// Observable feed lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    /// Not started.
    Disconnected,
    /// Push connection attempt in progress.
    Connecting,
    /// Delivering data, via push or polling.
    Connected,
    /// Push transport lost; backoff reconnect in progress.
    Reconnecting,
    /// Stopped for good.
    Closed,
}

/// Background worker keeping local books current for a token set.
pub struct MarketDataFeed {
    exchange: Arc<dyn Exchange>,
    config: FeedConfig,
    books: Arc<OrderBookStore>,
    mids: Arc<MidPriceCache>,
    state: Arc<RwLock<FeedState>>,
    stop_tx: Mutex<Option<watch::Sender<bool>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl MarketDataFeed {
    #[must_use]
    pub fn new(
        exchange: Arc<dyn Exchange>,
        config: FeedConfig,
        books: Arc<OrderBookStore>,
        mids: Arc<MidPriceCache>,
    ) -> Self {
        Self {
            exchange,
            config,
            books,
            mids,
            state: Arc::new(RwLock::new(FeedState::Disconnected)),
            stop_tx: Mutex::new(None),
            worker: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn state(&self) -> FeedState {
        *self.state.read()
    }

    /// Start the feed for the given tokens.
    ///
    /// Seeds the book store with REST snapshots, then either hands the
    /// connected push stream to a background worker or starts the polling
    /// worker. The transport decision is permanent for this feed instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the feed is already running.
    pub async fn start(&self, token_ids: Vec<TokenId>) -> Result<()> {
        {
            let mut state = self.state.write();
            if matches!(*state, FeedState::Connecting | FeedState::Connected) {
                return Err(crate::error::Error::Exchange(
                    "market data feed already started".into(),
                ));
            }
            *state = FeedState::Connecting;
        }

        if self.exchange.capabilities().orderbook {
            self.seed_snapshots(&token_ids).await;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        *self.stop_tx.lock() = Some(stop_tx);

        let handle = match self.connect_push(&token_ids).await {
            Some(stream) => {
                info!(
                    exchange = stream.exchange_name(),
                    tokens = token_ids.len(),
                    "market data feed connected via push stream"
                );
                *self.state.write() = FeedState::Connected;
                tokio::spawn(push_worker(
                    stream,
                    token_ids,
                    self.config.clone(),
                    Arc::clone(&self.books),
                    Arc::clone(&self.mids),
                    Arc::clone(&self.state),
                    stop_rx,
                ))
            }
            None => {
                info!(
                    exchange = self.exchange.id(),
                    tokens = token_ids.len(),
                    interval_ms = self.config.poll_interval_ms,
                    "market data feed running in polling mode"
                );
                *self.state.write() = FeedState::Connected;
                tokio::spawn(poll_worker(
                    Arc::clone(&self.exchange),
                    token_ids,
                    self.config.clone(),
                    Arc::clone(&self.books),
                    Arc::clone(&self.mids),
                    Arc::clone(&self.state),
                    stop_rx,
                ))
            }
        };
        *self.worker.lock() = Some(handle);
        Ok(())
    }

    /// Stop the feed. Idempotent; waits up to `stop_timeout` for the worker.
    pub async fn stop(&self) {
        if let Some(tx) = self.stop_tx.lock().take() {
            let _ = tx.send(true);
        }
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            let abort = handle.abort_handle();
            if timeout(self.config.stop_timeout(), handle).await.is_err() {
                warn!("market data feed worker did not stop in time, aborting");
                abort.abort();
            }
        }
        *self.state.write() = FeedState::Closed;
    }

    /// Fetch initial snapshots for all tokens, bounded by
    /// `snapshot_concurrency`. Individual failures are logged and skipped;
    /// the first push/poll update will fill the gap.
    async fn seed_snapshots(&self, token_ids: &[TokenId]) {
        let fetches = token_ids.iter().cloned().map(|token_id| {
            let exchange = Arc::clone(&self.exchange);
            async move {
                let book = exchange.fetch_orderbook(&token_id).await;
                (token_id, book)
            }
        });

        let mut results = stream::iter(fetches).buffer_unordered(self.config.snapshot_concurrency);
        while let Some((token_id, result)) = results.next().await {
            match result {
                Ok(book) => {
                    self.mids.update_from_book(&token_id, &book);
                    self.books.update(token_id, book);
                }
                Err(err) => {
                    warn!(token = %token_id, error = %err, "initial snapshot fetch failed");
                }
            }
        }
    }

    /// Connect and subscribe the venue's push stream within the configured
    /// timeout. `None` means the feed should poll instead.
    async fn connect_push(&self, token_ids: &[TokenId]) -> Option<Box<dyn MarketDataStream>> {
        if !self.exchange.capabilities().market_stream {
            return None;
        }
        let mut stream = self.exchange.market_stream()?;

        let attempt = async {
            stream.connect().await?;
            stream.subscribe(token_ids).await
        };
        match timeout(self.config.connect_timeout(), attempt).await {
            Ok(Ok(())) => Some(stream),
            Ok(Err(err)) => {
                warn!(error = %err, "push stream connection failed, falling back to polling");
                None
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.config.connect_timeout_ms,
                    "push stream connection timed out, falling back to polling"
                );
                None
            }
        }
    }
}

/// Consume push events until stopped, reconnecting with bounded backoff on
/// transport loss.
async fn push_worker(
    mut stream: Box<dyn MarketDataStream>,
    token_ids: Vec<TokenId>,
    config: FeedConfig,
    books: Arc<OrderBookStore>,
    mids: Arc<MidPriceCache>,
    state: Arc<RwLock<FeedState>>,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut delay_ms = config.reconnect_initial_delay_ms;

    loop {
        let event = tokio::select! {
            _ = stop_rx.changed() => break,
            event = stream.next_event() => event,
        };

        match event {
            Some(MarketEvent::BookSnapshot { token_id, book })
            | Some(MarketEvent::BookUpdate { token_id, book }) => {
                mids.update_from_book(&token_id, &book);
                books.update(token_id, book);
                delay_ms = config.reconnect_initial_delay_ms;
            }
            Some(MarketEvent::Connected) => {
                debug!("push stream connected");
            }
            Some(MarketEvent::Disconnected { reason }) => {
                warn!(reason = %reason, "push stream lost, reconnecting");
                *state.write() = FeedState::Reconnecting;
                if !reconnect(&mut stream, &token_ids, &mut delay_ms, &config, &mut stop_rx).await {
                    break;
                }
                *state.write() = FeedState::Connected;
            }
            None => {
                warn!("push stream ended, reconnecting");
                *state.write() = FeedState::Reconnecting;
                if !reconnect(&mut stream, &token_ids, &mut delay_ms, &config, &mut stop_rx).await {
                    break;
                }
                *state.write() = FeedState::Connected;
            }
        }
    }
}

/// Backoff reconnect loop. Returns false when a stop was requested.
async fn reconnect(
    stream: &mut Box<dyn MarketDataStream>,
    token_ids: &[TokenId],
    delay_ms: &mut u64,
    config: &FeedConfig,
    stop_rx: &mut watch::Receiver<bool>,
) -> bool {
    loop {
        let delay = Duration::from_millis(*delay_ms);
        *delay_ms = delay_ms
            .saturating_mul(2)
            .min(config.reconnect_max_delay_ms);

        tokio::select! {
            _ = stop_rx.changed() => return false,
            () = sleep(delay) => {}
        }

        let attempt = async {
            stream.connect().await?;
            stream.subscribe(token_ids).await
        };
        match attempt.await {
            Ok(()) => {
                info!("push stream reconnected");
                *delay_ms = config.reconnect_initial_delay_ms;
                return true;
            }
            Err(err) => {
                warn!(error = %err, next_delay_ms = *delay_ms, "reconnect attempt failed");
            }
        }
    }
}

/// Poll REST snapshots on a fixed interval until stopped.
async fn poll_worker(
    exchange: Arc<dyn Exchange>,
    token_ids: Vec<TokenId>,
    config: FeedConfig,
    books: Arc<OrderBookStore>,
    mids: Arc<MidPriceCache>,
    _state: Arc<RwLock<FeedState>>,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(config.poll_interval());
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = stop_rx.changed() => break,
            _ = ticker.tick() => {}
        }

        let fetches = token_ids.iter().cloned().map(|token_id| {
            let exchange = Arc::clone(&exchange);
            async move {
                let book = exchange.fetch_orderbook(&token_id).await;
                (token_id, book)
            }
        });
        let mut results = stream::iter(fetches).buffer_unordered(config.snapshot_concurrency);
        while let Some((token_id, result)) = results.next().await {
            match result {
                Ok(book) => {
                    mids.update_from_book(&token_id, &book);
                    books.update(token_id, book);
                }
                Err(err) => {
                    debug!(token = %token_id, error = %err, "poll fetch failed");
                }
            }
        }
    }
}
