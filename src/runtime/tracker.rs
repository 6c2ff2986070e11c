//! Fill tracking.
//!
//! Observes trades from the venue's user channel (push) or from open-order
//! reconciliation (poll), and notifies registered callbacks exactly once per
//! observed increase in an order's filled quantity. A panicking callback is
//! caught and logged; it never breaks the tracking loop.

use std::collections::{HashMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::config::FeedConfig;
use crate::domain::{Order, OrderId, OrderStatus};
use crate::exchange::{Trade, UserDataStream};

/// What a fill event represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillEventKind {
    /// The order is now completely filled.
    Fill,
    /// The order gained filled quantity but is not yet complete.
    PartialFill,
}

/// Callback invoked on every observed fill increment.
pub type FillCallback = Box<dyn Fn(FillEventKind, &Order, Decimal) + Send + Sync>;

struct TrackedOrder {
    order: Order,
    /// Filled quantity already reported to callbacks.
    observed_filled: Decimal,
}

/// Tracks orders of interest and dispatches deduplicated fill events.
pub struct OrderTracker {
    tracked: RwLock<HashMap<OrderId, TrackedOrder>>,
    seen_trades: Mutex<HashSet<String>>,
    callbacks: RwLock<Vec<FillCallback>>,
    stop_tx: Mutex<Option<watch::Sender<bool>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    config: FeedConfig,
}

impl OrderTracker {
    #[must_use]
    pub fn new(config: FeedConfig) -> Self {
        Self {
            tracked: RwLock::new(HashMap::new()),
            seen_trades: Mutex::new(HashSet::new()),
            callbacks: RwLock::new(Vec::new()),
            stop_tx: Mutex::new(None),
            worker: Mutex::new(None),
            config,
        }
    }

    /// Register an order of interest. Its current filled quantity becomes the
    /// baseline; only increases beyond it produce events.
    pub fn track_order(&self, order: Order) {
        let observed_filled = order.filled;
        self.tracked.write().insert(
            order.id.clone(),
            TrackedOrder {
                order,
                observed_filled,
            },
        );
    }

    /// Forget an order. Trades for it are subsequently ignored.
    pub fn untrack_order(&self, order_id: &OrderId) {
        self.tracked.write().remove(order_id);
    }

    #[must_use]
    pub fn tracked_count(&self) -> usize {
        self.tracked.read().len()
    }

    /// Register a fill callback.
    pub fn on_fill(&self, callback: FillCallback) {
        self.callbacks.write().push(callback);
    }

    /// Register a callback that logs every fill.
    pub fn log_fills(&self) {
        self.on_fill(Box::new(|kind, order, fill_size| {
            info!(
                order_id = %order.id,
                outcome = %order.outcome,
                side = %order.side,
                kind = ?kind,
                fill_size = %fill_size,
                filled = %order.filled,
                size = %order.size,
                "order fill"
            );
        }));
    }

    /// Process a trade from the user channel.
    ///
    /// Duplicate trade ids and trades for untracked orders are ignored. The
    /// fill increment is clamped so the tracked order never reports
    /// filled > size.
    pub fn handle_trade(&self, trade: &Trade) {
        if !self.seen_trades.lock().insert(trade.id.clone()) {
            debug!(trade_id = %trade.id, "duplicate trade ignored");
            return;
        }

        let event = {
            let mut tracked = self.tracked.write();
            let Some(entry) = tracked.get_mut(&trade.order_id) else {
                debug!(order_id = %trade.order_id, "trade for untracked order ignored");
                return;
            };

            let increment = trade
                .size
                .min(entry.order.size - entry.observed_filled)
                .max(Decimal::ZERO);
            if increment.is_zero() {
                return;
            }

            let new_filled = entry.observed_filled + increment;
            entry.observed_filled = new_filled;
            entry.order.record_fill(new_filled);
            (fill_kind(&entry.order), entry.order.clone(), increment)
        };

        // Callbacks run without the tracker lock held; they may read back
        // into the tracker.
        self.dispatch(event.0, &event.1, event.2);
    }

    /// Reconcile a freshly-fetched order against the tracked baseline,
    /// emitting one event for any filled-quantity increase. Used by the
    /// polling path when the venue has no user channel.
    pub fn reconcile_order(&self, order: &Order) {
        let event = {
            let mut tracked = self.tracked.write();
            let Some(entry) = tracked.get_mut(&order.id) else {
                return;
            };

            let increment = order.filled - entry.observed_filled;
            entry.order = order.clone();
            if increment <= Decimal::ZERO {
                return;
            }
            entry.observed_filled = order.filled;
            (fill_kind(order), order.clone(), increment)
        };

        self.dispatch(event.0, &event.1, event.2);
    }

    fn dispatch(&self, kind: FillEventKind, order: &Order, fill_size: Decimal) {
        let callbacks = self.callbacks.read();
        for callback in callbacks.iter() {
            let result = catch_unwind(AssertUnwindSafe(|| callback(kind, order, fill_size)));
            if result.is_err() {
                error!(order_id = %order.id, "fill callback panicked");
            }
        }
    }

    /// Spawn a background worker consuming the venue's user channel.
    ///
    /// Connection failure is logged and leaves the tracker in poll-only mode;
    /// `reconcile_order` still works.
    pub fn start_user_stream(self: &Arc<Self>, mut stream: Box<dyn UserDataStream>) {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        *self.stop_tx.lock() = Some(stop_tx);

        let tracker = Arc::clone(self);
        let handle = tokio::spawn(async move {
            if let Err(err) = stream.connect().await {
                warn!(error = %err, "user stream connect failed; fills via reconciliation only");
                return;
            }
            info!(exchange = stream.exchange_name(), "user stream connected");
            loop {
                let trade = tokio::select! {
                    _ = stop_rx.changed() => break,
                    trade = stream.next_trade() => trade,
                };
                match trade {
                    Some(trade) => tracker.handle_trade(&trade),
                    None => {
                        warn!("user stream ended");
                        break;
                    }
                }
            }
        });
        *self.worker.lock() = Some(handle);
    }

    /// Stop the user-stream worker, if any. Idempotent.
    pub async fn stop(&self) {
        if let Some(tx) = self.stop_tx.lock().take() {
            let _ = tx.send(true);
        }
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            let abort = handle.abort_handle();
            if timeout(self.config.stop_timeout(), handle).await.is_err() {
                warn!("user stream worker did not stop in time, aborting");
                abort.abort();
            }
        }
    }
}

fn fill_kind(order: &Order) -> FillEventKind {
    if order.status == OrderStatus::Filled {
        FillEventKind::Fill
    } else {
        FillEventKind::PartialFill
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::domain::{open_order, trade_for};
    use crate::testkit::stream::ScriptedUserStream;
    use rust_decimal_macros::dec;

    fn tracker() -> OrderTracker {
        OrderTracker::new(FeedConfig::default())
    }

    fn recorded(tracker: &OrderTracker) -> Arc<Mutex<Vec<(FillEventKind, Decimal)>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        tracker.on_fill(Box::new(move |kind, _order, fill_size| {
            sink.lock().push((kind, fill_size));
        }));
        events
    }

    #[test]
    fn test_trade_emits_partial_then_full() {
        let tracker = tracker();
        let events = recorded(&tracker);
        tracker.track_order(open_order("o1", dec!(10)));

        tracker.handle_trade(&trade_for("t1", "o1", dec!(4)));
        tracker.handle_trade(&trade_for("t2", "o1", dec!(6)));

        let events = events.lock();
        assert_eq!(
            *events,
            vec![
                (FillEventKind::PartialFill, dec!(4)),
                (FillEventKind::Fill, dec!(6)),
            ]
        );
    }

    #[test]
    fn test_duplicate_trade_id_ignored() {
        let tracker = tracker();
        let events = recorded(&tracker);
        tracker.track_order(open_order("o1", dec!(10)));

        tracker.handle_trade(&trade_for("t1", "o1", dec!(4)));
        tracker.handle_trade(&trade_for("t1", "o1", dec!(4)));

        assert_eq!(events.lock().len(), 1);
    }

    #[test]
    fn test_untracked_order_ignored() {
        let tracker = tracker();
        let events = recorded(&tracker);

        tracker.handle_trade(&trade_for("t1", "ghost", dec!(4)));

        assert!(events.lock().is_empty());
    }

    #[test]
    fn test_overfill_clamped_to_order_size() {
        let tracker = tracker();
        let events = recorded(&tracker);
        tracker.track_order(open_order("o1", dec!(10)));

        tracker.handle_trade(&trade_for("t1", "o1", dec!(25)));

        let events = events.lock();
        assert_eq!(*events, vec![(FillEventKind::Fill, dec!(10))]);
    }

    #[test]
    fn test_reconcile_emits_only_increments() {
        let tracker = tracker();
        let events = recorded(&tracker);
        tracker.track_order(open_order("o1", dec!(10)));

        let mut order = open_order("o1", dec!(10));
        order.record_fill(dec!(3));
        tracker.reconcile_order(&order);
        // Same snapshot again: no new increment.
        tracker.reconcile_order(&order);
        order.record_fill(dec!(10));
        tracker.reconcile_order(&order);

        let events = events.lock();
        assert_eq!(
            *events,
            vec![
                (FillEventKind::PartialFill, dec!(3)),
                (FillEventKind::Fill, dec!(7)),
            ]
        );
    }

    #[test]
    fn test_panicking_callback_does_not_break_tracking() {
        let tracker = tracker();
        tracker.on_fill(Box::new(|_, _, _| panic!("boom")));
        let events = recorded(&tracker);
        tracker.track_order(open_order("o1", dec!(10)));

        tracker.handle_trade(&trade_for("t1", "o1", dec!(4)));
        tracker.handle_trade(&trade_for("t2", "o1", dec!(2)));

        assert_eq!(events.lock().len(), 2);
    }

    #[test]
    fn test_untrack_stops_events() {
        let tracker = tracker();
        let events = recorded(&tracker);
        tracker.track_order(open_order("o1", dec!(10)));
        tracker.untrack_order(&OrderId::from("o1"));

        tracker.handle_trade(&trade_for("t1", "o1", dec!(4)));

        assert!(events.lock().is_empty());
        assert_eq!(tracker.tracked_count(), 0);
    }

    #[tokio::test]
    async fn test_user_stream_worker_feeds_trades() {
        let tracker = Arc::new(OrderTracker::new(FeedConfig::default()));
        let events = recorded(&tracker);
        tracker.track_order(open_order("o1", dec!(10)));

        let stream = ScriptedUserStream::new()
            .with_trades(vec![trade_for("t1", "o1", dec!(4)), trade_for("t2", "o1", dec!(6))]);
        tracker.start_user_stream(Box::new(stream));

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(events.lock().len(), 2);

        tracker.stop().await;
    }
}
