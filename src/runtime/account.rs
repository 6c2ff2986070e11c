//! TTL-cached account state (balances and positions).
//!
//! Reads are served from cache when fresh. A stale read triggers an inline
//! refresh; if that refresh fails the previous value is returned with the
//! stale flag set instead of raising. Only a first read with no cached
//! value, or an explicit [`AccountStateCache::refresh`], propagates fetch
//! errors.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::warn;

use crate::domain::{MarketId, Position};
use crate::error::Result;
use crate::exchange::{Balances, Exchange};

use super::executor::RetryingExecutor;

/// A cached value with its refresh timestamp.
#[derive(Debug, Clone)]
struct CachedEntry<T> {
    value: T,
    refreshed_at: Instant,
}

impl<T> CachedEntry<T> {
    fn fresh(value: T) -> Self {
        Self {
            value,
            refreshed_at: Instant::now(),
        }
    }

    fn is_stale(&self, ttl: Duration) -> bool {
        self.refreshed_at.elapsed() > ttl
    }
}

/// Cache key for positions: a market ID, or `None` for all markets.
type PositionsKey = Option<MarketId>;

/// TTL cache over the adapter's balance and position endpoints.
///
/// Mutation is a full-value replace per entry; readers never observe a
/// partially updated value.
pub struct AccountStateCache {
    exchange: Arc<dyn Exchange>,
    executor: Arc<RetryingExecutor>,
    ttl: Duration,
    balance: RwLock<Option<CachedEntry<Balances>>>,
    positions: RwLock<HashMap<PositionsKey, CachedEntry<Vec<Position>>>>,
}

impl AccountStateCache {
    #[must_use]
    pub fn new(exchange: Arc<dyn Exchange>, executor: Arc<RetryingExecutor>, ttl: Duration) -> Self {
        Self {
            exchange,
            executor,
            ttl,
            balance: RwLock::new(None),
            positions: RwLock::new(HashMap::new()),
        }
    }

    /// Cached balance plus a staleness flag.
    ///
    /// # Errors
    ///
    /// Only when there is no cached value yet and the initial fetch fails.
    pub async fn get_balance(&self) -> Result<(Balances, bool)> {
        let cached = self.balance.read().clone();
        match cached {
            Some(entry) if !entry.is_stale(self.ttl) => Ok((entry.value, false)),
            Some(entry) => match self.refresh_balance().await {
                Ok(balances) => Ok((balances, false)),
                Err(err) => {
                    warn!(error = %err, "balance refresh failed, serving stale value");
                    Ok((entry.value, true))
                }
            },
            None => Ok((self.refresh_balance().await?, false)),
        }
    }

    /// Cached positions plus a staleness flag, optionally filtered by market.
    ///
    /// # Errors
    ///
    /// Only when there is no cached value for this key yet and the initial
    /// fetch fails.
    pub async fn get_positions(
        &self,
        market_id: Option<&MarketId>,
    ) -> Result<(Vec<Position>, bool)> {
        let key: PositionsKey = market_id.cloned();
        let cached = self.positions.read().get(&key).cloned();
        match cached {
            Some(entry) if !entry.is_stale(self.ttl) => Ok((entry.value, false)),
            Some(entry) => match self.refresh_positions(market_id).await {
                Ok(positions) => Ok((positions, false)),
                Err(err) => {
                    warn!(error = %err, "positions refresh failed, serving stale value");
                    Ok((entry.value, true))
                }
            },
            None => Ok((self.refresh_positions(market_id).await?, false)),
        }
    }

    /// Force a blocking refresh of balance and positions.
    ///
    /// # Errors
    ///
    /// Propagates the first fetch failure to the caller.
    pub async fn refresh(&self, market_id: Option<&MarketId>) -> Result<()> {
        self.refresh_balance().await?;
        self.refresh_positions(market_id).await?;
        Ok(())
    }

    async fn refresh_balance(&self) -> Result<Balances> {
        let exchange = self.exchange.clone();
        let balances = self
            .executor
            .execute(|| {
                let exchange = exchange.clone();
                async move { exchange.fetch_balance().await }
            })
            .await?;
        *self.balance.write() = Some(CachedEntry::fresh(balances.clone()));
        Ok(balances)
    }

    async fn refresh_positions(&self, market_id: Option<&MarketId>) -> Result<Vec<Position>> {
        let exchange = self.exchange.clone();
        let key: PositionsKey = market_id.cloned();
        let filter = key.clone();
        let positions = self
            .executor
            .execute(|| {
                let exchange = exchange.clone();
                let filter = filter.clone();
                async move { exchange.fetch_positions(filter.as_ref()).await }
            })
            .await?;
        self.positions
            .write()
            .insert(key, CachedEntry::fresh(positions.clone()));
        Ok(positions)
    }
}
