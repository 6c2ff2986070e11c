//! Client configuration.
//!
//! Loaded from a TOML file with [`ClientConfig::load`], or from environment
//! variables with [`ClientConfig::from_env`] (a `.env` file is honored via
//! `dotenvy`). Every knob has a default tuned for Polygon-style venues
//! (2 s block time, 10 requests/second).

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ConfigError, Result};

/// Top-level client configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub cache: CacheConfig,
    pub rate_limit: RateLimitConfig,
    pub retry: RetryConfig,
    pub feed: FeedConfig,
    pub strategy: StrategyConfig,
}

/// Account-state cache tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Time-to-live for balance/position entries, in milliseconds.
    /// Default matches the ~2 s Polygon block time.
    pub ttl_ms: u64,
}

/// Sliding-window rate limiter tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Maximum requests within a one-second window.
    pub requests_per_second: usize,
}

/// Retry/backoff tuning for venue calls.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Base delay before the first retry, in milliseconds.
    pub base_delay_ms: u64,
    /// Multiplier applied per attempt (exponential backoff).
    pub backoff_multiplier: f64,
}

/// Market data feed tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// REST polling interval when push feeds are unavailable, in milliseconds.
    pub poll_interval_ms: u64,
    /// How long to wait for a push connection before falling back to polling.
    pub connect_timeout_ms: u64,
    /// Initial reconnect delay after push-transport loss.
    pub reconnect_initial_delay_ms: u64,
    /// Reconnect delay cap.
    pub reconnect_max_delay_ms: u64,
    /// Bound on concurrent snapshot fetches at feed start.
    pub snapshot_concurrency: usize,
    /// How long `stop()` waits for background workers to terminate.
    pub stop_timeout_ms: u64,
}

/// Market-making strategy tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// Maximum position size per outcome, in shares.
    pub max_position: f64,
    /// Order size per quote, in shares.
    pub order_size: f64,
    /// Maximum position imbalance before quoting is suspended on the heavy
    /// outcome.
    pub max_delta: f64,
    /// Seconds between strategy ticks.
    pub tick_interval_secs: f64,
    /// Price tolerance when deciding whether an existing order is still at
    /// the target level.
    pub price_tolerance: f64,
    /// Seconds to wait for liquidation orders to settle during shutdown.
    pub settle_interval_secs: f64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            rate_limit: RateLimitConfig::default(),
            retry: RetryConfig::default(),
            feed: FeedConfig::default(),
            strategy: StrategyConfig::default(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_ms: 2_000 }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 10,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            connect_timeout_ms: 5_000,
            reconnect_initial_delay_ms: 500,
            reconnect_max_delay_ms: 30_000,
            snapshot_concurrency: 5,
            stop_timeout_ms: 5_000,
        }
    }
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            max_position: 100.0,
            order_size: 5.0,
            max_delta: 20.0,
            tick_interval_secs: 5.0,
            price_tolerance: 0.001,
            settle_interval_secs: 3.0,
        }
    }
}

impl ClientConfig {
    /// Load configuration from a TOML file and validate it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed, or if
    /// any value fails validation.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        let config: Self = toml::from_str(&content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Build configuration from defaults plus `QUOTIENT_*` environment
    /// overrides. A `.env` file in the working directory is loaded first.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if an override cannot be parsed
    /// or the resulting config fails validation.
    pub fn from_env() -> Result<Self> {
        // Missing .env is fine; only load errors on present files matter.
        let _ = dotenvy::dotenv();

        let mut config = Self::default();
        if let Some(ttl) = env_parse::<u64>("QUOTIENT_CACHE_TTL_MS")? {
            config.cache.ttl_ms = ttl;
        }
        if let Some(rps) = env_parse::<usize>("QUOTIENT_RATE_LIMIT_RPS")? {
            config.rate_limit.requests_per_second = rps;
        }
        if let Some(retries) = env_parse::<u32>("QUOTIENT_MAX_RETRIES")? {
            config.retry.max_retries = retries;
        }
        if let Some(interval) = env_parse::<u64>("QUOTIENT_POLL_INTERVAL_MS")? {
            config.feed.poll_interval_ms = interval;
        }
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.rate_limit.requests_per_second == 0 {
            return Err(ConfigError::InvalidValue {
                field: "rate_limit.requests_per_second",
                reason: "must be at least 1".into(),
            });
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(ConfigError::InvalidValue {
                field: "retry.backoff_multiplier",
                reason: "must be >= 1.0".into(),
            });
        }
        if self.feed.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "feed.poll_interval_ms",
                reason: "must be positive".into(),
            });
        }
        if self.feed.snapshot_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "feed.snapshot_concurrency",
                reason: "must be at least 1".into(),
            });
        }
        if self.strategy.order_size <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "strategy.order_size",
                reason: "must be positive".into(),
            });
        }
        Ok(())
    }

    /// Cache TTL as a [`Duration`].
    #[must_use]
    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache.ttl_ms)
    }
}

impl RetryConfig {
    /// Base retry delay as a [`Duration`].
    #[must_use]
    pub const fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

impl FeedConfig {
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    #[must_use]
    pub const fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

fn env_parse<T: std::str::FromStr>(key: &'static str) -> std::result::Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                field: key,
                reason: format!("cannot parse '{raw}'"),
            }),
        Err(_) => Ok(None),
    }
}
