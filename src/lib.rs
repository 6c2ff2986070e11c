//! Quotient - Stateful prediction-market trading client runtime.
//!
//! This crate lets a caller trade on structurally different prediction-market
//! venues (order-signing blockchain CLOBs, REST/WebSocket matching engines)
//! through one interface, while keeping a locally-consistent view of account
//! state, market data, and open orders despite unreliable networks.
//!
//! # Architecture
//!
//! Venues plug in as stateless [`exchange::Exchange`] adapters. All
//! client-side state lives in [`runtime::ExchangeClient`]:
//!
//! - **`runtime::RetryingExecutor`** - sliding-window rate limiting plus
//!   retry with exponential backoff for transient failures
//! - **`runtime::AccountStateCache`** - TTL-cached balances and positions
//!   with staleness flags
//! - **`runtime::OrderBookStore`** / **`runtime::MidPriceCache`** - normalized
//!   book ladders and last-known mids
//! - **`runtime::MarketDataFeed`** - push stream when the venue has one,
//!   REST polling otherwise
//! - **`runtime::OrderTracker`** - deduplicated fill callbacks from push
//!   trades or polled reconciliation
//!
//! [`strategy::MarketMakingStrategy`] drives the client through a
//! setup/tick/cleanup lifecycle.
//!
//! # Modules
//!
//! - [`config`] - Configuration from TOML files or environment variables
//! - [`domain`] - Venue-agnostic types: markets, orders, positions, books
//! - [`error`] - Error taxonomy splitting retryable from fatal failures
//! - [`exchange`] - Adapter traits, stream traits, and the adapter registry
//! - [`runtime`] - The stateful client and its caches, feeds, and workers
//! - [`strategy`] - Tick-driven strategies built on the client
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use quotient::config::ClientConfig;
//! use quotient::exchange::ExchangeRegistry;
//! use quotient::runtime::ExchangeClient;
//!
//! # fn make_registry() -> ExchangeRegistry { ExchangeRegistry::new() }
//! # fn main() -> quotient::error::Result<()> {
//! let registry = make_registry();
//! let exchange = registry.create("polymarket")?;
//! let client = ExchangeClient::new(exchange, ClientConfig::from_env()?);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod domain;
pub mod error;
pub mod exchange;
pub mod runtime;
pub mod strategy;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;

pub use error::{Error, Result};
