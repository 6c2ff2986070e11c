//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`exchange`] — the in-memory [`MockExchange`](exchange::MockExchange).
//! - [`stream`] — scripted market/user data stream mocks.
//! - [`domain`] — builders for domain primitives: tokens, markets, orders,
//!   trades.

pub mod domain;
pub mod exchange;
pub mod stream;
