//! Trading strategies built on [`ExchangeClient`](crate::runtime::ExchangeClient).

pub mod market_maker;
pub mod state;

pub use market_maker::{MarketMakingStrategy, StrategyParams};
pub use state::{StrategyPhase, StrategyState};
