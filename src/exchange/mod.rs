//! Exchange adapter boundary.
//!
//! The runtime consumes venues through these traits; per-venue wire parsing
//! and order signing live in adapter crates, not here.

pub mod registry;
pub mod stream;
pub mod traits;

pub use registry::{ExchangeFactory, ExchangeRegistry};
pub use stream::{MarketDataStream, MarketEvent, Trade, UserDataStream};
pub use traits::{find_tradeable_market, Balances, Capabilities, Exchange, MarketFilter, OrderRequest};
