//! Exchange-agnostic domain types.
//!
//! Value objects shared by every venue adapter and the client runtime:
//! markets, orders, positions, order books, NAV, and position-imbalance
//! (delta) math. Everything here is venue-neutral; wire formats live behind
//! the [`exchange`](crate::exchange) traits.

pub mod delta;
pub mod ids;
pub mod market;
pub mod nav;
pub mod order;
pub mod orderbook;
pub mod position;
pub mod price;

pub use delta::{calculate_delta, DeltaInfo};
pub use ids::{MarketId, OrderId, TokenId};
pub use market::{Market, OutcomeToken};
pub use nav::{Nav, PositionBreakdown};
pub use order::{Order, OrderSide, OrderStatus};
pub use orderbook::{Orderbook, PriceLevel, TokenBook};
pub use position::Position;
pub use price::{is_valid_price, round_to_tick_size};
