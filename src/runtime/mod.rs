//! Client runtime: caches, feeds, tracking, and the façade tying them
//! together.

pub mod account;
pub mod books;
pub mod client;
pub mod executor;
pub mod feed;
pub mod mid_price;
pub mod nav;
pub mod tracker;

pub use account::AccountStateCache;
pub use books::OrderBookStore;
pub use client::ExchangeClient;
pub use executor::{RateLimiter, RetryingExecutor};
pub use feed::{FeedState, MarketDataFeed};
pub use mid_price::MidPriceCache;
pub use tracker::{FillCallback, FillEventKind, OrderTracker};
