//! End-to-end flows through the client: feed seeding, BBO lookups, fill
//! callbacks, NAV.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use quotient::config::ClientConfig;
use quotient::domain::{MarketId, Orderbook, OrderSide, PriceLevel, TokenId};
use quotient::exchange::{Exchange, OrderRequest, Trade};
use quotient::runtime::{ExchangeClient, FeedState, FillEventKind};
use quotient::testkit::domain::binary_market;
use quotient::testkit::exchange::MockExchange;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn fast_config() -> ClientConfig {
    let mut config = ClientConfig::default();
    config.retry.max_retries = 0;
    config.retry.base_delay_ms = 1;
    config.feed.poll_interval_ms = 10;
    config.feed.connect_timeout_ms = 100;
    config
}

fn client_for(exchange: Arc<MockExchange>) -> ExchangeClient {
    init_tracing();
    ExchangeClient::new(exchange as Arc<dyn Exchange>, fast_config())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn book(bid: Decimal, ask: Decimal) -> Orderbook {
    Orderbook::from_levels(
        vec![PriceLevel::new(bid, dec!(10))],
        vec![PriceLevel::new(ask, dec!(5))],
    )
}

#[tokio::test]
async fn feed_seeds_store_and_serves_bbo() {
    let exchange = Arc::new(MockExchange::new().with_orderbook("T1", book(dec!(0.60), dec!(0.62))));
    let client = client_for(Arc::clone(&exchange));

    client
        .start_market_feed(vec![TokenId::from("T1")])
        .await
        .unwrap();
    assert_eq!(client.feed_state(), FeedState::Connected);

    let (bid, ask) = client.best_bid_ask(&TokenId::from("T1")).await.unwrap();
    assert_eq!((bid, ask), (Some(dec!(0.60)), Some(dec!(0.62))));
    assert_eq!(
        client.books().mid_price(&TokenId::from("T1")),
        Some(dec!(0.61))
    );

    client.stop().await;
    assert_eq!(client.feed_state(), FeedState::Closed);
}

#[tokio::test]
async fn fill_callbacks_fire_once_per_increment() {
    let exchange = Arc::new(MockExchange::new());
    let client = client_for(exchange);

    let fills: Arc<Mutex<Vec<(FillEventKind, Decimal)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&fills);
    client.on_fill(Box::new(move |kind, _order, fill_size| {
        sink.lock().push((kind, fill_size));
    }));

    let order = client
        .create_order(&OrderRequest {
            market_id: MarketId::from("m1"),
            outcome: "Yes".into(),
            side: OrderSide::Buy,
            price: dec!(0.50),
            size: dec!(10),
            token_id: Some(TokenId::from("m1-yes")),
        })
        .await
        .unwrap();

    let trade = |id: &str, size: Decimal| Trade {
        id: id.to_string(),
        order_id: order.id.clone(),
        market_id: order.market_id.clone(),
        token_id: TokenId::from("m1-yes"),
        outcome: "Yes".into(),
        side: OrderSide::Buy,
        price: dec!(0.50),
        size,
        timestamp: chrono::Utc::now(),
    };

    client.tracker().handle_trade(&trade("t1", dec!(4)));
    client.tracker().handle_trade(&trade("t1", dec!(4))); // duplicate id
    client.tracker().handle_trade(&trade("t2", dec!(6)));

    let fills = fills.lock();
    assert_eq!(
        *fills,
        vec![
            (FillEventKind::PartialFill, dec!(4)),
            (FillEventKind::Fill, dec!(6)),
        ]
    );
}

#[tokio::test]
async fn cancel_all_orders_counts_and_skips_nothing() {
    let exchange = Arc::new(MockExchange::new());
    let client = client_for(Arc::clone(&exchange));

    for price in [dec!(0.40), dec!(0.45), dec!(0.50)] {
        client
            .create_order(&OrderRequest {
                market_id: MarketId::from("m1"),
                outcome: "Yes".into(),
                side: OrderSide::Buy,
                price,
                size: dec!(5),
                token_id: None,
            })
            .await
            .unwrap();
    }

    let cancelled = client
        .cancel_all_orders(Some(&MarketId::from("m1")))
        .await
        .unwrap();
    assert_eq!(cancelled, 3);
    assert_eq!(exchange.cancelled_orders().len(), 3);
    assert!(client
        .fetch_open_orders(Some(&MarketId::from("m1")))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn nav_prefers_feed_mid_and_degrades_gracefully() {
    let exchange = Arc::new(
        MockExchange::new()
            .with_balance("USDC", dec!(50))
            .with_balance("USD", dec!(50))
            .with_market(binary_market("m1"))
            .with_position("m1", "Yes", dec!(10))
            .with_orderbook("m1-yes", book(dec!(0.60), dec!(0.70))),
    );
    let client = client_for(Arc::clone(&exchange));
    client.get_market(&MarketId::from("m1")).await.unwrap();

    // No feed yet: falls back to the position's own price (0.5).
    let nav = client.calculate_nav().await.unwrap();
    assert_eq!(nav.cash, dec!(100));
    assert_eq!(nav.positions_value, dec!(5));

    client
        .start_market_feed(vec![TokenId::from("m1-yes")])
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;

    // Feed running: live mid (0.65) wins.
    let nav = client.calculate_nav().await.unwrap();
    assert_eq!(nav.positions_value, dec!(6.5));
    assert_eq!(nav.nav, dec!(106.5));

    client.stop().await;
}

#[tokio::test]
async fn balance_served_stale_after_venue_failure() {
    let exchange = Arc::new(MockExchange::new().with_balance("USDC", dec!(100)));
    let mut config = fast_config();
    config.cache.ttl_ms = 0;
    let client = ExchangeClient::new(Arc::clone(&exchange) as Arc<dyn Exchange>, config);

    let (_, stale) = client.get_balance().await.unwrap();
    assert!(!stale);

    exchange.fail_balance(true);
    let (balances, stale) = client.get_balance().await.unwrap();
    assert_eq!(balances.get("USDC"), Some(&dec!(100)));
    assert!(stale);
}
