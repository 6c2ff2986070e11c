//! Strategy lifecycle against the mock venue.

use std::sync::Arc;
use std::time::Duration;

use quotient::config::ClientConfig;
use quotient::domain::{MarketId, Orderbook, OrderSide, PriceLevel};
use quotient::exchange::Exchange;
use quotient::runtime::ExchangeClient;
use quotient::strategy::{MarketMakingStrategy, StrategyPhase};
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
    config.strategy.tick_interval_secs = 0.02;
    config.strategy.settle_interval_secs = 0.01;
    config.strategy.order_size = 5.0;
    config.strategy.max_position = 20.0;
    config.strategy.max_delta = 15.0;
    config
}

fn two_sided(bid: Decimal, ask: Decimal) -> Orderbook {
    Orderbook::from_levels(
        vec![PriceLevel::new(bid, dec!(50))],
        vec![PriceLevel::new(ask, dec!(50))],
    )
}

fn venue() -> MockExchange {
    MockExchange::new()
        .with_market(binary_market("m1"))
        .with_balance("USDC", dec!(1000))
        .with_orderbook("m1-yes", two_sided(dec!(0.60), dec!(0.62)))
        .with_orderbook("m1-no", two_sided(dec!(0.38), dec!(0.40)))
}

fn strategy_for(exchange: Arc<MockExchange>) -> MarketMakingStrategy {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    let client = Arc::new(ExchangeClient::new(
        exchange as Arc<dyn Exchange>,
        fast_config(),
    ));
    MarketMakingStrategy::new(client, MarketId::from("m1")).unwrap()
}

#[tokio::test]
async fn timed_run_quotes_then_cleans_up() {
    let exchange = Arc::new(venue());
    let strategy = strategy_for(Arc::clone(&exchange));

    strategy.run(Some(Duration::from_millis(50))).await.unwrap();

    assert_eq!(strategy.phase(), StrategyPhase::Terminated);
    let state = strategy.state();
    assert!(state.ticks >= 1);

    // Quotes were placed on both outcomes and cancelled on shutdown.
    let placed = exchange.placed_orders();
    assert!(placed.iter().any(|o| o.outcome == "Yes"));
    assert!(placed.iter().any(|o| o.outcome == "No"));
    assert_eq!(exchange.cancelled_orders().len(), placed.len());
}

#[tokio::test]
async fn external_stop_triggers_cleanup() {
    let exchange = Arc::new(venue());
    let strategy = Arc::new(strategy_for(Arc::clone(&exchange)));

    let runner = Arc::clone(&strategy);
    let handle = tokio::spawn(async move { runner.run(None).await });

    tokio::time::sleep(Duration::from_millis(40)).await;
    assert_eq!(strategy.phase(), StrategyPhase::Running);

    strategy.stop();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("run loop must exit after stop")
        .unwrap()
        .unwrap();
    assert_eq!(strategy.phase(), StrategyPhase::Terminated);
    assert!(!exchange.cancelled_orders().is_empty());
}

#[tokio::test]
async fn placement_failures_do_not_abort_the_loop() {
    let exchange = Arc::new(venue());
    exchange.fail_create(true);
    let strategy = strategy_for(Arc::clone(&exchange));

    strategy.run(Some(Duration::from_millis(50))).await.unwrap();

    assert_eq!(strategy.phase(), StrategyPhase::Terminated);
    assert!(strategy.state().ticks >= 2);
    assert!(exchange.placed_orders().is_empty());
}

#[tokio::test]
async fn shutdown_liquidates_inventory_at_best_bid() {
    let exchange = Arc::new(venue().with_position("m1", "Yes", dec!(4.9)));
    let strategy = strategy_for(Arc::clone(&exchange));

    strategy.run(Some(Duration::from_millis(30))).await.unwrap();

    let liquidation: Vec<_> = exchange
        .placed_orders()
        .into_iter()
        .filter(|o| o.side == OrderSide::Sell && o.size == dec!(4))
        .collect();
    assert_eq!(liquidation.len(), 1);
    assert_eq!(liquidation[0].price, dec!(0.60));
}

#[tokio::test]
async fn no_liquidation_orders_for_flat_book() {
    let exchange = Arc::new(
        MockExchange::new()
            .with_market(binary_market("m1"))
            .with_balance("USDC", dec!(0))
            .with_position("m1", "Yes", dec!(0))
            .with_orderbook("m1-yes", two_sided(dec!(0.60), dec!(0.62)))
            .with_orderbook("m1-no", two_sided(dec!(0.38), dec!(0.40))),
    );
    let strategy = strategy_for(Arc::clone(&exchange));

    strategy.run(Some(Duration::from_millis(30))).await.unwrap();

    // No cash, no inventory: nothing placed during the run or the cleanup.
    assert!(exchange.placed_orders().is_empty());
}
