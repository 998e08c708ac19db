//! Feed Interface Integration Tests
//!
//! Exercises the upward facade: subscribe/unsubscribe wiring between the
//! aggregator and the scheduler, and rejection of unsupported symbols.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use coinapi_bridge::{
    Aggregator, CanonicalSymbol, CoinApiFeed, Hello, Market, OhlcvEndpoint, OhlcvPage,
    OhlcvRequest, Resolution, RestError, SchedulerSettings, SecurityType, StreamTransport,
    SubscriptionConfig, Tick, TickType, TransportError,
};

#[derive(Default)]
struct RecordingTransport {
    hellos: Mutex<Vec<Hello>>,
}

#[async_trait]
impl StreamTransport for RecordingTransport {
    async fn send_hello(&self, hello: &Hello) -> Result<(), TransportError> {
        self.hellos.lock().push(hello.clone());
        Ok(())
    }

    async fn wait_connected(&self, _timeout: Duration) -> Result<(), TransportError> {
        Ok(())
    }
}

struct NullEndpoint;

#[async_trait]
impl OhlcvEndpoint for NullEndpoint {
    async fn fetch_window(&self, _request: &OhlcvRequest) -> Result<OhlcvPage, RestError> {
        Ok(OhlcvPage::default())
    }
}

#[derive(Default)]
struct FanoutAggregator {
    outputs: Mutex<HashMap<CanonicalSymbol, mpsc::UnboundedSender<Tick>>>,
}

impl Aggregator for FanoutAggregator {
    fn add(&self, config: &SubscriptionConfig) -> mpsc::UnboundedReceiver<Tick> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.outputs.lock().insert(config.symbol.clone(), tx);
        rx
    }

    fn remove(&self, config: &SubscriptionConfig) {
        self.outputs.lock().remove(&config.symbol);
    }

    fn update(&self, tick: Tick) {
        if let Some(output) = self.outputs.lock().get(tick.symbol()) {
            let _ = output.send(tick);
        }
    }
}

fn feed() -> (CoinApiFeed, Arc<RecordingTransport>, Arc<FanoutAggregator>) {
    let transport = Arc::new(RecordingTransport::default());
    let aggregator = Arc::new(FanoutAggregator::default());

    let (feed, _errors) = CoinApiFeed::new(
        Arc::clone(&transport) as Arc<dyn StreamTransport>,
        Arc::new(NullEndpoint) as Arc<dyn OhlcvEndpoint>,
        Arc::clone(&aggregator) as Arc<dyn Aggregator>,
        SchedulerSettings::default(),
        Uuid::nil(),
        vec!["trade".to_string()],
        CancellationToken::new(),
    );

    (feed, transport, aggregator)
}

fn trade_config(symbol: CanonicalSymbol) -> SubscriptionConfig {
    SubscriptionConfig {
        symbol,
        resolution: Resolution::Tick,
        tick_type: TickType::Trade,
    }
}

#[tokio::test(start_paused = true)]
async fn subscribe_registers_and_schedules_a_hello() {
    let (feed, transport, aggregator) = feed();

    let config = trade_config(CanonicalSymbol::spot("BTCUSD", Market::Coinbase));
    let handle = feed.subscribe(&config);

    assert!(handle.is_some());
    assert_eq!(feed.subscription_count(), 1);
    assert_eq!(aggregator.outputs.lock().len(), 1);

    tokio::time::sleep(Duration::from_secs(1)).await;

    let hellos = transport.hellos.lock();
    assert_eq!(hellos.len(), 1);
    assert_eq!(
        hellos[0].subscribe_filter_symbol_id,
        vec!["COINBASE_SPOT_BTC_USD$".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn subscribed_handle_receives_forwarded_ticks() {
    let (feed, _transport, aggregator) = feed();

    let config = trade_config(CanonicalSymbol::spot("BTCUSD", Market::Coinbase));
    let mut handle = feed.subscribe(&config).unwrap();

    let tick = Tick::Trade(coinapi_bridge::TradeTick {
        symbol: config.symbol.clone(),
        time: chrono::Utc::now(),
        price: rust_decimal::Decimal::new(50_000_00, 2),
        size: rust_decimal::Decimal::ONE,
    });
    aggregator.update(tick.clone());

    assert_eq!(handle.recv().await.unwrap(), tick);
}

#[tokio::test(start_paused = true)]
async fn unsupported_security_type_returns_no_handle() {
    let (feed, _transport, aggregator) = feed();

    let config = trade_config(CanonicalSymbol::new(
        "BTCUSD",
        Market::Coinbase,
        SecurityType::Index,
    ));

    assert!(feed.subscribe(&config).is_none());
    assert_eq!(feed.subscription_count(), 0);
    assert!(aggregator.outputs.lock().is_empty());
}

#[tokio::test(start_paused = true)]
async fn universe_placeholder_symbols_are_rejected() {
    let (feed, _transport, _aggregator) = feed();

    let config = trade_config(CanonicalSymbol::spot(
        "QC-UNIVERSE-COINAPI-COINBASE",
        Market::Coinbase,
    ));

    assert!(feed.subscribe(&config).is_none());
}

#[tokio::test(start_paused = true)]
async fn unsubscribe_removes_the_aggregator_registration() {
    let (feed, transport, aggregator) = feed();

    let config = trade_config(CanonicalSymbol::spot("BTCUSD", Market::Coinbase));
    let _handle = feed.subscribe(&config).unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    feed.unsubscribe(&config);
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(feed.subscription_count(), 0);
    assert!(aggregator.outputs.lock().is_empty());

    let hellos = transport.hellos.lock();
    assert_eq!(hellos.len(), 2, "the unsubscribe triggers a second hello");
    assert_eq!(
        hellos[1].subscribe_filter_symbol_id,
        vec!["$no_symbol_requested$".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn market_subscription_goes_out_immediately() {
    let (feed, transport, _aggregator) = feed();

    feed.subscribe_markets(&["kraken"]).await.unwrap();

    let hellos = transport.hellos.lock();
    assert_eq!(hellos.len(), 1);
    assert_eq!(
        hellos[0].subscribe_filter_symbol_id,
        vec!["KRAKEN_".to_string()]
    );
}
