//! CoinAPI Bridge Binary
//!
//! Starts the market data bridge against the vendor's streaming and REST
//! endpoints, logging resolved ticks. The real host engine injects its own
//! aggregator; the one here exists so the bridge can run standalone.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin coinapi-bridge
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `COINAPI_API_KEY`: CoinAPI key (UUID)
//!
//! ## Optional
//! - `COINAPI_PRODUCT`: price plan - "free" | "startup" | "streamer" |
//!   "professional" | "enterprise" (default: free)
//! - `COINAPI_WS_URL`: streaming endpoint (default: wss://ws.coinapi.io/v1/)
//! - `COINAPI_REST_URL`: REST endpoint (default: https://rest.coinapi.io)
//! - `COINAPI_SUBSCRIBE_DEBOUNCE_MS`: coalescing quiet period (default: 250)
//! - `COINAPI_MIN_HELLO_INTERVAL_SECS`: hello spacing floor (default: 5)
//! - `COINAPI_SYMBOLS`: comma-separated tickers to stream, as
//!   `TICKER:market` pairs, e.g. `BTCUSD:coinbase,ETHUSD:kraken`
//! - `RUST_LOG`: log level (default: info)

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use coinapi_bridge::infrastructure::coinapi::{CoinApiRestClient, CoinApiWsTransport};
use coinapi_bridge::{
    Aggregator, BridgeConfig, CanonicalSymbol, CoinApiFeed, Market, Resolution, StreamDispatcher,
    SubscriptionConfig, Tick, TickType,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    tracing::info!("Starting CoinAPI Bridge");

    let config = BridgeConfig::from_env()?;
    tracing::info!(
        product = config.product.as_str(),
        ws_url = %config.ws_url,
        rest_url = %config.rest_url,
        "Configuration loaded"
    );

    let shutdown_token = CancellationToken::new();

    let (events_tx, events_rx) = mpsc::channel(config.event_channel_capacity);

    let transport = Arc::new(CoinApiWsTransport::new(
        config.ws_url.clone(),
        events_tx,
        shutdown_token.clone(),
    ));
    let endpoint = Arc::new(CoinApiRestClient::new(&config.rest_url, config.api_key)?);
    let aggregator = Arc::new(ChannelAggregator::default());

    let (feed, mut errors) = CoinApiFeed::new(
        transport.clone(),
        endpoint,
        aggregator.clone(),
        config.scheduler,
        config.api_key,
        config.product.data_types(),
        shutdown_token.clone(),
    );

    let dispatcher = Arc::new(StreamDispatcher::new(aggregator));

    // Transport run loop
    let transport_clone = Arc::clone(&transport);
    tokio::spawn(async move {
        if let Err(e) = transport_clone.run().await {
            tracing::error!(error = %e, "stream transport stopped");
        }
    });

    // Dispatcher run loop
    let dispatcher_clone = Arc::clone(&dispatcher);
    let dispatcher_cancel = shutdown_token.clone();
    tokio::spawn(async move {
        dispatcher_clone.run(events_rx, dispatcher_cancel).await;
    });

    // Hard connection errors from the background subscription cycle
    let error_cancel = shutdown_token.clone();
    tokio::spawn(async move {
        while let Some(e) = errors.recv().await {
            tracing::error!(error = %e, "feed connection error, shutting down");
            error_cancel.cancel();
        }
    });

    for subscription in configured_subscriptions() {
        let symbol = subscription.symbol.clone();
        match feed.subscribe(&subscription) {
            Some(mut ticks) => {
                tokio::spawn(async move {
                    while let Some(tick) = ticks.recv().await {
                        tracing::info!(symbol = %tick.symbol(), time = %tick.time(), "tick");
                    }
                });
            }
            None => tracing::warn!(symbol = %symbol, "symbol not supported"),
        }
    }

    tracing::info!(subscriptions = feed.subscription_count(), "Bridge ready");

    await_shutdown(shutdown_token).await;

    tracing::info!("Bridge stopped");
    Ok(())
}

/// Parse `COINAPI_SYMBOLS` into subscription configs.
fn configured_subscriptions() -> Vec<SubscriptionConfig> {
    let raw = std::env::var("COINAPI_SYMBOLS").unwrap_or_default();

    raw.split(',')
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| {
            let (ticker, market) = entry.split_once(':')?;
            let market = Market::parse(market)?;
            Some(SubscriptionConfig {
                symbol: CanonicalSymbol::spot(ticker.trim().to_uppercase(), market),
                resolution: Resolution::Tick,
                tick_type: TickType::Trade,
            })
        })
        .collect()
}

/// Channel-backed aggregator used when running standalone.
///
/// Fans each resolved tick out to the subscriber of its symbol; the host
/// engine replaces this with its own aggregation component.
#[derive(Default)]
struct ChannelAggregator {
    outputs: Mutex<HashMap<CanonicalSymbol, mpsc::UnboundedSender<Tick>>>,
}

impl Aggregator for ChannelAggregator {
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

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();
}
