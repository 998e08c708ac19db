//! Feed Facade
//!
//! The upward interface the host engine drives: subscribe/unsubscribe for
//! streaming data, bulk historical retrieval, and whole-market
//! subscriptions. Wires the scheduler and history client over the injected
//! transport, REST endpoint, and aggregator collaborators.

use std::sync::Arc;

use futures::stream::BoxStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::application::ports::{Aggregator, OhlcvEndpoint, StreamTransport, TransportError};
use crate::application::services::history::{HistoryClient, HistoryRequest};
use crate::application::services::scheduler::{HelloScheduler, SchedulerSettings};
use crate::domain::streaming::{Tick, TradeBar};
use crate::domain::subscription::SubscriptionConfig;
use crate::domain::symbol::CanonicalSymbol;

/// Market data feed facade.
///
/// Subscribe calls register the config with the aggregator and schedule a
/// hello; they never block on the network. Connection failures from the
/// background cycle arrive on the error channel returned by [`new`].
///
/// [`new`]: Self::new
pub struct CoinApiFeed {
    scheduler: Arc<HelloScheduler>,
    history: HistoryClient,
    aggregator: Arc<dyn Aggregator>,
}

impl CoinApiFeed {
    /// Create a feed over the given collaborators.
    ///
    /// Returns the feed and the receiver surfacing hard connection errors
    /// from the background subscription cycle. The scheduler's run loop is
    /// spawned here, so this must be called within a Tokio runtime.
    #[must_use]
    pub fn new(
        transport: Arc<dyn StreamTransport>,
        endpoint: Arc<dyn OhlcvEndpoint>,
        aggregator: Arc<dyn Aggregator>,
        settings: SchedulerSettings,
        api_key: Uuid,
        data_types: Vec<String>,
        cancel: CancellationToken,
    ) -> (Self, mpsc::UnboundedReceiver<TransportError>) {
        let (errors_tx, errors_rx) = mpsc::unbounded_channel();

        let scheduler = Arc::new(HelloScheduler::new(
            transport,
            settings,
            api_key,
            data_types,
            errors_tx,
            cancel,
        ));
        tokio::spawn(Arc::clone(&scheduler).run());

        let feed = Self {
            scheduler,
            history: HistoryClient::new(endpoint),
            aggregator,
        };

        (feed, errors_rx)
    }

    /// Subscribe to streaming data for a config.
    ///
    /// Returns the aggregator's tick stream handle, or `None` when the
    /// symbol is not one this bridge can serve.
    #[must_use]
    pub fn subscribe(
        &self,
        config: &SubscriptionConfig,
    ) -> Option<mpsc::UnboundedReceiver<Tick>> {
        if !Self::can_subscribe(&config.symbol) {
            tracing::debug!(symbol = %config.symbol, "unsupported symbol, not subscribing");
            return None;
        }

        let handle = self.aggregator.add(config);
        self.scheduler.request_subscribe(&config.symbol);
        Some(handle)
    }

    /// Remove a streaming subscription.
    pub fn unsubscribe(&self, config: &SubscriptionConfig) {
        self.scheduler.request_unsubscribe(&config.symbol);
        self.aggregator.remove(config);
    }

    /// Subscribe to whole markets by exchange prefix.
    ///
    /// # Errors
    ///
    /// [`TransportError`] when the hello cannot be sent or the connection
    /// does not confirm in time.
    pub async fn subscribe_markets(&self, markets: &[&str]) -> Result<(), TransportError> {
        self.scheduler.subscribe_markets(markets).await
    }

    /// Fetch historical trade bars as a lazy sequence.
    ///
    /// Empty for unsupported parameters; see [`HistoryClient::fetch`].
    #[must_use]
    pub fn fetch_history(&self, request: HistoryRequest) -> BoxStream<'static, TradeBar> {
        self.history.fetch(request)
    }

    /// Number of distinct symbols currently desired.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.scheduler.subscription_count()
    }

    /// Whether this bridge can stream the symbol.
    fn can_subscribe(symbol: &CanonicalSymbol) -> bool {
        // Universe placeholder symbols carry no market data.
        symbol.security_type.is_supported() && !symbol.ticker.contains("-UNIVERSE-")
    }
}
