//! Port Interfaces
//!
//! Boundaries to the three external collaborators:
//!
//! - [`StreamTransport`] — the persistent stream connection; accepts hello
//!   control messages and exposes a connected signal. Inbound events arrive
//!   on a channel of [`StreamEvent`], produced by the transport adapter, so
//!   ordering and shutdown are explicit rather than implied by callback
//!   lifetimes.
//! - [`OhlcvEndpoint`] — the vendor's historical OHLCV REST endpoint.
//! - [`Aggregator`] — the host engine's data aggregation component that
//!   turns resolved ticks into consumable streams.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::domain::streaming::Tick;
use crate::domain::subscription::SubscriptionConfig;

// =============================================================================
// Stream Transport
// =============================================================================

/// The hello control message declaring the full desired subscription filter.
///
/// This is the only message type the stream connection accepts, and the
/// server forbids sending it more often than once per five seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hello {
    /// API key identifying the caller.
    pub apikey: Uuid,

    /// Request heartbeat messages on the stream.
    pub heartbeat: bool,

    /// Data types to stream, e.g. `["trade", "quote"]`.
    pub subscribe_data_type: Vec<String>,

    /// Symbol id filters. A `$` suffix makes a filter an exact match; a
    /// trailing `_` makes it an exchange prefix match.
    pub subscribe_filter_symbol_id: Vec<String>,
}

/// A decoded trade event from the stream connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeEvent {
    /// Vendor symbol id the trade occurred on.
    pub symbol_id: String,
    /// Exchange timestamp.
    pub time: DateTime<Utc>,
    /// Trade price.
    pub price: Decimal,
    /// Trade size.
    pub size: Decimal,
}

/// A decoded quote event from the stream connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteEvent {
    /// Vendor symbol id the quote is for.
    pub symbol_id: String,
    /// Exchange timestamp.
    pub time: DateTime<Utc>,
    /// Best bid price.
    pub bid_price: Decimal,
    /// Size at the best bid.
    pub bid_size: Decimal,
    /// Best ask price.
    pub ask_price: Decimal,
    /// Size at the best ask.
    pub ask_size: Decimal,
}

/// Events the transport adapter produces onto its channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// The connection is established.
    Connected,
    /// The connection dropped.
    Disconnected,
    /// A trade event.
    Trade(TradeEvent),
    /// A quote event.
    Quote(QuoteEvent),
    /// A server-reported error message.
    Error(String),
}

/// Channel sender the transport adapter publishes events into.
pub type StreamEventSender = mpsc::Sender<StreamEvent>;

/// Channel receiver the dispatcher consumes events from.
pub type StreamEventReceiver = mpsc::Receiver<StreamEvent>;

/// Errors surfaced by the stream transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The connection could not be established.
    #[error("stream connection failed: {0}")]
    ConnectFailed(String),

    /// A control message could not be handed to the connection.
    #[error("failed to send control message: {0}")]
    SendFailed(String),

    /// The connection did not confirm within the bounded wait.
    #[error("stream connection not confirmed within {}s", waited.as_secs())]
    NotConnected {
        /// How long the confirmation was awaited.
        waited: Duration,
    },

    /// The connection is closed.
    #[error("stream connection closed")]
    Closed,

    /// The transport's run loop was started twice.
    #[error("transport already running")]
    AlreadyRunning,
}

/// Outbound side of the stream connection.
#[async_trait]
pub trait StreamTransport: Send + Sync {
    /// Send a hello control message declaring the desired filter.
    ///
    /// # Errors
    ///
    /// [`TransportError`] when the message cannot be handed to the
    /// connection.
    async fn send_hello(&self, hello: &Hello) -> Result<(), TransportError>;

    /// Wait until the connection is confirmed, up to `timeout`.
    ///
    /// # Errors
    ///
    /// [`TransportError::NotConnected`] when the deadline passes first.
    async fn wait_connected(&self, timeout: Duration) -> Result<(), TransportError>;
}

// =============================================================================
// Historical OHLCV Endpoint
// =============================================================================

/// One windowed historical OHLCV request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OhlcvRequest {
    /// Vendor symbol id to query.
    pub symbol_id: String,
    /// Vendor period code, e.g. `1MIN`.
    pub period_id: &'static str,
    /// Maximum number of bars the response may carry.
    pub limit: usize,
    /// Window start (inclusive), UTC.
    pub time_start: DateTime<Utc>,
    /// Window end, UTC.
    pub time_end: DateTime<Utc>,
}

/// One OHLCV row as returned by the endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OhlcvRow {
    /// Start of the bar period.
    pub time_period_start: DateTime<Utc>,
    /// Opening price.
    pub price_open: Decimal,
    /// Highest price.
    pub price_high: Decimal,
    /// Lowest price.
    pub price_low: Decimal,
    /// Closing price.
    pub price_close: Decimal,
    /// Traded volume.
    pub volume_traded: Decimal,
}

/// Rate-limit accounting carried on every endpoint response.
///
/// Recorded for observability only; it never alters pacing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimitUsage {
    /// Total request budget.
    pub limit: Option<i64>,
    /// Requests consumed.
    pub used: Option<i64>,
    /// Requests remaining.
    pub remaining: Option<i64>,
}

/// A parsed endpoint response: rows plus rate-limit accounting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OhlcvPage {
    /// Bars in the requested window, oldest first.
    pub rows: Vec<OhlcvRow>,
    /// Rate-limit accounting from the response headers.
    pub rate_limit: RateLimitUsage,
}

/// Errors surfaced by the OHLCV endpoint.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RestError {
    /// The request could not be sent or the response not received.
    #[error("rest transport error: {0}")]
    Transport(String),

    /// The endpoint answered with a non-success status.
    #[error("rest endpoint returned status {0}")]
    Status(u16),

    /// The response body could not be decoded.
    #[error("failed to decode rest response: {0}")]
    Decode(String),
}

/// The vendor's historical OHLCV endpoint.
#[async_trait]
pub trait OhlcvEndpoint: Send + Sync {
    /// Fetch one window of bars.
    ///
    /// # Errors
    ///
    /// [`RestError`] when the call fails or the response cannot be decoded.
    /// A successful call with zero rows is not an error.
    async fn fetch_window(&self, request: &OhlcvRequest) -> Result<OhlcvPage, RestError>;
}

// =============================================================================
// Aggregator
// =============================================================================

/// The host engine's data aggregation component.
///
/// `update` is fire-and-forget ingestion of a resolved, deduplicated tick;
/// `add`/`remove` manage the per-config output streams handed back to
/// subscribing callers.
pub trait Aggregator: Send + Sync {
    /// Register a subscription and return its tick stream handle.
    fn add(&self, config: &SubscriptionConfig) -> mpsc::UnboundedReceiver<Tick>;

    /// Remove a previously registered subscription.
    fn remove(&self, config: &SubscriptionConfig);

    /// Ingest a resolved tick.
    fn update(&self, tick: Tick);
}
