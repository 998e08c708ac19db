//! CoinAPI WebSocket Message Types
//!
//! Wire format types for the vendor's streaming connection. Every frame is a
//! JSON object with a `type` discriminator.
//!
//! # Outbound
//!
//! The hello message is the only outbound frame; it declares the full
//! desired subscription filter and is re-sent whenever the filter changes.
//!
//! # Inbound
//!
//! - `trade`: an executed trade on a subscribed symbol
//! - `quote`: a top-of-book update on a subscribed symbol
//! - `hearbeat`: keep-alive (the vendor spells it without the second `t`)
//! - `error`: server-reported error
//! - `reconnect`: server asks the client to reconnect soon

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::application::ports::{Hello, QuoteEvent, TradeEvent};

// =============================================================================
// Outbound
// =============================================================================

/// Hello frame carrying the `type` discriminator on the wire.
#[derive(Debug, Serialize)]
struct HelloFrame<'a> {
    #[serde(rename = "type")]
    message_type: &'static str,
    #[serde(flatten)]
    hello: &'a Hello,
}

/// Encode a hello message into its wire frame.
///
/// # Errors
///
/// Returns the underlying serialization error (practically unreachable for
/// this shape).
pub fn encode_hello(hello: &Hello) -> Result<String, serde_json::Error> {
    serde_json::to_string(&HelloFrame {
        message_type: "hello",
        hello,
    })
}

// =============================================================================
// Inbound
// =============================================================================

/// An executed trade.
///
/// # Wire Format (JSON)
/// ```json
/// {
///   "type": "trade",
///   "symbol_id": "COINBASE_SPOT_BTC_USD",
///   "time_exchange": "2024-03-01T10:05:42.1234567Z",
///   "time_coinapi": "2024-03-01T10:05:42.2234567Z",
///   "price": 50000.5,
///   "size": 0.25,
///   "taker_side": "BUY"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeMessage {
    /// Vendor symbol id.
    pub symbol_id: String,

    /// Exchange timestamp.
    pub time_exchange: DateTime<Utc>,

    /// Vendor ingestion timestamp.
    #[serde(default)]
    pub time_coinapi: Option<DateTime<Utc>>,

    /// Trade price.
    pub price: Decimal,

    /// Trade size.
    pub size: Decimal,

    /// Aggressor side, when the exchange reports it.
    #[serde(default)]
    pub taker_side: Option<String>,
}

/// A top-of-book quote update.
///
/// # Wire Format (JSON)
/// ```json
/// {
///   "type": "quote",
///   "symbol_id": "COINBASE_SPOT_BTC_USD",
///   "time_exchange": "2024-03-01T10:05:42.1234567Z",
///   "bid_price": 49999.5,
///   "bid_size": 1.2,
///   "ask_price": 50000.5,
///   "ask_size": 0.8
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteMessage {
    /// Vendor symbol id.
    pub symbol_id: String,

    /// Exchange timestamp.
    pub time_exchange: DateTime<Utc>,

    /// Vendor ingestion timestamp.
    #[serde(default)]
    pub time_coinapi: Option<DateTime<Utc>>,

    /// Best bid price.
    pub bid_price: Decimal,

    /// Size at the best bid.
    pub bid_size: Decimal,

    /// Best ask price.
    pub ask_price: Decimal,

    /// Size at the best ask.
    pub ask_size: Decimal,
}

/// Server-reported error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    /// Human-readable error description.
    pub message: String,
}

/// Server-requested reconnect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectMessage {
    /// Seconds within which the client should reconnect.
    #[serde(default)]
    pub within_seconds: Option<u64>,
}

/// Unified inbound message enum, discriminated by the `type` field.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InboundMessage {
    /// Executed trade.
    Trade(TradeMessage),

    /// Top-of-book quote.
    Quote(QuoteMessage),

    /// Keep-alive. The misspelling is the vendor's, not ours.
    #[serde(rename = "hearbeat")]
    Heartbeat,

    /// Server-reported error.
    Error(ErrorMessage),

    /// Server-requested reconnect.
    Reconnect(ReconnectMessage),

    /// Any message type this bridge does not consume.
    #[serde(other)]
    Unknown,
}

impl From<TradeMessage> for TradeEvent {
    fn from(message: TradeMessage) -> Self {
        Self {
            symbol_id: message.symbol_id,
            time: message.time_exchange,
            price: message.price,
            size: message.size,
        }
    }
}

impl From<QuoteMessage> for QuoteEvent {
    fn from(message: QuoteMessage) -> Self {
        Self {
            symbol_id: message.symbol_id,
            time: message.time_exchange,
            bid_price: message.bid_price,
            bid_size: message.bid_size,
            ask_price: message.ask_price,
            ask_size: message.ask_size,
        }
    }
}
