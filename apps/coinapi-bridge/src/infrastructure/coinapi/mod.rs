//! CoinAPI Adapters
//!
//! Vendor-facing adapters for the two network boundaries:
//!
//! - **ws**: WebSocket stream transport (JSON frames)
//! - **rest**: historical OHLCV REST endpoint

pub mod messages;
pub mod rest;
pub mod ws;

pub use messages::{ErrorMessage, InboundMessage, QuoteMessage, ReconnectMessage, TradeMessage, encode_hello};
pub use rest::CoinApiRestClient;
pub use ws::CoinApiWsTransport;
