#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::default_trait_access
    )
)]

//! CoinAPI Bridge - Market Data Ingestion Core
//!
//! Bridges the CoinAPI streaming/REST vendor into a host trading engine:
//! turns a dynamic, multi-caller set of symbol subscriptions into
//! rate-limited hello control messages, translates between vendor symbol
//! ids and canonical symbols, paginates bulk historical OHLCV retrieval,
//! and deduplicates streaming quotes so only materially-changed quotes are
//! forwarded.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Core types with no I/O
//!   - `symbol`: canonical symbols and the vendor symbol mapper
//!   - `streaming`: ticks, bars, resolutions
//!   - `subscription`: refcounted desired-symbol set
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: stream transport, OHLCV endpoint, aggregator boundaries
//!   - `services`: hello scheduler, stream dispatcher, history paginator,
//!     feed facade
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `coinapi`: WebSocket transport and REST OHLCV adapters
//!   - `config`: environment-driven configuration
//!
//! # Data Flow
//!
//! ```text
//! subscribe/unsubscribe ──► Hello Scheduler ──filter──► stream transport
//! stream transport ──event channel──► Dispatcher ──tick──► aggregator
//! history request ──► Paginator ──window──► REST endpoint ──bars──► caller
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core types with no external dependencies.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::streaming::{QuoteTick, Resolution, Tick, TickType, TradeBar, TradeTick};
pub use domain::subscription::{SubscriptionConfig, SubscriptionSet};
pub use domain::symbol::{CanonicalSymbol, Market, SecurityType, SymbolMapError, SymbolMapper};

// Ports
pub use application::ports::{
    Aggregator, Hello, OhlcvEndpoint, OhlcvPage, OhlcvRequest, OhlcvRow, QuoteEvent,
    RateLimitUsage, RestError, StreamEvent, StreamEventReceiver, StreamEventSender,
    StreamTransport, TradeEvent, TransportError,
};

// Services
pub use application::services::{
    CoinApiFeed, CyclePhase, DEFAULT_BARS_PER_REQUEST, DispatcherStats, HelloScheduler,
    HistoryClient, HistoryRequest, SchedulerSettings, StreamDispatcher,
};

// Infrastructure
pub use infrastructure::coinapi::{CoinApiRestClient, CoinApiWsTransport};
pub use infrastructure::config::{BridgeConfig, CoinApiProduct, ConfigError};
