//! Application Services
//!
//! Services that orchestrate domain logic across the ports:
//!
//! - `scheduler`: coalesces subscription changes into rate-limited hellos
//! - `dispatcher`: resolves and deduplicates inbound stream events
//! - `history`: paginates bulk historical OHLCV retrieval
//! - `feed`: the facade the host engine drives

pub mod dispatcher;
pub mod feed;
pub mod history;
pub mod scheduler;

pub use dispatcher::{DispatcherStats, StreamDispatcher};
pub use feed::CoinApiFeed;
pub use history::{DEFAULT_BARS_PER_REQUEST, HistoryClient, HistoryRequest};
pub use scheduler::{CyclePhase, HelloScheduler, SchedulerSettings};
