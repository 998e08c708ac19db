//! Streaming Market Data Types
//!
//! Domain types for resolved market data: ticks flowing to the aggregator
//! and OHLCV bars produced by historical retrieval.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::symbol::CanonicalSymbol;

// =============================================================================
// Resolutions and Tick Types
// =============================================================================

/// Bar resolutions the host engine can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resolution {
    /// Individual ticks (streaming only; the vendor has no tick history).
    Tick,
    /// One-second bars.
    Second,
    /// One-minute bars.
    Minute,
    /// One-hour bars.
    Hour,
    /// One-day bars.
    Daily,
}

impl Resolution {
    /// Bar period in seconds, `None` for tick resolution.
    #[must_use]
    pub const fn period_seconds(&self) -> Option<i64> {
        match self {
            Self::Tick => None,
            Self::Second => Some(1),
            Self::Minute => Some(60),
            Self::Hour => Some(3_600),
            Self::Daily => Some(86_400),
        }
    }

    /// The vendor's period code for historical OHLCV requests, `None` for
    /// tick resolution.
    #[must_use]
    pub const fn period_code(&self) -> Option<&'static str> {
        match self {
            Self::Tick => None,
            Self::Second => Some("1SEC"),
            Self::Minute => Some("1MIN"),
            Self::Hour => Some("1HRS"),
            Self::Daily => Some("1DAY"),
        }
    }
}

/// Kind of data a subscription or history request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TickType {
    /// Executed trades.
    Trade,
    /// Top-of-book quotes.
    Quote,
    /// Open interest (never served by this bridge).
    OpenInterest,
}

// =============================================================================
// Ticks
// =============================================================================

/// A resolved trade tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeTick {
    /// Canonical symbol the trade occurred on.
    pub symbol: CanonicalSymbol,
    /// Exchange timestamp of the trade.
    pub time: DateTime<Utc>,
    /// Trade price.
    pub price: Decimal,
    /// Trade size.
    pub size: Decimal,
}

/// A resolved top-of-book quote tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteTick {
    /// Canonical symbol the quote is for.
    pub symbol: CanonicalSymbol,
    /// Exchange timestamp of the quote.
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

/// A resolved, deduplicated tick handed to the aggregator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tick {
    /// Trade tick.
    Trade(TradeTick),
    /// Quote tick.
    Quote(QuoteTick),
}

impl Tick {
    /// Canonical symbol the tick belongs to.
    #[must_use]
    pub const fn symbol(&self) -> &CanonicalSymbol {
        match self {
            Self::Trade(tick) => &tick.symbol,
            Self::Quote(tick) => &tick.symbol,
        }
    }

    /// Exchange timestamp of the tick.
    #[must_use]
    pub const fn time(&self) -> DateTime<Utc> {
        match self {
            Self::Trade(tick) => tick.time,
            Self::Quote(tick) => tick.time,
        }
    }
}

// =============================================================================
// Bars
// =============================================================================

/// An OHLCV trade bar produced by historical retrieval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeBar {
    /// Canonical symbol the bar belongs to.
    pub symbol: CanonicalSymbol,
    /// Start of the bar period.
    pub time: DateTime<Utc>,
    /// Opening price.
    pub open: Decimal,
    /// Highest price.
    pub high: Decimal,
    /// Lowest price.
    pub low: Decimal,
    /// Closing price.
    pub close: Decimal,
    /// Traded volume.
    pub volume: Decimal,
    /// Resolution of the bar.
    pub resolution: Resolution,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_codes_cover_bar_resolutions() {
        assert_eq!(Resolution::Second.period_code(), Some("1SEC"));
        assert_eq!(Resolution::Minute.period_code(), Some("1MIN"));
        assert_eq!(Resolution::Hour.period_code(), Some("1HRS"));
        assert_eq!(Resolution::Daily.period_code(), Some("1DAY"));
        assert_eq!(Resolution::Tick.period_code(), None);
    }

    #[test]
    fn period_seconds_match_codes() {
        assert_eq!(Resolution::Minute.period_seconds(), Some(60));
        assert_eq!(Resolution::Daily.period_seconds(), Some(86_400));
        assert_eq!(Resolution::Tick.period_seconds(), None);
    }
}
