//! Canonical Symbol Types
//!
//! The host engine identifies an instrument by a normalized
//! (ticker, market, security type) triple. The vendor identifies the same
//! instrument by an exchange-specific symbol id string such as
//! `COINBASE_SPOT_BTC_USD`. Translation between the two lives in
//! [`mapper`].

pub mod mapper;

pub use mapper::{SymbolMapError, SymbolMapper};

use std::fmt;

// =============================================================================
// Markets
// =============================================================================

/// Markets (exchanges) the host engine can route through this bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Market {
    /// Binance spot and perpetual futures.
    Binance,
    /// Bitfinex spot.
    Bitfinex,
    /// Coinbase spot.
    Coinbase,
    /// Kraken spot.
    Kraken,
}

impl Market {
    /// All supported markets.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Binance, Self::Bitfinex, Self::Coinbase, Self::Kraken]
    }

    /// The host engine's lowercase market name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Binance => "binance",
            Self::Bitfinex => "bitfinex",
            Self::Coinbase => "coinbase",
            Self::Kraken => "kraken",
        }
    }

    /// Parse a host market name (case-insensitive).
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|market| market.as_str().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Security Types
// =============================================================================

/// Security classes the host engine models.
///
/// The vendor carries several instrument kinds in its symbol universe; this
/// bridge serves [`Spot`](Self::Spot) and
/// [`PerpetualFuture`](Self::PerpetualFuture) only. Anything else is rejected
/// at the mapping boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecurityType {
    /// Spot currency pair.
    Spot,
    /// Perpetual future on a currency pair.
    PerpetualFuture,
    /// Dated future (not served by this bridge).
    Future,
    /// Option (not served by this bridge).
    Option,
    /// Index (not served by this bridge).
    Index,
}

impl SecurityType {
    /// Whether this bridge can stream and backfill the security type.
    #[must_use]
    pub const fn is_supported(&self) -> bool {
        matches!(self, Self::Spot | Self::PerpetualFuture)
    }
}

// =============================================================================
// Canonical Symbol
// =============================================================================

/// The host engine's normalized instrument identifier.
///
/// Immutable value type with structural equality; used as a map key
/// throughout the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalSymbol {
    /// Concatenated base+quote ticker, e.g. `BTCUSD`.
    pub ticker: String,
    /// Market the instrument trades on.
    pub market: Market,
    /// Security type of the instrument.
    pub security_type: SecurityType,
}

impl CanonicalSymbol {
    /// Create a canonical symbol.
    #[must_use]
    pub fn new(ticker: impl Into<String>, market: Market, security_type: SecurityType) -> Self {
        Self {
            ticker: ticker.into(),
            market,
            security_type,
        }
    }

    /// Create a spot symbol.
    #[must_use]
    pub fn spot(ticker: impl Into<String>, market: Market) -> Self {
        Self::new(ticker, market, SecurityType::Spot)
    }

    /// Create a perpetual-future symbol.
    #[must_use]
    pub fn perpetual(ticker: impl Into<String>, market: Market) -> Self {
        Self::new(ticker, market, SecurityType::PerpetualFuture)
    }
}

impl fmt::Display for CanonicalSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.ticker, self.market)
    }
}

// =============================================================================
// Ticker Decomposition
// =============================================================================

/// Quote currencies recognized when splitting a concatenated ticker.
///
/// Order matters: longer codes come first so `BTCUSDT` splits as BTC/USDT
/// rather than failing on a dangling `T`.
const QUOTE_CURRENCIES: &[&str] = &[
    "USDT", "USDC", "BUSD", "TUSD", "USD", "EUR", "GBP", "JPY", "KRW", "AUD", "CAD", "CHF", "BTC",
    "ETH", "BNB", "DAI",
];

/// Split a concatenated base+quote ticker into its two currencies.
///
/// Returns `None` when no known quote currency terminates the ticker.
#[must_use]
pub fn split_ticker(ticker: &str) -> Option<(&str, &str)> {
    QUOTE_CURRENCIES.iter().find_map(|quote| {
        ticker
            .strip_suffix(quote)
            .filter(|base| !base.is_empty())
            .map(|base| (base, *quote))
    })
}
