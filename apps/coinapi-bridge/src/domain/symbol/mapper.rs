//! Symbol Mapper
//!
//! Bidirectional translation between [`CanonicalSymbol`] and the vendor's
//! exchange-specific symbol ids.
//!
//! # Vendor id format
//!
//! - Spot: `EXCHANGE_SPOT_BASE_QUOTE` (e.g. `COINBASE_SPOT_BTC_USD`)
//! - Perpetual future: `EXCHANGE_PERP_BASE_QUOTE` (e.g.
//!   `BINANCEFTS_PERP_BTC_USDT`) — note the distinct futures exchange code.
//!
//! The mapping is driven by three static tables: market ⇄ exchange code
//! (separate spot and futures columns), security type ⇄ kind token, and a
//! per-exchange ticker alias table for currencies the vendor names
//! differently than the host engine. Aliases are scoped to an exchange; the
//! same raw ticker can be canonical elsewhere.

use super::{CanonicalSymbol, Market, SecurityType, split_ticker};

// =============================================================================
// Error Type
// =============================================================================

/// Errors produced when a symbol cannot be translated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SymbolMapError {
    /// The security type has no vendor representation.
    #[error("security type {0:?} is not supported by the vendor")]
    UnsupportedSecurityType(SecurityType),

    /// The market name has no configured exchange code.
    #[error("no exchange code configured for market '{0}'")]
    UnknownMarket(String),

    /// The market exists but has no exchange code for the security type
    /// (e.g. a perpetual future on a market with no futures venue).
    #[error("market {market} has no exchange code for {security_type:?}")]
    UnsupportedMarketForSecurityType {
        /// Market the mapping was requested for.
        market: Market,
        /// Security type the market cannot serve.
        security_type: SecurityType,
    },

    /// The vendor symbol id does not split into
    /// exchange/kind/base/quote segments.
    #[error("malformed vendor symbol id '{0}'")]
    MalformedVendorId(String),

    /// The canonical ticker does not decompose into base and quote
    /// currencies.
    #[error("cannot split ticker '{0}' into base and quote currencies")]
    InvalidTicker(String),
}

// =============================================================================
// Static Tables
// =============================================================================

/// Market ⇄ spot exchange code.
const SPOT_EXCHANGE_CODES: &[(Market, &str)] = &[
    (Market::Binance, "BINANCE"),
    (Market::Bitfinex, "BITFINEX"),
    (Market::Coinbase, "COINBASE"),
    (Market::Kraken, "KRAKEN"),
];

/// Market ⇄ futures exchange code. Markets absent here have no futures venue.
const FUTURES_EXCHANGE_CODES: &[(Market, &str)] = &[(Market::Binance, "BINANCEFTS")];

/// Vendor kind tokens for the mappable security types.
const KIND_SPOT: &str = "SPOT";
const KIND_PERP: &str = "PERP";

/// Per-exchange ticker aliases: (exchange code, vendor ticker, canonical
/// ticker). Forward and reverse lookups both go through this table, so every
/// entry round-trips.
const TICKER_ALIASES: &[(&str, &str, &str)] = &[
    ("BITFINEX", "BCHABC", "BCH"),
    ("BITFINEX", "BCHSV", "BSV"),
    ("BITFINEX", "ABS", "ABYSS"),
    ("BITFINEX", "UST", "USDT"),
];

fn spot_code(market: Market) -> &'static str {
    SPOT_EXCHANGE_CODES
        .iter()
        .find(|(m, _)| *m == market)
        .map_or("", |(_, code)| code)
}

fn futures_code(market: Market) -> Option<&'static str> {
    FUTURES_EXCHANGE_CODES
        .iter()
        .find(|(m, _)| *m == market)
        .map(|(_, code)| *code)
}

fn market_for_spot_code(code: &str) -> Option<Market> {
    SPOT_EXCHANGE_CODES
        .iter()
        .find(|(_, c)| *c == code)
        .map(|(m, _)| *m)
}

fn market_for_futures_code(code: &str) -> Option<Market> {
    FUTURES_EXCHANGE_CODES
        .iter()
        .find(|(_, c)| *c == code)
        .map(|(m, _)| *m)
}

fn vendor_to_canonical_ticker<'a>(exchange: &str, ticker: &'a str) -> &'a str {
    TICKER_ALIASES
        .iter()
        .find(|(e, vendor, _)| *e == exchange && *vendor == ticker)
        .map_or(ticker, |(_, _, canonical)| canonical)
}

fn canonical_to_vendor_ticker<'a>(exchange: &str, ticker: &'a str) -> &'a str {
    TICKER_ALIASES
        .iter()
        .find(|(e, _, canonical)| *e == exchange && *canonical == ticker)
        .map_or(ticker, |(_, vendor, _)| vendor)
}

// =============================================================================
// Mapper
// =============================================================================

/// Stateless bidirectional symbol translator.
///
/// All state is in the static tables above; the struct exists so the mapper
/// can be handed around as a value like any other collaborator.
#[derive(Debug, Clone, Copy, Default)]
pub struct SymbolMapper;

impl SymbolMapper {
    /// Create a mapper.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Translate a canonical symbol into the vendor symbol id.
    ///
    /// # Errors
    ///
    /// - [`SymbolMapError::UnsupportedSecurityType`] for anything other than
    ///   spot or perpetual future.
    /// - [`SymbolMapError::UnsupportedMarketForSecurityType`] when the market
    ///   has no futures exchange code and a perpetual future was requested.
    /// - [`SymbolMapError::InvalidTicker`] when the ticker does not split
    ///   into base and quote currencies.
    pub fn to_vendor_id(&self, symbol: &CanonicalSymbol) -> Result<String, SymbolMapError> {
        let (exchange, kind) = match symbol.security_type {
            SecurityType::Spot => (spot_code(symbol.market), KIND_SPOT),
            SecurityType::PerpetualFuture => {
                let code = futures_code(symbol.market).ok_or(
                    SymbolMapError::UnsupportedMarketForSecurityType {
                        market: symbol.market,
                        security_type: symbol.security_type,
                    },
                )?;
                (code, KIND_PERP)
            }
            other => return Err(SymbolMapError::UnsupportedSecurityType(other)),
        };

        let (base, quote) = split_ticker(&symbol.ticker)
            .ok_or_else(|| SymbolMapError::InvalidTicker(symbol.ticker.clone()))?;

        let base = canonical_to_vendor_ticker(exchange, base);
        let quote = canonical_to_vendor_ticker(exchange, quote);

        Ok(format!("{exchange}_{kind}_{base}_{quote}"))
    }

    /// Translate a vendor symbol id back into a canonical symbol.
    ///
    /// The security type selects which exchange-code table resolves the
    /// leading segment; callers that only hold the raw id can derive it from
    /// the kind token (`_PERP_` means perpetual future).
    ///
    /// # Errors
    ///
    /// - [`SymbolMapError::MalformedVendorId`] when the id does not split
    ///   into exchange/kind/base/quote or the kind token contradicts the
    ///   security type.
    /// - [`SymbolMapError::UnknownMarket`] when the exchange code is not
    ///   configured.
    /// - [`SymbolMapError::UnsupportedSecurityType`] for anything other than
    ///   spot or perpetual future.
    pub fn to_canonical(
        &self,
        vendor_id: &str,
        security_type: SecurityType,
    ) -> Result<CanonicalSymbol, SymbolMapError> {
        let parts: Vec<&str> = vendor_id.split('_').collect();
        let [exchange, kind, base, quote] = parts.as_slice() else {
            return Err(SymbolMapError::MalformedVendorId(vendor_id.to_string()));
        };

        let (expected_kind, market) = match security_type {
            SecurityType::Spot => (KIND_SPOT, market_for_spot_code(exchange)),
            SecurityType::PerpetualFuture => (KIND_PERP, market_for_futures_code(exchange)),
            other => return Err(SymbolMapError::UnsupportedSecurityType(other)),
        };

        if *kind != expected_kind {
            return Err(SymbolMapError::MalformedVendorId(vendor_id.to_string()));
        }

        let market =
            market.ok_or_else(|| SymbolMapError::UnknownMarket((*exchange).to_string()))?;

        let base = vendor_to_canonical_ticker(exchange, base);
        let quote = vendor_to_canonical_ticker(exchange, quote);

        Ok(CanonicalSymbol::new(
            format!("{base}{quote}"),
            market,
            security_type,
        ))
    }

    /// Exchange code for a host market name, used when subscribing to whole
    /// markets rather than individual symbols.
    ///
    /// # Errors
    ///
    /// [`SymbolMapError::UnknownMarket`] when the name has no configured
    /// exchange code.
    pub fn exchange_id(&self, market_name: &str) -> Result<&'static str, SymbolMapError> {
        Market::parse(market_name)
            .map(spot_code)
            .ok_or_else(|| SymbolMapError::UnknownMarket(market_name.to_string()))
    }
}
