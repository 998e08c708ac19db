//! Stream Dispatcher
//!
//! Consumes decoded trade/quote events from the transport channel, resolves
//! vendor symbol ids to canonical symbols through a memoized cache, drops
//! quotes whose prices did not change, and forwards the resulting ticks to
//! the aggregator.
//!
//! Market data for a symbol this process does not understand is dropped
//! silently after one logged resolution failure; it must never take down
//! ingestion for the other symbols.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{Aggregator, QuoteEvent, StreamEvent, StreamEventReceiver, TradeEvent};
use crate::domain::streaming::{QuoteTick, Tick, TradeTick};
use crate::domain::symbol::{CanonicalSymbol, SecurityType, SymbolMapper};

/// Last known quote prices and sizes for one vendor symbol id.
#[derive(Debug, Clone, PartialEq, Eq)]
struct QuoteSnapshot {
    bid_price: Decimal,
    bid_size: Decimal,
    ask_price: Decimal,
    ask_size: Decimal,
}

/// Cache and forwarding statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatcherStats {
    /// Vendor ids resolved to a canonical symbol.
    pub resolved_symbols: usize,
    /// Vendor ids cached as unresolvable.
    pub unresolvable_symbols: usize,
    /// Symbols with a tracked quote snapshot.
    pub tracked_quotes: usize,
}

/// Stream event dispatcher.
///
/// Both caches are instance state injected at construction, so multiple
/// dispatchers can coexist (and be tested) without sharing anything.
pub struct StreamDispatcher {
    aggregator: Arc<dyn Aggregator>,
    mapper: SymbolMapper,
    /// Vendor id → canonical symbol, with `None` marking "unresolvable" so
    /// the mapping error is logged once rather than per event.
    resolved: RwLock<HashMap<String, Option<CanonicalSymbol>>>,
    /// Vendor id → last forwarded quote.
    last_quotes: RwLock<HashMap<String, QuoteSnapshot>>,
}

impl StreamDispatcher {
    /// Create a dispatcher forwarding into `aggregator`.
    #[must_use]
    pub fn new(aggregator: Arc<dyn Aggregator>) -> Self {
        Self {
            aggregator,
            mapper: SymbolMapper::new(),
            resolved: RwLock::new(HashMap::new()),
            last_quotes: RwLock::new(HashMap::new()),
        }
    }

    /// Consume events until the channel closes or `cancel` fires.
    pub async fn run(&self, mut events: StreamEventReceiver, cancel: CancellationToken) {
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    tracing::info!("dispatcher cancelled");
                    return;
                }
                event = events.recv() => {
                    let Some(event) = event else {
                        tracing::info!("event channel closed");
                        return;
                    };
                    self.handle_event(&event);
                }
            }
        }
    }

    /// Dispatch a single event.
    pub fn handle_event(&self, event: &StreamEvent) {
        match event {
            StreamEvent::Connected => tracing::info!("stream connected"),
            StreamEvent::Disconnected => tracing::warn!("stream disconnected"),
            StreamEvent::Error(message) => {
                tracing::error!(message = %message, "stream error");
            }
            StreamEvent::Trade(trade) => self.on_trade(trade),
            StreamEvent::Quote(quote) => self.on_quote(quote),
        }
    }

    /// Forward a trade tick. Trades have no dedup requirement; every trade
    /// is a new fact.
    fn on_trade(&self, event: &TradeEvent) {
        let Some(symbol) = self.resolve(&event.symbol_id) else {
            return;
        };

        metrics::counter!("coinapi_bridge_trades_forwarded_total").increment(1);
        self.aggregator.update(Tick::Trade(TradeTick {
            symbol,
            time: event.time,
            price: event.price,
            size: event.size,
        }));
    }

    /// Forward a quote tick only when its bid or ask price differs from the
    /// stored snapshot. Size-only changes are dropped silently.
    fn on_quote(&self, event: &QuoteEvent) {
        let price_changed = {
            let quotes = self.last_quotes.read();
            quotes.get(&event.symbol_id).is_none_or(|previous| {
                previous.bid_price != event.bid_price || previous.ask_price != event.ask_price
            })
        };

        if !price_changed {
            metrics::counter!("coinapi_bridge_quotes_deduplicated_total").increment(1);
            return;
        }

        let Some(symbol) = self.resolve(&event.symbol_id) else {
            return;
        };

        self.last_quotes.write().insert(
            event.symbol_id.clone(),
            QuoteSnapshot {
                bid_price: event.bid_price,
                bid_size: event.bid_size,
                ask_price: event.ask_price,
                ask_size: event.ask_size,
            },
        );

        metrics::counter!("coinapi_bridge_quotes_forwarded_total").increment(1);
        self.aggregator.update(Tick::Quote(QuoteTick {
            symbol,
            time: event.time,
            bid_price: event.bid_price,
            bid_size: event.bid_size,
            ask_price: event.ask_price,
            ask_size: event.ask_size,
        }));
    }

    /// Resolve a vendor id through the memoized cache.
    ///
    /// A failed mapping is cached as unresolvable so the error is logged
    /// once per symbol, not once per event.
    fn resolve(&self, symbol_id: &str) -> Option<CanonicalSymbol> {
        if let Some(cached) = self.resolved.read().get(symbol_id) {
            return cached.clone();
        }

        let security_type = if symbol_id.contains("_PERP_") {
            SecurityType::PerpetualFuture
        } else {
            SecurityType::Spot
        };

        let result = match self.mapper.to_canonical(symbol_id, security_type) {
            Ok(symbol) => Some(symbol),
            Err(error) => {
                tracing::error!(symbol_id, error = %error, "cannot resolve vendor symbol id");
                metrics::counter!("coinapi_bridge_unresolvable_symbols_total").increment(1);
                None
            }
        };

        self.resolved
            .write()
            .insert(symbol_id.to_string(), result.clone());
        result
    }

    /// Current cache statistics.
    #[must_use]
    pub fn stats(&self) -> DispatcherStats {
        let resolved = self.resolved.read();
        DispatcherStats {
            resolved_symbols: resolved.values().filter(|entry| entry.is_some()).count(),
            unresolvable_symbols: resolved.values().filter(|entry| entry.is_none()).count(),
            tracked_quotes: self.last_quotes.read().len(),
        }
    }
}
