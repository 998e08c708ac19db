//! Historical OHLCV Paginator
//!
//! Walks a requested time range in vendor-limit-sized windows, issuing one
//! REST call per window and emitting the parsed bars as a lazy, forward-only
//! sequence. Windows are sequential — each call's bounds depend only on the
//! previous window's size — and advancement is unconditional so an empty
//! window can never stall the walk.
//!
//! Unsupported parameters (tick resolution, non-trade data kinds, inverted
//! ranges) are recovered locally: the sequence is empty and the condition is
//! logged. A REST failure mid-range ends the sequence after whatever bars
//! were already produced; there are no retries here.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_stream::stream;
use chrono::{DateTime, Duration as TimeDelta, Utc};
use futures::stream::BoxStream;

use crate::application::ports::{OhlcvEndpoint, OhlcvRequest, RateLimitUsage};
use crate::domain::streaming::{Resolution, TickType, TradeBar};
use crate::domain::symbol::{CanonicalSymbol, SymbolMapper};

/// Vendor cap on bars per historical request.
pub const DEFAULT_BARS_PER_REQUEST: usize = 10_000;

// =============================================================================
// History Request
// =============================================================================

/// A bulk historical retrieval request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRequest {
    /// Canonical symbol to backfill.
    pub symbol: CanonicalSymbol,
    /// Bar resolution.
    pub resolution: Resolution,
    /// Range start, UTC.
    pub start_utc: DateTime<Utc>,
    /// Range end, UTC.
    pub end_utc: DateTime<Utc>,
    /// Kind of bars requested; only trade bars are served.
    pub tick_type: TickType,
}

/// A validated walk over a request's range.
struct WindowWalk {
    vendor_id: String,
    period_id: &'static str,
    window_span: TimeDelta,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    last_bar_start: DateTime<Utc>,
}

// =============================================================================
// History Client
// =============================================================================

/// Windowed historical OHLCV retriever.
///
/// Cheap to clone; clones share the endpoint and the warn-once state.
#[derive(Clone)]
pub struct HistoryClient {
    endpoint: Arc<dyn OhlcvEndpoint>,
    mapper: SymbolMapper,
    bars_per_request: usize,
    quote_warning_logged: Arc<AtomicBool>,
}

impl HistoryClient {
    /// Create a client with the vendor's default per-request bar limit.
    #[must_use]
    pub fn new(endpoint: Arc<dyn OhlcvEndpoint>) -> Self {
        Self::with_bar_limit(endpoint, DEFAULT_BARS_PER_REQUEST)
    }

    /// Create a client with an explicit per-request bar limit.
    #[must_use]
    pub fn with_bar_limit(endpoint: Arc<dyn OhlcvEndpoint>, bars_per_request: usize) -> Self {
        Self {
            endpoint,
            mapper: SymbolMapper::new(),
            bars_per_request: bars_per_request.max(1),
            quote_warning_logged: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Fetch the requested range as a lazy sequence of trade bars.
    ///
    /// The sequence is forward-only and non-restartable; no network call is
    /// made before the first poll, and unsupported parameters yield an empty
    /// sequence.
    #[must_use]
    pub fn fetch(&self, request: HistoryRequest) -> BoxStream<'static, TradeBar> {
        let Some(mut walk) = self.validate(&request) else {
            return Box::pin(futures::stream::empty());
        };

        let client = self.clone();

        Box::pin(stream! {
            while walk.window_start < walk.last_bar_start {
                let window = OhlcvRequest {
                    symbol_id: walk.vendor_id.clone(),
                    period_id: walk.period_id,
                    limit: client.bars_per_request,
                    time_start: walk.window_start,
                    // The final window's span can overshoot the range; the
                    // request never asks past the rounded end.
                    time_end: walk.window_end.min(walk.last_bar_start),
                };

                match client.endpoint.fetch_window(&window).await {
                    Ok(page) => {
                        client.record_rate_limit(&page.rate_limit);

                        if page.rows.is_empty() {
                            // Thin trading periods legitimately return no
                            // rows; keep walking.
                            tracing::warn!(
                                symbol = %request.symbol,
                                window_start = %window.time_start,
                                window_end = %window.time_end,
                                "no data for window"
                            );
                        }

                        for row in page.rows {
                            yield TradeBar {
                                symbol: request.symbol.clone(),
                                time: row.time_period_start,
                                open: row.price_open,
                                high: row.price_high,
                                low: row.price_low,
                                close: row.price_close,
                                volume: row.volume_traded,
                                resolution: request.resolution,
                            };
                        }
                    }
                    Err(error) => {
                        tracing::error!(
                            symbol = %request.symbol,
                            window_start = %window.time_start,
                            error = %error,
                            "historical request failed, ending sequence"
                        );
                        break;
                    }
                }

                // Advancement is unconditional regardless of bar count.
                walk.window_start = walk.window_end;
                walk.window_end += walk.window_span;
            }
        })
    }

    /// Check the request's preconditions and lay out its first window.
    ///
    /// `None` means the request is rejected: the condition is logged and the
    /// sequence stays empty without any network call.
    fn validate(&self, request: &HistoryRequest) -> Option<WindowWalk> {
        if !request.symbol.security_type.is_supported() {
            tracing::error!(
                symbol = %request.symbol,
                security_type = ?request.symbol.security_type,
                "history request for unsupported security type"
            );
            return None;
        }

        match request.tick_type {
            TickType::Trade => {}
            TickType::Quote => {
                // The vendor has no historical quote bars; say so once
                // instead of flooding the log on every backfill.
                if !self.quote_warning_logged.swap(true, Ordering::Relaxed) {
                    tracing::error!("no historical quote bars, only trade bars");
                }
                return None;
            }
            TickType::OpenInterest => {
                tracing::error!("open interest history is not available");
                return None;
            }
        }

        let (Some(period_seconds), Some(period_id)) = (
            request.resolution.period_seconds(),
            request.resolution.period_code(),
        ) else {
            tracing::error!("no historical ticks, only OHLCV timeseries");
            return None;
        };

        if request.end_utc < request.start_utc {
            tracing::warn!(
                start = %request.start_utc,
                end = %request.end_utc,
                "history range ends before it starts"
            );
            return None;
        }

        let vendor_id = match self.mapper.to_vendor_id(&request.symbol) {
            Ok(vendor_id) => vendor_id,
            Err(error) => {
                tracing::error!(symbol = %request.symbol, error = %error, "cannot map history symbol");
                return None;
            }
        };

        // Round the range onto resolution boundaries: the first bar starts
        // at or after the requested start, the last bar starts before the
        // requested end.
        let last_bar_start = round_down(request.end_utc, period_seconds);
        let window_start = round_up(request.start_utc, period_seconds);

        let window_span = TimeDelta::seconds(period_seconds * self.bars_per_request as i64);
        let mut window_end = last_bar_start;
        let requested_bars = (window_end - window_start).num_seconds() / period_seconds;
        if requested_bars > self.bars_per_request as i64 {
            window_end = window_start + window_span;
        }

        Some(WindowWalk {
            vendor_id,
            period_id,
            window_span,
            window_start,
            window_end,
            last_bar_start,
        })
    }

    /// Record the endpoint's rate-limit accounting. Observability only.
    fn record_rate_limit(&self, usage: &RateLimitUsage) {
        tracing::debug!(
            limit = ?usage.limit,
            used = ?usage.used,
            remaining = ?usage.remaining,
            "rest rate limit usage"
        );

        if let Some(limit) = usage.limit {
            metrics::gauge!("coinapi_rest_rate_limit_total").set(limit as f64);
        }
        if let Some(used) = usage.used {
            metrics::gauge!("coinapi_rest_rate_limit_used").set(used as f64);
        }
        if let Some(remaining) = usage.remaining {
            metrics::gauge!("coinapi_rest_rate_limit_remaining").set(remaining as f64);
        }
    }
}

/// Round a timestamp down to the previous resolution boundary.
fn round_down(time: DateTime<Utc>, period_seconds: i64) -> DateTime<Utc> {
    let seconds = time.timestamp();
    let rounded = seconds - seconds.rem_euclid(period_seconds);
    DateTime::from_timestamp(rounded, 0).unwrap_or(time)
}

/// Round a timestamp up to the next resolution boundary.
fn round_up(time: DateTime<Utc>, period_seconds: i64) -> DateTime<Utc> {
    let rounded = round_down(time, period_seconds);
    if rounded < time {
        rounded + TimeDelta::seconds(period_seconds)
    } else {
        rounded
    }
}
