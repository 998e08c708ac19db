//! Historical Pagination Integration Tests
//!
//! Runs the paginator against a scripted endpoint: window sizing, empty
//! windows, transport failures, and precondition rejections.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration as TimeDelta, TimeZone, Utc};
use futures::StreamExt;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use test_case::test_case;

use coinapi_bridge::{
    CanonicalSymbol, HistoryClient, HistoryRequest, Market, OhlcvEndpoint, OhlcvPage,
    OhlcvRequest, OhlcvRow, RateLimitUsage, Resolution, RestError, SecurityType, TickType,
    TradeBar,
};

/// Endpoint double generating one bar per period inside each window.
struct ScriptedEndpoint {
    calls: Mutex<Vec<OhlcvRequest>>,
    /// No bars are generated at or after this instant.
    data_end: DateTime<Utc>,
    /// 1-based call index answered with zero rows.
    empty_on: Option<usize>,
    /// 1-based call index answered with an error.
    fail_on: Option<usize>,
}

impl ScriptedEndpoint {
    fn new(data_end: DateTime<Utc>) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            data_end,
            empty_on: None,
            fail_on: None,
        }
    }

    fn calls(&self) -> Vec<OhlcvRequest> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl OhlcvEndpoint for ScriptedEndpoint {
    async fn fetch_window(&self, request: &OhlcvRequest) -> Result<OhlcvPage, RestError> {
        let call_index = {
            let mut calls = self.calls.lock();
            calls.push(request.clone());
            calls.len()
        };

        if self.fail_on == Some(call_index) {
            return Err(RestError::Status(503));
        }

        let rate_limit = RateLimitUsage {
            limit: Some(1_000),
            used: Some(call_index as i64),
            remaining: Some(1_000 - call_index as i64),
        };

        if self.empty_on == Some(call_index) {
            return Ok(OhlcvPage {
                rows: vec![],
                rate_limit,
            });
        }

        let period = TimeDelta::seconds(match request.period_id {
            "1SEC" => 1,
            "1MIN" => 60,
            "1HRS" => 3_600,
            _ => 86_400,
        });

        let mut rows = Vec::new();
        let mut time = request.time_start;
        while time < request.time_end && time < self.data_end && rows.len() < request.limit {
            rows.push(OhlcvRow {
                time_period_start: time,
                price_open: Decimal::new(100, 0),
                price_high: Decimal::new(101, 0),
                price_low: Decimal::new(99, 0),
                price_close: Decimal::new(100, 0),
                volume_traded: Decimal::ONE,
            });
            time += period;
        }

        Ok(OhlcvPage { rows, rate_limit })
    }
}

fn day(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, 0, 0, 0).unwrap()
}

fn minute_request(start: DateTime<Utc>, end: DateTime<Utc>) -> HistoryRequest {
    HistoryRequest {
        symbol: CanonicalSymbol::spot("BTCUSD", Market::Coinbase),
        resolution: Resolution::Minute,
        start_utc: start,
        end_utc: end,
        tick_type: TickType::Trade,
    }
}

fn assert_monotonic(bars: &[TradeBar], period_seconds: i64) {
    for pair in bars.windows(2) {
        let gap = (pair[1].time - pair[0].time).num_seconds();
        assert!(gap >= 0, "timestamps must be non-decreasing");
        assert!(
            gap <= period_seconds,
            "gap of {gap}s exceeds one resolution period"
        );
    }
}

// =============================================================================
// Window sizing
// =============================================================================

#[tokio::test]
async fn two_day_minute_range_fits_one_window() {
    let endpoint = Arc::new(ScriptedEndpoint::new(day(3)));
    let client = Arc::new(HistoryClient::new(
        Arc::clone(&endpoint) as Arc<dyn OhlcvEndpoint>
    ));

    let bars: Vec<TradeBar> = client.fetch(minute_request(day(1), day(3))).collect().await;

    let calls = endpoint.calls();
    assert_eq!(calls.len(), 1, "2880 bars fit inside one 10000-bar window");
    assert_eq!(calls[0].symbol_id, "COINBASE_SPOT_BTC_USD");
    assert_eq!(calls[0].period_id, "1MIN");
    assert_eq!(calls[0].limit, 10_000);

    assert_eq!(bars.len(), 2_880);
    assert_monotonic(&bars, 60);
    assert_eq!(bars[0].symbol, CanonicalSymbol::spot("BTCUSD", Market::Coinbase));
    assert_eq!(bars[0].resolution, Resolution::Minute);
}

#[tokio::test]
async fn thirty_day_minute_range_pages_within_the_bar_limit() {
    let endpoint = Arc::new(ScriptedEndpoint::new(day(31)));
    let client = Arc::new(HistoryClient::new(
        Arc::clone(&endpoint) as Arc<dyn OhlcvEndpoint>
    ));

    let bars: Vec<TradeBar> = client.fetch(minute_request(day(1), day(31))).collect().await;

    let calls = endpoint.calls();
    assert_eq!(calls.len(), 5, "43200 bars at 10000 per window");
    for call in &calls {
        let window_bars = (call.time_end - call.time_start).num_seconds() / 60;
        assert!(window_bars <= 10_000, "no window may exceed the bar limit");
    }

    assert_eq!(bars.len(), 43_200);
    assert_monotonic(&bars, 60);
}

#[tokio::test]
async fn windows_advance_contiguously() {
    let endpoint = Arc::new(ScriptedEndpoint::new(day(31)));
    let client = Arc::new(HistoryClient::with_bar_limit(
        Arc::clone(&endpoint) as Arc<dyn OhlcvEndpoint>,
        1_000,
    ));

    let _bars: Vec<TradeBar> = client
        .fetch(minute_request(day(1), day(3)))
        .collect()
        .await;

    let calls = endpoint.calls();
    assert_eq!(calls.len(), 3, "2880 bars at 1000 per window");
    for pair in calls.windows(2) {
        assert_eq!(
            pair[0].time_end, pair[1].time_start,
            "each window starts where the previous ended"
        );
    }
}

// =============================================================================
// Degenerate windows
// =============================================================================

#[tokio::test]
async fn empty_window_is_skipped_not_fatal() {
    let endpoint = Arc::new(ScriptedEndpoint {
        empty_on: Some(2),
        ..ScriptedEndpoint::new(day(31))
    });
    let client = Arc::new(HistoryClient::with_bar_limit(
        Arc::clone(&endpoint) as Arc<dyn OhlcvEndpoint>,
        1_000,
    ));

    let bars: Vec<TradeBar> = client.fetch(minute_request(day(1), day(3))).collect().await;

    assert_eq!(endpoint.calls().len(), 3, "the walk continues past the empty window");
    assert_eq!(bars.len(), 1_880, "only the empty window's bars are missing");
}

#[tokio::test]
async fn transport_failure_ends_the_sequence_after_yielded_bars() {
    let endpoint = Arc::new(ScriptedEndpoint {
        fail_on: Some(2),
        ..ScriptedEndpoint::new(day(31))
    });
    let client = Arc::new(HistoryClient::with_bar_limit(
        Arc::clone(&endpoint) as Arc<dyn OhlcvEndpoint>,
        1_000,
    ));

    let bars: Vec<TradeBar> = client.fetch(minute_request(day(1), day(3))).collect().await;

    assert_eq!(endpoint.calls().len(), 2, "no retries after a failed call");
    assert_eq!(bars.len(), 1_000, "bars already produced still stand");
}

// =============================================================================
// Precondition rejections
// =============================================================================

#[tokio::test]
async fn inverted_range_yields_nothing_without_a_network_call() {
    let endpoint = Arc::new(ScriptedEndpoint::new(day(31)));
    let client = Arc::new(HistoryClient::new(
        Arc::clone(&endpoint) as Arc<dyn OhlcvEndpoint>
    ));

    let bars: Vec<TradeBar> = client.fetch(minute_request(day(3), day(1))).collect().await;

    assert!(bars.is_empty());
    assert!(endpoint.calls().is_empty());
}

#[test_case(TickType::Quote; "quote bars are unsupported")]
#[test_case(TickType::OpenInterest; "open interest is unsupported")]
fn non_trade_kinds_yield_empty(tick_type: TickType) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    runtime.block_on(async {
        let endpoint = Arc::new(ScriptedEndpoint::new(day(31)));
        let client = Arc::new(HistoryClient::new(
            Arc::clone(&endpoint) as Arc<dyn OhlcvEndpoint>
        ));

        let request = HistoryRequest {
            tick_type,
            ..minute_request(day(1), day(3))
        };
        let bars: Vec<TradeBar> = client.fetch(request).collect().await;

        assert!(bars.is_empty());
        assert!(endpoint.calls().is_empty());
    });
}

#[tokio::test]
async fn tick_resolution_is_rejected() {
    let endpoint = Arc::new(ScriptedEndpoint::new(day(31)));
    let client = Arc::new(HistoryClient::new(
        Arc::clone(&endpoint) as Arc<dyn OhlcvEndpoint>
    ));

    let request = HistoryRequest {
        resolution: Resolution::Tick,
        ..minute_request(day(1), day(3))
    };
    let bars: Vec<TradeBar> = client.fetch(request).collect().await;

    assert!(bars.is_empty());
    assert!(endpoint.calls().is_empty());
}

#[tokio::test]
async fn unsupported_security_type_is_rejected() {
    let endpoint = Arc::new(ScriptedEndpoint::new(day(31)));
    let client = Arc::new(HistoryClient::new(
        Arc::clone(&endpoint) as Arc<dyn OhlcvEndpoint>
    ));

    let request = HistoryRequest {
        symbol: CanonicalSymbol::new("BTCUSD", Market::Coinbase, SecurityType::Index),
        ..minute_request(day(1), day(3))
    };
    let bars: Vec<TradeBar> = client.fetch(request).collect().await;

    assert!(bars.is_empty());
    assert!(endpoint.calls().is_empty());
}

// =============================================================================
// Symbol mapping
// =============================================================================

#[tokio::test]
async fn perpetual_history_maps_to_the_futures_exchange_code() {
    let endpoint = Arc::new(ScriptedEndpoint::new(day(31)));
    let client = Arc::new(HistoryClient::new(
        Arc::clone(&endpoint) as Arc<dyn OhlcvEndpoint>
    ));

    let request = HistoryRequest {
        symbol: CanonicalSymbol::perpetual("BTCUSDT", Market::Binance),
        ..minute_request(day(1), day(2))
    };
    let bars: Vec<TradeBar> = client.fetch(request).collect().await;

    assert_eq!(endpoint.calls()[0].symbol_id, "BINANCEFTS_PERP_BTC_USDT");
    assert_eq!(
        bars[0].symbol,
        CanonicalSymbol::perpetual("BTCUSDT", Market::Binance),
        "emitted bars carry the original canonical symbol"
    );
}
