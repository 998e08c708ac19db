//! Hello Scheduler
//!
//! Coalesces concurrent subscribe/unsubscribe calls into rate-limited hello
//! control messages. Callers mutate the [`SubscriptionSet`] and return
//! immediately; the background run loop debounces the changes, renders the
//! current set through the symbol mapper, and sends one hello. If the set
//! changed again while the send was in flight the cycle repeats, otherwise
//! the loop returns to idle.
//!
//! The cycle is an explicit state machine:
//!
//! ```text
//! Idle ──change──► Scheduled ──deadline──► Sending ──► Reconciling
//!   ▲                  ▲                                   │
//!   └──── set unchanged ┴──────── set changed ─────────────┘
//! ```
//!
//! The send deadline is `max(last change + debounce, next allowed hello)`:
//! rapid changes keep pushing the deadline out, and the server's minimum
//! spacing between hello messages is always respected.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{Notify, mpsc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::application::ports::{Hello, StreamTransport, TransportError};
use crate::domain::subscription::SubscriptionSet;
use crate::domain::symbol::{CanonicalSymbol, SymbolMapper};

/// Filter sent when the desired set is empty. An empty or missing filter
/// would subscribe to every symbol on every exchange, so an intentionally
/// invalid one is sent instead.
const EMPTY_SET_SENTINEL: &str = "$no_symbol_requested$";

// =============================================================================
// Settings
// =============================================================================

/// Timing parameters for the coalescing cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSettings {
    /// Quiet period after the last change before a hello is sent.
    pub debounce: Duration,
    /// Server-imposed minimum spacing between hello messages.
    pub min_hello_interval: Duration,
    /// Bounded wait for the connection to confirm after a send.
    pub connect_timeout: Duration,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(250),
            min_hello_interval: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(30),
        }
    }
}

// =============================================================================
// Cycle State
// =============================================================================

/// Phase of the coalescing cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    /// No cycle is running.
    Idle,
    /// A cycle is waiting for its send deadline.
    Scheduled,
    /// A hello is being sent.
    Sending,
    /// A sent hello is being checked against the current set.
    Reconciling,
}

#[derive(Debug)]
struct CycleState {
    phase: CyclePhase,
    last_change: Option<Instant>,
    next_allowed_hello: Option<Instant>,
}

// =============================================================================
// Scheduler
// =============================================================================

/// Coalescing hello scheduler.
///
/// Owns the [`SubscriptionSet`] exclusively. At most one cycle runs at a
/// time; re-entrant subscribe/unsubscribe calls join the running cycle.
/// [`run`](Self::run) must be spawned for anything to reach the wire.
pub struct HelloScheduler {
    transport: Arc<dyn StreamTransport>,
    mapper: SymbolMapper,
    subscriptions: SubscriptionSet,
    settings: SchedulerSettings,
    api_key: Uuid,
    data_types: Vec<String>,
    state: Mutex<CycleState>,
    changed: Notify,
    errors: mpsc::UnboundedSender<TransportError>,
    cancel: CancellationToken,
}

impl HelloScheduler {
    /// Create a scheduler.
    ///
    /// Connection failures are reported on `errors`; callers of
    /// subscribe/unsubscribe never block on the network.
    #[must_use]
    pub fn new(
        transport: Arc<dyn StreamTransport>,
        settings: SchedulerSettings,
        api_key: Uuid,
        data_types: Vec<String>,
        errors: mpsc::UnboundedSender<TransportError>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            transport,
            mapper: SymbolMapper::new(),
            subscriptions: SubscriptionSet::new(),
            settings,
            api_key,
            data_types,
            state: Mutex::new(CycleState {
                phase: CyclePhase::Idle,
                last_change: None,
                next_allowed_hello: None,
            }),
            changed: Notify::new(),
            errors,
            cancel,
        }
    }

    /// Register a caller's interest in a symbol and schedule a hello.
    ///
    /// Non-blocking; the wire message is sent by the run loop.
    pub fn request_subscribe(&self, symbol: &CanonicalSymbol) {
        self.subscriptions.add(symbol);
        self.note_change();
    }

    /// Drop a caller's interest in a symbol and schedule a hello.
    ///
    /// The symbol leaves the desired set only when its last subscriber is
    /// gone; either way the next hello reflects the current set.
    pub fn request_unsubscribe(&self, symbol: &CanonicalSymbol) {
        self.subscriptions.remove(symbol);
        self.note_change();
    }

    /// Current phase of the coalescing cycle.
    #[must_use]
    pub fn phase(&self) -> CyclePhase {
        self.state.lock().phase
    }

    /// Number of distinct symbols currently desired.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Run the scheduler until cancelled.
    ///
    /// Sits idle between batches; a subscribe/unsubscribe call wakes it.
    /// Cancellation is the only way to stop the loop — an unsubscribe merely
    /// updates the set the next send will reflect.
    pub async fn run(self: Arc<Self>) {
        loop {
            if self.phase() == CyclePhase::Idle {
                tokio::select! {
                    () = self.cancel.cancelled() => {
                        tracing::info!("scheduler cancelled");
                        return;
                    }
                    () = self.changed.notified() => {}
                }
                // A stale wakeup (the change was already folded into a sent
                // hello) leaves the phase Idle and we just wait again.
                continue;
            }

            self.run_cycle().await;
        }
    }

    /// Subscribe to whole markets by exchange-prefix filter.
    ///
    /// Bypasses the coalescing cycle: the hello is sent directly and the
    /// result returned to the caller. Unknown market names are logged and
    /// dropped from the filter list.
    ///
    /// # Errors
    ///
    /// [`TransportError`] when the send fails or the connection does not
    /// confirm in time.
    pub async fn subscribe_markets(&self, markets: &[&str]) -> Result<(), TransportError> {
        tracing::info!(markets = ?markets, "subscribing to markets");

        let filters = markets
            .iter()
            .filter_map(|name| match self.mapper.exchange_id(name) {
                // The trailing underscore keeps the match precise: requesting
                // BINANCE must not also match BINANCEUS.
                Ok(exchange) => Some(format!("{exchange}_")),
                Err(error) => {
                    tracing::warn!(market = name, error = %error, "dropping unknown market");
                    None
                }
            })
            .collect();

        self.send_hello(filters).await
    }

    /// Record a set change and wake the run loop.
    fn note_change(&self) {
        let mut state = self.state.lock();
        state.last_change = Some(Instant::now());
        if state.phase == CyclePhase::Idle {
            state.phase = CyclePhase::Scheduled;
        }
        drop(state);

        self.changed.notify_one();
    }

    /// One coalescing cycle: sleep to the deadline, send, reconcile, repeat
    /// until the rendered set matches the current set.
    async fn run_cycle(&self) {
        loop {
            let send_at = {
                let state = self.state.lock();
                let mut deadline =
                    state.last_change.unwrap_or_else(Instant::now) + self.settings.debounce;
                if let Some(next_allowed) = state.next_allowed_hello {
                    if deadline < next_allowed {
                        deadline = next_allowed;
                    }
                }
                deadline
            };

            if Instant::now() < send_at {
                tokio::select! {
                    () = self.cancel.cancelled() => {
                        self.state.lock().phase = CyclePhase::Idle;
                        return;
                    }
                    () = tokio::time::sleep_until(send_at) => {}
                }
                // Changes may have arrived while sleeping; recompute.
                continue;
            }

            self.state.lock().phase = CyclePhase::Sending;

            let revision = self.subscriptions.revision();
            let filters = self.render_filters();

            if let Err(error) = self.send_hello(filters).await {
                tracing::error!(error = %error, "hello send failed, abandoning cycle");
                let _ = self.errors.send(error);
                self.state.lock().phase = CyclePhase::Idle;
                return;
            }

            let mut state = self.state.lock();
            state.phase = CyclePhase::Reconciling;
            if self.subscriptions.revision() == revision {
                // The wire now reflects the current set.
                state.phase = CyclePhase::Idle;
                return;
            }
            state.phase = CyclePhase::Scheduled;
        }
    }

    /// Render the current set into exact-match symbol filters.
    ///
    /// A symbol the mapper cannot translate is logged and dropped from this
    /// batch; it is never fatal to the cycle.
    fn render_filters(&self) -> Vec<String> {
        let symbols = self.subscriptions.symbols();
        tracing::info!(count = symbols.len(), "rendering subscription filters");

        symbols
            .iter()
            .filter_map(|symbol| match self.mapper.to_vendor_id(symbol) {
                Ok(vendor_id) => Some(format!("{vendor_id}$")),
                Err(error) => {
                    tracing::warn!(symbol = %symbol, error = %error, "dropping unmappable symbol");
                    None
                }
            })
            .collect()
    }

    /// Send one hello carrying `filters` and wait for the connection to
    /// confirm.
    async fn send_hello(&self, mut filters: Vec<String>) -> Result<(), TransportError> {
        if filters.is_empty() {
            filters.push(EMPTY_SET_SENTINEL.to_string());
        }

        let hello = Hello {
            apikey: self.api_key,
            heartbeat: true,
            subscribe_data_type: self.data_types.clone(),
            subscribe_filter_symbol_id: filters,
        };

        self.transport.send_hello(&hello).await?;
        self.transport
            .wait_connected(self.settings.connect_timeout)
            .await?;

        self.state.lock().next_allowed_hello =
            Some(Instant::now() + self.settings.min_hello_interval);

        Ok(())
    }
}
