//! Subscription Set
//!
//! Tracks the union of all callers' desired symbols with per-symbol
//! reference counting: a symbol joins the set on its first subscriber and
//! leaves only when its last subscriber is gone. The scheduler renders this
//! set into hello-message filters; nothing else reads it.
//!
//! A monotonically increasing revision stamps every membership change, which
//! is how the scheduler decides whether a sent hello still reflects the
//! current set.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::domain::streaming::{Resolution, TickType};
use crate::domain::symbol::CanonicalSymbol;

// =============================================================================
// Subscription Config
// =============================================================================

/// Parameters a caller subscribes with.
///
/// The bridge keys its desired-set bookkeeping by symbol only; resolution and
/// tick type travel with the config so the aggregator can shape its output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionConfig {
    /// Canonical symbol to stream.
    pub symbol: CanonicalSymbol,
    /// Resolution the caller aggregates into.
    pub resolution: Resolution,
    /// Kind of data requested.
    pub tick_type: TickType,
}

// =============================================================================
// Subscription Set
// =============================================================================

/// Reference-counted set of desired symbols.
///
/// Thread-safe; mutated by subscribe/unsubscribe callers and read by the
/// scheduler's coalescing cycle.
#[derive(Debug, Default)]
pub struct SubscriptionSet {
    entries: RwLock<HashMap<CanonicalSymbol, usize>>,
    revision: AtomicU64,
}

impl SubscriptionSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber for a symbol.
    ///
    /// Returns `true` when the symbol newly joined the set (refcount 0 → 1).
    pub fn add(&self, symbol: &CanonicalSymbol) -> bool {
        let mut entries = self.entries.write();
        let refcount = entries.entry(symbol.clone()).or_insert(0);
        *refcount += 1;

        let joined = *refcount == 1;
        if joined {
            self.revision.fetch_add(1, Ordering::Relaxed);
        }
        joined
    }

    /// Remove a subscriber for a symbol.
    ///
    /// Returns `true` when the last subscriber left and the symbol dropped
    /// out of the set (refcount 1 → 0).
    pub fn remove(&self, symbol: &CanonicalSymbol) -> bool {
        let mut entries = self.entries.write();
        let Some(refcount) = entries.get_mut(symbol) else {
            return false;
        };

        *refcount = refcount.saturating_sub(1);
        if *refcount > 0 {
            return false;
        }

        entries.remove(symbol);
        self.revision.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Snapshot of the symbols currently in the set.
    #[must_use]
    pub fn symbols(&self) -> Vec<CanonicalSymbol> {
        self.entries.read().keys().cloned().collect()
    }

    /// Current membership revision.
    ///
    /// Advances on every membership change; refcount-only changes do not
    /// move it.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Relaxed)
    }

    /// Number of distinct symbols in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
