//! Log-space arithmetic for Naive Bayes parameters
//!
//! Counts are accumulated linearly (cheap) and folded into their logarithm only
//! when read. `DualCounter` keeps both halves and the flag telling whether the
//! cached logarithm is current.

use std::cell::Cell;
use tracing::warn;

/// Log-sum-exp over a slice: `ln(Σ exp(e_i))`, shifted by the maximum exponent.
///
/// Returns `None` for an empty slice. `-inf` exponents (the log of a zero
/// count) contribute nothing; if every exponent is `-inf` so is the result.
pub fn log_add(exponents: &[f64]) -> Option<f64> {
    if exponents.is_empty() {
        return None;
    }

    let max = exponents.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return Some(f64::NEG_INFINITY);
    }

    let sum: f64 = exponents.iter().map(|&e| (e - max).exp()).sum();
    Some(max + sum.ln())
}

/// Two-term log-sum-exp used by consolidation.
pub fn log_add_pair(a: f64, b: f64) -> f64 {
    if a == f64::NEG_INFINITY {
        return b;
    }
    if b == f64::NEG_INFINITY {
        return a;
    }
    let max = a.max(b);
    max + ((a - max).exp() + (b - max).exp()).ln()
}

/// A count kept as a consolidated logarithm plus a pending linear part.
///
/// Reads go through `&self` and consolidate in place, so accessors can be
/// offered on shared references. The counter is not `Sync`.
#[derive(Debug, Clone)]
pub struct DualCounter {
    log_value: Cell<f64>,
    raw: Cell<u64>,
    consolidated: Cell<bool>,
}

impl Default for DualCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl DualCounter {
    /// Empty counter: reads as `-inf` (log of zero).
    pub fn new() -> Self {
        Self::with_raw(0)
    }

    /// Counter holding a pending linear amount, e.g. a smoothing pseudocount.
    pub fn with_raw(raw: u64) -> Self {
        Self {
            log_value: Cell::new(f64::NEG_INFINITY),
            raw: Cell::new(raw),
            consolidated: Cell::new(false),
        }
    }

    /// Counter restored from a consolidated logarithm.
    pub fn restored(log_value: f64) -> Self {
        Self {
            log_value: Cell::new(log_value),
            raw: Cell::new(0),
            consolidated: Cell::new(true),
        }
    }

    /// Add a linear amount without touching the logarithm.
    ///
    /// The pending part clamps at `u64::MAX`; reads after a clamp under-count.
    pub fn add_raw(&mut self, count: u64) {
        let raw = self.raw.get().checked_add(count).unwrap_or_else(|| {
            warn!(
                "Pending count overflowed u64 ({} + {}), clamping",
                self.raw.get(),
                count
            );
            u64::MAX
        });
        self.raw.set(raw);
        self.consolidated.set(false);
    }

    /// Add a log-domain amount, consolidating pending raw counts first.
    pub fn fold_log(&mut self, value: f64) {
        let current = self.log_value();
        self.log_value.set(log_add_pair(current, value));
    }

    /// Consolidated logarithm of everything added so far.
    pub fn log_value(&self) -> f64 {
        self.consolidate();
        self.log_value.get()
    }

    /// Fold the pending linear part into the logarithm. No-op when current.
    pub fn consolidate(&self) {
        if self.consolidated.get() && self.raw.get() == 0 {
            return;
        }
        let pending = (self.raw.get() as f64).ln();
        self.log_value.set(log_add_pair(self.log_value.get(), pending));
        self.raw.set(0);
        self.consolidated.set(true);
    }

    pub fn pending_raw(&self) -> u64 {
        self.raw.get()
    }

    pub fn is_consolidated(&self) -> bool {
        self.consolidated.get()
    }
}
