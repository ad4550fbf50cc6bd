//! Shared metrics — atomic counters for bind activity.
//!
//! Wrapped in `Arc<Metrics>` and owned by the [`Host`](crate::host::Host).
//! [`Metrics::snapshot`] gives a serializable point-in-time copy.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Bind counters, all lock-free via AtomicU64.
#[derive(Debug, Default)]
pub struct Metrics {
    // ─── Binds ───────────────────────────────────────────────────────────
    pub binds_total: AtomicU64,
    pub binds_failed: AtomicU64,
    pub duplicate_rejections: AtomicU64,
    /// URIs resolved without any credentials.
    pub unauthenticated_uris: AtomicU64,

    // ─── Connections ─────────────────────────────────────────────────────
    pub connections_open: AtomicU64,
    pub connections_closed: AtomicU64,
}

/// Point-in-time copy of [`Metrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub binds_total: u64,
    pub binds_failed: u64,
    pub duplicate_rejections: u64,
    pub unauthenticated_uris: u64,
    pub connections_open: u64,
    pub connections_closed: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment a counter by 1 and return the previous value.
    #[inline]
    pub fn inc(counter: &AtomicU64) -> u64 {
        counter.fetch_add(1, Ordering::Relaxed)
    }

    /// Decrement a counter by 1 (saturating).
    #[inline]
    pub fn dec(counter: &AtomicU64) {
        let _ = counter.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1));
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            binds_total: self.binds_total.load(Ordering::Relaxed),
            binds_failed: self.binds_failed.load(Ordering::Relaxed),
            duplicate_rejections: self.duplicate_rejections.load(Ordering::Relaxed),
            unauthenticated_uris: self.unauthenticated_uris.load(Ordering::Relaxed),
            connections_open: self.connections_open.load(Ordering::Relaxed),
            connections_closed: self.connections_closed.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dec_saturates_at_zero() {
        let m = Metrics::new();
        Metrics::dec(&m.connections_open);
        assert_eq!(m.snapshot().connections_open, 0);
        Metrics::inc(&m.connections_open);
        Metrics::inc(&m.connections_open);
        Metrics::dec(&m.connections_open);
        assert_eq!(m.snapshot().connections_open, 1);
    }
}
