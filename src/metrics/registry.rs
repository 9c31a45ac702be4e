//! Outcome counters for the sequence service.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters updated by [`crate::service::SequenceService`].
#[derive(Debug, Default)]
pub struct ServiceMetrics {
    /// Sequences successfully defined
    pub definitions_total: AtomicU64,
    /// Successful advance calls (single or batched)
    pub advances_total: AtomicU64,
    /// Decorated values handed out
    pub values_issued_total: AtomicU64,
    /// Compare-and-set attempts lost to a concurrent writer
    pub conflicts_total: AtomicU64,
    /// Advances rejected because the sequence ran out of values
    pub exhausted_total: AtomicU64,
    /// Advances abandoned after the retry budget was spent
    pub retries_exhausted_total: AtomicU64,
}

/// Point-in-time copy of [`ServiceMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub definitions_total: u64,
    pub advances_total: u64,
    pub values_issued_total: u64,
    pub conflicts_total: u64,
    pub exhausted_total: u64,
    pub retries_exhausted_total: u64,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_definition(&self) {
        self.definitions_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one advance that issued `values` values.
    #[inline]
    pub fn record_advance(&self, values: u64) {
        self.advances_total.fetch_add(1, Ordering::Relaxed);
        self.values_issued_total.fetch_add(values, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_conflict(&self) {
        self.conflicts_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_exhausted(&self) {
        self.exhausted_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_retries_exhausted(&self) {
        self.retries_exhausted_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            definitions_total: self.definitions_total.load(Ordering::Relaxed),
            advances_total: self.advances_total.load(Ordering::Relaxed),
            values_issued_total: self.values_issued_total.load(Ordering::Relaxed),
            conflicts_total: self.conflicts_total.load(Ordering::Relaxed),
            exhausted_total: self.exhausted_total.load(Ordering::Relaxed),
            retries_exhausted_total: self.retries_exhausted_total.load(Ordering::Relaxed),
        }
    }

    /// Formats the counters in Prometheus exposition format.
    pub fn format_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        let mut output = String::with_capacity(1024);
        for (name, help, value) in [
            (
                "numseq_definitions_total",
                "Sequences defined",
                snapshot.definitions_total,
            ),
            (
                "numseq_advances_total",
                "Successful advance operations",
                snapshot.advances_total,
            ),
            (
                "numseq_values_issued_total",
                "Sequence values issued",
                snapshot.values_issued_total,
            ),
            (
                "numseq_conflicts_total",
                "Compare-and-set attempts lost to concurrent writers",
                snapshot.conflicts_total,
            ),
            (
                "numseq_exhausted_total",
                "Advances rejected on exhausted sequences",
                snapshot.exhausted_total,
            ),
            (
                "numseq_retries_exhausted_total",
                "Advances abandoned after exhausting retries",
                snapshot.retries_exhausted_total,
            ),
        ] {
            let _ = writeln!(output, "# HELP {} {}", name, help);
            let _ = writeln!(output, "# TYPE {} counter", name);
            let _ = writeln!(output, "{} {}", name, value);
        }
        output
    }
}
