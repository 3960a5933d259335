//! Collector metrics and progress reporting.

use std::fmt;
use std::time::Duration;

/// Progress snapshot of the cycle in progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectorStatus {
    /// Pids waiting in the trace queue.
    pub queued: usize,
    /// Objects traced so far in this cycle.
    pub marked: usize,
    /// Size of the visited set.
    pub visited: usize,
}

impl CollectorStatus {
    /// Visited-set size in millions.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn visited_millions(&self) -> f64 {
        self.visited as f64 / 1_000_000.0
    }
}

impl fmt::Display for CollectorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "collector queued:{} marked:{} visited:{:.2}M",
            self.queued,
            self.marked,
            self.visited_millions()
        )
    }
}

/// Statistics from the most recent completed cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleMetrics {
    /// Wall time from `begin` to the end of the swap.
    pub duration: Duration,
    /// Longest single step.
    pub max_step_duration: Duration,
    /// Objects traced.
    pub objects_marked: usize,
    /// Reference fields seen, counting duplicates.
    pub references_found: usize,
    /// Fields written to the replacement store by replication.
    pub fields_copied: usize,
    /// Calls to `step` that did work.
    pub steps_executed: usize,
    /// Checkpoint commits of the replacement store.
    pub checkpoints: usize,
    /// Live-store mutations mirrored into the replacement store.
    pub mutations_forwarded: usize,
    /// Live-store mutations of objects not yet visited.
    pub mutations_dropped: usize,
    /// Live-store mutations whose key was not `<pid>/<field>`.
    pub malformed_keys: usize,
    /// Mirrors the replacement store rejected.
    pub forward_failures: usize,
    /// Pids enqueued because a mirrored write stored a reference to them.
    pub references_shaded: usize,
    /// Live store size when the cycle began.
    pub bytes_before: u64,
    /// Live store size after the swap.
    pub bytes_after: u64,
}

impl CycleMetrics {
    /// Bytes freed by the cycle; zero if the store grew.
    #[must_use]
    pub const fn bytes_reclaimed(&self) -> u64 {
        self.bytes_before.saturating_sub(self.bytes_after)
    }

    /// Live store size after the swap, in mebibytes.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn size_after_mb(&self) -> f64 {
        self.bytes_after as f64 / (1024.0 * 1024.0)
    }
}

/// Cumulative statistics over the collector's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectorMetrics {
    /// Cycles that completed with a swap.
    pub total_cycles: usize,
    /// Cycles abandoned because of a storage failure.
    pub total_abandoned: usize,
    /// Objects traced across all cycles, including abandoned ones.
    pub total_objects_marked: usize,
    /// Steps executed across all cycles.
    pub total_steps: usize,
    /// Bytes reclaimed across completed cycles.
    pub total_bytes_reclaimed: u64,
}

impl CollectorMetrics {
    pub(crate) fn record_cycle(&mut self, cycle: &CycleMetrics) {
        self.total_cycles += 1;
        self.total_bytes_reclaimed += cycle.bytes_reclaimed();
    }
}
