//! Collector-level tracing events.

#[cfg(feature = "tracing")]
use crate::metrics::{CollectorStatus, CycleMetrics};

/// Log the start of a collection cycle.
#[cfg(feature = "tracing")]
pub fn log_cycle_start(size_before_mb: f64) {
    tracing::info!(size_before_mb, "cycle_start");
}

/// Log the end of one step that left work in the queue.
#[cfg(feature = "tracing")]
pub fn log_step(objects_marked: usize, queued: usize) {
    tracing::debug!(objects_marked, queued, "step");
}

/// Log a checkpoint commit with the current progress.
#[cfg(feature = "tracing")]
pub fn log_checkpoint(status: &CollectorStatus) {
    tracing::info!(
        queued = status.queued,
        marked = status.marked,
        visited = status.visited,
        "{status}"
    );
}

/// Log the completed swap.
#[cfg(feature = "tracing")]
pub fn log_cycle_complete(metrics: &CycleMetrics) {
    tracing::info!(
        objects_marked = metrics.objects_marked,
        steps = metrics.steps_executed,
        forwarded = metrics.mutations_forwarded,
        size_after_mb = metrics.size_after_mb(),
        bytes_reclaimed = metrics.bytes_reclaimed(),
        "cycle_complete"
    );
}

/// Log a cycle abandoned because of a storage failure.
#[cfg(feature = "tracing")]
pub fn log_cycle_abandoned(error: &crate::GcError) {
    tracing::error!(%error, "cycle_abandoned");
}

/// Report a `begin` call made while a cycle is already running.
pub fn log_reentrant_begin() {
    #[cfg(feature = "tracing")]
    tracing::warn!("begin: already collecting, ignored");
    #[cfg(not(feature = "tracing"))]
    eprintln!("[GC] begin: already collecting, ignored");
}
