//! Collector tracing support.
//!
//! When the `tracing` feature is enabled, every collection cycle gets a
//! [`GcId`] and a span that each step of the cycle enters.

#[cfg(feature = "tracing")]
pub mod internal {
    use std::sync::atomic::{AtomicU64, Ordering};
    use tracing::{span, Level, Span};

    /// Stable identifier for a collection cycle.
    ///
    /// Correlates all events of one cycle, across however many steps it
    /// takes. Starts at 1 and increases monotonically per process.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct GcId(pub u64);

    static NEXT_GC_ID: AtomicU64 = AtomicU64::new(1);

    /// Generate the next unique cycle id.
    pub fn next_gc_id() -> GcId {
        GcId(NEXT_GC_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Create the span covering one collection cycle.
    ///
    /// The span is not entered here; each step enters it for its duration.
    pub fn cycle_span(gc_id: GcId) -> Span {
        span!(Level::DEBUG, "gc_cycle", gc_id = gc_id.0)
    }
}

#[cfg(not(feature = "tracing"))]
pub mod internal {
    /// Stub type when tracing is disabled.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct GcId(pub u64);

    /// Stub function when tracing is disabled.
    pub const fn next_gc_id() -> GcId {
        GcId(0)
    }
}

pub use internal::GcId;
