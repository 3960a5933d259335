//! Collection coordination.
//!
//! This module provides the collector and the pieces it is built from:
//! - Incremental state machine and step budget
//! - Visited set and trace queue
//! - Record tracing and replication
//! - Write barrier on the live store

mod collector;

pub mod barrier;
pub mod incremental;
pub mod mark;
pub mod worklist;

pub(crate) mod tracing;

pub use barrier::{BarrierStats, WriteBarrier};
pub use collector::Collector;
pub use incremental::{
    CollectPhase, CollectorConfig, StepResult, DEFAULT_CHECKPOINT_INTERVAL, DEFAULT_MAX_STEP_TIME,
    OUT_PATH_SUFFIX,
};
