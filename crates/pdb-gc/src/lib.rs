//! An incremental garbage collector for a persistent object store.
//!
//! `pdb-gc` reclaims unreachable records from a [`pdb_store::Store`] holding an
//! object graph. Objects are records keyed `<pid>/<field>`; a field whose value
//! is a positive integer refers to the object with that pid. Everything not
//! reachable from pid 1 is garbage.
//!
//! Collection is a **copying** trace split into **time-bounded steps**: each
//! [`Collector::step`] traces objects until its budget runs out, copying every
//! reachable record into a replacement store. A write barrier mirrors
//! application writes to objects already copied. When the trace finishes the
//! replacement store's file replaces the live one.
//!
//! # Features
//!
//! - **Incremental**: pauses bounded by `max_step_time`
//! - **Concurrent mutation**: the application keeps writing between steps
//! - **Checkpoints**: the replacement store is committed periodically
//! - **Observability**: cycle spans and events behind the `tracing` feature
//!
//! # Quick Start
//!
//! ```no_run
//! use pdb_gc::{Collector, CollectorConfig};
//! use pdb_store::{Pid, Store, StoreConfig};
//!
//! let store = Store::new(StoreConfig::new("/tmp/objects.pdb"));
//! store.open()?;
//! store.put_field(Pid::ROOT, "child", "2")?;
//! store.put_field(Pid::new(2).unwrap(), "name", "kept")?;
//! store.put_field(Pid::new(9).unwrap(), "name", "garbage")?;
//!
//! let mut collector = Collector::new(store.clone(), CollectorConfig::default())?;
//! let metrics = collector.collect()?;
//! assert_eq!(metrics.objects_marked, 2);
//! assert!(store.record(Pid::new(9).unwrap())?.is_empty());
//! # Ok::<(), pdb_gc::GcError>(())
//! ```
//!
//! # Thread Safety
//!
//! [`Collector`] is driven by one thread. The store handles it holds are
//! shareable, and the write barrier runs on whichever thread mutates the live
//! store.

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod error;
mod metrics;

/// Collector internals.
///
/// Public for testing and for drivers that want the individual pieces.
/// Most users need only [`Collector`].
pub mod gc;

/// Cycle identifiers and spans.
pub mod tracing;

pub use error::{GcError, Result};
pub use gc::{CollectPhase, Collector, CollectorConfig, StepResult};
pub use metrics::{CollectorMetrics, CollectorStatus, CycleMetrics};
pub use crate::tracing::GcId;
