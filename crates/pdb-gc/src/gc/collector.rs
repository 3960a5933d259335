//! Incremental copying collection over a live store.
//!
//! A cycle traces the object graph from [`Pid::ROOT`] and replicates every
//! reachable record into a replacement store. Mutations of the live store
//! during the cycle are mirrored by the [`WriteBarrier`] for objects already
//! visited. When the trace queue drains, the replacement store's file takes
//! the place of the live store's file and the live store is reopened.
//!
//! # Lifecycle
//!
//! ```text
//! Idle --begin()--> Collecting --step()*--> (queue drained) --complete--> Idle
//! ```

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use pdb_store::{Cursor, MutationHooks, Pid, Store, StoreConfig, StoreError};

use crate::error::{GcError, Result};
use crate::gc::barrier::WriteBarrier;
use crate::gc::incremental::{CollectPhase, CollectorConfig, StepResult};
use crate::gc::mark::{mark_record, replicate_record};
use crate::gc::worklist::{enqueue, TraceQueue, VisitedSet};
use crate::metrics::{CollectorMetrics, CollectorStatus, CycleMetrics};
use crate::tracing::internal::{next_gc_id, GcId};

/// State that exists only while a cycle is in progress.
#[derive(Debug)]
struct ActiveCycle {
    gc_id: GcId,
    live_cursor: Cursor,
    out_cursor: Cursor,
    barrier: Arc<WriteBarrier>,
    started: Instant,
    metrics: CycleMetrics,
    #[cfg(feature = "tracing")]
    span: tracing::Span,
}

/// Incremental collector for one live store.
///
/// The collector owns a handle to the live store and the replacement store it
/// builds. The application keeps using the live store (through
/// [`Collector::store`] or its own clone of the handle) while a cycle runs.
///
/// # Example
///
/// ```no_run
/// use pdb_gc::{Collector, CollectorConfig, StepResult};
/// use pdb_store::{Store, StoreConfig};
///
/// let store = Store::new(StoreConfig::new("/tmp/objects.pdb"));
/// store.open()?;
/// let mut collector = Collector::new(store, CollectorConfig::default())?;
///
/// collector.begin()?;
/// loop {
///     // ... application work between steps ...
///     if collector.step()?.is_complete() {
///         break;
///     }
/// }
/// # Ok::<(), pdb_gc::GcError>(())
/// ```
#[derive(Debug)]
pub struct Collector {
    live: Store,
    out: Store,
    config: CollectorConfig,
    phase: CollectPhase,
    visited: Arc<Mutex<VisitedSet>>,
    queue: Arc<TraceQueue>,
    active: Option<ActiveCycle>,
    last_cycle: Option<CycleMetrics>,
    totals: CollectorMetrics,
}

impl Collector {
    /// Creates an idle collector for `live`.
    ///
    /// The replacement store is placed at the configured `out_path`, or next
    /// to the live store with a `.gc` suffix. It never keeps backups and never
    /// syncs; the swap at the end of a cycle is what makes it durable.
    ///
    /// # Errors
    ///
    /// Returns [`GcError::InvalidConfig`] if `config` does not validate.
    pub fn new(live: Store, config: CollectorConfig) -> Result<Self> {
        let live_path = live.path();
        config.validate(&live_path)?;
        let out = Store::new(
            StoreConfig::new(config.resolve_out_path(&live_path))
                .use_backups(false)
                .hard_sync(false),
        );

        Ok(Self {
            live,
            out,
            config,
            phase: CollectPhase::Idle,
            visited: Arc::new(Mutex::new(VisitedSet::new())),
            queue: Arc::new(TraceQueue::new()),
            active: None,
            last_cycle: None,
            totals: CollectorMetrics::default(),
        })
    }

    /// The live store.
    #[must_use]
    pub const fn store(&self) -> &Store {
        &self.live
    }

    /// The store under construction. Only meaningful while collecting.
    #[must_use]
    pub const fn replacement_store(&self) -> &Store {
        &self.out
    }

    /// The configuration in effect.
    #[must_use]
    pub const fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Changes the per-step budget. Takes effect at the next step.
    pub fn set_max_step_time(&mut self, max_step_time: Duration) {
        self.config.max_step_time = max_step_time;
    }

    /// Current phase of the state machine.
    #[must_use]
    pub const fn phase(&self) -> CollectPhase {
        self.phase
    }

    /// Whether a cycle is in progress.
    #[must_use]
    pub fn is_collecting(&self) -> bool {
        self.phase == CollectPhase::Collecting
    }

    /// Id of the cycle in progress.
    #[must_use]
    pub fn cycle_id(&self) -> Option<GcId> {
        self.active.as_ref().map(|a| a.gc_id)
    }

    /// Whether `pid` has been enqueued in the current cycle.
    #[must_use]
    pub fn is_visited(&self, pid: Pid) -> bool {
        self.visited.lock().contains(pid)
    }

    /// Pids enqueued in the current cycle, sorted.
    #[must_use]
    pub fn visited_pids(&self) -> Vec<Pid> {
        let mut pids: Vec<Pid> = self.visited.lock().iter().collect();
        pids.sort_unstable();
        pids
    }

    /// Progress of the current cycle.
    #[must_use]
    pub fn status(&self) -> CollectorStatus {
        CollectorStatus {
            queued: self.queue.len(),
            marked: self.active.as_ref().map_or(0, |a| a.metrics.objects_marked),
            visited: self.visited.lock().len(),
        }
    }

    /// Metrics of the most recent completed cycle.
    #[must_use]
    pub const fn last_cycle_metrics(&self) -> Option<&CycleMetrics> {
        self.last_cycle.as_ref()
    }

    /// Cumulative metrics over the collector's lifetime.
    #[must_use]
    pub const fn metrics(&self) -> &CollectorMetrics {
        &self.totals
    }

    fn transition_to(&mut self, to: CollectPhase) -> bool {
        if !self.phase.is_valid_transition(to) {
            return false;
        }
        self.phase = to;
        true
    }

    /// Starts a collection cycle.
    ///
    /// Returns `Ok(false)` without touching anything if a cycle is already in
    /// progress.
    ///
    /// # Errors
    ///
    /// Fails if the live store is closed or the replacement store cannot be
    /// recreated. The collector stays idle.
    pub fn begin(&mut self) -> Result<bool> {
        if self.is_collecting() {
            crate::gc::tracing::log_reentrant_begin();
            return Ok(false);
        }
        match self.start_cycle() {
            Ok(()) => Ok(true),
            Err(err) => {
                self.abandon_cycle(&err);
                Err(err)
            }
        }
    }

    fn start_cycle(&mut self) -> Result<()> {
        if !self.live.is_open() {
            return Err(StoreError::Closed {
                path: self.live.path(),
            }
            .into());
        }
        let bytes_before = self.live.size_in_bytes()?;

        self.out.remove()?;
        self.out.open()?;

        self.visited.lock().clear();
        self.queue.clear();

        let barrier = Arc::new(WriteBarrier::new(
            Arc::clone(&self.visited),
            Arc::clone(&self.queue),
            self.out.clone(),
        ));
        self.live.set_hooks(Arc::clone(&barrier) as Arc<dyn MutationHooks>);

        let gc_id = next_gc_id();
        self.active = Some(ActiveCycle {
            gc_id,
            live_cursor: self.live.cursor(),
            out_cursor: self.out.cursor(),
            barrier,
            started: Instant::now(),
            metrics: CycleMetrics {
                bytes_before,
                ..CycleMetrics::default()
            },
            #[cfg(feature = "tracing")]
            span: crate::tracing::internal::cycle_span(gc_id),
        });
        self.transition_to(CollectPhase::Collecting);

        #[cfg(feature = "tracing")]
        if let Some(active) = &self.active {
            let _enter = active.span.enter();
            crate::gc::tracing::log_cycle_start(self.live.size_in_mb()?);
        }

        enqueue(&self.visited, &self.queue, Pid::ROOT);
        Ok(())
    }

    /// Runs one bounded unit of collection work.
    ///
    /// Traces at least one object, then keeps going until the configured
    /// `max_step_time` has elapsed or the queue is empty. When the queue
    /// empties, the cycle completes before this returns.
    ///
    /// # Errors
    ///
    /// A storage failure abandons the cycle and leaves the collector idle.
    pub fn step(&mut self) -> Result<StepResult> {
        if !self.is_collecting() {
            return Ok(StepResult::Idle);
        }

        #[cfg(feature = "tracing")]
        let _span = self.active.as_ref().map(|a| a.span.clone().entered());

        match self.run_step() {
            Ok(result) => Ok(result),
            Err(err) => {
                self.abandon_cycle(&err);
                Err(err)
            }
        }
    }

    fn run_step(&mut self) -> Result<StepResult> {
        let started = Instant::now();
        let mut objects_marked = 0;

        while let Some(pid) = self.queue.pop() {
            self.trace(pid)?;
            objects_marked += 1;
            if self.queue.is_empty() || started.elapsed() >= self.config.max_step_time {
                break;
            }
        }

        let elapsed = started.elapsed();
        if let Some(active) = self.active.as_mut() {
            active.metrics.steps_executed += 1;
            active.metrics.max_step_duration = active.metrics.max_step_duration.max(elapsed);
        }
        self.totals.total_steps += 1;

        if self.queue.is_empty() {
            return self.complete();
        }

        let queued = self.queue.len();
        #[cfg(feature = "tracing")]
        crate::gc::tracing::log_step(objects_marked, queued);
        Ok(StepResult::Pending {
            objects_marked,
            queued,
        })
    }

    fn trace(&mut self, pid: Pid) -> Result<()> {
        let Some(active) = self.active.as_mut() else {
            return Ok(());
        };
        let visited = &self.visited;
        let queue = &self.queue;

        let found = mark_record(&mut active.live_cursor, pid, |child| {
            enqueue(visited, queue, child);
        })?;
        let copied = replicate_record(&mut active.live_cursor, &mut active.out_cursor, pid)?;

        let metrics = &mut active.metrics;
        metrics.objects_marked += 1;
        metrics.references_found += found;
        metrics.fields_copied += copied;
        self.totals.total_objects_marked += 1;

        if metrics.objects_marked % self.config.checkpoint_interval == 0 {
            self.out.commit()?;
            metrics.checkpoints += 1;
            #[cfg(feature = "tracing")]
            crate::gc::tracing::log_checkpoint(&CollectorStatus {
                queued: queue.len(),
                marked: metrics.objects_marked,
                visited: visited.lock().len(),
            });
        }
        Ok(())
    }

    /// Swaps the replacement store in. Runs once per cycle, from `step`.
    fn complete(&mut self) -> Result<StepResult> {
        self.visited.lock().clear();
        let Some(active) = self.active.take() else {
            self.transition_to(CollectPhase::Idle);
            return Ok(StepResult::Idle);
        };
        let ActiveCycle {
            live_cursor,
            out_cursor,
            barrier,
            started,
            mut metrics,
            ..
        } = active;
        drop(live_cursor);
        drop(out_cursor);
        self.live.clear_hooks();

        if let Err(err) = self.swap_stores() {
            if !self.live.is_open() {
                if let Err(_reopen) = self.live.open() {
                    #[cfg(feature = "tracing")]
                    tracing::error!(error = %_reopen, "live store reopen failed");
                }
            }
            return Err(err);
        }

        let stats = barrier.stats();
        metrics.mutations_forwarded = stats.forwarded.load(Ordering::Relaxed);
        metrics.mutations_dropped = stats.dropped.load(Ordering::Relaxed);
        metrics.malformed_keys = stats.malformed.load(Ordering::Relaxed);
        metrics.forward_failures = stats.failed.load(Ordering::Relaxed);
        metrics.references_shaded = stats.shaded.load(Ordering::Relaxed);
        metrics.bytes_after = self.live.size_in_bytes()?;
        metrics.duration = started.elapsed();

        self.totals.record_cycle(&metrics);
        self.last_cycle = Some(metrics);
        self.transition_to(CollectPhase::Idle);

        #[cfg(feature = "tracing")]
        crate::gc::tracing::log_cycle_complete(&metrics);

        Ok(StepResult::Complete {
            total_objects_marked: metrics.objects_marked,
            total_steps: metrics.steps_executed,
        })
    }

    fn swap_stores(&self) -> Result<()> {
        self.live.close()?;
        self.out.close()?;
        self.out.move_to(&self.live)?;
        self.live.open()?;
        Ok(())
    }

    fn abandon_cycle(&mut self, _err: &GcError) {
        self.visited.lock().clear();
        self.queue.clear();
        if self.active.take().is_some() {
            self.live.clear_hooks();
        }
        if let Err(_remove) = self.out.remove() {
            #[cfg(feature = "tracing")]
            tracing::warn!(error = %_remove, "replacement store removal failed");
        }
        self.totals.total_abandoned += 1;
        self.phase = CollectPhase::Idle;

        #[cfg(feature = "tracing")]
        crate::gc::tracing::log_cycle_abandoned(_err);
    }

    /// Runs a whole cycle without yielding: `begin`, then `step` until the
    /// swap. Continues a cycle that is already in progress.
    ///
    /// # Errors
    ///
    /// See [`begin`](Self::begin) and [`step`](Self::step).
    pub fn collect(&mut self) -> Result<CycleMetrics> {
        self.begin()?;
        loop {
            match self.step()? {
                StepResult::Pending { .. } => {}
                StepResult::Complete { .. } | StepResult::Idle => break,
            }
        }
        Ok(self.last_cycle.unwrap_or_default())
    }
}

impl Drop for Collector {
    fn drop(&mut self) {
        if self.active.is_some() {
            self.live.clear_hooks();
        }
    }
}
