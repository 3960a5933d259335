//! Write barrier for the live store.
//!
//! While a cycle runs, every mutation of the live store passes through
//! [`WriteBarrier`]. If the mutated object is already in the visited set the
//! same operation is applied to the replacement store. Otherwise it is
//! dropped: the object will be read fresh from the live store when traced.
//!
//! A mirrored write that stores a reference also enqueues the referenced pid.
//! The writing object may already have been traced, and the new child would
//! otherwise never be reached before the swap.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use pdb_store::{key, MutationHooks, Store};

use crate::gc::worklist::{enqueue, TraceQueue, VisitedSet};

/// Counters kept by the barrier for one cycle.
#[derive(Debug, Default)]
pub struct BarrierStats {
    /// Mutations applied to the replacement store.
    pub forwarded: AtomicUsize,
    /// Mutations of objects not yet visited.
    pub dropped: AtomicUsize,
    /// Mutations whose key is not `<pid>/<field>`.
    pub malformed: AtomicUsize,
    /// Forwards that the replacement store rejected.
    pub failed: AtomicUsize,
    /// Pids enqueued by mirrored writes.
    pub shaded: AtomicUsize,
}

/// Mutation hooks installed on the live store during a cycle.
#[derive(Debug)]
pub struct WriteBarrier {
    visited: Arc<Mutex<VisitedSet>>,
    queue: Arc<TraceQueue>,
    out: Store,
    stats: BarrierStats,
}

impl WriteBarrier {
    /// Creates a barrier forwarding into `out` for members of `visited`.
    /// References written by forwarded mutations are pushed onto `queue`.
    #[must_use]
    pub fn new(visited: Arc<Mutex<VisitedSet>>, queue: Arc<TraceQueue>, out: Store) -> Self {
        Self {
            visited,
            queue,
            out,
            stats: BarrierStats::default(),
        }
    }

    /// Counters accumulated since the barrier was installed.
    #[must_use]
    pub const fn stats(&self) -> &BarrierStats {
        &self.stats
    }

    /// Enqueues the pid referenced by the replacement store's value at `key`.
    fn shade(&self, key: &[u8]) {
        let Some((_, field)) = key::split_key(key) else {
            return;
        };
        if key::is_metadata(field) {
            return;
        }
        if let Ok(Some(value)) = self.out.get(key) {
            if let Some(child) = value.as_pid() {
                if enqueue(&self.visited, &self.queue, child) {
                    self.stats.shaded.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }

    fn forward(
        &self,
        op: &'static str,
        key: &[u8],
        apply: impl FnOnce(&Store) -> pdb_store::Result<()>,
    ) -> bool {
        match key::parse_pid(key) {
            None => {
                self.stats.malformed.fetch_add(1, Ordering::Relaxed);
                #[cfg(feature = "tracing")]
                tracing::debug!(op, key = %String::from_utf8_lossy(key), "barrier_malformed_key");
                return false;
            }
            Some(pid) if !self.visited.lock().contains(pid) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                return false;
            }
            Some(_) => {}
        }
        match apply(&self.out) {
            Ok(()) => {
                self.stats.forwarded.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(_err) => {
                // The application's own write already succeeded.
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    op,
                    key = %String::from_utf8_lossy(key),
                    error = %_err,
                    "barrier_forward_failed"
                );
                #[cfg(not(feature = "tracing"))]
                let _ = op;
                false
            }
        }
    }
}

impl MutationHooks for WriteBarrier {
    fn on_put(&self, key: &[u8], value: &[u8]) {
        if self.forward("put", key, |out| out.put(key, value)) {
            self.shade(key);
        }
    }

    fn on_append(&self, key: &[u8], value: &[u8]) {
        if self.forward("append", key, |out| out.append(key, value)) {
            self.shade(key);
        }
    }

    fn on_delete(&self, key: &[u8]) {
        self.forward("delete", key, |out| out.remove_at(key));
    }
}
