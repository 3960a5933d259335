//! Trace frontier: the visited set and the trace queue.
//!
//! A pid enters the queue at most once per cycle. [`enqueue`] checks the
//! visited set before every push, so membership is the only dedup gate.

#![allow(missing_docs)]

use std::collections::HashSet;

use crossbeam::queue::SegQueue;
use parking_lot::Mutex;
use pdb_store::Pid;

/// Pids enqueued since the current cycle began.
///
/// Shared with the write barrier, which forwards mutations only for members.
#[derive(Debug, Default)]
pub struct VisitedSet {
    pids: HashSet<Pid>,
}

impl VisitedSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains(&self, pid: Pid) -> bool {
        self.pids.contains(&pid)
    }

    /// Returns `true` if `pid` was not yet a member.
    pub fn insert(&mut self, pid: Pid) -> bool {
        self.pids.insert(pid)
    }

    pub fn clear(&mut self) {
        self.pids.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Pid> + '_ {
        self.pids.iter().copied()
    }
}

/// Pids waiting to be traced, in FIFO order.
#[derive(Debug, Default)]
pub struct TraceQueue {
    queue: SegQueue<Pid>,
}

impl TraceQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, pid: Pid) {
        self.queue.push(pid);
    }

    pub fn pop(&self) -> Option<Pid> {
        self.queue.pop()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn clear(&self) {
        while self.queue.pop().is_some() {}
    }
}

/// Pushes `pid` unless it has been enqueued before in this cycle.
///
/// Returns `true` if the pid was pushed.
pub fn enqueue(visited: &Mutex<VisitedSet>, queue: &TraceQueue, pid: Pid) -> bool {
    let fresh = visited.lock().insert(pid);
    if fresh {
        queue.push(pid);
    }
    fresh
}
