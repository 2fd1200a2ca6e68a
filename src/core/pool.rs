//! Per-stage worker pool: handle ownership, status tracking, and the load
//! signals the dispatch policies read.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use super::error::PoolError;
use super::worker::WorkOrder;

/// Unique identity of a worker. Monotonic per engine, never reused, so a
/// crashed worker's replacement is always distinguishable from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct WorkerId(pub(crate) u64);

impl WorkerId {
    pub fn value(&self) -> u64 {
        self.0
    }

    #[cfg(test)]
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "w-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerStatus {
    Idle,
    Busy,
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerStatus::Idle => write!(f, "idle"),
            WorkerStatus::Busy => write!(f, "busy"),
        }
    }
}

/// One pool-resident worker: channel handle plus the load signals the
/// policies and the rebalancer read.
pub(crate) struct WorkerEntry {
    id: WorkerId,
    status: WorkerStatus,
    weight: u32,
    /// Units sent to the worker and not yet completed. Doubles as the
    /// least-connections counter.
    inflight: usize,
    /// Cumulative estimated outstanding duration, for shortest-job-first.
    est_backlog: Duration,
    orders: mpsc::UnboundedSender<WorkOrder>,
    abort: Option<AbortHandle>,
}

impl WorkerEntry {
    pub(crate) fn new(
        id: WorkerId,
        weight: u32,
        orders: mpsc::UnboundedSender<WorkOrder>,
        abort: AbortHandle,
    ) -> Self {
        Self {
            id,
            status: WorkerStatus::Idle,
            weight,
            inflight: 0,
            est_backlog: Duration::ZERO,
            orders,
            abort: Some(abort),
        }
    }

    /// Entry with no backing task, for exercising pool and policy logic.
    #[cfg(test)]
    pub(crate) fn detached(id: WorkerId, weight: u32) -> Self {
        let (orders, _rx) = mpsc::unbounded_channel();
        Self {
            id,
            status: WorkerStatus::Idle,
            weight,
            inflight: 0,
            est_backlog: Duration::ZERO,
            orders,
            abort: None,
        }
    }

    pub(crate) fn id(&self) -> WorkerId {
        self.id
    }

    pub(crate) fn status(&self) -> WorkerStatus {
        self.status
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.status == WorkerStatus::Idle
    }

    pub(crate) fn weight(&self) -> u32 {
        self.weight
    }

    pub(crate) fn inflight(&self) -> usize {
        self.inflight
    }

    pub(crate) fn est_backlog(&self) -> Duration {
        self.est_backlog
    }

    /// Abort the backing task, simulating a crash mid-unit.
    pub(crate) fn kill(&self) {
        if let Some(abort) = &self.abort {
            abort.abort();
        }
    }
}

impl fmt::Debug for WorkerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerEntry")
            .field("id", &self.id)
            .field("status", &self.status)
            .field("weight", &self.weight)
            .field("inflight", &self.inflight)
            .field("est_backlog", &self.est_backlog)
            .finish()
    }
}

/// The workers of one stage, in creation order. Enumeration order is the
/// tie-break order every policy relies on.
#[derive(Debug, Default)]
pub struct WorkerPool {
    entries: Vec<WorkerEntry>,
}

impl WorkerPool {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub(crate) fn insert(&mut self, entry: WorkerEntry) {
        self.entries.push(entry);
    }

    /// Remove a worker. Graceful removal refuses a busy worker; `force`
    /// is for crash cleanup where the task is already gone.
    pub(crate) fn remove(&mut self, id: WorkerId, force: bool) -> Result<WorkerEntry, PoolError> {
        let idx = self
            .entries
            .iter()
            .position(|e| e.id == id)
            .ok_or(PoolError::NotFound(id))?;
        if !force && !self.entries[idx].is_idle() {
            return Err(PoolError::Busy(id));
        }
        Ok(self.entries.remove(idx))
    }

    pub(crate) fn get(&self, id: WorkerId) -> Option<&WorkerEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    fn get_mut(&mut self, id: WorkerId) -> Option<&mut WorkerEntry> {
        self.entries.iter_mut().find(|e| e.id == id)
    }

    /// Worker at a pool position, for cursor-based policies.
    pub(crate) fn at(&self, idx: usize) -> &WorkerEntry {
        &self.entries[idx]
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &WorkerEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn busy_count(&self) -> usize {
        self.entries.iter().filter(|e| !e.is_idle()).count()
    }

    pub fn idle_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_idle()).count()
    }

    pub(crate) fn first_idle(&self) -> Option<WorkerId> {
        self.entries.iter().find(|e| e.is_idle()).map(|e| e.id)
    }

    /// Generic load signal: the worker's in-flight unit count. Unknown ids
    /// yield `None` and are ignored by callers.
    pub fn load(&self, id: WorkerId) -> Option<usize> {
        self.get(id).map(|e| e.inflight)
    }

    pub(crate) fn mark_busy(&mut self, id: WorkerId) {
        if let Some(entry) = self.get_mut(id) {
            entry.status = WorkerStatus::Busy;
        }
    }

    pub(crate) fn mark_idle(&mut self, id: WorkerId) {
        if let Some(entry) = self.get_mut(id) {
            entry.status = WorkerStatus::Idle;
        }
    }

    /// Load accounting for a unit handed to `id`: bump the in-flight count
    /// and estimated backlog, mark the worker busy.
    pub(crate) fn note_dispatch(&mut self, id: WorkerId, estimate: Duration) {
        if let Some(entry) = self.get_mut(id) {
            entry.inflight += 1;
            entry.est_backlog += estimate;
            entry.status = WorkerStatus::Busy;
        }
    }

    /// Reverse of [`note_dispatch`], clamped at zero, applied on every
    /// completion so the counters never drift negative.
    pub(crate) fn note_completion(&mut self, id: WorkerId, estimate: Duration) {
        if let Some(entry) = self.get_mut(id) {
            entry.inflight = entry.inflight.saturating_sub(1);
            entry.est_backlog = entry.est_backlog.saturating_sub(estimate);
            if entry.inflight == 0 {
                entry.status = WorkerStatus::Idle;
            }
        }
    }

    /// Hand an order to a worker. On a closed channel the order is handed
    /// back so the caller can requeue the unit.
    pub(crate) fn send_order(&self, id: WorkerId, order: WorkOrder) -> Result<(), WorkOrder> {
        match self.get(id) {
            Some(entry) => entry.orders.send(order).map_err(|e| e.0),
            None => Err(order),
        }
    }
}
