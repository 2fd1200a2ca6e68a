//! Status snapshot types.
//!
//! Everything here is derived observability data, produced on demand by the
//! coordinator. Dispatch decisions never read these; the authoritative
//! state is the worker status tables and queue contents.

use std::time::Duration;

use serde::Serialize;

use crate::core::{WorkerId, WorkerStatus};

/// Running timing aggregate for one stage.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StageTimings {
    /// Units this stage has completed.
    pub processed: u64,
    /// Sum of measured processing time, milliseconds.
    pub total_ms: u64,
    /// Mean measured processing time, milliseconds.
    pub avg_ms: f64,
}

impl StageTimings {
    pub(crate) fn record(&mut self, measured: Duration) {
        self.processed += 1;
        self.total_ms += measured.as_millis() as u64;
        self.avg_ms = self.total_ms as f64 / self.processed as f64;
    }
}

/// One worker's place in a status snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerSnapshot {
    pub id: WorkerId,
    pub status: WorkerStatus,
    /// Units sent and not yet completed.
    pub inflight: usize,
    /// Estimated outstanding duration, milliseconds.
    pub est_backlog_ms: u64,
    pub weight: u32,
}

/// One stage's place in a status snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct StageStatus {
    pub name: String,
    pub workers: Vec<WorkerSnapshot>,
    pub queue_depth: usize,
    pub busy: usize,
    pub idle: usize,
    pub timings: StageTimings,
}

impl StageStatus {
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn worker_ids(&self) -> Vec<WorkerId> {
        self.workers.iter().map(|w| w.id).collect()
    }
}

/// Point-in-time view of the whole engine.
#[derive(Debug, Clone, Serialize)]
pub struct RouterStatus {
    pub policy: String,
    pub total_workers: usize,
    /// Units accepted via submit.
    pub admitted: u64,
    /// Units whose terminal stage completed.
    pub finalized: u64,
    /// Units lost to worker crashes.
    pub abandoned: u64,
    /// Units currently queued or assigned, summed over stages.
    pub in_flight: usize,
    pub stages: Vec<StageStatus>,
}

impl RouterStatus {
    pub fn stage(&self, name: &str) -> Option<&StageStatus> {
        self.stages.iter().find(|s| s.name == name)
    }
}
