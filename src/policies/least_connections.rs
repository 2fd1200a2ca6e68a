//! Least-connections policy.

use super::DispatchPolicy;
use crate::core::pool::{WorkerEntry, WorkerId, WorkerPool};
use crate::core::unit::WorkUnit;

/// Selects the worker with the fewest in-flight units, preferring idle
/// workers and falling back to the least-loaded busy one when the whole
/// pool is occupied. Ties go to the earlier worker in pool order.
#[derive(Debug, Default)]
pub struct LeastConnectionsPolicy;

impl LeastConnectionsPolicy {
    pub fn new() -> Self {
        Self
    }
}

fn min_by_inflight<'a>(
    candidates: impl Iterator<Item = &'a WorkerEntry>,
) -> Option<WorkerId> {
    let mut best: Option<&WorkerEntry> = None;
    for entry in candidates {
        match best {
            Some(current) if entry.inflight() >= current.inflight() => {}
            _ => best = Some(entry),
        }
    }
    best.map(|e| e.id())
}

impl DispatchPolicy for LeastConnectionsPolicy {
    fn select_worker(&self, pool: &WorkerPool, _unit: &WorkUnit) -> Option<WorkerId> {
        min_by_inflight(pool.iter().filter(|e| e.is_idle()))
            .or_else(|| min_by_inflight(pool.iter()))
    }

    fn name(&self) -> &'static str {
        "least_connections"
    }
}
