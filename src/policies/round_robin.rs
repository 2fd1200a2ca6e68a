//! Round-robin policy.

use std::sync::atomic::{AtomicUsize, Ordering};

use super::DispatchPolicy;
use crate::core::pool::{WorkerId, WorkerPool};
use crate::core::unit::WorkUnit;

/// Cycles through the pool in order. The cursor advances on every call
/// whether or not the target is busy, so a busy worker simply accumulates
/// orders in its inbox and drains them in sequence.
#[derive(Debug, Default)]
pub struct RoundRobinPolicy {
    counter: AtomicUsize,
}

impl RoundRobinPolicy {
    pub fn new() -> Self {
        Self {
            counter: AtomicUsize::new(0),
        }
    }
}

impl DispatchPolicy for RoundRobinPolicy {
    fn select_worker(&self, pool: &WorkerPool, _unit: &WorkUnit) -> Option<WorkerId> {
        if pool.is_empty() {
            return None;
        }
        let count = self.counter.fetch_add(1, Ordering::Relaxed);
        Some(pool.at(count % pool.len()).id())
    }

    fn name(&self) -> &'static str {
        "round_robin"
    }

    fn reset(&self) {
        self.counter.store(0, Ordering::Relaxed);
    }
}
