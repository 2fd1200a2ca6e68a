//! First-come-first-served policy.

use super::DispatchPolicy;
use crate::core::pool::{WorkerId, WorkerPool};
use crate::core::unit::WorkUnit;

/// Selects the first idle worker in pool enumeration order. With every
/// worker busy the unit stays queued, which is what preserves arrival
/// order through a saturated stage.
#[derive(Debug, Default)]
pub struct FcfsPolicy;

impl FcfsPolicy {
    pub fn new() -> Self {
        Self
    }
}

impl DispatchPolicy for FcfsPolicy {
    fn select_worker(&self, pool: &WorkerPool, _unit: &WorkUnit) -> Option<WorkerId> {
        pool.first_idle()
    }

    fn name(&self) -> &'static str {
        "fcfs"
    }
}
