//! Priority-class policy.
//!
//! The class ordering itself lives in the stage queue: this policy asks for
//! [`QueueDiscipline::PriorityBands`], so the coordinator drains the
//! highest non-empty band first and requeues an undispatchable unit at the
//! front of its own band. Worker selection is then plain first-idle.

use super::{DispatchPolicy, QueueDiscipline};
use crate::core::pool::{WorkerId, WorkerPool};
use crate::core::unit::WorkUnit;

#[derive(Debug, Default)]
pub struct PriorityPolicy;

impl PriorityPolicy {
    pub fn new() -> Self {
        Self
    }
}

impl DispatchPolicy for PriorityPolicy {
    fn select_worker(&self, pool: &WorkerPool, _unit: &WorkUnit) -> Option<WorkerId> {
        pool.first_idle()
    }

    fn name(&self) -> &'static str {
        "priority"
    }

    fn queue_discipline(&self) -> QueueDiscipline {
        QueueDiscipline::PriorityBands
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policies::test_support::pool_of;

    #[test]
    fn selection_is_first_idle() {
        let policy = PriorityPolicy::new();
        let mut pool = pool_of(2);
        pool.mark_busy(WorkerId::from_raw(1));
        assert_eq!(
            policy.select_worker(&pool, &WorkUnit::stub(1)),
            Some(WorkerId::from_raw(2))
        );

        pool.mark_busy(WorkerId::from_raw(2));
        assert_eq!(policy.select_worker(&pool, &WorkUnit::stub(2)), None);
    }
}
