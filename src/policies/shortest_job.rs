//! Shortest-job-first policy.

use super::DispatchPolicy;
use crate::core::pool::{WorkerId, WorkerPool};
use crate::core::unit::WorkUnit;

/// Selects the worker with the smallest cumulative estimated backlog.
/// The estimate is declared (or generated at admission), not measured, so
/// drift between estimate and actual service time is expected; the
/// accumulators are clamped at zero on completion to absorb it. Ties go to
/// the earlier worker in pool order.
#[derive(Debug, Default)]
pub struct ShortestJobPolicy;

impl ShortestJobPolicy {
    pub fn new() -> Self {
        Self
    }
}

impl DispatchPolicy for ShortestJobPolicy {
    fn select_worker(&self, pool: &WorkerPool, _unit: &WorkUnit) -> Option<WorkerId> {
        let mut best = None;
        for entry in pool.iter() {
            match best {
                Some((_, backlog)) if entry.est_backlog() >= backlog => {}
                _ => best = Some((entry.id(), entry.est_backlog())),
            }
        }
        best.map(|(id, _)| id)
    }

    fn name(&self) -> &'static str {
        "shortest_job"
    }

    fn needs_estimate(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::policies::test_support::pool_of;

    #[test]
    fn picks_smallest_estimated_backlog() {
        let policy = ShortestJobPolicy::new();
        let mut pool = pool_of(3);
        pool.note_dispatch(WorkerId::from_raw(1), Duration::from_millis(500));
        pool.note_dispatch(WorkerId::from_raw(2), Duration::from_millis(100));
        pool.note_dispatch(WorkerId::from_raw(3), Duration::from_millis(300));

        assert_eq!(
            policy.select_worker(&pool, &WorkUnit::stub(1)),
            Some(WorkerId::from_raw(2))
        );
    }

    #[test]
    fn backlog_outweighs_connection_count() {
        let policy = ShortestJobPolicy::new();
        let mut pool = pool_of(2);
        // Worker 1 holds two short units, worker 2 one long unit; the
        // smaller total backlog wins even with more connections.
        pool.note_dispatch(WorkerId::from_raw(1), Duration::from_millis(50));
        pool.note_dispatch(WorkerId::from_raw(1), Duration::from_millis(50));
        pool.note_dispatch(WorkerId::from_raw(2), Duration::from_millis(300));

        assert_eq!(
            policy.select_worker(&pool, &WorkUnit::stub(1)),
            Some(WorkerId::from_raw(1))
        );
    }

    #[test]
    fn ties_break_by_pool_order() {
        let policy = ShortestJobPolicy::new();
        let pool = pool_of(4);
        assert_eq!(
            policy.select_worker(&pool, &WorkUnit::stub(1)),
            Some(WorkerId::from_raw(1))
        );
    }
}
