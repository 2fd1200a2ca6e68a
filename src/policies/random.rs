//! Random policy.

use rand::Rng;

use super::DispatchPolicy;
use crate::core::pool::{WorkerId, WorkerPool};
use crate::core::unit::WorkUnit;

/// Uniform random pick over the whole pool, busy workers included.
#[derive(Debug, Default)]
pub struct RandomPolicy;

impl RandomPolicy {
    pub fn new() -> Self {
        Self
    }
}

impl DispatchPolicy for RandomPolicy {
    fn select_worker(&self, pool: &WorkerPool, _unit: &WorkUnit) -> Option<WorkerId> {
        if pool.is_empty() {
            return None;
        }
        let idx = rand::rng().random_range(0..pool.len());
        Some(pool.at(idx).id())
    }

    fn name(&self) -> &'static str {
        "random"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use crate::policies::test_support::pool_of;

    #[test]
    fn eventually_visits_every_worker() {
        let policy = RandomPolicy::new();
        let pool = pool_of(3);
        let unit = WorkUnit::stub(1);

        let mut seen = HashSet::new();
        for _ in 0..200 {
            seen.insert(policy.select_worker(&pool, &unit).unwrap());
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn empty_pool_yields_none() {
        let policy = RandomPolicy::new();
        let pool = WorkerPool::new();
        assert_eq!(policy.select_worker(&pool, &WorkUnit::stub(1)), None);
    }
}
