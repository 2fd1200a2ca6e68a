//! Weighted round-robin policy.

use std::sync::atomic::{AtomicUsize, Ordering};

use super::DispatchPolicy;
use crate::core::pool::{WorkerId, WorkerPool};
use crate::core::unit::WorkUnit;

/// Round robin where each worker takes `weight` consecutive turns before
/// the cursor advances. A busy worker forfeits the rest of its allocation;
/// if one full sweep (two passes over the pool, to cover a partially
/// consumed allocation at the starting cursor) finds no idle worker,
/// selection fails and the unit stays queued.
#[derive(Debug, Default)]
pub struct WeightedRoundRobinPolicy {
    cursor: AtomicUsize,
    consumed: AtomicUsize,
}

impl WeightedRoundRobinPolicy {
    pub fn new() -> Self {
        Self {
            cursor: AtomicUsize::new(0),
            consumed: AtomicUsize::new(0),
        }
    }
}

impl DispatchPolicy for WeightedRoundRobinPolicy {
    fn select_worker(&self, pool: &WorkerPool, _unit: &WorkUnit) -> Option<WorkerId> {
        let len = pool.len();
        if len == 0 {
            return None;
        }

        let mut cursor = self.cursor.load(Ordering::Relaxed) % len;
        let mut consumed = self.consumed.load(Ordering::Relaxed);
        let mut selected = None;

        for _ in 0..len * 2 {
            let entry = pool.at(cursor);
            if consumed < entry.weight() as usize && entry.is_idle() {
                consumed += 1;
                selected = Some(entry.id());
                break;
            }
            cursor = (cursor + 1) % len;
            consumed = 0;
        }

        self.cursor.store(cursor, Ordering::Relaxed);
        self.consumed.store(consumed, Ordering::Relaxed);
        selected
    }

    fn name(&self) -> &'static str {
        "weighted_round_robin"
    }

    fn reset(&self) {
        self.cursor.store(0, Ordering::Relaxed);
        self.consumed.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policies::test_support::weighted_pool;

    #[test]
    fn weight_grants_consecutive_turns() {
        let policy = WeightedRoundRobinPolicy::new();
        let pool = weighted_pool(&[1, 2, 3]);
        let unit = WorkUnit::stub(1);

        let picks: Vec<u64> = (0..6)
            .map(|_| policy.select_worker(&pool, &unit).unwrap().value())
            .collect();
        // Worker 1 once, worker 2 twice, worker 3 three times.
        assert_eq!(picks, vec![1, 2, 2, 3, 3, 3]);
    }

    #[test]
    fn busy_worker_forfeits_its_turns() {
        let policy = WeightedRoundRobinPolicy::new();
        let mut pool = weighted_pool(&[2, 1]);
        pool.mark_busy(WorkerId::from_raw(1));

        let unit = WorkUnit::stub(1);
        assert_eq!(policy.select_worker(&pool, &unit), Some(WorkerId::from_raw(2)));
    }

    #[test]
    fn all_busy_fails_selection() {
        let policy = WeightedRoundRobinPolicy::new();
        let mut pool = weighted_pool(&[1, 2]);
        pool.mark_busy(WorkerId::from_raw(1));
        pool.mark_busy(WorkerId::from_raw(2));
        assert_eq!(policy.select_worker(&pool, &WorkUnit::stub(1)), None);
    }
}
