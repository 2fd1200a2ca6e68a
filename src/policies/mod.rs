//! Dispatch policies.
//!
//! One trait, one implementation per algorithm, selected by configuration
//! at engine construction. Policies are consulted only by the coordinator
//! task, so their cursor state needs no stronger ordering than `Relaxed`.

use std::fmt;

use crate::config::PolicyConfig;
use crate::core::pool::{WorkerId, WorkerPool};
use crate::core::unit::WorkUnit;

pub mod affinity_hash;
pub mod fcfs;
pub mod least_connections;
pub mod priority;
pub mod random;
pub mod round_robin;
pub mod shortest_job;
pub mod weighted_round_robin;

pub use affinity_hash::AffinityHashPolicy;
pub use fcfs::FcfsPolicy;
pub use least_connections::LeastConnectionsPolicy;
pub use priority::PriorityPolicy;
pub use random::RandomPolicy;
pub use round_robin::RoundRobinPolicy;
pub use shortest_job::ShortestJobPolicy;
pub use weighted_round_robin::WeightedRoundRobinPolicy;

/// Queue layout a policy expects its stage queue to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueDiscipline {
    /// Single FIFO band.
    Fifo,
    /// One FIFO band per priority class, drained highest class first.
    PriorityBands,
}

/// Worker-selection strategy for one stage.
///
/// `select_worker` is a pure function of the pool snapshot, the unit, and
/// the policy's own counters. Returning `None` leaves the unit queued for
/// the next dispatch attempt; it is never an error.
pub trait DispatchPolicy: Send + fmt::Debug {
    fn select_worker(&self, pool: &WorkerPool, unit: &WorkUnit) -> Option<WorkerId>;

    /// Policy name for logging and status reporting.
    fn name(&self) -> &'static str;

    fn queue_discipline(&self) -> QueueDiscipline {
        QueueDiscipline::Fifo
    }

    /// Whether units need a duration estimate attached at admission.
    fn needs_estimate(&self) -> bool {
        false
    }

    /// Clear any internal cursor state.
    fn reset(&self) {}
}

pub struct PolicyFactory;

impl PolicyFactory {
    /// Build one policy instance. Each stage gets its own, so cursors and
    /// consumption counters never leak across stages.
    pub fn create(config: &PolicyConfig) -> Box<dyn DispatchPolicy> {
        match config {
            PolicyConfig::Fcfs => Box::new(FcfsPolicy::new()),
            PolicyConfig::RoundRobin => Box::new(RoundRobinPolicy::new()),
            PolicyConfig::WeightedRoundRobin { .. } => Box::new(WeightedRoundRobinPolicy::new()),
            PolicyConfig::LeastConnections => Box::new(LeastConnectionsPolicy::new()),
            PolicyConfig::ShortestJob => Box::new(ShortestJobPolicy::new()),
            PolicyConfig::Priority => Box::new(PriorityPolicy::new()),
            PolicyConfig::AffinityHash => Box::new(AffinityHashPolicy::new()),
            PolicyConfig::Random => Box::new(RandomPolicy::new()),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::core::pool::{WorkerEntry, WorkerId, WorkerPool};

    /// Pool of `n` detached workers with ids 1..=n and unit weight.
    pub(crate) fn pool_of(n: u64) -> WorkerPool {
        let mut pool = WorkerPool::new();
        for i in 0..n {
            pool.insert(WorkerEntry::detached(WorkerId::from_raw(i + 1), 1));
        }
        pool
    }

    /// Pool with one worker per weight, ids 1..=weights.len().
    pub(crate) fn weighted_pool(weights: &[u32]) -> WorkerPool {
        let mut pool = WorkerPool::new();
        for (i, weight) in weights.iter().enumerate() {
            pool.insert(WorkerEntry::detached(WorkerId::from_raw(i as u64 + 1), *weight));
        }
        pool
    }
}
