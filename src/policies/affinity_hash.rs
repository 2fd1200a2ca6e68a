//! Client-affinity hashing policy.

use super::DispatchPolicy;
use crate::core::pool::{WorkerId, WorkerPool};
use crate::core::unit::WorkUnit;

/// Maps a unit's client key onto the pool with a byte-sum hash, so the
/// same key lands on the same worker while the pool size is stable. There
/// is no consistent-hashing ring: a pool resize remaps every key. Units
/// without a key fall back to hashing their request id.
#[derive(Debug, Default)]
pub struct AffinityHashPolicy;

impl AffinityHashPolicy {
    pub fn new() -> Self {
        Self
    }
}

fn hash_key(key: &str) -> usize {
    key.bytes().map(usize::from).sum()
}

impl DispatchPolicy for AffinityHashPolicy {
    fn select_worker(&self, pool: &WorkerPool, unit: &WorkUnit) -> Option<WorkerId> {
        if pool.is_empty() {
            return None;
        }
        let hash = match unit.client_key() {
            Some(key) => hash_key(key),
            None => unit.id.value() as usize,
        };
        Some(pool.at(hash % pool.len()).id())
    }

    fn name(&self) -> &'static str {
        "affinity_hash"
    }
}
