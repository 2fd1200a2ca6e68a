use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Service-time bounds for the simulated processing a stage performs,
/// in milliseconds. When `min_ms == max_ms` the stage is deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DurationRange {
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    /// Draw one service time from the range (inclusive bounds).
    pub fn sample(&self) -> Duration {
        if self.max_ms <= self.min_ms {
            return Duration::from_millis(self.min_ms);
        }
        let ms = rand::rng().random_range(self.min_ms..=self.max_ms);
        Duration::from_millis(ms)
    }
}

impl Default for DurationRange {
    fn default() -> Self {
        // Flat-pool service time used by the single-stage balancers.
        Self::new(1000, 5000)
    }
}

/// One pipeline stage: a named worker pool plus its inbound queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageConfig {
    /// Stage name, unique within the pipeline.
    pub name: String,
    /// Workers spawned for this stage at startup.
    pub initial_workers: usize,
    /// Simulated service-time range for this stage.
    pub service_time: DurationRange,
}

impl StageConfig {
    pub fn new(name: impl Into<String>, initial_workers: usize) -> Self {
        Self {
            name: name.into(),
            initial_workers,
            service_time: DurationRange::default(),
        }
    }

    pub fn with_service_time(mut self, range: DurationRange) -> Self {
        self.service_time = range;
        self
    }
}

/// Dispatch policy selection, one variant per supported algorithm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PolicyConfig {
    /// First idle worker in pool order.
    Fcfs,
    /// Cycle through the pool regardless of worker state.
    RoundRobin,
    /// Round robin where each worker takes `weight` consecutive turns.
    WeightedRoundRobin {
        /// Weights assigned to workers in creation order, cycling when the
        /// pool outgrows the table.
        weights: Vec<u32>,
    },
    /// Fewest in-flight units, idle workers first.
    LeastConnections,
    /// Smallest cumulative estimated backlog.
    ShortestJob,
    /// Per-class FIFO bands drained highest class first.
    Priority,
    /// Deterministic client-key hash onto the pool.
    AffinityHash,
    /// Uniform random pick.
    Random,
}

impl PolicyConfig {
    pub fn name(&self) -> &'static str {
        match self {
            PolicyConfig::Fcfs => "fcfs",
            PolicyConfig::RoundRobin => "round_robin",
            PolicyConfig::WeightedRoundRobin { .. } => "weighted_round_robin",
            PolicyConfig::LeastConnections => "least_connections",
            PolicyConfig::ShortestJob => "shortest_job",
            PolicyConfig::Priority => "priority",
            PolicyConfig::AffinityHash => "affinity_hash",
            PolicyConfig::Random => "random",
        }
    }

    /// Default weight table used when `weighted_round_robin` is requested
    /// without one: worker n gets weight n+1, wrapping after four.
    pub fn default_weights() -> Vec<u32> {
        vec![1, 2, 3, 4]
    }
}

/// Thresholds and bounds for the adaptive rebalancer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebalancerConfig {
    /// Master switch; when false the pools stay as configured.
    pub enabled: bool,
    /// A stage above this load factor is eligible to receive a moved worker.
    pub high_water: f64,
    /// A stage below this load factor is eligible to donate a worker.
    pub low_water: f64,
    /// Average load factor above which one extra worker is created.
    pub saturation: f64,
    /// Average load factor below which one idle worker is destroyed.
    pub idle: f64,
    /// Global worker ceiling for net scale-up.
    pub max_workers: usize,
    /// Global worker floor for net scale-down.
    pub min_workers: usize,
}

impl RebalancerConfig {
    /// Defaults sized for a pipeline of `stages` stages: ceiling of four
    /// workers per stage, floor of two.
    pub fn for_stages(stages: usize) -> Self {
        Self {
            enabled: true,
            high_water: 0.8,
            low_water: 0.3,
            saturation: 0.85,
            idle: 0.2,
            max_workers: stages.max(1) * 4,
            min_workers: stages.max(1) * 2,
        }
    }
}

impl Default for RebalancerConfig {
    fn default() -> Self {
        Self::for_stages(3)
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    pub stages: Vec<StageConfig>,
    pub policy: PolicyConfig,
    pub rebalancer: RebalancerConfig,
}

impl RouterConfig {
    pub fn new(stages: Vec<StageConfig>, policy: PolicyConfig) -> Self {
        let rebalancer = RebalancerConfig::for_stages(stages.len());
        Self {
            stages,
            policy,
            rebalancer,
        }
    }

    /// A single-stage pool, the shape of the flat load balancers.
    pub fn single_stage(name: impl Into<String>, workers: usize, policy: PolicyConfig) -> Self {
        Self::new(vec![StageConfig::new(name, workers)], policy)
    }

    /// The canonical three-stage pipeline with its stage-specific
    /// service-time ranges.
    pub fn pipeline_defaults(workers_per_stage: usize, policy: PolicyConfig) -> Self {
        Self::new(
            vec![
                StageConfig::new("parse", workers_per_stage)
                    .with_service_time(DurationRange::new(300, 900)),
                StageConfig::new("compute", workers_per_stage)
                    .with_service_time(DurationRange::new(600, 2100)),
                StageConfig::new("finalize", workers_per_stage)
                    .with_service_time(DurationRange::new(200, 700)),
            ],
            policy,
        )
    }

    pub fn stage_index(&self, name: &str) -> Option<usize> {
        self.stages.iter().position(|s| s.name == name)
    }
}
