//! Policy-driven work dispatch across staged worker pools.
//!
//! The engine routes work units through an ordered pipeline of stages. Each
//! stage owns a pool of worker tasks and an inbound queue; a configurable
//! dispatch policy picks the destination worker for every unit, and an
//! adaptive rebalancer moves capacity between stages when their load factors
//! drift apart.
//!
//! All scheduling state lives inside a single coordinator task. Workers talk
//! to it exclusively through channels, so no locks guard the queues, pools,
//! or policy counters.

pub mod config;
pub mod core;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod policies;
pub mod router;

pub use config::{
    ConfigError, ConfigResult, DurationRange, PolicyConfig, RebalancerConfig, RouterConfig,
    StageConfig,
};
pub use crate::core::unit::{Priority, RequestId, UnitOutcome, WorkRequest};
pub use crate::core::worker::{DurationSource, FixedDuration, StageServiceTimes};
pub use crate::core::{AdminError, WorkerId, WorkerStatus};
pub use metrics::{RouterStatus, StageStatus, StageTimings, WorkerSnapshot};
pub use router::{Router, Submission};
