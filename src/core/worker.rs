//! Worker execution task.
//!
//! A worker is an isolated tokio task fed through its own order channel. It
//! performs simulated processing for a duration drawn from an injected
//! [`DurationSource`], then reports the measured time back to the
//! coordinator. Crash detection rides on the task lifecycle itself: a
//! detached watcher reports the task's termination, and the coordinator
//! decides whether that termination was a graceful removal or a crash.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::debug;

use super::pool::WorkerId;
use super::unit::WorkUnit;
use crate::config::{DurationRange, RouterConfig};
use crate::pipeline::Event;

/// Dispatch message handed to a worker: the stage it is serving and the
/// unit to process.
#[derive(Debug)]
pub(crate) struct WorkOrder {
    pub stage: usize,
    pub unit: WorkUnit,
}

/// Source of simulated processing durations, injected into every worker so
/// tests can replace the randomized defaults with fixed values.
pub trait DurationSource: Send + Sync + fmt::Debug {
    fn sample(&self, stage: usize, unit: &WorkUnit) -> Duration;
}

/// Default source: a unit's declared estimate wins; otherwise the stage's
/// configured service-time range is sampled.
#[derive(Debug)]
pub struct StageServiceTimes {
    ranges: Vec<DurationRange>,
}

impl StageServiceTimes {
    pub fn from_config(config: &RouterConfig) -> Self {
        Self {
            ranges: config.stages.iter().map(|s| s.service_time).collect(),
        }
    }
}

impl DurationSource for StageServiceTimes {
    fn sample(&self, stage: usize, unit: &WorkUnit) -> Duration {
        if let Some(estimate) = unit.estimate() {
            return estimate;
        }
        self.ranges
            .get(stage)
            .copied()
            .unwrap_or_default()
            .sample()
    }
}

/// Every unit takes exactly this long, regardless of stage or estimate.
#[derive(Debug, Clone, Copy)]
pub struct FixedDuration(pub Duration);

impl DurationSource for FixedDuration {
    fn sample(&self, _stage: usize, _unit: &WorkUnit) -> Duration {
        self.0
    }
}

/// Spawn one worker task plus its exit watcher. Returns the order channel
/// and an abort handle for crash injection.
pub(crate) fn spawn(
    stage: usize,
    id: WorkerId,
    events: mpsc::UnboundedSender<Event>,
    durations: Arc<dyn DurationSource>,
) -> (mpsc::UnboundedSender<WorkOrder>, AbortHandle) {
    let (orders_tx, orders_rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(run(stage, id, orders_rx, events.clone(), durations));
    let abort = handle.abort_handle();
    tokio::spawn(watch(stage, id, handle, events));
    (orders_tx, abort)
}

/// The worker loop: drain orders one at a time, in arrival order.
async fn run(
    stage: usize,
    id: WorkerId,
    mut orders: mpsc::UnboundedReceiver<WorkOrder>,
    events: mpsc::UnboundedSender<Event>,
    durations: Arc<dyn DurationSource>,
) {
    debug!(worker = %id, stage, "worker started");
    while let Some(order) = orders.recv().await {
        let service = durations.sample(order.stage, &order.unit);
        let started = tokio::time::Instant::now();
        tokio::time::sleep(service).await;
        let completion = Event::Completed {
            stage: order.stage,
            worker: id,
            unit: order.unit,
            measured: started.elapsed(),
        };
        if events.send(completion).is_err() {
            // Coordinator is gone; nothing left to report to.
            return;
        }
    }
    debug!(worker = %id, stage, "worker stopped");
}

/// Report the worker task's termination. The coordinator treats an exit
/// for a pool-resident id as a crash and anything else as the tail end of
/// a graceful removal.
async fn watch(
    stage: usize,
    id: WorkerId,
    handle: JoinHandle<()>,
    events: mpsc::UnboundedSender<Event>,
) {
    let _ = handle.await;
    let _ = events.send(Event::WorkerExited { stage, worker: id });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_estimate_overrides_stage_range() {
        let config = RouterConfig::pipeline_defaults(1, crate::config::PolicyConfig::Fcfs);
        let source = StageServiceTimes::from_config(&config);
        let mut unit = WorkUnit::stub(1);
        unit.estimate = Some(Duration::from_millis(42));
        assert_eq!(source.sample(0, &unit), Duration::from_millis(42));
    }

    #[test]
    fn missing_stage_falls_back_to_default_range() {
        let source = StageServiceTimes { ranges: vec![] };
        let unit = WorkUnit::stub(1);
        let d = source.sample(7, &unit);
        assert!(d >= Duration::from_millis(1000) && d <= Duration::from_millis(5000));
    }
}
