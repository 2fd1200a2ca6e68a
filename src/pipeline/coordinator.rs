//! The dispatch coordinator.
//!
//! One coordinator task owns every queue, pool, policy instance, and
//! counter of its engine. It mutates them only while handling one event at
//! a time from a single inbound channel, so none of this state needs a
//! lock. Workers, admin callers, and status queries all reach it through
//! [`Event`] messages.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::config::{DurationRange, PolicyConfig, RouterConfig};
use crate::core::error::AdminError;
use crate::core::pool::{WorkerEntry, WorkerId, WorkerPool};
use crate::core::unit::{UnitOutcome, WorkUnit};
use crate::core::worker::{self, DurationSource, WorkOrder};
use crate::metrics::{RouterStatus, StageStatus, StageTimings, WorkerSnapshot};
use crate::policies::{DispatchPolicy, PolicyFactory};

use super::queue::StageQueue;
use super::rebalancer::{Adjustment, Rebalancer, StageLoad};

/// Everything the coordinator can be asked to do.
#[derive(Debug)]
pub(crate) enum Event {
    Submit(WorkUnit),
    Completed {
        stage: usize,
        worker: WorkerId,
        unit: WorkUnit,
        measured: Duration,
    },
    /// A worker task terminated; crash or tail end of a graceful removal.
    WorkerExited {
        stage: usize,
        worker: WorkerId,
    },
    Status {
        reply: oneshot::Sender<RouterStatus>,
    },
    ScaleUp {
        stage: String,
        reply: oneshot::Sender<Result<WorkerId, AdminError>>,
    },
    ScaleDown {
        stage: String,
        reply: oneshot::Sender<Result<WorkerId, AdminError>>,
    },
    KillWorker {
        stage: String,
        worker: WorkerId,
        reply: oneshot::Sender<Result<(), AdminError>>,
    },
    Shutdown,
}

/// One stage of the pipeline: its pool, queue, policy instance, and
/// derived timing metrics.
struct StageState {
    name: String,
    service_time: DurationRange,
    pool: WorkerPool,
    queue: StageQueue,
    policy: Box<dyn DispatchPolicy>,
    timings: StageTimings,
}

pub(crate) struct Coordinator {
    stages: Vec<StageState>,
    events_tx: mpsc::UnboundedSender<Event>,
    events_rx: mpsc::UnboundedReceiver<Event>,
    durations: Arc<dyn DurationSource>,
    rebalancer: Rebalancer,
    /// Weight table applied to workers in pool-position order.
    weights: Vec<u32>,
    policy_name: &'static str,
    next_worker: u64,
    admitted: u64,
    finalized: u64,
    abandoned: u64,
}

impl Coordinator {
    pub(crate) fn new(
        config: RouterConfig,
        durations: Arc<dyn DurationSource>,
        events_tx: mpsc::UnboundedSender<Event>,
        events_rx: mpsc::UnboundedReceiver<Event>,
    ) -> Self {
        let weights = match &config.policy {
            PolicyConfig::WeightedRoundRobin { weights } => weights.clone(),
            _ => vec![1],
        };
        let stages = config
            .stages
            .iter()
            .map(|stage_config| {
                let policy = PolicyFactory::create(&config.policy);
                let queue = StageQueue::new(policy.queue_discipline());
                StageState {
                    name: stage_config.name.clone(),
                    service_time: stage_config.service_time,
                    pool: WorkerPool::new(),
                    queue,
                    policy,
                    timings: StageTimings::default(),
                }
            })
            .collect();

        let mut coordinator = Self {
            stages,
            events_tx,
            events_rx,
            durations,
            rebalancer: Rebalancer::new(config.rebalancer.clone()),
            weights,
            policy_name: config.policy.name(),
            next_worker: 0,
            admitted: 0,
            finalized: 0,
            abandoned: 0,
        };
        for (idx, stage_config) in config.stages.iter().enumerate() {
            for _ in 0..stage_config.initial_workers {
                coordinator.spawn_worker(idx);
            }
        }
        coordinator
    }

    /// The event loop. Runs until shutdown or until every handle to the
    /// engine is dropped.
    pub(crate) async fn run(mut self) {
        info!(
            policy = self.policy_name,
            stages = self.stages.len(),
            "coordinator started"
        );
        while let Some(event) = self.events_rx.recv().await {
            match event {
                Event::Submit(unit) => self.on_submit(unit),
                Event::Completed {
                    stage,
                    worker,
                    unit,
                    measured,
                } => self.on_completed(stage, worker, unit, measured),
                Event::WorkerExited { stage, worker } => self.on_worker_exited(stage, worker),
                Event::Status { reply } => {
                    let _ = reply.send(self.snapshot());
                }
                Event::ScaleUp { stage, reply } => {
                    let _ = reply.send(self.on_scale_up(&stage));
                }
                Event::ScaleDown { stage, reply } => {
                    let _ = reply.send(self.on_scale_down(&stage));
                }
                Event::KillWorker {
                    stage,
                    worker,
                    reply,
                } => {
                    let _ = reply.send(self.on_kill_worker(&stage, worker));
                }
                Event::Shutdown => break,
            }
        }
        for stage in &self.stages {
            for entry in stage.pool.iter() {
                entry.kill();
            }
        }
        info!("coordinator stopped");
    }

    fn on_submit(&mut self, mut unit: WorkUnit) {
        self.admitted += 1;
        let entry_stage = &self.stages[0];
        if entry_stage.policy.needs_estimate() && unit.estimate.is_none() {
            unit.estimate = Some(entry_stage.service_time.sample());
        }
        debug!(unit = %unit.id, priority = %unit.priority(), "unit admitted");
        unit.stage = 0;
        self.enqueue(0, unit);
        self.pump(0);
    }

    fn on_completed(
        &mut self,
        stage_idx: usize,
        worker: WorkerId,
        mut unit: WorkUnit,
        measured: Duration,
    ) {
        let estimate = unit.estimate().unwrap_or_default();
        let Some(stage) = self.stages.get_mut(stage_idx) else {
            warn!(stage_idx, unit = %unit.id, "completion for unknown stage; unit dropped");
            self.abandoned += 1;
            return;
        };
        if stage.pool.get(worker).is_some() {
            stage.pool.note_completion(worker, estimate);
        } else {
            warn!(worker = %worker, stage = %stage.name, "completion from unknown worker");
        }
        stage.timings.record(measured);
        unit.processing += measured;
        debug!(
            unit = %unit.id,
            worker = %worker,
            stage = %stage.name,
            measured_ms = measured.as_millis() as u64,
            "stage completed"
        );

        // Serve the freed stage before advancing the completed unit, so it
        // stays saturated.
        self.pump(stage_idx);

        let next = stage_idx + 1;
        if next < self.stages.len() {
            unit.stage = next;
            self.enqueue(next, unit);
            self.pump(next);
        } else {
            self.finalize(unit);
        }

        self.rebalance();
    }

    fn on_worker_exited(&mut self, stage_idx: usize, worker: WorkerId) {
        let Some(stage) = self.stages.get_mut(stage_idx) else {
            return;
        };
        if stage.pool.get(worker).is_none() {
            debug!(worker = %worker, stage = %stage.name, "exit after graceful removal");
            return;
        }
        let Ok(entry) = stage.pool.remove(worker, true) else {
            return;
        };
        let lost = entry.inflight() as u64;
        self.abandoned += lost;
        warn!(
            worker = %worker,
            stage = %stage.name,
            lost,
            "worker crashed; in-flight work abandoned"
        );
        self.spawn_worker(stage_idx);
        self.pump(stage_idx);
    }

    fn enqueue(&mut self, stage_idx: usize, unit: WorkUnit) {
        let stage = &mut self.stages[stage_idx];
        debug!(unit = %unit.id, stage = %stage.name, depth = stage.queue.len() + 1, "unit queued");
        stage.queue.push(unit);
    }

    /// Dispatch from the stage queue until it empties or the policy finds
    /// no worker.
    fn pump(&mut self, stage_idx: usize) {
        loop {
            let stage = &mut self.stages[stage_idx];
            let Some(unit) = stage.queue.pop() else {
                break;
            };
            match stage.policy.select_worker(&stage.pool, &unit) {
                Some(worker) => {
                    let estimate = unit.estimate().unwrap_or_default();
                    debug!(unit = %unit.id, worker = %worker, stage = %stage.name, "dispatch");
                    stage.pool.note_dispatch(worker, estimate);
                    let order = WorkOrder {
                        stage: stage_idx,
                        unit,
                    };
                    if let Err(order) = stage.pool.send_order(worker, order) {
                        // Channel already closed: the worker is dying and
                        // its exit event has not been processed yet.
                        warn!(worker = %worker, stage = %stage.name, "order channel closed; unit requeued");
                        stage.pool.note_completion(worker, estimate);
                        stage.queue.push_front(order.unit);
                        break;
                    }
                }
                None => {
                    stage.queue.push_front(unit);
                    break;
                }
            }
        }
    }

    fn finalize(&mut self, mut unit: WorkUnit) {
        self.finalized += 1;
        let outcome = UnitOutcome {
            id: unit.id,
            stages: unit.stage + 1,
            processing: unit.processing,
            completed: self.finalized,
        };
        debug!(unit = %unit.id, ordinal = self.finalized, "unit finalized");
        if let Some(responder) = unit.responder.take() {
            if responder.send(outcome).is_err() {
                debug!(unit = %unit.id, "response receiver dropped; result discarded");
            }
        }
    }

    fn rebalance(&mut self) {
        let loads: Vec<StageLoad> = self
            .stages
            .iter()
            .map(|s| StageLoad {
                workers: s.pool.len(),
                busy: s.pool.busy_count(),
                idle_workers: s.pool.idle_count(),
                queued: s.queue.len(),
            })
            .collect();
        match self.rebalancer.plan(&loads) {
            Some(Adjustment::Move { from, to }) => {
                if let Some(removed) = self.remove_idle_worker(from) {
                    info!(
                        from = %self.stages[from].name,
                        to = %self.stages[to].name,
                        removed = %removed,
                        "rebalance: moving capacity to bottleneck"
                    );
                    self.spawn_worker(to);
                    self.pump(to);
                }
            }
            Some(Adjustment::ScaleUp { stage }) => {
                info!(stage = %self.stages[stage].name, "rebalance: scaling up");
                self.spawn_worker(stage);
                self.pump(stage);
            }
            Some(Adjustment::ScaleDown { stage }) => {
                if let Some(removed) = self.remove_idle_worker(stage) {
                    info!(
                        stage = %self.stages[stage].name,
                        removed = %removed,
                        "rebalance: scaling down"
                    );
                }
            }
            None => {}
        }
    }

    /// Create one worker for a stage, assigning the next weight from the
    /// table by pool position.
    fn spawn_worker(&mut self, stage_idx: usize) -> WorkerId {
        self.next_worker += 1;
        let id = WorkerId(self.next_worker);
        let stage = &mut self.stages[stage_idx];
        let weight = self.weights[stage.pool.len() % self.weights.len()];
        let (orders, abort) = worker::spawn(
            stage_idx,
            id,
            self.events_tx.clone(),
            Arc::clone(&self.durations),
        );
        stage.pool.insert(WorkerEntry::new(id, weight, orders, abort));
        info!(worker = %id, stage = %stage.name, weight, "worker created");
        id
    }

    /// Gracefully remove the first idle worker of a stage. Dropping the
    /// entry closes its order channel, which ends the worker task.
    fn remove_idle_worker(&mut self, stage_idx: usize) -> Option<WorkerId> {
        let stage = &mut self.stages[stage_idx];
        let id = stage.pool.first_idle()?;
        stage.pool.remove(id, false).ok()?;
        info!(worker = %id, stage = %stage.name, "worker removed");
        Some(id)
    }

    fn stage_index(&self, name: &str) -> Result<usize, AdminError> {
        self.stages
            .iter()
            .position(|s| s.name == name)
            .ok_or_else(|| AdminError::UnknownStage(name.to_string()))
    }

    fn on_scale_up(&mut self, name: &str) -> Result<WorkerId, AdminError> {
        let idx = self.stage_index(name)?;
        let id = self.spawn_worker(idx);
        self.pump(idx);
        Ok(id)
    }

    fn on_scale_down(&mut self, name: &str) -> Result<WorkerId, AdminError> {
        let idx = self.stage_index(name)?;
        if self.stages[idx].pool.len() <= 1 {
            return Err(AdminError::NoRemovableWorker(name.to_string()));
        }
        self.remove_idle_worker(idx)
            .ok_or_else(|| AdminError::NoRemovableWorker(name.to_string()))
    }

    fn on_kill_worker(&mut self, name: &str, worker: WorkerId) -> Result<(), AdminError> {
        let idx = self.stage_index(name)?;
        match self.stages[idx].pool.get(worker) {
            Some(entry) => {
                entry.kill();
                Ok(())
            }
            None => Err(AdminError::UnknownWorker(worker)),
        }
    }

    fn snapshot(&self) -> RouterStatus {
        let stages: Vec<StageStatus> = self
            .stages
            .iter()
            .map(|s| StageStatus {
                name: s.name.clone(),
                workers: s
                    .pool
                    .iter()
                    .map(|e| WorkerSnapshot {
                        id: e.id(),
                        status: e.status(),
                        inflight: e.inflight(),
                        est_backlog_ms: e.est_backlog().as_millis() as u64,
                        weight: e.weight(),
                    })
                    .collect(),
                queue_depth: s.queue.len(),
                busy: s.pool.busy_count(),
                idle: s.pool.idle_count(),
                timings: s.timings,
            })
            .collect();
        let total_workers = stages.iter().map(|s| s.workers.len()).sum();
        let in_flight = self
            .stages
            .iter()
            .map(|s| s.queue.len() + s.pool.iter().map(|e| e.inflight()).sum::<usize>())
            .sum();
        RouterStatus {
            policy: self.policy_name.to_string(),
            total_workers,
            admitted: self.admitted,
            finalized: self.finalized,
            abandoned: self.abandoned,
            in_flight,
            stages,
        }
    }
}
