//! Public handle to a running dispatch engine.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::config::{self, ConfigResult, RouterConfig};
use crate::core::error::AdminError;
use crate::core::pool::WorkerId;
use crate::core::unit::{RequestId, UnitOutcome, WorkRequest, WorkUnit};
use crate::core::worker::{DurationSource, StageServiceTimes};
use crate::metrics::RouterStatus;
use crate::pipeline::{Coordinator, Event};

/// Receipt for one submitted unit: its id plus the channel the outcome
/// arrives on. Dropping the receiver discards the eventual result without
/// affecting the unit's traversal.
#[derive(Debug)]
pub struct Submission {
    pub id: RequestId,
    pub response: oneshot::Receiver<UnitOutcome>,
}

/// Cloneable handle to one engine instance. All methods funnel into the
/// coordinator's event channel; none of them touch scheduling state
/// directly.
#[derive(Debug, Clone)]
pub struct Router {
    events: mpsc::UnboundedSender<Event>,
    next_request: Arc<AtomicU64>,
}

impl Router {
    /// Validate the configuration and start an engine with the default
    /// duration source (stage service-time ranges, declared estimates
    /// winning). Must be called within a tokio runtime.
    pub fn new(config: RouterConfig) -> ConfigResult<Self> {
        let durations = Arc::new(StageServiceTimes::from_config(&config));
        Self::with_duration_source(config, durations)
    }

    /// Start an engine with an injected duration source; the hook that
    /// makes timing-sensitive tests deterministic.
    pub fn with_duration_source(
        config: RouterConfig,
        durations: Arc<dyn DurationSource>,
    ) -> ConfigResult<Self> {
        config::validate(&config)?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let coordinator = Coordinator::new(config, durations, events_tx.clone(), events_rx);
        tokio::spawn(coordinator.run());
        Ok(Self {
            events: events_tx,
            next_request: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Admit one unit of work. Never blocks and never fails: queues are
    /// unbounded, and on a stopped engine the returned receiver simply
    /// yields a closed-channel error.
    pub fn submit(&self, request: WorkRequest) -> Submission {
        let id = RequestId(self.next_request.fetch_add(1, Ordering::Relaxed) + 1);
        let (responder, response) = oneshot::channel();
        let unit = WorkUnit::new(id, request, responder);
        if self.events.send(Event::Submit(unit)).is_err() {
            debug!(unit = %id, "engine stopped; unit dropped");
        }
        Submission { id, response }
    }

    /// Point-in-time snapshot of every stage, worker, and counter.
    pub async fn status(&self) -> Result<RouterStatus, AdminError> {
        let (reply, rx) = oneshot::channel();
        self.events
            .send(Event::Status { reply })
            .map_err(|_| AdminError::Stopped)?;
        rx.await.map_err(|_| AdminError::Stopped)
    }

    /// Manually add one worker to a stage, bypassing the rebalancer.
    pub async fn scale_up(&self, stage: &str) -> Result<WorkerId, AdminError> {
        let (reply, rx) = oneshot::channel();
        self.events
            .send(Event::ScaleUp {
                stage: stage.to_string(),
                reply,
            })
            .map_err(|_| AdminError::Stopped)?;
        rx.await.map_err(|_| AdminError::Stopped)?
    }

    /// Manually remove one idle worker from a stage. Refuses to empty the
    /// stage or to remove a busy worker.
    pub async fn scale_down(&self, stage: &str) -> Result<WorkerId, AdminError> {
        let (reply, rx) = oneshot::channel();
        self.events
            .send(Event::ScaleDown {
                stage: stage.to_string(),
                reply,
            })
            .map_err(|_| AdminError::Stopped)?;
        rx.await.map_err(|_| AdminError::Stopped)?
    }

    /// Abort a live worker task, exercising the crash path: its in-flight
    /// work is abandoned and a replacement is spawned.
    pub async fn kill_worker(&self, stage: &str, worker: WorkerId) -> Result<(), AdminError> {
        let (reply, rx) = oneshot::channel();
        self.events
            .send(Event::KillWorker {
                stage: stage.to_string(),
                worker,
                reply,
            })
            .map_err(|_| AdminError::Stopped)?;
        rx.await.map_err(|_| AdminError::Stopped)?
    }

    /// Stop the coordinator and abort all workers. In-flight units are
    /// dropped; their response receivers observe a closed channel.
    pub fn shutdown(&self) {
        let _ = self.events.send(Event::Shutdown);
    }
}
