use super::pool::WorkerId;

/// Failures surfaced by worker-pool mutation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("worker {0} is busy")]
    Busy(WorkerId),

    #[error("worker {0} not found")]
    NotFound(WorkerId),
}

/// Failures surfaced by the administrative operations on a running engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdminError {
    #[error("unknown stage '{0}'")]
    UnknownStage(String),

    #[error("worker {0} not found")]
    UnknownWorker(WorkerId),

    #[error("worker {0} is busy")]
    WorkerBusy(WorkerId),

    #[error("stage '{0}' has no removable idle worker")]
    NoRemovableWorker(String),

    #[error("engine is stopped")]
    Stopped,
}

impl From<PoolError> for AdminError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Busy(id) => AdminError::WorkerBusy(id),
            PoolError::NotFound(id) => AdminError::UnknownWorker(id),
        }
    }
}
