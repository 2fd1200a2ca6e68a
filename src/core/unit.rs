//! The schedulable item flowing through the pipeline.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

/// Monotonically increasing identity of an admitted work unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RequestId(pub(crate) u64);

impl RequestId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// Priority class of a work unit. Only the priority policy acts on it;
/// every other policy treats units uniformly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    /// Number of priority bands a class-keyed queue carries.
    pub const CLASSES: usize = 3;

    /// Queue band for this class; lower bands drain first.
    pub fn band(&self) -> usize {
        match self {
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::High => write!(f, "high"),
            Priority::Medium => write!(f, "medium"),
            Priority::Low => write!(f, "low"),
        }
    }
}

/// Caller-supplied attributes of a unit of work.
#[derive(Debug, Clone, Default)]
pub struct WorkRequest {
    /// Affinity key, typically the client address.
    pub client_key: Option<String>,
    pub priority: Priority,
    /// Declared duration estimate; filled in at admission when the active
    /// policy needs one and none was given.
    pub estimate: Option<Duration>,
}

impl WorkRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client_key(mut self, key: impl Into<String>) -> Self {
        self.client_key = Some(key.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_estimate(mut self, estimate: Duration) -> Self {
        self.estimate = Some(estimate);
        self
    }
}

/// Result delivered through a unit's response handle after the terminal
/// stage completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitOutcome {
    pub id: RequestId,
    /// Stages the unit traversed.
    pub stages: usize,
    /// Total measured processing time across all stages.
    pub processing: Duration,
    /// Finalization ordinal: 1 for the first unit the engine finalized,
    /// 2 for the second, and so on.
    pub completed: u64,
}

/// A work unit in flight. Created at admission, carried through worker
/// channels, dropped at finalization or abandonment.
pub struct WorkUnit {
    pub id: RequestId,
    pub(crate) client_key: Option<String>,
    pub(crate) priority: Priority,
    pub(crate) estimate: Option<Duration>,
    /// Index of the stage the unit is currently queued for or assigned to.
    pub(crate) stage: usize,
    /// Accumulated measured processing time.
    pub(crate) processing: Duration,
    pub(crate) responder: Option<oneshot::Sender<UnitOutcome>>,
}

impl WorkUnit {
    pub(crate) fn new(
        id: RequestId,
        request: WorkRequest,
        responder: oneshot::Sender<UnitOutcome>,
    ) -> Self {
        Self {
            id,
            client_key: request.client_key,
            priority: request.priority,
            estimate: request.estimate,
            stage: 0,
            processing: Duration::ZERO,
            responder: Some(responder),
        }
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn client_key(&self) -> Option<&str> {
        self.client_key.as_deref()
    }

    pub fn estimate(&self) -> Option<Duration> {
        self.estimate
    }

    #[cfg(test)]
    pub(crate) fn stub(id: u64) -> Self {
        Self {
            id: RequestId(id),
            client_key: None,
            priority: Priority::default(),
            estimate: None,
            stage: 0,
            processing: Duration::ZERO,
            responder: None,
        }
    }
}

impl fmt::Debug for WorkUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkUnit")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("stage", &self.stage)
            .field("estimate", &self.estimate)
            .finish()
    }
}
