//! Shared helpers for the engine integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use stage_router::{DurationSource, FixedDuration, Router, RouterStatus};

pub fn fixed(ms: u64) -> Arc<dyn DurationSource> {
    Arc::new(FixedDuration(Duration::from_millis(ms)))
}

/// Poll the status snapshot until `pred` holds, nudging virtual time one
/// millisecond per attempt so pending worker-exit events get processed.
pub async fn status_when(
    router: &Router,
    label: &str,
    pred: impl Fn(&RouterStatus) -> bool,
) -> RouterStatus {
    for _ in 0..100 {
        let status = router.status().await.expect("engine running");
        if pred(&status) {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("condition never reached: {label}");
}

/// Unit conservation plus idle/busy disjointness, valid at any observation
/// point.
pub fn assert_invariants(status: &RouterStatus) {
    assert_eq!(
        status.admitted,
        status.finalized + status.abandoned + status.in_flight as u64,
        "conservation violated: {status:?}"
    );
    for stage in &status.stages {
        assert_eq!(
            stage.busy + stage.idle,
            stage.worker_count(),
            "idle/busy counts must partition stage '{}'",
            stage.name
        );
    }
}
