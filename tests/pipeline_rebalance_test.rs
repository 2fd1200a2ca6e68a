//! Pipeline traversal, crash recovery, administrative scaling, and
//! rebalancer behavior through the public engine API.

mod common;

use std::collections::HashSet;
use std::time::Duration;

use futures::future::join_all;
use stage_router::{
    DurationRange, PolicyConfig, Router, RouterConfig, StageConfig, WorkRequest,
};

use common::{assert_invariants, fixed, status_when};

#[tokio::test(start_paused = true)]
async fn unit_traverses_all_three_stages_in_order() {
    let mut config = RouterConfig::pipeline_defaults(1, PolicyConfig::Fcfs);
    config.rebalancer.enabled = false;
    let router = Router::with_duration_source(config, fixed(10)).unwrap();

    let submission = router.submit(WorkRequest::new());
    let outcome = submission.response.await.unwrap();

    assert_eq!(outcome.stages, 3);
    // Exactly one fixed-length dispatch per stage, nothing in parallel.
    assert_eq!(outcome.processing, Duration::from_millis(30));

    let status = router.status().await.unwrap();
    assert_eq!(status.finalized, 1);
    for name in ["parse", "compute", "finalize"] {
        let stage = status.stage(name).unwrap();
        assert_eq!(stage.timings.processed, 1, "stage {name} ran once");
        assert!((stage.timings.avg_ms - 10.0).abs() < f64::EPSILON);
    }
    assert_invariants(&status);
}

#[tokio::test(start_paused = true)]
async fn pipeline_keeps_every_stage_fed_under_load() {
    let mut config = RouterConfig::pipeline_defaults(2, PolicyConfig::Fcfs);
    config.rebalancer.enabled = false;
    let router = Router::with_duration_source(config, fixed(20)).unwrap();

    let submissions: Vec<_> = (0..10).map(|_| router.submit(WorkRequest::new())).collect();
    let outcomes = join_all(submissions.into_iter().map(|s| s.response)).await;
    assert!(outcomes.iter().all(Result::is_ok));

    let status = router.status().await.unwrap();
    assert_eq!(status.finalized, 10);
    for stage in &status.stages {
        assert_eq!(stage.timings.processed, 10);
        assert_eq!(stage.queue_depth, 0);
    }
    assert_invariants(&status);
}

#[tokio::test(start_paused = true)]
async fn killing_a_busy_worker_abandons_its_unit_and_spawns_a_replacement() {
    let mut config = RouterConfig::single_stage("work", 2, PolicyConfig::Fcfs);
    config.rebalancer.enabled = false;
    let router = Router::with_duration_source(config, fixed(5000)).unwrap();

    let victim_unit = router.submit(WorkRequest::new());
    let survivor_unit = router.submit(WorkRequest::new());

    let status = router.status().await.unwrap();
    let stage = status.stage("work").unwrap();
    assert_eq!(stage.busy, 2);
    // FCFS put the first unit on the first worker.
    let victim = stage.workers[0].id;
    let survivor = stage.workers[1].id;

    router.kill_worker("work", victim).await.unwrap();

    // The crash is observed through the task lifecycle, so give the exit
    // notification a tick to arrive.
    let status = status_when(&router, "crash processed", |s| s.abandoned == 1).await;
    let stage = status.stage("work").unwrap();
    assert_eq!(stage.worker_count(), 2, "exactly one replacement");
    let ids: HashSet<u64> = stage.workers.iter().map(|w| w.id.value()).collect();
    assert_eq!(ids.len(), 2, "no duplicate worker identities");
    assert!(!ids.contains(&victim.value()), "crashed identity never reused");
    assert_invariants(&status);

    // The abandoned unit's caller sees a dropped response handle; the
    // survivor's unit still completes.
    assert!(victim_unit.response.await.is_err());
    assert!(survivor_unit.response.await.is_ok());

    let status = router.status().await.unwrap();
    assert_eq!(status.finalized, 1);
    assert_eq!(status.abandoned, 1);
    assert_invariants(&status);

    // The replacement is live: new work flows through it.
    let after = router.submit(WorkRequest::new());
    assert!(after.response.await.is_ok());
    let _ = survivor;
}

#[tokio::test(start_paused = true)]
async fn manual_scaling_adds_and_removes_idle_workers() {
    let mut config = RouterConfig::single_stage("work", 2, PolicyConfig::Fcfs);
    config.rebalancer.enabled = false;
    let router = Router::with_duration_source(config, fixed(1000)).unwrap();

    router.scale_up("work").await.unwrap();
    let status = router.status().await.unwrap();
    assert_eq!(status.total_workers, 3);

    router.scale_down("work").await.unwrap();
    router.scale_down("work").await.unwrap();
    let status = router.status().await.unwrap();
    assert_eq!(status.total_workers, 1);

    // The last worker is never removed.
    assert!(router.scale_down("work").await.is_err());

    // Graceful removals are not crashes: once their exit notifications
    // drain, nothing was abandoned and no replacements were spawned.
    tokio::time::sleep(Duration::from_millis(5)).await;
    let status = router.status().await.unwrap();
    assert_eq!(status.total_workers, 1);
    assert_eq!(status.abandoned, 0);

    assert!(router.scale_up("missing").await.is_err());
    assert!(router.scale_down("missing").await.is_err());
}

#[tokio::test(start_paused = true)]
async fn busy_workers_are_not_removable() {
    let mut config = RouterConfig::single_stage("work", 2, PolicyConfig::Fcfs);
    config.rebalancer.enabled = false;
    let router = Router::with_duration_source(config, fixed(1000)).unwrap();

    let submissions: Vec<_> = (0..2).map(|_| router.submit(WorkRequest::new())).collect();
    let status = router.status().await.unwrap();
    assert_eq!(status.stage("work").unwrap().busy, 2);

    assert!(router.scale_down("work").await.is_err());

    let outcomes = join_all(submissions.into_iter().map(|s| s.response)).await;
    assert!(outcomes.iter().all(Result::is_ok));
}

#[tokio::test(start_paused = true)]
async fn rebalancer_moves_capacity_toward_the_bottleneck_stage() {
    // Fast ingest feeding a very slow crunch stage: the donor pool drains
    // while crunch backs up, so capacity must migrate ingest -> crunch.
    let config = RouterConfig::new(
        vec![
            StageConfig::new("ingest", 4).with_service_time(DurationRange::new(1, 1)),
            StageConfig::new("crunch", 1).with_service_time(DurationRange::new(10_000, 10_000)),
        ],
        PolicyConfig::Fcfs,
    );
    let router = Router::new(config).unwrap();

    let submissions: Vec<_> = (0..8).map(|_| router.submit(WorkRequest::new())).collect();
    let outcomes = join_all(submissions.into_iter().map(|s| s.response)).await;
    assert!(outcomes.iter().all(Result::is_ok));

    let status = router.status().await.unwrap();
    assert_eq!(status.finalized, 8);
    assert_eq!(status.abandoned, 0);

    let ingest = status.stage("ingest").unwrap();
    let crunch = status.stage("crunch").unwrap();
    assert!(
        crunch.worker_count() >= 2,
        "bottleneck stage never gained capacity: {status:?}"
    );
    // No stage is ever starved to zero, and the global bounds hold.
    assert!(ingest.worker_count() >= 1);
    assert!(status.total_workers <= 8);
    assert!(status.total_workers >= 2);
    assert_invariants(&status);
}

#[tokio::test(start_paused = true)]
async fn rebalancer_revives_a_stage_scaled_to_zero_workers() {
    // A zero-worker stage reports maximal load, which forces the planner
    // to move capacity into it on the next completion event.
    let config = RouterConfig::new(
        vec![
            StageConfig::new("first", 3).with_service_time(DurationRange::new(5, 5)),
            StageConfig::new("second", 0).with_service_time(DurationRange::new(5, 5)),
        ],
        PolicyConfig::Fcfs,
    );
    let router = Router::new(config).unwrap();

    let submission = router.submit(WorkRequest::new());
    // The unit clears stage one, waits in the dead stage's queue until the
    // rebalancer revives it, then finalizes.
    let outcome = submission.response.await.unwrap();
    assert_eq!(outcome.stages, 2);

    let status = router.status().await.unwrap();
    assert!(status.stage("second").unwrap().worker_count() >= 1);
    assert_eq!(status.finalized, 1);
    assert_invariants(&status);
}

#[tokio::test(start_paused = true)]
async fn shutdown_drops_in_flight_work() {
    let mut config = RouterConfig::single_stage("work", 1, PolicyConfig::Fcfs);
    config.rebalancer.enabled = false;
    let router = Router::with_duration_source(config, fixed(60_000)).unwrap();

    let submission = router.submit(WorkRequest::new());
    let status = router.status().await.unwrap();
    assert_eq!(status.in_flight, 1);

    router.shutdown();
    assert!(submission.response.await.is_err());
    assert!(router.status().await.is_err());
}
