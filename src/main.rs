use std::str::FromStr;
use std::time::Duration;

use clap::Parser;
use rand::Rng;
use tracing::{info, warn};

use stage_router::config::{DurationRange, PolicyConfig, RouterConfig, StageConfig};
use stage_router::core::unit::{Priority, WorkRequest};
use stage_router::logging::{self, LoggingConfig};
use stage_router::router::Router;

#[derive(Parser, Debug)]
#[command(name = "stage-router")]
#[command(about = "Policy-driven work dispatch across staged worker pools")]
#[command(long_about = r#"
Boots a dispatch engine, drives it with a synthetic workload, and prints
the final status snapshot as JSON.

Examples:
  # Three-stage pipeline under FCFS with the adaptive rebalancer
  stage-router --requests 50

  # Flat pool, weighted round robin
  stage-router --stages work --workers-per-stage 4 \
    --policy weighted_round_robin --weights 1,2,3,4

  # Priority classes through a saturated single worker
  stage-router --stages work --workers-per-stage 1 --policy priority
"#)]
struct CliArgs {
    /// Dispatch policy to use
    #[arg(long, default_value = "fcfs", value_parser = [
        "fcfs",
        "round_robin",
        "weighted_round_robin",
        "least_connections",
        "shortest_job",
        "priority",
        "affinity_hash",
        "random",
    ])]
    policy: String,

    /// Pipeline stage names, in order
    #[arg(long, value_delimiter = ',', default_value = "parse,compute,finalize")]
    stages: Vec<String>,

    /// Workers spawned per stage at startup
    #[arg(long, default_value_t = 3)]
    workers_per_stage: usize,

    /// Weight table for weighted_round_robin, by pool position
    #[arg(long, value_delimiter = ',')]
    weights: Vec<u32>,

    /// Units to submit
    #[arg(long, default_value_t = 20)]
    requests: usize,

    /// Spacing between submissions in milliseconds (0 = burst)
    #[arg(long, default_value_t = 50)]
    arrival_interval_ms: u64,

    /// Disable the adaptive rebalancer
    #[arg(long, default_value_t = false)]
    no_rebalance: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, default_value_t = false)]
    json_log: bool,
}

/// Service-time ranges for the well-known pipeline stage names; anything
/// else gets the flat-pool default.
fn service_time_for(name: &str) -> DurationRange {
    match name {
        "parse" => DurationRange::new(300, 900),
        "compute" => DurationRange::new(600, 2100),
        "finalize" => DurationRange::new(200, 700),
        _ => DurationRange::default(),
    }
}

fn build_config(args: &CliArgs) -> RouterConfig {
    let stages = args
        .stages
        .iter()
        .map(|name| {
            StageConfig::new(name.clone(), args.workers_per_stage)
                .with_service_time(service_time_for(name))
        })
        .collect();

    let policy = match args.policy.as_str() {
        "fcfs" => PolicyConfig::Fcfs,
        "round_robin" => PolicyConfig::RoundRobin,
        "weighted_round_robin" => PolicyConfig::WeightedRoundRobin {
            weights: if args.weights.is_empty() {
                PolicyConfig::default_weights()
            } else {
                args.weights.clone()
            },
        },
        "least_connections" => PolicyConfig::LeastConnections,
        "shortest_job" => PolicyConfig::ShortestJob,
        "priority" => PolicyConfig::Priority,
        "affinity_hash" => PolicyConfig::AffinityHash,
        _ => PolicyConfig::Random,
    };

    let mut config = RouterConfig::new(stages, policy);
    if args.no_rebalance {
        config.rebalancer.enabled = false;
    }
    config
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    let level = tracing::Level::from_str(&args.log_level).unwrap_or(tracing::Level::INFO);
    logging::init_logging(LoggingConfig {
        level,
        json_format: args.json_log,
    });

    let config = build_config(&args);
    info!(
        policy = config.policy.name(),
        stages = config.stages.len(),
        workers_per_stage = args.workers_per_stage,
        "starting engine"
    );
    let router = Router::new(config)?;

    let mut submissions = Vec::with_capacity(args.requests);
    for _ in 0..args.requests {
        let priority = match rand::rng().random_range(0..3) {
            0 => Priority::High,
            1 => Priority::Medium,
            _ => Priority::Low,
        };
        let client = format!("10.0.0.{}", rand::rng().random_range(1..=8));
        let request = WorkRequest::new()
            .with_priority(priority)
            .with_client_key(client);
        submissions.push(router.submit(request));
        if args.arrival_interval_ms > 0 {
            tokio::time::sleep(Duration::from_millis(args.arrival_interval_ms)).await;
        }
    }

    let mut delivered = 0usize;
    let mut dropped = 0usize;
    for submission in submissions {
        match submission.response.await {
            Ok(outcome) => {
                delivered += 1;
                info!(
                    unit = %outcome.id,
                    stages = outcome.stages,
                    processing_ms = outcome.processing.as_millis() as u64,
                    "unit fully processed"
                );
            }
            Err(_) => {
                dropped += 1;
                warn!("unit abandoned before finalization");
            }
        }
    }
    info!(delivered, dropped, "workload finished");

    let status = router.status().await?;
    println!("{}", serde_json::to_string_pretty(&status)?);

    router.shutdown();
    Ok(())
}
