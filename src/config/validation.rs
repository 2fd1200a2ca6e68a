//! Up-front configuration checks, run once before the engine starts.

use std::collections::HashSet;

use super::{ConfigError, ConfigResult, PolicyConfig, RouterConfig};

/// Validate a complete router configuration.
///
/// Runtime code tolerates a stage temporarily reaching zero workers (the
/// rebalancer treats it as maximally loaded and revives it), so worker
/// counts are not constrained here beyond the global ceiling.
pub fn validate(config: &RouterConfig) -> ConfigResult<()> {
    if config.stages.is_empty() {
        return Err(ConfigError::MissingRequired {
            field: "stages".to_string(),
        });
    }

    let mut names = HashSet::new();
    for stage in &config.stages {
        if stage.name.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "stages.name".to_string(),
            });
        }
        if !names.insert(stage.name.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "stages.name".to_string(),
                value: stage.name.clone(),
                reason: "stage names must be unique".to_string(),
            });
        }
        if stage.service_time.min_ms > stage.service_time.max_ms {
            return Err(ConfigError::InvalidValue {
                field: "stages.service_time".to_string(),
                value: format!(
                    "{}..{}",
                    stage.service_time.min_ms, stage.service_time.max_ms
                ),
                reason: "min_ms must not exceed max_ms".to_string(),
            });
        }
    }

    if let PolicyConfig::WeightedRoundRobin { weights } = &config.policy {
        if weights.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "policy.weights".to_string(),
            });
        }
        if weights.contains(&0) {
            return Err(ConfigError::InvalidValue {
                field: "policy.weights".to_string(),
                value: "0".to_string(),
                reason: "weights must be positive".to_string(),
            });
        }
    }

    let rb = &config.rebalancer;
    if rb.low_water >= rb.high_water {
        return Err(ConfigError::ValidationFailed {
            reason: format!(
                "rebalancer low water {} must be below high water {}",
                rb.low_water, rb.high_water
            ),
        });
    }
    if rb.idle >= rb.saturation {
        return Err(ConfigError::ValidationFailed {
            reason: format!(
                "rebalancer idle threshold {} must be below saturation {}",
                rb.idle, rb.saturation
            ),
        });
    }
    if rb.min_workers > rb.max_workers {
        return Err(ConfigError::ValidationFailed {
            reason: format!(
                "worker floor {} exceeds ceiling {}",
                rb.min_workers, rb.max_workers
            ),
        });
    }

    let initial: usize = config.stages.iter().map(|s| s.initial_workers).sum();
    if initial > rb.max_workers {
        return Err(ConfigError::ValidationFailed {
            reason: format!(
                "initial workers {} exceed the configured ceiling {}",
                initial, rb.max_workers
            ),
        });
    }

    Ok(())
}
