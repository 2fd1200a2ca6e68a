//! Adaptive rebalancer.
//!
//! Pure planning: the coordinator feeds it per-stage load observations
//! after every completion event and executes whichever single adjustment
//! comes back. At most one adjustment per invocation keeps a single event
//! from triggering a move and a resize at once, which would oscillate.

use crate::config::RebalancerConfig;

/// Per-stage load observation, taken from the authoritative pool and
/// queue state at planning time.
#[derive(Debug, Clone, Copy)]
pub(crate) struct StageLoad {
    pub workers: usize,
    pub busy: usize,
    pub idle_workers: usize,
    pub queued: usize,
}

impl StageLoad {
    /// Busy-worker ratio plus queue-depth ratio. A stage with no workers
    /// is maximally loaded so the planner is forced to revive it.
    pub fn load_factor(&self) -> f64 {
        if self.workers == 0 {
            return f64::INFINITY;
        }
        let workers = self.workers as f64;
        self.busy as f64 / workers + self.queued as f64 / workers
    }
}

/// A single capacity adjustment, by stage index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Adjustment {
    /// Destroy one idle worker in `from`, create one in `to`; total
    /// worker count is unchanged.
    Move { from: usize, to: usize },
    /// Create one worker; net increase.
    ScaleUp { stage: usize },
    /// Destroy one idle worker; net decrease.
    ScaleDown { stage: usize },
}

#[derive(Debug)]
pub(crate) struct Rebalancer {
    config: RebalancerConfig,
}

impl Rebalancer {
    pub fn new(config: RebalancerConfig) -> Self {
        Self { config }
    }

    pub fn plan(&self, loads: &[StageLoad]) -> Option<Adjustment> {
        if !self.config.enabled || loads.is_empty() {
            return None;
        }

        let factors: Vec<f64> = loads.iter().map(StageLoad::load_factor).collect();
        let total_workers: usize = loads.iter().map(|l| l.workers).sum();

        // Ties break toward the earlier stage for both extremes.
        let mut bottleneck = 0;
        let mut donor = 0;
        for (i, &factor) in factors.iter().enumerate() {
            if factor > factors[bottleneck] {
                bottleneck = i;
            }
            if factor < factors[donor] {
                donor = i;
            }
        }

        if bottleneck != donor
            && factors[bottleneck] > self.config.high_water
            && factors[donor] < self.config.low_water
            && loads[donor].workers > 1
            && loads[donor].idle_workers > 0
        {
            return Some(Adjustment::Move {
                from: donor,
                to: bottleneck,
            });
        }

        let avg = factors.iter().sum::<f64>() / factors.len() as f64;

        if avg > self.config.saturation && total_workers < self.config.max_workers {
            return Some(Adjustment::ScaleUp { stage: bottleneck });
        }

        if avg < self.config.idle && total_workers > self.config.min_workers {
            if let Some(stage) = loads
                .iter()
                .position(|l| l.idle_workers > 1 && l.workers > 2)
            {
                return Some(Adjustment::ScaleDown { stage });
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rebalancer() -> Rebalancer {
        Rebalancer::new(RebalancerConfig::for_stages(2))
    }

    fn load(workers: usize, busy: usize, queued: usize) -> StageLoad {
        StageLoad {
            workers,
            busy,
            idle_workers: workers - busy,
            queued,
        }
    }

    #[test]
    fn moves_worker_from_idle_donor_to_bottleneck() {
        // Stage 0 saturated with backlog, stage 1 fully idle.
        let loads = [load(2, 2, 4), load(3, 0, 0)];
        assert_eq!(
            rebalancer().plan(&loads),
            Some(Adjustment::Move { from: 1, to: 0 })
        );
    }

    #[test]
    fn donor_must_keep_its_last_worker() {
        let loads = [load(2, 2, 4), load(1, 0, 0)];
        // The donor has one worker; the average is high enough to scale up
        // instead (ceiling for two stages is 8).
        assert_eq!(
            rebalancer().plan(&loads),
            Some(Adjustment::ScaleUp { stage: 0 })
        );
    }

    #[test]
    fn scales_up_under_overall_saturation() {
        let loads = [load(2, 2, 2), load(2, 2, 1)];
        assert_eq!(
            rebalancer().plan(&loads),
            Some(Adjustment::ScaleUp { stage: 0 })
        );
    }

    #[test]
    fn respects_worker_ceiling() {
        let loads = [load(4, 4, 2), load(4, 4, 2)];
        assert_eq!(rebalancer().plan(&loads), None);
    }

    #[test]
    fn scales_down_when_mostly_idle() {
        let loads = [load(3, 0, 0), load(3, 1, 0)];
        assert_eq!(
            rebalancer().plan(&loads),
            Some(Adjustment::ScaleDown { stage: 0 })
        );
    }

    #[test]
    fn respects_worker_floor() {
        let loads = [load(2, 0, 0), load(2, 0, 0)];
        // Total equals the floor for two stages; no shrink.
        assert_eq!(rebalancer().plan(&loads), None);
    }

    #[test]
    fn zero_worker_stage_is_the_bottleneck() {
        let loads = [load(3, 0, 0), load(0, 0, 0)];
        assert_eq!(
            rebalancer().plan(&loads),
            Some(Adjustment::Move { from: 0, to: 1 })
        );
    }

    #[test]
    fn move_wins_over_scale_up_in_one_invocation() {
        // Both the move and the scale-up conditions hold; only the move
        // may fire.
        let loads = [load(2, 2, 6), load(4, 0, 0)];
        assert_eq!(
            rebalancer().plan(&loads),
            Some(Adjustment::Move { from: 1, to: 0 })
        );
    }

    #[test]
    fn disabled_rebalancer_never_plans() {
        let mut config = RebalancerConfig::for_stages(2);
        config.enabled = false;
        let rb = Rebalancer::new(config);
        let loads = [load(2, 2, 6), load(4, 0, 0)];
        assert_eq!(rb.plan(&loads), None);
    }
}
