use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::stats::RulesStats;
use crate::types::{ExecutionPlan, ExecutionStrategy, RulesConfig, RulesExecuted};

/// Which ranking heuristic a [`Planner`] applies.
///
/// Only [`Greedy`](RankingAlgorithm::Greedy) is implemented; the other two
/// are named extension points and planning with them fails loudly rather
/// than producing an empty plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RankingAlgorithm {
    #[default]
    Greedy,
    /// Capacity-constrained selection. Not implemented.
    Knapsack,
    /// Learned selection. Not implemented.
    Learned,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("ranking algorithm {0:?} is not implemented")]
    Unimplemented(RankingAlgorithm),
}

/// The ranking seam: additional strategies attach here without touching
/// callers.
pub trait Ranker {
    fn rank(
        &self,
        config: &RulesConfig,
        stats: &RulesStats,
        strategy: &ExecutionStrategy,
    ) -> ExecutionPlan;
}

/// The one shipped heuristic: rank rules ascending by
/// `cost_factor * avg_cost + time_factor * avg_duration - score_factor * avg_score`,
/// so cheap, fast, high-scoring rules run first. Rules without stats score
/// zero on every metric and sort toward the front; ties keep config order.
#[derive(Debug, Clone, Copy, Default)]
pub struct Greedy;

impl Ranker for Greedy {
    fn rank(
        &self,
        config: &RulesConfig,
        stats: &RulesStats,
        strategy: &ExecutionStrategy,
    ) -> ExecutionPlan {
        let mut rules = config.rules().to_vec();
        rules.sort_by(|a, b| {
            let key_a = rank_key(stats, a.id(), strategy);
            let key_b = rank_key(stats, b.id(), strategy);
            key_a.total_cmp(&key_b)
        });
        ExecutionPlan::new(rules)
    }
}

fn rank_key(stats: &RulesStats, id: &str, strategy: &ExecutionStrategy) -> f64 {
    let stat = stats.get(id).unwrap_or_default();
    f64::from(strategy.cost_factor) * stat.avg_cost()
        + f64::from(strategy.time_factor) * stat.avg_duration_ms()
        - f64::from(strategy.score_factor) * stat.avg_score()
}

/// Ranks compiled rules into execution plans using adaptive, stats-driven
/// heuristics, and absorbs the execution feedback those stats come from.
pub struct Planner {
    strategy: ExecutionStrategy,
    config: Arc<RulesConfig>,
    stats: Arc<RulesStats>,
    algorithm: RankingAlgorithm,
}

impl Planner {
    #[must_use]
    pub fn new(
        strategy: ExecutionStrategy,
        config: Arc<RulesConfig>,
        stats: Arc<RulesStats>,
    ) -> Self {
        Self {
            strategy,
            config,
            stats,
            algorithm: RankingAlgorithm::Greedy,
        }
    }

    #[must_use]
    pub fn with_algorithm(mut self, algorithm: RankingAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    #[must_use]
    pub fn stats(&self) -> &Arc<RulesStats> {
        &self.stats
    }

    /// Fold a batch of execution observations into the running stats.
    /// Ids never seen before get a fresh zeroed accumulator.
    pub fn handle(&self, event: &RulesExecuted) {
        for execution in &event.executions {
            self.stats.record(execution);
        }
        debug!(
            observations = event.executions.len(),
            at = %event.at,
            "absorbed execution feedback"
        );
    }

    /// Rank the compiled rules into a fresh plan against a snapshot of the
    /// current stats.
    ///
    /// # Errors
    ///
    /// [`PlanError::Unimplemented`] for the extension-point algorithms.
    pub fn calculate_plan(&self) -> Result<ExecutionPlan, PlanError> {
        match self.algorithm {
            RankingAlgorithm::Greedy => {
                let plan = Greedy.rank(&self.config, &self.stats, &self.strategy);
                debug!(rules = plan.len(), "calculated execution plan");
                Ok(plan)
            }
            other => Err(PlanError::Unimplemented(other)),
        }
    }
}
