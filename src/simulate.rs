use std::fmt;
use std::time::Duration;

use crate::plan::{Greedy, Ranker};
use crate::stats::RulesStats;
use crate::types::{ExecutionPlan, ExecutionStrategy, RulesConfig};

/// Projected outcome of running a plan under given resources.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[must_use]
pub struct SimulationResult {
    total_score: f64,
    total_cost: f64,
}

impl SimulationResult {
    #[must_use]
    pub fn total_score(&self) -> f64 {
        self.total_score
    }

    #[must_use]
    pub fn total_cost(&self) -> f64 {
        self.total_cost
    }
}

impl fmt::Display for SimulationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "score {} at cost {}",
            self.total_score, self.total_cost
        )
    }
}

/// Deterministic, offline projection of a plan's outcome.
///
/// Keeps up to `workers` worker free-times (an unused worker is free at
/// time zero). Each rule in plan order goes to the worker with the smallest
/// free time (first found wins ties); if its average duration fits before
/// the deadline the score and cost are committed and the worker advances,
/// otherwise the projection stops at the first miss. Later rules are not
/// attempted even if they would individually fit, matching how a deadlined
/// batch cuts off. Rules without stats project as zero-duration, zero-score.
#[must_use]
pub fn project(
    plan: &ExecutionPlan,
    stats: &RulesStats,
    workers: usize,
    deadline: Duration,
) -> SimulationResult {
    let mut result = SimulationResult::default();
    if workers == 0 {
        return result;
    }

    let deadline_ms = deadline.as_secs_f64() * 1000.0;
    let mut busy_until: Vec<f64> = Vec::with_capacity(workers.min(plan.len()));

    for rule in plan.rules() {
        let stat = stats.get(rule.id()).unwrap_or_default();

        let slot = if busy_until.len() < workers {
            busy_until.push(0.0);
            busy_until.len() - 1
        } else {
            earliest_free(&busy_until)
        };

        let finish = busy_until[slot] + stat.avg_duration_ms();
        if finish > deadline_ms {
            break;
        }
        result.total_score += stat.avg_score();
        result.total_cost += stat.avg_cost();
        busy_until[slot] = finish;
    }
    result
}

fn earliest_free(busy_until: &[f64]) -> usize {
    let mut slot = 0;
    for (idx, &free_at) in busy_until.iter().enumerate() {
        if free_at < busy_until[slot] {
            slot = idx;
        }
    }
    slot
}

/// Fluent offline what-if entry point: plans the config with the Greedy
/// heuristic under the given strategy, then projects the plan.
///
/// ```
/// # use std::time::Duration;
/// # use riskline::{ExecutionStrategy, RulesConfig, RulesStats, Simulation};
/// let config = RulesConfig::default();
/// let stats = RulesStats::new();
/// let result = Simulation::of(&config)
///     .with_strategy(ExecutionStrategy::new(0, 10, 0))
///     .deadline(Duration::from_millis(200))
///     .workers(2)
///     .run(&stats);
/// assert_eq!(result.total_score(), 0.0);
/// ```
#[derive(Debug, Clone, Copy)]
#[must_use]
pub struct Simulation<'a> {
    config: &'a RulesConfig,
    strategy: ExecutionStrategy,
    deadline: Duration,
    workers: usize,
}

impl<'a> Simulation<'a> {
    pub fn of(config: &'a RulesConfig) -> Self {
        Self {
            config,
            strategy: ExecutionStrategy::default(),
            deadline: Duration::ZERO,
            workers: 1,
        }
    }

    pub fn with_strategy(mut self, strategy: ExecutionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn run(self, stats: &RulesStats) -> SimulationResult {
        let plan = Greedy.rank(self.config, stats, &self.strategy);
        project(&plan, stats, self.workers, self.deadline)
    }
}
