use std::fmt;
use std::sync::Arc;

use super::rule::{CompiledRule, RulesConfig};

/// Planner weighting: how much observed cost, duration, and score matter
/// when ranking rules. All factors are non-negative; a higher score factor
/// pulls high-scoring rules toward the front of the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecutionStrategy {
    pub cost_factor: u32,
    pub time_factor: u32,
    pub score_factor: u32,
}

impl ExecutionStrategy {
    #[must_use]
    pub const fn new(cost_factor: u32, time_factor: u32, score_factor: u32) -> Self {
        Self {
            cost_factor,
            time_factor,
            score_factor,
        }
    }
}

/// An ordering over compiled rules chosen by the planner. Produced per
/// planning cycle and consumed once by the executor or the simulator.
#[derive(Debug, Clone, Default)]
#[must_use]
pub struct ExecutionPlan {
    rules: Vec<Arc<CompiledRule>>,
}

impl ExecutionPlan {
    pub fn new(rules: Vec<Arc<CompiledRule>>) -> Self {
        Self { rules }
    }

    #[must_use]
    pub fn rules(&self) -> &[Arc<CompiledRule>] {
        &self.rules
    }

    #[must_use]
    pub fn ids(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.id()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// An unranked plan in config order, for executing without planning first.
impl From<&RulesConfig> for ExecutionPlan {
    fn from(config: &RulesConfig) -> Self {
        Self {
            rules: config.rules().to_vec(),
        }
    }
}

impl fmt::Display for ExecutionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExecutionPlan[{}]", self.ids().join(", "))
    }
}
