use std::time::Duration;

use chrono::{DateTime, Utc};

use super::score::Score;

/// One observed rule run: how long it took, what it scored, what it cost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleExecution {
    pub id: String,
    pub duration: Duration,
    pub score: Score,
    pub cost: u32,
}

impl RuleExecution {
    pub fn new(id: impl Into<String>, duration: Duration, score: Score, cost: u32) -> Self {
        Self {
            id: id.into(),
            duration,
            score,
            cost,
        }
    }
}

/// A batch of execution observations fed back to the planner.
#[derive(Debug, Clone)]
pub struct RulesExecuted {
    pub at: DateTime<Utc>,
    pub executions: Vec<RuleExecution>,
}

impl RulesExecuted {
    /// Stamp a batch of observations with the current time.
    #[must_use]
    pub fn now(executions: Vec<RuleExecution>) -> Self {
        Self {
            at: Utc::now(),
            executions,
        }
    }
}
