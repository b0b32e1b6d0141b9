mod compile;
mod error;
mod execute;
mod graph;
mod plan;
mod simulate;
mod stats;
mod types;

pub use error::RisklineError;
pub use execute::{BatchOutcome, ExecuteError, Executor, FailurePolicy};
pub use plan::{Greedy, PlanError, Planner, Ranker, RankingAlgorithm};
pub use simulate::{project, Simulation, SimulationResult};
pub use stats::{RuleStats, RulesStats};
pub use types::{
    scoring, Calculated, CompileError, CompiledRule, Condition, DependencyKind, ExecutionPlan,
    ExecutionStrategy, Params, ParamsCheck, QueriedRule, Query, QueryError, RequestedRule,
    RuleDependency, RuleExecution, RuleSource, RulesConfig, RulesExecuted, RulesRequest, Score,
    ScoreCheck, SharedQuery, Transmitter, Value,
};
