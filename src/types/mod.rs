mod error;
mod event;
mod plan;
mod query;
mod request;
mod rule;
mod score;
mod value;

pub use error::CompileError;
pub use event::{RuleExecution, RulesExecuted};
pub use plan::{ExecutionPlan, ExecutionStrategy};
pub use query::{Params, Query, QueryError, SharedQuery};
pub use request::{DependencyKind, RequestedRule, RuleDependency, RuleSource, RulesRequest};
pub(crate) use request::RequestedBody;
pub use rule::{
    scoring, Calculated, CompiledRule, Condition, ParamsCheck, QueriedRule, RulesConfig,
    ScoreCheck, Transmitter,
};
pub use score::Score;
pub use value::Value;
