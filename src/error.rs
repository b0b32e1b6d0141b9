use thiserror::Error;

use crate::execute::ExecuteError;
use crate::plan::PlanError;
use crate::types::{CompileError, QueryError};

/// Any error the crate can produce, for callers that drive the whole
/// pipeline and want one error type at the boundary.
#[derive(Debug, Error)]
pub enum RisklineError {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Execute(#[from] ExecuteError),
    #[error(transparent)]
    Query(#[from] QueryError),
}
