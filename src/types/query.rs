use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::OnceCell;

use super::value::Value;

/// Flat request parameters passed unmodified into every rule.
pub type Params = HashMap<String, String>;

/// Failure raised by an external data lookup.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("query against '{datasource}' failed: {reason}")]
    Failed { datasource: String, reason: String },
}

impl QueryError {
    pub fn failed(datasource: impl Into<String>, reason: impl Into<String>) -> Self {
        QueryError::Failed {
            datasource: datasource.into(),
            reason: reason.into(),
        }
    }
}

/// An opaque external lookup capability.
///
/// Concrete datasource access (SQL, key-value, ...) lives outside the core;
/// rules only see this seam. A query may be invoked any number of times and
/// may fail; the engine never retries on its own.
#[async_trait]
pub trait Query: Send + Sync {
    async fn execute(&self, params: &Params) -> Result<Value, QueryError>;

    /// Declared unit cost of one execution (e.g. a scanned-bytes estimate).
    /// Accrued per rule only for queries that actually run.
    fn cost(&self) -> u32 {
        0
    }
}

/// A single-value memoizing wrapper for a query shared by multiple checks.
///
/// The first execution runs the inner query and caches its value; later
/// executions on the same wrapper instance return the cached value without
/// touching the datasource. Initialization is single-flight: concurrent
/// first callers wait for one underlying execution rather than racing.
/// The cache is scoped to this instance and never invalidated; it exists
/// purely to let grouped checks pay a query's cost once.
pub struct SharedQuery {
    inner: Arc<dyn Query>,
    cell: OnceCell<Value>,
}

impl SharedQuery {
    pub fn new(inner: Arc<dyn Query>) -> Self {
        Self {
            inner,
            cell: OnceCell::new(),
        }
    }
}

#[async_trait]
impl Query for SharedQuery {
    async fn execute(&self, params: &Params) -> Result<Value, QueryError> {
        self.cell
            .get_or_try_init(|| self.inner.execute(params))
            .await
            .cloned()
    }

    fn cost(&self) -> u32 {
        self.inner.cost()
    }
}

impl fmt::Debug for SharedQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedQuery")
            .field("cached", &self.cell.initialized())
            .finish()
    }
}
