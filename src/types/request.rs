use std::fmt;
use std::sync::Arc;

use super::query::{Params, Query};
use super::rule::{scoring, Condition, ParamsCheck, ScoreCheck, Transmitter};
use super::score::Score;
use super::value::Value;

/// Grouping key for queries that hit the same data: rules sharing a
/// `(datasource, view)` pair are candidates for single-source grouping at
/// compile time. Never used to route calls.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RuleSource {
    pub datasource: String,
    pub view: String,
}

impl RuleSource {
    pub fn new(datasource: impl Into<String>, view: impl Into<String>) -> Self {
        Self {
            datasource: datasource.into(),
            view: view.into(),
        }
    }
}

/// How a requested rule relates to the rule it depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyKind {
    /// Ordering-only constraint: participates in cycle validation but never
    /// produces a compiled relationship.
    Forced,
    /// The dependent rule consumes data derived from the target's query
    /// result; compiles the pair into one dependent rule.
    NeedsData,
}

/// An edge from a requested rule to the rule it depends on.
#[derive(Clone)]
pub struct RuleDependency {
    pub(crate) target: String,
    pub(crate) kind: DependencyKind,
    pub(crate) condition: Option<Condition>,
    pub(crate) transmitter: Option<Transmitter>,
}

impl RuleDependency {
    pub fn new(target: impl Into<String>, kind: DependencyKind) -> Self {
        Self {
            target: target.into(),
            kind,
            condition: None,
            transmitter: None,
        }
    }

    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    #[must_use]
    pub fn kind(&self) -> DependencyKind {
        self.kind
    }
}

impl fmt::Debug for RuleDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RuleDependency({} -> {:?})", self.target, self.kind)
    }
}

pub(crate) enum RequestedBody {
    Direct(ParamsCheck),
    Queried {
        query: Arc<dyn Query>,
        check: ScoreCheck,
    },
}

/// A declarative, uncompiled rule specification submitted by a caller.
///
/// Built via [`RequestedRule::direct()`] or [`RequestedRule::queried()`] and
/// refined with the chained setters. Consumed exactly once by compilation.
///
/// # Example
///
/// ```no_run
/// use riskline::{DependencyKind, RequestedRule, Score};
/// # use riskline::{Params, Query, QueryError, Value};
/// # use std::sync::Arc;
/// # fn blacklist_query() -> Arc<dyn Query> { unimplemented!() }
///
/// let rule = RequestedRule::scoring(
///     "emailOnBlacklist",
///     blacklist_query(),
///     |v| v.as_bool() == Some(true),
///     Score::of(100),
/// )
/// .from_source("redis", "blacklist");
/// ```
pub struct RequestedRule {
    pub(crate) id: String,
    pub(crate) body: RequestedBody,
    pub(crate) depends_on: Option<RuleDependency>,
    pub(crate) source: Option<RuleSource>,
}

impl RequestedRule {
    /// A rule scoring the raw request parameters, no external lookup.
    pub fn direct(
        id: impl Into<String>,
        check: impl Fn(&Params) -> Score + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            body: RequestedBody::Direct(Arc::new(check)),
            depends_on: None,
            source: None,
        }
    }

    /// A rule scoring the result of an external query.
    pub fn queried(
        id: impl Into<String>,
        query: Arc<dyn Query>,
        check: impl Fn(&Value) -> Score + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            body: RequestedBody::Queried {
                query,
                check: Arc::new(check),
            },
            depends_on: None,
            source: None,
        }
    }

    /// A queried rule whose check is a predicate awarding a fixed score.
    pub fn scoring(
        id: impl Into<String>,
        query: Arc<dyn Query>,
        predicate: impl Fn(&Value) -> bool + Send + Sync + 'static,
        score: Score,
    ) -> Self {
        Self {
            id: id.into(),
            body: RequestedBody::Queried {
                query,
                check: scoring(predicate, score),
            },
            depends_on: None,
            source: None,
        }
    }

    /// Tag this rule with the `(datasource, view)` it reads from, making it
    /// a grouping candidate.
    #[must_use]
    pub fn from_source(
        mut self,
        datasource: impl Into<String>,
        view: impl Into<String>,
    ) -> Self {
        self.source = Some(RuleSource::new(datasource, view));
        self
    }

    /// Declare a dependency on another requested rule.
    #[must_use]
    pub fn depends_on(mut self, target: impl Into<String>, kind: DependencyKind) -> Self {
        self.depends_on = Some(RuleDependency::new(target, kind));
        self
    }

    /// Declare a `NeedsData` dependency with the condition gating the sink
    /// call and the transmitter deriving its extra parameters.
    #[must_use]
    pub fn depends_on_with(
        mut self,
        target: impl Into<String>,
        condition: impl Fn(&Value) -> bool + Send + Sync + 'static,
        transmitter: impl Fn(&Value) -> Params + Send + Sync + 'static,
    ) -> Self {
        self.depends_on = Some(RuleDependency {
            target: target.into(),
            kind: DependencyKind::NeedsData,
            condition: Some(Arc::new(condition)),
            transmitter: Some(Arc::new(transmitter)),
        });
        self
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn dependency(&self) -> Option<&RuleDependency> {
        self.depends_on.as_ref()
    }

    #[must_use]
    pub fn source(&self) -> Option<&RuleSource> {
        self.source.as_ref()
    }

    pub(crate) fn has_query(&self) -> bool {
        matches!(self.body, RequestedBody::Queried { .. })
    }
}

impl fmt::Debug for RequestedRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestedRule")
            .field("id", &self.id)
            .field("queried", &self.has_query())
            .field("depends_on", &self.depends_on)
            .field("source", &self.source)
            .finish()
    }
}

/// The set of requested rules submitted for one compilation.
#[derive(Debug, Default)]
pub struct RulesRequest {
    pub(crate) requested: Vec<RequestedRule>,
}

impl RulesRequest {
    #[must_use]
    pub fn new(requested: Vec<RequestedRule>) -> Self {
        Self { requested }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.requested.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requested.is_empty()
    }
}
