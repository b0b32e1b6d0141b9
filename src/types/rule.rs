use std::fmt;
use std::sync::Arc;

use super::query::{Params, Query, QueryError};
use super::score::Score;
use super::value::Value;

/// A pure check scoring a query result.
pub type ScoreCheck = Arc<dyn Fn(&Value) -> Score + Send + Sync>;

/// A pure check scoring the raw request parameters (no query involved).
pub type ParamsCheck = Arc<dyn Fn(&Params) -> Score + Send + Sync>;

/// A predicate over a source query result gating a dependent sink query.
pub type Condition = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Derives extra parameters for a dependent sink call from the source result.
pub type Transmitter = Arc<dyn Fn(&Value) -> Params + Send + Sync>;

/// Wraps a boolean predicate into a fixed-score-or-zero check.
pub fn scoring(
    predicate: impl Fn(&Value) -> bool + Send + Sync + 'static,
    score: Score,
) -> ScoreCheck {
    Arc::new(move |value| {
        if predicate(value) {
            score
        } else {
            Score::zero()
        }
    })
}

/// One query plus the check over its result; the building block of the
/// [`Queried`](CompiledRule::Queried) and [`Dependent`](CompiledRule::Dependent)
/// variants.
#[derive(Clone)]
pub struct QueriedRule {
    pub id: String,
    pub query: Arc<dyn Query>,
    pub check: ScoreCheck,
}

impl QueriedRule {
    pub fn new(
        id: impl Into<String>,
        query: Arc<dyn Query>,
        check: impl Fn(&Value) -> Score + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            query,
            check: Arc::new(check),
        }
    }
}

/// The result of one `calculate` call: the score plus the cost of the
/// queries that actually ran. A dependent rule whose condition fails never
/// pays its sink query's cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct Calculated {
    pub score: Score,
    pub cost: u32,
}

/// An executable scoring unit. The variant set is closed so every consumer
/// (planner, simulator, executor) matches exhaustively.
///
/// Created once by compilation, immutable, invoked many times.
pub enum CompiledRule {
    /// Scores the raw request parameters directly.
    NonQueried { id: String, check: ParamsCheck },
    /// Runs one query and scores its result.
    Queried(QueriedRule),
    /// Runs one shared query and sums several checks over the single result.
    SingleSourceQueried {
        id: String,
        members: Vec<String>,
        query: Arc<dyn Query>,
        checks: Vec<ScoreCheck>,
    },
    /// Runs a source rule and, when its result satisfies the condition,
    /// a sink rule against parameters augmented by the transmitter.
    Dependent {
        id: String,
        source: QueriedRule,
        sink: QueriedRule,
        condition: Condition,
        transmitter: Transmitter,
    },
}

impl CompiledRule {
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            CompiledRule::NonQueried { id, .. }
            | CompiledRule::SingleSourceQueried { id, .. }
            | CompiledRule::Dependent { id, .. } => id,
            CompiledRule::Queried(rule) => &rule.id,
        }
    }

    /// The requested-rule ids this compiled rule consumed.
    #[must_use]
    pub fn member_ids(&self) -> Vec<&str> {
        match self {
            CompiledRule::NonQueried { id, .. } => vec![id],
            CompiledRule::Queried(rule) => vec![&rule.id],
            CompiledRule::SingleSourceQueried { members, .. } => {
                members.iter().map(String::as_str).collect()
            }
            CompiledRule::Dependent { source, sink, .. } => vec![&sink.id, &source.id],
        }
    }

    /// Compute this rule's score for one request.
    ///
    /// # Errors
    ///
    /// A query failure propagates out unchanged; there is no retry or
    /// fallback at the rule level.
    pub async fn calculate(&self, params: &Params) -> Result<Calculated, QueryError> {
        match self {
            CompiledRule::NonQueried { check, .. } => Ok(Calculated {
                score: check(params),
                cost: 0,
            }),
            CompiledRule::Queried(rule) => {
                let value = rule.query.execute(params).await?;
                Ok(Calculated {
                    score: (rule.check)(&value),
                    cost: rule.query.cost(),
                })
            }
            CompiledRule::SingleSourceQueried { query, checks, .. } => {
                let value = query.execute(params).await?;
                let score = checks.iter().map(|check| check(&value)).sum();
                Ok(Calculated {
                    score,
                    cost: query.cost(),
                })
            }
            CompiledRule::Dependent {
                source,
                sink,
                condition,
                transmitter,
                ..
            } => {
                let source_value = source.query.execute(params).await?;
                let mut score = (source.check)(&source_value);
                let mut cost = source.query.cost();
                if condition(&source_value) {
                    // Fresh merged map; transmitter keys win on conflict.
                    let mut augmented = params.clone();
                    augmented.extend(transmitter(&source_value));
                    let sink_value = sink.query.execute(&augmented).await?;
                    score = score.add((sink.check)(&sink_value));
                    cost += sink.query.cost();
                }
                Ok(Calculated { score, cost })
            }
        }
    }
}

impl fmt::Debug for CompiledRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let variant = match self {
            CompiledRule::NonQueried { .. } => "NonQueried",
            CompiledRule::Queried(_) => "Queried",
            CompiledRule::SingleSourceQueried { .. } => "SingleSourceQueried",
            CompiledRule::Dependent { .. } => "Dependent",
        };
        write!(f, "{variant}({})", self.id())
    }
}

/// The compiled, executable rule set produced by one compilation.
///
/// Rule ids are unique within a config. Read-only after creation; designed
/// to live behind `Arc` and be shared with planners and executors.
#[derive(Debug, Clone, Default)]
pub struct RulesConfig {
    rules: Vec<Arc<CompiledRule>>,
}

impl RulesConfig {
    #[must_use]
    pub fn new(rules: Vec<CompiledRule>) -> Self {
        Self {
            rules: rules.into_iter().map(Arc::new).collect(),
        }
    }

    #[must_use]
    pub fn rules(&self) -> &[Arc<CompiledRule>] {
        &self.rules
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    #[must_use]
    pub fn ids(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.id()).collect()
    }
}

impl fmt::Display for RulesConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RulesConfig({} rules)", self.rules.len())
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;

    struct FixedQuery {
        value: Value,
        cost: u32,
    }

    #[async_trait]
    impl Query for FixedQuery {
        async fn execute(&self, _params: &Params) -> Result<Value, QueryError> {
            Ok(self.value.clone())
        }

        fn cost(&self) -> u32 {
            self.cost
        }
    }

    struct FailingQuery;

    #[async_trait]
    impl Query for FailingQuery {
        async fn execute(&self, _params: &Params) -> Result<Value, QueryError> {
            Err(QueryError::failed("redis", "down"))
        }
    }

    /// Echoes the `device_id` parameter back, so tests can observe the
    /// merged params a dependent sink receives.
    struct EchoDeviceQuery;

    #[async_trait]
    impl Query for EchoDeviceQuery {
        async fn execute(&self, params: &Params) -> Result<Value, QueryError> {
            Ok(Value::String(
                params.get("device_id").cloned().unwrap_or_default(),
            ))
        }
    }

    fn params_with(key: &str, value: &str) -> Params {
        let mut p = Params::new();
        p.insert(key.to_owned(), value.to_owned());
        p
    }

    #[tokio::test]
    async fn non_queried_scores_params() {
        let rule = CompiledRule::NonQueried {
            id: "plain".into(),
            check: Arc::new(|params: &Params| {
                if params.contains_key("email") {
                    Score::of(10)
                } else {
                    Score::zero()
                }
            }),
        };

        let got = rule.calculate(&params_with("email", "a@b.c")).await.unwrap();
        assert_eq!(got.score, Score::of(10));
        assert_eq!(got.cost, 0);
    }

    #[tokio::test]
    async fn queried_scores_query_result() {
        let rule = CompiledRule::Queried(QueriedRule {
            id: "blacklist".into(),
            query: Arc::new(FixedQuery {
                value: Value::Bool(true),
                cost: 3,
            }),
            check: scoring(|v| v.as_bool() == Some(true), Score::of(100)),
        });

        let got = rule.calculate(&Params::new()).await.unwrap();
        assert_eq!(got.score, Score::of(100));
        assert_eq!(got.cost, 3);
    }

    #[tokio::test]
    async fn scoring_adapter_yields_zero_on_false() {
        let check = scoring(|v| v.as_f64().is_some_and(|p| p <= 0.3), Score::of(40));
        assert_eq!(check(&Value::Float(0.9)), Score::zero());
        assert_eq!(check(&Value::Float(0.1)), Score::of(40));
    }

    #[tokio::test]
    async fn single_source_sums_checks_over_one_result() {
        let rule = CompiledRule::SingleSourceQueried {
            id: "ab".into(),
            members: vec!["a".into(), "b".into()],
            query: Arc::new(FixedQuery {
                value: Value::Int(400),
                cost: 9,
            }),
            checks: vec![
                scoring(|v| v.as_i64().is_some_and(|n| n >= 300), Score::of(10)),
                scoring(|v| v.as_i64().is_some_and(|n| n >= 100), Score::of(30)),
            ],
        };

        let got = rule.calculate(&Params::new()).await.unwrap();
        assert_eq!(got.score, Score::of(40));
        assert_eq!(got.cost, 9);
    }

    #[tokio::test]
    async fn dependent_runs_sink_when_condition_holds() {
        let rule = CompiledRule::Dependent {
            id: "sinksource".into(),
            source: QueriedRule {
                id: "source".into(),
                query: Arc::new(FixedQuery {
                    value: Value::Float(0.2),
                    cost: 5,
                }),
                check: scoring(|v| v.as_f64().is_some_and(|p| p <= 0.3), Score::of(40)),
            },
            sink: QueriedRule::new("sink", Arc::new(EchoDeviceQuery), |v| {
                if v.as_str() == Some("device_42") {
                    Score::of(20)
                } else {
                    Score::zero()
                }
            }),
            condition: Arc::new(|v| v.as_f64().is_some_and(|p| p >= 0.1)),
            transmitter: Arc::new(|_| {
                let mut extra = Params::new();
                extra.insert("device_id".into(), "device_42".into());
                extra
            }),
        };

        // Caller's device_id must be overridden in the sink call only.
        let params = params_with("device_id", "original");
        let got = rule.calculate(&params).await.unwrap();
        assert_eq!(got.score, Score::of(60));
        assert_eq!(params["device_id"], "original");
    }

    #[tokio::test]
    async fn dependent_skips_sink_when_condition_fails() {
        let rule = CompiledRule::Dependent {
            id: "sinksource".into(),
            source: QueriedRule::new(
                "source",
                Arc::new(FixedQuery {
                    value: Value::Float(0.05),
                    cost: 5,
                }),
                |_| Score::of(1),
            ),
            // A failing sink query proves the sink is never invoked.
            sink: QueriedRule::new("sink", Arc::new(FailingQuery), |_| Score::of(99)),
            condition: Arc::new(|v| v.as_f64().is_some_and(|p| p >= 0.1)),
            transmitter: Arc::new(|_| Params::new()),
        };

        let got = rule.calculate(&Params::new()).await.unwrap();
        assert_eq!(got.score, Score::of(1));
        assert_eq!(got.cost, 5, "sink cost must not accrue");
    }

    #[tokio::test]
    async fn query_error_propagates() {
        let rule = CompiledRule::Queried(QueriedRule::new(
            "broken",
            Arc::new(FailingQuery),
            |_| Score::of(1),
        ));
        let err = rule.calculate(&Params::new()).await.unwrap_err();
        assert_eq!(err, QueryError::failed("redis", "down"));
    }

    #[test]
    fn member_ids_per_variant() {
        let queried = CompiledRule::Queried(QueriedRule::new(
            "solo",
            Arc::new(FixedQuery {
                value: Value::Int(0),
                cost: 0,
            }),
            |_| Score::zero(),
        ));
        assert_eq!(queried.member_ids(), vec!["solo"]);
        assert_eq!(format!("{queried:?}"), "Queried(solo)");
    }
}
