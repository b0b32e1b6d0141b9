use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, Semaphore};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::types::{
    ExecutionPlan, Params, QueryError, RuleExecution, RulesExecuted, Score,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExecuteError {
    #[error("rule {rule} failed")]
    Rule {
        rule: String,
        #[source]
        source: QueryError,
    },
}

/// What a query failure inside a batch does to the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// The first failure aborts the whole batch and surfaces as an error.
    #[default]
    Abort,
    /// The failed rule contributes a zero score and the batch continues.
    ScoreZero,
}

/// What one deadlined batch produced: the summed score, the per-rule
/// observations, and whether the deadline cut the batch short.
#[derive(Debug, Default)]
#[must_use]
pub struct BatchOutcome {
    score: Score,
    timed_out: bool,
    executions: Vec<RuleExecution>,
}

impl BatchOutcome {
    #[must_use]
    pub fn score(&self) -> Score {
        self.score
    }

    #[must_use]
    pub fn timed_out(&self) -> bool {
        self.timed_out
    }

    #[must_use]
    pub fn executions(&self) -> &[RuleExecution] {
        &self.executions
    }

    /// Package the observations as planner feedback.
    #[must_use]
    pub fn into_event(self) -> RulesExecuted {
        RulesExecuted::now(self.executions)
    }
}

enum RuleOutcome {
    Done(RuleExecution),
    Failed {
        rule: String,
        duration: Duration,
        source: QueryError,
    },
}

/// Runs a plan with bounded concurrency under a hard deadline.
///
/// Rules are dispatched in plan order; at most `workers` run at once. When
/// the deadline fires, results collected so far are kept and every
/// outstanding rule is cancelled. The plan's ordering is what makes the
/// cutoff graceful: the most valuable rules were dispatched first.
#[derive(Debug, Clone, Copy)]
pub struct Executor {
    workers: usize,
    timeout: Duration,
    on_query_error: FailurePolicy,
}

impl Executor {
    #[must_use]
    pub fn new(workers: usize, timeout: Duration) -> Self {
        Self {
            workers: workers.max(1),
            timeout,
            on_query_error: FailurePolicy::default(),
        }
    }

    #[must_use]
    pub fn on_query_error(mut self, policy: FailurePolicy) -> Self {
        self.on_query_error = policy;
        self
    }

    /// Run every rule in the plan against one request's parameters.
    ///
    /// # Errors
    ///
    /// Under [`FailurePolicy::Abort`], the first query failure aborts the
    /// batch as [`ExecuteError::Rule`]. A missed deadline is not an error;
    /// it is reported through [`BatchOutcome::timed_out`].
    pub async fn run(
        &self,
        plan: &ExecutionPlan,
        params: &Params,
    ) -> Result<BatchOutcome, ExecuteError> {
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let params = Arc::new(params.clone());
        let (tx, mut rx) = mpsc::unbounded_channel();

        let handles: Vec<_> = plan
            .rules()
            .iter()
            .map(|rule| {
                let rule = Arc::clone(rule);
                let semaphore = Arc::clone(&semaphore);
                let params = Arc::clone(&params);
                let tx = tx.clone();
                tokio::spawn(async move {
                    let Ok(_permit) = semaphore.acquire_owned().await else {
                        return;
                    };
                    let started = Instant::now();
                    let outcome = match rule.calculate(&params).await {
                        Ok(calculated) => RuleOutcome::Done(RuleExecution::new(
                            rule.id(),
                            started.elapsed(),
                            calculated.score,
                            calculated.cost,
                        )),
                        Err(source) => RuleOutcome::Failed {
                            rule: rule.id().to_owned(),
                            duration: started.elapsed(),
                            source,
                        },
                    };
                    // The receiver going away just means the batch ended.
                    let _ = tx.send(outcome);
                })
            })
            .collect();
        drop(tx);

        let deadline = tokio::time::sleep(self.timeout);
        tokio::pin!(deadline);

        let mut outcome = BatchOutcome::default();
        let failed = loop {
            tokio::select! {
                received = rx.recv() => match received {
                    Some(RuleOutcome::Done(execution)) => {
                        outcome.score = outcome.score.add(execution.score);
                        outcome.executions.push(execution);
                    }
                    Some(RuleOutcome::Failed { rule, duration, source }) => {
                        match self.on_query_error {
                            FailurePolicy::Abort => break Some(ExecuteError::Rule { rule, source }),
                            FailurePolicy::ScoreZero => {
                                warn!(rule = %rule, %source, "rule failed, scoring zero");
                                outcome
                                    .executions
                                    .push(RuleExecution::new(rule, duration, Score::zero(), 0));
                            }
                        }
                    }
                    None => break None,
                },
                () = &mut deadline => {
                    warn!(
                        collected = outcome.executions.len(),
                        of = plan.len(),
                        "deadline reached, cancelling outstanding rules"
                    );
                    outcome.timed_out = true;
                    break None;
                }
            }
        };

        for handle in &handles {
            handle.abort();
        }
        if let Some(error) = failed {
            return Err(error);
        }
        debug!(
            score = %outcome.score,
            executed = outcome.executions.len(),
            timed_out = outcome.timed_out,
            "batch finished"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::types::{CompiledRule, Query, QueriedRule, RulesConfig, Value};

    struct SlowQuery {
        delay: Duration,
        cost: u32,
    }

    #[async_trait]
    impl Query for SlowQuery {
        async fn execute(&self, _params: &Params) -> Result<Value, QueryError> {
            tokio::time::sleep(self.delay).await;
            Ok(Value::Bool(true))
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

    /// Tracks the high-water mark of concurrent executions.
    struct GaugedQuery {
        current: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Query for GaugedQuery {
        async fn execute(&self, _params: &Params) -> Result<Value, QueryError> {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            Ok(Value::Bool(true))
        }
    }

    fn slow_rule(id: &str, delay_ms: u64, score: i64) -> CompiledRule {
        CompiledRule::Queried(QueriedRule::new(
            id,
            Arc::new(SlowQuery {
                delay: Duration::from_millis(delay_ms),
                cost: 1,
            }),
            move |_| Score::of(score),
        ))
    }

    fn plan(rules: Vec<CompiledRule>) -> ExecutionPlan {
        ExecutionPlan::from(&RulesConfig::new(rules))
    }

    #[tokio::test(start_paused = true)]
    async fn full_batch_sums_scores() {
        let plan = plan(vec![slow_rule("A", 50, 10), slow_rule("B", 100, 20)]);
        let executor = Executor::new(2, Duration::from_secs(1));

        let outcome = executor.run(&plan, &Params::new()).await.unwrap();
        assert_eq!(outcome.score(), Score::of(30));
        assert!(!outcome.timed_out());
        assert_eq!(outcome.executions().len(), 2);

        let event = outcome.into_event();
        assert_eq!(event.executions.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_keeps_partial_results() {
        // A finishes at 50, B at 100; C starts when A frees a worker and
        // would finish at 350, past the 200ms deadline.
        let plan = plan(vec![
            slow_rule("A", 50, 10),
            slow_rule("B", 100, 20),
            slow_rule("C", 300, 30),
        ]);
        let executor = Executor::new(2, Duration::from_millis(200));

        let outcome = executor.run(&plan, &Params::new()).await.unwrap();
        assert!(outcome.timed_out());
        assert_eq!(outcome.score(), Score::of(30));
        assert_eq!(outcome.executions().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn abort_policy_surfaces_first_failure() {
        let plan = plan(vec![CompiledRule::Queried(QueriedRule::new(
            "bad",
            Arc::new(FailingQuery),
            |_| Score::of(1),
        ))]);
        let executor = Executor::new(2, Duration::from_secs(1));

        let err = executor.run(&plan, &Params::new()).await.unwrap_err();
        assert_eq!(
            err,
            ExecuteError::Rule {
                rule: "bad".into(),
                source: QueryError::failed("redis", "down"),
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn score_zero_policy_keeps_batch_alive() {
        let plan = plan(vec![
            CompiledRule::Queried(QueriedRule::new("bad", Arc::new(FailingQuery), |_| {
                Score::of(99)
            })),
            slow_rule("good", 10, 7),
        ]);
        let executor =
            Executor::new(2, Duration::from_secs(1)).on_query_error(FailurePolicy::ScoreZero);

        let outcome = executor.run(&plan, &Params::new()).await.unwrap();
        assert_eq!(outcome.score(), Score::of(7));
        assert_eq!(outcome.executions().len(), 2);
        let failed = outcome
            .executions()
            .iter()
            .find(|e| e.id == "bad")
            .unwrap();
        assert_eq!(failed.score, Score::zero());
        assert_eq!(failed.cost, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_plan_is_a_clean_zero() {
        let executor = Executor::new(4, Duration::from_millis(10));
        let outcome = executor
            .run(&ExecutionPlan::default(), &Params::new())
            .await
            .unwrap();
        assert_eq!(outcome.score(), Score::zero());
        assert!(!outcome.timed_out());
        assert!(outcome.executions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn worker_bound_is_respected() {
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let rules = (0..6)
            .map(|i| {
                CompiledRule::Queried(QueriedRule::new(
                    format!("g{i}"),
                    Arc::new(GaugedQuery {
                        current: Arc::clone(&current),
                        peak: Arc::clone(&peak),
                    }),
                    |_| Score::of(1),
                ))
            })
            .collect();
        let executor = Executor::new(2, Duration::from_secs(5));

        let outcome = executor.run(&plan(rules), &Params::new()).await.unwrap();
        assert_eq!(outcome.score(), Score::of(6));
        assert!(peak.load(Ordering::SeqCst) <= 2, "worker bound exceeded");
    }
}
