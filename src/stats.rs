use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::types::RuleExecution;

/// Per-rule running aggregate of execution feedback.
///
/// Created lazily on the first observation for a rule id; a rule never seen
/// reads as zero on every derived average.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuleStats {
    executions: u64,
    total_duration: Duration,
    total_cost: u64,
    total_score: i64,
}

impl RuleStats {
    pub(crate) fn update(&mut self, execution: &RuleExecution) {
        self.executions += 1;
        self.total_duration += execution.duration;
        self.total_cost += u64::from(execution.cost);
        self.total_score += execution.score.value();
    }

    #[must_use]
    pub fn executions(&self) -> u64 {
        self.executions
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn avg_duration_ms(&self) -> f64 {
        if self.executions == 0 {
            0.0
        } else {
            self.total_duration.as_secs_f64() * 1000.0 / self.executions as f64
        }
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn avg_cost(&self) -> f64 {
        if self.executions == 0 {
            0.0
        } else {
            self.total_cost as f64 / self.executions as f64
        }
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn avg_score(&self) -> f64 {
        if self.executions == 0 {
            0.0
        } else {
            self.total_score as f64 / self.executions as f64
        }
    }
}

const SHARDS: usize = 16;

/// Concurrent mapping of rule id to running stats.
///
/// Sharded so feedback for unrelated rules never serializes on one lock;
/// readers copy a snapshot out and never block writers for long. Plans built
/// from these snapshots are advisory, not transactionally consistent.
#[derive(Debug, Default)]
pub struct RulesStats {
    shards: [Mutex<HashMap<String, RuleStats>>; SHARDS],
}

impl RulesStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one observation into its rule's totals, creating a zeroed
    /// accumulator on first sight. Unknown ids are not an error.
    pub fn record(&self, execution: &RuleExecution) {
        let mut shard = self.lock_shard(&execution.id);
        shard
            .entry(execution.id.clone())
            .or_default()
            .update(execution);
    }

    /// Copy out the current aggregate for a rule, if any was ever recorded.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<RuleStats> {
        self.lock_shard(id).get(id).copied()
    }

    fn lock_shard(&self, id: &str) -> std::sync::MutexGuard<'_, HashMap<String, RuleStats>> {
        let mut hasher = DefaultHasher::new();
        id.hash(&mut hasher);
        let shard = &self.shards[(hasher.finish() as usize) % SHARDS];
        shard.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;
    use crate::types::Score;

    fn execution(id: &str, ms: u64, score: i64, cost: u32) -> RuleExecution {
        RuleExecution::new(id, Duration::from_millis(ms), Score::of(score), cost)
    }

    #[test]
    fn missing_rule_reads_as_none() {
        let stats = RulesStats::new();
        assert_eq!(stats.get("ghost"), None);
    }

    #[test]
    fn defaults_are_zero() {
        let stat = RuleStats::default();
        assert_eq!(stat.avg_duration_ms(), 0.0);
        assert_eq!(stat.avg_cost(), 0.0);
        assert_eq!(stat.avg_score(), 0.0);
    }

    #[test]
    fn record_creates_accumulator_lazily() {
        let stats = RulesStats::new();
        stats.record(&execution("A", 300, 5, 50));

        let stat = stats.get("A").unwrap();
        assert_eq!(stat.executions(), 1);
        assert_eq!(stat.avg_duration_ms(), 300.0);
        assert_eq!(stat.avg_score(), 5.0);
        assert_eq!(stat.avg_cost(), 50.0);
    }

    #[test]
    fn averages_over_multiple_executions() {
        let stats = RulesStats::new();
        stats.record(&execution("A", 100, 10, 4));
        stats.record(&execution("A", 300, 20, 8));

        let stat = stats.get("A").unwrap();
        assert_eq!(stat.executions(), 2);
        assert_eq!(stat.avg_duration_ms(), 200.0);
        assert_eq!(stat.avg_score(), 15.0);
        assert_eq!(stat.avg_cost(), 6.0);
    }

    #[test]
    fn concurrent_updates_to_distinct_rules() {
        let stats = Arc::new(RulesStats::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let stats = Arc::clone(&stats);
                thread::spawn(move || {
                    let id = format!("rule_{i}");
                    for _ in 0..100 {
                        stats.record(&execution(&id, 10, 1, 1));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        for i in 0..8 {
            let stat = stats.get(&format!("rule_{i}")).unwrap();
            assert_eq!(stat.executions(), 100);
            assert_eq!(stat.avg_score(), 1.0);
        }
    }
}
