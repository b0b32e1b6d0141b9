use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info};

use crate::graph::DependencyGraph;
use crate::types::{
    CompileError, CompiledRule, Condition, DependencyKind, Params, QueriedRule, RequestedRule,
    RulesConfig, RulesRequest, Transmitter,
};

impl RulesRequest {
    /// Whether the declared dependency graph is acyclic (self-loops count
    /// as cycles). Both `Forced` and `NeedsData` edges participate.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        let mut graph: DependencyGraph<&str, DependencyKind> = DependencyGraph::new();
        for rule in &self.requested {
            graph.add_node(rule.id());
            if let Some(dep) = rule.dependency() {
                graph.add_edge(rule.id(), dep.target(), dep.kind());
            }
        }
        !graph.has_cycle()
    }

    /// Compile the request into an executable [`RulesConfig`].
    ///
    /// Single pass, priority-ordered, no backtracking:
    /// 1. reject cyclic dependency graphs;
    /// 2. rules without a query compile as-is;
    /// 3. `NeedsData` dependents pair with their target into one dependent
    ///    rule (one hop only, chains are unsupported);
    /// 4. remaining queried rules sharing a `(datasource, view)` tag group
    ///    into one single-source rule per group of two or more;
    /// 5. whatever is left compiles standalone.
    ///
    /// Every requested rule ends up in exactly one compiled rule.
    ///
    /// # Errors
    ///
    /// [`CompileError::CyclicDependency`] when the dependency graph has a
    /// cycle, [`CompileError::DuplicateId`] when two requested rules share
    /// an id. Both reject the request outright; nothing is compiled.
    pub fn compile(self) -> Result<RulesConfig, CompileError> {
        check_unique_ids(&self.requested)?;
        if !self.is_valid() {
            return Err(CompileError::CyclicDependency);
        }

        let requested = self.requested;
        let total = requested.len();
        let mut consumed: HashSet<usize> = HashSet::new();
        let mut rules: Vec<CompiledRule> = Vec::new();

        compile_non_queried(&requested, &mut consumed, &mut rules);
        compile_dependent_pairs(&requested, &mut consumed, &mut rules);
        compile_source_groups(&requested, &mut consumed, &mut rules);
        compile_leftovers(&requested, &mut consumed, &mut rules);

        info!(requested = total, compiled = rules.len(), "compiled rules");
        Ok(RulesConfig::new(rules))
    }
}

fn check_unique_ids(requested: &[RequestedRule]) -> Result<(), CompileError> {
    let mut seen = HashSet::new();
    for rule in requested {
        if !seen.insert(rule.id()) {
            return Err(CompileError::DuplicateId {
                id: rule.id().to_owned(),
            });
        }
    }
    Ok(())
}

/// Pass 2: every requested rule without a query compiles directly.
fn compile_non_queried(
    requested: &[RequestedRule],
    consumed: &mut HashSet<usize>,
    rules: &mut Vec<CompiledRule>,
) {
    for (idx, rule) in requested.iter().enumerate() {
        if let crate::types::RequestedBody::Direct(check) = &rule.body {
            rules.push(CompiledRule::NonQueried {
                id: rule.id().to_owned(),
                check: Arc::clone(check),
            });
            consumed.insert(idx);
        }
    }
    debug!(count = consumed.len(), "compiled non-queried rules");
}

/// Pass 3: pair each unconsumed `NeedsData` dependent with its target.
///
/// The pairing requires both sides to carry a query and the target to be
/// still unconsumed; otherwise the dependent silently falls through to
/// standalone compilation. A dependency declared without a condition gates
/// nothing: the sink always runs with unchanged parameters.
fn compile_dependent_pairs(
    requested: &[RequestedRule],
    consumed: &mut HashSet<usize>,
    rules: &mut Vec<CompiledRule>,
) {
    let index_by_id: HashMap<&str, usize> = requested
        .iter()
        .enumerate()
        .map(|(idx, rule)| (rule.id(), idx))
        .collect();

    for (idx, rule) in requested.iter().enumerate() {
        if consumed.contains(&idx) {
            continue;
        }
        let Some(dep) = rule.dependency() else {
            continue;
        };
        if dep.kind() != DependencyKind::NeedsData {
            // Forced edges only constrain validation.
            continue;
        }
        let Some(&target_idx) = index_by_id.get(dep.target()) else {
            debug!(
                rule = rule.id(),
                target = dep.target(),
                "dependency target not requested, compiling standalone"
            );
            continue;
        };
        if consumed.contains(&target_idx) || target_idx == idx {
            continue;
        }
        let target = &requested[target_idx];
        let (Some(sink), Some(source)) = (as_queried(rule), as_queried(target)) else {
            continue;
        };

        let condition: Condition = dep
            .condition
            .clone()
            .unwrap_or_else(|| Arc::new(|_| true));
        let transmitter: Transmitter = dep
            .transmitter
            .clone()
            .unwrap_or_else(|| Arc::new(|_| Params::new()));

        rules.push(CompiledRule::Dependent {
            id: format!("{}{}", sink.id, source.id),
            source,
            sink,
            condition,
            transmitter,
        });
        consumed.insert(idx);
        consumed.insert(target_idx);
    }
}

/// Pass 4: group remaining queried rules by `(datasource, view)`; any group
/// with two or more members shares one query execution. Untagged rules
/// never group. Group order and member order follow the request.
fn compile_source_groups(
    requested: &[RequestedRule],
    consumed: &mut HashSet<usize>,
    rules: &mut Vec<CompiledRule>,
) {
    let mut group_order: Vec<&crate::types::RuleSource> = Vec::new();
    let mut groups: HashMap<&crate::types::RuleSource, Vec<usize>> = HashMap::new();

    for (idx, rule) in requested.iter().enumerate() {
        if consumed.contains(&idx) || !rule.has_query() {
            continue;
        }
        if let Some(source) = rule.source() {
            let members = groups.entry(source).or_default();
            if members.is_empty() {
                group_order.push(source);
            }
            members.push(idx);
        }
    }

    for source in group_order {
        let members = &groups[source];
        if members.len() < 2 {
            continue;
        }
        let Some(first) = as_queried(&requested[members[0]]) else {
            continue;
        };
        let id: String = members.iter().map(|&idx| requested[idx].id()).collect();
        let member_ids = members
            .iter()
            .map(|&idx| requested[idx].id().to_owned())
            .collect();
        let checks = members
            .iter()
            .filter_map(|&idx| as_queried(&requested[idx]).map(|q| q.check))
            .collect();

        debug!(
            datasource = %source.datasource,
            view = %source.view,
            members = members.len(),
            "grouped rules sharing one query"
        );
        rules.push(CompiledRule::SingleSourceQueried {
            id,
            members: member_ids,
            query: first.query,
            checks,
        });
        consumed.extend(members.iter().copied());
    }
}

/// Pass 5: every still-unconsumed rule carries a query and compiles standalone.
fn compile_leftovers(
    requested: &[RequestedRule],
    consumed: &mut HashSet<usize>,
    rules: &mut Vec<CompiledRule>,
) {
    for (idx, rule) in requested.iter().enumerate() {
        if consumed.contains(&idx) {
            continue;
        }
        if let Some(queried) = as_queried(rule) {
            rules.push(CompiledRule::Queried(queried));
            consumed.insert(idx);
        }
    }
}

fn as_queried(rule: &RequestedRule) -> Option<QueriedRule> {
    match &rule.body {
        crate::types::RequestedBody::Queried { query, check } => Some(QueriedRule {
            id: rule.id().to_owned(),
            query: Arc::clone(query),
            check: Arc::clone(check),
        }),
        crate::types::RequestedBody::Direct(_) => None,
    }
}
