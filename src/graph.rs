use std::collections::HashMap;
use std::hash::Hash;

/// A directed graph over rule identifiers with labeled edges, used to
/// validate requested-rule dependencies before compilation.
#[derive(Debug, Clone)]
pub struct DependencyGraph<N, E> {
    adjacency: HashMap<N, Vec<(N, E)>>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

impl<N: Eq + Hash + Clone, E> DependencyGraph<N, E> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            adjacency: HashMap::new(),
        }
    }

    pub fn add_node(&mut self, node: N) {
        self.adjacency.entry(node).or_default();
    }

    /// Inserting an edge implicitly adds both endpoints.
    pub fn add_edge(&mut self, from: N, to: N, label: E) {
        self.add_node(to.clone());
        self.adjacency.entry(from).or_default().push((to, label));
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Whether the graph contains any directed cycle. A self-loop counts.
    ///
    /// Three-color DFS: a back-edge to an in-progress node signals a cycle.
    /// O(V + E); the answer does not depend on traversal order.
    #[must_use]
    pub fn has_cycle(&self) -> bool {
        let mut marks: HashMap<&N, Mark> = self
            .adjacency
            .keys()
            .map(|node| (node, Mark::Unvisited))
            .collect();

        for node in self.adjacency.keys() {
            if marks[node] == Mark::Unvisited && self.dfs(node, &mut marks) {
                return true;
            }
        }
        false
    }

    fn dfs<'a>(&'a self, node: &'a N, marks: &mut HashMap<&'a N, Mark>) -> bool {
        match marks.get(node) {
            Some(Mark::InProgress) => return true,
            Some(Mark::Done) => return false,
            _ => {}
        }
        marks.insert(node, Mark::InProgress);
        if let Some(edges) = self.adjacency.get(node) {
            for (to, _) in edges {
                if self.dfs(to, marks) {
                    return true;
                }
            }
        }
        marks.insert(node, Mark::Done);
        false
    }
}

impl<N: Eq + Hash + Clone, E> Default for DependencyGraph<N, E> {
    fn default() -> Self {
        Self::new()
    }
}
