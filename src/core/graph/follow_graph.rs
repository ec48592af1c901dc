//! Follow graph over mutex identities
//!
//! An edge P -> S records that some thread held P when it first acquired S.
//! Edges are only ever added. A pair of edges P -> S and S -> P means two code
//! paths take the same two mutexes in opposite order.

use crate::core::types::MutexId;
use fxhash::{FxHashMap, FxHashSet};

/// Append-only precedence graph
///
/// All access goes through the debugger's graph lock, so this type does no
/// synchronization of its own.
#[derive(Debug, Default)]
pub struct FollowGraph {
    /// Adjacency list: each mutex maps to the mutexes seen acquired after it
    followers: FxHashMap<MutexId, FxHashSet<MutexId>>,
    /// Number of distinct edges
    edge_count: usize,
}

impl FollowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty follower set for `id` if it has none
    pub fn ensure_node(&mut self, id: MutexId) {
        self.followers.entry(id).or_default();
    }

    /// Record that `succ` was acquired while `pred` was held
    ///
    /// # Returns
    /// `true` if the edge is new, `false` if it was already recorded
    pub fn add_edge(&mut self, pred: MutexId, succ: MutexId) -> bool {
        let inserted = self.followers.entry(pred).or_default().insert(succ);
        if inserted {
            self.edge_count += 1;
        }
        inserted
    }

    /// Check if there's an edge from `pred` to `succ`
    pub fn has_edge(&self, pred: MutexId, succ: MutexId) -> bool {
        self.followers
            .get(&pred)
            .map(|succs| succs.contains(&succ))
            .unwrap_or(false)
    }

    /// Mutexes recorded as following `id`, ordered by identity
    pub fn followers(&self, id: MutexId) -> Vec<MutexId> {
        let mut out: Vec<MutexId> = self
            .followers
            .get(&id)
            .map(|succs| succs.iter().copied().collect())
            .unwrap_or_default();
        out.sort_unstable();
        out
    }

    pub fn node_count(&self) -> usize {
        self.followers.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_node_is_idempotent() {
        let mut graph = FollowGraph::new();
        let a = MutexId::new("A");

        graph.ensure_node(a);
        graph.ensure_node(a);
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.edge_count(), 0);
        assert!(graph.followers(a).is_empty());
    }

    #[test]
    fn test_edges_are_directed() {
        let mut graph = FollowGraph::new();
        let a = MutexId::new("A");
        let b = MutexId::new("B");

        assert!(graph.add_edge(a, b));
        assert!(graph.has_edge(a, b));
        assert!(!graph.has_edge(b, a));
    }

    #[test]
    fn test_repeated_edge_is_not_duplicated() {
        let mut graph = FollowGraph::new();
        let a = MutexId::new("A");
        let b = MutexId::new("B");
        let c = MutexId::new("C");

        assert!(graph.add_edge(a, b));
        assert!(!graph.add_edge(a, b));
        assert!(graph.add_edge(a, c));
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.followers(a), vec![b, c]);
    }
}
