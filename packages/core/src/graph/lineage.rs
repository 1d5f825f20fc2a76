//! Lineage Traversal
//!
//! Breadth-first walks over a `GraphIndex` collecting every ancestor or every
//! descendant of a node. Persisted canvases are not guaranteed to be acyclic,
//! so each walk keeps a visited set and a hard step budget; when the budget
//! runs out the partial result is returned.

use super::GraphIndex;
use crate::models::NodeId;
use std::collections::{HashSet, VecDeque};

#[derive(Debug, Clone, Copy)]
enum Direction {
    Up,
    Down,
}

/// Read-only lineage queries over one index snapshot
#[derive(Debug, Clone, Copy)]
pub struct LineageWalker<'a> {
    index: &'a GraphIndex,
    max_steps: usize,
}

impl<'a> LineageWalker<'a> {
    pub fn new(index: &'a GraphIndex, max_steps: usize) -> Self {
        Self { index, max_steps }
    }

    /// All transitive parents of `node_id`, never including `node_id`
    pub fn ancestors(&self, node_id: &str) -> HashSet<NodeId> {
        self.walk(node_id, Direction::Up)
    }

    /// All transitive children of `node_id`, never including `node_id`
    pub fn descendants(&self, node_id: &str) -> HashSet<NodeId> {
        self.walk(node_id, Direction::Down)
    }

    /// Ancestors and descendants together
    pub fn lineage(&self, node_id: &str) -> HashSet<NodeId> {
        let mut lineage = self.ancestors(node_id);
        lineage.extend(self.descendants(node_id));
        lineage
    }

    fn next_hop(&self, node_id: &str, direction: Direction) -> &'a [NodeId] {
        match direction {
            Direction::Up => self.index.parents_of(node_id),
            Direction::Down => self.index.children_of(node_id),
        }
    }

    fn walk(&self, start: &str, direction: Direction) -> HashSet<NodeId> {
        let mut visited: HashSet<NodeId> = HashSet::new();
        let mut queue: VecDeque<&'a NodeId> = self.next_hop(start, direction).iter().collect();
        let mut steps = 0usize;

        while let Some(id) = queue.pop_front() {
            if steps >= self.max_steps {
                tracing::warn!(
                    "Lineage walk from {} ({:?}) exhausted {} steps, returning partial result",
                    start,
                    direction,
                    self.max_steps
                );
                break;
            }
            steps += 1;

            if id == start || !visited.insert(id.clone()) {
                continue;
            }
            queue.extend(self.next_hop(id, direction));
        }

        visited
    }
}
