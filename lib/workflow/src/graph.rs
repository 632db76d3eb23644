//! Graph view over a workflow's explicit connections, using petgraph.
//!
//! The view is rebuilt from the step list on demand; the steps and their
//! [`Connections`](crate::connection::Connections) remain the source of truth.
//! Only wired edges appear here. The sequential fallback of unset plain edges
//! is a runtime convenience and is not part of the graph.

use crate::connection::BranchLabel;
use crate::step::Step;
use chatflow_core::StepId;
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::HashMap;

/// A directed graph whose nodes are step IDs and whose edges carry the branch
/// label that produced them.
#[derive(Debug, Clone)]
pub struct StepGraph {
    graph: DiGraph<StepId, BranchLabel>,
    node_index_map: HashMap<StepId, NodeIndex>,
}

impl StepGraph {
    /// Builds the view from steps in insertion order.
    ///
    /// Edges pointing at unknown steps are skipped.
    #[must_use]
    pub fn build(steps: &[Step]) -> Self {
        let mut graph = DiGraph::with_capacity(steps.len(), steps.len());
        let mut node_index_map = HashMap::with_capacity(steps.len());

        for step in steps {
            let index = graph.add_node(step.id);
            node_index_map.insert(step.id, index);
        }

        for step in steps {
            let source = node_index_map[&step.id];
            for (label, target) in step.connections.edges() {
                let Some(&target) = node_index_map.get(&target) else {
                    continue;
                };
                graph.add_edge(source, target, label);
            }
        }

        Self {
            graph,
            node_index_map,
        }
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Returns `(source, label)` for every edge into `step_id`, ordered by
    /// the source's position in the workflow, then by label.
    #[must_use]
    pub fn incoming(&self, step_id: StepId) -> Vec<(StepId, BranchLabel)> {
        let Some(&index) = self.node_index_map.get(&step_id) else {
            return Vec::new();
        };

        let mut edges: Vec<_> = self
            .graph
            .edges_directed(index, Direction::Incoming)
            .map(|edge| (edge.source(), edge.weight().clone()))
            .collect();
        edges.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

        edges
            .into_iter()
            .map(|(source, label)| (self.graph[source], label))
            .collect()
    }

    /// Returns `(label, target)` for every edge out of `step_id`.
    #[must_use]
    pub fn outgoing(&self, step_id: StepId) -> Vec<(BranchLabel, StepId)> {
        let Some(&index) = self.node_index_map.get(&step_id) else {
            return Vec::new();
        };

        let mut edges: Vec<_> = self
            .graph
            .edges_directed(index, Direction::Outgoing)
            .map(|edge| (edge.weight().clone(), self.graph[edge.target()]))
            .collect();
        edges.sort();
        edges
    }

    /// Returns true if the wired edges form a cycle.
    #[must_use]
    pub fn is_cyclic(&self) -> bool {
        petgraph::algo::is_cyclic_directed(&self.graph)
    }

    /// Returns steps nothing points at, in insertion order.
    #[must_use]
    pub fn entry_steps(&self) -> Vec<StepId> {
        self.graph
            .node_indices()
            .filter(|&idx| {
                self.graph
                    .edges_directed(idx, Direction::Incoming)
                    .next()
                    .is_none()
            })
            .map(|idx| self.graph[idx])
            .collect()
    }
}
