//! Predecessor resolution.
//!
//! Walks explicit connections backwards. The sequential fallback of unset
//! plain steps only affects what runs next (see [`crate::branch`]); it does
//! not make a step a predecessor here.

use crate::connection::BranchLabel;
use crate::graph::StepGraph;
use crate::history::RunHistory;
use crate::workflow::Workflow;
use chatflow_core::StepId;
use serde_json::Value as JsonValue;
use std::collections::{BTreeSet, HashSet, VecDeque};

/// Returns every `(source, branch)` whose edge targets `target`.
///
/// Sources come in workflow order.
#[must_use]
pub fn find_incoming(workflow: &Workflow, target: StepId) -> Vec<(StepId, BranchLabel)> {
    workflow.graph().incoming(target)
}

/// Returns every trigger-category step.
///
/// A workflow holds at most one, but a set stays correct if a document was
/// built outside the edit operations.
#[must_use]
pub fn find_reachable_triggers(workflow: &Workflow) -> BTreeSet<StepId> {
    workflow
        .steps()
        .iter()
        .filter(|step| step.is_trigger())
        .map(|step| step.id)
        .collect()
}

/// Returns the ancestors of `target`, closest first.
///
/// Breadth-first over incoming edges. Each step appears at most once and the
/// walk terminates on cyclic graphs. `target` itself is never included, even
/// when it sits on a cycle.
#[must_use]
pub fn find_ancestors(workflow: &Workflow, target: StepId) -> Vec<StepId> {
    find_ancestors_in(&workflow.graph(), target)
}

pub(crate) fn find_ancestors_in(graph: &StepGraph, target: StepId) -> Vec<StepId> {
    let mut visited = HashSet::from([target]);
    let mut ancestors = Vec::new();
    let mut queue = VecDeque::from([target]);

    while let Some(current) = queue.pop_front() {
        for (source, _) in graph.incoming(current) {
            if visited.insert(source) {
                ancestors.push(source);
                queue.push_back(source);
            }
        }
    }
    ancestors
}

/// Returns the closest ancestor of `target` with a recorded output, and that
/// output.
///
/// Only one predecessor output is ever authoritative: when several ancestors
/// have recorded outputs, the closest one (then the earliest in workflow
/// order) wins and the others are ignored.
#[must_use]
pub fn find_nearest_output<'h>(
    workflow: &Workflow,
    history: &'h RunHistory,
    target: StepId,
) -> Option<(StepId, &'h JsonValue)> {
    nearest_output_in(&workflow.graph(), history, target)
}

pub(crate) fn nearest_output_in<'h>(
    graph: &StepGraph,
    history: &'h RunHistory,
    target: StepId,
) -> Option<(StepId, &'h JsonValue)> {
    find_ancestors_in(graph, target)
        .into_iter()
        .find_map(|ancestor| history.output(ancestor).map(|output| (ancestor, output)))
}
