//! Workflow definition and graph edits.
//!
//! A workflow is an insertion-ordered list of steps plus metadata and user
//! variables. All edits are validated before anything is changed, so a
//! rejected edit leaves the workflow untouched.

use crate::connection::{BranchLabel, Connections, PlainTarget};
use crate::contract::BranchArity;
use crate::error::{GraphError, VariableError};
use crate::graph::StepGraph;
use crate::step::{Step, StepConfig, StepKind};
use crate::variables::{Variable, WorkflowVariables};
use chatflow_core::{StepId, WorkflowId};
use chrono::{DateTime, Utc};
use rootcause::Report;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::fmt;
use tracing::debug;

/// Metadata for a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowMetadata {
    /// Human-readable name.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowMetadata {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            description: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A workflow: steps, their connections, and user variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: WorkflowId,
    pub metadata: WorkflowMetadata,
    #[serde(default)]
    steps: Vec<Step>,
    #[serde(default, skip_serializing_if = "WorkflowVariables::is_empty")]
    variables: WorkflowVariables,
}

impl Workflow {
    /// Creates an empty workflow.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(WorkflowId::new(), name)
    }

    /// Creates an empty workflow with a specific ID.
    #[must_use]
    pub fn with_id(id: WorkflowId, name: impl Into<String>) -> Self {
        Self {
            id,
            metadata: WorkflowMetadata::new(name),
            steps: Vec::new(),
            variables: WorkflowVariables::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Returns the steps in insertion order.
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    #[must_use]
    pub fn step(&self, step_id: StepId) -> Option<&Step> {
        self.steps.iter().find(|step| step.id == step_id)
    }

    #[must_use]
    pub fn contains(&self, step_id: StepId) -> bool {
        self.step(step_id).is_some()
    }

    /// Returns the position of a step in insertion order.
    #[must_use]
    pub fn position(&self, step_id: StepId) -> Option<usize> {
        self.steps.iter().position(|step| step.id == step_id)
    }

    /// Returns the step inserted right after `step_id`.
    #[must_use]
    pub fn step_after(&self, step_id: StepId) -> Option<&Step> {
        self.position(step_id)
            .and_then(|index| self.steps.get(index + 1))
    }

    /// Returns the trigger step, if any.
    #[must_use]
    pub fn trigger(&self) -> Option<&Step> {
        self.steps.iter().find(|step| step.is_trigger())
    }

    /// Returns a graph view of the explicit connections.
    #[must_use]
    pub fn graph(&self) -> StepGraph {
        StepGraph::build(&self.steps)
    }

    /// Inserts a step at the end of the workflow.
    ///
    /// # Errors
    ///
    /// - `DuplicateStep` if a step with the same ID exists
    /// - `DuplicateTrigger` if the step is a trigger and one already exists
    /// - `ShapeMismatch` if the connections do not fit the step type
    /// - `SelfLoop` or `UnknownTarget` if a connection is invalid
    pub fn insert_step(&mut self, step: Step) -> Result<StepId, Report<GraphError>> {
        if self.contains(step.id) {
            return Err(GraphError::DuplicateStep { step_id: step.id }.into());
        }
        if let Some(existing) = self.trigger().filter(|_| step.is_trigger()) {
            return Err(GraphError::DuplicateTrigger {
                existing: existing.id,
            }
            .into());
        }
        check_shape(&step)?;
        for (_, target) in step.connections.edges() {
            if target == step.id {
                return Err(GraphError::SelfLoop { step_id: step.id }.into());
            }
            if !self.contains(target) {
                return Err(GraphError::UnknownTarget {
                    from: step.id,
                    target,
                }
                .into());
            }
        }

        let step_id = step.id;
        debug!(step_id = %step_id, step_type = %step.kind, "inserting step");
        self.steps.push(step);
        self.touch();
        Ok(step_id)
    }

    /// Creates a step of `kind` with its default configuration and inserts it.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateTrigger` if `kind` is a trigger and one already exists.
    pub fn add_step(
        &mut self,
        kind: StepKind,
        name: impl Into<String>,
    ) -> Result<StepId, Report<GraphError>> {
        self.insert_step(Step::new(kind, name))
    }

    /// Deletes a step and clears every connection that pointed at it.
    ///
    /// # Errors
    ///
    /// Returns `UnknownStep` if the step does not exist.
    pub fn delete_step(&mut self, step_id: StepId) -> Result<Step, Report<GraphError>> {
        let index = self
            .position(step_id)
            .ok_or(GraphError::UnknownStep { step_id })?;
        let removed = self.steps.remove(index);

        let cleared: usize = self
            .steps
            .iter_mut()
            .map(|step| step.connections.forget(step_id))
            .sum();

        debug!(step_id = %step_id, cleared, "deleted step");
        self.touch();
        Ok(removed)
    }

    /// Wires `from` to `to` on the given branch.
    ///
    /// `branch` may be omitted for plain steps; it is required otherwise.
    ///
    /// # Errors
    ///
    /// - `UnknownStep` if `from` does not exist
    /// - `InvalidBranch` if the label does not fit `from`'s type
    /// - `UnknownTarget` if `to` does not exist
    /// - `SelfLoop` if `from == to`
    pub fn connect(
        &mut self,
        from: StepId,
        to: StepId,
        branch: Option<BranchLabel>,
    ) -> Result<(), Report<GraphError>> {
        let index = self
            .position(from)
            .ok_or(GraphError::UnknownStep { step_id: from })?;
        let label = legal_label(&self.steps[index], branch)?;
        if !self.contains(to) {
            return Err(GraphError::UnknownTarget { from, target: to }.into());
        }
        if from == to {
            return Err(GraphError::SelfLoop { step_id: from }.into());
        }

        debug!(from = %from, to = %to, branch = %label, "connecting steps");
        let connections = &mut self.steps[index].connections;
        if !connections.set(label.clone(), to) {
            return Err(GraphError::invalid_branch(from, Some(&label)).into());
        }
        self.touch();
        Ok(())
    }

    /// Disconnects a branch, returning the step it pointed at.
    ///
    /// A plain step becomes explicitly disconnected: it no longer falls
    /// through to the next step in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `UnknownStep` or `InvalidBranch`.
    pub fn disconnect(
        &mut self,
        from: StepId,
        branch: Option<BranchLabel>,
    ) -> Result<Option<StepId>, Report<GraphError>> {
        let index = self
            .position(from)
            .ok_or(GraphError::UnknownStep { step_id: from })?;
        let label = legal_label(&self.steps[index], branch)?;

        let previous = self.steps[index].connections.disconnect(&label);
        debug!(from = %from, branch = %label, "disconnected branch");
        self.touch();
        Ok(previous)
    }

    /// Returns a plain step to the unset state, restoring the sequential
    /// fallback.
    ///
    /// # Errors
    ///
    /// Returns `UnknownStep`, or `InvalidBranch` for non-plain steps.
    pub fn reset_connection(&mut self, step_id: StepId) -> Result<(), Report<GraphError>> {
        let step = self.step_mut(step_id)?;
        if !step.connections.reset() {
            return Err(GraphError::invalid_branch(step_id, Some(&BranchLabel::Next)).into());
        }
        self.touch();
        Ok(())
    }

    /// Renames a step.
    ///
    /// # Errors
    ///
    /// Returns `UnknownStep` if the step does not exist.
    pub fn rename(
        &mut self,
        step_id: StepId,
        name: impl Into<String>,
    ) -> Result<(), Report<GraphError>> {
        self.step_mut(step_id)?.name = name.into();
        self.touch();
        Ok(())
    }

    /// Replaces a step's configuration.
    ///
    /// # Errors
    ///
    /// Returns `UnknownStep` if the step does not exist.
    pub fn update_config(
        &mut self,
        step_id: StepId,
        config: StepConfig,
    ) -> Result<(), Report<GraphError>> {
        self.step_mut(step_id)?.config = config;
        self.touch();
        Ok(())
    }

    /// Sets one configuration key.
    ///
    /// # Errors
    ///
    /// Returns `UnknownStep` if the step does not exist.
    pub fn set_config_value(
        &mut self,
        step_id: StepId,
        key: impl Into<String>,
        value: JsonValue,
    ) -> Result<(), Report<GraphError>> {
        self.step_mut(step_id)?.config.insert(key.into(), value);
        self.touch();
        Ok(())
    }

    #[must_use]
    pub fn variables(&self) -> &WorkflowVariables {
        &self.variables
    }

    #[must_use]
    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    /// Sets a user variable.
    ///
    /// # Errors
    ///
    /// Returns an error if the name or value is invalid.
    pub fn set_variable(
        &mut self,
        name: impl Into<String>,
        variable: Variable,
    ) -> Result<(), Report<VariableError>> {
        self.variables.set(name, variable)?;
        self.touch();
        Ok(())
    }

    /// Removes a user variable.
    pub fn remove_variable(&mut self, name: &str) -> Option<Variable> {
        let removed = self.variables.remove(name);
        if removed.is_some() {
            self.touch();
        }
        removed
    }

    /// Checks the graph invariants.
    ///
    /// Edits through this type cannot break them; documents built elsewhere
    /// can.
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn check_integrity(&self) -> Result<(), Report<GraphError>> {
        let mut seen = HashSet::with_capacity(self.steps.len());
        let mut trigger: Option<StepId> = None;

        for step in &self.steps {
            if !seen.insert(step.id) {
                return Err(GraphError::DuplicateStep { step_id: step.id }.into());
            }
            if step.is_trigger() {
                if let Some(existing) = trigger {
                    return Err(GraphError::DuplicateTrigger { existing }.into());
                }
                trigger = Some(step.id);
            }
            check_shape(step)?;
        }

        for step in &self.steps {
            for (_, target) in step.connections.edges() {
                if target == step.id {
                    return Err(GraphError::SelfLoop { step_id: step.id }.into());
                }
                if !seen.contains(&target) {
                    return Err(GraphError::UnknownTarget {
                        from: step.id,
                        target,
                    }
                    .into());
                }
            }
        }
        Ok(())
    }

    /// Reports problems that do not make the workflow invalid but keep it from
    /// running as intended.
    #[must_use]
    pub fn validate(&self) -> ValidationReport {
        let mut issues = Vec::new();

        if let Err(report) = self.check_integrity() {
            issues.push(ValidationIssue::Integrity(report.current_context().clone()));
        }

        let Some(trigger) = self.trigger() else {
            issues.push(ValidationIssue::MissingTrigger);
            return ValidationReport { issues };
        };

        for step in &self.steps {
            if !step.is_configured() {
                issues.push(ValidationIssue::Unconfigured { step_id: step.id });
            }
        }

        let reachable = self.reachable_from(trigger.id);
        for step in &self.steps {
            if !reachable.contains(&step.id) {
                issues.push(ValidationIssue::Unreachable { step_id: step.id });
            }
        }

        if self.graph().is_cyclic() {
            issues.push(ValidationIssue::Cycle);
        }

        ValidationReport { issues }
    }

    /// Steps reachable from `start` along wired edges and the sequential
    /// fallback of unset plain steps.
    fn reachable_from(&self, start: StepId) -> BTreeSet<StepId> {
        let mut visited = BTreeSet::new();
        let mut queue = VecDeque::from([start]);

        while let Some(step_id) = queue.pop_front() {
            if !visited.insert(step_id) {
                continue;
            }
            let Some(step) = self.step(step_id) else {
                continue;
            };
            queue.extend(step.connections.edges().into_iter().map(|(_, id)| id));
            let falls_through = step.connections
                == Connections::Plain {
                    next: PlainTarget::Unset,
                };
            if let Some(next) = self.step_after(step_id).filter(|_| falls_through) {
                queue.push_back(next.id);
            }
        }
        visited
    }

    fn step_mut(&mut self, step_id: StepId) -> Result<&mut Step, Report<GraphError>> {
        self.steps
            .iter_mut()
            .find(|step| step.id == step_id)
            .ok_or_else(|| GraphError::UnknownStep { step_id }.into())
    }

    fn touch(&mut self) {
        self.metadata.updated_at = Utc::now();
    }
}

fn check_shape(step: &Step) -> Result<(), Report<GraphError>> {
    if step.connections.arity() != step.branch_arity() {
        return Err(GraphError::ShapeMismatch {
            step_id: step.id,
            step_type: step.kind.to_string(),
        }
        .into());
    }
    Ok(())
}

fn legal_label(
    step: &Step,
    branch: Option<BranchLabel>,
) -> Result<BranchLabel, Report<GraphError>> {
    let arity = step.branch_arity();
    match branch {
        None if arity == BranchArity::Plain => Ok(BranchLabel::Next),
        Some(label) if label.fits(arity) => Ok(label),
        other => Err(GraphError::invalid_branch(step.id, other.as_ref()).into()),
    }
}

/// A problem found by [`Workflow::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    /// A graph invariant is violated.
    Integrity(GraphError),
    /// The workflow has no trigger, so it can never start.
    MissingTrigger,
    /// A step's configuration is incomplete.
    Unconfigured { step_id: StepId },
    /// No path from the trigger reaches the step.
    Unreachable { step_id: StepId },
    /// The wired edges contain a cycle.
    Cycle,
}

impl ValidationIssue {
    /// Returns true for issues that keep the workflow from running at all.
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Integrity(_) | Self::MissingTrigger)
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integrity(violation) => write!(f, "{violation}"),
            Self::MissingTrigger => write!(f, "workflow has no trigger"),
            Self::Unconfigured { step_id } => write!(f, "step {step_id} is not configured"),
            Self::Unreachable { step_id } => {
                write!(f, "step {step_id} is not reachable from the trigger")
            }
            Self::Cycle => write!(f, "connections form a cycle"),
        }
    }
}

/// Result of [`Workflow::validate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Returns true if no issue is an error. Warnings are allowed.
    #[must_use]
    pub fn is_runnable(&self) -> bool {
        !self.issues.iter().any(ValidationIssue::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|issue| issue.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|issue| !issue.is_error())
    }
}
