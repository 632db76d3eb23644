//! Error types for the workflow crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `GraphError`: edit-time validation of steps and connections
//! - `ExecutionError`: failures while assembling context or running a step
//! - `StepExecutionError`: failures reported by a step executor
//! - `VariableError`: invalid user variables
//! - `PersistenceError`: encoding, decoding and storing workflow documents

use crate::connection::BranchLabel;
use crate::variables::VariableType;
use chatflow_core::StepId;
use std::fmt;

/// Errors from graph edits.
///
/// Every variant is raised before the workflow is touched, so a failed edit
/// leaves the workflow exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// The step being edited does not exist.
    UnknownStep { step_id: StepId },
    /// A connection points at a step that does not exist.
    UnknownTarget { from: StepId, target: StepId },
    /// The branch label is not legal for the step's branch arity.
    InvalidBranch { step_id: StepId, branch: String },
    /// The workflow already has a trigger step.
    DuplicateTrigger { existing: StepId },
    /// A step with the same ID is already present.
    DuplicateStep { step_id: StepId },
    /// A step was wired directly to itself.
    SelfLoop { step_id: StepId },
    /// The stored connection shape does not match the step type's arity.
    ShapeMismatch { step_id: StepId, step_type: String },
}

impl GraphError {
    pub(crate) fn invalid_branch(step_id: StepId, branch: Option<&BranchLabel>) -> Self {
        Self::InvalidBranch {
            step_id,
            branch: branch.map_or_else(|| "<none>".to_string(), ToString::to_string),
        }
    }
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownStep { step_id } => write!(f, "step not found: {step_id}"),
            Self::UnknownTarget { from, target } => {
                write!(f, "step {from} connects to unknown step {target}")
            }
            Self::InvalidBranch { step_id, branch } => {
                write!(f, "branch '{branch}' is not valid for step {step_id}")
            }
            Self::DuplicateTrigger { existing } => {
                write!(f, "workflow already has a trigger step ({existing})")
            }
            Self::DuplicateStep { step_id } => write!(f, "step {step_id} already exists"),
            Self::SelfLoop { step_id } => write!(f, "step {step_id} cannot connect to itself"),
            Self::ShapeMismatch { step_id, step_type } => {
                write!(
                    f,
                    "connections of step {step_id} do not match the branch arity of '{step_type}'"
                )
            }
        }
    }
}

impl std::error::Error for GraphError {}

/// Errors while executing a single step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    /// The step to execute does not exist.
    StepNotFound { step_id: StepId },
    /// The step-execution collaborator reported a failure.
    StepFailed { step_id: StepId, reason: String },
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StepNotFound { step_id } => write!(f, "step not found: {step_id}"),
            Self::StepFailed { step_id, reason } => {
                write!(f, "step {step_id} failed: {reason}")
            }
        }
    }
}

impl std::error::Error for ExecutionError {}

/// A failure reported by a [`StepExecutor`](crate::executor::StepExecutor).
///
/// Opaque to the engine: the message is passed through unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepExecutionError {
    pub message: String,
}

impl StepExecutionError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for StepExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for StepExecutionError {}

/// Errors when setting a user variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariableError {
    /// Names must be identifiers: a letter or `_`, then letters, digits or `_`.
    InvalidName { name: String },
    /// The value does not match the declared type.
    InvalidValue {
        name: String,
        expected: VariableType,
        details: String,
    },
}

impl fmt::Display for VariableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidName { name } => write!(f, "invalid variable name '{name}'"),
            Self::InvalidValue {
                name,
                expected,
                details,
            } => write!(f, "variable '{name}' must be a {expected}: {details}"),
        }
    }
}

impl std::error::Error for VariableError {}

/// Errors when saving or loading a workflow document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    /// The workflow could not be encoded.
    Serialize { details: String },
    /// The document is not a valid workflow.
    Deserialize { details: String },
    /// Reading or writing the document failed.
    Io { path: String, details: String },
    /// The document decoded but violates a graph invariant.
    Integrity { violation: GraphError },
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serialize { details } => write!(f, "failed to encode workflow: {details}"),
            Self::Deserialize { details } => write!(f, "failed to decode workflow: {details}"),
            Self::Io { path, details } => write!(f, "workflow file '{path}': {details}"),
            Self::Integrity { violation } => {
                write!(f, "workflow document is inconsistent: {violation}")
            }
        }
    }
}

impl std::error::Error for PersistenceError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_error_display() {
        let step_id = StepId::new();
        let err = GraphError::UnknownStep { step_id };
        assert!(err.to_string().contains("step not found"));
    }

    #[test]
    fn invalid_branch_names_the_label() {
        let step_id = StepId::new();
        let err = GraphError::invalid_branch(step_id, Some(&BranchLabel::True));
        assert!(err.to_string().contains("branch 'true'"));

        let err = GraphError::invalid_branch(step_id, None);
        assert!(err.to_string().contains("<none>"));
    }

    #[test]
    fn execution_error_display() {
        let step_id = StepId::new();
        let err = ExecutionError::StepFailed {
            step_id,
            reason: "gateway timeout".to_string(),
        };
        assert!(err.to_string().contains("failed"));
        assert!(err.to_string().contains("gateway timeout"));
    }

    #[test]
    fn persistence_error_wraps_violation() {
        let step_id = StepId::new();
        let err = PersistenceError::Integrity {
            violation: GraphError::SelfLoop { step_id },
        };
        assert!(err.to_string().contains("cannot connect to itself"));
    }
}
