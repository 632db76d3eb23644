//! Workflow engine for chatflow messaging automations.
//!
//! A workflow is an ordered list of typed steps wired into a directed graph.
//! This crate provides:
//!
//! - **Graph model**: steps, branch-shaped connections, validated edits
//! - **Step contracts**: branch arity, readiness and declared outputs per type
//! - **Predecessor resolution**: ancestors and the nearest recorded output
//! - **Branch selection**: which step runs after a step's outcome
//! - **Expressions**: `{{path}}` placeholders resolved against run history
//! - **Execution**: context assembly, the [`StepExecutor`] seam, sessions and
//!   a simulator for whole runs
//! - **Persistence**: JSON documents with integrity checks

pub mod available;
pub mod branch;
pub mod config;
pub mod connection;
pub mod context;
pub mod contract;
pub mod error;
pub mod executor;
pub mod expression;
pub mod graph;
pub mod history;
mod persist;
pub mod resolver;
pub mod session;
pub mod simulator;
pub mod step;
pub mod variables;
pub mod workflow;

pub use available::{AvailableVariable, VariableSource, available_variables};
pub use branch::{BranchOutcome, select_next};
pub use config::{ContextConfig, EngineConfig, SimulationConfig};
pub use connection::{BranchLabel, Connections, PlainTarget};
pub use context::{ContextAssembler, ExecutionContext};
pub use contract::{BranchArity, OutputField, SemanticType, StepContract};
pub use error::{ExecutionError, GraphError, PersistenceError, StepExecutionError, VariableError};
pub use executor::{MockExecutor, ScriptedExecutor, StepExecutor, StepOutput};
pub use expression::ExpressionResolver;
pub use graph::StepGraph;
pub use history::{RunHistory, StepRecord, StepStatus};
pub use session::{SharedSession, WorkflowSession};
pub use simulator::{SimulationTrace, Simulator, StopReason, TraceEntry};
pub use step::{Step, StepCategory, StepConfig, StepKind};
pub use variables::{Variable, VariableType, WorkflowVariables};
pub use workflow::{ValidationIssue, ValidationReport, Workflow, WorkflowMetadata};
