//! Workflow sessions: a workflow, its run history, and step execution.
//!
//! [`WorkflowSession`] takes `&mut self` for anything that records a result,
//! so one session never runs two executions at once. [`SharedSession`] is the
//! handle a host keeps per workflow; its mutex serializes executions.

use crate::available::{AvailableVariable, available_variables};
use crate::config::EngineConfig;
use crate::context::{ContextAssembler, ExecutionContext};
use crate::error::{ExecutionError, GraphError};
use crate::executor::{StepExecutor, StepOutput};
use crate::expression::ExpressionResolver;
use crate::history::{RunHistory, StepRecord, StepStatus};
use crate::step::Step;
use crate::workflow::Workflow;
use chatflow_core::StepId;
use chrono::Utc;
use rootcause::Report;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{info, instrument, warn};

/// A workflow together with its recorded results.
#[derive(Debug, Clone)]
pub struct WorkflowSession {
    workflow: Workflow,
    history: RunHistory,
    assembler: ContextAssembler,
}

impl WorkflowSession {
    /// Creates a session with default configuration.
    #[must_use]
    pub fn new(workflow: Workflow) -> Self {
        Self::with_config(workflow, &EngineConfig::default())
    }

    #[must_use]
    pub fn with_config(workflow: Workflow, config: &EngineConfig) -> Self {
        Self {
            workflow,
            history: RunHistory::new(),
            assembler: ContextAssembler::new(config.context.clone()),
        }
    }

    #[must_use]
    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    /// Mutable access for graph edits.
    ///
    /// Use [`delete_step`](Self::delete_step) to delete, so the deleted
    /// step's record goes too.
    pub fn workflow_mut(&mut self) -> &mut Workflow {
        &mut self.workflow
    }

    #[must_use]
    pub fn history(&self) -> &RunHistory {
        &self.history
    }

    /// Deletes a step and forgets its latest record.
    ///
    /// # Errors
    ///
    /// Returns `UnknownStep` if the step does not exist.
    pub fn delete_step(&mut self, step_id: StepId) -> Result<Step, Report<GraphError>> {
        let removed = self.workflow.delete_step(step_id)?;
        self.history.forget(step_id);
        Ok(removed)
    }

    /// Records a result reported by the host's runtime.
    pub fn record_result(&mut self, step_id: StepId, output: Option<JsonValue>, status: StepStatus) {
        self.history.record_result(step_id, output, status);
    }

    /// Clears all recorded results.
    pub fn reset_history(&mut self) {
        self.history.clear();
    }

    /// Assembles the context `step_id` would run with now.
    ///
    /// # Errors
    ///
    /// Returns `StepNotFound` if the step does not exist.
    pub fn assemble_context(
        &self,
        step_id: StepId,
    ) -> Result<ExecutionContext, Report<ExecutionError>> {
        self.assembler.assemble(&self.workflow, &self.history, step_id)
    }

    /// Resolves a template as seen from `step_id`.
    #[must_use]
    pub fn resolve(&self, template: &str, step_id: StepId) -> String {
        ExpressionResolver::new(&self.workflow, &self.history).resolve(template, step_id)
    }

    /// Lists the variables a user may reference at `step_id`.
    #[must_use]
    pub fn available_variables(&self, step_id: StepId) -> Vec<AvailableVariable> {
        available_variables(&self.workflow, step_id)
    }

    /// Runs one step now and records its output.
    ///
    /// On failure nothing is recorded and the previous output, if any, stays
    /// in place.
    ///
    /// # Errors
    ///
    /// - `StepNotFound` if the step does not exist
    /// - `StepFailed` if the executor fails
    pub async fn execute_step(
        &mut self,
        step_id: StepId,
        executor: &dyn StepExecutor,
    ) -> Result<StepOutput, Report<ExecutionError>> {
        self.execute_step_after(step_id, None, executor).await
    }

    /// Like [`execute_step`](Self::execute_step), naming the step the run
    /// came from.
    ///
    /// # Errors
    ///
    /// - `StepNotFound` if the step does not exist
    /// - `StepFailed` if the executor fails
    #[instrument(skip(self, executor), fields(workflow_id = %self.workflow.id, step_id = %step_id))]
    pub async fn execute_step_after(
        &mut self,
        step_id: StepId,
        arrived_from: Option<StepId>,
        executor: &dyn StepExecutor,
    ) -> Result<StepOutput, Report<ExecutionError>> {
        let context =
            self.assembler
                .assemble_after(&self.workflow, &self.history, step_id, arrived_from)?;
        let step = self
            .workflow
            .step(step_id)
            .cloned()
            .ok_or(ExecutionError::StepNotFound { step_id })?;

        let output = match executor.execute(&step, &context).await {
            Ok(output) => output,
            Err(e) => {
                warn!(step_type = %step.kind, error = %e, "step failed");
                return Err(ExecutionError::StepFailed {
                    step_id,
                    reason: e.to_string(),
                }
                .into());
            }
        };

        let input = context
            .to_json()
            .inspect_err(|e| warn!(error = %e, "step input not recorded"))
            .ok();
        self.history.record(StepRecord {
            step_id,
            input,
            output: Some(output.data.clone()),
            status: output.status,
            message: output.message.clone(),
            recorded_at: Utc::now(),
        });
        info!(step_type = %step.kind, status = %output.status, "step executed");
        Ok(output)
    }
}

/// A session shared between tasks.
#[derive(Debug, Clone)]
pub struct SharedSession {
    inner: Arc<Mutex<WorkflowSession>>,
}

impl SharedSession {
    #[must_use]
    pub fn new(session: WorkflowSession) -> Self {
        Self {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    /// Locks the session for a sequence of operations.
    pub async fn lock(&self) -> MutexGuard<'_, WorkflowSession> {
        self.inner.lock().await
    }

    /// Runs one step, waiting for any execution already in progress.
    ///
    /// # Errors
    ///
    /// See [`WorkflowSession::execute_step`].
    pub async fn execute_step(
        &self,
        step_id: StepId,
        executor: &dyn StepExecutor,
    ) -> Result<StepOutput, Report<ExecutionError>> {
        self.inner.lock().await.execute_step(step_id, executor).await
    }

    /// Copies the workflow and history out from under the lock.
    pub async fn snapshot(&self) -> (Workflow, RunHistory) {
        let session = self.inner.lock().await;
        (session.workflow.clone(), session.history.clone())
    }

    /// Resolves a template against a snapshot.
    pub async fn resolve(&self, template: &str, step_id: StepId) -> String {
        let (workflow, history) = self.snapshot().await;
        ExpressionResolver::new(&workflow, &history).resolve(template, step_id)
    }

    /// Assembles a context against a snapshot.
    ///
    /// # Errors
    ///
    /// Returns `StepNotFound` if the step does not exist.
    pub async fn assemble_context(
        &self,
        step_id: StepId,
    ) -> Result<ExecutionContext, Report<ExecutionError>> {
        self.inner.lock().await.assemble_context(step_id)
    }
}
