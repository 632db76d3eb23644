//! Execution context assembly.
//!
//! The context handed to a step is built fresh for every execution request:
//! 1. Workflow-level defaults (user variables, an empty cart)
//! 2. The closest predecessor with a recorded output: its recorded context is
//!    merged in and its output becomes `previous.output`
//! 3. The trigger's contact, message and sender, filling only gaps
//!
//! Only one predecessor output is used, even when a step has several
//! incoming edges with recorded outputs.

use crate::config::ContextConfig;
use crate::error::ExecutionError;
use crate::history::RunHistory;
use crate::resolver::nearest_output_in;
use crate::workflow::Workflow;
use chatflow_core::{StepId, WorkflowId};
use rootcause::Report;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::debug;

/// Output of the predecessor a context was assembled from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviousOutput {
    pub step_id: StepId,
    pub output: JsonValue,
}

/// Shopping cart carried through a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    #[serde(default)]
    pub items: Vec<JsonValue>,
    #[serde(default)]
    pub total: f64,
    pub currency: String,
}

impl Cart {
    #[must_use]
    pub fn empty(currency: impl Into<String>) -> Self {
        Self {
            items: Vec::new(),
            total: 0.0,
            currency: currency.into(),
        }
    }
}

/// The input passed to the step-execution collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionContext {
    pub workflow_id: WorkflowId,
    pub workflow_name: String,
    /// The step this context was assembled for.
    pub step_id: StepId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<PreviousOutput>,
    #[serde(default)]
    pub variables: serde_json::Map<String, JsonValue>,
    pub cart: Cart,
    /// Other fields carried over from a predecessor's context.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, JsonValue>,
}

impl ExecutionContext {
    /// Returns the base context for a step: workflow variables and an empty
    /// cart.
    #[must_use]
    pub fn base(workflow: &Workflow, step_id: StepId, config: &ContextConfig) -> Self {
        Self {
            workflow_id: workflow.id,
            workflow_name: workflow.name().to_string(),
            step_id,
            message: None,
            sender: None,
            contact: None,
            previous: None,
            variables: workflow.variables().values(),
            cart: Cart::empty(config.currency.clone()),
            extra: serde_json::Map::new(),
        }
    }

    /// Merges a context recorded by an earlier step.
    ///
    /// Identity fields and `previous` are never taken over. Variables are
    /// merged key by key; everything else replaces.
    pub fn merge_recorded(&mut self, recorded: &JsonValue) {
        let JsonValue::Object(fields) = recorded else {
            return;
        };
        for (key, value) in fields {
            match key.as_str() {
                "workflowId" | "workflowName" | "stepId" | "previous" => {}
                "variables" => {
                    if let JsonValue::Object(vars) = value {
                        self.variables
                            .extend(vars.iter().map(|(k, v)| (k.clone(), v.clone())));
                    }
                }
                "cart" => {
                    if let Ok(cart) = serde_json::from_value(value.clone()) {
                        self.cart = cart;
                    }
                }
                "message" => self.message = Some(value.clone()),
                "sender" => self.sender = Some(value.clone()),
                "contact" => self.contact = Some(value.clone()),
                _ => {
                    self.extra.insert(key.clone(), value.clone());
                }
            }
        }
    }

    /// Copies trigger fields into slots that are still empty.
    pub fn fill_from_trigger(&mut self, trigger_output: &JsonValue) {
        for (slot, key) in [
            (&mut self.contact, "contact"),
            (&mut self.message, "message"),
            (&mut self.sender, "sender"),
        ] {
            let empty = slot.as_ref().is_none_or(JsonValue::is_null);
            if let Some(value) = trigger_output.get(key).filter(|_| empty) {
                *slot = Some(value.clone());
            }
        }
    }

    /// Returns the context as JSON.
    ///
    /// # Errors
    ///
    /// Returns the serializer's error if the context cannot be represented
    /// as a JSON value.
    pub fn to_json(&self) -> Result<JsonValue, serde_json::Error> {
        serde_json::to_value(self)
    }
}

/// Builds execution contexts for single-step execution.
#[derive(Debug, Clone, Default)]
pub struct ContextAssembler {
    config: ContextConfig,
}

impl ContextAssembler {
    #[must_use]
    pub fn new(config: ContextConfig) -> Self {
        Self { config }
    }

    /// Assembles the context for `step_id` from the recorded history.
    ///
    /// # Errors
    ///
    /// Returns `StepNotFound` if the step does not exist.
    pub fn assemble(
        &self,
        workflow: &Workflow,
        history: &RunHistory,
        step_id: StepId,
    ) -> Result<ExecutionContext, Report<ExecutionError>> {
        self.assemble_after(workflow, history, step_id, None)
    }

    /// Like [`assemble`](Self::assemble), but `arrived_from` names the step
    /// the run actually came from. Its output is preferred over the graph's
    /// ancestors, which matters for steps reached through the sequential
    /// fallback.
    ///
    /// # Errors
    ///
    /// Returns `StepNotFound` if the step does not exist.
    pub fn assemble_after(
        &self,
        workflow: &Workflow,
        history: &RunHistory,
        step_id: StepId,
        arrived_from: Option<StepId>,
    ) -> Result<ExecutionContext, Report<ExecutionError>> {
        if !workflow.contains(step_id) {
            return Err(ExecutionError::StepNotFound { step_id }.into());
        }

        let mut context = ExecutionContext::base(workflow, step_id, &self.config);

        let predecessor = arrived_from
            .and_then(|from| history.output(from).map(|output| (from, output)))
            .or_else(|| nearest_output_in(&workflow.graph(), history, step_id));

        if let Some((source, output)) = predecessor {
            if let Some(recorded) = history.input(source) {
                context.merge_recorded(recorded);
            }
            context.previous = Some(PreviousOutput {
                step_id: source,
                output: output.clone(),
            });
        }

        if let Some(trigger_output) = workflow
            .trigger()
            .and_then(|trigger| history.output(trigger.id))
        {
            context.fill_from_trigger(trigger_output);
        }

        debug!(
            step_id = %step_id,
            previous = ?context.previous.as_ref().map(|p| p.step_id),
            "assembled execution context"
        );
        Ok(context)
    }
}
