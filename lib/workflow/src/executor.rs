//! The step-execution seam.
//!
//! The engine never performs a step's side effects itself. It hands the step
//! and its assembled context to a [`StepExecutor`] supplied by the host and
//! records whatever comes back.

use crate::context::ExecutionContext;
use crate::contract::SemanticType;
use crate::error::StepExecutionError;
use crate::history::StepStatus;
use crate::step::Step;
use async_trait::async_trait;
use chatflow_core::StepId;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// What an executor returns for a successful step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutput {
    /// Recorded verbatim as the step's output.
    pub data: JsonValue,
    /// Optional human-readable note.
    pub message: Option<String>,
    /// `Success` or `Warning`.
    pub status: StepStatus,
}

impl StepOutput {
    #[must_use]
    pub fn new(data: JsonValue) -> Self {
        Self {
            data,
            message: None,
            status: StepStatus::Success,
        }
    }

    /// A result that succeeded with a caveat.
    #[must_use]
    pub fn warning(data: JsonValue, message: impl Into<String>) -> Self {
        Self {
            data,
            message: Some(message.into()),
            status: StepStatus::Warning,
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Runs one step.
///
/// Implementations own timeouts and cancellation around their I/O.
#[async_trait]
pub trait StepExecutor: Send + Sync {
    /// Executes `step` with `context`.
    ///
    /// # Errors
    ///
    /// Returns an error if the step's side effect failed.
    async fn execute(
        &self,
        step: &Step,
        context: &ExecutionContext,
    ) -> Result<StepOutput, StepExecutionError>;
}

/// Builds a placeholder output from a step's contract: one value per output
/// field, typed after its semantic type.
#[must_use]
pub fn sample_output(step: &Step) -> JsonValue {
    let fields = step
        .outputs()
        .into_iter()
        .map(|field| {
            let value = match field.semantic_type {
                SemanticType::Text => JsonValue::from(format!("sample {}", field.key)),
                SemanticType::Number => JsonValue::from(0),
                SemanticType::Boolean => JsonValue::from(true),
                SemanticType::Object => JsonValue::Object(serde_json::Map::new()),
                SemanticType::Array => JsonValue::Array(Vec::new()),
                SemanticType::Any => JsonValue::Null,
            };
            (field.key, value)
        })
        .collect();
    JsonValue::Object(fields)
}

/// Test executor: returns fixed outputs per step and logs every call.
///
/// Steps without a fixed output get [`sample_output`].
#[derive(Debug, Default)]
pub struct MockExecutor {
    outputs: HashMap<StepId, Result<JsonValue, String>>,
    calls: Mutex<Vec<(StepId, ExecutionContext)>>,
}

impl MockExecutor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `step_id` return `output`.
    #[must_use]
    pub fn with_output(mut self, step_id: StepId, output: JsonValue) -> Self {
        self.outputs.insert(step_id, Ok(output));
        self
    }

    /// Makes `step_id` fail with `message`.
    #[must_use]
    pub fn failing(mut self, step_id: StepId, message: impl Into<String>) -> Self {
        self.outputs.insert(step_id, Err(message.into()));
        self
    }

    /// Returns every call made so far, in order.
    pub async fn calls(&self) -> Vec<(StepId, ExecutionContext)> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl StepExecutor for MockExecutor {
    async fn execute(
        &self,
        step: &Step,
        context: &ExecutionContext,
    ) -> Result<StepOutput, StepExecutionError> {
        self.calls.lock().await.push((step.id, context.clone()));
        match self.outputs.get(&step.id) {
            Some(Ok(output)) => Ok(StepOutput::new(output.clone())),
            Some(Err(message)) => Err(StepExecutionError::new(message.clone())),
            None => Ok(StepOutput::new(sample_output(step))),
        }
    }
}

/// One scripted reply.
///
/// `{"error": "..."}` scripts a failure; any other value is the output.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ScriptedReply {
    Failure { error: String },
    Output(JsonValue),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ScriptEntry {
    Sequence(Vec<ScriptedReply>),
    Single(ScriptedReply),
}

/// Executor driven by a script of replies per step.
///
/// Keys are step IDs (with or without the `step_` prefix) or step names. A
/// step's replies are used in order and the last one repeats. Unscripted
/// steps get [`sample_output`].
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    script: HashMap<String, Vec<ScriptedReply>>,
    cursors: Mutex<HashMap<String, usize>>,
}

impl ScriptedExecutor {
    /// Parses a script from a JSON object.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not an object of replies.
    pub fn from_json(script: JsonValue) -> Result<Self, serde_json::Error> {
        let entries: HashMap<String, ScriptEntry> = serde_json::from_value(script)?;
        let script = entries
            .into_iter()
            .map(|(key, entry)| {
                let replies = match entry {
                    ScriptEntry::Sequence(replies) => replies,
                    ScriptEntry::Single(reply) => vec![reply],
                };
                (key, replies)
            })
            .collect();
        Ok(Self {
            script,
            cursors: Mutex::new(HashMap::new()),
        })
    }

    fn key_for(&self, step: &Step) -> Option<String> {
        [
            step.id.to_string(),
            step.id.as_ulid().to_string(),
            step.name.clone(),
        ]
        .into_iter()
        .find(|key| self.script.contains_key(key))
    }
}

#[async_trait]
impl StepExecutor for ScriptedExecutor {
    async fn execute(
        &self,
        step: &Step,
        _context: &ExecutionContext,
    ) -> Result<StepOutput, StepExecutionError> {
        let Some(key) = self.key_for(step) else {
            return Ok(StepOutput::new(sample_output(step)));
        };
        let replies = &self.script[&key];

        let mut cursors = self.cursors.lock().await;
        let cursor = cursors.entry(key).or_insert(0);
        let reply = replies
            .get(*cursor)
            .or_else(|| replies.last())
            .cloned();
        *cursor += 1;

        match reply {
            Some(ScriptedReply::Output(data)) => Ok(StepOutput::new(data)),
            Some(ScriptedReply::Failure { error }) => Err(StepExecutionError::new(error)),
            None => Ok(StepOutput::new(sample_output(step))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContextConfig;
    use crate::step::StepKind;
    use crate::workflow::Workflow;
    use serde_json::json;

    fn context_for(step: &Step) -> ExecutionContext {
        ExecutionContext::base(&Workflow::new("Test"), step.id, &ContextConfig::default())
    }

    #[test]
    fn sample_output_follows_contract() {
        let step = Step::new(StepKind::HttpRequest, "Call API");
        assert_eq!(
            sample_output(&step),
            json!({"apiResponse": {}, "status_code": 0})
        );
    }

    #[tokio::test]
    async fn mock_executor_replays_and_logs() {
        let ok = Step::new(StepKind::SendText, "Reply");
        let bad = Step::new(StepKind::Checkout, "Pay");
        let executor = MockExecutor::new()
            .with_output(ok.id, json!({"message_id": "wamid.1"}))
            .failing(bad.id, "payment gateway down");

        let output = executor.execute(&ok, &context_for(&ok)).await.unwrap();
        assert_eq!(output.data, json!({"message_id": "wamid.1"}));
        assert_eq!(output.status, StepStatus::Success);

        let err = executor.execute(&bad, &context_for(&bad)).await.unwrap_err();
        assert_eq!(err.message, "payment gateway down");

        let calls = executor.calls().await;
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, ok.id);
    }

    #[tokio::test]
    async fn scripted_executor_walks_sequence() {
        let step = Step::new(StepKind::Condition, "Angry?");
        let other = Step::new(StepKind::Sentiment, "Mood");
        let executor = ScriptedExecutor::from_json(json!({
            "Angry?": [{"conditionPassed": true}, {"conditionPassed": false}],
            (other.id.to_string()): {"error": "model overloaded"}
        }))
        .unwrap();

        let ctx = context_for(&step);
        let first = executor.execute(&step, &ctx).await.unwrap();
        let second = executor.execute(&step, &ctx).await.unwrap();
        let third = executor.execute(&step, &ctx).await.unwrap();
        assert_eq!(first.data, json!({"conditionPassed": true}));
        assert_eq!(second.data, json!({"conditionPassed": false}));
        assert_eq!(third.data, json!({"conditionPassed": false}));

        let err = executor
            .execute(&other, &context_for(&other))
            .await
            .unwrap_err();
        assert_eq!(err.message, "model overloaded");
    }

    #[tokio::test]
    async fn unscripted_steps_get_samples() {
        let executor = ScriptedExecutor::from_json(json!({})).unwrap();
        let step = Step::new(StepKind::AddToCart, "Add");
        let output = executor.execute(&step, &context_for(&step)).await.unwrap();
        assert_eq!(output.data, json!({"cart": [], "cart_total": 0}));
    }

    #[test]
    fn script_must_be_an_object() {
        assert!(ScriptedExecutor::from_json(json!([1, 2])).is_err());
    }
}
