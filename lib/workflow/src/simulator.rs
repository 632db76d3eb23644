//! Simulated runs: one inbound message walked through a whole workflow.
//!
//! The trigger's output is the inbound message itself. Every later step goes
//! through the session's [`StepExecutor`], and the branch selector picks what
//! runs next until the path ends.

use crate::branch::{BranchOutcome, select_next};
use crate::config::SimulationConfig;
use crate::contract::string_list;
use crate::error::ExecutionError;
use crate::executor::StepExecutor;
use crate::history::StepStatus;
use crate::session::WorkflowSession;
use crate::step::{Step, StepKind};
use chatflow_core::{RunId, StepId};
use rootcause::Report;
use serde::Serialize;
use serde_json::{Value as JsonValue, json};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument};

/// Why a simulated run stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum StopReason {
    /// A plain step had no next step, or an `end_flow` step ran.
    Completed,
    /// A branching step had no edge for its outcome.
    BranchUnwired { step_id: StepId },
    /// The run hit `max_steps`.
    StepLimit,
    /// A step's executor failed.
    Failed { step_id: StepId, reason: String },
    /// A keyword trigger found none of its keywords.
    KeywordNotMatched,
    /// The workflow has no trigger.
    NoTrigger,
}

/// One executed step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceEntry {
    pub step_id: StepId,
    pub step_type: StepKind,
    pub name: String,
    pub status: StepStatus,
    pub output: Option<JsonValue>,
    pub duration: Duration,
}

/// The steps a run executed, in order, and why it stopped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationTrace {
    pub run_id: RunId,
    pub entries: Vec<TraceEntry>,
    pub stop: StopReason,
}

impl SimulationTrace {
    /// Names of the executed steps, in order.
    #[must_use]
    pub fn path(&self) -> Vec<&str> {
        self.entries.iter().map(|entry| entry.name.as_str()).collect()
    }
}

/// Runs workflows end to end.
#[derive(Debug, Clone, Default)]
pub struct Simulator {
    config: SimulationConfig,
}

impl Simulator {
    #[must_use]
    pub fn new(config: SimulationConfig) -> Self {
        Self { config }
    }

    /// Walks `inbound` through the session's workflow from its trigger.
    ///
    /// Clears the session's history first. A step failure ends the run with
    /// [`StopReason::Failed`] and is not an error here.
    ///
    /// # Errors
    ///
    /// Returns `StepNotFound` if a connection points at a missing step.
    #[instrument(skip_all, fields(workflow_id = %session.workflow().id))]
    pub async fn run(
        &self,
        session: &mut WorkflowSession,
        executor: &dyn StepExecutor,
        inbound: JsonValue,
    ) -> Result<SimulationTrace, Report<ExecutionError>> {
        let run_id = RunId::new();
        session.reset_history();

        let Some(trigger) = session.workflow().trigger().cloned() else {
            info!(%run_id, "workflow has no trigger");
            return Ok(SimulationTrace {
                run_id,
                entries: Vec::new(),
                stop: StopReason::NoTrigger,
            });
        };

        let started = Instant::now();
        let seeded = trigger_output(&trigger, inbound);
        session.record_result(trigger.id, Some(seeded.clone()), StepStatus::Success);

        let mut entries = vec![TraceEntry {
            step_id: trigger.id,
            step_type: trigger.kind.clone(),
            name: trigger.name.clone(),
            status: StepStatus::Success,
            output: Some(seeded.clone()),
            duration: started.elapsed(),
        }];

        let stop = if seeded.get("matched") == Some(&JsonValue::Bool(false)) {
            StopReason::KeywordNotMatched
        } else {
            self.walk(session, executor, &trigger, &seeded, &mut entries)
                .await?
        };

        info!(%run_id, steps = entries.len(), stop = ?stop, "simulation finished");
        Ok(SimulationTrace {
            run_id,
            entries,
            stop,
        })
    }

    async fn walk(
        &self,
        session: &mut WorkflowSession,
        executor: &dyn StepExecutor,
        trigger: &Step,
        trigger_output: &JsonValue,
        entries: &mut Vec<TraceEntry>,
    ) -> Result<StopReason, Report<ExecutionError>> {
        let mut loop_counters: HashMap<StepId, u64> = HashMap::new();
        let mut current = trigger.clone();
        let mut output = trigger_output.clone();

        loop {
            let outcome = self.outcome(&current, &output, &mut loop_counters);
            let Some(next_id) = select_next(session.workflow(), current.id, &outcome) else {
                return Ok(match outcome {
                    BranchOutcome::Continue => StopReason::Completed,
                    _ => StopReason::BranchUnwired {
                        step_id: current.id,
                    },
                });
            };
            if entries.len() >= self.config.max_steps {
                return Ok(StopReason::StepLimit);
            }

            let next = session
                .workflow()
                .step(next_id)
                .cloned()
                .ok_or(ExecutionError::StepNotFound { step_id: next_id })?;
            debug!(from = %current.id, to = %next.id, outcome = ?outcome, "following edge");

            let started = Instant::now();
            let result = session
                .execute_step_after(next.id, Some(current.id), executor)
                .await;

            match result {
                Ok(step_output) => {
                    entries.push(TraceEntry {
                        step_id: next.id,
                        step_type: next.kind.clone(),
                        name: next.name.clone(),
                        status: step_output.status,
                        output: Some(step_output.data.clone()),
                        duration: started.elapsed(),
                    });
                    output = step_output.data;
                }
                Err(report) => {
                    entries.push(TraceEntry {
                        step_id: next.id,
                        step_type: next.kind.clone(),
                        name: next.name.clone(),
                        status: StepStatus::Error,
                        output: None,
                        duration: started.elapsed(),
                    });
                    return match report.current_context() {
                        ExecutionError::StepFailed { step_id, reason } => Ok(StopReason::Failed {
                            step_id: *step_id,
                            reason: reason.clone(),
                        }),
                        ExecutionError::StepNotFound { .. } => Err(report),
                    };
                }
            }

            if next.kind == StepKind::EndFlow {
                return Ok(StopReason::Completed);
            }
            current = next;
        }
    }

    /// Loop steps are counted here rather than trusted to report their own
    /// index: `true` until the counter reaches `loopCount`, then `false` and
    /// the counter starts over. A missing or zero `loopCount` uses
    /// `default_loop_iterations`.
    fn outcome(
        &self,
        step: &Step,
        output: &JsonValue,
        loop_counters: &mut HashMap<StepId, u64>,
    ) -> BranchOutcome {
        if step.kind != StepKind::Loop {
            return BranchOutcome::from_output(step, output);
        }
        let limit = output
            .get("loopCount")
            .and_then(JsonValue::as_u64)
            .filter(|count| *count > 0)
            .unwrap_or(self.config.default_loop_iterations);
        let counter = loop_counters.entry(step.id).or_insert(0);
        if *counter < limit {
            *counter += 1;
            BranchOutcome::Boolean(true)
        } else {
            loop_counters.remove(&step.id);
            BranchOutcome::Boolean(false)
        }
    }
}

/// Builds the trigger's output from the inbound message.
///
/// A bare string becomes `message.text`. Keyword triggers also get `matched`
/// and `matched_keyword`.
fn trigger_output(trigger: &Step, inbound: JsonValue) -> JsonValue {
    let mut output = match inbound {
        JsonValue::String(text) => json!({"message": {"text": text}}),
        JsonValue::Object(_) => inbound,
        other => json!({"message": other}),
    };

    if trigger.kind == StepKind::KeywordTrigger {
        let text = output
            .pointer("/message/text")
            .and_then(JsonValue::as_str)
            .unwrap_or_default()
            .to_lowercase();
        let matched = configured_keywords(trigger)
            .into_iter()
            .find(|keyword| text.contains(keyword.as_str()));
        if let JsonValue::Object(fields) = &mut output {
            fields.insert("matched".to_string(), JsonValue::Bool(matched.is_some()));
            fields.insert(
                "matched_keyword".to_string(),
                matched.map_or(JsonValue::Null, JsonValue::from),
            );
        }
    }
    output
}

/// Keywords configured as a list or as comma-separated text, lowercased.
fn configured_keywords(trigger: &Step) -> Vec<String> {
    string_list(&trigger.config, "keywords")
        .into_iter()
        .map(|keyword| keyword.to_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::BranchLabel;
    use crate::executor::{MockExecutor, ScriptedExecutor};
    use crate::workflow::Workflow;

    fn support_workflow() -> (Workflow, [StepId; 4]) {
        let mut workflow = Workflow::new("Support");
        let trigger = workflow
            .add_step(StepKind::MessageReceived, "Message")
            .unwrap();
        let check = workflow.add_step(StepKind::Condition, "Angry?").unwrap();
        let calm = workflow.add_step(StepKind::SendText, "Calm down").unwrap();
        let thanks = workflow.add_step(StepKind::SendText, "Thanks").unwrap();
        workflow.connect(trigger, check, None).unwrap();
        workflow
            .connect(check, calm, Some(BranchLabel::True))
            .unwrap();
        workflow
            .connect(check, thanks, Some(BranchLabel::False))
            .unwrap();
        workflow.disconnect(calm, None).unwrap();
        (workflow, [trigger, check, calm, thanks])
    }

    #[tokio::test]
    async fn follows_condition_branch() {
        let (workflow, [_, check, calm, _]) = support_workflow();
        let mut session = WorkflowSession::new(workflow);
        let executor = MockExecutor::new().with_output(check, json!({"conditionPassed": true}));

        let trace = Simulator::default()
            .run(&mut session, &executor, json!({"contact": {"name": "Ama"}}))
            .await
            .unwrap();

        assert_eq!(trace.path(), vec!["Message", "Angry?", "Calm down"]);
        assert_eq!(trace.stop, StopReason::Completed);

        let calls = executor.calls().await;
        let (step_id, context) = calls.last().unwrap();
        assert_eq!(*step_id, calm);
        assert_eq!(context.contact, Some(json!({"name": "Ama"})));
        assert_eq!(context.previous.as_ref().unwrap().step_id, check);
    }

    #[tokio::test]
    async fn unwired_branch_stops() {
        let mut workflow = Workflow::new("Half wired");
        let trigger = workflow
            .add_step(StepKind::MessageReceived, "Message")
            .unwrap();
        let check = workflow.add_step(StepKind::Condition, "Check").unwrap();
        workflow.connect(trigger, check, None).unwrap();

        let mut session = WorkflowSession::new(workflow);
        let executor = MockExecutor::new().with_output(check, json!({"conditionPassed": false}));
        let trace = Simulator::default()
            .run(&mut session, &executor, json!("hi"))
            .await
            .unwrap();

        assert_eq!(trace.stop, StopReason::BranchUnwired { step_id: check });
        assert_eq!(trace.entries[0].output, Some(json!({"message": {"text": "hi"}})));
    }

    #[tokio::test]
    async fn failure_is_traced_without_output() {
        let (workflow, [_, check, _, _]) = support_workflow();
        let mut session = WorkflowSession::new(workflow);
        let executor = MockExecutor::new().failing(check, "model overloaded");

        let trace = Simulator::default()
            .run(&mut session, &executor, json!({}))
            .await
            .unwrap();

        let last = trace.entries.last().unwrap();
        assert_eq!(last.status, StepStatus::Error);
        assert!(last.output.is_none());
        assert_eq!(
            trace.stop,
            StopReason::Failed {
                step_id: check,
                reason: "model overloaded".to_string()
            }
        );
        assert!(session.history().latest(check).is_none());
    }

    #[tokio::test]
    async fn keyword_trigger_gates_the_run() {
        let mut workflow = Workflow::new("Keywords");
        let trigger = workflow
            .add_step(StepKind::KeywordTrigger, "Keyword")
            .unwrap();
        workflow
            .set_config_value(trigger, "keywords", json!(["prix", "catalogue"]))
            .unwrap();
        workflow.add_step(StepKind::ShowCatalog, "Catalog").unwrap();

        let mut session = WorkflowSession::new(workflow);
        let trace = Simulator::default()
            .run(&mut session, &MockExecutor::new(), json!({"message": {"text": "Bonjour"}}))
            .await
            .unwrap();
        assert_eq!(trace.stop, StopReason::KeywordNotMatched);
        assert_eq!(trace.entries.len(), 1);

        let trace = Simulator::default()
            .run(
                &mut session,
                &MockExecutor::new(),
                json!({"message": {"text": "Le PRIX svp"}}),
            )
            .await
            .unwrap();
        assert_eq!(trace.path(), vec!["Keyword", "Catalog"]);
        assert_eq!(trace.entries[0].output.as_ref().unwrap()["matched_keyword"], "prix");
    }

    #[tokio::test]
    async fn keywords_may_be_one_per_line() {
        let mut workflow = Workflow::new("Keywords");
        let trigger = workflow
            .add_step(StepKind::KeywordTrigger, "Keyword")
            .unwrap();
        workflow
            .set_config_value(trigger, "keywords", json!("prix\nPromo"))
            .unwrap();
        workflow.add_step(StepKind::ShowCatalog, "Catalog").unwrap();

        let mut session = WorkflowSession::new(workflow);
        let trace = Simulator::default()
            .run(&mut session, &MockExecutor::new(), json!("une promo ?"))
            .await
            .unwrap();
        assert_eq!(trace.path(), vec!["Keyword", "Catalog"]);
        assert_eq!(trace.entries[0].output.as_ref().unwrap()["matched_keyword"], "promo");
    }

    #[tokio::test]
    async fn legacy_keyword_tag_runs_as_keyword_trigger() {
        let mut workflow = Workflow::new("Keywords");
        let trigger = workflow
            .add_step(StepKind::from_tag("keyword"), "Keyword")
            .unwrap();
        workflow
            .set_config_value(trigger, "keywords", json!("prix"))
            .unwrap();
        workflow.add_step(StepKind::ShowCatalog, "Catalog").unwrap();

        let mut session = WorkflowSession::new(workflow);
        let trace = Simulator::default()
            .run(&mut session, &MockExecutor::new(), json!("bonjour"))
            .await
            .unwrap();
        assert_eq!(trace.stop, StopReason::KeywordNotMatched);
    }

    #[tokio::test]
    async fn failed_stop_keeps_kind_and_reason_apart() {
        let (workflow, [_, check, _, _]) = support_workflow();
        let mut session = WorkflowSession::new(workflow);
        let executor = MockExecutor::new().failing(check, "model overloaded");

        let trace = Simulator::default()
            .run(&mut session, &executor, json!({}))
            .await
            .unwrap();

        let value = serde_json::to_value(&trace).unwrap();
        assert_eq!(value["stop"]["kind"], "failed");
        assert_eq!(value["stop"]["reason"], "model overloaded");
        assert_eq!(value["stop"]["step_id"], check.to_string());

        let completed = serde_json::to_value(StopReason::Completed).unwrap();
        assert_eq!(completed, json!({"kind": "completed"}));
    }

    #[tokio::test]
    async fn loop_iterates_then_exits() {
        let mut workflow = Workflow::new("Reminders");
        let trigger = workflow
            .add_step(StepKind::MessageReceived, "Message")
            .unwrap();
        let repeat = workflow.add_step(StepKind::Loop, "Repeat").unwrap();
        let ping = workflow.add_step(StepKind::SendText, "Ping").unwrap();
        let done = workflow.add_step(StepKind::SendText, "Done").unwrap();
        workflow.connect(trigger, repeat, None).unwrap();
        workflow
            .connect(repeat, ping, Some(BranchLabel::True))
            .unwrap();
        workflow
            .connect(repeat, done, Some(BranchLabel::False))
            .unwrap();
        workflow.connect(ping, repeat, None).unwrap();

        let mut session = WorkflowSession::new(workflow);
        let executor = MockExecutor::new().with_output(repeat, json!({"loopCount": 2}));
        let trace = Simulator::default()
            .run(&mut session, &executor, json!({}))
            .await
            .unwrap();

        assert_eq!(
            trace.path(),
            vec!["Message", "Repeat", "Ping", "Repeat", "Ping", "Repeat", "Done"]
        );
        assert_eq!(trace.stop, StopReason::Completed);
    }

    #[tokio::test]
    async fn zero_loop_count_uses_default_iterations() {
        let mut workflow = Workflow::new("Reminders");
        let trigger = workflow
            .add_step(StepKind::MessageReceived, "Message")
            .unwrap();
        let repeat = workflow.add_step(StepKind::Loop, "Repeat").unwrap();
        let ping = workflow.add_step(StepKind::SendText, "Ping").unwrap();
        let done = workflow.add_step(StepKind::SendText, "Done").unwrap();
        workflow.connect(trigger, repeat, None).unwrap();
        workflow
            .connect(repeat, ping, Some(BranchLabel::True))
            .unwrap();
        workflow
            .connect(repeat, done, Some(BranchLabel::False))
            .unwrap();
        workflow.connect(ping, repeat, None).unwrap();

        let mut session = WorkflowSession::new(workflow);
        let executor = MockExecutor::new().with_output(repeat, json!({"loopCount": 0}));
        let trace = Simulator::default()
            .run(&mut session, &executor, json!({}))
            .await
            .unwrap();

        let pings = trace.path().iter().filter(|name| **name == "Ping").count();
        assert_eq!(pings, 3);
        assert_eq!(trace.path().last(), Some(&"Done"));
        assert_eq!(trace.stop, StopReason::Completed);
    }

    #[tokio::test]
    async fn step_limit_stops_runaway_cycles() {
        let mut workflow = Workflow::new("Ping pong");
        let trigger = workflow
            .add_step(StepKind::MessageReceived, "Message")
            .unwrap();
        let ping = workflow.add_step(StepKind::SendText, "Ping").unwrap();
        let pong = workflow.add_step(StepKind::SendText, "Pong").unwrap();
        workflow.connect(trigger, ping, None).unwrap();
        workflow.connect(ping, pong, None).unwrap();
        workflow.connect(pong, ping, None).unwrap();

        let mut session = WorkflowSession::new(workflow);
        let simulator = Simulator::new(SimulationConfig {
            max_steps: 5,
            ..SimulationConfig::default()
        });
        let trace = simulator
            .run(&mut session, &MockExecutor::new(), json!({}))
            .await
            .unwrap();

        assert_eq!(trace.entries.len(), 5);
        assert_eq!(trace.stop, StopReason::StepLimit);
    }

    #[tokio::test]
    async fn random_choice_and_router_with_script() {
        let mut workflow = Workflow::new("Routing");
        let trigger = workflow
            .add_step(StepKind::MessageReceived, "Message")
            .unwrap();
        let pick = workflow.add_step(StepKind::RandomChoice, "Pick").unwrap();
        let route = workflow.add_step(StepKind::SwitchRouter, "Route").unwrap();
        let vip = workflow.add_step(StepKind::SendText, "VIP").unwrap();
        let other = workflow.add_step(StepKind::SendText, "Other").unwrap();
        workflow.connect(trigger, pick, None).unwrap();
        workflow
            .connect(pick, route, Some(BranchLabel::True))
            .unwrap();
        workflow
            .connect(route, vip, Some(BranchLabel::case("vip")))
            .unwrap();
        workflow
            .connect(route, other, Some(BranchLabel::Default))
            .unwrap();
        workflow.disconnect(vip, None).unwrap();

        let executor = ScriptedExecutor::from_json(json!({
            "Pick": {"selectedIndex": 0},
            "Route": {"matchedCase": "vip"}
        }))
        .unwrap();
        let mut session = WorkflowSession::new(workflow);
        let trace = Simulator::default()
            .run(&mut session, &executor, json!({}))
            .await
            .unwrap();

        assert_eq!(trace.path(), vec!["Message", "Pick", "Route", "VIP"]);
    }

    #[tokio::test]
    async fn no_trigger_runs_nothing() {
        let mut workflow = Workflow::new("Headless");
        workflow.add_step(StepKind::SendText, "Reply").unwrap();
        let mut session = WorkflowSession::new(workflow);

        let trace = Simulator::default()
            .run(&mut session, &MockExecutor::new(), json!({}))
            .await
            .unwrap();
        assert!(trace.entries.is_empty());
        assert_eq!(trace.stop, StopReason::NoTrigger);
    }
}
