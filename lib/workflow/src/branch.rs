//! Branch selection: which step runs next.
//!
//! - Plain: the wired step; none if explicitly disconnected; the next step in
//!   insertion order if never wired
//! - Boolean: the `true` or `false` target
//! - Multi-case: the target for the exact case label, else the default
//!
//! A missing edge ends the path. That is not an error.

use crate::connection::{Connections, PlainTarget};
use crate::contract::BranchArity;
use crate::step::{Step, StepKind};
use crate::workflow::Workflow;
use chatflow_core::StepId;
use serde_json::Value as JsonValue;

/// What a step's result says about its outgoing edges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchOutcome {
    /// A plain step finished.
    Continue,
    /// A boolean step's result.
    Boolean(bool),
    /// A multi-case step's result key.
    Case(String),
    /// A multi-case step produced no case key.
    Unmatched,
}

impl BranchOutcome {
    /// Reads the outcome from a step's recorded output.
    ///
    /// - `condition` reads `conditionPassed`
    /// - `random_choice` is true when `selectedIndex` is 0
    /// - `loop` is true while `loopIndex < loopCount`
    /// - multi-case steps read the `matchedCase` string, without coercion
    #[must_use]
    pub fn from_output(step: &Step, output: &JsonValue) -> Self {
        match step.branch_arity() {
            BranchArity::Plain => Self::Continue,
            BranchArity::Boolean => Self::Boolean(boolean_result(&step.kind, output)),
            BranchArity::MultiCase => output
                .get("matchedCase")
                .and_then(JsonValue::as_str)
                .map_or(Self::Unmatched, |case| Self::Case(case.to_string())),
        }
    }
}

fn boolean_result(kind: &StepKind, output: &JsonValue) -> bool {
    match kind {
        StepKind::RandomChoice => output
            .get("selectedIndex")
            .and_then(JsonValue::as_u64)
            .is_some_and(|index| index == 0),
        StepKind::Loop => {
            let index = output.get("loopIndex").and_then(JsonValue::as_u64);
            let count = output.get("loopCount").and_then(JsonValue::as_u64);
            matches!((index, count), (Some(index), Some(count)) if index < count)
        }
        _ => output
            .get("conditionPassed")
            .and_then(JsonValue::as_bool)
            .unwrap_or(false),
    }
}

/// Returns the step that runs after `step_id` given its outcome.
///
/// An outcome of the wrong shape for the step selects nothing, except on
/// multi-case steps, where it falls to the default edge.
#[must_use]
pub fn select_next(workflow: &Workflow, step_id: StepId, outcome: &BranchOutcome) -> Option<StepId> {
    let step = workflow.step(step_id)?;
    match (&step.connections, outcome) {
        (Connections::Plain { next }, _) => match next {
            PlainTarget::Step(target) => Some(*target),
            PlainTarget::Disconnected => None,
            PlainTarget::Unset => workflow.step_after(step_id).map(|next| next.id),
        },
        (Connections::Boolean { on_true, on_false }, BranchOutcome::Boolean(passed)) => {
            if *passed { *on_true } else { *on_false }
        }
        (Connections::Boolean { .. }, _) => None,
        (Connections::MultiCase { cases, default }, BranchOutcome::Case(case)) => {
            cases.get(case).copied().or(*default)
        }
        (Connections::MultiCase { default, .. }, _) => *default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::BranchLabel;
    use crate::expression::ExpressionResolver;
    use crate::history::{RunHistory, StepStatus};
    use serde_json::json;

    #[test]
    fn plain_fallback_and_disconnect() {
        let mut workflow = Workflow::new("Straight");
        let first = workflow.add_step(StepKind::SendText, "First").unwrap();
        let second = workflow.add_step(StepKind::SendText, "Second").unwrap();
        let third = workflow.add_step(StepKind::SendText, "Third").unwrap();

        let go = BranchOutcome::Continue;
        assert_eq!(select_next(&workflow, first, &go), Some(second));
        assert_eq!(select_next(&workflow, third, &go), None);

        workflow.connect(first, third, None).unwrap();
        assert_eq!(select_next(&workflow, first, &go), Some(third));

        workflow.disconnect(first, None).unwrap();
        assert_eq!(select_next(&workflow, first, &go), None);

        workflow.reset_connection(first).unwrap();
        assert_eq!(select_next(&workflow, first, &go), Some(second));
    }

    #[test]
    fn unwired_boolean_branch_ends_the_path() {
        let mut workflow = Workflow::new("Check");
        let check = workflow.add_step(StepKind::Condition, "Check").unwrap();
        let yes = workflow.add_step(StepKind::SendText, "Yes").unwrap();
        workflow
            .connect(check, yes, Some(BranchLabel::True))
            .unwrap();

        assert_eq!(
            select_next(&workflow, check, &BranchOutcome::Boolean(true)),
            Some(yes)
        );
        assert_eq!(
            select_next(&workflow, check, &BranchOutcome::Boolean(false)),
            None
        );
        assert_eq!(select_next(&workflow, check, &BranchOutcome::Continue), None);
    }

    #[test]
    fn multi_case_uses_exact_match_then_default() {
        let mut workflow = Workflow::new("Router");
        let router = workflow.add_step(StepKind::SwitchRouter, "Route").unwrap();
        let one = workflow.add_step(StepKind::SendText, "One").unwrap();
        let fallback = workflow.add_step(StepKind::SendText, "Fallback").unwrap();
        workflow
            .connect(router, one, Some(BranchLabel::case("1")))
            .unwrap();

        let case = |key: &str| BranchOutcome::Case(key.to_string());
        assert_eq!(select_next(&workflow, router, &case("1")), Some(one));
        assert_eq!(select_next(&workflow, router, &case("1.0")), None);
        assert_eq!(select_next(&workflow, router, &case("01")), None);
        assert_eq!(select_next(&workflow, router, &BranchOutcome::Unmatched), None);

        workflow
            .connect(router, fallback, Some(BranchLabel::Default))
            .unwrap();
        assert_eq!(select_next(&workflow, router, &case("2")), Some(fallback));
        assert_eq!(
            select_next(&workflow, router, &BranchOutcome::Unmatched),
            Some(fallback)
        );
    }

    #[test]
    fn outcomes_from_outputs() {
        let condition = Step::new(StepKind::Condition, "Check");
        assert_eq!(
            BranchOutcome::from_output(&condition, &json!({"conditionPassed": true})),
            BranchOutcome::Boolean(true)
        );
        assert_eq!(
            BranchOutcome::from_output(&condition, &json!({"conditionPassed": "true"})),
            BranchOutcome::Boolean(false)
        );

        let random = Step::new(StepKind::RandomChoice, "Pick");
        assert_eq!(
            BranchOutcome::from_output(&random, &json!({"selectedIndex": 0})),
            BranchOutcome::Boolean(true)
        );
        assert_eq!(
            BranchOutcome::from_output(&random, &json!({"selectedIndex": 2})),
            BranchOutcome::Boolean(false)
        );

        let repeat = Step::new(StepKind::Loop, "Repeat");
        assert_eq!(
            BranchOutcome::from_output(&repeat, &json!({"loopIndex": 1, "loopCount": 3})),
            BranchOutcome::Boolean(true)
        );
        assert_eq!(
            BranchOutcome::from_output(&repeat, &json!({"loopIndex": 3, "loopCount": 3})),
            BranchOutcome::Boolean(false)
        );

        let router = Step::new(StepKind::SwitchRouter, "Route");
        assert_eq!(
            BranchOutcome::from_output(&router, &json!({"matchedCase": "vip"})),
            BranchOutcome::Case("vip".to_string())
        );
        assert_eq!(
            BranchOutcome::from_output(&router, &json!({"matchedCase": 1})),
            BranchOutcome::Unmatched
        );

        let send = Step::new(StepKind::SendText, "Reply");
        assert_eq!(
            BranchOutcome::from_output(&send, &json!({})),
            BranchOutcome::Continue
        );
    }

    #[test]
    fn angry_customer_scenario() {
        let mut workflow = Workflow::new("Support");
        let trigger = workflow
            .add_step(StepKind::MessageReceived, "Message")
            .unwrap();
        let check = workflow.add_step(StepKind::Condition, "Angry?").unwrap();
        let calm = workflow.add_step(StepKind::SendText, "Calm down").unwrap();
        let thanks = workflow.add_step(StepKind::SendText, "Thanks").unwrap();

        workflow
            .set_config_value(check, "field", json!("sentiment_score"))
            .unwrap();
        workflow
            .set_config_value(check, "operator", json!("less_than"))
            .unwrap();
        workflow.set_config_value(check, "value", json!("-0.3")).unwrap();
        workflow.connect(trigger, check, None).unwrap();
        workflow
            .connect(check, calm, Some(BranchLabel::True))
            .unwrap();
        workflow
            .connect(check, thanks, Some(BranchLabel::False))
            .unwrap();
        workflow
            .set_config_value(calm, "text", json!("Hello {{contact.name}}"))
            .unwrap();

        let mut history = RunHistory::new();
        history.record_result(
            trigger,
            Some(json!({"contact": {"name": "Ama"}})),
            StepStatus::Success,
        );
        history.record_result(check, Some(json!({"conditionPassed": true})), StepStatus::Success);

        let check_step = workflow.step(check).unwrap();
        let output = history.output(check).unwrap();
        let outcome = BranchOutcome::from_output(check_step, output);
        assert_eq!(select_next(&workflow, check, &outcome), Some(calm));

        let template = workflow.step(calm).unwrap().config["text"]
            .as_str()
            .unwrap()
            .to_string();
        let resolver = ExpressionResolver::new(&workflow, &history);
        assert_eq!(resolver.resolve(&template, calm), "Hello Ama");
    }
}
