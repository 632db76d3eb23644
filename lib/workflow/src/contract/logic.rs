//! Contracts for logic steps: conditions, routers, loops and variables.

use super::{
    BranchArity, FixedContract, OutputField, Requirement, Seed, SemanticType, StepContract, field,
    seeded,
};
use crate::step::StepConfig;
use serde_json::Value as JsonValue;

pub(crate) static CONDITION: FixedContract = FixedContract {
    arity: BranchArity::Boolean,
    requires: Requirement::All(&["field", "operator"]),
    outputs: &[field(
        "conditionPassed",
        SemanticType::Boolean,
        "True if the condition holds",
    )],
    defaults: &[
        ("field", Seed::Text("")),
        ("operator", Seed::Text("contains")),
        ("value", Seed::Text("")),
    ],
};

pub(crate) static SWITCH_ROUTER: FixedContract = FixedContract {
    arity: BranchArity::MultiCase,
    requires: Requirement::All(&["cases"]),
    outputs: &[field(
        "matchedCase",
        SemanticType::Text,
        "Label of the case that matched",
    )],
    defaults: &[("field", Seed::Text("intent")), ("cases", Seed::EmptyList)],
};

pub(crate) static RANDOM_CHOICE: FixedContract = FixedContract {
    arity: BranchArity::Boolean,
    requires: Requirement::All(&["choices"]),
    outputs: &[
        field(
            "selectedIndex",
            SemanticType::Number,
            "Index of the selected choice; the true branch is taken for index 0",
        ),
        field(
            "selected_choice",
            SemanticType::Text,
            "The selected choice",
        ),
    ],
    defaults: &[("choices", Seed::EmptyList), ("weights", Seed::EmptyList)],
};

pub(crate) static SET_VARIABLE: FixedContract = FixedContract {
    arity: BranchArity::Plain,
    requires: Requirement::Any(&["variables", "variable_name"]),
    outputs: &[field(
        "variable_set",
        SemanticType::Boolean,
        "True once the variables were written",
    )],
    defaults: &[("variables", Seed::EmptyList)],
};

pub(crate) static END_FLOW: FixedContract = FixedContract {
    arity: BranchArity::Plain,
    requires: Requirement::Always,
    outputs: &[],
    defaults: &[],
};

/// `loop`: repeats its `true` branch `count` times, then takes `false`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Loop;

impl StepContract for Loop {
    fn branch_arity(&self) -> BranchArity {
        BranchArity::Boolean
    }

    fn is_configured(&self, config: &StepConfig) -> bool {
        config
            .get("count")
            .and_then(JsonValue::as_u64)
            .is_some_and(|count| count > 0)
    }

    fn outputs(&self, _config: &StepConfig) -> Vec<OutputField> {
        vec![
            OutputField::new(
                "loopIndex",
                SemanticType::Number,
                "Zero-based index of the current iteration",
            ),
            OutputField::new(
                "loopCount",
                SemanticType::Number,
                "Total number of iterations",
            ),
        ]
    }

    fn default_config(&self) -> StepConfig {
        seeded(&[("count", Seed::Integer(3)), ("delay_between", Seed::Integer(1))])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::StepKind;
    use serde_json::json;

    #[test]
    fn condition_is_boolean_and_needs_field() {
        let contract = StepKind::Condition.contract();
        assert_eq!(contract.branch_arity(), BranchArity::Boolean);

        let mut config = contract.default_config();
        assert!(!contract.is_configured(&config));

        config.insert("field".to_string(), json!("sentiment_score"));
        config.insert("operator".to_string(), json!("less_than"));
        assert!(contract.is_configured(&config));
    }

    #[test]
    fn switch_router_is_multi_case() {
        let contract = StepKind::SwitchRouter.contract();
        assert_eq!(contract.branch_arity(), BranchArity::MultiCase);
        assert!(!contract.is_configured(&contract.default_config()));
    }

    #[test]
    fn loop_needs_positive_count() {
        let contract = StepKind::Loop.contract();
        assert!(contract.is_configured(&contract.default_config()));

        let mut config = StepConfig::new();
        config.insert("count".to_string(), json!(0));
        assert!(!contract.is_configured(&config));

        config.insert("count".to_string(), json!("3"));
        assert!(!contract.is_configured(&config));
    }

    #[test]
    fn end_flow_has_no_outputs() {
        let contract = StepKind::EndFlow.contract();
        assert!(contract.outputs(&StepConfig::new()).is_empty());
    }
}
