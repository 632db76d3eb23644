//! Contracts for AI steps.

use super::{
    BranchArity, FixedContract, OutputField, Requirement, Seed, SemanticType, StepContract, field,
    has_value, seeded, string_list,
};
use crate::step::StepConfig;

/// `gpt_respond`: generates a reply from a system prompt or custom
/// instructions.
pub(crate) static TEXT_GENERATION: FixedContract = FixedContract {
    arity: BranchArity::Plain,
    requires: Requirement::Any(&["system_prompt", "custom_instructions"]),
    outputs: &[field(
        "response",
        SemanticType::Text,
        "The generated reply",
    )],
    defaults: &[
        ("system_prompt", Seed::Text("")),
        ("custom_instructions", Seed::Text("")),
        ("model", Seed::Text("gpt-4o")),
        ("temperature", Seed::Float(0.7)),
    ],
};

pub(crate) static AGENT: FixedContract = FixedContract {
    arity: BranchArity::Plain,
    requires: Requirement::All(&["system_prompt"]),
    outputs: &[field(
        "agent_response",
        SemanticType::Text,
        "Final answer of the agent",
    )],
    defaults: &[
        ("system_prompt", Seed::Text("")),
        ("model", Seed::Text("gpt-4o")),
        ("tools", Seed::EmptyList),
    ],
};

/// Sentiment analysis has safe defaults and is always runnable.
pub(crate) static SENTIMENT: FixedContract = FixedContract {
    arity: BranchArity::Plain,
    requires: Requirement::Always,
    outputs: &[
        field(
            "sentiment",
            SemanticType::Text,
            "positive, neutral or negative",
        ),
        field(
            "score",
            SemanticType::Number,
            "Sentiment score from 0 (very negative) to 100 (very positive)",
        ),
        field("emotion", SemanticType::Text, "Dominant emotion"),
        field("urgency", SemanticType::Text, "low, medium or high"),
    ],
    defaults: &[
        ("detect_emotions", Seed::Flag(true)),
        ("detect_tone", Seed::Flag(true)),
    ],
};

pub(crate) static TRANSLATE: FixedContract = FixedContract {
    arity: BranchArity::Plain,
    requires: Requirement::All(&["text", "target_language"]),
    outputs: &[field(
        "translated_text",
        SemanticType::Text,
        "The translated text",
    )],
    defaults: &[
        ("text", Seed::Text("{{message.text}}")),
        ("target_language", Seed::Text("en")),
        ("source_language", Seed::Text("auto")),
    ],
};

pub(crate) static SUMMARIZE: FixedContract = FixedContract {
    arity: BranchArity::Plain,
    requires: Requirement::Always,
    outputs: &[field(
        "summary",
        SemanticType::Text,
        "Summary of the conversation",
    )],
    defaults: &[("max_length", Seed::Integer(200))],
};

/// `intent_classification`: classifies the message into user-declared
/// intents.
///
/// Exposes one boolean output per declared intent, followed by a confidence
/// score.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntentClassification;

impl StepContract for IntentClassification {
    fn is_configured(&self, config: &StepConfig) -> bool {
        has_value(config, "intents") && !string_list(config, "intents").is_empty()
    }

    fn outputs(&self, config: &StepConfig) -> Vec<OutputField> {
        string_list(config, "intents")
            .into_iter()
            .map(|intent| {
                let description = format!("True when the message expresses '{intent}'");
                OutputField::new(intent, SemanticType::Boolean, description)
            })
            .chain(std::iter::once(OutputField::new(
                "confidence",
                SemanticType::Number,
                "Confidence of the classification, from 0 to 1",
            )))
            .collect()
    }

    fn default_config(&self) -> StepConfig {
        seeded(&[("intents", Seed::EmptyList), ("model", Seed::Text("gpt-4o-mini"))])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::StepKind;
    use serde_json::json;

    #[test]
    fn text_generation_needs_prompt_or_instructions() {
        let contract = StepKind::GptRespond.contract();
        let mut config = contract.default_config();
        assert!(!contract.is_configured(&config));

        config.insert(
            "custom_instructions".to_string(),
            json!("Answer in French"),
        );
        assert!(contract.is_configured(&config));

        let mut config = contract.default_config();
        config.insert("system_prompt".to_string(), json!("You are a shop assistant"));
        assert!(contract.is_configured(&config));
    }

    #[test]
    fn sentiment_is_configured_with_no_settings() {
        let contract = StepKind::Sentiment.contract();
        assert!(contract.is_configured(&StepConfig::new()));
    }

    #[test]
    fn intent_outputs_follow_declared_intents() {
        let contract = StepKind::IntentClassification.contract();
        let mut config = contract.default_config();
        assert!(!contract.is_configured(&config));
        assert_eq!(contract.outputs(&config).len(), 1);

        config.insert("intents".to_string(), json!(["greeting", "price", "greeting"]));
        assert!(contract.is_configured(&config));

        let outputs = contract.outputs(&config);
        let keys: Vec<_> = outputs.iter().map(|f| f.key.as_str()).collect();
        assert_eq!(keys, vec!["greeting", "price", "confidence"]);
        assert_eq!(outputs[0].semantic_type, SemanticType::Boolean);
        assert_eq!(outputs[2].semantic_type, SemanticType::Number);
    }

    #[test]
    fn blank_intents_do_not_configure() {
        let contract = StepKind::IntentClassification.contract();
        let mut config = StepConfig::new();
        config.insert("intents".to_string(), json!(["  ", ""]));
        assert!(!contract.is_configured(&config));
    }
}
