//! Step contract registry.
//!
//! Every step type has a contract describing:
//! - Its branch arity (how many outgoing edge slots it exposes)
//! - When its configuration counts as complete
//! - The named output fields it produces
//! - The configuration a freshly inserted step starts with
//!
//! The registry is a static, exhaustive mapping from [`StepKind`] to a
//! contract value. Unrecognised type tags get [`GenericContract`], so callers
//! never have to special-case unknown steps.

pub mod ai;
pub mod business;
pub mod logic;
pub mod messaging;
pub mod trigger;

use crate::step::{StepConfig, StepKind};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// How many outgoing edge slots a step type exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchArity {
    /// A single next step.
    Plain,
    /// `true` and `false` branches.
    Boolean,
    /// One branch per case label plus a default.
    MultiCase,
}

/// The semantic type of an output field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    Text,
    Number,
    Boolean,
    Object,
    Array,
    Any,
}

/// A named output produced by a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputField {
    /// Key under which the value appears in the step's output.
    pub key: String,
    /// What kind of value the key holds.
    pub semantic_type: SemanticType,
    /// Human-readable description.
    pub description: String,
}

impl OutputField {
    /// Creates a new output field.
    #[must_use]
    pub fn new(
        key: impl Into<String>,
        semantic_type: SemanticType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            semantic_type,
            description: description.into(),
        }
    }
}

/// Behaviour shared by all step types.
///
/// Both predicates are pure functions of the configuration.
pub trait StepContract: Send + Sync {
    /// Returns the branch arity of this step type.
    fn branch_arity(&self) -> BranchArity {
        BranchArity::Plain
    }

    /// Returns true once the configuration is complete enough to run.
    fn is_configured(&self, config: &StepConfig) -> bool;

    /// Returns the output fields, in display order.
    fn outputs(&self, config: &StepConfig) -> Vec<OutputField>;

    /// Returns the configuration a new step of this type starts with.
    fn default_config(&self) -> StepConfig {
        StepConfig::new()
    }
}

/// Looks up the contract for a step type.
#[must_use]
pub fn lookup(kind: &StepKind) -> &'static dyn StepContract {
    match kind {
        StepKind::MessageReceived | StepKind::WhatsappMessage | StepKind::TelegramMessage => {
            &trigger::INBOUND_MESSAGE
        }
        StepKind::NewContact => &trigger::NEW_CONTACT,
        StepKind::Scheduled => &trigger::SCHEDULED,
        StepKind::KeywordTrigger => &trigger::KEYWORD,
        StepKind::WebhookTrigger => &trigger::WEBHOOK,
        StepKind::GptRespond => &ai::TEXT_GENERATION,
        StepKind::AiAgent => &ai::AGENT,
        StepKind::IntentClassification => &ai::IntentClassification,
        StepKind::Sentiment => &ai::SENTIMENT,
        StepKind::AiTranslate => &ai::TRANSLATE,
        StepKind::AiSummarize => &ai::SUMMARIZE,
        StepKind::SendText => &messaging::SEND_TEXT,
        StepKind::SendImage => &messaging::SEND_IMAGE,
        StepKind::SendAudio => &messaging::SEND_AUDIO,
        StepKind::SendButtons => &messaging::SEND_BUTTONS,
        StepKind::Delay => &messaging::DELAY,
        StepKind::Condition => &logic::CONDITION,
        StepKind::SwitchRouter => &logic::SWITCH_ROUTER,
        StepKind::Loop => &logic::Loop,
        StepKind::RandomChoice => &logic::RANDOM_CHOICE,
        StepKind::SetVariable => &logic::SET_VARIABLE,
        StepKind::EndFlow => &logic::END_FLOW,
        StepKind::SaveContact => &business::SAVE_CONTACT,
        StepKind::AddTag => &business::ADD_TAG,
        StepKind::AssignAgent => &business::ASSIGN_AGENT,
        StepKind::HttpRequest => &business::HTTP_REQUEST,
        StepKind::NotifyEmail => &business::NOTIFY_EMAIL,
        StepKind::NotifyWebhook => &business::NOTIFY_WEBHOOK,
        StepKind::ShowCatalog => &business::SHOW_CATALOG,
        StepKind::AddToCart => &business::ADD_TO_CART,
        StepKind::Checkout => &business::CHECKOUT,
        StepKind::Other(_) => &GenericContract,
    }
}

/// Fallback contract for unrecognised step types.
///
/// Configured once the config has any key; produces a raw `output` and a
/// `success` flag.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericContract;

impl StepContract for GenericContract {
    fn is_configured(&self, config: &StepConfig) -> bool {
        !config.is_empty()
    }

    fn outputs(&self, _config: &StepConfig) -> Vec<OutputField> {
        vec![
            OutputField::new("output", SemanticType::Any, "Raw output of the step"),
            OutputField::new(
                "success",
                SemanticType::Boolean,
                "True when the step completed",
            ),
        ]
    }
}

/// Static description of one output field.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FieldSpec {
    key: &'static str,
    semantic_type: SemanticType,
    description: &'static str,
}

pub(crate) const fn field(
    key: &'static str,
    semantic_type: SemanticType,
    description: &'static str,
) -> FieldSpec {
    FieldSpec {
        key,
        semantic_type,
        description,
    }
}

impl From<&FieldSpec> for OutputField {
    fn from(field: &FieldSpec) -> Self {
        Self::new(field.key, field.semantic_type, field.description)
    }
}

/// Which configuration keys must carry a value.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Requirement {
    /// Always configured.
    Always,
    /// Every listed key must have a value.
    All(&'static [&'static str]),
    /// At least one listed key must have a value.
    Any(&'static [&'static str]),
}

impl Requirement {
    fn holds(&self, config: &StepConfig) -> bool {
        match self {
            Self::Always => true,
            Self::All(keys) => keys.iter().all(|key| has_value(config, key)),
            Self::Any(keys) => keys.iter().any(|key| has_value(config, key)),
        }
    }
}

/// A default configuration value.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Seed {
    Text(&'static str),
    Integer(i64),
    Float(f64),
    Flag(bool),
    EmptyList,
}

impl Seed {
    fn to_json(self) -> JsonValue {
        match self {
            Self::Text(text) => JsonValue::from(text),
            Self::Integer(n) => JsonValue::from(n),
            Self::Float(n) => JsonValue::from(n),
            Self::Flag(flag) => JsonValue::from(flag),
            Self::EmptyList => JsonValue::Array(Vec::new()),
        }
    }
}

/// A contract whose outputs do not depend on configuration.
#[derive(Debug)]
pub(crate) struct FixedContract {
    pub(crate) arity: BranchArity,
    pub(crate) requires: Requirement,
    pub(crate) outputs: &'static [FieldSpec],
    pub(crate) defaults: &'static [(&'static str, Seed)],
}

impl StepContract for FixedContract {
    fn branch_arity(&self) -> BranchArity {
        self.arity
    }

    fn is_configured(&self, config: &StepConfig) -> bool {
        self.requires.holds(config)
    }

    fn outputs(&self, _config: &StepConfig) -> Vec<OutputField> {
        self.outputs.iter().map(OutputField::from).collect()
    }

    fn default_config(&self) -> StepConfig {
        seeded(self.defaults)
    }
}

pub(crate) fn seeded(defaults: &[(&'static str, Seed)]) -> StepConfig {
    defaults
        .iter()
        .map(|(key, seed)| ((*key).to_string(), seed.to_json()))
        .collect()
}

/// Returns true if `key` holds a meaningful value.
///
/// Blank strings, empty lists, empty objects and `null` do not count.
pub(crate) fn has_value(config: &StepConfig, key: &str) -> bool {
    match config.get(key) {
        None | Some(JsonValue::Null) => false,
        Some(JsonValue::String(text)) => !text.trim().is_empty(),
        Some(JsonValue::Array(items)) => !items.is_empty(),
        Some(JsonValue::Object(map)) => !map.is_empty(),
        Some(JsonValue::Bool(_) | JsonValue::Number(_)) => true,
    }
}

/// Reads a list setting given either as a JSON array or as text separated by
/// commas or newlines. Blank entries are dropped and order is kept.
pub(crate) fn string_list(config: &StepConfig, key: &str) -> Vec<String> {
    let raw: Vec<String> = match config.get(key) {
        Some(JsonValue::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                JsonValue::String(text) => Some(text.clone()),
                JsonValue::Object(map) => map
                    .get("name")
                    .and_then(JsonValue::as_str)
                    .map(str::to_string),
                _ => None,
            })
            .collect(),
        Some(JsonValue::String(text)) => text.split([',', '\n']).map(str::to_string).collect(),
        _ => Vec::new(),
    };

    let mut seen = Vec::with_capacity(raw.len());
    for entry in raw {
        let entry = entry.trim();
        if !entry.is_empty() && !seen.iter().any(|s: &String| s == entry) {
            seen.push(entry.to_string());
        }
    }
    seen
}
