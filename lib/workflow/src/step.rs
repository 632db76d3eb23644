//! Steps: the nodes of a workflow graph.
//!
//! A step pairs a type tag ([`StepKind`]) with an opaque configuration map and
//! the outgoing [`Connections`] its type allows. Everything type-specific is
//! answered by the step's contract (see [`crate::contract`]).

use crate::connection::Connections;
use crate::contract::{self, BranchArity, OutputField, StepContract};
use chatflow_core::StepId;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

/// Per-type step configuration.
pub type StepConfig = serde_json::Map<String, JsonValue>;

/// Broad grouping of step types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepCategory {
    /// Starts a run. At most one per workflow.
    Trigger,
    Ai,
    Messaging,
    Logic,
    Crm,
    Ecommerce,
    /// Unrecognised type tag.
    Other,
}

/// The type of a step.
///
/// Serialized as its snake_case type tag. Tags this build does not know
/// survive a round trip through [`StepKind::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum StepKind {
    MessageReceived,
    WhatsappMessage,
    TelegramMessage,
    NewContact,
    Scheduled,
    KeywordTrigger,
    WebhookTrigger,
    GptRespond,
    AiAgent,
    IntentClassification,
    Sentiment,
    AiTranslate,
    AiSummarize,
    SendText,
    SendImage,
    SendAudio,
    SendButtons,
    Delay,
    Condition,
    SwitchRouter,
    Loop,
    RandomChoice,
    SetVariable,
    EndFlow,
    SaveContact,
    AddTag,
    AssignAgent,
    HttpRequest,
    NotifyEmail,
    NotifyWebhook,
    ShowCatalog,
    AddToCart,
    Checkout,
    Other(String),
}

const TAGS: &[(&str, StepKind)] = &[
    ("message_received", StepKind::MessageReceived),
    ("whatsapp_message", StepKind::WhatsappMessage),
    ("telegram_message", StepKind::TelegramMessage),
    ("new_contact", StepKind::NewContact),
    ("scheduled", StepKind::Scheduled),
    ("keyword_trigger", StepKind::KeywordTrigger),
    ("webhook_trigger", StepKind::WebhookTrigger),
    ("gpt_respond", StepKind::GptRespond),
    ("ai_agent", StepKind::AiAgent),
    ("intent_classification", StepKind::IntentClassification),
    ("sentiment", StepKind::Sentiment),
    ("ai_translate", StepKind::AiTranslate),
    ("ai_summarize", StepKind::AiSummarize),
    ("send_text", StepKind::SendText),
    ("send_image", StepKind::SendImage),
    ("send_audio", StepKind::SendAudio),
    ("send_buttons", StepKind::SendButtons),
    ("delay", StepKind::Delay),
    ("condition", StepKind::Condition),
    ("switch_router", StepKind::SwitchRouter),
    ("loop", StepKind::Loop),
    ("random_choice", StepKind::RandomChoice),
    ("set_variable", StepKind::SetVariable),
    ("end_flow", StepKind::EndFlow),
    ("save_contact", StepKind::SaveContact),
    ("add_tag", StepKind::AddTag),
    ("assign_agent", StepKind::AssignAgent),
    ("http_request", StepKind::HttpRequest),
    ("notify_email", StepKind::NotifyEmail),
    ("notify_webhook", StepKind::NotifyWebhook),
    ("show_catalog", StepKind::ShowCatalog),
    ("add_to_cart", StepKind::AddToCart),
    ("checkout", StepKind::Checkout),
];

/// Older tags still found in saved documents: `gpt_analyze` for intent
/// classification and `keyword` for the keyword trigger.
const ALIASES: &[(&str, StepKind)] = &[
    ("gpt_analyze", StepKind::IntentClassification),
    ("keyword", StepKind::KeywordTrigger),
];

impl StepKind {
    /// Parses a type tag. Unknown tags become [`StepKind::Other`].
    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        TAGS.iter()
            .chain(ALIASES)
            .find(|(known, _)| *known == tag)
            .map_or_else(|| Self::Other(tag.to_string()), |(_, kind)| kind.clone())
    }

    /// Returns the canonical type tag.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Other(tag) => tag,
            known => TAGS
                .iter()
                .find(|(_, kind)| kind == known)
                .map_or("", |(tag, _)| *tag),
        }
    }

    /// Returns the contract for this type.
    #[must_use]
    pub fn contract(&self) -> &'static dyn StepContract {
        contract::lookup(self)
    }

    /// Returns the category of this type.
    #[must_use]
    pub fn category(&self) -> StepCategory {
        match self {
            Self::MessageReceived
            | Self::WhatsappMessage
            | Self::TelegramMessage
            | Self::NewContact
            | Self::Scheduled
            | Self::KeywordTrigger
            | Self::WebhookTrigger => StepCategory::Trigger,
            Self::GptRespond
            | Self::AiAgent
            | Self::IntentClassification
            | Self::Sentiment
            | Self::AiTranslate
            | Self::AiSummarize => StepCategory::Ai,
            Self::SendText | Self::SendImage | Self::SendAudio | Self::SendButtons | Self::Delay => {
                StepCategory::Messaging
            }
            Self::Condition
            | Self::SwitchRouter
            | Self::Loop
            | Self::RandomChoice
            | Self::SetVariable
            | Self::EndFlow => StepCategory::Logic,
            Self::SaveContact
            | Self::AddTag
            | Self::AssignAgent
            | Self::HttpRequest
            | Self::NotifyEmail
            | Self::NotifyWebhook => StepCategory::Crm,
            Self::ShowCatalog | Self::AddToCart | Self::Checkout => StepCategory::Ecommerce,
            Self::Other(_) => StepCategory::Other,
        }
    }

    /// Returns true for trigger-category types.
    #[must_use]
    pub fn is_trigger(&self) -> bool {
        self.category() == StepCategory::Trigger
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for StepKind {
    fn from(tag: String) -> Self {
        match Self::from_tag(&tag) {
            Self::Other(_) => Self::Other(tag),
            known => known,
        }
    }
}

impl From<StepKind> for String {
    fn from(kind: StepKind) -> Self {
        match kind {
            StepKind::Other(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

/// Canvas position. Kept in memory for hosts that draw the graph, never
/// persisted.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// A node in the workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Unique identifier, fixed at creation.
    pub id: StepId,
    /// Type tag selecting the step's contract.
    #[serde(rename = "type")]
    pub kind: StepKind,
    /// User label; not unique.
    pub name: String,
    /// Type-specific configuration.
    #[serde(default)]
    pub config: StepConfig,
    /// Outgoing edges, shaped by the type's branch arity.
    pub connections: Connections,
    #[serde(skip)]
    pub position: Position,
}

impl Step {
    /// Creates a step with the type's default configuration and empty
    /// connections.
    #[must_use]
    pub fn new(kind: StepKind, name: impl Into<String>) -> Self {
        Self::with_id(StepId::new(), kind, name)
    }

    /// Creates a step with a specific ID.
    #[must_use]
    pub fn with_id(id: StepId, kind: StepKind, name: impl Into<String>) -> Self {
        let contract = kind.contract();
        Self {
            id,
            config: contract.default_config(),
            connections: Connections::for_arity(contract.branch_arity()),
            kind,
            name: name.into(),
            position: Position::default(),
        }
    }

    /// Sets the configuration.
    #[must_use]
    pub fn with_config(mut self, config: StepConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the canvas position.
    #[must_use]
    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.position = Position { x, y };
        self
    }

    #[must_use]
    pub fn is_trigger(&self) -> bool {
        self.kind.is_trigger()
    }

    #[must_use]
    pub fn branch_arity(&self) -> BranchArity {
        self.kind.contract().branch_arity()
    }

    /// Returns true once the configuration is complete enough to run.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.kind.contract().is_configured(&self.config)
    }

    /// Returns the output fields this step produces.
    #[must_use]
    pub fn outputs(&self) -> Vec<OutputField> {
        self.kind.contract().outputs(&self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::PlainTarget;
    use serde_json::json;

    #[test]
    fn tags_round_trip() {
        for (tag, kind) in TAGS {
            assert_eq!(StepKind::from_tag(tag), *kind);
            assert_eq!(kind.as_str(), *tag);
        }
    }

    #[test]
    fn legacy_alias_maps_to_intent_classification() {
        let kind: StepKind = serde_json::from_value(json!("gpt_analyze")).expect("deserialize");
        assert_eq!(kind, StepKind::IntentClassification);
        assert_eq!(
            serde_json::to_value(&kind).expect("serialize"),
            json!("intent_classification")
        );
    }

    #[test]
    fn legacy_keyword_tag_is_a_trigger() {
        let kind: StepKind = serde_json::from_value(json!("keyword")).expect("deserialize");
        assert_eq!(kind, StepKind::KeywordTrigger);
        assert!(kind.is_trigger());
        assert_eq!(
            serde_json::to_value(&kind).expect("serialize"),
            json!("keyword_trigger")
        );
    }

    #[test]
    fn unknown_tag_survives_round_trip() {
        let kind: StepKind = serde_json::from_value(json!("legacy_block")).expect("deserialize");
        assert_eq!(kind, StepKind::Other("legacy_block".to_string()));
        assert_eq!(kind.category(), StepCategory::Other);
        assert_eq!(
            serde_json::to_value(&kind).expect("serialize"),
            json!("legacy_block")
        );
    }

    #[test]
    fn new_step_is_shaped_by_arity() {
        let condition = Step::new(StepKind::Condition, "Angry?");
        assert_eq!(condition.branch_arity(), BranchArity::Boolean);
        assert!(matches!(condition.connections, Connections::Boolean { .. }));
        assert_eq!(condition.config.get("operator"), Some(&json!("contains")));

        let send = Step::new(StepKind::SendText, "Reply");
        assert_eq!(
            send.connections,
            Connections::Plain {
                next: PlainTarget::Unset
            }
        );
    }

    #[test]
    fn only_trigger_category_is_trigger() {
        assert!(StepKind::WhatsappMessage.is_trigger());
        assert!(StepKind::KeywordTrigger.is_trigger());
        assert!(!StepKind::SendText.is_trigger());
        assert!(!StepKind::Other("message_received_v2".to_string()).is_trigger());
    }

    #[test]
    fn position_is_not_serialized() {
        let step = Step::new(StepKind::SendText, "Reply").at(120.0, 40.0);
        let json = serde_json::to_value(&step).expect("serialize");
        assert!(json.get("position").is_none());
        assert_eq!(json["type"], "send_text");

        let parsed: Step = serde_json::from_value(json).expect("deserialize");
        assert_eq!(parsed.position, Position::default());
        assert_eq!(parsed.id, step.id);
    }
}
