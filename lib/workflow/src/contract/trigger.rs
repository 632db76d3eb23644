//! Contracts for trigger steps.
//!
//! Triggers start a run. They expose the inbound payload that later steps
//! read through `{{contact...}}` and `{{message...}}` expressions.

use super::{BranchArity, FieldSpec, FixedContract, Requirement, Seed, SemanticType, field};

const INBOUND_OUTPUTS: &[FieldSpec] = &[
    field(
        "message",
        SemanticType::Object,
        "The received message (text, media, timestamp)",
    ),
    field(
        "sender",
        SemanticType::Text,
        "Phone number or chat ID of the sender",
    ),
    field(
        "contact",
        SemanticType::Object,
        "Contact record of the sender",
    ),
];

/// `message_received`, `whatsapp_message` and `telegram_message`.
pub(crate) static INBOUND_MESSAGE: FixedContract = FixedContract {
    arity: BranchArity::Plain,
    requires: Requirement::Always,
    outputs: INBOUND_OUTPUTS,
    defaults: &[("trigger_name", Seed::Text("Message trigger"))],
};

pub(crate) static NEW_CONTACT: FixedContract = FixedContract {
    arity: BranchArity::Plain,
    requires: Requirement::Always,
    outputs: &[field(
        "contact",
        SemanticType::Object,
        "The newly created contact",
    )],
    defaults: &[],
};

pub(crate) static SCHEDULED: FixedContract = FixedContract {
    arity: BranchArity::Plain,
    requires: Requirement::All(&["schedule"]),
    outputs: &[field(
        "execution_time",
        SemanticType::Text,
        "When the schedule fired",
    )],
    defaults: &[
        ("schedule", Seed::Text("")),
        ("timezone", Seed::Text("Africa/Abidjan")),
    ],
};

pub(crate) static KEYWORD: FixedContract = FixedContract {
    arity: BranchArity::Plain,
    requires: Requirement::All(&["keywords"]),
    outputs: &[
        field(
            "matched",
            SemanticType::Boolean,
            "True if a keyword was found in the message",
        ),
        field(
            "matched_keyword",
            SemanticType::Text,
            "The keyword that matched",
        ),
    ],
    defaults: &[
        ("keywords", Seed::EmptyList),
        ("case_sensitive", Seed::Flag(false)),
    ],
};

pub(crate) static WEBHOOK: FixedContract = FixedContract {
    arity: BranchArity::Plain,
    requires: Requirement::All(&["path"]),
    outputs: &[field(
        "payload",
        SemanticType::Object,
        "Body of the incoming request",
    )],
    defaults: &[("path", Seed::Text(""))],
};
