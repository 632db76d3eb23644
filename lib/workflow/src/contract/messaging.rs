//! Contracts for steps that send messages to the customer.

use super::{BranchArity, FieldSpec, FixedContract, Requirement, Seed, SemanticType, field};

const SENT_MESSAGE: &[FieldSpec] = &[field(
    "message_id",
    SemanticType::Text,
    "ID of the sent message",
)];

pub(crate) static SEND_TEXT: FixedContract = FixedContract {
    arity: BranchArity::Plain,
    requires: Requirement::All(&["text"]),
    outputs: SENT_MESSAGE,
    defaults: &[("text", Seed::Text(""))],
};

pub(crate) static SEND_IMAGE: FixedContract = FixedContract {
    arity: BranchArity::Plain,
    requires: Requirement::All(&["url"]),
    outputs: SENT_MESSAGE,
    defaults: &[("url", Seed::Text("")), ("caption", Seed::Text(""))],
};

pub(crate) static SEND_AUDIO: FixedContract = FixedContract {
    arity: BranchArity::Plain,
    requires: Requirement::All(&["url"]),
    outputs: SENT_MESSAGE,
    defaults: &[("url", Seed::Text("")), ("as_voice_note", Seed::Flag(false))],
};

pub(crate) static SEND_BUTTONS: FixedContract = FixedContract {
    arity: BranchArity::Plain,
    requires: Requirement::All(&["buttons"]),
    outputs: &[
        field("message_id", SemanticType::Text, "ID of the sent message"),
        field(
            "selected_button",
            SemanticType::Text,
            "Action of the button the customer pressed",
        ),
    ],
    defaults: &[
        ("text", Seed::Text("Choose an option:")),
        ("buttons", Seed::EmptyList),
    ],
};

pub(crate) static DELAY: FixedContract = FixedContract {
    arity: BranchArity::Plain,
    requires: Requirement::Always,
    outputs: &[field(
        "waited_ms",
        SemanticType::Number,
        "How long the step paused, in milliseconds",
    )],
    defaults: &[("delay_seconds", Seed::Integer(5))],
};
