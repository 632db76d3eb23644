//! Contracts for CRM, notification and e-commerce steps.

use super::{BranchArity, FixedContract, Requirement, Seed, SemanticType, field};

pub(crate) static SAVE_CONTACT: FixedContract = FixedContract {
    arity: BranchArity::Plain,
    requires: Requirement::Always,
    outputs: &[field(
        "contact_id",
        SemanticType::Text,
        "ID of the saved contact",
    )],
    defaults: &[],
};

pub(crate) static ADD_TAG: FixedContract = FixedContract {
    arity: BranchArity::Plain,
    requires: Requirement::All(&["tags"]),
    outputs: &[field(
        "tags",
        SemanticType::Array,
        "Tags now on the contact",
    )],
    defaults: &[("tags", Seed::EmptyList)],
};

pub(crate) static ASSIGN_AGENT: FixedContract = FixedContract {
    arity: BranchArity::Plain,
    requires: Requirement::Any(&["agent_email", "assignment_type"]),
    outputs: &[field(
        "agent",
        SemanticType::Text,
        "Agent the conversation was assigned to",
    )],
    defaults: &[("assignment_type", Seed::Text("round_robin"))],
};

pub(crate) static HTTP_REQUEST: FixedContract = FixedContract {
    arity: BranchArity::Plain,
    requires: Requirement::All(&["url"]),
    outputs: &[
        field(
            "apiResponse",
            SemanticType::Object,
            "Decoded response body",
        ),
        field("status_code", SemanticType::Number, "HTTP status code"),
    ],
    defaults: &[("url", Seed::Text("")), ("method", Seed::Text("GET"))],
};

pub(crate) static NOTIFY_EMAIL: FixedContract = FixedContract {
    arity: BranchArity::Plain,
    requires: Requirement::All(&["to"]),
    outputs: &[field(
        "sent",
        SemanticType::Boolean,
        "True once the email was accepted",
    )],
    defaults: &[("to", Seed::Text("")), ("subject", Seed::Text(""))],
};

pub(crate) static NOTIFY_WEBHOOK: FixedContract = FixedContract {
    arity: BranchArity::Plain,
    requires: Requirement::All(&["url"]),
    outputs: &[field(
        "status_code",
        SemanticType::Number,
        "HTTP status returned by the webhook",
    )],
    defaults: &[("url", Seed::Text(""))],
};

pub(crate) static SHOW_CATALOG: FixedContract = FixedContract {
    arity: BranchArity::Plain,
    requires: Requirement::Always,
    outputs: &[field(
        "products",
        SemanticType::Array,
        "Products shown to the customer",
    )],
    defaults: &[("selected_products", Seed::EmptyList)],
};

pub(crate) static ADD_TO_CART: FixedContract = FixedContract {
    arity: BranchArity::Plain,
    requires: Requirement::All(&["product_id"]),
    outputs: &[
        field("cart", SemanticType::Array, "Items in the cart"),
        field("cart_total", SemanticType::Number, "Cart total"),
    ],
    defaults: &[("product_id", Seed::Text("")), ("quantity", Seed::Integer(1))],
};

pub(crate) static CHECKOUT: FixedContract = FixedContract {
    arity: BranchArity::Plain,
    requires: Requirement::Always,
    outputs: &[
        field("order_id", SemanticType::Text, "ID of the created order"),
        field(
            "payment_url",
            SemanticType::Text,
            "Link the customer pays through",
        ),
        field("total", SemanticType::Number, "Amount to pay"),
    ],
    defaults: &[("payment_provider", Seed::Text("chariow"))],
};

#[cfg(test)]
mod tests {
    use crate::contract::StepContract;
    use crate::step::StepKind;
    use serde_json::json;

    #[test]
    fn add_to_cart_needs_product() {
        let contract = StepKind::AddToCart.contract();
        let mut config = contract.default_config();
        assert!(!contract.is_configured(&config));

        config.insert("product_id".to_string(), json!("prod_42"));
        assert!(contract.is_configured(&config));
    }

    #[test]
    fn checkout_exposes_payment_link() {
        let contract = StepKind::Checkout.contract();
        let keys: Vec<_> = contract
            .outputs(&contract.default_config())
            .into_iter()
            .map(|f| f.key)
            .collect();
        assert_eq!(keys, vec!["order_id", "payment_url", "total"]);
    }

    #[test]
    fn assign_agent_default_is_configured() {
        let contract = StepKind::AssignAgent.contract();
        assert!(contract.is_configured(&contract.default_config()));
    }
}
