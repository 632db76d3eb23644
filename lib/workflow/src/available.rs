//! Variables a user may reference from a step.

use crate::contract::SemanticType;
use crate::resolver::find_ancestors_in;
use crate::variables::{SystemVariables, VariableType};
use crate::workflow::Workflow;
use chatflow_core::StepId;
use serde::Serialize;
use std::collections::HashSet;

/// Where a listed variable's value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "step_id")]
pub enum VariableSource {
    /// Computed by the engine.
    System,
    /// A workflow variable.
    User,
    /// A recorded step output.
    Step(StepId),
}

/// One `{{path}}` offered at a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvailableVariable {
    pub path: String,
    pub semantic_type: SemanticType,
    pub description: String,
    pub source: VariableSource,
}

impl AvailableVariable {
    fn new(
        path: impl Into<String>,
        semantic_type: SemanticType,
        description: impl Into<String>,
        source: VariableSource,
    ) -> Self {
        Self {
            path: path.into(),
            semantic_type,
            description: description.into(),
            source,
        }
    }
}

const CONTACT_FIELDS: &[(&str, SemanticType, &str)] = &[
    ("contact.name", SemanticType::Text, "Contact name"),
    ("contact.phone", SemanticType::Text, "Contact phone number"),
    ("contact.tags", SemanticType::Array, "Contact tags"),
    ("message.text", SemanticType::Text, "Text of the inbound message"),
    ("message.type", SemanticType::Text, "Kind of inbound message"),
    ("message.timestamp", SemanticType::Text, "When the message arrived"),
];

/// Lists every path a user may type at `step_id`, closest source first.
///
/// Order: `previous.output.*` of the nearest ancestor, every ancestor's
/// outputs by bare key (a key already offered by a closer ancestor is
/// skipped), the trigger's contact and message fields, `$vars.*`, then
/// system variables. An unknown step gets an empty list.
#[must_use]
pub fn available_variables(workflow: &Workflow, step_id: StepId) -> Vec<AvailableVariable> {
    if !workflow.contains(step_id) {
        return Vec::new();
    }

    let graph = workflow.graph();
    let ancestors: Vec<_> = find_ancestors_in(&graph, step_id)
        .into_iter()
        .filter_map(|id| workflow.step(id))
        .collect();

    let mut listed = Vec::new();

    if let Some(nearest) = ancestors.first() {
        listed.extend(nearest.outputs().into_iter().map(|field| {
            AvailableVariable::new(
                format!("previous.output.{}", field.key),
                field.semantic_type,
                field.description,
                VariableSource::Step(nearest.id),
            )
        }));
    }

    let mut seen = HashSet::new();
    for ancestor in &ancestors {
        for field in ancestor.outputs() {
            if seen.insert(field.key.clone()) {
                listed.push(AvailableVariable::new(
                    field.key,
                    field.semantic_type,
                    format!("{} ({})", field.description, ancestor.name),
                    VariableSource::Step(ancestor.id),
                ));
            }
        }
    }

    if let Some(trigger) = workflow.trigger().filter(|trigger| trigger.id != step_id) {
        listed.extend(CONTACT_FIELDS.iter().map(|(path, semantic_type, description)| {
            AvailableVariable::new(
                *path,
                *semantic_type,
                *description,
                VariableSource::Step(trigger.id),
            )
        }));
    }

    listed.extend(workflow.variables().iter().map(|(name, variable)| {
        AvailableVariable::new(
            format!("$vars.{name}"),
            semantic_type_of(variable.var_type),
            variable.description.clone().unwrap_or_default(),
            VariableSource::User,
        )
    }));

    listed.extend(SystemVariables::catalogue().iter().map(|(path, description)| {
        AvailableVariable::new(
            *path,
            SemanticType::Text,
            *description,
            VariableSource::System,
        )
    }));

    listed
}

fn semantic_type_of(var_type: VariableType) -> SemanticType {
    match var_type {
        VariableType::String => SemanticType::Text,
        VariableType::Number => SemanticType::Number,
        VariableType::Boolean => SemanticType::Boolean,
        VariableType::Object => SemanticType::Object,
        VariableType::Array => SemanticType::Array,
    }
}
