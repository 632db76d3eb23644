//! Workflow variables.
//!
//! User variables are named, typed values stored with the workflow and read
//! through `{{$vars.<name>}}`. System variables (`$workflow.id`,
//! `$workflow.name`, `$now`, `$today`) are computed at resolution time and
//! never stored.

use crate::error::VariableError;
use chatflow_core::WorkflowId;
use chrono::{DateTime, SecondsFormat, Utc};
use rootcause::Report;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;

/// The declared type of a user variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableType {
    String,
    Number,
    Boolean,
    Object,
    Array,
}

impl VariableType {
    /// Returns true if `value` has this type.
    #[must_use]
    pub fn admits(self, value: &JsonValue) -> bool {
        matches!(
            (self, value),
            (Self::String, JsonValue::String(_))
                | (Self::Number, JsonValue::Number(_))
                | (Self::Boolean, JsonValue::Bool(_))
                | (Self::Object, JsonValue::Object(_))
                | (Self::Array, JsonValue::Array(_))
        )
    }

    /// Converts text typed into a form field into a value of this type.
    ///
    /// Numbers that fail to parse become `0` and booleans are true only for
    /// `"true"` (any case). Objects and arrays must be valid JSON of the right
    /// shape.
    ///
    /// # Errors
    ///
    /// Returns an error if an object or array value is not valid JSON of the
    /// declared shape.
    pub fn parse(self, name: &str, raw: &str) -> Result<JsonValue, Report<VariableError>> {
        match self {
            Self::String => Ok(JsonValue::from(raw)),
            Self::Number => Ok(raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map_or_else(|| JsonValue::from(0), JsonValue::from)),
            Self::Boolean => Ok(JsonValue::from(raw.trim().eq_ignore_ascii_case("true"))),
            Self::Object | Self::Array => {
                let value: JsonValue =
                    serde_json::from_str(raw).map_err(|e| VariableError::InvalidValue {
                        name: name.to_string(),
                        expected: self,
                        details: e.to_string(),
                    })?;
                if !self.admits(&value) {
                    return Err(VariableError::InvalidValue {
                        name: name.to_string(),
                        expected: self,
                        details: "wrong JSON shape".to_string(),
                    }
                    .into());
                }
                Ok(value)
            }
        }
    }
}

impl fmt::Display for VariableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        };
        f.write_str(name)
    }
}

/// A user-defined workflow variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    #[serde(rename = "type")]
    pub var_type: VariableType,
    pub value: JsonValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// The user variables of a workflow, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowVariables(BTreeMap<String, Variable>);

impl WorkflowVariables {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a variable, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is not an identifier or the value does not
    /// have the declared type.
    pub fn set(
        &mut self,
        name: impl Into<String>,
        variable: Variable,
    ) -> Result<(), Report<VariableError>> {
        let name = name.into();
        if !is_identifier(&name) {
            return Err(VariableError::InvalidName { name }.into());
        }
        if !variable.var_type.admits(&variable.value) {
            return Err(VariableError::InvalidValue {
                name,
                expected: variable.var_type,
                details: format!("got {}", json_kind(&variable.value)),
            }
            .into());
        }
        self.0.insert(name, variable);
        Ok(())
    }

    /// Removes a variable, returning it if it existed.
    pub fn remove(&mut self, name: &str) -> Option<Variable> {
        self.0.remove(name)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Variable)> {
        self.0.iter().map(|(name, var)| (name.as_str(), var))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the values as a flat JSON map, as seen by steps.
    #[must_use]
    pub fn values(&self) -> serde_json::Map<String, JsonValue> {
        self.0
            .iter()
            .map(|(name, var)| (name.clone(), var.value.clone()))
            .collect()
    }
}

/// Values of the computed `$` variables at one instant.
#[derive(Debug, Clone)]
pub struct SystemVariables {
    workflow_id: WorkflowId,
    workflow_name: String,
    now: DateTime<Utc>,
}

impl SystemVariables {
    #[must_use]
    pub fn new(workflow_id: WorkflowId, workflow_name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            workflow_id,
            workflow_name: workflow_name.into(),
            now,
        }
    }

    /// Resolves a `$`-prefixed path such as `["$workflow", "id"]`.
    ///
    /// `$vars` is not handled here since it reads stored values.
    #[must_use]
    pub fn lookup(&self, path: &[&str]) -> Option<JsonValue> {
        match path {
            ["$workflow", "id"] => Some(JsonValue::from(self.workflow_id.to_string())),
            ["$workflow", "name"] => Some(JsonValue::from(self.workflow_name.as_str())),
            ["$now"] => Some(JsonValue::from(
                self.now.to_rfc3339_opts(SecondsFormat::Secs, true),
            )),
            ["$today"] => Some(JsonValue::from(self.now.format("%Y-%m-%d").to_string())),
            _ => None,
        }
    }

    /// Every system path with a short description.
    #[must_use]
    pub fn catalogue() -> &'static [(&'static str, &'static str)] {
        &[
            ("$workflow.id", "ID of this workflow"),
            ("$workflow.name", "Name of this workflow"),
            ("$now", "Current date and time (UTC, RFC 3339)"),
            ("$today", "Current date (YYYY-MM-DD)"),
        ]
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
