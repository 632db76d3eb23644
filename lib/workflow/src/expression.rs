//! `{{path}}` template resolution.
//!
//! Resolution is total: every placeholder renders to something, and paths
//! that cannot be resolved render as [`UNRESOLVED`]. Nothing here executes a
//! step; it reads recorded outputs from a [`RunHistory`].
//!
//! Dispatch on the first path segment:
//! - `previous.output...`: the closest ancestor with a recorded output
//! - `contact...` / `message...`: the trigger's recorded output
//! - `$workflow.*`, `$now`, `$today`: computed system variables
//! - `$vars.<name>...`: user variables
//! - anything else: the step's own recorded input, then each ancestor's
//!   output, closest first

use crate::graph::StepGraph;
use crate::history::RunHistory;
use crate::resolver::{find_ancestors_in, nearest_output_in};
use crate::variables::SystemVariables;
use crate::workflow::Workflow;
use chatflow_core::StepId;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

/// Rendered in place of a path that cannot be resolved.
pub const UNRESOLVED: &str = "—";

/// A `{{...}}` span inside a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placeholder<'a> {
    /// Byte offset of the opening `{{`.
    pub start: usize,
    /// Byte offset just past the closing `}}`.
    pub end: usize,
    /// The trimmed expression between the braces.
    pub expr: &'a str,
}

/// Finds placeholders left to right.
///
/// Each `{{` is closed by the first following `}}`. An unclosed `{{` is plain
/// text.
#[must_use]
pub fn placeholders(template: &str) -> Vec<Placeholder<'_>> {
    let mut found = Vec::new();
    let mut cursor = 0;

    while let Some(open) = template[cursor..].find("{{") {
        let start = cursor + open;
        let body = start + 2;
        let Some(close) = template[body..].find("}}") else {
            break;
        };
        let end = body + close + 2;
        found.push(Placeholder {
            start,
            end,
            expr: template[body..body + close].trim(),
        });
        cursor = end;
    }
    found
}

/// Resolves templates against one workflow and a snapshot of its history.
pub struct ExpressionResolver<'a> {
    workflow: &'a Workflow,
    history: &'a RunHistory,
    graph: StepGraph,
    system: SystemVariables,
}

impl<'a> ExpressionResolver<'a> {
    /// Creates a resolver whose `$now` is the current time.
    #[must_use]
    pub fn new(workflow: &'a Workflow, history: &'a RunHistory) -> Self {
        Self::at(workflow, history, Utc::now())
    }

    /// Creates a resolver with a fixed `$now`.
    #[must_use]
    pub fn at(workflow: &'a Workflow, history: &'a RunHistory, now: DateTime<Utc>) -> Self {
        Self {
            workflow,
            history,
            graph: workflow.graph(),
            system: SystemVariables::new(workflow.id, workflow.name(), now),
        }
    }

    /// Replaces every placeholder in `template` as seen from `step_id`.
    #[must_use]
    pub fn resolve(&self, template: &str, step_id: StepId) -> String {
        let mut rendered = String::with_capacity(template.len());
        let mut cursor = 0;

        for placeholder in placeholders(template) {
            rendered.push_str(&template[cursor..placeholder.start]);
            match self.lookup(placeholder.expr, step_id) {
                Some(value) => rendered.push_str(&render(&value)),
                None => rendered.push_str(UNRESOLVED),
            }
            cursor = placeholder.end;
        }
        rendered.push_str(&template[cursor..]);
        rendered
    }

    /// Resolves a single expression (without braces) to its value.
    ///
    /// `null` values count as unresolved.
    #[must_use]
    pub fn lookup(&self, expr: &str, step_id: StepId) -> Option<JsonValue> {
        let path: Vec<&str> = expr.trim().split('.').collect();
        let value = match path.as_slice() {
            [""] => None,
            ["previous", "output", rest @ ..] => {
                nearest_output_in(&self.graph, self.history, step_id)
                    .and_then(|(_, output)| index(output, rest))
                    .cloned()
            }
            ["contact" | "message", ..] => self
                .workflow
                .trigger()
                .and_then(|trigger| self.history.output(trigger.id))
                .and_then(|output| index(output, &path))
                .cloned(),
            ["$vars", name, rest @ ..] => self
                .workflow
                .variable(name)
                .and_then(|var| index(&var.value, rest))
                .cloned(),
            [first, ..] if first.starts_with('$') => self.system.lookup(&path),
            _ => self.lookup_anywhere(&path, step_id),
        };
        value.filter(|value| !value.is_null())
    }

    fn lookup_anywhere(&self, path: &[&str], step_id: StepId) -> Option<JsonValue> {
        if let Some(value) = self
            .history
            .input(step_id)
            .and_then(|input| index(input, path))
        {
            return Some(value.clone());
        }

        find_ancestors_in(&self.graph, step_id)
            .into_iter()
            .filter_map(|ancestor| self.history.output(ancestor))
            .find_map(|output| index(output, path))
            .cloned()
    }
}

/// Resolves `template` as seen from `step_id`.
#[must_use]
pub fn resolve(
    workflow: &Workflow,
    history: &RunHistory,
    step_id: StepId,
    template: &str,
) -> String {
    ExpressionResolver::new(workflow, history).resolve(template, step_id)
}

/// Walks `path` into `value`. Numeric segments index arrays.
fn index<'v>(value: &'v JsonValue, path: &[&str]) -> Option<&'v JsonValue> {
    path.iter().try_fold(value, |current, segment| match current {
        JsonValue::Object(map) => map.get(*segment),
        JsonValue::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Renders a value for interpolation into text.
#[must_use]
pub fn render(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => UNRESOLVED.to_string(),
        JsonValue::String(text) => text.clone(),
        other => other.to_string(),
    }
}
