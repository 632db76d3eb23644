//! Command-line inputs: the inbound message and the executor script.

use crate::error::SimulateError;
use chatflow_workflow::ScriptedExecutor;
use rootcause::Report;
use serde_json::Value as JsonValue;
use std::path::Path;

/// Reads the inbound message argument.
///
/// Text that parses as a JSON object is used as-is; anything else is the
/// message text.
pub fn parse_inbound(raw: &str) -> JsonValue {
    match serde_json::from_str::<JsonValue>(raw) {
        Ok(value @ JsonValue::Object(_)) => value,
        _ => JsonValue::from(raw),
    }
}

/// Loads an executor script, or an empty one when no path is given.
pub fn load_script(path: Option<&Path>) -> Result<ScriptedExecutor, Report<SimulateError>> {
    let Some(path) = path else {
        return ScriptedExecutor::from_json(JsonValue::Object(serde_json::Map::new()))
            .map_err(|e| script_error(Path::new("<empty>"), &e.to_string()).into());
    };

    let text = std::fs::read_to_string(path).map_err(|e| script_error(path, &e.to_string()))?;
    let script: JsonValue =
        serde_json::from_str(&text).map_err(|e| script_error(path, &e.to_string()))?;
    ScriptedExecutor::from_json(script).map_err(|e| script_error(path, &e.to_string()).into())
}

fn script_error(path: &Path, details: &str) -> SimulateError {
    SimulateError::Script {
        path: path.display().to_string(),
        details: details.to_string(),
    }
}
