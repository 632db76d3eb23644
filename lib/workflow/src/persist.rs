//! Workflow documents: JSON encoding and files.
//!
//! Decoding checks the graph invariants, so a hand-edited document that
//! breaks them is rejected instead of loaded.

use crate::error::PersistenceError;
use crate::workflow::Workflow;
use rootcause::Report;
use std::fs;
use std::path::Path;
use tracing::debug;

impl Workflow {
    /// Encodes the workflow as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns `Serialize` if encoding fails.
    pub fn to_json(&self) -> Result<String, Report<PersistenceError>> {
        serde_json::to_string_pretty(self).map_err(|e| {
            PersistenceError::Serialize {
                details: e.to_string(),
            }
            .into()
        })
    }

    /// Decodes a workflow and checks its integrity.
    ///
    /// # Errors
    ///
    /// - `Deserialize` if the text is not a workflow document
    /// - `Integrity` if the document violates a graph invariant
    pub fn from_json(json: &str) -> Result<Self, Report<PersistenceError>> {
        let workflow: Self =
            serde_json::from_str(json).map_err(|e| PersistenceError::Deserialize {
                details: e.to_string(),
            })?;
        workflow.check_integrity().map_err(|report| PersistenceError::Integrity {
            violation: report.current_context().clone(),
        })?;
        Ok(workflow)
    }

    /// Writes the workflow to `path`.
    ///
    /// # Errors
    ///
    /// Returns `Serialize` or `Io` on failure.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Report<PersistenceError>> {
        let path = path.as_ref();
        let json = self.to_json()?;
        fs::write(path, json).map_err(|e| io_error(path, &e))?;
        debug!(workflow_id = %self.id, path = %path.display(), "saved workflow");
        Ok(())
    }

    /// Reads a workflow from `path`.
    ///
    /// # Errors
    ///
    /// Returns `Io`, `Deserialize` or `Integrity` on failure.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Report<PersistenceError>> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| io_error(path, &e))?;
        let workflow = Self::from_json(&json)?;
        debug!(workflow_id = %workflow.id, path = %path.display(), "loaded workflow");
        Ok(workflow)
    }
}

fn io_error(path: &Path, error: &std::io::Error) -> PersistenceError {
    PersistenceError::Io {
        path: path.display().to_string(),
        details: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::BranchLabel;
    use crate::error::GraphError;
    use crate::step::{Step, StepKind};
    use crate::variables::{Variable, VariableType};
    use serde_json::{Value as JsonValue, json};

    fn shop_workflow() -> Workflow {
        let mut workflow = Workflow::new("Shop");
        let trigger = workflow
            .add_step(StepKind::MessageReceived, "Message")
            .unwrap();
        let route = workflow.add_step(StepKind::SwitchRouter, "Route").unwrap();
        let catalog = workflow.add_step(StepKind::ShowCatalog, "Catalog").unwrap();
        let pay = workflow.add_step(StepKind::Checkout, "Pay").unwrap();
        workflow.connect(trigger, route, None).unwrap();
        workflow
            .connect(route, catalog, Some(BranchLabel::case("1")))
            .unwrap();
        workflow
            .connect(route, pay, Some(BranchLabel::Default))
            .unwrap();
        workflow.disconnect(catalog, None).unwrap();
        workflow
            .set_variable(
                "shop_name",
                Variable {
                    var_type: VariableType::String,
                    value: json!("Chez Awa"),
                    description: None,
                },
            )
            .unwrap();
        workflow
    }

    #[test]
    fn file_round_trip() {
        let workflow = shop_workflow();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shop.json");

        workflow.save(&path).unwrap();
        let loaded = Workflow::load(&path).unwrap();
        assert_eq!(loaded, workflow);
    }

    #[test]
    fn positions_are_not_persisted() {
        let mut workflow = Workflow::new("Canvas");
        let reply = workflow
            .insert_step(Step::new(StepKind::SendText, "Reply").at(120.0, 40.0))
            .unwrap();
        assert_eq!(workflow.step(reply).unwrap().position.x, 120.0);

        let json = workflow.to_json().unwrap();
        assert!(!json.contains("position"));
        let loaded = Workflow::from_json(&json).unwrap();
        assert_eq!(loaded.step(reply).unwrap().position.x, 0.0);
    }

    #[test]
    fn duplicate_step_ids_are_rejected() {
        let workflow = shop_workflow();
        let mut document: JsonValue = serde_json::from_str(&workflow.to_json().unwrap()).unwrap();
        let first_id = document["steps"][0]["id"].clone();
        document["steps"][2]["id"] = first_id;

        let err = Workflow::from_json(&document.to_string()).unwrap_err();
        assert!(matches!(
            err.current_context(),
            PersistenceError::Integrity {
                violation: GraphError::DuplicateStep { .. }
            }
        ));
    }

    #[test]
    fn second_trigger_is_rejected() {
        let workflow = shop_workflow();
        let mut document: JsonValue = serde_json::from_str(&workflow.to_json().unwrap()).unwrap();
        document["steps"][3]["type"] = json!("keyword_trigger");

        let err = Workflow::from_json(&document.to_string()).unwrap_err();
        assert!(matches!(
            err.current_context(),
            PersistenceError::Integrity {
                violation: GraphError::DuplicateTrigger { .. }
            }
        ));
    }

    #[test]
    fn legacy_keyword_tag_counts_as_second_trigger() {
        let workflow = shop_workflow();
        let mut document: JsonValue = serde_json::from_str(&workflow.to_json().unwrap()).unwrap();
        document["steps"][3]["type"] = json!("keyword");

        let err = Workflow::from_json(&document.to_string()).unwrap_err();
        assert!(matches!(
            err.current_context(),
            PersistenceError::Integrity {
                violation: GraphError::DuplicateTrigger { .. }
            }
        ));
    }

    #[test]
    fn float_config_values_round_trip_exactly() {
        let mut workflow = Workflow::new("Tuning");
        let classify = workflow
            .add_step(StepKind::IntentClassification, "Classify")
            .unwrap();
        workflow
            .set_config_value(classify, "temperature", json!(0.479_607_564_269_825_87))
            .unwrap();

        let loaded = Workflow::from_json(&workflow.to_json().unwrap()).unwrap();
        assert_eq!(
            loaded.step(classify).unwrap().config.get("temperature"),
            Some(&json!(0.479_607_564_269_825_87))
        );
        assert_eq!(loaded, workflow);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let err = Workflow::from_json("{\"steps\": 3}").unwrap_err();
        assert!(matches!(
            err.current_context(),
            PersistenceError::Deserialize { .. }
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Workflow::load(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err.current_context(), PersistenceError::Io { .. }));
    }
}
