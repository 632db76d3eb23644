//! Recorded step results.
//!
//! The history is the only mutable run state: the latest record per step plus
//! an append-only log of every result, in arrival order.

use chatflow_core::StepId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fmt;

/// Status of a recorded step result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Success,
    Error,
    Warning,
    Skipped,
    Running,
}

impl StepStatus {
    /// Returns true if a record with this status carries a usable output.
    #[must_use]
    pub fn has_output(self) -> bool {
        matches!(self, Self::Success | Self::Warning)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Skipped => "skipped",
            Self::Running => "running",
        };
        f.write_str(name)
    }
}

/// One recorded result of a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step_id: StepId,
    /// Context the step ran with, when it ran through the assembler.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<JsonValue>,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// Recorded results of one workflow.
#[derive(Debug, Clone, Default)]
pub struct RunHistory {
    latest: HashMap<StepId, StepRecord>,
    log: Vec<StepRecord>,
}

impl RunHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a result from the host's runtime.
    pub fn record_result(&mut self, step_id: StepId, output: Option<JsonValue>, status: StepStatus) {
        self.record(StepRecord {
            step_id,
            input: None,
            output,
            status,
            message: None,
            recorded_at: Utc::now(),
        });
    }

    /// Records a full record, replacing the step's latest one.
    pub fn record(&mut self, record: StepRecord) {
        self.log.push(record.clone());
        self.latest.insert(record.step_id, record);
    }

    /// Returns the latest record of a step.
    #[must_use]
    pub fn latest(&self, step_id: StepId) -> Option<&StepRecord> {
        self.latest.get(&step_id)
    }

    /// Returns the latest usable output of a step.
    ///
    /// Records with an error, skipped or running status carry no output.
    #[must_use]
    pub fn output(&self, step_id: StepId) -> Option<&JsonValue> {
        self.latest
            .get(&step_id)
            .filter(|record| record.status.has_output())
            .and_then(|record| record.output.as_ref())
    }

    /// Returns the context the step's latest run was given.
    #[must_use]
    pub fn input(&self, step_id: StepId) -> Option<&JsonValue> {
        self.latest
            .get(&step_id)
            .and_then(|record| record.input.as_ref())
    }

    /// Every record in arrival order.
    #[must_use]
    pub fn log(&self) -> &[StepRecord] {
        &self.log
    }

    /// Forgets a deleted step's latest record. The log keeps it.
    pub fn forget(&mut self, step_id: StepId) {
        self.latest.remove(&step_id);
    }

    pub fn clear(&mut self) {
        self.latest.clear();
        self.log.clear();
    }
}
