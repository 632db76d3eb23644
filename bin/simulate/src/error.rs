//! Errors for the simulate binary.

use std::fmt;

#[derive(Debug)]
pub enum SimulateError {
    /// `CHATFLOW__*` configuration could not be parsed.
    Config { details: String },
    /// The workflow document could not be loaded.
    Workflow { details: String },
    /// The executor script could not be read or parsed.
    Script { path: String, details: String },
    /// The simulation itself failed.
    Run { details: String },
}

impl fmt::Display for SimulateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { details } => write!(f, "invalid configuration: {details}"),
            Self::Workflow { details } => write!(f, "cannot load workflow: {details}"),
            Self::Script { path, details } => write!(f, "cannot load script '{path}': {details}"),
            Self::Run { details } => write!(f, "simulation failed: {details}"),
        }
    }
}

impl std::error::Error for SimulateError {}
