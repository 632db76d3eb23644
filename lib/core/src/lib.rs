//! Core domain types and utilities for chatflow.
//!
//! This crate provides the identifiers and error handling shared by the
//! workflow engine and the hosts that embed it.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{ParseIdError, RunId, StepId, WorkflowId};
