//! Crate-wide error type.

use thiserror::Error;

/// Errors that can occur during planning, validation, or persistence.
#[derive(Error, Debug)]
pub enum DagrError {
    #[error("Task {0} not found")]
    UnknownTask(String),

    #[error("Task {task} depends on non-existent task {dependency}")]
    UnknownDependency { task: String, dependency: String },

    #[error("Circular dependency detected: {}", .0.join(" -> "))]
    CycleDetected(Vec<String>),

    #[error("Import reference '{0}' matches no task in the batch or the project")]
    UnresolvedReference(String),

    #[error("Invalid {field}: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("No project found. Run 'dagr init' first")]
    StateNotInitialized,

    #[error("Cannot advance past {0} days without finding working capacity")]
    UnschedulableHorizon(u32),

    #[error("Cannot move task from {from} to {to}: {reason}")]
    StatusTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("Failed to read or write project state: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed project state: {0}")]
    Json(#[from] serde_json::Error),
}

impl DagrError {
    pub fn invalid_field(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DagrError>;
