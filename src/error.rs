//! Error type shared by the store and service layers.

use crate::fields::{ProcessKind, TaskStatus};

/// Errors raised while reading, updating or persisting process documents.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed document: {0}")]
    Json(#[from] serde_json::Error),

    /// The store refused a write. Never retried internally.
    #[error("Write rejected for {document}: {reason}")]
    WriteFailure { document: String, reason: String },

    #[error("No {kind} process exists for subject {subject_id}")]
    InstanceNotFound { kind: ProcessKind, subject_id: String },

    /// A stored instance names a different subject than the one requested.
    #[error("{document} belongs to {found}, not {expected}")]
    OwnerMismatch {
        document: String,
        expected: String,
        found: String,
    },

    #[error("Stage not found: {0}")]
    StageNotFound(String),

    #[error("Task {task_id} not found in stage {stage_id}")]
    TaskNotFound { stage_id: String, task_id: String },

    #[error("Task {task_id} cannot move from {from} to {to}")]
    InvalidTransition {
        task_id: String,
        from: TaskStatus,
        to: TaskStatus,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
