use super::states::ApplicationStatus;
use thiserror::Error;

/// Reasons the transition validator refuses a status change
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GuardError {
    #[error("Status is already {status}")]
    NoOp { status: ApplicationStatus },

    #[error("Transition from {from} to {to} is not permitted")]
    NotPermitted {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },

    #[error("Backward transition from {from} to {to} requires confirmation")]
    BackwardConfirmRequired {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },

    #[error("Backward transitions are disabled (from {from} to {to})")]
    BackwardDisabled {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },

    #[error("Backward transition out of {from} requires a note")]
    NoteRequiredForBackward { from: ApplicationStatus },

    #[error("Backward transition from {from} to {to} is not allowed in batch updates")]
    BackwardInBatch {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },
}

/// Specific error type for persistence operations
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Concurrent modification detected for entity {entity_id}")]
    ConcurrentModification {
        entity_id: i64,
        expected: Option<i64>,
        actual: Option<i64>,
    },

    #[error("Application {entity_id} already exists")]
    AlreadyExists { entity_id: i64 },

    #[error("Invalid transition data: {field}")]
    InvalidTransitionData { field: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type GuardResult<T> = Result<T, GuardError>;
pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Helper for the common "stored value failed to decode" case
pub fn invalid_transition_data(field: impl Into<String>) -> PersistenceError {
    PersistenceError::InvalidTransitionData {
        field: field.into(),
    }
}
