use crate::state_machine::errors::{GuardError, PersistenceError};
use crate::state_machine::states::{ApplicationStatus, UnknownStatus};
use thiserror::Error;

/// Errors surfaced by the status-transition engine.
///
/// Every variant that concerns a particular application carries its id, so a failed batch
/// names the entity that aborted it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrackerError {
    #[error("Application {entity_id} not found")]
    NotFound { entity_id: i64 },

    #[error("Invalid status: {value}")]
    InvalidStatus { value: String },

    #[error("Application {entity_id} is already in status {status}")]
    NoOp {
        entity_id: i64,
        status: ApplicationStatus,
    },

    #[error("Application {entity_id}: transition from {from} to {to} denied: {reason}")]
    TransitionDenied {
        entity_id: i64,
        from: ApplicationStatus,
        to: ApplicationStatus,
        reason: String,
    },

    #[error("Application {entity_id}: version conflict (expected {expected:?}, actual {actual:?})")]
    VersionConflict {
        entity_id: i64,
        expected: Option<i64>,
        actual: Option<i64>,
    },

    #[error("Application {entity_id}: backward transition from {from} to {to} requires confirmation")]
    BackwardConfirmRequired {
        entity_id: i64,
        from: ApplicationStatus,
        to: ApplicationStatus,
    },

    #[error("Application {entity_id}: backward transitions are disabled ({from} to {to})")]
    BackwardDisabled {
        entity_id: i64,
        from: ApplicationStatus,
        to: ApplicationStatus,
    },

    #[error("Application {entity_id}: leaving {from} backward requires a note")]
    NoteRequiredForBackward {
        entity_id: i64,
        from: ApplicationStatus,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Store error: {0}")]
    StoreError(String),
}

/// Flat discriminant of [`TrackerError`] for callers that branch on the failure class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    InvalidStatus,
    NoOp,
    TransitionDenied,
    VersionConflict,
    BackwardConfirmRequired,
    BackwardDisabled,
    NoteRequiredForBackward,
    ValidationError,
    StoreError,
}

impl TrackerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidStatus { .. } => ErrorKind::InvalidStatus,
            Self::NoOp { .. } => ErrorKind::NoOp,
            Self::TransitionDenied { .. } => ErrorKind::TransitionDenied,
            Self::VersionConflict { .. } => ErrorKind::VersionConflict,
            Self::BackwardConfirmRequired { .. } => ErrorKind::BackwardConfirmRequired,
            Self::BackwardDisabled { .. } => ErrorKind::BackwardDisabled,
            Self::NoteRequiredForBackward { .. } => ErrorKind::NoteRequiredForBackward,
            Self::ValidationError(_) => ErrorKind::ValidationError,
            Self::StoreError(_) => ErrorKind::StoreError,
        }
    }

    /// The application this error concerns, when there is one
    pub fn entity_id(&self) -> Option<i64> {
        match self {
            Self::NotFound { entity_id }
            | Self::NoOp { entity_id, .. }
            | Self::TransitionDenied { entity_id, .. }
            | Self::VersionConflict { entity_id, .. }
            | Self::BackwardConfirmRequired { entity_id, .. }
            | Self::BackwardDisabled { entity_id, .. }
            | Self::NoteRequiredForBackward { entity_id, .. } => Some(*entity_id),
            Self::InvalidStatus { .. } | Self::ValidationError(_) | Self::StoreError(_) => None,
        }
    }

    /// Attach an application id to a validator denial
    pub fn from_guard(entity_id: i64, err: GuardError) -> Self {
        match err {
            GuardError::NoOp { status } => Self::NoOp { entity_id, status },
            GuardError::NotPermitted { from, to } => Self::TransitionDenied {
                entity_id,
                from,
                to,
                reason: "transition not permitted".to_string(),
            },
            GuardError::BackwardInBatch { from, to } => Self::TransitionDenied {
                entity_id,
                from,
                to,
                reason: "backward transitions are not allowed in batch updates".to_string(),
            },
            GuardError::BackwardConfirmRequired { from, to } => {
                Self::BackwardConfirmRequired { entity_id, from, to }
            }
            GuardError::BackwardDisabled { from, to } => {
                Self::BackwardDisabled { entity_id, from, to }
            }
            GuardError::NoteRequiredForBackward { from } => {
                Self::NoteRequiredForBackward { entity_id, from }
            }
        }
    }
}

impl From<PersistenceError> for TrackerError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::ConcurrentModification {
                entity_id,
                expected,
                actual,
            } => Self::VersionConflict {
                entity_id,
                expected,
                actual,
            },
            PersistenceError::AlreadyExists { entity_id } => {
                Self::ValidationError(format!("application {entity_id} already exists"))
            }
            other => Self::StoreError(other.to_string()),
        }
    }
}

impl From<UnknownStatus> for TrackerError {
    fn from(err: UnknownStatus) -> Self {
        Self::InvalidStatus { value: err.0 }
    }
}

pub type Result<T> = std::result::Result<T, TrackerError>;
