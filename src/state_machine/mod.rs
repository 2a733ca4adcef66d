// Status-transition engine for job applications
//
// The closed status vocabulary, the validator that classifies proposed changes, the
// optimistic version guard, and the recorder that keeps the audit trail and rolling
// aggregates consistent with every accepted write.

pub mod concurrency;
pub mod errors;
pub mod guards;
pub mod history;
pub mod persistence;
pub mod states;

// Re-export main types for convenient access
pub use errors::{GuardError, PersistenceError};
pub use guards::{classify, AllowedBy, BackwardPolicy, TransitionValidator, TransitionVerdict};
pub use history::{HistoryRecorder, PlannedTransition};
pub use states::{ApplicationStatus, Stage, UnknownStatus};

// Storage seams
pub use persistence::{
    AnalyticsSource, EntityStore, FlowTemplateStore, RecordOrder, StatusConfigStore, StatusWrite,
    TrackingFields,
};
