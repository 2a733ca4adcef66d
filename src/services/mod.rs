//! # Services
//!
//! Application-facing operations built on the state machine and the storage seams.
//!
//! - [`status_tracking`] - register applications, change their status, read history
//! - [`analytics`] - distribution, pass rates, trends and recommendations
//! - [`status_config`] - available next statuses and owner preferences

pub mod analytics;
pub mod status_config;
pub mod status_tracking;

pub use analytics::AnalyticsAggregator;
pub use status_config::{AvailableTransition, StatusConfigService};
pub use status_tracking::{
    BatchStatusUpdate, BatchUpdateSummary, StatusTrackingService, StatusUpdateOutcome,
    StatusUpdateRequest,
};
