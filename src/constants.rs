//! # Engine Constants
//!
//! Fixed tables and default limits that define the operational boundaries of the
//! status-transition engine. Limits that deployments may tune are mirrored in
//! [`crate::config::EngineConfig`]; the values here are its defaults.

use crate::state_machine::states::ApplicationStatus;

/// Direct-advance shortcuts permitted without a template edge
pub const DIRECT_ADVANCES: [(ApplicationStatus, ApplicationStatus); 4] = [
    (ApplicationStatus::WrittenTest, ApplicationStatus::FirstInterview),
    (ApplicationStatus::FirstInterview, ApplicationStatus::SecondInterview),
    (ApplicationStatus::SecondInterview, ApplicationStatus::ThirdInterview),
    (ApplicationStatus::ThirdInterview, ApplicationStatus::HrInterview),
];

/// Hand-offs measured by stage analysis; the same four pairs as the direct advances
pub const STAGE_PAIRS: [(ApplicationStatus, ApplicationStatus); 4] = DIRECT_ADVANCES;

/// Metadata keys the engine writes onto transition records
pub mod metadata_keys {
    pub const NOTE: &str = "note";
    pub const SOURCE: &str = "source";
    pub const BATCH_ID: &str = "batch_id";
    pub const BACKWARD: &str = "backward";
    pub const FROM: &str = "from";
    pub const TO: &str = "to";
}

/// Default limits
pub mod defaults {
    pub const MAX_BATCH_SIZE: usize = 100;
    pub const DEFAULT_PAGE_SIZE: u32 = 50;
    pub const MAX_PAGE_SIZE: u32 = 100;
    pub const DEFAULT_TREND_DAYS: u32 = 30;
    pub const MAX_TREND_DAYS: u32 = 365;
    pub const MAX_NOTE_LENGTH: usize = 1000;
    pub const ALLOW_BACKWARD: bool = true;
}

/// Window used by the process-insights report
pub const INSIGHTS_TREND_DAYS: u32 = 90;

// Recommendation thresholds
pub const LOW_SUCCESS_RATE_PERCENT: f64 = 10.0;
pub const HIGH_SUCCESS_RATE_PERCENT: f64 = 50.0;
pub const MIN_HEALTHY_APPLICATION_COUNT: i64 = 10;
pub const SLOW_SCREENING_MINUTES: f64 = 7.0 * 24.0 * 60.0;
