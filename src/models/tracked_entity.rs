use super::duration_stats::DurationStats;
use super::status_summary::StatusHistorySummary;
use crate::state_machine::states::ApplicationStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A job application as seen by the transition engine.
///
/// Only the status-related columns are modelled here; company, position and the other
/// descriptive fields belong to ordinary CRUD paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedEntity {
    pub id: i64,
    pub owner_id: i64,
    pub status: ApplicationStatus,
    /// `None` until the first recorded transition
    pub version: Option<i64>,
    pub last_status_change_at: Option<DateTime<Utc>>,
    pub status_history_summary: StatusHistorySummary,
    pub status_duration_stats: DurationStats,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TrackedEntity {
    /// A freshly created application that has not gone through the engine yet
    pub fn new(id: i64, owner_id: i64, status: ApplicationStatus, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            owner_id,
            status,
            version: None,
            last_status_change_at: None,
            status_history_summary: StatusHistorySummary::default(),
            status_duration_stats: DurationStats::default(),
            created_at,
            updated_at: created_at,
        }
    }

    /// Version used for comparisons; a missing version counts as zero
    pub fn effective_version(&self) -> i64 {
        self.version.unwrap_or(0)
    }

    pub fn next_version(&self) -> i64 {
        self.effective_version() + 1
    }

    /// Start of the interval that ends with the next transition
    pub fn status_since(&self) -> DateTime<Utc> {
        self.last_status_change_at.unwrap_or(self.created_at)
    }
}

/// Whole minutes elapsed from `since` to `until`, never negative
pub fn elapsed_minutes(since: DateTime<Utc>, until: DateTime<Utc>) -> i64 {
    (until - since).num_minutes().max(0)
}
