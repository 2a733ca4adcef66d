use crate::state_machine::states::{ApplicationStatus, Stage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Rolling history summary stored on the application row.
///
/// Mirrors the transition table in compact form: one entry per accepted, non-suppressed
/// transition plus aggregate counters that are recomputed after every append.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusHistorySummary {
    #[serde(default)]
    pub history: Vec<SummaryEntry>,
    #[serde(default)]
    pub metadata: SummaryMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryEntry {
    pub old_status: Option<ApplicationStatus>,
    pub new_status: ApplicationStatus,
    pub status_changed_at: DateTime<Utc>,
    pub duration_minutes: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryMetadata {
    pub total_changes: i64,
    pub current_status: Option<ApplicationStatus>,
    pub last_changed: Option<DateTime<Utc>>,
    pub total_duration_minutes: i64,
    #[serde(default)]
    pub current_stage: Option<Stage>,
}

impl StatusHistorySummary {
    /// Append one transition and recompute the counters
    pub fn record(
        &mut self,
        old_status: Option<ApplicationStatus>,
        new_status: ApplicationStatus,
        changed_at: DateTime<Utc>,
        duration_minutes: Option<i64>,
    ) {
        self.history.push(SummaryEntry {
            old_status,
            new_status,
            status_changed_at: changed_at,
            duration_minutes,
        });
        self.recompute(new_status, changed_at);
    }

    fn recompute(&mut self, current: ApplicationStatus, changed_at: DateTime<Utc>) {
        self.metadata.total_changes = self.history.len() as i64;
        self.metadata.current_status = Some(current);
        self.metadata.current_stage = Some(current.stage());
        self.metadata.last_changed = Some(changed_at);
        self.metadata.total_duration_minutes = self
            .history
            .iter()
            .filter_map(|entry| entry.duration_minutes)
            .sum();
    }

    pub fn total_changes(&self) -> i64 {
        self.metadata.total_changes
    }
}
