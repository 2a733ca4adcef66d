use crate::state_machine::states::ApplicationStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-status time accounting stored on the application row
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DurationStats {
    #[serde(default)]
    pub status_durations: BTreeMap<ApplicationStatus, StatusDuration>,
    #[serde(default)]
    pub milestones: BTreeMap<Milestone, DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusDuration {
    pub total_minutes: i64,
    /// Share of all accounted minutes, 0..=100
    pub percentage: f64,
}

/// Points in the process recorded once, the first time they happen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Milestone {
    FirstResponse,
    FirstInterview,
    OfferReceived,
}

impl DurationStats {
    /// Account `duration_minutes` spent in `old_status` and update milestones for the move to
    /// `new_status`.
    pub fn accumulate(
        &mut self,
        old_status: Option<ApplicationStatus>,
        new_status: ApplicationStatus,
        duration_minutes: Option<i64>,
        changed_at: DateTime<Utc>,
    ) {
        if let (Some(old), Some(minutes)) = (old_status, duration_minutes) {
            self.status_durations.entry(old).or_default().total_minutes += minutes.max(0);
        }

        if old_status == Some(ApplicationStatus::Applied) && new_status != ApplicationStatus::Applied
        {
            self.mark(Milestone::FirstResponse, changed_at);
        }
        if new_status.stage().is_interview() {
            self.mark(Milestone::FirstInterview, changed_at);
        }
        if new_status == ApplicationStatus::OfferReceived {
            self.mark(Milestone::OfferReceived, changed_at);
        }

        self.recompute_percentages();
    }

    fn mark(&mut self, milestone: Milestone, at: DateTime<Utc>) {
        self.milestones.entry(milestone).or_insert(at);
    }

    /// Recompute every status's share. Leaves percentages untouched while nothing is accounted.
    pub fn recompute_percentages(&mut self) {
        let total = self.total_minutes();
        if total <= 0 {
            return;
        }
        for duration in self.status_durations.values_mut() {
            duration.percentage = duration.total_minutes as f64 / total as f64 * 100.0;
        }
    }

    pub fn total_minutes(&self) -> i64 {
        self.status_durations.values().map(|d| d.total_minutes).sum()
    }

    pub fn minutes_in(&self, status: ApplicationStatus) -> i64 {
        self.status_durations
            .get(&status)
            .map(|d| d.total_minutes)
            .unwrap_or(0)
    }
}
