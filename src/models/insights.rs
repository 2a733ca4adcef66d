use crate::constants::{
    HIGH_SUCCESS_RATE_PERCENT, LOW_SUCCESS_RATE_PERCENT, MIN_HEALTHY_APPLICATION_COUNT,
    SLOW_SCREENING_MINUTES,
};
use crate::state_machine::states::{ApplicationStatus, Stage};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Pass rate across one interview hand-off
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRate {
    pub stage: Stage,
    pub from: ApplicationStatus,
    pub to: ApplicationStatus,
    /// Distinct applications that ever reached `from`
    pub total_count: i64,
    /// Distinct applications with a recorded `from -> to` transition
    pub success_count: i64,
    pub success_rate: f64,
}

impl StageRate {
    pub fn new(from: ApplicationStatus, to: ApplicationStatus, total_count: i64, success_count: i64) -> Self {
        Self {
            stage: from.stage(),
            from,
            to,
            total_count,
            success_count,
            success_rate: percentage(success_count, total_count),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsReport {
    pub owner_id: i64,
    pub total_applications: i64,
    pub status_distribution: BTreeMap<ApplicationStatus, i64>,
    pub success_rate: f64,
    /// Mean minutes spent in each status before leaving it
    pub average_durations: BTreeMap<ApplicationStatus, f64>,
    pub stage_analysis: Vec<StageRate>,
}

impl AnalyticsReport {
    pub fn from_distribution(
        owner_id: i64,
        status_distribution: BTreeMap<ApplicationStatus, i64>,
        average_durations: BTreeMap<ApplicationStatus, f64>,
        stage_analysis: Vec<StageRate>,
    ) -> Self {
        let total_applications = status_distribution.values().sum();
        let passed = status_distribution
            .iter()
            .filter(|(status, _)| status.is_passed())
            .map(|(_, count)| *count)
            .sum();
        Self {
            owner_id,
            total_applications,
            success_rate: percentage(passed, total_applications),
            status_distribution,
            average_durations,
            stage_analysis,
        }
    }

    /// Applications still waiting on a stage outcome
    pub fn active_applications(&self) -> i64 {
        self.status_distribution
            .iter()
            .filter(|(status, _)| status.is_in_progress())
            .map(|(_, count)| *count)
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub status: ApplicationStatus,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendReport {
    pub owner_id: i64,
    pub days: u32,
    pub points: Vec<TrendPoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    ImproveResumeStrategy,
    KeepStrategy,
    ApplyMore,
    FollowUpScreening,
    KeepGoing,
}

impl Recommendation {
    pub fn message(self) -> &'static str {
        match self {
            Self::ImproveResumeStrategy => "建议优化简历和投递策略，当前成功率较低",
            Self::KeepStrategy => "投递策略很好，继续保持",
            Self::ApplyMore => "建议增加投递数量，扩大求职机会",
            Self::FollowUpScreening => "简历筛选时间较长，可考虑主动跟进或优化简历",
            Self::KeepGoing => "继续保持良好的求职进展",
        }
    }

    /// Rule-based advice derived from an analytics report
    pub fn for_report(report: &AnalyticsReport) -> Vec<Recommendation> {
        let mut out = Vec::new();

        if report.success_rate < LOW_SUCCESS_RATE_PERCENT {
            out.push(Self::ImproveResumeStrategy);
        } else if report.success_rate > HIGH_SUCCESS_RATE_PERCENT {
            out.push(Self::KeepStrategy);
        }

        if report.total_applications < MIN_HEALTHY_APPLICATION_COUNT {
            out.push(Self::ApplyMore);
        }

        let screening = report
            .average_durations
            .get(&ApplicationStatus::ResumeScreening)
            .copied()
            .unwrap_or(0.0);
        if screening > SLOW_SCREENING_MINUTES {
            out.push(Self::FollowUpScreening);
        }

        if out.is_empty() {
            out.push(Self::KeepGoing);
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessInsights {
    pub owner_id: i64,
    pub total_applications: i64,
    pub success_rate: f64,
    pub active_applications: i64,
    pub average_durations: BTreeMap<ApplicationStatus, f64>,
    pub stage_analysis: Vec<StageRate>,
    pub recent_activity: TrendReport,
    pub recommendations: Vec<Recommendation>,
}

/// `part / whole * 100`, zero when `whole` is zero
pub fn percentage(part: i64, whole: i64) -> f64 {
    if whole <= 0 {
        return 0.0;
    }
    part as f64 / whole as f64 * 100.0
}
