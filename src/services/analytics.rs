use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::constants::{INSIGHTS_TREND_DAYS, STAGE_PAIRS};
use crate::error::{Result, TrackerError};
use crate::models::{AnalyticsReport, ProcessInsights, Recommendation, StageRate, TrendReport};
use crate::state_machine::persistence::AnalyticsSource;
use chrono::Duration;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Read-only reporting over applications and their transition records
pub struct AnalyticsAggregator<A: AnalyticsSource + ?Sized> {
    source: Arc<A>,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
}

impl<A: AnalyticsSource + ?Sized> Clone for AnalyticsAggregator<A> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            config: self.config.clone(),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<A: AnalyticsSource + ?Sized> AnalyticsAggregator<A> {
    pub fn new(source: Arc<A>, config: EngineConfig) -> Self {
        Self::with_clock(source, config, Arc::new(SystemClock))
    }

    pub fn with_clock(source: Arc<A>, config: EngineConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            source,
            config,
            clock,
        }
    }

    /// Distribution, success rate, average durations and stage pass rates for one owner
    #[instrument(skip(self))]
    pub async fn get_analytics(&self, owner_id: i64) -> Result<AnalyticsReport> {
        let distribution = self.source.status_counts(owner_id).await?;
        let average_durations = self.source.average_durations(owner_id).await?;

        let mut stage_analysis = Vec::with_capacity(STAGE_PAIRS.len());
        for (from, to) in STAGE_PAIRS {
            let (reached, passed) = self.source.stage_counts(owner_id, from, to).await?;
            stage_analysis.push(StageRate::new(from, to, reached, passed));
        }

        let report =
            AnalyticsReport::from_distribution(owner_id, distribution, average_durations, stage_analysis);
        debug!(
            owner_id = owner_id,
            total = report.total_applications,
            success_rate = report.success_rate,
            "Computed status analytics"
        );
        Ok(report)
    }

    /// Per-day, per-status transition counts over the last `days` days.
    ///
    /// `days <= 0` selects the configured default window; anything above the configured
    /// maximum is rejected.
    #[instrument(skip(self))]
    pub async fn get_trends(&self, owner_id: i64, days: i64) -> Result<TrendReport> {
        let days = self.resolve_window(days)?;
        self.trends_for(owner_id, days).await
    }

    /// Analytics plus recent activity and rule-based recommendations
    #[instrument(skip(self))]
    pub async fn get_process_insights(&self, owner_id: i64) -> Result<ProcessInsights> {
        let report = self.get_analytics(owner_id).await?;
        let recent_activity = self.trends_for(owner_id, INSIGHTS_TREND_DAYS).await?;
        let recommendations = Recommendation::for_report(&report);

        Ok(ProcessInsights {
            owner_id,
            total_applications: report.total_applications,
            success_rate: report.success_rate,
            active_applications: report.active_applications(),
            average_durations: report.average_durations,
            stage_analysis: report.stage_analysis,
            recent_activity,
            recommendations,
        })
    }

    async fn trends_for(&self, owner_id: i64, days: u32) -> Result<TrendReport> {
        let since = self.clock.now() - Duration::days(i64::from(days));
        let points = self.source.daily_transition_counts(owner_id, since).await?;
        Ok(TrendReport {
            owner_id,
            days,
            points,
        })
    }

    fn resolve_window(&self, days: i64) -> Result<u32> {
        if days <= 0 {
            return Ok(self.config.default_trend_days);
        }
        if days > i64::from(self.config.max_trend_days) {
            return Err(TrackerError::ValidationError(format!(
                "days must not exceed {}",
                self.config.max_trend_days
            )));
        }
        // Bounded by max_trend_days above
        Ok(days as u32)
    }
}
