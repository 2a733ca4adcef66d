pub mod duration_stats;
pub mod flow_template;
pub mod insights;
pub mod status_summary;
pub mod tracked_entity;
pub mod transition_record;
pub mod user_preference;

// Re-export core models for easy access
pub use duration_stats::{DurationStats, Milestone, StatusDuration};
pub use flow_template::{FlowConfigError, FlowTemplate, TransitionGraph};
pub use insights::{
    AnalyticsReport, ProcessInsights, Recommendation, StageRate, TrendPoint, TrendReport,
};
pub use status_summary::{StatusHistorySummary, SummaryEntry, SummaryMetadata};
pub use tracked_entity::TrackedEntity;
pub use transition_record::{
    HistoryPage, NewTransitionRecord, Timeline, TransitionRecord, TransitionSource,
};
pub use user_preference::{PreferenceConfig, PreferenceError, TimelineView, UserPreference};
