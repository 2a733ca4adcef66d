use super::errors::PersistenceResult;
use super::states::ApplicationStatus;
use crate::models::{
    DurationStats, FlowTemplate, NewTransitionRecord, StatusHistorySummary, TrackedEntity,
    TransitionRecord, TrendPoint, UserPreference,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// History-bearing columns written by an accepted, non-suppressed transition
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingFields {
    pub version: i64,
    pub last_status_change_at: DateTime<Utc>,
    pub status_history_summary: StatusHistorySummary,
    pub status_duration_stats: DurationStats,
}

/// A compare-and-swap write of an application's status columns.
///
/// The write only applies while the stored row still carries `expected_version` and
/// `expected_status`. With `tracking == None` the transition is suppressed and only
/// `status` and `updated_at` change.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusWrite {
    pub entity_id: i64,
    pub owner_id: i64,
    pub expected_version: Option<i64>,
    pub expected_status: ApplicationStatus,
    pub status: ApplicationStatus,
    pub updated_at: DateTime<Utc>,
    pub tracking: Option<TrackingFields>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOrder {
    /// `changed_at DESC, id DESC`
    NewestFirst,
    /// `changed_at ASC, id ASC`
    OldestFirst,
}

/// Transactional access to tracked applications and their transition records.
///
/// Mutations go through `&mut Self::Tx`. Dropping a `Tx` without passing it to
/// [`EntityStore::commit`] must roll back everything written through it.
#[async_trait]
pub trait EntityStore: Send + Sync + 'static {
    type Tx: Send;

    async fn begin(&self) -> PersistenceResult<Self::Tx>;

    async fn commit(&self, tx: Self::Tx) -> PersistenceResult<()>;

    /// Insert a new application row; fails if the id is taken
    async fn insert_entity(&self, tx: &mut Self::Tx, entity: &TrackedEntity) -> PersistenceResult<()>;

    /// Read an application inside the transaction, scoped to its owner
    async fn load_entity(
        &self,
        tx: &mut Self::Tx,
        owner_id: i64,
        entity_id: i64,
    ) -> PersistenceResult<Option<TrackedEntity>>;

    /// Apply a [`StatusWrite`]; a stale expectation yields
    /// `PersistenceError::ConcurrentModification`
    async fn write_status(&self, tx: &mut Self::Tx, write: &StatusWrite) -> PersistenceResult<()>;

    /// Append one immutable transition record and return it with its id
    async fn append_transition(
        &self,
        tx: &mut Self::Tx,
        record: NewTransitionRecord,
    ) -> PersistenceResult<TransitionRecord>;

    // Reads outside a transaction

    async fn find_entity(&self, owner_id: i64, entity_id: i64) -> PersistenceResult<Option<TrackedEntity>>;

    async fn count_transitions(&self, owner_id: i64, entity_id: i64) -> PersistenceResult<i64>;

    /// Records for one application; `limit == None` returns everything from `offset`
    async fn list_transitions(
        &self,
        owner_id: i64,
        entity_id: i64,
        order: RecordOrder,
        limit: Option<i64>,
        offset: i64,
    ) -> PersistenceResult<Vec<TransitionRecord>>;
}

/// Read-only source of flow templates
#[async_trait]
pub trait FlowTemplateStore: Send + Sync + 'static {
    /// The owner's active template, else the active global default, else `None`
    async fn get_active_template(&self, owner_id: i64) -> PersistenceResult<Option<FlowTemplate>>;
}

/// Read-only source of templates and per-owner preferences
#[async_trait]
pub trait StatusConfigStore: FlowTemplateStore {
    async fn get_user_preferences(&self, owner_id: i64) -> PersistenceResult<Option<UserPreference>>;
}

/// Aggregate queries backing the analytics reports
#[async_trait]
pub trait AnalyticsSource: Send + Sync + 'static {
    /// Number of applications per current status
    async fn status_counts(&self, owner_id: i64) -> PersistenceResult<BTreeMap<ApplicationStatus, i64>>;

    /// Mean `duration_minutes` of records grouped by `old_status`
    async fn average_durations(&self, owner_id: i64) -> PersistenceResult<BTreeMap<ApplicationStatus, f64>>;

    /// `(reached, passed)`: distinct applications that ever held `from` (in history or
    /// currently), and distinct applications with a recorded `from -> to` transition
    async fn stage_counts(
        &self,
        owner_id: i64,
        from: ApplicationStatus,
        to: ApplicationStatus,
    ) -> PersistenceResult<(i64, i64)>;

    /// Transition counts per UTC day and new status since `since`; newest day first, then
    /// highest count, then status
    async fn daily_transition_counts(
        &self,
        owner_id: i64,
        since: DateTime<Utc>,
    ) -> PersistenceResult<Vec<TrendPoint>>;
}
