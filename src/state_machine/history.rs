use super::errors::PersistenceResult;
use super::persistence::{EntityStore, StatusWrite, TrackingFields};
use super::states::ApplicationStatus;
use crate::models::tracked_entity::elapsed_minutes;
use crate::models::{NewTransitionRecord, TrackedEntity, TransitionRecord};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// Everything an accepted transition writes, computed before touching the store
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedTransition {
    pub write: StatusWrite,
    pub record: NewTransitionRecord,
}

/// Computes and persists the audit trail and rolling aggregates for accepted transitions
#[derive(Debug, Clone, Copy, Default)]
pub struct HistoryRecorder;

impl HistoryRecorder {
    /// Plan a tracked transition of `entity` to `new_status` at `changed_at`.
    ///
    /// The duration is the whole minutes since the entity's last status change (or its
    /// creation), clamped at zero.
    pub fn plan(
        entity: &TrackedEntity,
        new_status: ApplicationStatus,
        changed_at: DateTime<Utc>,
        metadata: Map<String, Value>,
    ) -> PlannedTransition {
        let duration = elapsed_minutes(entity.status_since(), changed_at);
        Self::plan_with(entity, Some(entity.status), new_status, changed_at, Some(duration), metadata)
    }

    /// Plan the first record of a freshly inserted application
    pub fn plan_creation(
        entity: &TrackedEntity,
        changed_at: DateTime<Utc>,
        metadata: Map<String, Value>,
    ) -> PlannedTransition {
        Self::plan_with(entity, None, entity.status, changed_at, None, metadata)
    }

    fn plan_with(
        entity: &TrackedEntity,
        old_status: Option<ApplicationStatus>,
        new_status: ApplicationStatus,
        changed_at: DateTime<Utc>,
        duration_minutes: Option<i64>,
        metadata: Map<String, Value>,
    ) -> PlannedTransition {
        let mut summary = entity.status_history_summary.clone();
        summary.record(old_status, new_status, changed_at, duration_minutes);

        let mut stats = entity.status_duration_stats.clone();
        stats.accumulate(old_status, new_status, duration_minutes, changed_at);

        PlannedTransition {
            write: StatusWrite {
                entity_id: entity.id,
                owner_id: entity.owner_id,
                expected_version: entity.version,
                expected_status: entity.status,
                status: new_status,
                updated_at: changed_at,
                tracking: Some(TrackingFields {
                    version: entity.next_version(),
                    last_status_change_at: changed_at,
                    status_history_summary: summary,
                    status_duration_stats: stats,
                }),
            },
            record: NewTransitionRecord {
                entity_id: entity.id,
                owner_id: entity.owner_id,
                old_status,
                new_status,
                changed_at,
                duration_minutes,
                metadata,
            },
        }
    }

    /// A suppressed write: status and `updated_at` only
    pub fn suppressed(
        entity: &TrackedEntity,
        new_status: ApplicationStatus,
        at: DateTime<Utc>,
    ) -> StatusWrite {
        StatusWrite {
            entity_id: entity.id,
            owner_id: entity.owner_id,
            expected_version: entity.version,
            expected_status: entity.status,
            status: new_status,
            updated_at: at,
            tracking: None,
        }
    }

    /// Write the entity update and append the record inside `tx`
    pub async fn persist<S: EntityStore + ?Sized>(
        store: &S,
        tx: &mut S::Tx,
        planned: PlannedTransition,
    ) -> PersistenceResult<TransitionRecord> {
        store.write_status(tx, &planned.write).await?;
        store.append_transition(tx, planned.record).await
    }
}

/// Apply a committed write to an in-memory copy of the entity
pub fn apply_write(entity: &mut TrackedEntity, write: &StatusWrite) {
    entity.status = write.status;
    entity.updated_at = write.updated_at;
    if let Some(tracking) = &write.tracking {
        entity.version = Some(tracking.version);
        entity.last_status_change_at = Some(tracking.last_status_change_at);
        entity.status_history_summary = tracking.status_history_summary.clone();
        entity.status_duration_stats = tracking.status_duration_stats.clone();
    }
}
