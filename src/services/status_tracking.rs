//! # Status Tracking Service
//!
//! Entry point for every status change. One call is one transaction:
//!
//! 1. load the application and compare its version (`concurrency::guard`)
//! 2. classify the change against the owner's flow template (`guards::classify`)
//! 3. for backward moves, apply the [`BackwardPolicy`]; any confirmed rank regression, even
//!    one the template allows, is written as status-only and leaves history untouched
//! 4. otherwise plan and persist the record plus the rolling aggregates
//!    (`HistoryRecorder`)
//! 5. commit
//!
//! Dropping the returned future before step 5 drops the transaction, which rolls it back.

use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::constants::metadata_keys;
use crate::error::{Result, TrackerError};
use crate::logging::log_transition_operation;
use crate::models::{
    HistoryPage, Timeline, TrackedEntity, TransitionRecord, TransitionSource,
};
use crate::state_machine::concurrency::guard;
use crate::state_machine::errors::GuardError;
use crate::state_machine::guards::{classify, BackwardPolicy, TransitionValidator};
use crate::state_machine::history::{apply_write, HistoryRecorder};
use crate::state_machine::persistence::{EntityStore, FlowTemplateStore, RecordOrder};
use crate::state_machine::states::ApplicationStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// A request to move one application to a new status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: ApplicationStatus,
    /// Rejected with `VersionConflict` unless it matches the stored version
    #[serde(default)]
    pub expected_version: Option<i64>,
    #[serde(default)]
    pub confirm_backward: bool,
    #[serde(default)]
    pub note: Option<String>,
    /// Caller-supplied metadata; engine keys win on collision
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

impl StatusUpdateRequest {
    pub fn new(status: ApplicationStatus) -> Self {
        Self {
            status,
            expected_version: None,
            confirm_backward: false,
            note: None,
            metadata: None,
        }
    }

    /// Build a request from a wire label such as `"一面中"`
    pub fn from_label(label: &str) -> Result<Self> {
        Ok(Self::new(label.parse()?))
    }

    pub fn with_expected_version(mut self, version: i64) -> Self {
        self.expected_version = Some(version);
        self
    }

    pub fn confirmed_backward(mut self) -> Self {
        self.confirm_backward = true;
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// One entry of a batch update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStatusUpdate {
    pub entity_id: i64,
    pub status: ApplicationStatus,
}

impl BatchStatusUpdate {
    pub fn new(entity_id: i64, status: ApplicationStatus) -> Self {
        Self { entity_id, status }
    }
}

/// Result of a single status change
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdateOutcome {
    pub entity: TrackedEntity,
    /// `None` when the write was suppressed
    pub record: Option<TransitionRecord>,
    pub suppressed: bool,
}

/// Result of a committed batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchUpdateSummary {
    pub batch_id: Uuid,
    pub updated: Vec<i64>,
    /// Entries whose application already had the requested status
    pub skipped: Vec<i64>,
}

/// Status-transition engine over an [`EntityStore`] that also serves flow templates
pub struct StatusTrackingService<S>
where
    S: EntityStore + FlowTemplateStore,
{
    store: Arc<S>,
    validator: TransitionValidator<S>,
    policy: BackwardPolicy,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
}

impl<S> Clone for StatusTrackingService<S>
where
    S: EntityStore + FlowTemplateStore,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            validator: self.validator.clone(),
            policy: self.policy,
            config: self.config.clone(),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<S> StatusTrackingService<S>
where
    S: EntityStore + FlowTemplateStore,
{
    pub fn new(store: Arc<S>, config: EngineConfig) -> Self {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<S>, config: EngineConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            validator: TransitionValidator::new(Arc::clone(&store)),
            policy: BackwardPolicy::new(config.allow_backward),
            store,
            config,
            clock,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Start tracking an application and write its first record.
    ///
    /// The record has no previous status and no duration; the application starts at
    /// version 1.
    #[instrument(skip(self))]
    pub async fn register_entity(
        &self,
        owner_id: i64,
        entity_id: i64,
        status: Option<ApplicationStatus>,
        created_at: Option<DateTime<Utc>>,
    ) -> Result<StatusUpdateOutcome> {
        let status = status.unwrap_or_default();
        let created_at = created_at.unwrap_or_else(|| self.clock.now());

        classify(None, None, status).map_err(|e| TrackerError::from_guard(entity_id, e))?;

        let mut entity = TrackedEntity::new(entity_id, owner_id, status, created_at);
        let metadata = build_metadata(None, None, TransitionSource::Register, None, None);
        let planned = HistoryRecorder::plan_creation(&entity, created_at, metadata);

        let mut tx = self.store.begin().await?;
        self.store.insert_entity(&mut tx, &entity).await?;
        let write = planned.write.clone();
        let record = HistoryRecorder::persist(&*self.store, &mut tx, planned).await?;
        self.store.commit(tx).await?;

        apply_write(&mut entity, &write);
        log_transition_operation(
            "register",
            owner_id,
            entity_id,
            None,
            status,
            entity.version,
            None,
        );

        Ok(StatusUpdateOutcome {
            entity,
            record: Some(record),
            suppressed: false,
        })
    }

    /// Move one application to `request.status`
    #[instrument(skip(self, request), fields(to = %request.status))]
    pub async fn update_status(
        &self,
        owner_id: i64,
        entity_id: i64,
        request: StatusUpdateRequest,
    ) -> Result<StatusUpdateOutcome> {
        let note = self.normalize_note(request.note.as_deref())?;
        let graph = self.validator.active_graph(owner_id).await?;

        let mut tx = self.store.begin().await?;
        let mut entity = guard(
            &*self.store,
            &mut tx,
            owner_id,
            entity_id,
            request.expected_version,
        )
        .await?;

        let from = entity.status;
        let to = request.status;
        let verdict = classify(graph.as_ref(), Some(from), to)
            .map_err(|e| TrackerError::from_guard(entity_id, e))?;

        let now = self.clock.now();
        let regresses = from.is_backward_to(to);

        if verdict.is_backward() {
            self.policy
                .check(from, to, request.confirm_backward, note.as_deref())
                .map_err(|e| TrackerError::from_guard(entity_id, e))?;
        }

        // Any confirmed regression is status-only, including one the template lists
        if regresses && request.confirm_backward {
            let write = HistoryRecorder::suppressed(&entity, to, now);
            self.store.write_status(&mut tx, &write).await?;
            self.store.commit(tx).await?;

            apply_write(&mut entity, &write);
            warn!(
                owner_id = owner_id,
                entity_id = entity_id,
                from = %from,
                to = %to,
                "Confirmed backward transition applied without history"
            );
            log_transition_operation(
                "backward",
                owner_id,
                entity_id,
                Some(from),
                to,
                entity.version,
                note.as_deref(),
            );
            return Ok(StatusUpdateOutcome {
                entity,
                record: None,
                suppressed: true,
            });
        }

        let regression = regresses.then_some((from, to));
        let metadata = build_metadata(
            request.metadata,
            note.as_deref(),
            TransitionSource::Single,
            None,
            regression,
        );
        let planned = HistoryRecorder::plan(&entity, to, now, metadata);
        let write = planned.write.clone();
        let record = HistoryRecorder::persist(&*self.store, &mut tx, planned).await?;
        self.store.commit(tx).await?;

        apply_write(&mut entity, &write);
        debug!(verdict = ?verdict, record_id = record.id, "Transition committed");
        log_transition_operation(
            "update",
            owner_id,
            entity_id,
            Some(from),
            to,
            entity.version,
            note.as_deref(),
        );

        Ok(StatusUpdateOutcome {
            entity,
            record: Some(record),
            suppressed: false,
        })
    }

    /// Apply several updates in one transaction.
    ///
    /// Any failure aborts the whole batch. Backward moves are never allowed here; entries that
    /// request the application's current status are skipped.
    #[instrument(skip(self, updates), fields(batch_size = updates.len()))]
    pub async fn batch_update_status(
        &self,
        owner_id: i64,
        updates: &[BatchStatusUpdate],
    ) -> Result<BatchUpdateSummary> {
        self.validate_batch_shape(updates)?;

        let graph = self.validator.active_graph(owner_id).await?;
        let batch_id = Uuid::new_v4();
        let now = self.clock.now();

        let mut updated = Vec::with_capacity(updates.len());
        let mut skipped = Vec::new();
        let mut committed = Vec::with_capacity(updates.len());

        let mut tx = self.store.begin().await?;
        for update in updates {
            let entity = guard(&*self.store, &mut tx, owner_id, update.entity_id, None).await?;
            let from = entity.status;

            if from == update.status {
                skipped.push(update.entity_id);
                continue;
            }
            // Rank regressions are refused here even when a template edge allows them
            if from.is_backward_to(update.status) {
                return Err(TrackerError::from_guard(
                    update.entity_id,
                    GuardError::BackwardInBatch {
                        from,
                        to: update.status,
                    },
                ));
            }
            classify(graph.as_ref(), Some(from), update.status)
                .map_err(|e| TrackerError::from_guard(update.entity_id, e))?;

            let metadata = build_metadata(None, None, TransitionSource::Batch, Some(batch_id), None);
            let planned = HistoryRecorder::plan(&entity, update.status, now, metadata);
            let version = planned.write.tracking.as_ref().map(|t| t.version);
            HistoryRecorder::persist(&*self.store, &mut tx, planned).await?;

            updated.push(update.entity_id);
            committed.push((update.entity_id, from, update.status, version));
        }
        self.store.commit(tx).await?;

        for (entity_id, from, to, version) in committed {
            log_transition_operation("batch", owner_id, entity_id, Some(from), to, version, None);
        }
        info!(
            owner_id = owner_id,
            batch_id = %batch_id,
            updated = updated.len(),
            skipped = skipped.len(),
            "Batch status update committed"
        );

        Ok(BatchUpdateSummary {
            batch_id,
            updated,
            skipped,
        })
    }

    /// One page of an application's records, newest first.
    ///
    /// `page < 1` is treated as 1 and an out-of-range `page_size` as the configured default.
    #[instrument(skip(self))]
    pub async fn get_history(
        &self,
        owner_id: i64,
        entity_id: i64,
        page: i64,
        page_size: i64,
    ) -> Result<HistoryPage> {
        self.require_entity(owner_id, entity_id).await?;

        let page = u32::try_from(page.max(1)).unwrap_or(u32::MAX);
        let page_size = if (1..=i64::from(self.config.max_page_size)).contains(&page_size) {
            page_size as u32
        } else {
            self.config.default_page_size
        };
        let offset = (i64::from(page) - 1) * i64::from(page_size);

        let total = self.store.count_transitions(owner_id, entity_id).await?;
        let records = self
            .store
            .list_transitions(
                owner_id,
                entity_id,
                RecordOrder::NewestFirst,
                Some(i64::from(page_size)),
                offset,
            )
            .await?;

        Ok(HistoryPage {
            entity_id,
            records,
            total,
            page,
            page_size,
        })
    }

    /// Every record of an application, oldest first, with the summed duration
    #[instrument(skip(self))]
    pub async fn get_timeline(&self, owner_id: i64, entity_id: i64) -> Result<Timeline> {
        self.require_entity(owner_id, entity_id).await?;

        let records = self
            .store
            .list_transitions(owner_id, entity_id, RecordOrder::OldestFirst, None, 0)
            .await?;
        Ok(Timeline::from_records(entity_id, records))
    }

    async fn require_entity(&self, owner_id: i64, entity_id: i64) -> Result<TrackedEntity> {
        self.store
            .find_entity(owner_id, entity_id)
            .await?
            .ok_or(TrackerError::NotFound { entity_id })
    }

    fn normalize_note(&self, note: Option<&str>) -> Result<Option<String>> {
        let Some(note) = note.map(str::trim).filter(|n| !n.is_empty()) else {
            return Ok(None);
        };
        if note.chars().count() > self.config.max_note_length {
            return Err(TrackerError::ValidationError(format!(
                "note too long (max {} characters)",
                self.config.max_note_length
            )));
        }
        Ok(Some(note.to_string()))
    }

    fn validate_batch_shape(&self, updates: &[BatchStatusUpdate]) -> Result<()> {
        if updates.is_empty() {
            return Err(TrackerError::ValidationError(
                "no updates provided".to_string(),
            ));
        }
        if updates.len() > self.config.max_batch_size {
            return Err(TrackerError::ValidationError(format!(
                "too many updates (max {})",
                self.config.max_batch_size
            )));
        }
        if let Some((index, _)) = updates
            .iter()
            .enumerate()
            .find(|(_, update)| update.entity_id <= 0)
        {
            return Err(TrackerError::ValidationError(format!(
                "invalid id at index {index}"
            )));
        }
        Ok(())
    }
}

/// Merge caller metadata with the keys the engine owns
fn build_metadata(
    caller: Option<Map<String, Value>>,
    note: Option<&str>,
    source: TransitionSource,
    batch_id: Option<Uuid>,
    regression: Option<(ApplicationStatus, ApplicationStatus)>,
) -> Map<String, Value> {
    let mut metadata = caller.unwrap_or_default();
    metadata.insert(
        metadata_keys::SOURCE.to_string(),
        Value::from(source.as_str()),
    );
    if let Some(note) = note {
        metadata.insert(metadata_keys::NOTE.to_string(), Value::from(note));
    }
    if let Some(batch_id) = batch_id {
        metadata.insert(
            metadata_keys::BATCH_ID.to_string(),
            Value::from(batch_id.to_string()),
        );
    }
    if let Some((from, to)) = regression {
        metadata.insert(metadata_keys::BACKWARD.to_string(), Value::Bool(true));
        metadata.insert(metadata_keys::FROM.to_string(), Value::from(from.as_str()));
        metadata.insert(metadata_keys::TO.to_string(), Value::from(to.as_str()));
    }
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_build_metadata_engine_keys_win() {
        let caller = json!({"source": "ui", "channel": "email"})
            .as_object()
            .cloned()
            .unwrap();
        let batch_id = Uuid::new_v4();
        let metadata = build_metadata(
            Some(caller),
            Some("跟进"),
            TransitionSource::Batch,
            Some(batch_id),
            Some((ApplicationStatus::OfferReceived, ApplicationStatus::WrittenTest)),
        );

        assert_eq!(metadata["source"], "batch");
        assert_eq!(metadata["channel"], "email");
        assert_eq!(metadata["note"], "跟进");
        assert_eq!(metadata["batch_id"], batch_id.to_string());
        assert_eq!(metadata["backward"], true);
        assert_eq!(metadata["from"], "已收到offer");
        assert_eq!(metadata["to"], "笔试中");
    }

    #[test]
    fn test_request_builder() {
        let request = StatusUpdateRequest::from_label("一面中")
            .unwrap()
            .with_expected_version(3)
            .confirmed_backward()
            .with_note("rescheduled");
        assert_eq!(request.status, ApplicationStatus::FirstInterview);
        assert_eq!(request.expected_version, Some(3));
        assert!(request.confirm_backward);

        let err = StatusUpdateRequest::from_label("interviewing").unwrap_err();
        assert_eq!(
            err,
            TrackerError::InvalidStatus {
                value: "interviewing".to_string()
            }
        );
    }

    #[test]
    fn test_request_deserializes_with_defaults() {
        let request: StatusUpdateRequest = serde_json::from_value(json!({"status": "笔试中"})).unwrap();
        assert_eq!(request, StatusUpdateRequest::new(ApplicationStatus::WrittenTest));
    }
}
