//! # In-Memory Store
//!
//! [`InMemoryStore`] keeps applications and transition records behind one
//! `tokio::sync::Mutex`. A transaction holds the lock for its whole lifetime and works on a
//! staged copy of the state; [`EntityStore::commit`] swaps the copy in, and dropping a
//! [`MemoryTx`] discards it. Transactions are therefore serialised, which gives the same
//! compare-and-swap outcomes as the PostgreSQL store under concurrent writers.
//!
//! Flow templates and preferences are read-mostly and live in `DashMap`s outside the lock.

use super::order_trend_points;
use crate::models::flow_template::select_active_template;
use crate::models::{
    FlowTemplate, NewTransitionRecord, TrackedEntity, TransitionRecord, TrendPoint, UserPreference,
};
use crate::state_machine::errors::{PersistenceError, PersistenceResult};
use crate::state_machine::persistence::{
    AnalyticsSource, EntityStore, FlowTemplateStore, RecordOrder, StatusConfigStore, StatusWrite,
};
use crate::state_machine::states::ApplicationStatus;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    entities: BTreeMap<i64, TrackedEntity>,
    records: Vec<TransitionRecord>,
    next_record_id: i64,
}

impl MemoryState {
    fn owned_entity(&self, owner_id: i64, entity_id: i64) -> Option<&TrackedEntity> {
        self.entities
            .get(&entity_id)
            .filter(|entity| entity.owner_id == owner_id)
    }

    fn records_for(&self, owner_id: i64, entity_id: i64) -> impl Iterator<Item = &TransitionRecord> {
        self.records
            .iter()
            .filter(move |r| r.owner_id == owner_id && r.entity_id == entity_id)
    }

    fn owner_records(&self, owner_id: i64) -> impl Iterator<Item = &TransitionRecord> {
        self.records.iter().filter(move |r| r.owner_id == owner_id)
    }
}

/// An open in-memory transaction: the store lock plus the staged state
pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
}

impl std::fmt::Debug for MemoryTx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTx")
            .field("entities", &self.staged.entities.len())
            .field("records", &self.staged.records.len())
            .finish()
    }
}

/// Single-process store implementing every storage trait
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
    templates: DashMap<i64, FlowTemplate>,
    preferences: DashMap<i64, UserPreference>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a flow template, keyed by its id
    pub fn insert_template(&self, template: FlowTemplate) {
        self.templates.insert(template.id, template);
    }

    pub fn remove_template(&self, template_id: i64) -> Option<FlowTemplate> {
        self.templates.remove(&template_id).map(|(_, template)| template)
    }

    pub fn set_preferences(&self, preference: UserPreference) {
        self.preferences.insert(preference.owner_id, preference);
    }

    /// Place an application row as-is, without a transition record.
    ///
    /// Models rows created outside the engine, such as legacy rows with no version.
    pub async fn seed_entity(&self, entity: TrackedEntity) {
        let mut state = self.state.lock().await;
        state.entities.insert(entity.id, entity);
    }

    /// Every record in the store, in insertion order
    pub async fn all_records(&self) -> Vec<TransitionRecord> {
        self.state.lock().await.records.clone()
    }
}

#[async_trait]
impl EntityStore for InMemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> PersistenceResult<Self::Tx> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let staged = (*guard).clone();
        Ok(MemoryTx { guard, staged })
    }

    async fn commit(&self, tx: Self::Tx) -> PersistenceResult<()> {
        let MemoryTx { mut guard, staged } = tx;
        *guard = staged;
        Ok(())
    }

    async fn insert_entity(&self, tx: &mut Self::Tx, entity: &TrackedEntity) -> PersistenceResult<()> {
        if tx.staged.entities.contains_key(&entity.id) {
            return Err(PersistenceError::AlreadyExists {
                entity_id: entity.id,
            });
        }
        tx.staged.entities.insert(entity.id, entity.clone());
        Ok(())
    }

    async fn load_entity(
        &self,
        tx: &mut Self::Tx,
        owner_id: i64,
        entity_id: i64,
    ) -> PersistenceResult<Option<TrackedEntity>> {
        Ok(tx.staged.owned_entity(owner_id, entity_id).cloned())
    }

    async fn write_status(&self, tx: &mut Self::Tx, write: &StatusWrite) -> PersistenceResult<()> {
        let entity = tx
            .staged
            .entities
            .get_mut(&write.entity_id)
            .filter(|entity| entity.owner_id == write.owner_id);

        let Some(entity) = entity else {
            return Err(PersistenceError::ConcurrentModification {
                entity_id: write.entity_id,
                expected: write.expected_version,
                actual: None,
            });
        };
        if entity.version != write.expected_version || entity.status != write.expected_status {
            return Err(PersistenceError::ConcurrentModification {
                entity_id: write.entity_id,
                expected: write.expected_version,
                actual: entity.version,
            });
        }

        entity.status = write.status;
        entity.updated_at = write.updated_at;
        if let Some(tracking) = &write.tracking {
            entity.version = Some(tracking.version);
            entity.last_status_change_at = Some(tracking.last_status_change_at);
            entity.status_history_summary = tracking.status_history_summary.clone();
            entity.status_duration_stats = tracking.status_duration_stats.clone();
        }
        Ok(())
    }

    async fn append_transition(
        &self,
        tx: &mut Self::Tx,
        record: NewTransitionRecord,
    ) -> PersistenceResult<TransitionRecord> {
        tx.staged.next_record_id += 1;
        let record = record.into_record(tx.staged.next_record_id);
        tx.staged.records.push(record.clone());
        Ok(record)
    }

    async fn find_entity(&self, owner_id: i64, entity_id: i64) -> PersistenceResult<Option<TrackedEntity>> {
        let state = self.state.lock().await;
        Ok(state.owned_entity(owner_id, entity_id).cloned())
    }

    async fn count_transitions(&self, owner_id: i64, entity_id: i64) -> PersistenceResult<i64> {
        let state = self.state.lock().await;
        Ok(state.records_for(owner_id, entity_id).count() as i64)
    }

    async fn list_transitions(
        &self,
        owner_id: i64,
        entity_id: i64,
        order: RecordOrder,
        limit: Option<i64>,
        offset: i64,
    ) -> PersistenceResult<Vec<TransitionRecord>> {
        let state = self.state.lock().await;
        let mut records: Vec<TransitionRecord> =
            state.records_for(owner_id, entity_id).cloned().collect();

        match order {
            RecordOrder::NewestFirst => {
                records.sort_by(|a, b| (b.changed_at, b.id).cmp(&(a.changed_at, a.id)))
            }
            RecordOrder::OldestFirst => records.sort_by_key(|r| (r.changed_at, r.id)),
        }

        let offset = usize::try_from(offset.max(0)).unwrap_or(usize::MAX);
        let limit = limit
            .map(|l| usize::try_from(l.max(0)).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX);
        Ok(records.into_iter().skip(offset).take(limit).collect())
    }
}

#[async_trait]
impl FlowTemplateStore for InMemoryStore {
    async fn get_active_template(&self, owner_id: i64) -> PersistenceResult<Option<FlowTemplate>> {
        let candidates: Vec<FlowTemplate> = self
            .templates
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        Ok(select_active_template(owner_id, &candidates).cloned())
    }
}

#[async_trait]
impl StatusConfigStore for InMemoryStore {
    async fn get_user_preferences(&self, owner_id: i64) -> PersistenceResult<Option<UserPreference>> {
        Ok(self.preferences.get(&owner_id).map(|entry| entry.value().clone()))
    }
}

#[async_trait]
impl AnalyticsSource for InMemoryStore {
    async fn status_counts(&self, owner_id: i64) -> PersistenceResult<BTreeMap<ApplicationStatus, i64>> {
        let state = self.state.lock().await;
        let mut counts = BTreeMap::new();
        for entity in state.entities.values().filter(|e| e.owner_id == owner_id) {
            *counts.entry(entity.status).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn average_durations(&self, owner_id: i64) -> PersistenceResult<BTreeMap<ApplicationStatus, f64>> {
        let state = self.state.lock().await;
        let mut sums: BTreeMap<ApplicationStatus, (i64, i64)> = BTreeMap::new();
        for record in state.owner_records(owner_id) {
            if let (Some(old), Some(minutes)) = (record.old_status, record.duration_minutes) {
                let (total, n) = sums.entry(old).or_insert((0, 0));
                *total += minutes;
                *n += 1;
            }
        }
        Ok(sums
            .into_iter()
            .map(|(status, (total, n))| (status, total as f64 / n as f64))
            .collect())
    }

    async fn stage_counts(
        &self,
        owner_id: i64,
        from: ApplicationStatus,
        to: ApplicationStatus,
    ) -> PersistenceResult<(i64, i64)> {
        let state = self.state.lock().await;

        let mut reached: BTreeSet<i64> = state
            .owner_records(owner_id)
            .filter(|r| r.new_status == from)
            .map(|r| r.entity_id)
            .collect();
        reached.extend(
            state
                .entities
                .values()
                .filter(|e| e.owner_id == owner_id && e.status == from)
                .map(|e| e.id),
        );

        let passed: BTreeSet<i64> = state
            .owner_records(owner_id)
            .filter(|r| r.old_status == Some(from) && r.new_status == to)
            .map(|r| r.entity_id)
            .collect();

        Ok((reached.len() as i64, passed.len() as i64))
    }

    async fn daily_transition_counts(
        &self,
        owner_id: i64,
        since: DateTime<Utc>,
    ) -> PersistenceResult<Vec<TrendPoint>> {
        let state = self.state.lock().await;
        let mut buckets: BTreeMap<(NaiveDate, ApplicationStatus), i64> = BTreeMap::new();
        for record in state.owner_records(owner_id).filter(|r| r.changed_at >= since) {
            *buckets
                .entry((record.changed_at.date_naive(), record.new_status))
                .or_insert(0) += 1;
        }

        let mut points: Vec<TrendPoint> = buckets
            .into_iter()
            .map(|((date, status), count)| TrendPoint {
                date,
                status,
                count,
            })
            .collect();
        order_trend_points(&mut points);
        Ok(points)
    }
}
