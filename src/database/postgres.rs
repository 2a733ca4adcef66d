//! # PostgreSQL Store
//!
//! [`PgStatusStore`] implements the storage traits against the tables created by
//! `migrations/`. Queries are built at runtime with `sqlx::query_as` over `FromRow` rows, and
//! every mutation runs inside a `sqlx::Transaction` that rolls back when dropped.
//!
//! The status write is a compare-and-swap:
//!
//! ```sql
//! UPDATE job_applications SET ...
//! WHERE id = $ AND user_id = $
//!   AND status_version IS NOT DISTINCT FROM $
//!   AND status = $
//! ```
//!
//! Zero affected rows means another writer got there first.

use super::order_trend_points;
use crate::models::{
    DurationStats, FlowTemplate, NewTransitionRecord, PreferenceConfig, StatusHistorySummary,
    TrackedEntity, TransitionGraph, TransitionRecord, TrendPoint, UserPreference,
};
use crate::state_machine::errors::{invalid_transition_data, PersistenceError, PersistenceResult};
use crate::state_machine::persistence::{
    AnalyticsSource, EntityStore, FlowTemplateStore, RecordOrder, StatusConfigStore, StatusWrite,
};
use crate::state_machine::states::ApplicationStatus;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use std::collections::BTreeMap;
use tracing::{debug, warn};

#[derive(Debug, FromRow)]
struct ApplicationRow {
    id: i64,
    user_id: i64,
    status: String,
    status_history: Option<Value>,
    last_status_change: Option<DateTime<Utc>>,
    status_duration_stats: Option<Value>,
    status_version: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ApplicationRow {
    fn into_entity(self) -> PersistenceResult<TrackedEntity> {
        let status_history_summary: StatusHistorySummary = match self.status_history {
            Some(Value::Null) | None => StatusHistorySummary::default(),
            Some(doc) => serde_json::from_value(doc)?,
        };
        let status_duration_stats: DurationStats = match self.status_duration_stats {
            Some(Value::Null) | None => DurationStats::default(),
            Some(doc) => serde_json::from_value(doc)?,
        };

        Ok(TrackedEntity {
            id: self.id,
            owner_id: self.user_id,
            status: parse_status("status", &self.status)?,
            version: self.status_version,
            last_status_change_at: self.last_status_change,
            status_history_summary,
            status_duration_stats,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct TransitionRow {
    id: i64,
    job_application_id: i64,
    user_id: i64,
    old_status: Option<String>,
    new_status: String,
    status_changed_at: DateTime<Utc>,
    duration_minutes: Option<i64>,
    metadata: Value,
}

impl TransitionRow {
    fn into_record(self) -> PersistenceResult<TransitionRecord> {
        let old_status = self
            .old_status
            .as_deref()
            .map(|s| parse_status("old_status", s))
            .transpose()?;
        let metadata = match self.metadata {
            Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };

        Ok(TransitionRecord {
            id: self.id,
            entity_id: self.job_application_id,
            owner_id: self.user_id,
            old_status,
            new_status: parse_status("new_status", &self.new_status)?,
            changed_at: self.status_changed_at,
            duration_minutes: self.duration_minutes,
            metadata,
        })
    }
}

#[derive(Debug, FromRow)]
struct TemplateRow {
    id: i64,
    name: String,
    description: Option<String>,
    flow_config: Value,
    is_default: bool,
    is_active: bool,
    created_by: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TemplateRow {
    fn into_template(self) -> PersistenceResult<FlowTemplate> {
        let graph = TransitionGraph::from_flow_config(&self.flow_config).map_err(|e| {
            invalid_transition_data(format!("flow_config of template {}: {e}", self.id))
        })?;

        Ok(FlowTemplate {
            id: self.id,
            name: self.name,
            description: self.description,
            graph,
            is_default: self.is_default,
            is_active: self.is_active,
            owner_id: self.created_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct PreferenceRow {
    user_id: i64,
    preference_config: Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn parse_status(column: &str, value: &str) -> PersistenceResult<ApplicationStatus> {
    value
        .parse()
        .map_err(|_| invalid_transition_data(format!("{column} '{value}'")))
}

const APPLICATION_COLUMNS: &str = "id, user_id, status, status_history, last_status_change, \
     status_duration_stats, status_version, created_at, updated_at";

const TRANSITION_COLUMNS: &str = "id, job_application_id, user_id, old_status, new_status, \
     status_changed_at, duration_minutes, metadata";

const TEMPLATE_COLUMNS: &str =
    "id, name, description, flow_config, is_default, is_active, created_by, created_at, updated_at";

/// SQLx-backed implementation of every storage trait
#[derive(Debug, Clone)]
pub struct PgStatusStore {
    pool: PgPool,
}

impl PgStatusStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create a flow template; `owner_id == None` makes it global
    pub async fn create_template(
        &self,
        name: &str,
        description: Option<&str>,
        graph: &TransitionGraph,
        is_default: bool,
        owner_id: Option<i64>,
    ) -> PersistenceResult<FlowTemplate> {
        let sql = format!(
            "INSERT INTO status_flow_templates (name, description, flow_config, is_default, is_active, created_by) \
             VALUES ($1, $2, $3, $4, TRUE, $5) RETURNING {TEMPLATE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, TemplateRow>(&sql)
            .bind(name)
            .bind(description)
            .bind(graph.to_flow_config())
            .bind(is_default)
            .bind(owner_id)
            .fetch_one(&self.pool)
            .await?;
        row.into_template()
    }

    /// Insert or replace an owner's preference document
    pub async fn save_preferences(
        &self,
        owner_id: i64,
        config: &PreferenceConfig,
    ) -> PersistenceResult<UserPreference> {
        let row = sqlx::query_as::<_, PreferenceRow>(
            r#"
            INSERT INTO user_status_preferences (user_id, preference_config)
            VALUES ($1, $2)
            ON CONFLICT (user_id)
            DO UPDATE SET preference_config = EXCLUDED.preference_config, updated_at = NOW()
            RETURNING user_id, preference_config, created_at, updated_at
            "#,
        )
        .bind(owner_id)
        .bind(Json(config))
        .fetch_one(&self.pool)
        .await?;
        into_preference(row)
    }

    async fn current_version(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        owner_id: i64,
        entity_id: i64,
    ) -> PersistenceResult<Option<i64>> {
        let version = sqlx::query_scalar::<_, Option<i64>>(
            "SELECT status_version FROM job_applications WHERE id = $1 AND user_id = $2",
        )
        .bind(entity_id)
        .bind(owner_id)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(version.flatten())
    }
}

fn into_preference(row: PreferenceRow) -> PersistenceResult<UserPreference> {
    let config = PreferenceConfig::from_document(&row.preference_config).map_err(|e| {
        invalid_transition_data(format!("preference_config of user {}: {e}", row.user_id))
    })?;
    Ok(UserPreference {
        owner_id: row.user_id,
        config,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

#[async_trait]
impl EntityStore for PgStatusStore {
    type Tx = Transaction<'static, Postgres>;

    async fn begin(&self) -> PersistenceResult<Self::Tx> {
        Ok(self.pool.begin().await?)
    }

    async fn commit(&self, tx: Self::Tx) -> PersistenceResult<()> {
        Ok(tx.commit().await?)
    }

    async fn insert_entity(&self, tx: &mut Self::Tx, entity: &TrackedEntity) -> PersistenceResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO job_applications
                (id, user_id, status, status_history, last_status_change,
                 status_duration_stats, status_version, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(entity.id)
        .bind(entity.owner_id)
        .bind(entity.status.as_str())
        .bind(Json(&entity.status_history_summary))
        .bind(entity.last_status_change_at)
        .bind(Json(&entity.status_duration_stats))
        .bind(entity.version)
        .bind(entity.created_at)
        .bind(entity.updated_at)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::AlreadyExists {
                entity_id: entity.id,
            });
        }
        Ok(())
    }

    async fn load_entity(
        &self,
        tx: &mut Self::Tx,
        owner_id: i64,
        entity_id: i64,
    ) -> PersistenceResult<Option<TrackedEntity>> {
        let sql = format!(
            "SELECT {APPLICATION_COLUMNS} FROM job_applications WHERE id = $1 AND user_id = $2"
        );
        sqlx::query_as::<_, ApplicationRow>(&sql)
            .bind(entity_id)
            .bind(owner_id)
            .fetch_optional(&mut **tx)
            .await?
            .map(ApplicationRow::into_entity)
            .transpose()
    }

    async fn write_status(&self, tx: &mut Self::Tx, write: &StatusWrite) -> PersistenceResult<()> {
        let result = match &write.tracking {
            Some(tracking) => {
                sqlx::query(
                    r#"
                    UPDATE job_applications
                    SET status = $1,
                        updated_at = $2,
                        status_version = $3,
                        last_status_change = $4,
                        status_history = $5,
                        status_duration_stats = $6
                    WHERE id = $7 AND user_id = $8
                      AND status_version IS NOT DISTINCT FROM $9
                      AND status = $10
                    "#,
                )
                .bind(write.status.as_str())
                .bind(write.updated_at)
                .bind(tracking.version)
                .bind(tracking.last_status_change_at)
                .bind(Json(&tracking.status_history_summary))
                .bind(Json(&tracking.status_duration_stats))
                .bind(write.entity_id)
                .bind(write.owner_id)
                .bind(write.expected_version)
                .bind(write.expected_status.as_str())
                .execute(&mut **tx)
                .await?
            }
            None => {
                sqlx::query(
                    r#"
                    UPDATE job_applications
                    SET status = $1, updated_at = $2
                    WHERE id = $3 AND user_id = $4
                      AND status_version IS NOT DISTINCT FROM $5
                      AND status = $6
                    "#,
                )
                .bind(write.status.as_str())
                .bind(write.updated_at)
                .bind(write.entity_id)
                .bind(write.owner_id)
                .bind(write.expected_version)
                .bind(write.expected_status.as_str())
                .execute(&mut **tx)
                .await?
            }
        };

        if result.rows_affected() == 0 {
            let actual = self
                .current_version(tx, write.owner_id, write.entity_id)
                .await?;
            warn!(
                entity_id = write.entity_id,
                expected = ?write.expected_version,
                actual = ?actual,
                "Status write lost compare-and-swap"
            );
            return Err(PersistenceError::ConcurrentModification {
                entity_id: write.entity_id,
                expected: write.expected_version,
                actual,
            });
        }
        Ok(())
    }

    async fn append_transition(
        &self,
        tx: &mut Self::Tx,
        record: NewTransitionRecord,
    ) -> PersistenceResult<TransitionRecord> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO job_status_history
                (job_application_id, user_id, old_status, new_status,
                 status_changed_at, duration_minutes, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(record.entity_id)
        .bind(record.owner_id)
        .bind(record.old_status.map(ApplicationStatus::as_str))
        .bind(record.new_status.as_str())
        .bind(record.changed_at)
        .bind(record.duration_minutes)
        .bind(Json(&record.metadata))
        .fetch_one(&mut **tx)
        .await?;

        debug!(record_id = id, entity_id = record.entity_id, "Transition record appended");
        Ok(record.into_record(id))
    }

    async fn find_entity(&self, owner_id: i64, entity_id: i64) -> PersistenceResult<Option<TrackedEntity>> {
        let sql = format!(
            "SELECT {APPLICATION_COLUMNS} FROM job_applications WHERE id = $1 AND user_id = $2"
        );
        sqlx::query_as::<_, ApplicationRow>(&sql)
            .bind(entity_id)
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await?
            .map(ApplicationRow::into_entity)
            .transpose()
    }

    async fn count_transitions(&self, owner_id: i64, entity_id: i64) -> PersistenceResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM job_status_history WHERE job_application_id = $1 AND user_id = $2",
        )
        .bind(entity_id)
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn list_transitions(
        &self,
        owner_id: i64,
        entity_id: i64,
        order: RecordOrder,
        limit: Option<i64>,
        offset: i64,
    ) -> PersistenceResult<Vec<TransitionRecord>> {
        let order_by = match order {
            RecordOrder::NewestFirst => "status_changed_at DESC, id DESC",
            RecordOrder::OldestFirst => "status_changed_at ASC, id ASC",
        };
        // LIMIT NULL returns every row
        let sql = format!(
            "SELECT {TRANSITION_COLUMNS} FROM job_status_history \
             WHERE job_application_id = $1 AND user_id = $2 \
             ORDER BY {order_by} LIMIT $3 OFFSET $4"
        );
        let rows = sqlx::query_as::<_, TransitionRow>(&sql)
            .bind(entity_id)
            .bind(owner_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(TransitionRow::into_record).collect()
    }
}

#[async_trait]
impl FlowTemplateStore for PgStatusStore {
    async fn get_active_template(&self, owner_id: i64) -> PersistenceResult<Option<FlowTemplate>> {
        // Owner rows sort before globals; ties break on default flag, then recency
        let sql = format!(
            "SELECT {TEMPLATE_COLUMNS} FROM status_flow_templates \
             WHERE is_active = TRUE \
               AND (created_by = $1 OR (created_by IS NULL AND is_default = TRUE)) \
             ORDER BY (created_by IS NULL) ASC, is_default DESC, updated_at DESC, id DESC \
             LIMIT 1"
        );
        sqlx::query_as::<_, TemplateRow>(&sql)
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await?
            .map(TemplateRow::into_template)
            .transpose()
    }
}

#[async_trait]
impl StatusConfigStore for PgStatusStore {
    async fn get_user_preferences(&self, owner_id: i64) -> PersistenceResult<Option<UserPreference>> {
        sqlx::query_as::<_, PreferenceRow>(
            "SELECT user_id, preference_config, created_at, updated_at \
             FROM user_status_preferences WHERE user_id = $1",
        )
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?
        .map(into_preference)
        .transpose()
    }
}

#[async_trait]
impl AnalyticsSource for PgStatusStore {
    async fn status_counts(&self, owner_id: i64) -> PersistenceResult<BTreeMap<ApplicationStatus, i64>> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT status, COUNT(*) FROM job_applications WHERE user_id = $1 GROUP BY status",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(status, count)| Ok((parse_status("status", &status)?, count)))
            .collect()
    }

    async fn average_durations(&self, owner_id: i64) -> PersistenceResult<BTreeMap<ApplicationStatus, f64>> {
        let rows = sqlx::query_as::<_, (String, f64)>(
            r#"
            SELECT old_status, AVG(duration_minutes)::DOUBLE PRECISION
            FROM job_status_history
            WHERE user_id = $1 AND old_status IS NOT NULL AND duration_minutes IS NOT NULL
            GROUP BY old_status
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(status, avg)| Ok((parse_status("old_status", &status)?, avg)))
            .collect()
    }

    async fn stage_counts(
        &self,
        owner_id: i64,
        from: ApplicationStatus,
        to: ApplicationStatus,
    ) -> PersistenceResult<(i64, i64)> {
        let reached = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM (
                SELECT job_application_id FROM job_status_history
                WHERE user_id = $1 AND new_status = $2
                UNION
                SELECT id AS job_application_id FROM job_applications
                WHERE user_id = $1 AND status = $2
            ) reached
            "#,
        )
        .bind(owner_id)
        .bind(from.as_str())
        .fetch_one(&self.pool)
        .await?;

        let passed = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(DISTINCT job_application_id)
            FROM job_status_history
            WHERE user_id = $1 AND old_status = $2 AND new_status = $3
            "#,
        )
        .bind(owner_id)
        .bind(from.as_str())
        .bind(to.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok((reached, passed))
    }

    async fn daily_transition_counts(
        &self,
        owner_id: i64,
        since: DateTime<Utc>,
    ) -> PersistenceResult<Vec<TrendPoint>> {
        let rows = sqlx::query_as::<_, (NaiveDate, String, i64)>(
            r#"
            SELECT (status_changed_at AT TIME ZONE 'UTC')::DATE AS day, new_status, COUNT(*) AS count
            FROM job_status_history
            WHERE user_id = $1 AND status_changed_at >= $2
            GROUP BY day, new_status
            ORDER BY day DESC, count DESC
            "#,
        )
        .bind(owner_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        let mut points = rows
            .into_iter()
            .map(|(date, status, count)| {
                Ok(TrendPoint {
                    date,
                    status: parse_status("new_status", &status)?,
                    count,
                })
            })
            .collect::<PersistenceResult<Vec<_>>>()?;
        order_trend_points(&mut points);
        Ok(points)
    }
}
