use crate::state_machine::states::ApplicationStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Immutable audit entry for one status change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub id: i64,
    pub entity_id: i64,
    pub owner_id: i64,
    /// `None` only for an application's first record
    pub old_status: Option<ApplicationStatus>,
    pub new_status: ApplicationStatus,
    pub changed_at: DateTime<Utc>,
    pub duration_minutes: Option<i64>,
    pub metadata: Map<String, Value>,
}

/// New TransitionRecord for creation; the store assigns the id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransitionRecord {
    pub entity_id: i64,
    pub owner_id: i64,
    pub old_status: Option<ApplicationStatus>,
    pub new_status: ApplicationStatus,
    pub changed_at: DateTime<Utc>,
    pub duration_minutes: Option<i64>,
    pub metadata: Map<String, Value>,
}

impl NewTransitionRecord {
    pub fn into_record(self, id: i64) -> TransitionRecord {
        TransitionRecord {
            id,
            entity_id: self.entity_id,
            owner_id: self.owner_id,
            old_status: self.old_status,
            new_status: self.new_status,
            changed_at: self.changed_at,
            duration_minutes: self.duration_minutes,
            metadata: self.metadata,
        }
    }
}

/// Where a transition came from, recorded under `metadata.source`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionSource {
    Single,
    Batch,
    Register,
}

impl TransitionSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Batch => "batch",
            Self::Register => "register",
        }
    }
}

impl TransitionRecord {
    pub fn note(&self) -> Option<&str> {
        self.metadata.get("note").and_then(Value::as_str)
    }

    pub fn source(&self) -> Option<&str> {
        self.metadata.get("source").and_then(Value::as_str)
    }

    pub fn is_backward(&self) -> bool {
        self.metadata
            .get("backward")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// One page of an application's history, newest first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPage {
    pub entity_id: i64,
    pub records: Vec<TransitionRecord>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
}

impl HistoryPage {
    pub fn total_pages(&self) -> i64 {
        if self.page_size == 0 {
            return 0;
        }
        let size = i64::from(self.page_size);
        (self.total + size - 1) / size
    }
}

/// All of an application's records, oldest first, with summed durations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub entity_id: i64,
    pub records: Vec<TransitionRecord>,
    pub total_duration_minutes: i64,
    pub total_changes: usize,
}

impl Timeline {
    pub fn from_records(entity_id: i64, records: Vec<TransitionRecord>) -> Self {
        let total_duration_minutes = records.iter().filter_map(|r| r.duration_minutes).sum();
        Self {
            entity_id,
            total_changes: records.len(),
            records,
            total_duration_minutes,
        }
    }
}
