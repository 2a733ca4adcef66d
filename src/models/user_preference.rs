use crate::state_machine::states::ApplicationStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

const NOTIFICATION_KEYS: [&str; 3] = ["status_change", "reminder_alerts", "weekly_summary"];
const TIMELINE_VIEWS: [&str; 3] = ["chronological", "stage", "compact"];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PreferenceError {
    #[error("'{0}' must be an object")]
    NotAnObject(&'static str),

    #[error("invalid notification type: {0}")]
    UnknownNotification(String),

    #[error("notification value for '{0}' must be boolean")]
    NotificationNotBool(String),

    #[error("invalid timeline_view: {0}")]
    InvalidTimelineView(String),

    #[error("invalid status in color config: {0}")]
    InvalidColorStatus(String),

    #[error("color value must be string for status: {0}")]
    ColorNotString(String),

    #[error("preference document does not match the expected shape: {0}")]
    Shape(String),
}

/// Per-owner display and notification settings; read-only to the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferenceConfig {
    #[serde(default)]
    pub notifications: NotificationPreferences,
    #[serde(default)]
    pub display: DisplayPreferences,
    #[serde(default)]
    pub automation: AutomationPreferences,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationPreferences {
    pub status_change: bool,
    pub reminder_alerts: bool,
    pub weekly_summary: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineView {
    Chronological,
    Stage,
    Compact,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayPreferences {
    pub timeline_view: TimelineView,
    pub status_colors: BTreeMap<ApplicationStatus, String>,
    pub show_duration: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationPreferences {
    pub auto_reminders: bool,
    pub smart_suggestions: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            status_change: true,
            reminder_alerts: true,
            weekly_summary: false,
        }
    }
}

impl Default for DisplayPreferences {
    fn default() -> Self {
        Self {
            timeline_view: TimelineView::Chronological,
            status_colors: default_status_colors(),
            show_duration: true,
        }
    }
}

impl Default for AutomationPreferences {
    fn default() -> Self {
        Self {
            auto_reminders: true,
            smart_suggestions: true,
        }
    }
}

impl Default for PreferenceConfig {
    fn default() -> Self {
        Self {
            notifications: NotificationPreferences::default(),
            display: DisplayPreferences::default(),
            automation: AutomationPreferences::default(),
        }
    }
}

/// Colour for each status when the owner has not chosen one
pub fn default_status_colors() -> BTreeMap<ApplicationStatus, String> {
    use ApplicationStatus::*;
    ApplicationStatus::ALL
        .iter()
        .map(|status| {
            let color = match status {
                Applied => "#6366f1",
                ResumeScreening | OfferWaiting => "#f59e0b",
                WrittenTest | HrInterview => "#8b5cf6",
                FirstInterview | SecondInterview | ThirdInterview => "#3b82f6",
                WrittenTestPass | OfferReceived => "#059669",
                FirstPass | SecondPass | ThirdPass | HrPass | OfferAccepted => "#10b981",
                ProcessFinished => "#6b7280",
                ResumeScreeningFail | WrittenTestFail | FirstFail | SecondFail | ThirdFail
                | HrFail | Rejected => "#ef4444",
            };
            (*status, color.to_string())
        })
        .collect()
}

impl PreferenceConfig {
    /// Validate a raw preference document and decode it.
    ///
    /// The raw check runs first so the caller gets a precise message (unknown notification key,
    /// bad view name, colour for a status outside the vocabulary) rather than a serde error.
    pub fn from_document(document: &Value) -> Result<Self, PreferenceError> {
        validate_document(document)?;
        serde_json::from_value(document.clone()).map_err(|e| PreferenceError::Shape(e.to_string()))
    }

    pub fn color_for(&self, status: ApplicationStatus) -> Option<&str> {
        self.display.status_colors.get(&status).map(String::as_str)
    }
}

fn validate_document(document: &Value) -> Result<(), PreferenceError> {
    if let Some(notifications) = document.get("notifications") {
        let map = notifications
            .as_object()
            .ok_or(PreferenceError::NotAnObject("notifications"))?;
        for (key, value) in map {
            if !NOTIFICATION_KEYS.contains(&key.as_str()) {
                return Err(PreferenceError::UnknownNotification(key.clone()));
            }
            if !value.is_boolean() {
                return Err(PreferenceError::NotificationNotBool(key.clone()));
            }
        }
    }

    if let Some(display) = document.get("display") {
        let map = display
            .as_object()
            .ok_or(PreferenceError::NotAnObject("display"))?;
        if let Some(view) = map.get("timeline_view").and_then(Value::as_str) {
            if !TIMELINE_VIEWS.contains(&view) {
                return Err(PreferenceError::InvalidTimelineView(view.to_string()));
            }
        }
        if let Some(colors) = map.get("status_colors").and_then(Value::as_object) {
            for (status, color) in colors {
                if status.parse::<ApplicationStatus>().is_err() {
                    return Err(PreferenceError::InvalidColorStatus(status.clone()));
                }
                if !color.is_string() {
                    return Err(PreferenceError::ColorNotString(status.clone()));
                }
            }
        }
    }

    Ok(())
}

/// Stored preference row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPreference {
    pub owner_id: i64,
    pub config: PreferenceConfig,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
