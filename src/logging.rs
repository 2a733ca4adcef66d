//! # Logging
//!
//! Environment-aware structured logging for the transition engine. Console output is
//! human-readable by default and JSON when [`TelemetryConfig::json_logs`] is set.

use crate::config::TelemetryConfig;
use crate::state_machine::states::ApplicationStatus;
use chrono::Utc;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific defaults
pub fn init_structured_logging() {
    init_with_config(&TelemetryConfig::default());
}

/// Initialize structured logging from telemetry configuration.
///
/// Only the first call in a process has an effect. `RUST_LOG` takes precedence over both the
/// configured and the environment-derived level.
pub fn init_with_config(telemetry: &TelemetryConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = telemetry
            .log_level
            .clone()
            .unwrap_or_else(|| get_log_level(&environment));
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level.clone()));

        // JSON output drops ANSI colouring; both carry the target and thread id
        let base = fmt::layer().with_target(true).with_thread_ids(true);
        let console = if telemetry.json_logs {
            base.json().with_filter(filter).boxed()
        } else {
            base.with_ansi(true).with_filter(filter).boxed()
        };

        if let Err(e) = tracing_subscriber::registry().with(console).try_init() {
            tracing::debug!(error = %e, "Tracing subscriber was installed elsewhere, keeping it");
        }

        tracing::info!(
            environment = %environment,
            log_level = %log_level,
            json = telemetry.json_logs,
            "🔧 LOGGING: ApplyTrack subscriber ready"
        );
    });
}

/// Deployment environment: `APPLYTRACK_ENV`, then `APP_ENV`, then `development`
pub fn get_environment() -> String {
    std::env::var("APPLYTRACK_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Default level when neither `RUST_LOG` nor the config names one
pub fn get_log_level(environment: &str) -> String {
    let level = if environment == "production" { "info" } else { "debug" };
    level.to_string()
}

/// Log structured data for one accepted or suppressed status transition
pub fn log_transition_operation(
    operation: &str,
    owner_id: i64,
    entity_id: i64,
    from: Option<ApplicationStatus>,
    to: ApplicationStatus,
    version: Option<i64>,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        owner_id = owner_id,
        entity_id = entity_id,
        from = from.map(ApplicationStatus::as_str),
        to = %to,
        version = version,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "📋 TRANSITION_OPERATION"
    );
}

/// Log a failure that is about to be surfaced to the caller
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "❌ ERROR"
    );
}
