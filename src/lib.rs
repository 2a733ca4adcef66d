#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # ApplyTrack Core
//!
//! Status-transition engine for tracking job applications through a hiring pipeline.
//!
//! ## Overview
//!
//! Every application carries one status from a closed vocabulary of 23 labels
//! (`已投递`, `简历筛选中`, `笔试中`, ... `流程结束`). A status change is validated against the
//! owner's flow template, guarded by an optimistic version number, and recorded as an
//! immutable transition together with two rolling JSON aggregates on the application row:
//! a history summary and per-status duration statistics.
//!
//! ## Module Organization
//!
//! - [`state_machine`] - status vocabulary, validator, backward policy, version guard, recorder
//! - [`services`] - register, update, batch update, history, timeline, analytics, config
//! - [`models`] - applications, transition records, templates, preferences, reports
//! - [`database`] - PostgreSQL store and an in-memory store behind the same traits
//! - [`config`] - layered TOML and environment configuration
//! - [`error`] - caller-facing error type
//! - [`logging`] - structured `tracing` setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use applytrack_core::config::EngineConfig;
//! use applytrack_core::database::InMemoryStore;
//! use applytrack_core::services::{StatusTrackingService, StatusUpdateRequest};
//! use applytrack_core::state_machine::ApplicationStatus;
//! use std::sync::Arc;
//!
//! # async fn example() -> applytrack_core::Result<()> {
//! let service = StatusTrackingService::new(Arc::new(InMemoryStore::new()), EngineConfig::default());
//!
//! // Without a flow template only the built-in shortcuts and confirmed regressions pass
//! service
//!     .register_entity(1, 42, Some(ApplicationStatus::WrittenTest), None)
//!     .await?;
//! let outcome = service
//!     .update_status(1, 42, StatusUpdateRequest::new(ApplicationStatus::FirstInterview))
//!     .await?;
//! assert_eq!(outcome.entity.version, Some(2));
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib                      # Unit tests
//! cargo test                            # Unit and in-memory integration tests
//! cargo test -- --ignored               # PostgreSQL tests (needs DATABASE_URL)
//! ```

pub mod clock;
pub mod config;
pub mod constants;
pub mod database;
pub mod error;
pub mod logging;
pub mod models;
pub mod services;
pub mod state_machine;

pub use config::{DatabaseConfig, EngineConfig, TelemetryConfig, TrackerConfig};
pub use error::{ErrorKind, Result, TrackerError};
pub use services::{AnalyticsAggregator, StatusConfigService, StatusTrackingService};
pub use state_machine::{ApplicationStatus, Stage};
