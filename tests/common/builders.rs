//! Fixtures shared by the integration tests: an in-memory store seeded with a global
//! pipeline template, a manual clock, and the three services wired to both.

use applytrack_core::clock::{Clock, ManualClock};
use applytrack_core::config::EngineConfig;
use applytrack_core::database::InMemoryStore;
use applytrack_core::models::{FlowTemplate, TrackedEntity, TransitionGraph};
use applytrack_core::services::{
    AnalyticsAggregator, StatusConfigService, StatusTrackingService, StatusUpdateOutcome,
    StatusUpdateRequest,
};
use applytrack_core::state_machine::{ApplicationStatus, EntityStore};
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;

pub const OWNER: i64 = 7;
pub const OTHER_OWNER: i64 = 8;

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
}

/// A conventional hiring pipeline
pub fn pipeline_graph() -> TransitionGraph {
    use ApplicationStatus::*;

    let mut graph = TransitionGraph::new();
    for (from, to) in [
        (Applied, ResumeScreening),
        (ResumeScreening, WrittenTest),
        (ResumeScreening, ResumeScreeningFail),
        (ResumeScreening, FirstInterview),
        (WrittenTest, WrittenTestPass),
        (WrittenTest, WrittenTestFail),
        (WrittenTestPass, FirstInterview),
        (FirstInterview, FirstPass),
        (FirstInterview, FirstFail),
        (FirstPass, SecondInterview),
        (SecondInterview, SecondPass),
        (SecondInterview, SecondFail),
        (SecondPass, ThirdInterview),
        (SecondPass, HrInterview),
        (ThirdInterview, ThirdPass),
        (ThirdInterview, ThirdFail),
        (ThirdPass, HrInterview),
        (HrInterview, HrPass),
        (HrInterview, HrFail),
        (HrPass, OfferWaiting),
        (OfferWaiting, OfferReceived),
        (OfferReceived, OfferAccepted),
        (OfferReceived, Rejected),
        (OfferAccepted, ProcessFinished),
        (Rejected, ProcessFinished),
    ] {
        graph.add_edge(from, to);
    }
    for failed in ApplicationStatus::ALL.iter().filter(|s| s.is_failed()) {
        graph.add_edge(*failed, ProcessFinished);
    }
    graph
}

pub fn flow_template(
    id: i64,
    owner_id: Option<i64>,
    graph: TransitionGraph,
    is_default: bool,
) -> FlowTemplate {
    FlowTemplate {
        id,
        name: format!("flow-{id}"),
        description: None,
        graph,
        is_default,
        is_active: true,
        owner_id,
        created_at: start_time(),
        updated_at: start_time(),
    }
}

pub struct TestHarness {
    pub store: Arc<InMemoryStore>,
    pub clock: Arc<ManualClock>,
    pub tracking: StatusTrackingService<InMemoryStore>,
    pub analytics: AnalyticsAggregator<InMemoryStore>,
    pub status_config: StatusConfigService<InMemoryStore>,
}

impl TestHarness {
    /// Default engine config with the pipeline installed as the global default template
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let harness = Self::without_template(config);
        harness
            .store
            .insert_template(flow_template(1, None, pipeline_graph(), true));
        harness
    }

    /// No template at all: only direct advances and backward moves pass
    pub fn without_template(config: EngineConfig) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(ManualClock::new(start_time()));
        let dyn_clock: Arc<dyn Clock> = clock.clone();

        Self {
            tracking: StatusTrackingService::with_clock(
                Arc::clone(&store),
                config.clone(),
                Arc::clone(&dyn_clock),
            ),
            analytics: AnalyticsAggregator::with_clock(Arc::clone(&store), config, dyn_clock),
            status_config: StatusConfigService::new(Arc::clone(&store)),
            store,
            clock,
        }
    }

    pub fn advance_minutes(&self, minutes: i64) {
        self.clock.advance(Duration::minutes(minutes));
    }

    pub async fn register(&self, entity_id: i64) -> TrackedEntity {
        self.tracking
            .register_entity(OWNER, entity_id, None, None)
            .await
            .unwrap()
            .entity
    }

    pub async fn register_at(&self, entity_id: i64, status: ApplicationStatus) -> TrackedEntity {
        self.tracking
            .register_entity(OWNER, entity_id, Some(status), None)
            .await
            .unwrap()
            .entity
    }

    pub async fn move_to(&self, entity_id: i64, status: ApplicationStatus) -> StatusUpdateOutcome {
        self.tracking
            .update_status(OWNER, entity_id, StatusUpdateRequest::new(status))
            .await
            .unwrap()
    }

    /// The application as currently stored
    pub async fn stored(&self, entity_id: i64) -> TrackedEntity {
        self.store
            .find_entity(OWNER, entity_id)
            .await
            .unwrap()
            .expect("application should exist")
    }

    /// Apply `path` in order, letting `minutes` pass before each step
    pub async fn walk(&self, entity_id: i64, path: &[ApplicationStatus], minutes: i64) -> TrackedEntity {
        let mut entity = None;
        for status in path {
            self.advance_minutes(minutes);
            entity = Some(self.move_to(entity_id, *status).await.entity);
        }
        entity.expect("walk needs at least one status")
    }
}
