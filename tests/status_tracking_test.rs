mod common;

use applytrack_core::config::EngineConfig;
use applytrack_core::error::{ErrorKind, TrackerError};
use applytrack_core::models::{Milestone, TrackedEntity, TransitionGraph};
use applytrack_core::services::StatusUpdateRequest;
use applytrack_core::state_machine::{ApplicationStatus, Stage};
use chrono::Duration;
use common::*;
use serde_json::{json, Map};
use ApplicationStatus::*;

#[tokio::test]
async fn test_register_writes_first_record() {
    let harness = TestHarness::new();

    let outcome = harness
        .tracking
        .register_entity(OWNER, 1, None, None)
        .await
        .unwrap();

    assert_eq!(outcome.entity.status, Applied);
    assert_eq!(outcome.entity.version, Some(1));
    assert_eq!(outcome.entity.last_status_change_at, Some(start_time()));
    assert!(!outcome.suppressed);

    let record = outcome.record.unwrap();
    assert_eq!(record.old_status, None);
    assert_eq!(record.new_status, Applied);
    assert_eq!(record.duration_minutes, None);
    assert_eq!(record.source(), Some("register"));

    let summary = &outcome.entity.status_history_summary;
    assert_eq!(summary.total_changes(), 1);
    assert_eq!(summary.metadata.current_status, Some(Applied));
    assert_eq!(summary.metadata.current_stage, Some(Stage::Applied));
}

#[tokio::test]
async fn test_register_twice_is_rejected() {
    let harness = TestHarness::new();
    harness.register(1).await;

    let err = harness
        .tracking
        .register_entity(OWNER, 1, None, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);
}

#[tokio::test]
async fn test_forward_update_records_duration_and_aggregates() {
    let harness = TestHarness::new();
    harness.register(1).await;

    harness.advance_minutes(90);
    let outcome = harness.move_to(1, ResumeScreening).await;

    assert_eq!(outcome.entity.status, ResumeScreening);
    assert_eq!(outcome.entity.version, Some(2));
    assert_eq!(
        outcome.entity.last_status_change_at,
        Some(start_time() + Duration::minutes(90))
    );

    let record = outcome.record.unwrap();
    assert_eq!(record.old_status, Some(Applied));
    assert_eq!(record.new_status, ResumeScreening);
    assert_eq!(record.duration_minutes, Some(90));
    assert_eq!(record.source(), Some("single"));
    assert!(!record.is_backward());

    let summary = &outcome.entity.status_history_summary;
    assert_eq!(summary.total_changes(), 2);
    assert_eq!(summary.metadata.total_duration_minutes, 90);
    assert_eq!(summary.metadata.current_stage, Some(Stage::Screening));

    let stats = &outcome.entity.status_duration_stats;
    assert_eq!(stats.minutes_in(Applied), 90);
    assert_eq!(
        stats.milestones.get(&Milestone::FirstResponse),
        Some(&(start_time() + Duration::minutes(90)))
    );

    let stored = harness.stored(1).await;
    assert_eq!(stored, outcome.entity);
}

#[tokio::test]
async fn test_not_permitted_transition_changes_nothing() {
    let harness = TestHarness::new();
    harness.register(1).await;

    let err = harness
        .tracking
        .update_status(OWNER, 1, StatusUpdateRequest::new(OfferReceived))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::TransitionDenied);
    assert_eq!(err.entity_id(), Some(1));

    let history = harness.tracking.get_history(OWNER, 1, 1, 10).await.unwrap();
    assert_eq!(history.total, 1);
    let entity = harness.stored(1).await;
    assert_eq!(entity.version, Some(1));
    assert_eq!(entity.status, Applied);
}

#[tokio::test]
async fn test_same_status_is_noop_error() {
    let harness = TestHarness::new();
    harness.register(1).await;

    let err = harness
        .tracking
        .update_status(OWNER, 1, StatusUpdateRequest::new(Applied))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        TrackerError::NoOp {
            entity_id: 1,
            status: Applied
        }
    );
}

#[tokio::test]
async fn test_stale_expected_version_conflicts() {
    let harness = TestHarness::new();
    harness.register(1).await;
    harness.move_to(1, ResumeScreening).await;

    let err = harness
        .tracking
        .update_status(
            OWNER,
            1,
            StatusUpdateRequest::new(WrittenTest).with_expected_version(1),
        )
        .await
        .unwrap_err();
    assert_eq!(
        err,
        TrackerError::VersionConflict {
            entity_id: 1,
            expected: Some(1),
            actual: Some(2),
        }
    );

    let ok = harness
        .tracking
        .update_status(
            OWNER,
            1,
            StatusUpdateRequest::new(WrittenTest).with_expected_version(2),
        )
        .await
        .unwrap();
    assert_eq!(ok.entity.version, Some(3));
}

#[tokio::test]
async fn test_legacy_row_without_version_compares_as_zero() {
    let harness = TestHarness::new();
    harness
        .store
        .seed_entity(TrackedEntity::new(5, OWNER, Applied, start_time()))
        .await;

    harness.advance_minutes(30);
    let outcome = harness
        .tracking
        .update_status(
            OWNER,
            5,
            StatusUpdateRequest::new(ResumeScreening).with_expected_version(0),
        )
        .await
        .unwrap();

    assert_eq!(outcome.entity.version, Some(1));
    // Measured from creation when no earlier change is known
    assert_eq!(outcome.record.unwrap().duration_minutes, Some(30));
}

#[tokio::test]
async fn test_unknown_entity_and_foreign_owner_are_not_found() {
    let harness = TestHarness::new();
    harness.register(1).await;

    let err = harness
        .tracking
        .update_status(OWNER, 99, StatusUpdateRequest::new(ResumeScreening))
        .await
        .unwrap_err();
    assert_eq!(err, TrackerError::NotFound { entity_id: 99 });

    let err = harness
        .tracking
        .update_status(OTHER_OWNER, 1, StatusUpdateRequest::new(ResumeScreening))
        .await
        .unwrap_err();
    assert_eq!(err, TrackerError::NotFound { entity_id: 1 });

    let err = harness.tracking.get_timeline(OTHER_OWNER, 1).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_backward_requires_confirmation_then_is_suppressed() {
    let harness = TestHarness::new();
    harness.register(1).await;
    harness.walk(1, &[ResumeScreening, WrittenTest], 60).await;

    let err = harness
        .tracking
        .update_status(OWNER, 1, StatusUpdateRequest::new(ResumeScreening))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        TrackerError::BackwardConfirmRequired {
            entity_id: 1,
            from: WrittenTest,
            to: ResumeScreening,
        }
    );

    harness.advance_minutes(15);
    let outcome = harness
        .tracking
        .update_status(
            OWNER,
            1,
            StatusUpdateRequest::new(ResumeScreening).confirmed_backward(),
        )
        .await
        .unwrap();

    assert!(outcome.suppressed);
    assert!(outcome.record.is_none());
    assert_eq!(outcome.entity.status, ResumeScreening);
    assert_eq!(outcome.entity.version, Some(3));
    assert_eq!(outcome.entity.status_history_summary.total_changes(), 3);
    assert_eq!(
        outcome.entity.updated_at,
        start_time() + Duration::minutes(135)
    );
    assert_eq!(
        outcome.entity.last_status_change_at,
        Some(start_time() + Duration::minutes(120))
    );

    let history = harness.tracking.get_history(OWNER, 1, 1, 10).await.unwrap();
    assert_eq!(history.total, 3);
    assert_eq!(history.records[0].new_status, WrittenTest);
}

#[tokio::test]
async fn test_confirmed_backward_from_finished_leaves_aggregates_untouched() {
    let harness = TestHarness::new();
    harness.register(1).await;
    harness
        .walk(1, &[ResumeScreening, WrittenTest, WrittenTestFail, ProcessFinished], 45)
        .await;

    let before = harness.stored(1).await;
    let records_before = harness.store.all_records().await.len();
    assert_eq!(before.status, ProcessFinished);

    harness.advance_minutes(30);
    let outcome = harness
        .tracking
        .update_status(
            OWNER,
            1,
            StatusUpdateRequest::new(WrittenTest)
                .confirmed_backward()
                .with_note("重新推进"),
        )
        .await
        .unwrap();
    assert!(outcome.suppressed);

    let after = harness.stored(1).await;
    assert_eq!(after.status, WrittenTest);
    assert_eq!(
        serde_json::to_string(&after.version).unwrap(),
        serde_json::to_string(&before.version).unwrap()
    );
    assert_eq!(
        serde_json::to_string(&after.status_history_summary).unwrap(),
        serde_json::to_string(&before.status_history_summary).unwrap()
    );
    assert_eq!(
        serde_json::to_string(&after.status_duration_stats).unwrap(),
        serde_json::to_string(&before.status_duration_stats).unwrap()
    );
    assert_eq!(after.last_status_change_at, before.last_status_change_at);
    assert_eq!(after.updated_at, start_time() + Duration::minutes(210));
    assert_eq!(harness.store.all_records().await.len(), records_before);
}

#[tokio::test]
async fn test_confirmed_template_regression_is_suppressed() {
    let harness = TestHarness::new();
    let graph = pipeline_graph().with_edge(FirstFail, ResumeScreening);
    harness
        .store
        .insert_template(flow_template(2, Some(OWNER), graph, true));

    harness.register(1).await;
    harness
        .walk(1, &[ResumeScreening, FirstInterview, FirstFail], 60)
        .await;
    let before = harness.stored(1).await;

    let outcome = harness
        .tracking
        .update_status(
            OWNER,
            1,
            StatusUpdateRequest::new(ResumeScreening).confirmed_backward(),
        )
        .await
        .unwrap();

    assert!(outcome.suppressed);
    assert!(outcome.record.is_none());
    assert_eq!(outcome.entity.status, ResumeScreening);
    assert_eq!(outcome.entity.version, Some(4));

    let after = harness.stored(1).await;
    assert_eq!(after.version, before.version);
    assert_eq!(after.status_history_summary, before.status_history_summary);
    assert_eq!(after.status_duration_stats, before.status_duration_stats);
    assert_eq!(harness.tracking.get_history(OWNER, 1, 1, 10).await.unwrap().total, 4);
}

#[tokio::test]
async fn test_backward_out_of_failed_status_needs_note() {
    let harness = TestHarness::new();
    harness.register(1).await;
    harness
        .walk(1, &[ResumeScreening, FirstInterview, FirstFail], 60)
        .await;

    for note in [None, Some("   ")] {
        let mut request = StatusUpdateRequest::new(ResumeScreening).confirmed_backward();
        if let Some(note) = note {
            request = request.with_note(note);
        }
        let err = harness
            .tracking
            .update_status(OWNER, 1, request)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            TrackerError::NoteRequiredForBackward {
                entity_id: 1,
                from: FirstFail
            }
        );
    }

    let outcome = harness
        .tracking
        .update_status(
            OWNER,
            1,
            StatusUpdateRequest::new(ResumeScreening)
                .confirmed_backward()
                .with_note("recruiter reopened the position"),
        )
        .await
        .unwrap();
    assert!(outcome.suppressed);
    assert_eq!(outcome.entity.status, ResumeScreening);
}

#[tokio::test]
async fn test_backward_disabled_by_config() {
    let harness = TestHarness::with_config(EngineConfig {
        allow_backward: false,
        ..EngineConfig::default()
    });
    harness.register(1).await;
    harness.walk(1, &[ResumeScreening, WrittenTest], 10).await;

    let err = harness
        .tracking
        .update_status(
            OWNER,
            1,
            StatusUpdateRequest::new(Applied)
                .confirmed_backward()
                .with_note("retry"),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BackwardDisabled);
}

#[tokio::test]
async fn test_template_edge_that_regresses_is_recorded_as_backward() {
    let harness = TestHarness::new();
    let graph = pipeline_graph().with_edge(FirstFail, ResumeScreening);
    harness
        .store
        .insert_template(flow_template(2, Some(OWNER), graph, true));

    harness.register(1).await;
    harness
        .walk(1, &[ResumeScreening, FirstInterview, FirstFail], 60)
        .await;

    harness.advance_minutes(5);
    let outcome = harness.move_to(1, ResumeScreening).await;

    assert!(!outcome.suppressed);
    assert_eq!(outcome.entity.version, Some(5));
    let record = outcome.record.unwrap();
    assert!(record.is_backward());
    assert_eq!(record.metadata["from"], json!("一面未通过"));
    assert_eq!(record.metadata["to"], json!("简历筛选中"));
    assert_eq!(record.duration_minutes, Some(5));
}

#[tokio::test]
async fn test_owner_template_overrides_global_default() {
    let harness = TestHarness::new();
    harness.store.insert_template(flow_template(
        2,
        Some(OWNER),
        TransitionGraph::new().with_edge(Applied, OfferReceived),
        false,
    ));
    harness.register(1).await;

    let outcome = harness.move_to(1, OfferReceived).await;
    assert_eq!(outcome.entity.status, OfferReceived);

    // The global pipeline edge no longer applies to this owner
    harness
        .tracking
        .register_entity(OWNER, 2, None, None)
        .await
        .unwrap();
    let err = harness
        .tracking
        .update_status(OWNER, 2, StatusUpdateRequest::new(ResumeScreening))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransitionDenied);
}

#[tokio::test]
async fn test_without_template_only_direct_advances_pass() {
    let harness = TestHarness::without_template(EngineConfig::default());
    harness.register_at(1, WrittenTest).await;
    harness.register(2).await;

    let outcome = harness.move_to(1, FirstInterview).await;
    assert_eq!(outcome.entity.status, FirstInterview);

    let err = harness
        .tracking
        .update_status(OWNER, 2, StatusUpdateRequest::new(ResumeScreening))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TrackerError::TransitionDenied {
            entity_id: 2,
            from: Applied,
            to: ResumeScreening,
            ..
        }
    ));
}

#[tokio::test]
async fn test_note_and_caller_metadata_are_recorded() {
    let harness = TestHarness::new();
    harness.register(1).await;

    let mut caller = Map::new();
    caller.insert("channel".to_string(), json!("email"));
    caller.insert("source".to_string(), json!("spoofed"));

    let outcome = harness
        .tracking
        .update_status(
            OWNER,
            1,
            StatusUpdateRequest::new(ResumeScreening)
                .with_note("  HR replied  ")
                .with_metadata(caller),
        )
        .await
        .unwrap();

    let record = outcome.record.unwrap();
    assert_eq!(record.note(), Some("HR replied"));
    assert_eq!(record.source(), Some("single"));
    assert_eq!(record.metadata["channel"], json!("email"));
}

#[tokio::test]
async fn test_overlong_note_is_rejected() {
    let harness = TestHarness::with_config(EngineConfig {
        max_note_length: 5,
        ..EngineConfig::default()
    });
    harness.register(1).await;

    let err = harness
        .tracking
        .update_status(
            OWNER,
            1,
            StatusUpdateRequest::new(ResumeScreening).with_note("一二三四五六"),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);

    // Limit counts characters, not bytes
    harness
        .tracking
        .update_status(
            OWNER,
            1,
            StatusUpdateRequest::new(ResumeScreening).with_note("一二三四五"),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_history_paging() {
    let harness = TestHarness::new();
    harness.register(1).await;
    harness
        .walk(1, &[ResumeScreening, WrittenTest, WrittenTestPass], 20)
        .await;

    let page = harness.tracking.get_history(OWNER, 1, 1, 3).await.unwrap();
    assert_eq!(page.total, 4);
    assert_eq!(page.total_pages(), 2);
    let statuses: Vec<_> = page.records.iter().map(|r| r.new_status).collect();
    assert_eq!(statuses, vec![WrittenTestPass, WrittenTest, ResumeScreening]);

    let page = harness.tracking.get_history(OWNER, 1, 2, 3).await.unwrap();
    assert_eq!(page.records.len(), 1);
    assert_eq!(page.records[0].new_status, Applied);

    let page = harness.tracking.get_history(OWNER, 1, 0, 0).await.unwrap();
    assert_eq!(page.page, 1);
    assert_eq!(page.page_size, 50);
    assert_eq!(page.records.len(), 4);

    let page = harness.tracking.get_history(OWNER, 1, 1, 1000).await.unwrap();
    assert_eq!(page.page_size, 50);
}

#[tokio::test]
async fn test_timeline_is_oldest_first_with_total_duration() {
    let harness = TestHarness::new();
    harness.register(1).await;
    harness.walk(1, &[ResumeScreening, WrittenTest], 45).await;

    let timeline = harness.tracking.get_timeline(OWNER, 1).await.unwrap();
    let statuses: Vec<_> = timeline.records.iter().map(|r| r.new_status).collect();
    assert_eq!(statuses, vec![Applied, ResumeScreening, WrittenTest]);
    assert_eq!(timeline.total_changes, 3);
    assert_eq!(timeline.total_duration_minutes, 90);
}

#[tokio::test]
async fn test_milestones_are_set_once() {
    let harness = TestHarness::new();
    harness.register(1).await;
    let entity = harness
        .walk(
            1,
            &[
                ResumeScreening,
                FirstInterview,
                FirstPass,
                SecondInterview,
                SecondPass,
                HrInterview,
                HrPass,
                OfferWaiting,
                OfferReceived,
            ],
            60,
        )
        .await;

    let milestones = &entity.status_duration_stats.milestones;
    assert_eq!(
        milestones.get(&Milestone::FirstResponse),
        Some(&(start_time() + Duration::minutes(60)))
    );
    assert_eq!(
        milestones.get(&Milestone::FirstInterview),
        Some(&(start_time() + Duration::minutes(120)))
    );
    assert_eq!(
        milestones.get(&Milestone::OfferReceived),
        Some(&(start_time() + Duration::minutes(540)))
    );

    let total: f64 = entity
        .status_duration_stats
        .status_durations
        .values()
        .map(|d| d.percentage)
        .sum();
    assert!((total - 100.0).abs() < 1e-6);
}
