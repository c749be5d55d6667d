use jiff::Timestamp;
use serde_json::json;
use tempfile::NamedTempFile;
use tether_core::{
    db::NewEvent,
    nudges::NudgeStore,
    params::DeclaredStep,
    Database, EngineError, EventType, FeatureCategory, FeatureStatus, SessionStatus, StepStatus,
};

const PROJECT: &str = "/test/project";

/// Helper function to create a temporary database for testing
fn create_test_db() -> (NamedTempFile, Database) {
    let temp_file = NamedTempFile::new().expect("Failed to create temporary file");
    let db = Database::new(temp_file.path()).expect("Failed to create test database");
    (temp_file, db)
}

fn make_event(id: &str, session: &str, feature_id: u64) -> NewEvent {
    NewEvent {
        id: id.to_string(),
        event_type: EventType::ToolCall,
        tool_name: Some("Edit".to_string()),
        payload: json!({"file_path": "src/main.rs"}),
        timestamp: Timestamp::now(),
        session_id: session.to_string(),
        source_agent: "test-agent".to_string(),
        project: PROJECT.to_string(),
        feature_id,
        step_id: None,
        success: true,
        drift_flagged: false,
        summary: None,
    }
}

#[test]
fn test_database_initialization() {
    let (temp_file, _db) = create_test_db();
    assert!(temp_file.path().exists());

    // Reopening must be idempotent against the existing schema
    let _again = Database::new(temp_file.path()).expect("Failed to reopen database");
}

#[test]
fn test_create_and_get_feature() {
    let (_temp_file, mut db) = create_test_db();

    let feature = db
        .create_feature(Some(PROJECT), "Add CSV export", FeatureCategory::Functional, 0, false)
        .expect("Failed to create feature");
    assert!(feature.id > 0);
    assert_eq!(feature.status, FeatureStatus::Pending);
    assert!(!feature.is_session_work);

    let fetched = db
        .get_feature(feature.id)
        .expect("Failed to get feature")
        .expect("Feature should exist");
    assert_eq!(fetched.description, "Add CSV export");
    assert_eq!(fetched.work_count, 0);
}

#[test]
fn test_empty_description_is_rejected() {
    let (_temp_file, mut db) = create_test_db();

    let result = db.create_feature(Some(PROJECT), "   ", FeatureCategory::Functional, 0, false);
    assert!(matches!(result, Err(EngineError::InvalidInput { .. })));
}

#[test]
fn test_session_work_sentinel_is_unique_per_project() {
    let (_temp_file, mut db) = create_test_db();

    let first = db
        .get_or_create_session_work(PROJECT)
        .expect("Failed to create sentinel");
    let second = db
        .get_or_create_session_work(PROJECT)
        .expect("Failed to fetch sentinel");
    assert_eq!(first.id, second.id);
    assert!(first.is_session_work);
    assert_eq!(first.priority, -1);

    // A different project gets its own sentinel
    let other = db
        .get_or_create_session_work("/test/other")
        .expect("Failed to create sentinel");
    assert_ne!(other.id, first.id);
}

#[test]
fn test_activation_demotes_sibling_features() {
    let (_temp_file, mut db) = create_test_db();

    let a = db
        .create_feature(Some(PROJECT), "Feature A", FeatureCategory::Functional, 0, true)
        .expect("Failed to create feature");
    let b = db
        .create_feature(Some(PROJECT), "Feature B", FeatureCategory::Bugfix, 0, false)
        .expect("Failed to create feature");

    let active = db
        .get_active_feature(PROJECT)
        .expect("Failed to query active feature")
        .expect("Feature A should be active");
    assert_eq!(active.id, a.id);

    db.activate_feature(b.id).expect("Failed to activate B");
    let active = db
        .get_active_feature(PROJECT)
        .expect("Failed to query active feature")
        .expect("Feature B should be active");
    assert_eq!(active.id, b.id);

    let a = db.get_feature(a.id).expect("query").expect("exists");
    assert_eq!(a.status, FeatureStatus::Pending);
}

#[test]
fn test_sentinel_cannot_be_activated_or_completed() {
    let (_temp_file, mut db) = create_test_db();

    let sentinel = db
        .get_or_create_session_work(PROJECT)
        .expect("Failed to create sentinel");

    assert!(db.activate_feature(sentinel.id).is_err());
    assert!(db.complete_feature(sentinel.id).is_err());
}

#[test]
fn test_complete_feature_stamps_completion() {
    let (_temp_file, mut db) = create_test_db();

    let feature = db
        .create_feature(Some(PROJECT), "Feature A", FeatureCategory::Functional, 0, true)
        .expect("Failed to create feature");
    let completed = db.complete_feature(feature.id).expect("Failed to complete");

    assert_eq!(completed.status, FeatureStatus::Complete);
    assert!(completed.completed_at.is_some());
    assert!(db
        .get_active_feature(PROJECT)
        .expect("Failed to query")
        .is_none());
}

#[test]
fn test_begin_feature_if_pending_fires_once() {
    let (_temp_file, mut db) = create_test_db();

    let feature = db
        .create_feature(Some(PROJECT), "Feature A", FeatureCategory::Functional, 0, false)
        .expect("Failed to create feature");

    assert!(db.begin_feature_if_pending(feature.id).expect("first call"));
    assert!(!db.begin_feature_if_pending(feature.id).expect("second call"));

    let feature = db.get_feature(feature.id).expect("query").expect("exists");
    assert_eq!(feature.status, FeatureStatus::InProgress);
}

#[test]
fn test_feature_stats() {
    let (_temp_file, mut db) = create_test_db();

    let a = db
        .create_feature(Some(PROJECT), "Feature A", FeatureCategory::Functional, 0, true)
        .expect("create");
    db.create_feature(Some(PROJECT), "Feature B", FeatureCategory::Functional, 0, false)
        .expect("create");
    db.get_or_create_session_work(PROJECT).expect("sentinel");
    db.complete_feature(a.id).expect("complete");

    let stats = db.feature_stats(PROJECT).expect("stats");
    // The sentinel is excluded from the totals
    assert_eq!(stats.total, 2);
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.in_progress, 0);
}

fn declared(descriptions: &[&str]) -> Vec<DeclaredStep> {
    descriptions
        .iter()
        .map(|d| DeclaredStep::from((*d).to_string()))
        .collect()
}

#[test]
fn test_sync_steps_creates_ordered_plan() {
    let (_temp_file, mut db) = create_test_db();
    let feature = db
        .create_feature(Some(PROJECT), "Feature A", FeatureCategory::Functional, 0, true)
        .expect("create");

    let steps = db
        .sync_steps(feature.id, &declared(&["one", "two", "three"]))
        .expect("sync");
    assert_eq!(steps.len(), 3);
    assert_eq!(steps[0].description, "one");
    assert_eq!(steps[2].order, 2);
    assert!(steps.iter().all(|s| s.status == StepStatus::Pending));
}

#[test]
fn test_sync_steps_is_idempotent() {
    let (_temp_file, mut db) = create_test_db();
    let feature = db
        .create_feature(Some(PROJECT), "Feature A", FeatureCategory::Functional, 0, true)
        .expect("create");

    let plan = declared(&["one", "two", "three"]);
    let first = db.sync_steps(feature.id, &plan).expect("first sync");
    let second = db.sync_steps(feature.id, &plan).expect("second sync");

    let first_view: Vec<_> = first
        .iter()
        .map(|s| (s.id, s.description.clone(), s.status, s.order))
        .collect();
    let second_view: Vec<_> = second
        .iter()
        .map(|s| (s.id, s.description.clone(), s.status, s.order))
        .collect();
    assert_eq!(first_view, second_view);
}

#[test]
fn test_resync_of_identical_plan_keeps_in_progress_status() {
    let (_temp_file, mut db) = create_test_db();
    let feature = db
        .create_feature(Some(PROJECT), "Feature A", FeatureCategory::Functional, 0, true)
        .expect("create");

    let plan = declared(&["one", "two"]);
    let steps = db.sync_steps(feature.id, &plan).expect("sync");
    db.update_step_status(steps[0].id, StepStatus::InProgress)
        .expect("start one");

    // Declarations without a status leave matched steps alone
    let steps = db.sync_steps(feature.id, &plan).expect("resync");
    assert_eq!(steps[0].status, StepStatus::InProgress);
    assert_eq!(steps[1].status, StepStatus::Pending);
}

#[test]
fn test_sync_steps_applies_explicitly_declared_statuses() {
    let (_temp_file, mut db) = create_test_db();
    let feature = db
        .create_feature(Some(PROJECT), "Feature A", FeatureCategory::Functional, 0, true)
        .expect("create");
    db.sync_steps(feature.id, &declared(&["one", "two", "three"]))
        .expect("sync");

    let plan: Vec<DeclaredStep> = [
        ("one", Some(StepStatus::Completed)),
        ("two", Some(StepStatus::InProgress)),
        ("three", None),
    ]
    .into_iter()
    .map(|(description, status)| DeclaredStep {
        description: description.to_string(),
        status,
        expected_tools: Vec::new(),
    })
    .collect();
    let steps = db.sync_steps(feature.id, &plan).expect("resync");

    assert_eq!(steps[0].status, StepStatus::Completed);
    assert!(steps[0].completed_at.is_some());
    assert_eq!(steps[1].status, StepStatus::InProgress);
    assert!(steps[1].started_at.is_some());
    assert_eq!(steps[2].status, StepStatus::Pending);
}

#[test]
fn test_sync_steps_skips_dropped_and_keeps_completed() {
    let (_temp_file, mut db) = create_test_db();
    let feature = db
        .create_feature(Some(PROJECT), "Feature A", FeatureCategory::Functional, 0, true)
        .expect("create");

    let steps = db
        .sync_steps(feature.id, &declared(&["one", "two", "three"]))
        .expect("sync");
    db.update_step_status(steps[0].id, StepStatus::InProgress)
        .expect("start");
    db.update_step_status(steps[0].id, StepStatus::Completed)
        .expect("complete");

    // Redeclare without "one" (completed) and "two" (pending)
    let steps = db
        .sync_steps(feature.id, &declared(&["three", "four"]))
        .expect("resync");
    assert_eq!(steps.len(), 4);
    assert_eq!(steps[0].description, "three");
    assert_eq!(steps[1].description, "four");

    let one = steps.iter().find(|s| s.description == "one").expect("one");
    let two = steps.iter().find(|s| s.description == "two").expect("two");
    assert_eq!(one.status, StepStatus::Completed);
    assert_eq!(two.status, StepStatus::Skipped);
    // Dropped steps are parked after the declared list
    assert!(one.order >= 2 && two.order >= 2);
}

#[test]
fn test_get_active_step_prefers_in_progress_then_pending() {
    let (_temp_file, mut db) = create_test_db();
    let feature = db
        .create_feature(Some(PROJECT), "Feature A", FeatureCategory::Functional, 0, true)
        .expect("create");
    let steps = db
        .sync_steps(feature.id, &declared(&["one", "two", "three"]))
        .expect("sync");

    // No in-progress step: the first pending one is active
    let active = db.get_active_step(feature.id).expect("query").expect("some");
    assert_eq!(active.description, "one");

    db.update_step_status(steps[1].id, StepStatus::InProgress)
        .expect("start two");
    let active = db.get_active_step(feature.id).expect("query").expect("some");
    assert_eq!(active.description, "two");
}

#[test]
fn test_update_step_status_enforces_single_in_progress() {
    let (_temp_file, mut db) = create_test_db();
    let feature = db
        .create_feature(Some(PROJECT), "Feature A", FeatureCategory::Functional, 0, true)
        .expect("create");
    let steps = db
        .sync_steps(feature.id, &declared(&["one", "two"]))
        .expect("sync");

    let one = db
        .update_step_status(steps[0].id, StepStatus::InProgress)
        .expect("start one");
    assert!(one.started_at.is_some());

    db.update_step_status(steps[1].id, StepStatus::InProgress)
        .expect("start two");

    let steps = db.get_steps(feature.id).expect("list");
    let in_progress: Vec<_> = steps
        .iter()
        .filter(|s| s.status == StepStatus::InProgress)
        .collect();
    assert_eq!(in_progress.len(), 1);
    assert_eq!(in_progress[0].description, "two");
}

#[test]
fn test_completed_step_cannot_go_back_to_pending() {
    let (_temp_file, mut db) = create_test_db();
    let feature = db
        .create_feature(Some(PROJECT), "Feature A", FeatureCategory::Functional, 0, true)
        .expect("create");
    let steps = db.sync_steps(feature.id, &declared(&["one"])).expect("sync");

    let done = db
        .update_step_status(steps[0].id, StepStatus::Completed)
        .expect("complete");
    assert!(done.completed_at.is_some());

    let result = db.update_step_status(steps[0].id, StepStatus::Pending);
    assert!(matches!(result, Err(EngineError::InvalidTransition { .. })));
}

#[test]
fn test_complete_step_and_advance_promotes_next() {
    let (_temp_file, mut db) = create_test_db();
    let feature = db
        .create_feature(Some(PROJECT), "Feature A", FeatureCategory::Functional, 0, true)
        .expect("create");
    let steps = db
        .sync_steps(feature.id, &declared(&["one", "two"]))
        .expect("sync");
    db.update_step_status(steps[0].id, StepStatus::InProgress)
        .expect("start");

    let (completed, next) = db
        .complete_step_and_advance(steps[0].id)
        .expect("advance");
    assert_eq!(completed.status, StepStatus::Completed);
    let next = next.expect("a next step should be promoted");
    assert_eq!(next.description, "two");
    assert_eq!(next.status, StepStatus::InProgress);

    // Completing the last step promotes nothing
    let (_, none) = db.complete_step_and_advance(next.id).expect("advance");
    assert!(none.is_none());
}

#[test]
fn test_insert_event_dedupes_by_id() {
    let (_temp_file, mut db) = create_test_db();
    let sentinel = db.get_or_create_session_work(PROJECT).expect("sentinel");

    let event = make_event("evt-1", "session-1", sentinel.id);
    assert!(db.insert_event(&event).expect("first insert"));
    assert!(!db.insert_event(&event).expect("redelivery"));

    let events = db.get_recent_events("session-1", 10).expect("query");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].id, "evt-1");
}

#[test]
fn test_insert_event_upserts_session_and_terminal_ends_it() {
    let (_temp_file, mut db) = create_test_db();
    let sentinel = db.get_or_create_session_work(PROJECT).expect("sentinel");

    db.insert_event(&make_event("evt-1", "session-1", sentinel.id))
        .expect("insert");
    let session = db
        .get_session("session-1")
        .expect("query")
        .expect("session exists");
    assert_eq!(session.status, SessionStatus::Active);

    let mut stop = make_event("evt-2", "session-1", sentinel.id);
    stop.event_type = EventType::AgentStop;
    stop.tool_name = None;
    db.insert_event(&stop).expect("insert terminal");

    let session = db
        .get_session("session-1")
        .expect("query")
        .expect("session exists");
    assert_eq!(session.status, SessionStatus::Ended);
    assert!(session.ended_at.is_some());
}

#[test]
fn test_last_progress_ignores_failed_and_read_only_tools() {
    let (_temp_file, mut db) = create_test_db();
    let sentinel = db.get_or_create_session_work(PROJECT).expect("sentinel");

    let mut read = make_event("evt-1", "session-1", sentinel.id);
    read.tool_name = Some("Read".to_string());
    db.insert_event(&read).expect("insert");

    let mut failed = make_event("evt-2", "session-1", sentinel.id);
    failed.success = false;
    db.insert_event(&failed).expect("insert");

    assert!(db
        .get_last_progress_at("session-1")
        .expect("query")
        .is_none());

    db.insert_event(&make_event("evt-3", "session-1", sentinel.id))
        .expect("insert");
    assert!(db
        .get_last_progress_at("session-1")
        .expect("query")
        .is_some());
}

#[test]
fn test_session_work_count_only_counts_sentinel_events() {
    let (_temp_file, mut db) = create_test_db();
    let sentinel = db.get_or_create_session_work(PROJECT).expect("sentinel");
    let feature = db
        .create_feature(Some(PROJECT), "Feature A", FeatureCategory::Functional, 0, true)
        .expect("create");

    db.insert_event(&make_event("evt-1", "session-1", sentinel.id))
        .expect("insert");
    db.insert_event(&make_event("evt-2", "session-1", sentinel.id))
        .expect("insert");
    db.insert_event(&make_event("evt-3", "session-1", feature.id))
        .expect("insert");
    db.insert_event(&make_event("evt-4", "session-2", sentinel.id))
        .expect("insert");

    assert_eq!(
        db.count_session_work_events("session-1").expect("count"),
        2
    );
}

#[test]
fn test_changes_since_commit_resets_at_commit_event() {
    let (_temp_file, mut db) = create_test_db();
    let sentinel = db.get_or_create_session_work(PROJECT).expect("sentinel");

    db.insert_event(&make_event("evt-1", "session-1", sentinel.id))
        .expect("insert");
    db.insert_event(&make_event("evt-2", "session-1", sentinel.id))
        .expect("insert");
    assert_eq!(db.count_changes_since_commit("session-1").expect("count"), 2);

    let mut commit = make_event("evt-3", "session-1", sentinel.id);
    commit.tool_name = Some("Bash".to_string());
    commit.payload = json!({"command": "git commit -m 'wip'"});
    commit.timestamp = Timestamp::now() + jiff::SignedDuration::from_secs(1);
    db.insert_event(&commit).expect("insert commit");

    assert_eq!(db.count_changes_since_commit("session-1").expect("count"), 0);
}

#[test]
fn test_recent_step_flags_order_newest_first() {
    let (_temp_file, mut db) = create_test_db();
    let feature = db
        .create_feature(Some(PROJECT), "Feature A", FeatureCategory::Functional, 0, true)
        .expect("create");
    let steps = db.sync_steps(feature.id, &declared(&["one"])).expect("sync");

    for (i, flagged) in [false, true, true].iter().enumerate() {
        let mut event = make_event(&format!("evt-{i}"), "session-1", feature.id);
        event.step_id = Some(steps[0].id);
        event.drift_flagged = *flagged;
        event.timestamp = Timestamp::now() + jiff::SignedDuration::from_secs(i as i64);
        db.insert_event(&event).expect("insert");
    }

    let flags = db.get_recent_step_flags(steps[0].id, 5).expect("query");
    assert_eq!(flags, vec![true, true, false]);
    assert_eq!(db.count_step_events(steps[0].id).expect("count"), 3);
}

#[test]
fn test_nudge_record_is_set_once_per_session() {
    let (_temp_file, mut db) = create_test_db();

    assert!(!db
        .has_been_nudged("session-1", "stuckness")
        .expect("query"));
    db.record_nudge("session-1", "stuckness").expect("record");
    assert!(db.has_been_nudged("session-1", "stuckness").expect("query"));

    // Recording again is a silent no-op
    db.record_nudge("session-1", "stuckness").expect("record");

    // Other sessions and keys are independent
    assert!(!db
        .has_been_nudged("session-2", "stuckness")
        .expect("query"));
    assert!(!db
        .has_been_nudged("session-1", "commit_reminder")
        .expect("query"));
}
