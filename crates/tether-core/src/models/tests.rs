#[cfg(test)]
mod model_tests {
    use jiff::Timestamp;
    use serde_json::json;

    use crate::models::{
        Event, EventType, Feature, FeatureCategory, FeatureStats, FeatureStatus, SessionStatus,
        StepStatus,
    };

    fn create_test_feature(status: FeatureStatus) -> Feature {
        Feature {
            id: 42,
            project: "/test/project".to_string(),
            description: "Add CSV export".to_string(),
            category: FeatureCategory::Functional,
            status,
            priority: 0,
            is_session_work: false,
            work_count: 0,
            created_at: Timestamp::from_second(1640995200).unwrap(), // 2022-01-01 00:00:00 UTC
            updated_at: Timestamp::from_second(1641081600).unwrap(), // 2022-01-02 00:00:00 UTC
            completed_at: None,
        }
    }

    #[test]
    fn test_step_status_with_icon() {
        assert_eq!(StepStatus::Completed.with_icon(), "✓ Completed");
        assert_eq!(StepStatus::InProgress.with_icon(), "➤ In Progress");
        assert_eq!(StepStatus::Pending.with_icon(), "○ Pending");
        assert_eq!(StepStatus::Skipped.with_icon(), "⊘ Skipped");
    }

    #[test]
    fn test_step_status_round_trip() {
        for status in [
            StepStatus::Pending,
            StepStatus::InProgress,
            StepStatus::Completed,
            StepStatus::Skipped,
        ] {
            assert_eq!(status.as_str().parse::<StepStatus>().unwrap(), status);
        }
        assert!("bogus".parse::<StepStatus>().is_err());
    }

    #[test]
    fn test_step_status_transitions() {
        // Identity is always allowed
        assert!(StepStatus::Completed.can_transition_to(StepStatus::Completed));
        assert!(StepStatus::Pending.can_transition_to(StepStatus::Pending));

        // Forward progress
        assert!(StepStatus::Pending.can_transition_to(StepStatus::InProgress));
        assert!(StepStatus::InProgress.can_transition_to(StepStatus::Completed));
        assert!(StepStatus::Pending.can_transition_to(StepStatus::Skipped));
        assert!(StepStatus::InProgress.can_transition_to(StepStatus::Skipped));

        // Plan sync may mark a never-started step completed directly
        assert!(StepStatus::Pending.can_transition_to(StepStatus::Completed));

        // A skipped step may be re-adopted by a later plan
        assert!(StepStatus::Skipped.can_transition_to(StepStatus::Pending));
        assert!(StepStatus::Skipped.can_transition_to(StepStatus::InProgress));

        // Completed work is never demoted to pending
        assert!(!StepStatus::Completed.can_transition_to(StepStatus::Pending));
    }

    #[test]
    fn test_feature_status_transitions() {
        assert!(FeatureStatus::Pending.can_transition_to(FeatureStatus::InProgress));
        assert!(FeatureStatus::InProgress.can_transition_to(FeatureStatus::Pending));
        assert!(FeatureStatus::InProgress.can_transition_to(FeatureStatus::Complete));
        assert!(FeatureStatus::Complete.can_transition_to(FeatureStatus::InProgress));
        assert!(!FeatureStatus::Complete.can_transition_to(FeatureStatus::Pending));
        assert!(!FeatureStatus::Blocked.can_transition_to(FeatureStatus::Complete));
    }

    #[test]
    fn test_feature_status_round_trip() {
        for status in [
            FeatureStatus::Pending,
            FeatureStatus::InProgress,
            FeatureStatus::Blocked,
            FeatureStatus::Complete,
        ] {
            assert_eq!(status.as_str().parse::<FeatureStatus>().unwrap(), status);
        }
        // Alternate spellings accepted on parse
        assert_eq!(
            "inprogress".parse::<FeatureStatus>().unwrap(),
            FeatureStatus::InProgress
        );
        assert_eq!(
            "completed".parse::<FeatureStatus>().unwrap(),
            FeatureStatus::Complete
        );
    }

    #[test]
    fn test_event_type_round_trip() {
        for event_type in [
            EventType::ToolCall,
            EventType::PlanUpdate,
            EventType::UserQuery,
            EventType::AgentStop,
            EventType::SubagentStop,
        ] {
            assert_eq!(
                event_type.as_str().parse::<EventType>().unwrap(),
                event_type
            );
        }
    }

    #[test]
    fn test_event_type_terminal() {
        assert!(EventType::AgentStop.is_terminal());
        assert!(!EventType::SubagentStop.is_terminal());
        assert!(!EventType::ToolCall.is_terminal());
    }

    #[test]
    fn test_session_status_round_trip() {
        assert_eq!(
            "active".parse::<SessionStatus>().unwrap(),
            SessionStatus::Active
        );
        assert_eq!(
            "ended".parse::<SessionStatus>().unwrap(),
            SessionStatus::Ended
        );
        assert!("stale".parse::<SessionStatus>().is_err());
    }

    #[test]
    fn test_feature_stats_percentage() {
        let stats = FeatureStats {
            total: 4,
            completed: 3,
            in_progress: 1,
        };
        assert_eq!(stats.percentage(), 75);

        let empty = FeatureStats::default();
        assert_eq!(empty.percentage(), 0);
    }

    #[test]
    fn test_feature_serialization_uses_lowercase_status() {
        let feature = create_test_feature(FeatureStatus::InProgress);
        let json = serde_json::to_value(&feature).unwrap();
        assert_eq!(json["status"], "in_progress");
        assert_eq!(json["category"], "functional");
    }

    #[test]
    fn test_event_activity_text_collects_known_fields() {
        let event = Event {
            id: "evt-1".to_string(),
            event_type: EventType::ToolCall,
            tool_name: Some("Edit".to_string()),
            payload: json!({
                "file_path": "src/lib.rs",
                "command": "cargo fmt",
                "unrelated": {"nested": true}
            }),
            timestamp: Timestamp::from_second(1640995200).unwrap(),
            session_id: "sess-1".to_string(),
            source_agent: "claude".to_string(),
            project: "/test/project".to_string(),
            feature_id: 42,
            step_id: None,
            success: true,
            drift_flagged: false,
            summary: None,
        };

        let text = event.activity_text();
        assert!(text.contains("src/lib.rs"));
        assert!(text.contains("cargo fmt"));
        assert!(!text.contains("nested"));
    }

    #[test]
    fn test_event_activity_text_empty_payload() {
        let event = Event {
            id: "evt-2".to_string(),
            event_type: EventType::AgentStop,
            tool_name: None,
            payload: serde_json::Value::Null,
            timestamp: Timestamp::from_second(1640995200).unwrap(),
            session_id: "sess-1".to_string(),
            source_agent: "claude".to_string(),
            project: "/test/project".to_string(),
            feature_id: 42,
            step_id: None,
            success: true,
            drift_flagged: false,
            summary: None,
        };

        assert!(event.activity_text().is_empty());
    }
}
