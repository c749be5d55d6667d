//! Advisory nudge generation and once-per-session delivery.
//!
//! Nudges are short advisory strings surfaced back to the agent. Each nudge
//! kind carries a key; a key fires at most once per session, enforced at
//! the store so concurrent observers cannot double-deliver. Generation
//! checks conditions in a fixed priority order and appends every nudge
//! whose condition holds and whose key is unclaimed.

use crate::{
    error::Result,
    models::{Feature, Step},
    scoring::DriftAssessment,
};

/// Key for the commit-frequency reminder.
pub const NUDGE_COMMIT_REMINDER: &str = "commit_reminder";

/// Key for the stuckness warning.
pub const NUDGE_STUCKNESS: &str = "stuckness";

/// Key for the unattributed-work accumulator alert.
pub const NUDGE_SESSION_WORK: &str = "session_work_accumulator";

/// Key for the feature-completion suggestion.
pub const NUDGE_FEATURE_COMPLETION: &str = "feature_completion";

/// Key for a drift warning scoped to one step.
pub fn drift_step_key(step_id: u64) -> String {
    format!("drift:{step_id}")
}

/// Key for a drift warning scoped to a feature with no active step.
pub fn drift_feature_key(feature_id: u64) -> String {
    format!("drift:feature:{feature_id}")
}

/// Keyed once-per-session nudge bookkeeping.
///
/// `record_nudge` must be idempotent so that claiming an already-claimed
/// key is harmless.
pub trait NudgeStore {
    /// Whether the key has already fired for the session.
    fn has_been_nudged(&mut self, session_id: &str, key: &str) -> Result<bool>;

    /// Marks the key as fired for the session.
    fn record_nudge(&mut self, session_id: &str, key: &str) -> Result<()>;
}

/// Everything the coordinator needs to decide which nudges apply to the
/// event just observed.
#[derive(Debug, Default)]
pub struct NudgeContext<'a> {
    /// Session the event belongs to
    pub session_id: &'a str,
    /// Tool invoked by the event, if any
    pub tool_name: Option<&'a str>,
    /// Whether the tool call succeeded
    pub success: bool,
    /// Bash command text, when the tool was Bash
    pub command: Option<&'a str>,
    /// Whether the event was a meta or diagnostic call
    pub is_meta: bool,
    /// Successful file changes since the last git commit in the session
    pub changes_since_commit: i64,
    /// Drift assessment of the event, with the step it was scored against
    pub drift: Option<(&'a DriftAssessment, DriftTarget<'a>)>,
    /// Stuckness reason, when the session was judged stuck
    pub stuckness: Option<&'a str>,
    /// Events attributed to session work so far in this session
    pub session_work_count: i64,
    /// Feature the event was attributed to
    pub feature: Option<&'a Feature>,
}

/// What a drift assessment was scored against.
#[derive(Debug, Clone, Copy)]
pub enum DriftTarget<'a> {
    Step(&'a Step),
    Feature(&'a Feature),
}

/// Thresholds for nudge generation.
#[derive(Debug, Clone)]
pub struct NudgeConfig {
    /// File changes since the last commit before reminding
    pub commit_reminder_threshold: i64,
    /// Session-work events that must accumulate before alerting
    pub session_work_threshold: i64,
}

impl Default for NudgeConfig {
    fn default() -> Self {
        Self {
            commit_reminder_threshold: 5,
            session_work_threshold: 20,
        }
    }
}

/// Commands that suggest a verification pass just succeeded.
const COMPLETION_COMMAND_HINTS: &[&str] = &["test", "build", "check", "clippy"];

/// Generates the nudges applicable to one observed event.
///
/// Meta and diagnostic events never nudge. Order is fixed: commit
/// reminder, drift warning, stuckness, session-work accumulator, feature
/// completion.
pub fn generate_nudges<S: NudgeStore>(
    store: &mut S,
    config: &NudgeConfig,
    context: &NudgeContext,
) -> Result<Vec<String>> {
    let mut nudges = Vec::new();
    if context.is_meta {
        return Ok(nudges);
    }

    if is_file_modifying(context.tool_name)
        && context.success
        && context.changes_since_commit >= config.commit_reminder_threshold
    {
        fire(
            store,
            context.session_id,
            NUDGE_COMMIT_REMINDER,
            format!(
                "You've made {} file changes since the last commit. Consider committing \
                 your progress.",
                context.changes_since_commit
            ),
            &mut nudges,
        )?;
    }

    if let Some((assessment, target)) = &context.drift {
        if assessment.warrants_warning() {
            let (key, subject) = match target {
                DriftTarget::Step(step) => (drift_step_key(step.id), step.description.as_str()),
                DriftTarget::Feature(feature) => {
                    (drift_feature_key(feature.id), feature.description.as_str())
                }
            };
            fire(
                store,
                context.session_id,
                &key,
                format!(
                    "Possible drift from '{}': {}. Refocus, or update the plan if \
                     priorities changed.",
                    subject, assessment.reason
                ),
                &mut nudges,
            )?;
        }
    }

    if let Some(reason) = context.stuckness {
        fire(
            store,
            context.session_id,
            NUDGE_STUCKNESS,
            format!("You may be stuck: {reason}. What is the next concrete step?"),
            &mut nudges,
        )?;
    }

    if context.session_work_count > config.session_work_threshold {
        fire(
            store,
            context.session_id,
            NUDGE_SESSION_WORK,
            format!(
                "{} tool calls this session are unattributed session work. Consider \
                 declaring a feature for what you're building.",
                context.session_work_count
            ),
            &mut nudges,
        )?;
    }

    if looks_like_passing_verification(context) {
        if let Some(feature) = context.feature.filter(|f| !f.is_session_work) {
            fire(
                store,
                context.session_id,
                NUDGE_FEATURE_COMPLETION,
                format!(
                    "Tests or build passed. If '{}' is done, mark the feature complete.",
                    feature.description
                ),
                &mut nudges,
            )?;
        }
    }

    Ok(nudges)
}

/// Whether the tool writes files, for progress and commit tracking.
pub fn is_file_modifying(tool_name: Option<&str>) -> bool {
    tool_name.is_some_and(|name| crate::stuckness::FILE_MODIFYING_TOOLS.contains(&name))
}

fn looks_like_passing_verification(context: &NudgeContext) -> bool {
    if context.tool_name != Some("Bash") || !context.success {
        return false;
    }
    context.command.is_some_and(|command| {
        let command = command.to_lowercase();
        COMPLETION_COMMAND_HINTS
            .iter()
            .any(|hint| command.contains(hint))
    })
}

fn fire<S: NudgeStore>(
    store: &mut S,
    session_id: &str,
    key: &str,
    message: String,
    nudges: &mut Vec<String>,
) -> Result<()> {
    if !store.has_been_nudged(session_id, key)? {
        store.record_nudge(session_id, key)?;
        nudges.push(message);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[derive(Default)]
    struct MemoryStore {
        fired: HashSet<(String, String)>,
    }

    impl NudgeStore for MemoryStore {
        fn has_been_nudged(&mut self, session_id: &str, key: &str) -> Result<bool> {
            Ok(self
                .fired
                .contains(&(session_id.to_string(), key.to_string())))
        }

        fn record_nudge(&mut self, session_id: &str, key: &str) -> Result<()> {
            self.fired
                .insert((session_id.to_string(), key.to_string()));
            Ok(())
        }
    }

    fn base_context(session_id: &str) -> NudgeContext<'_> {
        NudgeContext {
            session_id,
            success: true,
            ..NudgeContext::default()
        }
    }

    #[test]
    fn test_commit_reminder_fires_once_per_session() {
        let mut store = MemoryStore::default();
        let config = NudgeConfig::default();
        let context = NudgeContext {
            tool_name: Some("Edit"),
            changes_since_commit: 6,
            ..base_context("s1")
        };

        let first = generate_nudges(&mut store, &config, &context).unwrap();
        assert_eq!(first.len(), 1);
        assert!(first[0].contains("6 file changes"));

        let second = generate_nudges(&mut store, &config, &context).unwrap();
        assert!(second.is_empty());
    }

    #[test]
    fn test_same_key_is_independent_across_sessions() {
        let mut store = MemoryStore::default();
        let config = NudgeConfig::default();
        let context_a = NudgeContext {
            tool_name: Some("Edit"),
            changes_since_commit: 6,
            ..base_context("s1")
        };
        let context_b = NudgeContext {
            tool_name: Some("Edit"),
            changes_since_commit: 6,
            ..base_context("s2")
        };

        assert_eq!(
            generate_nudges(&mut store, &config, &context_a).unwrap().len(),
            1
        );
        assert_eq!(
            generate_nudges(&mut store, &config, &context_b).unwrap().len(),
            1
        );
    }

    #[test]
    fn test_below_commit_threshold_is_silent() {
        let mut store = MemoryStore::default();
        let config = NudgeConfig::default();
        let context = NudgeContext {
            tool_name: Some("Edit"),
            changes_since_commit: 4,
            ..base_context("s1")
        };

        assert!(generate_nudges(&mut store, &config, &context)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_meta_events_never_nudge() {
        let mut store = MemoryStore::default();
        let config = NudgeConfig::default();
        let context = NudgeContext {
            tool_name: Some("Edit"),
            changes_since_commit: 10,
            session_work_count: 100,
            stuckness: Some("no file changes for 30 minutes"),
            is_meta: true,
            ..base_context("s1")
        };

        assert!(generate_nudges(&mut store, &config, &context)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_session_work_accumulator_fires_above_threshold_once() {
        let mut store = MemoryStore::default();
        let config = NudgeConfig::default();

        // 20 is not above the threshold
        let at_threshold = NudgeContext {
            session_work_count: 20,
            ..base_context("s1")
        };
        assert!(generate_nudges(&mut store, &config, &at_threshold)
            .unwrap()
            .is_empty());

        let above = NudgeContext {
            session_work_count: 25,
            ..base_context("s1")
        };
        let fired = generate_nudges(&mut store, &config, &above).unwrap();
        assert_eq!(fired.len(), 1);
        assert!(fired[0].contains("25 tool calls"));

        // 26th occurrence stays silent
        let again = NudgeContext {
            session_work_count: 26,
            ..base_context("s1")
        };
        assert!(generate_nudges(&mut store, &config, &again)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_stuckness_nudge_uses_reason() {
        let mut store = MemoryStore::default();
        let config = NudgeConfig::default();
        let context = NudgeContext {
            stuckness: Some("Bash called 4x with similar arguments"),
            ..base_context("s1")
        };

        let fired = generate_nudges(&mut store, &config, &context).unwrap();
        assert_eq!(fired.len(), 1);
        assert!(fired[0].contains("Bash called 4x"));
    }

    #[test]
    fn test_drift_keys_are_scoped_per_step() {
        use jiff::Timestamp;

        use crate::models::{StepStatus, Step};

        let step_a = Step {
            id: 7,
            feature_id: 1,
            description: "Write CSV writer module".to_string(),
            status: StepStatus::InProgress,
            order: 0,
            expected_tools: vec![],
            started_at: None,
            completed_at: None,
            created_at: Timestamp::from_second(1700000000).unwrap(),
            updated_at: Timestamp::from_second(1700000000).unwrap(),
        };
        let mut step_b = step_a.clone();
        step_b.id = 8;
        step_b.description = "Add CLI flag".to_string();

        let assessment = DriftAssessment {
            score: 0.7,
            reason: "unexpected tool: Bash; content unrelated to step".to_string(),
            content_mismatch: true,
        };

        let mut store = MemoryStore::default();
        let config = NudgeConfig::default();

        let context_a = NudgeContext {
            drift: Some((&assessment, DriftTarget::Step(&step_a))),
            ..base_context("s1")
        };
        let context_b = NudgeContext {
            drift: Some((&assessment, DriftTarget::Step(&step_b))),
            ..base_context("s1")
        };

        // Different steps fire independently within the same session
        assert_eq!(
            generate_nudges(&mut store, &config, &context_a).unwrap().len(),
            1
        );
        assert_eq!(
            generate_nudges(&mut store, &config, &context_b).unwrap().len(),
            1
        );
        assert!(generate_nudges(&mut store, &config, &context_a)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_drift_below_threshold_is_silent() {
        let assessment = DriftAssessment {
            score: 0.4,
            reason: "content unrelated to step".to_string(),
            content_mismatch: true,
        };
        let feature = crate::models::Feature {
            id: 3,
            project: "/p".to_string(),
            description: "Add CSV export".to_string(),
            category: crate::models::FeatureCategory::Functional,
            status: crate::models::FeatureStatus::InProgress,
            priority: 0,
            is_session_work: false,
            work_count: 0,
            created_at: jiff::Timestamp::from_second(1700000000).unwrap(),
            updated_at: jiff::Timestamp::from_second(1700000000).unwrap(),
            completed_at: None,
        };

        let mut store = MemoryStore::default();
        let config = NudgeConfig::default();
        let context = NudgeContext {
            drift: Some((&assessment, DriftTarget::Feature(&feature))),
            ..base_context("s1")
        };

        assert!(generate_nudges(&mut store, &config, &context)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_feature_completion_after_passing_tests() {
        let feature = crate::models::Feature {
            id: 3,
            project: "/p".to_string(),
            description: "Add CSV export".to_string(),
            category: crate::models::FeatureCategory::Functional,
            status: crate::models::FeatureStatus::InProgress,
            priority: 0,
            is_session_work: false,
            work_count: 9,
            created_at: jiff::Timestamp::from_second(1700000000).unwrap(),
            updated_at: jiff::Timestamp::from_second(1700000000).unwrap(),
            completed_at: None,
        };

        let mut store = MemoryStore::default();
        let config = NudgeConfig::default();
        let context = NudgeContext {
            tool_name: Some("Bash"),
            command: Some("cargo test --workspace"),
            feature: Some(&feature),
            ..base_context("s1")
        };

        let fired = generate_nudges(&mut store, &config, &context).unwrap();
        assert_eq!(fired.len(), 1);
        assert!(fired[0].contains("Add CSV export"));

        // A failing run never suggests completion
        let mut store = MemoryStore::default();
        let failing = NudgeContext {
            tool_name: Some("Bash"),
            command: Some("cargo test --workspace"),
            feature: Some(&feature),
            success: false,
            ..NudgeContext::default()
        };
        let failing = NudgeContext {
            session_id: "s2",
            ..failing
        };
        assert!(generate_nudges(&mut store, &config, &failing)
            .unwrap()
            .is_empty());
    }
}
