//! The per-event observation pipeline.
//!
//! One intercepted tool call comes in, one [`Observation`] goes out.
//! The pipeline resolves the event's feature and step, scores drift,
//! checks stuckness, persists the event, and asks the nudge coordinator
//! which advisories may fire. Every failure along the way degrades to a
//! neutral observation so the agent's tool call is never blocked.

use jiff::Timestamp;
use serde::Serialize;
use tokio::task;

use super::Engine;
use crate::{
    db::{Database, NewEvent},
    error::Result,
    models::{EventType, Feature, FeatureStatus, Step, StepStatus},
    nudges::{self, DriftTarget, NudgeContext},
    params::{DeclaredStep, HookInput},
    scoring::{self, DriftAssessment, PromptCandidate},
    stuckness::{self, ActiveStepActivity, RecentActivity},
};

/// How many prior step events feed the sustained-drift window.
const SUSTAINED_DRIFT_LOOKBACK: usize = 5;

/// Result of observing one intercepted tool call.
#[derive(Debug, Clone, Serialize)]
pub struct Observation {
    /// Advisory messages to surface, in priority order
    pub advisories: Vec<String>,
    /// Drift score for this event in `[0.0, 1.0]`, 0.0 when aligned
    pub drift_score: f64,
    /// Human-readable reason behind the score
    pub drift_reason: String,
    /// Feature the event was attributed to
    pub feature_id: Option<u64>,
    /// Step the event was linked to, if one was active
    pub step_id: Option<u64>,
    /// Whether the event was newly persisted (false on redelivery)
    pub event_recorded: bool,
}

impl Observation {
    /// A no-signal observation, used for malformed input and store
    /// failures.
    pub fn neutral(reason: &str) -> Self {
        Self {
            advisories: Vec::new(),
            drift_score: 0.0,
            drift_reason: reason.to_string(),
            feature_id: None,
            step_id: None,
            event_recorded: false,
        }
    }
}

impl Engine {
    /// Observes one intercepted tool call and returns advisory output.
    ///
    /// This is the fail-open entry point: any store or input failure
    /// is logged and collapses to [`Observation::neutral`], never an
    /// error. The agent's tool call must not be blocked by observation
    /// problems.
    pub async fn observe(&self, input: HookInput) -> Observation {
        let db_path = self.db_path.clone();
        let config = self.config.clone();

        let outcome = task::spawn_blocking(move || {
            let mut db = Database::new(&db_path)?;
            observe_event(&mut db, &config, &input)
        })
        .await;

        match outcome {
            Ok(Ok(observation)) => observation,
            Ok(Err(e)) => {
                log::warn!("observation failed, returning neutral result: {e}");
                Observation::neutral("store_unavailable")
            }
            Err(e) => {
                log::warn!("observation task failed, returning neutral result: {e}");
                Observation::neutral("store_unavailable")
            }
        }
    }
}

/// Runs the full pipeline for one event against an open database.
fn observe_event(
    db: &mut Database,
    config: &super::EngineConfig,
    input: &HookInput,
) -> Result<Observation> {
    let Some(session_id) = input.session_id.as_deref().filter(|s| !s.is_empty()) else {
        log::debug!("event without session_id, skipping");
        return Ok(Observation::neutral("no_session"));
    };

    let event_type = classify_event(input);
    let project = Database::ensure_absolute_project(input.cwd.as_deref())?;
    let activity = input.activity_text();
    let success = input.tool_succeeded();
    let is_meta = is_meta_event(input);
    let now = Timestamp::now();

    // User prompts may re-target the active feature before attribution.
    if event_type == EventType::UserQuery {
        if let Some(prompt) = input.prompt.as_deref() {
            auto_activate_from_prompt(db, &project, prompt)?;
        }
    }

    // TodoWrite carries the agent's own plan; sync it into the active
    // feature's steps instead of scoring it as ordinary activity.
    if event_type == EventType::ToolCall && input.tool_name.as_deref() == Some("TodoWrite") {
        return ingest_plan_update(db, input, session_id, &project, now);
    }

    // Attribution: the active feature, else the session-work sentinel.
    let feature = match db.get_active_feature(&project)? {
        Some(feature) if !is_meta => feature,
        _ => db.get_or_create_session_work(&project)?,
    };

    let active_step = if feature.is_session_work {
        None
    } else {
        db.get_active_step(feature.id)?
    };

    // Only tool calls carry activity worth scoring; prompts and stop
    // events would always look like content mismatches.
    let assessment = if event_type == EventType::ToolCall {
        score_event(db, &feature, active_step.as_ref(), input, &activity)?
    } else {
        DriftAssessment {
            score: 0.0,
            reason: "aligned".to_string(),
            content_mismatch: false,
        }
    };

    let stuck_reason = check_stuckness(db, config, session_id, active_step.as_ref(), now)?;

    let event = NewEvent {
        id: input
            .tool_use_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        event_type,
        tool_name: input.tool_name.clone(),
        payload: input.tool_input.clone(),
        timestamp: now,
        session_id: session_id.to_string(),
        source_agent: input
            .source_agent
            .clone()
            .unwrap_or_else(|| "claude-code".to_string()),
        project: project.clone(),
        feature_id: feature.id,
        step_id: active_step.as_ref().map(|step| step.id),
        success,
        drift_flagged: assessment.content_mismatch,
        summary: Some(assessment.reason.clone()),
    };
    let recorded = db.insert_event(&event)?;

    // Successful work on a declared feature counts toward it and pulls
    // a pending feature into progress.
    if recorded && success && !feature.is_session_work && event_type == EventType::ToolCall {
        if db.begin_feature_if_pending(feature.id)? {
            log::info!("feature {} started by its first attributed event", feature.id);
        }
        db.increment_work_count(feature.id)?;
    }

    let command = input
        .tool_input
        .get("command")
        .and_then(|v| v.as_str())
        .map(str::to_string);
    let changes_since_commit = db.count_changes_since_commit(session_id)?;
    let session_work_count = db.count_session_work_events(session_id)?;

    let target = match &active_step {
        Some(step) => DriftTarget::Step(step),
        None => DriftTarget::Feature(&feature),
    };
    let context = NudgeContext {
        session_id,
        tool_name: input.tool_name.as_deref(),
        success,
        command: command.as_deref(),
        is_meta,
        changes_since_commit,
        drift: Some((&assessment, target)),
        stuckness: stuck_reason.as_deref(),
        session_work_count,
        feature: Some(&feature),
    };
    let nudge_config = config.nudges();
    let advisories = nudges::generate_nudges(db, &nudge_config, &context)?;

    Ok(Observation {
        advisories,
        drift_score: assessment.score,
        drift_reason: assessment.reason,
        feature_id: Some(feature.id),
        step_id: active_step.map(|step| step.id),
        event_recorded: recorded,
    })
}

/// Syncs a TodoWrite payload into the active feature's steps and
/// records a plan-update event.
///
/// Todos are matched to steps by their content text; a todo's status is
/// applied to its step, so the declared plan tracks the agent's own
/// bookkeeping. Without an active declared feature the todos have no
/// home and the payload is skipped.
fn ingest_plan_update(
    db: &mut Database,
    input: &HookInput,
    session_id: &str,
    project: &str,
    now: Timestamp,
) -> Result<Observation> {
    let declared = declared_steps_from_todos(&input.tool_input);
    if declared.is_empty() {
        return Ok(Observation::neutral("no_plan"));
    }
    let Some(feature) = db.get_active_feature(project)? else {
        log::debug!("plan update without an active feature, skipping");
        return Ok(Observation::neutral("no_active_feature"));
    };

    db.sync_steps(feature.id, &declared)?;

    let completed = declared
        .iter()
        .filter(|step| step.status == Some(StepStatus::Completed))
        .count();
    let in_progress = declared
        .iter()
        .filter(|step| step.status == Some(StepStatus::InProgress))
        .count();
    let summary = format!(
        "Plan updated: {completed}/{} complete, {in_progress} in progress",
        declared.len()
    );

    let event = NewEvent {
        id: input
            .tool_use_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        event_type: EventType::PlanUpdate,
        tool_name: input.tool_name.clone(),
        payload: input.tool_input.clone(),
        timestamp: now,
        session_id: session_id.to_string(),
        source_agent: input
            .source_agent
            .clone()
            .unwrap_or_else(|| "claude-code".to_string()),
        project: project.to_string(),
        feature_id: feature.id,
        step_id: None,
        success: true,
        drift_flagged: false,
        summary: Some(summary.clone()),
    };
    let recorded = db.insert_event(&event)?;

    Ok(Observation {
        advisories: Vec::new(),
        drift_score: 0.0,
        drift_reason: summary,
        feature_id: Some(feature.id),
        step_id: None,
        event_recorded: recorded,
    })
}

/// Extracts a declared step list from a TodoWrite `todos` array.
fn declared_steps_from_todos(tool_input: &serde_json::Value) -> Vec<DeclaredStep> {
    let Some(todos) = tool_input.get("todos").and_then(|v| v.as_array()) else {
        return Vec::new();
    };
    todos
        .iter()
        .filter_map(|todo| {
            let description = todo
                .get("content")
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())?;
            let status = todo
                .get("status")
                .and_then(|v| v.as_str())
                .and_then(|s| s.parse::<StepStatus>().ok());
            Some(DeclaredStep {
                description: description.to_string(),
                status,
                expected_tools: Vec::new(),
            })
        })
        .collect()
}

/// Maps the interceptor's event name onto the stored event type.
fn classify_event(input: &HookInput) -> EventType {
    match input.hook_event_name.as_deref() {
        Some("UserPromptSubmit") => EventType::UserQuery,
        Some("Stop") => EventType::AgentStop,
        Some("SubagentStop") => EventType::SubagentStop,
        Some("PostToolUse") | None => EventType::ToolCall,
        Some(other) => {
            log::debug!("unrecognized hook event '{other}', treating as tool call");
            EventType::ToolCall
        }
    }
}

/// Whether the event is the tracker inspecting or managing itself.
///
/// Such events attribute to the sentinel and never nudge, so a status
/// query does not register as drift from the feature under work.
fn is_meta_event(input: &HookInput) -> bool {
    if let Some(tool) = input.tool_name.as_deref() {
        if tool.starts_with("mcp__tether__") {
            return true;
        }
    }
    input
        .tool_input
        .get("command")
        .and_then(|v| v.as_str())
        .is_some_and(|command| command.contains("tether.db") || command.contains("tether hook"))
}

/// Scores the event against its step, or its feature when no step is
/// active.
fn score_event(
    db: &Database,
    feature: &Feature,
    active_step: Option<&Step>,
    input: &HookInput,
    activity: &str,
) -> Result<DriftAssessment> {
    if let Some(step) = active_step {
        let recent_flags = db.get_recent_step_flags(step.id, SUSTAINED_DRIFT_LOOKBACK)?;
        return Ok(scoring::score_step_drift(
            step,
            input.tool_name.as_deref(),
            activity,
            &recent_flags,
        ));
    }

    let description = if feature.is_session_work {
        None
    } else {
        Some(feature.description.as_str())
    };
    let (alignment, reason) = scoring::score_feature_alignment(description, activity);
    Ok(DriftAssessment {
        score: scoring::feature_drift_score(alignment),
        reason,
        content_mismatch: false,
    })
}

/// Runs the stuckness detector over the session's recent history.
fn check_stuckness(
    db: &Database,
    config: &super::EngineConfig,
    session_id: &str,
    active_step: Option<&Step>,
    now: Timestamp,
) -> Result<Option<String>> {
    let last_progress = db.get_last_progress_at(session_id)?;
    let recent: Vec<RecentActivity> = db
        .get_recent_events(session_id, config.pattern_window)?
        .into_iter()
        .map(|event| RecentActivity {
            tool_name: event.tool_name.clone(),
            activity: event.activity_text(),
        })
        .collect();

    let step_activity = match active_step {
        Some(step) => Some(ActiveStepActivity {
            description: step.description.clone(),
            started_at: step.started_at,
            event_count: db.count_step_events(step.id)?,
        }),
        None => None,
    };

    let (stuck, reason) = stuckness::detect_stuckness(
        last_progress,
        &recent,
        step_activity.as_ref(),
        now,
        &config.stuckness(),
    );
    Ok(stuck.then_some(reason))
}

/// Activates the feature best matching a user prompt, if any.
///
/// Only runs when the project has no active feature; an explicit
/// activation is never overridden by prompt heuristics.
fn auto_activate_from_prompt(db: &mut Database, project: &str, prompt: &str) -> Result<()> {
    let active = db.get_active_feature(project)?;
    if active.is_some() {
        return Ok(());
    }

    let features = db.list_features(Some(project))?;
    let mut candidates = Vec::new();
    for feature in features.iter().filter(|f| !f.is_session_work) {
        let mut text = feature.description.clone();
        for step in db.get_steps(feature.id)? {
            text.push(' ');
            text.push_str(&step.description);
        }
        candidates.push(PromptCandidate {
            feature_id: feature.id,
            text,
            incomplete: feature.status != FeatureStatus::Complete,
            active: feature.status == FeatureStatus::InProgress,
        });
    }

    if let Some(matched) = scoring::match_prompt(prompt, &candidates) {
        log::info!(
            "prompt matched feature {} with confidence {:.2}, activating",
            matched.feature_id,
            matched.confidence
        );
        db.activate_feature(matched.feature_id)?;
    }
    Ok(())
}
