//! Parameter structures for Tether operations
//!
//! This module contains shared parameter structures that can be used across
//! different interfaces (CLI, hooks) without framework-specific derives or
//! dependencies. The CLI layer defines clap wrappers that convert into these
//! via `From` impls; the hook path deserializes [`HookInput`] straight from
//! stdin.

use serde::{Deserialize, Serialize};

use crate::models::StepStatus;

/// Generic parameters for operations requiring just an ID.
///
/// Used for operations like activate_feature and complete_feature.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Id {
    /// The ID of the resource to operate on
    pub id: u64,
}

/// One observed hook payload from an agent.
///
/// Every field is optional and unknown fields are ignored: hook payloads
/// vary between agents and versions, and observation must degrade
/// gracefully rather than reject input. Missing pieces lower attribution
/// quality; they never fail the call.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HookInput {
    /// Agent session identifier
    pub session_id: Option<String>,
    /// Which hook produced the payload (PostToolUse, UserPromptSubmit,
    /// Stop, SubagentStop)
    pub hook_event_name: Option<String>,
    /// Name of the invoked tool
    pub tool_name: Option<String>,
    /// Structured tool input as reported by the agent
    pub tool_input: serde_json::Value,
    /// Structured tool response, consulted for the error flag
    #[serde(alias = "tool_result")]
    pub tool_response: serde_json::Value,
    /// Stable identifier of the tool invocation, reused as the event ID
    pub tool_use_id: Option<String>,
    /// Working directory of the agent, normalized into the project path
    pub cwd: Option<String>,
    /// Agent name; defaults to "claude-code" when absent
    pub source_agent: Option<String>,
    /// Prompt text, present on UserPromptSubmit payloads
    pub prompt: Option<String>,
}

impl HookInput {
    /// Whether the tool response reports a failure.
    pub fn tool_succeeded(&self) -> bool {
        !self
            .tool_response
            .get("is_error")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// Best-effort text describing what the tool touched.
    pub fn activity_text(&self) -> String {
        let mut parts = Vec::new();
        if let Some(obj) = self.tool_input.as_object() {
            for key in ["file_path", "command", "pattern", "description"] {
                if let Some(value) = obj.get(key).and_then(|v| v.as_str()) {
                    parts.push(value);
                }
            }
        }
        parts.join(" ")
    }
}

/// Parameters for declaring a new feature.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateFeature {
    /// Short description of the feature (required)
    pub description: String,
    /// Project path; defaults to the current working directory
    pub project: Option<String>,
    /// Category name; defaults to 'functional'
    pub category: Option<String>,
    /// Priority used for ordering
    #[serde(default)]
    pub priority: i64,
    /// Whether to make this the active feature immediately
    #[serde(default)]
    pub activate: bool,
    /// Initial plan steps, in order
    #[serde(default)]
    pub steps: Vec<String>,
}

/// Parameters for listing features.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListFeatures {
    /// Project path; defaults to the current working directory
    pub project: Option<String>,
}

/// One step of a declared plan, as fed to plan synchronization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeclaredStep {
    /// Step description; sync matches existing steps by this exactly
    pub description: String,
    /// Declared status; when absent a matched step keeps its current
    /// status and a new step starts pending
    #[serde(default)]
    pub status: Option<StepStatus>,
    /// Tool names expected while the step is active
    #[serde(default)]
    pub expected_tools: Vec<String>,
}

impl From<String> for DeclaredStep {
    fn from(description: String) -> Self {
        Self {
            description,
            ..Self::default()
        }
    }
}

/// Parameters for synchronizing a feature's plan with a declared step
/// list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncPlan {
    /// Feature to sync; defaults to the project's active feature
    pub feature_id: Option<u64>,
    /// Project path; defaults to the current working directory
    pub project: Option<String>,
    /// The declared plan, in order
    pub steps: Vec<DeclaredStep>,
}

/// Parameters for a checkpoint report from the agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Project path; defaults to the current working directory
    pub project: Option<String>,
    /// Description of a step the agent believes it completed
    pub step_completed: Option<String>,
    /// What the agent says it is doing right now
    pub current_activity: Option<String>,
}

/// Parameters for the status and plan views.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusQuery {
    /// Project path; defaults to the current working directory
    pub project: Option<String>,
}

/// Parameters for the sessions view.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionsQuery {
    /// Restrict to one project; all projects when absent
    pub project: Option<String>,
    /// How many recent events to fold into groups
    #[serde(default = "default_sessions_limit")]
    pub limit: usize,
}

fn default_sessions_limit() -> usize {
    500
}
