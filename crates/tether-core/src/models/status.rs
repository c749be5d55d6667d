//! Status and category enumerations for features, steps, sessions, and
//! events.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Type-safe enumeration of feature statuses.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FeatureStatus {
    /// Feature is declared but work has not started
    #[default]
    Pending,

    /// Feature is the current focus of work
    #[serde(rename = "in_progress")]
    InProgress,

    /// Feature is blocked on something external
    Blocked,

    /// Feature has been finished
    Complete,
}

impl FromStr for FeatureStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(FeatureStatus::Pending),
            "inprogress" | "in_progress" => Ok(FeatureStatus::InProgress),
            "blocked" => Ok(FeatureStatus::Blocked),
            "complete" | "completed" => Ok(FeatureStatus::Complete),
            _ => Err(format!("Invalid feature status: {s}")),
        }
    }
}

impl FeatureStatus {
    /// Convert to database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureStatus::Pending => "pending",
            FeatureStatus::InProgress => "in_progress",
            FeatureStatus::Blocked => "blocked",
            FeatureStatus::Complete => "complete",
        }
    }

    /// Whether a transition from `self` to `next` is allowed.
    ///
    /// Identity transitions are always allowed so callers can treat a no-op
    /// update as idempotent. A completed feature can only be reopened to
    /// `InProgress`.
    pub fn can_transition_to(&self, next: FeatureStatus) -> bool {
        if *self == next {
            return true;
        }
        match (self, next) {
            (FeatureStatus::Complete, FeatureStatus::InProgress) => true,
            (FeatureStatus::Complete, _) => false,
            (FeatureStatus::Blocked, FeatureStatus::Complete) => false,
            _ => true,
        }
    }
}

/// Type-safe enumeration of step statuses.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    /// Step is waiting to be worked on
    #[default]
    Pending,

    /// Step is being worked on
    #[serde(rename = "in_progress")]
    InProgress,

    /// Step has been completed
    Completed,

    /// Step was removed from the declared plan before completion
    Skipped,
}

impl FromStr for StepStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(StepStatus::Pending),
            "inprogress" | "in_progress" => Ok(StepStatus::InProgress),
            "completed" | "complete" => Ok(StepStatus::Completed),
            "skipped" => Ok(StepStatus::Skipped),
            _ => Err(format!("Invalid step status: {s}")),
        }
    }
}

impl StepStatus {
    /// Convert to database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::InProgress => "in_progress",
            StepStatus::Completed => "completed",
            StepStatus::Skipped => "skipped",
        }
    }

    /// Whether a transition from `self` to `next` is allowed.
    ///
    /// Identity transitions are always allowed. A completed step may be
    /// skipped when a plan drops it, or reopened to `InProgress`, but never
    /// demoted back to `Pending`.
    pub fn can_transition_to(&self, next: StepStatus) -> bool {
        if *self == next {
            return true;
        }
        !matches!((self, next), (StepStatus::Completed, StepStatus::Pending))
    }

    /// Whether this status is terminal for plan-progress purposes.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StepStatus::Completed | StepStatus::Skipped)
    }

    /// Get status with consistent icon formatting for display.
    ///
    /// Returns a formatted string that includes both an icon and the status
    /// name, used wherever steps are listed.
    ///
    /// # Icons Used
    /// - `✓ Completed` - Checkmark for completed steps
    /// - `➤ In Progress` - Arrow for the active step
    /// - `○ Pending` - Circle for pending steps
    /// - `⊘ Skipped` - Slash for steps dropped from the plan
    pub fn with_icon(&self) -> &'static str {
        match self {
            StepStatus::Completed => "✓ Completed",
            StepStatus::InProgress => "➤ In Progress",
            StepStatus::Pending => "○ Pending",
            StepStatus::Skipped => "⊘ Skipped",
        }
    }
}

/// Category of a declared feature.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FeatureCategory {
    /// User-visible functionality
    #[default]
    Functional,

    /// Build, tooling, or housekeeping work
    Infrastructure,

    /// Defect fixes
    Bugfix,

    /// Internal restructuring without behavior change
    Refactor,

    /// Documentation work
    Documentation,

    /// Test-only work
    Testing,
}

impl FromStr for FeatureCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "functional" => Ok(FeatureCategory::Functional),
            "infrastructure" => Ok(FeatureCategory::Infrastructure),
            "bugfix" => Ok(FeatureCategory::Bugfix),
            "refactor" => Ok(FeatureCategory::Refactor),
            "documentation" => Ok(FeatureCategory::Documentation),
            "testing" => Ok(FeatureCategory::Testing),
            _ => Err(format!("Invalid feature category: {s}")),
        }
    }
}

impl FeatureCategory {
    /// Convert to database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureCategory::Functional => "functional",
            FeatureCategory::Infrastructure => "infrastructure",
            FeatureCategory::Bugfix => "bugfix",
            FeatureCategory::Refactor => "refactor",
            FeatureCategory::Documentation => "documentation",
            FeatureCategory::Testing => "testing",
        }
    }
}

/// Persisted status of an agent session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Session is accepting events
    #[default]
    Active,

    /// A terminal event was observed for this session
    Ended,
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(SessionStatus::Active),
            "ended" => Ok(SessionStatus::Ended),
            _ => Err(format!("Invalid session status: {s}")),
        }
    }
}

impl SessionStatus {
    /// Convert to database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Ended => "ended",
        }
    }
}

/// Kinds of events observed from the agent stream.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A tool invocation reported by the agent
    ToolCall,

    /// A plan (todo list) declaration or revision
    PlanUpdate,

    /// A user prompt submitted to the agent
    UserQuery,

    /// The agent session ended
    AgentStop,

    /// A delegated subagent finished
    SubagentStop,
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tool_call" => Ok(EventType::ToolCall),
            "plan_update" => Ok(EventType::PlanUpdate),
            "user_query" => Ok(EventType::UserQuery),
            "agent_stop" => Ok(EventType::AgentStop),
            "subagent_stop" => Ok(EventType::SubagentStop),
            _ => Err(format!("Invalid event type: {s}")),
        }
    }
}

impl EventType {
    /// Convert to database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::ToolCall => "tool_call",
            EventType::PlanUpdate => "plan_update",
            EventType::UserQuery => "user_query",
            EventType::AgentStop => "agent_stop",
            EventType::SubagentStop => "subagent_stop",
        }
    }

    /// Whether observing this event ends its session.
    pub fn is_terminal(&self) -> bool {
        matches!(self, EventType::AgentStop)
    }
}
