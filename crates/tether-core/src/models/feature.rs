//! Feature model definition and related functionality.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use super::{FeatureCategory, FeatureStatus};

/// Description used for the per-project session-work sentinel feature.
pub const SESSION_WORK_DESCRIPTION: &str = "Session Work";

/// Represents a declared unit of work within a project.
///
/// Every observed event is attributed to exactly one feature. Work that
/// cannot be attributed to a real feature lands on the project's sentinel
/// feature (`is_session_work == true`), which is created lazily, never
/// completes, and never participates in activation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Feature {
    /// Unique identifier for the feature
    pub id: u64,

    /// Absolute path of the project this feature belongs to
    pub project: String,

    /// Short description of the feature
    pub description: String,

    /// Category of the work
    pub category: FeatureCategory,

    /// Current status of the feature
    pub status: FeatureStatus,

    /// Priority used for ordering; the sentinel always sorts last
    pub priority: i64,

    /// Whether this is the project's session-work sentinel
    pub is_session_work: bool,

    /// Number of successful work tool calls attributed to this feature
    pub work_count: i64,

    /// Timestamp when the feature was created (UTC)
    pub created_at: Timestamp,

    /// Timestamp when the feature was last updated (UTC)
    pub updated_at: Timestamp,

    /// Timestamp when the feature was completed, if it has been
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
}

/// Aggregate feature counts for a project.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct FeatureStats {
    /// Total number of non-sentinel features
    pub total: i64,

    /// Number of completed features
    pub completed: i64,

    /// Number of in-progress features
    pub in_progress: i64,
}

impl FeatureStats {
    /// Completion percentage, rounded down. Zero when no features exist.
    pub fn percentage(&self) -> i64 {
        if self.total == 0 {
            0
        } else {
            self.completed * 100 / self.total
        }
    }
}
