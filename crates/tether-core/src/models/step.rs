//! Step model definition and related functionality.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use super::StepStatus;

/// Represents an ordered plan entry within a feature.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Step {
    /// Unique identifier for the step
    pub id: u64,

    /// ID of the parent feature
    pub feature_id: u64,

    /// Description of the step, matched exactly during plan sync
    pub description: String,

    /// Current status of the step
    pub status: StepStatus,

    /// Order of the step within the feature plan (0-indexed); skipped steps
    /// sort after all declared steps
    pub order: u32,

    /// Tool names expected while this step is active, used by drift scoring
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expected_tools: Vec<String>,

    /// Timestamp when the step entered in-progress (UTC)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<Timestamp>,

    /// Timestamp when the step was completed (UTC)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,

    /// Timestamp when the step was created (UTC)
    pub created_at: Timestamp,

    /// Timestamp when the step was last updated (UTC)
    pub updated_at: Timestamp,
}
