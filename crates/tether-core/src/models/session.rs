//! Session model definition.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use super::SessionStatus;

/// A persisted agent session.
///
/// Only `active` and `ended` are stored; staleness is derived from
/// `last_activity` at read time by the session grouper.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    /// Session identifier supplied by the agent
    pub id: String,

    /// Agent that owns the session
    pub source_agent: String,

    /// Absolute project path the session ran in
    pub project: String,

    /// Persisted status
    pub status: SessionStatus,

    /// Timestamp of the first observed event (UTC)
    pub started_at: Timestamp,

    /// Timestamp of the most recent observed event (UTC)
    pub last_activity: Timestamp,

    /// Timestamp when a terminal event was observed, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<Timestamp>,
}
