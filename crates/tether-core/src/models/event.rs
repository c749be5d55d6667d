//! Event model definition.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use super::EventType;

/// One observed occurrence in an agent session.
///
/// Event IDs are caller-supplied strings (hook tool-use IDs when available)
/// so that redelivered hook payloads deduplicate on insert.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    /// Unique identifier, stable across hook redeliveries
    pub id: String,

    /// Kind of event observed
    pub event_type: EventType,

    /// Name of the invoked tool, when the event is a tool call
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,

    /// Structured payload captured from the hook input
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub payload: serde_json::Value,

    /// Timestamp when the event was observed (UTC)
    pub timestamp: Timestamp,

    /// Session the event belongs to
    pub session_id: String,

    /// Agent that produced the event
    pub source_agent: String,

    /// Absolute project path the event was observed in
    pub project: String,

    /// Feature the event is attributed to; the sentinel when unattributed
    pub feature_id: u64,

    /// Active step at observation time, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_id: Option<u64>,

    /// Whether the underlying tool call succeeded
    pub success: bool,

    /// Whether drift scoring flagged this event's content as mismatched
    pub drift_flagged: bool,

    /// Short human-readable summary of the activity
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl Event {
    /// Best-effort text describing what the event touched, used for keyword
    /// matching and pattern digests.
    pub fn activity_text(&self) -> String {
        let mut parts = Vec::new();
        if let Some(obj) = self.payload.as_object() {
            for key in ["file_path", "command", "pattern", "description"] {
                if let Some(value) = obj.get(key).and_then(|v| v.as_str()) {
                    parts.push(value);
                }
            }
        }
        parts.join(" ")
    }
}
