//! Read-time session grouping for dashboard views.
//!
//! Persisted sessions only know `active` and `ended`; everything else is
//! derived here at read time. The grouper folds events into per-session
//! accumulators, classifies each group's liveness against a staleness
//! window, and orders groups active-first. A bounded [`SeenEvents`] set
//! lets pollers feed the same event stream repeatedly without double
//! counting.

use std::collections::{HashMap, HashSet, VecDeque};

use jiff::{SignedDuration, Timestamp};
use serde::Serialize;

use crate::models::Event;

/// Opening-prompt fragments that mark a session as tool-generated rather
/// than interactive.
const AUTOMATED_PROMPT_SIGNATURES: &[&str] = &[
    "<system-reminder>",
    "<command-name>",
    "<local-command-stdout>",
    "Caveat: the messages below were generated",
];

/// Settings for read-time session classification.
#[derive(Debug, Clone)]
pub struct GrouperConfig {
    /// Minutes without activity before an unfinished session counts as stale
    pub staleness_minutes: i64,
    /// Sessions with at most this many events qualify as automated
    pub automated_max_events: usize,
}

impl Default for GrouperConfig {
    fn default() -> Self {
        Self {
            staleness_minutes: 15,
            automated_max_events: 2,
        }
    }
}

/// Derived liveness of a session group.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionLiveness {
    /// No terminal event and recent activity
    Active,
    /// A terminal event was observed
    Ended,
    /// No terminal event and no activity within the staleness window
    Stale,
    /// A short session opened by a known automated prompt
    Automated,
}

/// Per-session accumulator produced by the grouper.
#[derive(Debug, Clone, Serialize)]
pub struct SessionGroup {
    /// Session identifier
    pub session_id: String,
    /// Agent that produced the session's events
    pub source_agent: String,
    /// Project the session ran in
    pub project: String,
    /// Number of distinct events folded in
    pub event_count: usize,
    /// Timestamp of the earliest event
    pub first_seen: Timestamp,
    /// Timestamp of the latest event
    pub last_activity: Timestamp,
    /// Derived liveness classification
    pub liveness: SessionLiveness,
    /// Whether a terminal event was observed
    #[serde(skip)]
    has_terminal: bool,
    /// First user-query text seen, used for automated detection
    #[serde(skip)]
    opening_query: Option<String>,
}

impl SessionGroup {
    fn classify(&self, now: Timestamp, config: &GrouperConfig) -> SessionLiveness {
        // A terminal event settles the session before any heuristic.
        if self.has_terminal {
            return SessionLiveness::Ended;
        }
        if self.event_count <= config.automated_max_events {
            let automated = self
                .opening_query
                .as_deref()
                .is_some_and(|query| {
                    AUTOMATED_PROMPT_SIGNATURES
                        .iter()
                        .any(|signature| query.contains(signature))
                });
            if automated {
                return SessionLiveness::Automated;
            }
        }
        let staleness = SignedDuration::from_secs(config.staleness_minutes * 60);
        if now.duration_since(self.last_activity) < staleness {
            SessionLiveness::Active
        } else {
            SessionLiveness::Stale
        }
    }
}

/// Incremental session grouper.
///
/// Folding an event is O(1) amortized: each result is stored in a map
/// keyed by session ID, so repeated polls never rescan history.
#[derive(Debug, Default)]
pub struct SessionGrouper {
    groups: HashMap<String, SessionGroup>,
}

impl SessionGrouper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one event into its session's accumulator.
    pub fn fold(&mut self, event: &Event) {
        let group = self
            .groups
            .entry(event.session_id.clone())
            .or_insert_with(|| SessionGroup {
                session_id: event.session_id.clone(),
                source_agent: event.source_agent.clone(),
                project: event.project.clone(),
                event_count: 0,
                first_seen: event.timestamp,
                last_activity: event.timestamp,
                liveness: SessionLiveness::Active,
                has_terminal: false,
                opening_query: None,
            });

        group.event_count += 1;
        if event.timestamp < group.first_seen {
            group.first_seen = event.timestamp;
        }
        if event.timestamp > group.last_activity {
            group.last_activity = event.timestamp;
        }
        if event.event_type.is_terminal() {
            group.has_terminal = true;
        }
        if group.opening_query.is_none() {
            if let Some(prompt) = event.payload.get("prompt").and_then(|v| v.as_str()) {
                group.opening_query = Some(prompt.to_string());
            }
        }
    }

    /// Classifies all groups against `now` and returns them ordered
    /// active-first, then by most recent activity.
    pub fn groups(&self, now: Timestamp, config: &GrouperConfig) -> Vec<SessionGroup> {
        let mut groups: Vec<SessionGroup> = self
            .groups
            .values()
            .map(|group| {
                let mut group = group.clone();
                group.liveness = group.classify(now, config);
                group
            })
            .collect();

        groups.sort_by(|a, b| {
            let a_active = a.liveness == SessionLiveness::Active;
            let b_active = b.liveness == SessionLiveness::Active;
            b_active
                .cmp(&a_active)
                .then(b.last_activity.cmp(&a.last_activity))
                .then(a.session_id.cmp(&b.session_id))
        });
        groups
    }
}

/// Groups a batch of events in one pass.
pub fn group_sessions(
    events: &[Event],
    now: Timestamp,
    config: &GrouperConfig,
) -> Vec<SessionGroup> {
    let mut grouper = SessionGrouper::new();
    for event in events {
        grouper.fold(event);
    }
    grouper.groups(now, config)
}

/// Bounded set of already-processed event IDs.
///
/// Pollers re-read overlapping windows of the event stream; this set
/// deduplicates them while evicting the oldest entries once capacity is
/// reached, keeping memory constant over long watches.
#[derive(Debug)]
pub struct SeenEvents {
    capacity: usize,
    seen: HashSet<String>,
    order: VecDeque<String>,
}

impl SeenEvents {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            seen: HashSet::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
        }
    }

    /// Records an event ID, returning `true` if it was not seen before.
    pub fn insert(&mut self, id: &str) -> bool {
        if self.seen.contains(id) {
            return false;
        }
        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.seen.insert(id.to_string());
        self.order.push_back(id.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

impl Default for SeenEvents {
    fn default() -> Self {
        Self::new(500)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::models::EventType;

    fn make_event(id: &str, session: &str, event_type: EventType, at: i64) -> Event {
        Event {
            id: id.to_string(),
            event_type,
            tool_name: None,
            payload: serde_json::Value::Null,
            timestamp: Timestamp::from_second(at).unwrap(),
            session_id: session.to_string(),
            source_agent: "claude".to_string(),
            project: "/test/project".to_string(),
            feature_id: 1,
            step_id: None,
            success: true,
            drift_flagged: false,
            summary: None,
        }
    }

    #[test]
    fn test_terminal_event_wins_over_recency() {
        let now = Timestamp::from_second(1700000000).unwrap();
        // Last event seconds ago, but the session observed an agent stop
        let events = vec![
            make_event("e1", "s1", EventType::ToolCall, 1699999990),
            make_event("e2", "s1", EventType::AgentStop, 1699999995),
        ];
        let groups = group_sessions(&events, now, &GrouperConfig::default());

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].liveness, SessionLiveness::Ended);
    }

    #[test]
    fn test_recent_session_is_active_and_old_is_stale() {
        let now = Timestamp::from_second(1700000000).unwrap();
        let events = vec![
            make_event("e1", "recent", EventType::ToolCall, 1700000000 - 60),
            make_event("e2", "old", EventType::ToolCall, 1700000000 - 3600),
        ];
        let groups = group_sessions(&events, now, &GrouperConfig::default());

        assert_eq!(groups[0].session_id, "recent");
        assert_eq!(groups[0].liveness, SessionLiveness::Active);
        assert_eq!(groups[1].liveness, SessionLiveness::Stale);
    }

    #[test]
    fn test_active_groups_sort_before_more_recent_ended_ones() {
        let now = Timestamp::from_second(1700000000).unwrap();
        let mut events = vec![
            make_event("e1", "done", EventType::ToolCall, 1700000000 - 10),
            make_event("e2", "done", EventType::AgentStop, 1700000000 - 5),
            make_event("e3", "live", EventType::ToolCall, 1700000000 - 300),
        ];
        events.reverse(); // fold order does not matter
        let groups = group_sessions(&events, now, &GrouperConfig::default());

        assert_eq!(groups[0].session_id, "live");
        assert_eq!(groups[1].session_id, "done");
    }

    #[test]
    fn test_automated_prompt_bucket() {
        let now = Timestamp::from_second(1700000000).unwrap();
        let mut query = make_event("e1", "auto", EventType::UserQuery, 1700000000 - 30);
        query.payload = json!({"prompt": "<command-name>/compact</command-name>"});
        let groups = group_sessions(&[query], now, &GrouperConfig::default());

        assert_eq!(groups[0].liveness, SessionLiveness::Automated);
    }

    #[test]
    fn test_short_automated_session_with_terminal_event_is_ended() {
        let now = Timestamp::from_second(1700000000).unwrap();
        let mut query = make_event("e1", "auto", EventType::UserQuery, 1700000000 - 40);
        query.payload = json!({"prompt": "<command-name>/compact</command-name>"});
        let stop = make_event("e2", "auto", EventType::AgentStop, 1700000000 - 30);
        let groups = group_sessions(&[query, stop], now, &GrouperConfig::default());

        assert_eq!(groups[0].liveness, SessionLiveness::Ended);
    }

    #[test]
    fn test_long_session_with_automated_opener_is_not_automated() {
        let now = Timestamp::from_second(1700000000).unwrap();
        let mut events = vec![{
            let mut query = make_event("e0", "s1", EventType::UserQuery, 1700000000 - 90);
            query.payload = json!({"prompt": "<system-reminder>startup</system-reminder>"});
            query
        }];
        for i in 0..5 {
            events.push(make_event(
                &format!("e{}", i + 1),
                "s1",
                EventType::ToolCall,
                1700000000 - 60 + i,
            ));
        }
        let groups = group_sessions(&events, now, &GrouperConfig::default());

        assert_eq!(groups[0].liveness, SessionLiveness::Active);
    }

    #[test]
    fn test_incremental_fold_matches_batch_grouping() {
        let now = Timestamp::from_second(1700000000).unwrap();
        let events = vec![
            make_event("e1", "s1", EventType::ToolCall, 1699999900),
            make_event("e2", "s2", EventType::ToolCall, 1699999910),
            make_event("e3", "s1", EventType::AgentStop, 1699999920),
        ];

        let batch = group_sessions(&events, now, &GrouperConfig::default());

        let mut grouper = SessionGrouper::new();
        for event in &events {
            grouper.fold(event);
        }
        let incremental = grouper.groups(now, &GrouperConfig::default());

        let key = |g: &SessionGroup| {
            (
                g.session_id.clone(),
                g.event_count,
                g.liveness,
                g.first_seen,
                g.last_activity,
            )
        };
        assert_eq!(
            batch.iter().map(key).collect::<Vec<_>>(),
            incremental.iter().map(key).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_seen_events_dedup_and_eviction() {
        let mut seen = SeenEvents::new(3);
        assert!(seen.insert("a"));
        assert!(!seen.insert("a"));
        assert!(seen.insert("b"));
        assert!(seen.insert("c"));
        assert_eq!(seen.len(), 3);

        // Capacity reached: inserting "d" evicts "a"
        assert!(seen.insert("d"));
        assert_eq!(seen.len(), 3);
        assert!(seen.insert("a"));
    }
}
