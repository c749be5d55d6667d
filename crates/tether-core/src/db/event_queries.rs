//! Event persistence and session-scoped activity queries.

use jiff::Timestamp;
use rusqlite::{params, types::Type, OptionalExtension};

use crate::{
    error::{DatabaseResultExt, EngineError, Result, ResultExt},
    models::{Event, EventType, Session, SessionStatus},
};

const EVENT_COLUMNS: &str = "id, event_type, tool_name, payload, timestamp, session_id, \
     source_agent, project, feature_id, step_id, success, drift_flagged, summary";

const UPSERT_SESSION_SQL: &str = "INSERT INTO sessions (id, source_agent, project, status, \
     started_at, last_activity) VALUES (?1, ?2, ?3, 'active', ?4, ?4) \
     ON CONFLICT (id) DO UPDATE SET last_activity = excluded.last_activity";
const END_SESSION_SQL: &str =
    "UPDATE sessions SET status = 'ended', ended_at = ?1 WHERE id = ?2 AND status = 'active'";
const INSERT_EVENT_SQL: &str = "INSERT OR IGNORE INTO events (id, event_type, tool_name, \
     payload, timestamp, session_id, source_agent, project, feature_id, step_id, success, \
     drift_flagged, summary) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)";
const SELECT_SESSION_SQL: &str = "SELECT id, source_agent, project, status, started_at, \
     last_activity, ended_at FROM sessions WHERE id = ?1";
// Keep the tool list in step with stuckness::FILE_MODIFYING_TOOLS.
const LAST_PROGRESS_SQL: &str = "SELECT timestamp FROM events WHERE session_id = ?1 \
     AND success = 1 AND tool_name IN ('Edit', 'Write', 'MultiEdit', 'NotebookEdit') \
     ORDER BY timestamp DESC, rowid DESC LIMIT 1";
const RECENT_STEP_FLAGS_SQL: &str = "SELECT drift_flagged FROM events WHERE step_id = ?1 \
     ORDER BY timestamp DESC, rowid DESC LIMIT ?2";
const COUNT_STEP_EVENTS_SQL: &str = "SELECT COUNT(*) FROM events WHERE step_id = ?1";
const COUNT_SESSION_WORK_SQL: &str = "SELECT COUNT(*) FROM events e \
     JOIN features f ON f.id = e.feature_id \
     WHERE e.session_id = ?1 AND f.is_session_work = 1";
const LAST_COMMIT_SQL: &str = "SELECT timestamp FROM events WHERE session_id = ?1 \
     AND tool_name = 'Bash' AND payload LIKE '%git commit%' \
     ORDER BY timestamp DESC, rowid DESC LIMIT 1";
const COUNT_CHANGES_SQL: &str = "SELECT COUNT(*) FROM events WHERE session_id = ?1 \
     AND success = 1 AND tool_name IN ('Edit', 'Write', 'MultiEdit', 'NotebookEdit')";
const COUNT_CHANGES_SINCE_SQL: &str = "SELECT COUNT(*) FROM events WHERE session_id = ?1 \
     AND success = 1 AND tool_name IN ('Edit', 'Write', 'MultiEdit', 'NotebookEdit') \
     AND timestamp > ?2";

/// Fields needed to persist one observed event.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub id: String,
    pub event_type: EventType,
    pub tool_name: Option<String>,
    pub payload: serde_json::Value,
    pub timestamp: Timestamp,
    pub session_id: String,
    pub source_agent: String,
    pub project: String,
    pub feature_id: u64,
    pub step_id: Option<u64>,
    pub success: bool,
    pub drift_flagged: bool,
    pub summary: Option<String>,
}

impl super::Database {
    /// Helper function to construct an Event from a database row
    fn build_event_from_row(row: &rusqlite::Row) -> rusqlite::Result<Event> {
        let type_str: String = row.get(1)?;
        let event_type = type_str.parse::<EventType>().map_err(|_| {
            rusqlite::Error::FromSqlConversionFailure(
                1,
                Type::Text,
                format!("Invalid event type: {type_str}").into(),
            )
        })?;

        let payload: Option<String> = row.get(3)?;
        let payload = payload
            .map(|s| {
                serde_json::from_str(&s).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e))
                })
            })
            .transpose()?
            .unwrap_or(serde_json::Value::Null);

        Ok(Event {
            id: row.get(0)?,
            event_type,
            tool_name: row.get(2)?,
            payload,
            timestamp: row.get::<_, String>(4)?.parse::<Timestamp>().map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e))
            })?,
            session_id: row.get(5)?,
            source_agent: row.get(6)?,
            project: row.get(7)?,
            feature_id: row.get::<_, i64>(8)? as u64,
            step_id: row.get::<_, Option<i64>>(9)?.map(|id| id as u64),
            success: row.get::<_, i64>(10)? != 0,
            drift_flagged: row.get::<_, i64>(11)? != 0,
            summary: row.get(12)?,
        })
    }

    /// Persists one event, upserting its session in the same transaction.
    ///
    /// Inserts are `OR IGNORE` on the event ID so a redelivered hook
    /// payload is a no-op; the return value says whether the event was
    /// new. A terminal event also flips its session to ended.
    pub fn insert_event(&mut self, event: &NewEvent) -> Result<bool> {
        let tx = self
            .connection
            .transaction()
            .db_context("Failed to begin transaction")?;

        let ts_str = event.timestamp.to_string();
        tx.execute(
            UPSERT_SESSION_SQL,
            params![
                &event.session_id,
                &event.source_agent,
                &event.project,
                &ts_str
            ],
        )
        .map_err(|e| EngineError::database_error("Failed to upsert session", e))?;

        let payload_str = if event.payload.is_null() {
            None
        } else {
            Some(event.payload.to_string())
        };
        let inserted = tx
            .execute(
                INSERT_EVENT_SQL,
                params![
                    &event.id,
                    event.event_type.as_str(),
                    event.tool_name.as_deref(),
                    payload_str.as_deref(),
                    &ts_str,
                    &event.session_id,
                    &event.source_agent,
                    &event.project,
                    event.feature_id as i64,
                    event.step_id.map(|id| id as i64),
                    event.success as i64,
                    event.drift_flagged as i64,
                    event.summary.as_deref()
                ],
            )
            .map_err(|e| EngineError::database_error("Failed to insert event", e))?;

        if event.event_type.is_terminal() {
            tx.execute(END_SESSION_SQL, params![&ts_str, &event.session_id])
                .map_err(|e| EngineError::database_error("Failed to end session", e))?;
        }

        tx.commit().db_context("Failed to commit transaction")?;
        Ok(inserted > 0)
    }

    /// Retrieves a session by its ID.
    pub fn get_session(&self, session_id: &str) -> Result<Option<Session>> {
        let session = self
            .connection
            .query_row(SELECT_SESSION_SQL, params![session_id], |row| {
                let status_str: String = row.get(3)?;
                let status = status_str.parse::<SessionStatus>().map_err(|_| {
                    rusqlite::Error::FromSqlConversionFailure(
                        3,
                        Type::Text,
                        format!("Invalid session status: {status_str}").into(),
                    )
                })?;
                let parse_ts = |index: usize, value: String| {
                    value.parse::<Timestamp>().map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e))
                    })
                };
                Ok(Session {
                    id: row.get(0)?,
                    source_agent: row.get(1)?,
                    project: row.get(2)?,
                    status,
                    started_at: parse_ts(4, row.get::<_, String>(4)?)?,
                    last_activity: parse_ts(5, row.get::<_, String>(5)?)?,
                    ended_at: row
                        .get::<_, Option<String>>(6)?
                        .map(|s| parse_ts(6, s))
                        .transpose()?,
                })
            })
            .optional()
            .map_err(|e| EngineError::database_error("Failed to get session", e))?;

        Ok(session)
    }

    /// The most recent events of one session, newest first.
    pub fn get_recent_events(&self, session_id: &str, limit: usize) -> Result<Vec<Event>> {
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE session_id = ?1 \
             ORDER BY timestamp DESC, rowid DESC LIMIT ?2"
        );
        let mut stmt = self
            .connection
            .prepare(&sql)
            .map_err(|e| EngineError::database_error("Failed to prepare query", e))?;

        let events = stmt
            .query_map(params![session_id, limit as i64], Self::build_event_from_row)
            .map_err(|e| EngineError::database_error("Failed to query recent events", e))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| EngineError::database_error("Failed to fetch recent events", e))?;

        Ok(events)
    }

    /// The most recent events across sessions, oldest first, optionally
    /// restricted to one project. Feeds the session grouper.
    pub fn get_events_for_grouping(
        &self,
        project: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Event>> {
        let sql = match project {
            Some(_) => format!(
                "SELECT {EVENT_COLUMNS} FROM events WHERE project = ?1 \
                 ORDER BY timestamp DESC, rowid DESC LIMIT ?2"
            ),
            None => format!(
                "SELECT {EVENT_COLUMNS} FROM events \
                 ORDER BY timestamp DESC, rowid DESC LIMIT ?1"
            ),
        };
        let mut stmt = self
            .connection
            .prepare(&sql)
            .map_err(|e| EngineError::database_error("Failed to prepare query", e))?;

        let mut events = match project {
            Some(project) => stmt
                .query_map(params![project, limit as i64], Self::build_event_from_row)
                .map_err(|e| EngineError::database_error("Failed to query events", e))?
                .collect::<std::result::Result<Vec<_>, _>>(),
            None => stmt
                .query_map(params![limit as i64], Self::build_event_from_row)
                .map_err(|e| EngineError::database_error("Failed to query events", e))?
                .collect::<std::result::Result<Vec<_>, _>>(),
        }
        .map_err(|e| EngineError::database_error("Failed to fetch events", e))?;

        events.reverse();
        Ok(events)
    }

    /// Timestamp of the session's last successful file-modifying event.
    pub fn get_last_progress_at(&self, session_id: &str) -> Result<Option<Timestamp>> {
        let timestamp: Option<String> = self
            .connection
            .query_row(LAST_PROGRESS_SQL, params![session_id], |row| row.get(0))
            .optional()
            .map_err(|e| EngineError::database_error("Failed to query last progress", e))?;

        timestamp
            .map(|s| {
                s.parse::<Timestamp>()
                    .with_context("Invalid timestamp in events table")
            })
            .transpose()
    }

    /// Drift flags of the step's most recent events, newest first.
    pub fn get_recent_step_flags(&self, step_id: u64, limit: usize) -> Result<Vec<bool>> {
        let mut stmt = self
            .connection
            .prepare(RECENT_STEP_FLAGS_SQL)
            .map_err(|e| EngineError::database_error("Failed to prepare query", e))?;

        let flags = stmt
            .query_map(params![step_id as i64, limit as i64], |row| {
                Ok(row.get::<_, i64>(0)? != 0)
            })
            .map_err(|e| EngineError::database_error("Failed to query step flags", e))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| EngineError::database_error("Failed to fetch step flags", e))?;

        Ok(flags)
    }

    /// Number of events recorded under a step.
    pub fn count_step_events(&self, step_id: u64) -> Result<i64> {
        self.connection
            .query_row(COUNT_STEP_EVENTS_SQL, params![step_id as i64], |row| {
                row.get(0)
            })
            .db_context("Failed to count step events")
    }

    /// Number of the session's events attributed to session work.
    pub fn count_session_work_events(&self, session_id: &str) -> Result<i64> {
        self.connection
            .query_row(COUNT_SESSION_WORK_SQL, params![session_id], |row| {
                row.get(0)
            })
            .db_context("Failed to count session work events")
    }

    /// Successful file changes since the session's last `git commit`
    /// Bash event, or since the session began when none exists.
    pub fn count_changes_since_commit(&self, session_id: &str) -> Result<i64> {
        let last_commit: Option<String> = self
            .connection
            .query_row(LAST_COMMIT_SQL, params![session_id], |row| row.get(0))
            .optional()
            .map_err(|e| EngineError::database_error("Failed to query last commit", e))?;

        match last_commit {
            Some(commit_ts) => self
                .connection
                .query_row(
                    COUNT_CHANGES_SINCE_SQL,
                    params![session_id, &commit_ts],
                    |row| row.get(0),
                )
                .db_context("Failed to count changes since commit"),
            None => self
                .connection
                .query_row(COUNT_CHANGES_SQL, params![session_id], |row| row.get(0))
                .db_context("Failed to count changes"),
        }
    }
}
