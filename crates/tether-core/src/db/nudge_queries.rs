//! Once-per-session nudge bookkeeping.

use jiff::Timestamp;

use crate::{
    error::{EngineError, Result},
    nudges::NudgeStore,
};

use rusqlite::params;

const HAS_NUDGE_SQL: &str =
    "SELECT EXISTS(SELECT 1 FROM nudges WHERE session_id = ?1 AND nudge_key = ?2)";
// OR IGNORE on the composite primary key makes recording idempotent and
// safe under concurrent observers.
const RECORD_NUDGE_SQL: &str =
    "INSERT OR IGNORE INTO nudges (session_id, nudge_key, created_at) VALUES (?1, ?2, ?3)";

impl NudgeStore for super::Database {
    fn has_been_nudged(&mut self, session_id: &str, key: &str) -> Result<bool> {
        self.connection
            .query_row(HAS_NUDGE_SQL, params![session_id, key], |row| row.get(0))
            .map_err(|e| EngineError::database_error("Failed to query nudge", e))
    }

    fn record_nudge(&mut self, session_id: &str, key: &str) -> Result<()> {
        let now_str = Timestamp::now().to_string();
        self.connection
            .execute(RECORD_NUDGE_SQL, params![session_id, key, &now_str])
            .map_err(|e| EngineError::database_error("Failed to record nudge", e))?;
        Ok(())
    }
}
