//! Feature CRUD operations and queries.

use jiff::Timestamp;
use rusqlite::{params, types::Type, OptionalExtension};

use crate::{
    error::{DatabaseResultExt, EngineError, Result},
    models::{
        Feature, FeatureCategory, FeatureStats, FeatureStatus, SESSION_WORK_DESCRIPTION,
    },
};

const FEATURE_COLUMNS: &str = "id, project, description, category, status, priority, \
     is_session_work, work_count, created_at, updated_at, completed_at";

const INSERT_FEATURE_SQL: &str = "INSERT INTO features (project, description, category, status, \
     priority, is_session_work, work_count, created_at, updated_at) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?8)";
const INSERT_SENTINEL_SQL: &str = "INSERT OR IGNORE INTO features (project, description, \
     category, status, priority, is_session_work, work_count, created_at, updated_at) \
     VALUES (?1, ?2, 'infrastructure', 'pending', -1, 1, 0, ?3, ?4)";
const DEMOTE_SIBLINGS_SQL: &str = "UPDATE features SET status = 'pending', updated_at = ?1 \
     WHERE project = ?2 AND status = 'in_progress' AND is_session_work = 0 AND id != ?3";
const ACTIVATE_FEATURE_SQL: &str = "UPDATE features SET status = 'in_progress', updated_at = ?1 \
     WHERE id = ?2 AND is_session_work = 0";
const COMPLETE_FEATURE_SQL: &str = "UPDATE features SET status = 'complete', completed_at = ?1, \
     updated_at = ?1 WHERE id = ?2 AND is_session_work = 0";
const BEGIN_PENDING_FEATURE_SQL: &str = "UPDATE features SET status = 'in_progress', \
     updated_at = ?1 WHERE id = ?2 AND status = 'pending' AND is_session_work = 0";
const INCREMENT_WORK_COUNT_SQL: &str =
    "UPDATE features SET work_count = work_count + 1, updated_at = ?1 WHERE id = ?2";
const SELECT_WORK_COUNT_SQL: &str = "SELECT work_count FROM features WHERE id = ?1";
const FEATURE_STATS_SQL: &str = "SELECT COUNT(*), \
     COALESCE(SUM(CASE WHEN status = 'complete' THEN 1 ELSE 0 END), 0), \
     COALESCE(SUM(CASE WHEN status = 'in_progress' THEN 1 ELSE 0 END), 0) \
     FROM features WHERE project = ?1 AND is_session_work = 0";

impl super::Database {
    /// Helper function to construct a Feature from a database row
    pub(super) fn build_feature_from_row(row: &rusqlite::Row) -> rusqlite::Result<Feature> {
        let category_str: String = row.get(3)?;
        let category = category_str.parse::<FeatureCategory>().map_err(|_| {
            rusqlite::Error::FromSqlConversionFailure(
                3,
                Type::Text,
                format!("Invalid category: {category_str}").into(),
            )
        })?;

        let status_str: String = row.get(4)?;
        let status = status_str.parse::<FeatureStatus>().map_err(|_| {
            rusqlite::Error::FromSqlConversionFailure(
                4,
                Type::Text,
                format!("Invalid status: {status_str}").into(),
            )
        })?;

        let completed_at: Option<String> = row.get(10)?;
        let completed_at = completed_at
            .map(|s| {
                s.parse::<Timestamp>().map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(10, Type::Text, Box::new(e))
                })
            })
            .transpose()?;

        Ok(Feature {
            id: row.get::<_, i64>(0)? as u64,
            project: row.get(1)?,
            description: row.get(2)?,
            category,
            status,
            priority: row.get(5)?,
            is_session_work: row.get::<_, i64>(6)? != 0,
            work_count: row.get(7)?,
            created_at: row.get::<_, String>(8)?.parse::<Timestamp>().map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(8, Type::Text, Box::new(e))
            })?,
            updated_at: row.get::<_, String>(9)?.parse::<Timestamp>().map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(9, Type::Text, Box::new(e))
            })?,
            completed_at,
        })
    }

    /// Creates a new feature in the given project. When `activate` is set,
    /// all other in-progress features of the project are demoted in the
    /// same transaction so at most one stays active.
    pub fn create_feature(
        &mut self,
        project: Option<&str>,
        description: &str,
        category: FeatureCategory,
        priority: i64,
        activate: bool,
    ) -> Result<Feature> {
        if description.trim().is_empty() {
            return Err(EngineError::invalid_input("description")
                .with_reason("Feature description cannot be empty"));
        }

        let project = Self::ensure_absolute_project(project)?;
        let tx = self
            .connection
            .transaction()
            .db_context("Failed to begin transaction")?;

        let now = Timestamp::now();
        let now_str = now.to_string();
        let status = if activate {
            FeatureStatus::InProgress
        } else {
            FeatureStatus::Pending
        };

        tx.execute(
            INSERT_FEATURE_SQL,
            params![
                &project,
                description,
                category.as_str(),
                status.as_str(),
                priority,
                0i64,
                &now_str,
                &now_str
            ],
        )
        .map_err(|e| EngineError::database_error("Failed to insert feature", e))?;

        let id = tx.last_insert_rowid() as u64;

        if activate {
            tx.execute(DEMOTE_SIBLINGS_SQL, params![&now_str, &project, id as i64])
                .map_err(|e| EngineError::database_error("Failed to demote sibling features", e))?;
        }

        tx.commit().db_context("Failed to commit transaction")?;

        Ok(Feature {
            id,
            project,
            description: description.into(),
            category,
            status,
            priority,
            is_session_work: false,
            work_count: 0,
            created_at: now,
            updated_at: now,
            completed_at: None,
        })
    }

    /// Retrieves a single feature by its ID.
    pub fn get_feature(&self, feature_id: u64) -> Result<Option<Feature>> {
        let sql = format!("SELECT {FEATURE_COLUMNS} FROM features WHERE id = ?1");
        let mut stmt = self
            .connection
            .prepare(&sql)
            .map_err(|e| EngineError::database_error("Failed to prepare query", e))?;

        let feature = stmt
            .query_row(params![feature_id as i64], Self::build_feature_from_row)
            .optional()
            .map_err(|e| EngineError::database_error("Failed to get feature", e))?;

        Ok(feature)
    }

    /// Lists all features of a project, sentinel last, higher priority
    /// first, oldest first within a priority.
    pub fn list_features(&self, project: Option<&str>) -> Result<Vec<Feature>> {
        let project = Self::ensure_absolute_project(project)?;
        let sql = format!(
            "SELECT {FEATURE_COLUMNS} FROM features WHERE project = ?1 \
             ORDER BY is_session_work, priority DESC, created_at"
        );
        let mut stmt = self
            .connection
            .prepare(&sql)
            .map_err(|e| EngineError::database_error("Failed to prepare query", e))?;

        let features = stmt
            .query_map(params![&project], Self::build_feature_from_row)
            .map_err(|e| EngineError::database_error("Failed to query features", e))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| EngineError::database_error("Failed to fetch features", e))?;

        Ok(features)
    }

    /// Returns the project's active (in-progress, non-sentinel) feature.
    ///
    /// If more than one row violates the single-active invariant, the
    /// highest-priority oldest row wins and the violation is logged.
    pub fn get_active_feature(&self, project: &str) -> Result<Option<Feature>> {
        let sql = format!(
            "SELECT {FEATURE_COLUMNS} FROM features \
             WHERE project = ?1 AND status = 'in_progress' AND is_session_work = 0 \
             ORDER BY priority DESC, created_at"
        );
        let mut stmt = self
            .connection
            .prepare(&sql)
            .map_err(|e| EngineError::database_error("Failed to prepare query", e))?;

        let features = stmt
            .query_map(params![project], Self::build_feature_from_row)
            .map_err(|e| EngineError::database_error("Failed to query active feature", e))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| EngineError::database_error("Failed to fetch active feature", e))?;

        if features.len() > 1 {
            log::warn!(
                "project {} has {} in-progress features; using feature {}",
                project,
                features.len(),
                features[0].id
            );
        }

        Ok(features.into_iter().next())
    }

    /// Returns the project's session-work sentinel, creating it lazily.
    ///
    /// The partial unique index on `(project) WHERE is_session_work = 1`
    /// makes concurrent creation race-safe: the insert is `OR IGNORE` and
    /// the follow-up select reads whichever row won.
    pub fn get_or_create_session_work(&mut self, project: &str) -> Result<Feature> {
        let now_str = Timestamp::now().to_string();
        self.connection
            .execute(
                INSERT_SENTINEL_SQL,
                params![project, SESSION_WORK_DESCRIPTION, &now_str, &now_str],
            )
            .map_err(|e| EngineError::database_error("Failed to ensure session work feature", e))?;

        let sql = format!(
            "SELECT {FEATURE_COLUMNS} FROM features \
             WHERE project = ?1 AND is_session_work = 1"
        );
        self.connection
            .query_row(&sql, params![project], Self::build_feature_from_row)
            .map_err(|e| EngineError::database_error("Failed to load session work feature", e))
    }

    /// Activates a feature, demoting every other in-progress feature of
    /// the same project in the same transaction.
    pub fn activate_feature(&mut self, feature_id: u64) -> Result<Feature> {
        let tx = self
            .connection
            .transaction()
            .db_context("Failed to begin transaction")?;

        let sql = format!("SELECT {FEATURE_COLUMNS} FROM features WHERE id = ?1");
        let feature = tx
            .query_row(&sql, params![feature_id as i64], Self::build_feature_from_row)
            .optional()
            .map_err(|e| EngineError::database_error("Failed to query feature", e))?
            .ok_or(EngineError::FeatureNotFound { id: feature_id })?;

        if feature.is_session_work {
            return Err(EngineError::invalid_input("feature_id")
                .with_reason("The session work feature cannot be activated"));
        }
        if !feature.status.can_transition_to(FeatureStatus::InProgress) {
            return Err(EngineError::InvalidTransition {
                from: feature.status.as_str().to_string(),
                to: FeatureStatus::InProgress.as_str().to_string(),
            });
        }

        let now_str = Timestamp::now().to_string();
        tx.execute(
            DEMOTE_SIBLINGS_SQL,
            params![&now_str, &feature.project, feature_id as i64],
        )
        .map_err(|e| EngineError::database_error("Failed to demote sibling features", e))?;
        tx.execute(ACTIVATE_FEATURE_SQL, params![&now_str, feature_id as i64])
            .map_err(|e| EngineError::database_error("Failed to activate feature", e))?;

        let updated = tx
            .query_row(&sql, params![feature_id as i64], Self::build_feature_from_row)
            .map_err(|e| EngineError::database_error("Failed to query activated feature", e))?;

        tx.commit().db_context("Failed to commit transaction")?;
        Ok(updated)
    }

    /// Marks a feature complete. The sentinel never completes.
    pub fn complete_feature(&mut self, feature_id: u64) -> Result<Feature> {
        let tx = self
            .connection
            .transaction()
            .db_context("Failed to begin transaction")?;

        let sql = format!("SELECT {FEATURE_COLUMNS} FROM features WHERE id = ?1");
        let feature = tx
            .query_row(&sql, params![feature_id as i64], Self::build_feature_from_row)
            .optional()
            .map_err(|e| EngineError::database_error("Failed to query feature", e))?
            .ok_or(EngineError::FeatureNotFound { id: feature_id })?;

        if feature.is_session_work {
            return Err(EngineError::invalid_input("feature_id")
                .with_reason("The session work feature never completes"));
        }
        if !feature.status.can_transition_to(FeatureStatus::Complete) {
            return Err(EngineError::InvalidTransition {
                from: feature.status.as_str().to_string(),
                to: FeatureStatus::Complete.as_str().to_string(),
            });
        }

        let now_str = Timestamp::now().to_string();
        tx.execute(COMPLETE_FEATURE_SQL, params![&now_str, feature_id as i64])
            .map_err(|e| EngineError::database_error("Failed to complete feature", e))?;

        let updated = tx
            .query_row(&sql, params![feature_id as i64], Self::build_feature_from_row)
            .map_err(|e| EngineError::database_error("Failed to query completed feature", e))?;

        tx.commit().db_context("Failed to commit transaction")?;
        Ok(updated)
    }

    /// Moves a pending feature to in-progress on its first attributed
    /// event. The conditional update makes the transition race-safe;
    /// returns whether a transition happened.
    pub fn begin_feature_if_pending(&mut self, feature_id: u64) -> Result<bool> {
        let now_str = Timestamp::now().to_string();
        let changed = self
            .connection
            .execute(BEGIN_PENDING_FEATURE_SQL, params![&now_str, feature_id as i64])
            .map_err(|e| EngineError::database_error("Failed to begin pending feature", e))?;
        Ok(changed > 0)
    }

    /// Increments a feature's work counter, returning the new value.
    pub fn increment_work_count(&mut self, feature_id: u64) -> Result<i64> {
        let tx = self
            .connection
            .transaction()
            .db_context("Failed to begin transaction")?;

        let now_str = Timestamp::now().to_string();
        let changed = tx
            .execute(INCREMENT_WORK_COUNT_SQL, params![&now_str, feature_id as i64])
            .map_err(|e| EngineError::database_error("Failed to increment work count", e))?;
        if changed == 0 {
            return Err(EngineError::FeatureNotFound { id: feature_id });
        }

        let count: i64 = tx
            .query_row(SELECT_WORK_COUNT_SQL, params![feature_id as i64], |row| {
                row.get(0)
            })
            .map_err(|e| EngineError::database_error("Failed to read work count", e))?;

        tx.commit().db_context("Failed to commit transaction")?;
        Ok(count)
    }

    /// Aggregate feature counts for a project, excluding the sentinel.
    pub fn feature_stats(&self, project: &str) -> Result<FeatureStats> {
        self.connection
            .query_row(FEATURE_STATS_SQL, params![project], |row| {
                Ok(FeatureStats {
                    total: row.get(0)?,
                    completed: row.get(1)?,
                    in_progress: row.get(2)?,
                })
            })
            .db_context("Failed to compute feature stats")
    }
}
