//! Step queries, plan synchronization, and status transitions.

use std::collections::HashMap;

use jiff::Timestamp;
use rusqlite::{params, types::Type, OptionalExtension, Transaction};

use crate::{
    error::{DatabaseResultExt, EngineError, Result},
    models::{Step, StepStatus},
    params::DeclaredStep,
};

const STEP_COLUMNS: &str = "id, feature_id, description, status, step_order, expected_tools, \
     started_at, completed_at, created_at, updated_at";

const CHECK_FEATURE_EXISTS_SQL: &str = "SELECT EXISTS(SELECT 1 FROM features WHERE id = ?1)";
const INSERT_STEP_SQL: &str = "INSERT INTO steps (feature_id, description, status, step_order, \
     expected_tools, started_at, completed_at, created_at, updated_at) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)";
const SHIFT_ORDERS_NEGATIVE_SQL: &str =
    "UPDATE steps SET step_order = -(step_order + 1) WHERE feature_id = ?1";
const UPDATE_SYNCED_STEP_SQL: &str = "UPDATE steps SET status = ?1, step_order = ?2, \
     expected_tools = ?3, started_at = ?4, completed_at = ?5, updated_at = ?6 WHERE id = ?7";
const DEMOTE_SIBLING_STEPS_SQL: &str = "UPDATE steps SET status = 'pending', updated_at = ?1 \
     WHERE feature_id = ?2 AND status = 'in_progress' AND id != ?3";
const UPDATE_STEP_STATUS_CLAIMED_SQL: &str = "UPDATE steps SET status = ?1, started_at = ?2, \
     completed_at = ?3, updated_at = ?4 WHERE id = ?5 AND status = ?6";

impl super::Database {
    /// Helper function to construct a Step from a database row
    fn build_step_from_row(row: &rusqlite::Row) -> rusqlite::Result<Step> {
        let status_str: String = row.get(3)?;
        let status = status_str.parse::<StepStatus>().map_err(|_| {
            rusqlite::Error::FromSqlConversionFailure(
                3,
                Type::Text,
                format!("Invalid status: {status_str}").into(),
            )
        })?;

        // Parse expected tools from comma-separated string
        let tools_str: Option<String> = row.get(5)?;
        let expected_tools = tools_str
            .filter(|s| !s.is_empty())
            .map(|s| s.split(',').map(String::from).collect())
            .unwrap_or_default();

        let parse_optional = |index: usize| -> rusqlite::Result<Option<Timestamp>> {
            row.get::<_, Option<String>>(index)?
                .map(|s| {
                    s.parse::<Timestamp>().map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e))
                    })
                })
                .transpose()
        };

        // Skipped steps are stored after the declared plan; their raw
        // order is still non-negative here because sync always leaves
        // final orders dense and positive.
        Ok(Step {
            id: row.get::<_, i64>(0)? as u64,
            feature_id: row.get::<_, i64>(1)? as u64,
            description: row.get(2)?,
            status,
            order: row.get::<_, i64>(4)?.max(0) as u32,
            expected_tools,
            started_at: parse_optional(6)?,
            completed_at: parse_optional(7)?,
            created_at: row.get::<_, String>(8)?.parse::<Timestamp>().map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(8, Type::Text, Box::new(e))
            })?,
            updated_at: row.get::<_, String>(9)?.parse::<Timestamp>().map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(9, Type::Text, Box::new(e))
            })?,
        })
    }

    /// Retrieves all steps of a feature in plan order.
    pub fn get_steps(&self, feature_id: u64) -> Result<Vec<Step>> {
        let sql = format!(
            "SELECT {STEP_COLUMNS} FROM steps WHERE feature_id = ?1 ORDER BY step_order"
        );
        let mut stmt = self
            .connection
            .prepare(&sql)
            .map_err(|e| EngineError::database_error("Failed to prepare query", e))?;

        let steps = stmt
            .query_map(params![feature_id as i64], Self::build_step_from_row)
            .map_err(|e| EngineError::database_error("Failed to query steps", e))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| EngineError::database_error("Failed to fetch steps", e))?;

        Ok(steps)
    }

    /// Retrieves a single step by its ID.
    pub fn get_step(&self, step_id: u64) -> Result<Option<Step>> {
        let sql = format!("SELECT {STEP_COLUMNS} FROM steps WHERE id = ?1");
        let mut stmt = self
            .connection
            .prepare(&sql)
            .map_err(|e| EngineError::database_error("Failed to prepare query", e))?;

        let step = stmt
            .query_row(params![step_id as i64], Self::build_step_from_row)
            .optional()
            .map_err(|e| EngineError::database_error("Failed to get step", e))?;

        Ok(step)
    }

    /// Returns the step drift scoring should target: the in-progress step
    /// with the lowest order, falling back to the first pending step.
    ///
    /// Multiple in-progress rows violate the single-active invariant; the
    /// lowest order wins and the violation is logged rather than repaired
    /// here, since this is a read path.
    pub fn get_active_step(&self, feature_id: u64) -> Result<Option<Step>> {
        let steps = self.get_steps(feature_id)?;

        let mut in_progress = steps
            .iter()
            .filter(|step| step.status == StepStatus::InProgress);
        if let Some(first) = in_progress.next() {
            if in_progress.next().is_some() {
                log::warn!(
                    "feature {} has multiple in-progress steps; using step {}",
                    feature_id,
                    first.id
                );
            }
            return Ok(Some(first.clone()));
        }

        Ok(steps
            .into_iter()
            .find(|step| step.status == StepStatus::Pending))
    }

    /// Synchronizes a feature's steps with a declared plan.
    ///
    /// Steps are matched by exact description. Matched steps keep their
    /// identity, history, and status (unless the declaration names one)
    /// but adopt the declared order; new descriptions become new steps;
    /// existing steps absent from the plan
    /// are marked skipped (completed ones stay completed) and reordered
    /// after the declared list. The whole diff runs in one transaction and
    /// re-declaring the same plan is a no-op.
    pub fn sync_steps(&mut self, feature_id: u64, declared: &[DeclaredStep]) -> Result<Vec<Step>> {
        let tx = self
            .connection
            .transaction()
            .db_context("Failed to begin transaction")?;

        let feature_exists: bool = tx
            .query_row(CHECK_FEATURE_EXISTS_SQL, params![feature_id as i64], |row| {
                row.get(0)
            })
            .map_err(|e| EngineError::database_error("Failed to check feature existence", e))?;
        if !feature_exists {
            return Err(EngineError::FeatureNotFound { id: feature_id });
        }

        let existing = {
            let sql = format!(
                "SELECT {STEP_COLUMNS} FROM steps WHERE feature_id = ?1 ORDER BY step_order"
            );
            let mut stmt = tx
                .prepare(&sql)
                .map_err(|e| EngineError::database_error("Failed to prepare query", e))?;
            let steps = stmt
                .query_map(params![feature_id as i64], Self::build_step_from_row)
                .map_err(|e| EngineError::database_error("Failed to query steps", e))?
                .collect::<std::result::Result<Vec<Step>, _>>()
                .map_err(|e| EngineError::database_error("Failed to fetch steps", e))?;
            steps
        };

        // Park every order at a unique negative value so reassignment
        // below never trips the (feature_id, step_order) constraint.
        tx.execute(SHIFT_ORDERS_NEGATIVE_SQL, params![feature_id as i64])
            .map_err(|e| EngineError::database_error("Failed to stage step orders", e))?;

        let mut by_description: HashMap<&str, Vec<&Step>> = HashMap::new();
        for step in existing.iter().rev() {
            by_description
                .entry(step.description.as_str())
                .or_default()
                .push(step);
        }

        let now = Timestamp::now();
        let now_str = now.to_string();
        let mut matched_ids = Vec::new();
        let mut active_assigned = false;

        for (index, decl) in declared.iter().enumerate() {
            // A declaration without a status leaves a matched step's
            // status alone; the declared plan may name at most one
            // active step.
            let declared_status = match decl.status {
                Some(StepStatus::InProgress) if active_assigned => Some(StepStatus::Pending),
                Some(status) => {
                    if status == StepStatus::InProgress {
                        active_assigned = true;
                    }
                    Some(status)
                }
                None => None,
            };

            match by_description
                .get_mut(decl.description.as_str())
                .and_then(Vec::pop)
            {
                Some(step) => {
                    matched_ids.push(step.id);
                    let status = match declared_status {
                        Some(declared) if step.status.can_transition_to(declared) => declared,
                        Some(declared) => {
                            log::warn!(
                                "step {}: keeping status {} over declared {}",
                                step.id,
                                step.status.as_str(),
                                declared.as_str()
                            );
                            step.status
                        }
                        None => step.status,
                    };
                    let (started_at, completed_at) =
                        Self::stamp_transition(step.status, status, step, now);
                    let tools = join_tools(if decl.expected_tools.is_empty() {
                        &step.expected_tools
                    } else {
                        &decl.expected_tools
                    });
                    tx.execute(
                        UPDATE_SYNCED_STEP_SQL,
                        params![
                            status.as_str(),
                            index as i64,
                            tools,
                            started_at.map(|t| t.to_string()),
                            completed_at.map(|t| t.to_string()),
                            &now_str,
                            step.id as i64
                        ],
                    )
                    .map_err(|e| EngineError::database_error("Failed to update synced step", e))?;
                }
                None => {
                    let status = declared_status.unwrap_or(StepStatus::Pending);
                    let started_at = (status == StepStatus::InProgress).then_some(now);
                    let completed_at = (status == StepStatus::Completed).then_some(now);
                    tx.execute(
                        INSERT_STEP_SQL,
                        params![
                            feature_id as i64,
                            &decl.description,
                            status.as_str(),
                            index as i64,
                            join_tools(&decl.expected_tools),
                            started_at.map(|t| t.to_string()),
                            completed_at.map(|t| t.to_string()),
                            &now_str,
                            &now_str
                        ],
                    )
                    .map_err(|e| EngineError::database_error("Failed to insert step", e))?;
                }
            }
        }

        // Steps dropped from the plan are parked after the declared
        // list, in their previous relative order.
        let mut next_order = declared.len() as i64;
        for step in &existing {
            if matched_ids.contains(&step.id) {
                continue;
            }
            let status = if step.status.is_terminal() {
                step.status
            } else {
                StepStatus::Skipped
            };
            tx.execute(
                UPDATE_SYNCED_STEP_SQL,
                params![
                    status.as_str(),
                    next_order,
                    join_tools(&step.expected_tools),
                    step.started_at.map(|t| t.to_string()),
                    step.completed_at.map(|t| t.to_string()),
                    &now_str,
                    step.id as i64
                ],
            )
            .map_err(|e| EngineError::database_error("Failed to park dropped step", e))?;
            next_order += 1;
        }

        tx.commit().db_context("Failed to commit transaction")?;

        self.get_steps(feature_id)
    }

    /// Updates a step's status after validating the transition.
    ///
    /// Entering in-progress demotes sibling in-progress steps in the same
    /// transaction so the single-active invariant holds. The final write
    /// is conditional on the status read at the start; concurrent writers
    /// resolve last-committer-wins at the row level.
    pub fn update_step_status(&mut self, step_id: u64, status: StepStatus) -> Result<Step> {
        let tx = self
            .connection
            .transaction()
            .db_context("Failed to begin transaction")?;

        let sql = format!("SELECT {STEP_COLUMNS} FROM steps WHERE id = ?1");
        let step = tx
            .query_row(&sql, params![step_id as i64], Self::build_step_from_row)
            .optional()
            .map_err(|e| EngineError::database_error("Failed to query step", e))?
            .ok_or(EngineError::StepNotFound { id: step_id })?;

        if !step.status.can_transition_to(status) {
            return Err(EngineError::InvalidTransition {
                from: step.status.as_str().to_string(),
                to: status.as_str().to_string(),
            });
        }

        let now = Timestamp::now();
        let now_str = now.to_string();

        if status == StepStatus::InProgress {
            tx.execute(
                DEMOTE_SIBLING_STEPS_SQL,
                params![&now_str, step.feature_id as i64, step_id as i64],
            )
            .map_err(|e| EngineError::database_error("Failed to demote sibling steps", e))?;
        }

        let (started_at, completed_at) = Self::stamp_transition(step.status, status, &step, now);
        let changed = tx
            .execute(
                UPDATE_STEP_STATUS_CLAIMED_SQL,
                params![
                    status.as_str(),
                    started_at.map(|t| t.to_string()),
                    completed_at.map(|t| t.to_string()),
                    &now_str,
                    step_id as i64,
                    step.status.as_str()
                ],
            )
            .map_err(|e| EngineError::database_error("Failed to update step status", e))?;
        if changed == 0 {
            log::debug!("step {step_id} changed concurrently; keeping the other writer's status");
        }

        let updated = tx
            .query_row(&sql, params![step_id as i64], Self::build_step_from_row)
            .map_err(|e| EngineError::database_error("Failed to query updated step", e))?;

        tx.commit().db_context("Failed to commit transaction")?;
        Ok(updated)
    }

    /// Completes a step and promotes the next pending step of the same
    /// feature, both in one transaction. Returns the completed step and
    /// the newly active one, if any.
    pub fn complete_step_and_advance(&mut self, step_id: u64) -> Result<(Step, Option<Step>)> {
        let tx = self
            .connection
            .transaction()
            .db_context("Failed to begin transaction")?;

        let sql = format!("SELECT {STEP_COLUMNS} FROM steps WHERE id = ?1");
        let step = tx
            .query_row(&sql, params![step_id as i64], Self::build_step_from_row)
            .optional()
            .map_err(|e| EngineError::database_error("Failed to query step", e))?
            .ok_or(EngineError::StepNotFound { id: step_id })?;

        if !step.status.can_transition_to(StepStatus::Completed) {
            return Err(EngineError::InvalidTransition {
                from: step.status.as_str().to_string(),
                to: StepStatus::Completed.as_str().to_string(),
            });
        }

        let now = Timestamp::now();
        let now_str = now.to_string();
        let (started_at, completed_at) =
            Self::stamp_transition(step.status, StepStatus::Completed, &step, now);
        tx.execute(
            UPDATE_STEP_STATUS_CLAIMED_SQL,
            params![
                StepStatus::Completed.as_str(),
                started_at.map(|t| t.to_string()),
                completed_at.map(|t| t.to_string()),
                &now_str,
                step_id as i64,
                step.status.as_str()
            ],
        )
        .map_err(|e| EngineError::database_error("Failed to complete step", e))?;

        let next = Self::promote_next_pending(&tx, step.feature_id, now)?;

        let completed = tx
            .query_row(&sql, params![step_id as i64], Self::build_step_from_row)
            .map_err(|e| EngineError::database_error("Failed to query completed step", e))?;

        tx.commit().db_context("Failed to commit transaction")?;
        Ok((completed, next))
    }

    fn promote_next_pending(
        tx: &Transaction,
        feature_id: u64,
        now: Timestamp,
    ) -> Result<Option<Step>> {
        let sql = format!(
            "SELECT {STEP_COLUMNS} FROM steps \
             WHERE feature_id = ?1 AND status = 'pending' ORDER BY step_order LIMIT 1"
        );
        let next = tx
            .query_row(&sql, params![feature_id as i64], Self::build_step_from_row)
            .optional()
            .map_err(|e| EngineError::database_error("Failed to query next pending step", e))?;

        let Some(next) = next else {
            return Ok(None);
        };

        let now_str = now.to_string();
        tx.execute(
            UPDATE_STEP_STATUS_CLAIMED_SQL,
            params![
                StepStatus::InProgress.as_str(),
                Some(now.to_string()),
                None::<String>,
                &now_str,
                next.id as i64,
                StepStatus::Pending.as_str()
            ],
        )
        .map_err(|e| EngineError::database_error("Failed to promote next step", e))?;

        let sql = format!("SELECT {STEP_COLUMNS} FROM steps WHERE id = ?1");
        tx.query_row(&sql, params![next.id as i64], Self::build_step_from_row)
            .optional()
            .map_err(|e| EngineError::database_error("Failed to query promoted step", e))
    }

    /// Timestamps to store for a status transition: started when entering
    /// in-progress the first time, completed when entering completed.
    fn stamp_transition(
        from: StepStatus,
        to: StepStatus,
        step: &Step,
        now: Timestamp,
    ) -> (Option<Timestamp>, Option<Timestamp>) {
        let started_at = if to == StepStatus::InProgress && step.started_at.is_none() {
            Some(now)
        } else {
            step.started_at
        };
        let completed_at = if to == StepStatus::Completed && from != StepStatus::Completed {
            Some(now)
        } else if to == StepStatus::Completed {
            step.completed_at
        } else {
            None
        };
        (started_at, completed_at)
    }
}

fn join_tools(tools: &[String]) -> Option<String> {
    if tools.is_empty() {
        None
    } else {
        Some(tools.join(","))
    }
}
