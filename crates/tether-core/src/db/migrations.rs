//! Database schema initialization and migrations.

use crate::error::{DatabaseResultExt, EngineError, Result};

impl super::Database {
    /// Initializes the database schema using the embedded SQL file.
    pub(super) fn initialize_schema(&self) -> Result<()> {
        // Enable foreign keys for this connection
        self.connection
            .execute("PRAGMA foreign_keys = ON", [])
            .db_context("Failed to enable foreign keys")?;

        // Execute the schema SQL
        let schema_sql = include_str!("../../assets/schema.sql");
        self.connection
            .execute_batch(schema_sql)
            .db_context("Failed to initialize database schema")?;

        // Apply migrations for existing databases
        self.apply_migrations()?;

        Ok(())
    }

    /// Apply database migrations for existing databases
    fn apply_migrations(&self) -> Result<()> {
        // Check if expected_tools column exists in steps table
        let has_expected_tools: bool = self
            .connection
            .query_row(
                "SELECT COUNT(*) FROM pragma_table_info('steps') WHERE name = 'expected_tools'",
                [],
                |row| row.get(0),
            )
            .map(|count: i64| count > 0)
            .unwrap_or(false);

        if !has_expected_tools {
            self.connection
                .execute("ALTER TABLE steps ADD COLUMN expected_tools TEXT", [])
                .map_err(|e| {
                    EngineError::database_error(
                        "Failed to add expected_tools column to steps table",
                        e,
                    )
                })?;
        }

        // Check if drift_flagged column exists in events table
        let has_drift_flagged: bool = self
            .connection
            .query_row(
                "SELECT COUNT(*) FROM pragma_table_info('events') WHERE name = 'drift_flagged'",
                [],
                |row| row.get(0),
            )
            .map(|count: i64| count > 0)
            .unwrap_or(false);

        if !has_drift_flagged {
            self.connection
                .execute(
                    "ALTER TABLE events ADD COLUMN drift_flagged INTEGER NOT NULL DEFAULT 0",
                    [],
                )
                .map_err(|e| {
                    EngineError::database_error(
                        "Failed to add drift_flagged column to events table",
                        e,
                    )
                })?;
        }

        Ok(())
    }
}
