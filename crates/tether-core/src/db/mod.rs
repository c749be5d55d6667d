//! Database operations and SQLite management for the alignment engine.
//!
//! This module provides low-level database operations for the Tether
//! event store. It handles SQLite database connections, schema management,
//! and provides specialized query interfaces for features, steps, events,
//! and nudges.

use std::path::Path;

use rusqlite::Connection;

use crate::error::{DatabaseResultExt, Result};

pub mod event_queries;
pub mod feature_queries;
pub mod migrations;
pub mod nudge_queries;
pub mod step_queries;
pub mod utils;

pub use event_queries::NewEvent;

/// Database connection and operations handler.
pub struct Database {
    connection: Connection,
}

impl Database {
    /// Creates a new database connection and initializes the schema.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let connection = Connection::open(path).db_context("Failed to open database connection")?;

        let db = Self { connection };
        db.initialize_schema()?;
        Ok(db)
    }
}
