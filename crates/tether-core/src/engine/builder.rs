//! Builder for creating and configuring Engine instances.

use std::path::{Path, PathBuf};

use tokio::task;

use super::{join_error, Engine, EngineConfig};
use crate::{
    db::Database,
    error::{EngineError, Result},
};

/// Builder for creating and configuring Engine instances.
#[derive(Debug, Clone)]
pub struct EngineBuilder {
    database_path: Option<PathBuf>,
    config: EngineConfig,
}

impl EngineBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            database_path: None,
            config: EngineConfig::default(),
        }
    }

    /// Sets a custom database file path.
    ///
    /// If not specified, uses XDG Base Directory specification:
    /// `$XDG_DATA_HOME/tether/tether.db` or `~/.local/share/tether/tether.db`
    pub fn with_database_path<P: AsRef<Path>>(mut self, path: Option<P>) -> Self {
        if let Some(path) = path {
            self.database_path = Some(path.as_ref().to_path_buf());
        }
        self
    }

    /// Overrides the default advisory thresholds.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds the configured engine instance.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::FileSystem` if the database path is invalid
    /// Returns `EngineError::Database` if database initialization fails
    pub async fn build(self) -> Result<Engine> {
        let db_path = if let Some(path) = self.database_path {
            path
        } else {
            Self::default_database_path()?
        };

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| EngineError::FileSystem {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let db_path_clone = db_path.clone();
        task::spawn_blocking(move || {
            let _db = Database::new(&db_path_clone)?;
            Ok::<(), EngineError>(())
        })
        .await
        .map_err(join_error)??;

        Ok(Engine::new(db_path, self.config))
    }

    /// Returns the default database path following XDG Base Directory
    /// specification.
    fn default_database_path() -> Result<PathBuf> {
        xdg::BaseDirectories::with_prefix("tether")
            .place_data_file("tether.db")
            .map_err(|e| EngineError::XdgDirectory(e.to_string()))
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
