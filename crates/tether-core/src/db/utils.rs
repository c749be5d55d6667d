//! Database utility functions for project path handling.

use std::{env::current_dir, path::Path};

use crate::error::{EngineError, Result};

impl super::Database {
    /// Normalizes a path by resolving "." and ".." components without
    /// requiring the path to exist
    fn normalize_path(path: &Path) -> std::path::PathBuf {
        path.components()
            .fold(std::path::PathBuf::new(), |mut acc, component| {
                match component {
                    std::path::Component::CurDir => acc, // Skip "." components
                    std::path::Component::ParentDir => {
                        // Handle ".." by popping the last component if possible
                        acc.pop();
                        acc
                    }
                    _ => {
                        // Keep all other components (Normal, RootDir, Prefix)
                        acc.push(component);
                        acc
                    }
                }
            })
    }

    /// Ensures a project path is absolute. Converts relative paths to
    /// absolute using the current working directory; `None` means the
    /// current working directory itself.
    ///
    /// Every feature, event, and session row stores the project in this
    /// normalized form so lookups by path are exact string matches.
    pub(crate) fn ensure_absolute_project(project: Option<&str>) -> Result<String> {
        match project {
            Some(dir) => {
                let path = Path::new(dir);
                if path.is_absolute() {
                    Ok(dir.to_string())
                } else {
                    // Convert relative path to absolute
                    let cwd = current_dir().map_err(|_| EngineError::InvalidInput {
                        field: "project".to_string(),
                        reason: "Cannot resolve current working directory to make path absolute"
                            .to_string(),
                    })?;
                    let absolute_path = cwd.join(path);
                    let normalized_path = Self::normalize_path(&absolute_path);
                    normalized_path
                        .to_str()
                        .map(String::from)
                        .ok_or_else(|| EngineError::InvalidInput {
                            field: "project".to_string(),
                            reason: "Cannot convert path to string".to_string(),
                        })
                }
            }
            None => {
                // Use current working directory as default
                let cwd = current_dir().map_err(|_| EngineError::InvalidInput {
                    field: "project".to_string(),
                    reason: "Cannot determine current working directory".to_string(),
                })?;
                let normalized_cwd = Self::normalize_path(&cwd);
                normalized_cwd
                    .to_str()
                    .map(String::from)
                    .ok_or_else(|| EngineError::InvalidInput {
                        field: "project".to_string(),
                        reason: "Cannot convert path to string".to_string(),
                    })
            }
        }
    }
}
