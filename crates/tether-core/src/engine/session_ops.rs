//! Session activity queries for the Engine.

use jiff::Timestamp;
use tokio::task;

use super::{join_error, Engine};
use crate::{
    db::Database,
    display::SessionGroupList,
    error::Result,
    models::Event,
    params::SessionsQuery,
    sessions::group_sessions,
};

impl Engine {
    /// Groups recent events into per-session activity groups,
    /// active-first.
    pub async fn session_groups(&self, params: &SessionsQuery) -> Result<SessionGroupList> {
        let db_path = self.db_path.clone();
        let config = self.config.grouper();
        let project = params.project.clone();
        let limit = params.limit;

        task::spawn_blocking(move || {
            let db = Database::new(&db_path)?;
            let resolved = project
                .as_deref()
                .map(|p| Database::ensure_absolute_project(Some(p)))
                .transpose()?;
            let events = db.get_events_for_grouping(resolved.as_deref(), limit)?;
            let now = Timestamp::now();
            Ok(SessionGroupList {
                now,
                groups: group_sessions(&events, now, &config),
            })
        })
        .await
        .map_err(join_error)?
    }

    /// Raw recent events for a project, oldest first. The watch poller
    /// folds these incrementally instead of regrouping from scratch.
    pub async fn events_for_grouping(
        &self,
        project: Option<String>,
        limit: usize,
    ) -> Result<Vec<Event>> {
        let db_path = self.db_path.clone();

        task::spawn_blocking(move || {
            let db = Database::new(&db_path)?;
            let resolved = project
                .as_deref()
                .map(|p| Database::ensure_absolute_project(Some(p)))
                .transpose()?;
            db.get_events_for_grouping(resolved.as_deref(), limit)
        })
        .await
        .map_err(join_error)?
    }
}
