//! Plan and step operations for the Engine.

use tokio::task;

use super::{join_error, Engine};
use crate::{
    db::Database,
    display::PlanProgress,
    error::{EngineError, Result},
    models::{Step, StepStatus},
    params::{Id, StatusQuery, SyncPlan},
};

impl Engine {
    /// Synchronizes a feature's plan with a declared step list.
    ///
    /// The target feature is the explicit `feature_id` if given, else
    /// the project's active feature. Declaring a plan with no active
    /// feature is an input error; the caller should create or activate
    /// one first.
    pub async fn sync_plan(&self, params: &SyncPlan) -> Result<PlanProgress> {
        let db_path = self.db_path.clone();
        let params = params.clone();

        task::spawn_blocking(move || {
            let mut db = Database::new(&db_path)?;
            let feature = match params.feature_id {
                Some(id) => db
                    .get_feature(id)?
                    .ok_or(EngineError::FeatureNotFound { id })?,
                None => {
                    let project = Database::ensure_absolute_project(params.project.as_deref())?;
                    db.get_active_feature(&project)?.ok_or_else(|| {
                        EngineError::invalid_input("feature_id")
                            .with_reason("No active feature; declare or activate one first")
                    })?
                }
            };

            let steps = db.sync_steps(feature.id, &params.steps)?;
            Ok(PlanProgress { feature, steps })
        })
        .await
        .map_err(join_error)?
    }

    /// Returns the active feature's plan, or `None` when the project
    /// has no active feature.
    pub async fn plan(&self, params: &StatusQuery) -> Result<Option<PlanProgress>> {
        let db_path = self.db_path.clone();
        let project = params.project.clone();

        task::spawn_blocking(move || {
            let db = Database::new(&db_path)?;
            let resolved = Database::ensure_absolute_project(project.as_deref())?;
            let Some(feature) = db.get_active_feature(&resolved)? else {
                return Ok(None);
            };
            let steps = db.get_steps(feature.id)?;
            Ok(Some(PlanProgress { feature, steps }))
        })
        .await
        .map_err(join_error)?
    }

    /// Sets one step's status, validating the transition.
    pub async fn update_step_status(&self, params: &Id, status: StepStatus) -> Result<Step> {
        let db_path = self.db_path.clone();
        let step_id = params.id;

        task::spawn_blocking(move || {
            let mut db = Database::new(&db_path)?;
            db.update_step_status(step_id, status)
        })
        .await
        .map_err(join_error)?
    }
}
