//! Feature operations for the Engine.

use tokio::task;

use super::{join_error, Engine};
use crate::{
    db::Database,
    display::{FeatureList, StatusReport},
    error::{EngineError, Result},
    models::{Feature, FeatureCategory},
    params::{CreateFeature, Id, ListFeatures, StatusQuery},
};

impl Engine {
    /// Declares a new feature, optionally with an initial plan and
    /// optionally activating it immediately.
    pub async fn create_feature(&self, params: &CreateFeature) -> Result<Feature> {
        let db_path = self.db_path.clone();
        let params = params.clone();

        let category = match params.category.as_deref() {
            Some(name) => name
                .parse::<FeatureCategory>()
                .map_err(|reason| EngineError::invalid_input("category").with_reason(reason))?,
            None => FeatureCategory::default(),
        };

        task::spawn_blocking(move || {
            let mut db = Database::new(&db_path)?;
            let feature = db.create_feature(
                params.project.as_deref(),
                &params.description,
                category,
                params.priority,
                params.activate,
            )?;

            if !params.steps.is_empty() {
                let declared: Vec<_> = params.steps.into_iter().map(Into::into).collect();
                db.sync_steps(feature.id, &declared)?;
            }

            Ok(feature)
        })
        .await
        .map_err(join_error)?
    }

    /// Lists all features of a project, sentinel last.
    pub async fn list_features(&self, params: &ListFeatures) -> Result<FeatureList> {
        let db_path = self.db_path.clone();
        let project = params.project.clone();

        task::spawn_blocking(move || {
            let db = Database::new(&db_path)?;
            let resolved = Database::ensure_absolute_project(project.as_deref())?;
            let features = db.list_features(Some(&resolved))?;
            Ok(FeatureList {
                project: resolved,
                features,
            })
        })
        .await
        .map_err(join_error)?
    }

    /// Makes the given feature the project's single active one.
    pub async fn activate_feature(&self, params: &Id) -> Result<Feature> {
        let db_path = self.db_path.clone();
        let feature_id = params.id;

        task::spawn_blocking(move || {
            let mut db = Database::new(&db_path)?;
            db.activate_feature(feature_id)
        })
        .await
        .map_err(join_error)?
    }

    /// Marks a feature complete.
    pub async fn complete_feature(&self, params: &Id) -> Result<Feature> {
        let db_path = self.db_path.clone();
        let feature_id = params.id;

        task::spawn_blocking(move || {
            let mut db = Database::new(&db_path)?;
            db.complete_feature(feature_id)
        })
        .await
        .map_err(join_error)?
    }

    /// Builds the project status view: active feature, aggregate
    /// counts, and the current step.
    pub async fn status(&self, params: &StatusQuery) -> Result<StatusReport> {
        let db_path = self.db_path.clone();
        let project = params.project.clone();

        task::spawn_blocking(move || {
            let db = Database::new(&db_path)?;
            let resolved = Database::ensure_absolute_project(project.as_deref())?;
            let feature = db.get_active_feature(&resolved)?;
            let stats = db.feature_stats(&resolved)?;
            let active_step = match &feature {
                Some(feature) => db.get_active_step(feature.id)?,
                None => None,
            };
            Ok(StatusReport {
                project: resolved,
                feature,
                stats,
                active_step,
            })
        })
        .await
        .map_err(join_error)?
    }
}
