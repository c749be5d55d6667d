//! Self-reported progress reconciliation.
//!
//! A checkpoint is the agent (or operator) telling the engine where it
//! thinks it is: optionally that a step finished, optionally what it is
//! doing right now. The engine reconciles that report against the
//! declared plan and answers with the new active step, progress counts,
//! and any advisory warnings.

use tokio::task;

use super::{join_error, Engine};
use crate::{
    db::Database,
    display::{CheckpointOutcome, PlanProgress},
    error::Result,
    keywords::{extract_keywords, overlap_ratio},
    models::{Feature, Step, StepStatus},
    params::Checkpoint,
    scoring,
};

impl Engine {
    /// Reconciles a checkpoint report against the declared plan.
    ///
    /// `step_completed` is matched against the feature's non-terminal
    /// steps by case-insensitive containment; a match completes that
    /// step and promotes the next pending one. `current_activity` is
    /// scored against the plan and adds a warning when it looks
    /// unrelated.
    pub async fn checkpoint(&self, params: &Checkpoint) -> Result<CheckpointOutcome> {
        let db_path = self.db_path.clone();
        let params = params.clone();

        task::spawn_blocking(move || {
            let mut db = Database::new(&db_path)?;
            run_checkpoint(&mut db, &params)
        })
        .await
        .map_err(join_error)?
    }
}

fn run_checkpoint(db: &mut Database, params: &Checkpoint) -> Result<CheckpointOutcome> {
    let project = Database::ensure_absolute_project(params.project.as_deref())?;
    let mut outcome = CheckpointOutcome {
        completed: None,
        activated: None,
        progress: None,
        warnings: Vec::new(),
    };

    let Some(feature) = db.get_active_feature(&project)? else {
        outcome
            .warnings
            .push("no active feature; checkpoint recorded against nothing".to_string());
        return Ok(outcome);
    };

    if let Some(report) = params.step_completed.as_deref() {
        match find_reported_step(db, feature.id, report)? {
            Some(step) => {
                let (completed, next) = db.complete_step_and_advance(step.id)?;
                outcome.completed = Some(completed);
                outcome.activated = next;
            }
            None => outcome.warnings.push(format!(
                "no open step matches '{report}'; plan left unchanged"
            )),
        }
    }

    if let Some(activity) = params.current_activity.as_deref() {
        check_activity(db, &feature, activity, &mut outcome)?;
    }

    let steps = db.get_steps(feature.id)?;
    if !steps.is_empty() {
        let plan = PlanProgress {
            feature: feature.clone(),
            steps,
        };
        outcome.progress = Some(plan.progress());
    }

    // Report the active step even when nothing advanced, so callers
    // always learn where the plan stands.
    if outcome.activated.is_none() {
        outcome.activated = db.get_active_step(feature.id)?;
    }

    Ok(outcome)
}

/// Finds the non-terminal step the report most plausibly names.
///
/// Containment is checked both ways so "CSV writer" matches the step
/// "Write CSV writer module" and vice versa. Lowest order wins on ties.
fn find_reported_step(db: &Database, feature_id: u64, report: &str) -> Result<Option<Step>> {
    let needle = report.trim().to_lowercase();
    if needle.is_empty() {
        return Ok(None);
    }

    let step = db
        .get_steps(feature_id)?
        .into_iter()
        .filter(|step| !step.status.is_terminal())
        .find(|step| {
            let description = step.description.to_lowercase();
            description.contains(&needle) || needle.contains(&description)
        });
    Ok(step)
}

/// Warns when the reported activity looks unrelated to the plan.
///
/// No tool is involved at a checkpoint, so only keyword overlap is
/// consulted, never the step's expected tools.
fn check_activity(
    db: &Database,
    feature: &Feature,
    activity: &str,
    outcome: &mut CheckpointOutcome,
) -> Result<()> {
    if let Some(step) = db.get_active_step(feature.id)? {
        if step.status == StepStatus::InProgress {
            let step_keywords = extract_keywords(&step.description);
            let activity_keywords = extract_keywords(activity);
            if overlap_ratio(&step_keywords, &activity_keywords) < 0.2 {
                outcome.warnings.push(format!(
                    "current activity may have drifted from '{}'",
                    step.description
                ));
            }
            return Ok(());
        }
    }

    let (alignment, reason) =
        scoring::score_feature_alignment(Some(&feature.description), activity);
    if scoring::feature_drift_score(alignment) >= scoring::DRIFT_WARNING_THRESHOLD {
        outcome.warnings.push(format!(
            "current activity looks unrelated to '{}' ({reason})",
            feature.description
        ));
    }
    Ok(())
}
