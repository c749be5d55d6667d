//! Report wrappers for the engine's read operations.
//!
//! Each wrapper owns the data its view needs and implements `Display`,
//! so the CLI can render any operation result uniformly.

use std::fmt;

use jiff::Timestamp;
use serde::Serialize;

use super::datetime::RelativeAge;
use crate::{
    models::{Feature, FeatureStats, Step, StepStatus},
    sessions::SessionGroup,
};

/// Project status view: active feature, aggregate counts, active step.
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub project: String,
    pub feature: Option<Feature>,
    pub stats: FeatureStats,
    pub active_step: Option<Step>,
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# Status: {}", self.project)?;
        writeln!(f)?;
        match &self.feature {
            Some(feature) => {
                writeln!(f, "Active feature: **{}** (ID: {})", feature.description, feature.id)?;
            }
            None => writeln!(f, "No active feature. Work is tracked as session work.")?,
        }
        match &self.active_step {
            Some(step) => writeln!(f, "Current step: {}", step.description)?,
            None => writeln!(f, "Current step: none")?,
        }
        writeln!(f)?;
        writeln!(
            f,
            "Features: {} total, {} complete, {} in progress ({}%)",
            self.stats.total,
            self.stats.completed,
            self.stats.in_progress,
            self.stats.percentage()
        )
    }
}

/// Plan view: a feature and its ordered steps with progress counts.
#[derive(Debug, Clone)]
pub struct PlanProgress {
    pub feature: Feature,
    pub steps: Vec<Step>,
}

impl PlanProgress {
    /// Completed steps over countable (non-skipped) steps.
    pub fn progress(&self) -> (usize, usize) {
        let completed = self
            .steps
            .iter()
            .filter(|step| step.status == StepStatus::Completed)
            .count();
        let countable = self
            .steps
            .iter()
            .filter(|step| step.status != StepStatus::Skipped)
            .count();
        (completed, countable)
    }
}

impl fmt::Display for PlanProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (completed, total) = self.progress();
        writeln!(
            f,
            "# Plan: {} ({completed}/{total})",
            self.feature.description
        )?;
        writeln!(f)?;
        if self.steps.is_empty() {
            writeln!(f, "No steps declared for this feature.")?;
        } else {
            for step in &self.steps {
                write!(f, "{step}")?;
            }
        }
        Ok(())
    }
}

/// Feature listing for one project, sentinel last.
#[derive(Debug, Clone)]
pub struct FeatureList {
    pub project: String,
    pub features: Vec<Feature>,
}

impl fmt::Display for FeatureList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# Features: {}", self.project)?;
        writeln!(f)?;
        if self.features.is_empty() {
            writeln!(f, "No features declared.")?;
            return Ok(());
        }
        for feature in &self.features {
            let marker = if feature.is_session_work {
                "·"
            } else {
                match feature.status {
                    crate::models::FeatureStatus::InProgress => "➤",
                    crate::models::FeatureStatus::Complete => "✓",
                    crate::models::FeatureStatus::Blocked => "✗",
                    crate::models::FeatureStatus::Pending => "○",
                }
            };
            writeln!(
                f,
                "{} {}. {} [{}] ({} events)",
                marker, feature.id, feature.description, feature.status, feature.work_count
            )?;
        }
        Ok(())
    }
}

/// Session dashboard view, active groups first.
#[derive(Debug, Clone)]
pub struct SessionGroupList {
    pub now: Timestamp,
    pub groups: Vec<SessionGroup>,
}

impl fmt::Display for SessionGroupList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# Sessions")?;
        writeln!(f)?;
        if self.groups.is_empty() {
            writeln!(f, "No sessions observed.")?;
            return Ok(());
        }
        for group in &self.groups {
            let liveness = format!("{:?}", group.liveness).to_lowercase();
            writeln!(
                f,
                "[{liveness}] {} — {} events, last activity {} ago ({})",
                group.session_id,
                group.event_count,
                RelativeAge {
                    at: group.last_activity,
                    now: self.now,
                },
                group.project
            )?;
        }
        Ok(())
    }
}

/// Result of a checkpoint report.
#[derive(Debug, Clone, Serialize)]
pub struct CheckpointOutcome {
    /// Step confirmed complete by this checkpoint, if any
    pub completed: Option<Step>,
    /// Step promoted to in-progress by this checkpoint, if any
    pub activated: Option<Step>,
    /// Completed and countable step totals after the checkpoint
    pub progress: Option<(usize, usize)>,
    /// Advisory warnings raised while reconciling the report
    pub warnings: Vec<String>,
}

impl fmt::Display for CheckpointOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(step) = &self.completed {
            writeln!(f, "Completed: {}", step.description)?;
        }
        if let Some(step) = &self.activated {
            writeln!(f, "Now active: {}", step.description)?;
        }
        if let Some((completed, total)) = self.progress {
            writeln!(f, "Progress: {completed}/{total} steps")?;
        }
        for warning in &self.warnings {
            writeln!(f, "Warning: {warning}")?;
        }
        if self.completed.is_none() && self.activated.is_none() && self.warnings.is_empty() {
            writeln!(f, "Checkpoint recorded; nothing to update.")?;
        }
        Ok(())
    }
}
