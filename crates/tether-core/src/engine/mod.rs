//! High-level async facade over the alignment engine.
//!
//! The [`Engine`] is the entry point for everything a caller does:
//! observing one intercepted tool call, reconciling a checkpoint report,
//! managing features and plans, and querying session activity. Each
//! operation opens its own database connection on a blocking worker
//! thread, so the engine itself is cheap to clone around and holds no
//! open handles.
//!
//! ```text
//! ┌──────────────┐    ┌──────────────────┐    ┌─────────────────┐
//! │   Observe /  │    │  Scorers & nudge  │    │    Database     │
//! │  checkpoint  │───▶│   coordination    │───▶│    (via db/)    │
//! │   pipeline   │    │ (scoring, nudges) │    │                 │
//! └──────────────┘    └──────────────────┘    └─────────────────┘
//! ```
//!
//! ## Submodules
//!
//! - [`builder`]: factory for creating [`Engine`] instances
//! - [`observe`]: the per-event observation pipeline and its fail-open
//!   wrapper
//! - [`checkpoint`]: self-reported progress reconciliation
//! - [`feature_ops`]: feature CRUD and the status view
//! - [`step_ops`]: plan declaration and progress queries
//! - [`session_ops`]: session grouping and recent-event queries

use std::path::PathBuf;

use crate::{
    error::EngineError,
    nudges::NudgeConfig,
    sessions::GrouperConfig,
    stuckness::StucknessConfig,
};

pub mod builder;
pub mod checkpoint;
pub mod feature_ops;
pub mod observe;
pub mod session_ops;
pub mod step_ops;

pub use builder::EngineBuilder;
pub use observe::Observation;

/// Tunable thresholds for every advisory signal the engine emits.
///
/// Defaults match the documented behavior; the CLI exposes only the
/// database path, so in practice this changes under test.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Minutes without a successful file change before "no recent
    /// progress" fires
    pub no_progress_minutes: i64,
    /// How many recent events the repeated-pattern check inspects
    pub pattern_window: usize,
    /// Repeats of a (tool, similar-arguments) pair that count as a loop
    pub pattern_repeats: usize,
    /// Minutes an in-progress step may stall before it reports stuck
    pub step_stall_minutes: i64,
    /// Minimum events linked to a step before stalling is excused
    pub step_stall_min_events: i64,
    /// Minutes of silence before a session classifies as stale
    pub staleness_minutes: i64,
    /// Maximum events for the automated-session reclassification
    pub automated_max_events: usize,
    /// Successful file changes since the last commit that trigger the
    /// commit reminder
    pub commit_reminder_threshold: i64,
    /// Unattributed events per session that trigger the accumulator
    /// nudge
    pub session_work_threshold: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let stuckness = StucknessConfig::default();
        let grouper = GrouperConfig::default();
        let nudges = NudgeConfig::default();
        Self {
            no_progress_minutes: stuckness.no_progress_minutes,
            pattern_window: stuckness.pattern_window,
            pattern_repeats: stuckness.pattern_repeats,
            step_stall_minutes: stuckness.step_stall_minutes,
            step_stall_min_events: stuckness.step_stall_min_events,
            staleness_minutes: grouper.staleness_minutes,
            automated_max_events: grouper.automated_max_events,
            commit_reminder_threshold: nudges.commit_reminder_threshold,
            session_work_threshold: nudges.session_work_threshold,
        }
    }
}

impl EngineConfig {
    pub(crate) fn stuckness(&self) -> StucknessConfig {
        StucknessConfig {
            no_progress_minutes: self.no_progress_minutes,
            pattern_window: self.pattern_window,
            pattern_repeats: self.pattern_repeats,
            step_stall_minutes: self.step_stall_minutes,
            step_stall_min_events: self.step_stall_min_events,
        }
    }

    pub(crate) fn grouper(&self) -> GrouperConfig {
        GrouperConfig {
            staleness_minutes: self.staleness_minutes,
            automated_max_events: self.automated_max_events,
        }
    }

    pub(crate) fn nudges(&self) -> NudgeConfig {
        NudgeConfig {
            commit_reminder_threshold: self.commit_reminder_threshold,
            session_work_threshold: self.session_work_threshold,
        }
    }
}

/// Main engine interface for observation and plan management.
#[derive(Clone)]
pub struct Engine {
    pub(crate) db_path: PathBuf,
    pub(crate) config: EngineConfig,
}

impl Engine {
    /// Creates a new engine over the given database path.
    pub(crate) fn new(db_path: PathBuf, config: EngineConfig) -> Self {
        Self { db_path, config }
    }
}

/// Maps a blocking-task join failure into the engine's error type.
pub(crate) fn join_error(e: tokio::task::JoinError) -> EngineError {
    EngineError::Configuration {
        message: format!("Task join error: {e}"),
    }
}
