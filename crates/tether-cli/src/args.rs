//! Command-line argument definitions using clap.
//!
//! Arg structs here carry the clap-specific surface (flags, aliases,
//! help text) and convert into the plain parameter structs of
//! `tether-core`, keeping the core types free of CLI concerns.

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use tether_core::params::{
    Checkpoint, CreateFeature, Id, ListFeatures, SessionsQuery, StatusQuery,
};

/// Main command-line interface for the Tether alignment engine
///
/// Tether observes a coding agent's tool-call stream and judges whether
/// the activity stays aligned with a declared feature and its plan. It
/// surfaces advisory drift, stuckness, and unattributed-work signals
/// without ever blocking the agent.
#[derive(Parser)]
#[command(version, about, name = "tether")]
pub struct Args {
    /// Path to the SQLite database file. Defaults to
    /// $XDG_DATA_HOME/tether/tether.db
    #[arg(long, global = true)]
    pub database_file: Option<PathBuf>,

    /// Disable colored output and use plain text
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands for the Tether CLI
#[derive(Subcommand)]
pub enum Commands {
    /// Observe one intercepted tool call read as JSON from stdin
    ///
    /// This is the hook entry point. It always exits 0 and always
    /// prints a well-formed response, even on malformed input.
    Hook,
    /// Show the active feature, progress counts, and current step
    #[command(alias = "st")]
    Status(StatusArgs),
    /// Show or declare the active feature's plan
    #[command(alias = "p")]
    Plan(PlanArgs),
    /// Report progress: a completed step and/or the current activity
    #[command(alias = "ck")]
    Checkpoint(CheckpointArgs),
    /// Manage features
    #[command(alias = "f")]
    Feature {
        #[command(subcommand)]
        command: FeatureCommands,
    },
    /// Show grouped session activity
    #[command(alias = "ss")]
    Sessions(SessionsArgs),
}

#[derive(Subcommand)]
pub enum FeatureCommands {
    /// Declare a new feature
    #[command(alias = "a")]
    Add(AddFeatureArgs),
    /// List the project's features
    #[command(aliases = ["l", "ls"])]
    List(ListFeaturesArgs),
    /// Make a feature the project's active one
    Activate(FeatureIdArgs),
    /// Mark a feature complete
    Complete(FeatureIdArgs),
}

/// Project-scoped query without further parameters
#[derive(ClapArgs)]
pub struct StatusArgs {
    /// Project path; defaults to the current working directory
    #[arg(long)]
    pub project: Option<String>,
}

impl From<StatusArgs> for StatusQuery {
    fn from(val: StatusArgs) -> Self {
        StatusQuery {
            project: val.project,
        }
    }
}

/// Show the plan, optionally re-declaring its step list first
#[derive(ClapArgs)]
pub struct PlanArgs {
    /// Project path; defaults to the current working directory
    #[arg(long)]
    pub project: Option<String>,

    /// Replace the declared step list (comma-separated descriptions).
    /// Existing steps keep their status; dropped ones become skipped.
    #[arg(long, value_delimiter = ',')]
    pub declare: Vec<String>,
}

/// Report progress against the declared plan
#[derive(ClapArgs)]
pub struct CheckpointArgs {
    /// Project path; defaults to the current working directory
    #[arg(long)]
    pub project: Option<String>,

    /// Description of a step that just finished; matched against the
    /// plan by containment
    #[arg(long)]
    pub step_completed: Option<String>,

    /// Free-text description of what is being worked on right now
    #[arg(long)]
    pub current_activity: Option<String>,
}

impl From<CheckpointArgs> for Checkpoint {
    fn from(val: CheckpointArgs) -> Self {
        Checkpoint {
            project: val.project,
            step_completed: val.step_completed,
            current_activity: val.current_activity,
        }
    }
}

/// Declare a new feature
#[derive(ClapArgs)]
pub struct AddFeatureArgs {
    /// Short description of the feature
    pub description: String,

    /// Project path; defaults to the current working directory
    #[arg(long)]
    pub project: Option<String>,

    /// Category of the work
    #[arg(short, long, value_enum, default_value_t = CategoryArg::Functional)]
    pub category: CategoryArg,

    /// Priority used for ordering, higher first
    #[arg(long, default_value_t = 0)]
    pub priority: i64,

    /// Make this the active feature immediately
    #[arg(long)]
    pub activate: bool,

    /// Initial plan steps as a comma-separated list of descriptions
    #[arg(long, value_delimiter = ',')]
    pub steps: Vec<String>,
}

impl From<AddFeatureArgs> for CreateFeature {
    fn from(val: AddFeatureArgs) -> Self {
        CreateFeature {
            description: val.description,
            project: val.project,
            category: Some(val.category.to_string()),
            priority: val.priority,
            activate: val.activate,
            steps: val.steps,
        }
    }
}

/// List the project's features
#[derive(ClapArgs)]
pub struct ListFeaturesArgs {
    /// Project path; defaults to the current working directory
    #[arg(long)]
    pub project: Option<String>,
}

impl From<ListFeaturesArgs> for ListFeatures {
    fn from(val: ListFeaturesArgs) -> Self {
        ListFeatures {
            project: val.project,
        }
    }
}

/// Operate on one feature by ID
#[derive(ClapArgs)]
pub struct FeatureIdArgs {
    /// Unique identifier of the feature
    pub id: u64,
}

impl From<FeatureIdArgs> for Id {
    fn from(val: FeatureIdArgs) -> Self {
        Id { id: val.id }
    }
}

/// Show grouped session activity
#[derive(ClapArgs)]
pub struct SessionsArgs {
    /// Project path; omit to show sessions across all projects
    #[arg(long)]
    pub project: Option<String>,

    /// Maximum number of recent events to group
    #[arg(long, default_value_t = 500)]
    pub limit: usize,

    /// Keep polling the store and refresh the view as events arrive
    #[arg(short, long)]
    pub watch: bool,

    /// Poll interval in seconds for --watch
    #[arg(long, default_value_t = 2)]
    pub interval: u64,
}

impl From<&SessionsArgs> for SessionsQuery {
    fn from(val: &SessionsArgs) -> Self {
        SessionsQuery {
            project: val.project.clone(),
            limit: val.limit,
        }
    }
}

/// Command-line argument representation of feature categories
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum CategoryArg {
    Functional,
    Infrastructure,
    Bugfix,
    Refactor,
    Documentation,
    Testing,
}

impl std::fmt::Display for CategoryArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CategoryArg::Functional => "functional",
            CategoryArg::Infrastructure => "infrastructure",
            CategoryArg::Bugfix => "bugfix",
            CategoryArg::Refactor => "refactor",
            CategoryArg::Documentation => "documentation",
            CategoryArg::Testing => "testing",
        };
        write!(f, "{name}")
    }
}
