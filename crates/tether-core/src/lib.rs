//! Core library for the Tether alignment and observability engine.
//!
//! Tether watches a coding agent's tool-call stream and judges whether
//! the activity stays aligned with a declared feature and its ordered
//! steps. It produces advisory signals only — drift warnings, stuckness
//! warnings, unattributed-work alerts — and never blocks the agent.
//!
//! The crate is organized leaves-first:
//!
//! - [`keywords`]: text → normalized token set, used by every scorer
//! - [`scoring`]: step-level drift and feature-level alignment scores
//! - [`stuckness`]: time- and pattern-based staleness detection
//! - [`sessions`]: groups the event log into per-session activity views
//! - [`nudges`]: per-session deduplicated advisory coordination
//! - [`db`]: SQLite persistence for features, steps, events, sessions,
//!   and nudge records
//! - [`engine`]: the async facade tying it all together, one
//!   observation per intercepted tool call
//!
//! # Quick Start
//!
//! ```rust
//! use tether_core::{EngineBuilder, params::HookInput};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = EngineBuilder::new()
//!     .with_database_path(Some("tether.db"))
//!     .build()
//!     .await?;
//!
//! // Observe one intercepted tool call. This never fails: store
//! // problems collapse to a neutral observation.
//! let input: HookInput = serde_json::from_str(
//!     r#"{"session_id": "s1", "tool_name": "Edit",
//!         "tool_input": {"file_path": "src/main.rs"}}"#,
//! )?;
//! let observation = engine.observe(input).await;
//! for advisory in &observation.advisories {
//!     println!("{advisory}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod db;
pub mod display;
pub mod engine;
pub mod error;
pub mod keywords;
pub mod models;
pub mod nudges;
pub mod params;
pub mod scoring;
pub mod sessions;
pub mod stuckness;

// Re-export commonly used types
pub use db::Database;
pub use display::{
    CheckpointOutcome, FeatureList, LocalDateTime, PlanProgress, SessionGroupList, StatusReport,
};
pub use engine::{Engine, EngineBuilder, EngineConfig, Observation};
pub use error::{EngineError, Result};
pub use models::{
    Event, EventType, Feature, FeatureCategory, FeatureStats, FeatureStatus, Session,
    SessionStatus, Step, StepStatus,
};
pub use params::{
    Checkpoint, CreateFeature, DeclaredStep, HookInput, Id, ListFeatures, SessionsQuery,
    StatusQuery, SyncPlan,
};
pub use sessions::{SeenEvents, SessionGroup, SessionGrouper, SessionLiveness};
