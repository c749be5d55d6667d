//! Display formatting for engine output.
//!
//! Domain models carry their own `Display` implementations here, and
//! report wrappers compose them for the CLI views (status, plan,
//! sessions, checkpoint). All formatters produce markdown for rich
//! terminal rendering; presentation stays out of the models themselves.

pub mod datetime;
pub mod models;
pub mod reports;

// Re-export commonly used types for convenience
pub use datetime::LocalDateTime;
pub use reports::{CheckpointOutcome, FeatureList, PlanProgress, SessionGroupList, StatusReport};
