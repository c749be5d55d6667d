//! Data models for features, steps, events, and sessions.
//!
//! This module contains the core domain models of the Tether alignment
//! engine. Display implementations for these models live in
//! [`crate::display`] to keep data structures separate from presentation
//! logic.
//!
//! The central types are:
//!
//! - [`Feature`]: a declared unit of work within a project, including the
//!   per-project "Session Work" sentinel that absorbs unattributed activity
//! - [`Step`]: an ordered plan entry belonging to a feature
//! - [`Event`]: one observed occurrence in an agent session (tool call,
//!   plan update, prompt, or session end)
//! - [`Session`]: a persisted agent session grouping events
//!
//! Status enumerations carry their own transition rules: see
//! [`StepStatus::can_transition_to`] and [`FeatureStatus::can_transition_to`].

pub mod event;
pub mod feature;
pub mod session;
pub mod status;
pub mod step;

#[cfg(test)]
mod tests;

// Re-export all public types at the models level
pub use event::Event;
pub use feature::{Feature, FeatureStats, SESSION_WORK_DESCRIPTION};
pub use session::Session;
pub use status::{EventType, FeatureCategory, FeatureStatus, SessionStatus, StepStatus};
pub use step::Step;
