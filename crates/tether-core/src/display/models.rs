//! Display implementations for domain models.
//!
//! This module contains all Display trait implementations for the core
//! domain models, separated from the model definitions to maintain clean
//! separation of concerns.
//!
//! The Display implementations provide:
//! - Markdown-formatted output for rich terminal display
//! - Consistent formatting with status icons and structured sections

use std::fmt;

use super::datetime::LocalDateTime;
use crate::models::{
    Event, Feature, FeatureCategory, FeatureStatus, SessionStatus, Step, StepStatus,
};

impl fmt::Display for FeatureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Display for FeatureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "## {}. {}", self.id, self.description)?;
        writeln!(f)?;
        writeln!(f, "- Status: {}", self.status)?;
        writeln!(f, "- Category: {}", self.category)?;
        if self.is_session_work {
            writeln!(f, "- Session work sentinel")?;
        } else {
            writeln!(f, "- Priority: {}", self.priority)?;
        }
        writeln!(f, "- Work events: {}", self.work_count)?;
        writeln!(f, "- Created: {}", LocalDateTime(&self.created_at))?;
        if let Some(completed) = &self.completed_at {
            writeln!(f, "- Completed: {}", LocalDateTime(completed))?;
        }
        Ok(())
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}. [{}] {}",
            self.order + 1,
            self.status.with_icon(),
            self.description
        )?;
        if !self.expected_tools.is_empty() {
            write!(f, " ({})", self.expected_tools.join(", "))?;
        }
        writeln!(f)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}",
            LocalDateTime(&self.timestamp),
            self.event_type.as_str()
        )?;
        if let Some(tool) = &self.tool_name {
            write!(f, " {tool}")?;
        }
        if let Some(summary) = &self.summary {
            write!(f, ": {summary}")?;
        }
        if !self.success {
            write!(f, " (failed)")?;
        }
        writeln!(f)
    }
}
