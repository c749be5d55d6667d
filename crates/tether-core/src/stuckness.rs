//! Stuckness detection over recent session activity.
//!
//! Three conditions are checked in priority order and the first match wins:
//! no recent successful file change, a repeated tool-call pattern, and a
//! stalled in-progress step. All checks are pure functions over data the
//! caller has already fetched, which keeps them clock-injectable for tests.

use jiff::{SignedDuration, Timestamp};

/// Tools whose successful calls count as forward progress.
pub const FILE_MODIFYING_TOOLS: &[&str] = &["Edit", "Write", "MultiEdit", "NotebookEdit"];

/// How many leading characters of an event's activity text form its
/// pattern digest.
const PATTERN_DIGEST_LEN: usize = 100;

/// Thresholds for stuckness detection.
#[derive(Debug, Clone)]
pub struct StucknessConfig {
    /// Minutes without a successful file change before flagging
    pub no_progress_minutes: i64,
    /// How many recent events the repetition check inspects
    pub pattern_window: usize,
    /// Calls of one tool within the window that count as repetition
    pub pattern_repeats: usize,
    /// Minutes an in-progress step may stall before flagging
    pub step_stall_minutes: i64,
    /// Steps with at least this many events are never considered stalled
    pub step_stall_min_events: i64,
}

impl Default for StucknessConfig {
    fn default() -> Self {
        Self {
            no_progress_minutes: 3,
            pattern_window: 10,
            pattern_repeats: 3,
            step_stall_minutes: 10,
            step_stall_min_events: 3,
        }
    }
}

/// Slim view of a recent event used by the repetition check.
#[derive(Debug, Clone)]
pub struct RecentActivity {
    /// Tool name, when the event was a tool call
    pub tool_name: Option<String>,
    /// Activity text the digest is derived from
    pub activity: String,
}

impl RecentActivity {
    fn digest(&self) -> &str {
        let end = self
            .activity
            .char_indices()
            .nth(PATTERN_DIGEST_LEN)
            .map_or(self.activity.len(), |(i, _)| i);
        &self.activity[..end]
    }
}

/// Slim view of the active step used by the stall check.
#[derive(Debug, Clone)]
pub struct ActiveStepActivity {
    /// Step description, quoted in the stall reason
    pub description: String,
    /// When the step entered in-progress
    pub started_at: Option<Timestamp>,
    /// How many events have been recorded under the step
    pub event_count: i64,
}

/// Checks the session for stuckness.
///
/// `last_progress` is the timestamp of the most recent successful
/// file-modifying event, `recent` the last `pattern_window` events (order
/// does not matter), and `active_step` the current in-progress step, if
/// any. Returns `(true, reason)` on the first matching condition,
/// `(false, "")` otherwise.
pub fn detect_stuckness(
    last_progress: Option<Timestamp>,
    recent: &[RecentActivity],
    active_step: Option<&ActiveStepActivity>,
    now: Timestamp,
    config: &StucknessConfig,
) -> (bool, String) {
    let progress_threshold = SignedDuration::from_secs(config.no_progress_minutes * 60);
    match last_progress {
        None => {
            if !recent.is_empty() {
                return (true, "no successful file changes yet".to_string());
            }
        }
        Some(last) => {
            let elapsed = now.duration_since(last);
            if elapsed >= progress_threshold {
                let minutes = elapsed.as_secs() / 60;
                return (true, format!("no file changes for {minutes} minutes"));
            }
        }
    }

    if let Some((tool, count)) = repeated_pattern(recent, config) {
        return (true, format!("{tool} called {count}x with similar arguments"));
    }

    if let Some(step) = active_step {
        if let Some(started) = step.started_at {
            let active = now.duration_since(started);
            let stall_threshold = SignedDuration::from_secs(config.step_stall_minutes * 60);
            if active >= stall_threshold && step.event_count < config.step_stall_min_events {
                let minutes = active.as_secs() / 60;
                return (
                    true,
                    format!(
                        "step '{}' active for {} minutes with only {} events",
                        step.description, minutes, step.event_count
                    ),
                );
            }
        }
    }

    (false, String::new())
}

/// Finds a tool called at least `pattern_repeats` times in the window with
/// near-identical arguments, where near-identical means the activity
/// digests collapse to at most two distinct values.
fn repeated_pattern<'a>(
    recent: &'a [RecentActivity],
    config: &StucknessConfig,
) -> Option<(&'a str, usize)> {
    let window = &recent[..recent.len().min(config.pattern_window)];

    let mut tools: Vec<&str> = window
        .iter()
        .filter_map(|event| event.tool_name.as_deref())
        .collect();
    tools.sort_unstable();
    tools.dedup();

    for tool in tools {
        let calls: Vec<&RecentActivity> = window
            .iter()
            .filter(|event| event.tool_name.as_deref() == Some(tool))
            .collect();
        if calls.len() < config.pattern_repeats {
            continue;
        }

        let mut digests: Vec<&str> = calls.iter().map(|event| event.digest()).collect();
        digests.sort_unstable();
        digests.dedup();
        if digests.len() <= 2 {
            return Some((tool, calls.len()));
        }
    }

    None
}
