//! Drift and alignment scoring.
//!
//! Scores express how far observed activity has wandered from the declared
//! plan. Step-level drift accumulates additive penalties (unexpected tool,
//! unrelated content, sustained mismatch history) and is clamped to 1.0.
//! Feature-level alignment is a coarser tiered score used when no step is
//! active. Both are advisory; nothing in the engine blocks on them.

use crate::{
    keywords::{extract_keywords, overlap_ratio},
    models::Step,
};

/// Drift scores at or above this value produce a warning advisory.
pub const DRIFT_WARNING_THRESHOLD: f64 = 0.7;

/// Penalty when the invoked tool is not in the step's expected set.
const TOOL_MISMATCH_PENALTY: f64 = 0.3;

/// Penalty when activity keywords share too little with the step's.
const CONTENT_MISMATCH_PENALTY: f64 = 0.4;

/// Penalty when most of the step's recent events were already mismatched.
const SUSTAINED_DRIFT_PENALTY: f64 = 0.3;

/// Keyword overlap ratio below which content counts as mismatched.
const CONTENT_MISMATCH_RATIO: f64 = 0.2;

/// How many of the step's preceding events are consulted for sustained
/// drift, and how many of them must be flagged.
const SUSTAINED_DRIFT_WINDOW: usize = 5;
const SUSTAINED_DRIFT_COUNT: usize = 3;

/// Result of scoring one event against the active step.
#[derive(Debug, Clone, PartialEq)]
pub struct DriftAssessment {
    /// Accumulated drift score in `[0.0, 1.0]`; higher means more drift
    pub score: f64,
    /// Human-readable explanation, `"aligned"` when nothing triggered
    pub reason: String,
    /// Whether the content-mismatch penalty applied; persisted on the
    /// event so later calls can evaluate sustained drift
    pub content_mismatch: bool,
}

impl DriftAssessment {
    /// An assessment that triggers a warning.
    pub fn warrants_warning(&self) -> bool {
        self.score >= DRIFT_WARNING_THRESHOLD
    }
}

/// Scores one observed tool call against the active step.
///
/// `recent_flags` holds the `drift_flagged` values of up to the last
/// [`SUSTAINED_DRIFT_WINDOW`] events recorded under the same step, most
/// recent first. The current event is not included; its own flag is the
/// `content_mismatch` field of the returned assessment.
pub fn score_step_drift(
    step: &Step,
    tool_name: Option<&str>,
    activity: &str,
    recent_flags: &[bool],
) -> DriftAssessment {
    let mut score = 0.0;
    let mut notes = Vec::new();

    if !step.expected_tools.is_empty() {
        let expected = tool_name.is_some_and(|name| {
            step.expected_tools.iter().any(|tool| tool == name)
        });
        if !expected {
            score += TOOL_MISMATCH_PENALTY;
            notes.push(format!(
                "unexpected tool: {}",
                tool_name.unwrap_or("(none)")
            ));
        }
    }

    let step_keywords = extract_keywords(&step.description);
    let activity_keywords = extract_keywords(activity);
    let ratio = overlap_ratio(&step_keywords, &activity_keywords);
    let content_mismatch = ratio < CONTENT_MISMATCH_RATIO;
    if content_mismatch {
        score += CONTENT_MISMATCH_PENALTY;
        notes.push("content unrelated to step".to_string());
    }

    let flagged = recent_flags
        .iter()
        .take(SUSTAINED_DRIFT_WINDOW)
        .filter(|f| **f)
        .count();
    if flagged >= SUSTAINED_DRIFT_COUNT {
        score += SUSTAINED_DRIFT_PENALTY;
        notes.push(format!("sustained drift ({flagged} events)"));
    }

    let reason = if notes.is_empty() {
        "aligned".to_string()
    } else {
        notes.join("; ")
    };

    DriftAssessment {
        score: score.min(1.0),
        reason,
        content_mismatch,
    }
}

/// Scores activity against a feature description when no step is active.
///
/// Returns `(score, reason)` where the score is 1.0 for aligned or
/// unattributable activity and drops through 0.7 and 0.4 tiers as keyword
/// overlap thins out. Sentinel features never score below 1.0 since they
/// have no meaningful description to match.
pub fn score_feature_alignment(
    feature_description: Option<&str>,
    activity: &str,
) -> (f64, String) {
    let Some(description) = feature_description else {
        return (1.0, "no_feature".to_string());
    };

    let feature_keywords = extract_keywords(description);
    if feature_keywords.is_empty() {
        return (1.0, "no_keywords".to_string());
    }

    let activity_keywords = extract_keywords(activity);
    let matched = feature_keywords.intersection(&activity_keywords).count();
    let total = feature_keywords.len();
    let ratio = matched as f64 / total as f64;

    if ratio >= 0.3 {
        (1.0, "aligned".to_string())
    } else if ratio >= 0.1 {
        (0.7, format!("weak_alignment ({matched}/{total})"))
    } else {
        (0.4, format!("low_alignment ({matched}/{total})"))
    }
}

/// Converts a feature-alignment tier into the drift scale warnings use.
///
/// Alignment counts up (1.0 is good) while drift counts up the other way,
/// so the aligned and weak tiers become their complements. The lowest
/// tier lands exactly on [`DRIFT_WARNING_THRESHOLD`] so clearly unrelated
/// activity still surfaces even when no step is active.
pub fn feature_drift_score(alignment: f64) -> f64 {
    if alignment >= 0.7 {
        1.0 - alignment
    } else {
        DRIFT_WARNING_THRESHOLD
    }
}

/// Minimum confidence for a prompt to activate a feature.
pub const PROMPT_MATCH_THRESHOLD: f64 = 0.4;

/// Confidence boost for features that are not yet complete.
const INCOMPLETE_BOOST: f64 = 1.3;

/// Confidence boost for the currently active feature.
const ACTIVE_BOOST: f64 = 1.2;

/// A feature considered when classifying a user prompt.
#[derive(Debug, Clone)]
pub struct PromptCandidate {
    /// ID of the candidate feature
    pub feature_id: u64,
    /// Feature description concatenated with its step descriptions
    pub text: String,
    /// Whether the feature is still pending or in progress
    pub incomplete: bool,
    /// Whether the feature is currently active
    pub active: bool,
}

/// Best feature match for a user prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptMatch {
    pub feature_id: u64,
    pub confidence: f64,
}

/// Matches a user prompt against candidate features by keyword overlap.
///
/// Confidence is the fraction of prompt keywords found in the candidate's
/// text, boosted for incomplete and currently-active features, clamped to
/// 1.0. Returns `None` when the prompt has no keywords or no candidate
/// reaches [`PROMPT_MATCH_THRESHOLD`].
pub fn match_prompt(prompt: &str, candidates: &[PromptCandidate]) -> Option<PromptMatch> {
    let prompt_keywords = extract_keywords(prompt);
    if prompt_keywords.is_empty() {
        return None;
    }

    let mut best: Option<PromptMatch> = None;
    for candidate in candidates {
        let candidate_keywords = extract_keywords(&candidate.text);
        let matched = prompt_keywords.intersection(&candidate_keywords).count();
        if matched == 0 {
            continue;
        }

        let mut confidence = matched as f64 / prompt_keywords.len() as f64;
        if candidate.incomplete {
            confidence *= INCOMPLETE_BOOST;
        }
        if candidate.active {
            confidence *= ACTIVE_BOOST;
        }
        let confidence = confidence.min(1.0);

        let better = best
            .as_ref()
            .map(|b| confidence > b.confidence)
            .unwrap_or(true);
        if better {
            best = Some(PromptMatch {
                feature_id: candidate.feature_id,
                confidence,
            });
        }
    }

    best.filter(|m| m.confidence >= PROMPT_MATCH_THRESHOLD)
}
