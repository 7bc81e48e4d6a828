//! Ephemeral suggestion records. Computed on demand, never stored in the IR.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ir::{Clause, FieldKind, HoleKind, Severity};
use crate::domain::text;

/// Confidence reported for a hole no rule matches.
pub const DEFAULT_UNKNOWN_CONFIDENCE: f64 = 0.1;

/// What the curator knows about a hole's surroundings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoleContext {
    /// Hole the context describes
    pub hole_id: String,
    /// Clause the hole belongs to
    pub clause: Clause,
    /// Field kind of the hole's first target; `None` for open-ended holes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<FieldKind>,
    /// How the hole came to exist
    pub kind: HoleKind,
    /// Kind of answer expected
    pub type_hint: String,
    /// Detector's explanation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Concrete name of the target entity, when it has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_name: Option<String>,
    /// Current function name, if settled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
    /// Current intent summary, if settled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent_summary: Option<String>,
    /// Prompt the session was opened with
    pub prompt: String,
    /// Concrete parameter names
    #[serde(default)]
    pub parameter_names: Vec<String>,
    /// Identifier derived from the prompt, offered for naming holes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_name: Option<String>,
}

impl HoleContext {
    /// Singular lowercase words drawn from the prompt, intent, description and
    /// entity names; input to keyword matching.
    pub fn keywords(&self) -> Vec<String> {
        let sources = [
            Some(self.prompt.as_str()),
            self.intent_summary.as_deref(),
            self.description.as_deref(),
            self.entity_name.as_deref(),
            self.function_name.as_deref(),
        ];

        let mut words: Vec<String> = sources
            .into_iter()
            .flatten()
            .flat_map(text::words)
            .map(|w| text::singular(&w).to_string())
            .collect();
        words.sort();
        words.dedup();
        words
    }
}

/// A rule's candidate resolution before ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleCandidate {
    /// Producing rule
    pub rule_id: String,
    /// Rendered resolution text
    pub text: String,
    /// Rule confidence at match time
    pub confidence: f64,
    /// Last time the rule's suggestion was accepted
    pub last_helpful: Option<DateTime<Utc>>,
}

/// One candidate resolution offered to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    /// Resolution text to submit
    pub text: String,
    /// Confidence in `[0, 1]`
    pub confidence: f64,
    /// Rule that produced it
    pub source_rule_id: String,
}

/// Ranked candidate resolutions for one open hole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistSuggestion {
    /// Hole the suggestions are for
    pub hole_id: String,
    /// Context the suggestions were computed from
    pub context: HoleContext,
    /// Ordered by descending confidence.
    pub suggestions: Vec<Suggestion>,
    /// Top suggestion's confidence, or the unknown confidence when empty.
    pub confidence: f64,
    /// Contradictions rank before omissions
    pub severity: Severity,
    /// 1-based position among the session's assists.
    pub rank: usize,
}

impl AssistSuggestion {
    /// Highest-confidence suggestion.
    pub fn top(&self) -> Option<&Suggestion> {
        self.suggestions.first()
    }
}
