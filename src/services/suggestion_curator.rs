//! Ranked resolution suggestions for open holes.

use std::cmp::Ordering;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::domain::models::{
    AssistSuggestion, FieldKind, HoleContext, IrDocument, RuleCandidate, Suggestion, TypedHole,
};
use crate::domain::ports::RuleRegistry;
use crate::domain::text;

/// How a submitted resolution relates to the suggestions that were on offer.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedbackOutcome {
    /// The resolution matches a suggestion from `rule_id`.
    Accepted {
        /// Rule whose suggestion was chosen
        rule_id: String,
        /// Confidence of that suggestion
        confidence: f64,
    },
    /// Suggestions existed but the user chose something else; `rule_id` is the
    /// rule behind the top one.
    Overridden {
        /// Rule behind the top suggestion
        rule_id: String,
    },
    /// Nothing was suggested.
    NoSuggestion,
}

/// Builds, ranks and scores suggestions for open holes.
pub struct SuggestionCurator {
    registry: Arc<dyn RuleRegistry>,
    unknown_confidence: f64,
    max_suggestions: usize,
}

impl SuggestionCurator {
    /// Curator over `registry`. `max_suggestions` is clamped to at least 1.
    pub fn new(registry: Arc<dyn RuleRegistry>, unknown_confidence: f64, max_suggestions: usize) -> Self {
        Self {
            registry,
            unknown_confidence,
            max_suggestions: max_suggestions.max(1),
        }
    }

    /// The registry consulted for candidates.
    pub fn registry(&self) -> &Arc<dyn RuleRegistry> {
        &self.registry
    }

    /// Gather what rule patterns and templates need to know about `hole`.
    pub fn build_context(doc: &IrDocument, hole: &TypedHole, prompt: &str) -> HoleContext {
        let concrete = |s: Option<&String>| s.filter(|v| !v.trim().is_empty()).cloned();
        let first = hole.targets.first();

        let entity_name = first.and_then(|at| match at.field {
            FieldKind::ParameterName | FieldKind::ParameterType => {
                concrete(doc.parameter(&at.entity_id).and_then(|p| p.name.as_value()))
            }
            FieldKind::SignatureName | FieldKind::SignatureReturns => concrete(doc.signature.name.as_value()),
            _ => None,
        });
        let intent_summary = concrete(doc.intent.summary.as_value());
        let suggested_name = text::derive_identifier(prompt)
            .or_else(|| intent_summary.as_deref().and_then(text::derive_identifier));

        HoleContext {
            hole_id: hole.id.clone(),
            clause: hole.clause,
            field: first.map(|at| at.field),
            kind: hole.kind,
            type_hint: hole.type_hint.clone(),
            description: hole.description.clone(),
            entity_name,
            function_name: concrete(doc.signature.name.as_value()),
            intent_summary,
            prompt: prompt.to_string(),
            parameter_names: doc
                .parameter_names()
                .into_iter()
                .filter(|n| !n.trim().is_empty())
                .map(str::to_string)
                .collect(),
            suggested_name,
        }
    }

    /// Suggestions for one hole, best first. `rank` is assigned by [`Self::rank`].
    pub async fn suggest_for_hole(&self, doc: &IrDocument, hole: &TypedHole, prompt: &str) -> AssistSuggestion {
        let context = Self::build_context(doc, hole, prompt);
        let mut candidates = self.registry.match_context(&context).await;
        candidates.sort_by(compare_candidates);

        let mut seen = Vec::new();
        let suggestions: Vec<Suggestion> = candidates
            .into_iter()
            .filter(|c| {
                let key = text::normalize(&c.text);
                if seen.contains(&key) {
                    false
                } else {
                    seen.push(key);
                    true
                }
            })
            .take(self.max_suggestions)
            .map(|c| Suggestion {
                text: c.text,
                confidence: c.confidence,
                source_rule_id: c.rule_id,
            })
            .collect();

        debug!(hole_id = %hole.id, count = suggestions.len(), "suggestions computed");
        let confidence = suggestions.first().map_or(self.unknown_confidence, |s| s.confidence);
        AssistSuggestion {
            hole_id: hole.id.clone(),
            severity: hole.severity,
            context,
            suggestions,
            confidence,
            rank: 0,
        }
    }

    /// Assists for every hole, ranked.
    pub async fn curate(&self, doc: &IrDocument, holes: &[TypedHole], prompt: &str) -> Vec<AssistSuggestion> {
        let assists = join_all(holes.iter().map(|hole| self.suggest_for_hole(doc, hole, prompt))).await;
        Self::rank(assists)
    }

    /// Fallback when suggestion work cannot finish: every hole is reported with
    /// no suggestions and the unknown confidence.
    pub fn unknown_assists(&self, doc: &IrDocument, holes: &[TypedHole], prompt: &str) -> Vec<AssistSuggestion> {
        let assists = holes
            .iter()
            .map(|hole| AssistSuggestion {
                hole_id: hole.id.clone(),
                context: Self::build_context(doc, hole, prompt),
                suggestions: Vec::new(),
                confidence: self.unknown_confidence,
                severity: hole.severity,
                rank: 0,
            })
            .collect();
        Self::rank(assists)
    }

    /// Contradictions first, then higher confidence, then hole id. Ranks are
    /// 1-based.
    pub fn rank(mut assists: Vec<AssistSuggestion>) -> Vec<AssistSuggestion> {
        assists.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| b.confidence.total_cmp(&a.confidence))
                .then_with(|| a.hole_id.cmp(&b.hole_id))
        });
        for (i, assist) in assists.iter_mut().enumerate() {
            assist.rank = i + 1;
        }
        assists
    }

    /// Compare a submitted text against the suggestions that were on offer.
    pub fn classify(assist: Option<&AssistSuggestion>, resolution_text: &str) -> FeedbackOutcome {
        let Some(assist) = assist else {
            return FeedbackOutcome::NoSuggestion;
        };
        let wanted = text::normalize(resolution_text);
        if let Some(s) = assist.suggestions.iter().find(|s| text::normalize(&s.text) == wanted) {
            return FeedbackOutcome::Accepted {
                rule_id: s.source_rule_id.clone(),
                confidence: s.confidence,
            };
        }
        match assist.top() {
            Some(top) => FeedbackOutcome::Overridden {
                rule_id: top.source_rule_id.clone(),
            },
            None => FeedbackOutcome::NoSuggestion,
        }
    }

    /// Record `outcome` on the originating rule. Failures are logged only.
    pub async fn apply_feedback(&self, outcome: &FeedbackOutcome) {
        let (rule_id, helpful) = match outcome {
            FeedbackOutcome::Accepted { rule_id, .. } => (rule_id, true),
            FeedbackOutcome::Overridden { rule_id } => (rule_id, false),
            FeedbackOutcome::NoSuggestion => return,
        };
        if let Err(e) = self.registry.record_feedback(rule_id, helpful).await {
            warn!(rule_id = %rule_id, "Failed to record rule feedback: {}", e);
        }
    }
}

/// Higher confidence first, then most recently helpful, then rule id.
fn compare_candidates(a: &RuleCandidate, b: &RuleCandidate) -> Ordering {
    b.confidence
        .total_cmp(&a.confidence)
        .then_with(|| match (a.last_helpful, b.last_helpful) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.rule_id.cmp(&b.rule_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{
        Clause, FieldRef, HoleKind, InferenceRule, Intent, Parameter, RulePattern, Severity, Signature, Slot,
    };
    use crate::services::rule_registry::{InferenceRuleRegistry, RuleRegistryConfig};
    use chrono::Utc;

    fn doc() -> IrDocument {
        IrDocument::new(
            Intent {
                summary: "A function that adds two numbers".into(),
                rationale: None,
            },
            Signature {
                name: "add_numbers".into(),
                parameters: vec![
                    Parameter::new("param_a", "a", Slot::hole("hole_param_type")),
                    Parameter::new("param_b", "b", Slot::hole("hole_param_type")),
                ],
                returns: Some(Slot::hole("hole_param_type")),
            },
        )
    }

    fn type_hole() -> TypedHole {
        TypedHole::new("hole_param_type", Clause::Signature, "type")
            .with_targets(vec![FieldRef::new("param_a", FieldKind::ParameterType)])
    }

    fn rule(id: &str, text: &str) -> InferenceRule {
        InferenceRule::new(
            id,
            RulePattern {
                fields: vec![FieldKind::ParameterType],
                ..Default::default()
            },
            text,
        )
    }

    async fn curator_with(rules: Vec<InferenceRule>, max: usize) -> SuggestionCurator {
        let registry = InferenceRuleRegistry::new(RuleRegistryConfig::default());
        for r in rules {
            registry.register(r).await;
        }
        SuggestionCurator::new(Arc::new(registry), 0.1, max)
    }

    #[test]
    fn test_context_captures_surroundings() {
        let ctx = SuggestionCurator::build_context(&doc(), &type_hole(), "A function that adds two numbers");
        assert_eq!(ctx.entity_name.as_deref(), Some("a"));
        assert_eq!(ctx.function_name.as_deref(), Some("add_numbers"));
        assert_eq!(ctx.parameter_names, vec!["a", "b"]);
        assert_eq!(ctx.suggested_name.as_deref(), Some("add_numbers"));
        assert_eq!(ctx.field, Some(FieldKind::ParameterType));
    }

    #[tokio::test]
    async fn test_suggestions_are_ordered_and_deduplicated() {
        let mut strong = rule("r-strong", "int");
        strong.helpful_count = 4;
        let mut recent = rule("r-recent", "float");
        recent.last_helpful = Some(Utc::now());
        let stale = rule("r-stale", "str");
        let dup = rule("r-dup", " INT ");

        let curator = curator_with(vec![strong, recent, stale, dup], 5).await;
        let assist = curator.suggest_for_hole(&doc(), &type_hole(), "adds numbers").await;
        let texts: Vec<&str> = assist.suggestions.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["int", "float", "str"]);
        assert!((assist.confidence - assist.suggestions[0].confidence).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_max_suggestions_is_enforced() {
        let curator = curator_with(vec![rule("r1", "int"), rule("r2", "float"), rule("r3", "str")], 2).await;
        let assist = curator.suggest_for_hole(&doc(), &type_hole(), "x").await;
        assert_eq!(assist.suggestions.len(), 2);
    }

    #[tokio::test]
    async fn test_no_matching_rule_reports_unknown_confidence() {
        let curator = curator_with(vec![], 5).await;
        let assist = curator.suggest_for_hole(&doc(), &type_hole(), "x").await;
        assert!(assist.suggestions.is_empty());
        assert!((assist.confidence - 0.1).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_contradictions_rank_first() {
        let curator = curator_with(vec![rule("r1", "int")], 5).await;
        let contradiction = TypedHole::new("hole_assert_1_refs", Clause::Assertions, "predicate")
            .with_kind(HoleKind::Contradiction)
            .with_targets(vec![FieldRef::new("assert_1", FieldKind::AssertionPredicate)]);
        let assists = curator.curate(&doc(), &[type_hole(), contradiction], "x").await;
        assert_eq!(assists[0].hole_id, "hole_assert_1_refs");
        assert_eq!(assists[0].severity, Severity::Contradiction);
        assert_eq!(assists[0].rank, 1);
        assert_eq!(assists[1].rank, 2);
    }

    #[tokio::test]
    async fn test_classify_accept_and_override() {
        let curator = curator_with(vec![rule("r1", "int")], 5).await;
        let assist = curator.suggest_for_hole(&doc(), &type_hole(), "x").await;

        assert!(matches!(
            SuggestionCurator::classify(Some(&assist), " Int"),
            FeedbackOutcome::Accepted { ref rule_id, .. } if rule_id == "r1"
        ));
        assert_eq!(
            SuggestionCurator::classify(Some(&assist), "float"),
            FeedbackOutcome::Overridden { rule_id: "r1".into() }
        );
        assert_eq!(SuggestionCurator::classify(None, "int"), FeedbackOutcome::NoSuggestion);
    }

    #[tokio::test]
    async fn test_feedback_reaches_registry() {
        let curator = curator_with(vec![rule("r1", "int")], 5).await;
        curator
            .apply_feedback(&FeedbackOutcome::Overridden { rule_id: "r1".into() })
            .await;
        let rules = curator.registry().list().await;
        assert_eq!(rules[0].harmful_count, 1);
    }
}
