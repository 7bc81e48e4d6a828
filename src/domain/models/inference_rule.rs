//! Pattern-based inference rules with usage-derived confidence.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::ir::FieldKind;
use super::suggestion::HoleContext;
use crate::domain::text;

/// When a rule applies to a hole. Empty lists match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulePattern {
    /// Any-of field kinds the hole must target
    #[serde(default)]
    pub fields: Vec<FieldKind>,
    /// Any-of; compared against the singular form of context words.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Any-of type hints, case-insensitive
    #[serde(default)]
    pub type_hints: Vec<String>,
}

impl RulePattern {
    /// Whether the rule applies to the hole described by `ctx`.
    pub fn matches(&self, ctx: &HoleContext) -> bool {
        let field_ok = self.fields.is_empty()
            || match ctx.field {
                Some(field) => self.fields.contains(&field),
                None => self.fields.iter().any(|f| f.clause() == ctx.clause),
            };
        if !field_ok {
            return false;
        }

        let hint_ok = self.type_hints.is_empty()
            || self
                .type_hints
                .iter()
                .any(|h| h.eq_ignore_ascii_case(&ctx.type_hint));
        if !hint_ok {
            return false;
        }

        if self.keywords.is_empty() {
            return true;
        }
        let words = ctx.keywords();
        self.keywords.iter().any(|k| {
            let k = k.to_lowercase();
            words.iter().any(|w| w == text::singular(&k))
        })
    }
}

/// A reusable resolution template scored by user feedback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceRule {
    /// Stable rule id, e.g. `type-int-arithmetic`
    pub id: String,
    /// When the rule applies
    pub pattern: RulePattern,
    /// Resolution template; see [`InferenceRule::render`] for placeholders.
    pub resolution: String,
    /// Accepted suggestions
    #[serde(default)]
    pub helpful_count: u64,
    /// Overridden suggestions
    #[serde(default)]
    pub harmful_count: u64,
    /// Free-form tags, e.g. `arithmetic`
    #[serde(default)]
    pub domains: Vec<String>,
    /// Last acceptance
    #[serde(default)]
    pub last_helpful: Option<DateTime<Utc>>,
    /// Last override
    #[serde(default)]
    pub last_harmful: Option<DateTime<Utc>>,
    /// Start of the current run below the pruning floor.
    #[serde(default)]
    pub below_floor_since: Option<DateTime<Utc>>,
    /// When the rule was registered
    pub created_at: DateTime<Utc>,
}

impl InferenceRule {
    /// New rule with no feedback.
    pub fn new(id: impl Into<String>, pattern: RulePattern, resolution: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            pattern,
            resolution: resolution.into(),
            helpful_count: 0,
            harmful_count: 0,
            domains: Vec::new(),
            last_helpful: None,
            last_harmful: None,
            below_floor_since: None,
            created_at: Utc::now(),
        }
    }

    /// Tag the rule with `domains`.
    pub fn with_domains(mut self, domains: &[&str]) -> Self {
        self.domains = domains.iter().map(|d| (*d).to_string()).collect();
        self
    }

    /// Laplace-smoothed helpful ratio; strictly inside (0, 1).
    #[allow(clippy::cast_precision_loss)]
    pub fn confidence(&self) -> f64 {
        (self.helpful_count as f64 + 1.0) / ((self.helpful_count + self.harmful_count) as f64 + 2.0)
    }

    /// Record one accepted (`helpful`) or overridden suggestion.
    pub fn record_feedback(&mut self, helpful: bool, now: DateTime<Utc>, floor: f64) {
        if helpful {
            self.helpful_count += 1;
            self.last_helpful = Some(now);
        } else {
            self.harmful_count += 1;
            self.last_harmful = Some(now);
        }

        if self.confidence() < floor {
            self.below_floor_since.get_or_insert(now);
        } else {
            self.below_floor_since = None;
        }
    }

    /// Excluded from ranking after staying below the floor for `window`.
    pub fn is_pruned(&self, now: DateTime<Utc>, window: Duration) -> bool {
        self.below_floor_since.is_some_and(|since| now - since >= window)
    }

    /// Fill the resolution template from `ctx`.
    ///
    /// Placeholders: `{name}`, `{function}`, `{prompt}`, `{intent}`,
    /// `{params}`, `{params_sum}`, `{first_param}`, `{suggested_name}`.
    /// Returns `None` when a used placeholder has no value in `ctx`.
    pub fn render(&self, ctx: &HoleContext) -> Option<String> {
        let params = &ctx.parameter_names;
        let vars: [(&str, Option<String>); 8] = [
            ("{name}", ctx.entity_name.clone()),
            ("{function}", ctx.function_name.clone()),
            ("{prompt}", Some(ctx.prompt.clone())),
            ("{intent}", ctx.intent_summary.clone()),
            ("{params}", (!params.is_empty()).then(|| params.join(", "))),
            ("{params_sum}", (!params.is_empty()).then(|| params.join(" + "))),
            ("{first_param}", params.first().cloned()),
            ("{suggested_name}", ctx.suggested_name.clone()),
        ];

        let mut out = self.resolution.clone();
        for (placeholder, value) in vars {
            if out.contains(placeholder) {
                out = out.replace(placeholder, &value?);
            }
        }

        let out = out.trim().to_string();
        (!out.is_empty()).then_some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ir::{Clause, HoleKind};

    fn ctx(field: Option<FieldKind>, prompt: &str) -> HoleContext {
        HoleContext {
            hole_id: "h".into(),
            clause: field.map_or(Clause::Assertions, |f| f.clause()),
            field,
            kind: HoleKind::Placeholder,
            type_hint: "type".into(),
            description: None,
            entity_name: None,
            function_name: Some("add_numbers".into()),
            intent_summary: None,
            prompt: prompt.into(),
            parameter_names: vec!["a".into(), "b".into()],
            suggested_name: Some("add_numbers".into()),
        }
    }

    fn rule() -> InferenceRule {
        InferenceRule::new(
            "numeric-int",
            RulePattern {
                fields: vec![FieldKind::ParameterType],
                keywords: vec!["add".into(), "numbers".into()],
                type_hints: vec![],
            },
            "int",
        )
    }

    #[test]
    fn test_new_rule_starts_at_one_half() {
        assert!((rule().confidence() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_confidence_moves_with_evidence() {
        let mut r = rule();
        let now = Utc::now();
        r.record_feedback(true, now, 0.2);
        assert!((r.confidence() - 2.0 / 3.0).abs() < 1e-9);
        r.record_feedback(false, now, 0.2);
        r.record_feedback(false, now, 0.2);
        assert!((r.confidence() - 0.4).abs() < 1e-9);
        assert_eq!(r.last_helpful, Some(now));
        assert_eq!(r.last_harmful, Some(now));
    }

    #[test]
    fn test_pattern_matches_singularized_keywords() {
        let r = rule();
        assert!(r.pattern.matches(&ctx(Some(FieldKind::ParameterType), "A function that adds two numbers")));
        assert!(!r.pattern.matches(&ctx(Some(FieldKind::ParameterType), "Reverse a string")));
        assert!(!r.pattern.matches(&ctx(Some(FieldKind::ParameterName), "adds numbers")));
    }

    #[test]
    fn test_field_pattern_matches_open_ended_clause() {
        let r = InferenceRule::new(
            "sum-post",
            RulePattern {
                fields: vec![FieldKind::AssertionPredicate],
                ..Default::default()
            },
            "result == {params_sum}",
        );
        let c = ctx(None, "sum things");
        assert!(r.pattern.matches(&c));
        assert_eq!(r.render(&c).as_deref(), Some("result == a + b"));
    }

    #[test]
    fn test_render_fails_on_missing_value() {
        let r = InferenceRule::new("named", RulePattern::default(), "{name}_value");
        assert!(r.render(&ctx(None, "x")).is_none());
    }

    #[test]
    fn test_soft_pruning_window() {
        let mut r = rule();
        let start = Utc::now();
        for _ in 0..4 {
            r.record_feedback(false, start, 0.2);
        }
        // (0 + 1) / (4 + 2) < 0.2
        assert_eq!(r.below_floor_since, Some(start));
        assert!(!r.is_pruned(start + Duration::hours(1), Duration::hours(24)));
        assert!(r.is_pruned(start + Duration::hours(25), Duration::hours(24)));

        for _ in 0..4 {
            r.record_feedback(true, start, 0.2);
        }
        assert!(r.below_floor_since.is_none());
        assert!(!r.is_pruned(start + Duration::hours(25), Duration::hours(24)));
    }
}
