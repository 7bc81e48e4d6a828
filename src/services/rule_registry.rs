//! In-process inference rule registry.
//!
//! Rules live in memory behind a `RwLock`; when a [`RuleRepository`] is
//! attached, feedback and registrations are written through. Persistence
//! failures are logged and never fail the caller.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{FieldKind, HoleContext, InferenceRule, RuleCandidate, RulePattern, RulesConfig};
use crate::domain::ports::{RuleRegistry, RuleRepository};

/// Pruning parameters.
#[derive(Debug, Clone)]
pub struct RuleRegistryConfig {
    /// Confidence below which the pruning window starts.
    pub prune_floor: f64,
    /// How long a rule must stay below the floor before it is excluded.
    pub prune_window: Duration,
}

impl Default for RuleRegistryConfig {
    fn default() -> Self {
        Self::from(&RulesConfig::default())
    }
}

impl From<&RulesConfig> for RuleRegistryConfig {
    fn from(config: &RulesConfig) -> Self {
        Self {
            prune_floor: config.prune_floor,
            prune_window: Duration::hours(config.prune_window_hours),
        }
    }
}

/// Rule population with usage-derived confidence.
pub struct InferenceRuleRegistry {
    config: RuleRegistryConfig,
    rules: Arc<RwLock<BTreeMap<String, InferenceRule>>>,
    repo: Option<Arc<dyn RuleRepository>>,
}

impl InferenceRuleRegistry {
    /// Empty registry with no repository.
    pub fn new(config: RuleRegistryConfig) -> Self {
        Self {
            config,
            rules: Arc::new(RwLock::new(BTreeMap::new())),
            repo: None,
        }
    }

    /// Registry preloaded with [`Self::builtin_rules`].
    pub fn with_builtin_rules(config: RuleRegistryConfig) -> Self {
        let rules = Self::builtin_rules()
            .into_iter()
            .map(|r| (r.id.clone(), r))
            .collect();
        Self {
            config,
            rules: Arc::new(RwLock::new(rules)),
            repo: None,
        }
    }

    /// Attach a repository for write-through persistence.
    pub fn with_repo(mut self, repo: Arc<dyn RuleRepository>) -> Self {
        self.repo = Some(repo);
        self
    }

    /// The seed rule set.
    pub fn builtin_rules() -> Vec<InferenceRule> {
        let types = vec![FieldKind::ParameterType, FieldKind::SignatureReturns];
        let words = |ws: &[&str]| ws.iter().map(|w| (*w).to_string()).collect::<Vec<_>>();

        vec![
            InferenceRule::new(
                "type-int-arithmetic",
                RulePattern {
                    fields: types.clone(),
                    keywords: words(&[
                        "add", "sum", "subtract", "multiply", "plus", "minus", "count", "number",
                        "integer", "increment", "total", "product",
                    ]),
                    type_hints: vec![],
                },
                "int",
            )
            .with_domains(&["arithmetic"]),
            InferenceRule::new(
                "type-float-average",
                RulePattern {
                    fields: types.clone(),
                    keywords: words(&["average", "mean", "divide", "ratio", "percentage", "fraction", "decimal"]),
                    type_hints: vec![],
                },
                "float",
            )
            .with_domains(&["arithmetic"]),
            InferenceRule::new(
                "type-str-text",
                RulePattern {
                    fields: types,
                    keywords: words(&[
                        "name", "text", "string", "word", "reverse", "concatenate", "greet", "message",
                        "title",
                    ]),
                    type_hints: vec![],
                },
                "str",
            )
            .with_domains(&["text"]),
            InferenceRule::new(
                "type-bool-predicate",
                RulePattern {
                    fields: vec![FieldKind::SignatureReturns],
                    keywords: words(&["is", "check", "whether", "valid", "validate", "contains", "even", "odd"]),
                    type_hints: vec![],
                },
                "bool",
            )
            .with_domains(&["predicates"]),
            InferenceRule::new(
                "type-list-collection",
                RulePattern {
                    fields: vec![FieldKind::ParameterType],
                    keywords: words(&["list", "item", "collection", "array", "element", "sort", "filter"]),
                    type_hints: vec![],
                },
                "list",
            )
            .with_domains(&["collections"]),
            InferenceRule::new(
                "assert-sum-postcondition",
                RulePattern {
                    fields: vec![FieldKind::AssertionPredicate],
                    keywords: words(&["add", "sum", "plus", "total"]),
                    type_hints: vec![],
                },
                "result == {params_sum}",
            )
            .with_domains(&["arithmetic"]),
            InferenceRule::new(
                "effect-print-output",
                RulePattern {
                    fields: vec![FieldKind::EffectDescription],
                    keywords: words(&["print", "display", "show", "output"]),
                    type_hints: vec![],
                },
                "writes the result to standard output",
            )
            .with_domains(&["io"]),
            InferenceRule::new(
                "intent-restate-prompt",
                RulePattern {
                    fields: vec![FieldKind::IntentSummary],
                    ..Default::default()
                },
                "{prompt}",
            ),
            InferenceRule::new(
                "name-from-prompt",
                RulePattern {
                    fields: vec![FieldKind::SignatureName],
                    ..Default::default()
                },
                "{suggested_name}",
            ),
        ]
    }

    /// Insert or replace a rule.
    pub async fn register(&self, rule: InferenceRule) {
        self.persist(&rule).await;
        self.rules.write().await.insert(rule.id.clone(), rule);
    }

    /// Insert built-in rules that are not registered yet. Returns how many
    /// were added.
    pub async fn seed_builtin(&self) -> usize {
        let mut added = Vec::new();
        {
            let mut rules = self.rules.write().await;
            for rule in Self::builtin_rules() {
                if !rules.contains_key(&rule.id) {
                    rules.insert(rule.id.clone(), rule.clone());
                    added.push(rule);
                }
            }
        }

        for rule in &added {
            self.persist(rule).await;
        }
        if !added.is_empty() {
            info!(count = added.len(), "seeded built-in inference rules");
        }
        added.len()
    }

    /// Replace in-memory rules with those stored in the repository.
    pub async fn load_from_repo(&self) -> usize {
        let Some(ref repo) = self.repo else {
            return 0;
        };

        match repo.list().await {
            Ok(stored) => {
                let count = stored.len();
                let mut rules = self.rules.write().await;
                for rule in stored {
                    rules.insert(rule.id.clone(), rule);
                }
                count
            }
            Err(e) => {
                warn!("Failed to load inference rules from repository: {}", e);
                0
            }
        }
    }

    /// Current state of rule `id`.
    pub async fn get(&self, id: &str) -> Option<InferenceRule> {
        self.rules.read().await.get(id).cloned()
    }

    async fn persist(&self, rule: &InferenceRule) {
        if let Some(ref repo) = self.repo {
            if let Err(e) = repo.upsert(rule).await {
                warn!(rule_id = %rule.id, "Failed to persist inference rule: {}", e);
            }
        }
    }
}

#[async_trait]
impl RuleRegistry for InferenceRuleRegistry {
    async fn match_context(&self, ctx: &HoleContext) -> Vec<RuleCandidate> {
        let now = Utc::now();
        let rules = self.rules.read().await;
        rules
            .values()
            .filter(|r| !r.is_pruned(now, self.config.prune_window))
            .filter(|r| r.pattern.matches(ctx))
            .filter_map(|r| {
                r.render(ctx).map(|text| RuleCandidate {
                    rule_id: r.id.clone(),
                    text,
                    confidence: r.confidence(),
                    last_helpful: r.last_helpful,
                })
            })
            .collect()
    }

    #[instrument(skip(self), err)]
    async fn record_feedback(&self, rule_id: &str, helpful: bool) -> DomainResult<InferenceRule> {
        let updated = {
            let mut rules = self.rules.write().await;
            let rule = rules.get_mut(rule_id).ok_or_else(|| DomainError::NotFound {
                entity: "inference rule",
                id: rule_id.to_string(),
            })?;
            rule.record_feedback(helpful, Utc::now(), self.config.prune_floor);
            rule.clone()
        };

        debug!(rule_id, helpful, confidence = updated.confidence(), "rule feedback recorded");
        self.persist(&updated).await;
        Ok(updated)
    }

    async fn list(&self) -> Vec<InferenceRule> {
        self.rules.read().await.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryRuleRepository;
    use crate::domain::models::{Clause, HoleKind};

    fn ctx(field: FieldKind, prompt: &str) -> HoleContext {
        HoleContext {
            hole_id: "hole_param_type".into(),
            clause: field.clause(),
            field: Some(field),
            kind: HoleKind::Placeholder,
            type_hint: "type".into(),
            description: None,
            entity_name: None,
            function_name: Some("add_numbers".into()),
            intent_summary: Some(prompt.into()),
            prompt: prompt.into(),
            parameter_names: vec!["a".into(), "b".into()],
            suggested_name: Some("add_numbers".into()),
        }
    }

    #[tokio::test]
    async fn test_arithmetic_prompt_matches_int_rule() {
        let registry = InferenceRuleRegistry::with_builtin_rules(RuleRegistryConfig::default());
        let candidates = registry
            .match_context(&ctx(FieldKind::ParameterType, "A function that adds two numbers"))
            .await;
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].rule_id, "type-int-arithmetic");
        assert_eq!(candidates[0].text, "int");
        assert!((candidates[0].confidence - 0.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_open_ended_assertion_context_renders_postcondition() {
        let registry = InferenceRuleRegistry::with_builtin_rules(RuleRegistryConfig::default());
        let mut c = ctx(FieldKind::AssertionPredicate, "sum two numbers");
        c.field = None;
        c.clause = Clause::Assertions;
        let candidates = registry.match_context(&c).await;
        assert!(candidates.iter().any(|c| c.text == "result == a + b"));
    }

    #[tokio::test]
    async fn test_feedback_updates_confidence_and_persists() {
        let repo = Arc::new(InMemoryRuleRepository::new());
        let registry = InferenceRuleRegistry::with_builtin_rules(RuleRegistryConfig::default())
            .with_repo(repo.clone());

        let rule = registry.record_feedback("type-int-arithmetic", true).await.unwrap();
        assert_eq!(rule.helpful_count, 1);
        assert!(rule.confidence() > 0.5);

        let stored = repo.get("type-int-arithmetic").await.unwrap().unwrap();
        assert_eq!(stored.helpful_count, 1);
    }

    #[tokio::test]
    async fn test_feedback_for_unknown_rule_is_not_found() {
        let registry = InferenceRuleRegistry::new(RuleRegistryConfig::default());
        let err = registry.record_feedback("missing", false).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_pruned_rules_are_not_matched() {
        let registry = InferenceRuleRegistry::with_builtin_rules(RuleRegistryConfig {
            prune_floor: 0.4,
            prune_window: Duration::zero(),
        });
        for _ in 0..3 {
            registry.record_feedback("type-int-arithmetic", false).await.unwrap();
        }
        let candidates = registry
            .match_context(&ctx(FieldKind::ParameterType, "add two numbers"))
            .await;
        assert!(candidates.iter().all(|c| c.rule_id != "type-int-arithmetic"));
    }

    #[tokio::test]
    async fn test_seed_and_reload_from_repo() {
        let repo = Arc::new(InMemoryRuleRepository::new());
        let registry = InferenceRuleRegistry::new(RuleRegistryConfig::default()).with_repo(repo.clone());
        let seeded = registry.seed_builtin().await;
        assert_eq!(seeded, InferenceRuleRegistry::builtin_rules().len());
        assert_eq!(registry.seed_builtin().await, 0);

        let reloaded = InferenceRuleRegistry::new(RuleRegistryConfig::default()).with_repo(repo);
        assert_eq!(reloaded.load_from_repo().await, seeded);
        assert!(reloaded.get("name-from-prompt").await.is_some());
    }
}
