//! Port through which the suggestion curator consults inference rules.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{HoleContext, InferenceRule, RuleCandidate};

/// Rule lookup and feedback used by the suggestion curator.
#[async_trait]
pub trait RuleRegistry: Send + Sync {
    /// Rendered candidates of every non-pruned rule whose pattern matches.
    async fn match_context(&self, ctx: &HoleContext) -> Vec<RuleCandidate>;

    /// Record that a rule's suggestion was accepted (`helpful`) or overridden.
    async fn record_feedback(&self, rule_id: &str, helpful: bool) -> DomainResult<InferenceRule>;

    /// Every rule, pruned ones included, ordered by id.
    async fn list(&self) -> Vec<InferenceRule>;
}
