//! Repository port for inference rules and their feedback counters.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::InferenceRule;

/// Persists inference rules.
#[async_trait]
pub trait RuleRepository: Send + Sync {
    /// Insert or replace a rule by id.
    async fn upsert(&self, rule: &InferenceRule) -> DomainResult<()>;

    /// Load a rule by id.
    async fn get(&self, id: &str) -> DomainResult<Option<InferenceRule>>;

    /// All rules ordered by id.
    async fn list(&self) -> DomainResult<Vec<InferenceRule>>;
}
