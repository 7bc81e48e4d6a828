//! In-process repositories for tests and ephemeral servers.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{InferenceRule, Session, SessionStatus};
use crate::domain::ports::{RuleRepository, SessionRepository};

/// Session store held in memory.
#[derive(Clone, Default)]
pub struct InMemorySessionRepository {
    sessions: Arc<RwLock<HashMap<Uuid, Session>>>,
}

impl InMemorySessionRepository {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn create(&self, session: &Session) -> DomainResult<()> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.id) {
            return Err(DomainError::Conflict(format!("session {} already exists", session.id)));
        }
        sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Session>> {
        Ok(self.sessions.read().await.get(&id).cloned())
    }

    async fn list(&self, status: Option<SessionStatus>, limit: usize) -> DomainResult<Vec<Session>> {
        let sessions = self.sessions.read().await;
        let mut matching: Vec<Session> = sessions
            .values()
            .filter(|s| status.map_or(true, |wanted| s.status == wanted))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        matching.truncate(limit);
        Ok(matching)
    }

    async fn save(&self, session: &Session) -> DomainResult<()> {
        let mut sessions = self.sessions.write().await;
        let Some(stored) = sessions.get_mut(&session.id) else {
            return Err(DomainError::NotFound {
                entity: "session",
                id: session.id.to_string(),
            });
        };
        if session.drafts.len() < stored.drafts.len() {
            return Err(DomainError::Conflict(format!(
                "session {} would drop stored drafts ({} < {})",
                session.id,
                session.drafts.len(),
                stored.drafts.len()
            )));
        }
        *stored = session.clone();
        Ok(())
    }
}

/// Rule store held in memory.
#[derive(Clone, Default)]
pub struct InMemoryRuleRepository {
    rules: Arc<RwLock<BTreeMap<String, InferenceRule>>>,
}

impl InMemoryRuleRepository {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RuleRepository for InMemoryRuleRepository {
    async fn upsert(&self, rule: &InferenceRule) -> DomainResult<()> {
        self.rules.write().await.insert(rule.id.clone(), rule.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> DomainResult<Option<InferenceRule>> {
        Ok(self.rules.read().await.get(id).cloned())
    }

    async fn list(&self) -> DomainResult<Vec<InferenceRule>> {
        Ok(self.rules.read().await.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Draft, Intent, IrDocument, Signature, ValidationReport};
    use std::collections::BTreeSet;

    fn session() -> Session {
        let ir = IrDocument::new(
            Intent {
                summary: "noop".into(),
                rationale: None,
            },
            Signature {
                name: "noop".into(),
                parameters: vec![],
                returns: None,
            },
        );
        Session::new("noop", Draft::initial(ir, ValidationReport::valid()), BTreeSet::new())
    }

    #[tokio::test]
    async fn test_duplicate_create_conflicts() {
        let repo = InMemorySessionRepository::new();
        let s = session();
        repo.create(&s).await.unwrap();
        assert!(matches!(repo.create(&s).await, Err(DomainError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_save_refuses_to_drop_drafts() {
        let repo = InMemorySessionRepository::new();
        let mut s = session();
        let extra = s.drafts[0].clone();
        s.drafts.push(Draft { version: 1, ..extra });
        repo.create(&s).await.unwrap();

        s.drafts.pop();
        assert!(matches!(repo.save(&s).await, Err(DomainError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_list_filters_by_status() {
        let repo = InMemorySessionRepository::new();
        let active = session();
        let mut abandoned = session();
        abandoned.abandon();
        repo.create(&active).await.unwrap();
        repo.create(&abandoned).await.unwrap();

        assert_eq!(repo.list(None, 10).await.unwrap().len(), 2);
        let only = repo.list(Some(SessionStatus::Abandoned), 10).await.unwrap();
        assert_eq!(only.len(), 1);
        assert_eq!(only[0].id, abandoned.id);
    }
}
