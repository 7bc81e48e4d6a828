//! Repository port for specification sessions.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Session, SessionStatus};

/// Persists sessions together with their full draft chain.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Insert a new session. Fails with `Conflict` if the id exists.
    async fn create(&self, session: &Session) -> DomainResult<()>;

    /// Load a session and all of its drafts.
    async fn get(&self, id: Uuid) -> DomainResult<Option<Session>>;

    /// List sessions, newest first.
    async fn list(&self, status: Option<SessionStatus>, limit: usize) -> DomainResult<Vec<Session>>;

    /// Persist session metadata and any drafts not stored yet, atomically.
    /// Stored drafts are never deleted; only a `pending` verdict may change.
    async fn save(&self, session: &Session) -> DomainResult<()>;
}
