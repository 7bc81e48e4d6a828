//! Session state machine.
//!
//! Coordinates the translator, ambiguity detector, suggestion curator, delta
//! engine and validator around the append-only draft chain of each session.
//!
//! Mutating operations on one session are serialized through a per-session
//! mutex. Every successful write cancels the session's current
//! [`CancellationToken`] and installs a fresh one, so in-flight assist
//! computations see that their snapshot went stale.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainError, SessionError, SessionResult, TranslationError};
use crate::domain::models::{
    AssistSuggestion, Clause, Draft, HistoryEntry, IrDocument, Producer, Resolution, Session, SessionConfig,
    SessionStatus, ValidationReport, ValidationStatus,
};
use crate::domain::ports::{SessionRepository, Translator, Validator};
use crate::services::ambiguity_detector::AmbiguityDetector;
use crate::services::delta_engine::DeltaEngine;
use crate::services::suggestion_curator::{FeedbackOutcome, SuggestionCurator};

/// Collaborator timeouts.
#[derive(Debug, Clone)]
pub struct SessionServiceConfig {
    /// Bound on one translator call
    pub translator_timeout: Duration,
    /// Bound on one validator call
    pub validator_timeout: Duration,
    /// Bound on suggestion work for one request
    pub suggestion_timeout: Duration,
}

impl Default for SessionServiceConfig {
    fn default() -> Self {
        Self::from(&SessionConfig::default())
    }
}

impl From<&SessionConfig> for SessionServiceConfig {
    fn from(config: &SessionConfig) -> Self {
        Self {
            translator_timeout: Duration::from_millis(config.translator_timeout_ms),
            validator_timeout: Duration::from_millis(config.validator_timeout_ms),
            suggestion_timeout: Duration::from_millis(config.suggestion_timeout_ms),
        }
    }
}

struct SessionGuard {
    write: Mutex<()>,
    cancel: RwLock<CancellationToken>,
}

impl SessionGuard {
    fn new() -> Self {
        Self {
            write: Mutex::new(()),
            cancel: RwLock::new(CancellationToken::new()),
        }
    }

    async fn token(&self) -> CancellationToken {
        self.cancel.read().await.clone()
    }

    async fn rotate(&self) {
        let mut current = self.cancel.write().await;
        current.cancel();
        *current = CancellationToken::new();
    }
}

/// Session state machine over a repository and its collaborators.
pub struct SessionService {
    repo: Arc<dyn SessionRepository>,
    translator: Arc<dyn Translator>,
    validator: Arc<dyn Validator>,
    curator: Arc<SuggestionCurator>,
    detector: AmbiguityDetector,
    engine: DeltaEngine,
    config: SessionServiceConfig,
    guards: Mutex<HashMap<Uuid, Arc<SessionGuard>>>,
}

impl SessionService {
    /// Service over `repo` and the collaborators.
    pub fn new(
        repo: Arc<dyn SessionRepository>,
        translator: Arc<dyn Translator>,
        validator: Arc<dyn Validator>,
        curator: Arc<SuggestionCurator>,
        config: SessionServiceConfig,
    ) -> Self {
        Self {
            repo,
            translator,
            validator,
            curator,
            detector: AmbiguityDetector::new(),
            engine: DeltaEngine::new(),
            config,
            guards: Mutex::new(HashMap::new()),
        }
    }

    /// The curator behind assists and rule feedback.
    pub fn curator(&self) -> &Arc<SuggestionCurator> {
        &self.curator
    }

    /// Translate `prompt` into draft v0 and open a session on it.
    #[instrument(skip(self), err)]
    pub async fn create(&self, prompt: &str) -> SessionResult<Session> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(TranslationError::EmptyPrompt.into());
        }

        let translation = timeout(self.config.translator_timeout, self.translator.translate(prompt))
            .await
            .map_err(|_| TranslationError::Timeout(millis(self.config.translator_timeout)))??;

        let mut ir = translation.ir;
        for hole in translation.holes {
            ir.holes.entry(hole.id.clone()).or_insert(hole);
        }
        check_translation(&ir)?;

        let open_holes = self.detector.open_hole_ids(&ir);
        let report = self.validate(&ir).await;
        let session = Session::new(prompt, Draft::initial(ir, report), open_holes);
        self.repo.create(&session).await?;

        info!(
            session_id = %session.id,
            translator = self.translator.name(),
            open_holes = session.open_holes.len(),
            "session created"
        );
        Ok(session)
    }

    /// Load a session with its drafts.
    pub async fn get(&self, id: Uuid) -> SessionResult<Session> {
        self.repo.get(id).await?.ok_or(SessionError::SessionNotFound(id))
    }

    /// Sessions newest first, optionally filtered by status.
    pub async fn list(&self, status: Option<SessionStatus>, limit: usize) -> SessionResult<Vec<Session>> {
        Ok(self.repo.list(status, limit).await?)
    }

    /// Resolve one open hole, appending exactly one draft on success.
    #[instrument(skip(self, resolution), fields(session_id = %id, resolution_type = %resolution.kind()), err)]
    pub async fn resolve_hole(&self, id: Uuid, hole_id: &str, resolution: Resolution) -> SessionResult<Session> {
        let guard = self.guard(id).await;
        let result = self.resolve_locked(&guard, id, hole_id, resolution).await;
        self.release(id, guard).await;
        result
    }

    async fn resolve_locked(
        &self,
        guard: &SessionGuard,
        id: Uuid,
        hole_id: &str,
        resolution: Resolution,
    ) -> SessionResult<Session> {
        let _write = guard.write.lock().await;

        let mut session = self.get(id).await?;
        ensure_active(&session)?;
        let invalid_hole = || SessionError::InvalidHole {
            session_id: id,
            hole_id: hole_id.to_string(),
        };
        if !session.open_holes.contains(hole_id) {
            return Err(invalid_hole());
        }

        let prior = latest(&session)?.clone();
        let hole = self
            .detector
            .detect(&prior.ir)
            .into_iter()
            .find(|h| h.id == hole_id)
            .ok_or_else(invalid_hole)?;

        let assist = match timeout(
            self.config.suggestion_timeout,
            self.curator.suggest_for_hole(&prior.ir, &hole, &session.prompt),
        )
        .await
        {
            Ok(assist) => Some(assist),
            Err(_) => {
                warn!(hole_id, "suggestion lookup timed out; recording no feedback");
                None
            }
        };
        let outcome = SuggestionCurator::classify(assist.as_ref(), resolution.text());
        let (produced_by, confidence) = match &outcome {
            FeedbackOutcome::Accepted { rule_id, confidence } => (Producer::Rule(rule_id.clone()), *confidence),
            _ => (Producer::User, 1.0),
        };

        let delta = self
            .engine
            .compute_delta(&prior, &hole, &resolution, produced_by, confidence)?;
        let next = self.engine.apply_delta(&prior, delta)?;

        let open_holes = self.detector.open_hole_ids(&next.ir);
        if open_holes.contains(hole_id) {
            return Err(SessionError::DeltaConflict(vec![format!(
                "hole '{hole_id}' is still open after its resolution"
            )]));
        }

        let report = self.validate(&next.ir).await;
        session.append_draft(next.with_validation(report), open_holes);
        self.repo.save(&session).await?;
        guard.rotate().await;

        self.curator.apply_feedback(&outcome).await;
        info!(
            hole_id,
            version = session.current_version(),
            open_holes = session.open_holes.len(),
            "hole resolved"
        );
        Ok(session)
    }

    /// Move the session to `finalized` once no hole is open and the latest
    /// draft is valid.
    #[instrument(skip(self), err)]
    pub async fn finalize(&self, id: Uuid) -> SessionResult<Session> {
        let guard = self.guard(id).await;
        let result = self.finalize_locked(&guard, id).await;
        self.release(id, guard).await;
        result
    }

    async fn finalize_locked(&self, guard: &SessionGuard, id: Uuid) -> SessionResult<Session> {
        let _write = guard.write.lock().await;

        let mut session = self.get(id).await?;
        ensure_active(&session)?;
        if !session.is_ready() {
            let draft = latest(&session)?;
            return Err(SessionError::NotReady {
                session_id: id,
                open_holes: session.open_holes.iter().cloned().collect(),
                validation_status: draft.validation_status,
                diagnostics: draft.diagnostics.clone(),
            });
        }

        session.finalize();
        self.repo.save(&session).await?;
        guard.rotate().await;

        info!(session_id = %id, version = session.current_version(), "session finalized");
        Ok(session)
    }

    /// Abandon the session. History is kept.
    #[instrument(skip(self), err)]
    pub async fn delete(&self, id: Uuid) -> SessionResult<Session> {
        let guard = self.guard(id).await;
        let result = self.delete_locked(&guard, id).await;
        self.release(id, guard).await;
        result
    }

    async fn delete_locked(&self, guard: &SessionGuard, id: Uuid) -> SessionResult<Session> {
        let _write = guard.write.lock().await;

        let mut session = self.get(id).await?;
        ensure_active(&session)?;
        session.abandon();
        self.repo.save(&session).await?;
        guard.rotate().await;

        info!(session_id = %id, "session abandoned");
        Ok(session)
    }

    /// Ranked assists for the holes open on the latest draft. Never mutates
    /// the session.
    ///
    /// Suggestion work is bounded by the suggestion timeout; on timeout every
    /// hole is reported with no suggestions. If a write lands while the work
    /// runs it is recomputed once from the new state. Holes resolved in the
    /// meantime are dropped from the result.
    #[instrument(skip(self), err)]
    pub async fn get_assists(&self, id: Uuid) -> SessionResult<Vec<AssistSuggestion>> {
        let guard = self.guard(id).await;
        let result = self.compute_assists(&guard, id).await;
        self.release(id, guard).await;
        result
    }

    async fn compute_assists(&self, guard: &SessionGuard, id: Uuid) -> SessionResult<Vec<AssistSuggestion>> {
        let mut retried = false;

        loop {
            // Taken before the snapshot so any later write cancels it.
            let token = guard.token().await;
            let snapshot = self.get(id).await?;
            if !snapshot.is_active() {
                return Ok(Vec::new());
            }
            let draft = latest(&snapshot)?;
            let holes: Vec<_> = self
                .detector
                .detect(&draft.ir)
                .into_iter()
                .filter(|h| snapshot.open_holes.contains(&h.id))
                .collect();

            let work = timeout(
                self.config.suggestion_timeout,
                self.curator.curate(&draft.ir, &holes, &snapshot.prompt),
            );
            // `None` when a write landed before the work finished.
            let finished = tokio::select! {
                () = token.cancelled() => None,
                result = work => Some(match result {
                    Ok(assists) => assists,
                    Err(_) => {
                        warn!("suggestion generation timed out; returning unknown confidence");
                        self.curator.unknown_assists(&draft.ir, &holes, &snapshot.prompt)
                    }
                }),
            };

            let assists = match finished {
                Some(assists) => assists,
                None if !retried => {
                    retried = true;
                    debug!("session changed during assist computation; recomputing");
                    continue;
                }
                None => self.curator.unknown_assists(&draft.ir, &holes, &snapshot.prompt),
            };

            let current = self.get(id).await?;
            if !current.is_active() {
                return Ok(Vec::new());
            }
            let still_open = assists
                .into_iter()
                .filter(|a| current.open_holes.contains(&a.hole_id))
                .collect();
            return Ok(SuggestionCurator::rank(still_open));
        }
    }

    /// Audit lines of every draft, oldest first.
    pub async fn history(&self, id: Uuid) -> SessionResult<Vec<HistoryEntry>> {
        Ok(self.get(id).await?.history())
    }

    /// The draft at `version`, exactly as it was appended.
    pub async fn draft_at(&self, id: Uuid, version: u32) -> SessionResult<Draft> {
        self.get(id)
            .await?
            .draft_at(version)
            .cloned()
            .ok_or(SessionError::DraftNotFound { session_id: id, version })
    }

    /// Re-run the validator on a latest draft whose verdict is `pending`.
    /// Drafts with a verdict are left untouched.
    #[instrument(skip(self), err)]
    pub async fn revalidate(&self, id: Uuid) -> SessionResult<Session> {
        let guard = self.guard(id).await;
        let result = self.revalidate_locked(&guard, id).await;
        self.release(id, guard).await;
        result
    }

    async fn revalidate_locked(&self, guard: &SessionGuard, id: Uuid) -> SessionResult<Session> {
        let _write = guard.write.lock().await;

        let mut session = self.get(id).await?;
        ensure_active(&session)?;
        let draft = latest(&session)?;
        if draft.validation_status != ValidationStatus::Pending {
            return Ok(session);
        }

        let report = self.validate(&draft.ir).await;
        if report.status != ValidationStatus::Pending && session.upgrade_pending_validation(report) {
            self.repo.save(&session).await?;
            guard.rotate().await;
            let status = latest(&session)?.validation_status;
            info!(session_id = %id, status = %status, "pending validation upgraded");
        }
        Ok(session)
    }

    async fn guard(&self, id: Uuid) -> Arc<SessionGuard> {
        let mut guards = self.guards.lock().await;
        guards.entry(id).or_insert_with(|| Arc::new(SessionGuard::new())).clone()
    }

    /// Drop the caller's handle and evict the guard once nobody else holds it.
    async fn release(&self, id: Uuid, guard: Arc<SessionGuard>) {
        let mut guards = self.guards.lock().await;
        drop(guard);
        if guards.get(&id).is_some_and(|g| Arc::strong_count(g) == 1) {
            guards.remove(&id);
        }
    }

    #[cfg(test)]
    async fn guard_count(&self) -> usize {
        self.guards.lock().await.len()
    }

    /// Validator verdict; errors and timeouts become `pending`.
    async fn validate(&self, ir: &IrDocument) -> ValidationReport {
        match timeout(self.config.validator_timeout, self.validator.validate(ir)).await {
            Ok(Ok(report)) => report,
            Ok(Err(e)) => {
                warn!(validator = self.validator.name(), "validator failed: {}", e);
                ValidationReport::pending(format!("validator error: {e}"))
            }
            Err(_) => {
                let ms = millis(self.config.validator_timeout);
                warn!(validator = self.validator.name(), "validator timed out after {} ms", ms);
                ValidationReport::pending(format!("validator timed out after {ms} ms"))
            }
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

fn ensure_active(session: &Session) -> SessionResult<()> {
    if session.is_active() {
        Ok(())
    } else {
        Err(SessionError::SessionClosed {
            session_id: session.id,
            status: session.status,
        })
    }
}

fn latest(session: &Session) -> SessionResult<&Draft> {
    session
        .latest_draft()
        .ok_or_else(|| DomainError::CorruptState(format!("session {} has no drafts", session.id)).into())
}

/// Reject translator output the engine could never work with.
fn check_translation(ir: &IrDocument) -> SessionResult<()> {
    ir.check_well_formed()
        .map_err(|problems| TranslationError::Malformed(problems.join("; ")))?;

    let refs = ir.placeholder_refs();
    let stranded: Vec<&str> = ir
        .holes
        .values()
        .filter(|h| h.is_open() && h.clause == Clause::Signature && !refs.contains_key(&h.id))
        .map(|h| h.id.as_str())
        .collect();
    if !stranded.is_empty() {
        return Err(TranslationError::Malformed(format!(
            "signature holes not referenced by any field: {}",
            stranded.join(", ")
        ))
        .into());
    }
    Ok(())
}
