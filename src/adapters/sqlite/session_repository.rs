//! SQLite implementation of the SessionRepository.

use std::collections::BTreeSet;

use async_trait::async_trait;
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use uuid::Uuid;

use crate::adapters::sqlite::{format_datetime, parse_datetime, parse_json, parse_optional_datetime, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Draft, IrDocument, Session, SessionStatus, ValidationStatus};
use crate::domain::ports::SessionRepository;

/// Sessions and their drafts stored in SQLite.
#[derive(Clone)]
pub struct SqliteSessionRepository {
    pool: SqlitePool,
}

impl SqliteSessionRepository {
    /// Repository over `pool`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn load_drafts(conn: &mut SqliteConnection, session_id: &str) -> DomainResult<Vec<Draft>> {
        let rows: Vec<DraftRow> =
            sqlx::query_as("SELECT * FROM drafts WHERE session_id = ? ORDER BY version ASC")
                .bind(session_id)
                .fetch_all(conn)
                .await?;

        rows.into_iter().map(row_to_draft).collect()
    }

    async fn hydrate(conn: &mut SqliteConnection, row: SessionRow) -> DomainResult<Session> {
        let drafts = Self::load_drafts(conn, &row.id).await?;
        row_to_session(row, drafts)
    }

    /// Reject a writer whose view of the history is behind the stored one.
    ///
    /// The last stored draft must be the draft the writer holds at the same
    /// version; anything past it is new.
    async fn check_not_stale(tx: &mut Transaction<'_, Sqlite>, id: &str, session: &Session) -> DomainResult<()> {
        let (stored,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM drafts WHERE session_id = ?")
            .bind(id)
            .fetch_one(&mut **tx)
            .await?;
        let stored = usize::try_from(stored).unwrap_or(0);
        if session.drafts.len() < stored {
            return Err(DomainError::Conflict(format!(
                "session {id} would drop stored drafts ({} < {stored})",
                session.drafts.len()
            )));
        }

        let Some(held) = stored.checked_sub(1).and_then(|i| session.drafts.get(i)) else {
            return Ok(());
        };
        let (ir, created_at): (String, String) =
            sqlx::query_as("SELECT ir, created_at FROM drafts WHERE session_id = ? AND version = ?")
                .bind(id)
                .bind(i64::from(held.version))
                .fetch_one(&mut **tx)
                .await?;
        let stored_ir: IrDocument = parse_json(&ir)?;
        if stored_ir != held.ir || created_at != format_datetime(&held.created_at) {
            return Err(DomainError::Conflict(format!(
                "session {id} draft v{} was written by another writer",
                held.version
            )));
        }
        Ok(())
    }

    async fn insert_drafts(
        tx: &mut Transaction<'_, Sqlite>,
        session_id: &str,
        drafts: &[Draft],
    ) -> DomainResult<()> {
        for draft in drafts {
            let delta = draft.delta.as_ref().map(serde_json::to_string).transpose()?;

            // Stored drafts only change while their verdict is pending.
            sqlx::query(
                r#"INSERT INTO drafts
                   (session_id, version, ir, validation_status, diagnostics, delta, created_at)
                   VALUES (?, ?, ?, ?, ?, ?, ?)
                   ON CONFLICT(session_id, version) DO UPDATE SET
                       validation_status = excluded.validation_status,
                       diagnostics = excluded.diagnostics
                   WHERE drafts.validation_status = 'pending'
                     AND excluded.validation_status != 'pending'"#,
            )
            .bind(session_id)
            .bind(i64::from(draft.version))
            .bind(serde_json::to_string(&draft.ir)?)
            .bind(draft.validation_status.as_str())
            .bind(serde_json::to_string(&draft.diagnostics)?)
            .bind(delta)
            .bind(format_datetime(&draft.created_at))
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SessionRow {
    id: String,
    prompt: String,
    status: String,
    open_holes: String,
    created_at: String,
    updated_at: String,
    finalized_at: Option<String>,
    abandoned_at: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct DraftRow {
    #[allow(dead_code)]
    session_id: String,
    version: i64,
    ir: String,
    validation_status: String,
    diagnostics: String,
    delta: Option<String>,
    created_at: String,
}

fn row_to_session(row: SessionRow, drafts: Vec<Draft>) -> DomainResult<Session> {
    let status = SessionStatus::from_str(&row.status)
        .ok_or_else(|| DomainError::SerializationError(format!("Unknown session status: {}", row.status)))?;
    let open_holes: BTreeSet<String> = parse_json(&row.open_holes)?;

    if drafts.is_empty() {
        return Err(DomainError::CorruptState(format!("session {} has no drafts", row.id)));
    }

    Ok(Session {
        id: parse_uuid(&row.id)?,
        prompt: row.prompt,
        status,
        drafts,
        open_holes,
        created_at: parse_datetime(&row.created_at)?,
        updated_at: parse_datetime(&row.updated_at)?,
        finalized_at: parse_optional_datetime(row.finalized_at)?,
        abandoned_at: parse_optional_datetime(row.abandoned_at)?,
    })
}

fn row_to_draft(row: DraftRow) -> DomainResult<Draft> {
    let version = u32::try_from(row.version)
        .map_err(|_| DomainError::SerializationError(format!("Invalid draft version: {}", row.version)))?;
    let validation_status = ValidationStatus::from_str(&row.validation_status).ok_or_else(|| {
        DomainError::SerializationError(format!("Unknown validation status: {}", row.validation_status))
    })?;

    Ok(Draft {
        version,
        ir: parse_json(&row.ir)?,
        validation_status,
        diagnostics: parse_json(&row.diagnostics)?,
        delta: row.delta.as_deref().map(parse_json).transpose()?,
        created_at: parse_datetime(&row.created_at)?,
    })
}

#[async_trait]
impl SessionRepository for SqliteSessionRepository {
    async fn create(&self, session: &Session) -> DomainResult<()> {
        let id = session.id.to_string();
        let mut tx = self.pool.begin().await?;

        let existing: Option<(String,)> = sqlx::query_as("SELECT id FROM sessions WHERE id = ?")
            .bind(&id)
            .fetch_optional(&mut *tx)
            .await?;
        if existing.is_some() {
            return Err(DomainError::Conflict(format!("session {id} already exists")));
        }

        sqlx::query(
            r#"INSERT INTO sessions
               (id, prompt, status, open_holes, created_at, updated_at, finalized_at, abandoned_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&id)
        .bind(&session.prompt)
        .bind(session.status.as_str())
        .bind(serde_json::to_string(&session.open_holes)?)
        .bind(format_datetime(&session.created_at))
        .bind(format_datetime(&session.updated_at))
        .bind(session.finalized_at.as_ref().map(format_datetime))
        .bind(session.abandoned_at.as_ref().map(format_datetime))
        .execute(&mut *tx)
        .await?;

        Self::insert_drafts(&mut tx, &id, &session.drafts).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Session>> {
        // One read transaction so the row and its drafts come from the same snapshot.
        let mut tx = self.pool.begin().await?;
        let row: Option<SessionRow> = sqlx::query_as("SELECT * FROM sessions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&mut *tx)
            .await?;

        let session = match row {
            Some(row) => Some(Self::hydrate(&mut *tx, row).await?),
            None => None,
        };
        tx.commit().await?;
        Ok(session)
    }

    async fn list(&self, status: Option<SessionStatus>, limit: usize) -> DomainResult<Vec<Session>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut tx = self.pool.begin().await?;
        let rows: Vec<SessionRow> = match status {
            Some(status) => {
                sqlx::query_as(
                    "SELECT * FROM sessions WHERE status = ? ORDER BY created_at DESC, id ASC LIMIT ?",
                )
                .bind(status.as_str())
                .bind(limit)
                .fetch_all(&mut *tx)
                .await?
            }
            None => {
                sqlx::query_as("SELECT * FROM sessions ORDER BY created_at DESC, id ASC LIMIT ?")
                    .bind(limit)
                    .fetch_all(&mut *tx)
                    .await?
            }
        };

        let mut sessions = Vec::with_capacity(rows.len());
        for row in rows {
            sessions.push(Self::hydrate(&mut *tx, row).await?);
        }
        tx.commit().await?;
        Ok(sessions)
    }

    async fn save(&self, session: &Session) -> DomainResult<()> {
        let id = session.id.to_string();
        let mut tx = self.pool.begin().await?;

        // Writing first takes the write lock before anything is read.
        let result = sqlx::query(
            r#"UPDATE sessions SET
               status = ?, open_holes = ?, updated_at = ?, finalized_at = ?, abandoned_at = ?
               WHERE id = ? AND (status = 'active' OR status = ?)"#,
        )
        .bind(session.status.as_str())
        .bind(serde_json::to_string(&session.open_holes)?)
        .bind(format_datetime(&session.updated_at))
        .bind(session.finalized_at.as_ref().map(format_datetime))
        .bind(session.abandoned_at.as_ref().map(format_datetime))
        .bind(&id)
        .bind(session.status.as_str())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            let stored: Option<(String,)> = sqlx::query_as("SELECT status FROM sessions WHERE id = ?")
                .bind(&id)
                .fetch_optional(&mut *tx)
                .await?;
            return Err(match stored {
                Some((status,)) => DomainError::Conflict(format!(
                    "session {id} is already {status}; cannot become {}",
                    session.status
                )),
                None => DomainError::NotFound {
                    entity: "session",
                    id,
                },
            });
        }

        Self::check_not_stale(&mut tx, &id, session).await?;
        Self::insert_drafts(&mut tx, &id, &session.drafts).await?;
        tx.commit().await?;
        Ok(())
    }
}
