//! Domain errors for the Specforge session engine.

use thiserror::Error;
use uuid::Uuid;

use super::models::{ResolutionType, SessionStatus, ValidationStatus};

fn join(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}

fn join_types(items: &[ResolutionType]) -> String {
    items
        .iter()
        .map(ResolutionType::as_str)
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Storage and serialization failures.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The store rejected or failed a query
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// A stored value could not be encoded or decoded
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// No record with this id
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Record kind, e.g. `session`
        entity: &'static str,
        /// Requested id
        id: String,
    },

    /// The write disagrees with what is already stored
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Stored data violates an invariant
    #[error("Corrupt state: {0}")]
    CorruptState(String),
}

/// Result of a storage operation.
pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}

/// Why the translator could not produce a draft.
#[derive(Debug, Error)]
pub enum TranslationError {
    /// Nothing to translate
    #[error("prompt is empty")]
    EmptyPrompt,

    /// No answer within the configured milliseconds
    #[error("translator timed out after {0} ms")]
    Timeout(u64),

    /// The translator could not be reached or refused the request
    #[error("translator unavailable: {0}")]
    Unavailable(String),

    /// The returned document is not well-formed
    #[error("translator produced malformed IR: {0}")]
    Malformed(String),
}

/// Failures surfaced by session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The prompt could not be turned into draft v0
    #[error("Translation failed: {0}")]
    Translation(#[from] TranslationError),

    /// No session with this id
    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),

    /// The hole is unknown or already resolved
    #[error("Hole '{hole_id}' is not open in session {session_id}")]
    InvalidHole {
        /// Session the resolution targeted
        session_id: Uuid,
        /// Requested hole
        hole_id: String,
    },

    /// The session is finalized or abandoned
    #[error("Session {session_id} is {status}; no further changes accepted")]
    SessionClosed {
        /// The closed session
        session_id: Uuid,
        /// Its terminal status
        status: SessionStatus,
    },

    /// A delta could not be applied; one message per problem
    #[error("Delta conflict: {}", join(.0))]
    DeltaConflict(Vec<String>),

    /// Holes are open or the latest draft is not valid
    #[error(
        "Session {session_id} is not ready to finalize: open holes [{}], validation {validation_status} ({})",
        join(.open_holes),
        join(.diagnostics)
    )]
    NotReady {
        /// The session asked to finalize
        session_id: Uuid,
        /// Holes still open
        open_holes: Vec<String>,
        /// Verdict of the latest draft
        validation_status: ValidationStatus,
        /// Diagnostics of the latest draft
        diagnostics: Vec<String>,
    },

    /// The resolution's type or text does not fit the hole
    #[error("Resolution {got} cannot resolve hole '{hole_id}' (expected {})", join_types(.expected))]
    InvalidResolution {
        /// Targeted hole
        hole_id: String,
        /// Types the hole accepts
        expected: Vec<ResolutionType>,
        /// Type that was submitted
        got: ResolutionType,
        /// Why the text was rejected, when the type fits
        detail: Option<String>,
    },

    /// No draft at this version
    #[error("Draft v{version} not found in session {session_id}")]
    DraftNotFound {
        /// Session searched
        session_id: Uuid,
        /// Requested version
        version: u32,
    },

    /// The session store failed
    #[error(transparent)]
    Storage(#[from] DomainError),
}

/// Result of a session operation.
pub type SessionResult<T> = Result<T, SessionError>;

impl SessionError {
    /// Stable machine-readable code used by the HTTP and CLI surfaces.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Translation(_) => "TRANSLATION_ERROR",
            Self::SessionNotFound(_) => "SESSION_NOT_FOUND",
            Self::InvalidHole { .. } => "INVALID_HOLE",
            Self::SessionClosed { .. } => "SESSION_CLOSED",
            Self::DeltaConflict(_) => "DELTA_CONFLICT",
            Self::NotReady { .. } => "NOT_READY",
            Self::InvalidResolution { .. } => "INVALID_RESOLUTION",
            Self::DraftNotFound { .. } => "DRAFT_NOT_FOUND",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_ready_lists_blockers() {
        let err = SessionError::NotReady {
            session_id: Uuid::nil(),
            open_holes: vec!["hole_param_type".into()],
            validation_status: ValidationStatus::Invalid,
            diagnostics: vec!["placeholder remains".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("hole_param_type"));
        assert!(msg.contains("invalid"));
        assert!(msg.contains("placeholder remains"));
        assert_eq!(err.code(), "NOT_READY");
    }

    #[test]
    fn test_invalid_resolution_message() {
        let err = SessionError::InvalidResolution {
            hole_id: "h".into(),
            expected: vec![ResolutionType::SpecifyType],
            got: ResolutionType::NameEntity,
            detail: None,
        };
        assert_eq!(
            err.to_string(),
            "Resolution name_entity cannot resolve hole 'h' (expected specify_type)"
        );
    }

    #[test]
    fn test_translation_error_converts() {
        let err: SessionError = TranslationError::Timeout(50).into();
        assert!(matches!(err, SessionError::Translation(TranslationError::Timeout(50))));
        assert_eq!(err.code(), "TRANSLATION_ERROR");
    }
}
