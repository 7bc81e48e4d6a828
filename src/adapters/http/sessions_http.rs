//! Sessions HTTP Server.
//!
//! REST surface used by the UI: create and list sessions, resolve holes,
//! fetch assists, finalize, abandon, and inspect draft history.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::domain::errors::SessionError;
use crate::domain::models::{
    AssistSuggestion, Draft, HistoryEntry, InferenceRule, Resolution, ServerConfig, Session, SessionStatus,
};
use crate::domain::ports::RuleRegistry;
use crate::services::SessionService;

/// Configuration for the sessions HTTP server.
#[derive(Debug, Clone)]
pub struct SessionsHttpConfig {
    /// Host to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Whether to enable CORS.
    pub enable_cors: bool,
}

impl Default for SessionsHttpConfig {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

impl From<&ServerConfig> for SessionsHttpConfig {
    fn from(config: &ServerConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            enable_cors: config.enable_cors,
        }
    }
}

/// Request to open a session.
#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    /// Prompt to translate
    pub prompt: String,
}

/// Query parameters for session listing.
#[derive(Debug, Deserialize)]
pub struct SessionQueryParams {
    /// Only sessions with this status
    #[serde(default)]
    pub status: Option<String>,
    /// Page size
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

/// Inference rule with its current confidence.
#[derive(Debug, Serialize)]
pub struct RuleResponse {
    /// The stored rule
    #[serde(flatten)]
    pub rule: InferenceRule,
    /// Confidence derived from usage
    pub confidence: f64,
}

impl From<InferenceRule> for RuleResponse {
    fn from(rule: InferenceRule) -> Self {
        let confidence = rule.confidence();
        Self { rule, confidence }
    }
}

/// Error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable message
    pub error: String,
    /// Stable error code
    pub code: String,
    /// Structured context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<T, ApiError>;

/// Map a session failure to its HTTP status and body.
pub fn error_response(err: &SessionError) -> ApiError {
    let status = match err {
        SessionError::SessionNotFound(_) | SessionError::DraftNotFound { .. } => StatusCode::NOT_FOUND,
        SessionError::InvalidHole { .. }
        | SessionError::SessionClosed { .. }
        | SessionError::DeltaConflict(_)
        | SessionError::NotReady { .. } => StatusCode::CONFLICT,
        SessionError::InvalidResolution { .. } => StatusCode::BAD_REQUEST,
        SessionError::Translation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        SessionError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let details = match err {
        SessionError::NotReady {
            open_holes,
            validation_status,
            diagnostics,
            ..
        } => Some(serde_json::json!({
            "open_holes": open_holes,
            "validation_status": validation_status,
            "diagnostics": diagnostics,
        })),
        SessionError::DeltaConflict(problems) => Some(serde_json::json!({ "problems": problems })),
        SessionError::InvalidResolution { expected, got, detail, .. } => Some(serde_json::json!({
            "expected": expected,
            "got": got,
            "detail": detail,
        })),
        _ => None,
    };

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!(error = %err, "session request failed");
    }

    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
            code: err.code().to_string(),
            details,
        }),
    )
}

fn reject(err: SessionError) -> ApiError {
    error_response(&err)
}

/// Shared state for the sessions HTTP server.
struct AppState {
    service: Arc<SessionService>,
    registry: Arc<dyn RuleRegistry>,
}

/// Sessions HTTP Server.
pub struct SessionsHttpServer {
    config: SessionsHttpConfig,
    service: Arc<SessionService>,
    registry: Arc<dyn RuleRegistry>,
}

impl SessionsHttpServer {
    /// Server over `service` and `registry`.
    pub fn new(service: Arc<SessionService>, registry: Arc<dyn RuleRegistry>, config: SessionsHttpConfig) -> Self {
        Self {
            config,
            service,
            registry,
        }
    }

    /// Build the router.
    pub fn router(&self) -> Router {
        let state = Arc::new(AppState {
            service: Arc::clone(&self.service),
            registry: Arc::clone(&self.registry),
        });

        let app = Router::new()
            .route("/sessions", post(create_session).get(list_sessions))
            .route("/sessions/{id}", get(get_session).delete(delete_session))
            .route("/sessions/{id}/holes/{hole_id}/resolve", post(resolve_hole))
            .route("/sessions/{id}/assists", get(get_assists))
            .route("/sessions/{id}/finalize", post(finalize_session))
            .route("/sessions/{id}/validate", post(revalidate_session))
            .route("/sessions/{id}/history", get(get_history))
            .route("/sessions/{id}/drafts/{version}", get(get_draft))
            .route("/rules", get(list_rules))
            .route("/health", get(health_check))
            .with_state(state);

        if self.config.enable_cors {
            app.layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
                .layer(TraceLayer::new_for_http())
        } else {
            app.layer(TraceLayer::new_for_http())
        }
    }

    /// Start the server.
    pub async fn serve(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.serve_with_shutdown(std::future::pending()).await
    }

    /// Start the server with a shutdown signal.
    pub async fn serve_with_shutdown<F>(self, shutdown: F) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port).parse()?;
        let router = self.router();

        tracing::info!("Specforge HTTP server listening on {}", addr);

        let listener = TcpListener::bind(addr).await?;
        axum::serve(listener, router).with_graceful_shutdown(shutdown).await?;
        Ok(())
    }
}

// Handler functions

async fn health_check() -> &'static str {
    "OK"
}

async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateSessionRequest>,
) -> ApiResult<(StatusCode, Json<Session>)> {
    let session = state.service.create(&req.prompt).await.map_err(reject)?;
    Ok((StatusCode::CREATED, Json(session)))
}

async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SessionQueryParams>,
) -> ApiResult<Json<Vec<Session>>> {
    let status = match params.status.as_deref() {
        None => None,
        Some(s) => Some(SessionStatus::from_str(s).ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: format!("Unknown session status: {s}"),
                    code: "INVALID_QUERY".to_string(),
                    details: None,
                }),
            )
        })?),
    };

    let sessions = state.service.list(status, params.limit).await.map_err(reject)?;
    Ok(Json(sessions))
}

async fn get_session(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> ApiResult<Json<Session>> {
    state.service.get(id).await.map(Json).map_err(reject)
}

async fn delete_session(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    state.service.delete(id).await.map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn resolve_hole(
    State(state): State<Arc<AppState>>,
    Path((id, hole_id)): Path<(Uuid, String)>,
    Json(resolution): Json<Resolution>,
) -> ApiResult<Json<Session>> {
    state
        .service
        .resolve_hole(id, &hole_id, resolution)
        .await
        .map(Json)
        .map_err(reject)
}

async fn get_assists(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<AssistSuggestion>>> {
    state.service.get_assists(id).await.map(Json).map_err(reject)
}

async fn finalize_session(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> ApiResult<Json<Session>> {
    state.service.finalize(id).await.map(Json).map_err(reject)
}

async fn revalidate_session(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> ApiResult<Json<Session>> {
    state.service.revalidate(id).await.map(Json).map_err(reject)
}

async fn get_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<HistoryEntry>>> {
    state.service.history(id).await.map(Json).map_err(reject)
}

async fn get_draft(
    State(state): State<Arc<AppState>>,
    Path((id, version)): Path<(Uuid, u32)>,
) -> ApiResult<Json<Draft>> {
    state.service.draft_at(id, version).await.map(Json).map_err(reject)
}

async fn list_rules(State(state): State<Arc<AppState>>) -> Json<Vec<RuleResponse>> {
    let rules = state.registry.list().await;
    Json(rules.into_iter().map(RuleResponse::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::TranslationError;
    use crate::domain::models::{ResolutionType, ValidationStatus};

    #[test]
    fn test_error_status_mapping() {
        let id = Uuid::nil();
        let cases = [
            (SessionError::SessionNotFound(id), StatusCode::NOT_FOUND),
            (
                SessionError::InvalidHole {
                    session_id: id,
                    hole_id: "h".into(),
                },
                StatusCode::CONFLICT,
            ),
            (SessionError::DeltaConflict(vec!["x".into()]), StatusCode::CONFLICT),
            (TranslationError::EmptyPrompt.into(), StatusCode::UNPROCESSABLE_ENTITY),
            (
                SessionError::InvalidResolution {
                    hole_id: "h".into(),
                    expected: vec![ResolutionType::SpecifyType],
                    got: ResolutionType::NameEntity,
                    detail: None,
                },
                StatusCode::BAD_REQUEST,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(error_response(&err).0, expected, "{err}");
        }
    }

    #[test]
    fn test_not_ready_body_carries_blockers() {
        let (status, Json(body)) = error_response(&SessionError::NotReady {
            session_id: Uuid::nil(),
            open_holes: vec!["hole_param_type".into()],
            validation_status: ValidationStatus::Invalid,
            diagnostics: vec!["placeholder".into()],
        });
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.code, "NOT_READY");
        let details = body.details.unwrap();
        assert_eq!(details["open_holes"][0], "hole_param_type");
        assert_eq!(details["validation_status"], "invalid");
    }
}
