//! HTTP handlers for the annotation endpoints.
//!
//! # Responsibility
//! - Translate HTTP requests into `AnnotationService` calls.
//! - Shape every outcome into the uniform `ApiEnvelope`.
//!
//! # Invariants
//! - Handlers share no mutable state; each request opens its own store
//!   connection and drops it when the response is produced.
//! - Blocking store work never runs on an async worker thread.
//! - Validation failures map to 400, everything else to 500.

use crate::AppState;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use log::{error, warn};
use pointnote_core::db::open_db;
use pointnote_core::{
    core_version, AnnotationService, ApiEnvelope, CreateAnnotationInput, RepoError,
    ServiceError, SqliteAnnotationRepository,
};
use serde_json::{json, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use tokio::task::JoinError;

const CREATE_FAILED: &str = "Failed to create annotation";
const LIST_FAILED: &str = "Failed to retrieve annotations";
const DELETE_FAILED: &str = "Failed to delete annotation";

pub type ApiResponse = (StatusCode, Json<ApiEnvelope>);

/// Failure of a single request before an envelope is chosen.
#[derive(Debug)]
pub enum ApiError {
    /// The body is not a JSON object.
    MalformedBody(String),
    Service(ServiceError),
    /// The blocking store task panicked or was cancelled.
    Join(JoinError),
}

impl ApiError {
    fn is_client_fault(&self) -> bool {
        match self {
            Self::MalformedBody(_) => true,
            Self::Service(err) => err.is_validation(),
            Self::Join(_) => false,
        }
    }

    /// Maps this error to a status and envelope. `summary` is the stable
    /// `error` string used for server faults.
    fn into_response(self, summary: &'static str) -> ApiResponse {
        if self.is_client_fault() {
            warn!(
                "event=http_reject module=api status=400 reason={}",
                self
            );
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiEnvelope::rejected(self.to_string())),
            );
        }

        error!(
            "event=http_fail module=api status=500 summary={:?} error={}",
            summary, self
        );
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiEnvelope::failed(summary, self.to_string())),
        )
    }
}

impl Display for ApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedBody(message) => write!(f, "invalid request body: {message}"),
            Self::Service(err) => write!(f, "{err}"),
            Self::Join(err) => write!(f, "store task failed: {err}"),
        }
    }
}

impl Error for ApiError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::MalformedBody(_) => None,
            Self::Service(err) => Some(err),
            Self::Join(err) => Some(err),
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(value: ServiceError) -> Self {
        Self::Service(value)
    }
}

/// `POST /annotations`
pub async fn create_annotation(State(state): State<AppState>, body: Bytes) -> ApiResponse {
    let input = match parse_create_body(&body) {
        Ok(input) => input,
        Err(err) => return err.into_response(CREATE_FAILED),
    };

    match with_annotation_service(&state, move |service| service.create_annotation(&input)).await
    {
        Ok(annotation) => (StatusCode::CREATED, Json(ApiEnvelope::created(annotation))),
        Err(err) => err.into_response(CREATE_FAILED),
    }
}

/// `GET /annotations`
pub async fn list_annotations(State(state): State<AppState>) -> ApiResponse {
    match with_annotation_service(&state, |service| service.list_annotations()).await {
        Ok(annotations) => (StatusCode::OK, Json(ApiEnvelope::listed(annotations))),
        Err(err) => err.into_response(LIST_FAILED),
    }
}

/// `DELETE /annotations/{id}`
///
/// Succeeds whether or not the id existed.
pub async fn delete_annotation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResponse {
    match with_annotation_service(&state, move |service| service.delete_annotation(&id)).await {
        Ok(()) => (StatusCode::OK, Json(ApiEnvelope::deleted())),
        Err(err) => err.into_response(DELETE_FAILED),
    }
}

/// `DELETE /annotations` and `DELETE /annotations/` with no id segment.
pub async fn delete_without_id(State(state): State<AppState>) -> ApiResponse {
    // Routed through the service so the missing-id rule lives in one place.
    delete_annotation(State(state), Path(String::new())).await
}

/// `GET /health`
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": core_version(),
    }))
}

/// Parses a create body. An empty body is treated as an empty object so the
/// service reports the missing fields.
fn parse_create_body(body: &[u8]) -> Result<CreateAnnotationInput, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(CreateAnnotationInput::default());
    }
    serde_json::from_slice(body).map_err(|err| ApiError::MalformedBody(err.to_string()))
}

/// Opens a request-scoped store connection on the blocking pool and runs `op`.
async fn with_annotation_service<T, F>(state: &AppState, op: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: for<'conn> FnOnce(
            &AnnotationService<SqliteAnnotationRepository<'conn>>,
        ) -> Result<T, ServiceError>
        + Send
        + 'static,
{
    let db_path = Arc::clone(&state.db_path);
    let outcome = tokio::task::spawn_blocking(move || {
        let conn = open_db(db_path.as_path()).map_err(RepoError::from)?;
        let service = AnnotationService::new(SqliteAnnotationRepository::new(&conn));
        op(&service)
    })
    .await
    .map_err(ApiError::Join)?;

    outcome.map_err(ApiError::from)
}

#[cfg(test)]
mod tests {
    use super::{parse_create_body, ApiError};

    #[test]
    fn blank_body_parses_as_empty_input() {
        let input = parse_create_body(b"  \n").unwrap();
        assert!(input.x.is_none() && input.text.is_none());
    }

    #[test]
    fn malformed_body_is_a_client_fault() {
        let err = parse_create_body(b"{not json").unwrap_err();
        assert!(matches!(err, ApiError::MalformedBody(_)));
        assert!(err.is_client_fault());
    }

    #[test]
    fn non_object_body_is_rejected() {
        assert!(parse_create_body(b"[1, 2, 3]").is_err());
    }
}
