//! HTTP surface for PointNote annotations.
//!
//! # Responsibility
//! - Route `GET/POST/DELETE /annotations` to the core service.
//! - Apply open CORS and per-request access logging.
//!
//! # See also
//! - `api` for handler-level contracts.

pub mod api;

use axum::extract::Request;
use axum::http::{header, Method};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{delete, get};
use axum::Router;
use log::info;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};

/// Shared, immutable router state.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Annotation store file opened once per request.
    pub db_path: Arc<PathBuf>,
}

impl AppState {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: Arc::new(db_path.into()),
        }
    }
}

/// Builds the annotation router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route(
            "/annotations",
            get(api::list_annotations)
                .post(api::create_annotation)
                .delete(api::delete_without_id),
        )
        .route("/annotations/", delete(api::delete_without_id))
        .route("/annotations/:id", delete(api::delete_annotation))
        .layer(middleware::from_fn(log_request))
        .layer(cors_layer())
        .with_state(state)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

async fn log_request(request: Request, next: Next) -> Response {
    let started_at = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    info!(
        "event=http_request module=api method={} path={} status={} duration_ms={}",
        method,
        path,
        response.status().as_u16(),
        started_at.elapsed().as_millis()
    );
    response
}
