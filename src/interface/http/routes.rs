use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use bytes::Bytes;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::application::FactoryRegistry;
use crate::ports::Manager;

use super::api::{api_versions, ApiRequest, ApiVersion};
use super::ApiError;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<dyn Manager>,
    pub registry: Arc<FactoryRegistry>,
    pub versions: Arc<Vec<Arc<dyn ApiVersion>>>,
}

impl AppState {
    fn supported_versions(&self) -> Vec<String> {
        self.versions.iter().map(|v| v.version().to_string()).collect()
    }
}

pub fn create_router(manager: Arc<dyn Manager>, registry: Arc<FactoryRegistry>) -> Router {
    let state = AppState {
        manager,
        registry,
        versions: Arc::new(api_versions()),
    };

    Router::new()
        .route("/healthz", get(health_handler))
        .route("/validate", get(validate_handler))
        .route("/api", get(api_root_handler).post(api_root_handler))
        .route("/api/", get(api_root_handler).post(api_root_handler))
        .route("/api/{*path}", get(api_handler).post(api_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Handler for GET /healthz
async fn health_handler() -> &'static str {
    "ok"
}

/// Handler for GET /validate
async fn validate_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.registry.debug_info())
}

async fn api_root_handler(State(state): State<AppState>) -> ApiError {
    ApiError::MissingVersion(state.supported_versions())
}

/// Handler for /api/<version>/<request type>[/<container path>]
async fn api_handler(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Query(query): Query<Vec<(String, String)>>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let mut elements = path.split('/');

    let version = elements.next().unwrap_or_default();
    if version.is_empty() {
        return Err(ApiError::MissingVersion(state.supported_versions()));
    }
    let api = state
        .versions
        .iter()
        .find(|v| v.version() == version)
        .ok_or_else(|| ApiError::UnsupportedVersion {
            version: version.to_string(),
            supported: state.supported_versions(),
        })?;

    let request_type = elements
        .next()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Incomplete(format!("/api/{}", path)))?;
    let segments: Vec<String> = elements.map(str::to_string).collect();

    api.handle_request(
        request_type,
        &segments,
        &state.manager,
        &ApiRequest::new(query, body),
    )
    .await
}
