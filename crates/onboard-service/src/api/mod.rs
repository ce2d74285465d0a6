//! API module for the onboarding service

pub mod error;
pub mod handlers;

use axum::{
    extract::{DefaultBodyLimit, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use handlers::AppState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Readiness check response
#[derive(Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub anchor_kid: String,
    pub anchor_fingerprint: String,
    pub anchor_subject: String,
    pub gateway: String,
    pub device_count: usize,
}

/// Health check endpoint
///
/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

/// Readiness check endpoint
///
/// GET /ready
pub async fn ready(State(state): State<Arc<AppState>>) -> Json<ReadyResponse> {
    let anchor = state.pipeline.anchor();

    Json(ReadyResponse {
        ready: true,
        anchor_kid: anchor.key_identifier().to_string(),
        anchor_fingerprint: anchor.fingerprint().to_string(),
        anchor_subject: anchor.subject().to_string(),
        gateway: state.pipeline.gateway().description().to_string(),
        device_count: state.registry.identity_count(),
    })
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health endpoints
        .route("/health", get(health))
        .route("/ready", get(ready))
        // Manifest upload
        .route("/v1/manifest", post(handlers::upload_manifest))
        // Registry read side
        .route("/v1/devices", get(handlers::list_devices))
        // Middleware
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(state.max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
