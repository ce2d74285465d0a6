//! Manifest Upload Handler

use axum::{body::Bytes, extract::State, Json};
use std::sync::Arc;
use tracing::{info, warn};

use onboard_core::Manifest;

use crate::api::error::ApiError;
use crate::pipeline::BatchReport;

use super::AppState;

/// Verify a manifest and provision its devices
///
/// POST /v1/manifest
///
/// The body must be a JSON array of manifest entries. Anything else is
/// rejected before any entry is looked at. Once the array is accepted the
/// response is always 200: entries that fail are listed in the report.
pub async fn upload_manifest(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<BatchReport>, ApiError> {
    let manifest = Manifest::from_json(&body).map_err(|e| {
        warn!(bytes = body.len(), error = %e, "Rejected manifest upload");
        ApiError::from(e)
    })?;

    info!(entries = manifest.len(), "Manifest upload accepted");
    let report = state.pipeline.process(manifest).await;

    Ok(Json(report))
}
