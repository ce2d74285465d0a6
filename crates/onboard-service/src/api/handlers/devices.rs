//! Device listing handler

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use onboard_registry::IdentityRecord;

use super::AppState;

/// Response listing provisioned devices
#[derive(Debug, Serialize)]
pub struct ListDevicesResponse {
    /// Identities in creation order
    pub devices: Vec<IdentityRecord>,
    pub count: usize,
}

/// List device identities
///
/// GET /v1/devices
pub async fn list_devices(State(state): State<Arc<AppState>>) -> Json<ListDevicesResponse> {
    let devices = state.registry.list_identities();
    Json(ListDevicesResponse {
        count: devices.len(),
        devices,
    })
}
