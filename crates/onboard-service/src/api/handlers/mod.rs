//! API request handlers

pub mod devices;
pub mod manifest;

use std::sync::Arc;

use onboard_registry::InMemoryRegistry;

use crate::pipeline::ManifestPipeline;

pub use devices::{list_devices, ListDevicesResponse};
pub use manifest::upload_manifest;

/// Application state shared across handlers
pub struct AppState {
    /// Verification and provisioning for uploaded manifests
    pub pipeline: ManifestPipeline,
    /// Registry read side, for device listings
    pub registry: Arc<InMemoryRegistry>,
    /// Request body limit for manifest uploads
    pub max_body_bytes: usize,
}
