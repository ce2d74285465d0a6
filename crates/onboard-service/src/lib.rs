//! Onboarding Service
//!
//! HTTP front end for secure-element onboarding. A manufacturer uploads a
//! signed manifest; the service verifies every entry against the configured
//! trust anchor and provisions a device identity for each entry that passes.
//!
//! ## Processing
//!
//! - Entries are processed one at a time, last entry first
//! - A failing entry is reported and skipped; the rest of the batch proceeds
//! - Every gateway call is bounded by the configured timeout
//!
//! ## API Endpoints
//!
//! - `GET /health` - Liveness check
//! - `GET /ready` - Readiness check with trust anchor info
//! - `POST /v1/manifest` - Verify a manifest and provision its devices
//! - `GET /v1/devices` - List provisioned device identities

pub mod api;
pub mod config;
pub mod pipeline;

pub use api::create_router;
pub use api::handlers::AppState;
pub use config::{ConfigError, PipelineConfig, ServiceConfig};
pub use pipeline::{BatchReport, EntryFailure, EntryOutcome, EntryResult, EntryStep, ManifestPipeline};
