//! Onboarding Service Binary
//!
//! Runs the manifest onboarding HTTP server.

use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::FmtSubscriber;

use onboard_core::TrustAnchor;
use onboard_registry::InMemoryRegistry;
use onboard_service::{create_router, AppState, ManifestPipeline, ServiceConfig};

#[tokio::main]
async fn main() {
    let config = ServiceConfig::from_env().expect("Invalid ONBOARD_* configuration");

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(config.log_filter())
        .with_target(true)
        .with_thread_ids(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    // Trust anchor: fatal if it cannot be loaded
    let anchor = match TrustAnchor::from_file(&config.trust_anchor_path) {
        Ok(anchor) => Arc::new(anchor),
        Err(e) => {
            error!(
                path = %config.trust_anchor_path.display(),
                kind = e.kind(),
                error = %e,
                "Failed to load trust anchor"
            );
            std::process::exit(1);
        }
    };

    // Initialize registry
    // TODO: Swap in a cloud registry gateway once one implements ProvisioningGateway
    let registry = Arc::new(InMemoryRegistry::new().with_policy(config.pipeline.policy_name.clone()));

    let pipeline = ManifestPipeline::new(anchor.clone(), registry.clone(), config.pipeline.clone());

    info!(
        anchor_kid = %anchor.key_identifier(),
        anchor_subject = %anchor.subject(),
        port = config.port,
        "Starting onboarding service"
    );

    // Create application state
    let state = Arc::new(AppState {
        pipeline,
        registry,
        max_body_bytes: config.max_body_bytes,
    });

    // Build router
    let app = create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    info!(addr = %addr, "Onboarding service listening");

    axum::serve(listener, app)
        .await
        .expect("Server error");
}
