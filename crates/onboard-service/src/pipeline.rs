//! Manifest processing pipeline
//!
//! For every entry, last to first:
//!
//! 1. Decode the entry
//! 2. Verify it against the trust anchor
//! 3. Extract the certificate chain from the verified payload
//! 4. Provision the device through the gateway:
//!    register certificate, attach policy, activate, create identity, bind
//!
//! A failure at any step is recorded against the entry and the batch moves
//! on to the next one. Entries are handled strictly one at a time.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use onboard_core::{Manifest, ManifestEntry, ManifestEntryVerifier, OnboardError, SequencedEntry, TrustAnchor};
use onboard_registry::{GatewayError, ProvisioningGateway, ProvisioningStep};

use crate::config::PipelineConfig;

/// Where an entry failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStep {
    Decode,
    Verify,
    ExtractChain,
    Provision(ProvisioningStep),
}

impl EntryStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStep::Decode => "decode",
            EntryStep::Verify => "verify",
            EntryStep::ExtractChain => "extract_chain",
            EntryStep::Provision(step) => step.as_str(),
        }
    }
}

impl std::fmt::Display for EntryStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EntryStep {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Why an entry was not provisioned
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryFailure {
    /// Error kind name, e.g. `IdentityMismatchError`
    pub kind: &'static str,
    pub step: EntryStep,
    pub message: String,
}

impl EntryFailure {
    fn onboard(step: EntryStep, err: &OnboardError) -> Self {
        Self {
            kind: err.kind(),
            step,
            message: err.to_string(),
        }
    }

    fn gateway(step: ProvisioningStep, err: &GatewayError) -> Self {
        Self {
            kind: err.kind(),
            step: EntryStep::Provision(step),
            message: err.to_string(),
        }
    }
}

/// Result of one entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EntryResult {
    Provisioned { device_name: String },
    Failed(EntryFailure),
}

/// Per-entry record in a batch report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryOutcome {
    /// Index of the entry in the submitted array
    pub position: usize,

    /// `header.uniqueId`, when the entry carried one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique_id: Option<String>,

    #[serde(flatten)]
    pub result: EntryResult,
}

impl EntryOutcome {
    pub fn is_provisioned(&self) -> bool {
        matches!(self.result, EntryResult::Provisioned { .. })
    }

    pub fn device_name(&self) -> Option<&str> {
        match &self.result {
            EntryResult::Provisioned { device_name } => Some(device_name),
            EntryResult::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&EntryFailure> {
        match &self.result {
            EntryResult::Failed(failure) => Some(failure),
            EntryResult::Provisioned { .. } => None,
        }
    }
}

/// Summary of one manifest batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub batch_id: Uuid,

    /// True when no entry failed (an empty batch succeeds)
    pub success: bool,

    /// Device names provisioned, in processing order
    pub provisioned: Vec<String>,

    /// One record per entry, in processing order
    pub outcomes: Vec<EntryOutcome>,

    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,

    pub processed_at: DateTime<Utc>,
}

impl BatchReport {
    fn new(batch_id: Uuid) -> Self {
        Self {
            batch_id,
            success: true,
            provisioned: Vec::new(),
            outcomes: Vec::new(),
            total: 0,
            succeeded: 0,
            failed: 0,
            processed_at: Utc::now(),
        }
    }

    fn record(&mut self, outcome: EntryOutcome) {
        self.total += 1;
        match &outcome.result {
            EntryResult::Provisioned { device_name } => {
                self.succeeded += 1;
                self.provisioned.push(device_name.clone());
            }
            EntryResult::Failed(_) => {
                self.failed += 1;
                self.success = false;
            }
        }
        self.outcomes.push(outcome);
    }
}

/// Verifies manifest entries and provisions the devices they describe
pub struct ManifestPipeline {
    verifier: ManifestEntryVerifier,
    gateway: Arc<dyn ProvisioningGateway>,
    config: PipelineConfig,
}

impl ManifestPipeline {
    pub fn new(
        anchor: Arc<TrustAnchor>,
        gateway: Arc<dyn ProvisioningGateway>,
        config: PipelineConfig,
    ) -> Self {
        info!(
            anchor_kid = %anchor.key_identifier(),
            gateway = gateway.description(),
            prefix = %config.device_prefix,
            policy = %config.policy_name,
            timeout_ms = config.gateway_timeout_ms(),
            "Manifest pipeline configured"
        );
        Self {
            verifier: ManifestEntryVerifier::new(anchor),
            gateway,
            config,
        }
    }

    pub fn anchor(&self) -> &TrustAnchor {
        self.verifier.anchor()
    }

    pub fn gateway(&self) -> &dyn ProvisioningGateway {
        self.gateway.as_ref()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Device name for a verified unique id
    pub fn device_name(&self, unique_id: &str) -> String {
        format!("{}{}", self.config.device_prefix, unique_id)
    }

    /// Process every entry of a manifest, last entry first
    pub async fn process(&self, manifest: Manifest) -> BatchReport {
        let mut report = BatchReport::new(Uuid::new_v4());
        info!(batch_id = %report.batch_id, entries = manifest.len(), "Processing manifest");

        for entry in manifest.sequence() {
            let outcome = self.process_entry(entry).await;
            report.record(outcome);
        }

        info!(
            batch_id = %report.batch_id,
            total = report.total,
            succeeded = report.succeeded,
            failed = report.failed,
            "Manifest processed"
        );
        report
    }

    async fn process_entry(&self, sequenced: SequencedEntry) -> EntryOutcome {
        let position = sequenced.position;

        // Step 1: Decode
        let entry = match sequenced.decode() {
            Ok(entry) => entry,
            Err(e) => {
                warn!(position, error = %e, "Manifest entry could not be decoded");
                return EntryOutcome {
                    position,
                    unique_id: sequenced.declared_unique_id().map(str::to_string),
                    result: EntryResult::Failed(EntryFailure::onboard(EntryStep::Decode, &e)),
                };
            }
        };

        let unique_id = entry.unique_id().to_string();
        let result = match self.verify_and_provision(&entry).await {
            Ok(device_name) => {
                info!(position, unique_id = %unique_id, device = %device_name, "Device provisioned");
                EntryResult::Provisioned { device_name }
            }
            Err(failure) => {
                warn!(
                    position,
                    unique_id = %unique_id,
                    step = %failure.step,
                    kind = failure.kind,
                    error = %failure.message,
                    "Manifest entry not provisioned"
                );
                EntryResult::Failed(failure)
            }
        };

        EntryOutcome {
            position,
            unique_id: Some(unique_id),
            result,
        }
    }

    async fn verify_and_provision(&self, entry: &ManifestEntry) -> Result<String, EntryFailure> {
        // Step 2: Verify
        let verified = self
            .verifier
            .verify(entry)
            .map_err(|e| EntryFailure::onboard(EntryStep::Verify, &e))?;

        // Step 3: Certificate chain
        let chain_pem = verified
            .certificate_chain()
            .map_err(|e| EntryFailure::onboard(EntryStep::ExtractChain, &e))?;

        // Step 4: Provision
        let device_name = self.device_name(&verified.unique_id);
        self.provision(&device_name, &chain_pem).await?;
        Ok(device_name)
    }

    async fn provision(&self, device_name: &str, chain_pem: &str) -> Result<(), EntryFailure> {
        let gateway = self.gateway.as_ref();

        let certificate = self
            .call(
                ProvisioningStep::RegisterCertificate,
                gateway.register_certificate(chain_pem),
            )
            .await?;
        self.call(
            ProvisioningStep::AttachPolicy,
            gateway.attach_policy(&certificate, &self.config.policy_name),
        )
        .await?;
        self.call(
            ProvisioningStep::ActivateCertificate,
            gateway.activate_certificate(&certificate),
        )
        .await?;
        let identity = self
            .call(
                ProvisioningStep::CreateIdentity,
                gateway.create_identity(device_name),
            )
            .await?;
        self.call(
            ProvisioningStep::BindCertificate,
            gateway.bind_certificate_to_identity(&identity, &certificate),
        )
        .await
    }

    /// Await one gateway call under the configured timeout
    async fn call<T, F>(&self, step: ProvisioningStep, call: F) -> Result<T, EntryFailure>
    where
        F: Future<Output = onboard_registry::Result<T>>,
    {
        let result = match tokio::time::timeout(self.config.gateway_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::timeout(step, self.config.gateway_timeout)),
        };
        result.map_err(|e| EntryFailure::gateway(step, &e))
    }
}
