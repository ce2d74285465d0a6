//! Recording gateway
//!
//! For testing purposes: wraps an [`InMemoryRegistry`], records every call
//! made through it, and can inject failures or delays at chosen steps.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::error::{GatewayError, Result};
use crate::gateway::{ProvisioningGateway, ProvisioningStep};
use crate::memory::InMemoryRegistry;
use crate::types::{CertificateHandle, IdentityHandle};

/// A gateway call as observed by [`RecordingGateway`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub step: ProvisioningStep,

    /// Device name for identity calls, certificate id otherwise
    /// (empty for a registration that has no id yet)
    pub subject: String,
}

/// Gateway that records calls and delegates to an in-memory registry
///
/// - `fail_step(step)` - every call at `step` fails with that step's error
/// - `fail_device(name)` - `create_identity(name)` fails
/// - `delay_step(step, d)` - calls at `step` sleep for `d` first
pub struct RecordingGateway {
    inner: Arc<InMemoryRegistry>,
    calls: Mutex<Vec<RecordedCall>>,
    failing_steps: HashSet<ProvisioningStep>,
    failing_devices: HashSet<String>,
    delays: HashMap<ProvisioningStep, Duration>,
}

impl RecordingGateway {
    pub fn new(inner: Arc<InMemoryRegistry>) -> Self {
        Self {
            inner,
            calls: Mutex::new(Vec::new()),
            failing_steps: HashSet::new(),
            failing_devices: HashSet::new(),
            delays: HashMap::new(),
        }
    }

    pub fn fail_step(mut self, step: ProvisioningStep) -> Self {
        self.failing_steps.insert(step);
        self
    }

    pub fn fail_device(mut self, device_name: impl Into<String>) -> Self {
        self.failing_devices.insert(device_name.into());
        self
    }

    pub fn delay_step(mut self, step: ProvisioningStep, delay: Duration) -> Self {
        self.delays.insert(step, delay);
        self
    }

    /// The wrapped registry
    pub fn registry(&self) -> &Arc<InMemoryRegistry> {
        &self.inner
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Steps of every call made so far, in order
    pub fn steps(&self) -> Vec<ProvisioningStep> {
        self.calls().into_iter().map(|c| c.step).collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    async fn enter(&self, step: ProvisioningStep, subject: &str) -> Result<()> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedCall {
                step,
                subject: subject.to_string(),
            });

        if let Some(delay) = self.delays.get(&step) {
            tokio::time::sleep(*delay).await;
        }

        if self.failing_steps.contains(&step) {
            return Err(injected(step, "injected failure"));
        }
        Ok(())
    }
}

fn injected(step: ProvisioningStep, message: &str) -> GatewayError {
    let message = message.to_string();
    match step {
        ProvisioningStep::RegisterCertificate => GatewayError::Registration(message),
        ProvisioningStep::AttachPolicy => GatewayError::PolicyAttach(message),
        ProvisioningStep::ActivateCertificate => GatewayError::Activation(message),
        ProvisioningStep::CreateIdentity => GatewayError::IdentityCreation(message),
        ProvisioningStep::BindCertificate => GatewayError::Binding(message),
    }
}

#[async_trait]
impl ProvisioningGateway for RecordingGateway {
    async fn register_certificate(&self, chain_pem: &str) -> Result<CertificateHandle> {
        self.enter(ProvisioningStep::RegisterCertificate, "").await?;
        self.inner.register_certificate(chain_pem).await
    }

    async fn activate_certificate(&self, certificate: &CertificateHandle) -> Result<()> {
        self.enter(ProvisioningStep::ActivateCertificate, &certificate.certificate_id)
            .await?;
        self.inner.activate_certificate(certificate).await
    }

    async fn attach_policy(
        &self,
        certificate: &CertificateHandle,
        policy_name: &str,
    ) -> Result<()> {
        self.enter(ProvisioningStep::AttachPolicy, &certificate.certificate_id)
            .await?;
        self.inner.attach_policy(certificate, policy_name).await
    }

    async fn create_identity(&self, device_name: &str) -> Result<IdentityHandle> {
        self.enter(ProvisioningStep::CreateIdentity, device_name).await?;
        if self.failing_devices.contains(device_name) {
            return Err(injected(
                ProvisioningStep::CreateIdentity,
                "device refused by test gateway",
            ));
        }
        self.inner.create_identity(device_name).await
    }

    async fn bind_certificate_to_identity(
        &self,
        identity: &IdentityHandle,
        certificate: &CertificateHandle,
    ) -> Result<()> {
        self.enter(ProvisioningStep::BindCertificate, &identity.name).await?;
        self.inner
            .bind_certificate_to_identity(identity, certificate)
            .await
    }

    fn description(&self) -> &str {
        "recording test gateway"
    }
}
