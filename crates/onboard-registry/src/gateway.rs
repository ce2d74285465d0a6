//! The provisioning gateway contract

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{CertificateHandle, IdentityHandle};

/// Trait for device identity registries
///
/// Implementations must be idempotent: a call repeated with the same
/// arguments returns the same handle (or succeeds again) without creating
/// duplicates.
#[async_trait]
pub trait ProvisioningGateway: Send + Sync {
    /// Register a PEM certificate chain and return its handle
    ///
    /// # Returns
    /// * `Ok(CertificateHandle)` - New or already registered certificate
    /// * `Err(GatewayError::Registration)` - Chain empty, malformed or refused
    async fn register_certificate(&self, chain_pem: &str) -> Result<CertificateHandle>;

    /// Mark a registered certificate as active
    async fn activate_certificate(&self, certificate: &CertificateHandle) -> Result<()>;

    /// Attach a named policy to a certificate
    async fn attach_policy(&self, certificate: &CertificateHandle, policy_name: &str)
        -> Result<()>;

    /// Create a device identity, or return the existing one with this name
    async fn create_identity(&self, device_name: &str) -> Result<IdentityHandle>;

    /// Bind a certificate to an identity
    ///
    /// Re-binding the same certificate is a no-op. An identity already bound
    /// to a different certificate is a `Binding` error.
    async fn bind_certificate_to_identity(
        &self,
        identity: &IdentityHandle,
        certificate: &CertificateHandle,
    ) -> Result<()>;

    /// Get a description of this gateway (for logging)
    fn description(&self) -> &str {
        "provisioning gateway"
    }
}

/// The gateway calls made to provision one device, in call order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisioningStep {
    RegisterCertificate,
    AttachPolicy,
    ActivateCertificate,
    CreateIdentity,
    BindCertificate,
}

impl ProvisioningStep {
    /// Every step, in the order the pipeline performs them
    pub const ORDER: [ProvisioningStep; 5] = [
        ProvisioningStep::RegisterCertificate,
        ProvisioningStep::AttachPolicy,
        ProvisioningStep::ActivateCertificate,
        ProvisioningStep::CreateIdentity,
        ProvisioningStep::BindCertificate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProvisioningStep::RegisterCertificate => "register_certificate",
            ProvisioningStep::AttachPolicy => "attach_policy",
            ProvisioningStep::ActivateCertificate => "activate_certificate",
            ProvisioningStep::CreateIdentity => "create_identity",
            ProvisioningStep::BindCertificate => "bind_certificate",
        }
    }
}

impl std::fmt::Display for ProvisioningStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
