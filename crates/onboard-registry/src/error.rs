//! Error types for the provisioning gateway

use std::time::Duration;
use thiserror::Error;

use crate::gateway::ProvisioningStep;

/// Result type for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Errors a provisioning gateway can return
///
/// All of them are scoped to the entry being provisioned; the batch carries on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Certificate chain empty, malformed or refused
    #[error("Certificate registration failed: {0}")]
    Registration(String),

    #[error("Certificate activation failed: {0}")]
    Activation(String),

    /// Unknown policy or unknown certificate
    #[error("Policy attach failed: {0}")]
    PolicyAttach(String),

    /// Device name refused by the registry
    #[error("Identity creation failed: {0}")]
    IdentityCreation(String),

    /// Unknown handles, or identity already bound to another certificate
    #[error("Certificate binding failed: {0}")]
    Binding(String),

    /// The gateway did not answer within the configured timeout
    #[error("Gateway timed out after {timeout_ms}ms during {step}")]
    Timeout {
        step: ProvisioningStep,
        timeout_ms: u64,
    },
}

impl GatewayError {
    /// Timeout for `step` after waiting `after`
    pub fn timeout(step: ProvisioningStep, after: Duration) -> Self {
        GatewayError::Timeout {
            step,
            timeout_ms: u64::try_from(after.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Error kind name as reported to callers
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Registration(_) => "RegistrationError",
            GatewayError::Activation(_) => "ActivationError",
            GatewayError::PolicyAttach(_) => "PolicyAttachError",
            GatewayError::IdentityCreation(_) => "IdentityCreationError",
            GatewayError::Binding(_) => "BindingError",
            GatewayError::Timeout { .. } => "GatewayTimeout",
        }
    }
}
