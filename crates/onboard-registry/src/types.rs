//! Handles and records exchanged with the registry

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Reference to a registered certificate
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CertificateHandle {
    /// Hex SHA-256 of the chain's first certificate (DER)
    pub certificate_id: String,
}

impl CertificateHandle {
    pub fn new(certificate_id: impl Into<String>) -> Self {
        Self {
            certificate_id: certificate_id.into(),
        }
    }
}

impl std::fmt::Display for CertificateHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.certificate_id)
    }
}

/// Reference to a device identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentityHandle {
    /// Device name, unique within the registry
    pub name: String,

    /// Registry-assigned id
    pub identity_id: Uuid,
}

impl std::fmt::Display for IdentityHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.identity_id)
    }
}

/// A registered certificate chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateRecord {
    pub certificate_id: String,

    /// The chain exactly as registered
    pub chain_pem: String,

    /// Number of certificates in the chain
    pub chain_length: usize,

    /// Subject of the first certificate
    pub subject: String,

    pub active: bool,

    /// Attached policy names
    #[serde(default)]
    pub policies: BTreeSet<String>,

    pub registered_at: DateTime<Utc>,
}

/// A provisioned device identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub name: String,

    pub identity_id: Uuid,

    /// Bound certificate, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_id: Option<String>,

    pub created_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bound_at: Option<DateTime<Utc>>,
}

impl IdentityRecord {
    pub fn handle(&self) -> IdentityHandle {
        IdentityHandle {
            name: self.name.clone(),
            identity_id: self.identity_id,
        }
    }

    pub fn is_bound(&self) -> bool {
        self.certificate_id.is_some()
    }
}
