//! In-memory device registry
//!
//! Default gateway implementation backed by hashmaps. Suitable for
//! development, tests and single-instance deployments. Data is lost on
//! restart.

use async_trait::async_trait;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;
use x509_parser::prelude::{FromDer, X509Certificate};

use crate::error::{GatewayError, Result};
use crate::gateway::ProvisioningGateway;
use crate::types::{CertificateHandle, CertificateRecord, IdentityHandle, IdentityRecord};

/// Longest device name the registry accepts
pub const MAX_DEVICE_NAME_LEN: usize = 128;

#[derive(Debug, Default)]
struct RegistryState {
    certificates: HashMap<String, CertificateRecord>,
    identities: HashMap<String, IdentityRecord>,
    /// Identity names in creation order
    identity_order: Vec<String>,
}

/// In-memory, idempotent provisioning gateway
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    state: RwLock<RegistryState>,
    known_policies: HashSet<String>,
}

impl InMemoryRegistry {
    /// Create an empty registry with no known policies
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a policy that certificates may be attached to
    pub fn with_policy(mut self, policy_name: impl Into<String>) -> Self {
        self.known_policies.insert(policy_name.into());
        self
    }

    /// Look up an identity by device name
    pub fn identity(&self, name: &str) -> Option<IdentityRecord> {
        self.read().identities.get(name).cloned()
    }

    /// Look up a certificate by id
    pub fn certificate(&self, certificate_id: &str) -> Option<CertificateRecord> {
        self.read().certificates.get(certificate_id).cloned()
    }

    pub fn identity_count(&self) -> usize {
        self.read().identities.len()
    }

    pub fn certificate_count(&self) -> usize {
        self.read().certificates.len()
    }

    /// All identities, in creation order
    pub fn list_identities(&self) -> Vec<IdentityRecord> {
        let state = self.read();
        state
            .identity_order
            .iter()
            .filter_map(|name| state.identities.get(name).cloned())
            .collect()
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A chain that parsed: id of the leading certificate, its subject and the
/// number of certificates
struct ParsedChain {
    certificate_id: String,
    subject: String,
    length: usize,
}

fn parse_chain(chain_pem: &str) -> Result<ParsedChain> {
    if chain_pem.trim().is_empty() {
        return Err(GatewayError::Registration("certificate chain is empty".into()));
    }

    let blocks = pem::parse_many(chain_pem)
        .map_err(|e| GatewayError::Registration(format!("invalid PEM: {}", e)))?;
    let first = blocks
        .first()
        .ok_or_else(|| GatewayError::Registration("no PEM blocks in chain".into()))?;

    let mut subject = String::new();
    for (index, block) in blocks.iter().enumerate() {
        if block.tag() != "CERTIFICATE" {
            return Err(GatewayError::Registration(format!(
                "block {} is '{}', expected CERTIFICATE",
                index,
                block.tag()
            )));
        }
        let (_, cert) = X509Certificate::from_der(block.contents()).map_err(|e| {
            GatewayError::Registration(format!("certificate {} is not X.509: {}", index, e))
        })?;
        if index == 0 {
            subject = cert.subject().to_string();
        }
    }

    Ok(ParsedChain {
        certificate_id: format!("{:x}", Sha256::digest(first.contents())),
        subject,
        length: blocks.len(),
    })
}

fn validate_device_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(GatewayError::IdentityCreation("device name is empty".into()));
    }
    if name.len() > MAX_DEVICE_NAME_LEN {
        return Err(GatewayError::IdentityCreation(format!(
            "device name longer than {} characters",
            MAX_DEVICE_NAME_LEN
        )));
    }
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, ':' | '_' | '-')))
    {
        return Err(GatewayError::IdentityCreation(format!(
            "device name '{}' contains invalid character '{}'",
            name, bad
        )));
    }
    Ok(())
}

#[async_trait]
impl ProvisioningGateway for InMemoryRegistry {
    async fn register_certificate(&self, chain_pem: &str) -> Result<CertificateHandle> {
        let parsed = parse_chain(chain_pem)?;
        let handle = CertificateHandle::new(parsed.certificate_id.clone());

        let mut state = self.write();
        if state.certificates.contains_key(&parsed.certificate_id) {
            debug!(certificate_id = %handle, "Certificate already registered");
            return Ok(handle);
        }

        info!(
            certificate_id = %handle,
            subject = %parsed.subject,
            chain_length = parsed.length,
            "Registering certificate"
        );
        state.certificates.insert(
            parsed.certificate_id.clone(),
            CertificateRecord {
                certificate_id: parsed.certificate_id,
                chain_pem: chain_pem.to_string(),
                chain_length: parsed.length,
                subject: parsed.subject,
                active: false,
                policies: BTreeSet::new(),
                registered_at: Utc::now(),
            },
        );
        Ok(handle)
    }

    async fn activate_certificate(&self, certificate: &CertificateHandle) -> Result<()> {
        let mut state = self.write();
        let record = state
            .certificates
            .get_mut(&certificate.certificate_id)
            .ok_or_else(|| {
                GatewayError::Activation(format!("unknown certificate {}", certificate))
            })?;

        if !record.active {
            record.active = true;
            debug!(certificate_id = %certificate, "Certificate activated");
        }
        Ok(())
    }

    async fn attach_policy(
        &self,
        certificate: &CertificateHandle,
        policy_name: &str,
    ) -> Result<()> {
        if !self.known_policies.contains(policy_name) {
            warn!(policy = %policy_name, "Attach of unknown policy refused");
            return Err(GatewayError::PolicyAttach(format!(
                "unknown policy '{}'",
                policy_name
            )));
        }

        let mut state = self.write();
        let record = state
            .certificates
            .get_mut(&certificate.certificate_id)
            .ok_or_else(|| {
                GatewayError::PolicyAttach(format!("unknown certificate {}", certificate))
            })?;

        if record.policies.insert(policy_name.to_string()) {
            debug!(certificate_id = %certificate, policy = %policy_name, "Policy attached");
        }
        Ok(())
    }

    async fn create_identity(&self, device_name: &str) -> Result<IdentityHandle> {
        validate_device_name(device_name)?;

        let mut state = self.write();
        if let Some(existing) = state.identities.get(device_name) {
            debug!(device = %device_name, "Identity already exists");
            return Ok(existing.handle());
        }

        let record = IdentityRecord {
            name: device_name.to_string(),
            identity_id: Uuid::new_v4(),
            certificate_id: None,
            created_at: Utc::now(),
            bound_at: None,
        };
        let handle = record.handle();
        info!(device = %device_name, identity_id = %handle.identity_id, "Creating identity");

        state.identities.insert(device_name.to_string(), record);
        state.identity_order.push(device_name.to_string());
        Ok(handle)
    }

    async fn bind_certificate_to_identity(
        &self,
        identity: &IdentityHandle,
        certificate: &CertificateHandle,
    ) -> Result<()> {
        let mut state = self.write();
        if !state.certificates.contains_key(&certificate.certificate_id) {
            return Err(GatewayError::Binding(format!(
                "unknown certificate {}",
                certificate
            )));
        }

        let record = state
            .identities
            .get_mut(&identity.name)
            .filter(|r| r.identity_id == identity.identity_id)
            .ok_or_else(|| GatewayError::Binding(format!("unknown identity {}", identity)))?;

        match &record.certificate_id {
            Some(bound) if *bound == certificate.certificate_id => Ok(()),
            Some(bound) => {
                warn!(
                    device = %identity.name,
                    bound = %bound,
                    requested = %certificate,
                    "Identity already bound to a different certificate"
                );
                Err(GatewayError::Binding(format!(
                    "identity '{}' is already bound to certificate {}",
                    identity.name, bound
                )))
            }
            None => {
                record.certificate_id = Some(certificate.certificate_id.clone());
                record.bound_at = Some(Utc::now());
                info!(device = %identity.name, certificate_id = %certificate, "Certificate bound");
                Ok(())
            }
        }
    }

    fn description(&self) -> &str {
        "in-memory device registry"
    }
}
