//! Secure-element payload types

use serde::{Deserialize, Serialize};

use crate::chain::extract_certificate_chain;
use crate::error::Result;

/// Decoded payload of a manifest entry
///
/// Only `publicKeySet` matters for provisioning. Everything else the
/// manufacturer includes (model, part number, ...) is kept in `extra`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SecureElementPayload {
    #[serde(
        rename = "publicKeySet",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub public_key_set: Option<PublicKeySet>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// JWK set of the secure element's public keys
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PublicKeySet {
    #[serde(default)]
    pub keys: Vec<PublicKeyRecord>,
}

/// One public key of the secure element, as a JWK
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PublicKeyRecord {
    /// Key slot identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kty: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,

    /// Standard-base64 DER certificates, leaf first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub x5c: Vec<String>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SecureElementPayload {
    /// Key records in payload order; empty when `publicKeySet` is absent
    pub fn keys(&self) -> &[PublicKeyRecord] {
        self.public_key_set
            .as_ref()
            .map(|set| set.keys.as_slice())
            .unwrap_or(&[])
    }
}

/// A manifest entry whose signature checked out against the trust anchor
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedSecureElement {
    /// `header.uniqueId` of the entry
    pub unique_id: String,

    /// Decoded payload
    pub payload: SecureElementPayload,

    /// Payload bytes exactly as signed
    pub raw_payload: Vec<u8>,
}

impl VerifiedSecureElement {
    /// PEM chain of every certificate in the payload's key set
    pub fn certificate_chain(&self) -> Result<String> {
        extract_certificate_chain(&self.payload)
    }
}
