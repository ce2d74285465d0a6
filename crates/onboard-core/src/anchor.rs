//! Trust anchor
//!
//! The trust anchor is the one certificate allowed to sign manifest entries.
//! It is loaded once at startup from an operator-controlled file and never
//! from request input.

use base64::Engine;
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;
use tracing::info;
use x509_parser::extensions::ParsedExtension;
use x509_parser::prelude::{FromDer, X509Certificate};

use crate::crypto::{KeyType, SigningAlgorithm, VerificationKey};
use crate::error::{OnboardError, Result};
use crate::jws::BASE64URL;

const PEM_CERTIFICATE: &str = "CERTIFICATE";
const PEM_PUBLIC_KEY: &str = "PUBLIC KEY";

/// The certificate manifest entries must be signed by
pub struct TrustAnchor {
    der: Vec<u8>,
    subject: String,
    key_identifier: String,
    fingerprint: String,
    public_key_pem: String,
    key: VerificationKey,
}

impl TrustAnchor {
    /// Load the anchor from a PEM or DER certificate file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            OnboardError::TrustLoad(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_bytes(&bytes)
    }

    /// Load the anchor from PEM or DER bytes
    ///
    /// PEM input must hold exactly one `CERTIFICATE` block.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if is_pem(bytes) {
            let blocks = pem::parse_many(bytes)
                .map_err(|e| OnboardError::TrustLoad(format!("invalid PEM: {}", e)))?;
            let mut certificates = blocks.into_iter().filter(|p| p.tag() == PEM_CERTIFICATE);
            match (certificates.next(), certificates.next()) {
                (Some(cert), None) => Self::from_der(cert.into_contents()),
                (None, _) => Err(OnboardError::TrustLoad(
                    "no CERTIFICATE block in PEM input".into(),
                )),
                (Some(_), Some(_)) => Err(OnboardError::TrustLoad(
                    "expected exactly one certificate, found several".into(),
                )),
            }
        } else {
            Self::from_der(bytes.to_vec())
        }
    }

    /// Load the anchor from a DER certificate
    pub fn from_der(der: Vec<u8>) -> Result<Self> {
        let (rest, cert) = X509Certificate::from_der(&der)
            .map_err(|e| OnboardError::TrustLoad(format!("invalid X.509 certificate: {}", e)))?;
        if !rest.is_empty() {
            return Err(OnboardError::TrustLoad(
                "trailing data after certificate".into(),
            ));
        }

        let ski = cert
            .extensions()
            .iter()
            .find_map(|ext| match ext.parsed_extension() {
                ParsedExtension::SubjectKeyIdentifier(id) => Some(id.0.to_vec()),
                _ => None,
            })
            .ok_or_else(|| {
                OnboardError::TrustLoad("certificate has no Subject Key Identifier".into())
            })?;

        let spki = cert.public_key();
        let public_key_pem = encode_pem(PEM_PUBLIC_KEY, spki.raw.to_vec());
        let key = VerificationKey::from_spki(spki, &public_key_pem)?;
        let subject = cert.subject().to_string();

        let key_identifier = BASE64URL.encode(ski);
        let fingerprint = BASE64URL.encode(Sha256::digest(&der));

        info!(
            subject = %subject,
            kid = %key_identifier,
            x5t_s256 = %fingerprint,
            key_type = %key.key_type(),
            "Trust anchor loaded"
        );

        Ok(Self {
            der,
            subject,
            key_identifier,
            fingerprint,
            public_key_pem,
            key,
        })
    }

    /// Base64url Subject Key Identifier, compared against `protected.kid`
    pub fn key_identifier(&self) -> &str {
        &self.key_identifier
    }

    /// Base64url SHA-256 fingerprint, compared against `protected.x5t#S256`
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// SubjectPublicKeyInfo as PEM
    pub fn public_key_pem(&self) -> &str {
        &self.public_key_pem
    }

    /// The raw certificate
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Subject distinguished name
    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn key_type(&self) -> KeyType {
        self.key.key_type()
    }

    /// Check a base64url `signature` over `signing_input` with the anchor's key
    pub fn verify(&self, alg: SigningAlgorithm, signing_input: &str, signature: &str) -> Result<()> {
        self.key.verify(alg, signing_input, signature)
    }
}

impl fmt::Debug for TrustAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrustAnchor")
            .field("subject", &self.subject)
            .field("key_identifier", &self.key_identifier)
            .field("fingerprint", &self.fingerprint)
            .field("key_type", &self.key.key_type())
            .finish()
    }
}

fn is_pem(bytes: &[u8]) -> bool {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    bytes[start..].starts_with(b"-----BEGIN")
}

/// PEM with LF line endings
pub(crate) fn encode_pem(tag: &str, contents: Vec<u8>) -> String {
    let config = pem::EncodeConfig::new().set_line_ending(pem::LineEnding::LF);
    pem::encode_config(&pem::Pem::new(tag, contents), config)
}
