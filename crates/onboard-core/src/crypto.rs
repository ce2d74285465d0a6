//! Signature algorithms and verification keys
//!
//! Manifest entries are JWS objects. Only six algorithms are accepted:
//! RS256, RS384, RS512, ES256, ES384 and ES512. Everything else, including
//! `none` and the HMAC family, is rejected before any key material is touched.
//!
//! RSA and P-256/P-384 verification is done with `jsonwebtoken`. P-521
//! (ES512) is not covered there and goes through the `p521` crate.

use base64::Engine;
use jsonwebtoken::{Algorithm, DecodingKey};
use p521::ecdsa::signature::Verifier;
use std::fmt;
use std::str::FromStr;
use x509_parser::x509::SubjectPublicKeyInfo;

use crate::error::{OnboardError, Result};
use crate::jws::BASE64URL;

const OID_RSA_ENCRYPTION: &str = "1.2.840.113549.1.1.1";
const OID_EC_PUBLIC_KEY: &str = "1.2.840.10045.2.1";
const OID_CURVE_P256: &str = "1.2.840.10045.3.1.7";
const OID_CURVE_P384: &str = "1.3.132.0.34";
const OID_CURVE_P521: &str = "1.3.132.0.35";

/// A JWS algorithm from the verification allow-list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SigningAlgorithm {
    Rs256,
    Rs384,
    Rs512,
    Es256,
    Es384,
    Es512,
}

impl SigningAlgorithm {
    /// Every algorithm a manifest entry may be signed with
    pub const ALLOWED: [SigningAlgorithm; 6] = [
        SigningAlgorithm::Rs256,
        SigningAlgorithm::Rs384,
        SigningAlgorithm::Rs512,
        SigningAlgorithm::Es256,
        SigningAlgorithm::Es384,
        SigningAlgorithm::Es512,
    ];

    /// JWS `alg` name
    pub fn as_str(&self) -> &'static str {
        match self {
            SigningAlgorithm::Rs256 => "RS256",
            SigningAlgorithm::Rs384 => "RS384",
            SigningAlgorithm::Rs512 => "RS512",
            SigningAlgorithm::Es256 => "ES256",
            SigningAlgorithm::Es384 => "ES384",
            SigningAlgorithm::Es512 => "ES512",
        }
    }

    /// Equivalent `jsonwebtoken` algorithm, if it has one
    fn jwt_algorithm(&self) -> Option<Algorithm> {
        match self {
            SigningAlgorithm::Rs256 => Some(Algorithm::RS256),
            SigningAlgorithm::Rs384 => Some(Algorithm::RS384),
            SigningAlgorithm::Rs512 => Some(Algorithm::RS512),
            SigningAlgorithm::Es256 => Some(Algorithm::ES256),
            SigningAlgorithm::Es384 => Some(Algorithm::ES384),
            SigningAlgorithm::Es512 => None,
        }
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SigningAlgorithm {
    type Err = OnboardError;

    /// Names are matched exactly; `rs256` is not `RS256`.
    fn from_str(s: &str) -> Result<Self> {
        SigningAlgorithm::ALLOWED
            .iter()
            .copied()
            .find(|alg| alg.as_str() == s)
            .ok_or_else(|| {
                OnboardError::SignatureVerification(format!("algorithm '{}' is not allowed", s))
            })
    }
}

/// Type of the trust anchor's public key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    Rsa,
    EcP256,
    EcP384,
    EcP521,
}

impl KeyType {
    /// Whether a signature made with `alg` can come from a key of this type
    pub fn accepts(&self, alg: SigningAlgorithm) -> bool {
        matches!(
            (self, alg),
            (
                KeyType::Rsa,
                SigningAlgorithm::Rs256 | SigningAlgorithm::Rs384 | SigningAlgorithm::Rs512
            ) | (KeyType::EcP256, SigningAlgorithm::Es256)
                | (KeyType::EcP384, SigningAlgorithm::Es384)
                | (KeyType::EcP521, SigningAlgorithm::Es512)
        )
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyType::Rsa => write!(f, "RSA"),
            KeyType::EcP256 => write!(f, "EC P-256"),
            KeyType::EcP384 => write!(f, "EC P-384"),
            KeyType::EcP521 => write!(f, "EC P-521"),
        }
    }
}

/// Public key material ready for signature checks
#[derive(Clone)]
pub(crate) enum VerificationKey {
    Jwt { key_type: KeyType, key: DecodingKey },
    P521(p521::ecdsa::VerifyingKey),
}

impl VerificationKey {
    /// Build a verification key from a certificate's SubjectPublicKeyInfo.
    ///
    /// `public_key_pem` is the same SPKI, PEM encoded.
    pub(crate) fn from_spki(spki: &SubjectPublicKeyInfo<'_>, public_key_pem: &str) -> Result<Self> {
        let key_oid = spki.algorithm.algorithm.to_id_string();
        let key_type = match key_oid.as_str() {
            OID_RSA_ENCRYPTION => KeyType::Rsa,
            OID_EC_PUBLIC_KEY => {
                let curve = spki
                    .algorithm
                    .parameters
                    .as_ref()
                    .and_then(|params| params.as_oid().ok())
                    .map(|oid| oid.to_id_string())
                    .ok_or_else(|| OnboardError::TrustLoad("EC key without named curve".into()))?;
                match curve.as_str() {
                    OID_CURVE_P256 => KeyType::EcP256,
                    OID_CURVE_P384 => KeyType::EcP384,
                    OID_CURVE_P521 => KeyType::EcP521,
                    other => {
                        return Err(OnboardError::TrustLoad(format!(
                            "unsupported EC curve {}",
                            other
                        )))
                    }
                }
            }
            other => {
                return Err(OnboardError::TrustLoad(format!(
                    "unsupported public key algorithm {}",
                    other
                )))
            }
        };

        let invalid_key = |e: &dyn fmt::Display| {
            OnboardError::TrustLoad(format!("invalid {} public key: {}", key_type, e))
        };

        match key_type {
            KeyType::Rsa => DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
                .map(|key| VerificationKey::Jwt { key_type, key })
                .map_err(|e| invalid_key(&e)),
            KeyType::EcP256 | KeyType::EcP384 => DecodingKey::from_ec_pem(public_key_pem.as_bytes())
                .map(|key| VerificationKey::Jwt { key_type, key })
                .map_err(|e| invalid_key(&e)),
            KeyType::EcP521 => {
                p521::ecdsa::VerifyingKey::from_sec1_bytes(&spki.subject_public_key.data)
                    .map(VerificationKey::P521)
                    .map_err(|e| invalid_key(&e))
            }
        }
    }

    pub(crate) fn key_type(&self) -> KeyType {
        match self {
            VerificationKey::Jwt { key_type, .. } => *key_type,
            VerificationKey::P521(_) => KeyType::EcP521,
        }
    }

    /// Verify a base64url `signature` over the JWS signing input
    /// (`protected.payload`).
    pub(crate) fn verify(
        &self,
        alg: SigningAlgorithm,
        signing_input: &str,
        signature: &str,
    ) -> Result<()> {
        let key_type = self.key_type();
        if !key_type.accepts(alg) {
            return Err(OnboardError::SignatureVerification(format!(
                "algorithm {} cannot be used with a {} trust anchor",
                alg, key_type
            )));
        }

        match (self, alg.jwt_algorithm()) {
            (VerificationKey::Jwt { key, .. }, Some(jwt_alg)) => {
                // jsonwebtoken only decodes unpadded base64url
                let unpadded = signature.trim_end_matches('=');
                let valid =
                    jsonwebtoken::crypto::verify(unpadded, signing_input.as_bytes(), key, jwt_alg)?;
                if valid {
                    Ok(())
                } else {
                    Err(OnboardError::SignatureVerification(
                        "signature does not match".into(),
                    ))
                }
            }
            (VerificationKey::P521(key), None) => {
                let raw = BASE64URL.decode(signature).map_err(|e| {
                    OnboardError::SignatureVerification(format!("malformed signature: {}", e))
                })?;
                let sig = p521::ecdsa::Signature::from_slice(&raw).map_err(|e| {
                    OnboardError::SignatureVerification(format!("malformed signature: {}", e))
                })?;
                key.verify(signing_input.as_bytes(), &sig).map_err(|_| {
                    OnboardError::SignatureVerification("signature does not match".into())
                })
            }
            _ => Err(OnboardError::SignatureVerification(format!(
                "algorithm {} cannot be used with a {} trust anchor",
                alg, key_type
            ))),
        }
    }
}

impl fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationKey")
            .field("key_type", &self.key_type())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_list_parsing() {
        for alg in SigningAlgorithm::ALLOWED {
            assert_eq!(alg.as_str().parse::<SigningAlgorithm>().unwrap(), alg);
        }
    }

    #[test]
    fn test_rejected_algorithms() {
        for name in ["none", "HS256", "HS512", "PS256", "EdDSA", "rs256", "", "RS256 "] {
            let err = name.parse::<SigningAlgorithm>().unwrap_err();
            assert_eq!(err.kind(), "SignatureVerificationError", "{} accepted", name);
        }
    }

    #[test]
    fn test_key_type_algorithm_matching() {
        assert!(KeyType::Rsa.accepts(SigningAlgorithm::Rs256));
        assert!(KeyType::Rsa.accepts(SigningAlgorithm::Rs512));
        assert!(!KeyType::Rsa.accepts(SigningAlgorithm::Es256));
        assert!(KeyType::EcP256.accepts(SigningAlgorithm::Es256));
        assert!(!KeyType::EcP256.accepts(SigningAlgorithm::Es384));
        assert!(!KeyType::EcP256.accepts(SigningAlgorithm::Rs256));
        assert!(KeyType::EcP384.accepts(SigningAlgorithm::Es384));
        assert!(KeyType::EcP521.accepts(SigningAlgorithm::Es512));
        assert!(!KeyType::EcP521.accepts(SigningAlgorithm::Es256));
    }
}
