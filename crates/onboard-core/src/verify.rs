//! Manifest entry verification
//!
//! THIS IS WHERE FORGED ENTRIES ARE STOPPED.
//!
//! The verification flow is:
//!
//! 1. Decode the protected header
//! 2. Bind `kid` to the trust anchor's key identifier
//! 3. Bind `x5t#S256` to the trust anchor's fingerprint
//! 4. Check the declared algorithm against the allow-list and the anchor key
//! 5. Verify the signature over `protected.payload`
//! 6. Decode the payload and bind it to `header.uniqueId`
//!
//! Steps 2 and 3 run before any cryptographic work. An entry declaring a
//! different signer is rejected outright.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::anchor::TrustAnchor;
use crate::error::{OnboardError, Result};
use crate::manifest::ManifestEntry;
use crate::types::{SecureElementPayload, VerifiedSecureElement};

/// Verify one manifest entry against the trust anchor
pub fn verify_entry(entry: &ManifestEntry, anchor: &TrustAnchor) -> Result<VerifiedSecureElement> {
    let unique_id = entry.unique_id();

    // Step 1: Decode protected header
    let header = entry.signature.protected_header()?;

    // Step 2: Key identifier binding
    if header.kid != anchor.key_identifier() {
        warn!(unique_id = %unique_id, kid = %header.kid, "Entry kid does not match trust anchor");
        return Err(OnboardError::IdentityMismatch {
            field: "kid",
            expected: anchor.key_identifier().to_string(),
            actual: header.kid,
        });
    }

    // Step 3: Fingerprint binding
    if header.x5t_s256 != anchor.fingerprint() {
        warn!(
            unique_id = %unique_id,
            x5t_s256 = %header.x5t_s256,
            "Entry x5t#S256 does not match trust anchor"
        );
        return Err(OnboardError::IdentityMismatch {
            field: "x5t#S256",
            expected: anchor.fingerprint().to_string(),
            actual: header.x5t_s256,
        });
    }

    // Step 4: Allow-list
    let algorithm = header.algorithm().map_err(|e| {
        warn!(unique_id = %unique_id, alg = %header.alg, "Entry algorithm rejected");
        e
    })?;

    // Step 5: Signature over the compact form's signing input
    anchor
        .verify(algorithm, &entry.signature.signing_input(), &entry.signature.signature)
        .map_err(|e| {
            warn!(unique_id = %unique_id, alg = %algorithm, error = %e, "Entry signature rejected");
            e
        })?;

    // Step 6: Payload
    let raw_payload = entry.signature.payload_bytes()?;
    let payload: SecureElementPayload = serde_json::from_slice(&raw_payload).map_err(|e| {
        OnboardError::ManifestDecode(format!("payload is not a secure element record: {}", e))
    })?;

    debug!(
        unique_id = %unique_id,
        alg = %algorithm,
        keys = payload.keys().len(),
        "Manifest entry verified"
    );

    Ok(VerifiedSecureElement {
        unique_id: unique_id.to_string(),
        payload,
        raw_payload,
    })
}

/// Verifier bound to a single trust anchor
#[derive(Debug, Clone)]
pub struct ManifestEntryVerifier {
    anchor: Arc<TrustAnchor>,
}

impl ManifestEntryVerifier {
    pub fn new(anchor: Arc<TrustAnchor>) -> Self {
        Self { anchor }
    }

    pub fn anchor(&self) -> &TrustAnchor {
        &self.anchor
    }

    /// Verify a typed entry
    pub fn verify(&self, entry: &ManifestEntry) -> Result<VerifiedSecureElement> {
        verify_entry(entry, &self.anchor)
    }

    /// Decode and verify an entry in its JSON form
    pub fn verify_value(&self, raw: &serde_json::Value) -> Result<VerifiedSecureElement> {
        let entry = ManifestEntry::from_value(raw.clone())?;
        self.verify(&entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jws::{CompactSignature, ProtectedHeader};
    use crate::manifest::EntryHeader;
    use jsonwebtoken::{Algorithm, EncodingKey};

    const P256_CERT: &str = include_str!("../tests/fixtures/anchor_p256.crt");
    const P256_KEY: &str = include_str!("../tests/fixtures/anchor_p256.key");

    fn anchor() -> TrustAnchor {
        TrustAnchor::from_bytes(P256_CERT.as_bytes()).unwrap()
    }

    fn signed_entry(header: ProtectedHeader, payload: &[u8]) -> ManifestEntry {
        let unsigned = CompactSignature::unsigned(&header, payload).unwrap();
        let key = EncodingKey::from_ec_pem(P256_KEY.as_bytes()).unwrap();
        let signature =
            jsonwebtoken::crypto::sign(unsigned.signing_input().as_bytes(), &key, Algorithm::ES256)
                .unwrap();
        ManifestEntry {
            header: EntryHeader {
                unique_id: "SE-0001".into(),
            },
            signature: unsigned.with_signature(signature),
        }
    }

    #[test]
    fn test_valid_entry() {
        let anchor = anchor();
        let header = ProtectedHeader::new("ES256", anchor.key_identifier(), anchor.fingerprint());
        let entry = signed_entry(header, br#"{"publicKeySet":{"keys":[]}}"#);

        let verified = verify_entry(&entry, &anchor).unwrap();
        assert_eq!(verified.unique_id, "SE-0001");
        assert_eq!(verified.raw_payload, br#"{"publicKeySet":{"keys":[]}}"#);
        assert!(verified.payload.keys().is_empty());
    }

    #[test]
    fn test_kid_checked_before_signature() {
        let anchor = anchor();
        let header = ProtectedHeader::new("ES256", "KID-OTHER", anchor.fingerprint());
        let mut entry = signed_entry(header, b"{}");
        entry.signature.signature = "garbage".into();

        match verify_entry(&entry, &anchor).unwrap_err() {
            OnboardError::IdentityMismatch { field, actual, .. } => {
                assert_eq!(field, "kid");
                assert_eq!(actual, "KID-OTHER");
            }
            other => panic!("Expected IdentityMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_tampered_payload() {
        let anchor = anchor();
        let header = ProtectedHeader::new("ES256", anchor.key_identifier(), anchor.fingerprint());
        let mut entry = signed_entry(header, br#"{"publicKeySet":{"keys":[]}}"#);
        entry.signature.payload = CompactSignature::unsigned(
            &ProtectedHeader::new("ES256", "", ""),
            br#"{"publicKeySet":{"keys":[{"kid":"evil"}]}}"#,
        )
        .unwrap()
        .payload;

        let err = verify_entry(&entry, &anchor).unwrap_err();
        assert_eq!(err.kind(), "SignatureVerificationError");
    }

    #[test]
    fn test_non_object_payload() {
        let anchor = anchor();
        let header = ProtectedHeader::new("ES256", anchor.key_identifier(), anchor.fingerprint());
        let entry = signed_entry(header, b"[1,2,3]");

        let err = verify_entry(&entry, &anchor).unwrap_err();
        assert_eq!(err.kind(), "ManifestDecodeError");
    }

    #[test]
    fn test_verifier_value_form() {
        let anchor = Arc::new(anchor());
        let verifier = ManifestEntryVerifier::new(anchor.clone());
        let header = ProtectedHeader::new("ES256", anchor.key_identifier(), anchor.fingerprint());
        let entry = signed_entry(header, b"{}");
        let raw = serde_json::to_value(&entry).unwrap();

        let verified = verifier.verify_value(&raw).unwrap();
        assert_eq!(verified.unique_id, "SE-0001");
        assert!(verifier.verify_value(&serde_json::json!({"header": {}})).is_err());
    }
}
