//! Compact signature codec
//!
//! A manifest entry carries its signature in the flattened JWS JSON form:
//! three base64url segments named `protected`, `payload` and `signature`.
//! Verification works on the compact form `protected.payload.signature`,
//! where the first two segments joined by `.` are the signing input.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::crypto::SigningAlgorithm;
use crate::error::{OnboardError, Result};

/// URL-safe base64 without padding on encode; padding is optional on decode.
pub(crate) const BASE64URL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decoded JWS protected header
///
/// `kid` and `x5t#S256` name the certificate that signed the entry. They are
/// required: an entry that does not say who signed it is malformed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectedHeader {
    /// Declared signature algorithm
    pub alg: String,

    /// Base64url Subject Key Identifier of the signing certificate
    pub kid: String,

    /// Base64url SHA-256 fingerprint of the signing certificate
    #[serde(rename = "x5t#S256")]
    pub x5t_s256: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
}

impl ProtectedHeader {
    /// Create a protected header
    pub fn new(alg: impl Into<String>, kid: impl Into<String>, x5t_s256: impl Into<String>) -> Self {
        Self {
            alg: alg.into(),
            kid: kid.into(),
            x5t_s256: x5t_s256.into(),
            typ: None,
        }
    }

    /// Parse the declared algorithm against the allow-list
    pub fn algorithm(&self) -> Result<SigningAlgorithm> {
        self.alg.parse()
    }
}

/// A three-part JWS envelope in its detached JSON form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactSignature {
    /// Base64url protected header
    pub protected: String,

    /// Base64url payload
    pub payload: String,

    /// Base64url signature
    pub signature: String,
}

impl CompactSignature {
    /// Encode a header and payload into an envelope with an empty signature
    ///
    /// Sign [`CompactSignature::signing_input`] and attach the result with
    /// [`CompactSignature::with_signature`].
    pub fn unsigned(header: &ProtectedHeader, payload: &[u8]) -> Result<Self> {
        let header_json = serde_json::to_vec(header)?;
        Ok(Self {
            protected: BASE64URL.encode(header_json),
            payload: BASE64URL.encode(payload),
            signature: String::new(),
        })
    }

    /// Attach a base64url signature
    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = signature.into();
        self
    }

    /// Parse `protected.payload.signature`
    pub fn from_compact(compact: &str) -> Result<Self> {
        let mut parts = compact.split('.');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(protected), Some(payload), Some(signature), None) => Ok(Self {
                protected: protected.to_string(),
                payload: payload.to_string(),
                signature: signature.to_string(),
            }),
            _ => Err(OnboardError::ManifestDecode(
                "compact signature must have exactly three segments".into(),
            )),
        }
    }

    /// Serialize to `protected.payload.signature`
    pub fn to_compact(&self) -> String {
        format!("{}.{}.{}", self.protected, self.payload, self.signature)
    }

    /// The bytes covered by the signature: `protected.payload`
    pub fn signing_input(&self) -> String {
        format!("{}.{}", self.protected, self.payload)
    }

    /// Decode the protected header
    pub fn protected_header(&self) -> Result<ProtectedHeader> {
        let bytes = BASE64URL.decode(&self.protected).map_err(|e| {
            OnboardError::ManifestDecode(format!("protected header is not base64url: {}", e))
        })?;
        serde_json::from_slice(&bytes).map_err(|e| {
            OnboardError::ManifestDecode(format!("protected header is not valid: {}", e))
        })
    }

    /// Decode the payload bytes
    ///
    /// Note: this does NOT verify the signature.
    pub fn payload_bytes(&self) -> Result<Vec<u8>> {
        BASE64URL.decode(&self.payload).map_err(|e| {
            OnboardError::ManifestDecode(format!("payload is not base64url: {}", e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compact_form() {
        let sig = CompactSignature::from_compact("aGVhZA.Ym9keQ.c2ln").unwrap();
        assert_eq!(sig.protected, "aGVhZA");
        assert_eq!(sig.payload, "Ym9keQ");
        assert_eq!(sig.signature, "c2ln");
        assert_eq!(sig.signing_input(), "aGVhZA.Ym9keQ");
        assert_eq!(sig.to_compact(), "aGVhZA.Ym9keQ.c2ln");
    }

    #[test]
    fn test_compact_form_segment_count() {
        assert!(CompactSignature::from_compact("a.b").is_err());
        assert!(CompactSignature::from_compact("a.b.c.d").is_err());
        // Empty segments are structurally fine; decoding catches them later
        assert!(CompactSignature::from_compact("..").is_ok());
    }

    #[test]
    fn test_unsigned_envelope() {
        let header = ProtectedHeader::new("ES256", "KID1", "FP1");
        let envelope = CompactSignature::unsigned(&header, b"{\"a\":1}").unwrap();

        assert!(envelope.signature.is_empty());
        assert!(!envelope.protected.contains('='));
        assert_eq!(envelope.protected_header().unwrap(), header);
        assert_eq!(envelope.payload_bytes().unwrap(), b"{\"a\":1}");
    }

    #[test]
    fn test_padding_is_optional() {
        let mut envelope = CompactSignature::unsigned(
            &ProtectedHeader::new("RS256", "k", "f"),
            b"ab",
        )
        .unwrap();
        assert_eq!(envelope.payload, "YWI");
        envelope.payload = "YWI=".into();
        assert_eq!(envelope.payload_bytes().unwrap(), b"ab");
    }

    #[test]
    fn test_header_requires_binding_fields() {
        let envelope = CompactSignature {
            protected: BASE64URL.encode(br#"{"alg":"RS256","kid":"KID1"}"#),
            payload: String::new(),
            signature: String::new(),
        };
        let err = envelope.protected_header().unwrap_err();
        assert_eq!(err.kind(), "ManifestDecodeError");
        assert!(err.to_string().contains("x5t#S256"));
    }

    #[test]
    fn test_header_not_base64() {
        let envelope = CompactSignature {
            protected: "not base64!".into(),
            payload: String::new(),
            signature: String::new(),
        };
        assert_eq!(
            envelope.protected_header().unwrap_err().kind(),
            "ManifestDecodeError"
        );
    }
}
