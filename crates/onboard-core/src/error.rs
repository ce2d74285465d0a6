//! Error types for manifest verification

use thiserror::Error;

/// Result type alias using OnboardError
pub type Result<T> = std::result::Result<T, OnboardError>;

/// Errors that can occur while loading the trust anchor or verifying entries
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OnboardError {
    /// The trust anchor is unreadable or not a usable X.509 certificate
    #[error("Trust anchor could not be loaded: {0}")]
    TrustLoad(String),

    /// Malformed JSON or base64 in a manifest or one of its entries
    #[error("Manifest decode failed: {0}")]
    ManifestDecode(String),

    /// The entry declares a signer other than the trust anchor
    #[error("{field} does not match trust anchor: expected '{expected}', got '{actual}'")]
    IdentityMismatch {
        field: &'static str,
        expected: String,
        actual: String,
    },

    /// Cryptographic check failed or the algorithm is not allowed
    #[error("Signature verification failed: {0}")]
    SignatureVerification(String),
}

impl OnboardError {
    /// Name of the error kind, as reported to callers
    pub fn kind(&self) -> &'static str {
        match self {
            OnboardError::TrustLoad(_) => "TrustLoadError",
            OnboardError::ManifestDecode(_) => "ManifestDecodeError",
            OnboardError::IdentityMismatch { .. } => "IdentityMismatchError",
            OnboardError::SignatureVerification(_) => "SignatureVerificationError",
        }
    }

    /// Whether the error rejects a single entry rather than the whole batch
    pub fn is_entry_level(&self) -> bool {
        !matches!(self, OnboardError::TrustLoad(_))
    }
}

impl From<serde_json::Error> for OnboardError {
    fn from(err: serde_json::Error) -> Self {
        OnboardError::ManifestDecode(err.to_string())
    }
}

impl From<base64::DecodeError> for OnboardError {
    fn from(err: base64::DecodeError) -> Self {
        OnboardError::ManifestDecode(format!("invalid base64: {}", err))
    }
}

impl From<jsonwebtoken::errors::Error> for OnboardError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::InvalidSignature => {
                OnboardError::SignatureVerification("signature does not match".into())
            }
            ErrorKind::InvalidAlgorithm => {
                OnboardError::SignatureVerification("algorithm not allowed for key".into())
            }
            _ => OnboardError::SignatureVerification(err.to_string()),
        }
    }
}
