//! # Onboard Core
//!
//! Verification of manufacturer-signed secure-element manifests.
//!
//! A manifest is a JSON array of signed entries, one per secure element.
//! Each entry is a flattened JWS (protected header, payload, signature) plus
//! an unprotected header carrying the element's `uniqueId`. This crate proves
//! each entry was signed by the operator's trust anchor and pulls the device
//! certificate chain out of the verified payload.
//!
//! ## Key Concepts
//!
//! - **Trust anchor**: the single certificate whose key signs manifest entries
//! - **Manifest entry**: one signed secure-element record
//! - **Verified secure element**: the decoded payload of an entry that passed
//!   verification, bound to its `uniqueId`
//! - **Certificate chain**: the PEM concatenation of every `x5c` certificate in
//!   the payload's key set
//!
//! ## Binding Invariants
//!
//! 1. **Key identifier**: `protected.kid` equals the anchor's Subject Key Identifier
//! 2. **Fingerprint**: `protected.x5t#S256` equals the anchor's SHA-256 fingerprint
//! 3. **Algorithm**: only RS256/384/512 and ES256/384/512 are accepted, and only
//!    when they match the anchor's key type
//!
//! Invariants 1 and 2 are checked before any signature work is done.

pub mod anchor;
pub mod chain;
pub mod crypto;
pub mod error;
pub mod jws;
pub mod manifest;
pub mod types;
pub mod verify;

pub use anchor::TrustAnchor;
pub use chain::{certificate_to_pem, extract_certificate_chain};
pub use crypto::{KeyType, SigningAlgorithm};
pub use error::{OnboardError, Result};
pub use jws::{CompactSignature, ProtectedHeader};
pub use manifest::{EntryHeader, Manifest, ManifestEntry, ManifestSequencer, SequencedEntry};
pub use types::{PublicKeyRecord, PublicKeySet, SecureElementPayload, VerifiedSecureElement};
pub use verify::{verify_entry, ManifestEntryVerifier};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
