//! Certificate chain extraction
//!
//! Walks `publicKeySet.keys` in order and, for each key, its `x5c`
//! certificates in order. Every certificate is decoded from standard base64,
//! checked to parse as X.509, and re-encoded as PEM. The PEM blocks are
//! concatenated as-is.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::debug;
use x509_parser::prelude::{FromDer, X509Certificate};

use crate::anchor::encode_pem;
use crate::error::{OnboardError, Result};
use crate::types::SecureElementPayload;

/// Extract the PEM certificate chain from a verified payload
///
/// Returns an empty string when the payload carries no certificates.
/// Whether an empty chain is acceptable is up to the caller.
pub fn extract_certificate_chain(payload: &SecureElementPayload) -> Result<String> {
    let mut chain = String::new();

    for (key_index, key) in payload.keys().iter().enumerate() {
        for (cert_index, cert_b64) in key.x5c.iter().enumerate() {
            let der = STANDARD.decode(cert_b64).map_err(|e| {
                OnboardError::ManifestDecode(format!(
                    "key {} x5c[{}] is not base64: {}",
                    key_index, cert_index, e
                ))
            })?;
            X509Certificate::from_der(&der).map_err(|e| {
                OnboardError::ManifestDecode(format!(
                    "key {} x5c[{}] is not an X.509 certificate: {}",
                    key_index, cert_index, e
                ))
            })?;
            chain.push_str(&certificate_to_pem(&der));
        }
    }

    debug!(
        keys = payload.keys().len(),
        chain_len = chain.len(),
        "Extracted certificate chain"
    );

    Ok(chain)
}

/// Encode a DER certificate as a PEM `CERTIFICATE` block
pub fn certificate_to_pem(der: &[u8]) -> String {
    encode_pem("CERTIFICATE", der.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PublicKeyRecord, PublicKeySet};

    const DEVICE_1: &str = include_str!("../tests/fixtures/device1.crt");
    const DEVICE_2: &str = include_str!("../tests/fixtures/device2.crt");

    fn der_of(pem_text: &str) -> Vec<u8> {
        pem::parse(pem_text).unwrap().into_contents()
    }

    fn record(x5c: Vec<String>) -> PublicKeyRecord {
        PublicKeyRecord {
            x5c,
            ..Default::default()
        }
    }

    #[test]
    fn test_certificate_to_pem() {
        let der = der_of(DEVICE_1);
        let pem_text = certificate_to_pem(&der);
        assert!(pem_text.starts_with("-----BEGIN CERTIFICATE-----\n"));
        assert!(pem_text.ends_with("-----END CERTIFICATE-----\n"));
        assert!(!pem_text.contains('\r'));
        assert_eq!(pem::parse(&pem_text).unwrap().contents(), der.as_slice());
    }

    #[test]
    fn test_no_key_set_yields_empty_chain() {
        let payload = SecureElementPayload::default();
        assert_eq!(extract_certificate_chain(&payload).unwrap(), "");
    }

    #[test]
    fn test_keys_without_x5c_contribute_nothing() {
        let c1 = STANDARD.encode(der_of(DEVICE_1));
        let payload = SecureElementPayload {
            public_key_set: Some(PublicKeySet {
                keys: vec![record(vec![]), record(vec![c1.clone()]), record(vec![])],
            }),
            ..Default::default()
        };

        let chain = extract_certificate_chain(&payload).unwrap();
        assert_eq!(chain, certificate_to_pem(&der_of(DEVICE_1)));
    }

    #[test]
    fn test_order_within_and_across_keys() {
        let c1 = der_of(DEVICE_1);
        let c2 = der_of(DEVICE_2);
        let payload = SecureElementPayload {
            public_key_set: Some(PublicKeySet {
                keys: vec![
                    record(vec![STANDARD.encode(&c2)]),
                    record(vec![STANDARD.encode(&c1), STANDARD.encode(&c2)]),
                ],
            }),
            ..Default::default()
        };

        let chain = extract_certificate_chain(&payload).unwrap();
        let blocks = pem::parse_many(&chain).unwrap();
        let contents: Vec<&[u8]> = blocks.iter().map(|b| b.contents()).collect();
        assert_eq!(contents, vec![c2.as_slice(), c1.as_slice(), c2.as_slice()]);
    }

    #[test]
    fn test_bad_base64_is_decode_error() {
        let payload = SecureElementPayload {
            public_key_set: Some(PublicKeySet {
                keys: vec![record(vec!["%%%".into()])],
            }),
            ..Default::default()
        };
        let err = extract_certificate_chain(&payload).unwrap_err();
        assert_eq!(err.kind(), "ManifestDecodeError");
    }

    #[test]
    fn test_non_certificate_der_is_decode_error() {
        let payload = SecureElementPayload {
            public_key_set: Some(PublicKeySet {
                keys: vec![record(vec![STANDARD.encode(b"not a certificate")])],
            }),
            ..Default::default()
        };
        let err = extract_certificate_chain(&payload).unwrap_err();
        assert!(err.to_string().contains("x5c[0]"));
    }
}
