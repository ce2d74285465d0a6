//! Registry Integration Tests
//!
//! Full provisioning sequences against the in-memory registry using real
//! device certificates:
//! - Happy path through all five calls
//! - Idempotence of every call
//! - Binding conflicts
//! - Certificate ids derived from the leading certificate

use onboard_registry::{GatewayError, InMemoryRegistry, ProvisioningGateway};
use sha2::{Digest, Sha256};

// =============================================================================
// Test Helpers
// =============================================================================

const DEVICE_1: &str = include_str!("../../onboard-core/tests/fixtures/device1.crt");
const DEVICE_2: &str = include_str!("../../onboard-core/tests/fixtures/device2.crt");
const DEVICE_3: &str = include_str!("../../onboard-core/tests/fixtures/device3.crt");

const POLICY: &str = "device-policy";

fn registry() -> InMemoryRegistry {
    InMemoryRegistry::new().with_policy(POLICY)
}

fn der_sha256_hex(pem_text: &str) -> String {
    let der = pem::parse(pem_text).unwrap().into_contents();
    format!("{:x}", Sha256::digest(der))
}

/// Run the five provisioning calls for one device
async fn provision(registry: &InMemoryRegistry, chain: &str, device: &str) -> Result<(), GatewayError> {
    let cert = registry.register_certificate(chain).await?;
    registry.attach_policy(&cert, POLICY).await?;
    registry.activate_certificate(&cert).await?;
    let identity = registry.create_identity(device).await?;
    registry.bind_certificate_to_identity(&identity, &cert).await
}

// =============================================================================
// Provisioning
// =============================================================================

#[tokio::test]
async fn test_provision_one_device() {
    let registry = registry();
    provision(&registry, DEVICE_1, "CS-CORD-DK-SE-0001")
        .await
        .unwrap();

    let identity = registry.identity("CS-CORD-DK-SE-0001").unwrap();
    let cert_id = identity.certificate_id.clone().unwrap();
    assert_eq!(cert_id, der_sha256_hex(DEVICE_1));
    assert!(identity.bound_at.is_some());

    let cert = registry.certificate(&cert_id).unwrap();
    assert!(cert.active);
    assert!(cert.policies.contains(POLICY));
    assert_eq!(cert.chain_pem, DEVICE_1);
    assert_eq!(cert.chain_length, 1);
    assert!(cert.subject.contains("CN="));
}

#[tokio::test]
async fn test_chain_id_from_leading_certificate() {
    let registry = registry();
    let chain = format!("{}{}", DEVICE_2, DEVICE_1);
    let handle = registry.register_certificate(&chain).await.unwrap();

    assert_eq!(handle.certificate_id, der_sha256_hex(DEVICE_2));
    assert_eq!(registry.certificate(&handle.certificate_id).unwrap().chain_length, 2);
}

#[tokio::test]
async fn test_chain_with_garbage_after_valid_certificate() {
    let registry = registry();
    let chain = format!(
        "{}-----BEGIN CERTIFICATE-----\nAAAA\n-----END CERTIFICATE-----\n",
        DEVICE_1
    );

    let err = registry.register_certificate(&chain).await.unwrap_err();
    assert_eq!(err.kind(), "RegistrationError");
    assert_eq!(registry.certificate_count(), 0);
}

// =============================================================================
// Idempotence
// =============================================================================

#[tokio::test]
async fn test_provision_twice_same_state() {
    let registry = registry();
    provision(&registry, DEVICE_1, "dev-1").await.unwrap();
    let before = registry.identity("dev-1").unwrap();
    let cert_before = registry.certificate(&der_sha256_hex(DEVICE_1)).unwrap();

    provision(&registry, DEVICE_1, "dev-1").await.unwrap();

    assert_eq!(registry.identity_count(), 1);
    assert_eq!(registry.certificate_count(), 1);
    assert_eq!(registry.identity("dev-1").unwrap(), before);
    assert_eq!(
        registry.certificate(&der_sha256_hex(DEVICE_1)).unwrap(),
        cert_before
    );
}

#[tokio::test]
async fn test_register_same_chain_returns_same_handle() {
    let registry = registry();
    let a = registry.register_certificate(DEVICE_3).await.unwrap();
    let b = registry.register_certificate(DEVICE_3).await.unwrap();
    assert_eq!(a, b);
    assert_eq!(registry.certificate_count(), 1);
}

// =============================================================================
// Conflicts
// =============================================================================

#[tokio::test]
async fn test_rebind_to_different_certificate() {
    let registry = registry();
    provision(&registry, DEVICE_1, "dev-1").await.unwrap();

    let err = provision(&registry, DEVICE_2, "dev-1").await.unwrap_err();
    assert_eq!(err.kind(), "BindingError");
    assert!(err.to_string().contains("already bound"));

    // The original binding is untouched
    let identity = registry.identity("dev-1").unwrap();
    assert_eq!(identity.certificate_id.unwrap(), der_sha256_hex(DEVICE_1));
}

#[tokio::test]
async fn test_one_certificate_many_identities() {
    let registry = registry();
    provision(&registry, DEVICE_1, "dev-a").await.unwrap();
    provision(&registry, DEVICE_1, "dev-b").await.unwrap();

    assert_eq!(registry.identity_count(), 2);
    assert_eq!(registry.certificate_count(), 1);
}

#[tokio::test]
async fn test_records_serialize() {
    let registry = registry();
    provision(&registry, DEVICE_1, "dev-1").await.unwrap();

    let json = serde_json::to_value(registry.list_identities()).unwrap();
    assert_eq!(json[0]["name"], "dev-1");
    assert_eq!(json[0]["certificate_id"], der_sha256_hex(DEVICE_1));
}
