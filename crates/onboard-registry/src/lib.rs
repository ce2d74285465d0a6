//! Device Identity Registry
//!
//! The registry side of onboarding: once a manifest entry has been verified,
//! its certificate chain is registered and bound to a named device identity.
//!
//! ## Architecture
//!
//! The concrete cloud registry is an external collaborator, reached through
//! the [`ProvisioningGateway`] trait. Provisioning one device is five calls:
//!
//! 1. Register the certificate chain
//! 2. Attach the device policy to the certificate
//! 3. Activate the certificate
//! 4. Create the device identity
//! 5. Bind the certificate to the identity
//!
//! [`InMemoryRegistry`] implements the trait for development and tests. Every
//! call is idempotent: repeating a call with the same arguments succeeds and
//! leaves the registry unchanged.
//!
//! ## Usage
//!
//! ```ignore
//! use onboard_registry::{InMemoryRegistry, ProvisioningGateway};
//!
//! let registry = InMemoryRegistry::new().with_policy("device-policy");
//!
//! let cert = registry.register_certificate(&chain_pem).await?;
//! registry.attach_policy(&cert, "device-policy").await?;
//! registry.activate_certificate(&cert).await?;
//! let identity = registry.create_identity("CS-CORD-DK-SE-0001").await?;
//! registry.bind_certificate_to_identity(&identity, &cert).await?;
//! ```

pub mod error;
pub mod gateway;
pub mod memory;
pub mod mock;
pub mod types;

pub use error::{GatewayError, Result};
pub use gateway::{ProvisioningGateway, ProvisioningStep};
pub use memory::InMemoryRegistry;
pub use mock::{RecordedCall, RecordingGateway};
pub use types::{CertificateHandle, CertificateRecord, IdentityHandle, IdentityRecord};
