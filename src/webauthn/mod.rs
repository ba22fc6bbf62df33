//! Biometric (`WebAuthn`) credential management and ceremony state.

pub mod models;
pub mod repo;
pub mod service;

pub use models::{AttemptKind, BiometricCredential, WebauthnAttempt};
pub use repo::{AttemptRepo, CredentialRepo};
pub use service::{
    deserialize_passkey, serialize_passkey, BiometricAuthenticationError, BiometricConfig,
    BiometricRegistrationError, BiometricService,
};
