//! Key residency capability.
//!
//! Private keys never leave the store; they are addressed by a label chosen
//! by the ceremony orchestrator. Signing requires a [`UserPresenceProof`]
//! whose level satisfies the access policy recorded at generation time.

pub mod der;
pub mod soft;

use std::sync::Arc;

pub use crate::consent::UserPresenceProof;
pub use soft::SoftKeyStore;

/// Key shapes a store can be asked to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    /// NIST P-256, exported as a DER SubjectPublicKeyInfo.
    EcP256,
}

/// Gate that must be satisfied before a key may sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPolicy {
    UserPresence,
    UserVerification,
}

#[derive(Debug, thiserror::Error)]
pub enum KeyStoreError {
    #[error("label already in use: {0}")]
    LabelInUse(String),
    #[error("no key for label: {0}")]
    NotFound(String),
    #[error("access policy not satisfied for label: {0}")]
    AccessDenied(String),
    #[error("unsupported key type: {0:?}")]
    Unsupported(KeyType),
    #[error("malformed public key export: {0}")]
    MalformedExport(String),
    #[error("key generation failed: {0}")]
    Generate(String),
    #[error("signing failed: {0}")]
    Sign(String),
    #[error("key store unavailable: {0}")]
    Unavailable(String),
    #[cfg(feature = "tpm")]
    #[error("TPM: {0}")]
    Tpm(#[from] crate::tpm::TpmError),
}

/// Hardware-backed (or reference) key store.
///
/// Implementations may block: TPM round trips and platform prompts are
/// expected, so the orchestrator only calls these from a blocking worker.
pub trait KeyStore: Send + Sync {
    fn generate(
        &self,
        label: &str,
        key_type: KeyType,
        policy: AccessPolicy,
    ) -> Result<(), KeyStoreError>;

    /// DER SubjectPublicKeyInfo of the key under `label`.
    fn export_public_key(&self, label: &str) -> Result<Vec<u8>, KeyStoreError>;

    /// DER-encoded ECDSA signature over SHA-256(`data`).
    fn sign(
        &self,
        label: &str,
        data: &[u8],
        proof: &UserPresenceProof,
    ) -> Result<Vec<u8>, KeyStoreError>;
}

impl<T: KeyStore + ?Sized> KeyStore for Arc<T> {
    fn generate(
        &self,
        label: &str,
        key_type: KeyType,
        policy: AccessPolicy,
    ) -> Result<(), KeyStoreError> {
        (**self).generate(label, key_type, policy)
    }

    fn export_public_key(&self, label: &str) -> Result<Vec<u8>, KeyStoreError> {
        (**self).export_public_key(label)
    }

    fn sign(
        &self,
        label: &str,
        data: &[u8],
        proof: &UserPresenceProof,
    ) -> Result<Vec<u8>, KeyStoreError> {
        (**self).sign(label, data, proof)
    }
}
