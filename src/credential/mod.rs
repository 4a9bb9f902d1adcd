//! Credential sources and their encrypted, self-describing identifiers.
//!
//! There is no credential database: the identifier handed to the relying
//! party *is* the credential source, sealed under the authenticator's
//! symmetric key.

pub mod codec;
pub mod source;

use std::fmt;

pub use codec::{NONCE_LEN, SymmetricKey, TAG_LEN, decode, encode};
pub use source::CredentialSource;

/// Opaque credential identifier (`nonce || ciphertext || tag`).
/// Collaborators must treat it as uninterpreted bytes.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CredentialId(Vec<u8>);

impl CredentialId {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl From<Vec<u8>> for CredentialId {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for CredentialId {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl AsRef<[u8]> for CredentialId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for CredentialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CredentialId({})", self.to_hex())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Serialize: {0}")]
    Serialization(String),
    #[error("Encrypt: {0}")]
    Encryption(String),
    #[error("Invalid key length: {0}")]
    KeyLength(usize),
}

/// The identifier could not be opened with this key.
///
/// Deliberately carries no reason: truncation, tag mismatch and malformed
/// plaintext all look the same from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("credential identifier not decodable")]
pub struct DecodeFailure;
