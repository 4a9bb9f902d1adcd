use std::time::Duration;

use crate::algorithm::CoseAlgorithm;
use crate::consent::{ConsentError, UserCheck};
use crate::credential::{CodecError, CredentialId, DecodeFailure};
use crate::key_support::PublicKeyRecord;
use crate::keystore::{AccessPolicy, KeyStoreError};

use super::AuthenticatorConfig;
use super::attestation::build_attestation_object;

/// Longest user handle WebAuthn allows.
pub const MAX_USER_HANDLE_LEN: usize = 64;
pub const CLIENT_DATA_HASH_LEN: usize = 32;
/// Relying party ids are domain names.
pub const MAX_RP_ID_LEN: usize = 253;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CeremonyKind {
    Registration,
    Authentication,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UserVerification {
    Required,
    #[default]
    Preferred,
    Discouraged,
}

impl UserVerification {
    pub(crate) fn access_policy(self) -> AccessPolicy {
        match self {
            Self::Required => AccessPolicy::UserVerification,
            Self::Preferred | Self::Discouraged => AccessPolicy::UserPresence,
        }
    }

    pub(crate) fn check(self) -> UserCheck {
        match self {
            Self::Required => UserCheck::Verification,
            Self::Preferred | Self::Discouraged => UserCheck::Presence,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelyingParty {
    pub id: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserEntity {
    /// Opaque user handle.
    pub id: Vec<u8>,
    pub name: Option<String>,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RegistrationRequest {
    pub rp: RelyingParty,
    pub user: UserEntity,
    pub client_data_hash: Vec<u8>,
    /// Relying party's algorithms, most preferred first.
    pub algorithms: Vec<CoseAlgorithm>,
    pub exclude_list: Vec<CredentialId>,
    pub user_verification: UserVerification,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct AuthenticationRequest {
    pub rp_id: String,
    pub client_data_hash: Vec<u8>,
    pub allow_list: Vec<CredentialId>,
    pub user_verification: UserVerification,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct RegistrationResponse {
    pub credential_id: CredentialId,
    pub authenticator_data: Vec<u8>,
    /// Self-attestation signature over `authenticator_data || client_data_hash`.
    pub signature: Vec<u8>,
    pub public_key: PublicKeyRecord,
    pub algorithm: CoseAlgorithm,
}

impl RegistrationResponse {
    /// WebAuthn attestation object in the "packed" self-attestation format.
    pub fn attestation_object(&self) -> Result<Vec<u8>, AuthenticatorError> {
        build_attestation_object(&self.authenticator_data, self.algorithm, &self.signature)
    }
}

#[derive(Debug, Clone)]
pub struct AuthenticationResponse {
    pub credential_id: CredentialId,
    pub authenticator_data: Vec<u8>,
    /// Signature over `authenticator_data || client_data_hash`.
    pub signature: Vec<u8>,
    pub user_handle: Vec<u8>,
    pub sign_count: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthenticatorError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("no supported algorithm")]
    UnsupportedAlgorithm,
    #[error("credential already registered")]
    AlreadyRegistered,
    #[error("another ceremony is in progress")]
    Busy,
    #[error("user declined")]
    UserDeclined,
    #[error("timed out")]
    Timeout,
    #[error("cancelled")]
    Cancelled,
    #[error("no usable credential")]
    NoCredentials,
    #[error("consent unavailable: {0}")]
    ConsentUnavailable(String),
    #[error("key store failure: {0}")]
    KeyStoreFailure(String),
    #[error("credential identifier not decodable")]
    DecodeFailure,
    #[error("internal: {0}")]
    Internal(String),
}

/// Payload-free mirror of [`AuthenticatorError`] for events and matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidRequest,
    UnsupportedAlgorithm,
    AlreadyRegistered,
    Busy,
    UserDeclined,
    Timeout,
    Cancelled,
    NoCredentials,
    ConsentUnavailable,
    KeyStoreFailure,
    DecodeFailure,
    Internal,
}

impl AuthenticatorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Self::UnsupportedAlgorithm => ErrorKind::UnsupportedAlgorithm,
            Self::AlreadyRegistered => ErrorKind::AlreadyRegistered,
            Self::Busy => ErrorKind::Busy,
            Self::UserDeclined => ErrorKind::UserDeclined,
            Self::Timeout => ErrorKind::Timeout,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::NoCredentials => ErrorKind::NoCredentials,
            Self::ConsentUnavailable(_) => ErrorKind::ConsentUnavailable,
            Self::KeyStoreFailure(_) => ErrorKind::KeyStoreFailure,
            Self::DecodeFailure => ErrorKind::DecodeFailure,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// CTAP2 status byte for this failure.
    pub fn ctap_status(&self) -> u8 {
        match self {
            Self::InvalidRequest(_) => 0x02,
            Self::UnsupportedAlgorithm => 0x26,
            Self::AlreadyRegistered => 0x19,
            Self::Busy => 0x06,
            Self::UserDeclined => 0x27,
            Self::Timeout => 0x2A,
            Self::Cancelled => 0x2D,
            Self::NoCredentials | Self::DecodeFailure => 0x2E,
            Self::ConsentUnavailable(_) | Self::KeyStoreFailure(_) | Self::Internal(_) => 0x7F,
        }
    }
}

impl From<KeyStoreError> for AuthenticatorError {
    fn from(e: KeyStoreError) -> Self {
        Self::KeyStoreFailure(e.to_string())
    }
}

impl From<ConsentError> for AuthenticatorError {
    fn from(e: ConsentError) -> Self {
        Self::ConsentUnavailable(e.to_string())
    }
}

impl From<DecodeFailure> for AuthenticatorError {
    fn from(_: DecodeFailure) -> Self {
        Self::DecodeFailure
    }
}

impl From<CodecError> for AuthenticatorError {
    fn from(e: CodecError) -> Self {
        Self::Internal(e.to_string())
    }
}

fn check_common(
    rp_id: &str,
    client_data_hash: &[u8],
    timeout: Duration,
    config: &AuthenticatorConfig,
) -> Result<(), AuthenticatorError> {
    if rp_id.is_empty() {
        return Err(AuthenticatorError::InvalidRequest("empty relying party id".into()));
    }
    if rp_id.len() > MAX_RP_ID_LEN {
        return Err(AuthenticatorError::InvalidRequest(format!(
            "relying party id longer than {MAX_RP_ID_LEN} bytes"
        )));
    }
    if client_data_hash.len() != CLIENT_DATA_HASH_LEN {
        return Err(AuthenticatorError::InvalidRequest(format!(
            "client data hash must be {CLIENT_DATA_HASH_LEN} bytes, got {}",
            client_data_hash.len()
        )));
    }
    if timeout < config.min_timeout || timeout > config.max_timeout {
        return Err(AuthenticatorError::InvalidRequest(format!(
            "timeout {timeout:?} outside [{:?}, {:?}]",
            config.min_timeout, config.max_timeout
        )));
    }
    Ok(())
}

impl RegistrationRequest {
    pub(crate) fn validate(&self, config: &AuthenticatorConfig) -> Result<(), AuthenticatorError> {
        check_common(&self.rp.id, &self.client_data_hash, self.timeout, config)?;
        if self.algorithms.is_empty() {
            return Err(AuthenticatorError::InvalidRequest("no algorithms requested".into()));
        }
        if self.user.id.is_empty() || self.user.id.len() > MAX_USER_HANDLE_LEN {
            return Err(AuthenticatorError::InvalidRequest(format!(
                "user handle must be 1..={MAX_USER_HANDLE_LEN} bytes, got {}",
                self.user.id.len()
            )));
        }
        Ok(())
    }
}

impl AuthenticationRequest {
    pub(crate) fn validate(&self, config: &AuthenticatorConfig) -> Result<(), AuthenticatorError> {
        check_common(&self.rp_id, &self.client_data_hash, self.timeout, config)
    }
}
