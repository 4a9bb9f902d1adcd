use std::ops::BitOr;

use sha2::{Digest, Sha256};

use super::types::AuthenticatorError;
use crate::credential::CredentialId;
use crate::key_support::PublicKeyRecord;

pub const RP_ID_HASH_LEN: usize = 32;
/// rpIdHash + flags + signCount.
pub const AUTH_DATA_HEADER_LEN: usize = RP_ID_HASH_LEN + 1 + 4;
/// Longest credential ID WebAuthn relying parties accept.
pub const MAX_CREDENTIAL_ID_LEN: usize = 1023;

/// Authenticator data flags byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags(u8);

impl Flags {
    pub const USER_PRESENT: Flags = Flags(0x01);
    pub const USER_VERIFIED: Flags = Flags(0x04);
    pub const ATTESTED_CREDENTIAL: Flags = Flags(0x40);
    pub const EXTENSIONS: Flags = Flags(0x80);

    pub const fn empty() -> Self {
        Flags(0)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn set(&mut self, other: Flags, on: bool) {
        if on {
            self.0 |= other.0;
        } else {
            self.0 &= !other.0;
        }
    }
}

impl BitOr for Flags {
    type Output = Flags;

    fn bitor(self, rhs: Flags) -> Flags {
        Flags(self.0 | rhs.0)
    }
}

/// The attested-credential block carried only at registration.
#[derive(Debug, Clone, Copy)]
pub struct AttestedCredential<'a> {
    pub aaguid: [u8; 16],
    pub credential_id: &'a CredentialId,
    pub public_key: &'a PublicKeyRecord,
}

pub fn rp_id_hash(rp_id: &str) -> [u8; RP_ID_HASH_LEN] {
    Sha256::digest(rp_id.as_bytes()).into()
}

/// Assemble authenticator data:
/// `SHA-256(rp_id) || flags || signCount (BE u32) || [aaguid || credIdLen (BE u16) || credId || COSE_Key]`.
///
/// The AT flag is forced to match whether `attested` is present. Credential
/// IDs longer than [`MAX_CREDENTIAL_ID_LEN`] are rejected.
pub fn build(
    rp_id: &str,
    sign_count: u32,
    mut flags: Flags,
    attested: Option<&AttestedCredential<'_>>,
) -> Result<Vec<u8>, AuthenticatorError> {
    flags.set(Flags::ATTESTED_CREDENTIAL, attested.is_some());

    let mut data = Vec::with_capacity(AUTH_DATA_HEADER_LEN);
    data.extend_from_slice(&rp_id_hash(rp_id));
    data.push(flags.bits());
    data.extend_from_slice(&sign_count.to_be_bytes());

    if let Some(att) = attested {
        let cred_id = att.credential_id.as_bytes();
        let cred_id_len = u16::try_from(cred_id.len())
            .ok()
            .filter(|&n| usize::from(n) <= MAX_CREDENTIAL_ID_LEN)
            .ok_or_else(|| {
                AuthenticatorError::Internal(format!(
                    "credential id of {} bytes exceeds {MAX_CREDENTIAL_ID_LEN}",
                    cred_id.len()
                ))
            })?;
        let cose = att
            .public_key
            .to_cose()
            .map_err(|e| AuthenticatorError::Internal(format!("COSE key: {e}")))?;
        data.extend_from_slice(&att.aaguid);
        data.extend_from_slice(&cred_id_len.to_be_bytes());
        data.extend_from_slice(cred_id);
        data.extend_from_slice(&cose);
    }
    Ok(data)
}
