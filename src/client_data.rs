//! WebAuthn `clientDataJSON` as a browser would build it. The authenticator
//! itself only ever sees the SHA-256 of this document.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::ceremony::CeremonyKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientData {
    #[serde(rename = "type")]
    pub ty: String,
    /// base64url (unpadded) challenge.
    pub challenge: String,
    pub origin: String,
    pub cross_origin: bool,
}

impl ClientData {
    pub fn new(kind: CeremonyKind, challenge: &[u8], origin: impl Into<String>) -> Self {
        let ty = match kind {
            CeremonyKind::Registration => "webauthn.create",
            CeremonyKind::Authentication => "webauthn.get",
        };
        Self {
            ty: ty.to_string(),
            challenge: URL_SAFE_NO_PAD.encode(challenge),
            origin: origin.into(),
            cross_origin: false,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// SHA-256 of the serialized document, the `client_data_hash` of a request.
    pub fn hash(&self) -> Result<[u8; 32], serde_json::Error> {
        Ok(hash(self.to_json()?.as_bytes()))
    }

    pub fn challenge_bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        URL_SAFE_NO_PAD.decode(&self.challenge)
    }
}

pub fn hash(client_data_json: &[u8]) -> [u8; 32] {
    Sha256::digest(client_data_json).into()
}
