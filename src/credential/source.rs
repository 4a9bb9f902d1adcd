use serde::{Deserialize, Serialize};

use super::CodecError;
use crate::algorithm::CoseAlgorithm;

pub(crate) const SOURCE_VERSION: u8 = 1;

/// The authenticator's private view of a credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialSource {
    pub rp_id: String,
    pub user_handle: Vec<u8>,
    pub key_label: String,
    pub algorithm: CoseAlgorithm,
    pub sign_count: u32,
}

/// Wire form, a CBOR array in fixed field order:
/// `[version, rp_id, user_handle, key_label, alg, sign_count]`.
#[derive(Serialize, Deserialize)]
struct SourceRecord(
    u8,
    String,
    #[serde(with = "serde_bytes")] Vec<u8>,
    String,
    i64,
    u32,
);

impl CredentialSource {
    pub(crate) fn to_cbor(&self) -> Result<Vec<u8>, CodecError> {
        let record = SourceRecord(
            SOURCE_VERSION,
            self.rp_id.clone(),
            self.user_handle.clone(),
            self.key_label.clone(),
            self.algorithm.value(),
            self.sign_count,
        );
        let mut buf = Vec::new();
        ciborium::into_writer(&record, &mut buf)
            .map_err(|e| CodecError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    pub(crate) fn from_cbor(data: &[u8]) -> Option<Self> {
        let SourceRecord(version, rp_id, user_handle, key_label, alg, sign_count) =
            ciborium::from_reader(data).ok()?;
        if version != SOURCE_VERSION {
            return None;
        }
        Some(Self {
            rp_id,
            user_handle,
            key_label,
            algorithm: CoseAlgorithm::from(alg),
            sign_count,
        })
    }
}
