use crate::algorithm::CoseAlgorithm;
use crate::keystore::der::{P256_SPKI_LEN, p256_spki_coords};
use crate::keystore::{AccessPolicy, KeyStore, KeyStoreError, KeyType, UserPresenceProof};

use super::{COSE_CRV_P256, PublicKeyRecord};

/// ECDSA over P-256 with SHA-256 (COSE -7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Es256KeySupport;

impl Es256KeySupport {
    pub fn create_key_pair<S: KeyStore + ?Sized>(
        &self,
        store: &S,
        label: &str,
        policy: AccessPolicy,
    ) -> Result<PublicKeyRecord, KeyStoreError> {
        tracing::debug!(label, ?policy, "ES256 createKeyPair");
        store.generate(label, KeyType::EcP256, policy)?;
        let der = store.export_public_key(label)?;
        let Some((x, y)) = p256_spki_coords(&der) else {
            tracing::warn!(
                label,
                len = der.len(),
                expected = P256_SPKI_LEN,
                "Exported public key is not a P-256 SPKI"
            );
            return Err(KeyStoreError::MalformedExport(format!(
                "expected {P256_SPKI_LEN}-byte P-256 SPKI, got {} bytes",
                der.len()
            )));
        };
        Ok(PublicKeyRecord {
            algorithm: CoseAlgorithm::Es256,
            curve: COSE_CRV_P256,
            x,
            y,
        })
    }

    pub fn sign<S: KeyStore + ?Sized>(
        &self,
        store: &S,
        data: &[u8],
        label: &str,
        proof: &UserPresenceProof,
    ) -> Result<Vec<u8>, KeyStoreError> {
        store.sign(label, data, proof).inspect_err(|e| {
            tracing::warn!(label, error = %e, "ES256 sign failed");
        })
    }
}
