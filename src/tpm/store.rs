use std::path::{Path, PathBuf};

use super::{KeyBlob, TpmContext, TpmError, keys};
use crate::keystore::der::{encode_der_ecdsa, p256_spki};
use crate::keystore::{AccessPolicy, KeyStore, KeyStoreError, KeyType, UserPresenceProof};

const POLICY_PRESENCE: u8 = 0;
const POLICY_VERIFICATION: u8 = 1;

/// Key store whose keys are TPM-wrapped blobs, one file per label.
///
/// File layout: `policy (u8) || KeyBlob`. The private half can only be
/// loaded by the TPM that created it.
#[derive(Debug, Clone)]
pub struct TpmKeyStore {
    tpm: TpmContext,
    dir: PathBuf,
}

impl TpmKeyStore {
    pub fn open(tpm: TpmContext, dir: impl Into<PathBuf>) -> Result<Self, KeyStoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|e| KeyStoreError::Unavailable(format!("{}: {e}", dir.display())))?;
        Ok(Self { tpm, dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, label: &str) -> Result<PathBuf, KeyStoreError> {
        if label.is_empty()
            || !label
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(KeyStoreError::NotFound(label.to_string()));
        }
        Ok(self.dir.join(format!("{label}.key")))
    }

    fn read(&self, label: &str) -> Result<(AccessPolicy, KeyBlob), KeyStoreError> {
        let path = self.path(label)?;
        let bytes = match std::fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(KeyStoreError::NotFound(label.to_string()));
            }
            Err(e) => return Err(KeyStoreError::Unavailable(format!("{}: {e}", path.display()))),
        };
        let (&policy, rest) = bytes
            .split_first()
            .ok_or_else(|| TpmError::Blob(format!("{label}: empty file")))?;
        let policy = match policy {
            POLICY_PRESENCE => AccessPolicy::UserPresence,
            POLICY_VERIFICATION => AccessPolicy::UserVerification,
            other => return Err(TpmError::Blob(format!("{label}: unknown policy {other}")).into()),
        };
        Ok((policy, KeyBlob::from_bytes(rest)?))
    }
}

impl KeyStore for TpmKeyStore {
    fn generate(
        &self,
        label: &str,
        key_type: KeyType,
        policy: AccessPolicy,
    ) -> Result<(), KeyStoreError> {
        let KeyType::EcP256 = key_type;
        let path = self.path(label)?;
        if path.exists() {
            return Err(KeyStoreError::LabelInUse(label.to_string()));
        }
        let blob = self
            .tpm
            .with_ctx(|ctx, primary| keys::create_signing_key(ctx, primary))
            .map_err(|e| KeyStoreError::Generate(e.to_string()))?;

        let mut file = vec![match policy {
            AccessPolicy::UserPresence => POLICY_PRESENCE,
            AccessPolicy::UserVerification => POLICY_VERIFICATION,
        }];
        file.extend_from_slice(&blob.to_bytes());
        std::fs::write(&path, &file)
            .map_err(|e| KeyStoreError::Unavailable(format!("{}: {e}", path.display())))?;
        tracing::debug!(label, ?policy, "Generated TPM P-256 key");
        Ok(())
    }

    fn export_public_key(&self, label: &str) -> Result<Vec<u8>, KeyStoreError> {
        let (_, blob) = self.read(label)?;
        let (x, y) = keys::public_coords(&blob)?;
        Ok(p256_spki(&x, &y))
    }

    fn sign(
        &self,
        label: &str,
        data: &[u8],
        proof: &UserPresenceProof,
    ) -> Result<Vec<u8>, KeyStoreError> {
        let (policy, blob) = self.read(label)?;
        if !proof.satisfies(policy) {
            tracing::warn!(label, ?policy, level = ?proof.level(), "Proof does not satisfy key policy");
            return Err(KeyStoreError::AccessDenied(label.to_string()));
        }
        let raw = self
            .tpm
            .with_ctx(|ctx, primary| keys::sign(ctx, primary, &blob, data, proof))
            .map_err(|e| KeyStoreError::Sign(e.to_string()))?;
        Ok(encode_der_ecdsa(&raw))
    }
}
