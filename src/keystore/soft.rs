use std::collections::HashMap;
use std::sync::Mutex;

use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey};
use p256::pkcs8::EncodePublicKey;
use rand::rngs::OsRng;

use super::{AccessPolicy, KeyStore, KeyStoreError, KeyType, UserPresenceProof};

struct SoftKey {
    signing_key: SigningKey,
    policy: AccessPolicy,
}

/// In-process P-256 key store.
///
/// Stands in for a secure element when none is available. Keys live only
/// as long as the store; the access policy is still enforced on every
/// signature.
#[derive(Default)]
pub struct SoftKeyStore {
    keys: Mutex<HashMap<String, SoftKey>>,
}

impl SoftKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.keys
            .lock()
            .map(|keys| keys.contains_key(label))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.keys.lock().map(|keys| keys.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, SoftKey>>, KeyStoreError> {
        self.keys
            .lock()
            .map_err(|_| KeyStoreError::Unavailable("mutex poisoned".into()))
    }
}

impl KeyStore for SoftKeyStore {
    fn generate(
        &self,
        label: &str,
        key_type: KeyType,
        policy: AccessPolicy,
    ) -> Result<(), KeyStoreError> {
        let KeyType::EcP256 = key_type;
        let mut keys = self.lock()?;
        if keys.contains_key(label) {
            return Err(KeyStoreError::LabelInUse(label.to_string()));
        }
        keys.insert(
            label.to_string(),
            SoftKey {
                signing_key: SigningKey::random(&mut OsRng),
                policy,
            },
        );
        tracing::debug!(label, ?policy, "Generated software P-256 key");
        Ok(())
    }

    fn export_public_key(&self, label: &str) -> Result<Vec<u8>, KeyStoreError> {
        let keys = self.lock()?;
        let key = keys
            .get(label)
            .ok_or_else(|| KeyStoreError::NotFound(label.to_string()))?;
        let der = key
            .signing_key
            .verifying_key()
            .to_public_key_der()
            .map_err(|e| KeyStoreError::MalformedExport(e.to_string()))?;
        Ok(der.as_bytes().to_vec())
    }

    fn sign(
        &self,
        label: &str,
        data: &[u8],
        proof: &UserPresenceProof,
    ) -> Result<Vec<u8>, KeyStoreError> {
        let keys = self.lock()?;
        let key = keys
            .get(label)
            .ok_or_else(|| KeyStoreError::NotFound(label.to_string()))?;
        if !proof.satisfies(key.policy) {
            tracing::warn!(label, policy = ?key.policy, level = ?proof.level(), "Proof does not satisfy key policy");
            return Err(KeyStoreError::AccessDenied(label.to_string()));
        }
        let signature: Signature = key.signing_key.sign(data);
        Ok(signature.to_der().as_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keystore::der::p256_spki_coords;
    use p256::ecdsa::VerifyingKey;
    use p256::ecdsa::signature::Verifier;

    #[test]
    fn test_generate_export_sign_verify() {
        let store = SoftKeyStore::new();
        store
            .generate("k1", KeyType::EcP256, AccessPolicy::UserPresence)
            .unwrap();

        let der = store.export_public_key("k1").unwrap();
        let (x, y) = p256_spki_coords(&der).expect("well-formed SPKI");

        let sig = store
            .sign("k1", b"payload", &UserPresenceProof::test_only())
            .unwrap();

        let mut sec1 = vec![0x04];
        sec1.extend_from_slice(&x);
        sec1.extend_from_slice(&y);
        let vk = VerifyingKey::from_sec1_bytes(&sec1).unwrap();
        let sig = Signature::from_der(&sig).unwrap();
        vk.verify(b"payload", &sig).expect("signature must verify");
    }

    #[test]
    fn test_duplicate_label_rejected() {
        let store = SoftKeyStore::new();
        store
            .generate("dup", KeyType::EcP256, AccessPolicy::UserPresence)
            .unwrap();
        let err = store
            .generate("dup", KeyType::EcP256, AccessPolicy::UserPresence)
            .unwrap_err();
        assert!(matches!(err, KeyStoreError::LabelInUse(_)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_missing_label() {
        let store = SoftKeyStore::new();
        assert!(matches!(
            store.export_public_key("nope"),
            Err(KeyStoreError::NotFound(_))
        ));
        assert!(matches!(
            store.sign("nope", b"x", &UserPresenceProof::test_only()),
            Err(KeyStoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_verification_policy_requires_verified_proof() {
        let store = SoftKeyStore::new();
        store
            .generate("uv", KeyType::EcP256, AccessPolicy::UserVerification)
            .unwrap();

        let err = store
            .sign("uv", b"x", &UserPresenceProof::test_only())
            .unwrap_err();
        assert!(matches!(err, KeyStoreError::AccessDenied(_)));

        store
            .sign("uv", b"x", &UserPresenceProof::test_only_verified())
            .expect("verified proof satisfies verification policy");
    }
}
