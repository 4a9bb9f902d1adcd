use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::{CodecError, CredentialId, CredentialSource, DecodeFailure};

pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;

/// AES-256-GCM key sealing every credential identifier this authenticator
/// issues. Replacing it invalidates all outstanding identifiers.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; 32]);

impl SymmetricKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, CodecError> {
        let key: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CodecError::KeyLength(bytes.len()))?;
        Ok(Self(key))
    }

    pub fn generate() -> Self {
        let mut key = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut key);
        Self(key)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SymmetricKey(..)")
    }
}

/// Seal `source` into a fresh identifier: `nonce || ciphertext || tag`.
/// Every call draws a new random 96-bit nonce.
pub fn encode(source: &CredentialSource, key: &SymmetricKey) -> Result<CredentialId, CodecError> {
    let plaintext = source.to_cbor()?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);

    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| CodecError::Encryption(e.to_string()))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_slice())
        .map_err(|e| CodecError::Encryption(e.to_string()))?;

    let mut id = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    id.extend_from_slice(&nonce_bytes);
    id.extend_from_slice(&ciphertext);
    Ok(CredentialId::from(id))
}

/// Open an identifier produced by [`encode`] under the same key.
pub fn decode(id: &CredentialId, key: &SymmetricKey) -> Result<CredentialSource, DecodeFailure> {
    let bytes = id.as_bytes();
    if bytes.len() < NONCE_LEN + TAG_LEN {
        return Err(DecodeFailure);
    }
    let (nonce_bytes, ciphertext) = bytes.split_at(NONCE_LEN);

    let cipher = Aes256Gcm::new_from_slice(key.as_bytes()).map_err(|_| DecodeFailure)?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| DecodeFailure)?;

    CredentialSource::from_cbor(&plaintext).ok_or(DecodeFailure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::CoseAlgorithm;

    fn sample(rp_id: &str) -> CredentialSource {
        CredentialSource {
            rp_id: rp_id.to_string(),
            user_handle: b"user-42".to_vec(),
            key_label: "cred-0123456789abcdef0123456789abcdef".into(),
            algorithm: CoseAlgorithm::Es256,
            sign_count: 0,
        }
    }

    #[test]
    fn test_roundtrip() {
        let key = SymmetricKey::from_bytes([0xabu8; 32]);
        let source = sample("example.org");
        let id = encode(&source, &key).unwrap();
        assert_eq!(decode(&id, &key).unwrap(), source);
    }

    #[test]
    fn test_fresh_nonce_per_call() {
        let key = SymmetricKey::from_bytes([0x01u8; 32]);
        let source = sample("example.org");
        let a = encode(&source, &key).unwrap();
        let b = encode(&source, &key).unwrap();
        assert_ne!(a.as_bytes()[..NONCE_LEN], b.as_bytes()[..NONCE_LEN]);
        assert_ne!(a, b);
        assert_eq!(decode(&a, &key).unwrap(), decode(&b, &key).unwrap());
    }

    #[test]
    fn test_wrong_key_fails() {
        let source = sample("example.org");
        let id = encode(&source, &SymmetricKey::from_bytes([0x11u8; 32])).unwrap();
        assert_eq!(
            decode(&id, &SymmetricKey::from_bytes([0x22u8; 32])),
            Err(DecodeFailure)
        );
    }

    #[test]
    fn test_every_byte_flip_fails() {
        let key = SymmetricKey::generate();
        let id = encode(&sample("flip.example"), &key).unwrap();
        for i in 0..id.len() {
            let mut bytes = id.as_bytes().to_vec();
            bytes[i] ^= 0x01;
            assert_eq!(
                decode(&CredentialId::from(bytes), &key),
                Err(DecodeFailure),
                "flipping byte {i} must fail authentication"
            );
        }
    }

    #[test]
    fn test_truncated_identifier_fails() {
        let key = SymmetricKey::generate();
        let id = encode(&sample("short.example"), &key).unwrap();
        for len in [0, 1, NONCE_LEN, NONCE_LEN + TAG_LEN - 1, id.len() - 1] {
            let truncated = CredentialId::from(&id.as_bytes()[..len]);
            assert_eq!(decode(&truncated, &key), Err(DecodeFailure));
        }
    }

    #[test]
    fn test_key_from_slice_rejects_wrong_length() {
        assert!(matches!(
            SymmetricKey::from_slice(&[0u8; 16]),
            Err(CodecError::KeyLength(16))
        ));
        assert!(SymmetricKey::from_slice(&[0u8; 32]).is_ok());
    }

    #[test]
    fn test_key_debug_does_not_leak() {
        let key = SymmetricKey::from_bytes([0x5au8; 32]);
        assert_eq!(format!("{key:?}"), "SymmetricKey(..)");
    }
}
