//! Per-algorithm key handling and algorithm negotiation.
//!
//! Each supported COSE algorithm is one [`KeySupport`] variant. A variant
//! owns its key-generation policy (curve, export format) and nothing else;
//! key material stays in the [`KeyStore`].

pub mod chooser;
pub mod es256;

use ciborium::value::Value;

use crate::algorithm::CoseAlgorithm;
use crate::keystore::{AccessPolicy, KeyStore, KeyStoreError, UserPresenceProof};

pub use chooser::KeySupportChooser;
pub use es256::Es256KeySupport;

/// COSE elliptic curve identifier for P-256.
pub const COSE_CRV_P256: i64 = 1;
/// COSE key type identifier for EC2 keys.
pub const COSE_KTY_EC2: i64 = 2;

/// Public half of a credential key, independent of wire encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyRecord {
    pub algorithm: CoseAlgorithm,
    pub curve: i64,
    pub x: [u8; 32],
    pub y: [u8; 32],
}

impl PublicKeyRecord {
    /// Encode as a COSE_Key CBOR map (kty=2, alg, crv, x, y).
    pub fn to_cose(&self) -> Result<Vec<u8>, ciborium::ser::Error<std::io::Error>> {
        let map = Value::Map(vec![
            (Value::Integer(1i64.into()), Value::Integer(COSE_KTY_EC2.into())),
            (
                Value::Integer(3i64.into()),
                Value::Integer(self.algorithm.value().into()),
            ),
            (Value::Integer((-1i64).into()), Value::Integer(self.curve.into())),
            (Value::Integer((-2i64).into()), Value::Bytes(self.x.to_vec())),
            (Value::Integer((-3i64).into()), Value::Bytes(self.y.to_vec())),
        ]);
        let mut buf = Vec::new();
        ciborium::into_writer(&map, &mut buf)?;
        Ok(buf)
    }

    /// SEC1 uncompressed point (0x04 || x || y).
    pub fn to_sec1(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(65);
        out.push(0x04);
        out.extend_from_slice(&self.x);
        out.extend_from_slice(&self.y);
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySupport {
    Es256(Es256KeySupport),
}

impl KeySupport {
    /// The implementation bound to `alg`, if there is one.
    pub fn for_algorithm(alg: CoseAlgorithm) -> Option<Self> {
        match alg {
            CoseAlgorithm::Es256 => Some(Self::Es256(Es256KeySupport)),
            _ => None,
        }
    }

    pub fn algorithm(&self) -> CoseAlgorithm {
        match self {
            Self::Es256(_) => CoseAlgorithm::Es256,
        }
    }

    pub fn create_key_pair<S: KeyStore + ?Sized>(
        &self,
        store: &S,
        label: &str,
        policy: AccessPolicy,
    ) -> Result<PublicKeyRecord, KeyStoreError> {
        match self {
            Self::Es256(k) => k.create_key_pair(store, label, policy),
        }
    }

    pub fn sign<S: KeyStore + ?Sized>(
        &self,
        store: &S,
        data: &[u8],
        label: &str,
        proof: &UserPresenceProof,
    ) -> Result<Vec<u8>, KeyStoreError> {
        match self {
            Self::Es256(k) => k.sign(store, data, label, proof),
        }
    }
}
