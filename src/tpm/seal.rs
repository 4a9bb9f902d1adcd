use std::convert::TryFrom;

use tss_esapi::Context;
use tss_esapi::attributes::ObjectAttributesBuilder;
use tss_esapi::handles::{KeyHandle, ObjectHandle};
use tss_esapi::interface_types::algorithm::{HashingAlgorithm, PublicAlgorithm};
use tss_esapi::structures::{
    KeyedHashScheme, Private, Public, PublicBuilder, PublicKeyedHashParameters, SensitiveData,
};
use tss_esapi::traits::{Marshall, UnMarshall};
use zeroize::Zeroizing;

use super::{KeyBlob, TpmError};
use crate::credential::SymmetricKey;

fn seal_err(e: impl std::fmt::Display) -> TpmError {
    TpmError::Seal(e.to_string())
}

/// Seal a freshly generated credential-identifier key under `primary`.
/// The blob can be persisted; only this TPM can unseal it.
pub fn create_seal(
    ctx: &mut Context,
    primary: KeyHandle,
) -> Result<(KeyBlob, SymmetricKey), TpmError> {
    let key = SymmetricKey::generate();
    let sensitive = SensitiveData::try_from(key.as_bytes().to_vec()).map_err(seal_err)?;

    let attrs = ObjectAttributesBuilder::new()
        .with_fixed_tpm(true)
        .with_fixed_parent(true)
        .with_user_with_auth(true)
        .with_no_da(true)
        .build()
        .map_err(seal_err)?;
    let template = PublicBuilder::new()
        .with_public_algorithm(PublicAlgorithm::KeyedHash)
        .with_name_hashing_algorithm(HashingAlgorithm::Sha256)
        .with_object_attributes(attrs)
        .with_keyed_hash_parameters(PublicKeyedHashParameters::new(KeyedHashScheme::Null))
        .with_keyed_hash_unique_identifier(Default::default())
        .build()
        .map_err(seal_err)?;

    let result = ctx
        .execute_with_nullauth_session(|ctx| {
            ctx.create(primary, template, None, Some(sensitive), None, None)
        })
        .map_err(|e: tss_esapi::Error| seal_err(e))?;

    let blob = KeyBlob {
        private: result.out_private.value().to_vec(),
        public: result.out_public.marshall().map_err(seal_err)?,
    };
    Ok((blob, key))
}

/// Load a sealed object and recover the key inside it.
pub fn unseal(
    ctx: &mut Context,
    primary: KeyHandle,
    blob: &KeyBlob,
) -> Result<SymmetricKey, TpmError> {
    let private = Private::try_from(blob.private.clone()).map_err(seal_err)?;
    let public = Public::unmarshall(&blob.public).map_err(seal_err)?;

    let handle = ctx
        .execute_with_nullauth_session(|ctx| ctx.load(primary, private, public))
        .map_err(|e: tss_esapi::Error| seal_err(e))?;
    let unsealed = ctx.execute_with_nullauth_session(|ctx| ctx.unseal(ObjectHandle::from(handle)));
    ctx.flush_context(ObjectHandle::from(handle))
        .map_err(seal_err)?;

    let sensitive = unsealed.map_err(|e: tss_esapi::Error| seal_err(e))?;
    let bytes = Zeroizing::new(sensitive.value().to_vec());
    SymmetricKey::from_slice(&bytes)
        .map_err(|_| TpmError::Seal(format!("expected 32-byte key, got {}", bytes.len())))
}
