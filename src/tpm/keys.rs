use std::convert::{TryFrom, TryInto};

use sha2::{Digest as _, Sha256};
use tss_esapi::Context;
use tss_esapi::attributes::{ObjectAttributes, ObjectAttributesBuilder};
use tss_esapi::constants::tss::{TPM2_RH_NULL, TPM2_ST_HASHCHECK};
use tss_esapi::handles::{KeyHandle, ObjectHandle};
use tss_esapi::interface_types::algorithm::{HashingAlgorithm, PublicAlgorithm};
use tss_esapi::interface_types::ecc::EccCurve;
use tss_esapi::interface_types::reserved_handles::Hierarchy;
use tss_esapi::structures::{
    Digest, EccPoint, EccScheme, HashScheme, HashcheckTicket, Private, Public, PublicBuilder,
    PublicEccParameters, PublicEccParametersBuilder, Signature, SignatureScheme,
    SymmetricDefinitionObject,
};
use tss_esapi::traits::{Marshall, UnMarshall};
use tss_esapi::tss2_esys::TPMT_TK_HASHCHECK;

use super::{KeyBlob, TpmError};
use crate::consent::UserPresenceProof;

fn key_err(e: impl std::fmt::Display) -> TpmError {
    TpmError::Key(e.to_string())
}

fn ecc_template(
    attrs: ObjectAttributes,
    params: PublicEccParameters,
) -> Result<Public, TpmError> {
    PublicBuilder::new()
        .with_public_algorithm(PublicAlgorithm::Ecc)
        .with_name_hashing_algorithm(HashingAlgorithm::Sha256)
        .with_object_attributes(attrs)
        .with_ecc_parameters(params)
        .with_ecc_unique_identifier(EccPoint::default())
        .build()
        .map_err(key_err)
}

/// Restricted P-256 decryption key in the owner hierarchy. Deterministic for
/// a given TPM, so every start re-derives the same parent.
pub fn create_primary(ctx: &mut Context) -> Result<KeyHandle, TpmError> {
    let params = PublicEccParametersBuilder::new_restricted_decryption_key(
        SymmetricDefinitionObject::AES_128_CFB,
        EccCurve::NistP256,
    )
    .build()
    .map_err(key_err)?;
    let attrs = ObjectAttributesBuilder::new()
        .with_fixed_tpm(true)
        .with_fixed_parent(true)
        .with_sensitive_data_origin(true)
        .with_user_with_auth(true)
        .with_restricted(true)
        .with_decrypt(true)
        .build()
        .map_err(key_err)?;
    let template = ecc_template(attrs, params)?;

    let result = ctx
        .execute_with_nullauth_session(|ctx| {
            ctx.create_primary(Hierarchy::Owner, template, None, None, None, None)
        })
        .map_err(|e: tss_esapi::Error| key_err(e))?;
    Ok(result.key_handle)
}

/// Create an ECDSA P-256 signing key under `primary` and return it wrapped.
pub fn create_signing_key(ctx: &mut Context, primary: KeyHandle) -> Result<KeyBlob, TpmError> {
    let scheme = EccScheme::EcDsa(HashScheme::new(HashingAlgorithm::Sha256));
    let params = PublicEccParametersBuilder::new_unrestricted_signing_key(scheme, EccCurve::NistP256)
        .build()
        .map_err(key_err)?;
    let attrs = ObjectAttributesBuilder::new()
        .with_fixed_tpm(true)
        .with_fixed_parent(true)
        .with_sensitive_data_origin(true)
        .with_user_with_auth(true)
        .with_sign_encrypt(true)
        .with_no_da(true)
        .build()
        .map_err(key_err)?;
    let template = ecc_template(attrs, params)?;

    let result = ctx
        .execute_with_nullauth_session(|ctx| ctx.create(primary, template, None, None, None, None))
        .map_err(|e: tss_esapi::Error| key_err(e))?;

    Ok(KeyBlob {
        private: result.out_private.as_bytes().to_vec(),
        public: result.out_public.marshall().map_err(key_err)?,
    })
}

fn load(ctx: &mut Context, primary: KeyHandle, blob: &KeyBlob) -> Result<KeyHandle, TpmError> {
    let private = Private::try_from(blob.private.clone()).map_err(key_err)?;
    let public = Public::unmarshall(&blob.public).map_err(key_err)?;
    ctx.execute_with_nullauth_session(|ctx| ctx.load(primary, private, public))
        .map_err(|e: tss_esapi::Error| key_err(e))
}

/// Load `blob`, sign SHA-256(`data`) and flush the transient handle again.
///
/// Returns raw `r || s`, each zero-padded to 32 bytes. Requires a presence
/// proof so it cannot be reached before the user approved the ceremony.
pub fn sign(
    ctx: &mut Context,
    primary: KeyHandle,
    blob: &KeyBlob,
    data: &[u8],
    _proof: &UserPresenceProof,
) -> Result<[u8; 64], TpmError> {
    let handle = load(ctx, primary, blob)?;
    let signed = sign_loaded(ctx, handle, data);
    ctx.flush_context(ObjectHandle::from(handle))
        .map_err(key_err)?;
    signed
}

fn sign_loaded(ctx: &mut Context, key: KeyHandle, data: &[u8]) -> Result<[u8; 64], TpmError> {
    let hash: [u8; 32] = Sha256::digest(data).into();
    let digest = Digest::try_from(hash.to_vec()).map_err(key_err)?;

    // Null hierarchy ticket: the digest was computed outside the TPM.
    let ticket: HashcheckTicket = TPMT_TK_HASHCHECK {
        tag: TPM2_ST_HASHCHECK,
        hierarchy: TPM2_RH_NULL,
        digest: Default::default(),
    }
    .try_into()
    .map_err(|e: tss_esapi::Error| key_err(e))?;

    let signature = ctx
        .execute_with_nullauth_session(|ctx| ctx.sign(key, digest, SignatureScheme::Null, ticket))
        .map_err(|e: tss_esapi::Error| key_err(e))?;

    let Signature::EcDsa(sig) = signature else {
        return Err(TpmError::Key("expected an ECDSA signature".into()));
    };
    let mut raw = [0u8; 64];
    left_pad(sig.signature_r().as_bytes(), &mut raw[..32]);
    left_pad(sig.signature_s().as_bytes(), &mut raw[32..]);
    Ok(raw)
}

/// Affine (x, y) of the key in `blob`'s public area.
pub fn public_coords(blob: &KeyBlob) -> Result<([u8; 32], [u8; 32]), TpmError> {
    let Public::Ecc { unique, .. } = Public::unmarshall(&blob.public).map_err(key_err)? else {
        return Err(TpmError::Key("not an ECC key".into()));
    };
    let mut x = [0u8; 32];
    let mut y = [0u8; 32];
    left_pad(unique.x().as_bytes(), &mut x);
    left_pad(unique.y().as_bytes(), &mut y);
    Ok((x, y))
}

/// Copy the low-order bytes of `src` into `dst`, zero-filling on the left.
fn left_pad(src: &[u8], dst: &mut [u8]) {
    let n = src.len().min(dst.len());
    let split = dst.len() - n;
    dst[..split].fill(0);
    dst[split..].copy_from_slice(&src[src.len() - n..]);
}

#[cfg(test)]
mod tests {
    use super::left_pad;

    #[test]
    fn test_left_pad_short_component() {
        let mut out = [0xffu8; 4];
        left_pad(&[1, 2], &mut out);
        assert_eq!(out, [0, 0, 1, 2]);
    }

    #[test]
    fn test_left_pad_keeps_low_order_bytes() {
        let mut out = [0u8; 2];
        left_pad(&[9, 1, 2], &mut out);
        assert_eq!(out, [1, 2]);
    }
}
