#![cfg(feature = "tpm")]

use webauthn_authenticator::keystore::{AccessPolicy, KeyStore, KeyType};
use webauthn_authenticator::tpm::{self, TpmContext, TpmKeyStore};
use webauthn_authenticator::UserPresenceProof;

/// Open the TPM named by `WEBAUTHN_TEST_TPM` (default `/dev/tpmrm0`), or
/// skip when it is not reachable.
fn open() -> Option<TpmContext> {
    let device = std::env::var("WEBAUTHN_TEST_TPM").unwrap_or_else(|_| "/dev/tpmrm0".into());
    match TpmContext::open(&device) {
        Ok(ctx) => Some(ctx),
        Err(e) => {
            println!("SKIP: TPM not accessible at {device} ({e})");
            None
        }
    }
}

#[test]
fn test_key_store_generate_export_sign() {
    let Some(ctx) = open() else { return };
    let dir = tempfile::tempdir().unwrap();
    let store = TpmKeyStore::open(ctx, dir.path()).unwrap();

    store
        .generate("cred-smoke", KeyType::EcP256, AccessPolicy::UserPresence)
        .expect("generate");
    assert!(
        store
            .generate("cred-smoke", KeyType::EcP256, AccessPolicy::UserPresence)
            .is_err(),
        "labels must be unique"
    );

    let spki = store.export_public_key("cred-smoke").expect("export");
    assert_eq!(spki.len(), 91);

    let sig = store
        .sign("cred-smoke", b"hello tpm", &UserPresenceProof::test_only())
        .expect("sign");
    assert_eq!(sig[0], 0x30, "signature must be a DER SEQUENCE");

    use p256::ecdsa::signature::Verifier;
    use p256::pkcs8::DecodePublicKey;
    let vk = p256::ecdsa::VerifyingKey::from_public_key_der(&spki).unwrap();
    let sig = p256::ecdsa::Signature::from_der(&sig).unwrap();
    vk.verify(b"hello tpm", &sig).expect("TPM signature must verify");
}

#[test]
fn test_verification_gated_key_refuses_presence_proof() {
    let Some(ctx) = open() else { return };
    let dir = tempfile::tempdir().unwrap();
    let store = TpmKeyStore::open(ctx, dir.path()).unwrap();

    store
        .generate("cred-uv", KeyType::EcP256, AccessPolicy::UserVerification)
        .unwrap();
    assert!(store
        .sign("cred-uv", b"x", &UserPresenceProof::test_only())
        .is_err());
    store
        .sign("cred-uv", b"x", &UserPresenceProof::test_only_verified())
        .expect("verified proof satisfies the policy");
}

#[test]
fn test_nv_counter_increments() {
    let Some(ctx) = open() else { return };
    // Dedicated index so the default counter is never touched.
    let nv_index: u32 = 0x0180_0200;

    ctx.with_ctx(|c, _| tpm::counter::ensure_counter(c, nv_index))
        .expect("ensure_counter");
    ctx.with_ctx(|c, _| tpm::counter::ensure_counter(c, nv_index))
        .expect("ensure_counter is idempotent");

    let v1 = ctx
        .with_ctx(|c, _| tpm::counter::increment_and_read(c, nv_index))
        .unwrap();
    let v2 = ctx
        .with_ctx(|c, _| tpm::counter::increment_and_read(c, nv_index))
        .unwrap();
    assert_eq!(v2, v1 + 1);
}

#[test]
fn test_seal_unseal_roundtrip() {
    let Some(ctx) = open() else { return };
    let (blob, key) = ctx
        .with_ctx(|c, primary| tpm::seal::create_seal(c, primary))
        .expect("create_seal");
    let blob = tpm::KeyBlob::from_bytes(&blob.to_bytes()).unwrap();
    let recovered = ctx
        .with_ctx(|c, primary| tpm::seal::unseal(c, primary, &blob))
        .expect("unseal");
    assert_eq!(key.as_bytes(), recovered.as_bytes());
}
