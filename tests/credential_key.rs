use std::time::Duration;

use webauthn_authenticator::{
    AuthenticationRequest, Authenticator, AuthenticatorError, AutoApprove, CoseAlgorithm,
    RegistrationRequest, RelyingParty, SoftKeyStore, UserEntity, UserVerification,
    load_or_create_key_file,
};

fn registration() -> RegistrationRequest {
    RegistrationRequest {
        rp: RelyingParty {
            id: "example.org".into(),
            name: None,
        },
        user: UserEntity {
            id: b"user-42".to_vec(),
            name: Some("user".into()),
            display_name: None,
        },
        client_data_hash: vec![0xaa; 32],
        algorithms: vec![CoseAlgorithm::Es256],
        exclude_list: vec![],
        user_verification: UserVerification::Discouraged,
        timeout: Duration::from_secs(10),
    }
}

#[tokio::test]
async fn test_identifiers_survive_reload_of_key_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("credential_key.bin");

    let store = std::sync::Arc::new(SoftKeyStore::new());
    let first = Authenticator::new(
        store.clone(),
        AutoApprove,
        load_or_create_key_file(&path).unwrap(),
    );
    let reg = first.make_credential(registration()).await.unwrap();
    drop(first);

    // Same key file and key store, fresh authenticator.
    let second = Authenticator::new(store, AutoApprove, load_or_create_key_file(&path).unwrap());
    let assertion = second
        .get_assertion(AuthenticationRequest {
            rp_id: "example.org".into(),
            client_data_hash: vec![0xbb; 32],
            allow_list: vec![reg.credential_id.clone()],
            user_verification: UserVerification::Discouraged,
            timeout: Duration::from_secs(10),
        })
        .await
        .unwrap();
    assert_eq!(assertion.user_handle, b"user-42");
    // In-memory counters restart from the value sealed at creation.
    assert_eq!(assertion.sign_count, 1);
}

#[tokio::test]
async fn test_rotated_key_invalidates_identifiers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("credential_key.bin");

    let store = std::sync::Arc::new(SoftKeyStore::new());
    let before = Authenticator::new(
        store.clone(),
        AutoApprove,
        load_or_create_key_file(&path).unwrap(),
    );
    let reg = before.make_credential(registration()).await.unwrap();

    std::fs::remove_file(&path).unwrap();
    let after = Authenticator::new(store, AutoApprove, load_or_create_key_file(&path).unwrap());
    let err = after
        .get_assertion(AuthenticationRequest {
            rp_id: "example.org".into(),
            client_data_hash: vec![0xbb; 32],
            allow_list: vec![reg.credential_id],
            user_verification: UserVerification::Discouraged,
            timeout: Duration::from_secs(10),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AuthenticatorError::NoCredentials));
}
