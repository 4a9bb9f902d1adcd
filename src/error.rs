#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Authenticator: {0}")]
    Authenticator(#[from] crate::ceremony::AuthenticatorError),
    #[error("Key store: {0}")]
    KeyStore(#[from] crate::keystore::KeyStoreError),
    #[error("Codec: {0}")]
    Codec(#[from] crate::credential::CodecError),
    #[error("Consent: {0}")]
    Consent(#[from] crate::consent::ConsentError),
    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),
    #[cfg(feature = "tpm")]
    #[error("TPM: {0}")]
    Tpm(#[from] crate::tpm::TpmError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
