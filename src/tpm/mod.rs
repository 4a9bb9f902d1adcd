//! TPM 2.0 backend: a key store whose P-256 keys are wrapped by a storage
//! primary, an NV monotonic counter, and a sealed symmetric key.

pub mod blob;
pub mod context;
pub mod counter;
pub mod keys;
pub mod seal;
pub mod store;

pub use blob::KeyBlob;
pub use context::TpmContext;
pub use counter::TpmCounter;
pub use store::TpmKeyStore;

#[derive(Debug, thiserror::Error)]
pub enum TpmError {
    #[error("TPM context error: {0}")]
    Context(String),
    #[error("TPM key error: {0}")]
    Key(String),
    #[error("TPM counter error: {0}")]
    Counter(String),
    #[error("TPM seal error: {0}")]
    Seal(String),
    #[error("malformed key blob: {0}")]
    Blob(String),
    #[error("TPM error: {0}")]
    Other(String),
}

impl From<tss_esapi::Error> for TpmError {
    fn from(e: tss_esapi::Error) -> Self {
        TpmError::Other(e.to_string())
    }
}
