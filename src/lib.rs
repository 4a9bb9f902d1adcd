pub mod algorithm;
pub mod ceremony;
pub mod client_data;
pub mod config;
pub mod consent;
pub mod counter;
pub mod credential;
pub mod diagnostics;
pub mod error;
pub mod events;
pub mod key_support;
pub mod keystore;
#[cfg(feature = "tpm")]
pub mod tpm;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rand::Rng;

pub use algorithm::CoseAlgorithm;
pub use ceremony::{
    AuthenticationRequest, AuthenticationResponse, Authenticator, AuthenticatorConfig,
    AuthenticatorError, CeremonyKind, CeremonyState, RegistrationRequest, RegistrationResponse,
    RelyingParty, UserEntity, UserVerification,
};
pub use consent::{AutoApprove, Consent, UserPresenceProof};
pub use credential::{CredentialId, CredentialSource, SymmetricKey};
pub use error::{Error, Result};
pub use keystore::{KeyStore, SoftKeyStore};

const KEY_FILE: &str = "credential_key.bin";
#[cfg(feature = "tpm")]
const SEALED_KEY_FILE: &str = "credential_key.blob";

fn data_dir() -> anyhow::Result<PathBuf> {
    Ok(directories::ProjectDirs::from("", "", "webauthn-authenticator")
        .ok_or_else(|| anyhow::anyhow!("cannot determine XDG data dir"))?
        .data_dir()
        .to_path_buf())
}

fn init_tracing(verbose: u8) {
    use tracing_subscriber::EnvFilter;
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(level))
        .init();
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Delete the credential-identifier key. Every identifier issued under it
/// becomes undecodable; a new key is created on the next run.
pub fn rotate_key(cfg: &config::Config) -> anyhow::Result<()> {
    init_tracing(cfg.verbose);
    let dir = data_dir()?;
    let mut removed = 0usize;
    #[cfg(feature = "tpm")]
    let names = [KEY_FILE, SEALED_KEY_FILE];
    #[cfg(not(feature = "tpm"))]
    let names = [KEY_FILE];
    for name in names {
        let path = dir.join(name);
        if path.exists() {
            std::fs::remove_file(&path)?;
            tracing::info!(path = %path.display(), "Removed credential key");
            removed += 1;
        }
    }
    println!(
        "Removed {removed} key file(s) from {}; previously issued credentials are now invalid",
        dir.display()
    );
    Ok(())
}

/// Create `path` readable by the owner only. Fails if it already exists.
fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    use std::io::Write;

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    std::os::unix::fs::OpenOptionsExt::mode(&mut options, 0o600);
    let mut file = options.open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

/// Load the plaintext credential-identifier key kept by the software
/// backend, creating it on first use.
pub fn load_or_create_key_file(path: &Path) -> Result<SymmetricKey> {
    let key = SymmetricKey::generate();
    match write_private(path, key.as_bytes()) {
        Ok(()) => {
            tracing::info!(path = %path.display(), "Created credential key");
            Ok(key)
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            let bytes = zeroize::Zeroizing::new(std::fs::read(path)?);
            Ok(SymmetricKey::from_slice(&bytes)?)
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(feature = "tpm")]
async fn load_or_create_sealed_key(
    tpm: &tpm::TpmContext,
    path: &Path,
) -> anyhow::Result<SymmetricKey> {
    let tpm = tpm.clone();
    if path.exists() {
        let blob = tpm::KeyBlob::from_bytes(&std::fs::read(path)?)?;
        let key = tokio::task::spawn_blocking(move || {
            tpm.with_ctx(|ctx, primary| tpm::seal::unseal(ctx, primary, &blob))
        })
        .await??;
        Ok(key)
    } else {
        let (blob, key) = tokio::task::spawn_blocking(move || {
            tpm.with_ctx(|ctx, primary| tpm::seal::create_seal(ctx, primary))
        })
        .await??;
        write_private(path, &blob.to_bytes())?;
        tracing::info!(path = %path.display(), "Sealed new credential key");
        Ok(key)
    }
}

pub async fn run(cfg: config::Config) -> anyhow::Result<()> {
    init_tracing(cfg.verbose);
    tracing::info!(backend = ?cfg.backend, rp_id = %cfg.rp_id, "Starting webauthn-authenticator");

    diagnostics::check(&cfg)?;

    let data_dir = data_dir()?;
    std::fs::create_dir_all(&data_dir)?;

    // Single-instance lock
    let lock_dir = std::env::var("XDG_RUNTIME_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| data_dir.clone());
    let lock_path = lock_dir.join("webauthn-authenticator.lock");
    let lock_file = std::fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&lock_path)?;
    let mut lock = fd_lock::RwLock::new(lock_file);
    let _guard = lock.try_write().map_err(|_| {
        anyhow::anyhow!(
            "webauthn-authenticator is already running (lock: {})",
            lock_path.display()
        )
    })?;

    let consent: Arc<dyn Consent> = if cfg.yes {
        Arc::new(AutoApprove)
    } else {
        Arc::new(consent::PinentryConsent::new(cfg.pinentry.clone()))
    };

    match cfg.backend {
        config::Backend::Soft => {
            let key = load_or_create_key_file(&data_dir.join(KEY_FILE))?;
            let authenticator = Authenticator::new(SoftKeyStore::new(), consent, key);
            exercise(&authenticator, &cfg).await
        }
        #[cfg(feature = "tpm")]
        config::Backend::Tpm => {
            let nv_index = tpm::counter::parse_nv_index(&cfg.nv_index)?;
            let device = cfg.tpm_device.clone();
            let ctx = tokio::task::spawn_blocking(move || tpm::TpmContext::open(&device)).await??;
            tracing::info!(device = ctx.device(), "TPM context initialized");

            let key = load_or_create_sealed_key(&ctx, &data_dir.join(SEALED_KEY_FILE)).await?;
            let store = tpm::TpmKeyStore::open(ctx.clone(), data_dir.join("keys"))?;
            let counter = {
                let ctx = ctx.clone();
                tokio::task::spawn_blocking(move || tpm::TpmCounter::open(ctx, nv_index)).await??
            };
            tracing::info!(index = format!("{nv_index:#010x}"), "NV counter ready");

            let authenticator =
                Authenticator::new(store, consent, key).with_counter(Arc::new(counter));
            exercise(&authenticator, &cfg).await
        }
        #[cfg(not(feature = "tpm"))]
        config::Backend::Tpm => anyhow::bail!("TPM backend not compiled in"),
    }
}

/// Register one credential for `cfg.rp_id`, then assert with it.
async fn exercise<S, C>(authenticator: &Authenticator<S, C>, cfg: &config::Config) -> anyhow::Result<()>
where
    S: KeyStore + 'static,
    C: Consent,
{
    let origin = format!("https://{}", cfg.rp_id);

    let challenge: [u8; 32] = rand::thread_rng().r#gen();
    let client_data =
        client_data::ClientData::new(CeremonyKind::Registration, &challenge, origin.clone());
    let registration = authenticator
        .make_credential(RegistrationRequest {
            rp: RelyingParty {
                id: cfg.rp_id.clone(),
                name: None,
            },
            user: UserEntity {
                id: cfg.user.as_bytes().to_vec(),
                name: Some(cfg.user.clone()),
                display_name: None,
            },
            client_data_hash: client_data.hash()?.to_vec(),
            algorithms: vec![CoseAlgorithm::Es256],
            exclude_list: vec![],
            user_verification: UserVerification::Preferred,
            timeout: cfg.timeout(),
        })
        .await?;
    println!("credential id:      {}", registration.credential_id.to_hex());
    println!("public key (SEC1):  {}", hex(&registration.public_key.to_sec1()));
    println!("attestation object: {}", hex(&registration.attestation_object()?));

    let challenge: [u8; 32] = rand::thread_rng().r#gen();
    let client_data = client_data::ClientData::new(CeremonyKind::Authentication, &challenge, origin);
    let assertion = authenticator
        .get_assertion(AuthenticationRequest {
            rp_id: cfg.rp_id.clone(),
            client_data_hash: client_data.hash()?.to_vec(),
            allow_list: vec![registration.credential_id.clone()],
            user_verification: UserVerification::Preferred,
            timeout: cfg.timeout(),
        })
        .await?;
    println!("sign count:         {}", assertion.sign_count);
    println!("authenticator data: {}", hex(&assertion.authenticator_data));
    println!("signature:          {}", hex(&assertion.signature));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_file_created_then_reloaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(KEY_FILE);
        let first = load_or_create_key_file(&path).unwrap();
        let second = load_or_create_key_file(&path).unwrap();
        assert_eq!(first.as_bytes(), second.as_bytes());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode, 0o600, "key file must be private, got {mode:o}");
        }
    }

    #[test]
    fn test_key_file_wrong_length_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(KEY_FILE);
        std::fs::write(&path, [0u8; 7]).unwrap();
        assert!(matches!(
            load_or_create_key_file(&path),
            Err(Error::Codec(credential::CodecError::KeyLength(7)))
        ));
    }
}
