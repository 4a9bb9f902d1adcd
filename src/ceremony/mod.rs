//! Ceremony orchestration.
//!
//! [`Authenticator`] runs registration and authentication one at a time:
//! validate, negotiate, ask for consent, then generate or sign in the key
//! store. Consent and key-store work share a single deadline taken from the
//! request and can be interrupted with [`Authenticator::cancel`].

pub mod attestation;
pub mod authenticator_data;
mod get_assertion;
mod make_credential;
mod state;
mod types;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;

use crate::consent::Consent;
use crate::counter::{MemoryCounter, SignCounter};
use crate::credential::SymmetricKey;
use crate::events::Events;
use crate::key_support::KeySupportChooser;
use crate::keystore::KeyStore;

use state::{CeremonyGuard, CeremonySlot};

pub use state::CeremonyState;
pub use types::{
    AuthenticationRequest, AuthenticationResponse, AuthenticatorError, CeremonyKind,
    CLIENT_DATA_HASH_LEN, ErrorKind, MAX_RP_ID_LEN, MAX_USER_HANDLE_LEN, RegistrationRequest,
    RegistrationResponse, RelyingParty, UserEntity, UserVerification,
};

/// Library-level settings of an [`Authenticator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatorConfig {
    /// Reported in the attested credential block at registration.
    pub aaguid: [u8; 16],
    pub min_timeout: Duration,
    pub max_timeout: Duration,
}

impl Default for AuthenticatorConfig {
    fn default() -> Self {
        Self {
            aaguid: crate::config::AAGUID,
            min_timeout: crate::config::MIN_TIMEOUT,
            max_timeout: crate::config::MAX_TIMEOUT,
        }
    }
}

pub struct Authenticator<S: KeyStore + 'static, C: Consent> {
    key_store: Arc<S>,
    consent: C,
    key: Arc<SymmetricKey>,
    counter: Arc<dyn SignCounter>,
    chooser: KeySupportChooser,
    events: Events,
    config: AuthenticatorConfig,
    slot: CeremonySlot,
}

impl<S: KeyStore + 'static, C: Consent> Authenticator<S, C> {
    /// An authenticator with in-memory signature counters and no event sink.
    pub fn new(key_store: S, consent: C, key: SymmetricKey) -> Self {
        Self {
            key_store: Arc::new(key_store),
            consent,
            key: Arc::new(key),
            counter: Arc::new(MemoryCounter::new()),
            chooser: KeySupportChooser::default(),
            events: Events::none(),
            config: AuthenticatorConfig::default(),
            slot: CeremonySlot::default(),
        }
    }

    pub fn with_counter(mut self, counter: Arc<dyn SignCounter>) -> Self {
        self.counter = counter;
        self
    }

    pub fn with_events(mut self, events: Events) -> Self {
        self.chooser = KeySupportChooser::new(events.clone());
        self.events = events;
        self
    }

    pub fn with_config(mut self, config: AuthenticatorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn state(&self) -> CeremonyState {
        self.slot.state()
    }

    /// Interrupt the ceremony in flight, if any. The ceremony resolves with
    /// [`AuthenticatorError::Cancelled`] at its current suspension point.
    pub fn cancel(&self) -> bool {
        let cancelled = self.slot.cancel();
        if cancelled {
            tracing::info!("Cancellation requested");
        }
        cancelled
    }

    pub fn key_store(&self) -> &S {
        &self.key_store
    }

    pub fn config(&self) -> &AuthenticatorConfig {
        &self.config
    }

    /// Run a key-store closure on a blocking worker under the ceremony's
    /// deadline and cancellation.
    ///
    /// An interrupted call is not aborted; whatever it generates is left
    /// orphaned in the store.
    async fn blocking<T, F>(
        &self,
        guard: &CeremonyGuard<'_>,
        deadline: Instant,
        f: F,
    ) -> Result<T, AuthenticatorError>
    where
        T: Send + 'static,
        F: FnOnce(&S) -> Result<T, AuthenticatorError> + Send + 'static,
    {
        let store = self.key_store.clone();
        let task = tokio::task::spawn_blocking(move || f(&store));
        suspend(guard, deadline, async move {
            match task.await {
                Ok(result) => result,
                Err(e) => Err(AuthenticatorError::Internal(format!("key store task: {e}"))),
            }
        })
        .await
    }
}

/// Await `fut` unless the deadline passes or the ceremony is cancelled first.
async fn suspend<T, F>(
    guard: &CeremonyGuard<'_>,
    deadline: Instant,
    fut: F,
) -> Result<T, AuthenticatorError>
where
    F: Future<Output = Result<T, AuthenticatorError>>,
{
    tokio::select! {
        _ = guard.cancelled() => Err(AuthenticatorError::Cancelled),
        res = tokio::time::timeout_at(deadline, fut) => {
            res.unwrap_or(Err(AuthenticatorError::Timeout))
        }
    }
}

/// Fresh key-store label: `cred-` followed by 128 random bits in hex.
fn new_label() -> String {
    let bytes: [u8; 16] = rand::thread_rng().r#gen();
    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    format!("cred-{hex}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_shape() {
        let label = new_label();
        assert!(label.starts_with("cred-"));
        assert_eq!(label.len(), 5 + 32);
        assert!(label[5..].chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(label, new_label(), "labels must not repeat");
    }

    #[test]
    fn test_default_config_bounds() {
        let config = AuthenticatorConfig::default();
        assert!(config.min_timeout < config.max_timeout);
        assert_eq!(config.aaguid, crate::config::AAGUID);
    }
}
