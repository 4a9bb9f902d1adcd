use tokio::time::Instant;

use crate::consent::{ConfirmationContext, ConfirmationKind, Consent, Decision, UserPresenceProof};
use crate::credential::{self, CredentialSource};
use crate::keystore::KeyStore;

use super::authenticator_data::{self, AttestedCredential, Flags};
use super::state::{CeremonyGuard, CeremonyState};
use super::types::{
    AuthenticatorError, CeremonyKind, RegistrationRequest, RegistrationResponse,
    UserVerification,
};
use super::{Authenticator, new_label, suspend};

impl<S: KeyStore + 'static, C: Consent> Authenticator<S, C> {
    /// Register a new credential for `req.rp`.
    ///
    /// Fails with `Busy` while another ceremony is running.
    pub async fn make_credential(
        &self,
        req: RegistrationRequest,
    ) -> Result<RegistrationResponse, AuthenticatorError> {
        let guard = self.slot.begin(CeremonyKind::Registration, &self.events)?;
        let result = self.register(&guard, req).await;
        guard.finish(result)
    }

    async fn register(
        &self,
        guard: &CeremonyGuard<'_>,
        req: RegistrationRequest,
    ) -> Result<RegistrationResponse, AuthenticatorError> {
        // 1. Validate and negotiate; neither touches consent or the key store.
        req.validate(&self.config)?;
        let support = self
            .chooser
            .choose(&req.algorithms)
            .ok_or(AuthenticatorError::UnsupportedAlgorithm)?;

        // 2. Exclude list. Identifiers we cannot open are somebody else's.
        for id in &req.exclude_list {
            if let Ok(source) = credential::decode(id, &self.key) {
                if source.rp_id == req.rp.id {
                    tracing::info!(rp_id = %req.rp.id, cred_id = %id.to_hex(), "Credential excluded");
                    return Err(AuthenticatorError::AlreadyRegistered);
                }
            }
        }

        let deadline = Instant::now() + req.timeout;

        // 3. Consent
        guard.advance(CeremonyState::AwaitingConsent);
        let ctx = ConfirmationContext {
            kind: ConfirmationKind::Registration,
            rp_id: req.rp.id.clone(),
            rp_name: req.rp.name.clone(),
            user_name: req.user.name.clone(),
            user_display_name: req.user.display_name.clone(),
            user_verification: req.user_verification,
            timeout: req.timeout,
        };
        let decision = suspend(guard, deadline, async {
            self.consent
                .request_confirmation(&ctx)
                .await
                .map_err(AuthenticatorError::from)
        })
        .await?;
        if decision == Decision::Decline {
            tracing::info!(rp_id = %req.rp.id, "Registration declined");
            return Err(AuthenticatorError::UserDeclined);
        }
        let proof = UserPresenceProof::new(req.user_verification.check());

        // 4. Key generation, identifier and self-attestation
        guard.advance(CeremonyState::Signing);
        let label = new_label();
        let policy = req.user_verification.access_policy();
        let key = self.key.clone();
        let aaguid = self.config.aaguid;
        let mut flags = Flags::USER_PRESENT;
        flags.set(
            Flags::USER_VERIFIED,
            req.user_verification == UserVerification::Required,
        );
        let rp_id = req.rp.id.clone();
        let user_handle = req.user.id.clone();
        let client_data_hash = req.client_data_hash.clone();

        let (credential_id, authenticator_data, signature, public_key) = self
            .blocking(guard, deadline, move |store| {
                let public_key = support.create_key_pair(store, &label, policy)?;
                tracing::debug!(label = %label, "Key pair generated");

                let source = CredentialSource {
                    rp_id: rp_id.clone(),
                    user_handle,
                    key_label: label.clone(),
                    algorithm: support.algorithm(),
                    sign_count: 0,
                };
                let credential_id = credential::encode(&source, &key)?;

                let attested = AttestedCredential {
                    aaguid,
                    credential_id: &credential_id,
                    public_key: &public_key,
                };
                let auth_data = authenticator_data::build(&rp_id, 0, flags, Some(&attested))?;
                let mut to_sign = auth_data.clone();
                to_sign.extend_from_slice(&client_data_hash);
                let signature = support.sign(store, &to_sign, &label, &proof)?;
                Ok((credential_id, auth_data, signature, public_key))
            })
            .await?;

        tracing::info!(
            rp_id = %req.rp.id,
            cred_id_len = credential_id.len(),
            algorithm = %support.algorithm(),
            "Credential registered"
        );
        Ok(RegistrationResponse {
            credential_id,
            authenticator_data,
            signature,
            public_key,
            algorithm: support.algorithm(),
        })
    }
}
