use tokio::time::Instant;

use crate::consent::{
    Candidate, ConfirmationContext, ConfirmationKind, Consent, Decision, Selection,
    SelectionContext, UserPresenceProof,
};
use crate::credential::{self, CredentialId, CredentialSource};
use crate::key_support::KeySupport;
use crate::keystore::KeyStore;

use super::authenticator_data::{self, Flags};
use super::state::{CeremonyGuard, CeremonyState};
use super::types::{
    AuthenticationRequest, AuthenticationResponse, AuthenticatorError, CeremonyKind,
    UserVerification,
};
use super::{Authenticator, suspend};

impl<S: KeyStore + 'static, C: Consent> Authenticator<S, C> {
    /// Produce an assertion with one of the credentials in `req.allow_list`,
    /// or with a credential picked by the consent capability when the list
    /// is empty.
    pub async fn get_assertion(
        &self,
        req: AuthenticationRequest,
    ) -> Result<AuthenticationResponse, AuthenticatorError> {
        let guard = self
            .slot
            .begin(CeremonyKind::Authentication, &self.events)?;
        let result = self.authenticate(&guard, req).await;
        guard.finish(result)
    }

    async fn authenticate(
        &self,
        guard: &CeremonyGuard<'_>,
        req: AuthenticationRequest,
    ) -> Result<AuthenticationResponse, AuthenticatorError> {
        req.validate(&self.config)?;

        // 1. Keep only identifiers we issued for this relying party.
        let mut candidates: Vec<(CredentialId, CredentialSource)> = Vec::new();
        for id in &req.allow_list {
            match credential::decode(id, &self.key) {
                Ok(source) if source.rp_id == req.rp_id => candidates.push((id.clone(), source)),
                Ok(_) => tracing::debug!(cred_id = %id.to_hex(), "Credential bound to another RP"),
                Err(_) => tracing::debug!(cred_id = %id.to_hex(), "Credential not decodable"),
            }
        }
        let discoverable = req.allow_list.is_empty();
        if !discoverable && candidates.is_empty() {
            tracing::info!(rp_id = %req.rp_id, offered = req.allow_list.len(), "No usable credential");
            return Err(AuthenticatorError::NoCredentials);
        }

        let deadline = Instant::now() + req.timeout;

        // 2. Consent: confirm a single candidate, otherwise let the user pick.
        guard.advance(CeremonyState::AwaitingConsent);
        let (credential_id, source) = if candidates.len() == 1 {
            let ctx = ConfirmationContext {
                kind: ConfirmationKind::Authentication,
                rp_id: req.rp_id.clone(),
                rp_name: None,
                user_name: None,
                user_display_name: None,
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
                tracing::info!(rp_id = %req.rp_id, "Authentication declined");
                return Err(AuthenticatorError::UserDeclined);
            }
            candidates.swap_remove(0)
        } else {
            let ctx = SelectionContext {
                rp_id: req.rp_id.clone(),
                candidates: candidates
                    .iter()
                    .map(|(id, source)| Candidate {
                        credential_id: id.clone(),
                        user_handle: source.user_handle.clone(),
                    })
                    .collect(),
                user_verification: req.user_verification,
                timeout: req.timeout,
            };
            let selection = suspend(guard, deadline, async {
                self.consent
                    .request_selection(&ctx)
                    .await
                    .map_err(AuthenticatorError::from)
            })
            .await?;
            let selected = match selection {
                Selection::Selected(id) => id,
                Selection::Decline => {
                    tracing::info!(rp_id = %req.rp_id, "Credential selection declined");
                    return Err(AuthenticatorError::UserDeclined);
                }
            };
            self.resolve_selection(&req.rp_id, selected, candidates, discoverable)?
        };

        let support =
            KeySupport::for_algorithm(source.algorithm).ok_or(AuthenticatorError::NoCredentials)?;
        let proof = UserPresenceProof::new(req.user_verification.check());

        // 3. Count and sign
        guard.advance(CeremonyState::Signing);
        let counter = self.counter.clone();
        let mut flags = Flags::USER_PRESENT;
        flags.set(
            Flags::USER_VERIFIED,
            req.user_verification == UserVerification::Required,
        );
        let rp_id = req.rp_id.clone();
        let label = source.key_label.clone();
        let floor = source.sign_count;
        let client_data_hash = req.client_data_hash.clone();

        let (authenticator_data, signature, sign_count) = self
            .blocking(guard, deadline, move |store| {
                let sign_count = counter.next(&label, floor)?;
                let auth_data = authenticator_data::build(&rp_id, sign_count, flags, None)?;
                let mut to_sign = auth_data.clone();
                to_sign.extend_from_slice(&client_data_hash);
                let signature = support.sign(store, &to_sign, &label, &proof)?;
                Ok((auth_data, signature, sign_count))
            })
            .await?;

        tracing::info!(rp_id = %req.rp_id, sign_count, "Assertion produced");
        Ok(AuthenticationResponse {
            credential_id,
            authenticator_data,
            signature,
            user_handle: source.user_handle,
            sign_count,
        })
    }

    /// Map the consent capability's pick back to a credential source. The
    /// pick must be one of the offered candidates or, when nothing was
    /// offered, an identifier of ours for the same relying party.
    fn resolve_selection(
        &self,
        rp_id: &str,
        selected: CredentialId,
        candidates: Vec<(CredentialId, CredentialSource)>,
        discoverable: bool,
    ) -> Result<(CredentialId, CredentialSource), AuthenticatorError> {
        if discoverable {
            return match credential::decode(&selected, &self.key) {
                Ok(source) if source.rp_id == rp_id => Ok((selected, source)),
                _ => {
                    tracing::warn!(rp_id, "Selected credential not usable for this RP");
                    Err(AuthenticatorError::NoCredentials)
                }
            };
        }
        candidates
            .into_iter()
            .find(|(id, _)| *id == selected)
            .ok_or_else(|| {
                tracing::warn!(rp_id, "Selection was not among the offered candidates");
                AuthenticatorError::NoCredentials
            })
    }
}
