//! User consent capability.
//!
//! The authenticator never renders UI itself. It asks a [`Consent`]
//! implementation to confirm an operation or to pick a credential, under a
//! deadline the orchestrator enforces.

pub mod pinentry;
pub(crate) mod prompt;
mod proof;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::ceremony::UserVerification;
use crate::credential::CredentialId;

pub use pinentry::PinentryConsent;
pub use proof::{UserCheck, UserPresenceProof};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationKind {
    Registration,
    Authentication,
}

/// What the user is asked to approve.
#[derive(Debug, Clone)]
pub struct ConfirmationContext {
    pub kind: ConfirmationKind,
    pub rp_id: String,
    pub rp_name: Option<String>,
    pub user_name: Option<String>,
    pub user_display_name: Option<String>,
    pub user_verification: UserVerification,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub credential_id: CredentialId,
    pub user_handle: Vec<u8>,
}

/// Credentials offered for selection. An empty candidate list means the
/// caller sent no allow-list and the consent side should offer whatever
/// discoverable credentials it knows about for `rp_id`.
#[derive(Debug, Clone)]
pub struct SelectionContext {
    pub rp_id: String,
    pub candidates: Vec<Candidate>,
    pub user_verification: UserVerification,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Decline,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Selected(CredentialId),
    Decline,
}

#[derive(Debug, thiserror::Error)]
pub enum ConsentError {
    #[error("consent unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait Consent: Send + Sync {
    async fn request_confirmation(
        &self,
        ctx: &ConfirmationContext,
    ) -> Result<Decision, ConsentError>;

    async fn request_selection(&self, ctx: &SelectionContext) -> Result<Selection, ConsentError>;
}

#[async_trait]
impl<T: Consent + ?Sized> Consent for Arc<T> {
    async fn request_confirmation(
        &self,
        ctx: &ConfirmationContext,
    ) -> Result<Decision, ConsentError> {
        (**self).request_confirmation(ctx).await
    }

    async fn request_selection(&self, ctx: &SelectionContext) -> Result<Selection, ConsentError> {
        (**self).request_selection(ctx).await
    }
}

/// Approves every confirmation and picks the first offered candidate.
/// For headless use (`--yes`); it knows no discoverable credentials.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoApprove;

#[async_trait]
impl Consent for AutoApprove {
    async fn request_confirmation(
        &self,
        ctx: &ConfirmationContext,
    ) -> Result<Decision, ConsentError> {
        tracing::info!(rp_id = %ctx.rp_id, kind = ?ctx.kind, "Auto-approving");
        Ok(Decision::Approve)
    }

    async fn request_selection(&self, ctx: &SelectionContext) -> Result<Selection, ConsentError> {
        match ctx.candidates.first() {
            Some(candidate) => Ok(Selection::Selected(candidate.credential_id.clone())),
            None => Ok(Selection::Decline),
        }
    }
}
