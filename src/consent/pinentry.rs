use async_trait::async_trait;

use super::prompt::{UpPrompt, candidate_prompt, confirmation_prompt};
use super::{Consent, ConsentError, ConfirmationContext, Decision, Selection, SelectionContext};

/// Consent through a `pinentry` dialog: OK approves, Cancel declines.
///
/// Selection walks the candidates one dialog at a time and picks the first
/// one the user approves.
#[derive(Debug, Clone)]
pub struct PinentryConsent {
    binary: String,
}

impl PinentryConsent {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

enum Answer {
    Ok,
    Cancel,
}

fn ask(bin: &str, prompt: &UpPrompt) -> Result<Answer, ConsentError> {
    let Some(mut input) = pinentry::PassphraseInput::with_binary(bin) else {
        return Err(ConsentError::Unavailable(format!(
            "pinentry binary not found: {bin}"
        )));
    };
    match input
        .with_title(&prompt.title)
        .with_description(&prompt.description)
        .with_ok("Confirm")
        .with_cancel("Deny")
        .interact()
    {
        Ok(_) => Ok(Answer::Ok),
        Err(pinentry::Error::Io(e)) => Err(ConsentError::Unavailable(e.to_string())),
        Err(_) => Ok(Answer::Cancel),
    }
}

async fn ask_blocking(bin: &str, prompt: UpPrompt) -> Result<Answer, ConsentError> {
    let bin = bin.to_string();
    tokio::task::spawn_blocking(move || ask(&bin, &prompt))
        .await
        .map_err(|e| ConsentError::Unavailable(e.to_string()))?
}

#[async_trait]
impl Consent for PinentryConsent {
    async fn request_confirmation(
        &self,
        ctx: &ConfirmationContext,
    ) -> Result<Decision, ConsentError> {
        let prompt = confirmation_prompt(ctx);
        match ask_blocking(&self.binary, prompt).await? {
            Answer::Ok => Ok(Decision::Approve),
            Answer::Cancel => Ok(Decision::Decline),
        }
    }

    async fn request_selection(&self, ctx: &SelectionContext) -> Result<Selection, ConsentError> {
        if ctx.candidates.is_empty() {
            return Err(ConsentError::Unavailable(
                "pinentry cannot list discoverable credentials".into(),
            ));
        }
        let total = ctx.candidates.len();
        for (index, candidate) in ctx.candidates.iter().enumerate() {
            let prompt = candidate_prompt(&ctx.rp_id, ctx.user_verification, candidate, index, total);
            if let Answer::Ok = ask_blocking(&self.binary, prompt).await? {
                return Ok(Selection::Selected(candidate.credential_id.clone()));
            }
        }
        Ok(Selection::Decline)
    }
}
