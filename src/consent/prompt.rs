use super::{Candidate, ConfirmationContext, ConfirmationKind};
use crate::ceremony::UserVerification;

pub(crate) struct UpPrompt {
    pub title: String,
    pub description: String,
}

pub(crate) fn confirmation_prompt(ctx: &ConfirmationContext) -> UpPrompt {
    let site = match ctx.rp_name.as_deref() {
        Some(name) => format!("{name} ({})", ctx.rp_id),
        None => ctx.rp_id.clone(),
    };
    let account = ctx
        .user_display_name
        .as_deref()
        .or(ctx.user_name.as_deref())
        .unwrap_or("(unknown)");
    let (action, ok) = match ctx.kind {
        ConfirmationKind::Registration => ("Register new passkey", "create"),
        ConfirmationKind::Authentication => ("Sign in with passkey", "sign in"),
    };
    UpPrompt {
        title: title(ctx.user_verification),
        description: format!(
            "{action}\n\nSite: {site}\nAccount: {account}\n\nPress OK to {ok}, or Cancel to deny."
        ),
    }
}

pub(crate) fn candidate_prompt(
    rp_id: &str,
    uv: UserVerification,
    candidate: &Candidate,
    index: usize,
    total: usize,
) -> UpPrompt {
    let account = String::from_utf8_lossy(&candidate.user_handle);
    UpPrompt {
        title: title(uv),
        description: format!(
            "Sign in with passkey ({} of {total})\n\nSite: {rp_id}\nAccount: {account}\n\nPress OK to use this key, or Cancel for the next one.",
            index + 1
        ),
    }
}

fn title(uv: UserVerification) -> String {
    match uv {
        UserVerification::Required => "webauthn-authenticator (verification required)".to_string(),
        _ => "webauthn-authenticator".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::CredentialId;
    use std::time::Duration;

    fn ctx(kind: ConfirmationKind) -> ConfirmationContext {
        ConfirmationContext {
            kind,
            rp_id: "example.org".into(),
            rp_name: Some("Example".into()),
            user_name: Some("alice".into()),
            user_display_name: None,
            user_verification: UserVerification::Preferred,
            timeout: Duration::from_secs(30),
        }
    }

    #[test]
    fn test_registration_prompt_mentions_site_and_account() {
        let p = confirmation_prompt(&ctx(ConfirmationKind::Registration));
        assert!(p.description.starts_with("Register new passkey"));
        assert!(p.description.contains("Example (example.org)"));
        assert!(p.description.contains("Account: alice"));
    }

    #[test]
    fn test_candidate_prompt_numbers_from_one() {
        let candidate = Candidate {
            credential_id: CredentialId::from(vec![1, 2, 3]),
            user_handle: b"user-42".to_vec(),
        };
        let p = candidate_prompt("example.org", UserVerification::Required, &candidate, 0, 2);
        assert!(p.description.contains("(1 of 2)"));
        assert!(p.description.contains("user-42"));
        assert!(p.title.contains("verification required"));
    }
}
