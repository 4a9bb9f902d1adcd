use crate::keystore::AccessPolicy;

/// Strength of the user check that preceded a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum UserCheck {
    Presence,
    Verification,
}

/// Token proving the user approved the current ceremony.
///
/// Only the ceremony orchestrator mints these, after the consent capability
/// approved; key stores demand one for every signature.
#[derive(Debug)]
pub struct UserPresenceProof {
    level: UserCheck,
}

impl UserPresenceProof {
    pub(crate) fn new(level: UserCheck) -> Self {
        Self { level }
    }

    pub fn level(&self) -> UserCheck {
        self.level
    }

    pub fn satisfies(&self, policy: AccessPolicy) -> bool {
        match policy {
            AccessPolicy::UserPresence => true,
            AccessPolicy::UserVerification => self.level == UserCheck::Verification,
        }
    }

    /// Construct a presence proof for use in tests only.
    /// Do not use in production code; this bypasses the consent capability.
    #[doc(hidden)]
    pub fn test_only() -> Self {
        Self::new(UserCheck::Presence)
    }

    #[doc(hidden)]
    pub fn test_only_verified() -> Self {
        Self::new(UserCheck::Verification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presence_proof_only_satisfies_presence() {
        let proof = UserPresenceProof::new(UserCheck::Presence);
        assert!(proof.satisfies(AccessPolicy::UserPresence));
        assert!(!proof.satisfies(AccessPolicy::UserVerification));
    }

    #[test]
    fn test_verification_proof_satisfies_both() {
        let proof = UserPresenceProof::new(UserCheck::Verification);
        assert!(proof.satisfies(AccessPolicy::UserPresence));
        assert!(proof.satisfies(AccessPolicy::UserVerification));
    }
}
