use crate::config::RelyingParty;
use crate::db::{CredentialStore, UserStore};
use crate::webauthn::verifier::AssertionVerifier;
use std::sync::Arc;

/// Orchestrates the four ceremony phases
///
/// Every phase is a single request/response step over the shared stores.
/// Session state is passed in and out explicitly: Start returns the
/// [`ChallengeSession`](super::session::ChallengeSession) to bind, Finish
/// consumes whatever the caller took out of the slot. The engine itself holds
/// no locks and no per-client state.
///
/// See `registration.rs` and `authentication.rs` for the phases.
pub struct CeremonyEngine {
    pub(super) rp: RelyingParty,
    pub(super) users: Arc<dyn UserStore>,
    pub(super) credentials: Arc<dyn CredentialStore>,
    pub(super) verifier: Arc<dyn AssertionVerifier>,
}

impl CeremonyEngine {
    pub fn new(
        rp: RelyingParty,
        users: Arc<dyn UserStore>,
        credentials: Arc<dyn CredentialStore>,
        verifier: Arc<dyn AssertionVerifier>,
    ) -> Self {
        Self {
            rp,
            users,
            credentials,
            verifier,
        }
    }

    pub fn relying_party(&self) -> &RelyingParty {
        &self.rp
    }
}

impl std::fmt::Debug for CeremonyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CeremonyEngine")
            .field("rp", &self.rp)
            .field("verifier", &"<AssertionVerifier>")
            .finish()
    }
}
