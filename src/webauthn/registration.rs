//! # Passkey Registration Logic
//!
//! Registration is a two-step process: start and finish.
//!
//! ## Registration Flow
//! 1. **Start**: create the user, mint a challenge, hand options to the client
//! 2. **Finish**: verify the attestation against that challenge, store the key
//!
//! ## Security Concepts
//! - **Challenge**: random value the authenticator signs over, so a captured
//!   response cannot be replayed into another ceremony
//! - **Public Key Cryptography**: the server keeps the public key only
//! - **Attestation**: requested as "direct"; the verifier decides what to trust

use crate::db::models::{Credential, NewCredential};
use crate::error::{AppError, AppResult};
use crate::webauthn::engine::CeremonyEngine;
use crate::webauthn::session::{CeremonyKind, ChallengeSession};
use crate::webauthn::types::{RegistrationOptions, RegistrationResponse};
use chrono::Utc;

impl CeremonyEngine {
    /// Start the passkey registration process
    ///
    /// ## Flow
    /// 1. Check the username is free
    /// 2. Create the user
    /// 3. Mint a registration challenge
    /// 4. Return the options for the client and the session to bind
    ///
    /// ## Errors
    /// - AlreadyExists: username taken, including when two starts race
    /// - Internal: store or verifier unavailable
    pub async fn start_registration(
        &self,
        username: &str,
    ) -> AppResult<(RegistrationOptions, ChallengeSession)> {
        tracing::debug!("Registration start for '{}'", username);

        // Fail fast before creating anything; the store's unique constraint
        // still settles the race where two starts pass this check together
        if self.users.find_by_username(username).await?.is_some() {
            return Err(AppError::AlreadyExists(username.to_string()));
        }

        let user = self.users.create(username).await?;
        let pending = self.verifier.issue_registration(&user)?;
        let options = RegistrationOptions::new(&self.rp, &user, &pending.challenge)?;
        let session = ChallengeSession::issue(CeremonyKind::Registration, &user.id, pending);

        tracing::info!("Registration challenge issued for user {}", user.id);
        Ok((options, session))
    }

    /// Finish the passkey registration process
    ///
    /// `slot` is whatever the caller removed from the client's session; it is
    /// consumed here so the same challenge can never be presented twice.
    ///
    /// ## What gets verified?
    /// - The response answers exactly the challenge bound to this session
    /// - Origin is in the allow-list and the RP ID matches
    /// - The authenticator performed user verification
    /// - The attestation and its signature are well-formed
    ///
    /// ## Errors
    /// - MissingSession: no registration ceremony bound
    /// - SessionExpired: the 60 second window has closed
    /// - VerificationFailed: any verifier check failed
    /// - AlreadyExists: the credential id is already registered
    pub async fn finish_registration(
        &self,
        slot: Option<ChallengeSession>,
        response: RegistrationResponse,
    ) -> AppResult<Credential> {
        let session = ChallengeSession::redeem(slot, CeremonyKind::Registration, Utc::now())?;
        tracing::debug!("Registration finish for user {}", session.subject_user_id);

        let verified = self
            .verifier
            .verify_registration(response.credential(), &session.pending())?;

        let credential = self
            .credentials
            .create(NewCredential {
                credential_id: verified.credential_id,
                user_id: session.subject_user_id,
                public_key: verified.public_key,
                counter: verified.counter,
                transports: response.transports().clone(),
            })
            .await?;

        tracing::info!(
            "Credential {} registered for user {} (transports: [{}])",
            credential.credential_id,
            credential.user_id,
            credential.transports
        );
        Ok(credential)
    }
}
