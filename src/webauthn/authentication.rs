use crate::db::models::User;
use crate::error::{AppError, AppResult};
use crate::webauthn::engine::CeremonyEngine;
use crate::webauthn::session::{CeremonyKind, ChallengeSession};
use crate::webauthn::types::{AssertionResponse, AuthenticationOptions};
use chrono::Utc;

impl CeremonyEngine {
    pub async fn start_authentication(
        &self,
        username: &str,
    ) -> AppResult<(AuthenticationOptions, ChallengeSession)> {
        let user = self
            .users
            .find_by_username(username)
            .await?
            .ok_or_else(|| AppError::UserNotFound(username.to_string()))?;

        // Empty allow-list: the authenticator resolves the credential itself
        let pending = self.verifier.issue_authentication()?;
        let options = AuthenticationOptions::new(&self.rp, &pending.challenge);
        let session = ChallengeSession::issue(CeremonyKind::Authentication, &user.id, pending);

        tracing::debug!("Authentication challenge issued for user {}", user.id);
        Ok((options, session))
    }

    /// Verify an assertion and advance the credential's counter
    ///
    /// Returns the authenticated user. The counter write is conditional, so a
    /// replayed or cloned authenticator reporting a stale counter fails with
    /// `CounterRegression` even after the signature checked out.
    pub async fn finish_authentication(
        &self,
        slot: Option<ChallengeSession>,
        response: AssertionResponse,
    ) -> AppResult<User> {
        let session = ChallengeSession::redeem(slot, CeremonyKind::Authentication, Utc::now())?;

        let credential = self
            .credentials
            .find_by_credential_id(response.credential_id())
            .await?
            .ok_or_else(|| {
                tracing::warn!(
                    "Assertion names unknown credential {}",
                    response.credential_id()
                );
                AppError::CredentialNotRegistered
            })?;

        let user = self
            .users
            .find_by_id(&session.subject_user_id)
            .await?
            .ok_or_else(|| AppError::UserNotFound(session.subject_user_id.clone()))?;

        // A discoverable credential belonging to someone else must not log in
        // the user this session was started for
        if credential.user_id != user.id {
            tracing::warn!(
                "Credential {} belongs to user {}, session was started for {}",
                credential.credential_id,
                credential.user_id,
                user.id
            );
            return Err(AppError::VerificationFailed);
        }

        let new_counter = self.verifier.verify_authentication(
            response.credential(),
            &session.pending(),
            &credential,
        )?;

        self.credentials
            .update_counter(&credential.credential_id, new_counter)
            .await?;

        tracing::info!(
            "User {} authenticated with credential {} (counter {})",
            user.username,
            credential.credential_id,
            new_counter
        );
        Ok(user)
    }
}
