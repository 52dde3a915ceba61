//! # Assertion Verifier
//!
//! The cryptographic half of a ceremony lives behind [`AssertionVerifier`]:
//! minting challenges, parsing attestation objects and COSE keys, checking
//! signatures, origin, RP ID and the user-verification flag. The engine never
//! looks inside a response beyond the credential id; everything else is the
//! verifier's business.
//!
//! [`WebauthnVerifier`] binds the contract to webauthn-rs using passkey
//! registration and discoverable authentication, which always require user
//! verification. Expected origins and RP ID are fixed when it is built.

use crate::config::RelyingParty;
use crate::db::models::{Credential, User};
use serde_json::Value;
use std::time::Duration;
use webauthn_rs::prelude::*;

/// Verifier errors
#[derive(Debug, thiserror::Error)]
pub enum VerifierError {
    /// Challenge, origin, RP ID, user verification or signature check failed
    #[error("Response rejected: {0}")]
    Rejected(String),

    /// The client payload is not a WebAuthn response at all
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// The verifier itself could not run
    #[error("Verifier unavailable: {0}")]
    Unavailable(String),

    /// Ceremony state or key material failed to (de)serialize
    #[error("Verifier state error: {0}")]
    State(#[from] serde_json::Error),
}

/// A challenge as issued by the verifier, plus whatever it needs to check the
/// response later. `state` is stored in the session verbatim.
#[derive(Debug, Clone)]
pub struct PendingCeremony {
    /// Base64url challenge bytes
    pub challenge: String,
    pub state: Value,
}

/// What a successful registration yields for the Credential Store
#[derive(Debug, Clone)]
pub struct VerifiedCredential {
    pub credential_id: String,
    pub public_key: Vec<u8>,
    pub counter: u32,
}

pub trait AssertionVerifier: Send + Sync {
    /// Mint a registration challenge for `user`
    fn issue_registration(&self, user: &User) -> Result<PendingCeremony, VerifierError>;

    /// Check an attestation response against the pending challenge
    fn verify_registration(
        &self,
        response: &Value,
        pending: &PendingCeremony,
    ) -> Result<VerifiedCredential, VerifierError>;

    /// Mint an authentication challenge with an empty allow-list
    fn issue_authentication(&self) -> Result<PendingCeremony, VerifierError>;

    /// Check an assertion against the pending challenge and the stored
    /// credential (public key and last accepted counter). Returns the
    /// counter the authenticator reported.
    fn verify_authentication(
        &self,
        response: &Value,
        pending: &PendingCeremony,
        credential: &Credential,
    ) -> Result<u32, VerifierError>;
}

/// webauthn-rs backed verifier
pub struct WebauthnVerifier {
    webauthn: Webauthn,
}

impl WebauthnVerifier {
    pub fn new(rp: &RelyingParty) -> Result<Self, WebauthnError> {
        let (primary, others) = rp
            .origins
            .split_first()
            .ok_or(WebauthnError::Configuration)?;

        let mut builder = WebauthnBuilder::new(&rp.id, primary)?
            .rp_name(&rp.name)
            .timeout(Duration::from_secs(60));
        for origin in others {
            builder = builder.append_allowed_origin(origin);
        }

        Ok(Self {
            webauthn: builder.build()?,
        })
    }
}

impl AssertionVerifier for WebauthnVerifier {
    fn issue_registration(&self, user: &User) -> Result<PendingCeremony, VerifierError> {
        let user_uuid = Uuid::parse_str(&user.id).map_err(|_| {
            VerifierError::Unavailable(format!("user id {} is not a UUID", user.id))
        })?;

        // No exclusion list: a brand new user has no credentials yet
        let (ccr, reg_state) = self
            .webauthn
            .start_passkey_registration(user_uuid, &user.username, &user.username, None)
            .map_err(|e| VerifierError::Unavailable(e.to_string()))?;

        Ok(PendingCeremony {
            challenge: challenge_of(&serde_json::to_value(&ccr)?)?,
            state: serde_json::to_value(&reg_state)?,
        })
    }

    fn verify_registration(
        &self,
        response: &Value,
        pending: &PendingCeremony,
    ) -> Result<VerifiedCredential, VerifierError> {
        let reg: RegisterPublicKeyCredential = serde_json::from_value(response.clone())
            .map_err(|e| VerifierError::Malformed(e.to_string()))?;
        let reg_state: PasskeyRegistration = serde_json::from_value(pending.state.clone())?;

        let passkey = self
            .webauthn
            .finish_passkey_registration(&reg, &reg_state)
            .map_err(|e| VerifierError::Rejected(e.to_string()))?;

        // The serialized Passkey is the key material we hand back later.
        // Id and initial counter are read from the same serialized form.
        let material = serde_json::to_value(&passkey)?;
        let credential_id = material
            .pointer("/cred/cred_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| VerifierError::Unavailable("passkey carries no credential id".into()))?;
        let counter = material
            .pointer("/cred/counter")
            .and_then(Value::as_u64)
            .and_then(|c| u32::try_from(c).ok())
            .unwrap_or(0);

        Ok(VerifiedCredential {
            credential_id,
            public_key: serde_json::to_vec(&material)?,
            counter,
        })
    }

    fn issue_authentication(&self) -> Result<PendingCeremony, VerifierError> {
        let (rcr, auth_state) = self
            .webauthn
            .start_discoverable_authentication()
            .map_err(|e| VerifierError::Unavailable(e.to_string()))?;

        Ok(PendingCeremony {
            challenge: challenge_of(&serde_json::to_value(&rcr)?)?,
            state: serde_json::to_value(&auth_state)?,
        })
    }

    fn verify_authentication(
        &self,
        response: &Value,
        pending: &PendingCeremony,
        credential: &Credential,
    ) -> Result<u32, VerifierError> {
        let assertion: PublicKeyCredential = serde_json::from_value(response.clone())
            .map_err(|e| VerifierError::Malformed(e.to_string()))?;
        let auth_state: DiscoverableAuthentication =
            serde_json::from_value(pending.state.clone())?;

        let passkey = stored_passkey(credential)?;

        let result = self
            .webauthn
            .finish_discoverable_authentication(
                &assertion,
                auth_state,
                &[DiscoverableKey::from(&passkey)],
            )
            .map_err(|e| VerifierError::Rejected(e.to_string()))?;

        if !result.user_verified() {
            return Err(VerifierError::Rejected(
                "user verification flag not set".to_string(),
            ));
        }

        Ok(result.counter())
    }
}

/// Rebuild the stored passkey with the store's counter
///
/// The counter column is authoritative; the blob's copy is only as fresh as
/// the registration.
fn stored_passkey(credential: &Credential) -> Result<Passkey, VerifierError> {
    let mut material: Value = serde_json::from_slice(&credential.public_key)?;
    let counter = material
        .pointer_mut("/cred/counter")
        .ok_or_else(|| VerifierError::Unavailable("stored passkey has no counter".into()))?;
    *counter = Value::from(credential.sign_count());
    Ok(serde_json::from_value(material)?)
}

/// Pull the challenge out of serialized ceremony options
fn challenge_of(options: &Value) -> Result<String, VerifierError> {
    options
        .pointer("/publicKey/challenge")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| VerifierError::Unavailable("options carry no challenge".to_string()))
}
