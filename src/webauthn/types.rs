//! # WebAuthn API Types
//!
//! Request bodies, the ceremony options sent back to the browser, and the
//! boundary wrappers that normalize a client's response before it reaches the
//! engine.
//!
//! Options serialize in the camelCase shape `navigator.credentials.create()`
//! and `.get()` expect, with binary fields as base64url strings.

use crate::config::RelyingParty;
use crate::db::models::{Transports, User};
use crate::error::{AppError, AppResult};
use base64::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Timeout advertised to the browser, in milliseconds
pub const CEREMONY_TIMEOUT_MS: u32 = 60_000;

/// ECDSA P-256 with SHA-256
pub const COSE_ALG_ES256: i64 = -7;
/// RSASSA-PKCS1-v1_5 with SHA-256
pub const COSE_ALG_RS256: i64 = -257;

/// Body of `registerStart` and `loginStart`
///
/// ## Example JSON
/// ```json
/// { "username": "alice" }
/// ```
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UsernameRequest {
    #[serde(default)]
    pub username: String,
}

impl UsernameRequest {
    /// The trimmed username, or `BadRequest` when it is missing or blank
    pub fn username(&self) -> AppResult<&str> {
        let username = self.username.trim();
        if username.is_empty() {
            return Err(AppError::BadRequest("Username empty".to_string()));
        }
        Ok(username)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpEntity {
    pub name: String,
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserEntity {
    /// Base64url user handle
    pub id: String,
    pub name: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PubKeyCredParam {
    #[serde(rename = "type")]
    pub kind: String,
    pub alg: i64,
}

impl PubKeyCredParam {
    fn public_key(alg: i64) -> Self {
        Self {
            kind: "public-key".to_string(),
            alg,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CredentialDescriptor {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorSelection {
    pub resident_key: String,
    pub require_resident_key: bool,
    pub user_verification: String,
}

/// Options for `navigator.credentials.create()`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationOptions {
    pub rp: RpEntity,
    pub user: UserEntity,
    pub challenge: String,
    pub pub_key_cred_params: Vec<PubKeyCredParam>,
    pub timeout: u32,
    pub attestation: String,
    pub exclude_credentials: Vec<CredentialDescriptor>,
    pub authenticator_selection: AuthenticatorSelection,
}

impl RegistrationOptions {
    /// Options for a brand-new user: direct attestation, discoverable key
    /// preferred, ES256 or RS256, nothing excluded.
    pub fn new(rp: &RelyingParty, user: &User, challenge: &str) -> AppResult<Self> {
        let handle = user
            .handle()
            .ok_or_else(|| AppError::Internal(format!("user id {} is not a UUID", user.id)))?;

        Ok(Self {
            rp: RpEntity {
                name: rp.name.clone(),
                id: rp.id.clone(),
            },
            user: UserEntity {
                id: BASE64_URL_SAFE_NO_PAD.encode(handle),
                name: user.username.clone(),
                display_name: user.username.clone(),
            },
            challenge: challenge.to_string(),
            pub_key_cred_params: vec![
                PubKeyCredParam::public_key(COSE_ALG_ES256),
                PubKeyCredParam::public_key(COSE_ALG_RS256),
            ],
            timeout: CEREMONY_TIMEOUT_MS,
            attestation: "direct".to_string(),
            exclude_credentials: Vec::new(),
            authenticator_selection: AuthenticatorSelection {
                resident_key: "preferred".to_string(),
                require_resident_key: false,
                user_verification: "required".to_string(),
            },
        })
    }
}

/// Options for `navigator.credentials.get()`
///
/// The allow-list is always empty: the authenticator picks a discoverable
/// credential itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationOptions {
    pub challenge: String,
    pub timeout: u32,
    pub rp_id: String,
    pub allow_credentials: Vec<CredentialDescriptor>,
    pub user_verification: String,
}

impl AuthenticationOptions {
    pub fn new(rp: &RelyingParty, challenge: &str) -> Self {
        Self {
            challenge: challenge.to_string(),
            timeout: CEREMONY_TIMEOUT_MS,
            rp_id: rp.id.clone(),
            allow_credentials: Vec::new(),
            user_verification: "required".to_string(),
        }
    }
}

/// Attestation response from `navigator.credentials.create()`
///
/// Browsers and client libraries disagree on `response.transports`: an array,
/// a single (possibly comma-joined) string, or nothing. It is lifted out here
/// into [`Transports`] and removed from the payload the verifier sees.
#[derive(Debug, Clone)]
pub struct RegistrationResponse {
    credential: Value,
    transports: Transports,
}

impl RegistrationResponse {
    pub fn from_client(mut credential: Value) -> AppResult<Self> {
        if !credential.is_object() {
            return Err(AppError::BadRequest(
                "Expected a credential object".to_string(),
            ));
        }

        let raw = credential
            .get_mut("response")
            .and_then(Value::as_object_mut)
            .and_then(|response| response.remove("transports"));

        Ok(Self {
            credential,
            transports: normalize_transports(raw.as_ref()),
        })
    }

    pub fn credential(&self) -> &Value {
        &self.credential
    }

    pub fn transports(&self) -> &Transports {
        &self.transports
    }
}

/// Assertion response from `navigator.credentials.get()`
#[derive(Debug, Clone)]
pub struct AssertionResponse {
    credential: Value,
    credential_id: String,
}

impl AssertionResponse {
    pub fn from_client(credential: Value) -> AppResult<Self> {
        let credential_id = credential
            .get("id")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AppError::BadRequest("Credential id missing".to_string()))?
            .to_string();

        Ok(Self {
            credential,
            credential_id,
        })
    }

    pub fn credential(&self) -> &Value {
        &self.credential
    }

    pub fn credential_id(&self) -> &str {
        &self.credential_id
    }
}

fn normalize_transports(raw: Option<&Value>) -> Transports {
    match raw {
        Some(Value::Array(items)) => {
            Transports::from_tokens(items.iter().filter_map(Value::as_str))
        }
        Some(Value::String(joined)) => Transports::from_column(joined),
        _ => Transports::none(),
    }
}
