//! Shared fixtures: a deterministic verifier and a software authenticator
//! that speaks its format.
//!
//! The fake verifier performs the same checks a real one does (challenge,
//! origin, ceremony type, user verification, signature against the stored
//! key) over a toy response format, so ceremony properties can be tested
//! without CBOR or real key pairs.

#![allow(dead_code)]

use base64::prelude::*;
use passkey_rp::config::{parse_origins, RelyingParty};
use passkey_rp::db::{Credential, MemoryStore, User};
use passkey_rp::state::AppState;
use passkey_rp::webauthn::{
    AssertionVerifier, CeremonyEngine, PendingCeremony, VerifiedCredential, VerifierError,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

pub const ORIGIN: &str = "http://localhost:8080";

pub fn rp() -> RelyingParty {
    RelyingParty::new(
        "localhost",
        "Passkey Tutorial",
        parse_origins("http://localhost:8080,http://127.0.0.1:8080").unwrap(),
    )
}

pub fn engine() -> (CeremonyEngine, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let engine = CeremonyEngine::new(
        rp(),
        store.clone(),
        store.clone(),
        Arc::new(FakeVerifier::new(&rp())),
    );
    (engine, store)
}

pub fn app_state() -> (AppState, Arc<MemoryStore>) {
    app_state_with(Arc::new(FakeVerifier::new(&rp())))
}

pub fn app_state_with(verifier: Arc<dyn AssertionVerifier>) -> (AppState, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let state = AppState::from_parts(rp(), store.clone(), store.clone(), verifier);
    (state, store)
}

/// "Signature" over a challenge: only reproducible with the same key
fn sign(key: &str, challenge: &str) -> String {
    BASE64_URL_SAFE_NO_PAD.encode(format!("{key}|{challenge}"))
}

fn client_data(kind: &str, challenge: &str, origin: &str) -> String {
    let data = json!({ "type": kind, "challenge": challenge, "origin": origin });
    BASE64_URL_SAFE_NO_PAD.encode(data.to_string())
}

pub struct FakeVerifier {
    origins: Vec<String>,
}

impl FakeVerifier {
    pub fn new(rp: &RelyingParty) -> Self {
        Self {
            origins: rp
                .origins
                .iter()
                .map(|o| o.origin().ascii_serialization())
                .collect(),
        }
    }

    fn issue(&self) -> PendingCeremony {
        let challenge = BASE64_URL_SAFE_NO_PAD.encode(Uuid::new_v4().as_bytes());
        PendingCeremony {
            state: json!({ "challenge": challenge }),
            challenge,
        }
    }

    /// Checks shared by both ceremonies; returns the `response` object
    fn check<'a>(
        &self,
        response: &'a Value,
        pending: &PendingCeremony,
        expected_type: &str,
    ) -> Result<&'a Value, VerifierError> {
        let inner = response
            .get("response")
            .ok_or_else(|| VerifierError::Malformed("missing response".into()))?;
        let raw = inner
            .get("clientDataJSON")
            .and_then(Value::as_str)
            .ok_or_else(|| VerifierError::Malformed("missing clientDataJSON".into()))?;
        let data: Value = BASE64_URL_SAFE_NO_PAD
            .decode(raw)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .ok_or_else(|| VerifierError::Malformed("bad clientDataJSON".into()))?;

        if data["type"] != expected_type {
            return Err(VerifierError::Rejected("wrong ceremony type".into()));
        }
        if data["challenge"] != pending.state["challenge"] {
            return Err(VerifierError::Rejected("challenge mismatch".into()));
        }
        let origin = data["origin"].as_str().unwrap_or_default();
        if !self.origins.iter().any(|o| o == origin) {
            return Err(VerifierError::Rejected(format!("origin {origin} not allowed")));
        }
        if inner["userVerified"] != true {
            return Err(VerifierError::Rejected("user not verified".into()));
        }
        Ok(inner)
    }
}

impl AssertionVerifier for FakeVerifier {
    fn issue_registration(&self, _user: &User) -> Result<PendingCeremony, VerifierError> {
        Ok(self.issue())
    }

    fn verify_registration(
        &self,
        response: &Value,
        pending: &PendingCeremony,
    ) -> Result<VerifiedCredential, VerifierError> {
        let inner = self.check(response, pending, "webauthn.create")?;
        let credential_id = response["id"]
            .as_str()
            .ok_or_else(|| VerifierError::Malformed("missing id".into()))?;
        let key = inner["publicKey"]
            .as_str()
            .ok_or_else(|| VerifierError::Malformed("missing publicKey".into()))?;

        Ok(VerifiedCredential {
            credential_id: credential_id.to_string(),
            public_key: key.as_bytes().to_vec(),
            counter: inner["counter"].as_u64().unwrap_or(0) as u32,
        })
    }

    fn issue_authentication(&self) -> Result<PendingCeremony, VerifierError> {
        Ok(self.issue())
    }

    fn verify_authentication(
        &self,
        response: &Value,
        pending: &PendingCeremony,
        credential: &Credential,
    ) -> Result<u32, VerifierError> {
        let inner = self.check(response, pending, "webauthn.get")?;
        let key = String::from_utf8_lossy(&credential.public_key);
        let expected = sign(&key, &pending.challenge);
        if inner["signature"] != expected.as_str() {
            return Err(VerifierError::Rejected("bad signature".into()));
        }
        Ok(inner["counter"].as_u64().unwrap_or(0) as u32)
    }
}

/// Software authenticator producing responses the fake verifier understands
#[derive(Debug, Clone)]
pub struct SoftAuthenticator {
    pub credential_id: String,
    key: String,
    pub origin: String,
    pub counter: u32,
    pub user_verified: bool,
}

impl SoftAuthenticator {
    pub fn new() -> Self {
        Self {
            credential_id: BASE64_URL_SAFE_NO_PAD.encode(Uuid::new_v4().as_bytes()),
            key: Uuid::new_v4().to_string(),
            origin: ORIGIN.to_string(),
            counter: 0,
            user_verified: true,
        }
    }

    /// Attestation answering `challenge`
    pub fn attest(&self, challenge: &str, transports: Value) -> Value {
        json!({
            "id": self.credential_id,
            "rawId": self.credential_id,
            "type": "public-key",
            "response": {
                "clientDataJSON": client_data("webauthn.create", challenge, &self.origin),
                "publicKey": self.key,
                "counter": self.counter,
                "userVerified": self.user_verified,
                "transports": transports
            }
        })
    }

    /// Assertion answering `challenge`, advancing the counter first
    pub fn assert(&mut self, challenge: &str) -> Value {
        self.counter += 1;
        self.assert_with_counter(challenge, self.counter)
    }

    /// Assertion answering `challenge` with an explicit counter
    pub fn assert_with_counter(&self, challenge: &str, counter: u32) -> Value {
        self.assertion_for(&self.credential_id, challenge, counter)
    }

    /// Assertion signed with this authenticator's key but naming `credential_id`
    pub fn assertion_for(&self, credential_id: &str, challenge: &str, counter: u32) -> Value {
        json!({
            "id": credential_id,
            "rawId": credential_id,
            "type": "public-key",
            "response": {
                "clientDataJSON": client_data("webauthn.get", challenge, &self.origin),
                "signature": sign(&self.key, challenge),
                "counter": counter,
                "userVerified": self.user_verified
            }
        })
    }
}

/// Fake verifier whose next authentication check errors out as if the
/// verifier were unreachable
pub struct FlakyVerifier {
    inner: FakeVerifier,
    fail_next: AtomicBool,
}

impl FlakyVerifier {
    pub fn new(rp: &RelyingParty) -> Self {
        Self {
            inner: FakeVerifier::new(rp),
            fail_next: AtomicBool::new(false),
        }
    }

    pub fn fail_next_authentication(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

impl AssertionVerifier for FlakyVerifier {
    fn issue_registration(&self, user: &User) -> Result<PendingCeremony, VerifierError> {
        self.inner.issue_registration(user)
    }

    fn verify_registration(
        &self,
        response: &Value,
        pending: &PendingCeremony,
    ) -> Result<VerifiedCredential, VerifierError> {
        self.inner.verify_registration(response, pending)
    }

    fn issue_authentication(&self) -> Result<PendingCeremony, VerifierError> {
        self.inner.issue_authentication()
    }

    fn verify_authentication(
        &self,
        response: &Value,
        pending: &PendingCeremony,
        credential: &Credential,
    ) -> Result<u32, VerifierError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(VerifierError::Unavailable("verifier offline".into()));
        }
        self.inner.verify_authentication(response, pending, credential)
    }
}
