//! # WebAuthn Module
//!
//! The ceremony engine: everything between "client asked to start" and
//! "credential stored / counter advanced".
//!
//! ## Submodules
//! - `engine`: the [`CeremonyEngine`] and its collaborators
//! - `registration` / `authentication`: the two ceremonies, start and finish
//! - `session`: the per-client challenge slot
//! - `verifier`: the cryptographic contract and its webauthn-rs binding
//! - `types`: request bodies, options, response normalization
//!
//! ## WebAuthn Flow Overview
//!
//! ### Registration (Creating a Passkey)
//! 1. Client posts a username → `CeremonyEngine::start_registration()`
//! 2. Server creates the user, binds a challenge to the session, returns options
//! 3. Client runs `navigator.credentials.create()` with the authenticator
//! 4. Client posts the attestation → `CeremonyEngine::finish_registration()`
//! 5. Server verifies it against the bound challenge and stores the public key
//!
//! ### Authentication (Logging In)
//! 1. Client posts a username → `CeremonyEngine::start_authentication()`
//! 2. Server binds a challenge to the session; the allow-list is empty
//! 3. Authenticator picks a discoverable credential and signs the challenge
//! 4. Client posts the assertion → `CeremonyEngine::finish_authentication()`
//! 5. Server verifies the signature with the stored key and advances the counter

pub mod authentication;
pub mod engine;
pub mod registration;
pub mod session;
pub mod types;
pub mod verifier;

pub use engine::CeremonyEngine;
pub use session::{CeremonyKind, ChallengeSession, ChallengeSlot};
pub use types::{
    AssertionResponse, AuthenticationOptions, RegistrationOptions, RegistrationResponse,
    UsernameRequest,
};
pub use verifier::{
    AssertionVerifier, PendingCeremony, VerifiedCredential, VerifierError, WebauthnVerifier,
};
