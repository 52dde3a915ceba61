//! # Application State
//!
//! Shared state handed to every request handler. In Axum, state is how you
//! share resources across handlers; each request gets a clone, which is cheap
//! because everything inside is behind an `Arc`.
//!
//! The stores and the verifier are trait objects, so the same router runs
//! against SQLite in production and against in-memory stores plus a fake
//! verifier in tests.

use crate::config::{Config, RelyingParty};
use crate::db::{CredentialStore, SqliteCredentialStore, SqliteUserStore, UserStore};
use crate::webauthn::{AssertionVerifier, CeremonyEngine, WebauthnVerifier};
use anyhow::Result;
use sqlx::sqlite::SqlitePool;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// The four ceremony phases
    pub engine: Arc<CeremonyEngine>,

    /// Read access for profile lookups outside a ceremony
    pub users: Arc<dyn UserStore>,
}

impl AppState {
    /// Production state: SQLite stores over `pool` and the webauthn-rs verifier
    ///
    /// # Errors
    /// Fails when the relying-party configuration is rejected by webauthn-rs
    /// (RP ID not a suffix of an origin's host, no origins, ...).
    pub fn new(config: &Config, pool: SqlitePool) -> Result<Self> {
        let verifier = WebauthnVerifier::new(&config.rp)?;
        tracing::debug!(
            "WebAuthn verifier ready for RP '{}' with {} origin(s)",
            config.rp.id,
            config.rp.origins.len()
        );

        Ok(Self::from_parts(
            config.rp.clone(),
            Arc::new(SqliteUserStore::new(pool.clone())),
            Arc::new(SqliteCredentialStore::new(pool)),
            Arc::new(verifier),
        ))
    }

    /// Assemble state from explicit collaborators
    pub fn from_parts(
        rp: RelyingParty,
        users: Arc<dyn UserStore>,
        credentials: Arc<dyn CredentialStore>,
        verifier: Arc<dyn AssertionVerifier>,
    ) -> Self {
        let engine = CeremonyEngine::new(rp, users.clone(), credentials, verifier);
        Self {
            engine: Arc::new(engine),
            users,
        }
    }
}
