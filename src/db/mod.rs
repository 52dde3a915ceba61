//! # Database Module
//!
//! The User Store and Credential Store contracts, with two implementations each:
//! - `users` / `credentials`: SQLite via sqlx (production)
//! - `memory`: lock-sharded in-process maps (development and tests)
//!
//! Both stores need at most single-record atomicity per operation. The one
//! operation where that matters is [`CredentialStore::update_counter`], which
//! must be a conditional write so racing logins can never move a counter
//! backwards.

pub mod credentials;
pub mod memory;
pub mod models;
pub mod users;

pub use credentials::SqliteCredentialStore;
pub use memory::MemoryStore;
pub use models::{Credential, NewCredential, Transports, User};
pub use users::SqliteUserStore;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Unique constraint hit (username or credential id)
    #[error("Already exists: {0}")]
    Duplicate(String),

    /// Record disappeared between lookup and write
    #[error("Not found: {0}")]
    NotFound(String),

    /// Conditional counter update refused
    #[error("Counter regression: stored {stored}, reported {reported}")]
    CounterRegression { stored: u32, reported: u32 },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// User Store contract
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError>;

    /// Create a user. Fails with [`StoreError::Duplicate`] if the username is
    /// taken, even when two creates race.
    async fn create(&self, username: &str) -> Result<User, StoreError>;
}

/// Credential Store contract
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Persist a new credential. Credential ids are globally unique.
    async fn create(&self, credential: NewCredential) -> Result<Credential, StoreError>;

    async fn find_by_credential_id(
        &self,
        credential_id: &str,
    ) -> Result<Option<Credential>, StoreError>;

    /// Store `new_counter` only if it advances past the stored value.
    ///
    /// Zero over zero is accepted: authenticators without a counter always
    /// report 0. Anything else that does not increase fails with
    /// [`StoreError::CounterRegression`] and leaves the row untouched.
    async fn update_counter(&self, credential_id: &str, new_counter: u32)
        -> Result<(), StoreError>;
}

/// The single rule both backends apply inside their atomic section
pub(crate) fn counter_advances(stored: u32, reported: u32) -> bool {
    reported > stored || (reported == 0 && stored == 0)
}

/// Open the SQLite pool and bring the schema up to date
///
/// In-memory databases (`sqlite::memory:`) are private to one connection, so
/// the pool is pinned to a single connection for them.
pub async fn connect(database_url: &str) -> Result<SqlitePool, StoreError> {
    let options = SqliteConnectOptions::from_str(database_url)?.foreign_keys(true);
    let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}
