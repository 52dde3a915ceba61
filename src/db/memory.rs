//! In-memory user and credential storage
//!
//! Thread-safe maps with the same contract as the SQLite stores. Data is lost
//! on restart, so this backend is meant for development and tests.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::models::{Credential, NewCredential, User};
use super::{counter_advances, CredentialStore, StoreError, UserStore};

/// Users and credentials held in sharded concurrent maps
#[derive(Default)]
pub struct MemoryStore {
    /// username -> user
    users: DashMap<String, User>,
    /// user id -> username
    user_ids: DashMap<String, String>,
    /// credential id -> credential
    credentials: DashMap<String, Credential>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn credential_count(&self) -> usize {
        self.credentials.len()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users.get(username).map(|entry| entry.value().clone()))
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        let Some(username) = self.user_ids.get(id).map(|e| e.value().clone()) else {
            return Ok(None);
        };
        self.find_by_username(&username).await
    }

    async fn create(&self, username: &str) -> Result<User, StoreError> {
        // The entry guard holds the shard lock, so check-and-insert is atomic
        match self.users.entry(username.to_string()) {
            Entry::Occupied(_) => Err(StoreError::Duplicate(username.to_string())),
            Entry::Vacant(slot) => {
                let user = User::new(username.to_string());
                self.user_ids.insert(user.id.clone(), user.username.clone());
                slot.insert(user.clone());
                Ok(user)
            }
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn create(&self, credential: NewCredential) -> Result<Credential, StoreError> {
        match self.credentials.entry(credential.credential_id.clone()) {
            Entry::Occupied(_) => Err(StoreError::Duplicate(format!(
                "credential {}",
                credential.credential_id
            ))),
            Entry::Vacant(slot) => Ok(slot.insert(credential.into_credential()).value().clone()),
        }
    }

    async fn find_by_credential_id(
        &self,
        credential_id: &str,
    ) -> Result<Option<Credential>, StoreError> {
        Ok(self
            .credentials
            .get(credential_id)
            .map(|entry| entry.value().clone()))
    }

    async fn update_counter(
        &self,
        credential_id: &str,
        new_counter: u32,
    ) -> Result<(), StoreError> {
        let mut entry = self
            .credentials
            .get_mut(credential_id)
            .ok_or_else(|| StoreError::NotFound(format!("credential {}", credential_id)))?;

        let stored = entry.sign_count();
        if !counter_advances(stored, new_counter) {
            return Err(StoreError::CounterRegression {
                stored,
                reported: new_counter,
            });
        }

        entry.counter = i64::from(new_counter);
        entry.last_used_at = Some(chrono::Utc::now().to_rfc3339());
        Ok(())
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("users", &self.users.len())
            .field("credentials", &self.credentials.len())
            .finish()
    }
}
