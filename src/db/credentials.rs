//! # Credential Database Operations
//!
//! Credentials hold the public material used to verify assertions. Only
//! public keys are stored; private keys never leave the user's device.

use crate::db::models::{Credential, NewCredential};
use crate::db::{CredentialStore, StoreError};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

#[derive(Debug, Clone)]
pub struct SqliteCredentialStore {
    pool: SqlitePool,
}

impl SqliteCredentialStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    /// Save a credential after a successful registration-finish
    async fn create(&self, credential: NewCredential) -> Result<Credential, StoreError> {
        let credential = credential.into_credential();

        sqlx::query(
            "INSERT INTO credentials
             (credential_id, user_id, public_key, counter, transports, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&credential.credential_id)
        .bind(&credential.user_id)
        .bind(&credential.public_key) // BLOB
        .bind(credential.counter)
        .bind(&credential.transports)
        .bind(&credential.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                StoreError::Duplicate(format!("credential {}", credential.credential_id))
            }
            _ => StoreError::Database(e),
        })?;

        Ok(credential)
    }

    async fn find_by_credential_id(
        &self,
        credential_id: &str,
    ) -> Result<Option<Credential>, StoreError> {
        let credential = sqlx::query_as::<_, Credential>(
            "SELECT * FROM credentials WHERE credential_id = ?",
        )
        .bind(credential_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(credential)
    }

    /// Update the signature counter after a successful authentication
    ///
    /// ## Security: Signature Counter
    /// The comparison lives in the WHERE clause, so the check and the write
    /// are one statement and two racing logins cannot interleave between them.
    /// Zero rows affected means either the credential is gone or the counter
    /// did not advance; a follow-up read tells the two apart.
    async fn update_counter(
        &self,
        credential_id: &str,
        new_counter: u32,
    ) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        let reported = i64::from(new_counter);

        let result = sqlx::query(
            "UPDATE credentials
             SET counter = ?, last_used_at = ?
             WHERE credential_id = ?
               AND (? > counter OR (? = 0 AND counter = 0))",
        )
        .bind(reported)
        .bind(now)
        .bind(credential_id)
        .bind(reported)
        .bind(reported)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        match self.find_by_credential_id(credential_id).await? {
            Some(current) => Err(StoreError::CounterRegression {
                stored: current.sign_count(),
                reported: new_counter,
            }),
            None => Err(StoreError::NotFound(format!("credential {}", credential_id))),
        }
    }
}
