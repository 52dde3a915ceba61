//! # Database Models
//!
//! Rows of the `users` and `credentials` tables plus the canonical transport
//! hint set that travels with a credential.
//!
//! ## Why Strings for ids and dates?
//! SQLite has no native UUID or timestamp type. Ids are stored as hyphenated
//! UUID text and timestamps as RFC3339 text, which also serialize to JSON
//! without any custom glue.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// User account information
///
/// Created on the first registration-start for a username and never mutated
/// afterwards. Each user may own several credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// Opaque, stable identifier (UUID v4 text)
    pub id: String,

    /// Unique username, used to start a login
    pub username: String,

    /// When the account was created (RFC3339 timestamp)
    pub created_at: String,
}

impl User {
    /// New user with a fresh random id and the current time
    pub fn new(username: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            username,
            created_at: Utc::now().to_rfc3339(),
        }
    }

    /// The 16 raw id bytes, which is what authenticators store as the user handle
    pub fn handle(&self) -> Option<[u8; 16]> {
        Uuid::parse_str(&self.id).ok().map(|id| *id.as_bytes())
    }
}

/// Passkey credential stored for a user
///
/// ## What is stored?
/// - **credential_id**: base64url id chosen by the authenticator, globally unique
/// - **public_key**: the verifier's serialized credential material
/// - **counter**: last signature counter accepted for this credential
/// - **transports**: comma-joined hint tokens ("internal,usb")
///
/// Lookups always go through `credential_id` alone, never (user, id), so that
/// discoverable credentials resolve without knowing the user up front.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Credential {
    pub credential_id: String,

    /// Owner of this credential. Immutable once written.
    pub user_id: String,

    /// Stored as BLOB. Only public material, private keys never leave the device.
    pub public_key: Vec<u8>,

    /// SQLite has no u32, so the column is an INTEGER read back as i64
    pub counter: i64,

    pub transports: String,

    pub created_at: String,

    /// Stamped on every accepted counter update
    pub last_used_at: Option<String>,
}

impl Credential {
    /// Signature counter as the authenticator reports it
    pub fn sign_count(&self) -> u32 {
        u32::try_from(self.counter).unwrap_or(u32::MAX)
    }
}

/// Everything needed to persist a freshly registered credential
#[derive(Debug, Clone)]
pub struct NewCredential {
    pub credential_id: String,
    pub user_id: String,
    pub public_key: Vec<u8>,
    pub counter: u32,
    pub transports: Transports,
}

impl NewCredential {
    pub fn into_credential(self) -> Credential {
        Credential {
            credential_id: self.credential_id,
            user_id: self.user_id,
            public_key: self.public_key,
            counter: i64::from(self.counter),
            transports: self.transports.to_column(),
            created_at: Utc::now().to_rfc3339(),
            last_used_at: None,
        }
    }
}

/// Ordered, de-duplicated set of transport hints ("ble", "internal", "nfc", "usb", ...)
///
/// Tokens are lowercased and trimmed; empty tokens are dropped. Unknown tokens
/// are kept as-is since new transports appear faster than specs are revised.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transports(BTreeSet<String>);

impl Transports {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            tokens
                .into_iter()
                .map(|t| t.as_ref().trim().to_ascii_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
        )
    }

    /// Inverse of [`Transports::to_column`]
    pub fn from_column(raw: &str) -> Self {
        Self::from_tokens(raw.split(','))
    }

    pub fn to_column(&self) -> String {
        self.0.iter().map(String::as_str).collect::<Vec<_>>().join(",")
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}
