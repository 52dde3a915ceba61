//! # Configuration Management
//!
//! Configuration comes from the environment (12-factor style), with a `.env`
//! file loaded first when present.
//!
//! ## Environment Variables
//! - `HOST`: Server bind address (default: 127.0.0.1)
//! - `PORT`: Server port (default: 8080)
//! - `DATABASE_URL`: SQLite connection string (default: sqlite:passkey.db?mode=rwc)
//! - `RP_ID`: WebAuthn Relying Party ID, a bare hostname (default: localhost)
//! - `RP_NAME`: Human-readable name for the service (default: Passkey Tutorial)
//! - `RP_ORIGINS`: Comma-separated allowed origins
//!   (default: `http://{RP_ID}:8080,http://127.0.0.1:8080`)
//! - `SESSION_SECRET`: Cookie signing secret, at least 64 bytes. When unset a
//!   random key is generated at startup and sessions do not survive restarts.

use anyhow::{bail, Context, Result};
use std::env;
use std::fmt;
use url::Url;

/// Minimum secret length accepted for cookie signing keys
pub const MIN_SESSION_SECRET_LEN: usize = 64;

/// Identity of this relying party as seen by authenticators
///
/// ## WebAuthn Terminology
/// - **RP ID**: the domain credentials are scoped to ("example.com", "localhost")
/// - **Origin**: scheme + host + port the browser reports ("https://example.com")
///
/// A client response is only accepted when its origin is one of `origins`
/// and its authenticator data is bound to `id`.
#[derive(Debug, Clone)]
pub struct RelyingParty {
    pub id: String,
    pub name: String,
    pub origins: Vec<Url>,
}

impl RelyingParty {
    pub fn new(id: impl Into<String>, name: impl Into<String>, origins: Vec<Url>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            origins,
        }
    }

    /// Cookies only get the `Secure` attribute when every origin is https;
    /// local development over plain http would otherwise never see them.
    pub fn requires_secure_cookies(&self) -> bool {
        !self.origins.is_empty() && self.origins.iter().all(|o| o.scheme() == "https")
    }
}

/// Application configuration
#[derive(Clone)]
pub struct Config {
    /// Server host/IP address to bind to
    pub host: String,

    /// Server port number
    pub port: u16,

    /// SQLite database connection URL
    /// The "mode=rwc" suffix means: read, write, create if not exists
    pub database_url: String,

    /// Relying party identity and origin allow-list
    pub rp: RelyingParty,

    /// Cookie signing secret, validated to be long enough at load time
    pub session_secret: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// ## Example .env file
    /// ```text
    /// HOST=127.0.0.1
    /// PORT=8080
    /// DATABASE_URL=sqlite:passkey.db?mode=rwc
    /// RP_ID=localhost
    /// RP_NAME=Passkey Tutorial
    /// RP_ORIGINS=http://localhost:8080,http://127.0.0.1:8080
    /// ```
    pub fn from_env() -> Result<Self> {
        // dotenvy doesn't error if the file is missing
        dotenvy::dotenv().ok();

        let rp_id = env::var("RP_ID").unwrap_or_else(|_| "localhost".to_string());
        let origins = match env::var("RP_ORIGINS") {
            Ok(raw) if !raw.trim().is_empty() => parse_origins(&raw)?,
            _ => default_origins(&rp_id)?,
        };

        let session_secret = env::var("SESSION_SECRET").ok().filter(|s| !s.is_empty());
        if let Some(secret) = &session_secret {
            if secret.len() < MIN_SESSION_SECRET_LEN {
                bail!(
                    "SESSION_SECRET must be at least {} bytes (got {})",
                    MIN_SESSION_SECRET_LEN,
                    secret.len()
                );
            }
        }

        Ok(Config {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a number between 0 and 65535")?,
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:passkey.db?mode=rwc".to_string()),
            rp: RelyingParty::new(
                rp_id,
                env::var("RP_NAME").unwrap_or_else(|_| "Passkey Tutorial".to_string()),
                origins,
            ),
            session_secret,
        })
    }

    /// Socket address for `tokio::net::TcpListener::bind()`, e.g. "127.0.0.1:8080"
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// The secret must never end up in the startup log line.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database_url", &self.database_url)
            .field("rp", &self.rp)
            .field(
                "session_secret",
                &self.session_secret.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

fn default_origins(rp_id: &str) -> Result<Vec<Url>> {
    parse_origins(&format!("http://{}:8080,http://127.0.0.1:8080", rp_id))
}

/// Parse a comma-separated origin list. Blank entries are skipped; anything
/// that is not an absolute http(s) URL is a configuration error.
pub fn parse_origins(raw: &str) -> Result<Vec<Url>> {
    let mut origins = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let url = Url::parse(entry).with_context(|| format!("Invalid origin URL: {}", entry))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            bail!("Origin must use http or https: {}", entry);
        }
        origins.push(url);
    }
    if origins.is_empty() {
        bail!("At least one allowed origin is required");
    }
    Ok(origins)
}
