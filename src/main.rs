//! # Passkey Relying-Party Server
//!
//! Entry point: loads configuration, opens the database, and serves the
//! ceremony API behind a signed session cookie.

use passkey_rp::config::Config;
use passkey_rp::state::AppState;
use passkey_rp::{db, router};
use tower_sessions::cookie::Key;
use tower_sessions::{ExpiredDeletion, SessionManagerLayer};
use tower_sessions_sqlx_store::SqliteStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main application entry point
///
/// 1. Sets up logging
/// 2. Loads configuration from environment variables
/// 3. Connects to SQLite and runs migrations
/// 4. Starts a background task that deletes expired sessions
/// 5. Configures signed, HTTP-only session cookies
/// 6. Starts the HTTP server
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Default: info for dependencies, debug for this crate. RUST_LOG overrides.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,passkey_rp=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tracing::info!("Configuration loaded: {:?}", config);

    let pool = db::connect(&config.database_url).await?;
    let app_state = AppState::new(&config, pool.clone())?;
    tracing::info!("Application state initialized");

    // Session rows (and the challenges inside them) live in the same database
    let session_store = SqliteStore::new(pool);
    session_store.migrate().await?;

    // Challenges expire after 60 s on their own; this only reclaims rows
    let deletion_store = session_store.clone();
    tokio::spawn(async move {
        if let Err(e) = deletion_store
            .continuously_delete_expired(tokio::time::Duration::from_secs(60))
            .await
        {
            tracing::error!("Session cleanup task stopped: {:?}", e);
        }
    });

    let key = match &config.session_secret {
        Some(secret) => Key::try_from(secret.as_bytes())?,
        None => {
            tracing::warn!("SESSION_SECRET not set, sessions will not survive a restart");
            Key::generate()
        }
    };

    // Expiry is absolute and set per session (see webauthn::session)
    let session_layer = SessionManagerLayer::new(session_store)
        .with_http_only(true)
        .with_secure(config.rp.requires_secure_cookies())
        .with_signed(key);

    let app = router(app_state).layer(session_layer);

    let bind_addr = config.bind_address();
    tracing::info!("Starting server on {}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
