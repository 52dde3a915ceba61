//! # Passkey Relying Party
//!
//! A WebAuthn/Passkey relying-party backend: users register a passkey with a
//! username and log in with it, no passwords involved.
//!
//! ## Key Concepts
//! - **WebAuthn**: Web Authentication API for passwordless authentication
//! - **Passkeys**: discoverable WebAuthn credentials, synced or device-bound
//! - **Ceremony**: one Start/Finish round trip, either registration or login
//!
//! The binary in `main.rs` wires configuration, SQLite and the session layer
//! around [`router`]; integration tests build the same router over in-memory
//! stores.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod state;
pub mod webauthn;

use crate::handlers::auth::{
    login_finish, login_start, logout, register_finish, register_start, session_info,
};
use crate::handlers::health::health_check;
use crate::handlers::users::get_current_user;
use crate::state::AppState;
use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the application router
///
/// Handlers read and write the client's session, so the caller must wrap the
/// result in a `tower_sessions::SessionManagerLayer`.
pub fn router(state: AppState) -> Router {
    // Routes that need a logged-in session
    let protected_routes = Router::new()
        .route("/api/users/me", get(get_current_user))
        .layer(axum_middleware::from_fn(middleware::auth::require_auth));

    Router::new()
        .route("/health", get(health_check))
        // Registration flow (creating a new passkey)
        .route("/api/passkey/registerStart", post(register_start))
        .route("/api/passkey/registerFinish", post(register_finish))
        // Authentication flow (logging in with a passkey)
        .route("/api/passkey/loginStart", post(login_start))
        .route("/api/passkey/loginFinish", post(login_finish))
        // Session management
        .route("/api/passkey/logout", post(logout))
        .route("/api/passkey/session", get(session_info))
        .merge(protected_routes)
        .layer(cors_layer(&state))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS for exactly the configured origins, with cookies allowed
fn cors_layer(state: &AppState) -> CorsLayer {
    let origins: Vec<HeaderValue> = state
        .engine
        .relying_party()
        .origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(&origin.origin().ascii_serialization()).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true)
}
