//! # Error Handling
//!
//! Every failure a ceremony can produce is one variant of [`AppError`], and each
//! variant maps to exactly one HTTP status. Handlers return `AppResult<T>` and
//! axum turns the error into a JSON body of the form
//! `{ "error": "...", "code": "..." }`.
//!
//! ## Layers
//! - Store failures arrive as [`StoreError`](crate::db::StoreError)
//! - Verifier failures arrive as [`VerifierError`](crate::webauthn::verifier::VerifierError)
//! - Session transport failures arrive as `tower_sessions::session::Error`
//!
//! Typed protocol outcomes (duplicate user, counter regression, rejected
//! assertion) pass through unchanged. Anything else is logged here and
//! surfaced to the client as a generic `Internal` error.

use crate::db::StoreError;
use crate::webauthn::verifier::VerifierError;
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application-wide error type
///
/// The `#[error(...)]` messages double as the user-facing text for every
/// variant except `Internal`, whose detail is only ever written to the log.
#[derive(Error, Debug)]
pub enum AppError {
    /// A required request field is missing or malformed (400)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// No user with that username or id (404)
    #[error("User '{0}' not found")]
    UserNotFound(String),

    /// The assertion names a credential this site never registered (404)
    #[error("Credential not registered with this site")]
    CredentialNotRegistered,

    /// Registration start for a username that is already taken (409)
    #[error("User '{0}' already exists")]
    AlreadyExists(String),

    /// Signature, challenge, origin, RP ID or user-verification check failed (401)
    #[error("Verification failed")]
    VerificationFailed,

    /// The authenticator reported a signature counter that does not advance
    /// past the stored one. Possible cloned authenticator (401)
    #[error("Signature counter regression detected")]
    CounterRegression,

    /// Finish called with no matching ceremony bound to the session (400)
    #[error("No ceremony in progress for this session")]
    MissingSession,

    /// Finish called after the challenge's 60 second window closed (401)
    #[error("Challenge expired")]
    SessionExpired,

    /// Protected route hit without a logged-in session (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Store, session or verifier unavailable. The payload is for logs only (500)
    #[error("Internal server error")]
    Internal(String),
}

impl AppError {
    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::MissingSession => StatusCode::BAD_REQUEST,
            Self::UserNotFound(_) | Self::CredentialNotRegistered => StatusCode::NOT_FOUND,
            Self::AlreadyExists(_) => StatusCode::CONFLICT,
            Self::VerificationFailed
            | Self::CounterRegression
            | Self::SessionExpired
            | Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code so clients can branch without parsing text
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::UserNotFound(_) => "USER_NOT_FOUND",
            Self::CredentialNotRegistered => "CREDENTIAL_NOT_REGISTERED",
            Self::AlreadyExists(_) => "ALREADY_EXISTS",
            Self::VerificationFailed => "VERIFICATION_FAILED",
            Self::CounterRegression => "COUNTER_REGRESSION",
            Self::MissingSession => "MISSING_SESSION",
            Self::SessionExpired => "SESSION_EXPIRED",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(what) => AppError::AlreadyExists(what),
            StoreError::CounterRegression { stored, reported } => {
                tracing::warn!(stored, reported, "Rejected non-increasing signature counter");
                AppError::CounterRegression
            }
            StoreError::NotFound(what) => {
                tracing::warn!("Record vanished mid-ceremony: {}", what);
                AppError::CredentialNotRegistered
            }
            other => {
                tracing::error!("Store error: {:?}", other);
                AppError::Internal(other.to_string())
            }
        }
    }
}

impl From<VerifierError> for AppError {
    fn from(err: VerifierError) -> Self {
        match err {
            VerifierError::Rejected(reason) => {
                tracing::warn!("Assertion verifier rejected response: {}", reason);
                AppError::VerificationFailed
            }
            VerifierError::Malformed(reason) => AppError::BadRequest(reason),
            other => {
                tracing::error!("Assertion verifier error: {:?}", other);
                AppError::Internal(other.to_string())
            }
        }
    }
}

impl From<tower_sessions::session::Error> for AppError {
    fn from(err: tower_sessions::session::Error) -> Self {
        tracing::error!("Session error: {:?}", err);
        AppError::Internal(format!("Session error: {}", err))
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

/// Convert AppError into an HTTP response
///
/// Internal details never reach the client; every other variant is safe to
/// show as-is.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if let AppError::Internal(detail) = &self {
            tracing::error!("Internal error: {}", detail);
        }

        let body = Json(json!({
            "error": self.to_string(),
            "code": self.code(),
        }));

        (status, body).into_response()
    }
}

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;
