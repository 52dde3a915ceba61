//! # Health Check Handler
//!
//! Simple endpoint to check if the server is running.

use axum::Json;
use serde_json::{json, Value};

/// Health check endpoint
///
/// ## Route
/// GET /health
///
/// ## Response
/// ```json
/// {
///   "status": "healthy",
///   "service": "passkey-rp"
/// }
/// ```
///
/// Never fails, so it returns `Json<Value>` rather than `AppResult`.
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": env!("CARGO_PKG_NAME")
    }))
}
