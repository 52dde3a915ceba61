//! # User Handlers

use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::webauthn::session::USER_ID_KEY;
use axum::{extract::State, Json};
use serde_json::{json, Value};
use tower_sessions::Session;

/// Get current authenticated user's profile
///
/// ## Route
/// GET /api/users/me
///
/// ## Authentication
/// Protected by `require_auth`, but the session is read again here since the
/// middleware passes nothing along.
///
/// ## Response
/// ```json
/// {
///   "id": "550e8400-e29b-41d4-a716-446655440000",
///   "username": "alice",
///   "created_at": "2024-01-15T10:30:00Z"
/// }
/// ```
pub async fn get_current_user(
    State(state): State<AppState>,
    session: Session,
) -> AppResult<Json<Value>> {
    let user_id: String = session
        .get(USER_ID_KEY)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Not authenticated".to_string()))?;

    let user = state
        .users
        .find_by_id(&user_id)
        .await?
        .ok_or_else(|| AppError::UserNotFound(user_id.clone()))?;

    // Never credential ids or key material
    Ok(Json(json!({
        "id": user.id,
        "username": user.username,
        "created_at": user.created_at
    })))
}
