use crate::error::AppResult;
use crate::state::AppState;
use crate::webauthn::session::{renew_deadline, USER_ID_KEY};
use crate::webauthn::types::*;
use crate::webauthn::ChallengeSlot;
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde_json::{json, Value};
use tower_sessions::Session;

// Registration endpoints

pub async fn register_start(
    State(state): State<AppState>,
    session: Session,
    payload: Result<Json<UsernameRequest>, JsonRejection>,
) -> AppResult<Json<RegistrationOptions>> {
    let Json(req) = payload?;
    let (options, challenge) = state.engine.start_registration(req.username()?).await?;
    ChallengeSlot::new(&session).bind(&challenge).await?;

    Ok(Json(options))
}

pub async fn register_finish(
    State(state): State<AppState>,
    session: Session,
    payload: Result<Json<Value>, JsonRejection>,
) -> AppResult<Json<Value>> {
    // Empty the slot (and persist that) before anything can fail
    let pending = ChallengeSlot::new(&session).take().await?;

    let Json(body) = payload?;
    let response = RegistrationResponse::from_client(body)?;
    state.engine.finish_registration(pending, response).await?;

    Ok(Json(json!({ "verified": true })))
}

// Authentication endpoints

pub async fn login_start(
    State(state): State<AppState>,
    session: Session,
    payload: Result<Json<UsernameRequest>, JsonRejection>,
) -> AppResult<Json<AuthenticationOptions>> {
    let Json(req) = payload?;
    let (options, challenge) = state.engine.start_authentication(req.username()?).await?;
    ChallengeSlot::new(&session).bind(&challenge).await?;

    Ok(Json(options))
}

pub async fn login_finish(
    State(state): State<AppState>,
    session: Session,
    payload: Result<Json<Value>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let pending = ChallengeSlot::new(&session).take().await?;

    let Json(body) = payload?;
    let response = AssertionResponse::from_client(body)?;
    let user = state.engine.finish_authentication(pending, response).await?;

    // New id and a fresh 24 h lifetime on privilege change
    session.cycle_id().await?;
    renew_deadline(&session).await?;
    session.insert(USER_ID_KEY, &user.id).await?;

    Ok(Json(json!({
        "verified": true,
        "user_id": user.id,
        "username": user.username
    })))
}

pub async fn logout(session: Session) -> AppResult<Json<Value>> {
    session.flush().await?;

    Ok(Json(json!({
        "success": true,
        "message": "Logged out successfully"
    })))
}

pub async fn session_info(session: Session) -> AppResult<Json<Value>> {
    let user_id: Option<String> = session.get(USER_ID_KEY).await?;

    match user_id {
        Some(id) => Ok(Json(json!({
            "authenticated": true,
            "user_id": id
        }))),
        None => Ok(Json(json!({
            "authenticated": false
        }))),
    }
}
