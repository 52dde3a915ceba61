use crate::error::AppError;
use crate::webauthn::session::USER_ID_KEY;
use axum::{extract::Request, middleware::Next, response::Response};
use tower_sessions::Session;

/// Reject the request unless a login completed in this session
pub async fn require_auth(
    session: Session,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user_id: Option<String> = session.get(USER_ID_KEY).await?;

    match user_id {
        Some(_) => Ok(next.run(request).await),
        None => Err(AppError::Unauthorized("Not authenticated".to_string())),
    }
}
