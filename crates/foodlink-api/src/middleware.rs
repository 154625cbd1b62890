use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use uuid::Uuid;

use foodlink_types::api::Claims;
use foodlink_types::models::Role;

use crate::error::ApiError;
use crate::state::AppState;

/// Extract and validate JWT from Authorization header.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Unauthorized)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(ApiError::Unauthorized)?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::Unauthorized)?;

    req.extensions_mut().insert(token_data.claims);
    Ok(next.run(req).await)
}

/// Current role of the caller, read from the store so that role changes
/// apply without a new token.
pub(crate) async fn current_role(state: &AppState, user_id: Uuid) -> Result<Role, ApiError> {
    state
        .run_db(move |db| db.get_role(user_id))
        .await?
        .ok_or(ApiError::Unauthorized)
}

/// Fails with 403 unless the caller currently holds one of `allowed`.
pub(crate) async fn require_role(state: &AppState, user_id: Uuid, allowed: &[Role]) -> Result<Role, ApiError> {
    let role = current_role(state, user_id).await?;
    if allowed.contains(&role) {
        Ok(role)
    } else {
        Err(ApiError::Forbidden)
    }
}
