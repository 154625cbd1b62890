use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use foodlink_types::api::{ChangeRoleRequest, Claims, UserSearchQuery};
use foodlink_types::events::{ChangeKind, Table};
use foodlink_types::models::Role;

use crate::error::ApiError;
use crate::middleware::require_role;
use crate::state::AppState;

pub async fn stats(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&state, claims.sub, &[Role::Admin]).await?;
    let stats = state.run_db(|db| db.stats()).await?;
    Ok(Json(stats))
}

pub async fn list_users(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<UserSearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&state, claims.sub, &[Role::Admin]).await?;
    let users = state
        .run_db(move |db| db.list_users(query.search.as_deref()))
        .await?;
    Ok(Json(users))
}

pub async fn change_role(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<ChangeRoleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&state, claims.sub, &[Role::Admin]).await?;

    let role = req.role;
    if !state.run_db(move |db| db.set_role(user_id, role)).await? {
        return Err(ApiError::NotFound);
    }

    info!("{} changed role of {} to {}", claims.sub, user_id, role);
    Ok(Json(serde_json::json!({ "user_id": user_id, "role": role })))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&state, claims.sub, &[Role::Admin]).await?;
    if user_id == claims.sub {
        return Err(ApiError::bad_request("you cannot delete your own account"));
    }

    let deleted = state
        .run_db(move |db| db.delete_user(user_id))
        .await
        .map_err(|e| match e {
            ApiError::Conflict(_) => {
                ApiError::conflict("user still owns donations, tasks, messages or ratings")
            }
            other => other,
        })?;
    let deleted = deleted.ok_or(ApiError::NotFound)?;

    if let Some(profile) = &deleted.profile {
        state.publish(Table::Profiles, ChangeKind::Delete, profile);
    }
    for item in &deleted.wishlist_items {
        state.publish(Table::Wishlists, ChangeKind::Delete, item);
    }
    if let Some(verification) = &deleted.verification {
        state.publish(Table::NgoVerifications, ChangeKind::Delete, verification);
    }

    info!("{} deleted user {}", claims.sub, user_id);
    Ok(StatusCode::NO_CONTENT)
}
