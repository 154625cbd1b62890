use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use foodlink_types::api::{Claims, LeaderboardResponse, UpdateProfileRequest};
use foodlink_types::events::{ChangeKind, Table};

use crate::error::{ApiError, required};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    10
}

pub async fn get_profile(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = state
        .run_db(move |db| db.get_profile(id))
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(profile))
}

pub async fn update_me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(mut req): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(name) = &req.full_name {
        req.full_name = Some(required("full_name", name)?);
    }

    let user_id = claims.sub;
    let profile = state
        .run_db(move |db| db.update_profile(user_id, &req))
        .await?
        .ok_or(ApiError::NotFound)?;

    state.publish(Table::Profiles, ChangeKind::Update, &profile);
    Ok(Json(profile))
}

pub async fn leaderboard(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = query.limit.clamp(1, 50);
    let user_id = claims.sub;
    let (top, my_rank) = state
        .run_db(move |db| Ok((db.leaderboard(limit)?, db.volunteer_rank(user_id)?)))
        .await?;
    Ok(Json(LeaderboardResponse { top, my_rank }))
}
