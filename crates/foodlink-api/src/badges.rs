use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use tracing::{error, info};
use uuid::Uuid;

use foodlink_types::models::BadgeCategory;

use crate::error::ApiError;
use crate::state::AppState;

pub async fn list_badges(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let badges = state.run_db(|db| db.list_badges()).await?;
    Ok(Json(badges))
}

pub async fn user_badges(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let badges = state.run_db(move |db| db.list_user_badges(user_id)).await?;
    Ok(Json(badges))
}

/// Award whatever `count` has unlocked. Runs after the counting write has
/// committed, so a failure here is logged rather than surfaced.
pub(crate) async fn award(state: &AppState, user_id: Uuid, category: BadgeCategory, count: i64) {
    match state
        .run_db(move |db| db.check_and_award(user_id, category, count))
        .await
    {
        Ok(earned) => {
            for badge in earned {
                info!("{} earned badge '{}'", user_id, badge.name);
            }
        }
        Err(e) => error!("badge check failed for {}: {}", user_id, e),
    }
}
