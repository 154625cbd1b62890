use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use foodlink_types::api::{Claims, KudosRequest, SubmitRatingRequest};
use foodlink_types::events::{ChangeKind, Table};
use foodlink_types::models::{Rating, TaskStatus};

use crate::error::{ApiError, required};
use crate::notifications::notify;
use crate::state::AppState;

pub async fn submit_rating(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(task_id): Path<Uuid>,
    Json(req): Json<SubmitRatingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !(1..=5).contains(&req.rating) {
        return Err(ApiError::bad_request("rating must be between 1 and 5"));
    }
    if req.rated_user_id == claims.sub {
        return Err(ApiError::bad_request("cannot rate yourself"));
    }
    let category = required("category", &req.category)?;

    let task = state
        .run_db(move |db| db.get_task(task_id))
        .await?
        .ok_or(ApiError::NotFound)?;
    if !task.is_participant(claims.sub) {
        return Err(ApiError::Forbidden);
    }
    if !task.is_participant(req.rated_user_id) {
        return Err(ApiError::bad_request("rated user is not part of this delivery"));
    }
    if task.status != TaskStatus::Completed {
        return Err(ApiError::conflict("ratings open once the delivery is complete"));
    }

    let rating = Rating {
        id: Uuid::new_v4(),
        task_id,
        rater_id: claims.sub,
        rated_user_id: req.rated_user_id,
        rating: req.rating,
        comment: req.comment.filter(|c| !c.trim().is_empty()),
        category,
        created_at: Utc::now(),
    };

    let row = rating.clone();
    let profile = state
        .run_db(move |db| {
            db.insert_rating(&row)?;
            db.get_profile(row.rated_user_id)
        })
        .await
        .map_err(|e| match e {
            ApiError::Conflict(_) => ApiError::conflict("you already rated this user for this delivery"),
            other => other,
        })?;

    state.publish(Table::Ratings, ChangeKind::Insert, &rating);
    if let Some(profile) = &profile {
        state.publish(Table::Profiles, ChangeKind::Update, profile);
    }

    Ok((StatusCode::CREATED, Json(rating)))
}

pub async fn list_ratings(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let ratings = state.run_db(move |db| db.list_ratings_for(user_id)).await?;
    Ok(Json(ratings))
}

/// Kudos are a thank-you note delivered as a notification.
pub async fn send_kudos(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(task_id): Path<Uuid>,
    Json(req): Json<KudosRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let message = required("message", &req.message)?;
    if req.recipient_id == claims.sub {
        return Err(ApiError::bad_request("cannot send kudos to yourself"));
    }

    let sender_id = claims.sub;
    let (task, sender) = state
        .run_db(move |db| Ok((db.get_task(task_id)?, db.get_profile(sender_id)?)))
        .await?;
    let task = task.ok_or(ApiError::NotFound)?;
    if !task.is_participant(claims.sub) {
        return Err(ApiError::Forbidden);
    }
    if !task.is_participant(req.recipient_id) {
        return Err(ApiError::bad_request("recipient is not part of this delivery"));
    }

    let sender_name = sender.map(|p| p.full_name).unwrap_or_else(|| "Someone".into());
    notify(
        &state,
        req.recipient_id,
        "kudos",
        &format!("Kudos from {}", sender_name),
        format!("\"{}\"", message),
        Some(task_id),
    )
    .await;

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "ok": true }))))
}
