use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use chrono::Utc;
use tracing::error;
use uuid::Uuid;

use foodlink_types::api::{Claims, CountResponse, NotificationQuery};
use foodlink_types::events::GatewayEvent;
use foodlink_types::models::Notification;

use crate::error::ApiError;
use crate::state::AppState;

/// Store a notification and push it to the owner's live connections.
/// The triggering write is already committed, so failures are only logged.
pub(crate) async fn notify(
    state: &AppState,
    user_id: Uuid,
    kind: &str,
    title: &str,
    message: String,
    related_id: Option<Uuid>,
) {
    let notification = Notification {
        id: Uuid::new_v4(),
        user_id,
        kind: kind.to_string(),
        title: title.to_string(),
        message,
        related_id,
        is_read: false,
        created_at: Utc::now(),
    };

    let row = notification.clone();
    if let Err(e) = state.run_db(move |db| db.insert_notification(&row)).await {
        error!("failed to store {} notification for {}: {}", kind, user_id, e);
        return;
    }

    state
        .dispatcher
        .send_to_user(user_id, GatewayEvent::Notification(notification))
        .await;
}

pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<NotificationQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    let limit = query.limit.clamp(1, 200);
    let notifications = state
        .run_db(move |db| db.list_notifications(user_id, query.unread_only, limit))
        .await?;
    Ok(Json(notifications))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    if !state.run_db(move |db| db.mark_notification_read(id, user_id)).await? {
        return Err(ApiError::NotFound);
    }
    Ok(Json(serde_json::json!({ "ok": true })))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    let count = state
        .run_db(move |db| db.mark_all_notifications_read(user_id))
        .await?;
    Ok(Json(CountResponse { count }))
}
