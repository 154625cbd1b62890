use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use foodlink_types::api::{ChatMessageView, Claims, CountResponse, SendMessageRequest};
use foodlink_types::events::{ChangeKind, Table};
use foodlink_types::models::{ChatMessage, VolunteerTask};

use crate::error::{ApiError, required};
use crate::state::AppState;

const MAX_MESSAGE_CHARS: usize = 2000;

/// The task, provided the caller takes part in it.
async fn participant_task(state: &AppState, task_id: Uuid, user_id: Uuid) -> Result<VolunteerTask, ApiError> {
    let task = state
        .run_db(move |db| db.get_task(task_id))
        .await?
        .ok_or(ApiError::NotFound)?;
    if !task.is_participant(user_id) {
        return Err(ApiError::Forbidden);
    }
    Ok(task)
}

pub async fn list_messages(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(task_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    participant_task(&state, task_id, claims.sub).await?;
    let messages = state.run_db(move |db| db.list_chat_messages(task_id)).await?;
    Ok(Json(messages))
}

pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(task_id): Path<Uuid>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let task = participant_task(&state, task_id, claims.sub).await?;

    let text = required("message", &req.message)?;
    if text.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ApiError::bad_request(format!(
            "message must be at most {} characters",
            MAX_MESSAGE_CHARS
        )));
    }
    if req.receiver_id == claims.sub {
        return Err(ApiError::bad_request("cannot message yourself"));
    }
    if !task.is_participant(req.receiver_id) {
        return Err(ApiError::bad_request("receiver is not part of this delivery"));
    }

    let message = ChatMessage {
        id: Uuid::new_v4(),
        task_id,
        sender_id: claims.sub,
        receiver_id: req.receiver_id,
        message: text,
        is_read: false,
        created_at: Utc::now(),
    };

    let row = message.clone();
    let sender = state
        .run_db(move |db| {
            db.insert_chat_message(&row)?;
            db.get_profile(row.sender_id)
        })
        .await?;

    state.publish(Table::ChatMessages, ChangeKind::Insert, &message);

    Ok((
        StatusCode::CREATED,
        Json(ChatMessageView {
            message,
            sender_name: sender.map(|p| p.full_name).unwrap_or_default(),
        }),
    ))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(task_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    participant_task(&state, task_id, claims.sub).await?;
    let receiver_id = claims.sub;
    let read = state
        .run_db(move |db| db.mark_chat_read(task_id, receiver_id))
        .await?;

    for message in &read {
        state.publish(Table::ChatMessages, ChangeKind::Update, message);
    }
    Ok(Json(CountResponse { count: read.len() }))
}
