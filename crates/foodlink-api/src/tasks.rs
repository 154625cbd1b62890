use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use foodlink_types::api::{Claims, TaskDetails};
use foodlink_types::events::{ChangeKind, Table};
use foodlink_types::lifecycle::TaskAction;
use foodlink_types::models::{BadgeCategory, Role, TaskStatus, VolunteerTask};

use crate::badges;
use crate::error::{ApiError, guarded};
use crate::middleware::{current_role, require_role};
use crate::notifications::notify;
use crate::state::AppState;

/// Attach donor, NGO and volunteer contact cards, fetched in one query.
pub(crate) async fn task_details(state: &AppState, tasks: Vec<VolunteerTask>) -> Result<Vec<TaskDetails>, ApiError> {
    let mut ids: Vec<Uuid> = tasks
        .iter()
        .flat_map(|t| [Some(t.donor_id), Some(t.ngo_id), t.volunteer_id])
        .flatten()
        .collect();
    ids.sort();
    ids.dedup();

    let contacts = state.run_db(move |db| db.get_contacts(&ids)).await?;

    Ok(tasks
        .into_iter()
        .map(|task| TaskDetails {
            donor: contacts.get(&task.donor_id).cloned(),
            ngo: contacts.get(&task.ngo_id).cloned(),
            volunteer: task.volunteer_id.and_then(|v| contacts.get(&v).cloned()),
            task,
        })
        .collect())
}

/// Participants and admins can see a task; volunteers can also see open ones.
pub(crate) async fn can_view_task(state: &AppState, user_id: Uuid, task: &VolunteerTask) -> Result<bool, ApiError> {
    if task.is_participant(user_id) {
        return Ok(true);
    }
    let role = current_role(state, user_id).await?;
    Ok(role == Role::Admin || (role == Role::Volunteer && task.status == TaskStatus::Available))
}

pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&state, claims.sub, &[Role::Volunteer]).await?;
    let volunteer_id = claims.sub;
    let tasks = state
        .run_db(move |db| db.list_tasks_for_volunteer(volunteer_id))
        .await?;
    Ok(Json(task_details(&state, tasks).await?))
}

pub async fn get_task(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let task = state
        .run_db(move |db| db.get_task(id))
        .await?
        .ok_or(ApiError::NotFound)?;

    if !can_view_task(&state, claims.sub, &task).await? {
        return Err(ApiError::Forbidden);
    }

    let mut details = task_details(&state, vec![task]).await?;
    details.pop().map(Json).ok_or(ApiError::NotFound)
}

pub async fn accept_task(
    state: State<AppState>,
    claims: Extension<Claims>,
    id: Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    transition(state, claims, id, TaskAction::Accept).await
}

pub async fn pickup_task(
    state: State<AppState>,
    claims: Extension<Claims>,
    id: Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    transition(state, claims, id, TaskAction::Pickup).await
}

pub async fn deliver_task(
    state: State<AppState>,
    claims: Extension<Claims>,
    id: Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    transition(state, claims, id, TaskAction::Deliver).await
}

pub async fn release_task(
    state: State<AppState>,
    claims: Extension<Claims>,
    id: Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    transition(state, claims, id, TaskAction::Release).await
}

async fn transition(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    action: TaskAction,
) -> Result<Json<VolunteerTask>, ApiError> {
    require_role(&state, claims.sub, &[Role::Volunteer]).await?;

    let volunteer_id = claims.sub;
    let (outcome, volunteer) = state
        .run_db(move |db| {
            let outcome = db.advance_task(id, action, volunteer_id, Utc::now())?;
            Ok((outcome, db.get_profile(volunteer_id)?))
        })
        .await?;

    let stale = match action {
        TaskAction::Accept => "task has already been taken".to_string(),
        other => format!("task cannot be marked {} from its current state", other.as_str()),
    };
    let step = guarded(outcome, &stale)?;
    let (task, donation) = (step.task, step.donation);

    state.publish(Table::VolunteerTasks, ChangeKind::Update, &task);
    state.publish(Table::Donations, ChangeKind::Update, &donation);

    let volunteer_name = volunteer
        .as_ref()
        .map(|p| p.full_name.clone())
        .unwrap_or_else(|| "A volunteer".into());

    match action {
        TaskAction::Accept => {
            notify(
                &state,
                task.donor_id,
                "task_accepted",
                "Volunteer assigned",
                format!("{} will pick up \"{}\"", volunteer_name, donation.title),
                Some(task.id),
            )
            .await;
        }
        TaskAction::Pickup => {
            notify(
                &state,
                task.ngo_id,
                "pickup_confirmed",
                "Food picked up",
                format!("{} picked up \"{}\" and is on the way", volunteer_name, donation.title),
                Some(task.id),
            )
            .await;
        }
        TaskAction::Deliver => {
            for recipient in [task.donor_id, task.ngo_id] {
                notify(
                    &state,
                    recipient,
                    "delivery_complete",
                    "Delivery complete",
                    format!("\"{}\" was delivered by {}", donation.title, volunteer_name),
                    Some(task.id),
                )
                .await;
            }
            if let Some(profile) = &volunteer {
                state.publish(Table::Profiles, ChangeKind::Update, profile);
                badges::award(&state, volunteer_id, BadgeCategory::Volunteer, profile.total_deliveries).await;
            }
        }
        TaskAction::Release => {
            notify(
                &state,
                task.donor_id,
                "task_released",
                "Volunteer released pickup",
                format!("\"{}\" is waiting for a new volunteer", donation.title),
                Some(task.id),
            )
            .await;
        }
    }

    Ok(Json(task))
}
