use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use foodlink_types::api::{AvailableDonationsQuery, Claims, CreateDonationRequest};
use foodlink_types::events::{ChangeKind, Table};
use foodlink_types::models::{BadgeCategory, Donation, DonationStatus, Role};

use crate::badges;
use crate::error::{ApiError, guarded, required};
use crate::middleware::require_role;
use crate::notifications::notify;
use crate::state::AppState;
use crate::tasks::{can_view_task, task_details};

pub async fn create_donation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateDonationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&state, claims.sub, &[Role::Donor]).await?;

    let title = required("title", &req.title)?;
    let food_type = required("food_type", &req.food_type)?;
    let quantity = required("quantity", &req.quantity)?;
    let pickup_address = required("pickup_address", &req.pickup_address)?;
    if req.estimated_meals.is_some_and(|m| m < 0) {
        return Err(ApiError::bad_request("estimated_meals cannot be negative"));
    }

    let now = Utc::now();
    let expiry_time = match (req.shelf_life, req.expiry_time) {
        (Some(preset), None) => preset.expiry_from(now),
        (None, Some(at)) if at > now => at,
        (None, Some(_)) => return Err(ApiError::bad_request("expiry_time must be in the future")),
        _ => return Err(ApiError::bad_request("provide exactly one of shelf_life or expiry_time")),
    };

    let donation = Donation {
        id: Uuid::new_v4(),
        donor_id: claims.sub,
        title,
        description: req.description,
        food_type,
        quantity,
        estimated_meals: req.estimated_meals,
        pickup_address,
        pickup_latitude: req.pickup_latitude.unwrap_or(0.0),
        pickup_longitude: req.pickup_longitude.unwrap_or(0.0),
        pickup_instructions: req.pickup_instructions,
        expiry_time,
        images: req.images,
        status: DonationStatus::Available,
        requested_by: None,
        created_at: now,
        updated_at: now,
    };

    let row = donation.clone();
    let (total, profile) = state
        .run_db(move |db| {
            let total = db.create_donation(&row)?;
            Ok((total, db.get_profile(row.donor_id)?))
        })
        .await?;

    state.publish(Table::Donations, ChangeKind::Insert, &donation);
    if let Some(profile) = &profile {
        state.publish(Table::Profiles, ChangeKind::Update, profile);
    }
    badges::award(&state, claims.sub, BadgeCategory::Donor, total).await;

    Ok((StatusCode::CREATED, Json(donation)))
}

pub async fn list_my_donations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&state, claims.sub, &[Role::Donor]).await?;
    let donor_id = claims.sub;
    let donations = state.run_db(move |db| db.list_donations_by_donor(donor_id)).await?;
    Ok(Json(donations))
}

pub async fn list_available_donations(
    State(state): State<AppState>,
    Query(query): Query<AvailableDonationsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let food_type = query.food_type.filter(|f| !f.trim().is_empty());
    let donations = state
        .run_db(move |db| db.list_available_donations(food_type.as_deref()))
        .await?;
    Ok(Json(donations))
}

pub async fn get_donation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let donation = state
        .run_db(move |db| db.get_donation(id))
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(donation))
}

/// An NGO claims a donation, which opens a delivery task for volunteers.
pub async fn request_donation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&state, claims.sub, &[Role::Ngo]).await?;

    let ngo_id = claims.sub;
    let (outcome, ngo) = state
        .run_db(move |db| {
            let outcome = db.request_donation(id, ngo_id, Uuid::new_v4(), Utc::now())?;
            Ok((outcome, db.get_profile(ngo_id)?))
        })
        .await?;
    let claimed = guarded(outcome, "donation is no longer available")?;

    state.publish(Table::Donations, ChangeKind::Update, &claimed.donation);
    state.publish(Table::VolunteerTasks, ChangeKind::Insert, &claimed.task);

    let ngo_name = ngo.map(|p| p.full_name).unwrap_or_else(|| "An NGO".into());
    notify(
        &state,
        claimed.donation.donor_id,
        "donation_requested",
        "Donation requested",
        format!("{} requested \"{}\"", ngo_name, claimed.donation.title),
        Some(claimed.donation.id),
    )
    .await;

    Ok(Json(claimed.task))
}

pub async fn cancel_donation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&state, claims.sub, &[Role::Donor]).await?;

    let donor_id = claims.sub;
    let outcome = state
        .run_db(move |db| db.cancel_donation(id, donor_id, Utc::now()))
        .await?;
    let cancelled = guarded(outcome, "donation can no longer be cancelled")?;

    state.publish(Table::Donations, ChangeKind::Update, &cancelled.donation);
    if let Some(task) = &cancelled.task {
        state.publish(Table::VolunteerTasks, ChangeKind::Update, task);
    }

    if let Some(ngo_id) = cancelled.donation.requested_by {
        notify(
            &state,
            ngo_id,
            "donation_cancelled",
            "Donation cancelled",
            format!("\"{}\" was withdrawn by the donor", cancelled.donation.title),
            Some(cancelled.donation.id),
        )
        .await;
    }

    Ok(Json(cancelled.donation))
}

/// Delivery status card: the donation's task with everyone's contact details.
pub async fn task_for_donation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let task = state
        .run_db(move |db| db.get_task_for_donation(id))
        .await?
        .ok_or(ApiError::NotFound)?;

    if !can_view_task(&state, claims.sub, &task).await? {
        return Err(ApiError::Forbidden);
    }

    let mut details = task_details(&state, vec![task]).await?;
    details.pop().map(Json).ok_or(ApiError::NotFound)
}
