use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use foodlink_types::api::{
    Claims, ReviewDecision, ReviewVerificationRequest, SubmitVerificationRequest, VerificationQuery,
};
use foodlink_types::events::{ChangeKind, Table};
use foodlink_types::models::{NgoVerification, Role, VerificationStatus};

use crate::error::{ApiError, guarded, required};
use crate::middleware::require_role;
use crate::notifications::notify;
use crate::state::AppState;

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub async fn submit_verification(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SubmitVerificationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&state, claims.sub, &[Role::Ngo]).await?;

    let now = Utc::now();
    let submission = NgoVerification {
        id: Uuid::new_v4(),
        user_id: claims.sub,
        organization_name: required("organization_name", &req.organization_name)?,
        registration_id: required("registration_id", &req.registration_id)?,
        organization_type: non_blank(req.organization_type),
        contact_person: non_blank(req.contact_person),
        contact_email: non_blank(req.contact_email),
        contact_phone: non_blank(req.contact_phone),
        website: non_blank(req.website),
        description: non_blank(req.description),
        verification_documents: req.verification_documents,
        status: VerificationStatus::Pending,
        rejection_reason: None,
        verified_by: None,
        verified_at: None,
        created_at: now,
        updated_at: now,
    };

    let fresh_id = submission.id;
    let outcome = state
        .run_db(move |db| db.submit_verification(&submission))
        .await?;
    let stored = guarded(outcome, "a verification is already pending or approved")?;

    let kind = if stored.id == fresh_id {
        ChangeKind::Insert
    } else {
        ChangeKind::Update
    };
    state.publish(Table::NgoVerifications, kind, &stored);

    Ok((StatusCode::CREATED, Json(stored)))
}

pub async fn my_verification(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&state, claims.sub, &[Role::Ngo]).await?;
    let user_id = claims.sub;
    let verification = state
        .run_db(move |db| db.get_verification_for_user(user_id))
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(verification))
}

pub async fn list_verifications(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<VerificationQuery>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&state, claims.sub, &[Role::Admin]).await?;
    let verifications = state
        .run_db(move |db| db.list_verifications(query.status))
        .await?;
    Ok(Json(verifications))
}

pub async fn review_verification(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<ReviewVerificationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&state, claims.sub, &[Role::Admin]).await?;

    // Only rejections carry a reason
    let reason = match req.decision {
        ReviewDecision::Approve => None,
        ReviewDecision::Reject => Some(
            non_blank(req.reason)
                .ok_or_else(|| ApiError::bad_request("a reason is required when rejecting"))?,
        ),
    };

    let reviewer = claims.sub;
    let status = req.decision.status();
    let outcome = state
        .run_db(move |db| db.review_verification(id, status, reviewer, reason.as_deref(), Utc::now()))
        .await?;
    let reviewed = guarded(outcome, "verification has already been reviewed")?;

    state.publish(Table::NgoVerifications, ChangeKind::Update, &reviewed);

    let (kind, title, message) = match req.decision {
        ReviewDecision::Approve => (
            "verification_approved",
            "Verification approved",
            format!("{} is now a verified organisation", reviewed.organization_name),
        ),
        ReviewDecision::Reject => (
            "verification_rejected",
            "Verification rejected",
            format!(
                "Your verification was rejected: {}",
                reviewed.rejection_reason.as_deref().unwrap_or_default()
            ),
        ),
    };
    notify(&state, reviewed.user_id, kind, title, message, Some(reviewed.id)).await;

    Ok(Json(reviewed))
}
