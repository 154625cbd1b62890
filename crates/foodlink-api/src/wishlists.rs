use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use foodlink_types::api::{Claims, CreateWishlistRequest, UpdateWishlistRequest, WishlistQuery};
use foodlink_types::events::{ChangeKind, Table};
use foodlink_types::models::{Role, WishlistItem, WishlistStatus};

use crate::error::{ApiError, required};
use crate::middleware::require_role;
use crate::state::AppState;

pub async fn create_item(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateWishlistRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&state, claims.sub, &[Role::Ngo]).await?;

    let now = Utc::now();
    let item = WishlistItem {
        id: Uuid::new_v4(),
        ngo_id: claims.sub,
        item_name: required("item_name", &req.item_name)?,
        quantity_needed: required("quantity_needed", &req.quantity_needed)?,
        fulfilled_quantity: 0,
        category: req.category,
        description: req.description,
        priority: req.priority,
        status: WishlistStatus::Open,
        created_at: now,
        updated_at: now,
    };

    let row = item.clone();
    state.run_db(move |db| db.insert_wishlist_item(&row)).await?;
    state.publish(Table::Wishlists, ChangeKind::Insert, &item);

    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn list_open(
    State(state): State<AppState>,
    Query(query): Query<WishlistQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let items = state
        .run_db(move |db| db.list_open_wishlist_items(query.ngo_id))
        .await?;
    Ok(Json(items))
}

/// Loads the item and checks the caller is the NGO that owns it.
async fn owned_item(state: &AppState, id: Uuid, ngo_id: Uuid) -> Result<WishlistItem, ApiError> {
    require_role(state, ngo_id, &[Role::Ngo]).await?;
    let item = state
        .run_db(move |db| db.get_wishlist_item(id))
        .await?
        .ok_or(ApiError::NotFound)?;
    if item.ngo_id != ngo_id {
        return Err(ApiError::Forbidden);
    }
    Ok(item)
}

pub async fn update_item(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateWishlistRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.fulfilled_quantity.is_some_and(|q| q < 0) {
        return Err(ApiError::bad_request("fulfilled_quantity cannot be negative"));
    }
    owned_item(&state, id, claims.sub).await?;

    let ngo_id = claims.sub;
    let item = state
        .run_db(move |db| db.update_wishlist_item(id, ngo_id, &req, Utc::now()))
        .await?
        .ok_or(ApiError::NotFound)?;

    state.publish(Table::Wishlists, ChangeKind::Update, &item);
    Ok(Json(item))
}

pub async fn delete_item(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let item = owned_item(&state, id, claims.sub).await?;

    let ngo_id = claims.sub;
    if !state.run_db(move |db| db.delete_wishlist_item(id, ngo_id)).await? {
        return Err(ApiError::NotFound);
    }

    state.publish(Table::Wishlists, ChangeKind::Delete, &item);
    Ok(StatusCode::NO_CONTENT)
}
