pub mod admin;
pub mod auth;
pub mod badges;
pub mod chat;
pub mod donations;
pub mod error;
pub mod middleware;
pub mod notifications;
pub mod profiles;
pub mod ratings;
pub mod state;
pub mod tasks;
pub mod verifications;
pub mod wishlists;

use axum::{
    Json, Router,
    routing::{delete, get, patch, post, put},
};

pub use state::{AppState, AppStateInner};

/// All REST routes. The WebSocket gateway is mounted by the server binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login));

    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me))
        // Profiles
        .route("/profiles/me", patch(profiles::update_me))
        .route("/profiles/{id}", get(profiles::get_profile))
        .route("/leaderboard", get(profiles::leaderboard))
        // Donations
        .route("/donations", post(donations::create_donation))
        .route("/donations/mine", get(donations::list_my_donations))
        .route("/donations/available", get(donations::list_available_donations))
        .route("/donations/{id}", get(donations::get_donation))
        .route("/donations/{id}/request", post(donations::request_donation))
        .route("/donations/{id}/cancel", post(donations::cancel_donation))
        .route("/donations/{id}/task", get(donations::task_for_donation))
        // Task lifecycle
        .route("/tasks", get(tasks::list_tasks))
        .route("/tasks/{id}", get(tasks::get_task))
        .route("/tasks/{id}/accept", post(tasks::accept_task))
        .route("/tasks/{id}/pickup", post(tasks::pickup_task))
        .route("/tasks/{id}/deliver", post(tasks::deliver_task))
        .route("/tasks/{id}/release", post(tasks::release_task))
        // Chat
        .route("/tasks/{id}/messages", get(chat::list_messages).post(chat::send_message))
        .route("/tasks/{id}/messages/read", post(chat::mark_read))
        // Ratings, kudos, badges
        .route("/tasks/{id}/ratings", post(ratings::submit_rating))
        .route("/tasks/{id}/kudos", post(ratings::send_kudos))
        .route("/users/{id}/ratings", get(ratings::list_ratings))
        .route("/users/{id}/badges", get(badges::user_badges))
        .route("/badges", get(badges::list_badges))
        // Notifications
        .route("/notifications", get(notifications::list_notifications))
        .route("/notifications/read-all", post(notifications::mark_all_read))
        .route("/notifications/{id}/read", post(notifications::mark_read))
        // NGO verification
        .route("/verifications", post(verifications::submit_verification))
        .route("/verifications/mine", get(verifications::my_verification))
        .route("/admin/verifications", get(verifications::list_verifications))
        .route("/admin/verifications/{id}/review", post(verifications::review_verification))
        // Wishlists
        .route("/wishlists", get(wishlists::list_open).post(wishlists::create_item))
        .route("/wishlists/{id}", patch(wishlists::update_item).delete(wishlists::delete_item))
        // Admin
        .route("/admin/stats", get(admin::stats))
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users/{id}/role", put(admin::change_role))
        .route("/admin/users/{id}", delete(admin::delete_user))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
