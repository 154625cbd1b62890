use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    ChatMessage, Contact, NgoVerification, Profile, Role, VerificationStatus, VolunteerTask,
    WishlistPriority, WishlistStatus,
};

// -- JWT Claims --

/// JWT claims shared by the REST middleware and the gateway's Identify step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub role: Role,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub role: Role,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub full_name: String,
    pub role: Role,
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MeResponse {
    pub email: String,
    pub role: Role,
    pub profile: Profile,
}

// -- Profiles --

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub id: Uuid,
    pub full_name: String,
    pub avatar_url: Option<String>,
    pub total_deliveries: i64,
    pub co2_saved_kg: f64,
    pub average_rating: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LeaderboardResponse {
    pub top: Vec<LeaderboardEntry>,
    /// 1-based rank of the caller among volunteers, when the caller is one.
    pub my_rank: Option<usize>,
}

// -- Donations --

/// Shelf-life presets offered by the donation form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShelfLife {
    #[serde(rename = "1-2 Hours")]
    UpToTwoHours,
    #[serde(rename = "3-6 Hours")]
    UpToSixHours,
    #[serde(rename = "1 Day")]
    OneDay,
}

impl ShelfLife {
    pub fn duration(self) -> Duration {
        match self {
            ShelfLife::UpToTwoHours => Duration::hours(2),
            ShelfLife::UpToSixHours => Duration::hours(6),
            ShelfLife::OneDay => Duration::days(1),
        }
    }

    pub fn expiry_from(self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + self.duration()
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateDonationRequest {
    pub title: String,
    pub food_type: String,
    pub quantity: String,
    pub estimated_meals: Option<i64>,
    pub pickup_address: String,
    pub pickup_latitude: Option<f64>,
    pub pickup_longitude: Option<f64>,
    pub pickup_instructions: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    pub shelf_life: Option<ShelfLife>,
    pub expiry_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AvailableDonationsQuery {
    pub food_type: Option<String>,
}

// -- Tasks --

/// A task with the contact cards of everyone involved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDetails {
    #[serde(flatten)]
    pub task: VolunteerTask,
    pub donor: Option<Contact>,
    pub ngo: Option<Contact>,
    pub volunteer: Option<Contact>,
}

// -- Chat --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub receiver_id: Uuid,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessageView {
    #[serde(flatten)]
    pub message: ChatMessage,
    pub sender_name: String,
}

// -- Ratings & kudos --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubmitRatingRequest {
    pub rated_user_id: Uuid,
    pub rating: u8,
    pub comment: Option<String>,
    pub category: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KudosRequest {
    pub recipient_id: Uuid,
    pub message: String,
}

// -- Notifications --

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread_only: bool,
    #[serde(default = "default_notification_limit")]
    pub limit: u32,
}

fn default_notification_limit() -> u32 {
    50
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: usize,
}

// -- NGO verification --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubmitVerificationRequest {
    pub organization_name: String,
    pub registration_id: String,
    pub organization_type: Option<String>,
    pub contact_person: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub website: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub verification_documents: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approve,
    Reject,
}

impl ReviewDecision {
    pub fn status(self) -> VerificationStatus {
        match self {
            ReviewDecision::Approve => VerificationStatus::Approved,
            ReviewDecision::Reject => VerificationStatus::Rejected,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReviewVerificationRequest {
    pub decision: ReviewDecision,
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VerificationQuery {
    pub status: Option<VerificationStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationView {
    #[serde(flatten)]
    pub verification: NgoVerification,
    pub ngo_name: Option<String>,
}

// -- Wishlists --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateWishlistRequest {
    pub item_name: String,
    pub quantity_needed: String,
    pub category: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub priority: WishlistPriority,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateWishlistRequest {
    pub fulfilled_quantity: Option<i64>,
    pub status: Option<WishlistStatus>,
    pub priority: Option<WishlistPriority>,
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WishlistQuery {
    pub ngo_id: Option<Uuid>,
}

// -- Admin --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminStats {
    pub total_users: i64,
    pub total_donations: i64,
    pub total_meals: i64,
    pub active_volunteers: i64,
    pub completed_deliveries: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminUser {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserSearchQuery {
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChangeRoleRequest {
    pub role: Role,
}
