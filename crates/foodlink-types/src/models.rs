use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// Status and role columns are stored as their snake_case names.
macro_rules! string_enum {
    ($name:ident, $kind:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(ParseEnumError {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

string_enum!(Role, "role" {
    Admin => "admin",
    Donor => "donor",
    Ngo => "ngo",
    Volunteer => "volunteer",
});

string_enum!(DonationStatus, "donation status" {
    Available => "available",
    Requested => "requested",
    PickupScheduled => "pickup_scheduled",
    InTransit => "in_transit",
    Delivered => "delivered",
    Cancelled => "cancelled",
});

string_enum!(TaskStatus, "task status" {
    Available => "available",
    Assigned => "assigned",
    InProgress => "in_progress",
    Completed => "completed",
    Cancelled => "cancelled",
});

string_enum!(VerificationStatus, "verification status" {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
});

string_enum!(WishlistPriority, "wishlist priority" {
    Low => "low",
    Medium => "medium",
    High => "high",
});

string_enum!(WishlistStatus, "wishlist status" {
    Open => "open",
    Fulfilled => "fulfilled",
    Closed => "closed",
});

string_enum!(BadgeCategory, "badge category" {
    Donor => "donor",
    Volunteer => "volunteer",
});

impl Default for WishlistPriority {
    fn default() -> Self {
        WishlistPriority::Medium
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub full_name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub total_donations: i64,
    pub total_meals_donated: i64,
    pub total_deliveries: i64,
    pub co2_saved_kg: f64,
    pub average_rating: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public contact card attached to tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: Uuid,
    pub full_name: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Donation {
    pub id: Uuid,
    pub donor_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub food_type: String,
    pub quantity: String,
    pub estimated_meals: Option<i64>,
    pub pickup_address: String,
    pub pickup_latitude: f64,
    pub pickup_longitude: f64,
    pub pickup_instructions: Option<String>,
    pub expiry_time: DateTime<Utc>,
    pub images: Vec<String>,
    pub status: DonationStatus,
    pub requested_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolunteerTask {
    pub id: Uuid,
    pub donation_id: Uuid,
    pub donor_id: Uuid,
    pub ngo_id: Uuid,
    pub volunteer_id: Option<Uuid>,
    pub pickup_address: String,
    pub pickup_latitude: f64,
    pub pickup_longitude: f64,
    pub dropoff_address: String,
    pub dropoff_latitude: f64,
    pub dropoff_longitude: f64,
    pub estimated_distance_km: Option<f64>,
    pub status: TaskStatus,
    pub accepted_at: Option<DateTime<Utc>>,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VolunteerTask {
    /// Donor, requesting NGO, and the assigned volunteer (if any).
    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.donor_id == user_id || self.ngo_id == user_id || self.volunteer_id == Some(user_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub id: Uuid,
    pub task_id: Uuid,
    pub rater_id: Uuid,
    pub rated_user_id: Uuid,
    pub rating: u8,
    pub comment: Option<String>,
    pub category: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Badge {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub category: BadgeCategory,
    pub requirement_value: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserBadge {
    pub id: Uuid,
    pub user_id: Uuid,
    pub badge: Badge,
    pub earned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub message: String,
    pub related_id: Option<Uuid>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub task_id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NgoVerification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub organization_name: String,
    pub registration_id: String,
    pub organization_type: Option<String>,
    pub contact_person: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub website: Option<String>,
    pub description: Option<String>,
    pub verification_documents: Vec<String>,
    pub status: VerificationStatus,
    pub rejection_reason: Option<String>,
    pub verified_by: Option<Uuid>,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WishlistItem {
    pub id: Uuid,
    pub ngo_id: Uuid,
    pub item_name: String,
    pub quantity_needed: String,
    pub fulfilled_quantity: i64,
    pub category: Option<String>,
    pub description: Option<String>,
    pub priority: WishlistPriority,
    pub status: WishlistStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_names_match_column_values() {
        assert_eq!(DonationStatus::PickupScheduled.as_str(), "pickup_scheduled");
        assert_eq!("in_progress".parse::<TaskStatus>(), Ok(TaskStatus::InProgress));
        assert_eq!(
            serde_json::to_string(&DonationStatus::InTransit).unwrap(),
            "\"in_transit\""
        );
    }

    #[test]
    fn unknown_role_is_rejected() {
        let err = "superuser".parse::<Role>().unwrap_err();
        assert_eq!(err.kind, "role");
        assert_eq!(err.to_string(), "unknown role 'superuser'");
    }

    #[test]
    fn participants_include_assigned_volunteer_only() {
        let now = Utc::now();
        let donor = Uuid::new_v4();
        let ngo = Uuid::new_v4();
        let volunteer = Uuid::new_v4();
        let mut task = VolunteerTask {
            id: Uuid::new_v4(),
            donation_id: Uuid::new_v4(),
            donor_id: donor,
            ngo_id: ngo,
            volunteer_id: None,
            pickup_address: String::new(),
            pickup_latitude: 0.0,
            pickup_longitude: 0.0,
            dropoff_address: String::new(),
            dropoff_latitude: 0.0,
            dropoff_longitude: 0.0,
            estimated_distance_km: None,
            status: TaskStatus::Available,
            accepted_at: None,
            picked_up_at: None,
            delivered_at: None,
            created_at: now,
            updated_at: now,
        };

        assert!(task.is_participant(donor));
        assert!(task.is_participant(ngo));
        assert!(!task.is_participant(volunteer));

        task.volunteer_id = Some(volunteer);
        assert!(task.is_participant(volunteer));
    }
}
