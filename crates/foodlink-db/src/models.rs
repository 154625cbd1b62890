//! Store-only row types. Entity rows that are safe to hand out are read
//! straight into `foodlink_types::models`.

use chrono::{DateTime, Utc};
use foodlink_types::models::{Donation, NgoVerification, Profile, Role, VolunteerTask, WishlistItem};
use uuid::Uuid;

pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Outcome of a status-guarded update.
#[derive(Debug)]
pub enum Guarded<T> {
    /// The guard held and the row was updated.
    Applied(T),
    /// No row with that id (or not owned by the caller).
    Missing,
    /// The row exists but was no longer in the expected state.
    Stale,
}

impl<T> Guarded<T> {
    pub fn applied(self) -> Option<T> {
        match self {
            Guarded::Applied(value) => Some(value),
            _ => None,
        }
    }
}

/// A lifecycle step as committed: the task and its donation after the update.
#[derive(Debug, Clone)]
pub struct TaskTransition {
    pub task: VolunteerTask,
    pub donation: Donation,
}

/// Result of an NGO claiming a donation: the donation and the task opened for it.
#[derive(Debug, Clone)]
pub struct DonationRequest {
    pub donation: Donation,
    pub task: VolunteerTask,
}

/// Result of a donor cancelling: the donation and the withdrawn task, if any.
#[derive(Debug, Clone)]
pub struct DonationCancellation {
    pub donation: Donation,
    pub task: Option<VolunteerTask>,
}

/// Rows removed along with a deleted user, for publishing their deletion.
#[derive(Debug, Clone)]
pub struct DeletedUser {
    pub profile: Option<Profile>,
    pub wishlist_items: Vec<WishlistItem>,
    pub verification: Option<NgoVerification>,
}
