//! Volunteer task lifecycle.
//!
//! Every step is a single guarded row update: the task moves from `from_status()` to
//! `to_status()` only if it is still in `from_status()`, and the linked donation follows with
//! `donation_status()`.

use serde::{Deserialize, Serialize};

use crate::models::{DonationStatus, TaskStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskAction {
    Accept,
    Pickup,
    Deliver,
    Release,
}

impl TaskAction {
    pub fn from_status(self) -> TaskStatus {
        match self {
            TaskAction::Accept => TaskStatus::Available,
            TaskAction::Pickup => TaskStatus::Assigned,
            TaskAction::Deliver => TaskStatus::InProgress,
            TaskAction::Release => TaskStatus::Assigned,
        }
    }

    pub fn to_status(self) -> TaskStatus {
        match self {
            TaskAction::Accept => TaskStatus::Assigned,
            TaskAction::Pickup => TaskStatus::InProgress,
            TaskAction::Deliver => TaskStatus::Completed,
            TaskAction::Release => TaskStatus::Available,
        }
    }

    pub fn donation_status(self) -> DonationStatus {
        match self {
            TaskAction::Accept => DonationStatus::PickupScheduled,
            TaskAction::Pickup => DonationStatus::InTransit,
            TaskAction::Deliver => DonationStatus::Delivered,
            TaskAction::Release => DonationStatus::Requested,
        }
    }

    /// Accept is open to any volunteer; the rest only to the one holding the task.
    pub fn requires_assignee(self) -> bool {
        !matches!(self, TaskAction::Accept)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskAction::Accept => "accept",
            TaskAction::Pickup => "pickup",
            TaskAction::Deliver => "deliver",
            TaskAction::Release => "release",
        }
    }
}

impl DonationStatus {
    /// Statuses shown on the NGO marketplace.
    pub const LISTED: [DonationStatus; 2] = [DonationStatus::Available, DonationStatus::Requested];
}
