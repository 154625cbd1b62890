use anyhow::Result;
use chrono::{DateTime, Utc};
use foodlink_types::geo;
use foodlink_types::models::{Donation, DonationStatus, TaskStatus, VolunteerTask};
use rusqlite::{Connection, Row};
use uuid::Uuid;

use super::tasks::{insert_task, query_open_task_for_donation, query_task};
use super::users::query_profile;
use super::{OptionalExt, enum_at, list_at, list_json, opt_uuid_at, uuid_at};
use crate::Database;
use crate::models::{DonationCancellation, DonationRequest, Guarded};

const DONATION_COLUMNS: &str = "id, donor_id, title, description, food_type, quantity, estimated_meals, \
     pickup_address, pickup_latitude, pickup_longitude, pickup_instructions, expiry_time, images, status, \
     requested_by, created_at, updated_at";

fn donation_from_row(row: &Row) -> rusqlite::Result<Donation> {
    Ok(Donation {
        id: uuid_at(row, 0)?,
        donor_id: uuid_at(row, 1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        food_type: row.get(4)?,
        quantity: row.get(5)?,
        estimated_meals: row.get(6)?,
        pickup_address: row.get(7)?,
        pickup_latitude: row.get(8)?,
        pickup_longitude: row.get(9)?,
        pickup_instructions: row.get(10)?,
        expiry_time: row.get(11)?,
        images: list_at(row, 12)?,
        status: enum_at(row, 13)?,
        requested_by: opt_uuid_at(row, 14)?,
        created_at: row.get(15)?,
        updated_at: row.get(16)?,
    })
}

impl Database {
    /// Insert a new listing and bump the donor's counters.
    /// Returns the donor's new `total_donations`.
    pub fn create_donation(&self, donation: &Donation) -> Result<i64> {
        let images = list_json(&donation.images)?;
        self.with_tx(|conn| {
            conn.execute(
                &format!(
                    "INSERT INTO donations ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
                    DONATION_COLUMNS
                ),
                rusqlite::params![
                    donation.id.to_string(),
                    donation.donor_id.to_string(),
                    donation.title,
                    donation.description,
                    donation.food_type,
                    donation.quantity,
                    donation.estimated_meals,
                    donation.pickup_address,
                    donation.pickup_latitude,
                    donation.pickup_longitude,
                    donation.pickup_instructions,
                    donation.expiry_time,
                    images,
                    donation.status.as_str(),
                    donation.requested_by.map(|id| id.to_string()),
                    donation.created_at,
                    donation.updated_at,
                ],
            )?;

            let total = conn.query_row(
                "UPDATE profiles SET
                    total_donations = total_donations + 1,
                    total_meals_donated = total_meals_donated + COALESCE(?2, 0),
                    updated_at = ?3
                 WHERE id = ?1
                 RETURNING total_donations",
                rusqlite::params![
                    donation.donor_id.to_string(),
                    donation.estimated_meals,
                    donation.created_at
                ],
                |row| row.get(0),
            )?;
            Ok(total)
        })
    }

    pub fn get_donation(&self, id: Uuid) -> Result<Option<Donation>> {
        self.with_conn(|conn| query_donation(conn, id))
    }

    pub fn list_donations_by_donor(&self, donor_id: Uuid) -> Result<Vec<Donation>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM donations WHERE donor_id = ?1 ORDER BY created_at DESC, rowid DESC",
                DONATION_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([donor_id.to_string()], donation_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Donations still open to NGOs, soonest expiry first.
    pub fn list_available_donations(&self, food_type: Option<&str>) -> Result<Vec<Donation>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM donations
                 WHERE status IN (?1, ?2) AND (?3 IS NULL OR food_type = ?3)
                 ORDER BY expiry_time ASC, rowid ASC",
                DONATION_COLUMNS
            );
            let [first, second] = DonationStatus::LISTED;
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    rusqlite::params![first.as_str(), second.as_str(), food_type],
                    donation_from_row,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// An NGO claims an available donation. The donation moves to `requested`
    /// only if it is still `available`, and a delivery task is opened from the
    /// donor's pickup point to the NGO's address.
    pub fn request_donation(
        &self,
        donation_id: Uuid,
        ngo_id: Uuid,
        task_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Guarded<DonationRequest>> {
        self.with_tx(|conn| {
            let changed = conn.execute(
                "UPDATE donations SET status = ?1, requested_by = ?2, updated_at = ?3
                 WHERE id = ?4 AND status = ?5",
                rusqlite::params![
                    DonationStatus::Requested.as_str(),
                    ngo_id.to_string(),
                    now,
                    donation_id.to_string(),
                    DonationStatus::Available.as_str(),
                ],
            )?;

            let Some(donation) = query_donation(conn, donation_id)? else {
                return Ok(Guarded::Missing);
            };
            if changed == 0 {
                return Ok(Guarded::Stale);
            }

            let ngo = query_profile(conn, ngo_id)?;
            let (dropoff_address, dropoff_latitude, dropoff_longitude) = match &ngo {
                Some(p) => (
                    p.address.clone().unwrap_or_default(),
                    p.latitude.unwrap_or(0.0),
                    p.longitude.unwrap_or(0.0),
                ),
                None => (String::new(), 0.0, 0.0),
            };

            let task = VolunteerTask {
                id: task_id,
                donation_id,
                donor_id: donation.donor_id,
                ngo_id,
                volunteer_id: None,
                pickup_address: donation.pickup_address.clone(),
                pickup_latitude: donation.pickup_latitude,
                pickup_longitude: donation.pickup_longitude,
                dropoff_address,
                dropoff_latitude,
                dropoff_longitude,
                estimated_distance_km: Some(geo::distance_km(
                    donation.pickup_latitude,
                    donation.pickup_longitude,
                    dropoff_latitude,
                    dropoff_longitude,
                )),
                status: TaskStatus::Available,
                accepted_at: None,
                picked_up_at: None,
                delivered_at: None,
                created_at: now,
                updated_at: now,
            };
            insert_task(conn, &task)?;

            Ok(Guarded::Applied(DonationRequest { donation, task }))
        })
    }

    /// Withdraw a donation. Allowed while it is `available`, or `requested`
    /// with its delivery task not yet taken by a volunteer.
    pub fn cancel_donation(
        &self,
        donation_id: Uuid,
        donor_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Guarded<DonationCancellation>> {
        self.with_tx(|conn| {
            let Some(current) = query_donation(conn, donation_id)? else {
                return Ok(Guarded::Missing);
            };
            if current.donor_id != donor_id {
                return Ok(Guarded::Missing);
            }

            let mut task = None;
            match current.status {
                DonationStatus::Available => {}
                DonationStatus::Requested => {
                    let Some(open) = query_open_task_for_donation(conn, donation_id)? else {
                        return Ok(Guarded::Stale);
                    };
                    let changed = conn.execute(
                        "UPDATE volunteer_tasks SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
                        rusqlite::params![
                            TaskStatus::Cancelled.as_str(),
                            now,
                            open.id.to_string(),
                            TaskStatus::Available.as_str(),
                        ],
                    )?;
                    if changed == 0 {
                        return Ok(Guarded::Stale);
                    }
                    task = query_task(conn, open.id)?;
                }
                _ => return Ok(Guarded::Stale),
            }

            let changed = conn.execute(
                "UPDATE donations SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
                rusqlite::params![
                    DonationStatus::Cancelled.as_str(),
                    now,
                    donation_id.to_string(),
                    current.status.as_str(),
                ],
            )?;
            if changed == 0 {
                return Ok(Guarded::Stale);
            }

            let Some(donation) = query_donation(conn, donation_id)? else {
                return Ok(Guarded::Missing);
            };
            Ok(Guarded::Applied(DonationCancellation { donation, task }))
        })
    }
}

pub(crate) fn query_donation(conn: &Connection, id: Uuid) -> Result<Option<Donation>> {
    let sql = format!("SELECT {} FROM donations WHERE id = ?1", DONATION_COLUMNS);
    conn.query_row(&sql, [id.to_string()], donation_from_row).optional()
}
