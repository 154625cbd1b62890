use anyhow::Result;
use chrono::{DateTime, Utc};
use foodlink_types::lifecycle::TaskAction;
use foodlink_types::models::{TaskStatus, VolunteerTask};
use rusqlite::{Connection, Row};
use uuid::Uuid;

use super::donations::query_donation;
use super::{OptionalExt, enum_at, opt_uuid_at, uuid_at};
use crate::Database;
use crate::models::{Guarded, TaskTransition};

const TASK_COLUMNS: &str = "id, donation_id, donor_id, ngo_id, volunteer_id, pickup_address, pickup_latitude, \
     pickup_longitude, dropoff_address, dropoff_latitude, dropoff_longitude, estimated_distance_km, status, \
     accepted_at, picked_up_at, delivered_at, created_at, updated_at";

fn task_from_row(row: &Row) -> rusqlite::Result<VolunteerTask> {
    Ok(VolunteerTask {
        id: uuid_at(row, 0)?,
        donation_id: uuid_at(row, 1)?,
        donor_id: uuid_at(row, 2)?,
        ngo_id: uuid_at(row, 3)?,
        volunteer_id: opt_uuid_at(row, 4)?,
        pickup_address: row.get(5)?,
        pickup_latitude: row.get(6)?,
        pickup_longitude: row.get(7)?,
        dropoff_address: row.get(8)?,
        dropoff_latitude: row.get(9)?,
        dropoff_longitude: row.get(10)?,
        estimated_distance_km: row.get(11)?,
        status: enum_at(row, 12)?,
        accepted_at: row.get(13)?,
        picked_up_at: row.get(14)?,
        delivered_at: row.get(15)?,
        created_at: row.get(16)?,
        updated_at: row.get(17)?,
    })
}

impl Database {
    pub fn get_task(&self, id: Uuid) -> Result<Option<VolunteerTask>> {
        self.with_conn(|conn| query_task(conn, id))
    }

    /// Most recent task opened for a donation, cancelled ones included.
    pub fn get_task_for_donation(&self, donation_id: Uuid) -> Result<Option<VolunteerTask>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM volunteer_tasks WHERE donation_id = ?1 ORDER BY created_at DESC, rowid DESC LIMIT 1",
                TASK_COLUMNS
            );
            conn.query_row(&sql, [donation_id.to_string()], task_from_row).optional()
        })
    }

    /// The volunteer's board: every open task plus the ones they hold or held.
    pub fn list_tasks_for_volunteer(&self, volunteer_id: Uuid) -> Result<Vec<VolunteerTask>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM volunteer_tasks
                 WHERE status = ?1 OR volunteer_id = ?2
                 ORDER BY created_at DESC, rowid DESC",
                TASK_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    rusqlite::params![TaskStatus::Available.as_str(), volunteer_id.to_string()],
                    task_from_row,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Apply one lifecycle step as a guarded update and move the donation along.
    ///
    /// The task row is only touched if it is still in `action.from_status()` and,
    /// for every action except accept, still held by `volunteer_id`. Delivery
    /// also credits the volunteer with one more completed delivery.
    pub fn advance_task(
        &self,
        task_id: Uuid,
        action: TaskAction,
        volunteer_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Guarded<TaskTransition>> {
        self.with_tx(|conn| {
            let id = task_id.to_string();
            let volunteer = volunteer_id.to_string();
            let from = action.from_status().as_str();
            let to = action.to_status().as_str();

            let set = match action {
                TaskAction::Accept => "volunteer_id = ?4, accepted_at = ?2",
                TaskAction::Pickup => "picked_up_at = ?2",
                TaskAction::Deliver => "delivered_at = ?2",
                TaskAction::Release => "volunteer_id = NULL, accepted_at = NULL",
            };
            let held_by = if action.requires_assignee() { " AND volunteer_id = ?4" } else { "" };
            let changed = conn.execute(
                &format!(
                    "UPDATE volunteer_tasks SET status = ?1, {set}, updated_at = ?2
                     WHERE id = ?3 AND status = ?5{held_by}"
                ),
                rusqlite::params![to, now, id, volunteer, from],
            )?;

            let Some(task) = query_task(conn, task_id)? else {
                return Ok(Guarded::Missing);
            };
            if changed == 0 {
                return Ok(Guarded::Stale);
            }

            conn.execute(
                "UPDATE donations SET status = ?1, updated_at = ?2 WHERE id = ?3",
                rusqlite::params![action.donation_status().as_str(), now, task.donation_id.to_string()],
            )?;

            if action == TaskAction::Deliver {
                conn.execute(
                    "UPDATE profiles SET total_deliveries = total_deliveries + 1, updated_at = ?2 WHERE id = ?1",
                    rusqlite::params![volunteer, now],
                )?;
            }

            let Some(donation) = query_donation(conn, task.donation_id)? else {
                return Ok(Guarded::Missing);
            };
            Ok(Guarded::Applied(TaskTransition { task, donation }))
        })
    }
}

pub(crate) fn insert_task(conn: &Connection, task: &VolunteerTask) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO volunteer_tasks ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            TASK_COLUMNS
        ),
        rusqlite::params![
            task.id.to_string(),
            task.donation_id.to_string(),
            task.donor_id.to_string(),
            task.ngo_id.to_string(),
            task.volunteer_id.map(|id| id.to_string()),
            task.pickup_address,
            task.pickup_latitude,
            task.pickup_longitude,
            task.dropoff_address,
            task.dropoff_latitude,
            task.dropoff_longitude,
            task.estimated_distance_km,
            task.status.as_str(),
            task.accepted_at,
            task.picked_up_at,
            task.delivered_at,
            task.created_at,
            task.updated_at,
        ],
    )?;
    Ok(())
}

pub(crate) fn query_task(conn: &Connection, id: Uuid) -> Result<Option<VolunteerTask>> {
    let sql = format!("SELECT {} FROM volunteer_tasks WHERE id = ?1", TASK_COLUMNS);
    conn.query_row(&sql, [id.to_string()], task_from_row).optional()
}

/// The live (not cancelled) task for a donation, if any.
pub(crate) fn query_open_task_for_donation(conn: &Connection, donation_id: Uuid) -> Result<Option<VolunteerTask>> {
    let sql = format!(
        "SELECT {} FROM volunteer_tasks WHERE donation_id = ?1 AND status != ?2
         ORDER BY created_at DESC, rowid DESC LIMIT 1",
        TASK_COLUMNS
    );
    conn.query_row(
        &sql,
        rusqlite::params![donation_id.to_string(), TaskStatus::Cancelled.as_str()],
        task_from_row,
    )
    .optional()
}
