use anyhow::Result;
use chrono::{DateTime, Utc};
use foodlink_types::api::VerificationView;
use foodlink_types::models::{NgoVerification, VerificationStatus};
use rusqlite::{Connection, Row};
use uuid::Uuid;

use super::{OptionalExt, enum_at, list_at, list_json, opt_uuid_at, uuid_at};
use crate::Database;
use crate::models::Guarded;

const VERIFICATION_COLUMNS: &str = "v.id, v.user_id, v.organization_name, v.registration_id,
    v.organization_type, v.contact_person, v.contact_email, v.contact_phone, v.website,
    v.description, v.verification_documents, v.status, v.rejection_reason, v.verified_by,
    v.verified_at, v.created_at, v.updated_at";

fn verification_from_row(row: &Row) -> rusqlite::Result<NgoVerification> {
    Ok(NgoVerification {
        id: uuid_at(row, 0)?,
        user_id: uuid_at(row, 1)?,
        organization_name: row.get(2)?,
        registration_id: row.get(3)?,
        organization_type: row.get(4)?,
        contact_person: row.get(5)?,
        contact_email: row.get(6)?,
        contact_phone: row.get(7)?,
        website: row.get(8)?,
        description: row.get(9)?,
        verification_documents: list_at(row, 10)?,
        status: enum_at(row, 11)?,
        rejection_reason: row.get(12)?,
        verified_by: opt_uuid_at(row, 13)?,
        verified_at: row.get(14)?,
        created_at: row.get(15)?,
        updated_at: row.get(16)?,
    })
}

pub(super) fn query_verification(conn: &Connection, column: &str, value: Uuid) -> Result<Option<NgoVerification>> {
    conn.query_row(
        &format!("SELECT {VERIFICATION_COLUMNS} FROM ngo_verifications v WHERE v.{column} = ?1"),
        [value.to_string()],
        verification_from_row,
    )
    .optional()
}

impl Database {
    /// First submission inserts a pending row. A rejected submission may be
    /// replaced (back to pending); pending or approved ones are `Stale`.
    pub fn submit_verification(&self, v: &NgoVerification) -> Result<Guarded<NgoVerification>> {
        self.with_tx(|conn| {
            let documents = list_json(&v.verification_documents)?;

            match query_verification(conn, "user_id", v.user_id)? {
                None => {
                    conn.execute(
                        "INSERT INTO ngo_verifications (id, user_id, organization_name, registration_id,
                            organization_type, contact_person, contact_email, contact_phone, website,
                            description, verification_documents, status, created_at, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 'pending', ?12, ?12)",
                        rusqlite::params![
                            v.id.to_string(),
                            v.user_id.to_string(),
                            v.organization_name,
                            v.registration_id,
                            v.organization_type,
                            v.contact_person,
                            v.contact_email,
                            v.contact_phone,
                            v.website,
                            v.description,
                            documents,
                            v.created_at,
                        ],
                    )?;
                }
                Some(existing) if existing.status == VerificationStatus::Rejected => {
                    conn.execute(
                        "UPDATE ngo_verifications
                         SET organization_name = ?2, registration_id = ?3, organization_type = ?4,
                             contact_person = ?5, contact_email = ?6, contact_phone = ?7, website = ?8,
                             description = ?9, verification_documents = ?10, status = 'pending',
                             rejection_reason = NULL, verified_by = NULL, verified_at = NULL,
                             updated_at = ?11
                         WHERE id = ?1 AND status = 'rejected'",
                        rusqlite::params![
                            existing.id.to_string(),
                            v.organization_name,
                            v.registration_id,
                            v.organization_type,
                            v.contact_person,
                            v.contact_email,
                            v.contact_phone,
                            v.website,
                            v.description,
                            documents,
                            v.updated_at,
                        ],
                    )?;
                }
                Some(_) => return Ok(Guarded::Stale),
            }

            match query_verification(conn, "user_id", v.user_id)? {
                Some(stored) => Ok(Guarded::Applied(stored)),
                None => Ok(Guarded::Missing),
            }
        })
    }

    pub fn get_verification_for_user(&self, user_id: Uuid) -> Result<Option<NgoVerification>> {
        self.with_conn(|conn| query_verification(conn, "user_id", user_id))
    }

    /// Newest first, each with the NGO's display name.
    pub fn list_verifications(&self, status: Option<VerificationStatus>) -> Result<Vec<VerificationView>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {VERIFICATION_COLUMNS}, p.full_name
                 FROM ngo_verifications v
                 LEFT JOIN profiles p ON p.id = v.user_id
                 WHERE ?1 IS NULL OR v.status = ?1
                 ORDER BY v.created_at DESC, v.rowid DESC"
            ))?;
            let rows = stmt
                .query_map([status.map(|s| s.as_str())], |row| {
                    Ok(VerificationView {
                        verification: verification_from_row(row)?,
                        ngo_name: row.get(17)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Decide a pending verification. Anything already decided is `Stale`.
    pub fn review_verification(
        &self,
        id: Uuid,
        status: VerificationStatus,
        reviewer_id: Uuid,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Guarded<NgoVerification>> {
        self.with_tx(|conn| {
            let changed = conn.execute(
                "UPDATE ngo_verifications
                 SET status = ?2, rejection_reason = ?3, verified_by = ?4, verified_at = ?5, updated_at = ?5
                 WHERE id = ?1 AND status = 'pending'",
                rusqlite::params![id.to_string(), status.as_str(), reason, reviewer_id.to_string(), now],
            )?;

            match query_verification(conn, "id", id)? {
                None => Ok(Guarded::Missing),
                Some(_) if changed == 0 => Ok(Guarded::Stale),
                Some(stored) => Ok(Guarded::Applied(stored)),
            }
        })
    }
}
