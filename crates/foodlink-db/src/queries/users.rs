use std::collections::HashMap;

use anyhow::Result;
use chrono::Utc;
use foodlink_types::api::{LeaderboardEntry, UpdateProfileRequest};
use foodlink_types::models::{Contact, Profile, Role};
use rusqlite::{Connection, Row};
use uuid::Uuid;

use super::verifications::query_verification;
use super::wishlists::query_wishlists_for_ngo;
use super::{OptionalExt, enum_at, placeholders, uuid_at};
use crate::Database;
use crate::models::{DeletedUser, UserRow};

pub(crate) const PROFILE_COLUMNS: &str = "id, full_name, phone, address, latitude, longitude, bio, avatar_url, \
     total_donations, total_meals_donated, total_deliveries, co2_saved_kg, average_rating, created_at, updated_at";

pub(crate) fn profile_from_row(row: &Row) -> rusqlite::Result<Profile> {
    Ok(Profile {
        id: uuid_at(row, 0)?,
        full_name: row.get(1)?,
        phone: row.get(2)?,
        address: row.get(3)?,
        latitude: row.get(4)?,
        longitude: row.get(5)?,
        bio: row.get(6)?,
        avatar_url: row.get(7)?,
        total_donations: row.get(8)?,
        total_meals_donated: row.get(9)?,
        total_deliveries: row.get(10)?,
        co2_saved_kg: row.get(11)?,
        average_rating: row.get(12)?,
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
    })
}

impl Database {
    // -- Users --

    /// Creates the login, its role and an empty profile together.
    pub fn create_user(
        &self,
        id: Uuid,
        email: &str,
        password_hash: &str,
        full_name: &str,
        role: Role,
    ) -> Result<()> {
        let now = Utc::now();
        self.with_tx(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, password, created_at) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![id.to_string(), email, password_hash, now],
            )?;
            conn.execute(
                "INSERT INTO user_roles (id, user_id, role, created_at) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![Uuid::new_v4().to_string(), id.to_string(), role.as_str(), now],
            )?;
            conn.execute(
                "INSERT INTO profiles (id, full_name, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
                rusqlite::params![id.to_string(), full_name, now],
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "u.email = ?1", email))
    }

    pub fn get_user_by_id(&self, id: Uuid) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "u.id = ?1", &id.to_string()))
    }

    pub fn get_role(&self, user_id: Uuid) -> Result<Option<Role>> {
        self.with_conn(|conn| query_role(conn, user_id))
    }

    /// Replace the user's role. Returns false when the user does not exist.
    pub fn set_role(&self, user_id: Uuid, role: Role) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE user_roles SET role = ?1 WHERE user_id = ?2",
                rusqlite::params![role.as_str(), user_id.to_string()],
            )?;
            Ok(changed == 1)
        })
    }

    /// Removes the login; role, profile, badges, notifications, wishlist and
    /// verification rows cascade. Returns the cascaded rows that are on the
    /// change feed, or `None` when there was no such user. Fails with a
    /// constraint violation while the user still owns activity.
    pub fn delete_user(&self, user_id: Uuid) -> Result<Option<DeletedUser>> {
        self.with_tx(|conn| {
            let profile = query_profile(conn, user_id)?;
            let wishlist_items = query_wishlists_for_ngo(conn, user_id)?;
            let verification = query_verification(conn, "user_id", user_id)?;

            let changed = conn.execute("DELETE FROM users WHERE id = ?1", [user_id.to_string()])?;
            if changed == 0 {
                return Ok(None);
            }
            Ok(Some(DeletedUser {
                profile,
                wishlist_items,
                verification,
            }))
        })
    }

    // -- Profiles --

    pub fn get_profile(&self, id: Uuid) -> Result<Option<Profile>> {
        self.with_conn(|conn| query_profile(conn, id))
    }

    /// Apply the fields present in `changes`; absent fields keep their value.
    pub fn update_profile(&self, id: Uuid, changes: &UpdateProfileRequest) -> Result<Option<Profile>> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE profiles SET
                    full_name = COALESCE(?2, full_name),
                    phone = COALESCE(?3, phone),
                    address = COALESCE(?4, address),
                    latitude = COALESCE(?5, latitude),
                    longitude = COALESCE(?6, longitude),
                    bio = COALESCE(?7, bio),
                    avatar_url = COALESCE(?8, avatar_url),
                    updated_at = ?9
                 WHERE id = ?1",
                rusqlite::params![
                    id.to_string(),
                    changes.full_name,
                    changes.phone,
                    changes.address,
                    changes.latitude,
                    changes.longitude,
                    changes.bio,
                    changes.avatar_url,
                    Utc::now(),
                ],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_profile(conn, id)
        })
    }

    /// Batch-fetch contact cards for a set of user IDs.
    pub fn get_contacts(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, Contact>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT id, full_name, phone FROM profiles WHERE id IN ({})",
                placeholders(1, ids.len())
            );
            let params: Vec<String> = ids.iter().map(Uuid::to_string).collect();

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(params.iter()), |row| {
                    Ok(Contact {
                        id: uuid_at(row, 0)?,
                        full_name: row.get(1)?,
                        phone: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows.into_iter().map(|c| (c.id, c)).collect())
        })
    }

    // -- Leaderboard --

    pub fn leaderboard(&self, limit: u32) -> Result<Vec<LeaderboardEntry>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT p.id, p.full_name, p.avatar_url, p.total_deliveries, p.co2_saved_kg, p.average_rating
                 FROM profiles p
                 JOIN user_roles r ON r.user_id = p.id
                 WHERE r.role = 'volunteer'
                 ORDER BY p.total_deliveries DESC, p.full_name ASC
                 LIMIT ?1",
            )?;

            let rows = stmt
                .query_map([limit], |row| {
                    Ok(LeaderboardEntry {
                        id: uuid_at(row, 0)?,
                        full_name: row.get(1)?,
                        avatar_url: row.get(2)?,
                        total_deliveries: row.get(3)?,
                        co2_saved_kg: row.get(4)?,
                        average_rating: row.get(5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// 1-based position of a volunteer in the full leaderboard ordering.
    pub fn volunteer_rank(&self, user_id: Uuid) -> Result<Option<usize>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT p.id FROM profiles p
                 JOIN user_roles r ON r.user_id = p.id
                 WHERE r.role = 'volunteer'
                 ORDER BY p.total_deliveries DESC, p.full_name ASC",
            )?;
            let ids = stmt
                .query_map([], |row| uuid_at(row, 0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(ids.iter().position(|id| *id == user_id).map(|i| i + 1))
        })
    }
}

fn query_user(conn: &Connection, predicate: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!(
        "SELECT u.id, u.email, u.password, r.role, u.created_at
         FROM users u
         JOIN user_roles r ON r.user_id = u.id
         WHERE {}",
        predicate
    );
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: uuid_at(row, 0)?,
                email: row.get(1)?,
                password: row.get(2)?,
                role: enum_at(row, 3)?,
                created_at: row.get(4)?,
            })
        })
        .optional()?;

    Ok(row)
}

pub(crate) fn query_role(conn: &Connection, user_id: Uuid) -> Result<Option<Role>> {
    conn.query_row(
        "SELECT role FROM user_roles WHERE user_id = ?1",
        [user_id.to_string()],
        |row| enum_at(row, 0),
    )
    .optional()
}

pub(crate) fn query_profile(conn: &Connection, id: Uuid) -> Result<Option<Profile>> {
    let sql = format!("SELECT {} FROM profiles WHERE id = ?1", PROFILE_COLUMNS);
    conn.query_row(&sql, [id.to_string()], profile_from_row).optional()
}
