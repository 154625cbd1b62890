use anyhow::Result;
use chrono::Utc;
use foodlink_types::models::{Badge, BadgeCategory, UserBadge};
use rusqlite::Row;
use uuid::Uuid;

use super::{enum_at, uuid_at};
use crate::Database;

fn badge_from_row(row: &Row, offset: usize) -> rusqlite::Result<Badge> {
    Ok(Badge {
        id: uuid_at(row, offset)?,
        name: row.get(offset + 1)?,
        description: row.get(offset + 2)?,
        icon: row.get(offset + 3)?,
        category: enum_at(row, offset + 4)?,
        requirement_value: row.get(offset + 5)?,
    })
}

impl Database {
    pub fn list_badges(&self) -> Result<Vec<Badge>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, description, icon, category, requirement_value
                 FROM badges ORDER BY requirement_value ASC, name ASC",
            )?;
            let rows = stmt
                .query_map([], |row| badge_from_row(row, 0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn list_user_badges(&self, user_id: Uuid) -> Result<Vec<UserBadge>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT ub.id, ub.user_id, ub.earned_at,
                        b.id, b.name, b.description, b.icon, b.category, b.requirement_value
                 FROM user_badges ub
                 JOIN badges b ON b.id = ub.badge_id
                 WHERE ub.user_id = ?1
                 ORDER BY b.requirement_value ASC",
            )?;
            let rows = stmt
                .query_map([user_id.to_string()], |row| {
                    Ok(UserBadge {
                        id: uuid_at(row, 0)?,
                        user_id: uuid_at(row, 1)?,
                        earned_at: row.get(2)?,
                        badge: badge_from_row(row, 3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Award every badge in `category` whose threshold `count` has reached and
    /// the user does not hold yet. Returns only the newly earned badges.
    pub fn check_and_award(&self, user_id: Uuid, category: BadgeCategory, count: i64) -> Result<Vec<Badge>> {
        self.with_tx(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, description, icon, category, requirement_value
                 FROM badges
                 WHERE category = ?1 AND requirement_value <= ?2
                   AND id NOT IN (SELECT badge_id FROM user_badges WHERE user_id = ?3)
                 ORDER BY requirement_value ASC",
            )?;
            let eligible = stmt
                .query_map(
                    rusqlite::params![category.as_str(), count, user_id.to_string()],
                    |row| badge_from_row(row, 0),
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let now = Utc::now();
            for badge in &eligible {
                conn.execute(
                    "INSERT OR IGNORE INTO user_badges (id, user_id, badge_id, earned_at) VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![
                        Uuid::new_v4().to_string(),
                        user_id.to_string(),
                        badge.id.to_string(),
                        now
                    ],
                )?;
            }

            Ok(eligible)
        })
    }
}
