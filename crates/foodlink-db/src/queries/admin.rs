use anyhow::Result;
use foodlink_types::api::{AdminStats, AdminUser};

use super::{enum_at, uuid_at};
use crate::Database;

impl Database {
    pub fn stats(&self) -> Result<AdminStats> {
        self.with_conn(|conn| {
            let stats = conn.query_row(
                "SELECT
                    (SELECT COUNT(*) FROM users),
                    (SELECT COUNT(*) FROM donations),
                    (SELECT COALESCE(SUM(estimated_meals), 0) FROM donations),
                    (SELECT COUNT(*) FROM user_roles WHERE role = 'volunteer'),
                    (SELECT COUNT(*) FROM volunteer_tasks WHERE status = 'completed')",
                [],
                |row| {
                    Ok(AdminStats {
                        total_users: row.get(0)?,
                        total_donations: row.get(1)?,
                        total_meals: row.get(2)?,
                        active_volunteers: row.get(3)?,
                        completed_deliveries: row.get(4)?,
                    })
                },
            )?;
            Ok(stats)
        })
    }

    /// Users newest first. `search` matches name or email, case-insensitively.
    pub fn list_users(&self, search: Option<&str>) -> Result<Vec<AdminUser>> {
        let pattern = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", escape_like(&s.to_lowercase())));

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.email, p.full_name, r.role, u.created_at
                 FROM users u
                 JOIN profiles p ON p.id = u.id
                 JOIN user_roles r ON r.user_id = u.id
                 WHERE ?1 IS NULL
                    OR lower(p.full_name) LIKE ?1 ESCAPE '\\'
                    OR lower(u.email) LIKE ?1 ESCAPE '\\'
                 ORDER BY u.created_at DESC, u.rowid DESC",
            )?;
            let rows = stmt
                .query_map([pattern], |row| {
                    Ok(AdminUser {
                        id: uuid_at(row, 0)?,
                        email: row.get(1)?,
                        full_name: row.get(2)?,
                        role: enum_at(row, 3)?,
                        created_at: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

/// Make `%`, `_` and the escape character itself match literally.
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::fixtures;
    use chrono::Utc;
    use foodlink_types::models::Role;
    use uuid::Uuid;

    #[test]
    fn stats_count_activity() {
        let db = Database::open_in_memory().unwrap();
        let donor = fixtures::user(&db, Role::Donor, "Meera");
        let ngo = fixtures::user(&db, Role::Ngo, "Akshaya");
        fixtures::user(&db, Role::Volunteer, "Ravi");
        fixtures::user(&db, Role::Volunteer, "Sana");

        let donation = fixtures::donation(&db, donor);
        fixtures::donation(&db, donor);
        db.request_donation(donation.id, ngo, Uuid::new_v4(), Utc::now()).unwrap();

        assert_eq!(
            db.stats().unwrap(),
            AdminStats {
                total_users: 4,
                total_donations: 2,
                total_meals: 20,
                active_volunteers: 2,
                completed_deliveries: 0,
            }
        );
    }

    #[test]
    fn search_matches_name_or_email() {
        let db = Database::open_in_memory().unwrap();
        fixtures::user(&db, Role::Donor, "Meera");
        fixtures::user(&db, Role::Volunteer, "Ravi");

        assert_eq!(db.list_users(None).unwrap().len(), 2);
        assert_eq!(db.list_users(Some("  ")).unwrap().len(), 2);

        let by_name = db.list_users(Some("MEE")).unwrap();
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].role, Role::Donor);

        let by_email = db.list_users(Some("ravi-")).unwrap();
        assert_eq!(by_email.len(), 1);
        assert_eq!(by_email[0].full_name, "Ravi");
    }

    #[test]
    fn wildcards_in_search_are_literal() {
        let db = Database::open_in_memory().unwrap();
        fixtures::user(&db, Role::Donor, "Meera");
        fixtures::user(&db, Role::Volunteer, "Ravi_K");

        let underscored = db.list_users(Some("_")).unwrap();
        assert_eq!(underscored.len(), 1);
        assert_eq!(underscored[0].full_name, "Ravi_K");
        assert!(db.list_users(Some("%")).unwrap().is_empty());
        assert!(db.list_users(Some("\\")).unwrap().is_empty());
    }
}
