use anyhow::Result;
use foodlink_types::models::Rating;
use uuid::Uuid;

use super::uuid_at;
use crate::Database;

impl Database {
    /// Store a rating and refresh the rated user's average.
    /// Returns the new average.
    pub fn insert_rating(&self, rating: &Rating) -> Result<f64> {
        self.with_tx(|conn| {
            conn.execute(
                "INSERT INTO ratings (id, task_id, rater_id, rated_user_id, rating, comment, category, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    rating.id.to_string(),
                    rating.task_id.to_string(),
                    rating.rater_id.to_string(),
                    rating.rated_user_id.to_string(),
                    rating.rating,
                    rating.comment,
                    rating.category,
                    rating.created_at,
                ],
            )?;

            let average = conn.query_row(
                "UPDATE profiles
                 SET average_rating = (SELECT AVG(rating) FROM ratings WHERE rated_user_id = ?1),
                     updated_at = ?2
                 WHERE id = ?1
                 RETURNING average_rating",
                rusqlite::params![rating.rated_user_id.to_string(), rating.created_at],
                |row| row.get(0),
            )?;
            Ok(average)
        })
    }

    pub fn list_ratings_for(&self, user_id: Uuid) -> Result<Vec<Rating>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, task_id, rater_id, rated_user_id, rating, comment, category, created_at
                 FROM ratings WHERE rated_user_id = ?1
                 ORDER BY created_at DESC, rowid DESC",
            )?;
            let rows = stmt
                .query_map([user_id.to_string()], |row| {
                    Ok(Rating {
                        id: uuid_at(row, 0)?,
                        task_id: uuid_at(row, 1)?,
                        rater_id: uuid_at(row, 2)?,
                        rated_user_id: uuid_at(row, 3)?,
                        rating: row.get(4)?,
                        comment: row.get(5)?,
                        category: row.get(6)?,
                        created_at: row.get(7)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::fixtures;
    use chrono::Utc;
    use foodlink_types::models::Role;

    fn rating(task_id: Uuid, rater_id: Uuid, rated_user_id: Uuid, stars: u8) -> Rating {
        Rating {
            id: Uuid::new_v4(),
            task_id,
            rater_id,
            rated_user_id,
            rating: stars,
            comment: None,
            category: "volunteer".into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn average_tracks_all_ratings_and_duplicates_conflict() {
        let db = Database::open_in_memory().unwrap();
        let donor = fixtures::user(&db, Role::Donor, "Meera");
        let ngo = fixtures::user(&db, Role::Ngo, "Akshaya");
        let volunteer = fixtures::user(&db, Role::Volunteer, "Ravi");
        let donation = fixtures::donation(&db, donor);
        let task = db
            .request_donation(donation.id, ngo, Uuid::new_v4(), Utc::now())
            .unwrap()
            .applied()
            .unwrap()
            .task;

        assert_eq!(db.insert_rating(&rating(task.id, donor, volunteer, 5)).unwrap(), 5.0);
        assert_eq!(db.insert_rating(&rating(task.id, ngo, volunteer, 4)).unwrap(), 4.5);

        let err = db.insert_rating(&rating(task.id, ngo, volunteer, 1)).unwrap_err();
        assert!(crate::is_constraint_violation(&err));

        let profile = db.get_profile(volunteer).unwrap().unwrap();
        assert_eq!(profile.average_rating, Some(4.5));
        assert_eq!(db.list_ratings_for(volunteer).unwrap().len(), 2);
    }
}
