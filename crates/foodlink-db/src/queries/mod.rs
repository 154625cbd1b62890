mod admin;
mod badges;
mod chat;
mod donations;
mod notifications;
mod ratings;
mod tasks;
mod users;
mod verifications;
mod wishlists;

use std::str::FromStr;

use anyhow::Result;
use rusqlite::Row;
use rusqlite::types::Type;
use uuid::Uuid;

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

/// Ids are stored as hyphenated TEXT.
pub(crate) fn uuid_at(row: &Row, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_error(idx, e))
}

pub(crate) fn opt_uuid_at(row: &Row, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|r| r.parse().map_err(|e| conversion_error(idx, e)))
        .transpose()
}

pub(crate) fn enum_at<T>(row: &Row, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_error(idx, e))
}

/// String lists (image URLs, document links) are stored as a JSON array.
pub(crate) fn list_at(row: &Row, idx: usize) -> rusqlite::Result<Vec<String>> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

pub(crate) fn list_json(items: &[String]) -> Result<String> {
    Ok(serde_json::to_string(items)?)
}

/// `?{start}, ?{start+1}, ...` for `count` parameters.
pub(crate) fn placeholders(start: usize, count: usize) -> String {
    (start..start + count)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{Duration, Utc};
    use foodlink_types::models::{Donation, DonationStatus, Role};
    use uuid::Uuid;

    use crate::Database;

    pub fn user(db: &Database, role: Role, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        let email = format!("{}-{}@example.org", name.to_lowercase(), &id.to_string()[..8]);
        db.create_user(id, &email, "not-a-real-hash", name, role)
            .unwrap();
        id
    }

    pub fn donation(db: &Database, donor_id: Uuid) -> Donation {
        let now = Utc::now();
        let donation = Donation {
            id: Uuid::new_v4(),
            donor_id,
            title: "Leftover biryani".into(),
            description: None,
            food_type: "cooked".into(),
            quantity: "10 plates".into(),
            estimated_meals: Some(10),
            pickup_address: "12 MG Road".into(),
            pickup_latitude: 12.9716,
            pickup_longitude: 77.5946,
            pickup_instructions: None,
            expiry_time: now + Duration::hours(6),
            images: vec![],
            status: DonationStatus::Available,
            requested_by: None,
            created_at: now,
            updated_at: now,
        };
        db.create_donation(&donation).unwrap();
        donation
    }
}
