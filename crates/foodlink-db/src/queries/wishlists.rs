use anyhow::Result;
use chrono::{DateTime, Utc};
use foodlink_types::api::UpdateWishlistRequest;
use foodlink_types::models::WishlistItem;
use rusqlite::{Connection, Row};
use uuid::Uuid;

use super::{OptionalExt, enum_at, uuid_at};
use crate::Database;

const WISHLIST_COLUMNS: &str = "id, ngo_id, item_name, quantity_needed, fulfilled_quantity, category,
    description, priority, status, created_at, updated_at";

fn wishlist_from_row(row: &Row) -> rusqlite::Result<WishlistItem> {
    Ok(WishlistItem {
        id: uuid_at(row, 0)?,
        ngo_id: uuid_at(row, 1)?,
        item_name: row.get(2)?,
        quantity_needed: row.get(3)?,
        fulfilled_quantity: row.get(4)?,
        category: row.get(5)?,
        description: row.get(6)?,
        priority: enum_at(row, 7)?,
        status: enum_at(row, 8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn query_wishlist(conn: &Connection, id: Uuid) -> Result<Option<WishlistItem>> {
    conn.query_row(
        &format!("SELECT {WISHLIST_COLUMNS} FROM wishlists WHERE id = ?1"),
        [id.to_string()],
        wishlist_from_row,
    )
    .optional()
}

/// Every item an NGO has listed, whatever its status.
pub(super) fn query_wishlists_for_ngo(conn: &Connection, ngo_id: Uuid) -> Result<Vec<WishlistItem>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {WISHLIST_COLUMNS} FROM wishlists WHERE ngo_id = ?1 ORDER BY created_at, rowid"
    ))?;
    let rows = stmt
        .query_map([ngo_id.to_string()], wishlist_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

impl Database {
    pub fn insert_wishlist_item(&self, item: &WishlistItem) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO wishlists (id, ngo_id, item_name, quantity_needed, fulfilled_quantity,
                    category, description, priority, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                rusqlite::params![
                    item.id.to_string(),
                    item.ngo_id.to_string(),
                    item.item_name,
                    item.quantity_needed,
                    item.fulfilled_quantity,
                    item.category,
                    item.description,
                    item.priority.as_str(),
                    item.status.as_str(),
                    item.created_at,
                    item.updated_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_wishlist_item(&self, id: Uuid) -> Result<Option<WishlistItem>> {
        self.with_conn(|conn| query_wishlist(conn, id))
    }

    /// Open items, most urgent first, then newest.
    pub fn list_open_wishlist_items(&self, ngo_id: Option<Uuid>) -> Result<Vec<WishlistItem>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {WISHLIST_COLUMNS} FROM wishlists
                 WHERE status = 'open' AND (?1 IS NULL OR ngo_id = ?1)
                 ORDER BY CASE priority WHEN 'high' THEN 0 WHEN 'medium' THEN 1 ELSE 2 END,
                          created_at DESC, rowid DESC"
            ))?;
            let rows = stmt
                .query_map([ngo_id.map(|id| id.to_string())], wishlist_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Partial update of an item owned by `ngo_id`. `None` when there is no such item.
    pub fn update_wishlist_item(
        &self,
        id: Uuid,
        ngo_id: Uuid,
        req: &UpdateWishlistRequest,
        now: DateTime<Utc>,
    ) -> Result<Option<WishlistItem>> {
        self.with_tx(|conn| {
            let changed = conn.execute(
                "UPDATE wishlists SET
                    fulfilled_quantity = COALESCE(?3, fulfilled_quantity),
                    status = COALESCE(?4, status),
                    priority = COALESCE(?5, priority),
                    description = COALESCE(?6, description),
                    updated_at = ?7
                 WHERE id = ?1 AND ngo_id = ?2",
                rusqlite::params![
                    id.to_string(),
                    ngo_id.to_string(),
                    req.fulfilled_quantity,
                    req.status.map(|s| s.as_str()),
                    req.priority.map(|p| p.as_str()),
                    req.description,
                    now,
                ],
            )?;

            if changed == 0 {
                return Ok(None);
            }
            query_wishlist(conn, id)
        })
    }

    pub fn delete_wishlist_item(&self, id: Uuid, ngo_id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM wishlists WHERE id = ?1 AND ngo_id = ?2",
                rusqlite::params![id.to_string(), ngo_id.to_string()],
            )?;
            Ok(deleted == 1)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::fixtures;
    use chrono::Duration;
    use foodlink_types::models::{Role, WishlistPriority, WishlistStatus};

    fn item(ngo_id: Uuid, name: &str, priority: WishlistPriority, age_minutes: i64) -> WishlistItem {
        let at = Utc::now() - Duration::minutes(age_minutes);
        WishlistItem {
            id: Uuid::new_v4(),
            ngo_id,
            item_name: name.into(),
            quantity_needed: "20 kg".into(),
            fulfilled_quantity: 0,
            category: None,
            description: None,
            priority,
            status: WishlistStatus::Open,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn open_items_sort_by_priority_then_newest() {
        let db = Database::open_in_memory().unwrap();
        let ngo = fixtures::user(&db, Role::Ngo, "Akshaya");
        let other = fixtures::user(&db, Role::Ngo, "Annapurna");

        db.insert_wishlist_item(&item(ngo, "Rice", WishlistPriority::Low, 1)).unwrap();
        db.insert_wishlist_item(&item(ngo, "Dal", WishlistPriority::High, 30)).unwrap();
        db.insert_wishlist_item(&item(ngo, "Oil", WishlistPriority::High, 5)).unwrap();
        db.insert_wishlist_item(&item(other, "Milk", WishlistPriority::Medium, 2)).unwrap();

        let names: Vec<_> = db
            .list_open_wishlist_items(None)
            .unwrap()
            .into_iter()
            .map(|i| i.item_name)
            .collect();
        assert_eq!(names, ["Oil", "Dal", "Milk", "Rice"]);

        assert_eq!(db.list_open_wishlist_items(Some(other)).unwrap().len(), 1);
    }

    #[test]
    fn updates_and_deletes_are_owner_scoped() {
        let db = Database::open_in_memory().unwrap();
        let ngo = fixtures::user(&db, Role::Ngo, "Akshaya");
        let stranger = fixtures::user(&db, Role::Ngo, "Annapurna");
        let rice = item(ngo, "Rice", WishlistPriority::Medium, 0);
        db.insert_wishlist_item(&rice).unwrap();

        let req = UpdateWishlistRequest {
            fulfilled_quantity: Some(20),
            status: Some(WishlistStatus::Fulfilled),
            ..Default::default()
        };
        assert!(db.update_wishlist_item(rice.id, stranger, &req, Utc::now()).unwrap().is_none());

        let updated = db.update_wishlist_item(rice.id, ngo, &req, Utc::now()).unwrap().unwrap();
        assert_eq!(updated.fulfilled_quantity, 20);
        assert_eq!(updated.status, WishlistStatus::Fulfilled);
        assert_eq!(updated.priority, WishlistPriority::Medium);
        assert!(db.list_open_wishlist_items(None).unwrap().is_empty());

        assert!(!db.delete_wishlist_item(rice.id, stranger).unwrap());
        assert!(db.delete_wishlist_item(rice.id, ngo).unwrap());
        assert!(db.get_wishlist_item(rice.id).unwrap().is_none());
    }
}
