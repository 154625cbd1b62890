use anyhow::Result;
use foodlink_types::api::ChatMessageView;
use foodlink_types::models::ChatMessage;
use rusqlite::Row;
use uuid::Uuid;

use super::uuid_at;
use crate::Database;

const CHAT_COLUMNS: &str = "id, task_id, sender_id, receiver_id, message, is_read, created_at";

fn chat_from_row(row: &Row) -> rusqlite::Result<ChatMessage> {
    Ok(ChatMessage {
        id: uuid_at(row, 0)?,
        task_id: uuid_at(row, 1)?,
        sender_id: uuid_at(row, 2)?,
        receiver_id: uuid_at(row, 3)?,
        message: row.get(4)?,
        is_read: row.get(5)?,
        created_at: row.get(6)?,
    })
}

impl Database {
    pub fn insert_chat_message(&self, m: &ChatMessage) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO chat_messages (id, task_id, sender_id, receiver_id, message, is_read, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    m.id.to_string(),
                    m.task_id.to_string(),
                    m.sender_id.to_string(),
                    m.receiver_id.to_string(),
                    m.message,
                    m.is_read,
                    m.created_at,
                ],
            )?;
            Ok(())
        })
    }

    /// Conversation for a task, oldest first, with sender names.
    pub fn list_chat_messages(&self, task_id: Uuid) -> Result<Vec<ChatMessageView>> {
        self.with_conn(|conn| {
            // JOIN profiles to fetch sender names in a single query
            let mut stmt = conn.prepare(
                "SELECT m.id, m.task_id, m.sender_id, m.receiver_id, m.message, m.is_read, m.created_at, p.full_name
                 FROM chat_messages m
                 LEFT JOIN profiles p ON p.id = m.sender_id
                 WHERE m.task_id = ?1
                 ORDER BY m.created_at ASC, m.rowid ASC",
            )?;
            let rows = stmt
                .query_map([task_id.to_string()], |row| {
                    Ok(ChatMessageView {
                        message: chat_from_row(row)?,
                        sender_name: row
                            .get::<_, Option<String>>(7)?
                            .unwrap_or_else(|| "unknown".to_string()),
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Mark the receiver's unread messages in a task as read. Returns the rows
    /// that changed.
    pub fn mark_chat_read(&self, task_id: Uuid, receiver_id: Uuid) -> Result<Vec<ChatMessage>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "UPDATE chat_messages SET is_read = 1
                 WHERE task_id = ?1 AND receiver_id = ?2 AND is_read = 0
                 RETURNING {CHAT_COLUMNS}"
            ))?;
            let rows = stmt
                .query_map(rusqlite::params![task_id.to_string(), receiver_id.to_string()], chat_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}
