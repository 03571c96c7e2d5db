use std::collections::HashMap;

use crate::Database;
use crate::models::{ConnectedAccountRow, MessageRow};
use anyhow::{Result, bail};
use rusqlite::{Connection, Row};

impl Database {
    // -- Connected accounts --

    /// Establish a conversation between two users. The pair is unordered:
    /// calling this twice (in either order) returns the same row.
    /// Returns (row, created).
    pub fn create_connected_account(
        &self,
        id: &str,
        user_x: &str,
        user_y: &str,
        created_at: &str,
    ) -> Result<(ConnectedAccountRow, bool)> {
        if user_x == user_y {
            bail!("cannot connect user '{}' with themselves", user_x);
        }
        let (user_a, user_b) = if user_x < user_y {
            (user_x, user_y)
        } else {
            (user_y, user_x)
        };

        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO connected_accounts (id, user_a, user_b, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                (id, user_a, user_b, created_at),
            )?;

            let row = conn.query_row(
                "SELECT id, user_a, user_b, created_at FROM connected_accounts
                 WHERE user_a = ?1 AND user_b = ?2",
                (user_a, user_b),
                account_from_row,
            )?;

            Ok((row, inserted > 0))
        })
    }

    pub fn get_connected_account(&self, id: &str) -> Result<Option<ConnectedAccountRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, user_a, user_b, created_at FROM connected_accounts WHERE id = ?1",
                [id],
                account_from_row,
            )
            .optional()
        })
    }

    pub fn list_connected_accounts(&self, user_id: &str) -> Result<Vec<ConnectedAccountRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_a, user_b, created_at FROM connected_accounts
                 WHERE user_a = ?1 OR user_b = ?1
                 ORDER BY created_at DESC",
            )?;

            let rows = stmt
                .query_map([user_id], account_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    pub fn is_participant(&self, connected_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM connected_accounts
                     WHERE id = ?1 AND (user_a = ?2 OR user_b = ?2)",
                    (connected_id, user_id),
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    // -- Messages --

    pub fn insert_message(&self, row: &MessageRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, connected_id, sender_id, receiver_id, body, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    row.id,
                    row.connected_id,
                    row.sender_id,
                    row.receiver_id,
                    row.body,
                    row.created_at
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_message(&self, id: &str) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, connected_id, sender_id, receiver_id, body, created_at
                 FROM messages WHERE id = ?1",
                [id],
                message_from_row,
            )
            .optional()
        })
    }

    /// Returns true if a row was removed.
    pub fn delete_message(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute("DELETE FROM messages WHERE id = ?1", [id])?;
            Ok(removed > 0)
        })
    }

    /// Newest first. `before` is an exclusive `created_at` cursor.
    pub fn get_messages(
        &self,
        connected_id: &str,
        limit: u32,
        before: Option<&str>,
    ) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| query_messages(conn, connected_id, limit, before))
    }

    /// Batch-fetch the sender of each message id within `connected_id`.
    /// Unknown ids and ids from other conversations are absent from the map.
    pub fn get_message_senders(
        &self,
        connected_id: &str,
        message_ids: &[String],
    ) -> Result<HashMap<String, String>> {
        if message_ids.is_empty() {
            return Ok(HashMap::new());
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> =
                (2..=message_ids.len() + 1).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT id, sender_id FROM messages WHERE connected_id = ?1 AND id IN ({})",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let mut params: Vec<&dyn rusqlite::types::ToSql> = vec![&connected_id];
            params.extend(message_ids.iter().map(|id| id as &dyn rusqlite::types::ToSql));

            let senders = stmt
                .query_map(params.as_slice(), |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?
                .collect::<std::result::Result<HashMap<_, _>, _>>()?;

            Ok(senders)
        })
    }
}

fn query_messages(
    conn: &Connection,
    connected_id: &str,
    limit: u32,
    before: Option<&str>,
) -> Result<Vec<MessageRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, connected_id, sender_id, receiver_id, body, created_at
         FROM messages
         WHERE connected_id = ?1 AND (?2 IS NULL OR created_at < ?2)
         ORDER BY created_at DESC, rowid DESC
         LIMIT ?3",
    )?;

    let rows = stmt
        .query_map(rusqlite::params![connected_id, before, limit], message_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<ConnectedAccountRow> {
    Ok(ConnectedAccountRow {
        id: row.get(0)?,
        user_a: row.get(1)?,
        user_b: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        connected_id: row.get(1)?,
        sender_id: row.get(2)?,
        receiver_id: row.get(3)?,
        body: row.get(4)?,
        created_at: row.get(5)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
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
