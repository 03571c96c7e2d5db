use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use mytutor_db::Database;
use mytutor_db::models::{MessageRow, format_timestamp};
use mytutor_types::models::ChatMessage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub sender_id: String,
    pub receiver_id: String,
    pub connected_id: String,
    pub message: String,
}

/// Data access needed by the relay.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a message, assigning its id and timestamp.
    async fn create_message(&self, new: NewMessage) -> Result<ChatMessage>;

    /// Delete a message belonging to `connected_id`. Returns false if no such
    /// message exists in that conversation.
    async fn delete_message(&self, message_id: String, connected_id: String) -> Result<bool>;

    /// message_id -> sender_id for the ids that exist in `connected_id`.
    async fn message_senders(
        &self,
        connected_id: String,
        message_ids: Vec<String>,
    ) -> Result<HashMap<String, String>>;

    async fn is_participant(&self, connected_id: String, user_id: String) -> Result<bool>;
}

/// `MessageStore` over the SQLite database. Queries run on the blocking pool.
#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Database>,
}

impl SqliteStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn create_message(&self, new: NewMessage) -> Result<ChatMessage> {
        let row = MessageRow {
            id: Uuid::new_v4().to_string(),
            connected_id: new.connected_id,
            sender_id: new.sender_id,
            receiver_id: new.receiver_id,
            body: new.message,
            created_at: format_timestamp(Utc::now()),
        };

        let db = self.db.clone();
        tokio::task::spawn_blocking(move || -> Result<ChatMessage> {
            db.insert_message(&row)?;
            ChatMessage::try_from(row)
        })
        .await?
    }

    async fn delete_message(&self, message_id: String, connected_id: String) -> Result<bool> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || -> Result<bool> {
            match db.get_message(&message_id)? {
                Some(row) if row.connected_id == connected_id => db.delete_message(&message_id),
                _ => Ok(false),
            }
        })
        .await?
    }

    async fn message_senders(
        &self,
        connected_id: String,
        message_ids: Vec<String>,
    ) -> Result<HashMap<String, String>> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || db.get_message_senders(&connected_id, &message_ids))
            .await?
    }

    async fn is_participant(&self, connected_id: String, user_id: String) -> Result<bool> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || db.is_participant(&connected_id, &user_id)).await?
    }
}
