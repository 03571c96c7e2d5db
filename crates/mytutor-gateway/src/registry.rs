use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::SessionId;

/// Maps user ids to their active transport session.
///
/// At most one session is registered per user: the last connection wins.
/// The in-memory implementation is process-local; running several gateway
/// instances needs a shared implementation behind this trait.
#[async_trait]
pub trait PresenceRegistry: Send + Sync {
    /// Map `user_id` to `session_id`, replacing any earlier session.
    /// Returns the replaced session, if any.
    async fn register(&self, user_id: &str, session_id: SessionId) -> Option<SessionId>;

    /// Remove the mapping, but only if `session_id` is still the registered one.
    async fn unregister(&self, user_id: &str, session_id: SessionId) -> bool;

    async fn lookup(&self, user_id: &str) -> Option<SessionId>;

    /// Online user ids, sorted.
    async fn snapshot(&self) -> Vec<String>;
}

#[derive(Default)]
pub struct InMemoryRegistry {
    sessions: RwLock<HashMap<String, SessionId>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PresenceRegistry for InMemoryRegistry {
    async fn register(&self, user_id: &str, session_id: SessionId) -> Option<SessionId> {
        self.sessions
            .write()
            .await
            .insert(user_id.to_string(), session_id)
    }

    async fn unregister(&self, user_id: &str, session_id: SessionId) -> bool {
        let mut sessions = self.sessions.write().await;
        if sessions.get(user_id) == Some(&session_id) {
            sessions.remove(user_id);
            true
        } else {
            false
        }
    }

    async fn lookup(&self, user_id: &str) -> Option<SessionId> {
        self.sessions.read().await.get(user_id).copied()
    }

    async fn snapshot(&self) -> Vec<String> {
        let mut users: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        users.sort();
        users
    }
}
