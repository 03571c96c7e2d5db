use std::collections::{HashMap, HashSet};

use tokio::sync::RwLock;

use crate::SessionId;

/// Conversation rooms: connected_id -> sessions currently joined.
#[derive(Default)]
pub struct RoomMembership {
    rooms: RwLock<HashMap<String, HashSet<SessionId>>>,
}

impl RoomMembership {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the session was already in the room.
    pub async fn join(&self, room: &str, session_id: SessionId) -> bool {
        self.rooms
            .write()
            .await
            .entry(room.to_string())
            .or_default()
            .insert(session_id)
    }

    /// Returns false if the session was not in the room.
    pub async fn leave(&self, room: &str, session_id: SessionId) -> bool {
        let mut rooms = self.rooms.write().await;
        let Some(members) = rooms.get_mut(room) else {
            return false;
        };
        let removed = members.remove(&session_id);
        if members.is_empty() {
            rooms.remove(room);
        }
        removed
    }

    /// Remove the session from every room. Returns the rooms it left.
    pub async fn leave_all(&self, session_id: SessionId) -> Vec<String> {
        let mut rooms = self.rooms.write().await;
        let mut left = Vec::new();
        rooms.retain(|room, members| {
            if members.remove(&session_id) {
                left.push(room.clone());
            }
            !members.is_empty()
        });
        left
    }

    pub async fn members(&self, room: &str) -> Vec<SessionId> {
        self.rooms
            .read()
            .await
            .get(room)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    pub async fn is_member(&self, room: &str, session_id: SessionId) -> bool {
        self.rooms
            .read()
            .await
            .get(room)
            .is_some_and(|members| members.contains(&session_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_join_and_leave() {
        let rooms = RoomMembership::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        assert!(rooms.join("c1", a).await);
        assert!(!rooms.join("c1", a).await);
        assert!(rooms.join("c1", b).await);
        assert_eq!(rooms.members("c1").await.len(), 2);

        assert!(rooms.leave("c1", a).await);
        assert!(!rooms.leave("c1", a).await);
        assert!(!rooms.is_member("c1", a).await);
        assert!(rooms.is_member("c1", b).await);
    }

    #[tokio::test]
    async fn test_leave_unknown_room() {
        let rooms = RoomMembership::new();
        assert!(!rooms.leave("nowhere", Uuid::new_v4()).await);
        assert!(rooms.members("nowhere").await.is_empty());
    }

    #[tokio::test]
    async fn test_leave_all_drops_empty_rooms() {
        let rooms = RoomMembership::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        rooms.join("c1", a).await;
        rooms.join("c2", a).await;
        rooms.join("c2", b).await;

        let mut left = rooms.leave_all(a).await;
        left.sort();
        assert_eq!(left, vec!["c1", "c2"]);

        assert!(rooms.members("c1").await.is_empty());
        assert_eq!(rooms.members("c2").await, vec![b]);
    }
}
