use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info};
use uuid::Uuid;

use mytutor_types::events::ServerEvent;

use crate::SessionId;
use crate::registry::{InMemoryRegistry, PresenceRegistry};
use crate::rooms::RoomMembership;

struct Session {
    /// None for clients that connected without a user id
    user_id: Option<String>,
    tx: mpsc::UnboundedSender<ServerEvent>,
}

/// Manages all connected sessions, presence and conversation rooms.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// Outbound channel per transport session
    sessions: RwLock<HashMap<SessionId, Session>>,

    /// Online users: user_id -> current session
    registry: Arc<dyn PresenceRegistry>,

    rooms: RoomMembership,
}

impl Dispatcher {
    pub fn new(registry: Arc<dyn PresenceRegistry>) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                sessions: RwLock::new(HashMap::new()),
                registry,
                rooms: RoomMembership::new(),
            }),
        }
    }

    /// Dispatcher backed by a process-local registry.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryRegistry::new()))
    }

    /// Open a session for a new connection. If `user_id` is present the user
    /// is registered (replacing any older session) and presence is
    /// republished to everyone; otherwise the new session only receives the
    /// current online list.
    pub async fn open_session(
        &self,
        user_id: Option<String>,
    ) -> (SessionId, mpsc::UnboundedReceiver<ServerEvent>) {
        let session_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();

        self.inner.sessions.write().await.insert(
            session_id,
            Session {
                user_id: user_id.clone(),
                tx,
            },
        );

        match user_id {
            Some(user_id) => {
                if let Some(replaced) = self.inner.registry.register(&user_id, session_id).await {
                    debug!("{} reconnected, session {} replaces {}", user_id, session_id, replaced);
                }
                self.publish_presence().await;
            }
            None => {
                let online = self.inner.registry.snapshot().await;
                self.emit_to_session(session_id, ServerEvent::OnlineUsers(online))
                    .await;
            }
        }

        (session_id, rx)
    }

    /// Tear down a session: leave its rooms, unregister its user if this
    /// session is still the registered one, and republish presence.
    pub async fn close_session(&self, session_id: SessionId) {
        let Some(session) = self.inner.sessions.write().await.remove(&session_id) else {
            return;
        };

        let left = self.inner.rooms.leave_all(session_id).await;
        if !left.is_empty() {
            debug!("session {} left {} rooms on close", session_id, left.len());
        }

        if let Some(user_id) = session.user_id {
            if !self.inner.registry.unregister(&user_id, session_id).await {
                // A newer connection has taken over; the user stays online
                debug!("{} closed stale session {}", user_id, session_id);
            }
            self.publish_presence().await;
        }
    }

    pub async fn session_user(&self, session_id: SessionId) -> Option<String> {
        self.inner
            .sessions
            .read()
            .await
            .get(&session_id)
            .and_then(|s| s.user_id.clone())
    }

    /// Returns false if the session is gone.
    pub async fn emit_to_session(&self, session_id: SessionId, event: ServerEvent) -> bool {
        let sessions = self.inner.sessions.read().await;
        match sessions.get(&session_id) {
            Some(session) => session.tx.send(event).is_ok(),
            None => false,
        }
    }

    /// Send a targeted event to a user's current session, if they are online.
    pub async fn emit_to_user(&self, user_id: &str, event: ServerEvent) -> bool {
        match self.inner.registry.lookup(user_id).await {
            Some(session_id) => self.emit_to_session(session_id, event).await,
            None => false,
        }
    }

    /// Send an event to every session in a room, optionally skipping one.
    /// Returns the number of sessions reached.
    pub async fn emit_to_room(
        &self,
        room: &str,
        event: ServerEvent,
        except: Option<SessionId>,
    ) -> usize {
        let members = self.inner.rooms.members(room).await;
        let sessions = self.inner.sessions.read().await;

        members
            .into_iter()
            .filter(|id| Some(*id) != except)
            .filter_map(|id| sessions.get(&id))
            .filter(|session| session.tx.send(event.clone()).is_ok())
            .count()
    }

    /// Send an event to all connected sessions.
    pub async fn broadcast(&self, event: ServerEvent) {
        let sessions = self.inner.sessions.read().await;
        for session in sessions.values() {
            let _ = session.tx.send(event.clone());
        }
    }

    pub async fn publish_presence(&self) {
        let online = self.inner.registry.snapshot().await;
        info!("{} users online", online.len());
        self.broadcast(ServerEvent::OnlineUsers(online)).await;
    }

    pub async fn online_users(&self) -> Vec<String> {
        self.inner.registry.snapshot().await
    }

    pub async fn user_session(&self, user_id: &str) -> Option<SessionId> {
        self.inner.registry.lookup(user_id).await
    }

    pub async fn join_room(&self, room: &str, session_id: SessionId) -> bool {
        self.inner.rooms.join(room, session_id).await
    }

    pub async fn leave_room(&self, room: &str, session_id: SessionId) -> bool {
        self.inner.rooms.leave(room, session_id).await
    }

    pub async fn in_room(&self, room: &str, session_id: SessionId) -> bool {
        self.inner.rooms.is_member(room, session_id).await
    }
}
