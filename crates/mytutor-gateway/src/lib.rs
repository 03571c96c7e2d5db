pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod registry;
pub mod relay;
pub mod rooms;
pub mod store;

/// Identifies one transport session (one WebSocket).
pub type SessionId = uuid::Uuid;
