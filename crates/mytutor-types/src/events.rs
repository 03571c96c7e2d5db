use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::models::{ChatMessage, DeliveryStatus};

/// Raw frame sent FROM client TO server: `{"event": ..., "data": ..., "ack": ...}`.
#[derive(Debug, Deserialize)]
struct RawFrame {
    event: String,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    ack: Option<u64>,
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unknown event '{0}'")]
    UnknownEvent(String),

    #[error("invalid payload for '{event}': {source}")]
    InvalidPayload {
        event: String,
        source: serde_json::Error,
    },
}

/// A decoded client frame. `ack` is present when the client expects an
/// acknowledgement for this event.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundFrame {
    pub event: ClientEvent,
    pub ack: Option<u64>,
}

impl FromStr for InboundFrame {
    type Err = ProtocolError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let raw: RawFrame = serde_json::from_str(text)?;
        let event = ClientEvent::decode(&raw.event, raw.data)?;
        Ok(Self {
            event,
            ack: raw.ack,
        })
    }
}

/// Events sent FROM client TO server.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    JoinConversation { connected_id: String },
    LeaveConversation { connected_id: String },
    SendMessage(SendMessagePayload),
    DeleteMessage(DeleteMessagePayload),
    MarkAsRead(MarkAsReadPayload),
    Typing(TypingPayload),
}

impl ClientEvent {
    pub fn decode(event: &str, data: Value) -> Result<Self, ProtocolError> {
        fn payload<T: for<'de> Deserialize<'de>>(
            event: &str,
            data: Value,
        ) -> Result<T, ProtocolError> {
            serde_json::from_value(data).map_err(|source| ProtocolError::InvalidPayload {
                event: event.to_string(),
                source,
            })
        }

        match event {
            "joinConversation" => Ok(Self::JoinConversation {
                connected_id: payload(event, data)?,
            }),
            "leaveConversation" => Ok(Self::LeaveConversation {
                connected_id: payload(event, data)?,
            }),
            "sendMessage" => payload(event, data).map(Self::SendMessage),
            "deleteMessage" => payload(event, data).map(Self::DeleteMessage),
            "markAsRead" => payload(event, data).map(Self::MarkAsRead),
            "typing" => payload(event, data).map(Self::Typing),
            other => Err(ProtocolError::UnknownEvent(other.to_string())),
        }
    }

    /// Wire name of the event, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinConversation { .. } => "joinConversation",
            Self::LeaveConversation { .. } => "leaveConversation",
            Self::SendMessage(_) => "sendMessage",
            Self::DeleteMessage(_) => "deleteMessage",
            Self::MarkAsRead(_) => "markAsRead",
            Self::Typing(_) => "typing",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessagePayload {
    pub sender_id: String,
    pub receiver_id: String,
    pub message: String,
    pub connected_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteMessagePayload {
    pub message_id: String,
    pub connected_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkAsReadPayload {
    pub message_ids: Vec<String>,
    pub connected_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingPayload {
    pub connected_id: String,
    pub is_typing: bool,
}

/// Events sent FROM server TO client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    /// Everyone currently online, sent on any connect/disconnect
    OnlineUsers(Vec<String>),

    /// A message was persisted in a room this session joined
    NewMessage(ChatMessage),

    /// Delivery or read receipt for a message this session sent
    MessageStatus(MessageStatusPayload),

    /// A message was removed from a room this session joined
    MessageDeleted(String),

    MessageError(MessageErrorPayload),

    /// Another participant started or stopped typing.
    /// `connected_id` carries the typing user's id, not the room id.
    UserTyping(UserTypingPayload),

    /// Reply to a client frame that carried an `ack` id
    Ack(AckPayload),
}

impl ServerEvent {
    pub fn delivered(message_id: impl Into<String>) -> Self {
        Self::MessageStatus(MessageStatusPayload {
            message_id: message_id.into(),
            status: DeliveryStatus::Delivered,
        })
    }

    pub fn read(message_id: impl Into<String>) -> Self {
        Self::MessageStatus(MessageStatusPayload {
            message_id: message_id.into(),
            status: DeliveryStatus::Read,
        })
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self::MessageError(MessageErrorPayload {
            error: error.into(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageStatusPayload {
    pub message_id: String,
    pub status: DeliveryStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageErrorPayload {
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserTypingPayload {
    pub connected_id: String,
    pub is_typing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckPayload {
    pub id: u64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AckPayload {
    pub fn ok(id: u64, message: Option<ChatMessage>) -> Self {
        Self {
            id,
            success: true,
            message,
            error: None,
        }
    }

    pub fn failed(id: u64, error: impl Into<String>) -> Self {
        Self {
            id,
            success: false,
            message: None,
            error: Some(error.into()),
        }
    }
}
