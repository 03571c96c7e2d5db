use std::sync::Arc;

use tracing::{debug, error, info, warn};

use mytutor_types::events::{
    AckPayload, ClientEvent, DeleteMessagePayload, InboundFrame, MarkAsReadPayload,
    SendMessagePayload, ServerEvent, TypingPayload, UserTypingPayload,
};
use mytutor_types::models::ChatMessage;

use crate::SessionId;
use crate::dispatcher::Dispatcher;
use crate::error::RelayError;
use crate::store::{MessageStore, NewMessage};

pub const MAX_MESSAGE_CHARS: usize = 4000;

/// Trust decisions applied to client-supplied identifiers.
#[derive(Debug, Clone, Copy)]
pub struct RelayPolicy {
    /// Only admit a session to a room if its user is a party to the conversation.
    pub verify_membership: bool,
    /// Require `senderId` to equal the session's user id.
    pub bind_sender: bool,
}

impl Default for RelayPolicy {
    fn default() -> Self {
        Self {
            verify_membership: true,
            bind_sender: true,
        }
    }
}

/// Handles client events: room membership, message persistence and fan-out,
/// receipts and typing indicators.
#[derive(Clone)]
pub struct MessageRelay {
    dispatcher: Dispatcher,
    store: Arc<dyn MessageStore>,
    policy: RelayPolicy,
}

impl MessageRelay {
    pub fn new(dispatcher: Dispatcher, store: Arc<dyn MessageStore>, policy: RelayPolicy) -> Self {
        Self {
            dispatcher,
            store,
            policy,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Handle one client frame. Failures are reported to the originating
    /// session only, as a `messageError` plus a failed ack when one was requested.
    pub async fn handle(&self, session_id: SessionId, frame: InboundFrame) {
        let name = frame.event.name();
        let result = match frame.event {
            ClientEvent::JoinConversation { connected_id } => {
                self.join(session_id, &connected_id).await.map(|_| None)
            }
            ClientEvent::LeaveConversation { connected_id } => {
                self.leave(session_id, &connected_id).await;
                Ok(None)
            }
            ClientEvent::SendMessage(payload) => {
                self.send_message(session_id, payload).await.map(Some)
            }
            ClientEvent::DeleteMessage(payload) => {
                self.delete_message(session_id, payload).await.map(|_| None)
            }
            ClientEvent::MarkAsRead(payload) => {
                self.mark_as_read(session_id, payload).await.map(|_| None)
            }
            ClientEvent::Typing(payload) => {
                self.typing(session_id, payload).await;
                Ok(None)
            }
        };

        match result {
            Ok(message) => {
                if let Some(ack) = frame.ack {
                    self.dispatcher
                        .emit_to_session(session_id, ServerEvent::Ack(AckPayload::ok(ack, message)))
                        .await;
                }
            }
            Err(e) => {
                if let RelayError::Store { cause, .. } = &e {
                    error!("{} from session {} failed: {:#}", name, session_id, cause);
                } else {
                    debug!("{} from session {} refused: {}", name, session_id, e);
                }

                let text = e.to_string();
                if let Some(ack) = frame.ack {
                    self.dispatcher
                        .emit_to_session(session_id, ServerEvent::Ack(AckPayload::failed(ack, &text)))
                        .await;
                }
                self.dispatcher
                    .emit_to_session(session_id, ServerEvent::error(text))
                    .await;
            }
        }
    }

    pub async fn join(&self, session_id: SessionId, connected_id: &str) -> Result<(), RelayError> {
        if self.policy.verify_membership {
            let user_id = self
                .dispatcher
                .session_user(session_id)
                .await
                .ok_or(RelayError::Anonymous)?;
            self.require_participant(connected_id, &user_id).await?;
        }

        if self.dispatcher.join_room(connected_id, session_id).await {
            info!("session {} joined conversation {}", session_id, connected_id);
        }
        Ok(())
    }

    pub async fn leave(&self, session_id: SessionId, connected_id: &str) {
        if self.dispatcher.leave_room(connected_id, session_id).await {
            info!("session {} left conversation {}", session_id, connected_id);
        }
    }

    /// Persist a message, relay it to the room and send a delivery receipt
    /// back if the receiver is online.
    pub async fn send_message(
        &self,
        session_id: SessionId,
        payload: SendMessagePayload,
    ) -> Result<ChatMessage, RelayError> {
        if payload.message.trim().is_empty() {
            return Err(RelayError::InvalidMessage("message is empty"));
        }
        if payload.message.chars().count() > MAX_MESSAGE_CHARS {
            return Err(RelayError::InvalidMessage("message is too long"));
        }
        if payload.sender_id == payload.receiver_id {
            return Err(RelayError::InvalidMessage("receiver is the sender"));
        }

        if self.policy.bind_sender {
            let user_id = self
                .dispatcher
                .session_user(session_id)
                .await
                .ok_or(RelayError::Anonymous)?;
            if user_id != payload.sender_id {
                warn!(
                    "session {} ({}) tried to send as {}",
                    session_id, user_id, payload.sender_id
                );
                return Err(RelayError::SenderMismatch);
            }
        }

        if self.policy.verify_membership {
            self.require_participant(&payload.connected_id, &payload.sender_id)
                .await?;
            self.require_participant(&payload.connected_id, &payload.receiver_id)
                .await?;
        }

        let message = self
            .store
            .create_message(NewMessage {
                sender_id: payload.sender_id,
                receiver_id: payload.receiver_id,
                connected_id: payload.connected_id,
                message: payload.message,
            })
            .await
            .map_err(|e| RelayError::store("send message", e))?;

        let reached = self
            .dispatcher
            .emit_to_room(
                &message.connected_id,
                ServerEvent::NewMessage(message.clone()),
                None,
            )
            .await;
        debug!(
            "message {} relayed to {} sessions in {}",
            message.id, reached, message.connected_id
        );

        if let Some(receiver_session) = self.dispatcher.user_session(&message.receiver_id).await {
            self.dispatcher
                .emit_to_session(receiver_session, ServerEvent::delivered(&message.id))
                .await;
        }

        Ok(message)
    }

    pub async fn delete_message(
        &self,
        session_id: SessionId,
        payload: DeleteMessagePayload,
    ) -> Result<(), RelayError> {
        if self.policy.verify_membership {
            let user_id = self
                .dispatcher
                .session_user(session_id)
                .await
                .ok_or(RelayError::Anonymous)?;
            self.require_participant(&payload.connected_id, &user_id)
                .await?;
        }

        let removed = self
            .store
            .delete_message(payload.message_id.clone(), payload.connected_id.clone())
            .await
            .map_err(|e| RelayError::store("delete message", e))?;

        if !removed {
            return Err(RelayError::MessageNotFound(payload.message_id));
        }

        info!(
            "message {} deleted from {}",
            payload.message_id, payload.connected_id
        );
        self.dispatcher
            .emit_to_room(
                &payload.connected_id,
                ServerEvent::MessageDeleted(payload.message_id),
                None,
            )
            .await;
        Ok(())
    }

    /// Notify each message's sender, if online, that it was read. One
    /// receipt per id; ids unknown to the conversation or sent by the reader
    /// are skipped. Returns the receipts sent.
    pub async fn mark_as_read(
        &self,
        session_id: SessionId,
        payload: MarkAsReadPayload,
    ) -> Result<usize, RelayError> {
        let reader = self.dispatcher.session_user(session_id).await;
        if self.policy.verify_membership {
            let user_id = reader.as_deref().ok_or(RelayError::Anonymous)?;
            self.require_participant(&payload.connected_id, user_id)
                .await?;
        }

        if payload.message_ids.is_empty() {
            return Ok(0);
        }

        let senders = self
            .store
            .message_senders(payload.connected_id.clone(), payload.message_ids.clone())
            .await
            .map_err(|e| RelayError::store("mark messages as read", e))?;

        let mut sent = 0;
        for message_id in &payload.message_ids {
            let Some(sender_id) = senders.get(message_id) else {
                continue;
            };
            if reader.as_deref() == Some(sender_id.as_str()) {
                continue;
            }
            if self
                .dispatcher
                .emit_to_user(sender_id, ServerEvent::read(message_id))
                .await
            {
                sent += 1;
            }
        }
        Ok(sent)
    }

    /// Relay a typing indicator to the rest of the room, tagged with the
    /// sender's user id. With membership verification on, only sessions
    /// that joined the room may signal in it.
    pub async fn typing(&self, session_id: SessionId, payload: TypingPayload) {
        let Some(user_id) = self.dispatcher.session_user(session_id).await else {
            return;
        };
        if self.policy.verify_membership
            && !self.dispatcher.in_room(&payload.connected_id, session_id).await
        {
            debug!(
                "session {} typing in {} without joining, dropped",
                session_id, payload.connected_id
            );
            return;
        }

        self.dispatcher
            .emit_to_room(
                &payload.connected_id,
                ServerEvent::UserTyping(UserTypingPayload {
                    connected_id: user_id,
                    is_typing: payload.is_typing,
                }),
                Some(session_id),
            )
            .await;
    }

    async fn require_participant(&self, connected_id: &str, user_id: &str) -> Result<(), RelayError> {
        let ok = self
            .store
            .is_participant(connected_id.to_string(), user_id.to_string())
            .await
            .map_err(|e| RelayError::store("check conversation membership", e))?;
        if ok {
            Ok(())
        } else {
            Err(RelayError::NotParticipant(connected_id.to_string()))
        }
    }
}
