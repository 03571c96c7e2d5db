use thiserror::Error;

/// Why a relay operation was refused or failed. The display text is what
/// the client receives in `messageError` and failed acknowledgements.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Session is not associated with a user")]
    Anonymous,

    #[error("Sender does not match the connected user")]
    SenderMismatch,

    #[error("Not a participant of conversation {0}")]
    NotParticipant(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(&'static str),

    #[error("Message not found")]
    MessageNotFound(String),

    /// The store failed; `cause` is logged, never sent to clients.
    #[error("Failed to {action}")]
    Store {
        action: &'static str,
        cause: anyhow::Error,
    },
}

impl RelayError {
    pub fn store(action: &'static str, cause: anyhow::Error) -> Self {
        Self::Store { action, cause }
    }
}
