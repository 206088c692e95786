//! Error types for the wire protocol.

use geobase_types::ValidationError;

/// Errors turning a text message into a request, or a reply into text.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The message was blank.
    #[error("empty message")]
    Empty,

    /// The text after the command is not (relaxed) JSON.
    #[error("invalid body: {0}")]
    InvalidBody(String),

    /// The command needs a body and none was sent.
    #[error("{command} requires a body")]
    MissingBody { command: String },

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// The body is JSON but does not describe a valid request.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("failed to serialize body: {0}")]
    Serialize(#[from] serde_json::Error),
}
