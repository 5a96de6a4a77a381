//! Error types for chatwire.

use thiserror::Error;

/// A malformed protocol unit.
///
/// Returned synchronously by the parsers and framers. Connection loops log
/// and skip the offending unit; buffer state for later units is unaffected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    /// The `@tags` section was not terminated by a space.
    #[error("no space found to end tag section")]
    UnterminatedTags,

    /// The `:prefix` section was not terminated by a space.
    #[error("no space found to end prefix")]
    UnterminatedPrefix,

    /// The line had no command word.
    #[error("missing command")]
    MissingCommand,

    /// Raw CR, LF or NUL inside a tag value.
    #[error("invalid character {0:?} in tag value")]
    InvalidTagCharacter(char),

    /// A line grew past the configured maximum without a terminator.
    #[error("line exceeds maximum length of {max} bytes")]
    LineTooLong { max: usize },

    /// A WebSocket message was not valid UTF-8.
    #[error("message is not valid UTF-8")]
    InvalidUtf8,

    /// A JSON unit could not be decoded or lacked its routing field.
    #[error("invalid JSON unit: {0}")]
    InvalidJson(String),

    /// A JSON unit carried a discriminator outside the closed set.
    #[error("unknown message type: {0}")]
    UnknownMessageType(String),
}

/// Main error type for all chatwire operations.
#[derive(Debug, Error)]
pub enum ChatwireError {
    /// I/O error on the chat transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error on an outbound unit.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket transport error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Malformed inbound unit.
    #[error("format error: {0}")]
    Format(#[from] FormatError),

    /// Connection closed unexpectedly, or the writer is gone.
    #[error("Connection closed")]
    ConnectionClosed,

    /// The wait was abandoned because the cancellation token fired.
    #[error("Operation cancelled")]
    Cancelled,

    /// The rate limiter was shut down while the caller waited.
    #[error("Rate limiter closed")]
    Closed,

    /// A session-bound action was attempted before the welcome arrived.
    #[error("Session not ready")]
    NotReady,

    /// A subscription request refers to a session that has been replaced.
    #[error("Stale session: request bound to {requested}, current is {current}")]
    StaleSession { requested: String, current: String },

    /// Protocol violation that is not a single malformed unit.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Result type alias using ChatwireError.
pub type Result<T> = std::result::Result<T, ChatwireError>;
