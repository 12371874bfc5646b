//! Error types for the conference channel

use thiserror::Error;

/// Result type alias for conference channel operations
pub type Result<T> = std::result::Result<T, ChannelError>;

/// Errors reported through failure callbacks and observer broadcasts.
///
/// Callers distinguish failure categories by the message text; the strings
/// are part of the protocol surface and must not change.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChannelError {
    /// A required stream or media handle was absent
    #[error("Nullptr is not allowed.")]
    NullArgument,

    /// The stream to publish has no live tracks
    #[error("Cannot publish ended stream.")]
    EndedStream,

    /// The stream to publish has no tracks at all
    #[error("Cannot publish media stream without any tracks.")]
    NoTracks,

    /// Subscribe options not satisfiable by the remote stream
    #[error("Unsupported subscribe option.")]
    UnsupportedSubscribeOption,

    /// An operation is already outstanding on this channel
    #[error("{0}")]
    AlreadyInProgress(String),

    /// The supplied session id does not match the channel's session
    #[error("{0}")]
    SessionIdMismatch(String),

    /// Committing a local or remote description failed
    #[error("{0}")]
    DescriptionSetFailed(String),

    /// The signaling server acknowledged the operation with "failure"
    #[error("Server internal error during connection establishment.")]
    ServerReportedFailure,

    /// Terminal ICE failure on a previously connected session
    #[error("Stream ICE connection failed.")]
    TransportConnectionFailed,

    /// Control or stats requested with neither a publish nor a subscribe held
    #[error("No stream associated with the session")]
    NoActiveStream,

    /// Media transport capability failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Signaling transport capability failure
    #[error("Signaling error: {0}")]
    Signaling(String),
}

impl ChannelError {
    /// Error for a subscribe attempted while another is in flight
    pub fn subscribe_in_progress() -> Self {
        Self::AlreadyInProgress("Subscribing this stream.".to_string())
    }

    /// Error for an unsubscribe attempted while a subscribe is in flight
    pub fn unsubscribe_during_subscribe() -> Self {
        Self::AlreadyInProgress("Cannot unsubscribe a stream during subscribing.".to_string())
    }

    /// Error for an unpublish with a stale or foreign session id
    pub fn invalid_unpublish() -> Self {
        Self::SessionIdMismatch("Invalid stream to be unpublished.".to_string())
    }

    /// Error for an unsubscribe with a stale or foreign session id
    pub fn invalid_unsubscribe() -> Self {
        Self::SessionIdMismatch("Invalid stream to be unsubscribed.".to_string())
    }

    /// Error for a failed local description commit
    pub fn set_local_failed() -> Self {
        Self::DescriptionSetFailed("Failed to set local description.".to_string())
    }

    /// Error for a failed remote description commit, as reported through the
    /// failure callback
    pub fn set_remote_failed() -> Self {
        Self::DescriptionSetFailed("Fail to set remote description.".to_string())
    }

    /// Error for a failed remote description commit, as broadcast to
    /// observers
    pub fn remote_description_error() -> Self {
        Self::DescriptionSetFailed("Failed to set remote description.".to_string())
    }
}
