//! Error types for the session layer.

/// Errors from client-session management: authentication, presence
/// transitions, and resume attempts.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The token was invalid, expired, or rejected by the
    /// [`Authenticator`](crate::Authenticator).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// No session exists for the given player.
    #[error("no session for player {0}")]
    NotFound(gridlock_protocol::PlayerId),

    /// The resume token doesn't match anything the server issued.
    #[error("invalid resume token")]
    InvalidToken,

    /// The resume grace window has closed.
    #[error("session expired for player {0}")]
    Expired(gridlock_protocol::PlayerId),

    /// The player already has an online session. One connection per
    /// player.
    #[error("player {0} is already connected")]
    AlreadyConnected(gridlock_protocol::PlayerId),
}
