//! Unified error type for the Gridlock server.

use gridlock_protocol::ProtocolError;
use gridlock_room::GameError;
use gridlock_session::SessionError;
use gridlock_transport::TransportError;

/// Top-level error wrapping each layer's error type.
///
/// The `#[from]` impls let `?` lift sub-crate errors automatically, so
/// server code deals with one error type throughout.
#[derive(Debug, thiserror::Error)]
pub enum GridlockError {
    /// A transport-level error (accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (auth, resume, expiry).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A game-lifecycle error (locked, full, not found, …).
    #[error(transparent)]
    Game(#[from] GameError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let top: GridlockError = err.into();
        assert!(matches!(top, GridlockError::Transport(_)));
        assert!(top.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidMessage("bad".into());
        let top: GridlockError = err.into();
        assert!(matches!(top, GridlockError::Protocol(_)));
    }

    #[test]
    fn test_from_session_error() {
        let err = SessionError::AuthFailed("nope".into());
        let top: GridlockError = err.into();
        assert!(matches!(top, GridlockError::Session(_)));
    }

    #[test]
    fn test_from_game_error() {
        let err = GameError::NotFound(gridlock_protocol::GameId(1));
        let top: GridlockError = err.into();
        assert!(matches!(top, GridlockError::Game(_)));
        assert!(top.to_string().contains("not found"));
    }
}
