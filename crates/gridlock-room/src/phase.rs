//! The game lifecycle state machine.

use serde::{Deserialize, Serialize};

/// Lifecycle of one game room.
///
/// ```text
/// Lobby → InProgress → Ended
/// ```
///
/// - **Lobby**: accepting joins (subject to lock/capacity), waiting for
///   the creator to start.
/// - **InProgress**: the match is running; joins are rejected, observers
///   are still admitted.
/// - **Ended**: decided or torn down; kept only until the registry
///   releases the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    Lobby,
    InProgress,
    Ended,
}

impl GamePhase {
    /// Whether new *players* may join. Observers are admitted in any
    /// phase but `Ended`.
    pub fn is_joinable(&self) -> bool {
        matches!(self, Self::Lobby)
    }

    /// Whether the match is running.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::InProgress)
    }
}

impl std::fmt::Display for GamePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lobby => write!(f, "Lobby"),
            Self::InProgress => write!(f, "InProgress"),
            Self::Ended => write!(f, "Ended"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_lobby_is_joinable() {
        assert!(GamePhase::Lobby.is_joinable());
        assert!(!GamePhase::InProgress.is_joinable());
        assert!(!GamePhase::Ended.is_joinable());
    }

    #[test]
    fn test_only_in_progress_is_active() {
        assert!(!GamePhase::Lobby.is_active());
        assert!(GamePhase::InProgress.is_active());
        assert!(!GamePhase::Ended.is_active());
    }

    #[test]
    fn test_display() {
        assert_eq!(GamePhase::Lobby.to_string(), "Lobby");
        assert_eq!(GamePhase::InProgress.to_string(), "InProgress");
    }
}
