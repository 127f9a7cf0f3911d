//! Error types for the game-room layer.
//!
//! These are the lifecycle conflicts of the error taxonomy: expected,
//! typed, and reported to the requesting client. In-game rule denials are
//! not errors — they travel as
//! [`Rejection`](gridlock_engine::Rejection) values inside the event
//! stream.

use gridlock_engine::MapError;
use gridlock_protocol::{GameId, PlayerId};

/// Errors that can occur during game lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    /// No game with this id.
    #[error("game {0} not found")]
    NotFound(GameId),

    /// The creator locked the game against joins.
    #[error("game {0} is locked")]
    Locked(GameId),

    /// No player slots left.
    #[error("game {0} is full")]
    Full(GameId),

    /// The game already left the lobby.
    #[error("game {0} already started")]
    AlreadyStarted(GameId),

    /// A client can be in at most one game at a time.
    #[error("player {0} is already in a game")]
    AlreadyInGame(PlayerId),

    /// The player is not a member of this game.
    #[error("player {0} is not in this game")]
    NotInGame(PlayerId),

    /// Kick, lock, and start are creator-only.
    #[error("only the game creator may do this")]
    NotCreator,

    /// The lobby is short of the configured minimum.
    #[error("need {need} players to start, have {have}")]
    NotEnoughPlayers { have: usize, need: usize },

    /// The map store has no map by that name.
    #[error("map {0:?} not found")]
    MapNotFound(String),

    /// The map failed validation for this lobby.
    #[error("map rejected: {0}")]
    InvalidMap(#[from] MapError),

    /// The game's command channel is gone (actor shut down).
    #[error("game {0} is unavailable")]
    Unavailable(GameId),
}
