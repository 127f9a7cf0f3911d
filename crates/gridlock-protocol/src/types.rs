//! Core wire types: identities, delivery scopes, envelopes, and the
//! system-message catalog for the lobby/connection surface.

use serde::{Deserialize, Serialize};

use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a player.
///
/// Newtype over `u64` so a player id can never be confused with a game id.
/// `#[serde(transparent)]` keeps the JSON representation a plain number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// A unique identifier for a game (one lobby or in-progress match).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(pub u64);

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "G-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Scope — who should receive an event?
// ---------------------------------------------------------------------------

/// Delivery scope for a game event.
///
/// Every state-changing operation in a game room produces events paired
/// with a `Scope` telling the fan-out where each one goes. Observers count
/// as room members for `Room` and `ExcludeActor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scope {
    /// Every member of the room, players and observers alike.
    Room,

    /// One specific recipient (e.g. an inventory-full notice).
    Player(PlayerId),

    /// Everyone except the acting player — for effects the actor already
    /// observed locally.
    ExcludeActor(PlayerId),
}

// ---------------------------------------------------------------------------
// Game listings
// ---------------------------------------------------------------------------

/// A summary of one game returned in lobby listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameListEntry {
    /// The game's unique ID.
    pub game_id: GameId,
    /// Name of the map the game is played on.
    pub map: String,
    /// Number of players currently in the game.
    pub player_count: usize,
    /// Maximum players allowed.
    pub max_players: usize,
    /// Whether the creator has locked the game against new joins.
    pub locked: bool,
    /// Whether the game has left the lobby phase.
    pub in_progress: bool,
}

// ---------------------------------------------------------------------------
// SystemMessage — connection and lobby plumbing
// ---------------------------------------------------------------------------

/// Framework-level messages: connecting, heartbeats, and the game-lifecycle
/// surface (create/join/observe/resume/leave/kick/lock/start/list).
///
/// `#[serde(tag = "type")]` produces internally tagged JSON
/// (`{ "type": "JoinGame", "game_id": 3 }`), which keeps the client side
/// simple to dispatch on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SystemMessage {
    // -- Connection lifecycle --
    /// Client → Server: first message on any connection.
    Handshake {
        version: u32,
        token: Option<String>,
    },

    /// Server → Client: connection accepted. `resume_token` lets the client
    /// reclaim this identity after a disconnect (see `ResumeGame`).
    HandshakeAck {
        player_id: PlayerId,
        resume_token: String,
        server_time: u64,
    },

    /// Either direction: the connection is going away.
    Disconnect { reason: String },

    // -- Heartbeat (keep-alive) --
    /// Client → Server: liveness ping with the client's local timestamp.
    Heartbeat { client_time: u64 },

    /// Server → Client: echo for RTT / clock-offset calculation.
    HeartbeatAck { client_time: u64, server_time: u64 },

    // -- Game lifecycle --
    /// Client → Server: create a new game on the named map.
    CreateGame { map: String },

    /// Server → Client: the game was created and the creator joined it.
    GameCreated { game_id: GameId },

    /// Client → Server: join an existing game as a player.
    JoinGame { game_id: GameId },

    /// Client → Server: join an existing game as a spectator. Observers
    /// receive room broadcasts but never hold a turn.
    ObserveGame { game_id: GameId },

    /// Client → Server: reclaim a previous identity after a disconnect,
    /// re-attaching to the game it was in.
    ResumeGame { token: String },

    /// Server → Client: membership confirmed (join, observe, or resume).
    GameJoined { game_id: GameId },

    /// Client → Server: leave the current game.
    LeaveGame,

    /// Client → Server: remove a player from the game. Creator only.
    KickPlayer { player_id: PlayerId },

    /// Client → Server: set the game's lock state. Creator only.
    ToggleGameLock { locked: bool },

    /// Client → Server: begin the match. Creator only, lobby only.
    StartGame,

    /// Client → Server: list joinable and running games.
    ListGames,

    /// Server → Client: the current game listings.
    GameList { games: Vec<GameListEntry> },

    // -- Errors --
    /// Server → Client: a request failed. `code` follows HTTP-style
    /// conventions (400 bad request, 403 forbidden, 404 not found, 409
    /// conflict).
    Error { code: u16, message: String },
}

// ---------------------------------------------------------------------------
// Payload and Envelope — the top-level wire format
// ---------------------------------------------------------------------------

/// The content of a message: system plumbing, or opaque game traffic.
///
/// Adjacently tagged (`{ "type": "Game", "data": [...] }`) so the handler
/// can route on the outer tag without touching the inner bytes. Game bytes
/// are a codec-encoded action (inbound) or game event (outbound); only the
/// engine crate knows their shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Payload {
    /// A framework-level message (handshake, heartbeat, game lifecycle).
    System(SystemMessage),

    /// Game-specific traffic, opaque to the protocol layer.
    Game(Vec<u8>),
}

/// The top-level wrapper. Every frame on the wire is one `Envelope`.
///
/// `seq` is a per-sender counter used to detect missing or reordered
/// frames; `timestamp` is milliseconds since the server started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Auto-incrementing sequence number, per sender.
    pub seq: u64,

    /// Milliseconds since the server started.
    pub timestamp: u64,

    /// The actual message content.
    pub payload: Payload,
}

// =========================================================================
// Tests
// =========================================================================
