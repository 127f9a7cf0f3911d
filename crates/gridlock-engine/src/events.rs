//! The game-traffic vocabulary: actions in, events out, rejections back.
//!
//! These types ride inside `Payload::Game` as codec-encoded bytes — the
//! protocol crate treats them as opaque. Shapes here are therefore part of
//! the client contract and are pinned by serde tests.

use gridlock_protocol::PlayerId;
use serde::{Deserialize, Serialize};

use crate::board::{Coord, Item, Terrain};
use crate::pawn::Pawn;

// ---------------------------------------------------------------------------
// Client actions
// ---------------------------------------------------------------------------

/// Everything a player can ask for during a match. One closed enum,
/// dispatched through one `GameState::apply` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientAction {
    /// Walk to `to` along walkable tiles, spending budget per step.
    Move { to: Coord },
    /// Smash an adjacent wall into rubble. Consumes the rest of the budget.
    BreakWall { at: Coord },
    /// Open or close an adjacent door.
    ToggleDoor { at: Coord },
    /// Put a carried item down on the current tile.
    DropItem { item: Item },
    /// Start combat with an adjacent player.
    Engage { target: PlayerId },
    /// Combat only: strike the opponent.
    Attack,
    /// Combat only: try to flee.
    AttemptEscape,
    /// Surrender the rest of the turn.
    EndTurn,
}

// ---------------------------------------------------------------------------
// Rejections
// ---------------------------------------------------------------------------

/// Why an action was denied. Rule violations are normal play, not
/// failures — they go back to the requester alone and nothing else
/// happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rejection {
    /// The actor does not hold the current (or combat) turn.
    NotYourTurn,
    /// Target beyond reach: too far, not adjacent, or over budget.
    OutOfRange,
    /// The destination tile is occupied by another pawn.
    Occupied,
    /// No free inventory slot.
    InventoryFull,
    /// The target doesn't exist or is the wrong kind of thing.
    InvalidTarget,
    /// Attack/escape outside combat.
    NotInCombat,
    /// Board actions while combat is running.
    InCombat,
    /// The match hasn't started (or already ended).
    NotStarted,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Rejection::NotYourTurn => "not your turn",
            Rejection::OutOfRange => "out of range",
            Rejection::Occupied => "tile is occupied",
            Rejection::InventoryFull => "inventory is full",
            Rejection::InvalidTarget => "invalid target",
            Rejection::NotInCombat => "not in combat",
            Rejection::InCombat => "combat is in progress",
            Rejection::NotStarted => "game is not in progress",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// One tile as seen on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileView {
    pub at: Coord,
    pub terrain: Terrain,
    pub item: Option<Item>,
}

/// The full authoritative state, sent on game start and to late-joining
/// observers. Tiles are a list rather than a coordinate map so the JSON
/// needs no stringified keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub map_name: String,
    pub width: i32,
    pub height: i32,
    pub tiles: Vec<TileView>,
    pub pawns: Vec<Pawn>,
    pub current: Option<PlayerId>,
    pub budget: u32,
}

// ---------------------------------------------------------------------------
// Game events
// ---------------------------------------------------------------------------

/// Why a match ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndReason {
    /// Everyone else was eliminated or left.
    LastPlayerStanding,
    /// The rotation emptied out entirely.
    NoActivePlayers,
    /// The game was torn down from outside (creator left the lobby,
    /// server shutdown).
    Closed,
    /// An internal invariant was violated; the game was ended defensively.
    InternalFault,
}

/// Server → clients: everything that can happen in a room, in the order
/// it happened. The room layer pairs each event with a delivery
/// [`Scope`](gridlock_protocol::Scope) when fanning out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GameEvent {
    // -- Membership --
    PlayerJoined { player: PlayerId },
    ObserverJoined { player: PlayerId },
    PlayerLeft { player: PlayerId },
    PlayerKicked { player: PlayerId },
    GameLockToggled { locked: bool },

    // -- Match flow --
    GameStarted { snapshot: Snapshot },
    /// Catch-up snapshot for observers and resuming clients attaching to
    /// a running game.
    StateSync { snapshot: Snapshot },
    TurnStarted { actor: PlayerId, budget: u32 },
    SecondPassed { remaining: u64 },
    GameEnded { reason: EndReason, winner: Option<PlayerId> },

    // -- Board actions --
    PlayerMoved { player: PlayerId, to: Coord, cost: u32, budget: u32 },
    ItemPickedUp { player: PlayerId, item: Item, at: Coord },
    /// Sent only to the would-be collector: the item stayed on the floor.
    InventoryFull { item: Item, at: Coord },
    WallBroken { player: PlayerId, at: Coord },
    DoorToggled { player: PlayerId, at: Coord, open: bool },
    ItemDropped { player: PlayerId, item: Item, at: Coord },

    // -- Combat --
    CombatStarted { attacker: PlayerId, defender: PlayerId },
    CombatTurn { actor: PlayerId },
    CombatSecondPassed { remaining: u64 },
    AttackResolved {
        attacker: PlayerId,
        defender: PlayerId,
        attack_roll: i32,
        defense_roll: i32,
        damage: i32,
        /// Defender's health after the hit.
        health: i32,
    },
    EscapeAttempted { player: PlayerId, succeeded: bool, attempts_left: u8 },
    CombatEnded { victor: Option<PlayerId>, escaped: Option<PlayerId> },
    PlayerEliminated { player: PlayerId, by: Option<PlayerId> },

    // -- Rejections (requester only) --
    ActionRejected { reason: Rejection },
}

// =========================================================================
// Tests
// =========================================================================
