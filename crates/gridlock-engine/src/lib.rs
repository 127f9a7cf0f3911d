//! Authoritative game rules for Gridlock.
//!
//! This crate is pure game logic: no sockets, no clocks, no tasks. The
//! room layer owns a [`GameState`] per match, feeds it validated player
//! identities and [`ClientAction`]s, and gets back scoped [`GameEvent`]s
//! plus a [`ClockDirective`] telling it how to retune its countdowns.
//!
//! # Module map
//!
//! - [`board`] — tiles, doors, walls, items, and BFS reachability
//! - [`pawn`] — a player's in-game piece: position, inventory, health
//! - [`turn`] — the rotating turn scheduler state machine
//! - [`combat`] — dice resolution and escape attempts
//! - [`events`] — the action/event/rejection wire vocabulary
//! - [`state`] — [`GameState::apply`], the validator/applier dispatch
//! - [`config`] — tunable rules ([`GameConfig`], [`CombatConfig`])
//!
//! Everything that involves chance (attack dice, escape rolls) takes
//! `&mut impl Rng`, so tests drive outcomes with a seeded generator.

pub mod board;
pub mod combat;
pub mod config;
pub mod events;
pub mod pawn;
pub mod state;
pub mod turn;

pub use board::{Coord, GameMap, Item, MapError, Terrain, Tile};
pub use combat::{AttackOutcome, CombatState};
pub use config::{CombatConfig, GameConfig};
pub use events::{ClientAction, EndReason, GameEvent, Rejection, Snapshot, TileView};
pub use pawn::Pawn;
pub use state::{ClockDirective, GameState, Outcome};
pub use turn::{TurnError, TurnPhase, TurnScheduler};
