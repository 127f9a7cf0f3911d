//! Game lifecycle management for Gridlock.
//!
//! Each game runs as an isolated Tokio task (actor model) owning its
//! authoritative [`GameState`](gridlock_engine::GameState), its membership
//! roster, and both countdown clocks. All mutations — player actions,
//! membership changes, clock expiries — arrive through the actor's one
//! command channel and are applied strictly in arrival order, so game
//! logic never needs a lock and clients never observe events out of
//! order.
//!
//! # Key types
//!
//! - [`GameRegistry`] — creates/destroys games, routes players, enforces
//!   the one-game-per-player invariant
//! - [`GameHandle`] — send commands to a running game actor
//! - [`GamePhase`] — lobby → in-progress → ended lifecycle
//! - [`MapStore`] — the external map-lookup collaborator

#![allow(async_fn_in_trait)]

mod error;
mod phase;
mod registry;
mod room;
mod store;

pub use error::GameError;
pub use phase::GamePhase;
pub use registry::GameRegistry;
pub use room::{GameHandle, GameInfo, PlayerSender};
pub use store::{MapStore, MemoryMapStore};
