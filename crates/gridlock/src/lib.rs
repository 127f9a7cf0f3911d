//! # Gridlock
//!
//! A server-authoritative multiplayer session engine for a turn-based
//! grid game: players create and join game rooms, act under per-room
//! countdown clocks (move, fight, loot, toggle doors, break walls), and
//! every state change reaches the room as one ordered event stream.
//!
//! This meta-crate ties the layers together:
//!
//! ```text
//! transport (WebSocket frames)
//!   → protocol (envelopes, system messages, codec)
//!     → session (identity, presence, resume)
//!       → room (game registry, per-game actors, countdowns)
//!         → engine (board, turns, combat — the actual rules)
//! ```
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use gridlock::prelude::*;
//!
//! # struct MyAuth;
//! # impl Authenticator for MyAuth {
//! #     async fn authenticate(&self, t: &str) -> Result<PlayerId, SessionError> {
//! #         t.parse().map(PlayerId).map_err(|_| SessionError::AuthFailed("bad".into()))
//! #     }
//! # }
//! # async fn run() -> Result<(), GridlockError> {
//! let store = MemoryMapStore::new()
//!     .with(GameMap::parse("arena", &["#####", "#S.S#", "#####"]).unwrap());
//!
//! let server = GridlockServerBuilder::new()
//!     .bind("0.0.0.0:8080")
//!     .build(store, MyAuth)
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod server;

pub use error::GridlockError;
pub use server::{GridlockServer, GridlockServerBuilder, PROTOCOL_VERSION};

/// One-stop imports for building and talking to a Gridlock server.
pub mod prelude {
    pub use crate::{GridlockError, GridlockServer, GridlockServerBuilder, PROTOCOL_VERSION};

    pub use gridlock_engine::{
        ClientAction, Coord, GameConfig, GameEvent, GameMap, Item, Rejection,
        Snapshot, Terrain,
    };
    pub use gridlock_protocol::{
        Codec, Envelope, GameId, JsonCodec, Payload, PlayerId, Scope, SystemMessage,
    };
    pub use gridlock_room::{GameError, GameRegistry, MapStore, MemoryMapStore};
    pub use gridlock_session::{Authenticator, SessionConfig, SessionError};
}
