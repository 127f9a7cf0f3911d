//! Connected-client tracking for Gridlock.
//!
//! The game registry (one layer up) tracks who is in which *game*; this
//! crate tracks who is *connected* at all:
//!
//! 1. **Authentication** — validating who a client is ([`Authenticator`])
//! 2. **Presence** — online/offline state per player ([`ClientRegistry`])
//! 3. **Resume** — letting a dropped client reclaim its identity within a
//!    grace window, so a WiFi blip doesn't cost a player their match
//!    (token-based; the token rides in the handshake ack and comes back
//!    in `ResumeGame`)

#![allow(async_fn_in_trait)]

mod auth;
mod client;
mod error;
mod registry;

pub use auth::Authenticator;
pub use client::{ClientSession, ClientState, SessionConfig};
pub use error::SessionError;
pub use registry::ClientRegistry;
