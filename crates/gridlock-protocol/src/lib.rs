//! Wire protocol for Gridlock.
//!
//! This crate defines the language that clients and the game server speak:
//!
//! - **Types** ([`Envelope`], [`SystemMessage`], [`Scope`], identity
//!   newtypes) — the structures that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how those structures are
//!   converted to and from bytes.
//! - **Errors** ([`ProtocolError`]) — what can go wrong while encoding or
//!   decoding.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw frames) and the session
//! and room layers (player identity, game membership). It knows nothing
//! about connections or games — only how messages are shaped.
//!
//! Game traffic itself (actions in, game events out) is opaque to this
//! crate: it rides inside [`Payload::Game`] as codec-encoded bytes, and the
//! engine crate owns those types. Everything lobby- and connection-related
//! is a [`SystemMessage`] here.

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    Envelope, GameId, GameListEntry, Payload, PlayerId, Scope, SystemMessage,
};
