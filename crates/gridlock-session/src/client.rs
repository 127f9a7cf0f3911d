//! Per-client session data.

use std::time::Instant;

use gridlock_protocol::PlayerId;

/// Configuration for client-session behavior.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long (seconds) an offline client may resume before its
    /// session expires for good. 0 disables resuming entirely.
    pub resume_grace_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            resume_grace_secs: 30,
        }
    }
}

/// Presence state of one client.
///
/// ```text
///   Online ──(disconnect)──→ Offline ──(grace elapses)──→ Expired
///      ↑                        │
///      └────────(resume)────────┘
/// ```
///
/// `Instant` (monotonic) rather than wall-clock time, so a system clock
/// jump can't expire everyone at once.
#[derive(Debug, Clone)]
pub enum ClientState {
    /// Actively connected.
    Online,

    /// Connection dropped at `since`; resumable until the grace window
    /// closes.
    Offline { since: Instant },

    /// Grace window closed. The session is dead and will be swept.
    Expired,
}

/// The server's record of one connected (or recently connected) client.
#[derive(Debug, Clone)]
pub struct ClientSession {
    /// Which player this session belongs to.
    pub player_id: PlayerId,

    /// Current presence state.
    pub state: ClientState,

    /// Secret the client presents in `ResumeGame` to reclaim this
    /// identity after a drop. 32 hex chars (128 bits) — issued once in
    /// the handshake ack, never logged.
    pub resume_token: String,
}
