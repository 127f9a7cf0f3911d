//! The client registry: every player the server currently knows about.
//!
//! # Concurrency note
//!
//! `ClientRegistry` is a plain `HashMap` wrapper, not a concurrent
//! structure. It is owned behind one mutex at the server layer; keeping
//! it lock-free here avoids paying twice.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use gridlock_protocol::PlayerId;
use rand::Rng;

use crate::{ClientSession, ClientState, SessionConfig, SessionError};

/// Tracks all online and recently-offline clients.
///
/// ```text
/// connect() ──→ [Online] ──disconnect()──→ [Offline] ──resume()──→ [Online]
///                                             │
///                                      expire_stale()
///                                             ▼
///                                         [Expired] ──→ sweep_expired()
/// ```
pub struct ClientRegistry {
    /// Sessions keyed by player — one session per player, enforced on
    /// `connect`.
    sessions: HashMap<PlayerId, ClientSession>,

    /// Resume-token index, kept in sync with `sessions` so a `ResumeGame`
    /// lookup never scans.
    tokens: HashMap<String, PlayerId>,

    config: SessionConfig,
}

impl ClientRegistry {
    /// Creates an empty registry with the given config.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            sessions: HashMap::new(),
            tokens: HashMap::new(),
            config,
        }
    }

    /// Registers a freshly authenticated client and issues its resume
    /// token.
    ///
    /// A leftover offline/expired session for the same player is
    /// replaced (and its old token invalidated).
    ///
    /// # Errors
    /// [`SessionError::AlreadyConnected`] if the player already has an
    /// online session.
    pub fn connect(
        &mut self,
        player_id: PlayerId,
    ) -> Result<&ClientSession, SessionError> {
        if let Some(existing) = self.sessions.get(&player_id) {
            if matches!(existing.state, ClientState::Online) {
                return Err(SessionError::AlreadyConnected(player_id));
            }
            self.tokens.remove(&existing.resume_token);
        }

        let token = generate_token();
        self.tokens.insert(token.clone(), player_id);
        self.sessions.insert(
            player_id,
            ClientSession {
                player_id,
                state: ClientState::Online,
                resume_token: token,
            },
        );

        tracing::info!(%player_id, "client connected");
        Ok(self.sessions.get(&player_id).expect("just inserted"))
    }

    /// Marks a client offline, opening its resume grace window.
    ///
    /// # Errors
    /// [`SessionError::NotFound`] if the player has no session.
    pub fn disconnect(&mut self, player_id: PlayerId) -> Result<(), SessionError> {
        let session = self
            .sessions
            .get_mut(&player_id)
            .ok_or(SessionError::NotFound(player_id))?;

        session.state = ClientState::Offline {
            since: Instant::now(),
        };
        tracing::info!(%player_id, "client offline, resume window open");
        Ok(())
    }

    /// Reclaims an offline session by resume token.
    ///
    /// # Errors
    /// - [`SessionError::InvalidToken`] — token not recognized
    /// - [`SessionError::Expired`] — grace window closed
    /// - [`SessionError::AlreadyConnected`] — the session never dropped
    pub fn resume(&mut self, token: &str) -> Result<&ClientSession, SessionError> {
        let player_id = self
            .tokens
            .get(token)
            .copied()
            .ok_or(SessionError::InvalidToken)?;

        let session = self
            .sessions
            .get_mut(&player_id)
            .ok_or(SessionError::InvalidToken)?;

        match &session.state {
            ClientState::Offline { since } => {
                let grace = Duration::from_secs(self.config.resume_grace_secs);
                if since.elapsed() > grace {
                    session.state = ClientState::Expired;
                    return Err(SessionError::Expired(player_id));
                }
                session.state = ClientState::Online;
                tracing::info!(%player_id, "client resumed");
                Ok(self.sessions.get(&player_id).expect("just updated"))
            }
            ClientState::Online => Err(SessionError::AlreadyConnected(player_id)),
            ClientState::Expired => Err(SessionError::Expired(player_id)),
        }
    }

    /// Expires every offline session whose grace window has closed.
    /// Returns the players that expired, so the caller can cascade the
    /// departure into their games before sweeping.
    pub fn expire_stale(&mut self) -> Vec<PlayerId> {
        let grace = Duration::from_secs(self.config.resume_grace_secs);
        let mut expired = Vec::new();

        for session in self.sessions.values_mut() {
            if let ClientState::Offline { since } = &session.state {
                if since.elapsed() > grace {
                    session.state = ClientState::Expired;
                    expired.push(session.player_id);
                    tracing::info!(
                        player_id = %session.player_id,
                        "client session expired"
                    );
                }
            }
        }

        expired
    }

    /// Removes expired sessions and invalidates their tokens. Separate
    /// from [`expire_stale`](Self::expire_stale) so callers can react to
    /// expirations before the records disappear.
    pub fn sweep_expired(&mut self) {
        self.sessions.retain(|_, session| {
            if matches!(session.state, ClientState::Expired) {
                self.tokens.remove(&session.resume_token);
                false
            } else {
                true
            }
        });
    }

    /// Looks up a session by player.
    pub fn get(&self, player_id: &PlayerId) -> Option<&ClientSession> {
        self.sessions.get(player_id)
    }

    /// Number of tracked sessions, in any state.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// 32 lowercase hex chars — 128 bits of entropy, unguessable in practice.
fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Time-dependent behavior is tested without sleeping: a 0-second
    //! grace makes offline sessions expire immediately, a 1-hour grace
    //! makes them effectively immortal for the test's duration.

    use super::*;

    fn instant_expiry() -> ClientRegistry {
        ClientRegistry::new(SessionConfig {
            resume_grace_secs: 0,
        })
    }

    fn long_grace() -> ClientRegistry {
        ClientRegistry::new(SessionConfig {
            resume_grace_secs: 3600,
        })
    }

    fn pid(id: u64) -> PlayerId {
        PlayerId(id)
    }

    // -- connect -----------------------------------------------------------

    #[test]
    fn test_connect_issues_online_session_with_token() {
        let mut reg = long_grace();
        let session = reg.connect(pid(1)).expect("should connect");
        assert!(matches!(session.state, ClientState::Online));
        assert_eq!(session.player_id, pid(1));
        assert_eq!(session.resume_token.len(), 32);
    }

    #[test]
    fn test_connect_tokens_are_unique() {
        let mut reg = long_grace();
        let t1 = reg.connect(pid(1)).unwrap().resume_token.clone();
        let t2 = reg.connect(pid(2)).unwrap().resume_token.clone();
        assert_ne!(t1, t2);
    }

    #[test]
    fn test_double_connect_rejected() {
        let mut reg = long_grace();
        reg.connect(pid(1)).unwrap();
        assert!(matches!(
            reg.connect(pid(1)),
            Err(SessionError::AlreadyConnected(p)) if p == pid(1)
        ));
    }

    #[test]
    fn test_connect_replaces_offline_session_and_old_token() {
        let mut reg = long_grace();
        let old_token = reg.connect(pid(1)).unwrap().resume_token.clone();
        reg.disconnect(pid(1)).unwrap();

        reg.connect(pid(1)).expect("fresh session replaces offline one");
        assert!(
            matches!(reg.resume(&old_token), Err(SessionError::InvalidToken)),
            "replaced session's token must be dead"
        );
    }

    // -- disconnect / resume -----------------------------------------------

    #[test]
    fn test_disconnect_marks_offline_and_keeps_token() {
        let mut reg = long_grace();
        let token = reg.connect(pid(1)).unwrap().resume_token.clone();
        reg.disconnect(pid(1)).unwrap();

        let session = reg.get(&pid(1)).unwrap();
        assert!(matches!(session.state, ClientState::Offline { .. }));
        assert_eq!(session.resume_token, token);
    }

    #[test]
    fn test_disconnect_unknown_player_not_found() {
        let mut reg = long_grace();
        assert!(matches!(
            reg.disconnect(pid(9)),
            Err(SessionError::NotFound(p)) if p == pid(9)
        ));
    }

    #[test]
    fn test_resume_within_grace_restores_online() {
        let mut reg = long_grace();
        let token = reg.connect(pid(1)).unwrap().resume_token.clone();
        reg.disconnect(pid(1)).unwrap();

        let session = reg.resume(&token).expect("within grace");
        assert!(matches!(session.state, ClientState::Online));
        assert_eq!(session.player_id, pid(1));
    }

    #[test]
    fn test_resume_with_bogus_token_rejected() {
        let mut reg = long_grace();
        reg.connect(pid(1)).unwrap();
        reg.disconnect(pid(1)).unwrap();
        assert!(matches!(
            reg.resume("not-a-token"),
            Err(SessionError::InvalidToken)
        ));
    }

    #[test]
    fn test_resume_after_grace_expires_session() {
        let mut reg = instant_expiry();
        let token = reg.connect(pid(1)).unwrap().resume_token.clone();
        reg.disconnect(pid(1)).unwrap();

        assert!(matches!(
            reg.resume(&token),
            Err(SessionError::Expired(p)) if p == pid(1)
        ));
    }

    #[test]
    fn test_resume_while_online_rejected() {
        let mut reg = long_grace();
        let token = reg.connect(pid(1)).unwrap().resume_token.clone();
        assert!(matches!(
            reg.resume(&token),
            Err(SessionError::AlreadyConnected(p)) if p == pid(1)
        ));
    }

    // -- expiry sweep ------------------------------------------------------

    #[test]
    fn test_expire_stale_reports_only_timed_out_clients() {
        let mut reg = instant_expiry();
        reg.connect(pid(1)).unwrap();
        reg.connect(pid(2)).unwrap();
        reg.disconnect(pid(1)).unwrap();

        let expired = reg.expire_stale();
        assert_eq!(expired, vec![pid(1)]);
        assert!(matches!(
            reg.get(&pid(2)).unwrap().state,
            ClientState::Online
        ));
    }

    #[test]
    fn test_expire_stale_spares_sessions_within_grace() {
        let mut reg = long_grace();
        reg.connect(pid(1)).unwrap();
        reg.disconnect(pid(1)).unwrap();
        assert!(reg.expire_stale().is_empty());
    }

    #[test]
    fn test_sweep_removes_expired_and_invalidates_token() {
        let mut reg = instant_expiry();
        let token = reg.connect(pid(1)).unwrap().resume_token.clone();
        reg.disconnect(pid(1)).unwrap();
        reg.expire_stale();
        assert_eq!(reg.len(), 1, "expired but not yet swept");

        reg.sweep_expired();
        assert!(reg.is_empty());
        assert!(matches!(
            reg.resume(&token),
            Err(SessionError::InvalidToken)
        ));
    }

    #[test]
    fn test_sweep_keeps_live_sessions() {
        let mut reg = instant_expiry();
        reg.connect(pid(1)).unwrap();
        reg.connect(pid(2)).unwrap();
        reg.disconnect(pid(1)).unwrap();
        reg.expire_stale();
        reg.sweep_expired();

        assert_eq!(reg.len(), 1);
        assert!(reg.get(&pid(1)).is_none());
        assert!(reg.get(&pid(2)).is_some());
    }

    // -- full lifecycle ----------------------------------------------------

    #[test]
    fn test_drop_and_resume_round_trip() {
        let mut reg = long_grace();
        let token = reg.connect(pid(1)).unwrap().resume_token.clone();
        reg.disconnect(pid(1)).unwrap();
        reg.resume(&token).unwrap();
        assert!(matches!(
            reg.get(&pid(1)).unwrap().state,
            ClientState::Online
        ));
    }

    #[test]
    fn test_independent_lifecycles_do_not_interfere() {
        let mut reg = long_grace();
        let t1 = reg.connect(pid(1)).unwrap().resume_token.clone();
        reg.connect(pid(2)).unwrap();

        reg.disconnect(pid(1)).unwrap();
        reg.resume(&t1).unwrap();

        assert!(matches!(
            reg.get(&pid(2)).unwrap().state,
            ClientState::Online
        ));
    }
}
