//! Per-connection handler: handshake, auth, message routing, and the
//! outbound event pump.
//!
//! Each accepted connection gets its own task running this handler:
//!
//! 1. Receive `Handshake` → validate version
//! 2. Authenticate the token → `PlayerId`, register the client session
//! 3. Send `HandshakeAck` (carries the resume token)
//! 4. Loop: decode envelopes → system messages handled here, game
//!    actions routed to the player's room
//!
//! When the player enters a game, the handler opens an event channel,
//! hands the send half to the room, and spawns a pump task that encodes
//! each [`GameEvent`] into an envelope and writes it to the socket. The
//! room actor pushes events in operation order and the pump preserves
//! it — one writer per connection, no reordering.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use gridlock_engine::{ClientAction, GameEvent};
use gridlock_protocol::{Codec, Envelope, Payload, PlayerId, SystemMessage};
use gridlock_room::{GameError, MapStore};
use gridlock_session::Authenticator;
use gridlock_transport::{Connection, WsConnection};
use tokio::sync::mpsc;

use crate::GridlockError;
use crate::server::{PROTOCOL_VERSION, ServerState};

/// Inactivity cutoff; heartbeats arrive every ~5s, so a silent half
/// minute means the peer is gone.
const IDLE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Handshake must complete promptly or the slot is freed.
const HANDSHAKE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// Drop guard that marks the player's session offline when the handler
/// exits, however it exits. `Drop` is synchronous, so the async lock
/// rides a fire-and-forget task.
struct SessionGuard<S: MapStore, A: Authenticator, C: Codec> {
    player_id: PlayerId,
    state: Arc<ServerState<S, A, C>>,
}

impl<S: MapStore, A: Authenticator, C: Codec> Drop for SessionGuard<S, A, C> {
    fn drop(&mut self) {
        let player_id = self.player_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let mut sessions = state.sessions.lock().await;
            let _ = sessions.disconnect(player_id);
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<S, A, C>(
    conn: WsConnection,
    state: Arc<ServerState<S, A, C>>,
) -> Result<(), GridlockError>
where
    S: MapStore,
    A: Authenticator,
    C: Codec,
{
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    // Shared between the handler and the event pump so the server-side
    // sequence stays strictly increasing per connection.
    let seq = Arc::new(AtomicU64::new(1));

    let (player_id, resume_token) = perform_handshake(&conn, &state, &seq).await?;
    tracing::info!(%conn_id, %player_id, "player authenticated");

    let _guard = SessionGuard {
        player_id,
        state: Arc::clone(&state),
    };

    loop {
        let data = match tokio::time::timeout(IDLE_TIMEOUT, conn.recv()).await {
            Ok(Ok(Some(data))) => data,
            Ok(Ok(None)) => {
                tracing::info!(%player_id, "connection closed cleanly");
                break;
            }
            Ok(Err(e)) => {
                tracing::debug!(%player_id, error = %e, "recv error");
                break;
            }
            Err(_) => {
                tracing::info!(%player_id, "connection timed out");
                break;
            }
        };

        let envelope: Envelope = match state.codec.decode(&data) {
            Ok(env) => env,
            Err(e) => {
                tracing::debug!(%player_id, error = %e, "failed to decode envelope");
                continue;
            }
        };

        match envelope.payload {
            Payload::System(msg) => {
                let should_close = handle_system_message(
                    &conn,
                    &state,
                    player_id,
                    &resume_token,
                    msg,
                    &seq,
                )
                .await?;
                if should_close {
                    break;
                }
            }
            Payload::Game(game_data) => {
                handle_game_action(&conn, &state, player_id, game_data, &seq).await?;
            }
        }
    }

    // _guard drops here → the session goes offline, grace window opens.
    Ok(())
}

/// Performs the handshake: receive `Handshake`, validate, authenticate,
/// register the session, send the ack. Returns the player and their
/// resume token.
async fn perform_handshake<S, A, C>(
    conn: &Arc<WsConnection>,
    state: &Arc<ServerState<S, A, C>>,
    seq: &Arc<AtomicU64>,
) -> Result<(PlayerId, String), GridlockError>
where
    S: MapStore,
    A: Authenticator,
    C: Codec,
{
    let data = match tokio::time::timeout(HANDSHAKE_TIMEOUT, conn.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(invalid("connection closed before handshake"));
        }
        Ok(Err(e)) => return Err(GridlockError::Transport(e)),
        Err(_) => return Err(invalid("handshake timed out")),
    };

    let envelope: Envelope = state.codec.decode(&data)?;
    let (version, token) = match envelope.payload {
        Payload::System(SystemMessage::Handshake { version, token }) => {
            (version, token)
        }
        _ => {
            send_error(conn, state, 400, "expected Handshake", seq).await?;
            return Err(invalid("first message must be Handshake"));
        }
    };

    if version != PROTOCOL_VERSION {
        send_error(
            conn,
            state,
            400,
            &format!("version mismatch: expected {PROTOCOL_VERSION}, got {version}"),
            seq,
        )
        .await?;
        return Err(invalid("protocol version mismatch"));
    }

    let token = token.unwrap_or_default();

    // A valid resume token restores the previous identity without a trip
    // to the auth provider; anything else must authenticate.
    let resumed = {
        let mut sessions = state.sessions.lock().await;
        sessions.resume(&token).ok().map(|s| (s.player_id, s.resume_token.clone()))
    };
    let (player_id, resume_token) = match resumed {
        Some(restored) => restored,
        None => {
            let player_id = match state.auth.authenticate(&token).await {
                Ok(pid) => pid,
                Err(e) => {
                    send_error(conn, state, 401, "unauthorized", seq).await?;
                    return Err(GridlockError::Session(e));
                }
            };
            let mut sessions = state.sessions.lock().await;
            match sessions.connect(player_id) {
                Ok(session) => (player_id, session.resume_token.clone()),
                Err(e) => {
                    drop(sessions);
                    send_error(conn, state, 409, &e.to_string(), seq).await?;
                    return Err(GridlockError::Session(e));
                }
            }
        }
    };

    send_system(
        conn,
        state,
        SystemMessage::HandshakeAck {
            player_id,
            resume_token: resume_token.clone(),
            server_time: state.started.elapsed().as_millis() as u64,
        },
        seq,
    )
    .await?;

    Ok((player_id, resume_token))
}

/// Handles one system message. Returns `true` if the connection should
/// close.
async fn handle_system_message<S, A, C>(
    conn: &Arc<WsConnection>,
    state: &Arc<ServerState<S, A, C>>,
    player_id: PlayerId,
    resume_token: &str,
    msg: SystemMessage,
    seq: &Arc<AtomicU64>,
) -> Result<bool, GridlockError>
where
    S: MapStore,
    A: Authenticator,
    C: Codec,
{
    match msg {
        SystemMessage::Heartbeat { client_time } => {
            send_system(
                conn,
                state,
                SystemMessage::HeartbeatAck {
                    client_time,
                    server_time: state.started.elapsed().as_millis() as u64,
                },
                seq,
            )
            .await?;
        }

        SystemMessage::CreateGame { map } => {
            let (tx, rx) = mpsc::unbounded_channel();
            let result = {
                let mut games = state.games.lock().await;
                games.create_game(&map, player_id, tx).await
            };
            match result {
                Ok(game_id) => {
                    spawn_event_pump(conn, state, seq, rx);
                    send_system(conn, state, SystemMessage::GameCreated { game_id }, seq)
                        .await?;
                }
                Err(e) => send_game_error(conn, state, &e, seq).await?,
            }
        }

        SystemMessage::JoinGame { game_id } => {
            let (tx, rx) = mpsc::unbounded_channel();
            let result = {
                let mut games = state.games.lock().await;
                games.join_game(player_id, game_id, tx).await
            };
            match result {
                Ok(()) => {
                    spawn_event_pump(conn, state, seq, rx);
                    send_system(conn, state, SystemMessage::GameJoined { game_id }, seq)
                        .await?;
                }
                Err(e) => send_game_error(conn, state, &e, seq).await?,
            }
        }

        SystemMessage::ObserveGame { game_id } => {
            let (tx, rx) = mpsc::unbounded_channel();
            let result = {
                let mut games = state.games.lock().await;
                games.observe_game(player_id, game_id, tx).await
            };
            match result {
                Ok(()) => {
                    spawn_event_pump(conn, state, seq, rx);
                    send_system(conn, state, SystemMessage::GameJoined { game_id }, seq)
                        .await?;
                }
                Err(e) => send_game_error(conn, state, &e, seq).await?,
            }
        }

        SystemMessage::ResumeGame { token } => {
            if token != resume_token {
                send_error(conn, state, 401, "invalid resume token", seq).await?;
                return Ok(false);
            }
            let (tx, rx) = mpsc::unbounded_channel();
            let result = {
                let mut games = state.games.lock().await;
                games.reattach(player_id, tx).await
            };
            match result {
                Ok(game_id) => {
                    spawn_event_pump(conn, state, seq, rx);
                    send_system(conn, state, SystemMessage::GameJoined { game_id }, seq)
                        .await?;
                }
                Err(e) => send_game_error(conn, state, &e, seq).await?,
            }
        }

        SystemMessage::LeaveGame => {
            let result = {
                let mut games = state.games.lock().await;
                games.leave_game(player_id).await
            };
            if let Err(e) = result {
                tracing::debug!(%player_id, error = %e, "leave game failed");
            }
        }

        SystemMessage::KickPlayer { player_id: target } => {
            let result = {
                let mut games = state.games.lock().await;
                games.kick_player(player_id, target).await
            };
            if let Err(e) = result {
                send_game_error(conn, state, &e, seq).await?;
            }
        }

        SystemMessage::ToggleGameLock { locked } => {
            let result = {
                let mut games = state.games.lock().await;
                games.set_lock(player_id, locked).await
            };
            if let Err(e) = result {
                send_game_error(conn, state, &e, seq).await?;
            }
        }

        SystemMessage::StartGame => {
            let result = {
                let mut games = state.games.lock().await;
                games.start_game(player_id).await
            };
            if let Err(e) = result {
                send_game_error(conn, state, &e, seq).await?;
            }
        }

        SystemMessage::ListGames => {
            let games = state.games.lock().await.list_games().await;
            send_system(conn, state, SystemMessage::GameList { games }, seq).await?;
        }

        SystemMessage::Disconnect { reason } => {
            tracing::info!(%player_id, %reason, "client disconnected");
            return Ok(true);
        }

        _ => {
            tracing::debug!(%player_id, "ignoring unexpected system message");
        }
    }

    Ok(false)
}

/// Decodes a game action and routes it to the player's room.
async fn handle_game_action<S, A, C>(
    conn: &Arc<WsConnection>,
    state: &Arc<ServerState<S, A, C>>,
    player_id: PlayerId,
    game_data: Vec<u8>,
    seq: &Arc<AtomicU64>,
) -> Result<(), GridlockError>
where
    S: MapStore,
    A: Authenticator,
    C: Codec,
{
    let action: ClientAction = match state.codec.decode(&game_data) {
        Ok(action) => action,
        Err(e) => {
            send_error(conn, state, 400, &format!("invalid action: {e}"), seq).await?;
            return Ok(());
        }
    };

    let result = state.games.lock().await.route_action(player_id, action).await;
    if let Err(e) = result {
        send_game_error(conn, state, &e, seq).await?;
    }
    Ok(())
}

/// Forwards room events to the socket, preserving the room's order.
/// Exits when the room drops the channel (leave/kick/teardown) or the
/// socket dies.
fn spawn_event_pump<S, A, C>(
    conn: &Arc<WsConnection>,
    state: &Arc<ServerState<S, A, C>>,
    seq: &Arc<AtomicU64>,
    mut rx: mpsc::UnboundedReceiver<GameEvent>,
) where
    S: MapStore,
    A: Authenticator,
    C: Codec,
{
    let conn = Arc::clone(conn);
    let state = Arc::clone(state);
    let seq = Arc::clone(seq);
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let data = match state.codec.encode(&event) {
                Ok(data) => data,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to encode game event");
                    continue;
                }
            };
            let envelope = Envelope {
                seq: seq.fetch_add(1, Ordering::Relaxed),
                timestamp: state.started.elapsed().as_millis() as u64,
                payload: Payload::Game(data),
            };
            let bytes = match state.codec.encode(&envelope) {
                Ok(bytes) => bytes,
                Err(_) => continue,
            };
            if conn.send(&bytes).await.is_err() {
                break;
            }
        }
    });
}

async fn send_system<S, A, C>(
    conn: &Arc<WsConnection>,
    state: &Arc<ServerState<S, A, C>>,
    msg: SystemMessage,
    seq: &Arc<AtomicU64>,
) -> Result<(), GridlockError>
where
    S: MapStore,
    A: Authenticator,
    C: Codec,
{
    let envelope = Envelope {
        seq: seq.fetch_add(1, Ordering::Relaxed),
        timestamp: state.started.elapsed().as_millis() as u64,
        payload: Payload::System(msg),
    };
    let bytes = state.codec.encode(&envelope)?;
    conn.send(&bytes).await.map_err(GridlockError::Transport)
}

async fn send_error<S, A, C>(
    conn: &Arc<WsConnection>,
    state: &Arc<ServerState<S, A, C>>,
    code: u16,
    message: &str,
    seq: &Arc<AtomicU64>,
) -> Result<(), GridlockError>
where
    S: MapStore,
    A: Authenticator,
    C: Codec,
{
    send_system(
        conn,
        state,
        SystemMessage::Error {
            code,
            message: message.to_string(),
        },
        seq,
    )
    .await
}

async fn send_game_error<S, A, C>(
    conn: &Arc<WsConnection>,
    state: &Arc<ServerState<S, A, C>>,
    error: &GameError,
    seq: &Arc<AtomicU64>,
) -> Result<(), GridlockError>
where
    S: MapStore,
    A: Authenticator,
    C: Codec,
{
    send_error(conn, state, error_code(error), &error.to_string(), seq).await
}

/// HTTP-style code for each game-lifecycle error.
fn error_code(error: &GameError) -> u16 {
    match error {
        GameError::NotFound(_) | GameError::MapNotFound(_) | GameError::NotInGame(_) => {
            404
        }
        GameError::Locked(_)
        | GameError::Full(_)
        | GameError::AlreadyStarted(_)
        | GameError::AlreadyInGame(_)
        | GameError::NotEnoughPlayers { .. } => 409,
        GameError::NotCreator => 403,
        GameError::InvalidMap(_) => 400,
        GameError::Unavailable(_) => 503,
    }
}

fn invalid(msg: &str) -> GridlockError {
    GridlockError::Protocol(gridlock_protocol::ProtocolError::InvalidMessage(
        msg.into(),
    ))
}
