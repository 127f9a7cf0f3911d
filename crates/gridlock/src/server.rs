//! `GridlockServer` builder and accept loop.
//!
//! Ties the layers together: transport → protocol → session → room →
//! engine. One handler task per connection, one actor task per game,
//! plus a background sweeper that expires dropped clients whose resume
//! grace ran out and cascades them out of their games.

use std::sync::Arc;
use std::time::Duration;

use gridlock_engine::GameConfig;
use gridlock_protocol::{Codec, JsonCodec};
use gridlock_room::{GameRegistry, MapStore};
use gridlock_session::{Authenticator, ClientRegistry, SessionConfig};
use gridlock_transport::{Listener, WsListener};
use tokio::sync::Mutex;

use crate::GridlockError;
use crate::handler::handle_connection;

/// The current protocol version. Clients must send this in their
/// handshake or be rejected.
pub const PROTOCOL_VERSION: u32 = 1;

/// How often the sweeper looks for expired client sessions.
const SWEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Shared server state, one instance behind an `Arc` for all handler
/// tasks. The two registries live behind their own mutexes; game rooms
/// themselves are lock-free actors, so these locks are held only long
/// enough to resolve and route.
pub(crate) struct ServerState<S: MapStore, A: Authenticator, C: Codec> {
    pub(crate) sessions: Mutex<ClientRegistry>,
    pub(crate) games: Mutex<GameRegistry<S>>,
    pub(crate) auth: A,
    pub(crate) codec: C,
    pub(crate) started: std::time::Instant,
}

/// Builder for configuring and starting a Gridlock server.
pub struct GridlockServerBuilder {
    bind_addr: String,
    session_config: SessionConfig,
    game_config: GameConfig,
}

impl GridlockServerBuilder {
    /// Creates a builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            session_config: SessionConfig::default(),
            game_config: GameConfig::default(),
        }
    }

    /// Sets the address to bind to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the client-session configuration (resume grace, …).
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Sets the game rule set used for every room.
    pub fn game_config(mut self, config: GameConfig) -> Self {
        self.game_config = config;
        self
    }

    /// Binds the listener and assembles the server.
    pub async fn build<S: MapStore>(
        self,
        store: S,
        auth: impl Authenticator,
    ) -> Result<GridlockServer<S, impl Authenticator, JsonCodec>, GridlockError> {
        let listener = WsListener::bind(&self.bind_addr).await?;

        let state = Arc::new(ServerState {
            sessions: Mutex::new(ClientRegistry::new(self.session_config)),
            games: Mutex::new(GameRegistry::new(store, self.game_config)),
            auth,
            codec: JsonCodec,
            started: std::time::Instant::now(),
        });

        Ok(GridlockServer { listener, state })
    }
}

impl Default for GridlockServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running Gridlock server. Call [`run`](Self::run) to serve.
pub struct GridlockServer<S: MapStore, A: Authenticator, C: Codec> {
    listener: WsListener,
    state: Arc<ServerState<S, A, C>>,
}

impl<S, A, C> GridlockServer<S, A, C>
where
    S: MapStore,
    A: Authenticator,
    C: Codec + Clone + 'static,
{
    /// Creates a new builder.
    pub fn builder() -> GridlockServerBuilder {
        GridlockServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the accept loop (and the session sweeper) until the process
    /// terminates.
    pub async fn run(mut self) -> Result<(), GridlockError> {
        tracing::info!("Gridlock server running");

        spawn_sweeper(Arc::clone(&self.state));

        loop {
            match self.listener.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection::<S, A, C>(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

/// Expires clients whose resume grace ran out, removes them from their
/// games, then frees the session records. Runs for the server's
/// lifetime.
fn spawn_sweeper<S, A, C>(state: Arc<ServerState<S, A, C>>)
where
    S: MapStore,
    A: Authenticator,
    C: Codec,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            ticker.tick().await;

            let expired = state.sessions.lock().await.expire_stale();
            if !expired.is_empty() {
                let mut games = state.games.lock().await;
                for player in &expired {
                    if games.player_game(player).is_some() {
                        tracing::info!(
                            %player,
                            "resume grace elapsed, removing from game"
                        );
                        if let Err(e) = games.leave_game(*player).await {
                            tracing::warn!(%player, error = %e, "expiry cascade failed");
                        }
                    }
                }
            }
            state.sessions.lock().await.sweep_expired();
        }
    });
}
