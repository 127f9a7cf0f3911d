//! The game registry: creates, tracks, routes to, and reaps game rooms.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use gridlock_engine::{ClientAction, GameConfig};
use gridlock_protocol::{GameId, GameListEntry, PlayerId};

use crate::room::spawn_game;
use crate::{GameError, GameHandle, GameInfo, MapStore, PlayerSender};

/// Counter for generating unique game IDs.
static NEXT_GAME_ID: AtomicU64 = AtomicU64::new(1);

/// Default command channel size for game actors.
const DEFAULT_CHANNEL_SIZE: usize = 64;

/// Owns the id → game mapping and the player → game index.
///
/// This is the entry point for every lifecycle operation arriving from
/// connection handlers. A player (or observer) is in at most ONE game at
/// a time — the index enforces it here, before a command ever reaches a
/// room actor.
pub struct GameRegistry<S: MapStore> {
    games: HashMap<GameId, GameHandle>,
    player_games: HashMap<PlayerId, GameId>,
    store: S,
    config: GameConfig,
}

impl<S: MapStore> GameRegistry<S> {
    /// Creates an empty registry over the given map store and rule set.
    pub fn new(store: S, config: GameConfig) -> Self {
        Self {
            games: HashMap::new(),
            player_games: HashMap::new(),
            store,
            config: config.validated(),
        }
    }

    /// Creates a game on the named map and joins the creator into it.
    pub async fn create_game(
        &mut self,
        map_name: &str,
        creator: PlayerId,
        sender: PlayerSender,
    ) -> Result<GameId, GameError> {
        if let Some(existing) = self.player_games.get(&creator) {
            return Err(self.already_in(creator, *existing));
        }

        let map = self.store.load(map_name).await?;
        // A map that can't host even the minimum lobby is refused at
        // creation, not discovered at start.
        map.validate(self.config.min_players)?;

        let game_id = GameId(NEXT_GAME_ID.fetch_add(1, Ordering::Relaxed));
        let handle = spawn_game(
            game_id,
            map,
            self.config.clone(),
            creator,
            DEFAULT_CHANNEL_SIZE,
        );
        handle.join(creator, sender).await?;

        self.games.insert(game_id, handle);
        self.player_games.insert(creator, game_id);
        tracing::info!(%game_id, %creator, map = map_name, "game created");
        Ok(game_id)
    }

    /// Adds a player to a lobby.
    pub async fn join_game(
        &mut self,
        player: PlayerId,
        game_id: GameId,
        sender: PlayerSender,
    ) -> Result<(), GameError> {
        if let Some(existing) = self.player_games.get(&player) {
            return Err(self.already_in(player, *existing));
        }
        let handle = self.handle(game_id)?;
        handle.join(player, sender).await?;
        self.player_games.insert(player, game_id);
        Ok(())
    }

    /// Adds a spectator to a game (any phase, lock ignored).
    pub async fn observe_game(
        &mut self,
        player: PlayerId,
        game_id: GameId,
        sender: PlayerSender,
    ) -> Result<(), GameError> {
        if let Some(existing) = self.player_games.get(&player) {
            return Err(self.already_in(player, *existing));
        }
        let handle = self.handle(game_id)?;
        handle.observe(player, sender).await?;
        self.player_games.insert(player, game_id);
        Ok(())
    }

    /// Re-attaches a resumed client to the game it was in. Returns the
    /// game id so the handler can confirm membership.
    pub async fn reattach(
        &mut self,
        player: PlayerId,
        sender: PlayerSender,
    ) -> Result<GameId, GameError> {
        let game_id = self.game_of(player)?;
        let handle = self.handle(game_id)?;
        handle.reattach(player, sender).await?;
        Ok(game_id)
    }

    /// Removes a player from their game. Reaps the room once its last
    /// player is gone.
    pub async fn leave_game(&mut self, player: PlayerId) -> Result<(), GameError> {
        let game_id = self.game_of(player)?;

        let mut now_empty = false;
        if let Some(handle) = self.games.get(&game_id) {
            now_empty = handle.leave(player).await?;
        }
        self.player_games.remove(&player);

        if now_empty {
            tracing::info!(%game_id, "last player left, reaping game");
            self.destroy_game(game_id).await?;
        }
        Ok(())
    }

    /// Creator-only removal of another player.
    pub async fn kick_player(
        &mut self,
        requester: PlayerId,
        target: PlayerId,
    ) -> Result<(), GameError> {
        let game_id = self.game_of(requester)?;
        if self.player_games.get(&target) != Some(&game_id) {
            return Err(GameError::NotInGame(target));
        }
        let handle = self.handle(game_id)?;
        let now_empty = handle.kick(requester, target).await?;
        self.player_games.remove(&target);

        if now_empty {
            tracing::info!(%game_id, "last player kicked, reaping game");
            self.destroy_game(game_id).await?;
        }
        Ok(())
    }

    /// Creator-only lock toggle.
    pub async fn set_lock(
        &mut self,
        requester: PlayerId,
        locked: bool,
    ) -> Result<(), GameError> {
        let game_id = self.game_of(requester)?;
        self.handle(game_id)?.set_lock(requester, locked).await
    }

    /// Creator-only start.
    pub async fn start_game(&mut self, requester: PlayerId) -> Result<(), GameError> {
        let game_id = self.game_of(requester)?;
        self.handle(game_id)?.start(requester).await
    }

    /// Routes a game action from a player to their game.
    pub async fn route_action(
        &self,
        player: PlayerId,
        action: ClientAction,
    ) -> Result<(), GameError> {
        let game_id = self.game_of(player)?;
        let handle = self
            .games
            .get(&game_id)
            .ok_or(GameError::NotFound(game_id))?;
        handle.action(player, action).await
    }

    /// Info about one game.
    pub async fn game_info(&self, game_id: GameId) -> Result<GameInfo, GameError> {
        self.games
            .get(&game_id)
            .ok_or(GameError::NotFound(game_id))?
            .info()
            .await
    }

    /// Lobby listings. Rooms that fail to respond (mid-shutdown) are
    /// skipped.
    pub async fn list_games(&self) -> Vec<GameListEntry> {
        let mut entries = Vec::with_capacity(self.games.len());
        for handle in self.games.values() {
            if let Ok(info) = handle.info().await {
                entries.push(GameListEntry {
                    game_id: info.game_id,
                    map: info.map,
                    player_count: info.player_count,
                    max_players: info.max_players,
                    locked: info.locked,
                    in_progress: info.phase.is_active(),
                });
            }
        }
        entries.sort_by_key(|e| e.game_id.0);
        entries
    }

    /// Shuts a game down and drops every index entry pointing at it.
    ///
    /// The room cancels its countdowns on the way out — a clock that
    /// outlives its game is a leak.
    pub async fn destroy_game(&mut self, game_id: GameId) -> Result<(), GameError> {
        let handle = self
            .games
            .remove(&game_id)
            .ok_or(GameError::NotFound(game_id))?;
        let _ = handle.shutdown().await;
        self.player_games.retain(|_, g| *g != game_id);
        tracing::info!(%game_id, "game destroyed");
        Ok(())
    }

    /// The game a player is currently in, if any.
    pub fn player_game(&self, player: &PlayerId) -> Option<GameId> {
        self.player_games.get(player).copied()
    }

    /// Number of live games.
    pub fn game_count(&self) -> usize {
        self.games.len()
    }

    fn handle(&self, game_id: GameId) -> Result<&GameHandle, GameError> {
        self.games.get(&game_id).ok_or(GameError::NotFound(game_id))
    }

    fn game_of(&self, player: PlayerId) -> Result<GameId, GameError> {
        self.player_games
            .get(&player)
            .copied()
            .ok_or(GameError::NotInGame(player))
    }

    fn already_in(&self, player: PlayerId, game_id: GameId) -> GameError {
        tracing::debug!(%player, %game_id, "rejected: already in a game");
        GameError::AlreadyInGame(player)
    }
}
