//! The game-room actor: an isolated Tokio task that owns one game.
//!
//! Each room runs in its own task and is the serialization point for
//! everything that can touch its game: player actions, membership
//! changes, and both countdown clocks all funnel through the actor's
//! `select!` loop, one operation at a time and strictly in arrival
//! order. Clock events are *pulled* from [`Countdown`]s the actor owns,
//! so a cancel issued while handling one command can never race a tick
//! belonging to the previous turn.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use gridlock_clock::{Countdown, CountdownEvent};
use gridlock_engine::{
    ClientAction, ClockDirective, EndReason, GameConfig, GameEvent, GameMap,
    GameState, Outcome, Rejection,
};
use gridlock_protocol::{GameId, PlayerId, Scope};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::{mpsc, oneshot};

use crate::{GameError, GamePhase};

/// Channel sender delivering game events to one member's connection
/// handler.
pub type PlayerSender = mpsc::UnboundedSender<GameEvent>;

/// A snapshot of room metadata (not the game state itself).
#[derive(Debug, Clone)]
pub struct GameInfo {
    pub game_id: GameId,
    pub map: String,
    pub phase: GamePhase,
    pub locked: bool,
    pub creator: PlayerId,
    pub player_count: usize,
    pub max_players: usize,
}

/// Commands sent to a game actor through its channel. Variants carrying a
/// `oneshot::Sender` are request/reply; the rest are fire-and-forget.
pub(crate) enum GameCommand {
    Join {
        player: PlayerId,
        sender: PlayerSender,
        reply: oneshot::Sender<Result<(), GameError>>,
    },
    Observe {
        player: PlayerId,
        sender: PlayerSender,
        reply: oneshot::Sender<Result<(), GameError>>,
    },
    /// Re-attach a resumed client's fresh outbound channel.
    Reattach {
        player: PlayerId,
        sender: PlayerSender,
        reply: oneshot::Sender<Result<(), GameError>>,
    },
    /// Remove a member. Replies with whether the room is now empty of
    /// players, so the registry can reap it.
    Leave {
        player: PlayerId,
        reply: oneshot::Sender<Result<bool, GameError>>,
    },
    /// Creator-only removal. Replies like `Leave`.
    Kick {
        requester: PlayerId,
        target: PlayerId,
        reply: oneshot::Sender<Result<bool, GameError>>,
    },
    SetLock {
        requester: PlayerId,
        locked: bool,
        reply: oneshot::Sender<Result<(), GameError>>,
    },
    Start {
        requester: PlayerId,
        reply: oneshot::Sender<Result<(), GameError>>,
    },
    /// A game action from a player. Rejections go back through the
    /// player's event channel, not a reply slot.
    Action { actor: PlayerId, action: ClientAction },
    Info {
        reply: oneshot::Sender<GameInfo>,
    },
    Shutdown,
}

/// Handle to a running game actor. Cheap to clone — just an
/// `mpsc::Sender` wrapper. The registry holds one per game.
#[derive(Clone)]
pub struct GameHandle {
    game_id: GameId,
    sender: mpsc::Sender<GameCommand>,
}

impl GameHandle {
    pub fn game_id(&self) -> GameId {
        self.game_id
    }

    pub async fn join(
        &self,
        player: PlayerId,
        sender: PlayerSender,
    ) -> Result<(), GameError> {
        self.request(|reply| GameCommand::Join {
            player,
            sender,
            reply,
        })
        .await?
    }

    pub async fn observe(
        &self,
        player: PlayerId,
        sender: PlayerSender,
    ) -> Result<(), GameError> {
        self.request(|reply| GameCommand::Observe {
            player,
            sender,
            reply,
        })
        .await?
    }

    pub async fn reattach(
        &self,
        player: PlayerId,
        sender: PlayerSender,
    ) -> Result<(), GameError> {
        self.request(|reply| GameCommand::Reattach {
            player,
            sender,
            reply,
        })
        .await?
    }

    /// Removes a member. `Ok(true)` means no players remain.
    pub async fn leave(&self, player: PlayerId) -> Result<bool, GameError> {
        self.request(|reply| GameCommand::Leave { player, reply })
            .await?
    }

    /// Creator-only removal. `Ok(true)` means no players remain.
    pub async fn kick(
        &self,
        requester: PlayerId,
        target: PlayerId,
    ) -> Result<bool, GameError> {
        self.request(|reply| GameCommand::Kick {
            requester,
            target,
            reply,
        })
        .await?
    }

    pub async fn set_lock(
        &self,
        requester: PlayerId,
        locked: bool,
    ) -> Result<(), GameError> {
        self.request(|reply| GameCommand::SetLock {
            requester,
            locked,
            reply,
        })
        .await?
    }

    pub async fn start(&self, requester: PlayerId) -> Result<(), GameError> {
        self.request(|reply| GameCommand::Start { requester, reply })
            .await?
    }

    /// Queues a game action (fire-and-forget; the outcome or rejection
    /// arrives on the player's event channel).
    pub async fn action(
        &self,
        actor: PlayerId,
        action: ClientAction,
    ) -> Result<(), GameError> {
        self.sender
            .send(GameCommand::Action { actor, action })
            .await
            .map_err(|_| GameError::Unavailable(self.game_id))
    }

    pub async fn info(&self) -> Result<GameInfo, GameError> {
        self.request(|reply| GameCommand::Info { reply }).await
    }

    pub async fn shutdown(&self) -> Result<(), GameError> {
        self.sender
            .send(GameCommand::Shutdown)
            .await
            .map_err(|_| GameError::Unavailable(self.game_id))
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> GameCommand,
    ) -> Result<T, GameError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(make(reply_tx))
            .await
            .map_err(|_| GameError::Unavailable(self.game_id))?;
        reply_rx
            .await
            .map_err(|_| GameError::Unavailable(self.game_id))
    }
}

/// The internal game actor. Runs inside a Tokio task.
struct GameRoom {
    game_id: GameId,
    config: GameConfig,
    /// Held until start, then moved into the engine state.
    map: Option<GameMap>,
    map_name: String,
    phase: GamePhase,
    locked: bool,
    creator: PlayerId,
    /// Join order = turn order.
    players: Vec<PlayerId>,
    observers: HashSet<PlayerId>,
    /// Outbound channels for players and observers alike.
    senders: HashMap<PlayerId, PlayerSender>,
    state: Option<GameState>,
    turn_clock: Countdown,
    combat_clock: Countdown,
    rng: StdRng,
    receiver: mpsc::Receiver<GameCommand>,
}

impl GameRoom {
    async fn run(mut self) {
        tracing::info!(game_id = %self.game_id, map = %self.map_name, "game room started");

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => match cmd {
                    Some(cmd) => {
                        if self.handle_command(cmd) {
                            break;
                        }
                    }
                    None => break,
                },
                event = self.turn_clock.next_event() => self.on_turn_clock(event),
                event = self.combat_clock.next_event() => self.on_combat_clock(event),
            }
        }

        // Countdowns must be dead before the room is. A tick surviving
        // teardown would fire against freed state.
        self.turn_clock.cancel();
        self.combat_clock.cancel();
        tracing::info!(game_id = %self.game_id, "game room stopped");
    }

    /// Processes one command. Returns `true` when the room should stop.
    fn handle_command(&mut self, cmd: GameCommand) -> bool {
        match cmd {
            GameCommand::Join {
                player,
                sender,
                reply,
            } => {
                let _ = reply.send(self.handle_join(player, sender));
            }
            GameCommand::Observe {
                player,
                sender,
                reply,
            } => {
                let _ = reply.send(self.handle_observe(player, sender));
            }
            GameCommand::Reattach {
                player,
                sender,
                reply,
            } => {
                let _ = reply.send(self.handle_reattach(player, sender));
            }
            GameCommand::Leave { player, reply } => {
                let _ = reply.send(self.handle_leave(player, false));
            }
            GameCommand::Kick {
                requester,
                target,
                reply,
            } => {
                let _ = reply.send(self.handle_kick(requester, target));
            }
            GameCommand::SetLock {
                requester,
                locked,
                reply,
            } => {
                let _ = reply.send(self.handle_set_lock(requester, locked));
            }
            GameCommand::Start { requester, reply } => {
                let _ = reply.send(self.handle_start(requester));
            }
            GameCommand::Action { actor, action } => {
                self.handle_action(actor, action);
            }
            GameCommand::Info { reply } => {
                let _ = reply.send(self.info());
            }
            GameCommand::Shutdown => {
                if self.phase != GamePhase::Ended {
                    self.broadcast(GameEvent::GameEnded {
                        reason: EndReason::Closed,
                        winner: None,
                    });
                    self.phase = GamePhase::Ended;
                }
                tracing::info!(game_id = %self.game_id, "game shutting down");
                return true;
            }
        }
        false
    }

    // -- Membership ----------------------------------------------------

    fn handle_join(
        &mut self,
        player: PlayerId,
        sender: PlayerSender,
    ) -> Result<(), GameError> {
        if !self.phase.is_joinable() {
            return Err(GameError::AlreadyStarted(self.game_id));
        }
        if self.locked {
            return Err(GameError::Locked(self.game_id));
        }
        if self.players.contains(&player) || self.observers.contains(&player) {
            return Err(GameError::AlreadyInGame(player));
        }
        if self.players.len() >= self.config.max_players {
            return Err(GameError::Full(self.game_id));
        }

        self.players.push(player);
        self.senders.insert(player, sender);
        tracing::info!(
            game_id = %self.game_id,
            %player,
            players = self.players.len(),
            "player joined"
        );

        self.dispatch_one(
            Scope::ExcludeActor(player),
            GameEvent::PlayerJoined { player },
        );
        Ok(())
    }

    /// Observation mode always admits — locked, full, or already running
    /// makes no difference. Observers never enter the rotation.
    fn handle_observe(
        &mut self,
        player: PlayerId,
        sender: PlayerSender,
    ) -> Result<(), GameError> {
        if self.phase == GamePhase::Ended {
            return Err(GameError::NotFound(self.game_id));
        }
        if self.players.contains(&player) || self.observers.contains(&player) {
            return Err(GameError::AlreadyInGame(player));
        }

        self.observers.insert(player);
        self.senders.insert(player, sender);
        tracing::info!(game_id = %self.game_id, %player, "observer joined");

        self.dispatch_one(
            Scope::ExcludeActor(player),
            GameEvent::ObserverJoined { player },
        );
        // Late joiners need the current picture.
        if let Some(state) = &self.state {
            self.send_to(
                player,
                GameEvent::StateSync {
                    snapshot: state.snapshot(),
                },
            );
        }
        Ok(())
    }

    fn handle_reattach(
        &mut self,
        player: PlayerId,
        sender: PlayerSender,
    ) -> Result<(), GameError> {
        if !self.players.contains(&player) && !self.observers.contains(&player) {
            return Err(GameError::NotInGame(player));
        }
        self.senders.insert(player, sender);
        tracing::info!(game_id = %self.game_id, %player, "client reattached");

        if let Some(state) = &self.state {
            self.send_to(
                player,
                GameEvent::StateSync {
                    snapshot: state.snapshot(),
                },
            );
        }
        Ok(())
    }

    /// Removes a member. `kicked` selects the departure event. Returns
    /// whether any players remain.
    fn handle_leave(
        &mut self,
        player: PlayerId,
        kicked: bool,
    ) -> Result<bool, GameError> {
        if self.observers.remove(&player) {
            self.senders.remove(&player);
            tracing::info!(game_id = %self.game_id, %player, "observer left");
            return Ok(self.players.is_empty());
        }

        let Some(pos) = self.players.iter().position(|p| *p == player) else {
            return Err(GameError::NotInGame(player));
        };
        self.players.remove(pos);
        self.senders.remove(&player);
        tracing::info!(
            game_id = %self.game_id,
            %player,
            kicked,
            players = self.players.len(),
            "player removed"
        );

        let departure = if kicked {
            GameEvent::PlayerKicked { player }
        } else {
            GameEvent::PlayerLeft { player }
        };
        self.broadcast(departure);

        // Mid-match the engine heals the rotation and may decide the
        // game; in the lobby there is nothing more to do.
        if let Some(state) = &mut self.state {
            let outcome = state.remove_player(player);
            self.settle(outcome);
        }

        Ok(self.players.is_empty())
    }

    fn handle_kick(
        &mut self,
        requester: PlayerId,
        target: PlayerId,
    ) -> Result<bool, GameError> {
        if requester != self.creator {
            return Err(GameError::NotCreator);
        }
        self.handle_leave(target, true)
    }

    fn handle_set_lock(
        &mut self,
        requester: PlayerId,
        locked: bool,
    ) -> Result<(), GameError> {
        if requester != self.creator {
            return Err(GameError::NotCreator);
        }
        self.locked = locked;
        tracing::info!(game_id = %self.game_id, locked, "lock toggled");
        self.broadcast(GameEvent::GameLockToggled { locked });
        Ok(())
    }

    // -- Match flow ------------------------------------------------------

    fn handle_start(&mut self, requester: PlayerId) -> Result<(), GameError> {
        if requester != self.creator {
            return Err(GameError::NotCreator);
        }
        if self.phase != GamePhase::Lobby {
            return Err(GameError::AlreadyStarted(self.game_id));
        }
        if self.players.len() < self.config.min_players {
            return Err(GameError::NotEnoughPlayers {
                have: self.players.len(),
                need: self.config.min_players,
            });
        }

        // Validate before taking the map, so a rejected start leaves the
        // lobby intact and retryable.
        self.map
            .as_ref()
            .expect("map present until start")
            .validate(self.players.len())?;
        let map = self.map.take().expect("map present until start");
        let mut state = GameState::new(self.config.clone(), map, &self.players)
            .expect("map validated above");

        let outcome = state.begin();
        let snapshot = state.snapshot();
        self.state = Some(state);
        self.phase = GamePhase::InProgress;
        tracing::info!(
            game_id = %self.game_id,
            players = self.players.len(),
            "game started"
        );

        self.broadcast(GameEvent::GameStarted { snapshot });
        self.settle(outcome);
        Ok(())
    }

    fn handle_action(&mut self, actor: PlayerId, action: ClientAction) {
        if self.observers.contains(&actor) || !self.players.contains(&actor) {
            self.send_to(
                actor,
                GameEvent::ActionRejected {
                    reason: Rejection::NotYourTurn,
                },
            );
            return;
        }
        let Some(state) = &mut self.state else {
            self.send_to(
                actor,
                GameEvent::ActionRejected {
                    reason: Rejection::NotStarted,
                },
            );
            return;
        };

        match state.apply(actor, action, &mut self.rng) {
            Ok(outcome) => self.settle(outcome),
            Err(reason) => {
                tracing::debug!(
                    game_id = %self.game_id,
                    %actor,
                    %reason,
                    "action rejected"
                );
                self.send_to(actor, GameEvent::ActionRejected { reason });
            }
        }
    }

    // -- Clocks ----------------------------------------------------------

    fn on_turn_clock(&mut self, event: CountdownEvent) {
        match event {
            CountdownEvent::Tick { remaining } => {
                self.broadcast(GameEvent::SecondPassed { remaining });
            }
            CountdownEvent::Expired => {
                tracing::debug!(game_id = %self.game_id, "turn countdown expired");
                if let Some(state) = &mut self.state {
                    let outcome = state.handle_turn_expiry();
                    self.settle(outcome);
                }
            }
        }
    }

    fn on_combat_clock(&mut self, event: CountdownEvent) {
        match event {
            CountdownEvent::Tick { remaining } => {
                self.broadcast(GameEvent::CombatSecondPassed { remaining });
            }
            CountdownEvent::Expired => {
                tracing::debug!(game_id = %self.game_id, "combat countdown expired");
                if let Some(state) = &mut self.state {
                    let outcome = state.handle_combat_expiry();
                    self.settle(outcome);
                }
            }
        }
    }

    /// Delivers an outcome's events and applies its clock directive, then
    /// records a decided game.
    fn settle(&mut self, outcome: Outcome) {
        for (scope, event) in outcome.events {
            self.dispatch_one(scope, event);
        }

        match outcome.clock {
            ClockDirective::None => {}
            ClockDirective::RestartTurn => {
                self.combat_clock.cancel();
                self.turn_clock
                    .start(Duration::from_secs(self.config.turn_secs));
            }
            ClockDirective::RestartCombat => {
                self.turn_clock.cancel();
                self.combat_clock
                    .start(Duration::from_secs(self.config.combat_turn_secs));
            }
            ClockDirective::CancelAll => {
                self.turn_clock.cancel();
                self.combat_clock.cancel();
            }
        }

        if self
            .state
            .as_ref()
            .is_some_and(|state| state.is_finished())
            && self.phase == GamePhase::InProgress
        {
            self.phase = GamePhase::Ended;
            tracing::info!(game_id = %self.game_id, "game over");
        }
    }

    // -- Fan-out -----------------------------------------------------------

    /// Delivers one event to its scope. Delivery order is the order these
    /// calls are made — per-room, single-threaded, no reordering.
    fn dispatch_one(&self, scope: Scope, event: GameEvent) {
        match scope {
            Scope::Room => {
                for id in self.senders.keys() {
                    self.send_to(*id, event.clone());
                }
            }
            Scope::Player(id) => self.send_to(id, event),
            Scope::ExcludeActor(actor) => {
                for id in self.senders.keys() {
                    if *id != actor {
                        self.send_to(*id, event.clone());
                    }
                }
            }
        }
    }

    fn broadcast(&self, event: GameEvent) {
        self.dispatch_one(Scope::Room, event);
    }

    /// Sends to one member. Silently drops when the receiver is gone —
    /// a vanished connection is the session layer's problem, not a game
    /// error.
    fn send_to(&self, player: PlayerId, event: GameEvent) {
        if let Some(sender) = self.senders.get(&player) {
            let _ = sender.send(event);
        }
    }

    fn info(&self) -> GameInfo {
        GameInfo {
            game_id: self.game_id,
            map: self.map_name.clone(),
            phase: self.phase,
            locked: self.locked,
            creator: self.creator,
            player_count: self.players.len(),
            max_players: self.config.max_players,
        }
    }
}

/// Spawns a new game actor and returns a handle to command it.
pub(crate) fn spawn_game(
    game_id: GameId,
    map: GameMap,
    config: GameConfig,
    creator: PlayerId,
    channel_size: usize,
) -> GameHandle {
    let (tx, rx) = mpsc::channel(channel_size);

    let room = GameRoom {
        game_id,
        map_name: map.name().to_string(),
        map: Some(map),
        config: config.validated(),
        phase: GamePhase::Lobby,
        locked: false,
        creator,
        players: Vec::new(),
        observers: HashSet::new(),
        senders: HashMap::new(),
        state: None,
        turn_clock: Countdown::new(),
        combat_clock: Countdown::new(),
        rng: StdRng::from_os_rng(),
        receiver: rx,
    };

    tokio::spawn(room.run());

    GameHandle {
        game_id,
        sender: tx,
    }
}
