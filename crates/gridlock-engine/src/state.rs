//! The authoritative per-game state and its operation table.
//!
//! [`GameState`] owns the board, the roster, the turn rotation, and the
//! optional combat sub-state. Every mutation goes through one of four
//! entry points — [`apply`](GameState::apply) for player actions,
//! [`handle_turn_expiry`](GameState::handle_turn_expiry) and
//! [`handle_combat_expiry`](GameState::handle_combat_expiry) for clock
//! expiries, [`remove_player`](GameState::remove_player) for departures —
//! and every entry point returns the scoped events describing what
//! happened plus a [`ClockDirective`] for the owning room actor.
//!
//! Rule denials come back as `Err(Rejection)`: normal play, delivered to
//! the requester alone. Invariant violations (a clock firing in a phase
//! it can't belong to) end the game defensively and are logged as errors.

use std::collections::HashSet;

use gridlock_protocol::{PlayerId, Scope};
use rand::Rng;

use crate::board::{Coord, GameMap, MapError, Terrain};
use crate::combat::{self, CombatState};
use crate::config::GameConfig;
use crate::events::{ClientAction, EndReason, GameEvent, Rejection, Snapshot, TileView};
use crate::pawn::Pawn;
use crate::turn::{Removal, TurnError, TurnPhase, TurnScheduler};

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// How the owning room actor should retune its countdowns after an
/// operation. The actor maps these onto its two clocks: `RestartTurn`
/// cancels the combat clock and starts the main clock at full turn
/// duration, `RestartCombat` does the reverse, `CancelAll` stops both
/// (game over).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockDirective {
    None,
    RestartTurn,
    RestartCombat,
    CancelAll,
}

/// The result of one successfully applied operation: scoped events in
/// completion order, plus the clock directive.
#[derive(Debug)]
pub struct Outcome {
    pub events: Vec<(Scope, GameEvent)>,
    pub clock: ClockDirective,
}

impl Outcome {
    fn none() -> Self {
        Self {
            events: Vec::new(),
            clock: ClockDirective::None,
        }
    }
}

// ---------------------------------------------------------------------------
// GameState
// ---------------------------------------------------------------------------

/// Authoritative state of one running match.
#[derive(Debug)]
pub struct GameState {
    config: GameConfig,
    map: GameMap,
    /// Roster in join order. Eliminated/departed pawns stay here; only
    /// the scheduler's rotation shrinks.
    pawns: Vec<Pawn>,
    scheduler: TurnScheduler,
    /// Action budget left in the current turn.
    budget: u32,
    combat: Option<CombatState>,
}

impl GameState {
    /// Builds the state for `players` (join order = turn order), placing
    /// each pawn on the map's start tiles in row-major order.
    pub fn new(
        config: GameConfig,
        map: GameMap,
        players: &[PlayerId],
    ) -> Result<Self, MapError> {
        map.validate(players.len())?;
        let starts = map.start_tiles();
        let pawns = players
            .iter()
            .zip(&starts)
            .map(|(id, at)| Pawn::new(*id, *at, config.combat.max_health))
            .collect();

        Ok(Self {
            scheduler: TurnScheduler::new(players.to_vec()),
            budget: config.action_budget,
            config,
            map,
            pawns,
            combat: None,
        })
    }

    /// Starts the rotation: first turn, full budget.
    pub fn begin(&mut self) -> Outcome {
        let mut events = Vec::new();
        let clock = match self.scheduler.start() {
            Ok(first) => self.start_turn(first, &mut events),
            Err(e) => {
                tracing::error!(error = %e, "rotation failed to start");
                self.internal_fault("rotation failed to start", &mut events)
            }
        };
        Outcome { events, clock }
    }

    // -- Accessors ---------------------------------------------------------

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn map(&self) -> &GameMap {
        &self.map
    }

    pub fn pawn(&self, id: PlayerId) -> Option<&Pawn> {
        self.pawns.iter().find(|p| p.id == id)
    }

    fn pawn_mut(&mut self, id: PlayerId) -> Option<&mut Pawn> {
        self.pawns.iter_mut().find(|p| p.id == id)
    }

    /// The player holding the main turn, if the rotation is running.
    pub fn current_actor(&self) -> Option<PlayerId> {
        self.scheduler.current()
    }

    /// Budget remaining in the current turn.
    pub fn budget(&self) -> u32 {
        self.budget
    }

    pub fn in_combat(&self) -> bool {
        self.combat.is_some()
    }

    pub fn combat(&self) -> Option<&CombatState> {
        self.combat.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        self.scheduler.phase() == TurnPhase::Ended
    }

    /// The sole surviving player, once the game is over.
    pub fn winner(&self) -> Option<PlayerId> {
        if !self.is_finished() {
            return None;
        }
        let mut survivors = self.pawns.iter().filter(|p| p.in_rotation());
        match (survivors.next(), survivors.next()) {
            (Some(w), None) => Some(w.id),
            _ => None,
        }
    }

    /// Full state snapshot for game start and late-joining observers.
    pub fn snapshot(&self) -> Snapshot {
        let mut tiles: Vec<TileView> = self
            .map
            .tiles()
            .map(|(at, t)| TileView {
                at,
                terrain: t.terrain,
                item: t.item,
            })
            .collect();
        tiles.sort_by_key(|t| (t.at.y, t.at.x));

        Snapshot {
            map_name: self.map.name().to_string(),
            width: self.map.width(),
            height: self.map.height(),
            tiles,
            pawns: self.pawns.clone(),
            current: self.current_actor(),
            budget: self.budget,
        }
    }

    // -- Action dispatch ---------------------------------------------------

    /// Validates and applies one player action.
    pub fn apply(
        &mut self,
        actor: PlayerId,
        action: ClientAction,
        rng: &mut impl Rng,
    ) -> Result<Outcome, Rejection> {
        if self.scheduler.phase() != TurnPhase::InProgress {
            return Err(Rejection::NotStarted);
        }
        if !self.pawn(actor).is_some_and(Pawn::in_rotation) {
            return Err(Rejection::NotYourTurn);
        }

        if self.combat.is_some() {
            return match action {
                ClientAction::Attack => self.apply_attack(actor, rng),
                ClientAction::AttemptEscape => self.apply_escape(actor, rng),
                _ => Err(Rejection::InCombat),
            };
        }

        match action {
            ClientAction::Attack | ClientAction::AttemptEscape => {
                Err(Rejection::NotInCombat)
            }
            _ if self.scheduler.current() != Some(actor) => {
                Err(Rejection::NotYourTurn)
            }
            ClientAction::Move { to } => self.apply_move(actor, to),
            ClientAction::BreakWall { at } => self.apply_break_wall(actor, at),
            ClientAction::ToggleDoor { at } => self.apply_toggle_door(actor, at),
            ClientAction::DropItem { item } => self.apply_drop(actor, item),
            ClientAction::Engage { target } => self.apply_engage(actor, target),
            ClientAction::EndTurn => self.apply_end_turn(actor),
        }
    }

    // -- Board actions -----------------------------------------------------

    fn apply_move(&mut self, actor: PlayerId, to: Coord) -> Result<Outcome, Rejection> {
        let from = self.pawn(actor).expect("validated above").position;
        if to == from || !self.map.is_walkable(to) {
            return Err(Rejection::InvalidTarget);
        }

        let occupied = self.occupied_tiles(actor);
        if occupied.contains(&to) {
            return Err(Rejection::Occupied);
        }
        let cost = self
            .map
            .path_cost(from, to, self.budget, &occupied)
            .ok_or(Rejection::OutOfRange)?;

        self.budget -= cost;
        let budget = self.budget;
        self.pawn_mut(actor).expect("validated above").position = to;

        let mut events = vec![(
            Scope::Room,
            GameEvent::PlayerMoved {
                player: actor,
                to,
                cost,
                budget,
            },
        )];

        // Auto-pickup, unless the inventory is full — then the item stays
        // on the floor and only the mover hears about it.
        if let Some(item) = self.map.tile(to).and_then(|t| t.item) {
            let capacity = self.config.inventory_capacity;
            let pawn = self.pawn_mut(actor).expect("validated above");
            if pawn.inventory.len() < capacity {
                pawn.inventory.push(item);
                self.map.tile_mut(to).expect("tile exists").item = None;
                events.push((
                    Scope::Room,
                    GameEvent::ItemPickedUp {
                        player: actor,
                        item,
                        at: to,
                    },
                ));
            } else {
                events.push((
                    Scope::Player(actor),
                    GameEvent::InventoryFull { item, at: to },
                ));
            }
        }

        let clock = self.end_turn_if_spent(&mut events);
        Ok(Outcome { events, clock })
    }

    fn apply_break_wall(
        &mut self,
        actor: PlayerId,
        at: Coord,
    ) -> Result<Outcome, Rejection> {
        let from = self.pawn(actor).expect("validated above").position;
        if !from.is_adjacent(at) {
            return Err(Rejection::OutOfRange);
        }
        let tile = self.map.tile_mut(at).ok_or(Rejection::InvalidTarget)?;
        if tile.terrain != Terrain::Wall {
            return Err(Rejection::InvalidTarget);
        }

        tile.terrain = Terrain::Rubble;
        self.budget = 0;

        let mut events = vec![(
            Scope::Room,
            GameEvent::WallBroken { player: actor, at },
        )];
        let clock = self.end_turn_if_spent(&mut events);
        Ok(Outcome { events, clock })
    }

    fn apply_toggle_door(
        &mut self,
        actor: PlayerId,
        at: Coord,
    ) -> Result<Outcome, Rejection> {
        let from = self.pawn(actor).expect("validated above").position;
        if !from.is_adjacent(at) {
            return Err(Rejection::OutOfRange);
        }
        let cost = self.config.door_toggle_cost;
        if self.budget < cost {
            return Err(Rejection::OutOfRange);
        }

        let open = match self.map.tile(at).map(|t| t.terrain) {
            Some(Terrain::Door { open }) => open,
            _ => return Err(Rejection::InvalidTarget),
        };
        // Closing a door under a pawn would trap them in the frame.
        if open && self.occupied_tiles(actor).contains(&at) {
            return Err(Rejection::Occupied);
        }

        self.map.tile_mut(at).expect("checked above").terrain =
            Terrain::Door { open: !open };
        self.budget -= cost;

        let mut events = vec![(
            Scope::Room,
            GameEvent::DoorToggled {
                player: actor,
                at,
                open: !open,
            },
        )];
        let clock = self.end_turn_if_spent(&mut events);
        Ok(Outcome { events, clock })
    }

    fn apply_drop(
        &mut self,
        actor: PlayerId,
        item: crate::board::Item,
    ) -> Result<Outcome, Rejection> {
        let pawn = self.pawn_mut(actor).expect("validated above");
        let item = pawn.take_item(item).ok_or(Rejection::InvalidTarget)?;
        let at = pawn.position;

        // Last write wins on the tile.
        self.map.tile_mut(at).expect("pawn stands on a tile").item = Some(item);

        Ok(Outcome {
            events: vec![(
                Scope::Room,
                GameEvent::ItemDropped {
                    player: actor,
                    item,
                    at,
                },
            )],
            clock: ClockDirective::None,
        })
    }

    fn apply_engage(
        &mut self,
        actor: PlayerId,
        target: PlayerId,
    ) -> Result<Outcome, Rejection> {
        if target == actor {
            return Err(Rejection::InvalidTarget);
        }
        let target_pawn = self
            .pawn(target)
            .filter(|p| p.in_rotation())
            .ok_or(Rejection::InvalidTarget)?;
        let from = self.pawn(actor).expect("validated above").position;
        if !from.is_adjacent(target_pawn.position) {
            return Err(Rejection::OutOfRange);
        }

        self.combat = Some(CombatState::new(
            actor,
            target,
            self.config.combat.escape_attempts,
        ));

        Ok(Outcome {
            events: vec![
                (
                    Scope::Room,
                    GameEvent::CombatStarted {
                        attacker: actor,
                        defender: target,
                    },
                ),
                (Scope::Room, GameEvent::CombatTurn { actor }),
            ],
            clock: ClockDirective::RestartCombat,
        })
    }

    fn apply_end_turn(&mut self, actor: PlayerId) -> Result<Outcome, Rejection> {
        let next = self.scheduler.end_turn(actor).map_err(|e| match e {
            TurnError::NotCurrentActor(_) => Rejection::NotYourTurn,
            _ => Rejection::NotStarted,
        })?;

        let mut events = Vec::new();
        let clock = self.start_turn(next, &mut events);
        Ok(Outcome { events, clock })
    }

    // -- Combat actions ----------------------------------------------------

    fn apply_attack(
        &mut self,
        actor: PlayerId,
        rng: &mut impl Rng,
    ) -> Result<Outcome, Rejection> {
        let combat = self.combat.as_ref().expect("checked by dispatch");
        if combat.current() != actor {
            return Err(Rejection::NotYourTurn);
        }
        let opponent = combat.opponent();

        let attacker = self.pawn(actor).expect("combatant in roster").clone();
        let defender = self.pawn(opponent).expect("combatant in roster").clone();
        let outcome = combat::roll_attack(rng, &self.config.combat, &attacker, &defender);

        let defender_health = {
            let p = self.pawn_mut(opponent).expect("combatant in roster");
            p.health -= outcome.damage;
            p.health
        };

        let mut events = vec![(
            Scope::Room,
            GameEvent::AttackResolved {
                attacker: actor,
                defender: opponent,
                attack_roll: outcome.attack_roll,
                defense_roll: outcome.defense_roll,
                damage: outcome.damage,
                health: defender_health,
            },
        )];

        let clock = if defender_health <= 0 {
            self.resolve_combat_elimination(actor, opponent, &mut events)
        } else {
            let combat = self.combat.as_mut().expect("checked by dispatch");
            combat.pass_turn();
            events.push((Scope::Room, GameEvent::CombatTurn { actor: opponent }));
            ClockDirective::RestartCombat
        };

        Ok(Outcome { events, clock })
    }

    fn apply_escape(
        &mut self,
        actor: PlayerId,
        rng: &mut impl Rng,
    ) -> Result<Outcome, Rejection> {
        let combat = self.combat.as_mut().expect("checked by dispatch");
        if combat.current() != actor {
            return Err(Rejection::NotYourTurn);
        }
        // No attempts left: the action is never rolled.
        let attempts_left = combat.consume_escape(actor).ok_or(Rejection::InvalidTarget)?;

        let succeeded = combat::roll_escape(rng, &self.config.combat);
        let mut events = vec![(
            Scope::Room,
            GameEvent::EscapeAttempted {
                player: actor,
                succeeded,
                attempts_left,
            },
        )];

        let clock = if succeeded {
            self.combat = None;
            events.push((
                Scope::Room,
                GameEvent::CombatEnded {
                    victor: None,
                    escaped: Some(actor),
                },
            ));
            // Both combatants rejoin the main cycle at the point after
            // the interrupted turn.
            self.next_turn(&mut events)
        } else {
            let combat = self.combat.as_mut().expect("still fighting");
            combat.pass_turn();
            events.push((
                Scope::Room,
                GameEvent::CombatTurn {
                    actor: combat.current(),
                },
            ));
            ClockDirective::RestartCombat
        };

        Ok(Outcome { events, clock })
    }

    // -- Clock expiries ----------------------------------------------------

    /// The main countdown ran out: the system ends the turn on the
    /// current actor's behalf.
    pub fn handle_turn_expiry(&mut self) -> Outcome {
        let mut events = Vec::new();
        let clock = if self.combat.is_some() {
            self.internal_fault("main countdown expired during combat", &mut events)
        } else if self.scheduler.current().is_none() {
            self.internal_fault(
                "main countdown expired with no current actor",
                &mut events,
            )
        } else {
            self.next_turn(&mut events)
        };
        Outcome { events, clock }
    }

    /// The combat countdown ran out: forced pass, never an automatic
    /// loss.
    pub fn handle_combat_expiry(&mut self) -> Outcome {
        let mut events = Vec::new();
        let clock = match self.combat.as_mut() {
            Some(combat) => {
                combat.pass_turn();
                events.push((
                    Scope::Room,
                    GameEvent::CombatTurn {
                        actor: combat.current(),
                    },
                ));
                ClockDirective::RestartCombat
            }
            None => self.internal_fault(
                "combat countdown expired outside combat",
                &mut events,
            ),
        };
        Outcome { events, clock }
    }

    // -- Departures --------------------------------------------------------

    /// Removes a departing (or kicked) player from play: their loot is
    /// dropped, any combat they were in resolves as a walkover, and the
    /// rotation heals around them. The membership event (left vs. kicked)
    /// is the room layer's to emit.
    pub fn remove_player(&mut self, id: PlayerId) -> Outcome {
        let Some(pawn) = self.pawn_mut(id) else {
            return Outcome::none();
        };
        if !pawn.in_rotation() {
            return Outcome::none();
        }
        pawn.active = false;
        let at = pawn.position;
        let loot = std::mem::take(&mut pawn.inventory);

        let mut events = Vec::new();
        self.scatter_items(id, at, loot, &mut events);

        if let Some(combat) = &self.combat {
            if combat.involves(id) {
                let opponent = combat.opponent_of(id).expect("involved");
                self.combat = None;
                events.push((
                    Scope::Room,
                    GameEvent::CombatEnded {
                        victor: Some(opponent),
                        escaped: None,
                    },
                ));
            }
        }

        let removal = self.scheduler.remove(id);
        let clock = if let Some(clock) = self.end_if_decided(&mut events) {
            clock
        } else {
            match removal {
                Removal::TurnPassed(next) => self.start_turn(next, &mut events),
                _ => ClockDirective::None,
            }
        };

        Outcome { events, clock }
    }

    // -- Internals ---------------------------------------------------------

    /// Tiles occupied by living pawns other than `exclude`.
    fn occupied_tiles(&self, exclude: PlayerId) -> HashSet<Coord> {
        self.pawns
            .iter()
            .filter(|p| p.in_rotation() && p.id != exclude)
            .map(|p| p.position)
            .collect()
    }

    /// Starts `actor`'s turn: full budget, turn-start event.
    fn start_turn(
        &mut self,
        actor: PlayerId,
        events: &mut Vec<(Scope, GameEvent)>,
    ) -> ClockDirective {
        self.budget = self.config.action_budget;
        events.push((
            Scope::Room,
            GameEvent::TurnStarted {
                actor,
                budget: self.budget,
            },
        ));
        ClockDirective::RestartTurn
    }

    /// System-issued turn change: advance the rotation, or end the game
    /// if nobody is left to advance to.
    fn next_turn(&mut self, events: &mut Vec<(Scope, GameEvent)>) -> ClockDirective {
        if let Some(clock) = self.end_if_decided(events) {
            return clock;
        }
        match self.scheduler.advance() {
            Ok(next) => self.start_turn(next, events),
            Err(e) => {
                tracing::error!(error = %e, "rotation advance failed");
                self.internal_fault("rotation advance failed", events)
            }
        }
    }

    /// Ends the turn early when the budget is spent — nothing else is
    /// legal, so waiting out the countdown would be dead air.
    fn end_turn_if_spent(
        &mut self,
        events: &mut Vec<(Scope, GameEvent)>,
    ) -> ClockDirective {
        if self.budget == 0 {
            self.next_turn(events)
        } else {
            ClockDirective::None
        }
    }

    /// Ends the game if one or zero eligible players remain.
    fn end_if_decided(
        &mut self,
        events: &mut Vec<(Scope, GameEvent)>,
    ) -> Option<ClockDirective> {
        let mut survivors = self.pawns.iter().filter(|p| p.in_rotation());
        let (first, second) = (survivors.next().map(|p| p.id), survivors.next());
        if second.is_some() {
            return None;
        }

        self.scheduler.finish();
        let (reason, winner) = match first {
            Some(w) => (EndReason::LastPlayerStanding, Some(w)),
            None => (EndReason::NoActivePlayers, None),
        };
        tracing::info!(?reason, ?winner, "game decided");
        events.push((Scope::Room, GameEvent::GameEnded { reason, winner }));
        Some(ClockDirective::CancelAll)
    }

    /// Combat ended with an elimination: drop the loser's loot, heal the
    /// rotation, and hand play back to the main cycle.
    fn resolve_combat_elimination(
        &mut self,
        victor: PlayerId,
        loser: PlayerId,
        events: &mut Vec<(Scope, GameEvent)>,
    ) -> ClockDirective {
        self.combat = None;
        events.push((
            Scope::Room,
            GameEvent::CombatEnded {
                victor: Some(victor),
                escaped: None,
            },
        ));

        let pawn = self.pawn_mut(loser).expect("combatant in roster");
        pawn.eliminated = true;
        let at = pawn.position;
        let loot = std::mem::take(&mut pawn.inventory);
        self.scatter_items(loser, at, loot, events);

        events.push((
            Scope::Room,
            GameEvent::PlayerEliminated {
                player: loser,
                by: Some(victor),
            },
        ));

        let removal = self.scheduler.remove(loser);
        if let Some(clock) = self.end_if_decided(events) {
            return clock;
        }
        match removal {
            // The loser held the interrupted turn; it already passed.
            Removal::TurnPassed(next) => self.start_turn(next, events),
            // The victor held it; the interrupted turn now ends.
            _ => self.next_turn(events),
        }
    }

    /// Drops items onto `at` and the nearest free walkable tiles, in
    /// ring order. Only if every candidate tile is taken does the last
    /// item overwrite (last write wins).
    fn scatter_items(
        &mut self,
        owner: PlayerId,
        at: Coord,
        items: Vec<crate::board::Item>,
        events: &mut Vec<(Scope, GameEvent)>,
    ) {
        for item in items {
            let spot = std::iter::once(at)
                .chain(at.neighbors())
                .find(|c| {
                    self.map
                        .tile(*c)
                        .is_some_and(|t| t.terrain.is_walkable() && t.item.is_none())
                })
                .unwrap_or(at);
            self.map.tile_mut(spot).expect("walkable tile exists").item = Some(item);
            events.push((
                Scope::Room,
                GameEvent::ItemDropped {
                    player: owner,
                    item,
                    at: spot,
                },
            ));
        }
    }

    /// An invariant was violated. Per the error policy the game is ended
    /// defensively and the anomaly is surfaced to observability; no other
    /// game is affected.
    fn internal_fault(
        &mut self,
        what: &str,
        events: &mut Vec<(Scope, GameEvent)>,
    ) -> ClockDirective {
        tracing::error!(what, "game invariant violated, ending game");
        self.combat = None;
        self.scheduler.finish();
        events.push((
            Scope::Room,
            GameEvent::GameEnded {
                reason: EndReason::InternalFault,
                winner: None,
            },
        ));
        ClockDirective::CancelAll
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Item;
    use crate::config::CombatConfig;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn pid(id: u64) -> PlayerId {
        PlayerId(id)
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(1)
    }

    /// 7x5 arena: two start tiles, a wall to break, a door, a sword.
    ///
    /// ```text
    /// #######
    /// #S..s.#
    /// #.##+.#
    /// #..S..#
    /// #######
    /// ```
    fn arena() -> GameMap {
        GameMap::parse(
            "arena",
            &[
                "#######", //
                "#S..s.#", //
                "#.##+.#", //
                "#..S..#", //
                "#######",
            ],
        )
        .unwrap()
    }

    fn config() -> GameConfig {
        GameConfig::default()
    }

    /// Deterministic combat: d1 dice, every hit lands for 2.
    fn lethal_config() -> GameConfig {
        GameConfig {
            combat: CombatConfig {
                max_health: 2,
                base_attack: 3,
                base_defense: 0,
                attack_die: 1,
                defense_die: 1,
                escape_attempts: 2,
                escape_chance: 0.0,
            },
            ..GameConfig::default()
        }
    }

    fn two_player_game(config: GameConfig) -> GameState {
        let mut state =
            GameState::new(config, arena(), &[pid(1), pid(2)]).unwrap();
        let outcome = state.begin();
        assert!(matches!(
            outcome.events.last(),
            Some((Scope::Room, GameEvent::TurnStarted { .. }))
        ));
        assert_eq!(outcome.clock, ClockDirective::RestartTurn);
        state
    }

    /// Puts the two pawns adjacent (P1 at (2,3), P2 at (3,3)) and enters
    /// combat with P1 engaging.
    fn enter_combat(state: &mut GameState) {
        let mut r = rng();
        state
            .apply(pid(1), ClientAction::Move { to: Coord::new(2, 3) }, &mut r)
            .unwrap();
        state
            .apply(
                pid(1),
                ClientAction::Engage { target: pid(2) },
                &mut r,
            )
            .unwrap();
        assert!(state.in_combat());
    }

    // -- Setup -------------------------------------------------------------

    #[test]
    fn test_new_places_pawns_on_start_tiles_in_order() {
        let state = two_player_game(config());
        assert_eq!(state.pawn(pid(1)).unwrap().position, Coord::new(1, 1));
        assert_eq!(state.pawn(pid(2)).unwrap().position, Coord::new(3, 3));
        assert_eq!(state.current_actor(), Some(pid(1)));
    }

    #[test]
    fn test_new_rejects_too_many_players_for_map() {
        let err =
            GameState::new(config(), arena(), &[pid(1), pid(2), pid(3)]).unwrap_err();
        assert_eq!(err, MapError::NotEnoughStartTiles { have: 2, need: 3 });
    }

    #[test]
    fn test_snapshot_reflects_state() {
        let state = two_player_game(config());
        let snap = state.snapshot();
        assert_eq!(snap.map_name, "arena");
        assert_eq!(snap.pawns.len(), 2);
        assert_eq!(snap.current, Some(pid(1)));
        assert_eq!(snap.tiles.len(), 35);
    }

    // -- Turn authorization ------------------------------------------------

    #[test]
    fn test_move_by_non_current_actor_rejected() {
        let mut state = two_player_game(config());
        let err = state
            .apply(pid(2), ClientAction::Move { to: Coord::new(2, 3) }, &mut rng())
            .unwrap_err();
        assert_eq!(err, Rejection::NotYourTurn);
    }

    #[test]
    fn test_single_current_turn_holder() {
        let state = two_player_game(config());
        let holders = [pid(1), pid(2)]
            .iter()
            .filter(|p| state.current_actor() == Some(**p))
            .count();
        assert_eq!(holders, 1);
    }

    // -- Movement ----------------------------------------------------------

    #[test]
    fn test_move_spends_budget_by_path_cost() {
        let mut state = two_player_game(config());
        let out = state
            .apply(pid(1), ClientAction::Move { to: Coord::new(3, 1) }, &mut rng())
            .unwrap();
        assert_eq!(state.pawn(pid(1)).unwrap().position, Coord::new(3, 1));
        assert_eq!(state.budget(), 2); // 4 - 2 steps
        assert!(matches!(
            out.events[0],
            (Scope::Room, GameEvent::PlayerMoved { cost: 2, budget: 2, .. })
        ));
        assert_eq!(out.clock, ClockDirective::None);
    }

    #[test]
    fn test_move_beyond_budget_rejected() {
        let mut state = two_player_game(config());
        // (5,3) is 6 steps away around the inner wall; budget is 4.
        let err = state
            .apply(pid(1), ClientAction::Move { to: Coord::new(5, 3) }, &mut rng())
            .unwrap_err();
        assert_eq!(err, Rejection::OutOfRange);
    }

    #[test]
    fn test_move_onto_wall_rejected() {
        let mut state = two_player_game(config());
        let err = state
            .apply(pid(1), ClientAction::Move { to: Coord::new(2, 2) }, &mut rng())
            .unwrap_err();
        assert_eq!(err, Rejection::InvalidTarget);
    }

    #[test]
    fn test_move_onto_occupied_tile_rejected() {
        let mut state = two_player_game(config());
        let mut r = rng();
        state
            .apply(pid(1), ClientAction::Move { to: Coord::new(2, 3) }, &mut r)
            .unwrap();
        state.apply(pid(1), ClientAction::EndTurn, &mut r).unwrap();
        // P2 tries to walk onto P1's tile.
        let err = state
            .apply(pid(2), ClientAction::Move { to: Coord::new(2, 3) }, &mut r)
            .unwrap_err();
        assert_eq!(err, Rejection::Occupied);
    }

    #[test]
    fn test_exhausting_budget_ends_the_turn() {
        let mut state = two_player_game(config());
        // 4 steps with budget 4: the turn auto-ends.
        let out = state
            .apply(pid(1), ClientAction::Move { to: Coord::new(5, 1) }, &mut rng())
            .unwrap();
        assert!(out.events.iter().any(|(_, e)| matches!(
            e,
            GameEvent::TurnStarted { actor, .. } if *actor == pid(2)
        )));
        assert_eq!(out.clock, ClockDirective::RestartTurn);
        assert_eq!(state.current_actor(), Some(pid(2)));
    }

    // -- Items and inventory -----------------------------------------------

    #[test]
    fn test_walking_over_item_picks_it_up() {
        let mut state = two_player_game(config());
        let out = state
            .apply(pid(1), ClientAction::Move { to: Coord::new(4, 1) }, &mut rng())
            .unwrap();
        assert!(out.events.iter().any(|(s, e)| matches!(
            (s, e),
            (Scope::Room, GameEvent::ItemPickedUp { item: Item::Sword, .. })
        )));
        assert_eq!(state.pawn(pid(1)).unwrap().inventory, vec![Item::Sword]);
        assert_eq!(state.map().tile(Coord::new(4, 1)).unwrap().item, None);
    }

    #[test]
    fn test_third_item_yields_inventory_full_and_leaves_state_unchanged() {
        let mut state = two_player_game(GameConfig {
            action_budget: 10,
            ..config()
        });
        // Stuff the inventory to capacity (2) by hand, then walk onto the
        // sword tile.
        state.pawn_mut(pid(1)).unwrap().inventory = vec![Item::Charm, Item::Shield];
        let out = state
            .apply(pid(1), ClientAction::Move { to: Coord::new(4, 1) }, &mut rng())
            .unwrap();

        let full = out
            .events
            .iter()
            .find(|(_, e)| matches!(e, GameEvent::InventoryFull { .. }))
            .expect("inventory-full notice");
        assert_eq!(full.0, Scope::Player(pid(1)), "requester-only scope");

        let pawn = state.pawn(pid(1)).unwrap();
        assert_eq!(pawn.inventory, vec![Item::Charm, Item::Shield]);
        assert_eq!(
            state.map().tile(Coord::new(4, 1)).unwrap().item,
            Some(Item::Sword),
            "item stays on the floor"
        );
    }

    #[test]
    fn test_drop_item_lands_on_current_tile() {
        let mut state = two_player_game(config());
        state.pawn_mut(pid(1)).unwrap().inventory = vec![Item::Charm];
        let out = state
            .apply(pid(1), ClientAction::DropItem { item: Item::Charm }, &mut rng())
            .unwrap();
        assert!(matches!(
            out.events[0].1,
            GameEvent::ItemDropped { item: Item::Charm, .. }
        ));
        assert_eq!(
            state.map().tile(Coord::new(1, 1)).unwrap().item,
            Some(Item::Charm)
        );
        assert!(state.pawn(pid(1)).unwrap().inventory.is_empty());
    }

    #[test]
    fn test_drop_unheld_item_rejected() {
        let mut state = two_player_game(config());
        let err = state
            .apply(pid(1), ClientAction::DropItem { item: Item::Sword }, &mut rng())
            .unwrap_err();
        assert_eq!(err, Rejection::InvalidTarget);
    }

    // -- Walls and doors ---------------------------------------------------

    #[test]
    fn test_break_adjacent_wall_consumes_turn() {
        let mut state = two_player_game(config());
        let out = state
            .apply(
                pid(1),
                ClientAction::BreakWall { at: Coord::new(1, 0) },
                &mut rng(),
            )
            .unwrap();
        assert_eq!(
            state.map().tile(Coord::new(1, 0)).unwrap().terrain,
            Terrain::Rubble
        );
        // Budget consumed: the turn passed to P2.
        assert_eq!(state.current_actor(), Some(pid(2)));
        assert_eq!(out.clock, ClockDirective::RestartTurn);
    }

    #[test]
    fn test_break_distant_wall_rejected() {
        let mut state = two_player_game(config());
        let err = state
            .apply(
                pid(1),
                ClientAction::BreakWall { at: Coord::new(3, 2) },
                &mut rng(),
            )
            .unwrap_err();
        assert_eq!(err, Rejection::OutOfRange);
    }

    #[test]
    fn test_break_non_wall_rejected() {
        let mut state = two_player_game(config());
        let err = state
            .apply(
                pid(1),
                ClientAction::BreakWall { at: Coord::new(2, 1) },
                &mut rng(),
            )
            .unwrap_err();
        assert_eq!(err, Rejection::InvalidTarget);
    }

    #[test]
    fn test_toggle_door_flips_and_costs_one() {
        let mut state = two_player_game(config());
        let mut r = rng();
        // Walk next to the door at (4,2).
        state
            .apply(pid(1), ClientAction::Move { to: Coord::new(4, 1) }, &mut r)
            .unwrap();
        let out = state
            .apply(
                pid(1),
                ClientAction::ToggleDoor { at: Coord::new(4, 2) },
                &mut r,
            )
            .unwrap();
        assert!(matches!(
            out.events[0].1,
            GameEvent::DoorToggled { open: true, .. }
        ));
        assert_eq!(
            state.map().tile(Coord::new(4, 2)).unwrap().terrain,
            Terrain::Door { open: true }
        );
        // 3 steps + 1 toggle spent the whole budget, ending the turn.
        assert_eq!(state.current_actor(), Some(pid(2)));
    }

    #[test]
    fn test_toggle_non_door_rejected() {
        let mut state = two_player_game(config());
        let err = state
            .apply(
                pid(1),
                ClientAction::ToggleDoor { at: Coord::new(2, 1) },
                &mut rng(),
            )
            .unwrap_err();
        assert_eq!(err, Rejection::InvalidTarget);
    }

    // -- Combat ------------------------------------------------------------

    #[test]
    fn test_engage_requires_adjacency() {
        let mut state = two_player_game(config());
        let err = state
            .apply(pid(1), ClientAction::Engage { target: pid(2) }, &mut rng())
            .unwrap_err();
        assert_eq!(err, Rejection::OutOfRange);
    }

    #[test]
    fn test_engage_starts_combat_with_initiator_first() {
        let mut state = two_player_game(config());
        enter_combat(&mut state);
        let combat = state.combat().unwrap();
        assert_eq!(combat.current(), pid(1));
    }

    #[test]
    fn test_board_actions_blocked_during_combat() {
        let mut state = two_player_game(config());
        enter_combat(&mut state);
        let err = state
            .apply(pid(1), ClientAction::Move { to: Coord::new(1, 3) }, &mut rng())
            .unwrap_err();
        assert_eq!(err, Rejection::InCombat);
    }

    #[test]
    fn test_attack_outside_combat_rejected() {
        let mut state = two_player_game(config());
        let err = state.apply(pid(1), ClientAction::Attack, &mut rng()).unwrap_err();
        assert_eq!(err, Rejection::NotInCombat);
    }

    #[test]
    fn test_attack_out_of_combat_turn_rejected() {
        let mut state = two_player_game(config());
        enter_combat(&mut state);
        let err = state.apply(pid(2), ClientAction::Attack, &mut rng()).unwrap_err();
        assert_eq!(err, Rejection::NotYourTurn);
    }

    #[test]
    fn test_attack_alternates_combat_turns() {
        let mut state = two_player_game(config());
        enter_combat(&mut state);
        // Default config: max damage is 5 against 6 health, so one attack
        // can never end the fight.
        let out = state.apply(pid(1), ClientAction::Attack, &mut rng()).unwrap();
        assert!(state.in_combat());
        assert_eq!(state.combat().unwrap().current(), pid(2));
        assert_eq!(out.clock, ClockDirective::RestartCombat);
    }

    #[test]
    fn test_elimination_removes_loser_from_rotation_and_drops_loot() {
        let mut state = two_player_game(lethal_config());
        state.pawn_mut(pid(2)).unwrap().inventory = vec![Item::Charm];
        enter_combat(&mut state);

        // d1 vs d1: attack = 3+1, defense = 0+1, damage 3 ≥ health 2.
        let out = state.apply(pid(1), ClientAction::Attack, &mut rng()).unwrap();

        assert!(!state.in_combat());
        let loser = state.pawn(pid(2)).unwrap();
        assert!(loser.eliminated);
        assert!(loser.inventory.is_empty());

        let kinds: Vec<&GameEvent> = out.events.iter().map(|(_, e)| e).collect();
        assert!(kinds.iter().any(|e| matches!(e, GameEvent::CombatEnded { victor: Some(v), .. } if *v == pid(1))));
        assert!(kinds.iter().any(|e| matches!(e, GameEvent::ItemDropped { item: Item::Charm, .. })));
        assert!(kinds.iter().any(|e| matches!(e, GameEvent::PlayerEliminated { player, .. } if *player == pid(2))));
        // Two-player game: elimination decides it.
        assert!(kinds.iter().any(|e| matches!(
            e,
            GameEvent::GameEnded { reason: EndReason::LastPlayerStanding, winner: Some(w) } if *w == pid(1)
        )));
        assert_eq!(out.clock, ClockDirective::CancelAll);
        assert!(state.is_finished());
        assert_eq!(state.winner(), Some(pid(1)));
    }

    #[test]
    fn test_elimination_in_three_player_game_continues_rotation() {
        // Map with three starts.
        let map = GameMap::parse(
            "trio",
            &[
                "#####", //
                "#SSS#", //
                "#...#", //
                "#####",
            ],
        )
        .unwrap();
        let mut state =
            GameState::new(lethal_config(), map, &[pid(1), pid(2), pid(3)]).unwrap();
        state.begin();
        let mut r = rng();

        // P1 engages adjacent P2 and kills them.
        state
            .apply(pid(1), ClientAction::Engage { target: pid(2) }, &mut r)
            .unwrap();
        let out = state.apply(pid(1), ClientAction::Attack, &mut r).unwrap();

        assert!(!state.is_finished());
        // The interrupted turn (P1's) ended; with B gone the rotation is
        // [A, C] and it's C's turn.
        assert_eq!(state.current_actor(), Some(pid(3)));
        assert!(out.events.iter().any(|(_, e)| matches!(
            e,
            GameEvent::TurnStarted { actor, .. } if *actor == pid(3)
        )));

        // Subsequent rotation visits only A and C.
        state.apply(pid(3), ClientAction::EndTurn, &mut r).unwrap();
        assert_eq!(state.current_actor(), Some(pid(1)));
        state.apply(pid(1), ClientAction::EndTurn, &mut r).unwrap();
        assert_eq!(state.current_actor(), Some(pid(3)));
    }

    #[test]
    fn test_escape_with_certain_chance_resumes_main_cycle() {
        let mut cfg = lethal_config();
        cfg.combat.escape_chance = 1.0;
        let mut state = two_player_game(cfg);
        enter_combat(&mut state);

        let out = state
            .apply(pid(1), ClientAction::AttemptEscape, &mut rng())
            .unwrap();

        assert!(!state.in_combat());
        assert!(out.events.iter().any(|(_, e)| matches!(
            e,
            GameEvent::EscapeAttempted { succeeded: true, .. }
        )));
        assert!(out.events.iter().any(|(_, e)| matches!(
            e,
            GameEvent::CombatEnded { victor: None, escaped: Some(p) } if *p == pid(1)
        )));
        // Interrupted turn over: P2 is up, nobody eliminated.
        assert_eq!(state.current_actor(), Some(pid(2)));
        assert!(!state.pawn(pid(1)).unwrap().eliminated);
        assert_eq!(out.clock, ClockDirective::RestartTurn);
    }

    #[test]
    fn test_failed_escape_consumes_attempt_and_passes_combat_turn() {
        let mut state = two_player_game(lethal_config()); // escape_chance 0.0
        enter_combat(&mut state);

        let out = state
            .apply(pid(1), ClientAction::AttemptEscape, &mut rng())
            .unwrap();
        assert!(state.in_combat());
        assert!(out.events.iter().any(|(_, e)| matches!(
            e,
            GameEvent::EscapeAttempted { succeeded: false, attempts_left: 1, .. }
        )));
        assert_eq!(state.combat().unwrap().current(), pid(2));
    }

    #[test]
    fn test_escape_without_attempts_left_rejected() {
        let mut state = two_player_game(lethal_config());
        enter_combat(&mut state);
        let mut r = rng();

        // Burn both of P1's attempts (failures pass the combat turn, so
        // P2 passes back with a forced-pass expiry each time).
        state.apply(pid(1), ClientAction::AttemptEscape, &mut r).unwrap();
        state.handle_combat_expiry(); // P2's turn times out, back to P1
        state.apply(pid(1), ClientAction::AttemptEscape, &mut r).unwrap();
        state.handle_combat_expiry();

        let err = state
            .apply(pid(1), ClientAction::AttemptEscape, &mut r)
            .unwrap_err();
        assert_eq!(err, Rejection::InvalidTarget);
    }

    #[test]
    fn test_combat_expiry_is_forced_pass_not_loss() {
        let mut state = two_player_game(config());
        enter_combat(&mut state);

        let out = state.handle_combat_expiry();
        assert!(state.in_combat(), "nobody lost");
        assert_eq!(state.combat().unwrap().current(), pid(2));
        assert!(matches!(
            out.events[0].1,
            GameEvent::CombatTurn { actor } if actor == pid(2)
        ));
        assert_eq!(out.clock, ClockDirective::RestartCombat);
    }

    // -- Expiry and departures ---------------------------------------------

    #[test]
    fn test_turn_expiry_advances_rotation() {
        let mut state = two_player_game(config());
        let out = state.handle_turn_expiry();
        assert_eq!(state.current_actor(), Some(pid(2)));
        assert!(matches!(
            out.events[0].1,
            GameEvent::TurnStarted { actor, .. } if actor == pid(2)
        ));
        assert_eq!(out.clock, ClockDirective::RestartTurn);
    }

    #[test]
    fn test_turn_expiry_after_game_end_is_a_fault_not_a_panic() {
        let mut state = two_player_game(config());
        state.remove_player(pid(2));
        assert!(state.is_finished());

        let out = state.handle_turn_expiry();
        assert!(out.events.iter().any(|(_, e)| matches!(
            e,
            GameEvent::GameEnded { reason: EndReason::InternalFault, .. }
        )));
        assert_eq!(out.clock, ClockDirective::CancelAll);
    }

    #[test]
    fn test_remove_current_player_passes_turn() {
        let map = GameMap::parse(
            "trio",
            &[
                "#####", //
                "#SSS#", //
                "#...#", //
                "#####",
            ],
        )
        .unwrap();
        let mut state =
            GameState::new(config(), map, &[pid(1), pid(2), pid(3)]).unwrap();
        state.begin();

        let out = state.remove_player(pid(1));
        assert_eq!(state.current_actor(), Some(pid(2)));
        assert!(out.events.iter().any(|(_, e)| matches!(
            e,
            GameEvent::TurnStarted { actor, .. } if *actor == pid(2)
        )));
        assert_eq!(out.clock, ClockDirective::RestartTurn);
    }

    #[test]
    fn test_remove_to_one_player_ends_game_with_winner() {
        let mut state = two_player_game(config());
        let out = state.remove_player(pid(2));
        assert!(state.is_finished());
        assert_eq!(state.winner(), Some(pid(1)));
        assert!(out.events.iter().any(|(_, e)| matches!(
            e,
            GameEvent::GameEnded { reason: EndReason::LastPlayerStanding, winner: Some(w) } if *w == pid(1)
        )));
        assert_eq!(out.clock, ClockDirective::CancelAll);
    }

    #[test]
    fn test_remove_combatant_resolves_combat_as_walkover() {
        let map = GameMap::parse(
            "trio",
            &[
                "#####", //
                "#SSS#", //
                "#...#", //
                "#####",
            ],
        )
        .unwrap();
        let mut state =
            GameState::new(config(), map, &[pid(1), pid(2), pid(3)]).unwrap();
        state.begin();
        let mut r = rng();
        state
            .apply(pid(1), ClientAction::Engage { target: pid(2) }, &mut r)
            .unwrap();

        let out = state.remove_player(pid(2));
        assert!(!state.in_combat());
        assert!(out.events.iter().any(|(_, e)| matches!(
            e,
            GameEvent::CombatEnded { victor: Some(v), escaped: None } if *v == pid(1)
        )));
        // P2 was not eliminated by combat, they departed; P1 survives.
        assert!(!state.is_finished());
    }

    #[test]
    fn test_remove_unknown_player_is_a_noop() {
        let mut state = two_player_game(config());
        let out = state.remove_player(pid(99));
        assert!(out.events.is_empty());
        assert_eq!(out.clock, ClockDirective::None);
    }

    #[test]
    fn test_actions_rejected_after_game_over() {
        let mut state = two_player_game(config());
        state.remove_player(pid(2));
        let err = state
            .apply(pid(1), ClientAction::EndTurn, &mut rng())
            .unwrap_err();
        assert_eq!(err, Rejection::NotStarted);
    }
}
