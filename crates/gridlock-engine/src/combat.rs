//! Combat resolution: dice rolls, damage, and escape attempts.
//!
//! The combat *flow* (who may act, what ends combat) lives in
//! [`crate::state`]; this module owns the combat data and the chance math.
//! Every roll takes `&mut impl Rng` so tests can use a seeded generator.

use gridlock_protocol::PlayerId;
use rand::Rng;

use crate::config::CombatConfig;
use crate::pawn::Pawn;

/// The nested combat state. Exists only while two pawns are fighting;
/// dropped on resolution, restoring the enclosing turn flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombatState {
    /// `[initiator, defender]`. The initiator acts first.
    combatants: [PlayerId; 2],
    /// Index into `combatants` of whoever acts next.
    turn: usize,
    /// Escape attempts left, indexed like `combatants`.
    escapes_left: [u8; 2],
}

impl CombatState {
    pub fn new(initiator: PlayerId, defender: PlayerId, escape_attempts: u8) -> Self {
        Self {
            combatants: [initiator, defender],
            turn: 0,
            escapes_left: [escape_attempts; 2],
        }
    }

    /// Whose combat turn it is.
    pub fn current(&self) -> PlayerId {
        self.combatants[self.turn]
    }

    /// The current actor's opponent.
    pub fn opponent(&self) -> PlayerId {
        self.combatants[1 - self.turn]
    }

    /// The opponent of `p`, if `p` is in this combat.
    pub fn opponent_of(&self, p: PlayerId) -> Option<PlayerId> {
        if p == self.combatants[0] {
            Some(self.combatants[1])
        } else if p == self.combatants[1] {
            Some(self.combatants[0])
        } else {
            None
        }
    }

    pub fn involves(&self, p: PlayerId) -> bool {
        self.combatants.contains(&p)
    }

    /// Hands the combat turn to the other combatant.
    pub fn pass_turn(&mut self) {
        self.turn = 1 - self.turn;
    }

    /// Escape attempts left for `p`, if they are in this combat.
    pub fn escapes_left(&self, p: PlayerId) -> Option<u8> {
        let i = self.combatants.iter().position(|c| *c == p)?;
        Some(self.escapes_left[i])
    }

    /// Consumes one escape attempt for `p`. Returns the remaining count,
    /// or `None` if none were left (the attempt is not consumed).
    pub fn consume_escape(&mut self, p: PlayerId) -> Option<u8> {
        let i = self.combatants.iter().position(|c| *c == p)?;
        if self.escapes_left[i] == 0 {
            return None;
        }
        self.escapes_left[i] -= 1;
        Some(self.escapes_left[i])
    }
}

/// The resolved rolls of one attack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttackOutcome {
    pub attack_roll: i32,
    pub defense_roll: i32,
    /// `max(0, attack_roll - defense_roll)`.
    pub damage: i32,
}

/// Rolls one attack: `base + items + d(die)` on each side, damage is the
/// margin (never negative).
pub fn roll_attack(
    rng: &mut impl Rng,
    cfg: &CombatConfig,
    attacker: &Pawn,
    defender: &Pawn,
) -> AttackOutcome {
    let attack_roll =
        cfg.base_attack + attacker.attack_modifier() + roll_die(rng, cfg.attack_die);
    let defense_roll =
        cfg.base_defense + defender.defense_modifier() + roll_die(rng, cfg.defense_die);
    AttackOutcome {
        attack_roll,
        defense_roll,
        damage: (attack_roll - defense_roll).max(0),
    }
}

/// Rolls one escape attempt against `cfg.escape_chance`.
pub fn roll_escape(rng: &mut impl Rng, cfg: &CombatConfig) -> bool {
    rng.random_bool(cfg.escape_chance)
}

fn roll_die(rng: &mut impl Rng, sides: u32) -> i32 {
    rng.random_range(1..=sides) as i32
}

// =========================================================================
// Tests
// =========================================================================
