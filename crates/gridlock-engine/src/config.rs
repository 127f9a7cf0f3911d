//! Tunable game rules.
//!
//! Combat math and escape policy are deliberately parameters, not
//! constants — the defaults below are one reasonable balance, and a
//! deployment can reshape them without touching rule code.

use serde::{Deserialize, Serialize};

/// Combat policy: health pool, dice, and escape odds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatConfig {
    /// Health every pawn spawns with.
    pub max_health: i32,
    /// Base attack added to the attack die.
    pub base_attack: i32,
    /// Base defense added to the defense die.
    pub base_defense: i32,
    /// Sides on the attack die.
    pub attack_die: u32,
    /// Sides on the defense die.
    pub defense_die: u32,
    /// Escape attempts each combatant gets per combat.
    pub escape_attempts: u8,
    /// Probability that one escape attempt succeeds (0.0–1.0).
    pub escape_chance: f64,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            max_health: 6,
            base_attack: 4,
            base_defense: 4,
            attack_die: 6,
            defense_die: 4,
            escape_attempts: 2,
            escape_chance: 0.40,
        }
    }
}

/// Full rule set for one game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    /// Minimum players required to start.
    pub min_players: usize,
    /// Maximum players allowed in the game.
    pub max_players: usize,
    /// Main turn length in seconds.
    pub turn_secs: u64,
    /// Combat round length in seconds.
    pub combat_turn_secs: u64,
    /// Action budget per turn (movement steps and door toggles draw on it).
    pub action_budget: u32,
    /// Inventory slots per pawn.
    pub inventory_capacity: usize,
    /// Budget cost of toggling a door.
    pub door_toggle_cost: u32,
    /// Combat policy.
    pub combat: CombatConfig,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            min_players: 2,
            max_players: 4,
            turn_secs: 30,
            combat_turn_secs: 5,
            action_budget: 4,
            inventory_capacity: 2,
            door_toggle_cost: 1,
            combat: CombatConfig::default(),
        }
    }
}

impl GameConfig {
    /// Clamps out-of-range values so the config is safe to use.
    ///
    /// Rules: at least one player, `max_players >= min_players`, nonzero
    /// budget and inventory, dice with at least one side, escape chance
    /// in `0.0..=1.0`, nonzero health.
    pub fn validated(mut self) -> Self {
        self.min_players = self.min_players.max(1);
        self.max_players = self.max_players.max(self.min_players);
        self.action_budget = self.action_budget.max(1);
        self.inventory_capacity = self.inventory_capacity.max(1);
        self.combat.attack_die = self.combat.attack_die.max(1);
        self.combat.defense_die = self.combat.defense_die.max(1);
        self.combat.escape_chance = self.combat.escape_chance.clamp(0.0, 1.0);
        self.combat.max_health = self.combat.max_health.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_already_valid() {
        let cfg = GameConfig::default();
        let validated = cfg.clone().validated();
        assert_eq!(cfg.min_players, validated.min_players);
        assert_eq!(cfg.max_players, validated.max_players);
        assert_eq!(cfg.inventory_capacity, validated.inventory_capacity);
    }

    #[test]
    fn test_validated_clamps_degenerate_values() {
        let cfg = GameConfig {
            min_players: 0,
            max_players: 0,
            action_budget: 0,
            inventory_capacity: 0,
            combat: CombatConfig {
                escape_chance: 7.5,
                attack_die: 0,
                max_health: 0,
                ..CombatConfig::default()
            },
            ..GameConfig::default()
        }
        .validated();

        assert_eq!(cfg.min_players, 1);
        assert!(cfg.max_players >= cfg.min_players);
        assert_eq!(cfg.action_budget, 1);
        assert_eq!(cfg.inventory_capacity, 1);
        assert_eq!(cfg.combat.escape_chance, 1.0);
        assert_eq!(cfg.combat.attack_die, 1);
        assert_eq!(cfg.combat.max_health, 1);
    }
}
