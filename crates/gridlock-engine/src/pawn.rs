//! A player's in-game piece.

use gridlock_protocol::PlayerId;
use serde::{Deserialize, Serialize};

use crate::board::{Coord, Item};

/// One player's presence on the board.
///
/// Eliminated and departed pawns stay in the roster as historical record —
/// they are only ever removed from the turn *rotation*, never from the
/// roster, so late observers still see the full cast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pawn {
    pub id: PlayerId,
    pub position: Coord,
    /// Carried items, bounded by `GameConfig::inventory_capacity`. The
    /// bound is enforced by the applier, not here.
    pub inventory: Vec<Item>,
    pub health: i32,
    /// Still participating (false after leave/kick).
    pub active: bool,
    /// Lost a combat.
    pub eliminated: bool,
}

impl Pawn {
    pub fn new(id: PlayerId, position: Coord, health: i32) -> Self {
        Self {
            id,
            position,
            inventory: Vec::new(),
            health,
            active: true,
            eliminated: false,
        }
    }

    /// Whether this pawn belongs in the turn rotation.
    pub fn in_rotation(&self) -> bool {
        self.active && !self.eliminated
    }

    /// Sum of attack bonuses from carried items.
    pub fn attack_modifier(&self) -> i32 {
        self.inventory.iter().map(|i| i.attack_bonus()).sum()
    }

    /// Sum of defense bonuses from carried items.
    pub fn defense_modifier(&self) -> i32 {
        self.inventory.iter().map(|i| i.defense_bonus()).sum()
    }

    /// Removes one instance of `item` from the inventory, if held.
    pub fn take_item(&mut self, item: Item) -> Option<Item> {
        let pos = self.inventory.iter().position(|i| *i == item)?;
        Some(self.inventory.remove(pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pawn() -> Pawn {
        Pawn::new(PlayerId(1), Coord::new(0, 0), 6)
    }

    #[test]
    fn test_new_pawn_is_in_rotation() {
        let p = pawn();
        assert!(p.in_rotation());
        assert!(p.inventory.is_empty());
        assert_eq!(p.health, 6);
    }

    #[test]
    fn test_eliminated_pawn_leaves_rotation() {
        let mut p = pawn();
        p.eliminated = true;
        assert!(!p.in_rotation());
    }

    #[test]
    fn test_departed_pawn_leaves_rotation() {
        let mut p = pawn();
        p.active = false;
        assert!(!p.in_rotation());
    }

    #[test]
    fn test_item_modifiers_stack() {
        let mut p = pawn();
        p.inventory = vec![Item::Sword, Item::Charm];
        assert_eq!(p.attack_modifier(), 3);
        assert_eq!(p.defense_modifier(), 1);
    }

    #[test]
    fn test_take_item_removes_one_instance() {
        let mut p = pawn();
        p.inventory = vec![Item::Charm, Item::Sword];
        assert_eq!(p.take_item(Item::Sword), Some(Item::Sword));
        assert_eq!(p.inventory, vec![Item::Charm]);
        assert_eq!(p.take_item(Item::Sword), None);
    }
}
