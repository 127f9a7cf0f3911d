//! The rotating turn scheduler.
//!
//! One `TurnScheduler` per game. It owns the ordered rotation (join order)
//! and the cursor identifying the current actor — the single source of the
//! "at most one pawn holds the current turn" invariant. Eliminated and
//! departed players are *removed* from the rotation (the roster keeps
//! them); the scheduler never has to skip anyone mid-advance.

use gridlock_protocol::PlayerId;
use serde::{Deserialize, Serialize};

/// Lifecycle of the rotation.
///
/// ```text
/// NotStarted → InProgress → Ended
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnPhase {
    NotStarted,
    InProgress,
    Ended,
}

/// Errors from illegal scheduler operations. These are lifecycle
/// conflicts (§ error taxonomy), surfaced to the caller as typed values.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TurnError {
    /// The rotation hasn't started yet.
    #[error("turn rotation has not started")]
    NotStarted,

    /// The rotation is already running.
    #[error("turn rotation already started")]
    AlreadyStarted,

    /// The rotation already ended.
    #[error("turn rotation has ended")]
    Ended,

    /// The caller does not hold the current turn.
    #[error("player {0} does not hold the current turn")]
    NotCurrentActor(PlayerId),

    /// No eligible actors remain; the rotation has ended.
    #[error("no eligible actors remain")]
    NoEligibleActors,
}

/// Result of removing an actor from the rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// The removed actor held the turn; it passed to this player.
    TurnPassed(PlayerId),
    /// The removed actor did not hold the turn; the cursor is untouched.
    Unchanged,
    /// Removal left the rotation empty; the phase is now `Ended`.
    NoneLeft,
    /// The player was not in the rotation to begin with.
    NotInRotation,
}

/// The per-game turn rotation.
#[derive(Debug, Clone)]
pub struct TurnScheduler {
    phase: TurnPhase,
    order: Vec<PlayerId>,
    cursor: Option<usize>,
}

impl TurnScheduler {
    /// Builds a scheduler over `order` (join order = turn order).
    pub fn new(order: Vec<PlayerId>) -> Self {
        Self {
            phase: TurnPhase::NotStarted,
            order,
            cursor: None,
        }
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    /// The player currently holding the turn, if the rotation is running.
    pub fn current(&self) -> Option<PlayerId> {
        match (self.phase, self.cursor) {
            (TurnPhase::InProgress, Some(i)) => self.order.get(i).copied(),
            _ => None,
        }
    }

    /// Players remaining in the rotation, in turn order.
    pub fn rotation(&self) -> &[PlayerId] {
        &self.order
    }

    /// Starts the rotation at the first player.
    pub fn start(&mut self) -> Result<PlayerId, TurnError> {
        match self.phase {
            TurnPhase::InProgress => Err(TurnError::AlreadyStarted),
            TurnPhase::Ended => Err(TurnError::Ended),
            TurnPhase::NotStarted => {
                let first = *self.order.first().ok_or(TurnError::NoEligibleActors)?;
                self.phase = TurnPhase::InProgress;
                self.cursor = Some(0);
                Ok(first)
            }
        }
    }

    /// Advances the cursor to the next player, wrapping around.
    ///
    /// This is the system-issued turn change (countdown expiry); it does
    /// not check who held the turn.
    pub fn advance(&mut self) -> Result<PlayerId, TurnError> {
        match self.phase {
            TurnPhase::NotStarted => Err(TurnError::NotStarted),
            TurnPhase::Ended => Err(TurnError::Ended),
            TurnPhase::InProgress => {
                if self.order.is_empty() {
                    self.phase = TurnPhase::Ended;
                    self.cursor = None;
                    return Err(TurnError::NoEligibleActors);
                }
                let i = (self.cursor.unwrap_or(0) + 1) % self.order.len();
                self.cursor = Some(i);
                Ok(self.order[i])
            }
        }
    }

    /// Ends `actor`'s turn. Rejected if `actor` does not hold it.
    pub fn end_turn(&mut self, actor: PlayerId) -> Result<PlayerId, TurnError> {
        match self.phase {
            TurnPhase::NotStarted => Err(TurnError::NotStarted),
            TurnPhase::Ended => Err(TurnError::Ended),
            TurnPhase::InProgress => {
                if self.current() != Some(actor) {
                    return Err(TurnError::NotCurrentActor(actor));
                }
                self.advance()
            }
        }
    }

    /// Removes `actor` from the rotation.
    ///
    /// If they held the current turn this behaves like a system `end_turn`
    /// (the turn passes to their successor); otherwise the cursor is
    /// adjusted so the rotation order is undisturbed.
    pub fn remove(&mut self, actor: PlayerId) -> Removal {
        let Some(pos) = self.order.iter().position(|p| *p == actor) else {
            return Removal::NotInRotation;
        };

        let held_turn =
            self.phase == TurnPhase::InProgress && self.cursor == Some(pos);
        self.order.remove(pos);

        if self.order.is_empty() {
            self.phase = TurnPhase::Ended;
            self.cursor = None;
            return Removal::NoneLeft;
        }

        match self.cursor {
            Some(c) if c > pos => self.cursor = Some(c - 1),
            // Removing the current actor leaves the cursor pointing at
            // their successor (or wrapped to the front).
            Some(c) if c == pos => self.cursor = Some(c % self.order.len()),
            _ => {}
        }

        if held_turn {
            Removal::TurnPassed(self.order[self.cursor.expect("non-empty rotation")])
        } else {
            Removal::Unchanged
        }
    }

    /// Marks the rotation as finished (game over).
    pub fn finish(&mut self) {
        self.phase = TurnPhase::Ended;
        self.cursor = None;
    }
}

// =========================================================================
// Tests
// =========================================================================
