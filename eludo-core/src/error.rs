//! Engine error taxonomy.
//!
//! Rule outcomes (turn rotation, skipped turns, home entry) are not
//! errors; only calls at the wrong time, illegal moves and broken setup
//! surface here.

use crate::board::Faction;
use crate::game::GamePhase;

/// Errors reported by the turn engine
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    /// The call is not valid in the engine's current phase; nothing was
    /// mutated and the caller may retry at the correct time.
    #[error("invalid state transition: {action} requires {expected}, game is in {actual}")]
    InvalidStateTransition {
        action: &'static str,
        expected: &'static str,
        actual: GamePhase,
    },

    /// User-facing move rejection; state unchanged, same faction retries
    #[error("illegal move: {0}")]
    IllegalMove(&'static str),

    /// Dice value outside 1..=6
    #[error("dice value out of range: {0}")]
    InvalidDiceValue(u8),

    /// Pawn index outside the active faction's roster
    #[error("{faction} has no pawn {index}")]
    UnknownPawn { faction: Faction, index: u8 },

    /// `resume` named a faction that is not part of the contested capture
    #[error("{0} is not a contestant in the suspended capture")]
    NotContestant(Faction),

    /// Missing or malformed board/roster data; the match cannot begin
    #[error("setup error: {0}")]
    Setup(String),
}
