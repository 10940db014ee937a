//! Capture-resolution bridge.
//!
//! When a capture involves the human-controlled faction the engine
//! suspends, publishes a `CaptureSnapshot`, and waits for exactly one
//! `resume` call naming the winner. The snapshot carries everything a
//! separate context needs to restore the race afterwards.
//!
//! The contest itself is a pure decision `(challenger, defender) ->
//! winner`; `ShowdownContest` is the built-in arbiter, a best-of-one
//! elemental showdown with ties redrawn.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::board::Faction;
use crate::error::GameError;
use crate::pieces::PawnRecord;

// ============================================================================
// SNAPSHOT
// ============================================================================

/// Full game state captured immediately before suspending to a contest.
///
/// `challenger` holds the moving pawn's prospective post-capture state;
/// `defender` holds the occupant's current state. The roster rows hold
/// every pawn's state at the moment of suspension, before the move
/// committed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureSnapshot {
    pub roster: Vec<PawnRecord>,
    pub active_faction: Faction,
    pub dice_result: u8,
    pub challenger: PawnRecord,
    pub defender: PawnRecord,
}

impl CaptureSnapshot {
    /// True if `faction` is one of the two contesting sides
    pub fn is_contestant(&self, faction: Faction) -> bool {
        faction == self.challenger.faction || faction == self.defender.faction
    }

    /// Serialize to a JSON string
    pub fn to_json(&self) -> Result<String, GameError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| GameError::Setup(format!("cannot serialize snapshot: {e}")))
    }

    /// Deserialize from a JSON string
    pub fn from_json(json: &str) -> Result<Self, GameError> {
        serde_json::from_str(json)
            .map_err(|e| GameError::Setup(format!("malformed snapshot: {e}")))
    }

    /// Save to a JSON file
    pub fn save(&self, path: &Path) -> Result<(), GameError> {
        std::fs::write(path, self.to_json()?)
            .map_err(|e| GameError::Setup(format!("cannot write snapshot {}: {e}", path.display())))
    }

    /// Load from a JSON file
    pub fn load(path: &Path) -> Result<Self, GameError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| GameError::Setup(format!("cannot read snapshot {}: {e}", path.display())))?;
        Self::from_json(&content)
    }
}

// ============================================================================
// CONTEST
// ============================================================================

/// Arbiter of a contested capture. Must return one of the two
/// contestants' factions.
pub trait Contest {
    fn resolve(&mut self, challenger: &PawnRecord, defender: &PawnRecord) -> Faction;
}

/// A throw in the elemental showdown
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Throw {
    Rock,
    Paper,
    Scissors,
}

impl Throw {
    const ALL: [Throw; 3] = [Throw::Rock, Throw::Paper, Throw::Scissors];

    /// True if `self` defeats `other`
    pub fn beats(self, other: Throw) -> bool {
        matches!(
            (self, other),
            (Throw::Rock, Throw::Scissors)
                | (Throw::Paper, Throw::Rock)
                | (Throw::Scissors, Throw::Paper)
        )
    }
}

/// Best-of-one showdown with ties redrawn until decided
pub struct ShowdownContest {
    rng: ChaCha8Rng,
}

impl ShowdownContest {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => ChaCha8Rng::seed_from_u64(s),
            None => ChaCha8Rng::from_entropy(),
        };
        Self { rng }
    }

    fn draw(&mut self) -> Throw {
        Throw::ALL[self.rng.gen_range(0..3)]
    }
}

impl Contest for ShowdownContest {
    fn resolve(&mut self, challenger: &PawnRecord, defender: &PawnRecord) -> Faction {
        loop {
            let challenger_throw = self.draw();
            let defender_throw = self.draw();
            if challenger_throw.beats(defender_throw) {
                return challenger.faction;
            }
            if defender_throw.beats(challenger_throw) {
                return defender.faction;
            }
            // Tie: redraw
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
