//! Pawns and per-faction rosters.

use serde::{Deserialize, Serialize};

use crate::board::{Faction, Topology, PAWNS_PER_FACTION};
use crate::error::GameError;

/// Movement state of a pawn. Track positions live inside the variant, so
/// a pawn in base or on the goal simply has none.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PawnState {
    /// Waiting in its faction's base; enters play on a 6
    InBase,
    /// On the shared main path at `index`
    OnMainPath { index: usize },
    /// On its faction's home track at `index` (last index is the goal)
    InHomeStretch { index: usize },
    /// Reached the goal
    Finished,
}

impl PawnState {
    /// Index along the pawn's current track, if it is on one
    pub fn track_index(&self) -> Option<usize> {
        match self {
            PawnState::OnMainPath { index } | PawnState::InHomeStretch { index } => Some(*index),
            PawnState::InBase | PawnState::Finished => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, PawnState::Finished)
    }
}

/// A single token. Owned by its `Player`; only the turn engine mutates it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pawn {
    pub faction: Faction,
    /// Per-faction pawn index (0-3)
    pub index: u8,
    pub state: PawnState,
    /// True once the pawn has travelled the full main path; gates home entry
    pub lap_completed: bool,
}

impl Pawn {
    fn new(faction: Faction, index: u8) -> Self {
        Self {
            faction,
            index,
            state: PawnState::InBase,
            lap_completed: false,
        }
    }

    /// Send the pawn back to its base
    pub(crate) fn reset_to_base(&mut self) {
        self.state = PawnState::InBase;
        self.lap_completed = false;
    }
}

/// One faction's roster entry: its four pawns plus the main-path indices
/// resolved from the topology at setup.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Player {
    pub faction: Faction,
    pub pawns: [Pawn; 4],
    /// Index of the faction's start cell on the main path
    pub start_index: usize,
    /// Threshold index at which a lapped pawn turns into its home stretch
    pub home_entry_index: usize,
}

impl Player {
    /// Resolve a faction's roster from the topology. Fails if the board
    /// is missing any cell the faction needs.
    pub fn new(faction: Faction, topology: &Topology) -> Result<Self, GameError> {
        if topology.base_tiles(faction).len() != PAWNS_PER_FACTION {
            return Err(GameError::Setup(format!(
                "{faction}: base cells missing, cannot seat {PAWNS_PER_FACTION} pawns"
            )));
        }
        Ok(Self {
            faction,
            pawns: [
                Pawn::new(faction, 0),
                Pawn::new(faction, 1),
                Pawn::new(faction, 2),
                Pawn::new(faction, 3),
            ],
            start_index: topology.start_index(faction),
            home_entry_index: topology.home_entry_index(faction),
        })
    }

    /// Number of pawns that reached the goal
    pub fn finished_count(&self) -> usize {
        self.pawns.iter().filter(|p| p.state.is_finished()).count()
    }

    /// True when all four pawns are finished
    pub fn has_won(&self) -> bool {
        self.finished_count() == PAWNS_PER_FACTION
    }
}

/// Serializable snapshot row for a single pawn. Round-trips the full
/// `(faction, pawn_index, state-with-position, lap_completed)` tuple.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PawnRecord {
    pub faction: Faction,
    pub pawn_index: u8,
    pub state: PawnState,
    pub lap_completed: bool,
}

impl PawnRecord {
    pub fn from_pawn(pawn: &Pawn) -> Self {
        Self {
            faction: pawn.faction,
            pawn_index: pawn.index,
            state: pawn.state,
            lap_completed: pawn.lap_completed,
        }
    }

    /// Write this record's movement state back onto a pawn
    pub(crate) fn apply_to(&self, pawn: &mut Pawn) {
        pawn.state = self.state;
        pawn.lap_completed = self.lap_completed;
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roster_starts_in_base() {
        let topology = Topology::standard();
        let player = Player::new(Faction::Earth, &topology).unwrap();
        assert_eq!(player.faction, Faction::Earth);
        assert_eq!(player.start_index, 13);
        assert_eq!(player.home_entry_index, 12);
        for (i, pawn) in player.pawns.iter().enumerate() {
            assert_eq!(pawn.index, i as u8);
            assert_eq!(pawn.state, PawnState::InBase);
            assert!(!pawn.lap_completed);
        }
        assert_eq!(player.finished_count(), 0);
        assert!(!player.has_won());
    }

    #[test]
    fn test_track_index() {
        assert_eq!(PawnState::InBase.track_index(), None);
        assert_eq!(PawnState::Finished.track_index(), None);
        assert_eq!(PawnState::OnMainPath { index: 17 }.track_index(), Some(17));
        assert_eq!(PawnState::InHomeStretch { index: 2 }.track_index(), Some(2));
    }

    #[test]
    fn test_pawn_record_round_trip() {
        let record = PawnRecord {
            faction: Faction::Water,
            pawn_index: 2,
            state: PawnState::OnMainPath { index: 44 },
            lap_completed: true,
        };
        let json = serde_json::to_string(&record).unwrap();
        let back: PawnRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_reset_to_base_clears_lap() {
        let mut pawn = Pawn::new(Faction::Fire, 0);
        pawn.state = PawnState::OnMainPath { index: 30 };
        pawn.lap_completed = true;
        pawn.reset_to_base();
        assert_eq!(pawn.state, PawnState::InBase);
        assert!(!pawn.lap_completed);
    }
}
