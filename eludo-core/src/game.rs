//! Turn engine: the game's state machine.
//!
//! Owns the topology and the four rosters, validates dice results,
//! resolves pawn movement and captures, rotates turns and detects the
//! winner. A capture that involves the human-controlled faction
//! suspends the engine in `Minigame` until exactly one `resume` call
//! names the winning side; everything the suspended contest needs is
//! carried in a serializable `CaptureSnapshot`.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ai;
use crate::board::{Faction, TileId, Topology, PAWNS_PER_FACTION};
use crate::error::GameError;
use crate::minigame::CaptureSnapshot;
use crate::pieces::{PawnRecord, PawnState, Player};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Consecutive sixes that forfeit the bonus turn
const SIX_STREAK_LIMIT: u8 = 3;

// ============================================================================
// PHASES
// ============================================================================

/// Phase of the turn state machine
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    /// Waiting for the active faction's dice result
    WaitingForRoll,
    /// Dice resolved; waiting for a pawn to move
    WaitingForPawnSelection,
    /// Move resolved or turn skipped; waiting for rotation
    TurnOver,
    /// Suspended on a contested capture
    Minigame,
    /// A faction has won; no further input is accepted
    GameFinished,
}

impl fmt::Display for GamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GamePhase::WaitingForRoll => "WaitingForRoll",
            GamePhase::WaitingForPawnSelection => "WaitingForPawnSelection",
            GamePhase::TurnOver => "TurnOver",
            GamePhase::Minigame => "Minigame",
            GamePhase::GameFinished => "GameFinished",
        };
        write!(f, "{name}")
    }
}

/// The engine's turn bookkeeping, viewed as one value
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnState {
    pub phase: GamePhase,
    pub active_faction: Faction,
    pub dice_result: Option<u8>,
    pub six_streak: u8,
}

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Per-match settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameConfig {
    /// Faction controlled by the human player, if any. Captures that
    /// involve it are settled by a contest instead of applied directly.
    pub human_faction: Option<Faction>,
    /// Factions whose moves are chosen by the selection policy
    pub automated: [bool; 4],
    /// When false, contested captures fall back to the classic outcome
    pub contest_enabled: bool,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            human_faction: None,
            automated: [false; 4],
            contest_enabled: true,
        }
    }
}

impl GameConfig {
    /// All four factions driven by the selection policy
    pub fn all_automated() -> Self {
        Self {
            automated: [true; 4],
            ..Self::default()
        }
    }
}

// ============================================================================
// EVENTS
// ============================================================================

/// Status events emitted for the presentation layer. Sufficient to
/// drive UI text without access to engine internals.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEvent {
    DiceRolled { faction: Faction, value: u8 },
    TurnSkipped { faction: Faction, value: u8 },
    PawnEntered { faction: Faction, pawn: u8, path_index: usize },
    PawnMoved { faction: Faction, pawn: u8, track_index: usize },
    HomeStretchEntered { faction: Faction, pawn: u8, home_index: usize },
    PawnFinished { faction: Faction, pawn: u8 },
    PawnCaptured { captor: Faction, victim: Faction, victim_pawn: u8 },
    ContestStarted { challenger: Faction, defender: Faction },
    ContestResolved { winner: Faction, loser: Faction },
    ExtraTurn { faction: Faction },
    SixStreakForfeited { faction: Faction },
    TurnPassed { from: Faction, to: Faction },
    GameWon { faction: Faction },
}

impl fmt::Display for GameEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameEvent::DiceRolled { faction, value } => {
                write!(f, "{faction} rolled a {value}")
            }
            GameEvent::TurnSkipped { faction, value } => {
                write!(f, "{faction} has no legal move for a {value}, skipping")
            }
            GameEvent::PawnEntered { faction, pawn, path_index } => {
                write!(f, "{faction} pawn {pawn} enters play at cell {path_index}")
            }
            GameEvent::PawnMoved { faction, pawn, track_index } => {
                write!(f, "{faction} pawn {pawn} advances to cell {track_index}")
            }
            GameEvent::HomeStretchEntered { faction, pawn, home_index } => {
                write!(f, "{faction} pawn {pawn} turns into its home stretch at {home_index}")
            }
            GameEvent::PawnFinished { faction, pawn } => {
                write!(f, "{faction} pawn {pawn} reaches the goal")
            }
            GameEvent::PawnCaptured { captor, victim, victim_pawn } => {
                write!(f, "{captor} sends {victim} pawn {victim_pawn} back to base")
            }
            GameEvent::ContestStarted { challenger, defender } => {
                write!(f, "contested capture: {challenger} challenges {defender}")
            }
            GameEvent::ContestResolved { winner, loser } => {
                write!(f, "{winner} wins the contested capture against {loser}")
            }
            GameEvent::ExtraTurn { faction } => {
                write!(f, "{faction} rolls again")
            }
            GameEvent::SixStreakForfeited { faction } => {
                write!(f, "{faction} forfeits the bonus turn after three sixes")
            }
            GameEvent::TurnPassed { to, .. } => {
                write!(f, "awaiting roll for {to}")
            }
            GameEvent::GameWon { faction } => {
                write!(f, "{faction} wins the race")
            }
        }
    }
}

// ============================================================================
// MOVE PREVIEW
// ============================================================================

/// Where a legal move would take the pawn
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveKind {
    /// Base exit to the faction's start cell
    EnterPlay { path_index: usize },
    /// Advance along the main path, wrapping modulo its length
    Advance { path_index: usize, completes_lap: bool },
    /// Turn off the main path into the home track
    EnterHomeStretch { home_index: usize },
    /// Advance along the home track
    AdvanceHome { home_index: usize },
}

/// A legal move's outcome, computed before anything is committed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MovePreview {
    pub kind: MoveKind,
    /// True when the move lands the pawn on the goal
    pub finishes: bool,
    /// Foreign occupant of the destination cell, if any
    pub captures: Option<(Faction, u8)>,
}

// ============================================================================
// TURN ENGINE
// ============================================================================

/// The rules engine. Explicitly constructed, exclusively owns the
/// roster and all turn state; the selection policy only reads it and
/// the capture bridge submits one terminal `resume` decision.
pub struct TurnEngine {
    topology: Topology,
    players: [Player; 4],
    config: GameConfig,

    phase: GamePhase,
    active_faction: Faction,
    dice_result: Option<u8>,
    six_streak: u8,

    /// Main-path occupancy: cell -> (faction, pawn index). At most one
    /// occupant per cell is enforced here, not on the tiles.
    occupancy: FxHashMap<TileId, (Faction, u8)>,

    /// In-flight capture snapshot, present only while suspended
    pending: Option<CaptureSnapshot>,

    winner: Option<Faction>,
    events: Vec<GameEvent>,
}

impl TurnEngine {
    // ========================================================================
    // CONSTRUCTION
    // ========================================================================

    /// Set up a fresh match. Fails if the topology is missing anything
    /// a faction needs.
    pub fn new(topology: Topology, config: GameConfig) -> Result<Self, GameError> {
        let players = [
            Player::new(Faction::Fire, &topology)?,
            Player::new(Faction::Earth, &topology)?,
            Player::new(Faction::Air, &topology)?,
            Player::new(Faction::Water, &topology)?,
        ];
        Ok(Self {
            topology,
            players,
            config,
            phase: GamePhase::WaitingForRoll,
            active_faction: Faction::Fire,
            dice_result: None,
            six_streak: 0,
            occupancy: FxHashMap::default(),
            pending: None,
            winner: None,
            events: Vec::new(),
        })
    }

    /// Reconstruct a suspended engine from a capture snapshot, e.g. in
    /// a separate context that hosts the contest. The restored engine
    /// is in `Minigame` and accepts exactly one `resume`.
    pub fn restore(
        topology: Topology,
        config: GameConfig,
        snapshot: CaptureSnapshot,
    ) -> Result<Self, GameError> {
        if !(1..=6).contains(&snapshot.dice_result) {
            return Err(GameError::Setup(format!(
                "snapshot carries dice value {} outside 1..=6",
                snapshot.dice_result
            )));
        }
        let mut engine = Self::new(topology, config)?;
        for record in &snapshot.roster {
            let player = &mut engine.players[record.faction.index()];
            let pawn = player
                .pawns
                .get_mut(record.pawn_index as usize)
                .ok_or(GameError::UnknownPawn {
                    faction: record.faction,
                    index: record.pawn_index,
                })?;
            record.apply_to(pawn);
        }
        engine.rebuild_occupancy()?;
        engine.active_faction = snapshot.active_faction;
        engine.dice_result = Some(snapshot.dice_result);
        engine.six_streak = u8::from(snapshot.dice_result == 6);
        engine.phase = GamePhase::Minigame;
        engine.pending = Some(snapshot);
        Ok(engine)
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn active_faction(&self) -> Faction {
        self.active_faction
    }

    pub fn turn_state(&self) -> TurnState {
        TurnState {
            phase: self.phase,
            active_faction: self.active_faction,
            dice_result: self.dice_result,
            six_streak: self.six_streak,
        }
    }

    /// The winning faction once the game is finished
    pub fn winner(&self) -> Option<Faction> {
        self.winner
    }

    pub fn player(&self, faction: Faction) -> &Player {
        &self.players[faction.index()]
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// The in-flight capture snapshot, present only while suspended
    pub fn capture_snapshot(&self) -> Option<&CaptureSnapshot> {
        self.pending.as_ref()
    }

    /// Snapshot rows for every pawn on the board
    pub fn roster_records(&self) -> Vec<PawnRecord> {
        self.players
            .iter()
            .flat_map(|p| p.pawns.iter().map(PawnRecord::from_pawn))
            .collect()
    }

    /// Drain the queued status events
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    // ========================================================================
    // DICE
    // ========================================================================

    /// Feed the active faction's dice result. If the faction has no
    /// legal move the turn is classified as skipped; if it is automated
    /// the chosen pawn is resolved immediately.
    pub fn apply_roll(&mut self, value: u8) -> Result<(), GameError> {
        if self.phase != GamePhase::WaitingForRoll {
            return Err(self.invalid("apply_roll", "WaitingForRoll"));
        }
        if !(1..=6).contains(&value) {
            return Err(GameError::InvalidDiceValue(value));
        }

        if value == 6 {
            self.six_streak += 1;
        } else {
            self.six_streak = 0;
        }
        self.dice_result = Some(value);

        let faction = self.active_faction;
        self.events.push(GameEvent::DiceRolled { faction, value });

        if self.movable_pawns().is_empty() {
            self.phase = GamePhase::TurnOver;
            self.events.push(GameEvent::TurnSkipped { faction, value });
            return Ok(());
        }

        self.phase = GamePhase::WaitingForPawnSelection;
        if self.config.automated[faction.index()] {
            if let Some(choice) = ai::select_pawn(self) {
                self.resolve_move(choice)?;
            }
        }
        Ok(())
    }

    /// Pawns of the active faction with at least one legal move for the
    /// current dice result
    pub fn movable_pawns(&self) -> Vec<u8> {
        let Some(dice) = self.dice_result else {
            return Vec::new();
        };
        (0..PAWNS_PER_FACTION as u8)
            .filter(|&pawn| self.preview_move(self.active_faction, pawn, dice).is_ok())
            .collect()
    }

    // ========================================================================
    // MOVE RESOLUTION
    // ========================================================================

    /// Compute what moving `pawn` by `dice` would do, without mutating
    /// anything. Errors are the reasons the move is illegal.
    pub fn preview_move(
        &self,
        faction: Faction,
        pawn: u8,
        dice: u8,
    ) -> Result<MovePreview, GameError> {
        if !(1..=6).contains(&dice) {
            return Err(GameError::InvalidDiceValue(dice));
        }
        let player = &self.players[faction.index()];
        let pawn = *player
            .pawns
            .get(pawn as usize)
            .ok_or(GameError::UnknownPawn { faction, index: pawn })?;

        match pawn.state {
            PawnState::Finished => Err(GameError::IllegalMove("pawn has already finished")),

            PawnState::InBase => {
                if dice != 6 {
                    return Err(GameError::IllegalMove("a 6 is required to leave base"));
                }
                let captures = self.path_captures(faction, player.start_index)?;
                Ok(MovePreview {
                    kind: MoveKind::EnterPlay {
                        path_index: player.start_index,
                    },
                    finishes: false,
                    captures,
                })
            }

            PawnState::OnMainPath { index } => {
                let path_len = self.topology.main_path_len();
                let next = index + dice as usize;
                let completes_lap = next >= path_len;
                let entry = player.home_entry_index;

                // A lapped pawn crossing its home-entry threshold turns
                // into the home track; the comparison is unwrapped.
                if (pawn.lap_completed || completes_lap) && index <= entry && entry < next {
                    let steps_into_home = next - entry - 1;
                    let track_len = self.topology.home_track_len(faction);
                    if steps_into_home >= track_len {
                        return Err(GameError::IllegalMove(
                            "must roll exact value to enter home",
                        ));
                    }
                    Ok(MovePreview {
                        kind: MoveKind::EnterHomeStretch {
                            home_index: steps_into_home,
                        },
                        finishes: steps_into_home == track_len - 1,
                        captures: None,
                    })
                } else {
                    let path_index = next % path_len;
                    let captures = self.path_captures(faction, path_index)?;
                    Ok(MovePreview {
                        kind: MoveKind::Advance {
                            path_index,
                            completes_lap,
                        },
                        finishes: false,
                        captures,
                    })
                }
            }

            PawnState::InHomeStretch { index } => {
                let track_len = self.topology.home_track_len(faction);
                let next = index + dice as usize;
                if next >= track_len {
                    return Err(GameError::IllegalMove("must roll exact value to finish"));
                }
                Ok(MovePreview {
                    kind: MoveKind::AdvanceHome { home_index: next },
                    finishes: next == track_len - 1,
                    captures: None,
                })
            }
        }
    }

    /// Occupant check for a main-path destination: a friendly occupant
    /// blocks the move, a foreign one is a prospective capture.
    fn path_captures(
        &self,
        faction: Faction,
        path_index: usize,
    ) -> Result<Option<(Faction, u8)>, GameError> {
        match self.occupant_at(path_index) {
            Some((occupant, _)) if occupant == faction => Err(GameError::IllegalMove(
                "destination cell is occupied by a friendly pawn",
            )),
            other => Ok(other),
        }
    }

    /// Resolve the active faction's chosen pawn against the pending
    /// dice result. Commits the move, applies or defers any capture,
    /// and runs win detection.
    pub fn resolve_move(&mut self, pawn: u8) -> Result<(), GameError> {
        if self.phase != GamePhase::WaitingForPawnSelection {
            return Err(self.invalid("resolve_move", "WaitingForPawnSelection"));
        }
        let dice = self
            .dice_result
            .ok_or_else(|| self.invalid("resolve_move", "WaitingForPawnSelection"))?;

        let faction = self.active_faction;
        let preview = self.preview_move(faction, pawn, dice)?;

        if let Some((victim_faction, victim_pawn)) = preview.captures {
            let human_involved = self
                .config
                .human_faction
                .is_some_and(|h| h == faction || h == victim_faction);

            if human_involved && self.config.contest_enabled {
                self.suspend_for_contest(pawn, &preview, victim_faction, victim_pawn, dice);
                return Ok(());
            }
            if human_involved {
                // Degraded mode: no contest collaborator, apply the
                // classic outcome instead of deadlocking.
                tracing::warn!(
                    challenger = %faction,
                    defender = %victim_faction,
                    "no capture contest available, applying classic outcome"
                );
            }
            self.clear_path_occupancy(victim_faction, victim_pawn);
            self.players[victim_faction.index()].pawns[victim_pawn as usize].reset_to_base();
            self.events.push(GameEvent::PawnCaptured {
                captor: faction,
                victim: victim_faction,
                victim_pawn,
            });
        }

        self.commit_move(pawn, &preview);
        Ok(())
    }

    /// Write a previewed move into the roster and advance the phase
    fn commit_move(&mut self, pawn: u8, preview: &MovePreview) {
        let faction = self.active_faction;
        self.clear_path_occupancy(faction, pawn);

        let new_state = match preview.kind {
            MoveKind::EnterPlay { path_index } => {
                self.events.push(GameEvent::PawnEntered {
                    faction,
                    pawn,
                    path_index,
                });
                PawnState::OnMainPath { index: path_index }
            }
            MoveKind::Advance { path_index, completes_lap } => {
                if completes_lap {
                    self.players[faction.index()].pawns[pawn as usize].lap_completed = true;
                }
                self.events.push(GameEvent::PawnMoved {
                    faction,
                    pawn,
                    track_index: path_index,
                });
                PawnState::OnMainPath { index: path_index }
            }
            MoveKind::EnterHomeStretch { home_index } => {
                if preview.finishes {
                    self.events.push(GameEvent::PawnFinished { faction, pawn });
                    PawnState::Finished
                } else {
                    self.events.push(GameEvent::HomeStretchEntered {
                        faction,
                        pawn,
                        home_index,
                    });
                    PawnState::InHomeStretch { index: home_index }
                }
            }
            MoveKind::AdvanceHome { home_index } => {
                if preview.finishes {
                    self.events.push(GameEvent::PawnFinished { faction, pawn });
                    PawnState::Finished
                } else {
                    self.events.push(GameEvent::PawnMoved {
                        faction,
                        pawn,
                        track_index: home_index,
                    });
                    PawnState::InHomeStretch { index: home_index }
                }
            }
        };

        self.players[faction.index()].pawns[pawn as usize].state = new_state;
        if let PawnState::OnMainPath { index } = new_state {
            let id = self.topology.main_path_tile(index).id;
            self.occupancy.insert(id, (faction, pawn));
        }

        self.finish_or_end_turn(faction);
    }

    // ========================================================================
    // CAPTURE CONTEST
    // ========================================================================

    /// Freeze the engine and publish a snapshot for the contest. No
    /// state is committed until `resume`.
    fn suspend_for_contest(
        &mut self,
        pawn: u8,
        preview: &MovePreview,
        victim_faction: Faction,
        victim_pawn: u8,
        dice: u8,
    ) {
        let faction = self.active_faction;
        let mover = &self.players[faction.index()].pawns[pawn as usize];

        let prospective_state = match preview.kind {
            MoveKind::EnterPlay { path_index } | MoveKind::Advance { path_index, .. } => {
                PawnState::OnMainPath { index: path_index }
            }
            // Captures only happen on the shared main path
            MoveKind::EnterHomeStretch { home_index } | MoveKind::AdvanceHome { home_index } => {
                PawnState::InHomeStretch { index: home_index }
            }
        };
        let prospective_lap = mover.lap_completed
            || matches!(preview.kind, MoveKind::Advance { completes_lap: true, .. });

        let challenger = PawnRecord {
            faction,
            pawn_index: pawn,
            state: prospective_state,
            lap_completed: prospective_lap,
        };
        let defender =
            PawnRecord::from_pawn(&self.players[victim_faction.index()].pawns[victim_pawn as usize]);

        self.pending = Some(CaptureSnapshot {
            roster: self.roster_records(),
            active_faction: faction,
            dice_result: dice,
            challenger,
            defender,
        });
        self.phase = GamePhase::Minigame;
        self.events.push(GameEvent::ContestStarted {
            challenger: faction,
            defender: victim_faction,
        });
    }

    /// Apply the contest outcome and release the suspension. The
    /// losing pawn returns to base; the winning pawn takes its
    /// snapshotted state. Consumes the snapshot exactly once.
    pub fn resume(&mut self, winner: Faction) -> Result<(), GameError> {
        if self.phase != GamePhase::Minigame {
            return Err(self.invalid("resume", "Minigame"));
        }
        let snapshot = self
            .pending
            .take()
            .ok_or_else(|| self.invalid("resume", "Minigame"))?;
        if !snapshot.is_contestant(winner) {
            let err = GameError::NotContestant(winner);
            self.pending = Some(snapshot);
            return Err(err);
        }

        let (winning, losing) = if winner == snapshot.challenger.faction {
            (snapshot.challenger, snapshot.defender)
        } else {
            (snapshot.defender, snapshot.challenger)
        };

        self.clear_path_occupancy(losing.faction, losing.pawn_index);
        self.players[losing.faction.index()].pawns[losing.pawn_index as usize].reset_to_base();

        self.clear_path_occupancy(winning.faction, winning.pawn_index);
        let winning_pawn =
            &mut self.players[winning.faction.index()].pawns[winning.pawn_index as usize];
        winning.apply_to(winning_pawn);
        if let PawnState::OnMainPath { index } = winning_pawn.state {
            let id = self.topology.main_path_tile(index).id;
            self.occupancy.insert(id, (winning.faction, winning.pawn_index));
        }

        self.events.push(GameEvent::ContestResolved {
            winner,
            loser: losing.faction,
        });
        self.events.push(GameEvent::PawnCaptured {
            captor: winner,
            victim: losing.faction,
            victim_pawn: losing.pawn_index,
        });

        self.finish_or_end_turn(winner);
        Ok(())
    }

    // ========================================================================
    // TURN ROTATION
    // ========================================================================

    /// Rotate to the next faction, or grant the bonus roll after a six.
    /// Three consecutive sixes forfeit the bonus turn.
    pub fn advance_turn(&mut self) -> Result<(), GameError> {
        if self.phase != GamePhase::TurnOver {
            return Err(self.invalid("advance_turn", "TurnOver"));
        }

        let faction = self.active_faction;
        let rolled_six = self.dice_result == Some(6);
        if rolled_six && self.six_streak < SIX_STREAK_LIMIT {
            self.events.push(GameEvent::ExtraTurn { faction });
        } else {
            if rolled_six {
                self.events.push(GameEvent::SixStreakForfeited { faction });
            }
            self.active_faction = faction.next();
            self.six_streak = 0;
            self.events.push(GameEvent::TurnPassed {
                from: faction,
                to: self.active_faction,
            });
        }

        self.dice_result = None;
        self.phase = GamePhase::WaitingForRoll;
        Ok(())
    }

    // ========================================================================
    // INTERNALS
    // ========================================================================

    /// Win detection after a committed move, then hand the turn back
    fn finish_or_end_turn(&mut self, faction: Faction) {
        if self.players[faction.index()].has_won() {
            self.phase = GamePhase::GameFinished;
            self.winner = Some(faction);
            self.events.push(GameEvent::GameWon { faction });
        } else {
            self.phase = GamePhase::TurnOver;
        }
    }

    fn occupant_at(&self, path_index: usize) -> Option<(Faction, u8)> {
        let id = self.topology.main_path_tile(path_index).id;
        self.occupancy.get(&id).copied()
    }

    /// Drop a pawn's main-path occupancy entry, if it has one
    fn clear_path_occupancy(&mut self, faction: Faction, pawn: u8) {
        if let PawnState::OnMainPath { index } =
            self.players[faction.index()].pawns[pawn as usize].state
        {
            let id = self.topology.main_path_tile(index).id;
            self.occupancy.remove(&id);
        }
    }

    /// Recompute the occupancy map from the roster, rejecting rosters
    /// that put two pawns on one main-path cell
    fn rebuild_occupancy(&mut self) -> Result<(), GameError> {
        self.occupancy.clear();
        for player in &self.players {
            for pawn in &player.pawns {
                if let PawnState::OnMainPath { index } = pawn.state {
                    let id = self.topology.main_path_tile(index).id;
                    if self.occupancy.insert(id, (pawn.faction, pawn.index)).is_some() {
                        return Err(GameError::Setup(format!(
                            "two pawns share main-path cell {index}"
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    fn invalid(&self, action: &'static str, expected: &'static str) -> GameError {
        GameError::InvalidStateTransition {
            action,
            expected,
            actual: self.phase,
        }
    }
}

#[cfg(test)]
impl TurnEngine {
    /// Test helper: place a pawn in an arbitrary state and refresh the
    /// occupancy map
    pub(crate) fn place_pawn(
        &mut self,
        faction: Faction,
        pawn: u8,
        state: PawnState,
        lap_completed: bool,
    ) {
        let p = &mut self.players[faction.index()].pawns[pawn as usize];
        p.state = state;
        p.lap_completed = lap_completed;
        self.rebuild_occupancy().expect("test placement collides");
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Tile, TileKind};

    fn engine() -> TurnEngine {
        TurnEngine::new(Topology::standard(), GameConfig::default()).unwrap()
    }

    fn engine_with_human(human: Faction) -> TurnEngine {
        let config = GameConfig {
            human_faction: Some(human),
            ..GameConfig::default()
        };
        TurnEngine::new(Topology::standard(), config).unwrap()
    }

    /// An 8-cell loop with two home cells per faction, for overshoot
    /// cases the standard board cannot produce
    fn tiny_topology() -> Topology {
        let starts = [0usize, 2, 4, 6];
        let mut main_path = Vec::new();
        for i in 0..8 {
            let owner = starts.iter().position(|&s| s == i).map(|f| Faction::ALL[f]);
            let kind = if owner.is_some() {
                TileKind::Start
            } else {
                TileKind::Path
            };
            main_path.push(Tile::new(i as u32, kind, owner));
        }
        let home_stretches = Faction::ALL.map(|faction| {
            (0..2u32)
                .map(|j| {
                    Tile::new(
                        100 + faction.index() as u32 * 10 + j,
                        TileKind::Home,
                        Some(faction),
                    )
                })
                .collect()
        });
        let base_tiles = Faction::ALL.map(|faction| {
            (0..4u32)
                .map(|j| {
                    Tile::new(
                        200 + faction.index() as u32 * 10 + j,
                        TileKind::Base,
                        Some(faction),
                    )
                })
                .collect()
        });
        let home_entry_indices = starts.map(|s| (s + 7) % 8);
        Topology::new(
            main_path,
            home_stretches,
            starts,
            home_entry_indices,
            base_tiles,
            Tile::new(99, TileKind::Goal, None),
        )
        .unwrap()
    }

    #[test]
    fn test_initial_state() {
        let eng = engine();
        assert_eq!(eng.phase(), GamePhase::WaitingForRoll);
        assert_eq!(eng.active_faction(), Faction::Fire);
        assert_eq!(eng.winner(), None);
        assert_eq!(eng.roster_records().len(), 16);
    }

    #[test]
    fn test_roll_out_of_range_rejected() {
        let mut eng = engine();
        assert!(matches!(eng.apply_roll(0), Err(GameError::InvalidDiceValue(0))));
        assert!(matches!(eng.apply_roll(7), Err(GameError::InvalidDiceValue(7))));
        assert_eq!(eng.phase(), GamePhase::WaitingForRoll);
    }

    #[test]
    fn test_roll_in_wrong_phase_rejected() {
        let mut eng = engine();
        eng.apply_roll(6).unwrap();
        assert_eq!(eng.phase(), GamePhase::WaitingForPawnSelection);
        assert!(matches!(
            eng.apply_roll(3),
            Err(GameError::InvalidStateTransition { .. })
        ));
        // The rejected roll mutated nothing
        assert_eq!(eng.turn_state().dice_result, Some(6));
    }

    #[test]
    fn test_base_exit_on_six() {
        let mut eng = engine();
        eng.apply_roll(6).unwrap();
        eng.resolve_move(0).unwrap();
        let pawn = &eng.player(Faction::Fire).pawns[0];
        assert_eq!(pawn.state, PawnState::OnMainPath { index: 0 });
        assert!(!pawn.lap_completed);
        assert_eq!(eng.phase(), GamePhase::TurnOver);
    }

    #[test]
    fn test_base_exit_requires_six() {
        let eng = engine();
        assert!(matches!(
            eng.preview_move(Faction::Fire, 0, 3),
            Err(GameError::IllegalMove(_))
        ));
    }

    #[test]
    fn test_no_legal_move_skips_turn() {
        let mut eng = engine();
        eng.apply_roll(3).unwrap();
        assert_eq!(eng.phase(), GamePhase::TurnOver);
        let events = eng.drain_events();
        assert!(events.contains(&GameEvent::TurnSkipped {
            faction: Faction::Fire,
            value: 3
        }));
        eng.advance_turn().unwrap();
        assert_eq!(eng.active_faction(), Faction::Earth);
        assert_eq!(eng.phase(), GamePhase::WaitingForRoll);
    }

    #[test]
    fn test_rotation_order() {
        let mut eng = engine();
        for expected in [Faction::Fire, Faction::Earth, Faction::Air, Faction::Water, Faction::Fire]
        {
            assert_eq!(eng.active_faction(), expected);
            eng.apply_roll(1).unwrap();
            eng.advance_turn().unwrap();
        }
    }

    #[test]
    fn test_six_grants_extra_turn() {
        let mut eng = engine();
        eng.apply_roll(6).unwrap();
        eng.resolve_move(0).unwrap();
        eng.advance_turn().unwrap();
        assert_eq!(eng.active_faction(), Faction::Fire);
        assert!(eng
            .drain_events()
            .contains(&GameEvent::ExtraTurn { faction: Faction::Fire }));
    }

    #[test]
    fn test_three_sixes_forfeit_bonus_turn() {
        let mut eng = engine();
        eng.place_pawn(Faction::Fire, 0, PawnState::OnMainPath { index: 10 }, false);
        for _ in 0..2 {
            eng.apply_roll(6).unwrap();
            eng.resolve_move(0).unwrap();
            eng.advance_turn().unwrap();
            assert_eq!(eng.active_faction(), Faction::Fire);
        }
        // Third six: the move still resolves but the bonus is forfeit
        eng.apply_roll(6).unwrap();
        eng.resolve_move(0).unwrap();
        eng.advance_turn().unwrap();
        assert_eq!(eng.active_faction(), Faction::Earth);
        assert!(eng
            .drain_events()
            .contains(&GameEvent::SixStreakForfeited { faction: Faction::Fire }));
    }

    #[test]
    fn test_home_entry_after_lap() {
        // Main path length 52, Fire home entry 51: 50 + 3 = 53 crosses
        // the threshold and enters the home track one step in.
        let mut eng = engine();
        eng.place_pawn(Faction::Fire, 0, PawnState::OnMainPath { index: 50 }, true);
        eng.apply_roll(3).unwrap();
        eng.resolve_move(0).unwrap();
        assert_eq!(
            eng.player(Faction::Fire).pawns[0].state,
            PawnState::InHomeStretch { index: 1 }
        );
    }

    #[test]
    fn test_unlapped_pawn_passes_home_entry() {
        // Earth's entry is 12; an unlapped Earth pawn wrapping the main
        // path continues past its own start instead of turning in.
        let mut eng = engine();
        eng.place_pawn(Faction::Earth, 0, PawnState::OnMainPath { index: 50 }, false);
        eng.place_pawn(Faction::Fire, 0, PawnState::InHomeStretch { index: 0 }, true);
        eng.apply_roll(1).unwrap();
        eng.resolve_move(0).unwrap();
        eng.advance_turn().unwrap();

        eng.apply_roll(4).unwrap();
        eng.resolve_move(0).unwrap();
        let pawn = &eng.player(Faction::Earth).pawns[0];
        assert_eq!(pawn.state, PawnState::OnMainPath { index: 2 });
        assert!(pawn.lap_completed);
    }

    #[test]
    fn test_home_entry_overshoot_rejected() {
        // Tiny board: home track length 3, Fire entry 7. From the
        // threshold a 6 would need 5 home steps.
        let mut eng = TurnEngine::new(tiny_topology(), GameConfig::default()).unwrap();
        eng.place_pawn(Faction::Fire, 0, PawnState::OnMainPath { index: 7 }, true);
        assert!(matches!(
            eng.preview_move(Faction::Fire, 0, 6),
            Err(GameError::IllegalMove("must roll exact value to enter home"))
        ));
        // The overshooting pawn has no legal move, so a 6 only frees
        // the base pawns.
        eng.apply_roll(6).unwrap();
        assert!(!eng.movable_pawns().contains(&0));
    }

    #[test]
    fn test_exact_count_finishes() {
        let mut eng = engine();
        eng.place_pawn(Faction::Fire, 0, PawnState::InHomeStretch { index: 2 }, true);
        eng.apply_roll(3).unwrap();
        eng.resolve_move(0).unwrap();
        assert_eq!(eng.player(Faction::Fire).pawns[0].state, PawnState::Finished);
    }

    #[test]
    fn test_finish_overshoot_rejected() {
        let mut eng = engine();
        eng.place_pawn(Faction::Fire, 0, PawnState::InHomeStretch { index: 3 }, true);
        assert!(matches!(
            eng.preview_move(Faction::Fire, 0, 6),
            Err(GameError::IllegalMove("must roll exact value to finish"))
        ));
        // Overshoot is a skipped turn, not a stuck selection
        eng.apply_roll(6).unwrap();
        assert!(!eng.movable_pawns().contains(&0));
    }

    #[test]
    fn test_win_detection_ends_game() {
        let mut eng = engine();
        for pawn in 0..3 {
            eng.place_pawn(Faction::Fire, pawn, PawnState::Finished, true);
        }
        eng.place_pawn(Faction::Fire, 3, PawnState::InHomeStretch { index: 4 }, true);
        eng.apply_roll(1).unwrap();
        eng.resolve_move(3).unwrap();

        assert_eq!(eng.phase(), GamePhase::GameFinished);
        assert_eq!(eng.winner(), Some(Faction::Fire));
        assert!(eng
            .drain_events()
            .contains(&GameEvent::GameWon { faction: Faction::Fire }));
        assert!(matches!(
            eng.apply_roll(6),
            Err(GameError::InvalidStateTransition { .. })
        ));
        assert!(matches!(
            eng.advance_turn(),
            Err(GameError::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn test_classic_capture_sends_occupant_to_base() {
        let mut eng = engine();
        eng.place_pawn(Faction::Fire, 0, PawnState::OnMainPath { index: 10 }, false);
        eng.place_pawn(Faction::Earth, 2, PawnState::OnMainPath { index: 13 }, true);
        eng.apply_roll(3).unwrap();
        eng.resolve_move(0).unwrap();

        let victim = &eng.player(Faction::Earth).pawns[2];
        assert_eq!(victim.state, PawnState::InBase);
        assert!(!victim.lap_completed);
        assert_eq!(
            eng.player(Faction::Fire).pawns[0].state,
            PawnState::OnMainPath { index: 13 }
        );
        assert_eq!(eng.phase(), GamePhase::TurnOver);
        assert!(eng.drain_events().contains(&GameEvent::PawnCaptured {
            captor: Faction::Fire,
            victim: Faction::Earth,
            victim_pawn: 2,
        }));
    }

    #[test]
    fn test_friendly_occupant_blocks_move() {
        let mut eng = engine();
        eng.place_pawn(Faction::Fire, 0, PawnState::OnMainPath { index: 10 }, false);
        eng.place_pawn(Faction::Fire, 1, PawnState::OnMainPath { index: 13 }, false);
        eng.apply_roll(3).unwrap();
        assert_eq!(eng.movable_pawns(), vec![1]);
        assert!(matches!(
            eng.resolve_move(0),
            Err(GameError::IllegalMove(_))
        ));
    }

    #[test]
    fn test_contested_capture_suspends() {
        let mut eng = engine_with_human(Faction::Fire);
        eng.place_pawn(Faction::Fire, 0, PawnState::OnMainPath { index: 10 }, false);
        eng.place_pawn(Faction::Earth, 0, PawnState::OnMainPath { index: 13 }, false);
        eng.apply_roll(3).unwrap();
        eng.resolve_move(0).unwrap();

        assert_eq!(eng.phase(), GamePhase::Minigame);
        // Nothing committed while suspended
        assert_eq!(
            eng.player(Faction::Fire).pawns[0].state,
            PawnState::OnMainPath { index: 10 }
        );
        assert_eq!(
            eng.player(Faction::Earth).pawns[0].state,
            PawnState::OnMainPath { index: 13 }
        );
        let snapshot = eng.capture_snapshot().unwrap();
        assert_eq!(snapshot.challenger.faction, Faction::Fire);
        assert_eq!(
            snapshot.challenger.state,
            PawnState::OnMainPath { index: 13 }
        );
        assert_eq!(snapshot.defender.faction, Faction::Earth);
        assert_eq!(snapshot.roster.len(), 16);
        // No roll or move is accepted while suspended
        assert!(matches!(
            eng.apply_roll(2),
            Err(GameError::InvalidStateTransition { .. })
        ));
        assert!(matches!(
            eng.resolve_move(0),
            Err(GameError::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn test_resume_challenger_wins() {
        let mut eng = engine_with_human(Faction::Fire);
        eng.place_pawn(Faction::Fire, 0, PawnState::OnMainPath { index: 10 }, false);
        eng.place_pawn(Faction::Earth, 0, PawnState::OnMainPath { index: 13 }, false);
        eng.apply_roll(3).unwrap();
        eng.resolve_move(0).unwrap();

        eng.resume(Faction::Fire).unwrap();
        assert_eq!(
            eng.player(Faction::Fire).pawns[0].state,
            PawnState::OnMainPath { index: 13 }
        );
        assert_eq!(eng.player(Faction::Earth).pawns[0].state, PawnState::InBase);
        assert_eq!(eng.phase(), GamePhase::TurnOver);
        assert!(eng.capture_snapshot().is_none());
    }

    #[test]
    fn test_resume_defender_wins_voids_capture() {
        let mut eng = engine_with_human(Faction::Fire);
        eng.place_pawn(Faction::Fire, 0, PawnState::OnMainPath { index: 10 }, false);
        eng.place_pawn(Faction::Earth, 0, PawnState::OnMainPath { index: 13 }, false);
        eng.apply_roll(3).unwrap();
        eng.resolve_move(0).unwrap();

        eng.resume(Faction::Earth).unwrap();
        assert_eq!(eng.player(Faction::Fire).pawns[0].state, PawnState::InBase);
        assert_eq!(
            eng.player(Faction::Earth).pawns[0].state,
            PawnState::OnMainPath { index: 13 }
        );
        assert_eq!(eng.phase(), GamePhase::TurnOver);
    }

    #[test]
    fn test_second_resume_rejected() {
        let mut eng = engine_with_human(Faction::Fire);
        eng.place_pawn(Faction::Fire, 0, PawnState::OnMainPath { index: 10 }, false);
        eng.place_pawn(Faction::Earth, 0, PawnState::OnMainPath { index: 13 }, false);
        eng.apply_roll(3).unwrap();
        eng.resolve_move(0).unwrap();

        eng.resume(Faction::Fire).unwrap();
        assert!(matches!(
            eng.resume(Faction::Earth),
            Err(GameError::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn test_resume_non_contestant_rejected() {
        let mut eng = engine_with_human(Faction::Fire);
        eng.place_pawn(Faction::Fire, 0, PawnState::OnMainPath { index: 10 }, false);
        eng.place_pawn(Faction::Earth, 0, PawnState::OnMainPath { index: 13 }, false);
        eng.apply_roll(3).unwrap();
        eng.resolve_move(0).unwrap();

        assert!(matches!(
            eng.resume(Faction::Air),
            Err(GameError::NotContestant(Faction::Air))
        ));
        // The suspension survives the rejected call
        assert_eq!(eng.phase(), GamePhase::Minigame);
        eng.resume(Faction::Fire).unwrap();
    }

    #[test]
    fn test_degraded_mode_applies_classic_capture() {
        let mut eng = {
            let config = GameConfig {
                human_faction: Some(Faction::Fire),
                contest_enabled: false,
                ..GameConfig::default()
            };
            TurnEngine::new(Topology::standard(), config).unwrap()
        };
        eng.place_pawn(Faction::Fire, 0, PawnState::OnMainPath { index: 10 }, false);
        eng.place_pawn(Faction::Earth, 0, PawnState::OnMainPath { index: 13 }, false);
        eng.apply_roll(3).unwrap();
        eng.resolve_move(0).unwrap();

        // No suspension: the classic outcome applied directly
        assert_eq!(eng.phase(), GamePhase::TurnOver);
        assert_eq!(eng.player(Faction::Earth).pawns[0].state, PawnState::InBase);
    }

    #[test]
    fn test_snapshot_restores_suspended_engine() {
        let mut eng = engine_with_human(Faction::Water);
        eng.place_pawn(Faction::Fire, 0, PawnState::Finished, true);
        for _ in 0..3 {
            eng.apply_roll(1).unwrap();
            eng.advance_turn().unwrap();
        }
        assert_eq!(eng.active_faction(), Faction::Water);
        eng.place_pawn(Faction::Water, 1, PawnState::OnMainPath { index: 20 }, false);
        eng.place_pawn(Faction::Air, 3, PawnState::OnMainPath { index: 24 }, true);
        eng.apply_roll(4).unwrap();
        eng.resolve_move(1).unwrap();
        assert_eq!(eng.phase(), GamePhase::Minigame);

        let json = eng.capture_snapshot().unwrap().to_json().unwrap();
        let snapshot = CaptureSnapshot::from_json(&json).unwrap();
        let config = GameConfig {
            human_faction: Some(Faction::Water),
            ..GameConfig::default()
        };
        let mut restored = TurnEngine::restore(Topology::standard(), config, snapshot).unwrap();

        assert_eq!(restored.phase(), GamePhase::Minigame);
        assert_eq!(restored.active_faction(), Faction::Water);
        assert_eq!(restored.turn_state().dice_result, Some(4));
        assert_eq!(restored.roster_records(), eng.roster_records());

        restored.resume(Faction::Water).unwrap();
        assert_eq!(
            restored.player(Faction::Water).pawns[1].state,
            PawnState::OnMainPath { index: 24 }
        );
        assert_eq!(restored.player(Faction::Air).pawns[3].state, PawnState::InBase);
    }

    #[test]
    fn test_automated_faction_resolves_immediately() {
        let mut eng =
            TurnEngine::new(Topology::standard(), GameConfig::all_automated()).unwrap();
        eng.apply_roll(6).unwrap();
        // The policy already picked and resolved a base exit
        assert_eq!(eng.phase(), GamePhase::TurnOver);
        let entered = eng
            .player(Faction::Fire)
            .pawns
            .iter()
            .filter(|p| p.state == PawnState::OnMainPath { index: 0 })
            .count();
        assert_eq!(entered, 1);
    }
}
