//! Pawn-selection policy for automated play.
//!
//! A pure read-only heuristic over the engine's public view: rank every
//! movable pawn of the active faction by a strict priority, break ties
//! by the furthest position along the pawn's current track, and return
//! exactly one choice. The engine classifies skippable turns before the
//! policy runs, so it is never asked to choose from an empty set.

use crate::board::Faction;
use crate::game::{MoveKind, MovePreview, TurnEngine};

// ============================================================================
// PRIORITIES
// ============================================================================

/// Landing on and capturing a foreign pawn
const PRIORITY_CAPTURE: i32 = 5;
/// Turning from the main path into the home stretch
const PRIORITY_ENTER_HOME: i32 = 4;
/// Reaching the goal
const PRIORITY_FINISH: i32 = 3;
/// Bringing a pawn out of base (only possible on a 6)
const PRIORITY_LEAVE_BASE: i32 = 2;
/// Any other legal advance
const PRIORITY_ADVANCE: i32 = 1;

// ============================================================================
// SELECTION
// ============================================================================

/// Choose the pawn the active faction should move for the current dice
/// result. Returns `None` only when no pawn is movable.
pub fn select_pawn(engine: &TurnEngine) -> Option<u8> {
    let state = engine.turn_state();
    let dice = state.dice_result?;
    let faction = state.active_faction;

    engine
        .movable_pawns()
        .into_iter()
        .filter_map(|pawn| {
            let preview = engine.preview_move(faction, pawn, dice).ok()?;
            Some((pawn, pawn_score(engine, faction, pawn, &preview)))
        })
        .max_by_key(|&(_, score)| score)
        .map(|(pawn, _)| pawn)
}

/// Score a movable pawn: strict priority first, then current track
/// position as the tie-break.
fn pawn_score(
    engine: &TurnEngine,
    faction: Faction,
    pawn: u8,
    preview: &MovePreview,
) -> (i32, usize) {
    let priority = if preview.captures.is_some() {
        PRIORITY_CAPTURE
    } else if matches!(preview.kind, MoveKind::EnterHomeStretch { .. }) {
        PRIORITY_ENTER_HOME
    } else if preview.finishes {
        PRIORITY_FINISH
    } else if matches!(preview.kind, MoveKind::EnterPlay { .. }) {
        PRIORITY_LEAVE_BASE
    } else {
        PRIORITY_ADVANCE
    };

    let position = engine.player(faction).pawns[pawn as usize]
        .state
        .track_index()
        .unwrap_or(0);

    (priority, position)
}

// ============================================================================
// TESTS
// ============================================================================
