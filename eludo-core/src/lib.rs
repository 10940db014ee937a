//! ELUDO Core - Rules engine for a four-faction dice race
//!
//! This crate provides the core game logic for ELUDO:
//! - Board topology (shared main path, home stretches, bases, goal)
//! - Pawn and per-faction roster model
//! - The turn engine (dice validation, movement and capture resolution,
//!   turn rotation, win detection)
//! - A deterministic pawn-selection policy for automated factions
//! - The capture-contest bridge with serializable snapshots
//! - Dice sources (seeded and scripted)

pub mod board;
pub mod pieces;
pub mod game;
pub mod ai;
pub mod minigame;
pub mod dice;
pub mod error;

// Re-exports for convenient access
pub use board::{Faction, Tile, TileId, TileKind, Topology};
pub use pieces::{Pawn, PawnRecord, PawnState, Player};
pub use game::{
    GameConfig, GameEvent, GamePhase, MoveKind, MovePreview, TurnEngine, TurnState,
};
pub use ai::select_pawn;
pub use minigame::{CaptureSnapshot, Contest, ShowdownContest, Throw};
pub use dice::{DiceSource, ScriptedDice, SeededDice};
pub use error::GameError;
