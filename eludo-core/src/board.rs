//! Board topology: the shared main path, per-faction home stretches,
//! start and base cells, and the goal.
//!
//! A `Topology` is a finished, immutable description of the board. The
//! engine never builds geometry; it consumes this structure and indexes
//! into it. Cell coordinates, materials and placement belong to whatever
//! built the topology.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::GameError;

/// Number of cells on the standard main path loop
pub const MAIN_PATH_LEN: usize = 52;

/// Home-stretch cells per faction on the standard board (goal excluded)
pub const HOME_STRETCH_LEN: usize = 5;

/// Pawns (and base cells) per faction
pub const PAWNS_PER_FACTION: usize = 4;

/// Main-path start indices for the standard board, in rotation order
const STANDARD_STARTS: [usize; 4] = [0, 13, 26, 39];

// ============================================================================
// FACTIONS
// ============================================================================

/// One of the four elemental factions
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Faction {
    Fire = 0,
    Earth = 1,
    Air = 2,
    Water = 3,
}

impl Faction {
    /// All factions in fixed rotation order
    pub const ALL: [Faction; 4] = [Faction::Fire, Faction::Earth, Faction::Air, Faction::Water];

    /// Next faction in rotation order (wraps)
    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % 4]
    }

    /// Index into per-faction tables (0-3)
    pub fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for Faction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Faction::Fire => write!(f, "Fire"),
            Faction::Earth => write!(f, "Earth"),
            Faction::Air => write!(f, "Air"),
            Faction::Water => write!(f, "Water"),
        }
    }
}

impl std::str::FromStr for Faction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fire" => Ok(Faction::Fire),
            "earth" => Ok(Faction::Earth),
            "air" => Ok(Faction::Air),
            "water" => Ok(Faction::Water),
            _ => Err(format!(
                "unknown faction '{s}' (expected fire, earth, air or water)"
            )),
        }
    }
}

// ============================================================================
// TILES
// ============================================================================

/// Stable tile identity
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileId(pub u32);

/// Functional kind of a cell
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TileKind {
    /// Holds a faction's pawns that are not in play
    Base,
    /// The shared main path loop
    Path,
    /// A faction's private stretch leading to the goal
    Home,
    /// The shared finishing cell
    Goal,
    /// The main-path cell where a faction's pawns enter play
    Start,
}

/// A single board cell. Occupancy is tracked by the turn engine, not here.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    pub id: TileId,
    pub kind: TileKind,
    pub owner: Option<Faction>,
}

impl Tile {
    pub const fn new(id: u32, kind: TileKind, owner: Option<Faction>) -> Self {
        Self {
            id: TileId(id),
            kind,
            owner,
        }
    }
}

// ============================================================================
// TOPOLOGY
// ============================================================================

/// Immutable board description, valid for the whole match.
///
/// Home stretches do not include the goal; the engine treats each
/// faction's home track as `home_stretch + goal`, so the last track index
/// is the goal cell.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Topology {
    main_path: Vec<Tile>,
    home_stretches: [Vec<Tile>; 4],
    start_indices: [usize; 4],
    home_entry_indices: [usize; 4],
    base_tiles: [Vec<Tile>; 4],
    goal: Tile,
}

impl Topology {
    /// Build a topology from finished parts, rejecting incomplete boards
    pub fn new(
        main_path: Vec<Tile>,
        home_stretches: [Vec<Tile>; 4],
        start_indices: [usize; 4],
        home_entry_indices: [usize; 4],
        base_tiles: [Vec<Tile>; 4],
        goal: Tile,
    ) -> Result<Self, GameError> {
        let topology = Self {
            main_path,
            home_stretches,
            start_indices,
            home_entry_indices,
            base_tiles,
            goal,
        };
        topology.validate()?;
        Ok(topology)
    }

    /// The classic four-lane ring: 52 main cells, starts at 0/13/26/39,
    /// home entry one cell before each start, 5 home cells per faction.
    pub fn standard() -> Self {
        let mut main_path = Vec::with_capacity(MAIN_PATH_LEN);
        for i in 0..MAIN_PATH_LEN {
            let start_owner = STANDARD_STARTS
                .iter()
                .position(|&s| s == i)
                .map(|f| Faction::ALL[f]);
            let kind = if start_owner.is_some() {
                TileKind::Start
            } else {
                TileKind::Path
            };
            main_path.push(Tile::new(i as u32, kind, start_owner));
        }

        let home_stretches = Faction::ALL.map(|faction| {
            (0..HOME_STRETCH_LEN)
                .map(|j| {
                    Tile::new(
                        100 + faction.index() as u32 * 10 + j as u32,
                        TileKind::Home,
                        Some(faction),
                    )
                })
                .collect()
        });

        let base_tiles = Faction::ALL.map(|faction| {
            (0..PAWNS_PER_FACTION)
                .map(|j| {
                    Tile::new(
                        200 + faction.index() as u32 * 10 + j as u32,
                        TileKind::Base,
                        Some(faction),
                    )
                })
                .collect()
        });

        let home_entry_indices =
            STANDARD_STARTS.map(|s| (s + MAIN_PATH_LEN - 1) % MAIN_PATH_LEN);

        Self {
            main_path,
            home_stretches,
            start_indices: STANDARD_STARTS,
            home_entry_indices,
            base_tiles,
            goal: Tile::new(99, TileKind::Goal, None),
        }
    }

    /// Length of the shared main path
    pub fn main_path_len(&self) -> usize {
        self.main_path.len()
    }

    /// Main-path cell at `index`
    pub fn main_path_tile(&self, index: usize) -> &Tile {
        &self.main_path[index % self.main_path.len()]
    }

    /// A faction's home stretch, ordered toward the goal (goal excluded)
    pub fn home_stretch(&self, faction: Faction) -> &[Tile] {
        &self.home_stretches[faction.index()]
    }

    /// Home track length including the goal cell
    pub fn home_track_len(&self, faction: Faction) -> usize {
        self.home_stretches[faction.index()].len() + 1
    }

    /// Index of a faction's start cell on the main path
    pub fn start_index(&self, faction: Faction) -> usize {
        self.start_indices[faction.index()]
    }

    /// A faction's start cell
    pub fn start_tile(&self, faction: Faction) -> &Tile {
        &self.main_path[self.start_indices[faction.index()]]
    }

    /// Main-path index at which a lapped pawn may turn into its home stretch
    pub fn home_entry_index(&self, faction: Faction) -> usize {
        self.home_entry_indices[faction.index()]
    }

    /// A faction's base cells
    pub fn base_tiles(&self, faction: Faction) -> &[Tile] {
        &self.base_tiles[faction.index()]
    }

    /// The shared goal cell
    pub fn goal_tile(&self) -> &Tile {
        &self.goal
    }

    /// Load from a JSON file
    pub fn load(path: &Path) -> Result<Self, GameError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| GameError::Setup(format!("cannot read topology {}: {e}", path.display())))?;
        let topology: Topology = serde_json::from_str(&content)
            .map_err(|e| GameError::Setup(format!("malformed topology {}: {e}", path.display())))?;
        topology.validate()?;
        Ok(topology)
    }

    /// Save to a JSON file
    pub fn save(&self, path: &Path) -> Result<(), GameError> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| GameError::Setup(format!("cannot serialize topology: {e}")))?;
        std::fs::write(path, content)
            .map_err(|e| GameError::Setup(format!("cannot write topology {}: {e}", path.display())))
    }

    /// Check that every faction has the cells the engine needs
    fn validate(&self) -> Result<(), GameError> {
        if self.main_path.is_empty() {
            return Err(GameError::Setup("main path is empty".into()));
        }
        if self.goal.kind != TileKind::Goal {
            return Err(GameError::Setup("goal tile has wrong kind".into()));
        }

        for faction in Faction::ALL {
            let start_index = self.start_indices[faction.index()];
            let start = self.main_path.get(start_index).ok_or_else(|| {
                GameError::Setup(format!("{faction}: start index {start_index} outside main path"))
            })?;
            if start.kind != TileKind::Start || start.owner != Some(faction) {
                return Err(GameError::Setup(format!(
                    "{faction}: main path cell {start_index} is not its start"
                )));
            }

            if self.home_entry_indices[faction.index()] >= self.main_path.len() {
                return Err(GameError::Setup(format!(
                    "{faction}: home entry index outside main path"
                )));
            }

            let stretch = &self.home_stretches[faction.index()];
            if stretch.is_empty() {
                return Err(GameError::Setup(format!("{faction}: home stretch is empty")));
            }
            if stretch
                .iter()
                .any(|t| t.kind != TileKind::Home || t.owner != Some(faction))
            {
                return Err(GameError::Setup(format!(
                    "{faction}: home stretch contains foreign or non-home cells"
                )));
            }

            let bases = &self.base_tiles[faction.index()];
            if bases.len() != PAWNS_PER_FACTION {
                return Err(GameError::Setup(format!(
                    "{faction}: expected {PAWNS_PER_FACTION} base cells, found {}",
                    bases.len()
                )));
            }
            if bases
                .iter()
                .any(|t| t.kind != TileKind::Base || t.owner != Some(faction))
            {
                return Err(GameError::Setup(format!(
                    "{faction}: base cells contain foreign or non-base cells"
                )));
            }
        }

        // Tile ids must be unique across the whole board
        let mut seen = rustc_hash::FxHashSet::default();
        let all = self
            .main_path
            .iter()
            .chain(self.home_stretches.iter().flatten())
            .chain(self.base_tiles.iter().flatten())
            .chain(std::iter::once(&self.goal));
        for tile in all {
            if !seen.insert(tile.id) {
                return Err(GameError::Setup(format!("duplicate tile id {:?}", tile.id)));
            }
        }

        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
