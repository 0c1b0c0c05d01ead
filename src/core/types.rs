//! Core type definitions used throughout the codebase

use serde::{Deserialize, Serialize};

/// Game tick counter (simulation time unit)
pub type Tick = u64;

/// Unique identifier for actors (anything with a body that can wield a weapon)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActorId(pub u64);

/// Unique identifier for items held in the item arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemId(pub u64);

/// Room / cell identifier for the spatial model
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellId(pub u32);

/// Identifier for a single wound recorded by the body oracle
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WoundId(pub u64);

/// Identifier for a scheduled continuation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskId(pub u64);

/// Identifier for an ongoing fight (dropped ammunition is tagged with it)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CombatId(pub u32);

/// Vertical layer inside a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Layer {
    Underwater,
    GroundLevel,
    OnRooftops,
    InTrees,
    InAir,
}

impl Layer {
    /// Short phrase used when narrating sound crossing into this layer
    pub fn describe(&self) -> &'static str {
        match self {
            Layer::Underwater => "under the water",
            Layer::GroundLevel => "at ground level",
            Layer::OnRooftops => "up on the rooftops",
            Layer::InTrees => "up in the trees",
            Layer::InAir => "in the air",
        }
    }
}

impl Default for Layer {
    fn default() -> Self {
        Layer::GroundLevel
    }
}

/// A location in the world: a cell plus the layer within it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub cell: CellId,
    pub layer: Layer,
}

impl Position {
    pub fn new(cell: CellId, layer: Layer) -> Self {
        Self { cell, layer }
    }

    /// Ground-level position in a cell
    pub fn ground(cell: CellId) -> Self {
        Self {
            cell,
            layer: Layer::GroundLevel,
        }
    }
}
