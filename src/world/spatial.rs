//! Rooms, layers and weather
//!
//! Sound propagation and flight narration only need the queries on
//! `SpatialModel`; `RoomMap` answers them over a graph of rooms.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::core::types::{CellId, Layer, Position};

/// Precipitation in an outdoor cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum Precipitation {
    #[default]
    None,
    Light,
    Moderate,
    Heavy,
    Storm,
}

impl Precipitation {
    /// Intensity fed into failure formulas (0-4)
    pub fn intensity(&self) -> f32 {
        match self {
            Precipitation::None => 0.0,
            Precipitation::Light => 1.0,
            Precipitation::Moderate => 2.0,
            Precipitation::Heavy => 3.0,
            Precipitation::Storm => 4.0,
        }
    }
}

/// Boundary to the room/spatial collaborator
pub trait SpatialModel {
    /// Cells from `from` to `to`, both ends included
    fn path_between(&self, from: CellId, to: CellId) -> Option<Vec<CellId>>;

    /// Number of steps between two cells
    fn distance_between(&self, from: CellId, to: CellId) -> Option<u32> {
        self.path_between(from, to)
            .map(|path| path.len().saturating_sub(1) as u32)
    }

    /// Cells within `radius` steps of `origin`, origin included, ordered by
    /// distance and then id
    fn cells_in_vicinity(&self, origin: CellId, radius: u32) -> Vec<(CellId, u32)>;

    /// Other occupied layers of the cell that share its air
    fn adjacent_layers(&self, position: Position) -> Vec<Layer>;

    fn precipitation(&self, cell: CellId) -> Precipitation;

    fn is_outdoors(&self, cell: CellId) -> bool;

    fn cell_name(&self, cell: CellId) -> String;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: CellId,
    pub name: String,
    pub outdoors: bool,
    pub precipitation: Precipitation,
    pub exits: BTreeSet<CellId>,
    pub layers: BTreeSet<Layer>,
}

/// Undirected room graph
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoomMap {
    rooms: BTreeMap<CellId, Room>,
}

impl RoomMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_room(&mut self, id: CellId, name: &str, outdoors: bool) -> &mut Room {
        self.rooms.entry(id).or_insert_with(|| Room {
            id,
            name: name.to_string(),
            outdoors,
            precipitation: Precipitation::None,
            exits: BTreeSet::new(),
            layers: [Layer::GroundLevel].into_iter().collect(),
        })
    }

    pub fn connect(&mut self, a: CellId, b: CellId) {
        if let Some(room) = self.rooms.get_mut(&a) {
            room.exits.insert(b);
        }
        if let Some(room) = self.rooms.get_mut(&b) {
            room.exits.insert(a);
        }
    }

    pub fn room(&self, id: CellId) -> Option<&Room> {
        self.rooms.get(&id)
    }

    pub fn set_precipitation(&mut self, id: CellId, precipitation: Precipitation) {
        if let Some(room) = self.rooms.get_mut(&id) {
            room.precipitation = precipitation;
        }
    }

    /// A straight shooting range: Armoury - Firing Line - Lane - Butts - Far Field
    ///
    /// The firing line has a rooftop layer; the lane and beyond are open air.
    pub fn firing_range() -> Self {
        let mut map = RoomMap::new();
        map.add_room(CellId(1), "the armoury", false);
        map.add_room(CellId(2), "the firing line", true)
            .layers
            .insert(Layer::OnRooftops);
        map.add_room(CellId(3), "the lane", true);
        map.add_room(CellId(4), "the butts", true);
        map.add_room(CellId(5), "the far field", true);
        for pair in [(1, 2), (2, 3), (3, 4), (4, 5)] {
            map.connect(CellId(pair.0), CellId(pair.1));
        }
        map
    }

    fn bfs(&self, origin: CellId, limit: Option<u32>) -> BTreeMap<CellId, (u32, CellId)> {
        // cell -> (distance, predecessor)
        let mut seen = BTreeMap::new();
        if !self.rooms.contains_key(&origin) {
            return seen;
        }
        seen.insert(origin, (0, origin));
        let mut queue = VecDeque::from([origin]);
        while let Some(cell) = queue.pop_front() {
            let dist = seen[&cell].0;
            if limit.map_or(false, |l| dist >= l) {
                continue;
            }
            if let Some(room) = self.rooms.get(&cell) {
                for exit in &room.exits {
                    if !seen.contains_key(exit) && self.rooms.contains_key(exit) {
                        seen.insert(*exit, (dist + 1, cell));
                        queue.push_back(*exit);
                    }
                }
            }
        }
        seen
    }
}

impl SpatialModel for RoomMap {
    fn path_between(&self, from: CellId, to: CellId) -> Option<Vec<CellId>> {
        let visited = self.bfs(from, None);
        visited.get(&to)?;
        let mut path = vec![to];
        let mut cell = to;
        while cell != from {
            cell = visited.get(&cell)?.1;
            path.push(cell);
        }
        path.reverse();
        Some(path)
    }

    fn cells_in_vicinity(&self, origin: CellId, radius: u32) -> Vec<(CellId, u32)> {
        let mut cells: Vec<(CellId, u32)> = self
            .bfs(origin, Some(radius))
            .into_iter()
            .map(|(cell, (dist, _))| (cell, dist))
            .collect();
        cells.sort_by_key(|(cell, dist)| (*dist, *cell));
        cells
    }

    fn adjacent_layers(&self, position: Position) -> Vec<Layer> {
        self.rooms
            .get(&position.cell)
            .map(|room| {
                room.layers
                    .iter()
                    .copied()
                    .filter(|layer| *layer != position.layer)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn precipitation(&self, cell: CellId) -> Precipitation {
        self.rooms
            .get(&cell)
            .filter(|room| room.outdoors)
            .map(|room| room.precipitation)
            .unwrap_or_default()
    }

    fn is_outdoors(&self, cell: CellId) -> bool {
        self.rooms.get(&cell).map_or(false, |room| room.outdoors)
    }

    fn cell_name(&self, cell: CellId) -> String {
        self.rooms
            .get(&cell)
            .map(|room| room.name.clone())
            .unwrap_or_else(|| "somewhere".to_string())
    }
}
