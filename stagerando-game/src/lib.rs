pub mod requirement;
pub mod util;

pub use requirement::{
    CommandDefinition, Goals, Outcomes, Range, Requirement, Requirements, RequirementSet, Value,
    NONE_STRING,
};

use anyhow::{bail, ensure, Context, Result};
use hashbrown::HashSet;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

// The map is a fixed grid of 64x64 cells; every placed room must lie inside it.
pub const MAP_ROWS: i32 = 64;
pub const MAP_COLUMNS: i32 = 64;
pub const DEFAULT_SECTION: &str = "Main";

pub type RoomName = String; // "{stage}, {room}", unique across the game
pub type NodeName = String; // Only unique within a room
pub type Cell = (i32, i32); // (row, column) on the map grid

pub fn in_map(cell: Cell) -> bool {
    (0..MAP_ROWS).contains(&cell.0) && (0..MAP_COLUMNS).contains(&cell.1)
}

/// Errors in the room/command definitions themselves. These are authoring bugs,
/// not bad luck, so they are never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedData {
    #[error("unknown room: {0}")]
    UnknownRoom(RoomName),
    #[error("duplicate room: {0}")]
    DuplicateRoom(RoomName),
    #[error("unknown node {node} in room {room}")]
    UnknownNode { room: RoomName, node: NodeName },
    #[error("node {node} lies outside room {room}")]
    NodeOutsideRoom { room: RoomName, node: NodeName },
    #[error("room {room} has index {index}, expected 0..64")]
    BadIndex { room: RoomName, index: usize },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Edge {
    Top,
    Left,
    Bottom,
    Right,
}

/// Axis along which two facing edges must line up.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Right,
    Down,
}

impl Edge {
    pub fn opposite(self) -> Edge {
        match self {
            Edge::Top => Edge::Bottom,
            Edge::Bottom => Edge::Top,
            Edge::Left => Edge::Right,
            Edge::Right => Edge::Left,
        }
    }

    pub fn direction(self) -> Direction {
        match self {
            Edge::Top | Edge::Bottom => Direction::Right,
            Edge::Left | Edge::Right => Direction::Down,
        }
    }

    /// Offset from a cell to the neighbouring cell across this edge.
    pub fn delta(self) -> Cell {
        match self {
            Edge::Top => (-1, 0),
            Edge::Left => (0, -1),
            Edge::Bottom => (1, 0),
            Edge::Right => (0, 1),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomNode {
    pub room: RoomName,
    pub name: NodeName,
    pub row: i32,
    pub column: i32,
    pub edge: Edge,
    pub node_type: String,
    pub section: String,
}

impl RoomNode {
    pub fn direction(&self) -> Direction {
        self.edge.direction()
    }

    pub fn is_compatible(&self, other: &RoomNode) -> bool {
        self.node_type == other.node_type
            && self.direction() == other.direction()
            && self.edge.opposite() == other.edge
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Room {
    pub name: RoomName,
    pub stage: String,
    pub room: String,
    pub index: usize,
    pub top: i32,
    pub left: i32,
    pub rows: i32,
    pub columns: i32,
    pub empty_cells: BTreeSet<Cell>, // Room-relative
    pub nodes: BTreeMap<NodeName, RoomNode>,
}

impl Room {
    pub fn new(def: &RoomDefinition) -> Result<Room, MalformedData> {
        let name = room_name(&def.stage, &def.room);
        if def.index >= 64 {
            return Err(MalformedData::BadIndex {
                room: name,
                index: def.index,
            });
        }
        let mut nodes = BTreeMap::new();
        for (node_name, n) in &def.nodes {
            if n.row < 0 || n.row >= def.rows || n.column < 0 || n.column >= def.columns {
                return Err(MalformedData::NodeOutsideRoom {
                    room: name,
                    node: node_name.clone(),
                });
            }
            nodes.insert(
                node_name.clone(),
                RoomNode {
                    room: name.clone(),
                    name: node_name.clone(),
                    row: n.row,
                    column: n.column,
                    edge: n.edge,
                    node_type: n.node_type.clone(),
                    section: n.section.clone(),
                },
            );
        }
        Ok(Room {
            name,
            stage: def.stage.clone(),
            room: def.room.clone(),
            index: def.index,
            top: def.top,
            left: def.left,
            rows: def.rows,
            columns: def.columns,
            empty_cells: def.empty.iter().copied().collect(),
            nodes,
        })
    }

    /// Absolute map cells covered by the room.
    pub fn cells(&self) -> impl Iterator<Item = Cell> + '_ {
        (0..self.rows)
            .flat_map(move |r| (0..self.columns).map(move |c| (r, c)))
            .filter(|rc| !self.empty_cells.contains(rc))
            .map(|(r, c)| (self.top + r, self.left + c))
    }

    pub fn node_cell(&self, node: &RoomNode) -> Cell {
        (self.top + node.row, self.left + node.column)
    }

    pub fn facing_cell(&self, node: &RoomNode) -> Cell {
        let (r, c) = self.node_cell(node);
        let (dr, dc) = node.edge.delta();
        (r + dr, c + dc)
    }

    pub fn get_node(&self, node: &str) -> Result<&RoomNode, MalformedData> {
        self.nodes.get(node).ok_or_else(|| MalformedData::UnknownNode {
            room: self.name.clone(),
            node: node.to_string(),
        })
    }

    pub fn translate(&mut self, offset: Cell) {
        self.top += offset.0;
        self.left += offset.1;
    }

    pub fn change(&self) -> RoomChange {
        RoomChange {
            index: self.index,
            top: self.top,
            left: self.left,
        }
    }
}

pub fn room_name(stage: &str, room: &str) -> RoomName {
    format!("{stage}, {room}")
}

fn default_section() -> String {
    DEFAULT_SECTION.to_string()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeDefinition {
    pub row: i32,
    pub column: i32,
    pub edge: Edge,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default = "default_section")]
    pub section: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoomDefinition {
    pub stage: String,
    pub room: String,
    pub index: usize,
    pub top: i32,
    pub left: i32,
    pub rows: i32,
    pub columns: i32,
    #[serde(default)]
    pub empty: Vec<Cell>,
    #[serde(default)]
    pub nodes: BTreeMap<NodeName, NodeDefinition>,
    #[serde(default)]
    pub commands: BTreeMap<String, CommandDefinition>,
}

/// Everything read from the room definition file.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StageData {
    pub rooms: Vec<RoomDefinition>,
    #[serde(default)]
    pub global_commands: BTreeMap<String, CommandDefinition>,
}

impl StageData {
    pub fn load(path: &Path) -> Result<StageData> {
        let data_str = std::fs::read_to_string(path)
            .with_context(|| format!("Unable to read stage data at {}", path.display()))?;
        let stage_data: StageData = serde_json::from_str(&data_str)
            .with_context(|| format!("Unable to parse stage data at {}", path.display()))?;
        let mut names: HashSet<RoomName> = HashSet::new();
        for def in &stage_data.rooms {
            let name = room_name(&def.stage, &def.room);
            if !names.insert(name.clone()) {
                bail!(MalformedData::DuplicateRoom(name));
            }
        }
        info!(
            "Loaded {} rooms and {} global commands from {}",
            stage_data.rooms.len(),
            stage_data.global_commands.len(),
            path.display()
        );
        Ok(stage_data)
    }

    pub fn room_library(&self) -> Result<RoomLibrary, MalformedData> {
        let mut rooms: BTreeMap<RoomName, Room> = BTreeMap::new();
        for def in &self.rooms {
            let room = Room::new(def)?;
            if rooms.contains_key(&room.name) {
                return Err(MalformedData::DuplicateRoom(room.name));
            }
            rooms.insert(room.name.clone(), room);
        }
        Ok(RoomLibrary { rooms })
    }

    pub fn room_definition(&self, name: &str) -> Option<&RoomDefinition> {
        self.rooms
            .iter()
            .find(|def| room_name(&def.stage, &def.room) == name)
    }
}

/// All rooms of the game keyed by name, at their current positions.
#[derive(Clone, Debug, Default)]
pub struct RoomLibrary {
    pub rooms: BTreeMap<RoomName, Room>,
}

impl RoomLibrary {
    pub fn get(&self, name: &str) -> Result<&Room, MalformedData> {
        self.rooms
            .get(name)
            .ok_or_else(|| MalformedData::UnknownRoom(name.to_string()))
    }

    pub fn stage_rooms(&self, stage: &str) -> Vec<RoomName> {
        self.rooms
            .values()
            .filter(|r| r.stage == stage)
            .map(|r| r.name.clone())
            .collect()
    }

    /// Move rooms to the positions recorded in a generated layout.
    pub fn apply_changes(&mut self, changes: &Changes) -> Result<(), MalformedData> {
        for (name, change) in changes {
            let room = self
                .rooms
                .get_mut(name)
                .ok_or_else(|| MalformedData::UnknownRoom(name.clone()))?;
            room.top = change.top;
            room.left = change.left;
        }
        Ok(())
    }
}

/// Starting clusters of one stage: room name -> pinned (row, column) offset within
/// the cluster, or `None` for a room whose position is determined by matching.
pub type SeedCluster = BTreeMap<RoomName, Option<Cell>>;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeedLayout {
    pub stages: BTreeMap<String, Vec<SeedCluster>>,
}

impl SeedLayout {
    pub fn load(path: &Path) -> Result<SeedLayout> {
        let layout_str = std::fs::read_to_string(path)
            .with_context(|| format!("Unable to read seed layout at {}", path.display()))?;
        let layout: SeedLayout = serde_json::from_str(&layout_str)
            .with_context(|| format!("Unable to parse seed layout at {}", path.display()))?;
        for (stage, clusters) in &layout.stages {
            ensure!(!clusters.is_empty(), "Stage {stage} has no seed clusters");
        }
        Ok(layout)
    }

    pub fn clusters(&self, stage: &str) -> Result<&[SeedCluster]> {
        match self.stages.get(stage) {
            Some(c) => Ok(c),
            None => bail!("No seed layout for stage {stage}"),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomChange {
    pub index: usize,
    pub top: i32,
    pub left: i32,
}

/// Generated layout: new position of every placed room.
pub type Changes = BTreeMap<RoomName, RoomChange>;

#[cfg(test)]
mod tests {
    use super::*;

    fn node(row: i32, column: i32, edge: Edge, node_type: &str) -> RoomNode {
        RoomNode {
            room: "Stage, Room".to_string(),
            name: format!("{edge:?}"),
            row,
            column,
            edge,
            node_type: node_type.to_string(),
            section: DEFAULT_SECTION.to_string(),
        }
    }

    #[test]
    fn test_node_compatibility() {
        let right = node(0, 0, Edge::Right, "Normal");
        let left = node(0, 0, Edge::Left, "Normal");
        let red_left = node(0, 0, Edge::Left, "Red door");
        let top = node(0, 0, Edge::Top, "Normal");
        let bottom = node(0, 0, Edge::Bottom, "Normal");
        assert!(right.is_compatible(&left));
        assert!(left.is_compatible(&right));
        assert!(top.is_compatible(&bottom));
        assert!(!right.is_compatible(&red_left));
        assert!(!top.is_compatible(&top));
        assert!(!right.is_compatible(&top));
        assert_eq!(top.direction(), Direction::Right);
        assert_eq!(left.direction(), Direction::Down);
    }

    #[test]
    fn test_room_cells() {
        let def: RoomDefinition = serde_json::from_str(
            r#"{"stage": "Alchemy Laboratory", "room": "Tall Zig Zag Room",
                "index": 3, "top": 10, "left": 20, "rows": 2, "columns": 2,
                "empty": [[0, 1]],
                "nodes": {"Bottom": {"row": 1, "column": 1, "edge": "Bottom", "type": "Normal"}}}"#,
        )
        .unwrap();
        let room = Room::new(&def).unwrap();
        assert_eq!(room.name, "Alchemy Laboratory, Tall Zig Zag Room");
        let cells: Vec<Cell> = room.cells().collect();
        assert_eq!(cells, vec![(10, 20), (11, 20), (11, 21)]);
        let n = room.get_node("Bottom").unwrap();
        assert_eq!(n.section, DEFAULT_SECTION);
        assert_eq!(room.node_cell(n), (11, 21));
        assert_eq!(room.facing_cell(n), (12, 21));
        assert!(room.get_node("Top").is_err());
    }

    #[test]
    fn test_node_outside_room() {
        let def: RoomDefinition = serde_json::from_str(
            r#"{"stage": "Keep", "room": "Stairwell", "index": 0, "top": 0, "left": 0,
                "rows": 1, "columns": 1,
                "nodes": {"Bad": {"row": 0, "column": 1, "edge": "Right", "type": "Normal"}}}"#,
        )
        .unwrap();
        assert_eq!(
            Room::new(&def).unwrap_err(),
            MalformedData::NodeOutsideRoom {
                room: "Keep, Stairwell".to_string(),
                node: "Bad".to_string()
            }
        );
    }

    #[test]
    fn test_apply_changes() {
        let stage_data: StageData = serde_json::from_str(
            r#"{"rooms": [{"stage": "Keep", "room": "Stairwell", "index": 0, "top": 0,
                "left": 0, "rows": 1, "columns": 1}]}"#,
        )
        .unwrap();
        let mut library = stage_data.room_library().unwrap();
        let mut changes = Changes::new();
        changes.insert(
            "Keep, Stairwell".to_string(),
            RoomChange {
                index: 0,
                top: 5,
                left: 7,
            },
        );
        library.apply_changes(&changes).unwrap();
        let room = library.get("Keep, Stairwell").unwrap();
        assert_eq!((room.top, room.left), (5, 7));
        changes.insert(
            "Keep, Nowhere".to_string(),
            RoomChange {
                index: 1,
                top: 0,
                left: 0,
            },
        );
        assert!(library.apply_changes(&changes).is_err());
        assert_eq!(library.stage_rooms("Keep"), vec!["Keep, Stairwell".to_string()]);
    }
}
