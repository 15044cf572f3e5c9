use hashbrown::{HashMap, HashSet};
use log::debug;
use stagerando_game::{Cell, Edge, RoomName, RoomNode};
use std::collections::BTreeSet;

use crate::generate::RoomSet;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationFailure {
    #[error("rooms missing from layout: {0:?}")]
    MissingRooms(Vec<RoomName>),
    #[error("{0} open nodes left in layout")]
    OpenNodes(usize),
    #[error("rooms unreachable from the rest of the layout: {unreached:?}")]
    Disconnected { unreached: Vec<RoomName> },
}

/// Check that a finished layout contains every expected room, has no open nodes,
/// and that every room outside `excluded` is reachable through matched nodes.
pub fn validate_connectivity(
    room_set: &RoomSet,
    expected: &[RoomName],
    excluded: &[RoomName],
) -> Result<(), ValidationFailure> {
    let missing: Vec<RoomName> = expected
        .iter()
        .filter(|r| !room_set.contains(r))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(ValidationFailure::MissingRooms(missing));
    }

    let open = room_set.open_nodes().len();
    if open > 0 {
        return Err(ValidationFailure::OpenNodes(open));
    }

    let excluded: HashSet<&str> = excluded.iter().map(|r| r.as_str()).collect();
    let targets: BTreeSet<&str> = expected
        .iter()
        .map(|r| r.as_str())
        .filter(|r| !excluded.contains(r))
        .collect();
    let Some(&start) = targets.iter().next() else {
        return Ok(());
    };

    let mut node_index: HashMap<(Cell, Edge), Vec<&RoomNode>> = HashMap::new();
    for room in room_set.rooms.values() {
        for node in room.nodes.values() {
            node_index
                .entry((room.node_cell(node), node.edge))
                .or_default()
                .push(node);
        }
    }

    let mut visited: HashSet<&str> = HashSet::new();
    let mut stack: Vec<&str> = vec![start];
    visited.insert(start);
    while let Some(name) = stack.pop() {
        let Some(room) = room_set.rooms.get(name) else {
            continue;
        };
        for node in room.nodes.values() {
            let facing = room.facing_cell(node);
            let Some(neighbors) = node_index.get(&(facing, node.edge.opposite())) else {
                continue;
            };
            for other in neighbors {
                if !other.is_compatible(node) || excluded.contains(other.room.as_str()) {
                    continue;
                }
                if visited.insert(other.room.as_str()) {
                    stack.push(other.room.as_str());
                }
            }
        }
    }

    let unreached: Vec<RoomName> = targets
        .iter()
        .filter(|r| !visited.contains(*r))
        .map(|r| r.to_string())
        .collect();
    if !unreached.is_empty() {
        debug!("Reached {} of {} rooms", visited.len(), targets.len());
        return Err(ValidationFailure::Disconnected { unreached });
    }
    Ok(())
}
