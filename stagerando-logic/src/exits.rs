use hashbrown::HashMap;
use stagerando_game::{
    Cell, CommandDefinition, Edge, NodeName, Requirement, RequirementSet, Requirements,
    RoomLibrary, RoomName, Value, DEFAULT_SECTION,
};
use std::collections::BTreeMap;

use crate::{Command, ROOM_KEY, SECTION_KEY, UNKNOWN_ROOM};

/// Where one exit node of a room leads, given current room positions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExitLink {
    pub node: NodeName,
    pub section: String,
    // (room, section) on the far side, or None if nothing lines up.
    pub destination: Option<(RoomName, String)>,
}

impl ExitLink {
    pub fn command_name(&self) -> String {
        exit_command_name(&self.node)
    }
}

pub fn exit_command_name(node: &str) -> String {
    format!("Exit - {node}")
}

/// Match every exit node against the node occupying the cell beyond its edge.
/// Adjacency is purely geometric, so this must be recomputed whenever rooms move.
pub fn link_exits(library: &RoomLibrary) -> HashMap<RoomName, Vec<ExitLink>> {
    let mut node_index: HashMap<(Cell, Edge), (&RoomName, &str)> = HashMap::new();
    for room in library.rooms.values() {
        for node in room.nodes.values() {
            node_index.insert(
                (room.node_cell(node), node.edge),
                (&room.name, node.section.as_str()),
            );
        }
    }

    let mut links: HashMap<RoomName, Vec<ExitLink>> = HashMap::new();
    for room in library.rooms.values() {
        let mut room_links = Vec::with_capacity(room.nodes.len());
        for node in room.nodes.values() {
            let facing = room.facing_cell(node);
            let destination = match node_index.get(&(facing, node.edge.opposite())) {
                Some(&(dst_room, dst_section)) if *dst_room != room.name => {
                    Some((dst_room.clone(), dst_section.to_string()))
                }
                _ => None,
            };
            room_links.push(ExitLink {
                node: node.name.clone(),
                section: node.section.clone(),
                destination,
            });
        }
        links.insert(room.name.clone(), room_links);
    }
    links
}

/// Synthesize the command for taking an exit. Requirements authored in the room's
/// own command table under the same name take precedence over the default of
/// standing in the exit's section.
pub fn exit_command(room: &str, link: &ExitLink, defined: Option<&CommandDefinition>) -> Command {
    let requirements: Requirements = match defined {
        Some(def) if !def.requirements.is_empty() => def.requirements.clone(),
        _ => {
            let mut set = RequirementSet::new();
            set.insert(
                SECTION_KEY.to_string(),
                Requirement::Exact(Value::Str(link.section.clone())),
            );
            let mut reqs = Requirements::new();
            reqs.insert("Default".to_string(), set);
            reqs
        }
    };
    let (dst_room, dst_section) = match &link.destination {
        Some((r, s)) => (r.as_str(), s.as_str()),
        None => (UNKNOWN_ROOM, DEFAULT_SECTION),
    };
    let mut outcomes = BTreeMap::new();
    outcomes.insert(ROOM_KEY.to_string(), Value::Str(dst_room.to_string()));
    outcomes.insert(SECTION_KEY.to_string(), Value::Str(dst_section.to_string()));
    Command {
        room: Some(room.to_string()),
        name: link.command_name(),
        requirements,
        outcomes,
    }
}
