use hashbrown::HashMap;
use log::debug;
use stagerando_game::util::sorted_hashmap_iter;
use stagerando_game::{
    room_name, Changes, CommandDefinition, MalformedData, Outcomes, RequirementSet, Requirements,
    RoomLibrary, RoomName, StageData,
};
use std::collections::{BTreeMap, BTreeSet};

use crate::exits::{exit_command, link_exits};

#[derive(Clone, Debug, PartialEq)]
pub struct Command {
    pub room: Option<RoomName>, // None for global commands
    pub name: String,
    pub requirements: Requirements,
    pub outcomes: Outcomes,
}

impl Command {
    /// A command authored without requirements is always available.
    pub fn new(room: Option<&str>, name: &str, def: &CommandDefinition) -> Self {
        let mut requirements = def.requirements.clone();
        if requirements.is_empty() {
            requirements.insert("Default".to_string(), RequirementSet::new());
        }
        Command {
            room: room.map(|r| r.to_string()),
            name: name.to_string(),
            requirements,
            outcomes: def.outcomes.clone(),
        }
    }

    /// Name used in command histories.
    pub fn id(&self) -> String {
        match &self.room {
            Some(r) => format!("{r}: {}", self.name),
            None => format!("Global: {}", self.name),
        }
    }
}

/// Every command of the game, indexed by the room it is scoped to.
#[derive(Clone, Debug, Default)]
pub struct CommandMap {
    pub global: BTreeMap<String, Command>,
    pub rooms: HashMap<RoomName, BTreeMap<String, Command>>,
    pub room_stage: HashMap<RoomName, String>,
}

impl CommandMap {
    /// Build the commands for rooms at the positions given by `changes`.
    pub fn from_stage_data(
        stage_data: &StageData,
        changes: &Changes,
    ) -> Result<CommandMap, MalformedData> {
        let mut library = stage_data.room_library()?;
        library.apply_changes(changes)?;
        Self::from_library(stage_data, &library)
    }

    pub fn from_library(
        stage_data: &StageData,
        library: &RoomLibrary,
    ) -> Result<CommandMap, MalformedData> {
        let mut rooms: HashMap<RoomName, BTreeMap<String, Command>> = HashMap::new();
        let mut room_stage: HashMap<RoomName, String> = HashMap::new();
        for def in &stage_data.rooms {
            let name = room_name(&def.stage, &def.room);
            let commands: BTreeMap<String, Command> = def
                .commands
                .iter()
                .map(|(cmd_name, cmd)| (cmd_name.clone(), Command::new(Some(&name), cmd_name, cmd)))
                .collect();
            room_stage.insert(name.clone(), def.stage.clone());
            rooms.insert(name, commands);
        }

        let links = link_exits(library);
        for (room, room_links) in sorted_hashmap_iter(&links) {
            let def = stage_data
                .room_definition(room)
                .ok_or_else(|| MalformedData::UnknownRoom(room.clone()))?;
            let commands = rooms
                .get_mut(room)
                .ok_or_else(|| MalformedData::UnknownRoom(room.clone()))?;
            for link in room_links {
                let name = link.command_name();
                let cmd = exit_command(room, link, def.commands.get(&name));
                debug!(
                    "{}: {} -> {:?}",
                    room,
                    name,
                    link.destination.as_ref().map(|(r, s)| format!("{r} ({s})"))
                );
                commands.insert(name, cmd);
            }
        }

        let global = stage_data
            .global_commands
            .iter()
            .map(|(name, cmd)| (name.clone(), Command::new(None, name, cmd)))
            .collect();
        Ok(CommandMap {
            global,
            rooms,
            room_stage,
        })
    }

    pub fn contains_room(&self, room: &str) -> bool {
        self.rooms.contains_key(room)
    }

    pub fn stage_of(&self, room: &str) -> Option<&str> {
        self.room_stage.get(room).map(|s| s.as_str())
    }

    /// Every state key that some command requirement tests.
    pub fn requirement_keys(&self) -> BTreeSet<&str> {
        self.global
            .values()
            .chain(self.rooms.values().flat_map(|c| c.values()))
            .flat_map(|c| c.requirements.values())
            .flat_map(|set| set.keys())
            .map(|k| k.as_str())
            .collect()
    }

    /// Global commands followed by the room's own commands, regardless of
    /// whether their requirements currently hold.
    pub fn available_commands<'a>(&'a self, room: &str) -> impl Iterator<Item = &'a Command> {
        self.global
            .values()
            .chain(self.rooms.get(room).into_iter().flat_map(|c| c.values()))
    }
}
