pub mod commands;
pub mod exits;
pub mod game;
pub mod state;

pub use commands::{Command, CommandMap};
pub use game::{Game, ScoreWeights};
pub use state::{DigestOptions, State, StateDigest};

// Reserved state keys. The location keys hold strings; the history keys hold
// tables whose entries are set to `true` once visited.
pub const ROOM_KEY: &str = "Room";
pub const SECTION_KEY: &str = "Section";
pub const STAGES_VISITED_KEY: &str = "Stages Visited";
pub const ROOMS_VISITED_KEY: &str = "Rooms Visited";
pub const SECTIONS_VISITED_KEY: &str = "Sections Visited";
pub const HISTORY_KEYS: [&str; 3] = [
    STAGES_VISITED_KEY,
    ROOMS_VISITED_KEY,
    SECTIONS_VISITED_KEY,
];

// Destination of an exit that does not line up with any other room.
pub const UNKNOWN_ROOM: &str = "Unknown";
