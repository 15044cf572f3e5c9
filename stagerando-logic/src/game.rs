use serde::{Deserialize, Serialize};
use stagerando_game::{Goals, MalformedData, Requirements, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::{
    Command, CommandMap, DigestOptions, State, StateDigest, HISTORY_KEYS, ROOMS_VISITED_KEY,
    ROOM_KEY, SECTIONS_VISITED_KEY, SECTION_KEY, STAGES_VISITED_KEY,
};

/// Weights of the exploration score used to rank frontier states.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub stage: f64,
    pub room: f64,
    pub section: f64,
    // Bonus for each of these keys holding a non-default value.
    #[serde(default)]
    pub milestones: BTreeMap<String, f64>,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        ScoreWeights {
            stage: 100.0,
            room: 10.0,
            section: 1.0,
            milestones: BTreeMap::new(),
        }
    }
}

fn tracked_history(commands: &CommandMap, goals: &Goals) -> Vec<String> {
    let mut keys = commands.requirement_keys();
    keys.extend(
        goals
            .values()
            .flat_map(|reqs| reqs.values())
            .flat_map(|set| set.keys())
            .map(|k| k.as_str()),
    );
    HISTORY_KEYS
        .iter()
        .filter(|k| keys.contains(*k))
        .map(|k| k.to_string())
        .collect()
}

/// A world plus a player state. Applying a command forks the game; the command
/// map and goal definitions are shared between forks.
#[derive(Clone, Debug)]
pub struct Game {
    commands: Arc<CommandMap>,
    goals: Arc<Goals>,
    // History tables read by some requirement or goal; these always take part
    // in digests.
    tracked_history: Arc<Vec<String>>,
    pub state: State,
    pub pending_goals: BTreeSet<String>,
    pub achieved_goals: Vec<String>,
    pub history: Vec<String>,
}

impl Game {
    pub fn new(
        commands: Arc<CommandMap>,
        start_room: &str,
        start_section: &str,
        abilities: &BTreeMap<String, bool>,
        goals: Goals,
    ) -> Result<Game, MalformedData> {
        if !commands.contains_room(start_room) {
            return Err(MalformedData::UnknownRoom(start_room.to_string()));
        }
        let mut state = State::new();
        for (key, &value) in abilities {
            state.set(key, Value::Bool(value));
        }
        state.set(ROOM_KEY, Value::Str(start_room.to_string()));
        state.set(SECTION_KEY, Value::Str(start_section.to_string()));
        let tracked_history = tracked_history(&commands, &goals);
        let mut game = Game {
            commands,
            pending_goals: goals.keys().cloned().collect(),
            goals: Arc::new(goals),
            tracked_history: Arc::new(tracked_history),
            state,
            achieved_goals: vec![],
            history: vec![],
        };
        game.record_visit();
        game.state.prune();
        game.check_goals();
        Ok(game)
    }

    pub fn room(&self) -> &str {
        self.state.get_str(ROOM_KEY).unwrap_or(crate::UNKNOWN_ROOM)
    }

    pub fn section(&self) -> &str {
        self.state
            .get_str(SECTION_KEY)
            .unwrap_or(stagerando_game::DEFAULT_SECTION)
    }

    pub fn steps(&self) -> usize {
        self.history.len()
    }

    pub fn command_map(&self) -> &CommandMap {
        &self.commands
    }

    pub fn valid_requirements(&self, reqs: &Requirements) -> bool {
        self.state.satisfies_any(reqs)
    }

    /// Commands of the current room (plus global ones) whose requirements hold.
    pub fn available_commands(&self) -> Vec<&Command> {
        self.commands
            .available_commands(self.room())
            .filter(|c| self.valid_requirements(&c.requirements))
            .collect()
    }

    /// A new game with the command executed. `self` is never modified.
    pub fn apply(&self, command: &Command) -> Game {
        let mut next = self.clone();
        next.state.apply_outcomes(&command.outcomes);
        next.history.push(command.id());
        next.record_visit();
        next.state.prune();
        next.check_goals();
        next
    }

    pub fn goal_reached(&self) -> bool {
        !self.achieved_goals.is_empty()
    }

    pub fn goal_requirements(&self, goal: &str) -> Option<&Requirements> {
        self.goals.get(goal)
    }

    pub fn digest(&self, options: DigestOptions) -> StateDigest {
        self.state.digest_tracking(options, &self.tracked_history)
    }

    /// Weighted count of distinct stages, rooms and sections visited, plus
    /// bonuses for milestone keys.
    pub fn score(&self, weights: &ScoreWeights) -> f64 {
        let mut score = weights.stage * self.state.count_marked(STAGES_VISITED_KEY) as f64
            + weights.room * self.state.count_marked(ROOMS_VISITED_KEY) as f64
            + weights.section * self.state.count_marked(SECTIONS_VISITED_KEY) as f64;
        for (key, bonus) in &weights.milestones {
            if self.state.get(key).is_some_and(|v| !v.is_default()) {
                score += bonus;
            }
        }
        score
    }

    fn record_visit(&mut self) {
        let room = self.room().to_string();
        let section = self.section().to_string();
        if let Some(stage) = self.commands.stage_of(&room).map(|s| s.to_string()) {
            self.state.mark(STAGES_VISITED_KEY, &stage);
        }
        self.state.mark(ROOMS_VISITED_KEY, &room);
        self.state
            .mark(SECTIONS_VISITED_KEY, &format!("{room} ({section})"));
    }

    // Satisfied goals are consumed so that they are reported only once.
    fn check_goals(&mut self) {
        let satisfied: Vec<String> = self
            .pending_goals
            .iter()
            .filter(|g| {
                self.goals
                    .get(*g)
                    .is_some_and(|reqs| self.state.satisfies_any(reqs))
            })
            .cloned()
            .collect();
        for g in satisfied {
            self.pending_goals.remove(&g);
            self.achieved_goals.push(g);
        }
    }
}
