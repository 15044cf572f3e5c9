use hashbrown::HashSet;
use log::debug;
use stagerando_logic::{DigestOptions, Game, ScoreWeights, StateDigest};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};

use super::SearchOutcome;

// Same place and same progress; the route taken does not matter.
const OPTIONS: DigestOptions = DigestOptions::REVISIT;

/// Heap key: higher score first, then fewer steps, then earlier insertion.
#[derive(Clone, Copy, Debug)]
pub struct Priority {
    pub score: f64,
    pub step: usize,
    pub seq: u64,
}

impl Ord for Priority {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.step.cmp(&self.step))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Priority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Priority {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Priority {}

struct Entry {
    priority: Priority,
    game: Game,
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority.cmp(&other.priority)
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority
    }
}

impl Eq for Entry {}

/// True if some sequence of at most `depth` commands from `game` leads back to
/// a state with digest `origin`.
pub fn returns_within(game: &Game, origin: StateDigest, depth: usize) -> bool {
    let mut visited: HashSet<StateDigest> = HashSet::new();
    visited.insert(game.digest(OPTIONS));
    let mut queue: VecDeque<(Game, usize)> = VecDeque::new();
    queue.push_back((game.clone(), 0));
    while let Some((current, d)) = queue.pop_front() {
        if d >= depth {
            continue;
        }
        for command in current.available_commands() {
            let next = current.apply(command);
            let digest = next.digest(OPTIONS);
            if digest == origin {
                return true;
            }
            if visited.insert(digest) {
                queue.push_back((next, d + 1));
            }
        }
    }
    false
}

/// Result of collapsing the locations bonded to a state.
pub enum Bond {
    Members(Vec<Game>),
    Goal(Game),
}

/// Every state reachable from `game` through chains of `depth`-reflexive
/// commands, `game` itself first. A command is reflexive when the state it
/// leads to can get back to the state it was taken from.
pub fn bond(game: &Game, depth: usize) -> Bond {
    let mut members = vec![game.clone()];
    let mut seen: HashSet<StateDigest> = HashSet::new();
    seen.insert(game.digest(OPTIONS));
    let mut queue: VecDeque<Game> = VecDeque::new();
    queue.push_back(game.clone());
    while let Some(current) = queue.pop_front() {
        let origin = current.digest(OPTIONS);
        for command in current.available_commands() {
            let next = current.apply(command);
            if next.goal_reached() {
                return Bond::Goal(next);
            }
            let digest = next.digest(OPTIONS);
            if seen.contains(&digest) || !returns_within(&next, origin, depth) {
                continue;
            }
            seen.insert(digest);
            members.push(next.clone());
            queue.push_back(next);
        }
    }
    Bond::Members(members)
}

/// Best-first search that collapses reversible moves before branching.
pub fn bonded_search(
    start: &Game,
    cycle_limit: usize,
    reflexive_depth: usize,
    weights: &ScoreWeights,
) -> SearchOutcome {
    if start.goal_reached() {
        return SearchOutcome::Win(Box::new(start.clone()));
    }
    let mut seen: HashSet<StateDigest> = HashSet::new();
    seen.insert(start.digest(OPTIONS));
    let mut heap: BinaryHeap<Entry> = BinaryHeap::new();
    let mut seq: u64 = 0;
    heap.push(Entry {
        priority: Priority {
            score: start.score(weights),
            step: start.steps(),
            seq,
        },
        game: start.clone(),
    });

    for cycle in 0..cycle_limit {
        let Some(entry) = heap.pop() else {
            debug!("[cycle {cycle}] Heap empty after {} states", seen.len());
            return SearchOutcome::Loss;
        };
        let members = match bond(&entry.game, reflexive_depth) {
            Bond::Goal(game) => return SearchOutcome::Win(Box::new(game)),
            Bond::Members(members) => members,
        };
        debug!(
            "[cycle {cycle}] {} bonded to {} (score {})",
            members.len(),
            entry.game.room(),
            entry.priority.score
        );
        for member in &members {
            seen.insert(member.digest(OPTIONS));
        }
        for member in &members {
            for command in member.available_commands() {
                let next = member.apply(command);
                if next.goal_reached() {
                    return SearchOutcome::Win(Box::new(next));
                }
                if !seen.insert(next.digest(OPTIONS)) {
                    continue;
                }
                seq += 1;
                heap.push(Entry {
                    priority: Priority {
                        score: next.score(weights),
                        step: next.steps(),
                        seq,
                    },
                    game: next,
                });
            }
        }
    }
    SearchOutcome::Withdrawal
}
