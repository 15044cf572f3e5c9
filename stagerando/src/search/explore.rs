use hashbrown::HashMap;
use log::debug;
use rand::rngs::StdRng;
use rand::Rng;
use stagerando_logic::{DigestOptions, Game, StateDigest};

use super::SearchOutcome;

/// Visit counts per state, shared between the trials of one validation step.
pub type VisitMemo = HashMap<StateDigest, usize>;

/// Random walk that always moves to one of the least-visited next states.
///
/// Ends in a loss as soon as no command is available, which is how soft-locks
/// show up.
pub fn explore(
    start: &Game,
    memo: &mut VisitMemo,
    options: DigestOptions,
    cycle_limit: usize,
    rng: &mut StdRng,
) -> SearchOutcome {
    let mut game = start.clone();
    *memo.entry(game.digest(options)).or_insert(0) += 1;
    for cycle in 0..cycle_limit {
        if game.goal_reached() {
            debug!("[cycle {cycle}] Goal reached in {}", game.room());
            return SearchOutcome::Win(Box::new(game));
        }
        let mut best: Vec<Game> = vec![];
        let mut best_count = usize::MAX;
        for command in game.available_commands() {
            let next = game.apply(command);
            let count = memo.get(&next.digest(options)).copied().unwrap_or(0);
            if count < best_count {
                best_count = count;
                best.clear();
            }
            if count == best_count {
                best.push(next);
            }
        }
        if best.is_empty() {
            debug!("[cycle {cycle}] No commands available in {}", game.room());
            return SearchOutcome::Loss;
        }
        let i = rng.gen_range(0..best.len());
        game = best.swap_remove(i);
        *memo.entry(game.digest(options)).or_insert(0) += 1;
    }
    if game.goal_reached() {
        SearchOutcome::Win(Box::new(game))
    } else {
        SearchOutcome::Withdrawal
    }
}

pub fn run_trials(
    start: &Game,
    trials: usize,
    cycle_limit: usize,
    options: DigestOptions,
    rng: &mut StdRng,
) -> Vec<SearchOutcome> {
    let mut memo = VisitMemo::new();
    (0..trials)
        .map(|_| explore(start, &mut memo, options, cycle_limit, rng))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::make_rng;
    use stagerando_game::{Changes, Goals, StageData};
    use stagerando_logic::CommandMap;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    // A hub with a door back and forth to a side room, and a one-way pit into a
    // dead end.
    fn game(goal: &str) -> Game {
        let stage_data: StageData = serde_json::from_str(
            r#"{"rooms": [
                {"stage": "Keep", "room": "Hub", "index": 0, "top": 0, "left": 0, "rows": 1, "columns": 1,
                 "nodes": {"East": {"row": 0, "column": 0, "edge": "Right", "type": "Normal"}},
                 "commands": {"Fall": {"Outcomes": {"Room": "Keep, Pit"}}}},
                {"stage": "Keep", "room": "Side", "index": 1, "top": 0, "left": 1, "rows": 1, "columns": 1,
                 "nodes": {"West": {"row": 0, "column": 0, "edge": "Left", "type": "Normal"}}},
                {"stage": "Keep", "room": "Pit", "index": 2, "top": 10, "left": 10, "rows": 1, "columns": 1}
            ]}"#,
        )
        .unwrap();
        let commands = Arc::new(CommandMap::from_stage_data(&stage_data, &Changes::new()).unwrap());
        let goals: Goals = serde_json::from_str(goal).unwrap();
        Game::new(commands, "Keep, Hub", "Main", &BTreeMap::new(), goals).unwrap()
    }

    #[test]
    fn test_soft_lock_is_a_loss() {
        let start = game(r#"{"Never": {"Any": {"Relic - Soul of Bat": true}}}"#);
        let mut rng = make_rng(0);
        let outcomes = run_trials(&start, 10, 20, DigestOptions::REVISIT, &mut rng);
        // The pit is eventually the least-visited option in every trial.
        assert!(outcomes.iter().all(|o| matches!(o, SearchOutcome::Loss)));
    }

    #[test]
    fn test_win_and_withdrawal() {
        let start = game(r#"{"Side": {"Any": {"Room": "Keep, Side"}}}"#);
        let mut rng = make_rng(0);
        let outcomes = run_trials(&start, 5, 20, DigestOptions::REVISIT, &mut rng);
        for o in &outcomes {
            if let SearchOutcome::Win(g) = o {
                assert_eq!(g.room(), "Keep, Side");
            }
        }

        let mut memo = VisitMemo::new();
        let outcome = explore(&start, &mut memo, DigestOptions::REVISIT, 0, &mut rng);
        assert!(matches!(outcome, SearchOutcome::Withdrawal));
        assert_eq!(memo.len(), 1);
    }
}
