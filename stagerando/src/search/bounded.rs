use hashbrown::HashMap;
use log::debug;
use stagerando_logic::{DigestOptions, Game, StateDigest};
use std::collections::VecDeque;

use super::SearchOutcome;

/// Breadth-first search up to `max_steps` commands. The first goal state found
/// is at the shortest possible depth.
pub fn bounded_search(start: &Game, max_steps: usize, options: DigestOptions) -> SearchOutcome {
    if start.goal_reached() {
        return SearchOutcome::Win(Box::new(start.clone()));
    }
    // Shallowest depth at which each state was queued.
    let mut memo: HashMap<StateDigest, usize> = HashMap::new();
    memo.insert(start.digest(options), 0);
    let mut queue: VecDeque<Game> = VecDeque::new();
    queue.push_back(start.clone());

    while let Some(game) = queue.pop_front() {
        let step = game.steps();
        if step >= max_steps {
            continue;
        }
        for command in game.available_commands() {
            let next = game.apply(command);
            if next.goal_reached() {
                debug!("Goal reached after {} steps", next.steps());
                return SearchOutcome::Win(Box::new(next));
            }
            let digest = next.digest(options);
            if memo.get(&digest).is_some_and(|&d| d <= step + 1) {
                continue;
            }
            memo.insert(digest, step + 1);
            queue.push_back(next);
        }
    }
    debug!("Frontier exhausted after {} states", memo.len());
    SearchOutcome::Loss
}

#[cfg(test)]
mod tests {
    use super::*;
    use stagerando_game::{Changes, Goals, StageData};
    use stagerando_logic::CommandMap;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    // A long way round (A -> B -> C -> D) and a shortcut door (A -> D) that
    // needs a key picked up in A.
    fn start() -> Game {
        let stage_data: StageData = serde_json::from_str(
            r#"{"rooms": [
                {"stage": "Keep", "room": "A", "index": 0, "top": 0, "left": 0, "rows": 1, "columns": 1,
                 "nodes": {"East": {"row": 0, "column": 0, "edge": "Right", "type": "Normal"}},
                 "commands": {
                    "Take Key": {"Outcomes": {"Key": true}},
                    "Shortcut": {"Requirements": {"Key": {"Key": true}}, "Outcomes": {"Room": "Keep, D"}}
                 }},
                {"stage": "Keep", "room": "B", "index": 1, "top": 0, "left": 1, "rows": 1, "columns": 1,
                 "nodes": {"West": {"row": 0, "column": 0, "edge": "Left", "type": "Normal"},
                           "East": {"row": 0, "column": 0, "edge": "Right", "type": "Normal"}}},
                {"stage": "Keep", "room": "C", "index": 2, "top": 0, "left": 2, "rows": 1, "columns": 1,
                 "nodes": {"West": {"row": 0, "column": 0, "edge": "Left", "type": "Normal"},
                           "East": {"row": 0, "column": 0, "edge": "Right", "type": "Normal"}}},
                {"stage": "Keep", "room": "D", "index": 3, "top": 0, "left": 3, "rows": 1, "columns": 1,
                 "nodes": {"West": {"row": 0, "column": 0, "edge": "Left", "type": "Normal"}}}
            ]}"#,
        )
        .unwrap();
        let commands = Arc::new(CommandMap::from_stage_data(&stage_data, &Changes::new()).unwrap());
        let goals: Goals = serde_json::from_str(r#"{"D": {"Any": {"Room": "Keep, D"}}}"#).unwrap();
        Game::new(commands, "Keep, A", "Main", &BTreeMap::new(), goals).unwrap()
    }

    #[test]
    fn test_shortest_path() {
        match bounded_search(&start(), 10, DigestOptions::REVISIT) {
            SearchOutcome::Win(game) => {
                assert_eq!(game.steps(), 2);
                assert_eq!(
                    game.history,
                    vec!["Keep, A: Take Key", "Keep, A: Shortcut"]
                );
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_step_limit() {
        assert!(matches!(
            bounded_search(&start(), 1, DigestOptions::REVISIT),
            SearchOutcome::Loss
        ));
    }

    #[test]
    fn test_goal_at_start() {
        let game = start();
        let goals: Goals = serde_json::from_str(r#"{"A": {"Any": {"Room": "Keep, A"}}}"#).unwrap();
        let game = Game::new(
            Arc::new(game.command_map().clone()),
            "Keep, A",
            "Main",
            &BTreeMap::new(),
            goals,
        )
        .unwrap();
        match bounded_search(&game, 0, DigestOptions::REVISIT) {
            SearchOutcome::Win(g) => assert_eq!(g.steps(), 0),
            other => panic!("unexpected outcome {other:?}"),
        }
    }
}
