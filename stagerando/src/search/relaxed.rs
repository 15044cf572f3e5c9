use hashbrown::HashMap;
use log::debug;
use rand::rngs::StdRng;
use rand::Rng;
use stagerando_logic::{DigestOptions, Game, StateDigest};

use super::SearchOutcome;

/// Chance of dropping the frontier node picked at `cycle`: 0 up to `decay_start`,
/// then growing linearly to 1 at `cycle_limit`.
pub fn drop_probability(cycle: usize, decay_start: usize, cycle_limit: usize) -> f64 {
    if cycle < decay_start {
        0.0
    } else if cycle_limit <= decay_start {
        1.0
    } else {
        ((cycle - decay_start) as f64 / (cycle_limit - decay_start) as f64).min(1.0)
    }
}

/// Breadth-first search over a frontier expanded in random order.
///
/// Gives up strict shortest paths for a bounded amount of work per cycle. Once
/// nodes have been dropped an empty frontier no longer proves a loss, so it is
/// reported as a withdrawal.
pub fn relaxed_search(
    start: &Game,
    max_steps: usize,
    cycle_limit: usize,
    decay_start: usize,
    options: DigestOptions,
    rng: &mut StdRng,
) -> SearchOutcome {
    if start.goal_reached() {
        return SearchOutcome::Win(Box::new(start.clone()));
    }
    let mut memo: HashMap<StateDigest, usize> = HashMap::new();
    memo.insert(start.digest(options), 0);
    let mut frontier: Vec<Game> = vec![start.clone()];
    let mut dropped = 0;

    for cycle in 0..cycle_limit {
        if frontier.is_empty() {
            debug!("[cycle {cycle}] Frontier empty, {dropped} nodes dropped");
            return exhausted(dropped);
        }
        let i = rng.gen_range(0..frontier.len());
        let game = frontier.swap_remove(i);
        let p = drop_probability(cycle, decay_start, cycle_limit);
        if p > 0.0 && rng.gen::<f64>() < p {
            dropped += 1;
            continue;
        }
        let step = game.steps();
        if step >= max_steps {
            continue;
        }
        for command in game.available_commands() {
            let next = game.apply(command);
            if next.goal_reached() {
                debug!("[cycle {cycle}] Goal reached after {} steps", next.steps());
                return SearchOutcome::Win(Box::new(next));
            }
            let digest = next.digest(options);
            if memo.get(&digest).is_some_and(|&d| d <= step + 1) {
                continue;
            }
            memo.insert(digest, step + 1);
            frontier.push(next);
        }
    }
    if frontier.is_empty() {
        return exhausted(dropped);
    }
    SearchOutcome::Withdrawal
}

fn exhausted(dropped: usize) -> SearchOutcome {
    if dropped > 0 {
        SearchOutcome::Withdrawal
    } else {
        SearchOutcome::Loss
    }
}
