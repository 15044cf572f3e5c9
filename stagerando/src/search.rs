pub mod bonded;
pub mod bounded;
pub mod explore;
pub mod relaxed;

use log::info;
use rand::rngs::StdRng;
use serde::Serialize;
use stagerando_game::MalformedData;
use stagerando_logic::{CommandMap, DigestOptions, Game, State};
use std::sync::Arc;

use crate::settings::{SearchStrategy, ValidationStep};

/// How a single search run ended. Running out of budget is not a failure of the
/// layout, only of the search.
#[derive(Debug, Clone)]
pub enum SearchOutcome {
    Win(Box<Game>),
    Loss,
    Withdrawal,
}

impl SearchOutcome {
    pub fn is_win(&self) -> bool {
        matches!(self, SearchOutcome::Win(_))
    }
}

/// A winning playthrough: the commands taken and where they led.
#[derive(Debug, Clone, Serialize)]
pub struct Solution {
    pub steps: usize,
    pub goals: Vec<String>,
    pub history: Vec<String>,
    pub state: State,
}

impl Solution {
    pub fn new(game: &Game) -> Self {
        Solution {
            steps: game.steps(),
            goals: game.achieved_goals.clone(),
            history: game.history.clone(),
            state: game.state.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub name: String,
    pub strategy: String,
    pub passed: bool,
    pub wins: usize,
    pub losses: usize,
    pub withdrawals: usize,
    pub solutions: Vec<Solution>,
}

impl ValidationReport {
    fn new(step: &ValidationStep) -> Self {
        ValidationReport {
            name: step.name.clone(),
            strategy: step.strategy.name().to_string(),
            ..Default::default()
        }
    }

    pub fn record(&mut self, outcome: SearchOutcome) {
        match outcome {
            SearchOutcome::Win(game) => {
                self.wins += 1;
                self.solutions.push(Solution::new(&game));
            }
            SearchOutcome::Loss => self.losses += 1,
            SearchOutcome::Withdrawal => self.withdrawals += 1,
        }
    }
}

fn digest_options(location_invariant: bool) -> DigestOptions {
    if location_invariant {
        DigestOptions::LOCATION_INVARIANT
    } else {
        DigestOptions::REVISIT
    }
}

/// Play one validation step against a command map.
///
/// Random exploration passes when it loses no more than the tolerated number of
/// trials; the other strategies pass when they find a win.
pub fn run_validation(
    step: &ValidationStep,
    commands: Arc<CommandMap>,
    rng: &mut StdRng,
) -> Result<ValidationReport, MalformedData> {
    let start = Game::new(
        commands,
        &step.start_room,
        &step.start_section,
        &step.abilities,
        step.goals.clone(),
    )?;
    let mut report = ValidationReport::new(step);
    match &step.strategy {
        SearchStrategy::RandomExploration {
            trials,
            cycle_limit,
            max_losses,
            location_invariant,
        } => {
            let outcomes = explore::run_trials(
                &start,
                *trials,
                *cycle_limit,
                digest_options(*location_invariant),
                rng,
            );
            for outcome in outcomes {
                report.record(outcome);
            }
            report.passed = report.losses <= *max_losses;
        }
        SearchStrategy::StrictBounded {
            max_steps,
            location_invariant,
        } => {
            let outcome =
                bounded::bounded_search(&start, *max_steps, digest_options(*location_invariant));
            report.record(outcome);
            report.passed = report.wins > 0;
        }
        SearchStrategy::RelaxedRandomized {
            max_steps,
            cycle_limit,
            decay_start,
            location_invariant,
        } => {
            let outcome = relaxed::relaxed_search(
                &start,
                *max_steps,
                *cycle_limit,
                *decay_start,
                digest_options(*location_invariant),
                rng,
            );
            report.record(outcome);
            report.passed = report.wins > 0;
        }
        SearchStrategy::ReflexiveBonded {
            cycle_limit,
            reflexive_depth,
            weights,
        } => {
            let outcome =
                bonded::bonded_search(&start, *cycle_limit, *reflexive_depth, weights);
            report.record(outcome);
            report.passed = report.wins > 0;
        }
    }
    info!(
        "{} ({}): {} wins, {} losses, {} withdrawals",
        report.name, report.strategy, report.wins, report.losses, report.withdrawals
    );
    Ok(report)
}
