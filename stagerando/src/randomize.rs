use anyhow::{bail, Result};
use log::{info, warn};
use rand::rngs::StdRng;
use rand::RngCore;
use serde::Serialize;
use stagerando_game::{Changes, MalformedData, RoomLibrary, RoomName, SeedLayout, StageData};
use stagerando_logic::CommandMap;
use std::sync::Arc;

use crate::generate::{generate, layout_digest, GenerationError};
use crate::make_rng;
use crate::search::{run_validation, ValidationReport};
use crate::settings::RandomizerSettings;
use crate::validate::validate_connectivity;

#[derive(Clone, Debug, Serialize)]
pub struct Layout {
    pub stage: String,
    pub seed: u64,
    pub attempt: usize,
    pub digest: String,
    pub changes: Changes,
}

#[derive(Clone, Debug, Serialize)]
pub struct Randomization {
    pub layout: Layout,
    pub reports: Vec<ValidationReport>,
}

pub struct Randomizer<'a> {
    pub stage_data: &'a StageData,
    pub seed_layout: &'a SeedLayout,
    pub settings: &'a RandomizerSettings,
    library: RoomLibrary,
}

impl<'a> Randomizer<'a> {
    pub fn new(
        stage_data: &'a StageData,
        seed_layout: &'a SeedLayout,
        settings: &'a RandomizerSettings,
    ) -> Result<Randomizer<'a>> {
        let library = stage_data.room_library()?;
        Ok(Randomizer {
            stage_data,
            seed_layout,
            settings,
            library,
        })
    }

    /// One attempt at laying out `stage`: place the rooms, check the layout and
    /// play every validation step on it. The same seed always gives the same
    /// layout.
    pub fn randomize(
        &self,
        stage: &str,
        attempt_num: usize,
        seed: u64,
        rng: &mut StdRng,
    ) -> Result<Randomization> {
        let clusters = self.seed_layout.clusters(stage)?;
        let room_set = match generate(&self.library, clusters, rng) {
            Ok(room_set) => room_set,
            Err(GenerationError::Malformed(e)) => return Err(e.into()),
            Err(GenerationError::Failure(e)) => return Err(e.into()),
        };
        let excluded = &self.settings.generation.excluded_rooms;
        let expected: Vec<RoomName> = self
            .library
            .stage_rooms(stage)
            .into_iter()
            .filter(|r| !excluded.contains(r))
            .collect();
        if let Err(e) = validate_connectivity(&room_set, &expected, excluded) {
            warn!("[attempt {attempt_num}] Rejected layout: {e}");
            return Err(e.into());
        }

        let changes = room_set.changes();
        let digest = layout_digest(&changes)?;
        info!(
            "[attempt {attempt_num}] Placed {} rooms, layout {digest}",
            changes.len()
        );
        let commands = Arc::new(CommandMap::from_stage_data(self.stage_data, &changes)?);

        let mut reports = vec![];
        for step in &self.settings.validation {
            let report = run_validation(step, commands.clone(), rng)?;
            if !report.passed {
                warn!("[attempt {attempt_num}] Failed validation step {}", step.name);
                bail!("Validation step {} did not pass", step.name);
            }
            reports.push(report);
        }

        Ok(Randomization {
            layout: Layout {
                stage: stage.to_string(),
                seed,
                attempt: attempt_num,
                digest,
                changes,
            },
            reports,
        })
    }

    /// Retry attempts until one passes. Each failed attempt's RNG provides the
    /// seed of the next one. Malformed data is never retried.
    pub fn randomize_with_attempts(&self, stage: &str, root_seed: u64) -> Result<Randomization> {
        self.seed_layout.clusters(stage)?;
        let max_attempts = self.settings.generation.max_attempts;
        let mut seed = root_seed;
        for attempt_num in 1..=max_attempts {
            info!("Attempt {attempt_num}/{max_attempts}: Stage {stage}, seed={seed}");
            let mut rng = make_rng(seed);
            match self.randomize(stage, attempt_num, seed, &mut rng) {
                Ok(randomization) => return Ok(randomization),
                Err(e) if e.downcast_ref::<MalformedData>().is_some() => return Err(e),
                Err(e) => {
                    info!("Attempt {attempt_num}/{max_attempts}: Randomization failed: {e}");
                }
            }
            seed = rng.next_u64();
        }
        bail!("Exhausted randomization attempts");
    }
}
