use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use rand::{RngCore, SeedableRng};
use stagerando::randomize::Randomizer;
use stagerando::settings::RandomizerSettings;
use stagerando_game::{SeedLayout, StageData};
use std::path::PathBuf;

#[derive(Parser)]
struct Args {
    #[arg(long)]
    stage_data: PathBuf,

    #[arg(long)]
    seed_layout: PathBuf,

    #[arg(long)]
    settings: Option<PathBuf>,

    #[arg(long)]
    stage: String,

    #[arg(long)]
    random_seed: Option<u64>,

    #[arg(long)]
    max_attempts: Option<usize>,

    #[arg(long)]
    output_changes: Option<PathBuf>,

    #[arg(long)]
    output_report: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = Args::parse();
    let stage_data = StageData::load(&args.stage_data)?;
    let seed_layout = SeedLayout::load(&args.seed_layout)?;
    let mut settings = match &args.settings {
        Some(path) => RandomizerSettings::load(path)?,
        None => RandomizerSettings::default(),
    };
    if let Some(max_attempts) = args.max_attempts {
        settings.generation.max_attempts = max_attempts;
    }
    info!(
        "Settings: {}, {} validation steps",
        settings.name.as_deref().unwrap_or("unnamed"),
        settings.validation.len()
    );

    let root_seed = match args.random_seed {
        Some(s) => s,
        None => rand::rngs::StdRng::from_entropy().next_u64() & 0xFFFFFFFF,
    };
    let randomizer = Randomizer::new(&stage_data, &seed_layout, &settings)?;
    let randomization = randomizer.randomize_with_attempts(&args.stage, root_seed)?;
    info!(
        "Layout {} found on attempt {} (seed {})",
        randomization.layout.digest, randomization.layout.attempt, randomization.layout.seed
    );

    if let Some(output_changes) = &args.output_changes {
        let changes_str = serde_json::to_string_pretty(&randomization.layout.changes)?;
        std::fs::write(output_changes, changes_str)
            .with_context(|| format!("Unable to write changes to {}", output_changes.display()))?;
        info!("Wrote changes to {}", output_changes.display());
    }
    if let Some(output_report) = &args.output_report {
        let report_str = serde_json::to_string_pretty(&randomization)?;
        std::fs::write(output_report, report_str)
            .with_context(|| format!("Unable to write report to {}", output_report.display()))?;
        info!("Wrote report to {}", output_report.display());
    }
    Ok(())
}
