//! Enlistment campaign harness
//!
//! Plays a scripted campaign against the sandbox host and writes muster
//! outcome records as JSON Lines.

use std::path::PathBuf;

use clap::Parser;
use enlist_core::{default_config_toml, EnlistConfig, MemorySaveStore};
use enlist_harness::{Campaign, CampaignOptions, HarnessError, RecordWriter};
use tracing::{error, info};

/// Command line arguments for the harness
#[derive(Parser, Debug)]
#[command(name = "enlist-harness")]
#[command(about = "Runs a headless enlistment campaign")]
struct Args {
    /// Random seed for reproducibility
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Number of campaign days to simulate
    #[arg(long, default_value_t = 60)]
    days: u32,

    /// Frame ticks per campaign hour
    #[arg(long, default_value_t = 4)]
    frames_per_hour: u32,

    /// Chance per hour of a battle breaking out
    #[arg(long, default_value_t = 0.01)]
    battle_chance: f32,

    /// Chance per hour of the commander entering a town
    #[arg(long, default_value_t = 0.02)]
    settlement_chance: f32,

    /// Chance per battle of the commander being captured
    #[arg(long, default_value_t = 0.0)]
    capture_chance: f32,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Muster records output (JSON Lines)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Resume from this save file before running
    #[arg(long)]
    resume: Option<PathBuf>,

    /// Write a save file after the run
    #[arg(long)]
    save: Option<PathBuf>,

    /// Print the default configuration and exit
    #[arg(long)]
    print_default_config: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    if args.print_default_config {
        print!("{}", default_config_toml());
        return;
    }

    if let Err(e) = run(args) {
        error!(error = %e, "Campaign failed");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), HarnessError> {
    let config = match &args.config {
        Some(path) => EnlistConfig::from_file(path)?,
        None => EnlistConfig::default(),
    };
    info!(
        seed = args.seed,
        days = args.days,
        interval_days = config.muster.interval_days,
        "Starting campaign"
    );

    let mut campaign = Campaign::new(CampaignOptions {
        seed: args.seed,
        days: args.days,
        frames_per_hour: args.frames_per_hour,
        battle_chance: args.battle_chance,
        settlement_chance: args.settlement_chance,
        capture_chance: args.capture_chance,
        config,
    })?;

    if let Some(path) = &args.resume {
        let store = MemorySaveStore::read_file(path)?;
        campaign.resume_from(&store)?;
    }

    let mut writer = args.output.as_deref().map(RecordWriter::new).transpose()?;
    let report = campaign.run(writer.as_mut())?;

    if let Some(writer) = &writer {
        info!(
            path = %writer.path().display(),
            records = writer.records_written(),
            "Muster records written"
        );
    }
    if let Some(path) = &args.save {
        campaign.save_to(path)?;
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
