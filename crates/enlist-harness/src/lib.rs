//! Headless campaign driver for the enlistment core.
//!
//! Runs an [`EnlistmentService`] against a [`SandboxHost`] for a number of
//! campaign days. The commander wanders, visits towns and fights the odd
//! battle, and every muster is played by picking the first available
//! option. Completed muster records can be streamed to a JSON Lines file.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use enlist_core::{
    CommanderStatus, ConfigError, EnlistConfig, EnlistError, EnlistmentService, MemorySaveStore,
    MusterOption, OptionResolution, PersistError, SandboxCommander, SandboxHost, TriggerOutcome,
    WorldFacts,
};
use enlist_events::{CommanderId, MusterOutcomeRecord, MusterStage, Vec2, HOURS_PER_DAY};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Harness failures.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("save error: {0}")]
    Persist(#[from] PersistError),
    #[error("enlistment error: {0}")]
    Enlist(#[from] EnlistError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// How a campaign is run.
#[derive(Debug, Clone)]
pub struct CampaignOptions {
    pub seed: u64,
    pub days: u32,
    /// Frame ticks simulated per campaign hour
    pub frames_per_hour: u32,
    /// Chance per hour that the commander is drawn into battle
    pub battle_chance: f32,
    /// Chance per hour that the commander enters a town
    pub settlement_chance: f32,
    /// Chance per battle that the commander is captured
    pub capture_chance: f32,
    pub config: EnlistConfig,
}

impl Default for CampaignOptions {
    fn default() -> Self {
        Self {
            seed: 42,
            days: 60,
            frames_per_hour: 4,
            battle_chance: 0.01,
            settlement_chance: 0.02,
            capture_chance: 0.0,
            config: EnlistConfig::default(),
        }
    }
}

/// Totals reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CampaignReport {
    pub seed: u64,
    pub days_run: u32,
    pub musters_completed: u32,
    pub legacy_musters: u32,
    pub deferred_triggers: u32,
    pub prisoner_skips: u32,
    pub battles: u32,
    pub town_visits: u32,
    pub final_tier: u32,
    pub final_gold: i32,
    pub still_enlisted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detach_reason: Option<String>,
}

/// Streams muster records as JSON Lines.
pub struct RecordWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    records_written: u64,
}

impl RecordWriter {
    /// Creates the file, and its parent directory if needed.
    pub fn new(path: &Path) -> Result<Self, HarnessError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            records_written: 0,
        })
    }

    pub fn write(&mut self, record: &MusterOutcomeRecord) -> Result<(), HarnessError> {
        writeln!(self.writer, "{}", record.to_jsonl()?)?;
        self.records_written += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), HarnessError> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A scripted campaign around one commander.
pub struct Campaign {
    options: CampaignOptions,
    service: EnlistmentService<SandboxHost>,
    commander: CommanderId,
    rng: SmallRng,
    battle_hours_left: u32,
    town_hours_left: u32,
    report: CampaignReport,
    records: Vec<MusterOutcomeRecord>,
}

impl Campaign {
    /// Sets up the world and enlists the player.
    pub fn new(options: CampaignOptions) -> Result<Self, HarnessError> {
        let mut host = SandboxHost::new(options.seed);
        let commander = host.add_commander(
            "lord_derthert",
            SandboxCommander::new("Derthert", Vec2::new(2.0, 1.0)),
        );
        let mut service = EnlistmentService::new(options.config.clone(), host);
        service.enlist(commander.clone())?;

        // World events draw from their own stream so the muster rolls made
        // through the host stay independent of them
        let rng = SmallRng::seed_from_u64(options.seed.wrapping_add(1));
        let report = CampaignReport {
            seed: options.seed,
            ..CampaignReport::default()
        };
        Ok(Self {
            options,
            service,
            commander,
            rng,
            battle_hours_left: 0,
            town_hours_left: 0,
            report,
            records: Vec::new(),
        })
    }

    /// Replaces the enlistment state with a saved one.
    pub fn resume_from(&mut self, store: &MemorySaveStore) -> Result<(), HarnessError> {
        self.service.on_load(store)?;
        info!(enlisted = self.service.is_enlisted(), "Campaign resumed from save");
        Ok(())
    }

    pub fn service(&self) -> &EnlistmentService<SandboxHost> {
        &self.service
    }

    pub fn records(&self) -> &[MusterOutcomeRecord] {
        &self.records
    }

    /// Runs every configured day, or until the player leaves service.
    pub fn run(
        &mut self,
        mut writer: Option<&mut RecordWriter>,
    ) -> Result<CampaignReport, HarnessError> {
        for day in 0..self.options.days {
            for _ in 0..HOURS_PER_DAY {
                for record in self.step_hour() {
                    if let Some(writer) = writer.as_deref_mut() {
                        writer.write(&record)?;
                    }
                    self.records.push(record);
                }
                if !self.service.is_enlisted() {
                    break;
                }
            }
            self.report.days_run = day + 1;
            if !self.service.is_enlisted() {
                info!(day = self.service.host().now().day, "Service ended; stopping");
                break;
            }
            self.end_of_day();
        }

        if let Some(writer) = writer {
            writer.flush()?;
        }
        Ok(self.finish_report())
    }

    /// Writes the current state to a save file.
    pub fn save_to(&self, path: &Path) -> Result<(), HarnessError> {
        let mut store = MemorySaveStore::new();
        self.service.on_save(&mut store)?;
        store.write_file(path)?;
        info!(path = %path.display(), keys = store.len(), "Campaign saved");
        Ok(())
    }

    /// One campaign hour: world events, the hourly trigger check, frame
    /// ticks and whatever muster choices are on screen.
    pub fn step_hour(&mut self) -> Vec<MusterOutcomeRecord> {
        self.service.host_mut().advance_hour();
        self.world_events();

        if let Some(outcome) = self.service.on_hourly_tick() {
            debug!(outcome = ?outcome, "Muster trigger");
            match outcome {
                TriggerOutcome::Deferred(_) => self.report.deferred_triggers += 1,
                TriggerOutcome::SkippedAsPrisoner => self.report.prisoner_skips += 1,
                TriggerOutcome::Began(_) | TriggerOutcome::Blocked(_) => {}
            }
        }

        let mut completed = Vec::new();
        let dt = 1.0 / self.options.frames_per_hour.max(1) as f32;
        for _ in 0..self.options.frames_per_hour.max(1) {
            self.service.on_frame_tick(dt);
            if let Some(record) = self.play_muster() {
                completed.push(record);
            }
            self.settle_legacy_prompt();
        }
        completed
    }

    /// Picks options until the muster on screen ends.
    fn play_muster(&mut self) -> Option<MusterOutcomeRecord> {
        for _ in 0..=MusterStage::ALL.len() {
            let view = self.service.current_options()?;
            let option = view
                .available()
                .find(|option| !leaves_service(*option))
                .or_else(|| view.first_available())?;
            match self.service.choose_option(option) {
                Ok(OptionResolution::Completed(record)) => {
                    self.report.musters_completed += 1;
                    info!(
                        muster_day = record.muster_day,
                        visited = record.stages_visited.len(),
                        "Muster recorded"
                    );
                    return Some(*record);
                }
                Ok(OptionResolution::Advanced(_)) => {}
                Ok(OptionResolution::Aborted) => return None,
                Err(err) => {
                    warn!(code = err.code(), error = %err, "Scripted choice rejected");
                    return None;
                }
            }
        }
        None
    }

    fn settle_legacy_prompt(&mut self) {
        if self.service.controller().legacy_prompt().is_none() {
            return;
        }
        match self.service.resolve_legacy_pay() {
            Ok(paid) => {
                self.report.legacy_musters += 1;
                debug!(paid, "Legacy muster settled");
            }
            Err(err) => warn!(code = err.code(), error = %err, "Legacy muster not settled"),
        }
    }

    fn world_events(&mut self) {
        let step = Vec2::new(
            self.rng.gen_range(-0.5..0.5),
            self.rng.gen_range(-0.5..0.5),
        );
        let idle = self.battle_hours_left == 0 && self.town_hours_left == 0;
        let starts_battle = idle && self.rng.gen::<f32>() < self.options.battle_chance;
        let enters_town =
            idle && !starts_battle && self.rng.gen::<f32>() < self.options.settlement_chance;
        let captured = starts_battle && self.rng.gen::<f32>() < self.options.capture_chance;
        let stay = self.rng.gen_range(1..4);

        if starts_battle {
            self.battle_hours_left = stay;
            self.report.battles += 1;
            info!(hours = stay, "Commander drawn into battle");
        }
        if enters_town {
            self.town_hours_left = stay;
            self.report.town_visits += 1;
            debug!(hours = stay, "Commander enters town");
        }
        let in_battle = self.battle_hours_left > 0;
        let in_town = self.town_hours_left > 0;
        self.battle_hours_left = self.battle_hours_left.saturating_sub(1);
        self.town_hours_left = self.town_hours_left.saturating_sub(1);

        let host = self.service.host_mut();
        host.in_combat = in_battle;
        if let Some(commander) = host.commander_mut(&self.commander) {
            commander.in_battle = in_battle;
            commander.settlement = in_town.then(|| "pravend".to_string());
            if captured {
                commander.status = CommanderStatus::Captured;
                info!("Commander captured in battle");
            }
            if !in_battle && !in_town {
                commander.position = commander.position + step;
            }
        }
    }

    fn end_of_day(&mut self) {
        let xp = self.rng.gen_range(20..80);
        let contraband = if self.rng.gen::<f32>() < 0.2 {
            self.rng.gen_range(20..120)
        } else {
            0
        };
        self.service.host_mut().contraband_value = contraband;
        if let Some(tier) = self.service.award_xp(xp) {
            info!(tier, "Promotion during campaign");
        }
    }

    fn finish_report(&self) -> CampaignReport {
        let mut report = self.report.clone();
        report.final_tier = self.service.enlistment().tier;
        report.final_gold = self.service.host().player_gold;
        report.still_enlisted = self.service.is_enlisted();
        report.detach_reason = self
            .service
            .coordinator()
            .last_detach()
            .map(|reason| format!("{:?}", reason));
        report
    }
}

fn leaves_service(option: MusterOption) -> bool {
    matches!(
        option,
        MusterOption::RequestFinalDischarge
            | MusterOption::Desert
            | MusterOption::FinishAndRequestLeave
    )
}
