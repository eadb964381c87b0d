//! In-memory host for tests and the headless harness.
//!
//! `SandboxHost` implements every host trait over plain public fields. It
//! records what the core asked of it (stages shown, notifications, camera
//! target) and can be told to fail specific calls or stages.

use std::collections::{HashMap, HashSet, VecDeque};

use enlist_events::{CampaignTime, CommanderId, MusterStage, TimeFlow, Vec2};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::host::{
    CameraTarget, CommanderLocator, CommanderStatus, EffectApplier, EncounterKind, EscortDriver,
    HostError, HostResult, MusterPresenter, Skill, WorldFacts,
};
use crate::muster::{LegacyPayPrompt, StageView};

/// A commander agent in the sandbox world.
#[derive(Debug, Clone, PartialEq)]
pub struct SandboxCommander {
    pub name: String,
    pub status: CommanderStatus,
    pub position: Vec2,
    pub army_leader: Option<CommanderId>,
    pub in_battle: bool,
    pub settlement: Option<String>,
}

impl SandboxCommander {
    pub fn new(name: impl Into<String>, position: Vec2) -> Self {
        Self {
            name: name.into(),
            status: CommanderStatus::Active,
            position,
            army_leader: None,
            in_battle: false,
            settlement: None,
        }
    }
}

/// Scriptable host.
#[derive(Debug)]
pub struct SandboxHost {
    pub time: CampaignTime,
    pub commanders: HashMap<CommanderId, SandboxCommander>,

    // Player
    pub player_position: Vec2,
    pub player_settlement: Option<String>,
    pub player_health: f32,
    pub player_gold: i32,
    pub player_visible: bool,
    pub player_active: bool,
    pub player_in_battle: bool,
    pub skills: HashMap<Skill, u32>,
    pub relation: i32,
    pub in_combat: bool,
    pub is_prisoner: bool,
    pub encounter: Option<EncounterKind>,
    pub in_conversation: bool,
    pub menu_open: bool,
    pub contraband_value: i32,
    pub equipment_quality: f32,
    pub commander_funds: i32,
    pub retinue_losses: u32,
    pub time_flow: TimeFlow,

    // Engine state set by the core
    pub escort_target: Option<CommanderId>,
    pub ignore_horizon: Option<f32>,
    pub auto_join: bool,
    pub camera: Option<CameraTarget>,
    pub entry_blocked: bool,
    pub menus_registered: bool,

    // Recorded calls
    pub shown_stages: Vec<MusterStage>,
    pub last_view: Option<StageView>,
    pub legacy_prompts: Vec<LegacyPayPrompt>,
    pub menu_closes: u32,
    pub notifications: Vec<String>,
    pub raised_events: Vec<String>,
    pub skill_xp: Vec<(Skill, u32)>,
    pub relation_changes: Vec<i32>,
    pub retinue_adjustments: Vec<i32>,
    pub tier_refreshes: Vec<u32>,
    pub quartermaster_visits: u32,
    pub escort_orders: u32,
    pub position_sets: u32,
    pub settlement_leaves: u32,

    /// Rolls returned before falling back to the seeded generator.
    pub scripted_rolls: VecDeque<f32>,
    rng: SmallRng,

    /// Calls (by trait method name) that fail until removed.
    pub failing_calls: HashSet<&'static str>,
    /// Stages whose `show_stage` fails.
    pub fail_stages: HashSet<MusterStage>,
}

impl SandboxHost {
    pub fn new(seed: u64) -> Self {
        Self {
            time: CampaignTime::new(1, 8),
            commanders: HashMap::new(),
            player_position: Vec2::ZERO,
            player_settlement: None,
            player_health: 1.0,
            player_gold: 100,
            player_visible: true,
            player_active: true,
            player_in_battle: false,
            skills: HashMap::new(),
            relation: 10,
            in_combat: false,
            is_prisoner: false,
            encounter: None,
            in_conversation: false,
            menu_open: false,
            contraband_value: 0,
            equipment_quality: 1.0,
            commander_funds: 10_000,
            retinue_losses: 0,
            time_flow: TimeFlow::Normal,
            escort_target: None,
            ignore_horizon: None,
            auto_join: false,
            camera: None,
            entry_blocked: false,
            menus_registered: false,
            shown_stages: Vec::new(),
            last_view: None,
            legacy_prompts: Vec::new(),
            menu_closes: 0,
            notifications: Vec::new(),
            raised_events: Vec::new(),
            skill_xp: Vec::new(),
            relation_changes: Vec::new(),
            retinue_adjustments: Vec::new(),
            tier_refreshes: Vec::new(),
            quartermaster_visits: 0,
            escort_orders: 0,
            position_sets: 0,
            settlement_leaves: 0,
            scripted_rolls: VecDeque::new(),
            rng: SmallRng::seed_from_u64(seed),
            failing_calls: HashSet::new(),
            fail_stages: HashSet::new(),
        }
    }

    /// Adds a commander and returns its id.
    pub fn add_commander(&mut self, id: &str, commander: SandboxCommander) -> CommanderId {
        let id = CommanderId::new(id);
        self.commanders.insert(id.clone(), commander);
        id
    }

    pub fn commander(&self, id: &CommanderId) -> Option<&SandboxCommander> {
        self.commanders.get(id)
    }

    pub fn commander_mut(&mut self, id: &CommanderId) -> Option<&mut SandboxCommander> {
        self.commanders.get_mut(id)
    }

    pub fn set_skill(&mut self, skill: Skill, value: u32) {
        self.skills.insert(skill, value);
    }

    /// Jumps to the start of `day`, keeping the hour.
    pub fn set_day(&mut self, day: u32) {
        self.time = CampaignTime::new(day, self.time.hour);
    }

    pub fn advance_hour(&mut self) {
        self.time.advance_hour();
    }

    /// Queues rolls to be returned in order.
    pub fn script_rolls(&mut self, rolls: impl IntoIterator<Item = f32>) {
        self.scripted_rolls.extend(rolls);
    }

    fn check(&self, call: &'static str) -> HostResult {
        if self.failing_calls.contains(call) {
            Err(HostError::call_failed(call, "injected failure"))
        } else {
            Ok(())
        }
    }
}

impl CommanderLocator for SandboxHost {
    fn commander_status(&self, id: &CommanderId) -> CommanderStatus {
        self.commanders
            .get(id)
            .map(|c| c.status)
            .unwrap_or(CommanderStatus::Missing)
    }

    fn commander_position(&self, id: &CommanderId) -> Option<Vec2> {
        self.commanders.get(id).map(|c| c.position)
    }

    fn army_leader(&self, id: &CommanderId) -> Option<CommanderId> {
        self.commanders.get(id).and_then(|c| c.army_leader.clone())
    }

    fn commander_in_battle(&self, id: &CommanderId) -> bool {
        self.commanders.get(id).is_some_and(|c| c.in_battle)
    }

    fn commander_settlement(&self, id: &CommanderId) -> Option<String> {
        self.commanders.get(id).and_then(|c| c.settlement.clone())
    }

    fn commander_name(&self, id: &CommanderId) -> String {
        self.commanders
            .get(id)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| id.to_string())
    }
}

impl EscortDriver for SandboxHost {
    fn set_escort_target(&mut self, target: Option<&CommanderId>) -> HostResult {
        self.check("set_escort_target")?;
        self.escort_target = target.cloned();
        self.escort_orders += 1;
        Ok(())
    }

    fn set_player_visible(&mut self, visible: bool) -> HostResult {
        self.check("set_player_visible")?;
        self.player_visible = visible;
        Ok(())
    }

    fn set_player_active(&mut self, active: bool) -> HostResult {
        self.check("set_player_active")?;
        self.player_active = active;
        Ok(())
    }

    fn set_player_position(&mut self, position: Vec2) -> HostResult {
        self.check("set_player_position")?;
        self.player_position = position;
        self.position_sets += 1;
        Ok(())
    }

    fn set_ignore_horizon(&mut self, seconds: Option<f32>) -> HostResult {
        self.check("set_ignore_horizon")?;
        self.ignore_horizon = seconds;
        Ok(())
    }

    fn set_auto_join_battles(&mut self, enabled: bool) -> HostResult {
        self.check("set_auto_join_battles")?;
        self.auto_join = enabled;
        Ok(())
    }

    fn set_camera_follow(&mut self, target: CameraTarget) -> HostResult {
        self.check("set_camera_follow")?;
        self.camera = Some(target);
        Ok(())
    }

    fn set_settlement_entry_blocked(&mut self, blocked: bool) -> HostResult {
        self.check("set_settlement_entry_blocked")?;
        self.entry_blocked = blocked;
        Ok(())
    }

    fn leave_settlement(&mut self) -> HostResult {
        self.check("leave_settlement")?;
        self.player_settlement = None;
        self.settlement_leaves += 1;
        Ok(())
    }

    fn player_in_battle(&self) -> bool {
        self.player_in_battle
    }
}

impl WorldFacts for SandboxHost {
    fn now(&self) -> CampaignTime {
        self.time
    }

    fn player_position(&self) -> Vec2 {
        self.player_position
    }

    fn player_settlement(&self) -> Option<String> {
        self.player_settlement.clone()
    }

    fn player_health(&self) -> f32 {
        self.player_health
    }

    fn player_gold(&self) -> i32 {
        self.player_gold
    }

    fn skill(&self, skill: Skill) -> u32 {
        self.skills.get(&skill).copied().unwrap_or(0)
    }

    fn relation_with_commander(&self) -> i32 {
        self.relation
    }

    fn in_combat(&self) -> bool {
        self.in_combat
    }

    fn is_prisoner(&self) -> bool {
        self.is_prisoner
    }

    fn active_encounter(&self) -> Option<EncounterKind> {
        self.encounter
    }

    fn in_conversation(&self) -> bool {
        self.in_conversation
    }

    fn menu_open(&self) -> bool {
        self.menu_open
    }

    fn contraband_value(&self) -> i32 {
        self.contraband_value
    }

    fn equipment_quality(&self) -> f32 {
        self.equipment_quality
    }

    fn commander_funds(&self) -> i32 {
        self.commander_funds
    }

    fn retinue_losses(&self) -> u32 {
        self.retinue_losses
    }

    fn time_flow(&self) -> TimeFlow {
        self.time_flow
    }

    fn roll(&mut self) -> f32 {
        self.scripted_rolls
            .pop_front()
            .unwrap_or_else(|| self.rng.gen::<f32>())
    }
}

impl EffectApplier for SandboxHost {
    fn give_gold(&mut self, amount: i32) -> HostResult {
        self.check("give_gold")?;
        self.player_gold += amount;
        if amount > 0 {
            self.commander_funds = (self.commander_funds - amount).max(0);
        }
        Ok(())
    }

    fn change_relation(&mut self, delta: i32) -> HostResult {
        self.check("change_relation")?;
        self.relation += delta;
        self.relation_changes.push(delta);
        Ok(())
    }

    fn add_skill_xp(&mut self, skill: Skill, amount: u32) -> HostResult {
        self.check("add_skill_xp")?;
        self.skill_xp.push((skill, amount));
        Ok(())
    }

    fn remove_contraband(&mut self) -> HostResult {
        self.check("remove_contraband")?;
        self.contraband_value = 0;
        Ok(())
    }

    fn adjust_retinue(&mut self, delta: i32) -> HostResult {
        self.check("adjust_retinue")?;
        self.retinue_adjustments.push(delta);
        if delta > 0 {
            self.retinue_losses = self.retinue_losses.saturating_sub(delta as u32);
        }
        Ok(())
    }

    fn raise_event(&mut self, event_id: &str) -> HostResult {
        self.check("raise_event")?;
        self.raised_events.push(event_id.to_string());
        Ok(())
    }

    fn refresh_tier_resources(&mut self, tier: u32) -> HostResult {
        self.check("refresh_tier_resources")?;
        self.tier_refreshes.push(tier);
        Ok(())
    }

    fn set_time_flow(&mut self, flow: TimeFlow) -> HostResult {
        self.check("set_time_flow")?;
        self.time_flow = flow;
        Ok(())
    }

    fn open_quartermaster(&mut self) -> HostResult {
        self.check("open_quartermaster")?;
        self.quartermaster_visits += 1;
        Ok(())
    }
}

impl MusterPresenter for SandboxHost {
    fn register_stage_menus(&mut self) -> HostResult {
        self.check("register_stage_menus")?;
        self.menus_registered = true;
        Ok(())
    }

    fn show_stage(&mut self, view: &StageView) -> HostResult {
        self.check("show_stage")?;
        if self.fail_stages.contains(&view.stage) {
            return Err(HostError::MissingMenu(view.stage));
        }
        self.shown_stages.push(view.stage);
        self.last_view = Some(view.clone());
        Ok(())
    }

    fn show_legacy_pay_prompt(&mut self, prompt: &LegacyPayPrompt) -> HostResult {
        self.check("show_legacy_pay_prompt")?;
        self.legacy_prompts.push(prompt.clone());
        Ok(())
    }

    fn close_muster_menu(&mut self) -> HostResult {
        self.check("close_muster_menu")?;
        self.menu_closes += 1;
        Ok(())
    }

    fn notify(&mut self, message: &str) -> HostResult {
        self.check("notify")?;
        self.notifications.push(message.to_string());
        Ok(())
    }
}
