//! Narrow interfaces onto the host simulation.
//!
//! The core never reaches into host types directly. An adapter over the host
//! engine implements these traits and is handed to
//! [`EnlistmentService::new`](crate::EnlistmentService::new). Every mutating
//! call returns a `Result`; callers decide at each call site whether a
//! failure matters.

use enlist_events::{CampaignTime, CommanderId, MusterStage, TimeFlow, Vec2};
use thiserror::Error;

use crate::muster::{LegacyPayPrompt, StageView};

/// Failure reported by a host adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("engine call '{call}' failed: {reason}")]
    CallFailed { call: &'static str, reason: String },
    #[error("agent not found: {0}")]
    AgentNotFound(String),
    #[error("presentation has no menu for stage '{0}'")]
    MissingMenu(MusterStage),
}

impl HostError {
    pub fn call_failed(call: &'static str, reason: impl Into<String>) -> Self {
        HostError::CallFailed {
            call,
            reason: reason.into(),
        }
    }
}

pub type HostResult<T = ()> = Result<T, HostError>;

/// Liveness of the commander as seen by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommanderStatus {
    Active,
    Dead,
    Captured,
    Disbanding,
    /// The host no longer knows the id.
    Missing,
}

/// Kind of encounter the player is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncounterKind {
    Settlement,
    Field,
}

/// Who the map camera should follow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraTarget {
    Party(CommanderId),
    Player,
}

/// Player skills consulted by option predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Skill {
    Leadership,
    Roguery,
    Trade,
    Charm,
}

/// Lookup of the commander agent.
pub trait CommanderLocator {
    fn commander_status(&self, id: &CommanderId) -> CommanderStatus;
    fn commander_position(&self, id: &CommanderId) -> Option<Vec2>;
    /// Leader of the army the commander is grouped into, if someone else.
    fn army_leader(&self, id: &CommanderId) -> Option<CommanderId>;
    fn commander_in_battle(&self, id: &CommanderId) -> bool;
    fn commander_settlement(&self, id: &CommanderId) -> Option<String>;
    fn commander_name(&self, id: &CommanderId) -> String;
}

/// Engine-level control of the player's party.
pub trait EscortDriver {
    fn set_escort_target(&mut self, target: Option<&CommanderId>) -> HostResult;
    fn set_player_visible(&mut self, visible: bool) -> HostResult;
    fn set_player_active(&mut self, active: bool) -> HostResult;
    fn set_player_position(&mut self, position: Vec2) -> HostResult;
    /// Other agents ignore the player for this many seconds; `None` clears it.
    fn set_ignore_horizon(&mut self, seconds: Option<f32>) -> HostResult;
    fn set_auto_join_battles(&mut self, enabled: bool) -> HostResult;
    fn set_camera_follow(&mut self, target: CameraTarget) -> HostResult;
    fn set_settlement_entry_blocked(&mut self, blocked: bool) -> HostResult;
    fn leave_settlement(&mut self) -> HostResult;
    fn player_in_battle(&self) -> bool;
}

/// Read-only facts about the world and the player.
pub trait WorldFacts {
    fn now(&self) -> CampaignTime;
    fn player_position(&self) -> Vec2;
    fn player_settlement(&self) -> Option<String>;
    /// Health as a fraction of maximum.
    fn player_health(&self) -> f32;
    fn player_gold(&self) -> i32;
    fn skill(&self, skill: Skill) -> u32;
    fn relation_with_commander(&self) -> i32;
    fn in_combat(&self) -> bool;
    fn is_prisoner(&self) -> bool;
    fn active_encounter(&self) -> Option<EncounterKind>;
    fn in_conversation(&self) -> bool;
    /// A host menu other than the muster's own is open.
    fn menu_open(&self) -> bool;
    /// Total value of contraband in the player's inventory.
    fn contraband_value(&self) -> i32;
    /// Equipment quality as a fraction of the tier's standard.
    fn equipment_quality(&self) -> f32;
    fn commander_funds(&self) -> i32;
    fn retinue_losses(&self) -> u32;
    fn time_flow(&self) -> TimeFlow;
    /// Uniform roll in `[0, 1)`.
    fn roll(&mut self) -> f32;
}

/// Side effects applied by muster options.
pub trait EffectApplier {
    /// Negative amounts take gold.
    fn give_gold(&mut self, amount: i32) -> HostResult;
    fn change_relation(&mut self, delta: i32) -> HostResult;
    fn add_skill_xp(&mut self, skill: Skill, amount: u32) -> HostResult;
    fn remove_contraband(&mut self) -> HostResult;
    fn adjust_retinue(&mut self, delta: i32) -> HostResult;
    fn raise_event(&mut self, event_id: &str) -> HostResult;
    /// Refreshes anything gated on tier (equipment lists, retinue caps).
    fn refresh_tier_resources(&mut self, tier: u32) -> HostResult;
    fn set_time_flow(&mut self, flow: TimeFlow) -> HostResult;
    fn open_quartermaster(&mut self) -> HostResult;
}

/// Rendering of muster stages.
pub trait MusterPresenter {
    fn register_stage_menus(&mut self) -> HostResult;
    fn show_stage(&mut self, view: &StageView) -> HostResult;
    fn show_legacy_pay_prompt(&mut self, prompt: &LegacyPayPrompt) -> HostResult;
    fn close_muster_menu(&mut self) -> HostResult;
    fn notify(&mut self, message: &str) -> HostResult;
}

/// Everything the core needs from the host.
pub trait Host: CommanderLocator + EscortDriver + WorldFacts + EffectApplier + MusterPresenter {}

impl<T> Host for T where
    T: CommanderLocator + EscortDriver + WorldFacts + EffectApplier + MusterPresenter
{
}
