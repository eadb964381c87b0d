//! Per-tick synchronisation of the player's party with the commander.
//!
//! While enlisted, the player's party is hidden, ignored by other agents and
//! tethered to the commander. The coordinator re-asserts that arrangement on
//! every frame tick and tears it down safely when the commander is lost.
//!
//! Every engine call is best effort: a failure is logged, counted and the
//! tick carries on. Only the commander's status decides whether attachment
//! survives.

use enlist_events::{CommanderId, EnlistmentState, Vec2};
use tracing::{debug, info, warn};

use crate::config::AttachmentConfig;
use crate::host::{CameraTarget, CommanderStatus, Host, HostResult};

/// Attachment lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttachmentPhase {
    #[default]
    Detached,
    /// Attachment requested; the next tick confirms it.
    Attaching,
    Tethered,
    /// Player shown next to the commander while the commander fights.
    BattleNudged,
}

/// Why attachment ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetachReason {
    CommanderDied,
    CommanderCaptured,
    CommanderDisbanded,
    CommanderMissing,
    /// Enlisted without a commander.
    InvariantBroken,
    LeaveRequested,
    Discharged,
    Deserted,
}

impl DetachReason {
    /// Notification shown to the player.
    pub fn message(self) -> &'static str {
        match self {
            DetachReason::CommanderDied => "Your commander has fallen. You are released from service.",
            DetachReason::CommanderCaptured => {
                "Your commander has been captured. You are released from service."
            }
            DetachReason::CommanderDisbanded => {
                "Your commander's party has disbanded. You are released from service."
            }
            DetachReason::CommanderMissing => {
                "Your commander can no longer be found. You are released from service."
            }
            DetachReason::InvariantBroken => "Your enlistment record was lost. You are released from service.",
            DetachReason::LeaveRequested => "You have left the army.",
            DetachReason::Discharged => "You have been honourably discharged.",
            DetachReason::Deserted => "You have deserted.",
        }
    }

    fn from_status(status: CommanderStatus) -> Option<Self> {
        match status {
            CommanderStatus::Active => None,
            CommanderStatus::Dead => Some(DetachReason::CommanderDied),
            CommanderStatus::Captured => Some(DetachReason::CommanderCaptured),
            CommanderStatus::Disbanding => Some(DetachReason::CommanderDisbanded),
            CommanderStatus::Missing => Some(DetachReason::CommanderMissing),
        }
    }
}

/// Player state captured at enlistment for restoration on leave.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreEnlistmentSnapshot {
    pub position: Vec2,
    pub gold: i32,
    pub day: u32,
}

/// Position correction toward the commander, or `None` inside the near
/// threshold.
///
/// The player is pulled toward a point `follow_offset` short of the
/// commander along the line between them. Far outside the recovery threshold
/// a gentler gain is used so long catch-ups do not snap.
pub fn tether_correction(
    player: Vec2,
    commander: Vec2,
    dt: f32,
    config: &AttachmentConfig,
) -> Option<Vec2> {
    let to = commander - player;
    let d2 = to.length_squared();
    if d2 <= config.near_threshold_sq {
        return None;
    }

    let gain = if d2 > config.recovery_threshold_sq {
        (dt * config.recovery_gain).min(1.0)
    } else {
        (dt * config.near_gain).min(1.0)
    };
    let target = commander - to.normalize_or_zero() * config.follow_offset;
    Some(player.lerp(target, gain))
}

/// Keeps the player's party attached to the commander.
#[derive(Debug)]
pub struct AttachmentCoordinator {
    config: AttachmentConfig,
    phase: AttachmentPhase,
    escort_timer: f32,
    camera_timer: f32,
    settle_remaining: f32,
    snapshot: Option<PreEnlistmentSnapshot>,
    holding_outside: bool,
    cosmetic_failures: u32,
    last_detach: Option<DetachReason>,
}

impl AttachmentCoordinator {
    pub fn new(config: AttachmentConfig) -> Self {
        Self {
            escort_timer: config.escort_refresh_secs,
            camera_timer: config.camera_refresh_secs,
            config,
            phase: AttachmentPhase::Detached,
            settle_remaining: 0.0,
            snapshot: None,
            holding_outside: false,
            cosmetic_failures: 0,
            last_detach: None,
        }
    }

    pub fn phase(&self) -> AttachmentPhase {
        self.phase
    }

    pub fn is_attached(&self) -> bool {
        self.phase != AttachmentPhase::Detached
    }

    pub fn snapshot(&self) -> Option<&PreEnlistmentSnapshot> {
        self.snapshot.as_ref()
    }

    /// Engine calls that failed since construction.
    pub fn cosmetic_failures(&self) -> u32 {
        self.cosmetic_failures
    }

    pub fn last_detach(&self) -> Option<DetachReason> {
        self.last_detach
    }

    pub fn is_settling(&self) -> bool {
        self.settle_remaining > 0.0
    }

    /// Starts attachment to `commander`, snapshotting the player first.
    pub fn begin_attachment<H: Host>(&mut self, host: &mut H, commander: &CommanderId) {
        self.snapshot = Some(PreEnlistmentSnapshot {
            position: host.player_position(),
            gold: host.player_gold(),
            day: host.now().day,
        });
        self.holding_outside = false;
        self.last_detach = None;
        self.reset_timers();
        self.apply_attach(host, commander);
        self.phase = AttachmentPhase::Attaching;
        info!(commander = %commander, "Attachment started");
    }

    /// Re-enters attachment after a save was loaded. Nothing cosmetic is
    /// touched until the settle countdown has run out.
    pub fn resume_after_load(&mut self) {
        self.phase = AttachmentPhase::Attaching;
        self.holding_outside = false;
        self.settle_remaining = self.config.settle_secs;
        self.reset_timers();
        debug!(settle_secs = self.config.settle_secs, "Attachment resuming after load");
    }

    /// Advances one frame. Returns the reason if attachment ended this tick;
    /// detachment has already been carried out when it does.
    pub fn tick<H: Host>(
        &mut self,
        host: &mut H,
        enlistment: &mut EnlistmentState,
        dt: f32,
    ) -> Option<DetachReason> {
        if self.phase == AttachmentPhase::Detached {
            return None;
        }
        if !enlistment.is_enlisted {
            self.safe_detach(host, enlistment, DetachReason::Discharged);
            return Some(DetachReason::Discharged);
        }
        let Some(commander) = enlistment.commander.clone() else {
            warn!("Enlisted without a commander; detaching");
            self.safe_detach(host, enlistment, DetachReason::InvariantBroken);
            return Some(DetachReason::InvariantBroken);
        };
        if let Some(reason) = DetachReason::from_status(host.commander_status(&commander)) {
            self.safe_detach(host, enlistment, reason);
            return Some(reason);
        }

        if self.settle_remaining > 0.0 {
            self.settle_remaining -= dt;
            return None;
        }

        match self.phase {
            AttachmentPhase::Attaching => {
                self.apply_attach(host, &commander);
                self.phase = AttachmentPhase::Tethered;
                debug!(commander = %commander, "Tethered");
                return None;
            }
            AttachmentPhase::BattleNudged => {
                if !host.commander_in_battle(&commander) {
                    let result = host.set_player_active(false);
                    self.best_effort("set_player_active", result);
                    let result = host.set_player_visible(false);
                    self.best_effort("set_player_visible", result);
                    self.settle_remaining = self.config.settle_secs;
                    self.phase = AttachmentPhase::Tethered;
                    debug!(commander = %commander, "Commander's battle ended; settling");
                }
                return None;
            }
            AttachmentPhase::Tethered | AttachmentPhase::Detached => {}
        }

        if host.commander_in_battle(&commander) {
            if !host.player_in_battle() {
                self.nudge_into_battle(host, &commander);
            }
            return None;
        }

        let result = host.set_player_visible(false);
        self.best_effort("set_player_visible", result);

        self.escort_timer += dt;
        if self.escort_timer >= self.config.escort_refresh_secs {
            self.escort_timer = 0.0;
            self.refresh_escort(host, &commander);
        }

        let commander_settlement = host.commander_settlement(&commander);
        self.update_settlement_hold(host, &commander, commander_settlement.as_deref());

        let busy = host.menu_open() || host.active_encounter().is_some();
        if !busy && commander_settlement.is_none() && host.player_settlement().is_none() {
            if let Some(target) = host.commander_position(&commander) {
                if let Some(corrected) =
                    tether_correction(host.player_position(), target, dt, &self.config)
                {
                    let result = host.set_player_position(corrected);
                    self.best_effort("set_player_position", result);
                }
            }
        }

        self.camera_timer += dt;
        if self.camera_timer >= self.config.camera_refresh_secs {
            self.camera_timer = 0.0;
            let focus = host.army_leader(&commander).unwrap_or_else(|| commander.clone());
            let result = host.set_camera_follow(CameraTarget::Party(focus));
            self.best_effort("set_camera_follow", result);
        }

        None
    }

    /// Releases the player from the commander and ends service.
    ///
    /// Every step runs even if earlier ones fail, so the player always ends
    /// up visible, active and in control of the camera.
    pub fn safe_detach<H: Host>(
        &mut self,
        host: &mut H,
        enlistment: &mut EnlistmentState,
        reason: DetachReason,
    ) {
        let result = host.set_escort_target(None);
        self.best_effort("set_escort_target", result);
        let result = host.set_auto_join_battles(false);
        self.best_effort("set_auto_join_battles", result);
        let result = host.set_settlement_entry_blocked(false);
        self.best_effort("set_settlement_entry_blocked", result);
        let result = host.set_player_active(true);
        self.best_effort("set_player_active", result);
        let result = host.set_player_visible(true);
        self.best_effort("set_player_visible", result);
        let result = host.set_ignore_horizon(None);
        self.best_effort("set_ignore_horizon", result);
        let result = host.set_camera_follow(CameraTarget::Player);
        self.best_effort("set_camera_follow", result);

        if reason == DetachReason::LeaveRequested {
            if let Some(snapshot) = self.snapshot {
                let result = host.set_player_position(snapshot.position);
                self.best_effort("set_player_position", result);
            }
        }

        let result = host.notify(reason.message());
        self.best_effort("notify", result);

        info!(
            reason = ?reason,
            commander = ?enlistment.commander.as_ref().map(|c| c.as_str()),
            "Detached from commander"
        );
        enlistment.discharge();
        self.phase = AttachmentPhase::Detached;
        self.snapshot = None;
        self.holding_outside = false;
        self.settle_remaining = 0.0;
        self.last_detach = Some(reason);
    }

    fn apply_attach<H: Host>(&mut self, host: &mut H, commander: &CommanderId) {
        self.refresh_escort(host, commander);
        let result = host.set_player_visible(false);
        self.best_effort("set_player_visible", result);
        let result = host.set_player_active(false);
        self.best_effort("set_player_active", result);
        let result = host.set_auto_join_battles(true);
        self.best_effort("set_auto_join_battles", result);
    }

    fn refresh_escort<H: Host>(&mut self, host: &mut H, commander: &CommanderId) {
        let result = host.set_escort_target(Some(commander));
        self.best_effort("set_escort_target", result);
        let result = host.set_ignore_horizon(Some(self.config.ignore_horizon_secs));
        self.best_effort("set_ignore_horizon", result);
    }

    fn nudge_into_battle<H: Host>(&mut self, host: &mut H, commander: &CommanderId) {
        let result = host.set_player_active(true);
        self.best_effort("set_player_active", result);
        let result = host.set_player_visible(true);
        self.best_effort("set_player_visible", result);
        if let Some(position) = host.commander_position(commander) {
            let beside = position + Vec2::new(self.config.battle_nudge_offset, 0.0);
            let result = host.set_player_position(beside);
            self.best_effort("set_player_position", result);
        }
        self.phase = AttachmentPhase::BattleNudged;
        info!(commander = %commander, "Commander in battle; player placed alongside");
    }

    fn update_settlement_hold<H: Host>(
        &mut self,
        host: &mut H,
        commander: &CommanderId,
        commander_settlement: Option<&str>,
    ) {
        let player_settlement = host.player_settlement();

        match (commander_settlement, player_settlement.as_deref()) {
            // Commander went in without us: wait at the gate
            (Some(_), None) => {
                if !self.holding_outside {
                    let result = host.set_settlement_entry_blocked(true);
                    self.best_effort("set_settlement_entry_blocked", result);
                    self.holding_outside = true;
                    debug!(commander = %commander, "Holding outside settlement");
                }
            }
            // Commander marched off while we are still inside
            (None, Some(_)) => {
                let result = host.leave_settlement();
                self.best_effort("leave_settlement", result);
                self.refresh_escort(host, commander);
                debug!(commander = %commander, "Commander left settlement; following");
            }
            (Some(theirs), Some(ours)) if theirs != ours => {
                let result = host.leave_settlement();
                self.best_effort("leave_settlement", result);
                self.refresh_escort(host, commander);
            }
            _ => {}
        }

        if commander_settlement.is_none() && self.holding_outside {
            let result = host.set_settlement_entry_blocked(false);
            self.best_effort("set_settlement_entry_blocked", result);
            self.holding_outside = false;
        }
    }

    fn reset_timers(&mut self) {
        // Both refreshes fire on the first tethered tick
        self.escort_timer = self.config.escort_refresh_secs;
        self.camera_timer = self.config.camera_refresh_secs;
    }

    fn best_effort(&mut self, call: &'static str, result: HostResult) {
        if let Err(e) = result {
            self.cosmetic_failures += 1;
            warn!(call, error = %e, "Engine call failed; continuing");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::{SandboxCommander, SandboxHost};

    const DT: f32 = 0.016;

    fn config() -> AttachmentConfig {
        AttachmentConfig::default()
    }

    fn enlisted_world() -> (SandboxHost, EnlistmentState, CommanderId) {
        let mut host = SandboxHost::new(7);
        let id = host.add_commander(
            "lord_derthert",
            SandboxCommander::new("Derthert", Vec2::new(10.0, 0.0)),
        );
        host.player_position = Vec2::new(0.0, 0.0);
        let mut enlistment = EnlistmentState::default();
        enlistment.enlist(id.clone(), 1);
        (host, enlistment, id)
    }

    fn tethered() -> (SandboxHost, EnlistmentState, AttachmentCoordinator, CommanderId) {
        let (mut host, mut enlistment, id) = enlisted_world();
        let mut coordinator = AttachmentCoordinator::new(config());
        coordinator.begin_attachment(&mut host, &id);
        assert_eq!(coordinator.tick(&mut host, &mut enlistment, DT), None);
        assert_eq!(coordinator.phase(), AttachmentPhase::Tethered);
        (host, enlistment, coordinator, id)
    }

    #[test]
    fn test_tether_idle_inside_near_threshold() {
        let cfg = config();
        let commander = Vec2::new(5.0, 5.0);
        assert_eq!(tether_correction(commander, commander, DT, &cfg), None);
        assert_eq!(
            tether_correction(Vec2::new(5.5, 5.0), commander, DT, &cfg),
            None
        );
        // Exactly on the threshold still counts as near
        assert_eq!(
            tether_correction(Vec2::new(5.6, 5.0), commander, 1.0, &cfg),
            None
        );
    }

    #[test]
    fn test_tether_uses_near_gain() {
        let cfg = config();
        let player = Vec2::new(0.0, 0.0);
        let commander = Vec2::new(1.0, 0.0);
        let moved = tether_correction(player, commander, 0.05, &cfg).unwrap();
        // target is 0.5 short of the commander; gain 0.05 * 8 = 0.4
        assert!((moved.x - 0.2).abs() < 1e-5);
        assert!(moved.y.abs() < 1e-5);
    }

    #[test]
    fn test_tether_uses_recovery_gain_when_far() {
        let cfg = config();
        let player = Vec2::new(0.0, 0.0);
        let commander = Vec2::new(10.0, 0.0);
        let moved = tether_correction(player, commander, 0.1, &cfg).unwrap();
        // gain 0.1 * 5 = 0.5 toward x = 9.5
        assert!((moved.x - 4.75).abs() < 1e-4);
    }

    #[test]
    fn test_tether_gain_clamped() {
        let cfg = config();
        let moved = tether_correction(Vec2::ZERO, Vec2::new(10.0, 0.0), 5.0, &cfg).unwrap();
        assert!((moved.x - 9.5).abs() < 1e-4);
        // Landing spot is inside the near threshold, so the next tick is idle
        assert_eq!(tether_correction(moved, Vec2::new(10.0, 0.0), 5.0, &cfg), None);
    }

    #[test]
    fn test_begin_attachment_hides_and_escorts() {
        let (mut host, _, id) = enlisted_world();
        let mut coordinator = AttachmentCoordinator::new(config());
        coordinator.begin_attachment(&mut host, &id);

        assert_eq!(coordinator.phase(), AttachmentPhase::Attaching);
        assert!(!host.player_visible);
        assert!(!host.player_active);
        assert!(host.auto_join);
        assert_eq!(host.escort_target, Some(id));
        assert_eq!(coordinator.snapshot().unwrap().position, Vec2::ZERO);
    }

    #[test]
    fn test_tethered_tick_moves_player_and_follows_camera() {
        let (mut host, mut enlistment, mut coordinator, id) = tethered();
        let before = host.player_position;
        coordinator.tick(&mut host, &mut enlistment, DT);

        assert!(host.player_position.x > before.x);
        assert_eq!(host.camera, Some(CameraTarget::Party(id)));
    }

    #[test]
    fn test_tethered_tick_idle_when_close() {
        let (mut host, mut enlistment, mut coordinator, _) = tethered();
        host.player_position = Vec2::new(9.7, 0.0);
        let sets_before = host.position_sets;
        for _ in 0..10 {
            coordinator.tick(&mut host, &mut enlistment, DT);
        }
        assert_eq!(host.position_sets, sets_before);
        assert_eq!(host.player_position, Vec2::new(9.7, 0.0));
    }

    #[test]
    fn test_camera_follows_army_leader() {
        let (mut host, mut enlistment, mut coordinator, id) = tethered();
        let leader = host.add_commander(
            "king_caladog",
            SandboxCommander::new("Caladog", Vec2::new(12.0, 0.0)),
        );
        host.commander_mut(&id).unwrap().army_leader = Some(leader.clone());

        coordinator.tick(&mut host, &mut enlistment, 1.0);
        assert_eq!(host.camera, Some(CameraTarget::Party(leader)));
    }

    #[test]
    fn test_no_tether_while_menu_open() {
        let (mut host, mut enlistment, mut coordinator, _) = tethered();
        host.menu_open = true;
        coordinator.tick(&mut host, &mut enlistment, DT);
        assert_eq!(host.player_position, Vec2::ZERO);
    }

    #[test]
    fn test_commander_death_detaches() {
        let (mut host, mut enlistment, mut coordinator, id) = tethered();
        host.commander_mut(&id).unwrap().status = CommanderStatus::Dead;

        let reason = coordinator.tick(&mut host, &mut enlistment, DT);
        assert_eq!(reason, Some(DetachReason::CommanderDied));
        assert_eq!(coordinator.phase(), AttachmentPhase::Detached);
        assert!(!enlistment.is_enlisted);
        assert!(host.player_visible);
        assert!(host.player_active);
        assert_eq!(host.escort_target, None);
        assert_eq!(host.ignore_horizon, None);
        assert_eq!(host.camera, Some(CameraTarget::Player));
        assert!(host.notifications.iter().any(|n| n.contains("fallen")));
    }

    #[test]
    fn test_missing_commander_detaches() {
        let (mut host, mut enlistment, mut coordinator, id) = tethered();
        host.commanders.remove(&id);

        assert_eq!(
            coordinator.tick(&mut host, &mut enlistment, DT),
            Some(DetachReason::CommanderMissing)
        );
    }

    #[test]
    fn test_broken_invariant_detaches() {
        let (mut host, mut enlistment, mut coordinator, _) = tethered();
        enlistment.commander = None;

        assert_eq!(
            coordinator.tick(&mut host, &mut enlistment, DT),
            Some(DetachReason::InvariantBroken)
        );
        assert!(!enlistment.is_enlisted);
    }

    #[test]
    fn test_battle_nudge_and_settle() {
        let (mut host, mut enlistment, mut coordinator, id) = tethered();
        host.commander_mut(&id).unwrap().in_battle = true;

        coordinator.tick(&mut host, &mut enlistment, DT);
        assert_eq!(coordinator.phase(), AttachmentPhase::BattleNudged);
        assert!(host.player_visible);
        assert!(host.player_active);
        assert!((host.player_position.x - 10.2).abs() < 1e-4);

        host.commander_mut(&id).unwrap().in_battle = false;
        coordinator.tick(&mut host, &mut enlistment, DT);
        assert_eq!(coordinator.phase(), AttachmentPhase::Tethered);
        assert!(!host.player_visible);
        assert!(coordinator.is_settling());

        // Camera untouched while settling
        host.camera = None;
        coordinator.tick(&mut host, &mut enlistment, 0.5);
        assert_eq!(host.camera, None);
        coordinator.tick(&mut host, &mut enlistment, 0.6);
        coordinator.tick(&mut host, &mut enlistment, 0.6);
        assert!(host.camera.is_some());
    }

    #[test]
    fn test_player_already_fighting_is_not_nudged() {
        let (mut host, mut enlistment, mut coordinator, id) = tethered();
        host.commander_mut(&id).unwrap().in_battle = true;
        host.player_in_battle = true;

        coordinator.tick(&mut host, &mut enlistment, DT);
        assert_eq!(coordinator.phase(), AttachmentPhase::Tethered);
    }

    #[test]
    fn test_settlement_hold_and_forced_leave() {
        let (mut host, mut enlistment, mut coordinator, id) = tethered();
        host.commander_mut(&id).unwrap().settlement = Some("pravend".into());

        coordinator.tick(&mut host, &mut enlistment, DT);
        assert!(host.entry_blocked);
        assert_eq!(host.player_position, Vec2::ZERO);

        host.commander_mut(&id).unwrap().settlement = None;
        coordinator.tick(&mut host, &mut enlistment, DT);
        assert!(!host.entry_blocked);

        host.player_settlement = Some("pravend".into());
        coordinator.tick(&mut host, &mut enlistment, DT);
        assert_eq!(host.settlement_leaves, 1);
        assert_eq!(host.player_settlement, None);
    }

    #[test]
    fn test_leave_restores_snapshot_position() {
        let (mut host, mut enlistment, mut coordinator, _) = tethered();
        host.player_position = Vec2::new(9.5, 0.0);

        coordinator.safe_detach(&mut host, &mut enlistment, DetachReason::LeaveRequested);
        assert_eq!(host.player_position, Vec2::ZERO);
        assert_eq!(coordinator.last_detach(), Some(DetachReason::LeaveRequested));
    }

    #[test]
    fn test_failing_engine_calls_are_counted_not_fatal() {
        let (mut host, mut enlistment, mut coordinator, _) = tethered();
        host.failing_calls.insert("set_player_visible");
        host.failing_calls.insert("set_camera_follow");

        assert_eq!(coordinator.tick(&mut host, &mut enlistment, 1.0), None);
        assert!(coordinator.cosmetic_failures() >= 2);
        assert_eq!(coordinator.phase(), AttachmentPhase::Tethered);
    }

    #[test]
    fn test_resume_after_load_waits_before_tethering() {
        let (mut host, mut enlistment, id) = enlisted_world();
        let mut coordinator = AttachmentCoordinator::new(config());
        coordinator.resume_after_load();

        coordinator.tick(&mut host, &mut enlistment, 0.5);
        assert_eq!(coordinator.phase(), AttachmentPhase::Attaching);
        assert_eq!(host.escort_target, None);

        coordinator.tick(&mut host, &mut enlistment, 0.6);
        coordinator.tick(&mut host, &mut enlistment, DT);
        assert_eq!(coordinator.phase(), AttachmentPhase::Tethered);
        assert_eq!(host.escort_target, Some(id));
    }
}
