//! The enlistment service: one value owning all enlistment state.
//!
//! The host is injected at construction and owned for the service's
//! lifetime. The host clock drives the service through
//! [`EnlistmentService::on_frame_tick`] and
//! [`EnlistmentService::on_hourly_tick`]; the presentation layer calls
//! [`EnlistmentService::choose_option`] when the player picks an option.

use enlist_events::{CommanderId, EnlistmentState, FollowOnAction, MusterOutcomeRecord};
use tracing::{debug, info, warn};

use crate::attachment::{AttachmentCoordinator, DetachReason};
use crate::config::EnlistConfig;
use crate::error::{EnlistError, MusterError};
use crate::host::{CommanderStatus, Host};
use crate::muster::{
    BeginOutcome, MusterContext, MusterOption, MusterSequenceController, OptionResolution,
    StageView, TriggerOutcome,
};
use crate::persistence::{self, PersistError, SaveStore};
use crate::promotion;
use crate::tasks::{DeferredTask, DeferredTaskQueue};

/// Enlistment state plus the logic that keeps it running.
pub struct EnlistmentService<H: Host> {
    config: EnlistConfig,
    host: H,
    enlistment: EnlistmentState,
    coordinator: AttachmentCoordinator,
    controller: MusterSequenceController,
    tasks: DeferredTaskQueue,
}

impl<H: Host> EnlistmentService<H> {
    /// Creates the service and registers muster presentation with the host.
    /// A registration failure is logged and leaves the controller in legacy
    /// mode.
    pub fn new(config: EnlistConfig, mut host: H) -> Self {
        let mut controller = MusterSequenceController::new(&config);
        // Logged by the controller; legacy mode is the recovery
        let _ = controller.register_presentation(&mut host);

        Self {
            coordinator: AttachmentCoordinator::new(config.attachment.clone()),
            controller,
            config,
            host,
            enlistment: EnlistmentState::default(),
            tasks: DeferredTaskQueue::new(),
        }
    }

    pub fn config(&self) -> &EnlistConfig {
        &self.config
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn enlistment(&self) -> &EnlistmentState {
        &self.enlistment
    }

    pub fn controller(&self) -> &MusterSequenceController {
        &self.controller
    }

    pub fn coordinator(&self) -> &AttachmentCoordinator {
        &self.coordinator
    }

    pub fn tasks(&self) -> &DeferredTaskQueue {
        &self.tasks
    }

    pub fn is_enlisted(&self) -> bool {
        self.enlistment.is_enlisted
    }

    pub fn commander(&self) -> Option<&CommanderId> {
        self.enlistment.commander.as_ref()
    }

    /// Joins `commander`'s party.
    pub fn enlist(&mut self, commander: CommanderId) -> Result<(), EnlistError> {
        if let Some(current) = self.enlistment.commander.as_ref().filter(|_| self.is_enlisted()) {
            return Err(EnlistError::AlreadyEnlisted(current.clone()));
        }
        if self.host.commander_status(&commander) != CommanderStatus::Active {
            return Err(EnlistError::CommanderUnavailable(commander));
        }

        let day = self.host.now().day;
        self.enlistment.enlist(commander.clone(), day);
        self.coordinator.begin_attachment(&mut self.host, &commander);
        info!(commander = %commander, day, "Enlisted");
        Ok(())
    }

    /// Leaves service voluntarily, abandoning any muster in progress.
    pub fn leave_army(&mut self) -> Result<(), EnlistError> {
        if !self.is_enlisted() {
            return Err(EnlistError::NotEnlisted);
        }
        self.end_service(DetachReason::LeaveRequested);
        Ok(())
    }

    /// Per-frame entry point: runs deferred work, then the attachment tick.
    pub fn on_frame_tick(&mut self, dt: f32) {
        let Self {
            host,
            enlistment,
            coordinator,
            controller,
            tasks,
            ..
        } = self;

        for task in tasks.drain_ready(dt) {
            match task {
                DeferredTask::ActivateStage(stage) => {
                    let mut ctx = MusterContext::new(&mut *host, &mut *enlistment, &mut *tasks);
                    controller.switch_to_stage(&mut ctx, stage);
                }
                DeferredTask::ResumeStage(stage) => {
                    let mut ctx = MusterContext::new(&mut *host, &mut *enlistment, &mut *tasks);
                    controller.resume_stage(&mut ctx, stage);
                }
                DeferredTask::FollowOn(action) => {
                    run_follow_on(action, host, enlistment, coordinator, controller, tasks);
                }
                DeferredTask::RaiseEvent(event_id) => {
                    if let Err(e) = host.raise_event(&event_id) {
                        warn!(event = %event_id, error = %e, "Escalation event not raised");
                    }
                }
            }
        }

        if let Some(reason) = coordinator.tick(host, enlistment, dt) {
            info!(reason = ?reason, "Service ended by attachment");
            let mut ctx = MusterContext::new(&mut *host, &mut *enlistment, &mut *tasks);
            controller.abort_for_detachment(&mut ctx);
        }
    }

    /// Hourly calendar entry point.
    pub fn on_hourly_tick(&mut self) -> Option<TriggerOutcome> {
        let mut ctx = MusterContext::new(&mut self.host, &mut self.enlistment, &mut self.tasks);
        self.controller.on_hourly_tick(&mut ctx)
    }

    /// Starts or resumes the muster now.
    pub fn begin_muster_sequence(&mut self) -> BeginOutcome {
        let mut ctx = MusterContext::new(&mut self.host, &mut self.enlistment, &mut self.tasks);
        self.controller.begin_muster_sequence(&mut ctx)
    }

    pub fn choose_option(&mut self, option: MusterOption) -> Result<OptionResolution, MusterError> {
        let mut ctx = MusterContext::new(&mut self.host, &mut self.enlistment, &mut self.tasks);
        self.controller.choose_option(&mut ctx, option)
    }

    /// The stage on screen with availability re-evaluated now.
    pub fn current_options(&self) -> Option<StageView> {
        self.controller.current_view(&self.host, &self.enlistment)
    }

    pub fn resolve_legacy_pay(&mut self) -> Result<i32, MusterError> {
        let mut ctx = MusterContext::new(&mut self.host, &mut self.enlistment, &mut self.tasks);
        self.controller.resolve_legacy_pay(&mut ctx)
    }

    /// Adds XP, promoting when a tier threshold is crossed.
    pub fn award_xp(&mut self, amount: u32) -> Option<u32> {
        if !self.is_enlisted() {
            return None;
        }
        let day = self.host.now().day;
        let promoted =
            promotion::apply_xp(&mut self.enlistment, amount, day, &self.config.promotion);
        if let Some(tier) = promoted {
            let message = format!("You have been promoted to tier {}.", tier);
            if let Err(e) = self.host.notify(&message) {
                warn!(error = %e, "Promotion notice not shown");
            }
        }
        promoted
    }

    pub fn last_record(&self) -> Option<&MusterOutcomeRecord> {
        self.controller.last_record()
    }

    /// Writes enlistment status and any muster in progress.
    pub fn on_save<S: SaveStore + ?Sized>(&self, store: &mut S) -> Result<(), PersistError> {
        persistence::save_enlistment(&self.enlistment, store)?;
        self.controller.save(store)?;
        debug!(enlisted = self.enlistment.is_enlisted, "Enlistment saved");
        Ok(())
    }

    /// Replaces all state from a save. Attachment resumes after the settle
    /// countdown; a saved muster resumes at the next trigger check.
    pub fn on_load<S: SaveStore + ?Sized>(&mut self, store: &S) -> Result<(), PersistError> {
        self.enlistment = persistence::load_enlistment(store)?;
        self.tasks = DeferredTaskQueue::new();
        self.coordinator = AttachmentCoordinator::new(self.config.attachment.clone());
        if self.enlistment.is_enlisted {
            self.coordinator.resume_after_load();
        }

        if let Err(err) = self.controller.load(store, self.enlistment.is_enlisted) {
            debug!(code = err.code(), "Fresh muster deferred after load");
        }
        info!(enlisted = self.enlistment.is_enlisted, "Enlistment loaded");
        Ok(())
    }

    fn end_service(&mut self, reason: DetachReason) {
        let mut ctx = MusterContext::new(&mut self.host, &mut self.enlistment, &mut self.tasks);
        self.controller.abort_for_detachment(&mut ctx);
        self.coordinator
            .safe_detach(&mut self.host, &mut self.enlistment, reason);
    }
}

fn run_follow_on<H: Host>(
    action: FollowOnAction,
    host: &mut H,
    enlistment: &mut EnlistmentState,
    coordinator: &mut AttachmentCoordinator,
    controller: &mut MusterSequenceController,
    tasks: &mut DeferredTaskQueue,
) {
    let reason = match action {
        FollowOnAction::OpenQuartermaster => {
            if let Err(e) = host.open_quartermaster() {
                warn!(error = %e, "Quartermaster could not be opened");
            }
            return;
        }
        FollowOnAction::RequestLeave => DetachReason::LeaveRequested,
        FollowOnAction::FinalDischarge => DetachReason::Discharged,
        FollowOnAction::Desertion => DetachReason::Deserted,
    };

    if !enlistment.is_enlisted {
        return;
    }
    let mut ctx = MusterContext::new(&mut *host, &mut *enlistment, &mut *tasks);
    controller.abort_for_detachment(&mut ctx);
    coordinator.safe_detach(host, enlistment, reason);
}
