//! The muster sequence controller.
//!
//! A muster walks the player through up to eight stages. The controller owns
//! the in-progress session (at most one), decides when a muster may start,
//! switches between stages through a single guarded entry point and falls
//! back to a one-step pay prompt whenever the staged flow cannot continue.
//!
//! # Modules
//!
//! - [`gating`]: trigger conditions and deferred triggers
//! - [`stages`]: stage-entry facts and skip rules
//! - [`options`]: per-stage options and availability
//! - [`effects`]: option handlers
//! - [`summary`]: completion summary lines
//! - [`legacy`]: the single-step pay prompt

mod effects;
pub mod gating;
pub mod legacy;
pub mod options;
pub mod stages;
pub mod summary;

pub use gating::{DeferredTrigger, TriggerBlock, TriggerOutcome};
pub use legacy::LegacyPayPrompt;
pub use options::{MusterOption, OptionView, StageView};
pub use stages::{skip_reason, StageFacts};

use std::collections::VecDeque;

use enlist_events::{
    EnlistmentState, MusterOutcomeRecord, MusterSessionState, MusterStage, TimeFlow,
};
use tracing::{debug, error, info, warn};

use crate::config::{EnlistConfig, MusterConfig, PayConfig, PromotionConfig};
use crate::error::{MusterError, OptionRejection};
use crate::host::{Host, HostResult};
use crate::persistence::{self, PersistError, SaveStore, SessionLoad};
use crate::tasks::{DeferredTask, DeferredTaskQueue};

use effects::Resolution;

/// Tuning consulted by skip rules, predicates and handlers.
#[derive(Debug, Clone, PartialEq)]
pub struct Rules {
    pub muster: MusterConfig,
    pub pay: PayConfig,
    pub promotion: PromotionConfig,
}

impl Rules {
    pub fn from_config(config: &EnlistConfig) -> Self {
        Self {
            muster: config.muster.clone(),
            pay: config.pay.clone(),
            promotion: config.promotion.clone(),
        }
    }
}

/// Which muster flow the controller runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerMode {
    /// The eight-stage sequence.
    Enhanced,
    /// The single-step pay prompt only.
    Legacy,
}

/// Result of [`MusterSequenceController::begin_muster_sequence`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeginOutcome {
    Started,
    /// A session restored from a save was put back on screen.
    Resumed,
    AlreadyActive,
    /// The legacy prompt was shown instead.
    Legacy,
    NotEnlisted,
}

/// Result of a successful option choice.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionResolution {
    Advanced(MusterStage),
    Completed(Box<MusterOutcomeRecord>),
    /// The next stage could not be shown; the legacy prompt took over.
    Aborted,
}

/// Mutable state the controller works on, borrowed from the service.
pub struct MusterContext<'a, H> {
    pub host: &'a mut H,
    pub enlistment: &'a mut EnlistmentState,
    pub tasks: &'a mut DeferredTaskQueue,
}

impl<'a, H> MusterContext<'a, H> {
    pub fn new(
        host: &'a mut H,
        enlistment: &'a mut EnlistmentState,
        tasks: &'a mut DeferredTaskQueue,
    ) -> Self {
        Self {
            host,
            enlistment,
            tasks,
        }
    }
}

/// Drives the muster workflow.
#[derive(Debug)]
pub struct MusterSequenceController {
    rules: Rules,
    mode: ControllerMode,
    legacy_only: bool,
    session: Option<MusterSessionState>,
    /// The session is on screen. A session restored from a save is held
    /// off screen until the next trigger resumes it.
    presented: bool,
    pending_after_combat: bool,
    pending_after_menu: bool,
    legacy_prompt: Option<LegacyPayPrompt>,
    history: VecDeque<MusterOutcomeRecord>,
}

impl MusterSequenceController {
    pub fn new(config: &EnlistConfig) -> Self {
        Self {
            rules: Rules::from_config(config),
            mode: ControllerMode::Enhanced,
            legacy_only: config.general.legacy_muster_only,
            session: None,
            presented: false,
            pending_after_combat: false,
            pending_after_menu: false,
            legacy_prompt: None,
            history: VecDeque::new(),
        }
    }

    pub fn rules(&self) -> &Rules {
        &self.rules
    }

    pub fn mode(&self) -> ControllerMode {
        self.mode
    }

    pub fn session(&self) -> Option<&MusterSessionState> {
        self.session.as_ref()
    }

    pub fn current_stage(&self) -> Option<MusterStage> {
        self.session.as_ref().map(|s| s.current_stage)
    }

    /// A muster is on screen, or the legacy prompt is waiting.
    pub fn is_active(&self) -> bool {
        (self.presented && self.session.is_some()) || self.legacy_prompt.is_some()
    }

    pub fn legacy_prompt(&self) -> Option<&LegacyPayPrompt> {
        self.legacy_prompt.as_ref()
    }

    pub fn pending_trigger(&self) -> Option<DeferredTrigger> {
        if self.pending_after_combat {
            Some(DeferredTrigger::AfterCombat)
        } else if self.pending_after_menu {
            Some(DeferredTrigger::AfterMenu)
        } else {
            None
        }
    }

    /// Recent outcome records, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &MusterOutcomeRecord> {
        self.history.iter()
    }

    pub fn last_record(&self) -> Option<&MusterOutcomeRecord> {
        self.history.back()
    }

    /// Registers the stage menus. On failure the controller runs the legacy
    /// flow for the rest of its lifetime.
    pub fn register_presentation<H: Host>(&mut self, host: &mut H) -> Result<(), MusterError> {
        if self.legacy_only {
            self.mode = ControllerMode::Legacy;
            info!("Staged muster disabled by configuration; using legacy pay prompt");
            return Ok(());
        }
        match host.register_stage_menus() {
            Ok(()) => {
                self.mode = ControllerMode::Enhanced;
                debug!("Muster stage menus registered");
                Ok(())
            }
            Err(source) => {
                let err = MusterError::Registration(source);
                error!(code = err.code(), error = %err, "Falling back to legacy muster");
                self.mode = ControllerMode::Legacy;
                Err(err)
            }
        }
    }

    /// Whether a muster could start right now.
    pub fn can_trigger_muster<H: Host>(
        &self,
        host: &H,
        enlistment: &EnlistmentState,
    ) -> Result<(), TriggerBlock> {
        gating::check(host, enlistment, self.is_active())
    }

    /// Attempts to start a muster, arming a deferred trigger if the world is
    /// temporarily unsafe.
    pub fn try_trigger<H: Host>(&mut self, ctx: &mut MusterContext<'_, H>) -> TriggerOutcome {
        match self.can_trigger_muster(ctx.host, ctx.enlistment) {
            Ok(()) => TriggerOutcome::Began(self.begin_muster_sequence(ctx)),
            Err(block) => match block.deferral() {
                Some(DeferredTrigger::AfterCombat) => {
                    self.pending_after_combat = true;
                    debug!(block = %block, "Muster deferred until combat ends");
                    TriggerOutcome::Deferred(DeferredTrigger::AfterCombat)
                }
                Some(DeferredTrigger::AfterMenu) => {
                    self.pending_after_menu = true;
                    debug!(block = %block, "Muster deferred until the player is free");
                    TriggerOutcome::Deferred(DeferredTrigger::AfterMenu)
                }
                None if block == TriggerBlock::Prisoner && self.session.is_none() => {
                    self.skip_as_prisoner(ctx);
                    TriggerOutcome::SkippedAsPrisoner
                }
                None if block == TriggerBlock::Prisoner => {
                    // Keep the restored session for after release
                    self.pending_after_menu = true;
                    TriggerOutcome::Blocked(block)
                }
                None => TriggerOutcome::Blocked(block),
            },
        }
    }

    /// Calendar check. Consumes a deferred trigger once its block has
    /// cleared, otherwise fires the scheduled muster when it is due.
    pub fn on_hourly_tick<H: Host>(
        &mut self,
        ctx: &mut MusterContext<'_, H>,
    ) -> Option<TriggerOutcome> {
        if !ctx.enlistment.is_enlisted {
            self.pending_after_combat = false;
            self.pending_after_menu = false;
            return None;
        }

        if self.pending_trigger().is_some() {
            let still_blocked = match self.can_trigger_muster(ctx.host, ctx.enlistment) {
                Err(block) => match block.deferral() {
                    Some(DeferredTrigger::AfterCombat) => self.pending_after_combat,
                    Some(DeferredTrigger::AfterMenu) => self.pending_after_menu,
                    None => block == TriggerBlock::Prisoner && self.session.is_some(),
                },
                Ok(()) => false,
            };
            if still_blocked {
                return None;
            }
            self.pending_after_combat = false;
            self.pending_after_menu = false;
            debug!("Deferred muster trigger consumed");
            return Some(self.try_trigger(ctx));
        }

        let today = ctx.host.now().day;
        let due = ctx.enlistment.days_since_muster(today) >= self.rules.muster.interval_days;
        if due && !self.is_active() {
            return Some(self.try_trigger(ctx));
        }
        None
    }

    /// Starts or resumes the muster. Calling it again while a muster is on
    /// screen has no effect.
    pub fn begin_muster_sequence<H: Host>(
        &mut self,
        ctx: &mut MusterContext<'_, H>,
    ) -> BeginOutcome {
        if !ctx.enlistment.is_enlisted {
            return BeginOutcome::NotEnlisted;
        }
        if self.is_active() {
            return BeginOutcome::AlreadyActive;
        }

        if self.mode == ControllerMode::Legacy {
            self.session = None;
            self.start_legacy_prompt(ctx);
            return BeginOutcome::Legacy;
        }

        if let Some(session) = &self.session {
            let stage = session.current_stage;
            self.presented = true;
            best_effort("set_time_flow", ctx.host.set_time_flow(TimeFlow::Stopped));
            ctx.tasks.push(DeferredTask::ResumeStage(stage));
            info!(stage = %stage, muster_day = session.muster_day, "Muster resumed");
            return BeginOutcome::Resumed;
        }

        let today = ctx.host.now().day;
        let session = MusterSessionState::new(
            today,
            ctx.enlistment.last_muster_day,
            ctx.enlistment.tier,
            ctx.host.time_flow(),
        );
        best_effort("set_time_flow", ctx.host.set_time_flow(TimeFlow::Stopped));
        info!(
            muster_day = today,
            days_since_last = session.days_since_last_muster(),
            tier = ctx.enlistment.tier,
            "Muster started"
        );
        self.session = Some(session);
        self.presented = true;
        ctx.tasks.push(DeferredTask::ActivateStage(MusterStage::Intro));
        BeginOutcome::Started
    }

    /// The single guarded stage switch.
    ///
    /// A failed activation hops once to the complete stage; if that fails as
    /// well the muster is aborted to the legacy prompt.
    pub fn switch_to_stage<H: Host>(&mut self, ctx: &mut MusterContext<'_, H>, stage: MusterStage) {
        self.guarded_switch(ctx, stage, false);
    }

    /// Re-shows the stage a restored session was saved at. Its skip rules
    /// were settled when the session first reached it, so they are not
    /// evaluated again; later stages are gated as usual.
    pub fn resume_stage<H: Host>(&mut self, ctx: &mut MusterContext<'_, H>, stage: MusterStage) {
        self.guarded_switch(ctx, stage, true);
    }

    fn guarded_switch<H: Host>(
        &mut self,
        ctx: &mut MusterContext<'_, H>,
        stage: MusterStage,
        resuming: bool,
    ) {
        if self.session.is_none() || !self.presented {
            debug!(stage = %stage, "Stale stage activation ignored");
            return;
        }

        let err = match self.activate(ctx, stage, resuming) {
            Ok(()) => return,
            Err(err) => err,
        };
        error!(code = err.code(), stage = %stage, error = %err, "Stage activation failed");
        if let Some(session) = self.session.as_mut() {
            session.record_error(err.to_string());
        }

        if stage != MusterStage::Complete {
            match self.activate(ctx, MusterStage::Complete, false) {
                Ok(()) => {
                    warn!(failed_stage = %stage, "Recovered by jumping to completion");
                    return;
                }
                Err(err) => {
                    error!(code = err.code(), stage = %MusterStage::Complete, error = %err, "Recovery hop failed");
                }
            }
        }
        self.abort_with_fallback(ctx);
    }

    /// Applies skip rules from `stage` onward and shows the first stage that
    /// is not skipped. The session only moves once the view is on screen.
    /// With `resuming` set, `stage` itself is shown without a skip check.
    fn activate<H: Host>(
        &mut self,
        ctx: &mut MusterContext<'_, H>,
        stage: MusterStage,
        resuming: bool,
    ) -> Result<(), MusterError> {
        let rules = &self.rules;
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| MusterError::StateCorruption("no session to activate".to_string()))?;

        let mut stage = stage;
        let mut resuming = resuming;
        loop {
            let mut facts = StageFacts::capture(&*ctx.host, ctx.enlistment, session, &rules.pay);
            let skip = if std::mem::take(&mut resuming) {
                None
            } else {
                facts.draw_roll(stage, &mut *ctx.host);
                skip_reason(stage, &facts, &rules.muster)
            };

            let Some(reason) = skip else {
                let lines = if stage == MusterStage::Complete {
                    summary::summary_lines(session)
                } else {
                    session.outcome_log.clone()
                };
                let view = StageView::build(stage, session, &facts, rules, lines);
                ctx.host
                    .show_stage(&view)
                    .map_err(|source| MusterError::StageTransition { stage, source })?;
                session.current_stage = stage;
                session.mark_visited(stage);
                info!(stage = %stage, "Muster stage shown");
                return Ok(());
            };

            session.mark_skipped(stage, reason);
            debug!(stage = %stage, reason = %reason, "Muster stage skipped");
            stage = stage.next().ok_or_else(|| {
                MusterError::StateCorruption(format!("stage '{}' skipped with no successor", stage))
            })?;
        }
    }

    /// The current stage with availability re-evaluated against fresh facts.
    pub fn current_view<H: Host>(&self, host: &H, enlistment: &EnlistmentState) -> Option<StageView> {
        let session = self.session.as_ref().filter(|_| self.presented)?;
        let facts = StageFacts::capture(host, enlistment, session, &self.rules.pay);
        let stage = session.current_stage;
        let lines = if stage == MusterStage::Complete {
            summary::summary_lines(session)
        } else {
            session.outcome_log.clone()
        };
        Some(StageView::build(stage, session, &facts, &self.rules, lines))
    }

    /// Resolves a choice for the current stage and moves on.
    pub fn choose_option<H: Host>(
        &mut self,
        ctx: &mut MusterContext<'_, H>,
        option: MusterOption,
    ) -> Result<OptionResolution, MusterError> {
        let rules = &self.rules;
        let session = match self.session.as_mut() {
            Some(session) if self.presented => session,
            _ => return Err(MusterError::rejected(option, OptionRejection::NoSession)),
        };

        let current = session.current_stage;
        if option.stage() != current {
            return Err(MusterError::rejected(
                option,
                OptionRejection::WrongStage {
                    current,
                    expected: option.stage(),
                },
            ));
        }

        let facts = StageFacts::capture(&*ctx.host, ctx.enlistment, session, &rules.pay);
        if !option.is_available(&facts, rules) {
            return Err(MusterError::rejected(option, OptionRejection::Unavailable));
        }

        Resolution {
            host: &mut *ctx.host,
            enlistment: &mut *ctx.enlistment,
            session,
            facts: &facts,
            rules,
        }
        .apply(option);
        info!(option = %option, stage = %current, "Muster option chosen");

        if current == MusterStage::Complete {
            return Ok(match self.complete_muster_sequence(ctx) {
                Some(record) => OptionResolution::Completed(Box::new(record)),
                None => OptionResolution::Aborted,
            });
        }

        let next = if option.jumps_to_complete() {
            MusterStage::Complete
        } else {
            current.next().unwrap_or(MusterStage::Complete)
        };
        self.switch_to_stage(ctx, next);

        Ok(match self.session.as_ref() {
            Some(session) if self.presented => OptionResolution::Advanced(session.current_stage),
            _ => OptionResolution::Aborted,
        })
    }

    /// Closes the muster: advances baselines, emits the outcome record,
    /// clears the session, restores time flow and only then queues follow-on
    /// actions and escalation events.
    pub fn complete_muster_sequence<H: Host>(
        &mut self,
        ctx: &mut MusterContext<'_, H>,
    ) -> Option<MusterOutcomeRecord> {
        let mut session = self.session.take()?;
        self.presented = false;

        ctx.enlistment.close_muster(session.muster_day);
        if let Err(source) = ctx.host.refresh_tier_resources(ctx.enlistment.tier) {
            let err = MusterError::EffectApplication {
                stage: MusterStage::Complete,
                effect: "refresh_tier_resources",
                source,
            };
            warn!(code = err.code(), error = %err, "Tier resources not refreshed");
            session.record_error(err.to_string());
        }

        let commander = ctx
            .enlistment
            .commander
            .as_ref()
            .map(|id| ctx.host.commander_name(id));
        let mut record = MusterOutcomeRecord::from_session(
            &session,
            ctx.host.now(),
            ctx.enlistment.tier,
            commander,
        )
        .with_summary(summary::summary_lines(&session));
        if let Some(warning) = summary::soft_warning(&session) {
            record = record.with_warning(warning);
        }

        best_effort("set_time_flow", ctx.host.set_time_flow(session.time_flow_before));
        best_effort("close_muster_menu", ctx.host.close_muster_menu());

        for action in &session.follow_ons {
            ctx.tasks.push(DeferredTask::FollowOn(*action));
        }
        for event in &session.pending_escalation_events {
            ctx.tasks.push(DeferredTask::RaiseEvent(event.clone()));
        }

        info!(
            record_id = %record.record_id,
            muster_day = record.muster_day,
            visited = record.stages_visited.len(),
            skipped = record.stages_skipped.len(),
            soft_failures = session.encountered_errors.len(),
            "Muster complete"
        );

        self.history.push_back(record.clone());
        while self.history.len() > self.rules.muster.history_limit {
            self.history.pop_front();
        }
        Some(record)
    }

    /// Drops the session and hands over to the legacy prompt. The player is
    /// told the muster resumes next cycle.
    ///
    /// Once the pay stage has resolved, wages for the period are settled:
    /// the period is closed and no legacy prompt is raised.
    pub fn abort_with_fallback<H: Host>(&mut self, ctx: &mut MusterContext<'_, H>) {
        let session = self.session.take();
        self.presented = false;
        ctx.tasks.cancel_stage_activations();

        let settled_day = session
            .as_ref()
            .filter(|s| s.pay_outcome.is_some())
            .map(|s| s.muster_day);
        if let Some(session) = &session {
            best_effort("set_time_flow", ctx.host.set_time_flow(session.time_flow_before));
            warn!(
                stage = %session.current_stage,
                errors = session.encountered_errors.len(),
                paid = settled_day.is_some(),
                "Muster aborted"
            );
        }
        best_effort("close_muster_menu", ctx.host.close_muster_menu());

        if let Some(day) = settled_day {
            ctx.enlistment.close_muster(day);
            info!(muster_day = day, "Pay already settled; period closed without legacy prompt");
            best_effort(
                "notify",
                ctx.host
                    .notify("The muster could not be completed. Your pay for this period was settled."),
            );
            return;
        }

        self.start_legacy_prompt(ctx);
        best_effort(
            "notify",
            ctx.host
                .notify("The muster could not be completed and will resume next cycle."),
        );
    }

    /// Ends any muster without paying, for when service ends mid-muster.
    pub fn abort_for_detachment<H: Host>(&mut self, ctx: &mut MusterContext<'_, H>) {
        self.pending_after_combat = false;
        self.pending_after_menu = false;
        self.legacy_prompt = None;
        ctx.tasks.cancel_stage_activations();

        let Some(session) = self.session.take() else {
            return;
        };
        let was_presented = std::mem::replace(&mut self.presented, false);
        if was_presented {
            best_effort("set_time_flow", ctx.host.set_time_flow(session.time_flow_before));
            best_effort("close_muster_menu", ctx.host.close_muster_menu());
        }
        info!(stage = %session.current_stage, "Muster abandoned; service ended");
    }

    fn start_legacy_prompt<H: Host>(&mut self, ctx: &mut MusterContext<'_, H>) {
        let today = ctx.host.now().day;
        let wage = self.rules.pay.wage_for(
            ctx.enlistment.tier,
            ctx.enlistment.days_since_muster(today),
        );
        let prompt = LegacyPayPrompt::new(today, wage, ctx.enlistment.pending_backpay);
        info!(wage = prompt.wage, backpay = prompt.backpay, "Legacy pay prompt");

        let shown = ctx.host.show_legacy_pay_prompt(&prompt);
        self.legacy_prompt = Some(prompt);
        if let Err(e) = shown {
            warn!(error = %e, "Legacy prompt could not be shown; paying directly");
            if let Err(err) = self.resolve_legacy_pay(ctx) {
                error!(code = err.code(), error = %err, "Direct legacy pay failed");
            }
        }
    }

    /// Pays the legacy prompt and closes the muster period. Returns the
    /// amount paid.
    pub fn resolve_legacy_pay<H: Host>(
        &mut self,
        ctx: &mut MusterContext<'_, H>,
    ) -> Result<i32, MusterError> {
        let prompt = self.legacy_prompt.take().ok_or_else(|| {
            MusterError::rejected(MusterOption::AcceptFullPay, OptionRejection::NoLegacyPrompt)
        })?;

        let total = prompt.total();
        let paid = match ctx.host.give_gold(total) {
            Ok(()) => {
                ctx.enlistment.pending_backpay = 0;
                total
            }
            Err(source) => {
                let err = MusterError::EffectApplication {
                    stage: MusterStage::Pay,
                    effect: "give_gold",
                    source,
                };
                warn!(code = err.code(), error = %err, "Legacy pay failed; wages stay owed");
                ctx.enlistment.pending_backpay = total;
                0
            }
        };
        ctx.enlistment.close_muster(prompt.muster_day);
        info!(paid, muster_day = prompt.muster_day, "Legacy muster resolved");
        Ok(paid)
    }

    /// The player cannot muster while held prisoner: wages accrue as back
    /// pay and the muster clock restarts.
    fn skip_as_prisoner<H: Host>(&mut self, ctx: &mut MusterContext<'_, H>) {
        let today = ctx.host.now().day;
        let wage = self.rules.pay.wage_for(
            ctx.enlistment.tier,
            ctx.enlistment.days_since_muster(today),
        );
        ctx.enlistment.pending_backpay = ctx.enlistment.pending_backpay.saturating_add(wage);
        ctx.enlistment.last_muster_day = today;
        info!(
            wage,
            backpay = ctx.enlistment.pending_backpay,
            "Muster skipped while prisoner"
        );
        best_effort(
            "notify",
            ctx.host
                .notify("The muster passed while you were held captive. Your wages are owed."),
        );
    }

    /// Writes the session, or clears it from the save when there is none.
    pub fn save<S: SaveStore + ?Sized>(&self, store: &mut S) -> Result<(), PersistError> {
        persistence::save_session(self.session.as_ref(), store)
    }

    /// Restores the session from a save. A restored session stays off screen
    /// and a muster trigger is deferred so it resumes at its stored stage. A
    /// corrupted session is discarded and a fresh muster deferred instead.
    pub fn load<S: SaveStore + ?Sized>(
        &mut self,
        store: &S,
        enlisted: bool,
    ) -> Result<(), MusterError> {
        self.session = None;
        self.presented = false;
        self.legacy_prompt = None;
        self.pending_after_combat = false;
        self.pending_after_menu = false;

        match persistence::load_session(store) {
            SessionLoad::Absent => Ok(()),
            SessionLoad::Restored(session) => {
                if enlisted {
                    info!(stage = %session.current_stage, "Muster session restored");
                    self.session = Some(*session);
                    self.pending_after_menu = true;
                }
                Ok(())
            }
            SessionLoad::Corrupted(reason) => {
                let err = MusterError::StateCorruption(reason);
                error!(code = err.code(), error = %err, "Discarding muster session");
                self.pending_after_menu = enlisted;
                Err(err)
            }
        }
    }
}

fn best_effort(call: &'static str, result: HostResult) {
    if let Err(e) = result {
        warn!(call, error = %e, "Engine call failed; continuing");
    }
}
