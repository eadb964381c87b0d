//! End-to-end muster runs against the sandbox host.
//!
//! These drive the controller the way the service does: stage activations go
//! through the deferred queue, options are picked from the view on screen.

use enlist_core::{
    skip_reason, BeginOutcome, DeferredTask, DeferredTaskQueue, DeferredTrigger, EnlistConfig,
    MemorySaveStore, MusterContext, MusterOption, MusterSequenceController, OptionResolution,
    SandboxCommander, SandboxHost, SaveStore, SaveValue, StageFacts, TriggerOutcome,
};
use enlist_events::{
    EnlistmentState, MusterOutcomeRecord, MusterStage, SkipReason, StageSkip, TimeFlow, Vec2,
};

/// A tier 6 soldier, enlisted on day 40, mustering on day 52.
struct World {
    host: SandboxHost,
    enlistment: EnlistmentState,
    tasks: DeferredTaskQueue,
    controller: MusterSequenceController,
}

impl World {
    fn new(seed: u64) -> Self {
        let mut host = SandboxHost::new(seed);
        let id = host.add_commander(
            "lord_derthert",
            SandboxCommander::new("Derthert", Vec2::new(4.0, 2.0)),
        );
        let mut enlistment = EnlistmentState::default();
        enlistment.enlist(id, 40);
        enlistment.tier = 6;
        enlistment.tier_at_last_muster = 6;
        host.set_day(52);

        let mut controller = MusterSequenceController::new(&EnlistConfig::default());
        controller
            .register_presentation(&mut host)
            .expect("sandbox registers menus");
        Self {
            host,
            enlistment,
            tasks: DeferredTaskQueue::new(),
            controller,
        }
    }

    fn begin(&mut self) -> BeginOutcome {
        let mut ctx = MusterContext::new(&mut self.host, &mut self.enlistment, &mut self.tasks);
        self.controller.begin_muster_sequence(&mut ctx)
    }

    fn hourly(&mut self) -> Option<TriggerOutcome> {
        let mut ctx = MusterContext::new(&mut self.host, &mut self.enlistment, &mut self.tasks);
        self.controller.on_hourly_tick(&mut ctx)
    }

    fn drain(&mut self) {
        for task in self.tasks.drain_ready(0.016) {
            let mut ctx = MusterContext::new(&mut self.host, &mut self.enlistment, &mut self.tasks);
            match task {
                DeferredTask::ActivateStage(stage) => self.controller.switch_to_stage(&mut ctx, stage),
                DeferredTask::ResumeStage(stage) => self.controller.resume_stage(&mut ctx, stage),
                _ => {}
            }
        }
    }

    fn choose(&mut self, option: MusterOption) -> OptionResolution {
        let mut ctx = MusterContext::new(&mut self.host, &mut self.enlistment, &mut self.tasks);
        self.controller
            .choose_option(&mut ctx, option)
            .expect("option accepted")
    }

    /// Picks the first available option at every stage until the muster
    /// ends. Returns the record if it completed normally.
    fn run_to_end(&mut self) -> Option<MusterOutcomeRecord> {
        self.drain();
        for _ in 0..MusterStage::ALL.len() + 1 {
            let Some(view) = self
                .controller
                .current_view(&self.host, &self.enlistment)
            else {
                return None;
            };
            let option = view.first_available().expect("every stage has an option");
            match self.choose(option) {
                OptionResolution::Completed(record) => return Some(*record),
                OptionResolution::Aborted => return None,
                OptionResolution::Advanced(_) => {}
            }
        }
        panic!("muster did not finish");
    }
}

#[test]
fn test_reference_muster_walkthrough() {
    let mut world = World::new(7);
    world.host.script_rolls([0.9, 0.9]);

    assert_eq!(world.begin(), BeginOutcome::Started);
    let record = world.run_to_end().expect("muster completes");

    assert_eq!(
        world.host.shown_stages,
        vec![
            MusterStage::Intro,
            MusterStage::Pay,
            MusterStage::Inspection,
            MusterStage::Recruit,
            MusterStage::Complete,
        ]
    );
    assert_eq!(
        record.stages_skipped,
        vec![
            StageSkip::new(MusterStage::Baggage, SkipReason::NoContraband),
            StageSkip::new(MusterStage::PromotionRecap, SkipReason::NoPromotion),
            StageSkip::new(MusterStage::Retinue, SkipReason::NotRetinueRank),
        ]
    );
    assert_eq!(record.days_since_last_muster, 12);
    assert_eq!(record.muster_day, 52);
    assert_eq!(record.commander.as_deref(), Some("Derthert"));
    assert_eq!(
        record.summary_lines.first().map(String::as_str),
        Some("Muster of day 52 (12 days since the last).")
    );
    assert!(record
        .summary_lines
        .iter()
        .any(|line| line == "Baggage: skipped (no_contraband)."));
    assert!(record.soft_warning.is_none());

    assert!(world.controller.session().is_none());
    assert_eq!(world.host.time_flow, TimeFlow::Normal);
    assert_eq!(world.enlistment.last_muster_day, 52);
}

#[test]
fn test_record_survives_jsonl() {
    let mut world = World::new(7);
    world.host.script_rolls([0.9, 0.9]);
    world.begin();
    let record = world.run_to_end().unwrap();

    let line = record.to_jsonl().unwrap();
    assert!(!line.contains('\n'));
    assert_eq!(MusterOutcomeRecord::from_jsonl(&line).unwrap(), record);
}

#[test]
fn test_only_one_session_at_a_time() {
    let mut world = World::new(1);
    assert_eq!(world.begin(), BeginOutcome::Started);
    world.drain();

    assert_eq!(world.begin(), BeginOutcome::AlreadyActive);
    assert_eq!(world.hourly(), None);
    world.drain();
    assert_eq!(world.host.shown_stages, vec![MusterStage::Intro]);
}

#[test]
fn test_visited_and_skipped_are_disjoint() {
    for seed in 0..20 {
        let mut world = World::new(seed);
        world.host.contraband_value = (seed as i32 % 3) * 40;
        world.begin();
        let Some(record) = world.run_to_end() else {
            continue;
        };
        for skip in &record.stages_skipped {
            assert!(
                !record.stages_visited.contains(&skip.stage),
                "seed {} visited skipped stage {}",
                seed,
                skip.stage
            );
        }
        assert!(record.visited(MusterStage::Intro));
        assert!(record.visited(MusterStage::Complete));
    }
}

#[test]
fn test_resume_restores_saved_stage() {
    let mut world = World::new(7);
    world.host.script_rolls([0.9, 0.9]);
    world.begin();
    world.drain();
    world.choose(MusterOption::Proceed);
    world.choose(MusterOption::AcceptFullPay);
    assert_eq!(
        world.controller.current_stage(),
        Some(MusterStage::Inspection)
    );

    let mut store = MemorySaveStore::new();
    world.controller.save(&mut store).unwrap();

    let mut restored = World::new(99);
    restored.controller.load(&store, true).unwrap();
    assert_eq!(
        restored.controller.pending_trigger(),
        Some(DeferredTrigger::AfterMenu)
    );

    assert_eq!(
        restored.hourly(),
        Some(TriggerOutcome::Began(BeginOutcome::Resumed))
    );
    restored.drain();
    assert_eq!(restored.host.shown_stages, vec![MusterStage::Inspection]);
    let session = restored.controller.session().unwrap();
    assert!(session.was_skipped(MusterStage::Baggage));
    assert_eq!(session.muster_day, 52);
}

#[test]
fn test_resume_shows_saved_stage_despite_fresh_roll() {
    let mut world = World::new(7);
    world.host.script_rolls([0.9, 0.9]);
    world.begin();
    world.drain();
    world.choose(MusterOption::Proceed);
    world.choose(MusterOption::AcceptFullPay);
    world.choose(MusterOption::StandInspection);
    assert_eq!(world.controller.current_stage(), Some(MusterStage::Recruit));

    let mut store = MemorySaveStore::new();
    world.controller.save(&mut store).unwrap();

    // This roll would skip the recruit stage if it were gated again
    let mut restored = World::new(99);
    restored.host.script_rolls([0.0]);
    restored.controller.load(&store, true).unwrap();
    assert_eq!(
        restored.hourly(),
        Some(TriggerOutcome::Began(BeginOutcome::Resumed))
    );
    restored.drain();

    assert_eq!(restored.host.shown_stages, vec![MusterStage::Recruit]);
    assert_eq!(
        restored.controller.current_stage(),
        Some(MusterStage::Recruit)
    );
    let session = restored.controller.session().unwrap();
    assert!(!session.was_skipped(MusterStage::Recruit));
    assert!(session.stages_visited.contains(&MusterStage::Recruit));

    restored.choose(MusterOption::IgnoreRecruit);
    assert_eq!(
        restored.controller.current_stage(),
        Some(MusterStage::Complete)
    );
}

#[test]
fn test_corrupted_session_discarded_and_fresh_muster_started() {
    let mut store = MemorySaveStore::new();
    store
        .write("muster.active", SaveValue::Bool(true))
        .unwrap();
    store
        .write("muster.stage", SaveValue::Text("parade".to_string()))
        .unwrap();

    let mut world = World::new(3);
    let err = world.controller.load(&store, true).unwrap_err();
    assert_eq!(err.code(), "ENL-CORRUPT");
    assert!(world.controller.session().is_none());

    assert_eq!(
        world.hourly(),
        Some(TriggerOutcome::Began(BeginOutcome::Started))
    );
    world.drain();
    assert_eq!(world.host.shown_stages, vec![MusterStage::Intro]);
}

#[test]
fn test_deferred_after_menu_fires_exactly_once() {
    let mut world = World::new(2);
    world.host.menu_open = true;

    assert_eq!(
        world.hourly(),
        Some(TriggerOutcome::Deferred(DeferredTrigger::AfterMenu))
    );
    assert_eq!(world.hourly(), None);
    assert_eq!(world.hourly(), None);

    world.host.menu_open = false;
    assert_eq!(
        world.hourly(),
        Some(TriggerOutcome::Began(BeginOutcome::Started))
    );
    for _ in 0..5 {
        assert_eq!(world.hourly(), None);
    }
    world.drain();
    assert_eq!(world.host.shown_stages, vec![MusterStage::Intro]);
}

#[test]
fn test_skip_rules_are_deterministic() {
    let config = EnlistConfig::default();
    let facts = StageFacts {
        day: 52,
        tier: 4,
        player_health: 0.9,
        contraband_value: 60,
        baggage_roll: 0.1,
        recruit_roll: 0.5,
        last_recruit_day: 50,
        ..StageFacts::default()
    };

    let first: Vec<_> = MusterStage::ALL
        .iter()
        .map(|stage| skip_reason(*stage, &facts, &config.muster))
        .collect();
    for _ in 0..10 {
        let again: Vec<_> = MusterStage::ALL
            .iter()
            .map(|stage| skip_reason(*stage, &facts, &config.muster))
            .collect();
        assert_eq!(again, first);
    }
    assert_eq!(first[2], Some(SkipReason::CheckNotRolled));
    assert_eq!(first[4], Some(SkipReason::CooldownActive));
}

#[test]
fn test_same_seed_same_muster() {
    let run = |seed| {
        let mut world = World::new(seed);
        world.host.contraband_value = 40;
        world.begin();
        let record = world.run_to_end().unwrap();
        (world.host.shown_stages, record.stages_skipped)
    };
    assert_eq!(run(11), run(11));
}

#[test]
fn test_forced_failure_at_any_stage_leaves_world_consistent() {
    for stage in MusterStage::ALL.iter().copied() {
        let mut world = World::new(5);
        world.host.script_rolls([0.9, 0.9]);
        world.host.contraband_value = 40;
        world.enlistment.record_promotion(7, 45);
        world.enlistment.retinue_size = 4;
        world.host.fail_stages.insert(stage);

        world.begin();
        let record = world.run_to_end();

        assert!(world.controller.session().is_none(), "stage {}", stage);
        assert_eq!(world.host.time_flow, TimeFlow::Normal, "stage {}", stage);
        assert!(world.enlistment.is_consistent(), "stage {}", stage);
        match record {
            Some(record) => {
                assert!(!record.summary_lines.is_empty());
                assert!(record.soft_warning.is_some(), "stage {}", stage);
                assert!(!record.visited(stage), "stage {}", stage);
            }
            None => {
                // Pay resolved before the complete stage failed
                assert_eq!(stage, MusterStage::Complete);
                assert!(world.controller.legacy_prompt().is_none());
                assert!(world.host.legacy_prompts.is_empty());
                assert_eq!(world.enlistment.pending_backpay, 0);
                assert_eq!(world.enlistment.last_muster_day, 52);
            }
        }
    }
}

#[test]
fn test_failed_effect_becomes_soft_warning() {
    let mut world = World::new(7);
    world.host.script_rolls([0.9, 0.9]);
    world.host.failing_calls.insert("give_gold");

    world.begin();
    let record = world.run_to_end().unwrap();

    assert!(record.soft_warning.is_some());
    assert!(world.enlistment.pending_backpay > 0);
}
