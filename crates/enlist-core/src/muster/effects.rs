//! Option handlers.
//!
//! A handler records the outcome on the session and applies host effects one
//! at a time. A failing effect is logged and recorded; the remaining effects
//! and the stage itself carry on.

use enlist_events::{
    BaggageOutcome, EnlistmentState, FollowOnAction, InspectionOutcome, MusterSessionState,
    MusterStage, PayOutcome, RecruitOutcome, RetinueOutcome,
};
use tracing::{debug, warn};

use super::options::{bribe_cost, replacement_cost, MusterOption};
use super::stages::StageFacts;
use super::Rules;
use crate::error::MusterError;
use crate::host::{Host, HostResult, Skill};
use crate::promotion;

pub(crate) const PAYMASTER_GRUDGE: &str = "paymaster_grudge";
pub(crate) const QUARTERMASTER_SIDE_DEAL: &str = "quartermaster_side_deal";

/// Everything a handler may touch.
pub(crate) struct Resolution<'a, H> {
    pub host: &'a mut H,
    pub enlistment: &'a mut EnlistmentState,
    pub session: &'a mut MusterSessionState,
    pub facts: &'a StageFacts,
    pub rules: &'a Rules,
}

impl<H: Host> Resolution<'_, H> {
    /// Applies the option's outcome and effects.
    pub fn apply(&mut self, option: MusterOption) {
        match option.stage() {
            MusterStage::Intro => {
                self.session.log(format!(
                    "Formation called on day {}, {} days since the last muster.",
                    self.session.muster_day,
                    self.session.days_since_last_muster()
                ));
            }
            MusterStage::Pay => self.resolve_pay(option),
            MusterStage::Baggage => self.resolve_baggage(option),
            MusterStage::Inspection => self.resolve_inspection(option),
            MusterStage::Recruit => self.resolve_recruit(option),
            MusterStage::PromotionRecap => {
                self.session.promotion_acknowledged = true;
                self.session.log(format!(
                    "Promotion to tier {} acknowledged before the company.",
                    self.enlistment.tier
                ));
            }
            MusterStage::Retinue => self.resolve_retinue(option),
            MusterStage::Complete => match option {
                MusterOption::FinishAndVisitQuartermaster => {
                    self.session.queue_follow_on(FollowOnAction::OpenQuartermaster);
                }
                MusterOption::FinishAndRequestLeave => {
                    self.session.queue_follow_on(FollowOnAction::RequestLeave);
                }
                _ => {}
            },
        }
        debug!(option = %option, stage = %option.stage(), "Option applied");
    }

    fn resolve_pay(&mut self, option: MusterOption) {
        let wage = self.facts.wage_due;
        let backpay = self.facts.backpay;
        let payable = self.facts.payable();
        let rules = self.rules;
        let pay = &rules.pay;

        match option {
            MusterOption::AcceptFullPay => {
                self.pay_out(payable, wage, backpay);
                self.session.pay_outcome = Some(PayOutcome::Full);
                self.session.log(format!("Received {} denars in full.", payable));
            }
            MusterOption::AcceptPartialPay => {
                let paid = self.facts.commander_funds.clamp(0, payable);
                let ok = self.gold("give_gold", paid);
                let owed = payable - paid;
                if ok {
                    self.session.pay_amount = paid.min(wage);
                    self.session.backpay_paid = (paid - wage).max(0);
                    self.enlistment.pending_backpay = owed;
                } else {
                    self.enlistment.pending_backpay = payable;
                }
                self.session.pay_outcome = Some(PayOutcome::Partial);
                self.session
                    .log(format!("Received {} of {} denars; {} owed.", paid, payable, owed));
            }
            MusterOption::AcceptIou => {
                self.enlistment.pending_backpay = payable;
                self.session.pay_outcome = Some(PayOutcome::Iou);
                self.session
                    .log(format!("The paymaster wrote an IOU for {} denars.", payable));
            }
            MusterOption::ReportCorruption => {
                let recovered =
                    (payable as f32 * pay.corruption_recovered_fraction).round() as i32;
                let penalty = pay.corruption_relation_penalty;
                self.pay_out(payable + recovered, wage + recovered, backpay);
                self.effect("change_relation", |h| h.change_relation(penalty));
                self.session.queue_escalation(PAYMASTER_GRUDGE);
                self.session.pay_outcome = Some(PayOutcome::Corruption);
                self.session.log(format!(
                    "Reported the paymaster's skimming; {} denars recovered.",
                    recovered
                ));
            }
            MusterOption::SideDeal => {
                let bonus = (wage as f32 * pay.side_deal_bonus).round() as i32;
                self.pay_out(payable + bonus, wage + bonus, backpay);
                self.session.queue_escalation(QUARTERMASTER_SIDE_DEAL);
                self.session.pay_outcome = Some(PayOutcome::SideDeal);
                self.session
                    .log(format!("Struck a side deal worth {} extra denars.", bonus));
            }
            MusterOption::RequestFinalDischarge => {
                let pension = wage.saturating_mul(pay.pension_multiplier);
                self.pay_out(payable + pension, wage + pension, backpay);
                self.session.queue_follow_on(FollowOnAction::FinalDischarge);
                self.session.pay_outcome = Some(PayOutcome::FinalDischarge);
                self.session.log(format!(
                    "Final discharge granted with a pension of {} denars.",
                    pension
                ));
            }
            MusterOption::Desert => {
                let penalty = pay.desertion_relation_penalty;
                self.effect("change_relation", |h| h.change_relation(penalty));
                self.enlistment.pending_backpay = 0;
                self.session.queue_follow_on(FollowOnAction::Desertion);
                self.session.pay_outcome = Some(PayOutcome::Desertion);
                self.session
                    .log("Slipped away from the pay line, forfeiting all wages.");
            }
            _ => {}
        }
    }

    /// Pays `total`; on failure the whole amount stays owed.
    fn pay_out(&mut self, total: i32, pay_amount: i32, backpay: i32) {
        if self.gold("give_gold", total) {
            self.session.pay_amount = pay_amount;
            self.session.backpay_paid = backpay;
            self.enlistment.pending_backpay = 0;
        } else {
            self.enlistment.pending_backpay = self.facts.payable();
        }
    }

    fn resolve_baggage(&mut self, option: MusterOption) {
        let value = self.facts.contraband_value;
        self.session.contraband_value = value;

        match option {
            MusterOption::SubmitToSearch => {
                self.effect("remove_contraband", |h| h.remove_contraband());
                self.session.baggage_outcome = BaggageOutcome::Confiscated;
                self.session
                    .log(format!("Contraband worth {} denars was confiscated.", value));
            }
            MusterOption::BribeQuartermaster => {
                let cost = bribe_cost(value, &self.rules.pay);
                self.gold("give_gold", -cost);
                self.session.baggage_outcome = BaggageOutcome::Bribed;
                self.session
                    .log(format!("Paid the quartermaster {} denars to look away.", cost));
            }
            MusterOption::SmuggleContraband => {
                self.session.baggage_outcome = BaggageOutcome::Smuggled;
                self.session.log("Contraband slipped past the search.");
            }
            MusterOption::BaggageProceed => {
                self.session.baggage_outcome = BaggageOutcome::Clean;
                self.session.log("Baggage search found nothing.");
            }
            _ => {}
        }
    }

    fn resolve_inspection(&mut self, option: MusterOption) {
        self.enlistment.last_inspection_day = self.session.muster_day;
        let rules = self.rules;
        let muster = &rules.muster;

        match option {
            MusterOption::StandInspection => {
                let passed = self.facts.equipment_quality >= muster.inspection_pass_quality;
                let delta = if passed {
                    muster.inspection_pass_relation
                } else {
                    muster.inspection_fail_relation
                };
                self.effect("change_relation", |h| h.change_relation(delta));
                if passed {
                    self.session.inspection_outcome = InspectionOutcome::Passed;
                    self.session.log("Kit passed inspection.");
                } else {
                    self.session.inspection_outcome = InspectionOutcome::Failed;
                    self.session.log("Kit failed inspection.");
                }
            }
            MusterOption::RequestExcusal => {
                self.session.inspection_outcome = InspectionOutcome::Excused;
                self.session.log("Excused from inspection by the sergeant.");
            }
            _ => {}
        }
    }

    fn resolve_recruit(&mut self, option: MusterOption) {
        self.enlistment.last_recruit_day = self.session.muster_day;

        match option {
            MusterOption::MentorRecruit => {
                let xp = self.rules.muster.mentor_xp;
                promotion::apply_xp(
                    self.enlistment,
                    xp,
                    self.facts.day,
                    &self.rules.promotion,
                );
                self.effect("add_skill_xp", |h| h.add_skill_xp(Skill::Leadership, xp));
                self.session.recruit_xp_awarded = xp;
                self.session.recruit_outcome = RecruitOutcome::Mentored;
                self.session
                    .log(format!("Took the recruit under your wing (+{} xp).", xp));
            }
            MusterOption::AssignToSergeant => {
                self.session.recruit_outcome = RecruitOutcome::Assigned;
                self.session.log("Handed the recruit to the sergeant.");
            }
            MusterOption::IgnoreRecruit => {
                self.session.recruit_outcome = RecruitOutcome::Ignored;
                self.session.log("Left the recruit to fend for himself.");
            }
            _ => {}
        }
    }

    fn resolve_retinue(&mut self, option: MusterOption) {
        match option {
            MusterOption::RequestReplacements => {
                let losses = self.facts.retinue_losses;
                let cost = replacement_cost(losses, self.rules);
                let paid = self.gold("give_gold", -cost);
                if paid && self.effect("adjust_retinue", |h| h.adjust_retinue(losses as i32)) {
                    self.enlistment.retinue_size += losses;
                    self.session.retinue_replacements = losses;
                }
                self.session.retinue_outcome = RetinueOutcome::Replenished;
                self.session.log(format!(
                    "Requested {} replacements for {} denars.",
                    losses, cost
                ));
            }
            MusterOption::KeepRetinue => {
                self.session.retinue_outcome = RetinueOutcome::Kept;
                self.session.log("Retinue kept as it stands.");
            }
            MusterOption::DismissRetinue => {
                let size = self.enlistment.retinue_size;
                if self.effect("adjust_retinue", |h| h.adjust_retinue(-(size as i32))) {
                    self.enlistment.retinue_size = 0;
                }
                self.session.retinue_outcome = RetinueOutcome::Dismissed;
                self.session.log(format!("Dismissed {} retainers.", size));
            }
            _ => {}
        }
    }

    fn gold(&mut self, effect: &'static str, amount: i32) -> bool {
        self.effect(effect, |h| h.give_gold(amount))
    }

    /// Runs one effect, recording a failure on the session.
    fn effect(&mut self, effect: &'static str, call: impl FnOnce(&mut H) -> HostResult) -> bool {
        match call(&mut *self.host) {
            Ok(()) => true,
            Err(source) => {
                let stage = self.session.current_stage;
                let err = MusterError::EffectApplication {
                    stage,
                    effect,
                    source,
                };
                warn!(code = err.code(), stage = %stage, effect, error = %err, "Muster effect failed; continuing");
                self.session.record_error(err.to_string());
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnlistConfig;
    use crate::sandbox::SandboxHost;
    use enlist_events::{CommanderId, TimeFlow};

    struct Fixture {
        host: SandboxHost,
        enlistment: EnlistmentState,
        session: MusterSessionState,
        rules: Rules,
    }

    impl Fixture {
        fn new(stage: MusterStage) -> Self {
            let mut enlistment = EnlistmentState::default();
            enlistment.enlist(CommanderId::new("lord_derthert"), 40);
            enlistment.tier = 6;
            let mut session = MusterSessionState::new(52, 40, 6, TimeFlow::Normal);
            session.current_stage = stage;
            Self {
                host: SandboxHost::new(1),
                enlistment,
                session,
                rules: Rules::from_config(&EnlistConfig::default()),
            }
        }

        fn facts(&self) -> StageFacts {
            StageFacts::capture(&self.host, &self.enlistment, &self.session, &self.rules.pay)
        }

        fn choose(&mut self, option: MusterOption) {
            let facts = self.facts();
            Resolution {
                host: &mut self.host,
                enlistment: &mut self.enlistment,
                session: &mut self.session,
                facts: &facts,
                rules: &self.rules,
            }
            .apply(option);
        }
    }

    #[test]
    fn test_full_pay_clears_backpay() {
        let mut fx = Fixture::new(MusterStage::Pay);
        fx.enlistment.pending_backpay = 120;
        let gold_before = fx.host.player_gold;
        fx.choose(MusterOption::AcceptFullPay);

        assert_eq!(fx.session.pay_outcome, Some(PayOutcome::Full));
        assert_eq!(fx.session.pay_amount, 480);
        assert_eq!(fx.session.backpay_paid, 120);
        assert_eq!(fx.enlistment.pending_backpay, 0);
        assert_eq!(fx.host.player_gold, gold_before + 600);
    }

    #[test]
    fn test_failed_payment_stays_owed() {
        let mut fx = Fixture::new(MusterStage::Pay);
        fx.host.failing_calls.insert("give_gold");
        fx.choose(MusterOption::AcceptFullPay);

        assert_eq!(fx.enlistment.pending_backpay, 480);
        assert_eq!(fx.session.pay_amount, 0);
        assert!(fx.session.effects_partially_failed);
        assert!(fx.session.encountered_errors[0].contains("give_gold"));
    }

    #[test]
    fn test_partial_pay_records_debt() {
        let mut fx = Fixture::new(MusterStage::Pay);
        fx.host.commander_funds = 300;
        fx.choose(MusterOption::AcceptPartialPay);

        assert_eq!(fx.session.pay_outcome, Some(PayOutcome::Partial));
        assert_eq!(fx.session.pay_amount, 300);
        assert_eq!(fx.enlistment.pending_backpay, 180);
    }

    #[test]
    fn test_iou_owes_everything() {
        let mut fx = Fixture::new(MusterStage::Pay);
        fx.host.commander_funds = 0;
        fx.choose(MusterOption::AcceptIou);

        assert_eq!(fx.session.pay_outcome, Some(PayOutcome::Iou));
        assert_eq!(fx.enlistment.pending_backpay, 480);
    }

    #[test]
    fn test_corruption_queues_grudge_and_hurts_relation() {
        let mut fx = Fixture::new(MusterStage::Pay);
        let relation = fx.host.relation;
        fx.choose(MusterOption::ReportCorruption);

        assert_eq!(fx.session.pay_outcome, Some(PayOutcome::Corruption));
        assert_eq!(fx.session.pay_amount, 480 + 96);
        assert_eq!(fx.host.relation, relation - 5);
        assert_eq!(fx.session.pending_escalation_events, vec![PAYMASTER_GRUDGE]);
    }

    #[test]
    fn test_relation_failure_does_not_stop_payment() {
        let mut fx = Fixture::new(MusterStage::Pay);
        fx.host.failing_calls.insert("change_relation");
        let gold_before = fx.host.player_gold;
        fx.choose(MusterOption::ReportCorruption);

        assert_eq!(fx.host.player_gold, gold_before + 576);
        assert_eq!(fx.session.encountered_errors.len(), 1);
        assert_eq!(fx.session.pay_outcome, Some(PayOutcome::Corruption));
    }

    #[test]
    fn test_final_discharge_pays_pension_and_queues_follow_on() {
        let mut fx = Fixture::new(MusterStage::Pay);
        fx.choose(MusterOption::RequestFinalDischarge);

        assert_eq!(fx.session.pay_amount, 480 * 4);
        assert_eq!(fx.session.follow_ons, vec![FollowOnAction::FinalDischarge]);
    }

    #[test]
    fn test_desertion_forfeits_backpay() {
        let mut fx = Fixture::new(MusterStage::Pay);
        fx.enlistment.pending_backpay = 200;
        fx.choose(MusterOption::Desert);

        assert_eq!(fx.enlistment.pending_backpay, 0);
        assert_eq!(fx.session.follow_ons, vec![FollowOnAction::Desertion]);
        assert!(fx.facts().service_ending);
    }

    #[test]
    fn test_bribe_takes_gold() {
        let mut fx = Fixture::new(MusterStage::Baggage);
        fx.host.contraband_value = 300;
        fx.host.player_gold = 500;
        fx.choose(MusterOption::BribeQuartermaster);

        assert_eq!(fx.session.baggage_outcome, BaggageOutcome::Bribed);
        assert_eq!(fx.session.contraband_value, 300);
        assert_eq!(fx.host.player_gold, 350);
    }

    #[test]
    fn test_search_confiscates() {
        let mut fx = Fixture::new(MusterStage::Baggage);
        fx.host.contraband_value = 300;
        fx.choose(MusterOption::SubmitToSearch);

        assert_eq!(fx.session.baggage_outcome, BaggageOutcome::Confiscated);
        assert_eq!(fx.host.contraband_value, 0);
    }

    #[test]
    fn test_inspection_uses_equipment_quality() {
        let mut fx = Fixture::new(MusterStage::Inspection);
        fx.host.equipment_quality = 0.3;
        fx.choose(MusterOption::StandInspection);

        assert_eq!(fx.session.inspection_outcome, InspectionOutcome::Failed);
        assert_eq!(fx.enlistment.last_inspection_day, 52);
        assert_eq!(fx.host.relation_changes, vec![-2]);
    }

    #[test]
    fn test_mentoring_awards_xp() {
        let mut fx = Fixture::new(MusterStage::Recruit);
        fx.choose(MusterOption::MentorRecruit);

        assert_eq!(fx.session.recruit_outcome, RecruitOutcome::Mentored);
        assert_eq!(fx.session.recruit_xp_awarded, 40);
        assert_eq!(fx.enlistment.xp, 40);
        assert_eq!(fx.enlistment.last_recruit_day, 52);
        assert_eq!(fx.host.skill_xp, vec![(Skill::Leadership, 40)]);
    }

    #[test]
    fn test_replacements_grow_retinue() {
        let mut fx = Fixture::new(MusterStage::Retinue);
        fx.enlistment.retinue_size = 3;
        fx.host.retinue_losses = 2;
        fx.host.player_gold = 1_000;
        fx.choose(MusterOption::RequestReplacements);

        assert_eq!(fx.session.retinue_outcome, RetinueOutcome::Replenished);
        assert_eq!(fx.session.retinue_replacements, 2);
        assert_eq!(fx.enlistment.retinue_size, 5);
        assert_eq!(fx.host.player_gold, 880);
    }

    #[test]
    fn test_complete_options_queue_follow_ons() {
        let mut fx = Fixture::new(MusterStage::Complete);
        fx.choose(MusterOption::FinishAndVisitQuartermaster);
        assert_eq!(fx.session.follow_ons, vec![FollowOnAction::OpenQuartermaster]);
    }
}
