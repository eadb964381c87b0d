//! Options offered at each stage and their availability.

use enlist_events::{MusterSessionState, MusterStage};
use serde::Serialize;

use super::stages::StageFacts;
use super::Rules;
use crate::config::PayConfig;

enlist_events::tag_enum! {
    /// A choice the player can make during a muster.
    pub enum MusterOption {
        // Intro
        Proceed => "proceed",
        // Pay
        AcceptFullPay => "accept_full_pay",
        AcceptPartialPay => "accept_partial_pay",
        AcceptIou => "accept_iou",
        ReportCorruption => "report_corruption",
        SideDeal => "side_deal",
        RequestFinalDischarge => "request_final_discharge",
        Desert => "desert",
        // Baggage
        SubmitToSearch => "submit_to_search",
        BribeQuartermaster => "bribe_quartermaster",
        SmuggleContraband => "smuggle_contraband",
        BaggageProceed => "baggage_proceed",
        // Inspection
        StandInspection => "stand_inspection",
        RequestExcusal => "request_excusal",
        // Recruit
        MentorRecruit => "mentor_recruit",
        AssignToSergeant => "assign_to_sergeant",
        IgnoreRecruit => "ignore_recruit",
        // Promotion recap
        Acknowledge => "acknowledge",
        // Retinue
        RequestReplacements => "request_replacements",
        KeepRetinue => "keep_retinue",
        DismissRetinue => "dismiss_retinue",
        // Complete
        Finish => "finish",
        FinishAndVisitQuartermaster => "finish_and_visit_quartermaster",
        FinishAndRequestLeave => "finish_and_request_leave",
    }
}

impl MusterOption {
    /// The stage this option belongs to.
    pub fn stage(self) -> MusterStage {
        match self {
            MusterOption::Proceed => MusterStage::Intro,
            MusterOption::AcceptFullPay
            | MusterOption::AcceptPartialPay
            | MusterOption::AcceptIou
            | MusterOption::ReportCorruption
            | MusterOption::SideDeal
            | MusterOption::RequestFinalDischarge
            | MusterOption::Desert => MusterStage::Pay,
            MusterOption::SubmitToSearch
            | MusterOption::BribeQuartermaster
            | MusterOption::SmuggleContraband
            | MusterOption::BaggageProceed => MusterStage::Baggage,
            MusterOption::StandInspection | MusterOption::RequestExcusal => {
                MusterStage::Inspection
            }
            MusterOption::MentorRecruit
            | MusterOption::AssignToSergeant
            | MusterOption::IgnoreRecruit => MusterStage::Recruit,
            MusterOption::Acknowledge => MusterStage::PromotionRecap,
            MusterOption::RequestReplacements
            | MusterOption::KeepRetinue
            | MusterOption::DismissRetinue => MusterStage::Retinue,
            MusterOption::Finish
            | MusterOption::FinishAndVisitQuartermaster
            | MusterOption::FinishAndRequestLeave => MusterStage::Complete,
        }
    }

    /// Options of `stage`, in display order.
    pub fn options_for(stage: MusterStage) -> Vec<MusterOption> {
        Self::ALL
            .iter()
            .copied()
            .filter(|option| option.stage() == stage)
            .collect()
    }

    /// Leaving service ends the muster early: the remaining stages are moot.
    pub fn jumps_to_complete(self) -> bool {
        matches!(self, MusterOption::RequestFinalDischarge | MusterOption::Desert)
    }

    /// Whether the option may be chosen given `facts`.
    pub fn is_available(self, facts: &StageFacts, rules: &Rules) -> bool {
        let muster = &rules.muster;
        let pay = &rules.pay;
        let payable = facts.payable();
        let has_contraband = facts.contraband_value > 0;

        match self {
            MusterOption::AcceptFullPay => facts.commander_funds >= payable,
            MusterOption::AcceptPartialPay => {
                facts.commander_funds > 0 && facts.commander_funds < payable
            }
            MusterOption::AcceptIou => facts.commander_funds < payable,
            MusterOption::ReportCorruption => facts.roguery >= pay.corruption_min_roguery,
            MusterOption::SideDeal => facts.trade >= pay.side_deal_min_trade,
            MusterOption::RequestFinalDischarge => {
                facts.tier >= pay.final_discharge_min_tier
                    && facts.days_served >= pay.final_discharge_min_days
            }
            MusterOption::SubmitToSearch => has_contraband,
            MusterOption::BribeQuartermaster => {
                has_contraband && facts.player_gold >= bribe_cost(facts.contraband_value, pay)
            }
            MusterOption::SmuggleContraband => {
                has_contraband && facts.roguery >= pay.smuggle_min_roguery
            }
            MusterOption::BaggageProceed => !has_contraband,
            MusterOption::RequestExcusal => facts.relation >= muster.excusal_min_relation,
            MusterOption::MentorRecruit => facts.leadership >= muster.mentor_min_leadership,
            MusterOption::RequestReplacements => {
                facts.retinue_losses > 0
                    && facts.player_gold >= replacement_cost(facts.retinue_losses, rules)
            }
            MusterOption::DismissRetinue => facts.retinue_size > 0,
            MusterOption::FinishAndVisitQuartermaster | MusterOption::FinishAndRequestLeave => {
                !facts.service_ending
            }
            MusterOption::Proceed
            | MusterOption::Desert
            | MusterOption::StandInspection
            | MusterOption::AssignToSergeant
            | MusterOption::IgnoreRecruit
            | MusterOption::Acknowledge
            | MusterOption::KeepRetinue
            | MusterOption::Finish => true,
        }
    }
}

pub(crate) fn bribe_cost(contraband_value: i32, pay: &PayConfig) -> i32 {
    (contraband_value as f32 * pay.bribe_fraction).round() as i32
}

pub(crate) fn replacement_cost(losses: u32, rules: &Rules) -> i32 {
    rules.muster.replacement_cost.saturating_mul(losses as i32)
}

/// One option as rendered.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionView {
    pub option: MusterOption,
    pub available: bool,
}

/// What the presentation layer shows for a stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageView {
    pub stage: MusterStage,
    pub muster_day: u32,
    pub options: Vec<OptionView>,
    /// Outcome log so far, or the summary on the complete stage.
    pub outcome_lines: Vec<String>,
}

impl StageView {
    pub(crate) fn build(
        stage: MusterStage,
        session: &MusterSessionState,
        facts: &StageFacts,
        rules: &Rules,
        outcome_lines: Vec<String>,
    ) -> Self {
        let options = MusterOption::options_for(stage)
            .into_iter()
            .map(|option| OptionView {
                option,
                available: option.is_available(facts, rules),
            })
            .collect();
        Self {
            stage,
            muster_day: session.muster_day,
            options,
            outcome_lines,
        }
    }

    pub fn available(&self) -> impl Iterator<Item = MusterOption> + '_ {
        self.options
            .iter()
            .filter(|view| view.available)
            .map(|view| view.option)
    }

    pub fn first_available(&self) -> Option<MusterOption> {
        self.available().next()
    }

    pub fn is_available(&self, option: MusterOption) -> bool {
        self.options
            .iter()
            .any(|view| view.option == option && view.available)
    }
}
