//! In-progress muster session.
//!
//! A session is created when a muster begins and dropped when it completes
//! or aborts. While it exists its whole field set is written to the save.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::outcome::{
    BaggageOutcome, FollowOnAction, InspectionOutcome, PayOutcome, RecruitOutcome,
    RetinueOutcome, SkipReason, TimeFlow,
};
use crate::stage::MusterStage;
use crate::tag::ParseTagError;

/// A stage that was passed over and why.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSkip {
    pub stage: MusterStage,
    pub reason: SkipReason,
}

impl StageSkip {
    pub fn new(stage: MusterStage, reason: SkipReason) -> Self {
        Self { stage, reason }
    }
}

/// Compact "stage:reason" form used by the save channel.
impl fmt::Display for StageSkip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.stage, self.reason)
    }
}

impl FromStr for StageSkip {
    type Err = ParseTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (stage, reason) = s
            .split_once(':')
            .ok_or_else(|| ParseTagError::new("StageSkip", s))?;
        Ok(StageSkip {
            stage: stage.parse()?,
            reason: reason.parse()?,
        })
    }
}

/// State of the muster currently in progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MusterSessionState {
    pub current_stage: MusterStage,
    pub muster_day: u32,
    pub last_muster_day: u32,
    /// Tier when the muster began.
    pub tier_at_start: u32,

    // Pay
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pay_outcome: Option<PayOutcome>,
    pub pay_amount: i32,
    pub backpay_paid: i32,

    // Baggage
    pub baggage_outcome: BaggageOutcome,
    pub contraband_value: i32,

    // Inspection
    pub inspection_outcome: InspectionOutcome,

    // Recruit
    pub recruit_outcome: RecruitOutcome,
    pub recruit_xp_awarded: u32,

    // Promotion recap
    pub promotion_acknowledged: bool,

    // Retinue
    pub retinue_outcome: RetinueOutcome,
    pub retinue_replacements: u32,

    #[serde(default)]
    pub outcome_log: Vec<String>,
    #[serde(default)]
    pub stages_visited: Vec<MusterStage>,
    #[serde(default)]
    pub stages_skipped: Vec<StageSkip>,
    #[serde(default)]
    pub pending_escalation_events: Vec<String>,
    #[serde(default)]
    pub follow_ons: Vec<FollowOnAction>,
    #[serde(default)]
    pub encountered_errors: Vec<String>,
    #[serde(default)]
    pub effects_partially_failed: bool,

    /// Host time flow to restore when the muster ends.
    pub time_flow_before: TimeFlow,
}

impl MusterSessionState {
    /// Creates a session positioned at the intro stage.
    pub fn new(muster_day: u32, last_muster_day: u32, tier: u32, time_flow_before: TimeFlow) -> Self {
        Self {
            current_stage: MusterStage::Intro,
            muster_day,
            last_muster_day,
            tier_at_start: tier,
            pay_outcome: None,
            pay_amount: 0,
            backpay_paid: 0,
            baggage_outcome: BaggageOutcome::NotConducted,
            contraband_value: 0,
            inspection_outcome: InspectionOutcome::NotConducted,
            recruit_outcome: RecruitOutcome::NotConducted,
            recruit_xp_awarded: 0,
            promotion_acknowledged: false,
            retinue_outcome: RetinueOutcome::NotConducted,
            retinue_replacements: 0,
            outcome_log: Vec::new(),
            stages_visited: Vec::new(),
            stages_skipped: Vec::new(),
            pending_escalation_events: Vec::new(),
            follow_ons: Vec::new(),
            encountered_errors: Vec::new(),
            effects_partially_failed: false,
            time_flow_before,
        }
    }

    pub fn days_since_last_muster(&self) -> u32 {
        self.muster_day.saturating_sub(self.last_muster_day)
    }

    /// Appends a line to the outcome log.
    pub fn log(&mut self, line: impl Into<String>) {
        self.outcome_log.push(line.into());
    }

    /// Records a non-fatal failure.
    pub fn record_error(&mut self, message: impl Into<String>) {
        self.encountered_errors.push(message.into());
        self.effects_partially_failed = true;
    }

    /// Marks a stage as shown to the player.
    pub fn mark_visited(&mut self, stage: MusterStage) {
        if !self.stages_visited.contains(&stage) {
            self.stages_visited.push(stage);
        }
    }

    /// Marks a stage as passed over.
    pub fn mark_skipped(&mut self, stage: MusterStage, reason: SkipReason) {
        if !self.stages_skipped.iter().any(|s| s.stage == stage) {
            self.stages_skipped.push(StageSkip::new(stage, reason));
        }
    }

    pub fn was_skipped(&self, stage: MusterStage) -> bool {
        self.stages_skipped.iter().any(|s| s.stage == stage)
    }

    /// Queues an after-completion action. Each action is queued once.
    pub fn queue_follow_on(&mut self, action: FollowOnAction) {
        if !self.follow_ons.contains(&action) {
            self.follow_ons.push(action);
        }
    }

    pub fn queue_escalation(&mut self, event_id: impl Into<String>) {
        self.pending_escalation_events.push(event_id.into());
    }

    pub fn has_soft_failures(&self) -> bool {
        self.effects_partially_failed || !self.encountered_errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> MusterSessionState {
        MusterSessionState::new(52, 40, 6, TimeFlow::Fast)
    }

    #[test]
    fn test_new_session_starts_at_intro() {
        let s = session();
        assert_eq!(s.current_stage, MusterStage::Intro);
        assert_eq!(s.days_since_last_muster(), 12);
        assert_eq!(s.baggage_outcome, BaggageOutcome::NotConducted);
        assert!(!s.has_soft_failures());
    }

    #[test]
    fn test_record_error_marks_partial_failure() {
        let mut s = session();
        s.record_error("relation update failed");
        assert!(s.effects_partially_failed);
        assert_eq!(s.encountered_errors.len(), 1);
        assert!(s.has_soft_failures());
    }

    #[test]
    fn test_follow_on_deduplicated() {
        let mut s = session();
        s.queue_follow_on(FollowOnAction::OpenQuartermaster);
        s.queue_follow_on(FollowOnAction::OpenQuartermaster);
        s.queue_follow_on(FollowOnAction::RequestLeave);
        assert_eq!(
            s.follow_ons,
            vec![FollowOnAction::OpenQuartermaster, FollowOnAction::RequestLeave]
        );
    }

    #[test]
    fn test_skip_recorded_once() {
        let mut s = session();
        s.mark_skipped(MusterStage::Baggage, SkipReason::NoContraband);
        s.mark_skipped(MusterStage::Baggage, SkipReason::CheckNotRolled);
        assert_eq!(s.stages_skipped.len(), 1);
        assert!(s.was_skipped(MusterStage::Baggage));
        assert!(!s.was_skipped(MusterStage::Recruit));
    }

    #[test]
    fn test_stage_skip_string_form() {
        let skip = StageSkip::new(MusterStage::Recruit, SkipReason::RankTooLow);
        assert_eq!(skip.to_string(), "recruit:rank_too_low");
        assert_eq!("recruit:rank_too_low".parse::<StageSkip>().unwrap(), skip);
        assert!("recruit".parse::<StageSkip>().is_err());
        assert!("parade:rank_too_low".parse::<StageSkip>().is_err());
    }

    #[test]
    fn test_session_json_roundtrip() {
        let mut s = session();
        s.pay_outcome = Some(PayOutcome::Iou);
        s.log("Paid in promises");
        let json = serde_json::to_string(&s).unwrap();
        let back: MusterSessionState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }
}
