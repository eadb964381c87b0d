//! Stage-entry facts and skip rules.
//!
//! Facts are read once when a stage is entered (and again when an option is
//! resolved) so that a single decision never sees the world change under it.
//! Skip rules are pure over those facts.

use enlist_events::{
    EnlistmentState, FollowOnAction, MusterSessionState, MusterStage, PayOutcome, SkipReason,
};

use crate::config::{MusterConfig, PayConfig};
use crate::host::{Skill, WorldFacts};

/// Snapshot of everything stage skip rules and option predicates consult.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StageFacts {
    pub day: u32,
    pub tier: u32,
    pub xp: u32,
    pub promoted_since_last_muster: bool,
    pub days_since_last_muster: u32,
    pub days_served: u32,
    pub last_inspection_day: u32,
    pub last_recruit_day: u32,

    pub player_health: f32,
    pub player_gold: i32,
    pub leadership: u32,
    pub roguery: u32,
    pub trade: u32,
    pub charm: u32,
    pub relation: i32,

    pub contraband_value: i32,
    pub equipment_quality: f32,
    pub commander_funds: i32,
    pub retinue_size: u32,
    pub retinue_losses: u32,

    /// Drawn on entry to the baggage stage.
    pub baggage_roll: f32,
    /// Drawn on entry to the recruit stage.
    pub recruit_roll: f32,

    /// Wages earned since the last muster.
    pub wage_due: i32,
    /// Wages owed from earlier musters.
    pub backpay: i32,
    /// The player has already chosen to leave service this muster.
    pub service_ending: bool,
}

impl StageFacts {
    /// Reads facts for the session's current muster. Rolls are left at zero;
    /// see [`StageFacts::draw_roll`].
    pub fn capture<H: WorldFacts + ?Sized>(
        host: &H,
        enlistment: &EnlistmentState,
        session: &MusterSessionState,
        pay: &PayConfig,
    ) -> Self {
        let day = host.now().day;
        let days_since_last_muster = session.days_since_last_muster();
        let service_ending = session.pay_outcome.is_some_and(PayOutcome::ends_service)
            || session.follow_ons.iter().any(|f| {
                matches!(f, FollowOnAction::FinalDischarge | FollowOnAction::Desertion)
            });

        Self {
            day,
            tier: enlistment.tier,
            xp: enlistment.xp,
            promoted_since_last_muster: enlistment.promoted_since_last_muster(),
            days_since_last_muster,
            days_served: enlistment.days_served(day),
            last_inspection_day: enlistment.last_inspection_day,
            last_recruit_day: enlistment.last_recruit_day,
            player_health: host.player_health(),
            player_gold: host.player_gold(),
            leadership: host.skill(Skill::Leadership),
            roguery: host.skill(Skill::Roguery),
            trade: host.skill(Skill::Trade),
            charm: host.skill(Skill::Charm),
            relation: host.relation_with_commander(),
            contraband_value: host.contraband_value(),
            equipment_quality: host.equipment_quality(),
            commander_funds: host.commander_funds(),
            retinue_size: enlistment.retinue_size,
            retinue_losses: host.retinue_losses(),
            baggage_roll: 0.0,
            recruit_roll: 0.0,
            wage_due: pay.wage_for(enlistment.tier, days_since_last_muster),
            backpay: enlistment.pending_backpay.max(0),
            service_ending,
        }
    }

    /// Draws the random roll the given stage's skip rule needs, if any.
    pub fn draw_roll<H: WorldFacts + ?Sized>(&mut self, stage: MusterStage, host: &mut H) {
        match stage {
            MusterStage::Baggage => self.baggage_roll = host.roll(),
            MusterStage::Recruit => self.recruit_roll = host.roll(),
            _ => {}
        }
    }

    /// Total the paymaster owes this muster.
    pub fn payable(&self) -> i32 {
        self.wage_due + self.backpay
    }
}

/// Decides whether `stage` is passed over. Intro, pay and complete are never
/// skipped.
pub fn skip_reason(
    stage: MusterStage,
    facts: &StageFacts,
    config: &MusterConfig,
) -> Option<SkipReason> {
    match stage {
        MusterStage::Intro | MusterStage::Pay | MusterStage::Complete => None,
        MusterStage::Baggage => {
            if facts.contraband_value <= 0 {
                Some(SkipReason::NoContraband)
            } else if facts.baggage_roll < config.baggage_trigger_roll {
                Some(SkipReason::CheckNotRolled)
            } else {
                None
            }
        }
        MusterStage::Inspection => {
            if !cooldown_elapsed(
                facts.last_inspection_day,
                facts.day,
                config.inspection_cooldown_days,
            ) {
                Some(SkipReason::CooldownActive)
            } else if facts.player_health < config.inspection_min_health {
                Some(SkipReason::TooWounded)
            } else {
                None
            }
        }
        MusterStage::Recruit => {
            if facts.tier < config.recruit_min_tier {
                Some(SkipReason::RankTooLow)
            } else if !cooldown_elapsed(
                facts.last_recruit_day,
                facts.day,
                config.recruit_cooldown_days,
            ) {
                Some(SkipReason::CooldownActive)
            } else if facts.recruit_roll < config.recruit_trigger_roll {
                Some(SkipReason::RollBelowThreshold)
            } else {
                None
            }
        }
        MusterStage::PromotionRecap => {
            (!facts.promoted_since_last_muster).then_some(SkipReason::NoPromotion)
        }
        MusterStage::Retinue => {
            (facts.tier < config.retinue_min_tier).then_some(SkipReason::NotRetinueRank)
        }
    }
}

/// Day zero means the event never happened.
fn cooldown_elapsed(last_day: u32, today: u32, cooldown_days: u32) -> bool {
    last_day == 0 || today.saturating_sub(last_day) >= cooldown_days
}

#[cfg(test)]
mod tests {
    use super::*;

    fn veteran() -> StageFacts {
        StageFacts {
            day: 52,
            tier: 6,
            days_since_last_muster: 12,
            days_served: 60,
            last_inspection_day: 28,
            last_recruit_day: 0,
            player_health: 0.9,
            baggage_roll: 0.9,
            recruit_roll: 0.9,
            ..StageFacts::default()
        }
    }

    #[test]
    fn test_fixed_stages_never_skip() {
        let facts = StageFacts::default();
        let cfg = MusterConfig::default();
        for stage in [MusterStage::Intro, MusterStage::Pay, MusterStage::Complete] {
            assert_eq!(skip_reason(stage, &facts, &cfg), None);
        }
    }

    #[test]
    fn test_baggage_rules() {
        let cfg = MusterConfig::default();
        let mut facts = veteran();
        assert_eq!(
            skip_reason(MusterStage::Baggage, &facts, &cfg),
            Some(SkipReason::NoContraband)
        );

        facts.contraband_value = 200;
        assert_eq!(skip_reason(MusterStage::Baggage, &facts, &cfg), None);

        facts.baggage_roll = 0.1;
        assert_eq!(
            skip_reason(MusterStage::Baggage, &facts, &cfg),
            Some(SkipReason::CheckNotRolled)
        );
    }

    #[test]
    fn test_inspection_rules() {
        let cfg = MusterConfig::default();
        let mut facts = veteran();
        assert_eq!(skip_reason(MusterStage::Inspection, &facts, &cfg), None);

        facts.last_inspection_day = 48;
        assert_eq!(
            skip_reason(MusterStage::Inspection, &facts, &cfg),
            Some(SkipReason::CooldownActive)
        );

        facts.last_inspection_day = 0;
        facts.player_health = 0.2;
        assert_eq!(
            skip_reason(MusterStage::Inspection, &facts, &cfg),
            Some(SkipReason::TooWounded)
        );
    }

    #[test]
    fn test_recruit_rules() {
        let cfg = MusterConfig::default();
        let mut facts = veteran();
        assert_eq!(skip_reason(MusterStage::Recruit, &facts, &cfg), None);

        facts.recruit_roll = 0.1;
        assert_eq!(
            skip_reason(MusterStage::Recruit, &facts, &cfg),
            Some(SkipReason::RollBelowThreshold)
        );

        facts.recruit_roll = 0.9;
        facts.last_recruit_day = 50;
        assert_eq!(
            skip_reason(MusterStage::Recruit, &facts, &cfg),
            Some(SkipReason::CooldownActive)
        );

        facts.tier = 2;
        assert_eq!(
            skip_reason(MusterStage::Recruit, &facts, &cfg),
            Some(SkipReason::RankTooLow)
        );
    }

    #[test]
    fn test_conditional_stages() {
        let cfg = MusterConfig::default();
        let mut facts = veteran();
        assert_eq!(
            skip_reason(MusterStage::PromotionRecap, &facts, &cfg),
            Some(SkipReason::NoPromotion)
        );
        assert_eq!(
            skip_reason(MusterStage::Retinue, &facts, &cfg),
            Some(SkipReason::NotRetinueRank)
        );

        facts.promoted_since_last_muster = true;
        facts.tier = 7;
        assert_eq!(skip_reason(MusterStage::PromotionRecap, &facts, &cfg), None);
        assert_eq!(skip_reason(MusterStage::Retinue, &facts, &cfg), None);
    }

    #[test]
    fn test_skip_rules_are_deterministic() {
        let cfg = MusterConfig::default();
        let facts = veteran();
        for stage in MusterStage::ALL {
            let first = skip_reason(*stage, &facts, &cfg);
            for _ in 0..5 {
                assert_eq!(skip_reason(*stage, &facts, &cfg), first);
            }
        }
    }

    #[test]
    fn test_payable_includes_backpay() {
        let facts = StageFacts {
            wage_due: 480,
            backpay: 120,
            ..StageFacts::default()
        };
        assert_eq!(facts.payable(), 600);
    }
}
