//! Per-stage outcome tags and related small enums.

tag_enum! {
    /// How wages were settled at the pay stage.
    pub enum PayOutcome {
        Full => "full",
        Partial => "partial",
        /// Commander could not pay; the amount is owed as backpay.
        Iou => "iou",
        /// Player exposed the paymaster skimming wages.
        Corruption => "corruption",
        SideDeal => "side_deal",
        FinalDischarge => "final_discharge",
        Desertion => "desertion",
    }
}

tag_enum! {
    /// Result of the contraband check.
    pub enum BaggageOutcome {
        NotConducted => "not_conducted",
        Clean => "clean",
        Confiscated => "confiscated",
        Bribed => "bribed",
        Smuggled => "smuggled",
    }
}

tag_enum! {
    /// Result of the equipment inspection.
    pub enum InspectionOutcome {
        NotConducted => "not_conducted",
        Passed => "passed",
        Failed => "failed",
        Excused => "excused",
    }
}

tag_enum! {
    /// What the player did with the recruit handed to them.
    pub enum RecruitOutcome {
        NotConducted => "not_conducted",
        Mentored => "mentored",
        Assigned => "assigned",
        Ignored => "ignored",
    }
}

tag_enum! {
    /// Result of the retinue review.
    pub enum RetinueOutcome {
        NotConducted => "not_conducted",
        Replenished => "replenished",
        Kept => "kept",
        Dismissed => "dismissed",
    }
}

tag_enum! {
    /// Action chosen mid-sequence that runs only after the muster completes.
    pub enum FollowOnAction {
        OpenQuartermaster => "open_quartermaster",
        RequestLeave => "request_leave",
        FinalDischarge => "final_discharge",
        Desertion => "desertion",
    }
}

tag_enum! {
    /// Why a stage was passed over without user input.
    pub enum SkipReason {
        NoContraband => "no_contraband",
        CheckNotRolled => "check_not_rolled",
        CooldownActive => "cooldown_active",
        TooWounded => "too_wounded",
        RankTooLow => "rank_too_low",
        RollBelowThreshold => "roll_below_threshold",
        NoPromotion => "no_promotion",
        NotRetinueRank => "not_retinue_rank",
    }
}

tag_enum! {
    /// Host time-flow mode, captured before the muster pauses the clock.
    pub enum TimeFlow {
        Stopped => "stopped",
        Normal => "normal",
        Fast => "fast",
    }
}

impl Default for BaggageOutcome {
    fn default() -> Self {
        BaggageOutcome::NotConducted
    }
}

impl Default for InspectionOutcome {
    fn default() -> Self {
        InspectionOutcome::NotConducted
    }
}

impl Default for RecruitOutcome {
    fn default() -> Self {
        RecruitOutcome::NotConducted
    }
}

impl Default for RetinueOutcome {
    fn default() -> Self {
        RetinueOutcome::NotConducted
    }
}

impl Default for TimeFlow {
    fn default() -> Self {
        TimeFlow::Normal
    }
}

impl PayOutcome {
    /// True when this outcome ends the enlistment once the muster closes.
    pub fn ends_service(self) -> bool {
        matches!(self, PayOutcome::FinalDischarge | PayOutcome::Desertion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pay_outcome_tags() {
        let tags: Vec<&str> = PayOutcome::ALL.iter().map(|o| o.as_str()).collect();
        assert_eq!(
            tags,
            vec!["full", "partial", "iou", "corruption", "side_deal", "final_discharge", "desertion"]
        );
    }

    #[test]
    fn test_serde_spelling_matches_tag() {
        for outcome in PayOutcome::ALL {
            let json = serde_json::to_string(outcome).unwrap();
            assert_eq!(json, format!("\"{}\"", outcome.as_str()));
        }
        for reason in SkipReason::ALL {
            let json = serde_json::to_string(reason).unwrap();
            assert_eq!(json, format!("\"{}\"", reason.as_str()));
        }
    }

    #[test]
    fn test_defaults_are_not_conducted() {
        assert_eq!(BaggageOutcome::default(), BaggageOutcome::NotConducted);
        assert_eq!(InspectionOutcome::default().as_str(), "not_conducted");
        assert_eq!(TimeFlow::default(), TimeFlow::Normal);
    }

    #[test]
    fn test_ends_service() {
        assert!(PayOutcome::Desertion.ends_service());
        assert!(!PayOutcome::Iou.ends_service());
    }

    #[test]
    fn test_unknown_outcome_rejected() {
        assert!("embezzled".parse::<PayOutcome>().is_err());
        assert_eq!("bribed".parse::<BaggageOutcome>().unwrap(), BaggageOutcome::Bribed);
    }
}
