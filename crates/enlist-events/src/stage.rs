//! Muster stage identifiers.
//!
//! The muster runs through eight stages in a fixed nominal order. Two of them
//! are conditional (promotion recap, retinue) and three skip themselves on
//! entry when their gating facts say so (baggage, inspection, recruit).

tag_enum! {
    /// One step of the muster sequence.
    pub enum MusterStage {
        /// Formation is called; the player is told the muster has begun.
        Intro => "intro",
        /// Wages are resolved.
        Pay => "pay",
        /// Contraband check of the player's baggage.
        Baggage => "baggage",
        /// Equipment inspection.
        Inspection => "inspection",
        /// A new recruit is handed to the player.
        Recruit => "recruit",
        /// Recap of a promotion earned since the last muster.
        PromotionRecap => "promotion_recap",
        /// Review of the player's own retinue.
        Retinue => "retinue",
        /// Summary and dismissal.
        Complete => "complete",
    }
}

impl MusterStage {
    /// Position in the nominal order, starting at zero.
    pub fn ordinal(self) -> usize {
        match self {
            MusterStage::Intro => 0,
            MusterStage::Pay => 1,
            MusterStage::Baggage => 2,
            MusterStage::Inspection => 3,
            MusterStage::Recruit => 4,
            MusterStage::PromotionRecap => 5,
            MusterStage::Retinue => 6,
            MusterStage::Complete => 7,
        }
    }

    /// Returns the stage that nominally follows this one.
    pub fn next(self) -> Option<MusterStage> {
        match self {
            MusterStage::Intro => Some(MusterStage::Pay),
            MusterStage::Pay => Some(MusterStage::Baggage),
            MusterStage::Baggage => Some(MusterStage::Inspection),
            MusterStage::Inspection => Some(MusterStage::Recruit),
            MusterStage::Recruit => Some(MusterStage::PromotionRecap),
            MusterStage::PromotionRecap => Some(MusterStage::Retinue),
            MusterStage::Retinue => Some(MusterStage::Complete),
            MusterStage::Complete => None,
        }
    }

    /// True for the final stage.
    pub fn is_terminal(self) -> bool {
        matches!(self, MusterStage::Complete)
    }

    /// True for stages that only run when a precondition holds.
    pub fn is_conditional(self) -> bool {
        matches!(self, MusterStage::PromotionRecap | MusterStage::Retinue)
    }

    /// True for stages that re-check their gating facts on entry.
    pub fn is_self_skipping(self) -> bool {
        matches!(
            self,
            MusterStage::Baggage | MusterStage::Inspection | MusterStage::Recruit
        )
    }

    /// True if this stage may be passed over without user input.
    pub fn may_skip(self) -> bool {
        self.is_conditional() || self.is_self_skipping()
    }
}
