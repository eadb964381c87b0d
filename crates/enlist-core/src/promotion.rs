//! XP and tier bookkeeping.

use enlist_events::EnlistmentState;
use tracing::info;

use crate::config::PromotionConfig;

/// Adds XP and promotes if a tier threshold was crossed.
///
/// Returns the new tier on promotion. Tiers never go down here.
pub fn apply_xp(
    enlistment: &mut EnlistmentState,
    amount: u32,
    day: u32,
    config: &PromotionConfig,
) -> Option<u32> {
    enlistment.xp = enlistment.xp.saturating_add(amount);
    let earned = config.tier_for_xp(enlistment.xp).min(config.max_tier());
    if earned > enlistment.tier {
        enlistment.record_promotion(earned, day);
        info!(tier = earned, xp = enlistment.xp, day, "Promoted");
        Some(earned)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use enlist_events::CommanderId;

    fn enlisted() -> EnlistmentState {
        let mut state = EnlistmentState::default();
        state.enlist(CommanderId::new("lord_derthert"), 1);
        state
    }

    #[test]
    fn test_xp_below_threshold_no_promotion() {
        let mut state = enlisted();
        assert_eq!(apply_xp(&mut state, 500, 3, &PromotionConfig::default()), None);
        assert_eq!(state.xp, 500);
        assert_eq!(state.tier, 1);
    }

    #[test]
    fn test_crossing_threshold_promotes() {
        let mut state = enlisted();
        assert_eq!(apply_xp(&mut state, 2100, 9, &PromotionConfig::default()), Some(3));
        assert_eq!(state.tier, 3);
        assert_eq!(state.day_of_last_promotion, 9);
        assert!(state.promoted_since_last_muster());
    }

    #[test]
    fn test_tier_capped() {
        let mut state = enlisted();
        let config = PromotionConfig {
            tier_xp: vec![0, 100],
        };
        assert_eq!(apply_xp(&mut state, 10_000, 2, &config), Some(2));
        assert_eq!(apply_xp(&mut state, 10_000, 3, &config), None);
    }
}
