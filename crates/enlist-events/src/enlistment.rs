//! Enlistment status.
//!
//! One `EnlistmentState` exists per save. Day counters use the campaign day
//! index; a counter of zero means the event has never happened.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lookup key for the commander agent. Holding one does not keep the
/// commander alive; callers must ask the host whether it still exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommanderId(pub String);

impl CommanderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommanderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Persistent enlistment status of the player.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EnlistmentState {
    /// Commander the player serves under.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commander: Option<CommanderId>,
    pub is_enlisted: bool,
    pub tier: u32,
    pub xp: u32,
    pub xp_at_last_muster: u32,
    pub tier_at_last_muster: u32,
    pub day_of_last_promotion: u32,
    pub last_muster_day: u32,
    pub last_inspection_day: u32,
    pub last_recruit_day: u32,
    /// Day service began.
    pub enlisted_on_day: u32,
    /// Wages owed from skipped musters and IOUs.
    pub pending_backpay: i32,
    /// Soldiers attached to the player at retinue rank.
    pub retinue_size: u32,
}

impl EnlistmentState {
    /// Starts service under `commander` on `day`.
    ///
    /// Resets rank and baselines; the muster clock starts from the day of
    /// enlistment.
    pub fn enlist(&mut self, commander: CommanderId, day: u32) {
        *self = EnlistmentState {
            commander: Some(commander),
            is_enlisted: true,
            tier: 1,
            tier_at_last_muster: 1,
            last_muster_day: day,
            enlisted_on_day: day,
            ..EnlistmentState::default()
        };
    }

    /// Ends service. Rank history is kept for display; the commander
    /// reference is dropped.
    pub fn discharge(&mut self) {
        self.is_enlisted = false;
        self.commander = None;
        self.retinue_size = 0;
    }

    /// The enlisted-implies-commander invariant.
    pub fn is_consistent(&self) -> bool {
        !self.is_enlisted || self.commander.is_some()
    }

    pub fn days_served(&self, today: u32) -> u32 {
        today.saturating_sub(self.enlisted_on_day)
    }

    pub fn days_since_muster(&self, today: u32) -> u32 {
        today.saturating_sub(self.last_muster_day)
    }

    /// True if rank went up since the last muster closed.
    pub fn promoted_since_last_muster(&self) -> bool {
        self.tier > self.tier_at_last_muster
            || (self.day_of_last_promotion != 0 && self.day_of_last_promotion > self.last_muster_day)
    }

    pub fn xp_since_last_muster(&self) -> u32 {
        self.xp.saturating_sub(self.xp_at_last_muster)
    }

    /// Raises the tier and stamps the promotion day.
    pub fn record_promotion(&mut self, new_tier: u32, day: u32) {
        if new_tier > self.tier {
            self.tier = new_tier;
            self.day_of_last_promotion = day;
        }
    }

    /// Advances the muster baselines after a muster closes.
    pub fn close_muster(&mut self, day: u32) {
        self.xp_at_last_muster = self.xp;
        self.tier_at_last_muster = self.tier;
        self.last_muster_day = self.last_muster_day.max(day);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enlist_sets_baselines() {
        let mut state = EnlistmentState::default();
        state.enlist(CommanderId::new("lord_derthert"), 40);

        assert!(state.is_enlisted);
        assert_eq!(state.tier, 1);
        assert_eq!(state.last_muster_day, 40);
        assert_eq!(state.days_since_muster(52), 12);
        assert!(state.is_consistent());
        assert!(!state.promoted_since_last_muster());
    }

    #[test]
    fn test_discharge_clears_commander() {
        let mut state = EnlistmentState::default();
        state.enlist(CommanderId::new("lord_derthert"), 1);
        state.tier = 4;
        state.discharge();

        assert!(!state.is_enlisted);
        assert!(state.commander.is_none());
        assert_eq!(state.tier, 4);
        assert!(state.is_consistent());
    }

    #[test]
    fn test_invariant_detects_missing_commander() {
        let state = EnlistmentState {
            is_enlisted: true,
            ..EnlistmentState::default()
        };
        assert!(!state.is_consistent());
    }

    #[test]
    fn test_promotion_tracking() {
        let mut state = EnlistmentState::default();
        state.enlist(CommanderId::new("lord_derthert"), 1);
        state.record_promotion(2, 9);
        assert!(state.promoted_since_last_muster());

        state.close_muster(13);
        assert!(!state.promoted_since_last_muster());
        assert_eq!(state.tier_at_last_muster, 2);

        // Lower tier is not a promotion
        state.record_promotion(1, 20);
        assert_eq!(state.tier, 2);
        assert_eq!(state.day_of_last_promotion, 9);
    }

    #[test]
    fn test_close_muster_never_moves_day_backwards() {
        let mut state = EnlistmentState::default();
        state.enlist(CommanderId::new("c"), 30);
        state.close_muster(10);
        assert_eq!(state.last_muster_day, 30);
    }

    #[test]
    fn test_commander_id_serializes_transparently() {
        let id = CommanderId::new("lord_derthert");
        assert_eq!(serde_json::to_string(&id).unwrap(), r#""lord_derthert""#);
        assert_eq!(id.to_string(), "lord_derthert");
    }
}
