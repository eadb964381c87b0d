//! Configuration loading.
//!
//! Tuning values (tether gains, muster cadence, wages) are loaded from a TOML
//! file. Every field has a default, so a partial file is valid.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Complete enlistment configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnlistConfig {
    #[serde(default)]
    pub attachment: AttachmentConfig,
    #[serde(default)]
    pub muster: MusterConfig,
    #[serde(default)]
    pub pay: PayConfig,
    #[serde(default)]
    pub promotion: PromotionConfig,
    #[serde(default)]
    pub general: GeneralConfig,
}

impl EnlistConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Serializes this configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Tether and escort tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttachmentConfig {
    /// Squared distance under which no correction is applied
    pub near_threshold_sq: f32,
    /// Squared distance above which the recovery gain is used
    pub recovery_threshold_sq: f32,
    /// Distance behind the commander the player is pulled toward
    pub follow_offset: f32,
    /// Per-second gain for normal tether correction
    pub near_gain: f32,
    /// Per-second gain for drift recovery
    pub recovery_gain: f32,
    /// Seconds between escort order refreshes
    pub escort_refresh_secs: f32,
    /// Seconds between camera follow refreshes
    pub camera_refresh_secs: f32,
    /// Length of the "ignore me" horizon set on each escort refresh
    pub ignore_horizon_secs: f32,
    /// Countdown after load or battle exit before touching camera/visibility
    pub settle_secs: f32,
    /// Distance from the commander the player is placed at to join a battle
    pub battle_nudge_offset: f32,
}

impl Default for AttachmentConfig {
    fn default() -> Self {
        Self {
            near_threshold_sq: 0.36,
            recovery_threshold_sq: 1.44,
            follow_offset: 0.5,
            near_gain: 8.0,
            recovery_gain: 5.0,
            escort_refresh_secs: 0.1,
            camera_refresh_secs: 0.5,
            ignore_horizon_secs: 0.5,
            settle_secs: 1.0,
            battle_nudge_offset: 0.2,
        }
    }
}

/// Muster cadence and stage gating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MusterConfig {
    /// Days between musters
    pub interval_days: u32,
    /// Baggage check is skipped when its roll is below this value
    pub baggage_trigger_roll: f32,
    pub inspection_cooldown_days: u32,
    /// Inspection is skipped when player health (0..1) is below this
    pub inspection_min_health: f32,
    /// Equipment quality (0..1) needed to pass inspection
    pub inspection_pass_quality: f32,
    pub inspection_pass_relation: i32,
    pub inspection_fail_relation: i32,
    pub excusal_min_relation: i32,
    pub recruit_min_tier: u32,
    pub recruit_cooldown_days: u32,
    /// Recruit stage is skipped when its roll is below this value
    pub recruit_trigger_roll: f32,
    pub mentor_min_leadership: u32,
    pub mentor_xp: u32,
    pub retinue_min_tier: u32,
    pub replacement_cost: i32,
    /// Number of outcome records kept for display
    pub history_limit: usize,
}

impl Default for MusterConfig {
    fn default() -> Self {
        Self {
            interval_days: 12,
            baggage_trigger_roll: 0.3,
            inspection_cooldown_days: 7,
            inspection_min_health: 0.4,
            inspection_pass_quality: 0.5,
            inspection_pass_relation: 2,
            inspection_fail_relation: -2,
            excusal_min_relation: 20,
            recruit_min_tier: 3,
            recruit_cooldown_days: 7,
            recruit_trigger_roll: 0.35,
            mentor_min_leadership: 50,
            mentor_xp: 40,
            retinue_min_tier: 7,
            replacement_cost: 60,
            history_limit: 20,
        }
    }
}

/// Wage resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PayConfig {
    pub base_daily_wage: i32,
    pub wage_per_tier: i32,
    pub side_deal_min_trade: u32,
    /// Fraction of the wage added by a side deal
    pub side_deal_bonus: f32,
    pub corruption_min_roguery: u32,
    /// Fraction of the wage recovered from a corrupt paymaster
    pub corruption_recovered_fraction: f32,
    pub corruption_relation_penalty: i32,
    pub bribe_fraction: f32,
    pub smuggle_min_roguery: u32,
    pub final_discharge_min_tier: u32,
    pub final_discharge_min_days: u32,
    pub pension_multiplier: i32,
    pub desertion_relation_penalty: i32,
}

impl Default for PayConfig {
    fn default() -> Self {
        Self {
            base_daily_wage: 10,
            wage_per_tier: 5,
            side_deal_min_trade: 60,
            side_deal_bonus: 0.25,
            corruption_min_roguery: 50,
            corruption_recovered_fraction: 0.2,
            corruption_relation_penalty: -5,
            bribe_fraction: 0.5,
            smuggle_min_roguery: 80,
            final_discharge_min_tier: 5,
            final_discharge_min_days: 180,
            pension_multiplier: 3,
            desertion_relation_penalty: -30,
        }
    }
}

impl PayConfig {
    /// Wage for `days` of service at `tier`. No days served earns nothing.
    pub fn wage_for(&self, tier: u32, days: u32) -> i32 {
        let daily = self.base_daily_wage + self.wage_per_tier * tier as i32;
        daily.saturating_mul(days as i32)
    }
}

/// XP needed for each tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromotionConfig {
    /// `tier_xp[i]` is the XP needed to hold tier `i + 1`
    pub tier_xp: Vec<u32>,
}

impl Default for PromotionConfig {
    fn default() -> Self {
        Self {
            tier_xp: vec![0, 800, 2000, 4000, 7000, 11000, 16000, 22000, 30000],
        }
    }
}

impl PromotionConfig {
    pub fn max_tier(&self) -> u32 {
        self.tier_xp.len().max(1) as u32
    }

    /// Tier earned by a given XP total.
    pub fn tier_for_xp(&self, xp: u32) -> u32 {
        let reached = self.tier_xp.iter().filter(|&&needed| xp >= needed).count() as u32;
        reached.max(1)
    }
}

/// General settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Skip the staged menus entirely and always use the single pay prompt
    pub legacy_muster_only: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            legacy_muster_only: false,
        }
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Generates a default configuration file content.
pub fn default_config_toml() -> String {
    r#"# Enlistment Configuration

[attachment]
near_threshold_sq = 0.36
recovery_threshold_sq = 1.44
follow_offset = 0.5
near_gain = 8.0
recovery_gain = 5.0
escort_refresh_secs = 0.1
camera_refresh_secs = 0.5
ignore_horizon_secs = 0.5
settle_secs = 1.0
battle_nudge_offset = 0.2

[muster]
interval_days = 12
baggage_trigger_roll = 0.3
inspection_cooldown_days = 7
inspection_min_health = 0.4
inspection_pass_quality = 0.5
inspection_pass_relation = 2
inspection_fail_relation = -2
excusal_min_relation = 20
recruit_min_tier = 3
recruit_cooldown_days = 7
recruit_trigger_roll = 0.35
mentor_min_leadership = 50
mentor_xp = 40
retinue_min_tier = 7
replacement_cost = 60
history_limit = 20

[pay]
base_daily_wage = 10
wage_per_tier = 5
side_deal_min_trade = 60
side_deal_bonus = 0.25
corruption_min_roguery = 50
corruption_recovered_fraction = 0.2
corruption_relation_penalty = -5
bribe_fraction = 0.5
smuggle_min_roguery = 80
final_discharge_min_tier = 5
final_discharge_min_days = 180
pension_multiplier = 3
desertion_relation_penalty = -30

[promotion]
tier_xp = [0, 800, 2000, 4000, 7000, 11000, 16000, 22000, 30000]

[general]
legacy_muster_only = false
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EnlistConfig::default();

        assert_eq!(config.attachment.near_threshold_sq, 0.36);
        assert_eq!(config.attachment.recovery_threshold_sq, 1.44);
        assert_eq!(config.muster.interval_days, 12);
        assert_eq!(config.muster.retinue_min_tier, 7);
        assert!(!config.general.legacy_muster_only);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let toml = r#"
            [muster]
            interval_days = 7
        "#;

        let config = EnlistConfig::from_toml_str(toml).unwrap();

        assert_eq!(config.muster.interval_days, 7);
        assert_eq!(config.muster.recruit_min_tier, 3);
        assert_eq!(config.attachment.near_gain, 8.0);
        assert_eq!(config.pay.base_daily_wage, 10);
    }

    #[test]
    fn test_default_config_toml_parses() {
        let config = EnlistConfig::from_toml_str(&default_config_toml()).unwrap();
        let defaults = EnlistConfig::default();
        assert_eq!(config.muster, defaults.muster);
        assert_eq!(config.promotion, defaults.promotion);
        assert_eq!(config.general, defaults.general);
        assert_eq!(config.pay.wage_for(4, 12), defaults.pay.wage_for(4, 12));
    }

    #[test]
    fn test_config_to_toml() {
        let toml = EnlistConfig::default().to_toml().unwrap();
        assert!(toml.contains("[attachment]"));
        assert!(toml.contains("[muster]"));
        assert!(toml.contains("[pay]"));
    }

    #[test]
    fn test_bad_toml_is_an_error() {
        let err = EnlistConfig::from_toml_str("[muster]\ninterval_days = \"soon\"").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn test_wage_for() {
        let pay = PayConfig::default();
        assert_eq!(pay.wage_for(6, 12), 480);
        assert_eq!(pay.wage_for(1, 1), 15);
    }

    #[test]
    fn test_wage_for_zero_days_is_zero() {
        let pay = PayConfig::default();
        assert_eq!(pay.wage_for(6, 0), 0);
        assert_eq!(pay.wage_for(1, 0), 0);
    }

    #[test]
    fn test_tier_for_xp() {
        let promotion = PromotionConfig::default();
        assert_eq!(promotion.tier_for_xp(0), 1);
        assert_eq!(promotion.tier_for_xp(799), 1);
        assert_eq!(promotion.tier_for_xp(800), 2);
        assert_eq!(promotion.tier_for_xp(1_000_000), 9);
        assert_eq!(promotion.max_tier(), 9);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("enlist.toml");
        std::fs::write(&path, "[pay]\nbase_daily_wage = 20\n").unwrap();

        let config = EnlistConfig::from_file(&path).unwrap();
        assert_eq!(config.pay.base_daily_wage, 20);
        assert!(EnlistConfig::from_file(&dir.path().join("missing.toml")).is_err());
    }
}
